use crate::common::{RowId, RowSet, Value};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::plan::Range;
use std::collections::BTreeMap;
use std::ops::Bound as MapBound;

/// Selects the ordered-map flavour backing an index: generic values, signed
/// 64-bit keys, or unsigned 64-bit keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    Obj,
    Int,
    Uint,
}

/// An ordered map from index key to row-id bucket, in one of three key
/// flavours. Buckets are removed as soon as they become empty so the map
/// stays compact.
#[derive(Debug)]
pub(crate) enum KeyMap {
    Obj(BTreeMap<Value, RowSet>),
    Int(BTreeMap<i64, RowSet>),
    Uint(BTreeMap<u64, RowSet>),
}

impl KeyMap {
    pub fn new(key_type: KeyType) -> Self {
        match key_type {
            KeyType::Obj => KeyMap::Obj(BTreeMap::new()),
            KeyType::Int => KeyMap::Int(BTreeMap::new()),
            KeyType::Uint => KeyMap::Uint(BTreeMap::new()),
        }
    }

    fn to_int(key: &Value) -> MemdexResult<i64> {
        key.as_i64().ok_or_else(|| {
            MemdexError::new(
                &format!("Key {} is not a signed 64-bit integer", key),
                ErrorKind::ValidationError,
            )
        })
    }

    fn to_uint(key: &Value) -> MemdexResult<u64> {
        key.as_u64().ok_or_else(|| {
            MemdexError::new(
                &format!("Key {} is not an unsigned 64-bit integer", key),
                ErrorKind::ValidationError,
            )
        })
    }

    /// Whether a non-empty bucket exists for `key`. An inconvertible key
    /// cannot be present.
    pub fn is_occupied(&self, key: &Value) -> bool {
        match self {
            KeyMap::Obj(map) => map.get(key).is_some_and(|b| !b.is_empty()),
            KeyMap::Int(map) => match Self::to_int(key) {
                Ok(k) => map.get(&k).is_some_and(|b| !b.is_empty()),
                Err(_) => false,
            },
            KeyMap::Uint(map) => match Self::to_uint(key) {
                Ok(k) => map.get(&k).is_some_and(|b| !b.is_empty()),
                Err(_) => false,
            },
        }
    }

    /// Fails with [`ErrorKind::ValidationError`] when `key` cannot be
    /// represented in this map's key flavour.
    pub fn check_key(&self, key: &Value) -> MemdexResult<()> {
        match self {
            KeyMap::Obj(_) => Ok(()),
            KeyMap::Int(_) => Self::to_int(key).map(|_| ()),
            KeyMap::Uint(_) => Self::to_uint(key).map(|_| ()),
        }
    }

    pub fn add(&mut self, key: &Value, id: RowId) -> MemdexResult<()> {
        fn upsert<K: Ord>(map: &mut BTreeMap<K, RowSet>, key: K, id: RowId) {
            let bucket = map.entry(key).or_default();
            let updated = std::mem::take(bucket).add(id);
            *bucket = updated;
        }

        match self {
            KeyMap::Obj(map) => upsert(map, key.clone(), id),
            KeyMap::Int(map) => upsert(map, Self::to_int(key)?, id),
            KeyMap::Uint(map) => upsert(map, Self::to_uint(key)?, id),
        }
        Ok(())
    }

    pub fn discard(&mut self, key: &Value, id: RowId) {
        fn downsert<K: Ord>(map: &mut BTreeMap<K, RowSet>, key: &K, id: RowId) {
            if let Some(bucket) = map.get_mut(key) {
                let updated = std::mem::take(bucket).discard(id);
                if updated.is_empty() {
                    map.remove(key);
                } else {
                    *bucket = updated;
                }
            }
        }

        match self {
            KeyMap::Obj(map) => downsert(map, key, id),
            KeyMap::Int(map) => {
                if let Ok(k) = Self::to_int(key) {
                    downsert(map, &k, id);
                }
            }
            KeyMap::Uint(map) => {
                if let Ok(k) = Self::to_uint(key) {
                    downsert(map, &k, id);
                }
            }
        }
    }

    /// The bucket stored under `key`, empty when absent or when the key is
    /// not representable in this flavour.
    pub fn get(&self, key: &Value) -> RowSet {
        match self {
            KeyMap::Obj(map) => map.get(key).cloned().unwrap_or_default(),
            KeyMap::Int(map) => match Self::to_int(key) {
                Ok(k) => map.get(&k).cloned().unwrap_or_default(),
                Err(_) => RowSet::Empty,
            },
            KeyMap::Uint(map) => match Self::to_uint(key) {
                Ok(k) => map.get(&k).cloned().unwrap_or_default(),
                Err(_) => RowSet::Empty,
            },
        }
    }

    /// Unions every bucket whose key falls inside `range`, ascending.
    pub fn range_union(&self, range: &Range) -> RowSet {
        let mut result = RowSet::new();
        match self {
            KeyMap::Obj(map) => {
                let left = match &range.left {
                    None => MapBound::Unbounded,
                    Some(b) if b.inclusive => MapBound::Included(b.value.clone()),
                    Some(b) => MapBound::Excluded(b.value.clone()),
                };
                let right = match &range.right {
                    None => MapBound::Unbounded,
                    Some(b) if b.inclusive => MapBound::Included(b.value.clone()),
                    Some(b) => MapBound::Excluded(b.value.clone()),
                };
                if bounds_are_ordered(&left, &right) {
                    for (_, bucket) in map.range((left, right)) {
                        result.union_with(bucket);
                    }
                }
            }
            KeyMap::Int(map) => {
                if let Some((left, right)) = integer_bounds(range, int_floor, int_ceil) {
                    for (_, bucket) in map.range((left, right)) {
                        result.union_with(bucket);
                    }
                }
            }
            KeyMap::Uint(map) => {
                if let Some((left, right)) = integer_bounds(range, uint_floor, uint_ceil) {
                    for (_, bucket) in map.range((left, right)) {
                        result.union_with(bucket);
                    }
                }
            }
        }
        result
    }

    pub fn clear(&mut self) {
        match self {
            KeyMap::Obj(map) => map.clear(),
            KeyMap::Int(map) => map.clear(),
            KeyMap::Uint(map) => map.clear(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KeyMap::Obj(map) => map.len(),
            KeyMap::Int(map) => map.len(),
            KeyMap::Uint(map) => map.len(),
        }
    }
}

fn bounds_are_ordered(left: &MapBound<Value>, right: &MapBound<Value>) -> bool {
    // BTreeMap::range panics on inverted bounds; an inverted range is just
    // empty here.
    match (left, right) {
        (MapBound::Unbounded, _) | (_, MapBound::Unbounded) => true,
        (
            MapBound::Included(l) | MapBound::Excluded(l),
            MapBound::Included(r) | MapBound::Excluded(r),
        ) => match (left, right) {
            (MapBound::Included(_), MapBound::Included(_)) => l <= r,
            _ => l < r,
        },
    }
}

/// Translates a value-space [`Range`] into integer map bounds.
///
/// Fractional bound values round inward (a left bound of `1.5` becomes an
/// inclusive `2`, a right bound of `1.5` an inclusive `1`); a bound the key
/// space cannot reach makes the range empty or unbounded as appropriate.
/// Returns `None` when no key can fall inside the range.
fn integer_bounds<K: Ord + Copy>(
    range: &Range,
    floor: impl Fn(&Value) -> Option<K>,
    ceil: impl Fn(&Value) -> Option<K>,
) -> Option<(MapBound<K>, MapBound<K>)> {
    let left = match &range.left {
        None => MapBound::Unbounded,
        Some(b) => match exact_key(&b.value, &floor, &ceil) {
            ExactKey::Exact(k) => {
                if b.inclusive {
                    MapBound::Included(k)
                } else {
                    MapBound::Excluded(k)
                }
            }
            // fractional: the first reachable key is the next integer up
            ExactKey::Between(k) => MapBound::Excluded(k),
            ExactKey::BelowAll => MapBound::Unbounded,
            ExactKey::AboveAll | ExactKey::Unreachable => return None,
        },
    };
    let right = match &range.right {
        None => MapBound::Unbounded,
        Some(b) => match exact_key(&b.value, &floor, &ceil) {
            ExactKey::Exact(k) => {
                if b.inclusive {
                    MapBound::Included(k)
                } else {
                    MapBound::Excluded(k)
                }
            }
            ExactKey::Between(k) => MapBound::Included(k),
            ExactKey::AboveAll => MapBound::Unbounded,
            ExactKey::BelowAll | ExactKey::Unreachable => return None,
        },
    };
    match (&left, &right) {
        (
            MapBound::Included(l) | MapBound::Excluded(l),
            MapBound::Included(r) | MapBound::Excluded(r),
        ) => {
            let ordered = match (&left, &right) {
                (MapBound::Included(_), MapBound::Included(_)) => l <= r,
                _ => l < r,
            };
            if !ordered {
                return None;
            }
        }
        _ => {}
    }
    Some((left, right))
}

enum ExactKey<K> {
    /// The value is exactly this key.
    Exact(K),
    /// The value falls strictly between this key and the next one up.
    Between(K),
    /// The value is below every key in the flavour.
    BelowAll,
    /// The value is above every key in the flavour.
    AboveAll,
    /// The value is not numeric.
    Unreachable,
}

fn exact_key<K: Ord + Copy>(
    value: &Value,
    floor: &impl Fn(&Value) -> Option<K>,
    ceil: &impl Fn(&Value) -> Option<K>,
) -> ExactKey<K> {
    match (floor(value), ceil(value)) {
        (Some(f), Some(c)) if f == c => ExactKey::Exact(f),
        (Some(f), Some(_)) => ExactKey::Between(f),
        (None, Some(_)) => ExactKey::BelowAll,
        (Some(_), None) => ExactKey::AboveAll,
        (None, None) => ExactKey::Unreachable,
    }
}

/// Largest i64 <= value, `None` when the value is below i64 range or not
/// numeric.
fn int_floor(value: &Value) -> Option<i64> {
    match value {
        Value::I64(v) => Some(*v),
        Value::U64(v) => Some(i64::try_from(*v).unwrap_or(i64::MAX)),
        Value::F64(v) => {
            if v.is_nan() {
                None
            } else if *v < i64::MIN as f64 {
                None
            } else if *v >= i64::MAX as f64 {
                Some(i64::MAX)
            } else {
                Some(v.floor() as i64)
            }
        }
        _ => None,
    }
}

/// Smallest i64 >= value, `None` when the value is above i64 range or not
/// numeric.
fn int_ceil(value: &Value) -> Option<i64> {
    match value {
        Value::I64(v) => Some(*v),
        Value::U64(v) => i64::try_from(*v).ok(),
        Value::F64(v) => {
            if v.is_nan() {
                None
            } else if *v > i64::MAX as f64 {
                None
            } else if *v <= i64::MIN as f64 {
                Some(i64::MIN)
            } else {
                Some(v.ceil() as i64)
            }
        }
        _ => None,
    }
}

fn uint_floor(value: &Value) -> Option<u64> {
    match value {
        Value::U64(v) => Some(*v),
        Value::I64(v) => u64::try_from(*v).ok(),
        Value::F64(v) => {
            if v.is_nan() || *v < 0.0 {
                None
            } else if *v >= u64::MAX as f64 {
                Some(u64::MAX)
            } else {
                Some(v.floor() as u64)
            }
        }
        _ => None,
    }
}

fn uint_ceil(value: &Value) -> Option<u64> {
    match value {
        Value::U64(v) => Some(*v),
        Value::I64(v) => Some(u64::try_from(*v).unwrap_or(0)),
        Value::F64(v) => {
            if v.is_nan() || *v > u64::MAX as f64 {
                None
            } else if *v <= 0.0 {
                Some(0)
            } else {
                Some(v.ceil() as u64)
            }
        }
        _ => None,
    }
}
