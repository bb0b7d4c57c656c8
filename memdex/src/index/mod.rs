//! The index subsystem: hash-equality, ordered-range and inverted indexes,
//! all keyed maps from attribute value to an adaptive row-id bucket plus a
//! separate null-key set.

mod hash_index;
mod inverted_index;
mod key_map;
mod range_index;

pub use hash_index::HashIndex;
pub use inverted_index::InvertedIndex;
pub use key_map::KeyType;
pub use range_index::RangeIndex;

use crate::common::{RowId, RowSet, Value};
use crate::condition::{BinaryOp, Condition};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::plan::{IndexHandle, IndexKind, Plan, Range};
use key_map::KeyMap;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;

static UNIQUE_CONSTRAINT_ERROR: Lazy<MemdexError> = Lazy::new(|| {
    MemdexError::new(
        "Unique constraint violated",
        ErrorKind::UniqueConstraintViolation,
    )
});

/// Configuration of a single index.
///
/// `name` is the indexed attribute; a name beginning with a back-tick
/// denotes a computed attribute resolved through the collection's function
/// map. `key_type` selects the ordered-map flavour. With `memorize` (the
/// default) the index's canonical value is remembered on each object's box
/// so refresh and removal never re-read the attribute; switch it off only
/// for values that are constant per object.
#[derive(Debug, Clone)]
pub struct IndexParams {
    name: String,
    key_type: KeyType,
    none_allowed: bool,
    unique: bool,
    memorize: bool,
}

impl IndexParams {
    pub fn new(name: &str) -> Self {
        IndexParams {
            name: name.to_string(),
            key_type: KeyType::Obj,
            none_allowed: false,
            unique: false,
            memorize: true,
        }
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// Allow null keys; they are stored in a separate set and never
    /// returned by range queries.
    pub fn with_none_allowed(mut self, none_allowed: bool) -> Self {
        self.none_allowed = none_allowed;
        self
    }

    /// Only allow one object per key.
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn with_memorize(mut self, memorize: bool) -> Self {
        self.memorize = memorize;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn none_allowed(&self) -> bool {
        self.none_allowed
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    pub fn memorize(&self) -> bool {
        self.memorize
    }

    pub fn is_computed(&self) -> bool {
        self.name.starts_with('`')
    }
}

impl From<&str> for IndexParams {
    fn from(name: &str) -> Self {
        IndexParams::new(name)
    }
}

/// Reads one attribute of the object currently being indexed.
pub type FieldGetter<'a> = dyn FnMut(&str) -> MemdexResult<Value> + 'a;

/// A secondary index over one attribute.
///
/// Mutations are two-phase so a failed constraint in one index cannot leave
/// partial state in another: the collection first computes every index's
/// canonical value with [`AttributeIndex::make_val`], asks each index to
/// [`AttributeIndex::validate`] it, and only then applies.
pub trait AttributeIndex {
    fn params(&self) -> &IndexParams;

    fn kind(&self) -> IndexKind;

    /// The handle plan nodes refer to this index by.
    fn handle(&self) -> IndexHandle;

    /// The slot of this index's value in each box's memorised tuple, when
    /// the index memorises.
    fn mem_slot(&self) -> Option<usize>;

    /// Wires the index into a collection's declaration order. Called once
    /// at build time.
    fn attach(&mut self, slot: usize, mem_slot: Option<usize>);

    /// Computes the canonical storable value for an object without mutating
    /// the index.
    fn make_val(&self, read: &mut FieldGetter<'_>) -> MemdexResult<Value>;

    /// Pre-flight constraint check for a value produced by `make_val`.
    fn validate(&self, val: &Value) -> MemdexResult<()>;

    fn apply_add(&mut self, pk: RowId, val: &Value) -> MemdexResult<()>;

    fn apply_discard(&mut self, pk: RowId, val: &Value);

    /// Pre-flight check for the keys a refresh from `old` to `new` would
    /// add.
    fn validate_refresh(&self, old: &Value, new: &Value) -> MemdexResult<()>;

    fn apply_refresh(&mut self, pk: RowId, old: &Value, new: &Value) -> MemdexResult<()>;

    fn clear(&mut self);

    /// Equality probe. A null value reads the null-key set.
    fn lookup(&self, value: &Value) -> RowSet;

    /// Ordered range scan; `None` when this index cannot serve ranges.
    fn range(&self, range: &Range) -> Option<RowSet>;

    /// Asks whether this index can serve `condition`, given the operand on
    /// the side opposite the attribute. Returns the replacement plan.
    fn match_condition(
        &self,
        op: BinaryOp,
        operand: &Condition,
        attr_on_left: bool,
    ) -> Option<Plan>;

    /// Number of distinct non-null keys currently stored.
    fn key_count(&self) -> usize;
}

/// Storage and bookkeeping shared by every index flavour.
pub(crate) struct IndexCore {
    params: IndexParams,
    slot: usize,
    mem_slot: Option<usize>,
    map: KeyMap,
    none_set: RowSet,
}

impl IndexCore {
    fn new(params: IndexParams) -> Self {
        let map = KeyMap::new(params.key_type());
        IndexCore {
            params,
            slot: 0,
            mem_slot: None,
            map,
            none_set: RowSet::new(),
        }
    }

    fn handle(&self, kind: IndexKind) -> IndexHandle {
        IndexHandle {
            slot: self.slot,
            kind,
            name: self.params.name().to_string(),
        }
    }

    fn attach(&mut self, slot: usize, mem_slot: Option<usize>) {
        self.slot = slot;
        self.mem_slot = mem_slot;
    }

    fn validate_key(&self, key: &Value) -> MemdexResult<()> {
        if key.is_null() {
            if self.params.none_allowed() {
                return Ok(());
            }
            log::error!(
                "Null key is not allowed for index \"{}\"",
                self.params.name()
            );
            return Err(MemdexError::new(
                &format!("Null key is not allowed for index \"{}\"", self.params.name()),
                ErrorKind::NullKeyNotAllowed,
            ));
        }
        self.map.check_key(key)?;
        if self.params.unique() && self.map.is_occupied(key) {
            log::error!(
                "Unique constraint violated for index \"{}\", key {}",
                self.params.name(),
                key
            );
            return Err(UNIQUE_CONSTRAINT_ERROR.clone());
        }
        Ok(())
    }

    fn insert_key(&mut self, key: &Value, pk: RowId) -> MemdexResult<()> {
        if key.is_null() {
            let set = std::mem::take(&mut self.none_set);
            self.none_set = set.add(pk);
            Ok(())
        } else {
            self.map.add(key, pk)
        }
    }

    fn discard_key(&mut self, key: &Value, pk: RowId) {
        if key.is_null() {
            let set = std::mem::take(&mut self.none_set);
            self.none_set = set.discard(pk);
        } else {
            self.map.discard(key, pk);
        }
    }

    /// Discards `old \ new`, inserts `new \ old`. Keys present in both stay
    /// untouched.
    fn refresh_keys(&mut self, pk: RowId, old: &[Value], new: &[Value]) -> MemdexResult<()> {
        let old_set: BTreeSet<&Value> = old.iter().collect();
        let new_set: BTreeSet<&Value> = new.iter().collect();
        for &key in old_set.difference(&new_set) {
            self.discard_key(key, pk);
        }
        for &key in new_set.difference(&old_set) {
            self.insert_key(key, pk)?;
        }
        Ok(())
    }

    fn validate_refresh_keys(&self, old: &[Value], new: &[Value]) -> MemdexResult<()> {
        let old_set: BTreeSet<&Value> = old.iter().collect();
        let new_set: BTreeSet<&Value> = new.iter().collect();
        for &key in new_set.difference(&old_set) {
            self.validate_key(key)?;
        }
        Ok(())
    }

    fn lookup(&self, value: &Value) -> RowSet {
        if value.is_null() {
            self.none_set.clone()
        } else {
            self.map.get(value)
        }
    }

    /// Null-keyed rows are never part of a range result.
    fn range(&self, range: &Range) -> RowSet {
        self.map.range_union(range)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.none_set = RowSet::new();
    }

    fn key_count(&self) -> usize {
        self.map.len()
    }
}

/// Equality matching shared by hash and range indexes: `attr = literal`
/// becomes a lookup, `attr IN [literals…]` a union of lookups.
fn match_equality(
    handle: IndexHandle,
    op: BinaryOp,
    operand: &Condition,
    attr_on_left: bool,
) -> Option<Plan> {
    match op {
        BinaryOp::Eq => operand.as_literal().map(|value| Plan::IndexLookup {
            index: handle,
            value: value.clone(),
        }),
        BinaryOp::In if attr_on_left => {
            if let Condition::Array(items) = operand {
                let mut lookups = Vec::with_capacity(items.len());
                for item in items {
                    lookups.push(Plan::IndexLookup {
                        index: handle.clone(),
                        value: item.as_literal()?.clone(),
                    });
                }
                Some(Plan::Union(lookups))
            } else {
                None
            }
        }
        _ => None,
    }
}
