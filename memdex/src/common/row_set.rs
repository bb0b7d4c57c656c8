use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};

/// Row identifier: monotonically assigned, never reused.
pub type RowId = u64;

/// Upper size bound for the small-array representation.
const ARRAY_SIZE_MAX: usize = 32;
/// A hash set downgrades back to an array only below this size. The gap to
/// `ARRAY_SIZE_MAX` prevents representation oscillation around the boundary.
const SET_SIZE_MIN: usize = 16;

type RowArray = SmallVec<[RowId; 8]>;

/// A set of row-ids whose physical representation adapts to its size.
///
/// | State     | Size        | Representation          |
/// |-----------|-------------|-------------------------|
/// | `Empty`   | 0           | sentinel                |
/// | `Single`  | 1           | the raw row-id          |
/// | `Array`   | 2..=32      | contiguous array        |
/// | `Set`     | > 32        | hash set                |
///
/// Mutating operations consume the set and return the next representation,
/// so a holder replaces its value atomically. The pure set-algebra
/// operations — union, intersection, difference, symmetric difference —
/// never mutate their inputs; filter results are plain `RowSet`s, so they
/// compose through this algebra without touching the collection again.
#[derive(Clone, Default)]
pub enum RowSet {
    #[default]
    Empty,
    Single(RowId),
    Array(RowArray),
    Set(HashSet<RowId>),
}

impl RowSet {
    pub fn new() -> Self {
        RowSet::Empty
    }

    /// Builds the canonical representation for the given member count.
    fn from_set(set: HashSet<RowId>) -> Self {
        match set.len() {
            0 => RowSet::Empty,
            1 => RowSet::Single(set.into_iter().next().unwrap_or_default()),
            n if n <= ARRAY_SIZE_MAX => RowSet::Array(set.into_iter().collect()),
            _ => RowSet::Set(set),
        }
    }

    fn into_set(self) -> HashSet<RowId> {
        match self {
            RowSet::Empty => HashSet::new(),
            RowSet::Single(id) => {
                let mut set = HashSet::with_capacity(1);
                set.insert(id);
                set
            }
            RowSet::Array(items) => items.into_iter().collect(),
            RowSet::Set(set) => set,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowSet::Empty => 0,
            RowSet::Single(_) => 1,
            RowSet::Array(items) => items.len(),
            RowSet::Set(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RowSet::Empty)
    }

    pub fn contains(&self, id: RowId) -> bool {
        match self {
            RowSet::Empty => false,
            RowSet::Single(v) => *v == id,
            RowSet::Array(items) => items.contains(&id),
            RowSet::Set(set) => set.contains(&id),
        }
    }

    /// Adds `id`, upgrading the representation when a size threshold is
    /// crossed.
    pub fn add(self, id: RowId) -> Self {
        match self {
            RowSet::Empty => RowSet::Single(id),
            RowSet::Single(v) => {
                if v == id {
                    RowSet::Single(v)
                } else {
                    let mut items = RowArray::new();
                    items.push(v);
                    items.push(id);
                    RowSet::Array(items)
                }
            }
            RowSet::Array(mut items) => {
                if items.contains(&id) {
                    return RowSet::Array(items);
                }
                items.push(id);
                if items.len() > ARRAY_SIZE_MAX {
                    RowSet::Set(items.into_iter().collect())
                } else {
                    RowSet::Array(items)
                }
            }
            RowSet::Set(mut set) => {
                set.insert(id);
                RowSet::Set(set)
            }
        }
    }

    /// Removes `id` if present, downgrading the representation when a size
    /// threshold is crossed.
    pub fn discard(self, id: RowId) -> Self {
        match self {
            RowSet::Empty => RowSet::Empty,
            RowSet::Single(v) => {
                if v == id {
                    RowSet::Empty
                } else {
                    RowSet::Single(v)
                }
            }
            RowSet::Array(mut items) => {
                if let Some(pos) = items.iter().position(|v| *v == id) {
                    items.remove(pos);
                }
                if items.len() == 1 {
                    RowSet::Single(items[0])
                } else {
                    RowSet::Array(items)
                }
            }
            RowSet::Set(mut set) => {
                set.remove(&id);
                if set.len() < SET_SIZE_MIN {
                    RowSet::Array(set.into_iter().collect())
                } else {
                    RowSet::Set(set)
                }
            }
        }
    }

    pub fn iter(&self) -> RowSetIter<'_> {
        match self {
            RowSet::Empty => RowSetIter::Empty,
            RowSet::Single(id) => RowSetIter::Single(Some(*id)),
            RowSet::Array(items) => RowSetIter::Array(items.iter()),
            RowSet::Set(set) => RowSetIter::Set(set.iter()),
        }
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &RowSet) {
        if other.is_empty() {
            return;
        }
        let mut set = std::mem::take(self).into_set();
        set.extend(other.iter());
        *self = RowSet::from_set(set);
    }

    /// In-place intersection; collapses to `Empty` as soon as the result
    /// cannot contain any member.
    pub fn intersect_with(&mut self, other: &RowSet) {
        if self.is_empty() {
            return;
        }
        if other.is_empty() {
            *self = RowSet::Empty;
            return;
        }
        let mut set = std::mem::take(self).into_set();
        set.retain(|id| other.contains(*id));
        *self = RowSet::from_set(set);
    }

    /// In-place difference.
    pub fn difference_with(&mut self, other: &RowSet) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        let mut set = std::mem::take(self).into_set();
        set.retain(|id| !other.contains(*id));
        *self = RowSet::from_set(set);
    }

    /// In-place symmetric difference.
    pub fn symmetric_difference_with(&mut self, other: &RowSet) {
        if other.is_empty() {
            return;
        }
        let mut set = std::mem::take(self).into_set();
        for id in other.iter() {
            if !set.remove(&id) {
                set.insert(id);
            }
        }
        *self = RowSet::from_set(set);
    }

    /// Pure union: inputs are left untouched.
    pub fn union(&self, other: &RowSet) -> RowSet {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    /// Pure intersection: inputs are left untouched.
    pub fn intersection(&self, other: &RowSet) -> RowSet {
        let mut result = self.clone();
        result.intersect_with(other);
        result
    }

    /// Pure difference: inputs are left untouched.
    pub fn difference(&self, other: &RowSet) -> RowSet {
        let mut result = self.clone();
        result.difference_with(other);
        result
    }

    /// Pure symmetric difference: inputs are left untouched.
    pub fn symmetric_difference(&self, other: &RowSet) -> RowSet {
        let mut result = self.clone();
        result.symmetric_difference_with(other);
        result
    }
}

pub enum RowSetIter<'a> {
    Empty,
    Single(Option<RowId>),
    Array(std::slice::Iter<'a, RowId>),
    Set(std::collections::hash_set::Iter<'a, RowId>),
}

impl Iterator for RowSetIter<'_> {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        match self {
            RowSetIter::Empty => None,
            RowSetIter::Single(id) => id.take(),
            RowSetIter::Array(iter) => iter.next().copied(),
            RowSetIter::Set(iter) => iter.next().copied(),
        }
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = RowId;
    type IntoIter = RowSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<RowId> for RowSet {
    fn from_iter<I: IntoIterator<Item = RowId>>(iter: I) -> Self {
        RowSet::from_set(iter.into_iter().collect())
    }
}

/// Equality is membership equality, independent of representation.
impl PartialEq for RowSet {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|id| other.contains(id))
    }
}

impl Eq for RowSet {}

impl Debug for RowSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<RowId> = self.iter().collect();
        ids.sort_unstable();
        write!(f, "RowSet{:?}", ids)
    }
}
