//! Plan executor: interprets an (optimized) plan against the collection's
//! rows and indexes, producing an adaptive row-id set.

mod matcher;

use matcher::matches;

use crate::common::{RowId, RowSet, Value};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::index::AttributeIndex;
use crate::plan::Plan;

/// What the executor needs from the collection: rows, indexes, and
/// attribute reads (memory-backed where possible).
pub(crate) trait ExecSource {
    /// Every row-id currently in the collection.
    fn all_rows(&self) -> RowSet;

    fn row_ids(&self) -> Box<dyn Iterator<Item = RowId> + '_>;

    fn index(&self, slot: usize) -> Option<&dyn AttributeIndex>;

    fn read_attr(&self, id: RowId, name: &str) -> MemdexResult<Value>;
}

pub(crate) fn execute(plan: &Plan, src: &dyn ExecSource) -> MemdexResult<RowSet> {
    match plan {
        Plan::Empty => Ok(RowSet::new()),
        Plan::IndexLookup { index, value } => {
            let idx = resolve_index(src, index.slot)?;
            Ok(idx.lookup(value))
        }
        Plan::IndexRange { index, range } => {
            let idx = resolve_index(src, index.slot)?;
            idx.range(range).ok_or_else(|| {
                log::error!("Index {} cannot serve range queries", index);
                MemdexError::new(
                    &format!("Index {} cannot serve range queries", index),
                    ErrorKind::InvalidOperation,
                )
            })
        }
        Plan::Union(inputs) => {
            let mut acc = RowSet::new();
            for input in inputs {
                let next = execute(input, src)?;
                acc.union_with(&next);
            }
            Ok(acc)
        }
        Plan::Intersect(inputs) => {
            let mut iter = inputs.iter();
            let mut acc = match iter.next() {
                None => return Ok(RowSet::new()),
                Some(first) => execute(first, src)?,
            };
            for input in iter {
                if acc.is_empty() {
                    return Ok(acc);
                }
                let next = execute(input, src)?;
                acc.intersect_with(&next);
            }
            Ok(acc)
        }
        Plan::Difference(inputs) => {
            let mut iter = inputs.iter();
            let mut acc = match iter.next() {
                None => return Ok(RowSet::new()),
                Some(first) => execute(first, src)?,
            };
            for input in iter {
                if acc.is_empty() {
                    return Ok(acc);
                }
                let next = execute(input, src)?;
                acc.difference_with(&next);
            }
            Ok(acc)
        }
        Plan::ScanFilter(condition) => {
            if let Some(literal) = condition.as_literal() {
                // `ScanFilter: true` is the full collection, `false` nothing
                return Ok(if literal.is_truthy() {
                    src.all_rows()
                } else {
                    RowSet::new()
                });
            }
            let mut result = RowSet::new();
            for id in src.row_ids() {
                if matches(condition, id, src)? {
                    result = result.add(id);
                }
            }
            Ok(result)
        }
        Plan::Filter { condition, input } => {
            let candidates = execute(input, src)?;
            let mut result = RowSet::new();
            for id in candidates.iter() {
                if matches(condition, id, src)? {
                    result = result.add(id);
                }
            }
            Ok(result)
        }
    }
}

fn resolve_index<'a>(
    src: &'a dyn ExecSource,
    slot: usize,
) -> MemdexResult<&'a dyn AttributeIndex> {
    src.index(slot).ok_or_else(|| {
        log::error!("Plan refers to unknown index slot {}", slot);
        MemdexError::new(
            &format!("Plan refers to unknown index slot {}", slot),
            ErrorKind::InvalidOperation,
        )
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    /// A minimal executor source over literal rows, for unit tests.
    pub(crate) struct StubSource {
        rows: BTreeMap<RowId, HashMap<String, Value>>,
        indexes: Vec<Box<dyn AttributeIndex>>,
    }

    impl StubSource {
        pub(crate) fn new() -> Self {
            StubSource {
                rows: BTreeMap::new(),
                indexes: Vec::new(),
            }
        }

        pub(crate) fn put(&mut self, id: RowId, fields: &[(&str, Value)]) {
            let row = fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            self.rows.insert(id, row);
        }

        pub(crate) fn add_index(&mut self, index: Box<dyn AttributeIndex>) {
            self.indexes.push(index);
        }
    }

    impl ExecSource for StubSource {
        fn all_rows(&self) -> RowSet {
            self.rows.keys().copied().collect()
        }

        fn row_ids(&self) -> Box<dyn Iterator<Item = RowId> + '_> {
            Box::new(self.rows.keys().copied())
        }

        fn index(&self, slot: usize) -> Option<&dyn AttributeIndex> {
            self.indexes.get(slot).map(|i| i.as_ref())
        }

        fn read_attr(&self, id: RowId, name: &str) -> MemdexResult<Value> {
            Ok(self
                .rows
                .get(&id)
                .and_then(|row| row.get(name).cloned())
                .unwrap_or(Value::Null))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubSource;
    use super::*;
    use crate::condition::{attr, lit, Condition};
    use crate::index::{HashIndex, RangeIndex};
    use crate::plan::{Bound, Range};

    fn sorted(set: &RowSet) -> Vec<RowId> {
        let mut ids: Vec<RowId> = set.iter().collect();
        ids.sort_unstable();
        ids
    }

    fn source() -> StubSource {
        let mut src = StubSource::new();
        for (id, a) in [(1, 0), (2, 1), (3, 2), (4, 0)] {
            src.put(id, &[("a", Value::I64(a))]);
        }
        let mut index = RangeIndex::new("a");
        index.attach(0, Some(0));
        for (id, a) in [(1, 0), (2, 1), (3, 2), (4, 0)] {
            index.apply_add(id, &Value::I64(a)).unwrap();
        }
        src.add_index(Box::new(index));
        src
    }

    #[test]
    fn test_empty_plan() {
        assert!(execute(&Plan::Empty, &source()).unwrap().is_empty());
    }

    #[test]
    fn test_index_lookup_and_range() {
        let src = source();
        let handle = src.index(0).unwrap().handle();

        let lookup = Plan::IndexLookup {
            index: handle.clone(),
            value: Value::I64(0),
        };
        assert_eq!(sorted(&execute(&lookup, &src).unwrap()), vec![1, 4]);

        let range = Plan::IndexRange {
            index: handle,
            range: Range {
                left: Some(Bound::inclusive(Value::I64(1))),
                right: Some(Bound::exclusive(Value::I64(3))),
            },
        };
        assert_eq!(sorted(&execute(&range, &src).unwrap()), vec![2, 3]);
    }

    #[test]
    fn test_range_on_non_range_index_is_an_error() {
        let mut src = StubSource::new();
        let mut index = HashIndex::new("a");
        index.attach(0, Some(0));
        src.add_index(Box::new(index));
        let handle = src.index(0).unwrap().handle();

        let plan = Plan::IndexRange {
            index: handle,
            range: Range::at_least(Value::I64(0)),
        };
        let err = execute(&plan, &src).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_unknown_index_slot_is_an_error() {
        let plan = Plan::IndexLookup {
            index: crate::plan::IndexHandle {
                slot: 9,
                kind: crate::plan::IndexKind::Hash,
                name: "a".to_string(),
            },
            value: Value::I64(0),
        };
        let err = execute(&plan, &source()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn test_set_operations() {
        let src = source();
        let scan = |cond: Condition| Plan::ScanFilter(cond);

        let union = Plan::Union(vec![scan(attr("a").eq(0)), scan(attr("a").eq(1))]);
        assert_eq!(sorted(&execute(&union, &src).unwrap()), vec![1, 2, 4]);

        let intersect = Plan::Intersect(vec![scan(attr("a").ge(0)), scan(attr("a").le(1))]);
        assert_eq!(sorted(&execute(&intersect, &src).unwrap()), vec![1, 2, 4]);

        let difference = Plan::Difference(vec![scan(attr("a").ge(0)), scan(attr("a").eq(0))]);
        assert_eq!(sorted(&execute(&difference, &src).unwrap()), vec![2, 3]);
    }

    #[test]
    fn test_intersect_short_circuits_on_empty() {
        let src = source();
        // the second child would error; an empty first child stops execution
        let plan = Plan::Intersect(vec![
            Plan::Empty,
            Plan::ScanFilter(attr("a").lt("oops")),
        ]);
        assert!(execute(&plan, &src).unwrap().is_empty());
    }

    #[test]
    fn test_scan_filter_literal_fast_paths() {
        let src = source();
        let all = execute(&Plan::ScanFilter(lit(true)), &src).unwrap();
        assert_eq!(sorted(&all), vec![1, 2, 3, 4]);
        let none = execute(&Plan::ScanFilter(lit(false)), &src).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_filter_over_input() {
        let src = source();
        let plan = Plan::Filter {
            condition: attr("a").eq(0),
            input: Box::new(Plan::ScanFilter(attr("a").le(1))),
        };
        assert_eq!(sorted(&execute(&plan, &src).unwrap()), vec![1, 4]);
    }
}
