use super::{match_equality, AttributeIndex, FieldGetter, IndexCore, IndexParams};
use crate::common::{RowId, RowSet, Value};
use crate::condition::{BinaryOp, Condition};
use crate::errors::MemdexResult;
use crate::plan::{IndexHandle, IndexKind, Plan, Range};

/// Ordered range index.
///
/// Serves everything a [`super::HashIndex`] serves, plus `attr < literal`,
/// `attr <= literal`, `attr > literal` and `attr >= literal` (and their
/// flipped forms with the attribute on the right).
pub struct RangeIndex {
    core: IndexCore,
}

impl RangeIndex {
    pub fn new<P: Into<IndexParams>>(params: P) -> Self {
        RangeIndex {
            core: IndexCore::new(params.into()),
        }
    }
}

impl AttributeIndex for RangeIndex {
    fn params(&self) -> &IndexParams {
        &self.core.params
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Range
    }

    fn handle(&self) -> IndexHandle {
        self.core.handle(IndexKind::Range)
    }

    fn mem_slot(&self) -> Option<usize> {
        self.core.mem_slot
    }

    fn attach(&mut self, slot: usize, mem_slot: Option<usize>) {
        self.core.attach(slot, mem_slot);
    }

    fn make_val(&self, read: &mut FieldGetter<'_>) -> MemdexResult<Value> {
        read(self.core.params.name())
    }

    fn validate(&self, val: &Value) -> MemdexResult<()> {
        self.core.validate_key(val)
    }

    fn apply_add(&mut self, pk: RowId, val: &Value) -> MemdexResult<()> {
        self.core.insert_key(val, pk)
    }

    fn apply_discard(&mut self, pk: RowId, val: &Value) {
        self.core.discard_key(val, pk);
    }

    fn validate_refresh(&self, old: &Value, new: &Value) -> MemdexResult<()> {
        if new != old {
            self.core.validate_key(new)?;
        }
        Ok(())
    }

    fn apply_refresh(&mut self, pk: RowId, old: &Value, new: &Value) -> MemdexResult<()> {
        if new != old {
            self.core.discard_key(old, pk);
            self.core.insert_key(new, pk)?;
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.core.clear();
    }

    fn lookup(&self, value: &Value) -> RowSet {
        self.core.lookup(value)
    }

    fn range(&self, range: &Range) -> Option<RowSet> {
        Some(self.core.range(range))
    }

    fn match_condition(
        &self,
        op: BinaryOp,
        operand: &Condition,
        attr_on_left: bool,
    ) -> Option<Plan> {
        if op.is_comparison() {
            let value = operand.as_literal()?;
            let comparison = if attr_on_left {
                op
            } else {
                op.inverse_comparison()
            };
            let range = Range::for_comparison(comparison, value.clone())?;
            return Some(Plan::IndexRange {
                index: self.handle(),
                range,
            });
        }
        match_equality(self.handle(), op, operand, attr_on_left)
    }

    fn key_count(&self) -> usize {
        self.core.key_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::lit;
    use crate::plan::Bound;

    fn sorted(set: &RowSet) -> Vec<RowId> {
        let mut ids: Vec<RowId> = set.iter().collect();
        ids.sort_unstable();
        ids
    }

    fn populated() -> RangeIndex {
        let mut index = RangeIndex::new("a");
        for (id, key) in [(1, 0), (2, 1), (3, 2), (4, 5)] {
            index.apply_add(id, &Value::I64(key)).unwrap();
        }
        index
    }

    #[test]
    fn test_range_scan_half_open() {
        let index = populated();
        let range = Range {
            left: Some(Bound::inclusive(Value::I64(0))),
            right: Some(Bound::exclusive(Value::I64(2))),
        };
        assert_eq!(sorted(&index.range(&range).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_range_scan_skips_null_keys() {
        let mut index = RangeIndex::new(IndexParams::new("a").with_none_allowed(true));
        index.apply_add(1, &Value::Null).unwrap();
        index.apply_add(2, &Value::I64(3)).unwrap();
        let everything = Range::default();
        assert_eq!(sorted(&index.range(&everything).unwrap()), vec![2]);
    }

    #[test]
    fn test_match_comparison_builds_range() {
        let index = populated();
        let plan = index
            .match_condition(BinaryOp::Lt, &lit(10), true)
            .expect("should match");
        assert_eq!(
            plan,
            Plan::IndexRange {
                index: index.handle(),
                range: Range::less_than(Value::I64(10)),
            }
        );
    }

    #[test]
    fn test_match_inverts_comparator_for_attr_on_right() {
        let index = populated();
        // 10 < a  ≡  a > 10
        let plan = index
            .match_condition(BinaryOp::Lt, &lit(10), false)
            .expect("should match");
        assert_eq!(
            plan,
            Plan::IndexRange {
                index: index.handle(),
                range: Range::greater_than(Value::I64(10)),
            }
        );
    }

    #[test]
    fn test_match_falls_back_to_equality_rules() {
        let index = populated();
        let plan = index
            .match_condition(BinaryOp::Eq, &lit(1), true)
            .expect("should match");
        assert!(matches!(plan, Plan::IndexLookup { .. }));
    }
}
