use super::{match_equality, AttributeIndex, FieldGetter, IndexCore, IndexParams};
use crate::common::{RowId, RowSet, Value};
use crate::condition::{BinaryOp, Condition};
use crate::errors::MemdexResult;
use crate::plan::{IndexHandle, IndexKind, Plan, Range};

/// Hash-equality index: maps each attribute value to the set of row-ids
/// carrying it.
///
/// Serves `attr = literal` and `attr IN [literals…]`.
pub struct HashIndex {
    core: IndexCore,
}

impl HashIndex {
    pub fn new<P: Into<IndexParams>>(params: P) -> Self {
        HashIndex {
            core: IndexCore::new(params.into()),
        }
    }
}

impl AttributeIndex for HashIndex {
    fn params(&self) -> &IndexParams {
        &self.core.params
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hash
    }

    fn handle(&self) -> IndexHandle {
        self.core.handle(IndexKind::Hash)
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

    fn range(&self, _range: &Range) -> Option<RowSet> {
        None
    }

    fn match_condition(
        &self,
        op: BinaryOp,
        operand: &Condition,
        attr_on_left: bool,
    ) -> Option<Plan> {
        match_equality(self.handle(), op, operand, attr_on_left)
    }

    fn key_count(&self) -> usize {
        self.core.key_count()
    }
}
