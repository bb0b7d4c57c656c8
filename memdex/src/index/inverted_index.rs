use super::{AttributeIndex, FieldGetter, IndexCore, IndexParams};
use crate::common::{RowId, RowSet, Value};
use crate::condition::{BinaryOp, Condition};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::plan::{IndexHandle, IndexKind, Plan, Range};

/// Inverted index over a collection-valued attribute: every element of the
/// attribute's array becomes a key pointing back at the row.
///
/// Serves membership tests with the literal on the left: `1 IN attr`.
pub struct InvertedIndex {
    core: IndexCore,
}

impl InvertedIndex {
    pub fn new<P: Into<IndexParams>>(params: P) -> Self {
        let mut params = params.into();
        if params.none_allowed() {
            log::warn!(
                "Inverted index \"{}\" cannot hold null elements; none_allowed is ignored",
                params.name()
            );
            params = params.with_none_allowed(false);
        }
        InvertedIndex {
            core: IndexCore::new(params),
        }
    }

    fn elements(val: &Value) -> MemdexResult<&[Value]> {
        val.as_array().ok_or_else(|| {
            MemdexError::new(
                &format!("Inverted index value {} is not a collection", val),
                ErrorKind::ValidationError,
            )
        })
    }
}

impl AttributeIndex for InvertedIndex {
    fn params(&self) -> &IndexParams {
        &self.core.params
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Inverted
    }

    fn handle(&self) -> IndexHandle {
        self.core.handle(IndexKind::Inverted)
    }

    fn mem_slot(&self) -> Option<usize> {
        self.core.mem_slot
    }

    fn attach(&mut self, slot: usize, mem_slot: Option<usize>) {
        self.core.attach(slot, mem_slot);
    }

    /// The canonical value is the element array itself.
    fn make_val(&self, read: &mut FieldGetter<'_>) -> MemdexResult<Value> {
        let value = read(self.core.params.name())?;
        match value {
            Value::Array(_) => Ok(value),
            other => {
                log::error!(
                    "Attribute \"{}\" of an inverted index is not a collection: {}",
                    self.core.params.name(),
                    other
                );
                Err(MemdexError::new(
                    &format!(
                        "Attribute \"{}\" of an inverted index is not a collection",
                        self.core.params.name()
                    ),
                    ErrorKind::ValidationError,
                ))
            }
        }
    }

    fn validate(&self, val: &Value) -> MemdexResult<()> {
        for key in Self::elements(val)? {
            self.core.validate_key(key)?;
        }
        Ok(())
    }

    fn apply_add(&mut self, pk: RowId, val: &Value) -> MemdexResult<()> {
        for key in Self::elements(val)? {
            self.core.insert_key(key, pk)?;
        }
        Ok(())
    }

    fn apply_discard(&mut self, pk: RowId, val: &Value) {
        if let Ok(keys) = Self::elements(val) {
            for key in keys {
                self.core.discard_key(key, pk);
            }
        }
    }

    fn validate_refresh(&self, old: &Value, new: &Value) -> MemdexResult<()> {
        self.core
            .validate_refresh_keys(Self::elements(old)?, Self::elements(new)?)
    }

    fn apply_refresh(&mut self, pk: RowId, old: &Value, new: &Value) -> MemdexResult<()> {
        self.core
            .refresh_keys(pk, Self::elements(old)?, Self::elements(new)?)
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
        if op == BinaryOp::In && !attr_on_left {
            if let Some(value) = operand.as_literal() {
                return Some(Plan::IndexLookup {
                    index: self.handle(),
                    value: value.clone(),
                });
            }
        }
        None
    }

    fn key_count(&self) -> usize {
        self.core.key_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::lit;

    fn tags(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_every_element_becomes_a_key() {
        let mut index = InvertedIndex::new("tags");
        index.apply_add(1, &tags(&["red", "green"])).unwrap();
        index.apply_add(2, &tags(&["green", "blue"])).unwrap();

        assert!(index.lookup(&Value::from("red")).contains(1));
        let green = index.lookup(&Value::from("green"));
        assert!(green.contains(1) && green.contains(2));
        assert_eq!(index.key_count(), 3);
    }

    #[test]
    fn test_make_val_rejects_scalar_attribute() {
        let index = InvertedIndex::new("tags");
        let mut read = |_: &str| Ok(Value::I64(1));
        let err = index.make_val(&mut read).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_null_elements_are_rejected() {
        let index = InvertedIndex::new("tags");
        let val = Value::Array(vec![Value::from("a"), Value::Null]);
        let err = index.validate(&val).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NullKeyNotAllowed);
    }

    #[test]
    fn test_refresh_applies_element_diff() {
        let mut index = InvertedIndex::new("tags");
        index.apply_add(1, &tags(&["a", "b"])).unwrap();
        index
            .apply_refresh(1, &tags(&["a", "b"]), &tags(&["b", "c"]))
            .unwrap();

        assert!(index.lookup(&Value::from("a")).is_empty());
        assert!(index.lookup(&Value::from("b")).contains(1));
        assert!(index.lookup(&Value::from("c")).contains(1));
    }

    #[test]
    fn test_match_requires_literal_on_left() {
        let index = InvertedIndex::new("tags");
        let plan = index
            .match_condition(BinaryOp::In, &lit("red"), false)
            .expect("should match");
        assert!(matches!(plan, Plan::IndexLookup { .. }));

        assert!(index
            .match_condition(BinaryOp::In, &lit("red"), true)
            .is_none());
        assert!(index.match_condition(BinaryOp::Eq, &lit(1), true).is_none());
    }
}
