use crate::common::{Record, Value};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// A flat, schema-less record: field name to [`Value`].
///
/// `Document` is the ready-made [`Record`] implementation for callers that
/// do not want to index their own structs. It is also what the integration
/// tests and examples use, via the [`doc!`](crate::doc) macro:
///
/// ```rust,ignore
/// let doc = doc! { "name": "Alice", "age": 30, "tags": ["a", "b"] };
/// assert_eq!(doc.get("age"), Some(&Value::I64(30)));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field. An empty field name is rejected.
    pub fn put<T: Into<Value>>(&mut self, field: &str, value: T) -> MemdexResult<()> {
        if field.is_empty() {
            log::error!("Document field name cannot be empty");
            return Err(MemdexError::new(
                "Document field name cannot be empty",
                ErrorKind::ValidationError,
            ));
        }
        self.fields.insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Record for Document {
    fn get(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.fields {
            map.entry(&k, &format_args!("{}", v));
        }
        map.finish()
    }
}

/// Creates a [`Document`] from `key: value` pairs. Values go through
/// [`Value::from`]; bracketed lists become [`Value::Array`]s.
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::common::Document::new();
            $(
                doc.put($key, $crate::doc_value!($value))
                    .expect("document field name must not be empty");
            )*
            doc
        }
    };
}

/// Helper macro converting values for [`doc!`].
#[macro_export]
macro_rules! doc_value {
    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
