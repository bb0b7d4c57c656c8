//! Common types: values, adaptive row-id sets, records and sort orders.

mod document;
mod row_set;
mod sort_order;
mod value;

pub use document::Document;
pub use row_set::{RowId, RowSet, RowSetIter};
pub use sort_order::SortOrder;
pub use value::Value;

/// Attribute access for objects stored in a collection.
///
/// Direct (non-computed) attributes resolve through this trait; a missing
/// field reads as null. Attribute names beginning with a back-tick are
/// *computed* and resolve through the function map supplied to the
/// collection builder instead, so a `Record` implementation never sees them.
pub trait Record {
    fn get(&self, field: &str) -> Option<Value>;
}
