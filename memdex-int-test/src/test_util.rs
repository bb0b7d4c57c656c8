use memdex::{doc, Document, MemdexCollection, MemdexResult, Record, RowId, RowSet, Value};
use std::cell::Cell;
use std::rc::Rc;

/// Row-ids of a result set, ascending, for order-insensitive assertions.
pub fn ids_sorted(set: &RowSet) -> Vec<RowId> {
    let mut ids: Vec<RowId> = set.iter().collect();
    ids.sort_unstable();
    ids
}

/// The canonical fixture of the end-to-end scenarios: four objects over
/// attributes `a` and `b`, with range indexes on both.
pub fn scenario_collection() -> MemdexResult<(MemdexCollection<Document>, Vec<Rc<Document>>)> {
    let objects = vec![
        Rc::new(doc! { "a": 0, "b": 59 }),
        Rc::new(doc! { "a": 1, "b": 59 }),
        Rc::new(doc! { "a": 2, "b": 59 }),
        Rc::new(doc! { "a": 0, "b": 7 }),
    ];
    let collection = MemdexCollection::builder()
        .range_index("a")
        .range_index("b")
        .build_from(objects.iter().cloned())?;
    Ok((collection, objects))
}

/// A record with interior mutability, for refresh tests: `a` can change
/// after the object has been indexed.
pub struct MutableItem {
    pub a: Cell<i64>,
    pub b: i64,
}

impl MutableItem {
    pub fn new(a: i64, b: i64) -> Rc<Self> {
        Rc::new(MutableItem { a: Cell::new(a), b })
    }
}

impl Record for MutableItem {
    fn get(&self, field: &str) -> Option<Value> {
        match field {
            "a" => Some(Value::I64(self.a.get())),
            "b" => Some(Value::I64(self.b)),
            _ => None,
        }
    }
}
