//! The collection: owns objects and indexes, assigns row-ids, memorises
//! per-object index values, and ties planning, optimization and execution
//! together.

mod builder;

pub use builder::CollectionBuilder;

use crate::common::{Record, RowId, RowSet, SortOrder, Value};
use crate::condition::Condition;
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::executor::{self, ExecSource};
use crate::index::AttributeIndex;
use crate::optimizer::{Chain, IndexRegistry, PlanContext};
use crate::parser::ParserProvider;
use crate::plan::{Plan, PlannerProvider};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

type ComputedAttrs<T> = HashMap<String, Box<dyn Fn(&T) -> Value>>;

/// Wrapper around a stored object: the object itself, its primary key
/// (equal to its row-id), and the memorised index values in a fixed order.
pub struct RecordBox<T> {
    obj: Rc<T>,
    pk: RowId,
    index_mem: Vec<Value>,
}

impl<T> RecordBox<T> {
    pub fn object(&self) -> &Rc<T> {
        &self.obj
    }

    pub fn pk(&self) -> RowId {
        self.pk
    }

    /// The memorised index-value tuple, one entry per memorising index.
    pub fn index_memory(&self) -> &[Value] {
        &self.index_mem
    }
}

/// A query argument: either a pre-built [`Condition`] tree or a predicate
/// string handed to the collection's parser.
pub trait IntoCondition {
    fn into_condition(self, parser: &dyn ParserProvider) -> MemdexResult<Condition>;
}

impl IntoCondition for Condition {
    fn into_condition(self, _parser: &dyn ParserProvider) -> MemdexResult<Condition> {
        Ok(self)
    }
}

impl IntoCondition for &Condition {
    fn into_condition(self, _parser: &dyn ParserProvider) -> MemdexResult<Condition> {
        Ok(self.clone())
    }
}

impl IntoCondition for &str {
    fn into_condition(self, parser: &dyn ParserProvider) -> MemdexResult<Condition> {
        parser.parse(self)
    }
}

/// An in-memory indexed collection.
///
/// Stores `Rc<T>` objects, identified by pointer identity, and answers
/// predicate queries through its secondary indexes:
///
/// ```rust,ignore
/// let mut people = MemdexCollection::<Document>::builder()
///     .range_index("age")
///     .hash_index("city")
///     .build()?;
/// people.add(Rc::new(doc! { "age": 30, "city": "Oslo" }))?;
/// let ids = people.filter("age >= 18 AND city = 'Oslo'")?;
/// ```
///
/// The collection is single-threaded by contract: it holds `Rc` references
/// and takes `&mut self` for every mutation. Queries run synchronously to
/// completion.
pub struct MemdexCollection<T: Record> {
    boxes: BTreeMap<RowId, RecordBox<T>>,
    identity: HashMap<*const T, RowId>,
    indexes: Vec<Box<dyn AttributeIndex>>,
    by_name: IndexRegistry,
    /// attribute name -> memory slot of the first memorising index on it
    memory_slots: HashMap<String, usize>,
    mem_count: usize,
    attrs: ComputedAttrs<T>,
    parser: Box<dyn ParserProvider>,
    planner: Box<dyn PlannerProvider>,
    optimizer: Chain,
    /// never decremented, not even by `clear`, so the default iteration
    /// order stays reproducible across the collection's lifetime
    rowid_counter: RowId,
}

impl<T: Record> std::fmt::Debug for MemdexCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemdexCollection")
            .field("len", &self.boxes.len())
            .field("indexes", &self.indexes.len())
            .finish()
    }
}

impl<T: Record> MemdexCollection<T> {
    pub fn builder() -> CollectionBuilder<T> {
        CollectionBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        indexes: Vec<Box<dyn AttributeIndex>>,
        by_name: IndexRegistry,
        memory_slots: HashMap<String, usize>,
        mem_count: usize,
        attrs: ComputedAttrs<T>,
        parser: Box<dyn ParserProvider>,
        planner: Box<dyn PlannerProvider>,
        optimizer: Chain,
    ) -> Self {
        MemdexCollection {
            boxes: BTreeMap::new(),
            identity: HashMap::new(),
            indexes,
            by_name,
            memory_slots,
            mem_count,
            attrs,
            parser,
            planner,
            optimizer,
            rowid_counter: 0,
        }
    }

    fn read_value(attrs: &ComputedAttrs<T>, obj: &T, name: &str) -> MemdexResult<Value> {
        if name.starts_with('`') {
            match attrs.get(name) {
                Some(f) => Ok(f(obj)),
                None => {
                    log::error!("Unknown computed attribute \"{}\"", name);
                    Err(MemdexError::new(
                        &format!("Unknown computed attribute \"{}\"", name),
                        ErrorKind::ValidationError,
                    ))
                }
            }
        } else {
            Ok(obj.get(name).unwrap_or(Value::Null))
        }
    }

    /// Adds an object. Adding an object that is already present is a no-op.
    ///
    /// Index updates are two-phase: every index first validates the value it
    /// would store, and only when all of them accept does any index mutate.
    /// A failed constraint therefore leaves the collection untouched.
    pub fn add(&mut self, obj: Rc<T>) -> MemdexResult<()> {
        let key = Rc::as_ptr(&obj);
        if self.identity.contains_key(&key) {
            return Ok(());
        }

        let mut vals = Vec::with_capacity(self.indexes.len());
        for index in &self.indexes {
            let mut read = |name: &str| Self::read_value(&self.attrs, obj.as_ref(), name);
            vals.push(index.make_val(&mut read)?);
        }
        for (index, val) in self.indexes.iter().zip(&vals) {
            index.validate(val)?;
        }

        let pk = self.rowid_counter;
        for (index, val) in self.indexes.iter_mut().zip(&vals) {
            index.apply_add(pk, val)?;
        }

        let mut index_mem = vec![Value::Null; self.mem_count];
        for (index, val) in self.indexes.iter().zip(vals) {
            if let Some(slot) = index.mem_slot() {
                index_mem[slot] = val;
            }
        }

        self.boxes.insert(pk, RecordBox { obj, pk, index_mem });
        self.identity.insert(key, pk);
        self.rowid_counter += 1;
        Ok(())
    }

    /// Removes an object. Removing an absent object is a no-op.
    ///
    /// Memorising indexes are cleaned up from the remembered values, so the
    /// object's attributes are not re-read even if they have changed since
    /// the last add/refresh.
    pub fn discard(&mut self, obj: &Rc<T>) -> MemdexResult<()> {
        let key = Rc::as_ptr(obj);
        let pk = match self.identity.remove(&key) {
            None => return Ok(()),
            Some(pk) => pk,
        };
        let boxed = match self.boxes.remove(&pk) {
            Some(boxed) => boxed,
            None => {
                return Err(MemdexError::new(
                    &format!("Row {} has no storage entry", pk),
                    ErrorKind::InternalError,
                ))
            }
        };

        for index in self.indexes.iter_mut() {
            match index.mem_slot() {
                Some(slot) => index.apply_discard(pk, &boxed.index_mem[slot]),
                None => {
                    let mut read =
                        |name: &str| Self::read_value(&self.attrs, boxed.obj.as_ref(), name);
                    let val = index.make_val(&mut read)?;
                    index.apply_discard(pk, &val);
                }
            }
        }
        Ok(())
    }

    /// Re-indexes an object after its attributes changed in place.
    ///
    /// Every memorising index compares the freshly computed value against
    /// the remembered one and is updated only on a difference; the
    /// remembered tuple is replaced with the new values. Non-memorising
    /// indexes assume their value never changes and are skipped.
    pub fn refresh(&mut self, obj: &Rc<T>) -> MemdexResult<()> {
        let key = Rc::as_ptr(obj);
        let pk = match self.identity.get(&key) {
            Some(pk) => *pk,
            None => {
                log::error!("Cannot refresh an object that is not in the collection");
                return Err(MemdexError::new(
                    "Item not found",
                    ErrorKind::NotFound,
                ));
            }
        };
        let boxed = match self.boxes.get(&pk) {
            Some(boxed) => boxed,
            None => {
                return Err(MemdexError::new(
                    &format!("Row {} has no storage entry", pk),
                    ErrorKind::InternalError,
                ))
            }
        };

        // (index slot, memory slot, old value, new value)
        let mut changes: Vec<(usize, usize, Value, Value)> = Vec::new();
        for (slot, index) in self.indexes.iter().enumerate() {
            let mem_slot = match index.mem_slot() {
                Some(mem_slot) => mem_slot,
                None => continue,
            };
            let mut read = |name: &str| Self::read_value(&self.attrs, boxed.obj.as_ref(), name);
            let new_val = index.make_val(&mut read)?;
            let old_val = &boxed.index_mem[mem_slot];
            if new_val != *old_val {
                changes.push((slot, mem_slot, old_val.clone(), new_val));
            }
        }
        if changes.is_empty() {
            return Ok(());
        }

        for (slot, _, old, new) in &changes {
            self.indexes[*slot].validate_refresh(old, new)?;
        }
        for (slot, _, old, new) in &changes {
            self.indexes[*slot].apply_refresh(pk, old, new)?;
        }
        if let Some(boxed) = self.boxes.get_mut(&pk) {
            for (_, mem_slot, _, new) in changes {
                boxed.index_mem[mem_slot] = new;
            }
        }
        Ok(())
    }

    pub fn contains(&self, obj: &Rc<T>) -> bool {
        self.identity.contains_key(&Rc::as_ptr(obj))
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Iterates objects in row-id order: the order they were added, every
    /// time.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.boxes.values().map(|boxed| &boxed.obj)
    }

    /// Adds every object of an iterator.
    pub fn update<I: IntoIterator<Item = Rc<T>>>(&mut self, objects: I) -> MemdexResult<()> {
        for obj in objects {
            self.add(obj)?;
        }
        Ok(())
    }

    /// Removes every object and clears every index. The row-id counter is
    /// NOT reset; only re-construction starts it over.
    pub fn clear(&mut self) {
        for index in self.indexes.iter_mut() {
            index.clear();
        }
        self.boxes.clear();
        self.identity.clear();
    }

    /// The object stored under a row-id.
    pub fn get(&self, id: RowId) -> Option<&Rc<T>> {
        self.boxes.get(&id).map(|boxed| &boxed.obj)
    }

    /// The row-id of a stored object.
    pub fn row_id(&self, obj: &Rc<T>) -> Option<RowId> {
        self.identity.get(&Rc::as_ptr(obj)).copied()
    }

    /// Every row-id currently in the collection.
    pub fn row_ids(&self) -> RowSet {
        self.boxes.keys().copied().collect()
    }

    /// Lowers a condition into an unoptimized plan.
    pub fn plan(&self, condition: &Condition) -> Plan {
        self.planner.plan(condition)
    }

    /// Rewrites a plan against the available indexes.
    pub fn optimize(&self, plan: Plan) -> Plan {
        let ctx = PlanContext::new(&self.indexes, &self.by_name);
        self.optimizer.apply(plan, &ctx)
    }

    /// Executes a plan, yielding the matching row-ids.
    pub fn execute(&self, plan: &Plan) -> MemdexResult<RowSet> {
        executor::execute(plan, &CollectionSource { inner: self })
    }

    /// Plans, optimizes and executes in one step. Accepts a [`Condition`]
    /// or a predicate string.
    pub fn filter<Q: IntoCondition>(&self, query: Q) -> MemdexResult<RowSet> {
        let condition = query.into_condition(self.parser.as_ref())?;
        let plan = self.plan(&condition);
        let plan = self.optimize(plan);
        self.execute(&plan)
    }

    /// The objects behind a row-id set, in row-id order.
    pub fn objects<'a>(&'a self, ids: &'a RowSet) -> impl Iterator<Item = Rc<T>> + 'a {
        let mut sorted: Vec<RowId> = ids.iter().collect();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .filter_map(|id| self.boxes.get(&id).map(|boxed| boxed.obj.clone()))
    }

    pub fn list_objects(&self, ids: &RowSet) -> Vec<Rc<T>> {
        self.objects(ids).collect()
    }

    /// Stably orders row-ids by the given indexed attributes.
    ///
    /// Each attribute must carry at least one index; the value compared is
    /// the memorised one when the index memorises, recomputed otherwise.
    /// Ties break on the row-id — descending when the last ordering entry
    /// is descending, ascending otherwise (and always ascending for an
    /// empty ordering).
    pub fn sort_ids(
        &self,
        ids: &RowSet,
        ordering: &[(&str, SortOrder)],
    ) -> MemdexResult<Vec<RowId>> {
        let mut slots = Vec::with_capacity(ordering.len());
        for (name, _) in ordering {
            let slot = self
                .by_name
                .get(*name)
                .and_then(|indexed| indexed.first())
                .copied()
                .ok_or_else(|| {
                    log::error!("Cannot sort by unindexed attribute \"{}\"", name);
                    MemdexError::new(
                        &format!("Cannot sort by unindexed attribute \"{}\"", name),
                        ErrorKind::ValidationError,
                    )
                })?;
            slots.push(slot);
        }

        let mut rows: Vec<(Vec<Value>, RowId)> = Vec::with_capacity(ids.len());
        for id in ids.iter() {
            let boxed = self.boxes.get(&id).ok_or_else(|| {
                MemdexError::new(
                    &format!("Row id {} is not in the collection", id),
                    ErrorKind::NotFound,
                )
            })?;
            let mut key = Vec::with_capacity(slots.len());
            for slot in &slots {
                let index = &self.indexes[*slot];
                let value = match index.mem_slot() {
                    Some(mem_slot) => boxed.index_mem[mem_slot].clone(),
                    None => {
                        let mut read =
                            |name: &str| Self::read_value(&self.attrs, boxed.obj.as_ref(), name);
                        index.make_val(&mut read)?
                    }
                };
                key.push(value);
            }
            rows.push((key, id));
        }

        let rowid_desc = ordering
            .last()
            .map(|(_, order)| order.is_descending())
            .unwrap_or(false);
        rows.sort_by(|(key_a, id_a), (key_b, id_b)| {
            for (i, (_, order)) in ordering.iter().enumerate() {
                let ord = key_a[i].cmp(&key_b[i]);
                if ord != Ordering::Equal {
                    return if order.is_descending() {
                        ord.reverse()
                    } else {
                        ord
                    };
                }
            }
            let ord = id_a.cmp(id_b);
            if rowid_desc {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(rows.into_iter().map(|(_, id)| id).collect())
    }

    /// [`MemdexCollection::sort_ids`] followed by object projection.
    pub fn sorted_objects(
        &self,
        ids: &RowSet,
        ordering: &[(&str, SortOrder)],
    ) -> MemdexResult<Vec<Rc<T>>> {
        let sorted = self.sort_ids(ids, ordering)?;
        Ok(sorted
            .into_iter()
            .filter_map(|id| self.boxes.get(&id).map(|boxed| boxed.obj.clone()))
            .collect())
    }

    /// The indexes in declaration order.
    pub fn indexes(&self) -> &[Box<dyn AttributeIndex>] {
        &self.indexes
    }

    /// The box stored for a row-id, exposing the memorised index values.
    pub fn record_box(&self, id: RowId) -> Option<&RecordBox<T>> {
        self.boxes.get(&id)
    }
}

/// The executor's read-only view of a collection.
struct CollectionSource<'a, T: Record> {
    inner: &'a MemdexCollection<T>,
}

impl<T: Record> ExecSource for CollectionSource<'_, T> {
    fn all_rows(&self) -> RowSet {
        self.inner.boxes.keys().copied().collect()
    }

    fn row_ids(&self) -> Box<dyn Iterator<Item = RowId> + '_> {
        Box::new(self.inner.boxes.keys().copied())
    }

    fn index(&self, slot: usize) -> Option<&dyn AttributeIndex> {
        self.inner.indexes.get(slot).map(|index| index.as_ref())
    }

    /// Attribute reads prefer the memorised value when the attribute is the
    /// key of a memorising index.
    fn read_attr(&self, id: RowId, name: &str) -> MemdexResult<Value> {
        let boxed = self.inner.boxes.get(&id).ok_or_else(|| {
            MemdexError::new(
                &format!("Row id {} is not in the collection", id),
                ErrorKind::NotFound,
            )
        })?;
        if let Some(mem_slot) = self.inner.memory_slots.get(name) {
            return Ok(boxed.index_mem[*mem_slot].clone());
        }
        MemdexCollection::read_value(&self.inner.attrs, boxed.obj.as_ref(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Document;
    use crate::doc;
    use crate::index::IndexParams;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    fn person(age: i64, city: &str) -> Rc<Document> {
        Rc::new(doc! { "age": age, "city": city })
    }

    fn collection() -> MemdexCollection<Document> {
        MemdexCollection::builder()
            .range_index("age")
            .hash_index("city")
            .build()
            .expect("builder should succeed")
    }

    #[test]
    fn test_add_contains_discard() {
        let mut coll = collection();
        let alice = person(30, "Oslo");
        coll.add(alice.clone()).unwrap();
        assert!(coll.contains(&alice));
        assert_eq!(coll.len(), 1);

        // adding the same object again is a no-op
        coll.add(alice.clone()).unwrap();
        assert_eq!(coll.len(), 1);

        coll.discard(&alice).unwrap();
        assert!(!coll.contains(&alice));
        assert_eq!(coll.len(), 0);

        // discarding an absent object is a no-op
        coll.discard(&alice).unwrap();
    }

    #[test]
    fn test_row_ids_are_monotonic_and_survive_clear() {
        let mut coll = collection();
        let a = person(1, "A");
        let b = person(2, "B");
        coll.add(a.clone()).unwrap();
        coll.add(b.clone()).unwrap();
        assert_eq!(coll.row_id(&a), Some(0));
        assert_eq!(coll.row_id(&b), Some(1));

        coll.clear();
        assert_eq!(coll.len(), 0);

        let c = person(3, "C");
        coll.add(c.clone()).unwrap();
        // the counter was not reset
        assert_eq!(coll.row_id(&c), Some(2));
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut coll = collection();
        let objs: Vec<_> = (0..5).map(|i| person(i, "X")).collect();
        for obj in &objs {
            coll.add(obj.clone()).unwrap();
        }
        let seen: Vec<_> = coll.iter().map(Rc::as_ptr).collect();
        let expected: Vec<_> = objs.iter().map(Rc::as_ptr).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_refresh_of_absent_object_fails() {
        let mut coll = collection();
        let err = coll.refresh(&person(1, "X")).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NotFound);
    }

    #[test]
    fn test_failed_unique_add_leaves_no_partial_state() {
        let mut coll: MemdexCollection<Document> = MemdexCollection::builder()
            .hash_index("a")
            .range_index(IndexParams::new("b").with_unique(true))
            .build()
            .unwrap();

        let first = Rc::new(doc! { "a": 1, "b": 7 });
        coll.add(first).unwrap();

        let clash = Rc::new(doc! { "a": 2, "b": 7 });
        let err = coll.add(clash.clone()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);

        assert!(!coll.contains(&clash));
        assert_eq!(coll.len(), 1);
        // the hash index on "a" must not have been touched by the failed add
        assert!(coll.filter("a = 2").unwrap().is_empty());
    }

    #[test]
    fn test_memory_backed_reads_after_refresh() {
        let mut coll = collection();
        let alice = person(30, "Oslo");
        coll.add(alice.clone()).unwrap();

        let id = coll.row_id(&alice).unwrap();
        assert_eq!(coll.record_box(id).unwrap().index_memory()[0], Value::I64(30));

        assert_eq!(coll.filter("age = 30").unwrap().len(), 1);
    }

    #[test]
    fn test_computed_attribute_roundtrip() {
        let mut coll: MemdexCollection<Document> = MemdexCollection::builder()
            .range_index("`double_age")
            .computed("`double_age", |doc: &Document| {
                let age = Record::get(doc, "age").and_then(|v| v.as_i64()).unwrap_or(0);
                Value::I64(age * 2)
            })
            .build()
            .unwrap();

        coll.add(person(21, "X")).unwrap();
        assert_eq!(coll.filter("`double_age = 42").unwrap().len(), 1);
        assert!(coll.filter("`double_age = 21").unwrap().is_empty());
    }

    #[test]
    fn test_sort_ids_tiebreaks_on_row_id() {
        let mut coll = collection();
        let objs: Vec<_> = [(2, "B"), (1, "A"), (2, "A"), (1, "B")]
            .iter()
            .map(|(age, city)| person(*age, city))
            .collect();
        for obj in &objs {
            coll.add(obj.clone()).unwrap();
        }
        let ids = coll.row_ids();

        let ascending = coll
            .sort_ids(&ids, &[("age", SortOrder::Ascending)])
            .unwrap();
        assert_eq!(ascending, vec![1, 3, 0, 2]);

        // descending last key flips the row-id tiebreak too
        let descending = coll
            .sort_ids(&ids, &[("age", SortOrder::Descending)])
            .unwrap();
        assert_eq!(descending, vec![2, 0, 3, 1]);

        // empty ordering: plain row-id order
        assert_eq!(coll.sort_ids(&ids, &[]).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sort_by_unindexed_attribute_fails() {
        let coll = collection();
        let err = coll
            .sort_ids(&RowSet::new(), &[("name", SortOrder::Ascending)])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
