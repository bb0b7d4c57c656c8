use crate::collection::MemdexCollection;
use crate::common::{Record, Value};
use crate::errors::{ErrorKind, MemdexError, MemdexResult};
use crate::index::{AttributeIndex, HashIndex, IndexParams, InvertedIndex, RangeIndex};
use crate::optimizer::{Chain, IndexRegistry};
use crate::parser::{ParserProvider, PredicateParser};
use crate::plan::{Planner, PlannerProvider};
use std::collections::HashMap;
use std::rc::Rc;

/// Configures and builds a [`MemdexCollection`].
///
/// Indexes are declaration-ordered and that order is significant: the
/// optimizer probes indexes on an attribute first to last and takes the
/// first match. Several indexes on the same attribute are allowed.
pub struct CollectionBuilder<T: Record> {
    indexes: Vec<Box<dyn AttributeIndex>>,
    attrs: HashMap<String, Box<dyn Fn(&T) -> Value>>,
    parser: Box<dyn ParserProvider>,
    planner: Box<dyn PlannerProvider>,
    optimizer: Chain,
}

impl<T: Record> CollectionBuilder<T> {
    pub fn new() -> Self {
        CollectionBuilder {
            indexes: Vec::new(),
            attrs: HashMap::new(),
            parser: Box::new(PredicateParser),
            planner: Box::new(Planner),
            optimizer: Chain::default(),
        }
    }

    /// Adds a hash-equality index.
    pub fn hash_index<P: Into<IndexParams>>(self, params: P) -> Self {
        self.index(Box::new(HashIndex::new(params)))
    }

    /// Adds an ordered range index.
    pub fn range_index<P: Into<IndexParams>>(self, params: P) -> Self {
        self.index(Box::new(RangeIndex::new(params)))
    }

    /// Adds an inverted index over a collection-valued attribute.
    pub fn inverted_index<P: Into<IndexParams>>(self, params: P) -> Self {
        self.index(Box::new(InvertedIndex::new(params)))
    }

    /// Adds a pre-built (possibly user-defined) index.
    pub fn index(mut self, index: Box<dyn AttributeIndex>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Registers a computed attribute. The name must begin with a back-tick
    /// and is how both indexes and predicates refer to it.
    pub fn computed<F: Fn(&T) -> Value + 'static>(mut self, name: &str, f: F) -> Self {
        self.attrs.insert(name.to_string(), Box::new(f));
        self
    }

    /// Replaces the predicate-string parser.
    pub fn parser<P: ParserProvider + 'static>(mut self, parser: P) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Replaces the planner.
    pub fn planner<P: PlannerProvider + 'static>(mut self, planner: P) -> Self {
        self.planner = Box::new(planner);
        self
    }

    /// Replaces the optimizer rule chain.
    pub fn optimizer(mut self, optimizer: Chain) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Validates the configuration and builds an empty collection.
    pub fn build(mut self) -> MemdexResult<MemdexCollection<T>> {
        for name in self.attrs.keys() {
            if !name.starts_with('`') {
                log::error!(
                    "Computed attribute \"{}\" must have a back-tick name",
                    name
                );
                return Err(MemdexError::new(
                    &format!("Computed attribute \"{}\" must have a back-tick name", name),
                    ErrorKind::ValidationError,
                ));
            }
        }

        let mut by_name = IndexRegistry::new();
        let mut memory_slots = HashMap::new();
        let mut mem_count = 0;
        for (slot, index) in self.indexes.iter_mut().enumerate() {
            let params = index.params();
            let name = params.name().to_string();
            if params.is_computed() && !self.attrs.contains_key(&name) {
                log::error!("Index \"{}\" has no computed-attribute function", name);
                return Err(MemdexError::new(
                    &format!("Index \"{}\" has no computed-attribute function", name),
                    ErrorKind::ValidationError,
                ));
            }
            let mem_slot = if params.memorize() {
                let next = mem_count;
                mem_count += 1;
                Some(next)
            } else {
                None
            };
            index.attach(slot, mem_slot);
            by_name.entry(name.clone()).or_default().push(slot);
            if let Some(mem_slot) = mem_slot {
                memory_slots.entry(name).or_insert(mem_slot);
            }
        }

        Ok(MemdexCollection::from_parts(
            self.indexes,
            by_name,
            memory_slots,
            mem_count,
            self.attrs,
            self.parser,
            self.planner,
            self.optimizer,
        ))
    }

    /// Builds the collection and fills it from an object iterator.
    pub fn build_from<I: IntoIterator<Item = Rc<T>>>(
        self,
        objects: I,
    ) -> MemdexResult<MemdexCollection<T>> {
        let mut collection = self.build()?;
        collection.update(objects)?;
        Ok(collection)
    }
}

impl<T: Record> Default for CollectionBuilder<T> {
    fn default() -> Self {
        CollectionBuilder::new()
    }
}
