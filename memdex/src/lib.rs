//! # Memdex - In-Memory Indexed Collection
//!
//! Memdex stores arbitrary application objects in memory and answers
//! boolean predicate queries (equality, range, membership, logical
//! combinations) faster than a linear scan by maintaining secondary
//! indexes.
//!
//! ## Key Features
//!
//! - **Mini-database surface**: add/discard/refresh objects, compile a
//!   predicate into a plan, optimize it against the available indexes,
//!   execute it to get the matching row-ids
//! - **Three index flavours**: hash-equality, ordered range, and inverted
//!   indexes over collection-valued attributes
//! - **Rule-based optimizer**: scans become index accesses, nested set
//!   operations merge, overlapping ranges combine
//! - **Adaptive result sets**: row-id sets change physical representation
//!   with size, from a sentinel through a small array to a hash set
//! - **Predicate strings or fluent builders**: `"a >= 0 AND b = 59"` or
//!   `attr("a").ge(0).and(attr("b").eq(59))`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use memdex::{doc, Document, MemdexCollection};
//! use std::rc::Rc;
//!
//! # fn main() -> memdex::MemdexResult<()> {
//! let mut books = MemdexCollection::<Document>::builder()
//!     .range_index("year")
//!     .hash_index("author")
//!     .inverted_index("tags")
//!     .build()?;
//!
//! books.add(Rc::new(doc! {
//!     "year": 1979,
//!     "author": "Hofstadter",
//!     "tags": ["logic", "music"]
//! }))?;
//!
//! let ids = books.filter("year >= 1970 AND 'logic' IN tags")?;
//! for book in books.objects(&ids) {
//!     println!("{:?}", book);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! A collection is single-threaded by design: objects are shared through
//! `Rc`, every mutation takes `&mut self`, and queries run synchronously to
//! completion. Run the collection on a worker thread if you need to detach
//! from long scans.
//!
//! ## Module Organization
//!
//! - [`collection`] - The collection, its builder, boxes and projections
//! - [`common`] - Values, adaptive row-id sets, records, sort orders
//! - [`condition`] - Condition IR and fluent builders
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Hash, range and inverted indexes
//! - [`optimizer`] - Rule-based plan rewriting
//! - [`parser`] - The SQL-ish predicate-string parser
//! - [`plan`] - Plan IR and the planner

pub mod collection;
pub mod common;
pub mod condition;
pub mod errors;
mod executor;
pub mod index;
pub mod optimizer;
pub mod parser;
pub mod plan;

pub use collection::{CollectionBuilder, IntoCondition, MemdexCollection, RecordBox};
pub use common::{Document, Record, RowId, RowSet, SortOrder, Value};
pub use condition::{all_of, any_of, attr, lit, BinaryOp, Condition, UnaryOp};
pub use errors::{ErrorKind, MemdexError, MemdexResult};
pub use index::{AttributeIndex, HashIndex, IndexParams, InvertedIndex, KeyType, RangeIndex};
pub use optimizer::{Chain, CombineFilters, CombineRanges, MergeSetOps, PlanContext, Rule, UseIndex};
pub use parser::{ParserProvider, PredicateParser};
pub use plan::{Bound, IndexHandle, IndexKind, Plan, Planner, PlannerProvider, Range};
