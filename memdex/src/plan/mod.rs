//! Plan IR: the tagged tree the planner produces, the optimizer rewrites
//! and the executor interprets.

use crate::common::Value;
use crate::condition::{BinaryOp, Condition};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Write};

/// The flavour of an index, used for plan rendering and rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hash,
    Range,
    Inverted,
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Hash => write!(f, "HashIndex"),
            IndexKind::Range => write!(f, "RangeIndex"),
            IndexKind::Inverted => write!(f, "InvertedIndex"),
        }
    }
}

/// A lightweight reference to an index inside a plan node.
///
/// `slot` is the index's position in the collection's declaration order and
/// identifies it for rule grouping; `kind` and `name` make a plan render
/// standalone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub slot: usize,
    pub kind: IndexKind,
    pub name: String,
}

impl Display for IndexHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind, self.name)
    }
}

/// One end of a [`Range`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: Value) -> Self {
        Bound {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: Value) -> Self {
        Bound {
            value,
            inclusive: false,
        }
    }

    fn symbol(&self) -> &'static str {
        if self.inclusive {
            "<="
        } else {
            "<"
        }
    }
}

/// A half- or fully-bounded key range over an ordered index. An unset side
/// is unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub left: Option<Bound>,
    pub right: Option<Bound>,
}

impl Range {
    pub fn at_least(value: Value) -> Self {
        Range {
            left: Some(Bound::inclusive(value)),
            right: None,
        }
    }

    pub fn greater_than(value: Value) -> Self {
        Range {
            left: Some(Bound::exclusive(value)),
            right: None,
        }
    }

    pub fn at_most(value: Value) -> Self {
        Range {
            left: None,
            right: Some(Bound::inclusive(value)),
        }
    }

    pub fn less_than(value: Value) -> Self {
        Range {
            left: None,
            right: Some(Bound::exclusive(value)),
        }
    }

    /// Builds the range a comparison selects, e.g. `Lt` → `(-inf, value)`.
    pub fn for_comparison(op: BinaryOp, value: Value) -> Option<Self> {
        match op {
            BinaryOp::Lt => Some(Range::less_than(value)),
            BinaryOp::Le => Some(Range::at_most(value)),
            BinaryOp::Gt => Some(Range::greater_than(value)),
            BinaryOp::Ge => Some(Range::at_least(value)),
            _ => None,
        }
    }

    /// Intersects two ranges: each side keeps the tighter bound, with
    /// inclusive-AND on equal values. Returns `None` when the intersection
    /// is empty (left past right, or meeting on an exclusive bound).
    pub fn combine(&self, other: &Range) -> Option<Range> {
        let left = Self::combine_bounds(self.left.as_ref(), other.left.as_ref(), Ordering::Greater);
        let right = Self::combine_bounds(self.right.as_ref(), other.right.as_ref(), Ordering::Less);

        if let (Some(l), Some(r)) = (&left, &right) {
            let empty = if l.inclusive && r.inclusive {
                l.value > r.value
            } else {
                l.value >= r.value
            };
            if empty {
                return None;
            }
        }

        Some(Range { left, right })
    }

    fn combine_bounds(a: Option<&Bound>, b: Option<&Bound>, prefer: Ordering) -> Option<Bound> {
        match (a, b) {
            (None, b) => b.cloned(),
            (a, None) => a.cloned(),
            (Some(a), Some(b)) => {
                if a.value == b.value {
                    Some(Bound {
                        value: a.value.clone(),
                        inclusive: a.inclusive && b.inclusive,
                    })
                } else if a.value.cmp(&b.value) == prefer {
                    Some(a.clone())
                } else {
                    Some(b.clone())
                }
            }
        }
    }
}

/// A query plan node. Describes how to produce a row-id set.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Always-empty result.
    Empty,
    /// Iterate every row-id, keeping those satisfying the condition.
    ScanFilter(Condition),
    /// Evaluate `input`, keeping rows satisfying the condition.
    Filter {
        condition: Condition,
        input: Box<Plan>,
    },
    /// Intersection of all inputs.
    Intersect(Vec<Plan>),
    /// Union of all inputs.
    Union(Vec<Plan>),
    /// First input minus all other inputs.
    Difference(Vec<Plan>),
    /// Equality probe into an index.
    IndexLookup { index: IndexHandle, value: Value },
    /// Ordered range scan over an index.
    IndexRange { index: IndexHandle, range: Range },
}

impl Plan {
    /// Recursively rewrites this plan bottom-up: children are transformed
    /// first, then `f` is applied to the rebuilt node.
    pub fn transform<F: FnMut(Plan) -> Plan>(self, f: &mut F) -> Plan {
        let node = match self {
            Plan::Filter { condition, input } => Plan::Filter {
                condition,
                input: Box::new(input.transform(f)),
            },
            Plan::Intersect(inputs) => {
                Plan::Intersect(inputs.into_iter().map(|p| p.transform(f)).collect())
            }
            Plan::Union(inputs) => {
                Plan::Union(inputs.into_iter().map(|p| p.transform(f)).collect())
            }
            Plan::Difference(inputs) => {
                Plan::Difference(inputs.into_iter().map(|p| p.transform(f)).collect())
            }
            leaf => leaf,
        };
        f(node)
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match self {
            Plan::Empty => out.push_str("Empty"),
            Plan::ScanFilter(condition) => {
                let _ = write!(out, "ScanFilter: {}", condition);
            }
            Plan::Filter { condition, input } => {
                let _ = write!(out, "Filter: {}\n{}  - ", condition, indent);
                input.render(depth + 1, out);
            }
            Plan::Intersect(inputs) => Self::render_set_op("Intersect", inputs, depth, out),
            Plan::Union(inputs) => Self::render_set_op("Union", inputs, depth, out),
            Plan::Difference(inputs) => Self::render_set_op("Difference", inputs, depth, out),
            Plan::IndexLookup { index, value } => {
                let _ = write!(out, "IndexLookup: {} = {}", index, value);
            }
            Plan::IndexRange { index, range } => {
                let _ = match (&range.left, &range.right) {
                    (Some(left), Some(right)) => write!(
                        out,
                        "IndexRange: {} {} {} {} {}",
                        left.value,
                        left.symbol(),
                        index,
                        right.symbol(),
                        right.value
                    ),
                    (Some(left), None) => {
                        write!(out, "IndexRange: {} {} {}", left.value, left.symbol(), index)
                    }
                    (None, Some(right)) => {
                        write!(out, "IndexRange: {} {} {}", index, right.symbol(), right.value)
                    }
                    (None, None) => write!(out, "IndexRange: {}", index),
                };
            }
        }
    }

    fn render_set_op(name: &str, inputs: &[Plan], depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        out.push_str(name);
        for input in inputs {
            let _ = write!(out, "\n{}  - ", indent);
            input.render(depth + 1, out);
        }
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        self.render(0, &mut out);
        write!(f, "{}", out)
    }
}

/// Lowers a condition tree into an initial query plan.
pub trait PlannerProvider {
    fn plan(&self, condition: &Condition) -> Plan;
}

/// The default planner. Lowering is syntactic and local: conjunctions become
/// intersections, disjunctions become unions, and every other condition —
/// including `NOT` — stays inside a [`Plan::ScanFilter`] for the optimizer
/// to specialise.
#[derive(Debug, Clone, Default)]
pub struct Planner;

impl PlannerProvider for Planner {
    fn plan(&self, condition: &Condition) -> Plan {
        if let Condition::Binary { op, left, right } = condition {
            match op {
                BinaryOp::And => {
                    return Plan::Intersect(vec![self.plan(left), self.plan(right)]);
                }
                BinaryOp::Or => {
                    return Plan::Union(vec![self.plan(left), self.plan(right)]);
                }
                _ => {}
            }
        }
        Plan::ScanFilter(condition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::attr;

    fn handle(slot: usize, kind: IndexKind, name: &str) -> IndexHandle {
        IndexHandle {
            slot,
            kind,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_planner_lowers_and_to_intersect() {
        let cond = attr("a").eq(0).and(attr("b").eq(1));
        let plan = Planner.plan(&cond);
        assert_eq!(
            plan,
            Plan::Intersect(vec![
                Plan::ScanFilter(attr("a").eq(0)),
                Plan::ScanFilter(attr("b").eq(1)),
            ])
        );
    }

    #[test]
    fn test_planner_keeps_not_in_scan_filter() {
        let cond = attr("a").eq(0).not();
        let plan = Planner.plan(&cond);
        assert_eq!(plan, Plan::ScanFilter(attr("a").eq(0).not()));
    }

    #[test]
    fn test_render_nested_set_ops() {
        let plan = Plan::Intersect(vec![
            Plan::IndexLookup {
                index: handle(0, IndexKind::Hash, "a"),
                value: Value::I64(1),
            },
            Plan::IndexRange {
                index: handle(1, IndexKind::Range, "b"),
                range: Range {
                    left: Some(Bound::inclusive(Value::I64(0))),
                    right: Some(Bound::exclusive(Value::I64(10))),
                },
            },
        ]);
        assert_eq!(
            plan.to_string(),
            "Intersect\n  - IndexLookup: HashIndex(a) = 1\n  - IndexRange: 0 <= RangeIndex(b) < 10"
        );
    }

    #[test]
    fn test_render_half_open_range() {
        let plan = Plan::IndexRange {
            index: handle(0, IndexKind::Range, "a"),
            range: Range::less_than(Value::I64(5)),
        };
        assert_eq!(plan.to_string(), "IndexRange: RangeIndex(a) < 5");

        let plan = Plan::IndexRange {
            index: handle(0, IndexKind::Range, "a"),
            range: Range::at_least(Value::I64(2)),
        };
        assert_eq!(plan.to_string(), "IndexRange: 2 <= RangeIndex(a)");
    }

    #[test]
    fn test_combine_overlapping_ranges() {
        let a = Range::at_least(Value::I64(0));
        let b = Range::less_than(Value::I64(2));
        let combined = a.combine(&b).expect("ranges overlap");
        assert_eq!(combined.left, Some(Bound::inclusive(Value::I64(0))));
        assert_eq!(combined.right, Some(Bound::exclusive(Value::I64(2))));
    }

    #[test]
    fn test_combine_picks_tighter_bounds() {
        let a = Range {
            left: Some(Bound::inclusive(Value::I64(0))),
            right: Some(Bound::inclusive(Value::I64(10))),
        };
        let b = Range {
            left: Some(Bound::exclusive(Value::I64(0))),
            right: Some(Bound::inclusive(Value::I64(8))),
        };
        let combined = a.combine(&b).expect("ranges overlap");
        // equal left values: inclusive only if both are inclusive
        assert_eq!(combined.left, Some(Bound::exclusive(Value::I64(0))));
        assert_eq!(combined.right, Some(Bound::inclusive(Value::I64(8))));
    }

    #[test]
    fn test_combine_disjoint_ranges_is_empty() {
        let a = Range::at_least(Value::I64(2));
        let b = Range::less_than(Value::I64(1));
        assert!(a.combine(&b).is_none());

        // touching on an exclusive bound is empty too
        let a = Range::at_least(Value::I64(1));
        let b = Range::less_than(Value::I64(1));
        assert!(a.combine(&b).is_none());

        // touching on two inclusive bounds is the single-point range
        let a = Range::at_least(Value::I64(1));
        let b = Range::at_most(Value::I64(1));
        assert!(a.combine(&b).is_some());
    }

    #[test]
    fn test_transform_rewrites_bottom_up() {
        let plan = Plan::Intersect(vec![
            Plan::Intersect(vec![Plan::Empty, Plan::Empty]),
            Plan::Empty,
        ]);
        let mut seen = Vec::new();
        plan.transform(&mut |p| {
            seen.push(match &p {
                Plan::Empty => "empty",
                Plan::Intersect(_) => "intersect",
                _ => "other",
            });
            p
        });
        // children visited before parents
        assert_eq!(
            seen,
            vec!["empty", "empty", "intersect", "empty", "intersect"]
        );
    }
}
