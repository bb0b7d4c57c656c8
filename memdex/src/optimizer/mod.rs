//! Rule-based plan optimizer: an ordered chain of transformer rules, each
//! walking the plan tree bottom-up and rewriting nodes in place.

use crate::condition::{all_of, Condition};
use crate::index::AttributeIndex;
use crate::plan::{IndexHandle, Plan, Range};
use indexmap::IndexMap;
use itertools::{Either, Itertools};
use smallvec::SmallVec;

/// Declaration-ordered mapping from attribute name to the slots of the
/// indexes bound to it.
pub(crate) type IndexRegistry = IndexMap<String, SmallVec<[usize; 2]>>;

/// Read-only view of a collection's indexes, handed to optimizer rules.
pub struct PlanContext<'a> {
    indexes: &'a [Box<dyn AttributeIndex>],
    by_name: &'a IndexRegistry,
}

impl<'a> PlanContext<'a> {
    pub(crate) fn new(indexes: &'a [Box<dyn AttributeIndex>], by_name: &'a IndexRegistry) -> Self {
        PlanContext { indexes, by_name }
    }

    /// The indexes bound to `name`, in declaration order.
    pub fn indexes_for(&self, name: &str) -> impl Iterator<Item = &dyn AttributeIndex> + '_ {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|slot| self.indexes[*slot].as_ref())
    }
}

/// An optimizer rule: a plan-to-plan rewrite.
pub trait Rule {
    fn apply(&self, plan: Plan, ctx: &PlanContext<'_>) -> Plan;
}

/// Merges nested set operations of the same kind into a single n-ary node.
///
/// Union and intersection splice freely by associativity. A nested
/// difference splices only as the first child, where `(a - b) - c` and
/// `a - b - c` agree.
pub struct MergeSetOps;

impl MergeSetOps {
    fn splice(inputs: Vec<Plan>, matches: fn(&Plan) -> bool) -> Vec<Plan> {
        let mut merged = Vec::with_capacity(inputs.len());
        for input in inputs {
            if matches(&input) {
                match input {
                    Plan::Intersect(nested) | Plan::Union(nested) | Plan::Difference(nested) => {
                        merged.extend(nested);
                    }
                    other => merged.push(other),
                }
            } else {
                merged.push(input);
            }
        }
        merged
    }

    fn rewrite(plan: Plan) -> Plan {
        match plan {
            Plan::Intersect(inputs) => {
                Plan::Intersect(Self::splice(inputs, |p| matches!(p, Plan::Intersect(_))))
            }
            Plan::Union(inputs) => {
                Plan::Union(Self::splice(inputs, |p| matches!(p, Plan::Union(_))))
            }
            Plan::Difference(inputs) => {
                let mut iter = inputs.into_iter();
                match iter.next() {
                    Some(Plan::Difference(mut nested)) => {
                        nested.extend(iter);
                        Plan::Difference(nested)
                    }
                    Some(first) => {
                        let mut rebuilt = vec![first];
                        rebuilt.extend(iter);
                        Plan::Difference(rebuilt)
                    }
                    None => Plan::Difference(Vec::new()),
                }
            }
            other => other,
        }
    }
}

impl Rule for MergeSetOps {
    fn apply(&self, plan: Plan, _ctx: &PlanContext<'_>) -> Plan {
        plan.transform(&mut Self::rewrite)
    }
}

/// Replaces scans with index accesses.
///
/// For `ScanFilter` over a binary condition with an attribute on exactly one
/// side, every index bound to that attribute is probed in declaration order;
/// the first that matches supplies the replacement plan.
pub struct UseIndex;

impl UseIndex {
    fn rewrite(plan: Plan, ctx: &PlanContext<'_>) -> Plan {
        let condition = match &plan {
            Plan::ScanFilter(condition) => condition,
            _ => return plan,
        };
        if let Condition::Binary { op, left, right } = condition {
            let (name, operand, attr_on_left) = match (left.as_ref(), right.as_ref()) {
                (Condition::Attribute(name), other) if !matches!(other, Condition::Attribute(_)) => {
                    (name, other, true)
                }
                (other, Condition::Attribute(name)) if !matches!(other, Condition::Attribute(_)) => {
                    (name, other, false)
                }
                _ => return plan,
            };
            for index in ctx.indexes_for(name) {
                if let Some(replacement) = index.match_condition(*op, operand, attr_on_left) {
                    log::debug!("Index {} serves condition {}", index.handle(), condition);
                    return replacement;
                }
            }
        }
        plan
    }
}

impl Rule for UseIndex {
    fn apply(&self, plan: Plan, ctx: &PlanContext<'_>) -> Plan {
        plan.transform(&mut |p| Self::rewrite(p, ctx))
    }
}

/// Combines multiple range scans over the same index inside an intersection
/// into one. A provably empty combined range collapses the whole
/// intersection to [`Plan::Empty`]; a lone surviving child replaces the
/// intersection entirely.
pub struct CombineRanges;

impl CombineRanges {
    fn rewrite(plan: Plan) -> Plan {
        let inputs = match plan {
            Plan::Intersect(inputs) => inputs,
            other => return other,
        };

        let mut by_index: IndexMap<usize, (IndexHandle, Vec<Range>)> = IndexMap::new();
        let mut others = Vec::new();
        for input in inputs {
            match input {
                Plan::IndexRange { index, range } => {
                    by_index
                        .entry(index.slot)
                        .or_insert_with(|| (index, Vec::new()))
                        .1
                        .push(range);
                }
                other => others.push(other),
            }
        }

        let mut merged = Vec::with_capacity(by_index.len() + others.len());
        for (_, (index, ranges)) in by_index {
            let mut ranges = ranges.into_iter();
            let mut combined = match ranges.next() {
                Some(first) => first,
                None => continue,
            };
            for range in ranges {
                match combined.combine(&range) {
                    // an always-false range voids the whole intersection
                    None => return Plan::Empty,
                    Some(next) => combined = next,
                }
            }
            merged.push(Plan::IndexRange {
                index,
                range: combined,
            });
        }
        merged.extend(others);

        if merged.len() == 1 {
            match merged.pop() {
                Some(only) => only,
                None => Plan::Empty,
            }
        } else {
            Plan::Intersect(merged)
        }
    }
}

impl Rule for CombineRanges {
    fn apply(&self, plan: Plan, _ctx: &PlanContext<'_>) -> Plan {
        plan.transform(&mut Self::rewrite)
    }
}

/// Folds all scan-filters inside an intersection into a single condition:
/// `Filter` over the remaining children, or one `ScanFilter` when nothing
/// else remains.
pub struct CombineFilters;

impl CombineFilters {
    fn rewrite(plan: Plan) -> Plan {
        let inputs = match plan {
            Plan::Intersect(inputs) => inputs,
            other => return other,
        };

        let (filters, mut others): (Vec<Condition>, Vec<Plan>) =
            inputs.into_iter().partition_map(|input| match input {
                Plan::ScanFilter(condition) => Either::Left(condition),
                other => Either::Right(other),
            });

        if filters.is_empty() {
            return Plan::Intersect(others);
        }

        let combined = all_of(filters);
        if others.is_empty() {
            Plan::ScanFilter(combined)
        } else {
            let input = if others.len() == 1 {
                match others.pop() {
                    Some(only) => only,
                    None => return Plan::ScanFilter(combined),
                }
            } else {
                Plan::Intersect(others)
            };
            Plan::Filter {
                condition: combined,
                input: Box::new(input),
            }
        }
    }
}

impl Rule for CombineFilters {
    fn apply(&self, plan: Plan, _ctx: &PlanContext<'_>) -> Plan {
        plan.transform(&mut Self::rewrite)
    }
}

/// An ordered chain of rules.
///
/// The default order matters: ranges are combined before filters so the
/// filter pass cannot swallow range predicates that are still waiting to be
/// merged.
pub struct Chain {
    rules: Vec<Box<dyn Rule>>,
}

impl Chain {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Chain { rules }
    }

    pub fn apply(&self, mut plan: Plan, ctx: &PlanContext<'_>) -> Plan {
        for rule in &self.rules {
            plan = rule.apply(plan, ctx);
        }
        plan
    }
}

impl Default for Chain {
    fn default() -> Self {
        Chain::new(vec![
            Box::new(MergeSetOps),
            Box::new(UseIndex),
            Box::new(CombineRanges),
            Box::new(CombineFilters),
        ])
    }
}
