//! Caller/callee view of one focus name.
//!
//! Every tree node named like the focus is an occurrence. A sample that sits
//! beneath `n` occurrences on its path is split `1/n` between them, so the
//! occurrences together account for it exactly once. Each occurrence passes
//! its share to the name of its direct caller, and each of its direct callees
//! passes the share of samples beneath it to that callee's name.
//!
//! Exclusive mass of a focus node with `n` occurrences on its path is
//! credited `1/n` to each of them, so the focus exclusive is the full
//! exclusive mass of every focus node.
//!
//! Resulting balances:
//! - focus inclusive = sum of caller inclusives (unless the focus is the root)
//! - focus exclusive = sum of caller exclusives
//! - focus inclusive = sum of callee inclusives + focus exclusive, for a
//!   focus that never calls itself

use super::call_tree::CallTree;
use super::node::{CallTreeNodeBase, NodeId};
use std::collections::HashMap;
use std::ops::Deref;

/// Caller and callee summaries of every occurrence of one name
#[derive(Debug, Clone)]
pub struct CallerCalleeNode {
    base: CallTreeNodeBase,
    callers: Vec<CallTreeNodeBase>,
    callees: Vec<CallTreeNodeBase>,
}

/// Split metrics of one subtree.
///
/// `exclusive_*` is the node's own split exclusive mass. `focus_exclusive_*`
/// sums, over every focus node in the subtree, its exclusive mass divided by
/// the number of focus occurrences on its path; each of those occurrences is
/// credited that amount once.
#[derive(Debug, Clone, Copy, Default)]
struct Share {
    inclusive_metric: f64,
    inclusive_count: f64,
    exclusive_metric: f64,
    exclusive_count: f64,
    focus_exclusive_metric: f64,
    focus_exclusive_count: f64,
}

impl Share {
    /// The part of this share an occurrence passes to its caller entry
    fn occurrence(&self) -> Share {
        Share {
            exclusive_metric: self.focus_exclusive_metric,
            exclusive_count: self.focus_exclusive_count,
            ..*self
        }
    }
}

/// Summaries keyed by display name, in first-seen order
#[derive(Debug, Default)]
struct NameSums {
    slots: HashMap<String, usize>,
    sums: Vec<CallTreeNodeBase>,
}

impl NameSums {
    fn add(&mut self, name: &str, template: &CallTreeNodeBase, share: Share, first: f64, last: f64) {
        let slot = match self.slots.get(name) {
            Some(&slot) => slot,
            None => {
                self.sums.push(CallTreeNodeBase::new(name, template.id));
                self.slots.insert(name.to_string(), self.sums.len() - 1);
                self.sums.len() - 1
            }
        };
        let sum = &mut self.sums[slot];
        sum.add_inclusive(share.inclusive_metric, share.inclusive_count);
        sum.add_exclusive(share.exclusive_metric, share.exclusive_count);
        sum.widen_time(first, last);
    }

    fn into_sorted(self) -> Vec<CallTreeNodeBase> {
        let mut sums = self.sums;
        sums.sort_by(|a, b| {
            b.inclusive_metric
                .total_cmp(&a.inclusive_metric)
                .then_with(|| a.name.cmp(&b.name))
        });
        sums
    }
}

struct Accumulator<'a> {
    tree: &'a CallTree,
    focus: &'a str,
    base: CallTreeNodeBase,
    callers: NameSums,
    callees: NameSums,
}

impl Accumulator<'_> {
    /// Visit `id` with `recursion` focus occurrences above it; returns its split share
    fn visit(&mut self, id: NodeId, recursion: u32) -> Share {
        let tree = self.tree;
        let node = tree.node(id);
        let is_focus = node.name == self.focus;
        let recursion = recursion + u32::from(is_focus);

        let mut share = Share::default();
        if recursion > 0 {
            let weight = 1.0 / f64::from(recursion);
            share.exclusive_metric = node.exclusive_metric * weight;
            share.exclusive_count = node.exclusive_count * weight;
            share.inclusive_metric = share.exclusive_metric;
            share.inclusive_count = share.exclusive_count;
            if is_focus {
                share.focus_exclusive_metric = share.exclusive_metric;
                share.focus_exclusive_count = share.exclusive_count;
            }
        }

        let mut callee_shares = Vec::new();
        for &callee in node.callees() {
            let callee_share = self.visit(callee, recursion);
            share.inclusive_metric += callee_share.inclusive_metric;
            share.inclusive_count += callee_share.inclusive_count;
            share.focus_exclusive_metric += callee_share.focus_exclusive_metric;
            share.focus_exclusive_count += callee_share.focus_exclusive_count;
            if is_focus {
                callee_shares.push((callee, callee_share));
            }
        }

        if is_focus {
            let occurrence = share.occurrence();
            if self.base.id.is_none() {
                self.base.id = node.id;
            }
            self.base.add_inclusive(occurrence.inclusive_metric, occurrence.inclusive_count);
            self.base.add_exclusive(occurrence.exclusive_metric, occurrence.exclusive_count);
            self.base.widen_time(node.first_time_rel_msec, node.last_time_rel_msec);

            if let Some(caller) = tree.caller(id) {
                self.callers.add(
                    &caller.name,
                    caller,
                    occurrence,
                    node.first_time_rel_msec,
                    node.last_time_rel_msec,
                );
            }

            for (callee, callee_share) in callee_shares {
                let callee = tree.node(callee);
                self.callees.add(
                    &callee.name,
                    callee,
                    callee_share,
                    callee.first_time_rel_msec,
                    callee.last_time_rel_msec,
                );
            }
        }

        share
    }
}

impl CallerCalleeNode {
    /// Build the view of `name` over the whole tree.
    ///
    /// A name that never occurs yields an empty view.
    pub fn new(tree: &CallTree, name: &str) -> Self {
        let mut acc = Accumulator {
            tree,
            focus: name,
            base: CallTreeNodeBase::new(name, None),
            callers: NameSums::default(),
            callees: NameSums::default(),
        };
        acc.visit(tree.top_id(), 0);
        acc.base.debug_check();

        Self {
            base: acc.base,
            callers: acc.callers.into_sorted(),
            callees: acc.callees.into_sorted(),
        }
    }

    pub fn base(&self) -> &CallTreeNodeBase {
        &self.base
    }

    /// Direct callers of the focus, heaviest first
    pub fn callers(&self) -> &[CallTreeNodeBase] {
        &self.callers
    }

    /// Direct callees of the focus, heaviest first
    pub fn callees(&self) -> &[CallTreeNodeBase] {
        &self.callees
    }
}

impl Deref for CallerCalleeNode {
    type Target = CallTreeNodeBase;

    fn deref(&self) -> &CallTreeNodeBase {
        &self.base
    }
}

impl CallTree {
    /// Caller/callee view of `name`
    pub fn caller_callee(&self, name: &str) -> CallerCalleeNode {
        CallerCalleeNode::new(self, name)
    }
}
