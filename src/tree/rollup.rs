//! Sum-by-name rollup.
//!
//! Every distinct display name gets one summary node. Exclusive metrics are
//! always added; inclusive metrics only for the outermost occurrence of a
//! name on each root-to-leaf path, so recursive chains are not counted twice.
//! The root itself is not part of the rollup.

use super::call_tree::{compare_inclusive_descending, CallTree, ROOT};
use super::node::{CallTreeNodeBase, NodeId};
use std::collections::{HashMap, HashSet};

struct NameRollup<'a> {
    tree: &'a CallTree,
    slots: HashMap<&'a str, usize>,
    summaries: Vec<CallTreeNodeBase>,
    open: HashSet<usize>,
}

impl<'a> NameRollup<'a> {
    fn new(tree: &'a CallTree) -> Self {
        Self {
            tree,
            slots: HashMap::new(),
            summaries: Vec::new(),
            open: HashSet::new(),
        }
    }

    fn visit(&mut self, id: NodeId) {
        let node = &self.tree.nodes()[id.index()];
        let slot = match self.slots.get(node.name.as_str()) {
            Some(&slot) => slot,
            None => {
                self.summaries.push(CallTreeNodeBase::new(node.name.clone(), node.id));
                let slot = self.summaries.len() - 1;
                self.slots.insert(node.name.as_str(), slot);
                slot
            }
        };

        let outermost = self.open.insert(slot);
        let summary = &mut self.summaries[slot];
        if outermost {
            summary.add_inclusive(node.inclusive_metric, node.inclusive_count);
        }
        summary.add_exclusive(node.exclusive_metric, node.exclusive_count);
        summary.widen_time(node.first_time_rel_msec, node.last_time_rel_msec);

        for &callee in node.callees() {
            self.visit(callee);
        }

        if outermost {
            self.open.remove(&slot);
        }
    }
}

impl CallTree {
    /// One summary per distinct name, in first-visit order.
    ///
    /// Computed on first use and cached until the tree changes shape.
    pub fn by_name(&self) -> &[CallTreeNodeBase] {
        self.by_name.get_or_init(|| {
            let mut rollup = NameRollup::new(self);
            for &callee in self.node(ROOT).callees() {
                rollup.visit(callee);
            }
            rollup.summaries
        })
    }

    /// By-name summaries, largest exclusive metric first
    pub fn by_name_sorted_by_exclusive(&self) -> Vec<CallTreeNodeBase> {
        let mut summaries = self.by_name().to_vec();
        summaries.sort_by(|a, b| {
            b.exclusive_metric
                .total_cmp(&a.exclusive_metric)
                .then_with(|| compare_inclusive_descending(a, b))
        });
        summaries
    }

    /// By-name summaries, largest inclusive metric first
    pub fn by_name_sorted_by_inclusive(&self) -> Vec<CallTreeNodeBase> {
        let mut summaries = self.by_name().to_vec();
        summaries.sort_by(compare_inclusive_descending);
        summaries
    }
}
