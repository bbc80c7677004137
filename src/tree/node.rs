//! Call tree node types.
//!
//! Nodes live in an arena owned by [`crate::tree::CallTree`] and refer to
//! each other through [`NodeId`]s: one caller index up, a callee list down.

use crate::source::FrameIndex;
use crate::utils::config::METRIC_EPSILON;
use std::ops::Deref;

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Metrics of one aggregation point.
///
/// Used for tree nodes as well as for by-name and caller/callee summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct CallTreeNodeBase {
    /// Display name
    pub name: String,

    /// Frame the node aggregates (`None` for synthetic nodes such as ROOT)
    pub id: Option<FrameIndex>,

    /// Metric of every sample at or beneath this node
    pub inclusive_metric: f64,

    /// Metric of samples whose leaf is this node
    pub exclusive_metric: f64,

    /// Number of samples at or beneath this node (fractional in recursion splits)
    pub inclusive_count: f64,

    /// Number of samples whose leaf is this node
    pub exclusive_count: f64,

    /// Earliest sample time seen (`+inf` until a sample is recorded)
    pub first_time_rel_msec: f64,

    /// Latest sample time seen (`-inf` until a sample is recorded)
    pub last_time_rel_msec: f64,
}

impl CallTreeNodeBase {
    pub fn new(name: impl Into<String>, id: Option<FrameIndex>) -> Self {
        Self {
            name: name.into(),
            id,
            inclusive_metric: 0.0,
            exclusive_metric: 0.0,
            inclusive_count: 0.0,
            exclusive_count: 0.0,
            first_time_rel_msec: f64::INFINITY,
            last_time_rel_msec: f64::NEG_INFINITY,
        }
    }

    /// True once any sample has touched this node
    pub fn has_samples(&self) -> bool {
        self.first_time_rel_msec <= self.last_time_rel_msec
    }

    /// Time between the first and last sample, 0 without samples
    pub fn duration_msec(&self) -> f64 {
        if self.has_samples() {
            self.last_time_rel_msec - self.first_time_rel_msec
        } else {
            0.0
        }
    }

    pub(crate) fn widen_time(&mut self, first: f64, last: f64) {
        if first < self.first_time_rel_msec {
            self.first_time_rel_msec = first;
        }
        if last > self.last_time_rel_msec {
            self.last_time_rel_msec = last;
        }
    }

    pub(crate) fn add_inclusive(&mut self, metric: f64, count: f64) {
        self.inclusive_metric += metric;
        self.inclusive_count += count;
    }

    pub(crate) fn add_exclusive(&mut self, metric: f64, count: f64) {
        self.exclusive_metric += metric;
        self.exclusive_count += count;
    }

    /// Add another node's inclusive and exclusive metrics to this one
    pub(crate) fn absorb(&mut self, other: &CallTreeNodeBase) {
        self.add_inclusive(other.inclusive_metric, other.inclusive_count);
        self.add_exclusive(other.exclusive_metric, other.exclusive_count);
        self.widen_time(other.first_time_rel_msec, other.last_time_rel_msec);
    }

    pub(crate) fn debug_check(&self) {
        let slack = METRIC_EPSILON * self.inclusive_metric.abs().max(1.0);
        debug_assert!(
            self.inclusive_metric + slack >= self.exclusive_metric,
            "{}: inclusive metric {} below exclusive {}",
            self.name,
            self.inclusive_metric,
            self.exclusive_metric
        );
        debug_assert!(
            !self.has_samples() || self.first_time_rel_msec <= self.last_time_rel_msec,
            "{}: first time after last time",
            self.name
        );
    }
}

/// A node of the call tree: one call-stack position.
#[derive(Debug, Clone)]
pub struct CallTreeNode {
    pub(crate) base: CallTreeNodeBase,
    pub(crate) caller: Option<NodeId>,
    pub(crate) callees: Vec<NodeId>,
    pub(crate) min_folded_frames: u32,
    pub(crate) max_folded_frames: u32,
}

impl CallTreeNode {
    pub(crate) fn new(base: CallTreeNodeBase, caller: Option<NodeId>) -> Self {
        Self {
            base,
            caller,
            callees: Vec::new(),
            min_folded_frames: u32::MAX,
            max_folded_frames: 0,
        }
    }

    pub fn base(&self) -> &CallTreeNodeBase {
        &self.base
    }

    /// Parent node, `None` for the root
    pub fn caller(&self) -> Option<NodeId> {
        self.caller
    }

    /// Child nodes in their current order
    pub fn callees(&self) -> &[NodeId] {
        &self.callees
    }

    pub fn has_callees(&self) -> bool {
        !self.callees.is_empty()
    }

    /// Fewest frames folded into this node by any sample (0 if none recorded)
    pub fn min_folded_frames(&self) -> u32 {
        if self.min_folded_frames == u32::MAX {
            0
        } else {
            self.min_folded_frames
        }
    }

    /// Most frames folded into this node by any sample
    pub fn max_folded_frames(&self) -> u32 {
        self.max_folded_frames
    }

    pub(crate) fn note_folded_frames(&mut self, folded: u32) {
        self.min_folded_frames = self.min_folded_frames.min(folded);
        self.max_folded_frames = self.max_folded_frames.max(folded);
    }
}

impl Deref for CallTreeNode {
    type Target = CallTreeNodeBase;

    fn deref(&self) -> &CallTreeNodeBase {
        &self.base
    }
}
