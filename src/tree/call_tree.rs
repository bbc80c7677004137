//! Call tree construction, folding and sorting.
//!
//! Samples are merged into a tree rooted at a synthetic ROOT node. Each
//! sample's stack is walked leaf-first through the [`StackSource`], fold and
//! group outcomes are applied, and the surviving frames are replayed from
//! the root down, creating nodes on demand.

use super::node::{CallTreeNode, CallTreeNodeBase, NodeId};
use crate::source::{
    CallerIndex, FrameIndex, FrameResolution, GroupId, StackIndex, StackSource, StackSourceSample,
};
use crate::utils::config::ROOT_NAME;
use log::debug;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Node id of the synthetic root in every tree
pub const ROOT: NodeId = NodeId(0);

/// Tree construction settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallTreeConfig {
    /// Ignore samples outside `[start, end]`
    pub time_range: Option<(f64, f64)>,

    /// Ask the source for full frame names (module paths included)
    pub full_frame_names: bool,

    /// Fold nodes with an inclusive count at or below this once the source is drained
    pub fold_threshold: Option<f64>,
}

/// A frame collected during the leaf-to-root walk of one sample
#[derive(Debug, Clone, Copy)]
struct PendingFrame {
    frame: FrameIndex,
    group: Option<GroupId>,
    folded: u32,
}

/// Aggregated call tree
#[derive(Debug, Clone)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
    config: CallTreeConfig,
    frame_names: HashMap<FrameIndex, String>,
    pub(super) by_name: OnceCell<Vec<CallTreeNodeBase>>,
    samples_added: usize,
    samples_discarded: usize,
    scratch: Vec<PendingFrame>,
}

impl Default for CallTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CallTree {
    /// Empty tree, ready to be fed samples
    pub fn new() -> Self {
        Self::with_config(CallTreeConfig::default())
    }

    pub fn with_config(config: CallTreeConfig) -> Self {
        let root = CallTreeNode::new(CallTreeNodeBase::new(ROOT_NAME, None), None);
        Self {
            nodes: vec![root],
            config,
            frame_names: HashMap::new(),
            by_name: OnceCell::new(),
            samples_added: 0,
            samples_discarded: 0,
            scratch: Vec::new(),
        }
    }

    /// Build a tree from every remaining sample of `source`
    pub fn from_source<S: StackSource + ?Sized>(source: &mut S) -> Self {
        Self::from_source_with_config(source, CallTreeConfig::default())
    }

    /// Build a tree from every remaining sample of `source`, then apply the
    /// configured fold threshold
    ///
    /// # Arguments
    /// * `source` - Stack source to drain; filtering sources work the same way
    /// * `config` - Time range, frame name form and optional fold threshold
    ///
    /// # Returns
    /// The finished tree. Samples outside the time range or with a `Discard`
    /// outcome are counted in [`CallTree::discarded_samples`].
    ///
    /// # Example
    /// ```
    /// use calltree_studio::source::InMemoryStackSource;
    /// use calltree_studio::tree::{CallTree, CallTreeConfig};
    ///
    /// let mut source = InMemoryStackSource::new();
    /// source.add_path_sample(&["main", "work"], 2.0, 0.0);
    /// source.add_path_sample(&["main", "idle"], 1.0, 1.0);
    ///
    /// let config = CallTreeConfig {
    ///     fold_threshold: Some(1.0),
    ///     ..CallTreeConfig::default()
    /// };
    /// let tree = CallTree::from_source_with_config(&mut source, config);
    /// assert_eq!(tree.find_path(&["main"]).unwrap().exclusive_metric, 3.0);
    /// ```
    pub fn from_source_with_config<S: StackSource + ?Sized>(
        source: &mut S,
        config: CallTreeConfig,
    ) -> Self {
        let fold_threshold = config.fold_threshold;
        let mut tree = Self::with_config(config);
        tree.add_samples(source);

        if let Some(threshold) = fold_threshold {
            let folded = tree.fold_nodes_under_or_equal(threshold);
            debug!("Folded {} nodes with inclusive count <= {}", folded, threshold);
        }

        debug!(
            "Built call tree: {} samples, {} discarded, {} nodes",
            tree.samples_added,
            tree.samples_discarded,
            tree.node_count()
        );
        tree
    }

    /// Drain `source` into the tree, returning how many samples were recorded
    pub fn add_samples<S: StackSource + ?Sized>(&mut self, source: &mut S) -> usize {
        let mut recorded = 0;
        while let Some(sample) = source.next_sample() {
            if self.add_sample(&*source, &sample) {
                recorded += 1;
            }
        }
        recorded
    }

    /// Merge one sample into the tree.
    ///
    /// Returns `false` if the sample was discarded (outside the time range,
    /// or a `Discard` outcome anywhere on its stack). Discarded samples
    /// leave every node untouched.
    ///
    /// # Panics
    /// If `source` does not know the sample's stack.
    pub fn add_sample<S: StackSource + ?Sized>(
        &mut self,
        source: &S,
        sample: &StackSourceSample,
    ) -> bool {
        if let Some((start, end)) = self.config.time_range {
            if sample.time_rel_msec < start || sample.time_rel_msec > end {
                self.samples_discarded += 1;
                return false;
            }
        }

        let mut frames = std::mem::take(&mut self.scratch);
        frames.clear();
        let kept = collect_frames(source, sample.stack_index, &mut frames);
        if kept {
            self.record(source, &frames, sample);
            self.samples_added += 1;
            self.by_name.take();
        } else {
            self.samples_discarded += 1;
        }
        self.scratch = frames;
        kept
    }

    /// Replay collected frames from the root down to the leaf
    fn record<S: StackSource + ?Sized>(
        &mut self,
        source: &S,
        frames: &[PendingFrame],
        sample: &StackSourceSample,
    ) {
        let metric = sample.metric;
        let time = sample.time_rel_msec;

        let mut current = ROOT;
        let root = &mut self.nodes[ROOT.0].base;
        root.add_inclusive(metric, 1.0);
        root.widen_time(time, time);

        for pending in frames.iter().rev() {
            current = self.find_callee(source, current, pending.frame);
            let node = &mut self.nodes[current.0];
            node.base.add_inclusive(metric, 1.0);
            node.base.widen_time(time, time);
            node.note_folded_frames(pending.folded);
        }

        let leaf = &mut self.nodes[current.0].base;
        leaf.add_exclusive(metric, 1.0);
        leaf.debug_check();
    }

    /// Child of `parent` aggregating `frame`, created on first use
    fn find_callee<S: StackSource + ?Sized>(
        &mut self,
        source: &S,
        parent: NodeId,
        frame: FrameIndex,
    ) -> NodeId {
        let existing = self.nodes[parent.0]
            .callees
            .iter()
            .copied()
            .find(|callee| self.nodes[callee.0].base.id == Some(frame));
        if let Some(callee) = existing {
            return callee;
        }

        let full_path = self.config.full_frame_names;
        let name = self
            .frame_names
            .entry(frame)
            .or_insert_with(|| source.frame_name(frame, full_path))
            .clone();

        let id = NodeId(self.nodes.len());
        self.nodes
            .push(CallTreeNode::new(CallTreeNodeBase::new(name, Some(frame)), Some(parent)));
        self.nodes[parent.0].callees.push(id);
        id
    }

    /// Merge every node whose inclusive count is at or below `threshold` into
    /// its caller's exclusive metrics.
    ///
    /// The root is never removed. Ids of removed nodes must not be used
    /// afterwards.
    ///
    /// # Arguments
    /// * `threshold` - Largest inclusive count that still gets folded
    ///
    /// # Returns
    /// Number of nodes removed, descendants of removed nodes included
    ///
    /// # Example
    /// ```
    /// use calltree_studio::source::InMemoryStackSource;
    /// use calltree_studio::tree::CallTree;
    ///
    /// let mut source = InMemoryStackSource::new();
    /// source.add_path_sample(&["main", "rare", "leaf"], 1.0, 0.0);
    /// source.add_path_sample(&["main"], 1.0, 1.0);
    /// let mut tree = CallTree::from_source(&mut source);
    ///
    /// assert_eq!(tree.fold_nodes_under_or_equal(1.0), 2);
    /// assert_eq!(tree.top().inclusive_metric, 2.0);
    /// ```
    pub fn fold_nodes_under_or_equal(&mut self, threshold: f64) -> usize {
        let folded = self.fold_under(ROOT, threshold);
        self.by_name.take();
        folded
    }

    fn fold_under(&mut self, id: NodeId, threshold: f64) -> usize {
        let callees = std::mem::take(&mut self.nodes[id.0].callees);
        let mut kept = Vec::with_capacity(callees.len());
        let mut folded = 0;

        for callee in callees {
            let (metric, count) = {
                let base = &self.nodes[callee.0].base;
                (base.inclusive_metric, base.inclusive_count)
            };
            // Counts never grow towards the leaves, so the whole subtree goes
            if count <= threshold {
                folded += self.subtree_size(callee);
                self.nodes[id.0].base.add_exclusive(metric, count);
            } else {
                folded += self.fold_under(callee, threshold);
                kept.push(callee);
            }
        }

        self.nodes[id.0].callees = kept;
        self.nodes[id.0].base.debug_check();
        folded
    }

    fn subtree_size(&self, id: NodeId) -> usize {
        let mut size = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            size += 1;
            stack.extend_from_slice(&self.nodes[next.0].callees);
        }
        size
    }

    /// Sort every callee list with `compare`
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&CallTreeNodeBase, &CallTreeNodeBase) -> Ordering,
    {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let mut callees = std::mem::take(&mut self.nodes[id.0].callees);
            callees.sort_by(|a, b| compare(&self.nodes[a.0].base, &self.nodes[b.0].base));
            stack.extend_from_slice(&callees);
            self.nodes[id.0].callees = callees;
        }
    }

    /// Heaviest callees first, earliest first among equals
    pub fn sort_descending_by_inclusive_metric(&mut self) {
        self.sort_by(compare_inclusive_descending);
    }

    /// The synthetic root node
    pub fn top(&self) -> &CallTreeNode {
        &self.nodes[ROOT.0]
    }

    pub fn top_id(&self) -> NodeId {
        ROOT
    }

    /// # Panics
    /// If `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &CallTreeNode {
        match self.nodes.get(id.0) {
            Some(node) => node,
            None => panic!("node {} does not belong to this tree", id.0),
        }
    }

    /// Children of `id` in their current order
    pub fn callees(&self, id: NodeId) -> impl Iterator<Item = &CallTreeNode> + '_ {
        self.node(id).callees.iter().map(move |c| &self.nodes[c.0])
    }

    pub fn caller(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.node(id).caller.map(|c| &self.nodes[c.0])
    }

    /// First child of `id` with display name `name`
    pub fn find_callee_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .callees
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].base.name == name)
    }

    /// Follow `names` from the root, outermost caller first
    pub fn find_path(&self, names: &[&str]) -> Option<&CallTreeNode> {
        let mut current = ROOT;
        for name in names {
            current = self.find_callee_by_name(current, name)?;
        }
        Some(self.node(current))
    }

    /// Number of nodes reachable from the root, root included
    pub fn node_count(&self) -> usize {
        self.subtree_size(ROOT)
    }

    /// Samples merged into the tree so far
    pub fn total_samples(&self) -> usize {
        self.samples_added
    }

    /// Samples dropped by the time range or by `Discard` outcomes
    pub fn discarded_samples(&self) -> usize {
        self.samples_discarded
    }

    pub fn config(&self) -> &CallTreeConfig {
        &self.config
    }

    pub(crate) fn nodes(&self) -> &[CallTreeNode] {
        &self.nodes
    }
}

/// Ordering used by [`CallTree::sort_descending_by_inclusive_metric`]
pub fn compare_inclusive_descending(a: &CallTreeNodeBase, b: &CallTreeNodeBase) -> Ordering {
    b.inclusive_metric
        .total_cmp(&a.inclusive_metric)
        .then_with(|| a.first_time_rel_msec.total_cmp(&b.first_time_rel_msec))
}

/// Walk one stack from the leaf to the top, collecting the frames to emit in
/// leaf-to-root order. Returns `false` if the sample must be discarded.
fn collect_frames<S: StackSource + ?Sized>(
    source: &S,
    leaf: StackIndex,
    frames: &mut Vec<PendingFrame>,
) -> bool {
    let mut pending_fold = 0u32;
    let mut positions = 0u32;
    let mut stack = leaf;

    loop {
        positions += 1;
        match source.frame_index(stack) {
            FrameResolution::Discard => return false,
            FrameResolution::Fold => pending_fold += 1,
            FrameResolution::FoldAll => {
                frames.clear();
                pending_fold = positions;
            }
            FrameResolution::Frame(frame) => emit_frame(frames, frame, &mut pending_fold),
            FrameResolution::GroupInternal { frame, group } => {
                emit_group_frame(frames, frame, group, &mut pending_fold)
            }
            FrameResolution::GroupInternalAll { frame, group } => {
                frames.clear();
                pending_fold = positions - 1;
                emit_group_frame(frames, frame, group, &mut pending_fold);
            }
        }

        match source.caller_index(stack) {
            CallerIndex::Caller(caller) => stack = caller,
            CallerIndex::Invalid => return true,
            CallerIndex::Discard => return false,
        }
    }
}

/// Emit `frame`, collapsing direct recursion into the previous slot
fn emit_frame(frames: &mut Vec<PendingFrame>, frame: FrameIndex, pending_fold: &mut u32) {
    if let Some(last) = frames.last_mut() {
        if last.frame == frame && last.group.is_none() {
            last.folded += 1 + *pending_fold;
            *pending_fold = 0;
            return;
        }
    }
    frames.push(PendingFrame {
        frame,
        group: None,
        folded: *pending_fold,
    });
    *pending_fold = 0;
}

/// Emit a group member; consecutive members of one group share a slot whose
/// frame moves to the outermost member seen
fn emit_group_frame(
    frames: &mut Vec<PendingFrame>,
    frame: FrameIndex,
    group: GroupId,
    pending_fold: &mut u32,
) {
    if let Some(last) = frames.last_mut() {
        if last.group == Some(group) {
            last.frame = frame;
            last.folded += 1 + *pending_fold;
            *pending_fold = 0;
            return;
        }
    }
    frames.push(PendingFrame {
        frame,
        group: Some(group),
        folded: *pending_fold,
    });
    *pending_fold = 0;
}
