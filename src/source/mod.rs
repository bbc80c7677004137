//! Sample providers consumed by the call-tree builder.
//!
//! A [`StackSource`] yields samples and lets the consumer walk each sample's
//! stack from the leaf towards the root. Stacks and frames are opaque
//! indices; only the source knows how to turn them into callers and names.
//!
//! Concrete providers:
//! - [`InMemoryStackSource`] - interned stacks built in memory (tests, loaders)
//! - [`crate::filter::FilterStackSource`] - decorator applying frame filters

pub mod collapsed;
pub mod memory;

pub use collapsed::{load_collapsed, parse_collapsed};
pub use memory::InMemoryStackSource;

use std::fmt;

/// Handle identifying one complete call stack (leaf frame plus all callers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackIndex(pub u32);

/// Handle identifying one logical frame (method, module, synthetic group...).
///
/// Names are a function of the frame index: two stacks with the same frame
/// index always display the same name. Distinct indices may share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIndex(pub u32);

/// Identity of a frame group produced by group patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u32);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl StackIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl FrameIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Result of asking a source for the caller of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerIndex {
    /// The stack continues with this caller stack.
    Caller(StackIndex),
    /// Top of the stack reached; there is no caller.
    Invalid,
    /// The whole sample must be dropped.
    Discard,
}

/// How a single stack position should be treated by the aggregation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResolution {
    /// A concrete frame to emit.
    Frame(FrameIndex),
    /// Drop the whole sample.
    Discard,
    /// Fold this frame into its caller.
    Fold,
    /// Fold this frame and everything beneath it into its caller.
    FoldAll,
    /// Member of an entry group: `frame` is the visible boundary frame and
    /// consecutive members of `group` fold into it.
    GroupInternal { frame: FrameIndex, group: GroupId },
    /// Like [`FrameResolution::GroupInternal`], but everything beneath the
    /// group folds into it as well.
    GroupInternalAll { frame: FrameIndex, group: GroupId },
}

/// One observed stack sample.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSourceSample {
    /// Leaf of the sampled call stack
    pub stack_index: StackIndex,

    /// Weight of the sample (1.0 for plain sampling)
    pub metric: f64,

    /// Time of the sample relative to the start of the trace
    pub time_rel_msec: f64,

    /// Owning process
    pub process_id: u32,

    /// Sampled thread
    pub thread_id: u32,

    /// Owning process name
    pub process_name: String,
}

impl StackSourceSample {
    /// Create a sample with default weight on process/thread 0
    pub fn new(stack_index: StackIndex, time_rel_msec: f64) -> Self {
        Self {
            stack_index,
            metric: 1.0,
            time_rel_msec,
            process_id: 0,
            thread_id: 0,
            process_name: String::new(),
        }
    }

    pub fn with_metric(mut self, metric: f64) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_thread(mut self, process_id: u32, thread_id: u32) -> Self {
        self.process_id = process_id;
        self.thread_id = thread_id;
        self
    }

    pub fn with_process_name(mut self, process_name: impl Into<String>) -> Self {
        self.process_name = process_name.into();
        self
    }
}

/// Provider of stack samples.
///
/// `next_sample` drives the stream; the remaining methods are pure lookups
/// and may be called any number of times for any stack handed out so far.
/// Handing out a stack or frame index the source does not know is a contract
/// violation and implementations panic on it.
pub trait StackSource {
    /// Next sample of the stream, `None` once exhausted.
    fn next_sample(&mut self) -> Option<StackSourceSample>;

    /// Caller of `stack`.
    fn caller_index(&self, stack: StackIndex) -> CallerIndex;

    /// Frame at the leaf position of `stack`.
    fn frame_index(&self, stack: StackIndex) -> FrameResolution;

    /// Display name of a frame.
    fn frame_name(&self, frame: FrameIndex, full_path: bool) -> String;

    /// Exclusive upper bound of stack indices handed out so far.
    fn max_call_stack_index(&self) -> usize;

    /// Exclusive upper bound of frame indices handed out so far.
    fn max_call_frame_index(&self) -> usize;
}

impl<S: StackSource + ?Sized> StackSource for &mut S {
    fn next_sample(&mut self) -> Option<StackSourceSample> {
        (**self).next_sample()
    }

    fn caller_index(&self, stack: StackIndex) -> CallerIndex {
        (**self).caller_index(stack)
    }

    fn frame_index(&self, stack: StackIndex) -> FrameResolution {
        (**self).frame_index(stack)
    }

    fn frame_name(&self, frame: FrameIndex, full_path: bool) -> String {
        (**self).frame_name(frame, full_path)
    }

    fn max_call_stack_index(&self) -> usize {
        (**self).max_call_stack_index()
    }

    fn max_call_frame_index(&self) -> usize {
        (**self).max_call_frame_index()
    }
}
