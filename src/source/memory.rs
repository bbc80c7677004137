//! In-memory stack source.
//!
//! Frames and stacks are interned so that identical call paths share one
//! stack index, the way trace decoders hand them out.

use super::{CallerIndex, FrameIndex, FrameResolution, StackIndex, StackSource, StackSourceSample};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct StackEntry {
    frame: FrameIndex,
    caller: Option<StackIndex>,
}

/// Stack source backed by vectors of interned frames, stacks and samples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStackSource {
    frame_names: Vec<String>,
    frame_lookup: HashMap<String, FrameIndex>,
    stacks: Vec<StackEntry>,
    stack_lookup: HashMap<(Option<StackIndex>, FrameIndex), StackIndex>,
    overrides: HashMap<FrameIndex, FrameResolution>,
    samples: Vec<StackSourceSample>,
    cursor: usize,
}

impl InMemoryStackSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame index for `name`, creating it on first use
    pub fn intern_frame(&mut self, name: &str) -> FrameIndex {
        if let Some(&frame) = self.frame_lookup.get(name) {
            return frame;
        }
        let frame = self.add_frame(name);
        self.frame_lookup.insert(name.to_string(), frame);
        frame
    }

    /// Create a fresh frame index even if another frame already has `name`.
    pub fn add_frame(&mut self, name: &str) -> FrameIndex {
        let frame = FrameIndex(self.frame_names.len() as u32);
        self.frame_names.push(name.to_string());
        frame
    }

    /// Stack index for `frame` called from `caller` (`None` = outermost frame)
    pub fn intern_stack(&mut self, caller: Option<StackIndex>, frame: FrameIndex) -> StackIndex {
        assert!(
            frame.as_usize() < self.frame_names.len(),
            "unknown frame {frame} interned into a stack"
        );
        if let Some(&stack) = self.stack_lookup.get(&(caller, frame)) {
            return stack;
        }
        let stack = StackIndex(self.stacks.len() as u32);
        self.stacks.push(StackEntry { frame, caller });
        self.stack_lookup.insert((caller, frame), stack);
        stack
    }

    /// Intern a stack given its frames from the outermost caller to the leaf.
    ///
    /// Returns `None` for an empty frame list.
    pub fn intern_frames(&mut self, root_first: &[FrameIndex]) -> Option<StackIndex> {
        let mut stack = None;
        for &frame in root_first {
            stack = Some(self.intern_stack(stack, frame));
        }
        stack
    }

    /// Intern a stack given its frame names from the outermost caller to the leaf.
    ///
    /// # Panics
    /// If `root_first` is empty: every sample needs at least one frame.
    pub fn intern_path(&mut self, root_first: &[&str]) -> StackIndex {
        let frames: Vec<FrameIndex> = root_first.iter().map(|name| self.intern_frame(name)).collect();
        match self.intern_frames(&frames) {
            Some(stack) => stack,
            None => panic!("cannot intern an empty call stack"),
        }
    }

    /// Make `frame_index` report `resolution` instead of the plain frame.
    pub fn set_frame_resolution(&mut self, frame: FrameIndex, resolution: FrameResolution) {
        self.overrides.insert(frame, resolution);
    }

    pub fn push_sample(&mut self, sample: StackSourceSample) {
        self.samples.push(sample);
    }

    /// Append a sample on process/thread 0
    pub fn add_sample(&mut self, stack: StackIndex, metric: f64, time_rel_msec: f64) {
        self.push_sample(StackSourceSample::new(stack, time_rel_msec).with_metric(metric));
    }

    /// Intern `root_first` and append a sample for it
    pub fn add_path_sample(&mut self, root_first: &[&str], metric: f64, time_rel_msec: f64) {
        let stack = self.intern_path(root_first);
        self.add_sample(stack, metric, time_rel_msec);
    }

    pub fn samples(&self) -> &[StackSourceSample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Start handing out samples from the beginning again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn stack(&self, stack: StackIndex) -> &StackEntry {
        match self.stacks.get(stack.as_usize()) {
            Some(entry) => entry,
            None => panic!(
                "stack index {} out of range ({} stacks interned)",
                stack.0,
                self.stacks.len()
            ),
        }
    }
}

impl StackSource for InMemoryStackSource {
    fn next_sample(&mut self) -> Option<StackSourceSample> {
        let sample = self.samples.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(sample)
    }

    fn caller_index(&self, stack: StackIndex) -> CallerIndex {
        match self.stack(stack).caller {
            Some(caller) => CallerIndex::Caller(caller),
            None => CallerIndex::Invalid,
        }
    }

    fn frame_index(&self, stack: StackIndex) -> FrameResolution {
        let frame = self.stack(stack).frame;
        self.overrides
            .get(&frame)
            .copied()
            .unwrap_or(FrameResolution::Frame(frame))
    }

    fn frame_name(&self, frame: FrameIndex, full_path: bool) -> String {
        let name = match self.frame_names.get(frame.as_usize()) {
            Some(name) => name,
            None => panic!("frame {frame} was never handed out by this source"),
        };
        if full_path {
            name.clone()
        } else {
            strip_module_path(name)
        }
    }

    fn max_call_stack_index(&self) -> usize {
        self.stacks.len()
    }

    fn max_call_frame_index(&self) -> usize {
        self.frame_names.len()
    }
}

/// Drop the directory part of a `path/module!method` frame name.
fn strip_module_path(name: &str) -> String {
    let (module, rest) = match name.find('!') {
        Some(bang) => name.split_at(bang),
        None => return name.to_string(),
    };
    let file = module
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(module);
    format!("{file}{rest}")
}
