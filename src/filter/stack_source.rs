//! Filtering decorator over another [`StackSource`].
//!
//! Per raw frame, in this order:
//! 1. group patterns pick the display name (and a synthetic group frame)
//! 2. exclude patterns on that name discard the sample
//! 3. fold patterns on that name fold the frame into its caller
//!
//! The outcome is a pure function of the raw frame index and is cached.
//! Time-range, thread and process filters run once per sample before any
//! stack walking. Include patterns are checked per sample by walking its
//! stack; the answer is memoized per stack index since stacks share callers.

use super::params::FilterParams;
use super::pattern::{parse_group_list, GroupKind, GroupPattern, PatternList};
use crate::source::{
    CallerIndex, FrameIndex, FrameResolution, GroupId, StackIndex, StackSource, StackSourceSample,
};
use crate::utils::error::FilterError;
use log::debug;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Cached outcome for one raw frame
#[derive(Debug, Clone, Copy)]
struct ResolvedFrame {
    resolution: FrameResolution,
    included: bool,
}

/// Frames and groups minted by group patterns
#[derive(Debug, Default)]
struct GroupFrames {
    names: Vec<String>,
    frames: HashMap<String, FrameIndex>,
    groups: HashMap<String, GroupId>,
}

/// Counters of what the filter let through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub passed: usize,
    pub outside_time_range: usize,
    pub other_thread_or_process: usize,
    pub not_included: usize,
}

impl FilterStats {
    pub fn discarded(&self) -> usize {
        self.outside_time_range + self.other_thread_or_process + self.not_included
    }
}

/// Stack source that applies [`FilterParams`] to a base source.
///
/// Synthetic group frames are numbered after the base source's frames, so
/// the base must have handed out all of its frames before the filter is
/// built.
pub struct FilterStackSource<S> {
    base: S,
    time_range: Option<(f64, f64)>,
    thread_ids: HashSet<u32>,
    process_ids: HashSet<u32>,
    process_names: HashSet<String>,
    include: PatternList,
    exclude: PatternList,
    fold: PatternList,
    groups: Vec<GroupPattern>,
    fold_group_callees: bool,
    first_group_frame: usize,
    frame_cache: RefCell<Vec<Option<ResolvedFrame>>>,
    group_frames: RefCell<GroupFrames>,
    include_cache: HashMap<StackIndex, bool>,
    stats: FilterStats,
}

impl<S: StackSource> FilterStackSource<S> {
    /// Wrap `base` with the filters in `params`
    ///
    /// # Arguments
    /// * `base` - Source to filter; it must have handed out all of its frames
    /// * `params` - Patterns, time range and thread/process selection
    ///
    /// # Returns
    /// A stack source yielding only the samples that pass, with frames
    /// resolved to group, fold and discard outcomes
    ///
    /// # Example
    /// ```
    /// use calltree_studio::filter::{FilterParams, FilterStackSource};
    /// use calltree_studio::source::InMemoryStackSource;
    /// use calltree_studio::tree::CallTree;
    ///
    /// let mut base = InMemoryStackSource::new();
    /// base.add_path_sample(&["main", "Foo1"], 1.0, 0.0);
    /// base.add_path_sample(&["main", "Foo2"], 1.0, 1.0);
    ///
    /// let params = FilterParams {
    ///     group_reg_exs: "Foo*->Foos".to_string(),
    ///     ..FilterParams::default()
    /// };
    /// let mut filtered = FilterStackSource::new(base, &params)?;
    /// let tree = CallTree::from_source(&mut filtered);
    /// assert_eq!(tree.find_path(&["main", "Foos"]).unwrap().inclusive_metric, 2.0);
    /// # Ok::<(), calltree_studio::utils::FilterError>(())
    /// ```
    ///
    /// # Errors
    /// * `FilterError::InvalidPattern` / `InvalidGroupSpec` - bad pattern lists
    /// * `FilterError::InvalidTimeRange` - start after end
    pub fn new(base: S, params: &FilterParams) -> Result<Self, FilterError> {
        params.validate()?;

        let include = PatternList::parse(&params.include_reg_exs)?;
        let exclude = PatternList::parse(&params.exclude_reg_exs)?;
        let fold = PatternList::parse(&params.fold_reg_exs)?;
        let groups = parse_group_list(&params.group_reg_exs)?;

        debug!(
            "Frame filter: {} include, {} exclude, {} fold, {} group patterns",
            include.len(),
            exclude.len(),
            fold.len(),
            groups.len()
        );

        let first_group_frame = base.max_call_frame_index();
        Ok(Self {
            time_range: params.time_range(),
            thread_ids: params.thread_ids.iter().copied().collect(),
            process_ids: params.process_ids.iter().copied().collect(),
            process_names: params.process_names.iter().cloned().collect(),
            include,
            exclude,
            fold,
            groups,
            fold_group_callees: params.fold_group_callees,
            first_group_frame,
            frame_cache: RefCell::new(vec![None; first_group_frame]),
            group_frames: RefCell::new(GroupFrames::default()),
            include_cache: HashMap::new(),
            stats: FilterStats::default(),
            base,
        })
    }

    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn into_base(self) -> S {
        self.base
    }

    /// Cheap per-sample checks done before walking the stack
    fn passes_sample_filters(&mut self, sample: &StackSourceSample) -> bool {
        if let Some((start, end)) = self.time_range {
            if sample.time_rel_msec < start || sample.time_rel_msec > end {
                self.stats.outside_time_range += 1;
                return false;
            }
        }

        let thread_ok = self.thread_ids.is_empty() || self.thread_ids.contains(&sample.thread_id);
        let process_ok =
            self.process_ids.is_empty() || self.process_ids.contains(&sample.process_id);
        let name_ok = self.process_names.is_empty()
            || self.process_names.contains(&sample.process_name);
        if !(thread_ok && process_ok && name_ok) {
            self.stats.other_thread_or_process += 1;
            return false;
        }
        true
    }

    /// Does any frame from `stack` up to the top match an include pattern?
    fn stack_included(&mut self, stack: StackIndex) -> bool {
        let mut walked = Vec::new();
        let mut current = stack;
        let included = loop {
            if let Some(&known) = self.include_cache.get(&current) {
                break known;
            }
            walked.push(current);
            if self.position_included(current) {
                break true;
            }
            match self.base.caller_index(current) {
                CallerIndex::Caller(caller) => current = caller,
                CallerIndex::Invalid | CallerIndex::Discard => break false,
            }
        };
        for visited in walked {
            self.include_cache.insert(visited, included);
        }
        included
    }

    fn position_included(&self, stack: StackIndex) -> bool {
        match self.base.frame_index(stack) {
            FrameResolution::Frame(frame) => self.resolve(frame).included,
            _ => false,
        }
    }

    /// Resolution of a raw base frame, computed once
    fn resolve(&self, frame: FrameIndex) -> ResolvedFrame {
        let slot = frame.as_usize();
        assert!(
            slot < self.first_group_frame,
            "base frame {frame} was handed out after the filter was built"
        );
        if let Some(resolved) = self.frame_cache.borrow()[slot] {
            return resolved;
        }
        let resolved = self.compute_resolution(frame);
        self.frame_cache.borrow_mut()[slot] = Some(resolved);
        resolved
    }

    fn compute_resolution(&self, frame: FrameIndex) -> ResolvedFrame {
        let raw_name = self.base.frame_name(frame, false);
        let mut display = raw_name.clone();
        let mut resolution = FrameResolution::Frame(frame);

        let matched = self
            .groups
            .iter()
            .find_map(|group| group.apply(&raw_name).map(|name| (group.kind(), name)));
        if let Some((kind, group_name)) = matched {
            resolution = match kind {
                GroupKind::Collapse => FrameResolution::Frame(self.group_frame(&group_name)),
                GroupKind::Entry => {
                    let group = self.group_id(&group_name);
                    let frame = self.group_frame(&format!("{group_name} <<{raw_name}>>"));
                    if self.fold_group_callees {
                        FrameResolution::GroupInternalAll { frame, group }
                    } else {
                        FrameResolution::GroupInternal { frame, group }
                    }
                }
            };
            display = group_name;
        }

        if self.exclude.is_match(&display) {
            resolution = FrameResolution::Discard;
        } else if self.fold.is_match(&display) {
            resolution = FrameResolution::Fold;
        }

        let included = !self.include.is_empty()
            && (self.include.is_match(&raw_name) || self.include.is_match(&display));

        ResolvedFrame {
            resolution,
            included,
        }
    }

    fn group_frame(&self, name: &str) -> FrameIndex {
        let mut groups = self.group_frames.borrow_mut();
        if let Some(&frame) = groups.frames.get(name) {
            return frame;
        }
        let frame = FrameIndex((self.first_group_frame + groups.names.len()) as u32);
        groups.names.push(name.to_string());
        groups.frames.insert(name.to_string(), frame);
        frame
    }

    fn group_id(&self, name: &str) -> GroupId {
        let mut groups = self.group_frames.borrow_mut();
        let next = GroupId(groups.groups.len() as u32);
        *groups.groups.entry(name.to_string()).or_insert(next)
    }
}

impl<S: StackSource> StackSource for FilterStackSource<S> {
    fn next_sample(&mut self) -> Option<StackSourceSample> {
        loop {
            let Some(sample) = self.base.next_sample() else {
                debug!(
                    "Frame filter passed {} samples, discarded {}",
                    self.stats.passed,
                    self.stats.discarded()
                );
                return None;
            };
            if !self.passes_sample_filters(&sample) {
                continue;
            }
            if !self.include.is_empty() && !self.stack_included(sample.stack_index) {
                self.stats.not_included += 1;
                continue;
            }
            self.stats.passed += 1;
            return Some(sample);
        }
    }

    fn caller_index(&self, stack: StackIndex) -> CallerIndex {
        self.base.caller_index(stack)
    }

    fn frame_index(&self, stack: StackIndex) -> FrameResolution {
        match self.base.frame_index(stack) {
            FrameResolution::Frame(frame) => self.resolve(frame).resolution,
            other => other,
        }
    }

    fn frame_name(&self, frame: FrameIndex, full_path: bool) -> String {
        match frame.as_usize().checked_sub(self.first_group_frame) {
            Some(slot) => match self.group_frames.borrow().names.get(slot) {
                Some(name) => name.clone(),
                None => panic!("group frame {frame} was never handed out by this filter"),
            },
            None => self.base.frame_name(frame, full_path),
        }
    }

    fn max_call_stack_index(&self) -> usize {
        self.base.max_call_stack_index()
    }

    fn max_call_frame_index(&self) -> usize {
        self.first_group_frame + self.group_frames.borrow().names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryStackSource;

    fn resolve_leaf<S: StackSource>(source: &S, stack: StackIndex) -> (FrameResolution, Option<String>) {
        let resolution = source.frame_index(stack);
        let name = match resolution {
            FrameResolution::Frame(f)
            | FrameResolution::GroupInternal { frame: f, .. }
            | FrameResolution::GroupInternalAll { frame: f, .. } => Some(source.frame_name(f, false)),
            _ => None,
        };
        (resolution, name)
    }

    #[test]
    fn test_group_then_exclude_precedence() {
        let mut base = InMemoryStackSource::new();
        let foo = base.intern_path(&["main", "Foo1"]);
        let params = FilterParams {
            group_reg_exs: "Foo*->Hidden".to_string(),
            exclude_reg_exs: "Hidden".to_string(),
            ..FilterParams::default()
        };
        let filter = FilterStackSource::new(base, &params).unwrap();
        // Exclusion applies to the group name, not only the raw name
        assert_eq!(filter.frame_index(foo), FrameResolution::Discard);
    }

    #[test]
    fn test_fold_pattern() {
        let mut base = InMemoryStackSource::new();
        let leaf = base.intern_path(&["main", "memcpy"]);
        let params = FilterParams {
            fold_reg_exs: "mem*".to_string(),
            ..FilterParams::default()
        };
        let filter = FilterStackSource::new(base, &params).unwrap();
        assert_eq!(filter.frame_index(leaf), FrameResolution::Fold);
        let CallerIndex::Caller(main) = filter.caller_index(leaf) else {
            panic!("expected caller");
        };
        assert_eq!(resolve_leaf(&filter, main).1.as_deref(), Some("main"));
    }

    #[test]
    fn test_entry_group_names() {
        let mut base = InMemoryStackSource::new();
        let leaf = base.intern_path(&["main", "os!Read"]);
        let params = FilterParams {
            group_reg_exs: "os!*=>OS".to_string(),
            ..FilterParams::default()
        };
        let filter = FilterStackSource::new(base, &params).unwrap();
        let (resolution, name) = resolve_leaf(&filter, leaf);
        assert!(matches!(resolution, FrameResolution::GroupInternal { .. }));
        assert_eq!(name.as_deref(), Some("OS <<os!Read>>"));
    }

    #[test]
    fn test_fold_group_callees_marks_group_all() {
        let mut base = InMemoryStackSource::new();
        let leaf = base.intern_path(&["main", "os!Read"]);
        let params = FilterParams {
            group_reg_exs: "os!*=>OS".to_string(),
            fold_group_callees: true,
            ..FilterParams::default()
        };
        let filter = FilterStackSource::new(base, &params).unwrap();
        assert!(matches!(filter.frame_index(leaf), FrameResolution::GroupInternalAll { .. }));
    }

    #[test]
    fn test_sample_filters_short_circuit() {
        let mut base = InMemoryStackSource::new();
        let stack = base.intern_path(&["main"]);
        base.push_sample(StackSourceSample::new(stack, 1.0).with_thread(10, 1));
        base.push_sample(StackSourceSample::new(stack, 50.0).with_thread(10, 1));
        base.push_sample(StackSourceSample::new(stack, 2.0).with_thread(10, 2));
        let params = FilterParams {
            end_time_rel_msec: Some(10.0),
            thread_ids: vec![1],
            ..FilterParams::default()
        };
        let mut filter = FilterStackSource::new(base, &params).unwrap();

        let kept: Vec<_> = std::iter::from_fn(|| filter.next_sample()).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].time_rel_msec, 1.0);
        let stats = filter.stats();
        assert_eq!(stats.outside_time_range, 1);
        assert_eq!(stats.other_thread_or_process, 1);
    }

    #[test]
    fn test_include_requires_a_matching_frame() {
        let mut base = InMemoryStackSource::new();
        base.add_path_sample(&["main", "app!work"], 1.0, 0.0);
        base.add_path_sample(&["main", "idle"], 1.0, 1.0);
        base.add_path_sample(&["app!loop", "helper"], 1.0, 2.0);
        let params = FilterParams {
            include_reg_exs: "app!*".to_string(),
            ..FilterParams::default()
        };
        let mut filter = FilterStackSource::new(base, &params).unwrap();

        let kept: Vec<_> = std::iter::from_fn(|| filter.next_sample()).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(filter.stats().not_included, 1);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let params = FilterParams {
            group_reg_exs: "no arrow here".to_string(),
            ..FilterParams::default()
        };
        let result = FilterStackSource::new(InMemoryStackSource::new(), &params);
        assert!(matches!(result, Err(FilterError::InvalidGroupSpec(_))));
    }
}
