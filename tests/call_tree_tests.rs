use calltree_studio::source::{FrameResolution, GroupId, InMemoryStackSource};
use calltree_studio::tree::{CallTree, CallTreeConfig, NodeId};
use pretty_assertions::assert_eq;

const EPSILON: f64 = 1e-9;

fn scenario() -> InMemoryStackSource {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["main", "foo", "bar"], 1.0, 0.0);
    source.add_path_sample(&["main", "foo", "baz"], 2.0, 1.0);
    source.add_path_sample(&["main", "qux"], 1.0, 2.0);
    source
}

/// Larger tree with uneven counts for the fold checks
fn wide_source() -> InMemoryStackSource {
    let mut source = InMemoryStackSource::new();
    let paths: &[(&[&str], f64)] = &[
        (&["main", "parse", "lex"], 3.0),
        (&["main", "parse", "lex"], 1.0),
        (&["main", "parse", "lex", "next_char"], 2.0),
        (&["main", "parse"], 0.5),
        (&["main", "eval", "lookup"], 4.0),
        (&["main", "eval", "lookup", "hash"], 1.5),
        (&["main", "eval", "lookup", "hash"], 1.5),
        (&["main", "eval", "lookup", "hash"], 1.5),
        (&["main", "eval", "alloc"], 2.0),
        (&["main", "print"], 1.0),
    ];
    for (i, (path, metric)) in paths.iter().enumerate() {
        source.add_path_sample(path, *metric, i as f64);
    }
    source
}

fn all_nodes(tree: &CallTree) -> Vec<NodeId> {
    let mut ids = Vec::new();
    let mut stack = vec![tree.top_id()];
    while let Some(id) = stack.pop() {
        ids.push(id);
        stack.extend_from_slice(tree.node(id).callees());
    }
    ids
}

fn assert_invariants(tree: &CallTree) {
    for id in all_nodes(tree) {
        let node = tree.node(id);
        assert!(
            node.inclusive_metric + EPSILON >= node.exclusive_metric,
            "{} has inclusive {} < exclusive {}",
            node.name,
            node.inclusive_metric,
            node.exclusive_metric
        );
        assert!(node.inclusive_count + EPSILON >= node.exclusive_count);
        if !node.has_callees() {
            assert!(
                (node.inclusive_metric - node.exclusive_metric).abs() < EPSILON,
                "leaf {} has inclusive {} != exclusive {}",
                node.name,
                node.inclusive_metric,
                node.exclusive_metric
            );
        }
        if node.has_samples() {
            assert!(node.first_time_rel_msec <= node.last_time_rel_msec);
        }
    }
}

fn metrics(tree: &CallTree, path: &[&str]) -> (f64, f64) {
    let node = tree.find_path(path).unwrap_or_else(|| panic!("missing {path:?}"));
    (node.inclusive_metric, node.exclusive_metric)
}

#[test]
fn test_end_to_end_scenario() {
    let tree = CallTree::from_source(&mut scenario());

    assert_eq!(tree.top().name, "ROOT");
    assert_eq!(tree.top().inclusive_metric, 4.0);
    assert_eq!(metrics(&tree, &["main"]), (4.0, 0.0));
    assert_eq!(metrics(&tree, &["main", "foo"]), (3.0, 0.0));
    assert_eq!(metrics(&tree, &["main", "foo", "bar"]), (1.0, 1.0));
    assert_eq!(metrics(&tree, &["main", "foo", "baz"]), (2.0, 2.0));
    assert_eq!(metrics(&tree, &["main", "qux"]), (1.0, 1.0));
    assert_invariants(&tree);
}

#[test]
fn test_counts_and_times() {
    let tree = CallTree::from_source(&mut scenario());

    let foo = tree.find_path(&["main", "foo"]).unwrap();
    assert_eq!(foo.inclusive_count, 2.0);
    assert_eq!(foo.exclusive_count, 0.0);
    assert_eq!(foo.first_time_rel_msec, 0.0);
    assert_eq!(foo.last_time_rel_msec, 1.0);
    assert_eq!(foo.duration_msec(), 1.0);

    assert_eq!(tree.top().inclusive_count, 3.0);
    assert_eq!(tree.top().first_time_rel_msec, 0.0);
    assert_eq!(tree.top().last_time_rel_msec, 2.0);
}

#[test]
fn test_root_inclusive_is_sum_of_kept_samples() {
    let mut source = wide_source();
    let expected: f64 = source.samples().iter().map(|s| s.metric).sum();
    let tree = CallTree::from_source(&mut source);

    assert!((tree.top().inclusive_metric - expected).abs() < EPSILON);
    assert_eq!(tree.total_samples(), 10);
    assert_eq!(tree.discarded_samples(), 0);
    assert_invariants(&tree);
}

#[test]
fn test_discard_frame_drops_whole_sample() {
    let mut source = scenario();
    let noise = source.intern_frame("noise");
    source.add_path_sample(&["main", "noise", "deep"], 5.0, 3.0);
    source.set_frame_resolution(noise, FrameResolution::Discard);

    let tree = CallTree::from_source(&mut source);

    assert_eq!(tree.top().inclusive_metric, 4.0);
    assert_eq!(tree.total_samples(), 3);
    assert_eq!(tree.discarded_samples(), 1);
    assert!(tree.find_path(&["main", "noise"]).is_none());
    // The discarded sample must not widen any time range either
    assert_eq!(tree.top().last_time_rel_msec, 2.0);
}

#[test]
fn test_fold_frame_merges_into_caller() {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["main", "helper"], 1.0, 0.0);
    source.add_path_sample(&["main", "helper", "work"], 2.0, 1.0);
    let helper = source.intern_frame("helper");
    source.set_frame_resolution(helper, FrameResolution::Fold);

    let tree = CallTree::from_source(&mut source);

    assert!(tree.find_path(&["main", "helper"]).is_none());
    assert_eq!(metrics(&tree, &["main"]), (3.0, 1.0));
    assert_eq!(metrics(&tree, &["main", "work"]), (2.0, 2.0));

    let main = tree.find_path(&["main"]).unwrap();
    assert_eq!(main.min_folded_frames(), 1);
    assert_eq!(main.max_folded_frames(), 1);
    assert_invariants(&tree);
}

#[test]
fn test_fold_all_drops_callees() {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["main", "lib", "inner", "leaf"], 2.0, 0.0);
    source.add_path_sample(&["main", "other"], 1.0, 1.0);
    let lib = source.intern_frame("lib");
    source.set_frame_resolution(lib, FrameResolution::FoldAll);

    let tree = CallTree::from_source(&mut source);

    assert_eq!(metrics(&tree, &["main"]), (3.0, 2.0));
    assert!(tree.find_path(&["main", "lib"]).is_none());
    assert!(tree.find_path(&["main", "inner"]).is_none());
    assert!(tree.find_path(&["main", "leaf"]).is_none());
    assert_eq!(tree.find_path(&["main"]).unwrap().max_folded_frames(), 3);
    assert_invariants(&tree);
}

#[test]
fn test_group_internal_keeps_outermost_entry() {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["main", "X!a", "X!b", "leaf"], 1.0, 0.0);
    source.add_path_sample(&["main", "X!b", "leaf"], 1.0, 1.0);
    let a = source.intern_frame("X!a");
    let b = source.intern_frame("X!b");
    let group = GroupId(0);
    source.set_frame_resolution(a, FrameResolution::GroupInternal { frame: a, group });
    source.set_frame_resolution(b, FrameResolution::GroupInternal { frame: b, group });

    let tree = CallTree::from_source(&mut source);

    // Internal calls within the group are hidden behind the entry frame
    assert_eq!(metrics(&tree, &["main", "X!a", "leaf"]), (1.0, 1.0));
    assert!(tree.find_path(&["main", "X!a", "X!b"]).is_none());
    assert_eq!(metrics(&tree, &["main", "X!b", "leaf"]), (1.0, 1.0));
    assert_eq!(tree.find_path(&["main", "X!a"]).unwrap().max_folded_frames(), 1);
}

#[test]
fn test_distinct_ids_with_same_name_stay_separate() {
    let mut source = InMemoryStackSource::new();
    let main = source.intern_frame("main");
    let first = source.add_frame("A");
    let second = source.add_frame("A");
    let stack = source.intern_frames(&[main, first, second]).unwrap();
    source.add_sample(stack, 1.0, 0.0);

    let tree = CallTree::from_source(&mut source);

    let a = tree.find_path(&["main", "A", "A"]).unwrap();
    assert_eq!((a.inclusive_metric, a.exclusive_metric), (1.0, 1.0));
    assert_eq!(tree.node_count(), 4);
}

#[test]
fn test_fold_conserves_root_and_parent_mass() {
    let mut tree = CallTree::from_source(&mut wide_source());
    let root_before = tree.top().inclusive_metric;
    let nodes_before = tree.node_count();

    let lookup = tree.find_path(&["main", "eval", "lookup"]).unwrap();
    let lookup_exclusive = lookup.exclusive_metric;
    let lookup_inclusive = lookup.inclusive_metric;
    let parse = tree.find_path(&["main", "parse"]).unwrap();
    let parse_inclusive = parse.inclusive_metric;

    // hash has 3 samples and survives; print, alloc and next_char have one
    let removed = tree.fold_nodes_under_or_equal(1.0);

    assert_eq!(removed, 3);
    assert_eq!(tree.node_count(), nodes_before - removed);
    assert!((tree.top().inclusive_metric - root_before).abs() < EPSILON);

    let lookup = tree.find_path(&["main", "eval", "lookup"]).unwrap();
    assert_eq!(lookup.exclusive_metric, lookup_exclusive);
    assert_eq!(lookup.inclusive_metric, lookup_inclusive);

    // next_char (2.0) is merged into lex's exclusive metric
    assert_eq!(metrics(&tree, &["main", "parse", "lex"]), (6.0, 6.0));
    assert_eq!(tree.find_path(&["main", "parse"]).unwrap().inclusive_metric, parse_inclusive);
    assert_eq!(metrics(&tree, &["main", "eval"]), (10.5, 2.0));
    assert_eq!(tree.find_path(&["main"]).unwrap().exclusive_metric, 1.0);
    assert_invariants(&tree);
}

#[test]
fn test_fold_never_removes_root() {
    let mut tree = CallTree::from_source(&mut scenario());
    let removed = tree.fold_nodes_under_or_equal(100.0);

    assert_eq!(removed, 5);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.top().inclusive_metric, 4.0);
    assert_eq!(tree.top().exclusive_metric, 4.0);
    assert_invariants(&tree);
}

#[test]
fn test_fold_threshold_from_config() {
    let config = CallTreeConfig {
        fold_threshold: Some(1.0),
        ..CallTreeConfig::default()
    };
    let tree = CallTree::from_source_with_config(&mut scenario(), config);

    assert!(tree.find_path(&["main", "qux"]).is_none());
    assert_eq!(metrics(&tree, &["main", "foo"]), (3.0, 3.0));
}

#[test]
fn test_no_implicit_fold() {
    let tree = CallTree::from_source(&mut scenario());
    assert!(tree.find_path(&["main", "foo", "bar"]).is_some());
}

#[test]
fn test_rewind_feeds_a_second_tree() {
    let mut source = scenario();
    let first = CallTree::from_source(&mut source);
    let empty = CallTree::from_source(&mut source);
    source.rewind();
    let second = CallTree::from_source(&mut source);

    assert_eq!(empty.total_samples(), 0);
    assert_eq!(first.top().inclusive_metric, second.top().inclusive_metric);
    assert_eq!(first.node_count(), second.node_count());
}

#[test]
fn test_full_frame_names() {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["C:/bin/app.exe!main"], 1.0, 0.0);

    let short = CallTree::from_source(&mut source);
    source.rewind();
    let config = CallTreeConfig {
        full_frame_names: true,
        ..CallTreeConfig::default()
    };
    let full = CallTree::from_source_with_config(&mut source, config);

    assert!(short.find_path(&["app.exe!main"]).is_some());
    assert!(full.find_path(&["C:/bin/app.exe!main"]).is_some());
}
