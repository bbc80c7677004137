use calltree_studio::output::{
    build_rollup_report, call_tree_to_xml, caller_callee_to_xml, read_report,
    render_rollup_table, write_call_tree_file, write_caller_callee_file, write_report,
};
use calltree_studio::source::InMemoryStackSource;
use calltree_studio::tree::{CallTree, NodeId};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use xml::reader::{EventReader, XmlEvent};

/// Attributes of each element, in document order
#[derive(Debug)]
struct Element {
    name: String,
    attributes: HashMap<String, String>,
    depth: usize,
}

fn parse_elements(xml: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut depth = 0usize;
    for event in EventReader::new(xml.as_bytes()) {
        match event.expect("well-formed XML") {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                elements.push(Element {
                    name: name.local_name,
                    attributes: attributes
                        .into_iter()
                        .map(|a| (a.name.local_name, a.value))
                        .collect(),
                    depth,
                });
                depth += 1;
            }
            XmlEvent::EndElement { .. } => depth -= 1,
            _ => {}
        }
    }
    assert_eq!(depth, 0, "unbalanced tags");
    elements
}

fn sample_tree() -> CallTree {
    let mut source = InMemoryStackSource::new();
    source.add_path_sample(&["main", "parse", "lex"], 0.1, 0.125);
    source.add_path_sample(&["main", "parse"], 1.0 / 3.0, 1.0);
    source.add_path_sample(&["main", "eval<T>", "alloc & free"], 2.75, 2.5);
    source.add_path_sample(&["main", "eval<T>"], 1e-7, 3.33333);
    CallTree::from_source(&mut source)
}

fn preorder(tree: &CallTree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack = vec![tree.top_id()];
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(tree.node(id).callees().iter().rev().copied());
    }
    order
}

/// Equal within the four written decimals
fn close(read: f64, expected: f64) -> bool {
    (read - expected).abs() <= 0.5e-4 + 1e-12
}

fn attr(element: &Element, key: &str) -> f64 {
    element.attributes[key]
        .parse()
        .unwrap_or_else(|_| panic!("{key} of {} is not a number", element.attributes["Name"]))
}

#[test]
fn test_call_tree_xml_round_trips() {
    let tree = sample_tree();
    let xml = call_tree_to_xml(&tree).unwrap();
    let elements = parse_elements(&xml);
    let order = preorder(&tree);

    assert_eq!(elements.len(), order.len());
    for (element, id) in elements.iter().zip(order) {
        let node = tree.node(id);
        assert_eq!(element.name, "CallTree");
        assert_eq!(element.attributes["Name"], node.name);
        assert!(close(attr(element, "InclusiveMetric"), node.inclusive_metric));
        assert!(close(attr(element, "ExclusiveMetric"), node.exclusive_metric));
        assert!(close(attr(element, "InclusiveCount"), node.inclusive_count));
        assert!(close(attr(element, "ExclusiveCount"), node.exclusive_count));
        assert!(close(attr(element, "FirstTimeRelMSec"), node.first_time_rel_msec));
        assert!(close(attr(element, "LastTimeRelMSec"), node.last_time_rel_msec));
    }

    let depths: Vec<usize> = elements.iter().map(|e| e.depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 3, 2, 3]);
}

#[test]
fn test_filtered_xml_file() {
    let tree = sample_tree();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reports").join("tree.xml");

    write_call_tree_file(&tree, Some(50.0), &path).unwrap();
    let elements = parse_elements(&fs::read_to_string(&path).unwrap());

    assert!(elements[0].attributes.contains_key("FilterName"));
    // parse (0.433...) is under half of the root and gets summarized
    let names: Vec<&str> = elements.iter().map(|e| e.attributes["Name"].as_str()).collect();
    assert_eq!(
        names,
        vec!["ROOT", "main", "eval<T>", "alloc & free", "$FilteredNodes"]
    );
    let filtered = elements.last().unwrap();
    assert_eq!(filtered.depth, 2);
    assert!(close(attr(filtered, "InclusiveMetric"), 0.1 + 1.0 / 3.0));
}

#[test]
fn test_caller_callee_xml() {
    let tree = sample_tree();
    let view = tree.caller_callee("parse");
    let elements = parse_elements(&caller_callee_to_xml(&view).unwrap());

    let names: Vec<&str> = elements.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["CallerCallee", "Callers", "Node", "Callees", "Node"]);
    assert_eq!(elements[0].attributes["Name"], "parse");
    assert_eq!(elements[1].attributes["Count"], "1");
    assert_eq!(elements[2].attributes["Name"], "main");
    assert_eq!(elements[4].attributes["Name"], "lex");
    assert!(close(attr(&elements[4], "InclusiveMetric"), 0.1));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parse.xml");
    write_caller_callee_file(&view, &path).unwrap();
    assert_eq!(parse_elements(&fs::read_to_string(&path).unwrap()).len(), 5);
}

#[test]
fn test_xml_file_rejects_directory() {
    let tree = sample_tree();
    let dir = TempDir::new().unwrap();
    assert!(write_call_tree_file(&tree, None, dir.path()).is_err());
}

#[test]
fn test_rollup_report_round_trip() {
    let tree = sample_tree();
    let report = build_rollup_report(&tree, "sample", 3);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rollup.json");

    write_report(&report, &path).unwrap();
    let loaded = read_report(&path).unwrap();

    assert_eq!(loaded.version, report.version);
    assert_eq!(loaded.generated_at, report.generated_at);
    assert_eq!(loaded.entries.len(), 3);
    for (read, written) in loaded.entries.iter().zip(&report.entries) {
        assert_eq!(read.name, written.name);
        assert!((read.inclusive_metric - written.inclusive_metric).abs() < 1e-12);
        assert!((read.exclusive_percent - written.exclusive_percent).abs() < 1e-9);
    }
    assert_eq!(loaded.entries[0].name, "alloc & free");
    assert_eq!(loaded.total_samples, 4);
}

#[test]
fn test_rollup_table() {
    let tree = sample_tree();
    let rollup = tree.by_name_sorted_by_exclusive();
    let table = render_rollup_table(&rollup, tree.top().inclusive_metric, 2);

    assert!(table.contains("alloc & free"));
    assert!(table.contains("Showing top 2 of 5 names"));
}
