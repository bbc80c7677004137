//! XML call tree reports.
//!
//! Schema:
//!
//! ```text
//! <CallTree [FilterName="..."] Name="..." InclusiveMetric="..." ExclusiveMetric="..."
//!           InclusiveCount="..." ExclusiveCount="..." FirstTimeRelMSec="..." LastTimeRelMSec="...">
//!   <CallTree .../>
//! </CallTree>
//!
//! <CallerCallee Name="..." ...>
//!   <Callers Count="N"><Node Name="..." .../></Callers>
//!   <Callees Count="N"><Node Name="..." .../></Callees>
//! </CallerCallee>
//! ```
//!
//! Metrics, counts and times are written with four decimals.

use crate::tree::{CallTree, CallTreeNode, CallTreeNodeBase, CallerCalleeNode, NodeId};
use crate::utils::config::FILTERED_NODES_NAME;
use crate::utils::error::ReportError;
use log::debug;
use std::fmt;
use std::io::Write;
use std::path::Path;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

/// Formatted attribute values of one node
struct NodeAttributes {
    inclusive_metric: String,
    exclusive_metric: String,
    inclusive_count: String,
    exclusive_count: String,
    first_time: String,
    last_time: String,
}

impl NodeAttributes {
    fn new(base: &CallTreeNodeBase) -> Self {
        Self {
            inclusive_metric: format!("{:.4}", base.inclusive_metric),
            exclusive_metric: format!("{:.4}", base.exclusive_metric),
            inclusive_count: format!("{:.4}", base.inclusive_count),
            exclusive_count: format!("{:.4}", base.exclusive_count),
            first_time: format!("{:.4}", base.first_time_rel_msec),
            last_time: format!("{:.4}", base.last_time_rel_msec),
        }
    }
}

fn emitter<W: Write>(writer: W) -> EventWriter<W> {
    EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(false)
        .create_writer(writer)
}

fn start_node<W: Write>(
    xml: &mut EventWriter<W>,
    element: &str,
    filter_name: Option<&str>,
    base: &CallTreeNodeBase,
) -> Result<(), ReportError> {
    let attrs = NodeAttributes::new(base);
    let mut start = XmlEvent::start_element(element);
    if let Some(filter_name) = filter_name {
        start = start.attr("FilterName", filter_name);
    }
    start = start
        .attr("Name", &base.name)
        .attr("InclusiveMetric", &attrs.inclusive_metric)
        .attr("ExclusiveMetric", &attrs.exclusive_metric)
        .attr("InclusiveCount", &attrs.inclusive_count)
        .attr("ExclusiveCount", &attrs.exclusive_count)
        .attr("FirstTimeRelMSec", &attrs.first_time)
        .attr("LastTimeRelMSec", &attrs.last_time);
    xml.write(start)?;
    Ok(())
}

fn end_node<W: Write>(xml: &mut EventWriter<W>) -> Result<(), ReportError> {
    xml.write(XmlEvent::end_element())?;
    Ok(())
}

struct TreeWriter<'a, P> {
    tree: &'a CallTree,
    summarize_filtered: bool,
    predicate: P,
}

impl<P: Fn(&CallTreeNode) -> bool> TreeWriter<'_, P> {
    fn write_node<W: Write>(
        &self,
        xml: &mut EventWriter<W>,
        id: NodeId,
        filter_name: Option<&str>,
    ) -> Result<(), ReportError> {
        let node = self.tree.node(id);
        start_node(xml, "CallTree", filter_name, node)?;

        let mut filtered: Option<CallTreeNodeBase> = None;
        for &callee in node.callees() {
            let child = self.tree.node(callee);
            if (self.predicate)(child) {
                self.write_node(xml, callee, None)?;
            } else if self.summarize_filtered {
                filtered
                    .get_or_insert_with(|| CallTreeNodeBase::new(FILTERED_NODES_NAME, None))
                    .absorb(child);
            }
        }

        if let Some(summary) = filtered {
            start_node(xml, "CallTree", None, &summary)?;
            end_node(xml)?;
        }
        end_node(xml)
    }
}

/// Write the subtree under `id` as nested `<CallTree>` elements.
///
/// Callees failing `predicate` are dropped, or merged into one
/// `$FilteredNodes` sibling when `summarize_filtered` is set.
///
/// # Arguments
/// * `tree` - Tree to write
/// * `id` - Top node of the written subtree
/// * `writer` - Destination of the XML text
/// * `summarize_filtered` - Merge dropped callees into `$FilteredNodes`
/// * `filter_label` - `FilterName` attribute of the top element
/// * `predicate` - Callees to keep
///
/// # Returns
/// Ok once the whole subtree has been written
///
/// # Errors
/// * `ReportError::XmlFailed` - XML emitter or I/O error
///
/// # Example
/// ```
/// use calltree_studio::output::write_call_tree;
/// use calltree_studio::source::InMemoryStackSource;
/// use calltree_studio::tree::CallTree;
///
/// let mut source = InMemoryStackSource::new();
/// source.add_path_sample(&["main", "work"], 1.0, 0.0);
/// let tree = CallTree::from_source(&mut source);
///
/// let mut out = Vec::new();
/// write_call_tree(&tree, tree.top_id(), &mut out, false, None, |_| true)?;
/// assert!(String::from_utf8_lossy(&out).contains("Name=\"work\""));
/// # Ok::<(), calltree_studio::utils::ReportError>(())
/// ```
pub fn write_call_tree<W, P>(
    tree: &CallTree,
    id: NodeId,
    writer: W,
    summarize_filtered: bool,
    filter_label: Option<&str>,
    predicate: P,
) -> Result<(), ReportError>
where
    W: Write,
    P: Fn(&CallTreeNode) -> bool,
{
    let mut xml = emitter(writer);
    let tree_writer = TreeWriter {
        tree,
        summarize_filtered,
        predicate,
    };
    tree_writer.write_node(&mut xml, id, filter_label)
}

/// Write the subtree under `id`, keeping callees whose inclusive metric is at
/// least `percent` percent of the root's; the rest are summarized.
pub fn write_call_tree_above_percent<W: Write>(
    tree: &CallTree,
    id: NodeId,
    writer: W,
    percent: f64,
) -> Result<(), ReportError> {
    let cutoff = tree.top().inclusive_metric * percent / 100.0;
    let label = format!("InclusiveMetric >= {percent}%");
    write_call_tree(tree, id, writer, true, Some(&label), |node| {
        node.inclusive_metric >= cutoff
    })
}

/// Full, unfiltered XML dump of a tree
pub fn call_tree_to_xml(tree: &CallTree) -> Result<String, ReportError> {
    let mut out = Vec::new();
    write_call_tree(tree, tree.top_id(), &mut out, false, None, |_| true)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Write a caller/callee view
pub fn write_caller_callee<W: Write>(node: &CallerCalleeNode, writer: W) -> Result<(), ReportError> {
    let mut xml = emitter(writer);
    start_node(&mut xml, "CallerCallee", None, node.base())?;
    write_node_list(&mut xml, "Callers", node.callers())?;
    write_node_list(&mut xml, "Callees", node.callees())?;
    end_node(&mut xml)
}

fn write_node_list<W: Write>(
    xml: &mut EventWriter<W>,
    element: &str,
    nodes: &[CallTreeNodeBase],
) -> Result<(), ReportError> {
    let count = nodes.len().to_string();
    xml.write(XmlEvent::start_element(element).attr("Count", &count))?;
    for node in nodes {
        start_node(xml, "Node", None, node)?;
        end_node(xml)?;
    }
    end_node(xml)
}

pub fn caller_callee_to_xml(node: &CallerCalleeNode) -> Result<String, ReportError> {
    let mut out = Vec::new();
    write_caller_callee(node, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Write a threshold-filtered tree report to a file
pub fn write_call_tree_file(
    tree: &CallTree,
    percent: Option<f64>,
    output_path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    let output_path = output_path.as_ref();
    let mut file = super::create_output_file(output_path)?;
    match percent {
        Some(percent) => write_call_tree_above_percent(tree, tree.top_id(), &mut file, percent)?,
        None => write_call_tree(tree, tree.top_id(), &mut file, false, None, |_| true)?,
    }
    file.flush()?;
    debug!("Call tree XML written to {}", output_path.display());
    Ok(())
}

/// Write a caller/callee report to a file
pub fn write_caller_callee_file(
    node: &CallerCalleeNode,
    output_path: impl AsRef<Path>,
) -> Result<(), ReportError> {
    let mut file = super::create_output_file(output_path.as_ref())?;
    write_caller_callee(node, &mut file)?;
    file.flush()?;
    Ok(())
}

impl fmt::Display for CallTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = call_tree_to_xml(self).map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

impl fmt::Display for CallerCalleeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = caller_callee_to_xml(self).map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}
