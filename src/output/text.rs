//! Plain-text summaries for the terminal.

use crate::tree::{CallTreeNodeBase, CallerCalleeNode};

const NAME_WIDTH: usize = 48;

fn display_name(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let tail: String = name
            .chars()
            .rev()
            .take(NAME_WIDTH - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    } else {
        name.to_string()
    }
}

fn percent_of(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

fn push_row(lines: &mut Vec<String>, entry: &CallTreeNodeBase, total: f64) {
    lines.push(format!(
        "  {:<width$} {:>12} {:>7.1}% {:>12} {:>7.1}%",
        display_name(&entry.name),
        format_metric(entry.exclusive_metric),
        percent_of(entry.exclusive_metric, total),
        format_metric(entry.inclusive_metric),
        percent_of(entry.inclusive_metric, total),
        width = NAME_WIDTH
    ));
}

fn format_metric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn header(lines: &mut Vec<String>, title: &str) {
    lines.push(format!(
        "  {:<width$} {:>12} {:>8} {:>12} {:>8}",
        title,
        "EXCL",
        "EXCL%",
        "INCL",
        "INCL%",
        width = NAME_WIDTH
    ));
    lines.push(format!("  {}", "-".repeat(NAME_WIDTH + 44)));
}

/// Table of the first `max_lines` by-name entries
pub fn render_rollup_table(entries: &[CallTreeNodeBase], total: f64, max_lines: usize) -> String {
    let mut lines = Vec::new();
    header(&mut lines, "Name (by exclusive metric)");

    for entry in entries.iter().take(max_lines) {
        push_row(&mut lines, entry, total);
    }

    if entries.len() > max_lines {
        lines.push(String::new());
        lines.push(format!("   (Showing top {} of {} names)", max_lines, entries.len()));
    }

    lines.join("\n")
}

/// Callers, focus and callees of a caller/callee view
pub fn render_caller_callee(node: &CallerCalleeNode) -> String {
    let total = node.inclusive_metric;
    let mut lines = Vec::new();

    header(&mut lines, "Callers");
    for caller in node.callers() {
        push_row(&mut lines, caller, total);
    }
    lines.push(String::new());

    header(&mut lines, "Focus");
    push_row(&mut lines, node.base(), total);
    lines.push(String::new());

    header(&mut lines, "Callees");
    for callee in node.callees() {
        push_row(&mut lines, callee, total);
    }

    lines.join("\n")
}
