//! JSON rollup report writer.
//!
//! Writes the by-name rollup of a call tree as a versioned JSON document.

use crate::filter::FilterStats;
use crate::tree::CallTree;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::ReportError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Top-level rollup report written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Where the samples came from (input file name, etc.)
    pub source: String,

    /// Inclusive metric of the tree root
    pub total_metric: f64,

    /// Samples merged into the tree
    pub total_samples: usize,

    /// Samples dropped by filters or by the tree's own time range
    pub discarded_samples: usize,

    /// Hottest names by exclusive metric
    pub entries: Vec<RollupEntry>,

    /// Timestamp when the report was generated
    pub generated_at: String,
}

/// One by-name summary line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupEntry {
    pub name: String,
    pub inclusive_metric: f64,
    pub exclusive_metric: f64,
    pub inclusive_count: f64,
    pub exclusive_count: f64,

    /// Inclusive metric as a percentage of the total
    pub inclusive_percent: f64,

    /// Exclusive metric as a percentage of the total
    pub exclusive_percent: f64,
}

/// Build a rollup report of the `top_n` names with the largest exclusive metric
pub fn build_rollup_report(tree: &CallTree, source: &str, top_n: usize) -> RollupReport {
    let total_metric = tree.top().inclusive_metric;
    let percent = |value: f64| {
        if total_metric > 0.0 {
            value / total_metric * 100.0
        } else {
            0.0
        }
    };

    let entries = tree
        .by_name_sorted_by_exclusive()
        .into_iter()
        .take(top_n)
        .map(|summary| RollupEntry {
            inclusive_percent: percent(summary.inclusive_metric),
            exclusive_percent: percent(summary.exclusive_metric),
            name: summary.name,
            inclusive_metric: summary.inclusive_metric,
            exclusive_metric: summary.exclusive_metric,
            inclusive_count: summary.inclusive_count,
            exclusive_count: summary.exclusive_count,
        })
        .collect();

    RollupReport {
        version: SCHEMA_VERSION.to_string(),
        source: source.to_string(),
        total_metric,
        total_samples: tree.total_samples(),
        discarded_samples: tree.discarded_samples(),
        entries,
        generated_at: chrono::Utc::now().to_rfc3339(),
    }
}

impl RollupReport {
    /// Count samples a filtering source dropped before they reached the tree
    pub fn with_filter_stats(mut self, stats: &FilterStats) -> Self {
        self.discarded_samples += stats.discarded();
        self
    }
}

/// Write a rollup report to a JSON file
///
/// # Errors
/// * `ReportError::WriteFailed` - I/O error during write
/// * `ReportError::SerializationFailed` - JSON serialization error
/// * `ReportError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report(report: &RollupReport, output_path: impl AsRef<Path>) -> Result<(), ReportError> {
    let output_path = output_path.as_ref();

    info!("Writing rollup report to: {}", output_path.display());

    let mut writer = super::create_output_file(output_path)?;
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;

    debug!("Rollup report written ({} entries)", report.entries.len());

    Ok(())
}

/// Read a rollup report from a JSON file
pub fn read_report(input_path: impl AsRef<Path>) -> Result<RollupReport, ReportError> {
    let input_path = input_path.as_ref();

    debug!("Reading rollup report from: {}", input_path.display());

    let file = File::open(input_path)?;
    let report: RollupReport = serde_json::from_reader(file)?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryStackSource;
    use tempfile::NamedTempFile;

    fn create_test_tree() -> CallTree {
        let mut source = InMemoryStackSource::new();
        source.add_path_sample(&["main", "hot"], 3.0, 0.0);
        source.add_path_sample(&["main", "cold"], 1.0, 1.0);
        CallTree::from_source(&mut source)
    }

    #[test]
    fn test_build_report_percentages() {
        let report = build_rollup_report(&create_test_tree(), "test", 10);

        assert_eq!(report.version, SCHEMA_VERSION);
        assert_eq!(report.total_metric, 4.0);
        assert_eq!(report.entries[0].name, "hot");
        assert_eq!(report.entries[0].exclusive_percent, 75.0);
        assert_eq!(report.entries.len(), 3);
    }

    #[test]
    fn test_filter_stats_count_as_discarded() {
        let stats = FilterStats {
            passed: 2,
            outside_time_range: 3,
            other_thread_or_process: 1,
            not_included: 0,
        };
        let report = build_rollup_report(&create_test_tree(), "test", 10).with_filter_stats(&stats);
        assert_eq!(report.discarded_samples, 4);
        assert_eq!(report.total_samples, 2);
    }

    #[test]
    fn test_top_n_truncates() {
        let report = build_rollup_report(&create_test_tree(), "test", 1);
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn test_write_and_read_report() {
        let report = build_rollup_report(&create_test_tree(), "test", 10);
        let temp_file = NamedTempFile::new().unwrap();

        write_report(&report, temp_file.path()).unwrap();
        let loaded = read_report(temp_file.path()).unwrap();

        assert_eq!(loaded, report);
    }
}
