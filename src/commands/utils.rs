use super::models::FilterOptions;
use crate::filter::{FilterStackSource, FilterStats};
use crate::output::read_report;
use crate::source::load_collapsed;
use crate::tree::{CallTree, CallTreeConfig};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;

/// Load a collapsed-stack file and build a call tree through the configured filters
///
/// # Returns
/// The tree and the counters of the sample filters. Samples those filters
/// drop never reach the tree, so they only show up in the counters.
pub fn build_tree(
    input: &Path,
    filter: &FilterOptions,
    config: CallTreeConfig,
) -> Result<(CallTree, FilterStats)> {
    let params = filter.to_params()?;

    let mut source = load_collapsed(input)
        .with_context(|| format!("Failed to read stacks from {}", input.display()))?;

    if source.sample_count() == 0 {
        warn!("No samples found in {}", input.display());
    }

    if params.is_empty() {
        debug!("No filters configured, reading samples directly");
        let tree = CallTree::from_source_with_config(&mut source, config);
        return Ok((tree, FilterStats::default()));
    }

    let mut filtered =
        FilterStackSource::new(source, &params).context("Failed to compile filter patterns")?;
    let tree = CallTree::from_source_with_config(&mut filtered, config);

    let stats = filtered.stats();
    info!(
        "Filters kept {} samples, dropped {} ({} outside time range, {} other thread/process, {} not included)",
        stats.passed,
        stats.discarded(),
        stats.outside_time_range,
        stats.other_thread_or_process,
        stats.not_included
    );

    Ok((tree, stats))
}

/// Validate a rollup JSON file
pub fn validate_report_file(file_path: &Path) -> Result<()> {
    println!("Validating rollup report: {}", file_path.display());

    let report = read_report(file_path)
        .with_context(|| format!("Failed to read report {}", file_path.display()))?;

    if report.version != SCHEMA_VERSION {
        warn!(
            "Report schema v{} differs from current v{}",
            report.version, SCHEMA_VERSION
        );
    }

    println!("✓ Valid rollup report");
    println!("  Version: {}", report.version);
    println!("  Source: {}", report.source);
    println!("  Total Metric: {}", report.total_metric);
    println!("  Samples: {} ({} discarded)", report.total_samples, report.discarded_samples);
    println!("  Entries: {}", report.entries.len());

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("Calltree Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Call-tree aggregation and caller/callee reports for sampled stacks.");
}
