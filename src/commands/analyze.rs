//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Reads collapsed stacks
//! 2. Applies frame and sample filters
//! 3. Builds and optionally folds the call tree
//! 4. Writes the XML and JSON reports
//! 5. Prints the hottest names

use super::models::AnalyzeArgs;
use super::utils::build_tree;
use crate::output::{build_rollup_report, render_rollup_table, write_call_tree_file, write_report};
use crate::tree::CallTreeConfig;
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Input read or parse failures
/// * Invalid filter patterns
/// * File write errors
pub fn execute_analyze(args: AnalyzeArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Analyzing stacks from: {}", args.input.display());

    // Step 1: Build the tree
    info!("Step 1/3: Building call tree...");
    let config = CallTreeConfig {
        full_frame_names: args.full_names,
        fold_threshold: args.fold_threshold,
        ..Default::default()
    };
    let (mut tree, filter_stats) = build_tree(&args.input, &args.filter, config)?;
    tree.sort_descending_by_inclusive_metric();

    debug!(
        "Tree has {} nodes, root inclusive metric {}",
        tree.node_count(),
        tree.top().inclusive_metric
    );

    // Step 2: Write reports
    info!("Step 2/3: Writing reports...");
    if let Some(xml_path) = &args.output_xml {
        write_call_tree_file(&tree, args.percent, xml_path)
            .context("Failed to write call tree XML")?;
        info!("✓ Call tree written to: {}", xml_path.display());
    }

    if let Some(json_path) = &args.output_json {
        let report = build_rollup_report(&tree, &args.input.display().to_string(), args.top)
            .with_filter_stats(&filter_stats);
        write_report(&report, json_path).context("Failed to write rollup JSON")?;
        info!("✓ Rollup written to: {}", json_path.display());
    }

    // Step 3: Summary
    info!("Step 3/3: Summarizing...");
    let rollup = tree.by_name_sorted_by_exclusive();
    println!("\n{}", "=".repeat(80));
    println!("CALL TREE SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Input:     {}", args.input.display());
    println!("Samples:   {}", tree.total_samples());
    println!("Metric:    {}", tree.top().inclusive_metric);
    println!("Nodes:     {}", tree.node_count());
    println!("\n{}", render_rollup_table(&rollup, tree.top().inclusive_metric, args.top));
    println!("{}", "=".repeat(80));

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(())
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    if args.top == 0 {
        anyhow::bail!("top must be greater than 0");
    }

    if let Some(percent) = args.percent {
        if !(0.0..=100.0).contains(&percent) {
            anyhow::bail!("percent must be between 0 and 100");
        }
    }

    if let Some(threshold) = args.fold_threshold {
        if threshold < 0.0 || !threshold.is_finite() {
            anyhow::bail!("fold threshold must be a non-negative number");
        }
    }

    Ok(())
}
