//! Focus command: caller/callee view of one frame name.

use super::models::FocusArgs;
use super::utils::build_tree;
use crate::output::{render_caller_callee, write_caller_callee_file};
use crate::tree::CallTreeConfig;
use anyhow::{Context, Result};
use log::{info, warn};

/// Execute the focus command
pub fn execute_focus(args: FocusArgs) -> Result<()> {
    if args.name.trim().is_empty() {
        anyhow::bail!("Focus name cannot be empty");
    }

    info!("Focusing on '{}' in {}", args.name, args.input.display());

    let (tree, _) = build_tree(&args.input, &args.filter, CallTreeConfig::default())?;
    let node = tree.caller_callee(&args.name);

    if !node.has_samples() {
        warn!("No samples found for '{}'", args.name);
    }

    if let Some(xml_path) = &args.output_xml {
        write_caller_callee_file(&node, xml_path)
            .context("Failed to write caller/callee XML")?;
        info!("✓ Caller/callee view written to: {}", xml_path.display());
    }

    println!("\n{}", render_caller_callee(&node));

    Ok(())
}
