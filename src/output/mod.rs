//! Report writers for call trees.
//!
//! This module handles writing data in various formats:
//! - XML call tree and caller/callee reports
//! - JSON rollup summaries
//! - Text tables

pub mod json;
pub mod text;
pub mod xml;

// Re-export main functions
pub use json::{build_rollup_report, read_report, write_report, RollupEntry, RollupReport};
pub use text::{render_caller_callee, render_rollup_table};
pub use xml::{
    call_tree_to_xml, caller_callee_to_xml, write_call_tree, write_call_tree_above_percent,
    write_call_tree_file, write_caller_callee, write_caller_callee_file,
};

use crate::utils::error::ReportError;
use log::debug;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Validate that output path is writable
pub fn validate_path(path: &Path) -> Result<(), ReportError> {
    if path.as_os_str().is_empty() {
        return Err(ReportError::InvalidPath("Path is empty".to_string()));
    }

    // Check if we're trying to overwrite a directory
    if path.is_dir() {
        return Err(ReportError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Open `path` for writing, creating parent directories as needed
pub(crate) fn create_output_file(path: &Path) -> Result<BufWriter<File>, ReportError> {
    validate_path(path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                ReportError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(BufWriter::new(File::create(path)?))
}
