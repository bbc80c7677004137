//! Load collapsed stacks into an [`InMemoryStackSource`].
//!
//! Format: one sample per line, frames separated by `;` from the outermost
//! caller to the leaf, followed by whitespace and the sample weight.
//!
//! Example: "main;execute_tx;storage_read 1000"
//!
//! Collapsed stacks carry no timestamps, so the line's sample ordinal is
//! used as its relative time in milliseconds.

use super::memory::InMemoryStackSource;
use crate::utils::error::ParseError;
use log::debug;
use std::path::Path;

/// Parse collapsed-stack text
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// * `ParseError::InvalidLine` - missing or negative weight, or no frames
pub fn parse_collapsed(text: &str) -> Result<InMemoryStackSource, ParseError> {
    let mut source = InMemoryStackSource::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (stack_part, weight_part) = line.rsplit_once(char::is_whitespace).ok_or_else(|| {
            ParseError::InvalidLine {
                line: line_no + 1,
                reason: "expected '<frames> <weight>'".to_string(),
            }
        })?;

        let metric: f64 = weight_part.parse().map_err(|_| ParseError::InvalidLine {
            line: line_no + 1,
            reason: format!("invalid weight '{weight_part}'"),
        })?;
        if !metric.is_finite() || metric < 0.0 {
            return Err(ParseError::InvalidLine {
                line: line_no + 1,
                reason: format!("weight must be a non-negative number, got {metric}"),
            });
        }

        let frames: Vec<&str> = stack_part
            .trim()
            .split(';')
            .map(str::trim)
            .filter(|frame| !frame.is_empty())
            .collect();
        if frames.is_empty() {
            return Err(ParseError::InvalidLine {
                line: line_no + 1,
                reason: "no frames".to_string(),
            });
        }

        let time_rel_msec = source.sample_count() as f64;
        source.add_path_sample(&frames, metric, time_rel_msec);
    }

    debug!(
        "Loaded {} collapsed samples over {} distinct stacks",
        source.sample_count(),
        crate::source::StackSource::max_call_stack_index(&source)
    );

    Ok(source)
}

/// Read and parse a collapsed-stack file
pub fn load_collapsed(path: impl AsRef<Path>) -> Result<InMemoryStackSource, ParseError> {
    let text = std::fs::read_to_string(path)?;
    parse_collapsed(&text)
}
