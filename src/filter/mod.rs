//! Frame and sample filtering.
//!
//! This module handles:
//! - The frame pattern language (wildcards, group specs)
//! - Filter configuration (`FilterParams`)
//! - `FilterStackSource`, the decorator that applies both to a stack source

pub mod params;
pub mod pattern;
pub mod stack_source;

// Re-export main types
pub use params::FilterParams;
pub use pattern::{compile_pattern, GroupKind, GroupPattern, PatternList};
pub use stack_source::{FilterStackSource, FilterStats};
