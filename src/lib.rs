//! Calltree Studio
//!
//! Aggregates sampled call stacks into a call tree and derives
//! sum-by-name rollups, caller/callee views and XML/JSON reports.
//!
//! This crate provides the core implementation for the
//! `calltree` CLI tool.
//!
//! ## Getting Started
//!
//! ```
//! use calltree_studio::source::InMemoryStackSource;
//! use calltree_studio::tree::CallTree;
//!
//! let mut source = InMemoryStackSource::new();
//! source.add_path_sample(&["main", "work"], 1.0, 0.0);
//! let tree = CallTree::from_source(&mut source);
//! assert_eq!(tree.top().inclusive_metric, 1.0);
//! ```

pub mod commands;
pub mod filter;
pub mod output;
pub mod source;
pub mod tree;
pub mod utils;
