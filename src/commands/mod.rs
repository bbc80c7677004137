//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod analyze;
pub mod focus;
pub mod models;
pub mod utils;

// Re-export main command functions
pub use analyze::{execute_analyze, validate_args};
pub use focus::execute_focus;
pub use models::{AnalyzeArgs, FilterOptions, FocusArgs};
pub use utils::{build_tree, display_version, validate_report_file};
