//! Configuration and constants shared by the library and the CLI.

/// Current JSON rollup report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Display name of the synthetic node at the top of every call tree
pub const ROOT_NAME: &str = "ROOT";

/// Display name of the synthetic sibling that sums filtered-out nodes in XML reports
pub const FILTERED_NODES_NAME: &str = "$FilteredNodes";

/// Number of by-name entries printed in text summaries
pub const DEFAULT_TOP_ENTRIES: usize = 20;

/// Fold threshold used when `--fold-threshold` is given without a value.
///
/// Nodes whose inclusive sample count is at or below this are merged into
/// their caller. Never applied implicitly.
pub const DEFAULT_FOLD_THRESHOLD: f64 = 2.0;

/// Relative tolerance used when checking aggregation invariants in debug builds
pub const METRIC_EPSILON: f64 = 1e-9;

/// Separator between entries of a pattern list (`IncludeRegExs` etc.)
pub const PATTERN_LIST_SEPARATOR: char = ';';
