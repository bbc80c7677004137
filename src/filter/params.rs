//! Filter configuration.
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! StartTimeRelMSec = 100.0
//! EndTimeRelMSec = 2500.0
//! IncludeRegExs = "app!*"
//! ExcludeRegExs = "*Idle*"
//! FoldRegExs = "ntdll!*;kernelbase!*"
//! GroupRegExs = "{%}!*=>module $1"
//! ThreadIds = [4312]
//! ```

use crate::utils::error::FilterError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Sample and frame filter settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FilterParams {
    /// Drop samples taken before this time
    #[serde(rename = "StartTimeRelMSec")]
    pub start_time_rel_msec: Option<f64>,

    /// Drop samples taken after this time
    #[serde(rename = "EndTimeRelMSec")]
    pub end_time_rel_msec: Option<f64>,

    /// Keep only samples with at least one frame matching one of these
    pub include_reg_exs: String,

    /// Drop samples with a frame matching one of these
    pub exclude_reg_exs: String,

    /// Fold matching frames into their caller
    pub fold_reg_exs: String,

    /// `pattern->name` / `pattern=>name` group specs
    pub group_reg_exs: String,

    /// Keep only samples from these threads (empty = all)
    pub thread_ids: Vec<u32>,

    /// Keep only samples from these processes (empty = all)
    pub process_ids: Vec<u32>,

    /// Keep only samples from processes with these names (empty = all)
    pub process_names: Vec<String>,

    /// Entry groups also absorb everything their members call
    pub fold_group_callees: bool,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load filter settings from a TOML file
    ///
    /// # Errors
    /// * `FilterError::ConfigRead` - If file cannot be read
    /// * `FilterError::ConfigParse` - If TOML is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let contents = fs::read_to_string(path)?;
        let params: FilterParams = toml::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject settings that can never select a sample
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(start), Some(end)) = (self.start_time_rel_msec, self.end_time_rel_msec) {
            if start > end {
                return Err(FilterError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }

    /// True if these settings leave every sample and frame untouched
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Time window `[start, end]`, open ends unbounded
    pub fn time_range(&self) -> Option<(f64, f64)> {
        if self.start_time_rel_msec.is_none() && self.end_time_rel_msec.is_none() {
            return None;
        }
        Some((
            self.start_time_rel_msec.unwrap_or(f64::NEG_INFINITY),
            self.end_time_rel_msec.unwrap_or(f64::INFINITY),
        ))
    }
}
