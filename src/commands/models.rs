use crate::filter::FilterParams;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Filter settings shared by every command that builds a tree
///
/// A TOML file (if any) is loaded first, then each flag that was given
/// replaces the matching field.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// TOML file with `FilterParams` keys
    pub config: Option<PathBuf>,

    pub include: Option<String>,
    pub exclude: Option<String>,
    pub fold: Option<String>,
    pub group: Option<String>,

    pub start_msec: Option<f64>,
    pub end_msec: Option<f64>,

    pub thread_ids: Vec<u32>,
    pub process_ids: Vec<u32>,
    pub process_names: Vec<String>,

    /// Only turns the setting on; a config file can still enable it
    pub fold_group_callees: bool,
}

impl FilterOptions {
    /// Resolve the effective filter settings
    pub fn to_params(&self) -> Result<FilterParams> {
        let mut params = match &self.config {
            Some(path) => FilterParams::load(path)
                .with_context(|| format!("Failed to load filter config {}", path.display()))?,
            None => FilterParams::new(),
        };

        if let Some(include) = &self.include {
            params.include_reg_exs = include.clone();
        }
        if let Some(exclude) = &self.exclude {
            params.exclude_reg_exs = exclude.clone();
        }
        if let Some(fold) = &self.fold {
            params.fold_reg_exs = fold.clone();
        }
        if let Some(group) = &self.group {
            params.group_reg_exs = group.clone();
        }
        if self.start_msec.is_some() {
            params.start_time_rel_msec = self.start_msec;
        }
        if self.end_msec.is_some() {
            params.end_time_rel_msec = self.end_msec;
        }
        if !self.thread_ids.is_empty() {
            params.thread_ids = self.thread_ids.clone();
        }
        if !self.process_ids.is_empty() {
            params.process_ids = self.process_ids.clone();
        }
        if !self.process_names.is_empty() {
            params.process_names = self.process_names.clone();
        }
        if self.fold_group_callees {
            params.fold_group_callees = true;
        }

        params.validate().context("Invalid filter settings")?;
        Ok(params)
    }
}

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Collapsed-stack input file
    pub input: PathBuf,

    pub filter: FilterOptions,

    /// Fold nodes whose inclusive count is at or below this
    pub fold_threshold: Option<f64>,

    /// Output path for the XML call tree (optional)
    pub output_xml: Option<PathBuf>,

    /// Only report callees at or above this share of the root
    pub percent: Option<f64>,

    /// Output path for the JSON rollup (optional)
    pub output_json: Option<PathBuf>,

    /// Number of names in the rollup table and JSON report
    pub top: usize,

    /// Ask the source for full frame names
    pub full_names: bool,
}

/// Arguments for the focus command
#[derive(Debug, Clone)]
pub struct FocusArgs {
    /// Collapsed-stack input file
    pub input: PathBuf,

    /// Frame name to focus on
    pub name: String,

    pub filter: FilterOptions,

    /// Output path for the XML caller/callee report (optional)
    pub output_xml: Option<PathBuf>,
}
