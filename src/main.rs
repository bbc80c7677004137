//! Calltree Studio CLI
//!
//! Builds call trees from collapsed stack samples and writes
//! XML call-tree, caller/callee and JSON rollup reports.

use anyhow::Result;
use calltree_studio::commands::{
    display_version, execute_analyze, execute_focus, validate_args, validate_report_file,
    AnalyzeArgs, FilterOptions, FocusArgs,
};
use calltree_studio::utils::config::{DEFAULT_FOLD_THRESHOLD, DEFAULT_TOP_ENTRIES};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// Calltree Studio - call-tree aggregation for sampled stacks
#[derive(Parser, Debug)]
#[command(name = "calltree")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Frame and sample filter flags
#[derive(Args, Debug)]
struct FilterFlags {
    /// TOML file with filter settings (flags override its values)
    #[arg(long, env = "CALLTREE_FILTER")]
    filter: Option<PathBuf>,

    /// Keep only samples with a frame matching one of these patterns (';'-separated)
    #[arg(long)]
    include: Option<String>,

    /// Drop samples with a frame matching one of these patterns
    #[arg(long)]
    exclude: Option<String>,

    /// Fold frames matching these patterns into their caller
    #[arg(long)]
    fold: Option<String>,

    /// Group specs, `pattern->name` or `pattern=>name`
    #[arg(long)]
    group: Option<String>,

    /// Ignore samples before this time (msec)
    #[arg(long)]
    start: Option<f64>,

    /// Ignore samples after this time (msec)
    #[arg(long)]
    end: Option<f64>,

    /// Keep only samples from these thread ids
    #[arg(long = "thread", value_delimiter = ',')]
    threads: Vec<u32>,

    /// Keep only samples from these process ids
    #[arg(long = "process", value_delimiter = ',')]
    processes: Vec<u32>,

    /// Keep only samples from processes with these names
    #[arg(long = "process-name", value_delimiter = ',')]
    process_names: Vec<String>,

    /// Entry groups (`=>`) also absorb everything their members call
    #[arg(long)]
    fold_group_callees: bool,
}

impl From<FilterFlags> for FilterOptions {
    fn from(flags: FilterFlags) -> Self {
        FilterOptions {
            config: flags.filter,
            include: flags.include,
            exclude: flags.exclude,
            fold: flags.fold,
            group: flags.group,
            start_msec: flags.start,
            end_msec: flags.end,
            thread_ids: flags.threads,
            process_ids: flags.processes,
            process_names: flags.process_names,
            fold_group_callees: flags.fold_group_callees,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a call tree and write reports
    Analyze {
        /// Collapsed-stack input file (`a;b;c weight` per line)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        filters: FilterFlags,

        /// Fold nodes with an inclusive count at or below this value (2 when no value is given)
        #[arg(long, num_args = 0..=1)]
        fold_threshold: Option<Option<f64>>,

        /// Output path for the XML call tree
        #[arg(long)]
        xml: Option<PathBuf>,

        /// Summarize callees below this percentage of the root into $FilteredNodes
        #[arg(long)]
        percent: Option<f64>,

        /// Output path for the JSON rollup
        #[arg(long)]
        json: Option<PathBuf>,

        /// Number of names to report
        #[arg(long, default_value_t = DEFAULT_TOP_ENTRIES)]
        top: usize,

        /// Keep module paths in frame names
        #[arg(long)]
        full_names: bool,
    },

    /// Show callers and callees of one frame name
    Focus {
        /// Collapsed-stack input file
        #[arg(short, long)]
        input: PathBuf,

        /// Frame name to focus on
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        filters: FilterFlags,

        /// Output path for the XML caller/callee report
        #[arg(long)]
        xml: Option<PathBuf>,
    },

    /// Validate a rollup JSON file
    Validate {
        /// Path to rollup JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Analyze {
            input,
            filters,
            fold_threshold,
            xml,
            percent,
            json,
            top,
            full_names,
        } => {
            let args = AnalyzeArgs {
                input,
                filter: filters.into(),
                fold_threshold: fold_threshold
                    .map(|threshold| threshold.unwrap_or(DEFAULT_FOLD_THRESHOLD)),
                output_xml: xml,
                percent,
                output_json: json,
                top,
                full_names,
            };

            // Validate args first
            validate_args(&args)?;

            execute_analyze(args)?;
        }

        Commands::Focus {
            input,
            name,
            filters,
            xml,
        } => {
            execute_focus(FocusArgs {
                input,
                name,
                filter: filters.into(),
                output_xml: xml,
            })?;
        }

        Commands::Validate { file } => {
            validate_report_file(&file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
