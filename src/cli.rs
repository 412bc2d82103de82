use chrono::TimeDelta;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "cloudsweep")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Find and delete ephemeral cloud resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List, filter and delete resources described by a config file
    Run(RunArgs),

    /// Check a config file without calling the provider
    Validate {
        /// Config file (default: ~/.config/cloudsweep/config.toml)
        config: Option<String>,
    },

    /// List supported resource types in deletion order
    Types,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Run
// ============================================================================

#[derive(Parser)]
pub struct RunArgs {
    /// Config file (default: ~/.config/cloudsweep/config.toml)
    pub config: Option<String>,

    /// Only show what would be deleted
    #[arg(short, long, conflicts_with = "force")]
    pub dry_run: bool,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub force: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Regions to sweep, replacing the configured list (repeatable)
    #[arg(short, long = "region")]
    pub regions: Vec<String>,

    /// Named credentials profile
    #[arg(short, long, env = "CLOUDSWEEP_PROFILE")]
    pub profile: Option<String>,

    /// Number of deletions in flight at once
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub workers: Option<u32>,

    /// Evaluate age filters as if now were shifted by this duration (e.g. "7d", "-2h")
    #[arg(long, value_parser = parse_time_shift, allow_hyphen_values = true)]
    pub time_shift: Option<TimeDelta>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_time_shift(value: &str) -> Result<TimeDelta, String> {
    sweepkit::parse_duration(value).map_err(|e| e.to_string())
}
