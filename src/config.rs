use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tracing::info;

use crate::bucket::WeekPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Weekly table with a `Data` column (DD/MM/YYYY) and one column per metric
    #[arg(long, global = true, env = "WEEKLY_TRENDS_CSV", default_value = "dados_semanais.csv")]
    pub csv: PathBuf,

    /// Week-of-month definition: day-range, calendar-aligned, explicit-range or month-grid
    #[arg(long, global = true, env = "WEEKLY_TRENDS_POLICY", default_value = "day-range")]
    pub policy: WeekPolicy,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl Config {
    pub fn log_summary(&self) {
        info!(
            csv = %self.csv.display(),
            policy = %self.policy,
            format = ?self.format,
            "configuration resolved"
        );
    }
}
