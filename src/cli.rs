use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "palmwater",
    version,
    about = "Plantation irrigation planner with forecast-gated watering"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run interactive setup
    Init,
    /// Validate config, open the database and test the forecast provider
    Check,
    /// Add a zone to the plan for a date
    Add {
        /// Plan date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// `circle LAT,LON RADIUS_M` or `polygon LAT,LON; LAT,LON; ...`
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        geometry: Vec<String>,
    },
    /// Toggle watering for a zone (1-based, as listed by `report`)
    Toggle {
        #[arg(long)]
        date: Option<NaiveDate>,
        zone: usize,
    },
    /// Refresh eligibility and print the receipt for a date
    Report {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Also print the WhatsApp link for the admin
        #[arg(long)]
        whatsapp: bool,
        /// Write the receipt into this directory
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the daily forecast outlook at the plantation
    Outlook,
}
