use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

/// shiftgrade - adaptive baselines and strict service grading
#[derive(Parser)]
#[command(name = "shiftgrade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Learn restaurant baselines and grade service windows", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (defaults to ./.shiftgrade, then ~/.shiftgrade)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, default config and database
    Init,

    /// Learn hourly observations from a JSON file
    Learn {
        /// JSON array of {location, category, hour, day_of_week, volume, staffing}
        #[arg(long)]
        input: PathBuf,
    },

    /// Show learned patterns for a location
    Show {
        #[arg(long)]
        location: String,
        /// Lobby, Drive-Thru or ToGo
        #[arg(long)]
        category: Option<String>,
        /// Hour of day (with --day, fetch one key through the fallback chain)
        #[arg(long, requires = "day")]
        hour: Option<u8>,
        /// Day of week, 0-6
        #[arg(long, requires = "hour")]
        day: Option<u8>,
        /// Only return the exact key
        #[arg(long)]
        no_fallback: bool,
    },

    /// Delete all patterns for a location
    Clear {
        #[arg(long)]
        location: String,
    },

    /// Grade a day of service windows from a JSON file
    Grade {
        /// JSON {location, weekday, history: [...], service: [...]}
        #[arg(long)]
        input: PathBuf,
    },

    /// Show current status and pattern counts
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // stdout carries JSON output
        .init();

    let data_dir = shiftgrade::storage::data_dir(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Init => {
            info!("Initializing shiftgrade in {:?}", data_dir);
            commands::init(&data_dir)?;
        }
        Commands::Learn { input } => {
            commands::learn(&data_dir, &input)?;
        }
        Commands::Show { location, category, hour, day, no_fallback } => {
            commands::show(&data_dir, &location, category.as_deref(), hour.zip(day), !no_fallback)?;
        }
        Commands::Clear { location } => {
            commands::clear(&data_dir, &location)?;
        }
        Commands::Grade { input } => {
            commands::grade(&data_dir, &input)?;
        }
        Commands::Status => {
            commands::status(&data_dir)?;
        }
    }

    Ok(())
}
