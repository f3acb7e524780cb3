use anyhow::Result;
use clap::{Parser, Subcommand};
use log::warn;

use expense_migrate::config::{LoadConfig, RepairConfig, TransformConfig};
use expense_migrate::migration::{load, repair, transform};

#[derive(Parser)]
#[command(name = "expense-migrate")]
#[command(author, version, about = "One-shot migration and repair passes for the expense table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the spreadsheet export into per-record and aggregate JSON files
    Transform(TransformConfig),

    /// Sanitize the aggregate JSON and upsert every record into the table
    Load(LoadConfig),

    /// Recompute grandTotal from line items and patch mismatching records
    Repair(RepairConfig),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transform(config) => {
            let report = transform::run(&config)?;
            let skipped = report.failures().count();
            if skipped > 0 {
                warn!("{} rows were skipped and need fixing in {}", skipped, config.csv_path.display());
            }
        },
        Commands::Load(config) => {
            let mut table = config.table.open()?;
            load::run(&config, &mut table)?;
        },
        Commands::Repair(config) => {
            let mut table = config.table.open()?;
            repair::run(&mut table)?;
        },
    }

    Ok(())
}
