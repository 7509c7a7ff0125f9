use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labtrack_core::traversal::{HopLimit, TraversalDirection};
use labtrack_schemas::event::LabEventType;
use std::{fs, path::PathBuf, time::Duration};

mod config;
mod workflow;

/// Track lab vessels, the transfers between them, and where they are stored.
#[derive(Debug, Parser)]
#[command(name = "labtrack", version)]
struct Cli {
    /// Config file (defaults to ./labtrack.yaml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset directory, overriding the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Direction {
    Ancestors,
    Descendants,
}

impl From<Direction> for TraversalDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Ancestors => TraversalDirection::Ancestors,
            Direction::Descendants => TraversalDirection::Descendants,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk the transfer graph from a vessel and print every node reached.
    Trace {
        label: String,
        /// Start at one position of the container instead of the whole vessel.
        #[arg(long)]
        position: Option<String>,
        #[arg(long, value_enum, default_value = "ancestors")]
        direction: Direction,
        /// Maximum hops; 0 for no bound. Defaults to the config value.
        #[arg(long)]
        hops: Option<u32>,
        /// Only follow events of this type on the first hop, e.g. POOLING_TRANSFER.
        #[arg(long)]
        start_event: Option<String>,
        /// Include positions that hold no vessel.
        #[arg(long)]
        include_empty: bool,
        /// Write the trace as CSV into the report directory.
        #[arg(long)]
        report: bool,
    },
    /// List the plates directly upstream of a plate.
    Parents {
        label: String,
        /// List the plates directly downstream instead.
        #[arg(long)]
        children: bool,
    },
    /// Resolve every row of an index upload CSV to a molecular indexing scheme and save
    /// new schemes into the dataset.
    ImportIndexes {
        file: PathBuf,
        /// Resolve rows and report new schemes without saving them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Load a storage location export CSV and save new locations into the dataset.
    ImportStorage {
        file: PathBuf,
        /// Check the export without saving it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Count what the dataset holds.
    Summary,
}

fn parse_event_type(name: &str) -> Result<LabEventType> {
    serde_yaml::from_str(&name.trim().to_ascii_uppercase())
        .with_context(|| format!("Unknown lab event type: {}", name))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut app_config = config::AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        app_config.data_dir = data_dir;
    }
    let mut dataset = config::LabDataset::load(&app_config.data_dir, &app_config.schema_version)?;

    match cli.command {
        Command::Trace {
            label,
            position,
            direction,
            hops,
            start_event,
            include_empty,
            report,
        } => {
            let request = workflow::TraceRequest {
                label,
                position,
                direction: direction.into(),
                hop_limit: HopLimit::from(hops.unwrap_or(app_config.default_hop_limit)),
                start_event_type: start_event.as_deref().map(parse_event_type).transpose()?,
                deadline: app_config.traversal_deadline_ms.map(Duration::from_millis),
                include_empty_positions: include_empty,
            };
            let report_path = if report {
                fs::create_dir_all(&app_config.report_dir).with_context(|| {
                    format!("Failed to create report directory: {:?}", app_config.report_dir)
                })?;
                Some(app_config.report_dir.join(format!(
                    "trace_{}_{}.csv",
                    request.label,
                    chrono::Utc::now().format("%Y%m%d_%H%M%S")
                )))
            } else {
                None
            };
            let outcome = workflow::run_trace(&dataset, &request, report_path.as_deref())?;
            workflow::print_trace(&outcome);
        }
        Command::Parents { label, children } => {
            let plates = workflow::plate_neighbours(&dataset, &label, children)?;
            if plates.is_empty() {
                println!("{} has no {}.", label, if children { "child plates" } else { "parent plates" });
            }
            for plate in plates {
                println!("{}", plate);
            }
        }
        Command::ImportIndexes { file, dry_run } => {
            let report = workflow::import_indexes(&mut dataset.schemes, &file, !dry_run)?;
            for name in &report.schemes {
                println!("{}", name);
            }
            for error in &report.errors {
                eprintln!("row {}: {}", error.row, error.message);
            }
            if dry_run {
                println!("Dry run: {} new schemes not saved.", report.created.len());
            } else if let Some(path) = config::LabDataset::save_indexing_schemes(
                &app_config.data_dir,
                &app_config.schema_version,
                &report.created,
            )? {
                println!("Saved {} new schemes to {:?}.", report.created.len(), path);
            }
        }
        Command::ImportStorage { file, dry_run } => {
            let report = workflow::import_storage(dataset.store.storage_mut(), &file)?;
            println!(
                "Created {} locations ({} already present) in {} passes.",
                report.counts.created, report.counts.already_present, report.counts.passes
            );
            if dry_run {
                println!("Dry run: nothing saved.");
            } else if let Some(path) = config::LabDataset::save_storage_locations(
                &app_config.data_dir,
                &app_config.schema_version,
                report.created,
            )? {
                println!("Saved new locations to {:?}.", path);
            }
        }
        Command::Summary => {
            let summary = workflow::summarize(&dataset.store, &dataset.schemes);
            workflow::print_summary_report(&summary);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_types_parse_case_insensitively() {
        assert_eq!(parse_event_type("pooling_transfer").unwrap(), LabEventType::PoolingTransfer);
        assert!(parse_event_type("MIXING").is_err());
    }

    #[test]
    fn cli_parses_trace_options() {
        let cli = Cli::try_parse_from([
            "labtrack", "trace", "PLATE1", "--position", "A01", "--direction", "descendants",
            "--hops", "2",
        ])
        .unwrap();
        match cli.command {
            Command::Trace { label, position, hops, direction, .. } => {
                assert_eq!(label, "PLATE1");
                assert_eq!(position.as_deref(), Some("A01"));
                assert_eq!(hops, Some(2));
                assert!(matches!(direction, Direction::Descendants));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn imports_accept_a_dry_run_flag() {
        let cli = Cli::try_parse_from(["labtrack", "import-storage", "export.csv", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::ImportStorage { dry_run: true, .. }));
        let cli = Cli::try_parse_from(["labtrack", "import-indexes", "upload.csv"]).unwrap();
        assert!(matches!(cli.command, Command::ImportIndexes { dry_run: false, .. }));
    }
}
