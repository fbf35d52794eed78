use std::net::SocketAddr;
use std::path::PathBuf;

use admission_portal::config::{Config, ConfigOverrides};
use admission_portal::eligibility::evaluator::evaluate;
use admission_portal::eligibility::{AcademicRecord, EligibilityResult, Track};
use admission_portal::output::csv::applications_to_csv;
use admission_portal::output::json::render_json;
use admission_portal::output::table::{render_applications_table, render_result_table};
use admission_portal::server::run_server;
use admission_portal::storage::{PortalStore, StoredApplication};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "admission-portal",
    about = "University admission portal with a deterministic eligibility-scoring core"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score an academic record from a JSON file without persisting it.
    Evaluate {
        record: PathBuf,
    },
    /// List stored applications.
    Applications,
    /// Run the portal HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        db_path: cli.db.clone(),
    });

    match &cli.command {
        Commands::Evaluate { record } => {
            let data = std::fs::read_to_string(record)
                .with_context(|| format!("failed reading record: {}", record.display()))?;
            let record: AcademicRecord = serde_json::from_str(&data)
                .with_context(|| "failed parsing academic record JSON")?;
            let result = evaluate(&record)?;
            print_result(record.track(), &result, cli.output)?;
            if !result.passed() {
                println!("Requirement: {}", record.track().requirement());
            }
        }
        Commands::Applications => {
            let store = PortalStore::open(&config.resolved_db_path())?;
            let applications = store.all_applications()?;
            print_applications(&applications, cli.output)?;
        }
        Commands::Serve { host, port } => {
            let host = host.clone().unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            run_server(config, addr).await?;
        }
        Commands::Config { init, show } => {
            if *init {
                Config::write_template(&config_path)?;
                println!("Wrote config template to {}", config_path.display());
            }
            if *show || !*init {
                println!("{}", render_json(&config)?);
            }
        }
    }

    Ok(())
}

fn print_result(track: Track, result: &EligibilityResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_result_table(track, result)),
        OutputFormat::Json => println!("{}", render_json(result)?),
        OutputFormat::Csv => {
            warn!("CSV output for evaluate not implemented, using JSON");
            println!("{}", render_json(result)?);
        }
    }
    Ok(())
}

fn print_applications(applications: &[StoredApplication], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_applications_table(applications)),
        OutputFormat::Json => println!("{}", render_json(applications)?),
        OutputFormat::Csv => println!("{}", applications_to_csv(applications)?),
    }
    Ok(())
}
