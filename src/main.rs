//! truenasctl CLI entrypoint.
//!
//! A small operational companion to the provisioning library: connection
//! checks and read-only queries against a TrueNAS appliance.

use std::path::PathBuf;
use std::process::ExitCode;

use truenas_provision::api::{ApiClient, TrueNasClient};
use truenas_provision::config::{load_dotenv, Config};
use truenas_provision::error::Result;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Declarative provisioning companion for TrueNAS appliances.
#[derive(Debug, Parser)]
#[command(name = "truenasctl", version, about)]
struct Cli {
    /// Path to the connection configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Checks connectivity and authentication against the appliance.
    Ping,
    /// Queries a resource collection and prints the raw entries.
    Query {
        /// Resource kind: cronjob, cloudsync, user, group, vm, or dataset.
        resource: String,
        /// Restrict to a single remote id.
        #[arg(long)]
        id: Option<i64>,
    },
    /// Shows the lifecycle status of a virtual machine.
    VmStatus {
        /// Remote id of the VM.
        #[arg(long)]
        id: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    load_dotenv();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    debug!("Connecting to {}", config.url);

    let client = TrueNasClient::with_options(
        &config.url,
        &config.api_key,
        config.timeout_secs,
        config.verify_tls,
    )?;

    match cli.command {
        Commands::Ping => cmd_ping(&client).await,
        Commands::Query { resource, id } => cmd_query(&client, &resource, id).await,
        Commands::VmStatus { id } => cmd_vm_status(&client, id).await,
    }
}

async fn cmd_ping(client: &TrueNasClient) -> Result<()> {
    let response = client.call("core.ping", json!([])).await?;
    println!("{} {response}", "Appliance reachable:".green().bold());
    Ok(())
}

async fn cmd_query(client: &TrueNasClient, resource: &str, id: Option<i64>) -> Result<()> {
    let method = query_method(resource)?;
    let params = id.map_or_else(|| json!([]), |id| json!([[["id", "=", id]]]));

    let response = client.call(method, params).await?;
    let rendered = serde_json::to_string_pretty(&response)
        .unwrap_or_else(|_| response.to_string());
    println!("{rendered}");
    Ok(())
}

async fn cmd_vm_status(client: &TrueNasClient, id: i64) -> Result<()> {
    let response = client.call("vm.status", json!([id])).await?;
    let state = response
        .get("state")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("UNKNOWN");

    let colored_state = match state {
        "RUNNING" => state.green().bold(),
        "STOPPED" => state.yellow().bold(),
        _ => state.red().bold(),
    };
    println!("VM {id}: {colored_state}");
    Ok(())
}

fn query_method(resource: &str) -> Result<&'static str> {
    let method = match resource {
        "cronjob" => "cronjob.query",
        "cloudsync" => "cloudsync.query",
        "user" => "user.query",
        "group" => "group.query",
        "vm" => "vm.query",
        "dataset" => "pool.dataset.query",
        other => {
            return Err(truenas_provision::ProvisionError::internal(format!(
                "Unknown resource kind {other:?}; expected cronjob, cloudsync, user, group, vm, or dataset"
            )));
        }
    };
    Ok(method)
}
