// crates/transfer-mesh-cli/src/main.rs
// ============================================================================
// Module: Transfer Mesh CLI Entry Point
// Description: Command dispatcher for running and querying mesh agents.
// Purpose: Start an agent from config or drive a remote agent over HTTP.
// Dependencies: clap, transfer-mesh-agent, transfer-mesh-config, tokio
// ============================================================================

//! ## Overview
//! `transfer-mesh serve` loads the config, installs logging, and runs one
//! agent until Ctrl-C. The remaining commands talk to a running agent with
//! [`HttpAgentClient`] and print JSON answers on stdout. This binary is the
//! only place where errors become a process exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use transfer_mesh_agent::AgentRuntime;
use transfer_mesh_agent::CatalogQuery;
use transfer_mesh_agent::HttpAgentClient;
use transfer_mesh_agent::init_logging;
use transfer_mesh_config::TransferMeshConfig;
use transfer_mesh_core::AgentClient;
use transfer_mesh_core::JobId;
use transfer_mesh_core::TransferRequest;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Whole-request timeout for client commands.
const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Connect timeout for client commands.
const CLIENT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "transfer-mesh", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an agent until interrupted.
    Serve(ServeCommand),
    /// Show identity, catalog backend, and dispatcher load of an agent.
    Status(AgentArgs),
    /// Show the membership table of an agent.
    Agents(AgentArgs),
    /// List logical file names cataloged by an agent.
    Files(FilesCommand),
    /// Submit a transfer request to an agent.
    Request(RequestCommand),
    /// Show retained jobs of an agent.
    Jobs(JobsCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Config file path (defaults to `TRANSFER_MESH_CONFIG` or ./transfer-mesh.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Bootstrap agent URL, overriding `[agent].bootstrap`.
    #[arg(long, value_name = "URL")]
    bootstrap: Option<String>,
}

/// Target agent selection.
#[derive(Args, Debug, Clone)]
struct AgentArgs {
    /// Base URL of the agent to query.
    #[arg(long, value_name = "URL")]
    agent: String,
}

/// Catalog filter flags.
#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Dataset name.
    #[arg(long, value_name = "NAME", default_value = "")]
    dataset: String,
    /// Block name.
    #[arg(long, value_name = "NAME", default_value = "")]
    block: String,
    /// Logical file name.
    #[arg(long, value_name = "LFN", default_value = "")]
    lfn: String,
}

/// Arguments for the `files` command.
#[derive(Args, Debug)]
struct FilesCommand {
    /// Target agent.
    #[command(flatten)]
    target: AgentArgs,
    /// Catalog filter.
    #[command(flatten)]
    filter: FilterArgs,
}

/// Arguments for the `request` command.
#[derive(Args, Debug)]
struct RequestCommand {
    /// Agent that runs the job.
    #[command(flatten)]
    target: AgentArgs,
    /// Source agent alias.
    #[arg(long, value_name = "ALIAS")]
    src: String,
    /// Destination agent alias (defaults to the target agent).
    #[arg(long, value_name = "ALIAS", default_value = "")]
    dst: String,
    /// Catalog filter selecting the files to move.
    #[command(flatten)]
    filter: FilterArgs,
}

/// Arguments for the `jobs` command.
#[derive(Args, Debug)]
struct JobsCommand {
    /// Target agent.
    #[command(flatten)]
    target: AgentArgs,
    /// Show a single job.
    #[arg(long, value_name = "ID")]
    id: Option<u64>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Check {
        /// Config file path.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

impl FilterArgs {
    /// Returns the catalog query for these flags.
    fn to_query(&self) -> CatalogQuery {
        CatalogQuery {
            dataset: self.dataset.clone(),
            block: self.block.clone(),
            lfn: self.lfn.clone(),
        }
    }
}

impl RequestCommand {
    /// Builds the transfer request submitted to the agent.
    fn to_request(&self) -> TransferRequest {
        TransferRequest {
            dataset: self.filter.dataset.clone(),
            block: self.filter.block.clone(),
            file: self.filter.lfn.clone(),
            src: self.src.clone(),
            dst: self.dst.clone(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying the message printed on stderr.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Status(target) => command_status(&target).await,
        Commands::Agents(target) => command_agents(&target).await,
        Commands::Files(command) => command_files(&command).await,
        Commands::Request(command) => command_request(&command).await,
        Commands::Jobs(command) => command_jobs(&command).await,
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Check {
                config,
            } => command_config_check(config),
        },
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config)?;
    init_logging(&config.logging).map_err(|err| CliError::new(err.to_string()))?;
    let runtime = AgentRuntime::start(config)
        .await
        .map_err(|err| CliError::new(format!("agent startup failed: {err}")))?;
    let snapshot = runtime
        .run(command.bootstrap.as_deref())
        .await
        .map_err(|err| CliError::new(format!("agent failed: {err}")))?;
    info!(
        completed = snapshot.completed,
        failed = snapshot.failed,
        rejected = snapshot.rejected,
        "agent exited"
    );
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Client Commands
// ============================================================================

/// Executes the `status` command.
async fn command_status(target: &AgentArgs) -> CliResult<ExitCode> {
    let status = client()?.status(&target.agent).await.map_err(remote_error)?;
    write_json(&status)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `agents` command.
async fn command_agents(target: &AgentArgs) -> CliResult<ExitCode> {
    let agents = client()?.agents(&target.agent).await.map_err(remote_error)?;
    write_json(&agents)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `files` command.
async fn command_files(command: &FilesCommand) -> CliResult<ExitCode> {
    let files = client()?
        .files(&command.target.agent, &command.filter.to_query())
        .await
        .map_err(remote_error)?;
    for lfn in files {
        write_stdout_line(&lfn)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `request` command.
async fn command_request(command: &RequestCommand) -> CliResult<ExitCode> {
    let request = command.to_request();
    request.validate_for_dispatch().map_err(CliError::new)?;
    let accepted =
        client()?.submit(&command.target.agent, &request).await.map_err(remote_error)?;
    write_json(&accepted)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `jobs` command.
async fn command_jobs(command: &JobsCommand) -> CliResult<ExitCode> {
    let client = client()?;
    match command.id {
        Some(id) => {
            let job = client
                .job(&command.target.agent, JobId::new(id))
                .await
                .map_err(remote_error)?;
            write_json(&job)?;
        }
        None => {
            let jobs = client.jobs(&command.target.agent).await.map_err(remote_error)?;
            write_json(&jobs)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the `config check` command.
fn command_config_check(path: Option<PathBuf>) -> CliResult<ExitCode> {
    let config = load_config(path)?;
    write_stdout_line(&format!(
        "config ok: alias={} url={} catalog={}",
        config.agent.alias,
        config.agent.url,
        config.catalog.catalog_type.as_str()
    ))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates the config.
fn load_config(path: Option<PathBuf>) -> CliResult<TransferMeshConfig> {
    TransferMeshConfig::load(path.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Builds the HTTP client used by client commands.
fn client() -> CliResult<HttpAgentClient> {
    HttpAgentClient::new(CLIENT_REQUEST_TIMEOUT, CLIENT_CONNECT_TIMEOUT)
        .map_err(|err| CliError::new(err.to_string()))
}

/// Wraps a remote failure.
fn remote_error(err: transfer_mesh_core::ClientError) -> CliError {
    CliError::new(format!("agent request failed: {err}"))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to encode output: {err}")))?;
    write_stdout_line(&text)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
