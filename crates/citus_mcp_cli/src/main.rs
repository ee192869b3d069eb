//! citus-mcp: MCP server exposing operational tooling for a Citus cluster.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use citus_db::{create_pool, PoolConfig};
use citus_logging::{init_logging, LogConfig};
use citus_mcp::capabilities::Capabilities;
use citus_mcp::cache::ResultCache;
use citus_mcp::config::Mode;
use citus_mcp::guardrails::Guardrails;
use citus_mcp::security::OutputBudget;
use citus_mcp::server::{Server, ServerConfig};
use citus_mcp::tools::ToolContext;
use citus_mcp::worker_manager::WorkerManager;
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::CliOverrides;

#[derive(Parser, Debug)]
#[command(name = "citus-mcp", about = "MCP operational tooling for a Citus cluster")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server on stdio (default command)
    Serve(ServeArgs),
    /// Load and validate configuration, then exit without starting a server
    CheckConfig(ServeArgs),
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Coordinator DSN (also accepted positionally)
    #[arg(long)]
    coordinator: Option<String>,

    /// Coordinator DSN, given positionally instead of via --coordinator
    #[arg(value_name = "DSN")]
    coordinator_positional: Option<String>,

    /// Path to a config file; overrides the default search list
    #[arg(long)]
    config: Option<PathBuf>,

    /// read-only (default) or admin
    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    /// Allow execute-class tools to run (still gated behind approval tokens)
    #[arg(long)]
    allow_execute: bool,

    /// Append an NDJSON audit trail of dispatched tool calls to this path
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Transport to serve over. Only "stdio" is implemented; anything else
    /// is the embedding deployment's concern and is rejected here.
    #[arg(long, default_value = "stdio")]
    transport: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMode {
    ReadOnly,
    Admin,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::ReadOnly => Mode::ReadOnly,
            CliMode::Admin => Mode::Admin,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve(ServeArgs {
        coordinator: None,
        coordinator_positional: None,
        config: None,
        mode: None,
        allow_execute: false,
        audit_log: None,
        transport: "stdio".to_string(),
    }));

    init_logging(LogConfig {
        app_name: "citus-mcp",
        verbose: cli.verbose,
        quiet_console: true,
    })
    .context("failed to initialize logging")?;

    match command {
        Commands::CheckConfig(args) => {
            let loaded = resolve_config(args)?;
            println!(
                "config ok: mode={:?} allow_execute={} max_rows={} coordinator={}",
                loaded.configuration.mode,
                loaded.configuration.allow_execute,
                loaded.configuration.max_rows,
                citus_db::redact_dsn(&loaded.configuration.coordinator_dsn),
            );
            Ok(())
        }
        Commands::Serve(args) => {
            if args.transport != "stdio" {
                bail!(
                    "transport '{}' is not implemented by this binary; only stdio is wired up \
                     (sse/streamable-http are the embedding deployment's concern)",
                    args.transport
                );
            }
            let loaded = resolve_config(args)?;
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start tokio runtime")?
                .block_on(serve(loaded))
        }
    }
}

fn resolve_config(args: ServeArgs) -> Result<config::LoadedConfig> {
    let coordinator_dsn = args.coordinator.or(args.coordinator_positional);
    let overrides = CliOverrides {
        coordinator_dsn,
        mode: args.mode.map(Mode::from),
        allow_execute: if args.allow_execute { Some(true) } else { None },
        audit_log_path: args.audit_log,
        config_path: args.config,
    };
    config::load(overrides).map_err(Into::into)
}

async fn serve(loaded: config::LoadedConfig) -> Result<()> {
    let configuration = Arc::new(loaded.configuration);

    let coordinator_pool = create_pool(
        &PoolConfig::new(configuration.coordinator_dsn.clone())
            .with_application_name(configuration.application_name.clone())
            .with_connect_timeout_secs(configuration.connect_timeout_secs)
            .with_statement_timeout_ms(configuration.statement_timeout_ms)
            .with_max_connections(10),
    )
    .await
    .context("failed to connect to coordinator")?;

    let capabilities = Arc::new(Capabilities::probe(&coordinator_pool).await);

    let workers = Arc::new(WorkerManager::new(
        coordinator_pool,
        configuration.fan_out_concurrency,
        Duration::from_secs(configuration.connect_timeout_secs),
        configuration.statement_timeout_ms,
    ));
    workers
        .refresh()
        .await
        .map_err(anyhow::Error::from)
        .context("failed to discover worker topology")?;

    let guardrails = Arc::new(Guardrails::new(&configuration));
    let cache = Arc::new(ResultCache::new());
    let output_budget = Arc::new(OutputBudget::new(
        configuration.max_rows,
        configuration.max_text_bytes,
    ));

    let ctx = ToolContext {
        config: configuration.clone(),
        workers,
        guardrails,
        cache,
        capabilities,
        output_budget,
    };

    let server_config = ServerConfig {
        server_name: "citus-mcp".to_string(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        audit_log_path: loaded.audit_log_path,
    };

    let mut server = Server::new(server_config, ctx)?;
    server.run().await
}
