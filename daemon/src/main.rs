//! Sandbox daemon — entry point for the chain sandbox gateway.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use sandbox_launcher::{build_launcher, SigtermSignaler};
use sandbox_orchestrator::{
    solved_predicate_for, CommandDeployHandler, InstancePolicy, Orchestrator, SandboxConfig,
    ShutdownController,
};
use sandbox_rpc::{GatewayServer, GatewayState, RateLimit};
use sandbox_store::{FsRegistry, InstanceRegistry};
use sandbox_types::BackendKind;
use sandbox_utils::{format_duration, init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "sandbox-daemon", about = "Ephemeral per-team blockchain sandboxes")]
struct Cli {
    /// Chain family to serve: "evm", "starknet" or "solana".
    #[arg(long, env = "SANDBOX_BACKEND")]
    backend: Option<BackendKind>,

    /// Root directory for the instance registry and shared validator state.
    #[arg(long, env = "SANDBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Gateway HTTP port.
    #[arg(long, env = "SANDBOX_PORT")]
    port: Option<u16>,

    /// Seconds before an instance is reaped.
    #[arg(long, env = "SANDBOX_TTL_SECS")]
    ttl_secs: Option<u64>,

    /// Node executable (defaults to the family's standard binary).
    #[arg(long, env = "SANDBOX_NODE_BINARY")]
    node_binary: Option<PathBuf>,

    /// Program that deploys the challenge onto a fresh node.
    #[arg(long, env = "SANDBOX_DEPLOY_COMMAND")]
    deploy_command: Option<PathBuf>,

    /// Program that reports whether the challenge is solved.
    #[arg(long, env = "SANDBOX_SOLVED_COMMAND")]
    solved_command: Option<PathBuf>,

    /// Reward released by `/flag`.
    #[arg(long, env = "FLAG")]
    flag: Option<String>,

    /// Mint a throwaway ticket for callers that bring none.
    #[arg(long, env = "DISABLE_TICKET")]
    disable_ticket: bool,

    /// Leave instances running when the daemon stops.
    #[arg(long, env = "SANDBOX_KEEP_INSTANCES")]
    keep_instances: bool,

    /// Requests per minute each gateway route accepts (0 disables).
    #[arg(long, env = "SANDBOX_RATE_LIMIT")]
    rate_limit: Option<u64>,

    /// Log output: "human" or "json".
    #[arg(long, env = "SANDBOX_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level or filter directive, e.g. "info" or "sandbox_rpc=debug".
    #[arg(long, env = "SANDBOX_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "SANDBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the gateway until SIGINT/SIGTERM.
    Serve,
    /// Print the effective configuration as TOML.
    Config,
    /// Tear down every registered instance and the shared validator.
    Reap,
}

fn resolve_config(cli: &Cli) -> anyhow::Result<SandboxConfig> {
    let mut config = match &cli.config {
        Some(path) => SandboxConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SandboxConfig::default(),
    };

    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(port) = cli.port {
        config.listen_port = port;
    }
    if let Some(ttl) = cli.ttl_secs {
        config.instance_ttl_secs = ttl;
    }
    if cli.node_binary.is_some() {
        config.node_binary = cli.node_binary.clone();
    }
    if cli.deploy_command.is_some() {
        config.deploy_command = cli.deploy_command.clone();
    }
    if cli.solved_command.is_some() {
        config.solved_command = cli.solved_command.clone();
    }
    if let Some(flag) = &cli.flag {
        config.flag = flag.clone();
    }
    config.disable_ticket |= cli.disable_ticket;
    config.reap_on_shutdown &= !cli.keep_instances;
    if let Some(limit) = cli.rate_limit {
        config.rate_limit_per_minute = limit;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn build_orchestrator(config: &SandboxConfig, registry: Arc<dyn InstanceRegistry>) -> Orchestrator {
    let solved = solved_predicate_for(config.backend, config.solved_command.clone());
    if solved.is_none() {
        tracing::warn!(backend = %config.backend, "no solved check configured; /flag will report an error");
    }
    Orchestrator::new(
        build_launcher(config.backend, config.launcher_config()),
        registry,
        Arc::new(SigtermSignaler),
        solved,
        config.instance_ttl(),
    )
}

async fn serve(config: SandboxConfig) -> anyhow::Result<()> {
    let deploy_command = config
        .deploy_command
        .clone()
        .context("deploy_command must be set to serve challenges")?;
    let registry: Arc<dyn InstanceRegistry> = Arc::new(
        FsRegistry::open(config.registry_dir())
            .with_context(|| format!("opening registry at {}", config.registry_dir().display()))?,
    );
    let orchestrator = Arc::new(build_orchestrator(&config, registry.clone()));
    orchestrator.rearm_existing()?;

    let state = GatewayState::new(
        orchestrator.clone(),
        registry,
        Arc::new(CommandDeployHandler::new(deploy_command)),
        config.flag.clone(),
    )?
    .disable_ticket(config.disable_ticket)
    .rate_limit(RateLimit::per_minute(config.rate_limit_per_minute));
    if config.disable_ticket {
        tracing::warn!("tickets disabled: every caller gets a fresh team");
    }

    let shutdown = Arc::new(ShutdownController::new());
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.listen_for_signals().await })
    };

    tracing::info!(
        backend = %config.backend,
        port = config.listen_port,
        ttl = %format_duration(config.instance_ttl()),
        data_dir = %config.data_dir.display(),
        "starting sandbox gateway"
    );
    let stopped = shutdown.stopped();
    GatewayServer::new(config.listen_port, Arc::new(state))
        .start(async move {
            stopped.await;
        })
        .await
        .context("gateway server failed")?;
    signals.abort();

    shutdown
        .drain(&orchestrator, InstancePolicy::from_reap_flag(config.reap_on_shutdown))
        .await?;
    tracing::info!("sandbox daemon exited cleanly");
    Ok(())
}

async fn reap(config: SandboxConfig) -> anyhow::Result<()> {
    let registry: Arc<dyn InstanceRegistry> = Arc::new(FsRegistry::open(config.registry_dir())?);
    let removed = build_orchestrator(&config, registry).shutdown_all().await?;
    tracing::info!(removed, "reaped instances");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Reap => reap(config).await,
    }
}
