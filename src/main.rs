use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use vigil_policy::{ConfirmationGate, PendingConfirmation, RuleSet, classify};
use vigil_server::{AppState, ProtocolServer};
use vigil_tools::{
    AuditLogger, DispatchEngine, FileEditTool, FileReadTool, FileWriteTool, GitCommitTool,
    GitContext, GitDiffTool, GitStatusTool, GlobTool, GrepTool, ShellTool, ToolRegistry, Workspace,
};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Policy-gated tool execution server")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the JSON-RPC server.
    Serve {
        /// Deny every confirmation prompt instead of asking.
        #[arg(long)]
        non_interactive: bool,
    },
    /// Classify a single command against the rule set and exit.
    Classify {
        /// The shell command to classify.
        command: String,
    },
    /// List the tools the server would expose.
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Command::Serve { non_interactive } => serve(config, non_interactive).await,
        Command::Classify { command } => classify_command(&config, &command),
        Command::Tools => list_tools(&config).await,
    }
}

/// An invalid rule document is fatal: the process refuses to start
/// rather than run with partial rules.
fn load_rules(config: &Config) -> anyhow::Result<RuleSet> {
    match &config.policy.rules_path {
        Some(path) => RuleSet::load_file(Path::new(path))
            .with_context(|| format!("failed to load rule document from {path}")),
        None => RuleSet::builtin().context("failed to load built-in rule document"),
    }
}

async fn build_registry(config: &Config) -> anyhow::Result<Arc<ToolRegistry>> {
    let workspace = Workspace::new(config.tools.allowed_paths.iter().map(PathBuf::from).collect());
    let git_ctx = GitContext::new(std::env::current_dir().context("cannot resolve cwd")?);

    let registry = Arc::new(ToolRegistry::new());
    registry.register(ShellTool::descriptor()).await?;
    registry
        .register(FileReadTool::descriptor(workspace.clone()))
        .await?;
    registry
        .register(FileWriteTool::descriptor(workspace.clone()))
        .await?;
    registry
        .register(FileEditTool::descriptor(workspace.clone()))
        .await?;
    registry
        .register(GlobTool::descriptor(workspace.clone()))
        .await?;
    registry.register(GrepTool::descriptor(workspace)).await?;
    registry
        .register(GitStatusTool::descriptor(git_ctx.clone()))
        .await?;
    registry
        .register(GitDiffTool::descriptor(git_ctx.clone()))
        .await?;
    registry.register(GitCommitTool::descriptor(git_ctx)).await?;
    Ok(registry)
}

async fn serve(config: Config, non_interactive: bool) -> anyhow::Result<()> {
    let rules = Arc::new(load_rules(&config)?);
    let registry = build_registry(&config).await?;

    let interactive = if non_interactive {
        false
    } else {
        config
            .policy
            .interactive
            .unwrap_or(rules.settings().default_interactive_mode)
    };

    let (gate, prompt_rx) = ConfirmationGate::new(rules.settings());
    let gate = gate.with_interactive(interactive);
    if interactive {
        spawn_prompter(prompt_rx);
    }

    let mut engine = DispatchEngine::new(Arc::clone(&registry), rules, gate)
        .with_default_deadline(Duration::from_secs(config.tools.timeout));

    if config.tools.audit.enabled {
        let logger = AuditLogger::from_config(&config.tools.audit)
            .await
            .context("failed to open audit destination")?;
        engine = engine.with_audit(logger);
    }

    let state = AppState::new(Arc::new(engine));
    let addr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let mut server = ProtocolServer::new(state, addr, shutdown_rx);
    if let Some(token) = config.server.auth_token {
        server = server.with_auth_token(token);
    }

    tracing::info!(tools = registry.len().await, %addr, "vigil serving");
    server.serve().await?;
    Ok(())
}

/// Terminal prompter for confirmation requests. Each prompt blocks a
/// dedicated thread; unanswered prompts are timed out by the gate.
fn spawn_prompter(mut prompt_rx: mpsc::Receiver<PendingConfirmation>) {
    tokio::spawn(async move {
        while let Some(pending) = prompt_rx.recv().await {
            let prompt = format!(
                "Allow `{}` ({})?",
                pending.request.command, pending.request.tier
            );
            let approved = tokio::task::spawn_blocking(move || {
                dialoguer::Confirm::new()
                    .with_prompt(prompt)
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            })
            .await
            .unwrap_or(false);
            pending.answer(approved);
        }
    });
}

fn classify_command(config: &Config, command: &str) -> anyhow::Result<()> {
    let rules = load_rules(config)?;
    let tier = classify(command, &rules);
    println!("{tier}");
    if let Some(rule) = rules.first_match(tier, command)
        && !rule.description.is_empty()
    {
        println!("matched: {}", rule.description);
    }
    Ok(())
}

async fn list_tools(config: &Config) -> anyhow::Result<()> {
    let registry = build_registry(config).await?;
    for spec in registry.list().await {
        println!("{:<12} {}", spec.name, spec.description);
    }
    Ok(())
}
