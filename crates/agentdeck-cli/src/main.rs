// agentdeck — check and apply upstream updates to installed resources.
// Results go to stdout as JSON; logs and progress go to stderr.

use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use agentdeck::{
    quota_warning, DirectorySink, EngineStore, GitHubClient, KeychainKey, ResourceKind, SsotStore,
    TokenStore, UpdateEngine, UpdateEvent, UpdaterConfig,
};

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(about = "Keep installed Skills, Commands, Hooks and Agents in step with GitHub", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check installed resources for upstream changes
    Check {
        /// skill, command, hook or agent
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        /// Only these ids (default: every installed resource of the kind)
        ids: Vec<String>,
    },
    /// Fetch and apply upstream content
    Update {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Record a baseline fingerprint for resources installed without one
    Repair {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
    },
    /// Show or change updater settings
    Config {
        /// GitHub REST base URL
        #[arg(long)]
        api_base: Option<String>,
        /// Raw file download host
        #[arg(long)]
        raw_base: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Manage the GitHub token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a token (an empty value clears it)
    Set {
        #[arg(env = "AGENTDECK_GITHUB_TOKEN", hide_env_values = true)]
        token: String,
    },
    Clear,
    Status,
    /// Ask GitHub for the quota of the stored token
    Validate,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", out);
    Ok(())
}

fn log_progress(event: &UpdateEvent) {
    match event {
        UpdateEvent::CheckProgress { resource_kind, id, completed, total } => {
            info!("[cli] checked {}/{} {} {}", completed, total, resource_kind, id)
        }
        UpdateEvent::UpdateProgress { resource_kind, id, success, completed, total } => {
            let status = if *success { "ok" } else { "failed" };
            info!("[cli] {}/{} {} {} {}", completed, total, resource_kind, id, status)
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let store = Arc::new(EngineStore::open_default()?);
    let mut config = UpdaterConfig::load(&store);

    if let Commands::Config { api_base, raw_base, timeout, user_agent } = cli.command {
        let changed = api_base.is_some()
            || raw_base.is_some()
            || timeout.is_some()
            || user_agent.is_some();
        if let Some(v) = api_base {
            config.api_base = v;
        }
        if let Some(v) = raw_base {
            config.raw_base = v;
        }
        if let Some(v) = timeout {
            config.request_timeout_secs = v;
        }
        if let Some(v) = user_agent {
            config.user_agent = v;
        }
        if changed {
            config.save(&store)?;
        }
        return print_json(&config);
    }

    let client = Arc::new(GitHubClient::new(&config)?);
    let tokens = TokenStore::new(store.clone(), Box::new(KeychainKey));

    match cli.command {
        Commands::Token { action } => run_token(action, &tokens, &client).await,
        command => run_engine(command, store, client, &tokens).await,
    }
}

async fn run_engine(
    command: Commands,
    store: Arc<EngineStore>,
    client: Arc<GitHubClient>,
    tokens: &TokenStore,
) -> Result<(), String> {
    let token = tokens.token()?;
    if token.is_none() {
        info!("[cli] No GitHub token configured, using the unauthenticated quota");
    }
    let token = token.as_deref();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_progress(&event);
        }
    });
    let engine = UpdateEngine::new(
        client,
        store,
        Arc::new(SsotStore::open_default()),
        Arc::new(DirectorySink::from_home()),
    )
    .with_events(tx);

    let printed = match command {
        Commands::Check { kind, ids } if ids.is_empty() => print_json(&engine.check_all(kind, token).await?),
        Commands::Check { kind, ids } => print_json(&engine.check_by_ids(kind, &ids, token).await?),
        Commands::Update { kind, ids } => print_json(&engine.update_batch(kind, &ids, token).await),
        Commands::Repair { kind } => print_json(&engine.capture_baselines(kind, token).await?),
        Commands::Token { .. } | Commands::Config { .. } => Ok(()),
    };

    // closing the sender ends the progress task
    drop(engine);
    let _ = progress.await;
    printed
}

async fn run_token(action: TokenAction, tokens: &TokenStore, client: &GitHubClient) -> Result<(), String> {
    match action {
        TokenAction::Set { token } => {
            tokens.save(&token)?;
            print_json(&tokens.status()?)
        }
        TokenAction::Clear => {
            tokens.clear()?;
            print_json(&tokens.status()?)
        }
        TokenAction::Status => print_json(&tokens.status()?),
        TokenAction::Validate => {
            let token = tokens.token()?.ok_or("no GitHub token configured")?;
            let info = client.validate_token(&token).await.map_err(|e| e.to_string())?;
            if let Some(warning) = quota_warning(&info) {
                warn!("[cli] {}", warning);
            }
            print_json(&info)
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
