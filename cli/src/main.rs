//! CLI entrypoint for sightline
//!
//! This is the main binary that wires together all layers using
//! dependency injection: identity provider, credential store, gateway,
//! dispatcher, engine, and the local agent runtime.

use anyhow::{bail, Context, Result};
use clap::Parser;
use sightline_application::{CredentialStore, InvokeAgentError, InvokeAgentUseCase, SessionManager};
use sightline_domain::StreamEvent;
use sightline_infrastructure::{
    CachingVerifier, ConfigLoader, HeuristicModel, LocalAgentRuntime, MemoryDataEngine,
    QueryDispatcher, ToolGatewayRouter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relays ctrl-c to whichever invocation is currently in flight.
///
/// A single watcher task lives for the whole process; each question arms
/// a fresh token, so an interrupt aborts only the active invocation and
/// the chat loop keeps running.
struct InterruptRelay {
    current: Mutex<CancellationToken>,
}

impl InterruptRelay {
    fn spawn() -> Arc<Self> {
        let relay = Arc::new(Self {
            current: Mutex::new(CancellationToken::new()),
        });
        let watcher = relay.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                watcher.fire().await;
            }
        });
        relay
    }

    /// Install a fresh token for the next invocation.
    async fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().await = token.clone();
        token
    }

    async fn fire(&self) {
        self.current.lock().await.cancel();
    }
}

#[derive(Parser, Debug)]
#[command(name = "sightline", version, about = "Session-aware analytics agent")]
struct Cli {
    /// Question to ask (omit with --chat for interactive mode)
    question: Option<String>,

    /// Username to log in as
    #[arg(short, long)]
    username: String,

    /// Password (prefer the environment variable over the flag)
    #[arg(short, long, env = "SIGHTLINE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Interactive chat mode
    #[arg(long)]
    chat: bool,

    /// Path to a config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip config file discovery and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress status output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("failed to load configuration")?
    };
    config.validate().context("invalid configuration")?;

    // === Dependency Injection ===
    let provider = Arc::new(config.identity_provider());
    let store = Arc::new(CredentialStore::new());
    let sessions = Arc::new(SessionManager::new(
        provider.clone(),
        store,
        config.session_policy(),
    ));

    let registry = Arc::new(config.registry());
    let engine = Arc::new(MemoryDataEngine::with_sample_data());
    let dispatcher = Arc::new(QueryDispatcher::new(
        engine,
        registry.clone(),
        config.dispatch_policy(),
    ));
    let verifier = Arc::new(CachingVerifier::new(
        provider.clone(),
        config.verify_cache_ttl(),
    ));
    let router = Arc::new(ToolGatewayRouter::new(
        verifier.clone(),
        registry.clone(),
        dispatcher,
    ));
    let runtime = Arc::new(LocalAgentRuntime::new(
        verifier,
        Arc::new(HeuristicModel::new()),
        router,
        registry,
        config.runtime_policy(),
    ));
    let agent = InvokeAgentUseCase::new(sessions.clone(), runtime, config.invoke_policy());

    // === Login ===
    let session = sessions
        .login(&cli.username, &cli.password)
        .await
        .context("login failed")?;
    if !cli.quiet {
        println!("Signed in as {} ({})", session.display_name, session.role);
    }
    info!(user_id = %session.user_id, "session established");

    let interrupts = InterruptRelay::spawn();
    let outcome = if cli.chat {
        chat_loop(&agent, &interrupts, cli.quiet).await
    } else {
        match &cli.question {
            Some(question) => ask(&agent, &interrupts, question, cli.quiet).await,
            None => {
                sessions.logout().await;
                bail!("a question is required; use --chat for interactive mode");
            }
        }
    };

    sessions.logout().await;
    outcome
}

/// Run one question through the agent and print the streamed answer.
async fn ask(
    agent: &InvokeAgentUseCase,
    interrupts: &InterruptRelay,
    question: &str,
    quiet: bool,
) -> Result<()> {
    let cancel = interrupts.arm().await;

    let mut handle = match agent.invoke(question, cancel).await {
        Ok(handle) => handle,
        Err(InvokeAgentError::Cancelled) => {
            println!("\n(cancelled)");
            return Ok(());
        }
        Err(InvokeAgentError::TokenRejected) => {
            bail!("the agent runtime rejected the access token; please sign in again")
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = tokio::io::stdout();
    while let Some(event) = handle.next().await {
        match event {
            StreamEvent::Delta(chunk) => {
                stdout.write_all(chunk.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            StreamEvent::ToolStarted { tool_name } => {
                if !quiet {
                    println!("  [tool] {tool_name} ...");
                }
            }
            StreamEvent::ToolFinished { result } => {
                if !quiet {
                    let status = if result.is_ok() { "ok" } else { "error" };
                    println!("  [tool] {} {} ({} ms)", result.tool_name, status, result.elapsed_ms);
                }
            }
            StreamEvent::Completed(_) => break,
            StreamEvent::Error(e) => bail!("agent error: {e}"),
        }
    }
    Ok(())
}

/// Interactive loop: one agent invocation per line of input.
async fn chat_loop(
    agent: &InvokeAgentUseCase,
    interrupts: &InterruptRelay,
    quiet: bool,
) -> Result<()> {
    if !quiet {
        println!("Ask about sales, customers, products, regions, inventory, or orders.");
        println!("Type 'exit' or 'quit' to leave.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        if let Err(e) = ask(agent, interrupts, question, quiet).await {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}
