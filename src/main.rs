use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

mod agents;
mod audit;
mod completion;
mod config;
mod context;
mod domain;
mod orchestrator;
mod privacy;

use agents::{AgentKind, AgentRegistry, NullSink};
use audit::AuditLog;
use completion::CompletionClient;
use config::SettingsStore;
use context::history::GitCli;
use context::ContextEngine;
use domain::{DocumentView, Position};
use orchestrator::Orchestrator;
use privacy::{GuardedCompletion, PrivacyGuard, PrivacyMode};

/// Codemate core - context analysis and agent orchestration
#[derive(Parser)]
#[command(name = "codemate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory for settings and the audit log. Defaults to ~/.codemate
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a file with one agent or a chain of agents
    Analyze {
        /// File to analyze
        file: PathBuf,

        /// Cursor line (zero-based)
        #[arg(long, default_value_t = 0)]
        line: usize,

        /// Agent to run; picked from the context signals if omitted
        #[arg(long)]
        agent: Option<String>,

        /// Comma-separated agent chain, e.g. "bug-fix,code-review"
        #[arg(long, conflicts_with = "agent")]
        chain: Option<String>,

        /// Skip the project and history layers for lower latency
        #[arg(long)]
        fast: bool,
    },
    /// Rank agents by suitability for a file without executing any
    Suggest {
        /// File to inspect
        file: PathBuf,

        /// Cursor line (zero-based)
        #[arg(long, default_value_t = 0)]
        line: usize,
    },
    /// Show or change the privacy policy
    Privacy {
        #[command(subcommand)]
        action: PrivacyAction,
    },
    /// Aggregate execution statistics from the audit trail
    Stats,
    /// Show or clear the audit trail
    Audit {
        /// Number of most recent entries to show
        #[arg(long, default_value_t = 20)]
        tail: usize,

        /// Remove the audit log instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum PrivacyAction {
    /// Print the current mode and exclusion lists
    Show,
    /// Set the privacy mode: open, balanced, or strict
    Mode { mode: String },
    /// Exclude a file (or a directory with --dir) from outgoing context
    Exclude {
        path: String,
        #[arg(long)]
        dir: bool,
    },
    /// Remove a file (or a directory with --dir) from the exclusion lists
    Unexclude {
        path: String,
        #[arg(long)]
        dir: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            file,
            line,
            agent,
            chain,
            fast,
        } => run_analyze(cli.cache_dir, file, line, agent, chain, fast).await,
        Commands::Suggest { file, line } => run_suggest(file, line).await,
        Commands::Privacy { action } => run_privacy(cli.cache_dir, action),
        Commands::Stats => run_stats(cli.cache_dir),
        Commands::Audit { tail, clear } => run_audit(cli.cache_dir, tail, clear),
    }
}

/// Read a file into the document shape an editor adapter would supply.
fn load_document(path: &std::path::Path, line: usize) -> Result<DocumentView> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let uri = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();

    Ok(DocumentView {
        uri,
        version: 1,
        language_id: language_from_extension(path),
        text,
        cursor: Position { line, column: 0 },
        selection: None,
        diagnostics: Vec::new(),
        workspace_root: None,
    })
}

fn language_from_extension(path: &std::path::Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    let id = match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "go" => "go",
        "java" => "java",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "toml" => "toml",
        "json" => "json",
        other => other,
    };
    Some(id.to_string())
}

fn build_orchestrator(cache_dir: Option<PathBuf>) -> Result<Orchestrator> {
    let store = SettingsStore::new(cache_dir.clone())?;
    let settings = store.settings();

    let endpoint = settings
        .effective_endpoint()
        .ok_or(completion::CompletionError::NotConfigured)
        .with_context(|| {
            format!(
                "Set {} or add \"endpoint\" to {}",
                config::ENDPOINT_ENV,
                store.settings_path().display()
            )
        })?;
    let client = CompletionClient::new(
        &endpoint,
        settings.effective_api_token(),
        settings.model.clone(),
    )
    .context("Failed to build completion client")?;

    let guard = Arc::new(Mutex::new(PrivacyGuard::new(
        settings.privacy_mode,
        settings.excluded_files.clone(),
        settings.excluded_dirs.clone(),
    )));
    // Prompts are screened at the wire client, context at the orchestrator;
    // both read the same guard.
    let guarded = GuardedCompletion::new(Arc::new(client), guard.clone());
    let registry = AgentRegistry::standard(Arc::new(guarded));
    let engine = ContextEngine::new(Arc::new(GitCli), settings.max_commits);
    let audit = AuditLog::default_location(cache_dir)?;

    Ok(Orchestrator::new(registry, engine, guard, audit))
}

fn parse_kind(name: &str) -> Result<AgentKind> {
    AgentKind::parse(name).with_context(|| {
        let known: Vec<&str> = AgentKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("Unknown agent '{}'. Known agents: {}", name, known.join(", "))
    })
}

async fn run_analyze(
    cache_dir: Option<PathBuf>,
    file: PathBuf,
    line: usize,
    agent: Option<String>,
    chain: Option<String>,
    fast: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(cache_dir)?;
    let document = load_document(&file, line)?;

    let snapshot = if fast {
        orchestrator.snapshot_fast(&document)
    } else {
        orchestrator.snapshot(&document).await
    };

    let cancel = CancellationToken::new();
    let output = if let Some(chain) = chain {
        let kinds = chain
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(parse_kind)
            .collect::<Result<Vec<_>>>()?;
        if kinds.is_empty() {
            bail!("--chain needs at least one agent name");
        }
        let results = orchestrator
            .execute_chain(&kinds, &snapshot, &cancel, &NullSink)
            .await;
        serde_json::to_string_pretty(&results)?
    } else {
        let kind = match agent {
            Some(name) => parse_kind(&name)?,
            None => {
                let suggestion = orchestrator
                    .suggest_agent(&snapshot)
                    .context("No agents registered")?;
                eprintln!(
                    "No agent given; picked '{}' ({})",
                    suggestion.agent, suggestion.reasoning
                );
                suggestion.agent
            }
        };
        let result = orchestrator
            .execute_agent(kind, &snapshot, &cancel, &NullSink)
            .await;
        serde_json::to_string_pretty(&result)?
    };

    println!("{}", output);
    Ok(())
}

async fn run_suggest(file: PathBuf, line: usize) -> Result<()> {
    let document = load_document(&file, line)?;
    // Ranking needs no completion service, so skip the client entirely.
    let engine = ContextEngine::new(Arc::new(GitCli), config::Settings::default().max_commits);
    let snapshot = engine.build_full(&document).await;

    let suggestions = orchestrator::suggest::rank(AgentKind::ALL, &snapshot);
    println!("{}", serde_json::to_string_pretty(&suggestions)?);
    Ok(())
}

fn run_privacy(cache_dir: Option<PathBuf>, action: PrivacyAction) -> Result<()> {
    let mut store = SettingsStore::new(cache_dir)?;

    match action {
        PrivacyAction::Show => {
            let settings = store.settings();
            let view = serde_json::json!({
                "mode": settings.privacy_mode,
                "excludedFiles": settings.excluded_files,
                "excludedDirs": settings.excluded_dirs,
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        PrivacyAction::Mode { mode } => {
            let Some(mode) = PrivacyMode::parse(&mode) else {
                bail!("Unknown privacy mode '{}'. Use open, balanced, or strict", mode);
            };
            store.update(|s| s.privacy_mode = mode)?;
            println!("Privacy mode set to {}", mode.as_str());
        }
        PrivacyAction::Exclude { path, dir } => {
            store.update(|s| {
                if dir {
                    s.excluded_dirs.insert(path.clone());
                } else {
                    s.excluded_files.insert(path.clone());
                }
            })?;
            println!("Excluded {}", path);
        }
        PrivacyAction::Unexclude { path, dir } => {
            store.update(|s| {
                if dir {
                    s.excluded_dirs.remove(&path);
                } else {
                    s.excluded_files.remove(&path);
                }
            })?;
            println!("Removed {} from exclusions", path);
        }
    }

    Ok(())
}

fn run_stats(cache_dir: Option<PathBuf>) -> Result<()> {
    let audit = AuditLog::default_location(cache_dir)?;
    let entries = audit.tail(0)?;

    let total = entries.len();
    let successes = entries.iter().filter(|e| e.success).count();
    let total_duration: u64 = entries.iter().map(|e| e.duration_ms).sum();
    let mut per_agent = std::collections::BTreeMap::new();
    for entry in &entries {
        *per_agent.entry(entry.agent_kind).or_insert(0usize) += 1;
    }

    let view = serde_json::json!({
        "totalExecutions": total,
        "successes": successes,
        "failures": total - successes,
        "successRate": if total == 0 { 0.0 } else { successes as f64 / total as f64 * 100.0 },
        "averageDurationMs": if total == 0 { 0.0 } else { total_duration as f64 / total as f64 },
        "perAgent": per_agent,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn run_audit(cache_dir: Option<PathBuf>, tail: usize, clear: bool) -> Result<()> {
    let audit = AuditLog::default_location(cache_dir)?;

    if clear {
        audit.clear()?;
        println!("Audit log cleared");
        return Ok(());
    }

    let entries = audit.tail(tail)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
