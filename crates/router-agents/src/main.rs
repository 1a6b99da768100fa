use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use router_agents::{build_dispatch_table, check_endpoint, AgentsConfig};
use router_core::{
    QuorumSenate, RouteCoordinator, RouterConfig, SelfCritiqueArbiter, SharedRouteCoordinator,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Route queries to agents, inspect trust and audit escalations
#[derive(Parser, Debug)]
#[command(name = "router-agents", version)]
struct Cli {
    /// TOML config file; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding trust, history, scene and audit files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify and answer a query
    Route { query: String },
    /// Answer via both the routed agent and general, keeping the more confident
    DualRoute { query: String },
    /// Inspect or change trust weights
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },
    /// Most recent routing decisions
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Scene status map
    Scenes,
    /// Audit log operations
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
    /// Put a scene to a vote, e.g. `vote movie_night planner=yes critic=no`
    Vote {
        scene: String,
        #[arg(required = true, value_parser = parse_vote)]
        votes: Vec<(String, bool)>,
        #[arg(long)]
        quorum: Option<usize>,
    },
    /// Store reachability and agent liveness
    Health,
}

#[derive(Subcommand, Debug)]
enum TrustAction {
    Show,
    Set { agent: String, value: f64 },
    Update { agent: String, delta: f64 },
}

#[derive(Subcommand, Debug)]
enum AuditAction {
    Verify,
}

fn parse_vote(raw: &str) -> Result<(String, bool), String> {
    let (agent, vote) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected agent=yes|no, got '{}'", raw))?;
    let approve = match vote.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "approve" => true,
        "no" | "n" | "false" | "reject" => false,
        other => return Err(format!("unknown vote '{}' for {}", other, agent)),
    };
    if agent.is_empty() {
        return Err("agent name is empty".into());
    }
    Ok((agent.to_string(), approve))
}

fn load_config(cli: &Cli) -> Result<RouterConfig> {
    let mut config = match &cli.config {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RouterConfig::default(),
    };
    config.apply_env();
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    config.resolve_paths();
    config.validate().context("Invalid router configuration")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let agents = AgentsConfig::from_env();
    info!(
        data_dir = %config.data_dir.display(),
        llm = agents.llm.as_ref().map(|e| e.url.as_str()).unwrap_or("none"),
        "Router starting"
    );

    let table = build_dispatch_table(agents.completion(), config.handler_timeout()).shared();
    let coordinator = RouteCoordinator::open(config, table)
        .await
        .context("Failed to open router state")?
        .shared();

    let ok = run(cli.command, coordinator, &agents).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

/// Execute one command; `false` means exit with status 1
async fn run(
    command: Command,
    coordinator: SharedRouteCoordinator,
    agents: &AgentsConfig,
) -> Result<bool> {
    match command {
        Command::Route { query } => print_json(&coordinator.route(&query).await)?,
        Command::DualRoute { query } => {
            let outcome = SelfCritiqueArbiter::new(coordinator)
                .route_with_self_critique(&query)
                .await;
            print_json(&json!({
                "choice": outcome.choice,
                "result": outcome.chosen(),
                "specialized": outcome.specialized,
                "general": outcome.general,
            }))?;
        }
        Command::Trust { action } => {
            let trust = coordinator.trust();
            match action {
                TrustAction::Show => {
                    print_json(&trust.entries().await.context("Failed to read trust weights")?)?
                }
                TrustAction::Set { agent, value } => {
                    let weight = trust
                        .set_weight(&agent, value)
                        .await
                        .with_context(|| format!("Failed to set trust for {}", agent))?;
                    print_json(&json!({ "agent": agent, "trust": weight }))?;
                }
                TrustAction::Update { agent, delta } => {
                    let weight = trust
                        .update_weight(&agent, delta)
                        .await
                        .with_context(|| format!("Failed to update trust for {}", agent))?;
                    print_json(&json!({ "agent": agent, "trust": weight }))?;
                }
            }
        }
        Command::History { limit } => print_json(
            &coordinator
                .history()
                .recent(limit)
                .await
                .context("Failed to read routing history")?,
        )?,
        Command::Scenes => print_json(
            &coordinator
                .escalation()
                .scenes()
                .all_statuses()
                .await
                .context("Failed to read scene status")?,
        )?,
        Command::Audit {
            action: AuditAction::Verify,
        } => {
            let audit = coordinator.escalation().audit();
            let valid = coordinator.escalation().verify_audit();
            let entries = audit.entries().map(|e| e.len()).unwrap_or(0);
            print_json(&json!({
                "valid": valid,
                "entries": entries,
                "log": audit.log_path(),
                "digest": audit.digest_path(),
            }))?;
            return Ok(valid);
        }
        Command::Vote {
            scene,
            votes,
            quorum,
        } => {
            let votes: BTreeMap<String, bool> = votes.into_iter().collect();
            if votes.is_empty() {
                bail!("at least one vote is required");
            }
            let senate = QuorumSenate::new(
                votes.keys().cloned().collect(),
                coordinator.trust().clone(),
                coordinator.escalation().clone(),
            );
            print_json(&senate.decide(&scene, &votes, quorum).await)?;
        }
        Command::Health => {
            let healthy = coordinator.healthy();
            let mut reports = Vec::new();
            for name in coordinator.table().names() {
                if let Some(report) = coordinator.agent_report(&name).await {
                    reports.push(report);
                }
            }
            let llm = match &agents.llm {
                Some(endpoint) => Some(check_endpoint(&endpoint.url).await),
                None => None,
            };
            print_json(&json!({
                "healthy": healthy,
                "checked_at": Utc::now(),
                "llm_reachable": llm,
                "agents": reports,
            }))?;
            return Ok(healthy);
        }
    }
    Ok(true)
}
