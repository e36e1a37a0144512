//! Expert Agency REPL
//!
//! Reads queries from stdin, prints routing progress from the event bus and
//! streams synthesized answers as they are generated.

use anyhow::Result;
use std::io::{self, Write};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use expert_agency::agent::StdoutSink;
use expert_agency::bootstrap::build_supervisor;
use expert_agency::config::{ConfigManager, DEFAULT_CONFIG_FILE};
use expert_agency::orchestrator::{Answer, OrchestratorEvent, Supervisor};
use expert_agency::utils::init_logging;

fn print_progress(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::Routed { agents, tier, .. } => {
            println!("🧭 Routing ({:?}): {}", tier, agents.join(" → "))
        }
        OrchestratorEvent::AgentStarted { agent, .. } => println!("⚙️  {} working...", agent),
        OrchestratorEvent::AgentAccepted { agent, latency_ms, .. } => {
            println!("✅ {} answered ({} ms)", agent, latency_ms)
        }
        OrchestratorEvent::AgentRejected { agent, reason, .. } => println!("⚠️  {} gave nothing usable: {}", agent, reason),
        OrchestratorEvent::AgentSkipped { agent, .. } => println!("⏭️  {} is not available", agent),
        OrchestratorEvent::SynthesisStarted { inputs, .. } if *inputs > 1 => {
            println!("🧩 Combining {} answers...\n", inputs)
        }
        _ => {}
    }
}

async fn print_agents(supervisor: &Supervisor) {
    let registry = supervisor.registry();
    println!("\nAvailable agents:");
    for name in registry.list_names().await {
        let purpose = registry.purpose(&name).await.unwrap_or_default();
        println!("  • {:<8} {}", name, purpose);
    }
    println!();
}

fn print_help() {
    println!("\n💡 Commands: 'agents' | 'help' | 'exit' / 'quit'");
    println!("   Anything else is sent to the agents as a query.\n");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = std::env::var("EXPERT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let mut config = ConfigManager::new(&config_path).load().await?;
    config.apply_env();

    let _log_guard = init_logging(config.logging.filter.as_deref(), config.logging.log_dir.as_deref())?;
    info!("Loaded configuration from {}", config_path);

    println!("\n{}", "═".repeat(60));
    println!("📈 Expert Agency v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));
    println!("Model: {} ({:?})", config.model.name, config.model.provider);

    let supervisor = build_supervisor(&config).await?;
    print_agents(&supervisor).await;

    let mut events = supervisor.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_progress(&event),
                Err(RecvError::Lagged(n)) => warn!("Progress display skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    print_help();

    loop {
        print!("❓ Query: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let query = input.trim();
        if query.is_empty() {
            continue;
        }

        match query.to_lowercase().as_str() {
            "exit" | "quit" => {
                println!("\n👋 Shutting down.\n");
                break;
            }
            "agents" => {
                print_agents(&supervisor).await;
                continue;
            }
            "help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        println!();
        let result = supervisor.handle_streaming(query, Some(&StdoutSink)).await;

        // Let the progress task drain before the answer is printed.
        tokio::task::yield_now().await;

        match &result.answer {
            // Already streamed to stdout token by token.
            Answer::Synthesized { .. } => println!("\n{}", "─".repeat(50)),
            other => {
                println!("{}", "─".repeat(50));
                println!("{}", other.render());
                println!("{}", "─".repeat(50));
            }
        }
        info!("Query {} took {} ms", result.query_id, result.latency_ms);
    }

    Ok(())
}
