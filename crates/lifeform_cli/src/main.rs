mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lifeform_core::LifeformConfig;
use lifeform_gateway::GatewayServer;
use lifeform_memory::SqliteStore;
use lifeform_reasoning::{create_provider, Heartbeat, MetabolismEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lifeform", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (defaults to `config.toml`)
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long)]
    db: Option<String>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server and the heartbeat (default)
    Serve,
    /// Make sure the lifeform exists and has a pending question
    Seed,
    /// Print recently answered questions
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(LifeformConfig::config_path);
    let mut config = LifeformConfig::load_or_default(&config_path);
    if let Some(db) = args.db {
        config.database.path = db;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _log_guard = logging::init(&config.logging)?;
    info!(
        "Starting {} ({} environment)",
        config.app.name, config.app.environment
    );

    info!("Opening database at {}...", config.database.path);
    let store = Arc::new(SqliteStore::new(&config.database.path).await?);
    let provider = create_provider(&config.llm)?;
    let engine = Arc::new(MetabolismEngine::open(store, provider, config.llm.timeout()).await?);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, engine).await,
        Command::Seed => {
            let question = engine
                .generate_question()
                .await
                .context("Failed to seed a pending question")?;
            info!(question_id = question.id, "Seeded pending question");
            println!("Seed complete.");
            Ok(())
        }
        Command::History { limit } => print_history(&engine, limit).await,
    }
}

async fn serve(config: LifeformConfig, engine: Arc<MetabolismEngine>) -> Result<()> {
    engine.bootstrap().await;

    let heartbeat = if config.scheduler.enabled && !config.is_testing() {
        Some(Heartbeat::new(engine.clone(), config.scheduler.interval()).spawn())
    } else {
        info!("Heartbeat disabled");
        None
    };

    let server = GatewayServer::new(engine, &config.server.host, config.server.port);
    let result = server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown().await;
    }
    result
}

async fn print_history(engine: &MetabolismEngine, limit: u32) -> Result<()> {
    let entries = engine.store().recent_history(limit).await?;
    if entries.is_empty() {
        println!("No answered questions yet.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "#{} [{}] {}",
            entry.question.id,
            entry.answered_at.format("%Y-%m-%d %H:%M"),
            entry.question.text
        );
        println!("  reply:      {}", entry.reply);
        println!(
            "  reflection: {}",
            entry.reflection.as_deref().unwrap_or("(pending)")
        );
    }
    Ok(())
}
