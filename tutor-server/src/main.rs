use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use tutor_core::{OpenAiChatClient, PgStore, TutorConfig};

use tutor_server::context::NoContext;
use tutor_server::exercises::ExerciseDirectory;
use tutor_server::subsystems::notifier::Notifier;
use tutor_server::TutorServices;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tutor.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match TutorConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match tutor_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match tutor_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match OpenAiChatClient::from_llm_config(&config.llm) {
            Ok(client) => println!("✅ LLM client configured: {}", client.model()),
            Err(e) => {
                println!("❌ LLM client not configured ({}): {}", config.llm.api_key_env, e);
                std::process::exit(1);
            }
        }

        println!("✅ Tutor health check passed");
        return Ok(());
    }

    tutor_core::db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let llm = match OpenAiChatClient::from_llm_config(&config.llm) {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "Failed to create LLM client (is {} set?): {}",
                config.llm.api_key_env, e
            );
            std::process::exit(1);
        }
    };
    tracing::info!(model = %llm.model(), base_url = %config.llm.base_url, "LLM client ready");

    let exercises = ExerciseDirectory::new(&config.exercises.root);
    tracing::info!(root = %exercises.root().display(), "Exercise statements directory");

    let services = TutorServices {
        store: Arc::new(PgStore::new(pool.clone())),
        llm: Arc::new(llm),
        statements: Arc::new(exercises),
        context: Arc::new(NoContext),
        notifier: Notifier::new(config.service.event_capacity),
        config: Arc::new(config),
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    tutor_server::http::start_http_server(services, Some(pool), tx.subscribe()).await?;

    tracing::info!("Tutor server stopped");
    Ok(())
}
