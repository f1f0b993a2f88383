mod auth;
mod config;
mod handlers;
mod llm;
mod ollama;
mod session;
mod store;
mod tools;

use anyhow::{Context, Result};
use config::Config;
use handlers::AppState;
use session::Assistant;
use std::sync::Arc;
use store::Store;
use tools::ToolCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_file("config.toml")?;

    // RUST_LOG wins over the configured level
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();
    log::info!("Starting Academic Planner...");
    log::info!("Configuration loaded successfully");

    // Ensure the database directory exists
    config.ensure_directories()?;

    let store = Arc::new(Store::open(&config.database.path).context("Failed to open database")?);
    log::info!("Database ready at {}", config.database.path);

    let model = llm::create_language_model(&config.ai_model)?;
    let assistant = Assistant::new(model, ToolCatalog::new(store.clone()));

    let app = handlers::router(AppState {
        store,
        assistant: Arc::new(assistant),
        max_message_chars: config.assistant.max_message_chars,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    println!("🎓 Academic Planner is running!");
    println!("   Listening on http://{}", config.server.bind_addr);
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
    }
}
