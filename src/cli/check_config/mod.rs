//! Check-config command

use crate::config::AppConfig;

/// Load and validate configuration, then print the effective values
pub fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?.validated()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    eprintln!(
        "Configuration OK: {} route(s), {} vector store, {}-dimensional embeddings",
        config.routes.len(),
        config.vector_store.backend,
        config.engine.embedding_dimension
    );

    Ok(())
}
