use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

mod api;
mod ingest;
mod pipeline;
mod provider;
#[cfg(test)]
mod testutil;

use api::AppState;
use provider::{AnyEmbedder, AnyLanguageModel, AnyVectorStore, ProviderBuilder, build_providers};
use sage_core::config::Config;
use sage_core::record::{Record, parse_records};

const DEFAULT_CONFIG_PATH: &str = "sage.toml";

#[derive(Parser)]
#[command(name = "sage-server")]
struct Cli {
    /// Path to the configuration file
    #[arg(long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config).unwrap_or_else(|e| {
        tracing::error!("{e}");
        std::process::exit(1);
    });

    let records = load_records(&config);

    let addr = config.bind_address();
    let store_type = config.vector_store.store_type.clone();
    let llm_type = config.llm.provider_type.clone();
    let record_count = records.len();

    // Providers are built lazily on the first request; the builder holds its
    // own copy of the config so a failed attempt can be retried from scratch.
    let builder_config = config.clone();
    let builder: ProviderBuilder<AnyVectorStore, AnyEmbedder, AnyLanguageModel> =
        Box::new(move || {
            let config = builder_config.clone();
            Box::pin(async move { build_providers(&config).await })
        });

    let state = Arc::new(AppState::new(config, records, builder));
    let app = api::router(state).fallback_service(ServeDir::new("frontend/dist"));

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        address = %addr,
        vector_store = %store_type,
        llm = %llm_type,
        records = record_count,
        "sage server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

/// Load the record collection named in config. A missing file is an empty
/// collection; invalid entries are dropped with a warning.
fn load_records(config: &Config) -> Vec<Record> {
    let path = &config.records.path;
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "could not read records file '{}': {e}; starting with an empty collection",
                path.display()
            );
            return Vec::new();
        }
    };

    match parse_records(&contents) {
        Ok((records, dropped)) => {
            if dropped > 0 {
                tracing::warn!(
                    "dropped {dropped} invalid records from '{}'",
                    path.display()
                );
            }
            records
        }
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("shutting down");
}
