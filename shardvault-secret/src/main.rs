//! ShardVault server entry point.
//!
//! Holds the shared private key and serves the mediator and public key endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shardvault_account::infrastructure::key_store::DirectoryLocalKeyStore;
use shardvault_account::{KeyCache, KeyId, LocalKeyStore};
use shardvault_secret::infrastructure::config::ShardVaultConfig;
use shardvault_secret::infrastructure::hpke_share_encryption::HpkeShareEncryption;
use shardvault_secret::infrastructure::server_mediator::LocalServerMediator;
use shardvault_secret::infrastructure::shared_key::load_or_generate_shared_key;
use shardvault_secret::presentation::{self, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// ShardVault server CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "shardvault-server")]
#[command(about = "ShardVault mediator server - decrypts shared-key shards")]
struct Args {
    /// Path to shardvault.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides [server].listen).
    #[arg(short = 'l', long)]
    listen: Option<SocketAddr>,

    /// Key directory (overrides [server].key_dir).
    #[arg(short, long)]
    key_dir: Option<PathBuf>,

    /// Shared key ID to load (overrides [server].shared_key_id).
    #[arg(long)]
    shared_key_id: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => ShardVaultConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ShardVaultConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(key_dir) = args.key_dir {
        config.server.key_dir = key_dir;
    }
    if let Some(shared_key_id) = args.shared_key_id {
        config.server.shared_key_id = Some(KeyId::new(shared_key_id));
    }

    tracing::info!("Starting ShardVault server");
    tracing::info!("Key directory: {:?}", config.server.key_dir);

    let store: Arc<dyn LocalKeyStore> = Arc::new(
        DirectoryLocalKeyStore::open(&config.server.key_dir)
            .context("Failed to open key directory")?,
    );
    let key_cache = KeyCache::new(store);

    let shared_key = load_or_generate_shared_key(
        &key_cache,
        &config.server.key_dir,
        config.server.shared_key_id.as_ref(),
    )
    .context("Failed to prepare shared key")?;
    tracing::info!("Shared key ID: {}", shared_key.key_id());

    let state = Arc::new(AppState {
        mediator: LocalServerMediator::new(shared_key, HpkeShareEncryption),
        key_cache,
    });
    let app = presentation::create_router(state);

    let listener = TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    tracing::info!("HTTP listen address: {}", config.server.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
