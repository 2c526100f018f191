//! trackeco-node: gamified litter-disposal verification daemon
//!
//! Runs the HTTP API over an embedded SQLite ledger, an offline queue for
//! submissions made while the classifier is unreachable, and the reconciler
//! that replays the queue once connectivity returns.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;

use trackeco_node::api::{self, AppState};
use trackeco_node::classify::HttpClassifier;
use trackeco_node::config::Config;
use trackeco_node::engine::VerificationEngine;
use trackeco_node::offline::OfflineStore;
use trackeco_node::probe::HttpProbe;
use trackeco_node::store::Store;
use trackeco_node::sync::SyncReconciler;

#[derive(Parser)]
#[command(name = "trackeco-node")]
#[command(about = "Litter-disposal verification and reward daemon")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "trackeco-node.toml")]
    config: String,

    /// Data directory
    #[arg(short, long, env = "TRACKECO_DATA_DIR")]
    data_dir: Option<String>,

    /// HTTP API port (overrides config file)
    #[arg(long, env = "TRACKECO_HTTP_PORT")]
    http_port: Option<u16>,

    /// Classifier base URL (overrides config file)
    #[arg(long, env = "TRACKECO_CLASSIFIER_URL")]
    classifier_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trackeco_node=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting trackeco-node");
    info!("Config file: {}", cli.config);

    // Load or create default config
    let mut config: Config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(http_port) = cli.http_port {
        config.api.http_port = http_port;
    }
    if let Some(classifier_url) = cli.classifier_url {
        config.classifier.base_url = classifier_url;
    }

    info!("Node ID: {}", config.node.id);
    info!("Data dir: {}", config.node.data_dir.display());
    info!("Classifier: {}", config.classifier.base_url);

    std::fs::create_dir_all(&config.node.data_dir)?;

    let store = Arc::new(Mutex::new(Store::open(&config.node.data_dir)?));
    let offline = Arc::new(OfflineStore::open(&config.node.data_dir)?);
    let connectivity: Arc<dyn trackeco_node::probe::Connectivity> =
        Arc::new(HttpProbe::new(&config.classifier)?);
    let classifier: Arc<dyn trackeco_node::classify::Classifier> =
        Arc::new(HttpClassifier::new(&config.classifier)?);

    let engine = Arc::new(VerificationEngine::new(
        store.clone(),
        offline.clone(),
        connectivity.clone(),
        classifier,
    ));
    let reconciler = Arc::new(SyncReconciler::new(
        engine.clone(),
        offline.clone(),
        connectivity.clone(),
    ));

    let state = Arc::new(AppState {
        store,
        offline,
        engine,
        reconciler,
        connectivity,
    });
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.http_port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
