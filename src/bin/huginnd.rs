//! huginnd: Huginn daemon.
//!
//! Serves the [`NerGateway`](huginn::NerGateway) over HTTP as an
//! annotation-tool ML backend.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use huginn::protocol::TensorClient;
use huginn::server::config::{Config, Secrets};
use huginn::sinks::{HttpJobDispatcher, HttpObjectStore, TableSink, WebhookNotifier};
use huginn::{Huginn, HuginnError, NerGateway};

/// Huginn daemon: NER inference bridge for the annotation tool.
#[derive(Parser)]
#[command(name = "huginnd")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Huginn NER inference bridge daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let gateway = build_gateway(&config, &secrets)?;

    // Parse address
    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| HuginnError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = huginn::version_string(),
        %addr,
        backend = %config.backend.base_url,
        ner_model = %config.backend.ner_model,
        extraction = config.extraction.enabled,
        "huginnd starting"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, huginn::server::router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("huginnd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Build a [`NerGateway`] from configuration.
fn build_gateway(config: &Config, secrets: &Secrets) -> Result<NerGateway, HuginnError> {
    let backend = &config.backend;

    let mut client = TensorClient::builder(&backend.base_url)
        .infer_timeout(backend.infer_timeout())
        .ready_timeout(backend.ready_timeout());
    if let Some((id, secret)) = secrets.client_credentials() {
        client = client.credentials(id, secret);
    }

    let tokenizer = config.tokenizer.load()?;

    let mut builder = Huginn::builder()
        .tensor_client(client.build()?)
        .tokenizer(Arc::new(tokenizer))
        .labels(config.labels())
        .model_id(&backend.model_id)
        .ner_model(&backend.ner_model)
        .model_version(&backend.model_version)
        .run_prefix(&backend.run_prefix)
        .training(config.training.job.clone())
        .train_async(config.training.async_dispatch)
        .train_dry_run(config.training.dry_run);

    if let Some(ref tokens) = backend.special_tokens {
        builder = builder.special_tokens(tokens.iter().cloned());
    }

    if config.extraction.enabled {
        builder = builder.extraction(&config.extraction.model);
    }

    // Object store and table fan-out, only when the section is present
    if let Some(ref tables) = config.tables {
        let store = Arc::new(HttpObjectStore::new(&tables.store_url)?);
        let mut sink = TableSink::new(store.clone(), &tables.bucket);
        if let Some(ref url) = tables.webhook_url {
            let secret = secrets.get("webhook_secret");
            if secret.is_none() {
                warn!("webhook_url set without webhook_secret, notifications will fail");
            }
            sink = sink.with_webhook(WebhookNotifier::new(url, secret)?);
        }
        builder = builder.object_store(store).tables(sink);
    }

    if let Some(ref url) = config.training.dispatch_url {
        builder = builder.dispatcher(Arc::new(HttpJobDispatcher::new(url)?));
    }

    if let Some(token) = secrets.get("hf_token") {
        builder = builder.hf_token(token);
    }

    builder.build()
}
