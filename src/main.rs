use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing_subscriber::EnvFilter;

use pv_safe::admission::AdmissionAdapter;
use pv_safe::config::WebhookConfig;
use pv_safe::engine::RiskEngine;
use pv_safe::reader::KubeClusterReader;
use pv_safe::snapshot::KubeSnapshotProbe;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WebhookConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = Client::try_default().await?;
    let reader: Arc<dyn pv_safe::reader::ClusterReader> = Arc::new(KubeClusterReader::new(client.clone()));
    let probe = Arc::new(KubeSnapshotProbe::discover(client, reader.clone()).await);
    let engine = RiskEngine::new(reader, probe);
    let adapter = Arc::new(AdmissionAdapter::with_deadline(engine, config.deadline()));

    let app = pv_safe::server::router(adapter);

    tracing::info!(addr = %config.bind_addr, "starting admission webhook server");
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
