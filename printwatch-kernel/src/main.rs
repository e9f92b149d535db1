//! PrintWatch kernel: cloud-side scanning, agent push intake and the
//! reconciled fleet view served to the dashboard.

mod config;
mod error;
mod health;
mod http;
mod reconciler;
mod state;

use crate::config::load_config;
use crate::health::HealthTracker;
use crate::http::build_router;
use crate::reconciler::Reconciler;
use crate::state::{cloud_scan_job, new_state, AppState};

use anyhow::{Context, Result};
use printwatch_core::{DeviceInventory, DeviceProber, FileInventory, FleetScanner, ScanScheduler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;
    info!(
        inventory = %cfg.inventory_path,
        scan_interval_secs = cfg.scan_interval_secs,
        snmp_timeout_ms = cfg.snmp.timeout_ms,
        snmp_retries = cfg.snmp.retries,
        "kernel starting"
    );

    let inventory: Arc<dyn DeviceInventory> = Arc::new(FileInventory::new(&cfg.inventory_path));
    let scanner = FleetScanner::new(inventory.clone(), DeviceProber::new(cfg.snmp.clone()));
    let last_cloud = new_state(None);

    let scheduler = ScanScheduler::new(
        cloud_scan_job(scanner.clone(), last_cloud.clone()),
        cfg.scan_interval(),
        cfg.initial_delay(),
    );
    scheduler.spawn();

    let app_state = AppState {
        inventory,
        reconciler: Arc::new(Reconciler::new(scanner, cfg.freshness.threshold())),
        scheduler,
        last_cloud,
        health_tracker: HealthTracker::new(),
        secrets: Arc::new(cfg.secrets.clone()),
    };
    let app = build_router(app_state);

    let listener = TcpListener::bind(cfg.listen.as_str())
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);
    axum::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}
