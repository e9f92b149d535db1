//! PrintWatch agent: probes printers from inside the restricted network and
//! pushes each fleet snapshot to the kernel.
//!
//! - Device list fetched from the kernel at every scan
//! - Scans on a fixed interval, overlapping ticks dropped
//! - Push failures logged; the next cycle sends fresh data

mod config;
mod upstream;

use anyhow::{Context, Result};
use config::AgentConfig;
use futures::FutureExt;
use printwatch_core::{AgentPush, DeviceProber, FleetScanner, ScanJob, ScanScheduler};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use upstream::{HttpInventory, Upstream};

/// Scan, then deliver. A failed push does not fail the cycle.
fn scan_and_push_job(agent_id: String, scanner: FleetScanner, upstream: Arc<Upstream>) -> ScanJob {
    Arc::new(move || {
        let agent_id = agent_id.clone();
        let scanner = scanner.clone();
        let upstream = upstream.clone();
        async move {
            let snapshot = scanner.scan().await.context("Failed to scan fleet")?;
            let push = AgentPush { agent_id, snapshot };
            match upstream.push(&push).await {
                Ok(receipt) if receipt.ok => info!(
                    push_id = %receipt.push_id,
                    received_at = %receipt.received_at,
                    total = push.snapshot.total,
                    "snapshot delivered"
                ),
                Ok(receipt) => warn!(push_id = %receipt.push_id, "kernel did not acknowledge snapshot"),
                Err(e) => warn!(error = %e, "snapshot delivery failed, will retry next cycle"),
            }
            Ok(push.snapshot)
        }
        .boxed()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("PrintWatch agent starting...");

    let config = AgentConfig::load().await.context("Failed to load agent configuration")?;
    if config.upstream.token.is_none() {
        warn!("PRINTWATCH_AGENT_TOKEN not set, the kernel will reject requests");
    }

    let upstream = Arc::new(
        Upstream::new(
            &config.upstream.base_url,
            config.upstream.token.clone(),
            Duration::from_secs(config.upstream.request_timeout_secs),
        )
        .context("Failed to build upstream client")?,
    );
    let scanner = FleetScanner::new(
        Arc::new(HttpInventory::new(upstream.clone())),
        DeviceProber::new(config.snmp.clone()),
    );

    let scheduler = ScanScheduler::new(
        scan_and_push_job(config.agent.agent_id.clone(), scanner, upstream),
        config.scan.interval(),
        config.scan.initial_delay(),
    );
    info!(
        agent_id = %config.agent.agent_id,
        upstream = %config.upstream.base_url,
        interval_secs = config.scan.interval_secs,
        "agent initialized"
    );

    let mut loop_handle = scheduler.spawn();
    tokio::select! {
        res = &mut loop_handle => {
            if let Err(e) = res {
                error!("Scan loop terminated: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            loop_handle.abort();
        }
    }
    Ok(())
}
