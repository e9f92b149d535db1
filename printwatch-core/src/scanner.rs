use crate::inventory::{DeviceInventory, InventoryError};
use crate::models::{DeviceHealth, FleetSnapshot, ManagedDevice};
use crate::prober::DeviceProber;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// Probes the whole fleet concurrently and assembles one snapshot.
#[derive(Clone)]
pub struct FleetScanner {
    inventory: Arc<dyn DeviceInventory>,
    prober: DeviceProber,
}

impl FleetScanner {
    pub fn new(inventory: Arc<dyn DeviceInventory>, prober: DeviceProber) -> Self {
        Self { inventory, prober }
    }

    pub fn prober(&self) -> &DeviceProber {
        &self.prober
    }

    /// Re-reads the inventory, then probes. Only an inventory failure fails the scan.
    pub async fn scan(&self) -> Result<FleetSnapshot, ScanError> {
        let devices = self.inventory.devices().await.map_err(|e| {
            warn!(error = %e, "fleet scan aborted: inventory unavailable");
            e
        })?;
        Ok(self.scan_devices(&devices).await)
    }

    pub async fn scan_devices(&self, devices: &[ManagedDevice]) -> FleetSnapshot {
        let started = Instant::now();
        // Unbounded fan-out; each probe carries its own deadline. join_all keeps input order.
        let results: Vec<DeviceHealth> = join_all(devices.iter().map(|device| async move {
            match device.usable_address() {
                Some(_) => self.prober.probe(device).await,
                None => DeviceHealth::no_ip_configured(device),
            }
        }))
        .await;

        let snapshot = FleetSnapshot::from_devices(results);
        info!(
            total = snapshot.total,
            with_issues = snapshot.with_issues,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fleet scan complete"
        );
        snapshot
    }
}
