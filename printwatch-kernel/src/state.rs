use crate::config::Secrets;
use crate::health::HealthTracker;
use crate::reconciler::Reconciler;
use anyhow::Context;
use futures::FutureExt;
use parking_lot::Mutex;
use printwatch_core::{DeviceInventory, FleetScanner, FleetSnapshot, ScanJob, ScanScheduler};
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Everything the HTTP handlers reach.
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn DeviceInventory>,
    pub reconciler: Arc<Reconciler>,
    pub scheduler: ScanScheduler,
    /// Last snapshot produced by a scheduled or manual cloud-side scan.
    pub last_cloud: Shared<Option<FleetSnapshot>>,
    pub health_tracker: HealthTracker,
    pub secrets: Arc<Secrets>,
}

/// Scheduler job: scan the fleet and keep the result for `/fleet/cloud`.
pub fn cloud_scan_job(scanner: FleetScanner, last_cloud: Shared<Option<FleetSnapshot>>) -> ScanJob {
    Arc::new(move || {
        let scanner = scanner.clone();
        let last_cloud = last_cloud.clone();
        async move {
            let snapshot = scanner.scan().await.context("cloud-side fleet scan")?;
            *last_cloud.lock() = Some(snapshot.clone());
            Ok(snapshot)
        }
        .boxed()
    })
}
