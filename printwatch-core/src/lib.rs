//! Printer fleet health over SNMP.
//!
//! Shared by the kernel (cloud-side scans, reconciliation, HTTP surface) and the
//! in-network agent (scan and push).

pub mod inventory;
pub mod models;
pub mod oid;
pub mod prober;
pub mod scanner;
pub mod scheduler;
pub mod settings;
pub mod snmp;

pub use inventory::{DeviceInventory, FileInventory, InventoryError, StaticInventory};
pub use models::{
    AgentPush, DeviceHealth, DeviceStatus, ErrorDetail, FleetSnapshot, ManagedDevice, Severity, SupplyReading,
    NO_ERROR,
};
pub use prober::DeviceProber;
pub use scanner::{FleetScanner, ScanError};
pub use scheduler::{ScanJob, ScanScheduler, SchedulerStats, Trigger, TriggerError};
pub use settings::SnmpSettings;

