//! Where the managed-device list comes from.

use crate::models::ManagedDevice;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("inventory unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid inventory {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Read-only source of managed devices, queried once per scan.
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    async fn devices(&self) -> Result<Vec<ManagedDevice>, InventoryError>;
}

/// Fixed list, used by tests and embedded setups.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    devices: Vec<ManagedDevice>,
}

impl StaticInventory {
    pub fn new(devices: Vec<ManagedDevice>) -> Self {
        Self { devices }
    }
}

#[async_trait]
impl DeviceInventory for StaticInventory {
    async fn devices(&self) -> Result<Vec<ManagedDevice>, InventoryError> {
        Ok(self.devices.clone())
    }
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    community: Option<String>,
    #[serde(default)]
    devices: Vec<ManagedDevice>,
}

/// YAML file re-read on every call so edits apply to the next scan.
///
/// ```yaml
/// community: public        # optional fleet-wide default
/// devices:
///   - id: lobby
///     label: Lobby MFP
///     address: 10.20.0.15
/// ```
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeviceInventory for FileInventory {
    async fn devices(&self) -> Result<Vec<ManagedDevice>, InventoryError> {
        let txt = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| InventoryError::Io { path: self.path.clone(), source })?;
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: InventoryFile = serde_yaml::from_str(&txt)
            .map_err(|source| InventoryError::Parse { path: self.path.clone(), source })?;

        let fleet_community = file.community;
        Ok(file
            .devices
            .into_iter()
            .map(|mut d| {
                if d.community.is_none() {
                    d.community = fleet_community.clone();
                }
                d
            })
            .collect())
    }
}
