//! Kernel client: device list in, fleet snapshots out.

use async_trait::async_trait;
use printwatch_core::{AgentPush, DeviceInventory, InventoryError, ManagedDevice};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream rejected request with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushReceipt {
    pub ok: bool,
    pub push_id: String,
    pub received_at: String,
}

#[derive(Debug, Clone)]
pub struct Upstream {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Upstream {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, PushError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("x-agent-token", token),
            None => builder,
        }
    }

    pub async fn fetch_devices(&self) -> Result<Vec<ManagedDevice>, PushError> {
        let url = format!("{}/agent/devices", self.base_url);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let devices: Vec<ManagedDevice> = accepted(response).await?.json().await?;
        debug!(count = devices.len(), "device list fetched");
        Ok(devices)
    }

    pub async fn push(&self, push: &AgentPush) -> Result<PushReceipt, PushError> {
        let url = format!("{}/agent/push", self.base_url);
        let response = self.authorized(self.client.post(&url)).json(push).send().await?;
        Ok(accepted(response).await?.json().await?)
    }
}

async fn accepted(response: reqwest::Response) -> Result<reqwest::Response, PushError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PushError::Rejected { status, body })
}

/// Device list served by the kernel, re-fetched every scan.
pub struct HttpInventory {
    upstream: Arc<Upstream>,
}

impl HttpInventory {
    pub fn new(upstream: Arc<Upstream>) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl DeviceInventory for HttpInventory {
    async fn devices(&self) -> Result<Vec<ManagedDevice>, InventoryError> {
        self.upstream
            .fetch_devices()
            .await
            .map_err(|e| InventoryError::Unavailable(e.to_string()))
    }
}
