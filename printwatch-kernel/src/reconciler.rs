//! Chooses between the agent's last push and a fresh cloud-side scan.
//!
//! The push store has one writer (the push handler) and replaces its value
//! wholesale; readers clone it. Freshness is evaluated on every read.

use parking_lot::RwLock;
use printwatch_core::{AgentPush, FleetScanner, FleetSnapshot, ScanError};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredPush {
    pub push_id: Uuid,
    pub agent_id: String,
    pub received_at: OffsetDateTime,
    pub snapshot: FleetSnapshot,
}

#[derive(Debug, Default)]
pub struct PushStore {
    latest: RwLock<Option<StoredPush>>,
}

impl PushStore {
    pub fn accept(&self, push: AgentPush) -> StoredPush {
        self.accept_at(push, OffsetDateTime::now_utc())
    }

    pub fn accept_at(&self, push: AgentPush, received_at: OffsetDateTime) -> StoredPush {
        let stored = StoredPush {
            push_id: Uuid::new_v4(),
            agent_id: push.agent_id,
            received_at,
            snapshot: push.snapshot,
        };
        info!(
            agent_id = %stored.agent_id,
            total = stored.snapshot.total,
            with_issues = stored.snapshot.with_issues,
            "agent push stored"
        );
        *self.latest.write() = Some(stored.clone());
        stored
    }

    pub fn latest(&self) -> Option<StoredPush> {
        self.latest.read().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    InNetworkAgent,
    CloudDirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackReason {
    /// No push since the kernel started.
    Absent,
    /// Last push older than the freshness threshold.
    Stale,
    /// Last push carried no devices.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledSnapshot {
    #[serde(flatten)]
    pub snapshot: FleetSnapshot,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub received_at: Option<OffsetDateTime>,
}

#[derive(Debug)]
pub enum Decision {
    UsePush { push: StoredPush, age_seconds: i64 },
    Fallback(FallbackReason),
}

pub struct Reconciler {
    store: PushStore,
    scanner: FleetScanner,
    threshold: Duration,
}

impl Reconciler {
    pub fn new(scanner: FleetScanner, threshold: std::time::Duration) -> Self {
        Self {
            store: PushStore::default(),
            scanner,
            threshold: Duration::try_from(threshold).unwrap_or(Duration::MAX),
        }
    }

    pub fn store(&self) -> &PushStore {
        &self.store
    }

    pub fn decide(&self, now: OffsetDateTime) -> Decision {
        let Some(push) = self.store.latest() else {
            return Decision::Fallback(FallbackReason::Absent);
        };
        let age = now - push.received_at;
        if age > self.threshold {
            return Decision::Fallback(FallbackReason::Stale);
        }
        if push.snapshot.devices.is_empty() {
            return Decision::Fallback(FallbackReason::Empty);
        }
        Decision::UsePush { age_seconds: age.whole_seconds().max(0), push }
    }

    pub async fn read(&self) -> Result<ReconciledSnapshot, ScanError> {
        match self.decide(OffsetDateTime::now_utc()) {
            Decision::UsePush { push, age_seconds } => {
                debug!(age_seconds, agent_id = %push.agent_id, "serving agent push");
                Ok(ReconciledSnapshot {
                    received_at: Some(push.received_at),
                    snapshot: push.snapshot,
                    source: Source::InNetworkAgent,
                    data_age_seconds: Some(age_seconds),
                    fallback_reason: None,
                })
            }
            Decision::Fallback(reason) => {
                info!(?reason, "agent data unusable, scanning cloud-direct");
                let snapshot = self.scanner.scan().await?;
                Ok(ReconciledSnapshot {
                    snapshot,
                    source: Source::CloudDirect,
                    data_age_seconds: None,
                    fallback_reason: Some(reason),
                    received_at: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printwatch_core::{DeviceProber, ManagedDevice, SnmpSettings, StaticInventory};
    use std::sync::Arc;

    fn reconciler(devices: Vec<ManagedDevice>) -> Reconciler {
        let scanner = FleetScanner::new(
            Arc::new(StaticInventory::new(devices)),
            DeviceProber::new(SnmpSettings::default()),
        );
        Reconciler::new(scanner, std::time::Duration::from_secs(420))
    }

    fn push_of(devices: &[ManagedDevice]) -> AgentPush {
        let health = devices
            .iter()
            .map(printwatch_core::DeviceHealth::no_ip_configured)
            .collect();
        AgentPush { agent_id: "site-a".into(), snapshot: FleetSnapshot::from_devices(health) }
    }

    #[test]
    fn fresh_push_is_used_with_its_age() {
        let r = reconciler(vec![]);
        let now = OffsetDateTime::now_utc();
        r.store().accept_at(push_of(&[ManagedDevice::new("a", "A", None)]), now - Duration::seconds(30));
        match r.decide(now) {
            Decision::UsePush { age_seconds, push } => {
                assert_eq!(age_seconds, 30);
                assert_eq!(push.agent_id, "site-a");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stale_absent_and_empty_fall_back() {
        let r = reconciler(vec![]);
        let now = OffsetDateTime::now_utc();
        assert!(matches!(r.decide(now), Decision::Fallback(FallbackReason::Absent)));

        r.store().accept_at(push_of(&[ManagedDevice::new("a", "A", None)]), now - Duration::seconds(421));
        assert!(matches!(r.decide(now), Decision::Fallback(FallbackReason::Stale)));

        r.store().accept_at(push_of(&[]), now);
        assert!(matches!(r.decide(now), Decision::Fallback(FallbackReason::Empty)));
    }

    #[test]
    fn newer_push_overwrites_in_full() {
        let r = reconciler(vec![]);
        let first = r.store().accept(push_of(&[ManagedDevice::new("a", "A", None)]));
        let second = r.store().accept(push_of(&[]));
        let latest = r.store().latest().unwrap();
        assert_ne!(first.push_id, second.push_id);
        assert_eq!(latest.push_id, second.push_id);
        assert_eq!(latest.snapshot.total, 0);
    }

    #[tokio::test]
    async fn stale_push_yields_cloud_direct_snapshot() {
        let r = reconciler(vec![ManagedDevice::new("x", "X", None)]);
        r.store().accept_at(
            push_of(&[ManagedDevice::new("a", "A", None), ManagedDevice::new("b", "B", None)]),
            OffsetDateTime::now_utc() - Duration::hours(2),
        );
        let out = r.read().await.unwrap();
        assert_eq!(out.source, Source::CloudDirect);
        assert_eq!(out.fallback_reason, Some(FallbackReason::Stale));
        assert_eq!(out.snapshot.total, 1);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["source"], "cloud-direct");
        assert_eq!(json["fallbackReason"], "stale");
        assert_eq!(json["withIssues"], 1);
        assert!(json.get("dataAgeSeconds").is_none());
    }

    #[tokio::test]
    async fn fresh_push_serializes_as_in_network() {
        use time::format_description::well_known::Rfc3339;

        let r = reconciler(vec![]);
        let at = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        r.store().accept_at(push_of(&[ManagedDevice::new("a", "A", None)]), at);
        let json = serde_json::to_value(r.read().await.unwrap()).unwrap();
        assert_eq!(json["source"], "in-network-agent");
        assert_eq!(json["total"], 1);
        assert!(json["dataAgeSeconds"].as_i64().unwrap() >= 0);
        assert!(json.get("fallbackReason").is_none());

        // Push and snapshot stamps share one RFC 3339 rendering.
        let received = json["receivedAt"].as_str().unwrap();
        assert_eq!(OffsetDateTime::parse(received, &Rfc3339).unwrap(), at);
        assert!(OffsetDateTime::parse(json["timestamp"].as_str().unwrap(), &Rfc3339).is_ok());
        assert!(OffsetDateTime::parse(json["devices"][0]["lastChecked"].as_str().unwrap(), &Rfc3339).is_ok());
    }
}
