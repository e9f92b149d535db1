use crate::reconciler::PushStore;
use printwatch_core::SchedulerStats;
use serde::Serialize;
use std::time::Instant;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub memory_usage_mb: f32,
    pub scans: SchedulerStats,
    pub last_push_agent: Option<String>,
    pub last_push_age_seconds: Option<i64>,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn get_health(&self, scans: SchedulerStats, pushes: &PushStore) -> KernelHealth {
        let latest = pushes.latest();
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            memory_usage_mb: get_memory_usage_mb(),
            scans,
            last_push_age_seconds: latest
                .as_ref()
                .map(|p| (OffsetDateTime::now_utc() - p.received_at).whole_seconds().max(0)),
            last_push_agent: latest.map(|p| p.agent_id),
        }
    }
}

/// Resident set size from /proc; 0 where unavailable.
fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|l| l.starts_with("VmRSS:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}
