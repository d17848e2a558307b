use parking_lot::Mutex;
use serde::Serialize;

const LATENCY_WEIGHT: f64 = 0.3;
const ERROR_PENALTY: f64 = 5.0;
const ERROR_DECAY: f64 = 0.1;

/// Process-local telemetry. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub global_rate_limit: Option<f64>,
    pub average_latency: f64,
    pub error_rate: f64,
    pub active_nodes: usize,
    pub last_sync: Option<i64>,
}

#[derive(Default)]
struct MonitorState {
    health: SystemHealth,
    latency_seeded: bool,
}

#[derive(Default)]
pub struct HealthMonitor {
    state: Mutex<MonitorState>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// EWMA, seeded with the first sample.
    pub fn record_latency(&self, millis: f64) {
        let mut state = self.state.lock();
        if state.latency_seeded {
            state.health.average_latency =
                LATENCY_WEIGHT * millis + (1.0 - LATENCY_WEIGHT) * state.health.average_latency;
        } else {
            state.health.average_latency = millis;
            state.latency_seeded = true;
        }
    }

    pub fn record_error(&self) {
        let mut state = self.state.lock();
        state.health.error_rate = (state.health.error_rate + ERROR_PENALTY).clamp(0.0, 100.0);
    }

    pub fn record_rate_limit_header(&self, remaining: Option<&str>) {
        let Some(value) = remaining.and_then(|v| v.trim().parse::<f64>().ok()) else {
            return;
        };
        self.state.lock().health.global_rate_limit = Some(value);
    }

    pub fn mark_synced(&self, at_ms: i64) {
        self.state.lock().health.last_sync = Some(at_ms);
    }

    /// Every read decays the error rate.
    pub fn snapshot(&self, active_nodes: usize) -> SystemHealth {
        let mut state = self.state.lock();
        let health = &mut state.health;
        health.error_rate = (health.error_rate - ERROR_DECAY).clamp(0.0, 100.0);
        health.active_nodes = active_nodes;
        health.clone()
    }
}
