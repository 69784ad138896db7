//! Resource guard: memory and error-rate pressure, alert log, health, and
//! the emergency single-chunk result.

use crate::config::GuardConfig;
use crate::types::{ChunkMetadata, ChunkType, CodeChunk};
use log::{info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const MEMORY_LIMIT_EXCEEDED: &str = "Memory limit exceeded";
pub const ERROR_RATE_EXCEEDED: &str = "Error rate too high";

/// Source of the process's resident memory
pub trait MemoryProbe: Send + Sync {
    /// Resident set size in MiB; `None` when unknown
    fn resident_mb(&self) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/self/status`; unknown on other platforms
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_mb(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss_kb(&status).map(|kb| kb / 1024)
    }
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Constant reading, for hosts that meter memory themselves
#[derive(Debug, Clone, Copy)]
pub struct StaticMemoryProbe(pub u64);

impl MemoryProbe for StaticMemoryProbe {
    fn resident_mb(&self) -> Option<u64> {
        Some(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub raised_unix_ms: u64,
    #[serde(skip)]
    raised_at: Instant,
}

impl Alert {
    #[must_use]
    pub fn age(&self) -> Duration {
        self.raised_at.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    pub memory_limit_mb: u64,
    pub error_rate: f64,
    /// Alerts inside the alert window
    pub recent_alerts: usize,
}

pub struct ResourceGuard {
    config: GuardConfig,
    probe: Box<dyn MemoryProbe>,
    outcomes: Mutex<VecDeque<bool>>,
    alerts: Mutex<VecDeque<Alert>>,
}

impl ResourceGuard {
    #[must_use]
    pub fn new(config: GuardConfig) -> Self {
        Self::with_probe(config, Box::new(ProcessMemoryProbe))
    }

    #[must_use]
    pub fn with_probe(config: GuardConfig, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            config,
            probe,
            outcomes: Mutex::new(VecDeque::new()),
            alerts: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn memory_usage_mb(&self) -> Option<u64> {
        self.probe.resident_mb()
    }

    /// True while resident memory is within the limit (or unknown)
    #[must_use]
    pub fn check_memory_limit(&self) -> bool {
        self.memory_usage_mb()
            .map_or(true, |mb| mb <= self.config.memory_limit_mb)
    }

    /// Error rate over the recent window has crossed the threshold
    #[must_use]
    pub fn should_use_fallback(&self) -> bool {
        let outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        outcomes.len() >= self.config.min_error_samples
            && Self::rate(&outcomes) >= self.config.error_rate_threshold
    }

    /// Why normal processing should be skipped, if it should
    pub fn degradation_reason(&self) -> Option<&'static str> {
        if !self.check_memory_limit() {
            self.alert(
                AlertSeverity::Critical,
                format!(
                    "resident memory {} MiB over the {} MiB limit",
                    self.memory_usage_mb().unwrap_or_default(),
                    self.config.memory_limit_mb
                ),
            );
            return Some(MEMORY_LIMIT_EXCEEDED);
        }
        if self.should_use_fallback() {
            self.alert(
                AlertSeverity::Warning,
                format!("error rate {:.2} over threshold", self.error_rate()),
            );
            return Some(ERROR_RATE_EXCEEDED);
        }
        None
    }

    /// Feed one processing outcome into the sliding window
    pub fn record_outcome(&self, success: bool) {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        outcomes.push_back(success);
        while outcomes.len() > self.config.error_window {
            outcomes.pop_front();
        }
    }

    #[must_use]
    pub fn error_rate(&self) -> f64 {
        Self::rate(&self.outcomes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate(outcomes: &VecDeque<bool>) -> f64 {
        if outcomes.is_empty() {
            return 0.0;
        }
        outcomes.iter().filter(|ok| !**ok).count() as f64 / outcomes.len() as f64
    }

    pub fn alert(&self, severity: AlertSeverity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            AlertSeverity::Info => info!("guard: {message}"),
            AlertSeverity::Warning | AlertSeverity::Critical => warn!("guard: {message}"),
        }
        let mut alerts = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);
        alerts.push_back(Alert {
            severity,
            message,
            raised_unix_ms: current_unix_ms(),
            raised_at: Instant::now(),
        });
        while alerts.len() > self.config.max_alerts {
            alerts.pop_front();
        }
    }

    /// Alerts raised within the alert window, oldest first
    #[must_use]
    pub fn recent_alerts(&self) -> Vec<Alert> {
        let window = Duration::from_secs(self.config.alert_window_secs);
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.age() <= window)
            .cloned()
            .collect()
    }

    pub fn clear_alerts(&self) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Worst recent alert decides; live memory or error pressure counts too
    #[must_use]
    pub fn health_check(&self) -> HealthReport {
        let recent = self.recent_alerts();
        let worst = recent.iter().map(|a| a.severity).max();
        let memory_mb = self.memory_usage_mb();
        let over_memory = memory_mb.is_some_and(|mb| mb > self.config.memory_limit_mb);

        let status = if over_memory || worst == Some(AlertSeverity::Critical) {
            HealthStatus::Unhealthy
        } else if self.should_use_fallback() || worst == Some(AlertSeverity::Warning) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            memory_mb,
            memory_limit_mb: self.config.memory_limit_mb,
            error_rate: self.error_rate(),
            recent_alerts: recent.len(),
        }
    }
}

impl std::fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("config", &self.config)
            .field("error_rate", &self.error_rate())
            .finish_non_exhaustive()
    }
}

/// The whole file as one generic chunk, flagged as a fallback
#[must_use]
pub fn emergency_chunk(
    content: &str,
    language: &str,
    file_path: Option<&str>,
    reason: &str,
) -> CodeChunk {
    let mut metadata = ChunkMetadata::with_language(language)
        .chunk_type(ChunkType::Generic)
        .file_path(file_path)
        .strategy("emergency");
    metadata.fallback = true;
    metadata.fallback_reason = Some(reason.to_string());
    let end_line = content.lines().count().max(1);
    CodeChunk::new(1, end_line, content.to_string(), metadata)
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|dur| u64::try_from(dur.as_millis()).ok())
        .unwrap_or(0)
}
