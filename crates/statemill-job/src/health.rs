//! Per-job health reporting
//!
//! Jobs report through a [`HealthReporter`]; the latest report of every job
//! is kept in the shared [`Health`] registry under `scope/job`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Ok,
    Degraded,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub level: HealthLevel,
    pub message: String,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Latest health report of every job
#[derive(Debug, Clone, Default)]
pub struct Health {
    reports: Arc<RwLock<BTreeMap<String, HealthReport>>>,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reporter(&self, id: impl Into<String>) -> HealthReporter {
        HealthReporter {
            id: id.into(),
            health: self.clone(),
        }
    }

    pub fn get(&self, id: &str) -> Option<HealthReport> {
        self.reports.read().get(id).cloned()
    }

    /// All reports ordered by id
    pub fn all(&self) -> Vec<(String, HealthReport)> {
        self.reports
            .read()
            .iter()
            .map(|(id, report)| (id.clone(), report.clone()))
            .collect()
    }

    fn set(&self, id: &str, level: HealthLevel, message: &str, error: Option<String>) {
        let report = HealthReport {
            level,
            message: message.to_string(),
            error,
            updated_at: Utc::now(),
        };
        self.reports.write().insert(id.to_string(), report);
    }
}

/// Health handle for a single job
#[derive(Debug, Clone)]
pub struct HealthReporter {
    id: String,
    health: Health,
}

impl HealthReporter {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ok(&self, message: &str) {
        self.health.set(&self.id, HealthLevel::Ok, message, None);
    }

    pub fn degraded(&self, message: &str, error: &dyn fmt::Display) {
        self.health.set(
            &self.id,
            HealthLevel::Degraded,
            message,
            Some(error.to_string()),
        );
    }

    pub fn stopped(&self, message: &str) {
        self.health.set(&self.id, HealthLevel::Stopped, message, None);
    }
}
