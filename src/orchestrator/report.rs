//! # Healthcheck results.
//!
//! ```rust
//! use vigil::Health;
//!
//! let h = Health::unhealthy().with("lag_ms", 1200);
//! let json = serde_json::to_value(&h).unwrap();
//! assert_eq!(json, serde_json::json!({ "healthy": false, "lag_ms": 1200 }));
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// One resource's health, plus whatever the hook wants to report alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    /// Verdict of the resource.
    pub healthy: bool,
    /// Free-form fields, flattened next to `healthy` when serialized.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Health {
    /// A healthy report with no extra fields.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            extra: Map::new(),
        }
    }

    /// An unhealthy report with no extra fields.
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::healthy()
        }
    }

    /// Adds a free-form field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::healthy()
    }
}

/// Outcome of one `healthcheck()` probe.
///
/// Every registered resource appears in both maps. `errors` holds `None` for resources
/// whose hook did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// AND over every resource's `healthy`.
    pub healthy: bool,
    /// Per-resource health; a resource without a hook (or whose hook failed) is healthy.
    pub resources: BTreeMap<String, Health>,
    /// Per-resource hook failure.
    pub errors: BTreeMap<String, Option<String>>,
}

impl HealthReport {
    pub(crate) fn new() -> Self {
        Self {
            healthy: true,
            resources: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, name: &str, health: Health, error: Option<String>) {
        self.healthy &= health.healthy;
        self.resources.insert(name.to_string(), health);
        self.errors.insert(name.to_string(), error);
    }

    /// Names of the resources that reported unhealthy.
    pub fn unhealthy(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(|(_, h)| !h.healthy)
            .map(|(name, _)| name.as_str())
    }

    /// Names of the resources whose hook failed.
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter(|(_, e)| e.is_some())
            .map(|(name, _)| name.as_str())
    }
}
