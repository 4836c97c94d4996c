//! Alert normalization.
//!
//! Raw Alertmanager alerts are untrusted JSON. Normalization never fails:
//! missing maps become empty, a missing name becomes [`UNKNOWN_ALERT`], so
//! the rest of the pipeline stays live even for malformed input.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Name given to alerts that carry neither `labels.alertname` nor `name`.
pub const UNKNOWN_ALERT: &str = "UnknownAlert";

/// Marker in an alert name that flags it as predictive.
const PREDICTIVE_MARKER: &str = "PREDICTIVE";

/// Label precedence used to resolve the target workload.
const WORKLOAD_LABELS: [&str; 3] = ["deployment", "app", "service"];

/// Canonical, immutable alert record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Alert name (from `labels.alertname`)
    pub name: String,
    /// "firing" or "resolved"; kept verbatim
    pub status: String,
    /// Alert labels
    pub labels: BTreeMap<String, String>,
    /// Alert annotations
    pub annotations: BTreeMap<String, String>,
    /// When the alert started firing, if the payload said so
    pub starts_at: Option<DateTime<Utc>>,
    /// Alertmanager fingerprint, if present
    pub fingerprint: Option<String>,
}

impl Alert {
    /// Normalize one raw alert object from a webhook batch.
    #[must_use]
    pub fn from_value(raw: &Value) -> Self {
        let labels = string_map(raw.get("labels"));
        let annotations = string_map(raw.get("annotations"));

        let name = labels
            .get("alertname")
            .cloned()
            .or_else(|| raw.get("name").and_then(Value::as_str).map(String::from))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ALERT.to_string());

        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let starts_at = raw
            .get("startsAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let fingerprint = raw
            .get("fingerprint")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
            .map(String::from);

        Self {
            name,
            status,
            labels,
            annotations,
            starts_at,
            fingerprint,
        }
    }

    /// Get a label value.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Get an annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Get the namespace label.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.label("namespace")
    }

    /// Warning-severity alerts and alerts named as predictions are early warnings.
    #[must_use]
    pub fn is_predictive(&self) -> bool {
        self.label("severity") == Some("warning")
            || self.name.to_uppercase().contains(PREDICTIVE_MARKER)
    }

    /// Resolve the workload this alert is about, falling back to `default`.
    #[must_use]
    pub fn target_workload<'a>(&'a self, default: &'a str) -> &'a str {
        WORKLOAD_LABELS
            .iter()
            .find_map(|key| self.label(key).filter(|v| !v.is_empty()))
            .unwrap_or(default)
    }

    /// Render the context block shared by every prompt for this alert.
    #[must_use]
    pub fn context_block(&self, default_workload: &str) -> String {
        let mut block = String::new();
        let _ = writeln!(
            block,
            "Status: {} | Alert Name: {} | Namespace: {}",
            self.status,
            self.name,
            self.namespace().unwrap_or("None")
        );
        let _ = writeln!(block, "Deployment: {}", self.target_workload(default_workload));
        let _ = writeln!(block, "Summary: {}", self.annotation("summary").unwrap_or("None"));
        let _ = write!(
            block,
            "Description: {}",
            self.annotation("description").unwrap_or("None")
        );
        block
    }
}

/// Read a JSON object into a string map, stringifying non-string values.
fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };

    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}
