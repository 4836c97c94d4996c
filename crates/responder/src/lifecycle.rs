//! Incident lifecycle: stage tracking and durable records.
//!
//! Every processed alert produces exactly one post-mortem. The first
//! occurrence of an alert name also produces a runbook; later occurrences
//! leave it untouched. Both files are created with create-new semantics, so
//! records are append-only and concurrent first occurrences of the same
//! alert name cannot both write a runbook.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::RecordError;

/// Marker that selects the restart hint in a runbook.
const RESTART_MARKER: &str = "RESTART DEPLOYMENT";

/// Stages an alert passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStage {
    Received,
    Normalized,
    Dispatched,
    Synthesized,
    /// Safety gate rejected the directive
    Blocked,
    /// Directive passed the gate and was parsed
    Parsed,
    /// A cluster mutation was issued
    Executed,
    Verified,
    /// Nothing was executed
    Skipped,
    /// Terminal
    Recorded,
}

impl IncidentStage {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        use IncidentStage::{
            Blocked, Dispatched, Executed, Normalized, Parsed, Received, Recorded, Skipped,
            Synthesized, Verified,
        };
        matches!(
            (self, next),
            (Received, Normalized)
                | (Normalized, Dispatched)
                | (Dispatched, Synthesized)
                | (Synthesized, Blocked | Parsed | Skipped)
                | (Parsed, Executed | Skipped)
                | (Executed, Verified | Recorded)
                | (Blocked | Verified | Skipped, Recorded)
        )
    }
}

impl fmt::Display for IncidentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How an incident ended, as written in the post-mortem header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentOutcome {
    /// A mutation was applied
    Remediated,
    /// Safety gate rejected the directive
    Blocked,
    /// Nothing actionable, or left for an operator
    Skipped,
    /// The mutation was attempted and failed
    Failed,
}

impl IncidentOutcome {
    fn status_line(self) -> &'static str {
        match self {
            Self::Remediated => "Resolved (Self-Healed)",
            Self::Blocked => "Open (Remediation Blocked by Safety Guardrails)",
            Self::Skipped => "Open (No Automated Remediation)",
            Self::Failed => "Open (Remediation Failed)",
        }
    }
}

/// Durable per-alert record.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentRecord {
    pub alert_name: String,
    pub timestamp: DateTime<Utc>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub consensus_text: String,
    pub remediation_result: String,
    pub outcome: IncidentOutcome,
    /// Health read-back, when a mutation was applied
    pub health: Option<String>,
}

/// Paths written for one incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPaths {
    /// The new post-mortem
    pub post_mortem: PathBuf,
    /// The runbook, only when this call created it
    pub runbook: Option<PathBuf>,
}

/// Hands out strictly increasing timestamps, one per record.
#[derive(Debug, Default)]
pub struct RecordClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl RecordClock {
    /// Next timestamp, at least one millisecond after the previous one.
    pub fn next(&self) -> DateTime<Utc> {
        // File names carry millisecond precision
        let mut now = Utc::now().trunc_subsecs(3);
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::milliseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

/// Writes post-mortems and runbooks to flat files.
pub struct LifecycleRecorder {
    runbooks_dir: PathBuf,
    post_mortems_dir: PathBuf,
    clock: RecordClock,
}

impl LifecycleRecorder {
    /// Create a recorder over the configured directories.
    #[must_use]
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            runbooks_dir: storage.runbooks_dir.clone(),
            post_mortems_dir: storage.post_mortems_dir.clone(),
            clock: RecordClock::default(),
        }
    }

    /// Timestamp for the next record.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        self.clock.next()
    }

    /// Write the post-mortem, then the runbook if none exists yet.
    pub fn record(&self, record: &IncidentRecord) -> Result<RecordedPaths, RecordError> {
        let stem = file_stem(&record.alert_name);

        let post_mortem = self.post_mortems_dir.join(format!(
            "{}-{stem}.md",
            record.timestamp.format("%Y%m%d-%H%M%S-%3f")
        ));
        if !write_new(&post_mortem, &render_post_mortem(record))? {
            return Err(RecordError::AlreadyExists {
                path: post_mortem.display().to_string(),
            });
        }
        info!(alert = %record.alert_name, path = %post_mortem.display(), "Post-mortem generated");

        let runbook_path = self.runbook_path(&record.alert_name);
        let runbook = if write_new(&runbook_path, &render_runbook(record))? {
            info!(alert = %record.alert_name, path = %runbook_path.display(), "Runbook generated");
            Some(runbook_path)
        } else {
            debug!(alert = %record.alert_name, path = %runbook_path.display(), "Existing runbook found");
            None
        };

        Ok(RecordedPaths {
            post_mortem,
            runbook,
        })
    }

    /// Where the runbook for an alert name lives.
    #[must_use]
    pub fn runbook_path(&self, alert_name: &str) -> PathBuf {
        self.runbooks_dir.join(format!("{}.md", file_stem(alert_name)))
    }
}

/// Create `path` with `content` unless it already exists.
///
/// Returns `Ok(false)` if the file was already there.
fn write_new(path: &Path, content: &str) -> Result<bool, RecordError> {
    let io_err = |source| RecordError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(io_err(e)),
    };
    file.write_all(content.as_bytes()).map_err(io_err)?;
    Ok(true)
}

/// Reduce an alert name to a safe file stem.
#[must_use]
pub fn file_stem(alert_name: &str) -> String {
    let stem: String = alert_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

fn render_post_mortem(record: &IncidentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Post-Mortem: {}\n", record.alert_name);
    let _ = writeln!(out, "**Timestamp**: {}", record.timestamp.format("%Y%m%d-%H%M%S"));
    let _ = writeln!(out, "**Status**: {}\n", record.outcome.status_line());

    out.push_str("## Alert Details\n");
    let _ = writeln!(
        out,
        "- **Summary**: {}",
        record.annotations.get("summary").map_or("None", String::as_str)
    );
    let _ = writeln!(
        out,
        "- **Description**: {}",
        record
            .annotations
            .get("description")
            .map_or("None", String::as_str)
    );
    let labels: Vec<String> = record
        .labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    let _ = writeln!(out, "- **Labels**: {{{}}}\n", labels.join(", "));

    out.push_str("## AI Analysis & RCA\n");
    if record.consensus_text.is_empty() {
        out.push_str("_No consensus was produced._\n\n");
    } else {
        let _ = writeln!(out, "{}\n", record.consensus_text.trim_end());
    }

    out.push_str("## Remediation\n");
    let _ = writeln!(out, "- **Result**: {}", record.remediation_result);
    if let Some(health) = &record.health {
        let _ = writeln!(out, "- **Health**: {health}");
    }

    out
}

fn render_runbook(record: &IncidentRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Runbook: {}\n", record.alert_name);
    let _ = writeln!(
        out,
        "## Description\n{}\n",
        record
            .annotations
            .get("description")
            .map_or("None", String::as_str)
    );
    out.push_str("## Troubleshooting Steps\n");
    out.push_str("1. Check logs for the affected service.\n");
    out.push_str("2. Verify resource consumption.\n");
    out.push_str("3. Refer to the AI generated remediation below.\n\n");
    out.push_str("## AI Recommended Remediation\n");
    if record.consensus_text.to_uppercase().contains(RESTART_MARKER) {
        out.push_str("- Action: `kubectl rollout restart deployment <name> -n <namespace>`\n");
    } else {
        out.push_str("- Action: no automated remediation recommended; investigate manually.\n");
    }
    out
}
