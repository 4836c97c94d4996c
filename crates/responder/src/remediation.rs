//! Remediation grammar and executor.
//!
//! Directive text is untrusted model output. It is parsed once against a
//! small closed grammar into a [`RemediationAction`]; only parsed actions are
//! ever executed.
//!
//! Supported forms (case-insensitive):
//! - `RESTART DEPLOYMENT <name> IN <namespace>`
//! - `SCALE DEPLOYMENT <name> IN <namespace> TO <count>`
//! - any line containing `ROLLBACK DEPLOYMENT` (recognized, never executed)

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

use crate::cluster::ClusterClient;

static RESTART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)RESTART DEPLOYMENT ([A-Za-z0-9_-]+) IN ([A-Za-z0-9_-]+)")
        .expect("restart pattern is valid")
});

static SCALE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // The count must end the token: "5.5" and "2-3" do not parse
    Regex::new(
        r"(?i)SCALE DEPLOYMENT ([A-Za-z0-9_-]+) IN ([A-Za-z0-9_-]+) TO ([0-9]+)(?:$|[\s,;)]|\.(?:\s|$))",
    )
    .expect("scale pattern is valid")
});

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:name|placeholder)>").expect("placeholder pattern is valid"));

const ROLLBACK_MARKER: &str = "ROLLBACK DEPLOYMENT";

/// A deployment in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkloadRef {
    /// Deployment name
    pub name: String,
    /// Namespace
    pub namespace: String,
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Structured remediation, built only from grammar matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemediationAction {
    /// Rolling restart of a deployment
    Restart { target: WorkloadRef },
    /// Set a deployment's replica count
    Scale { target: WorkloadRef, replicas: i32 },
    /// Rollback requested; left for a human
    Rollback,
    /// Nothing actionable
    None,
}

impl RemediationAction {
    /// Parse a directive line.
    ///
    /// A `SCALE` whose count is not a whole number that fits in an `i32`
    /// parses as [`RemediationAction::None`].
    #[must_use]
    pub fn parse(line: &str) -> Self {
        if let Some(caps) = RESTART_RE.captures(line) {
            return Self::Restart {
                target: WorkloadRef {
                    name: caps[1].to_string(),
                    namespace: caps[2].to_string(),
                },
            };
        }

        if let Some(caps) = SCALE_RE.captures(line) {
            return match caps[3].parse::<i32>() {
                Ok(replicas) => Self::Scale {
                    target: WorkloadRef {
                        name: caps[1].to_string(),
                        namespace: caps[2].to_string(),
                    },
                    replicas,
                },
                Err(_) => Self::None,
            };
        }

        if line.to_uppercase().contains(ROLLBACK_MARKER) {
            return Self::Rollback;
        }

        Self::None
    }

    /// Workload this action mutates, if any.
    #[must_use]
    pub fn target(&self) -> Option<&WorkloadRef> {
        match self {
            Self::Restart { target } | Self::Scale { target, .. } => Some(target),
            Self::Rollback | Self::None => None,
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart { target } => write!(f, "restart {target}"),
            Self::Scale { target, replicas } => write!(f, "scale {target} to {replicas}"),
            Self::Rollback => f.write_str("rollback"),
            Self::None => f.write_str("none"),
        }
    }
}

/// Replace `<name>`/`<placeholder>` tokens the model left unfilled.
///
/// `<namespace>` is intentionally not substituted.
#[must_use]
pub fn substitute_placeholders<'a>(line: &'a str, workload: Option<&str>) -> Cow<'a, str> {
    match workload {
        Some(workload) if !workload.is_empty() => {
            PLACEHOLDER_RE.replace_all(line, regex::NoExpand(workload))
        }
        _ => Cow::Borrowed(line),
    }
}

/// What running an action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The mutation was accepted by the orchestrator
    Applied(String),
    /// The orchestrator rejected or could not be reached
    Failed(String),
    /// Recognized but left for an operator
    ManualActionRequired(String),
    /// Nothing to execute
    NoAction(String),
}

impl ExecutionOutcome {
    /// Result string attached to the incident record.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Applied(m) | Self::Failed(m) | Self::ManualActionRequired(m) | Self::NoAction(m) => m,
        }
    }
}

/// Message used whenever no grammar form matched.
pub const NO_ACTION_MESSAGE: &str = "No actionable remediation found.";

/// Issues cluster mutations for parsed actions.
pub struct RemediationExecutor {
    cluster: Arc<dyn ClusterClient>,
}

impl RemediationExecutor {
    /// Create an executor over a cluster client.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Execute a parsed action. Orchestrator errors come back as [`ExecutionOutcome::Failed`].
    ///
    /// Each call issues a fresh mutation; restarts carry a new timestamp.
    pub async fn execute(&self, action: &RemediationAction) -> ExecutionOutcome {
        match action {
            RemediationAction::Restart { target } => {
                info!(deployment = %target.name, namespace = %target.namespace, "Triggering rollout restart");
                match self
                    .cluster
                    .restart_workload(&target.name, &target.namespace, Utc::now())
                    .await
                {
                    Ok(()) => ExecutionOutcome::Applied(format!(
                        "Successfully restarted deployment {} in {}",
                        target.name, target.namespace
                    )),
                    Err(e) => {
                        error!(deployment = %target.name, error = %e, "Restart failed");
                        ExecutionOutcome::Failed(format!("Failed to execute remediation: {e}"))
                    }
                }
            }
            RemediationAction::Scale { target, replicas } => {
                info!(deployment = %target.name, namespace = %target.namespace, replicas, "Scaling deployment");
                match self
                    .cluster
                    .scale_workload(&target.name, &target.namespace, *replicas)
                    .await
                {
                    Ok(()) => ExecutionOutcome::Applied(format!(
                        "Successfully scaled {} to {}",
                        target.name, replicas
                    )),
                    Err(e) => {
                        error!(deployment = %target.name, error = %e, "Scale failed");
                        ExecutionOutcome::Failed(format!("Failed to execute remediation: {e}"))
                    }
                }
            }
            RemediationAction::Rollback => ExecutionOutcome::ManualActionRequired(
                "Rollback logic initiated (Manual intervention still suggested)".to_string(),
            ),
            RemediationAction::None => ExecutionOutcome::NoAction(NO_ACTION_MESSAGE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload(name: &str, namespace: &str) -> WorkloadRef {
        WorkloadRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    #[test]
    fn test_parse_restart() {
        assert_eq!(
            RemediationAction::parse("RESTART DEPLOYMENT cartservice IN online-boutique"),
            RemediationAction::Restart {
                target: workload("cartservice", "online-boutique")
            }
        );
    }

    #[test]
    fn test_parse_restart_embedded_and_lowercase() {
        assert_eq!(
            RemediationAction::parse("**Remediation**: restart deployment ad-service-v2 in online-boutique."),
            RemediationAction::Restart {
                target: workload("ad-service-v2", "online-boutique")
            }
        );
    }

    #[test]
    fn test_parse_scale_exact_count() {
        assert_eq!(
            RemediationAction::parse("SCALE DEPLOYMENT frontend IN online-boutique TO 5"),
            RemediationAction::Scale {
                target: workload("frontend", "online-boutique"),
                replicas: 5
            }
        );
        assert_eq!(
            RemediationAction::parse("scale deployment frontend in online-boutique to 12 replicas"),
            RemediationAction::Scale {
                target: workload("frontend", "online-boutique"),
                replicas: 12
            }
        );
        assert_eq!(
            RemediationAction::parse("Remediation: SCALE DEPLOYMENT frontend IN online-boutique TO 4."),
            RemediationAction::Scale {
                target: workload("frontend", "online-boutique"),
                replicas: 4
            }
        );
    }

    #[test]
    fn test_parse_scale_non_numeric_is_none() {
        for line in [
            "SCALE DEPLOYMENT frontend IN online-boutique TO five",
            "SCALE DEPLOYMENT frontend IN online-boutique TO <count>",
            "SCALE DEPLOYMENT frontend IN online-boutique TO 5x",
            "SCALE DEPLOYMENT frontend IN online-boutique TO 99999999999",
            "SCALE DEPLOYMENT frontend IN online-boutique TO 5.5",
            "SCALE DEPLOYMENT frontend IN online-boutique TO 2-3",
            "SCALE DEPLOYMENT frontend IN online-boutique",
        ] {
            assert_eq!(RemediationAction::parse(line), RemediationAction::None, "{line}");
        }
    }

    #[test]
    fn test_parse_rollback_and_none() {
        assert_eq!(
            RemediationAction::parse("Consider ROLLBACK DEPLOYMENT checkout to previous revision"),
            RemediationAction::Rollback
        );
        assert_eq!(
            RemediationAction::parse("Monitor the service"),
            RemediationAction::None
        );
        // Unfilled template never becomes an action
        assert_eq!(
            RemediationAction::parse("RESTART DEPLOYMENT <name> IN online-boutique"),
            RemediationAction::None
        );
    }

    #[test]
    fn test_placeholder_substitution() {
        assert_eq!(
            substitute_placeholders("RESTART DEPLOYMENT <name> IN online-boutique", Some("frontend")),
            "RESTART DEPLOYMENT frontend IN online-boutique"
        );
        assert_eq!(
            substitute_placeholders("RESTART DEPLOYMENT <NAME> IN online-boutique", Some("frontend")),
            "RESTART DEPLOYMENT frontend IN online-boutique"
        );
        assert_eq!(
            substitute_placeholders("RESTART DEPLOYMENT <placeholder> IN online-boutique", Some("web")),
            "RESTART DEPLOYMENT web IN online-boutique"
        );
    }

    #[test]
    fn test_namespace_placeholder_left_alone() {
        assert_eq!(
            substitute_placeholders("RESTART DEPLOYMENT <name> IN <namespace>", Some("frontend")),
            "RESTART DEPLOYMENT frontend IN <namespace>"
        );
    }

    #[test]
    fn test_substitution_without_workload_is_noop() {
        let line = "RESTART DEPLOYMENT <name> IN online-boutique";
        assert!(matches!(substitute_placeholders(line, None), Cow::Borrowed(_)));
        assert_eq!(substitute_placeholders(line, Some("")), line);
    }

    #[test]
    fn test_action_target() {
        let action = RemediationAction::parse("SCALE DEPLOYMENT web IN shop TO 2");
        assert_eq!(action.target(), Some(&workload("web", "shop")));
        assert_eq!(RemediationAction::Rollback.target(), None);
        assert_eq!(action.to_string(), "scale shop/web to 2");
    }
}
