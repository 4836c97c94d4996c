//! Post-remediation health verification.
//!
//! A single instantaneous read-back, not a convergence wait: the report is
//! logged and attached to the incident, never retried and never blocking.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cluster::ClusterClient;
use crate::remediation::WorkloadRef;

/// Outcome of one health read-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "health", rename_all = "snake_case")]
pub enum HealthReport {
    /// ready ≥ desired
    Healthy { ready: i32, desired: i32 },
    /// ready < desired
    Unhealthy { ready: i32, desired: i32 },
    /// The read itself failed
    Unknown { error: String },
}

impl HealthReport {
    /// Whether the workload was at or above its desired replica count.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy { ready, desired } => write!(f, "HEALTHY ({ready}/{desired} replicas)"),
            Self::Unhealthy { ready, desired } => {
                write!(f, "UNHEALTHY ({ready}/{desired} replicas)")
            }
            Self::Unknown { error } => write!(f, "UNKNOWN ({error})"),
        }
    }
}

/// Reads back workload status after a mutation.
pub struct HealthVerifier {
    cluster: Arc<dyn ClusterClient>,
}

impl HealthVerifier {
    /// Create a verifier over a cluster client.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }

    /// Check a workload once.
    pub async fn verify(&self, target: &WorkloadRef) -> HealthReport {
        let report = match self
            .cluster
            .workload_status(&target.name, &target.namespace)
            .await
        {
            Ok(status) if status.ready_replicas >= status.desired_replicas => {
                HealthReport::Healthy {
                    ready: status.ready_replicas,
                    desired: status.desired_replicas,
                }
            }
            Ok(status) => HealthReport::Unhealthy {
                ready: status.ready_replicas,
                desired: status.desired_replicas,
            },
            Err(e) => HealthReport::Unknown {
                error: e.to_string(),
            },
        };

        match &report {
            HealthReport::Healthy { .. } => {
                info!(deployment = %target.name, namespace = %target.namespace, "Health check: {report}");
            }
            _ => {
                warn!(deployment = %target.name, namespace = %target.namespace, "Health check: {report}");
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::WorkloadStatus;
    use crate::error::ClusterError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    struct FixedStatus(Option<WorkloadStatus>);

    #[async_trait]
    impl ClusterClient for FixedStatus {
        async fn workload_status(
            &self,
            _name: &str,
            _namespace: &str,
        ) -> Result<WorkloadStatus, ClusterError> {
            self.0
                .ok_or_else(|| ClusterError::Other("deployments.apps \"web\" not found".to_string()))
        }

        async fn restart_workload(
            &self,
            _name: &str,
            _namespace: &str,
            _restarted_at: DateTime<Utc>,
        ) -> Result<(), ClusterError> {
            Ok(())
        }

        async fn scale_workload(
            &self,
            _name: &str,
            _namespace: &str,
            _replicas: i32,
        ) -> Result<(), ClusterError> {
            Ok(())
        }
    }

    fn target() -> WorkloadRef {
        WorkloadRef {
            name: "web".to_string(),
            namespace: "online-boutique".to_string(),
        }
    }

    async fn verify_with(status: Option<WorkloadStatus>) -> HealthReport {
        HealthVerifier::new(Arc::new(FixedStatus(status)))
            .verify(&target())
            .await
    }

    #[tokio::test]
    async fn test_ready_equal_desired_is_healthy() {
        let report = verify_with(Some(WorkloadStatus {
            ready_replicas: 3,
            desired_replicas: 3,
        }))
        .await;
        assert!(report.is_healthy());
        assert_eq!(report.to_string(), "HEALTHY (3/3 replicas)");
    }

    #[tokio::test]
    async fn test_ready_below_desired_is_unhealthy() {
        let report = verify_with(Some(WorkloadStatus {
            ready_replicas: 1,
            desired_replicas: 3,
        }))
        .await;
        assert_eq!(report, HealthReport::Unhealthy { ready: 1, desired: 3 });
    }

    #[tokio::test]
    async fn test_read_failure_is_unknown() {
        let report = verify_with(None).await;
        assert!(!report.is_healthy());
        assert!(report.to_string().starts_with("UNKNOWN"));
    }
}
