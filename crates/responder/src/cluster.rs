//! Cluster orchestrator client.
//!
//! Three operations against a Deployment: read replica counts, trigger a
//! rolling restart, set the replica count. All errors are reported to the
//! caller as [`ClusterError`] and never abort alert processing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ClusterError;

/// Pod template annotation that `kubectl rollout restart` sets.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";

/// Replica counts read back from a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkloadStatus {
    /// Replicas reporting ready
    pub ready_replicas: i32,
    /// Desired replicas from the spec
    pub desired_replicas: i32,
}

/// Mutations and reads the executor and verifier need.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read a workload's ready and desired replica counts.
    async fn workload_status(&self, name: &str, namespace: &str)
        -> Result<WorkloadStatus, ClusterError>;

    /// Trigger a rolling restart by stamping the pod template.
    async fn restart_workload(
        &self,
        name: &str,
        namespace: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError>;

    /// Set the desired replica count.
    async fn scale_workload(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;
}

/// [`ClusterClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap an existing kube client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster config, falling back to the local kubeconfig.
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn workload_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        let deployment = self.deployments(namespace).get(name).await?;

        let desired_replicas = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(0);
        let ready_replicas = deployment
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0);

        Ok(WorkloadStatus {
            ready_replicas,
            desired_replicas,
        })
    }

    async fn restart_workload(
        &self,
        name: &str,
        namespace: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            (RESTARTED_AT_ANNOTATION): restarted_at.to_rfc3339()
                        }
                    }
                }
            }
        });

        debug!(deployment = %name, namespace = %namespace, "Patching restart annotation");
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn scale_workload(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let patch = json!({ "spec": { "replicas": replicas } });

        debug!(deployment = %name, namespace = %namespace, replicas, "Patching replica count");
        self.deployments(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Stand-in used when no cluster configuration could be loaded.
///
/// Every call fails, so alerts are still analysed and recorded.
#[derive(Debug, Clone)]
pub struct UnavailableCluster {
    reason: String,
}

impl UnavailableCluster {
    /// Create a stand-in that reports `reason` on every call.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "Could not load Kubernetes config, remediation will fail");
        Self { reason }
    }

    fn error(&self) -> ClusterError {
        ClusterError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl ClusterClient for UnavailableCluster {
    async fn workload_status(
        &self,
        _name: &str,
        _namespace: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        Err(self.error())
    }

    async fn restart_workload(
        &self,
        _name: &str,
        _namespace: &str,
        _restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        Err(self.error())
    }

    async fn scale_workload(
        &self,
        _name: &str,
        _namespace: &str,
        _replicas: i32,
    ) -> Result<(), ClusterError> {
        Err(self.error())
    }
}
