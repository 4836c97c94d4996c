//! Shared fakes for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use responder::{
    ClusterClient, ClusterError, InferenceClient, InferenceError, ResponderConfig, WorkloadStatus,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Prefix of the director prompt; everything else is a specialist.
const DIRECTOR_PREFIX: &str = "You are the Director SRE Agent";

/// Inference fake: specialists answer with a canned diagnosis, the
/// director answers with a scripted consensus (or fails when `None`).
pub struct ScriptedInference {
    consensus: Option<String>,
    pub specialist_calls: AtomicUsize,
    pub director_calls: AtomicUsize,
}

impl ScriptedInference {
    pub fn new(consensus: &str) -> Self {
        Self {
            consensus: Some(consensus.to_string()),
            specialist_calls: AtomicUsize::new(0),
            director_calls: AtomicUsize::new(0),
        }
    }

    pub fn offline_director() -> Self {
        Self {
            consensus: None,
            specialist_calls: AtomicUsize::new(0),
            director_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        if prompt.starts_with(DIRECTOR_PREFIX) {
            self.director_calls.fetch_add(1, Ordering::SeqCst);
            return self
                .consensus
                .clone()
                .ok_or_else(|| InferenceError::Other("connection refused".to_string()));
        }
        self.specialist_calls.fetch_add(1, Ordering::SeqCst);
        Ok("Pods are saturated; a rolling restart should clear the stuck connections.".to_string())
    }
}

/// One call observed by [`RecordingCluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Status { name: String, namespace: String },
    Restart { name: String, namespace: String },
    Scale { name: String, namespace: String, replicas: i32 },
}

/// Cluster fake that records every call and reports a fixed status.
pub struct RecordingCluster {
    status: WorkloadStatus,
    fail_mutations: bool,
    calls: Mutex<Vec<ClusterCall>>,
    restart_stamps: Mutex<Vec<DateTime<Utc>>>,
}

impl RecordingCluster {
    pub fn healthy() -> Self {
        Self::with_status(3, 3)
    }

    pub fn with_status(ready: i32, desired: i32) -> Self {
        Self {
            status: WorkloadStatus {
                ready_replicas: ready,
                desired_replicas: desired,
            },
            fail_mutations: false,
            calls: Mutex::new(Vec::new()),
            restart_stamps: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            fail_mutations: true,
            ..Self::healthy()
        }
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<ClusterCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, ClusterCall::Status { .. }))
            .collect()
    }

    pub fn restart_stamps(&self) -> Vec<DateTime<Utc>> {
        self.restart_stamps.lock().unwrap().clone()
    }

    fn record(&self, call: ClusterCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn workload_status(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        self.record(ClusterCall::Status {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        Ok(self.status)
    }

    async fn restart_workload(
        &self,
        name: &str,
        namespace: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        self.record(ClusterCall::Restart {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        self.restart_stamps.lock().unwrap().push(restarted_at);
        if self.fail_mutations {
            return Err(ClusterError::Other(format!(
                "deployments.apps \"{name}\" is forbidden"
            )));
        }
        Ok(())
    }

    async fn scale_workload(
        &self,
        name: &str,
        namespace: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        self.record(ClusterCall::Scale {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas,
        });
        if self.fail_mutations {
            return Err(ClusterError::Other(format!(
                "deployments.apps \"{name}\" is forbidden"
            )));
        }
        Ok(())
    }
}

/// Default config with storage under `root` and a short inference timeout.
pub fn test_config(root: &Path) -> ResponderConfig {
    let mut config = ResponderConfig::default();
    config.storage.runbooks_dir = root.join("runbooks");
    config.storage.post_mortems_dir = root.join("post-mortems");
    config.inference.timeout_secs = 5;
    config
}

/// Alertmanager alert with the usual labels.
pub fn alert(name: &str, namespace: &str, deployment: &str) -> Value {
    json!({
        "status": "firing",
        "labels": {
            "alertname": name,
            "namespace": namespace,
            "deployment": deployment,
            "severity": "critical"
        },
        "annotations": {
            "summary": format!("{name} on {deployment}"),
            "description": format!("{deployment} is misbehaving")
        },
        "startsAt": "2026-10-19T08:00:00Z"
    })
}

/// Sorted files directly under `dir`; empty if it does not exist.
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
