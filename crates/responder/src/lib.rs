//! Multi-agent alert remediation for Kubernetes workloads.
//!
//! Alerts arrive in Alertmanager webhook batches. Each alert is diagnosed
//! independently by three specialist model personas (network, database,
//! compute), a director model synthesizes their analyses into one
//! remediation directive, and that directive is executed against the cluster
//! only if it passes a deny-list/allow-list safety gate. Every alert ends in
//! a post-mortem on disk; a runbook is written the first time an alert name
//! is seen.
//!
//! # Usage
//!
//! ```no_run
//! use responder::{OllamaClient, Pipeline, ResponderConfig, ServerState, UnavailableCluster};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ResponderConfig::load(None)?;
//! let inference = Arc::new(OllamaClient::new(&config.inference));
//! let cluster = Arc::new(UnavailableCluster::new("no kubeconfig"));
//! let pipeline = Pipeline::new(&config, inference, cluster);
//!
//! responder::run_server(Arc::new(ServerState::new(pipeline)), &config.listen_addr).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`InferenceClient`] abstracts the text-generation service ([`OllamaClient`])
//! - [`ClusterClient`] abstracts the orchestrator ([`KubeClusterClient`])
//! - [`Pipeline`] runs one alert through every stage
//! - [`build_router`] exposes `POST /webhook` and `GET /health`

pub mod alert;
pub mod cluster;
pub mod config;
pub mod consensus;
pub mod error;
pub mod health;
pub mod inference;
pub mod lifecycle;
pub mod pipeline;
pub mod remediation;
pub mod safety;
pub mod server;
pub mod specialists;

pub use alert::Alert;
pub use cluster::{ClusterClient, KubeClusterClient, UnavailableCluster, WorkloadStatus};
pub use config::{InferenceConfig, ResponderConfig, SafetyPolicy, StorageConfig};
pub use consensus::{extract_directive, ConsensusSynthesizer};
pub use error::{ClusterError, InferenceError, RecordError};
pub use health::{HealthReport, HealthVerifier};
pub use inference::{InferenceClient, OllamaClient};
pub use lifecycle::{IncidentOutcome, IncidentRecord, IncidentStage, LifecycleRecorder};
pub use pipeline::{Pipeline, ProcessedAlert};
pub use remediation::{
    substitute_placeholders, ExecutionOutcome, RemediationAction, RemediationExecutor, WorkloadRef,
};
pub use safety::{SafetyGate, SafetyVerdict};
pub use server::{build_router, run_server, ServerState};
pub use specialists::{SpecialistDispatcher, SpecialistResponse, SpecialistRole};
