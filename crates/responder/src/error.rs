//! Error types for the remediation pipeline.
//!
//! None of these abort an alert's processing. Each is caught at the stage
//! where it occurs and degraded into a placeholder or a result string.

use thiserror::Error;

/// Errors returned by the inference service client.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Query did not answer within the allotted time
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors returned by the cluster orchestrator client.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API call failed
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// No cluster configuration could be loaded at startup
    #[error("cluster client unavailable: {0}")]
    Unavailable(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors writing lifecycle artifacts.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Filesystem operation failed
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A record that must be new was already on disk
    #[error("refusing to overwrite existing record {path}")]
    AlreadyExists { path: String },
}
