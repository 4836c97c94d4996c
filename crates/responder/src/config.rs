//! Responder configuration.
//!
//! Loaded once at process start from an optional JSON file, then overlaid
//! with environment variables. There is no hot reload.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default inference endpoint (internal Kubernetes DNS)
const DEFAULT_OLLAMA_URL: &str = "http://ollama.default.svc.cluster.local:11434/api/generate";

/// Default inference model
const DEFAULT_OLLAMA_MODEL: &str = "sre-kernel";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Address the ingress server binds to
    pub listen_addr: String,
    /// Inference service settings
    pub inference: InferenceConfig,
    /// Safety gate lists
    pub safety: SafetyPolicy,
    /// Where lifecycle artifacts are written
    pub storage: StorageConfig,
    /// Workload used when an alert carries no deployment/app/service label
    pub default_workload: String,
    /// Namespace offered to the synthesizer when an alert has none
    pub default_namespace: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            inference: InferenceConfig::default(),
            safety: SafetyPolicy::default(),
            storage: StorageConfig::default(),
            default_workload: "frontend".to_string(),
            default_namespace: "online-boutique".to_string(),
        }
    }
}

impl ResponderConfig {
    /// Load configuration from an optional JSON file and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay environment variables on top of file/default values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.inference.url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.inference.model = model;
        }
        if let Ok(addr) = std::env::var("RESPONDER_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("RUNBOOKS_DIR") {
            self.storage.runbooks_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("POST_MORTEMS_DIR") {
            self.storage.post_mortems_dir = PathBuf::from(dir);
        }
    }
}

/// Inference service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Generate endpoint URL
    pub url: String,
    /// Model name sent with every request
    pub model: String,
    /// Per-query timeout, applied to each specialist and to the synthesizer
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl InferenceConfig {
    /// Per-query timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The two static lists the safety gate checks against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyPolicy {
    /// Substrings that reject a directive outright, checked in order
    pub forbidden_keywords: Vec<String>,
    /// Namespaces a directive may target via `IN <namespace>`
    pub allowed_namespaces: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            forbidden_keywords: ["DELETE", "NAMESPACE", "KUBE-SYSTEM", "KYVERNO", "LINKERD"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            allowed_namespaces: vec!["online-boutique".to_string()],
        }
    }
}

/// Output directories for lifecycle artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Runbooks, one per alert name
    pub runbooks_dir: PathBuf,
    /// Post-mortems, one per processed alert
    pub post_mortems_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            runbooks_dir: PathBuf::from("runbooks"),
            post_mortems_dir: PathBuf::from("post-mortems"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ResponderConfig::default();
        assert_eq!(config.inference.timeout_secs, 120);
        assert_eq!(config.default_workload, "frontend");
        assert_eq!(config.safety.forbidden_keywords[0], "DELETE");
        assert_eq!(config.safety.allowed_namespaces, vec!["online-boutique"]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"safety": {{"allowed_namespaces": ["shop", "payments"]}}, "inference": {{"timeout_secs": 30}}}}"#
        )
        .unwrap();

        let config = ResponderConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.safety.allowed_namespaces, vec!["shop", "payments"]);
        // Unset list falls back to the default deny-list
        assert!(config
            .safety
            .forbidden_keywords
            .contains(&"KUBE-SYSTEM".to_string()));
        assert_eq!(config.inference.timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.runbooks_dir, PathBuf::from("runbooks"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ResponderConfig::load(Some(Path::new("/nonexistent/responder.json")));
        assert!(result.is_err());
    }
}
