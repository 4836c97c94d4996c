//! Specialist dispatch.
//!
//! Every alert is analysed by the same fixed set of domain specialists. All
//! queries run at once with independent timeouts; a specialist that fails or
//! times out degrades to a placeholder so the returned mapping always covers
//! every role.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::alert::Alert;
use crate::error::InferenceError;
use crate::inference::InferenceClient;

/// Domain specialist roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SpecialistRole {
    /// Ingress, egress, DNS, routing, mesh
    Network,
    /// Storage and database connectivity
    Database,
    /// CPU/memory saturation, crash loops, node pressure
    Compute,
}

impl SpecialistRole {
    /// The full role set, in prompt order.
    pub const ALL: [Self; 3] = [Self::Network, Self::Database, Self::Compute];

    /// Agent name used in logs and in the consensus prompt.
    #[must_use]
    pub fn agent_name(self) -> &'static str {
        match self {
            Self::Network => "NetworkAgent",
            Self::Database => "DatabaseAgent",
            Self::Compute => "ComputeAgent",
        }
    }

    /// Role framing prepended to the alert context.
    #[must_use]
    pub fn framing(self) -> &'static str {
        match self {
            Self::Network => {
                "You are a specialized Network SRE AI. Focus on ingress, egress, DNS, routing, \
                 and mesh (Linkerd) issues. Determine if this fits your domain. Provide RCA and \
                 remediation. Suggest Action."
            }
            Self::Database => {
                "You are a specialized Database SRE AI. Focus on persistent volumes, \
                 PostgreSQL/MySQL connection issues, latency, and query saturation. Determine if \
                 this fits your domain. Provide RCA and remediation. Suggest Action."
            }
            Self::Compute => {
                "You are a specialized Compute SRE AI. Focus on CPU/Memory saturation, \
                 OOMKills, Pod CrashLoopBackOffs, and Node pressure. Determine if this fits your \
                 domain. Provide RCA and remediation. Suggest Action."
            }
        }
    }

    /// Build this role's prompt for an alert.
    #[must_use]
    pub fn prompt(self, alert: &Alert, default_workload: &str) -> String {
        format!(
            "{framing}\n\nA {predictive}alert has been triggered:\n{context}\n\nProvide your analysis.",
            framing = self.framing(),
            predictive = if alert.is_predictive() { "PREDICTIVE " } else { "" },
            context = alert.context_block(default_workload),
        )
    }
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// One specialist's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialistResponse {
    /// Which specialist answered
    pub role: SpecialistRole,
    /// Diagnostic text, or an error description when `ok` is false
    pub text: String,
    /// False on timeout or transport failure
    pub ok: bool,
}

impl SpecialistResponse {
    fn answered(role: SpecialistRole, text: String) -> Self {
        Self {
            role,
            text,
            ok: true,
        }
    }

    fn failed(role: SpecialistRole, reason: impl fmt::Display) -> Self {
        Self {
            role,
            text: format!("Error: {reason}"),
            ok: false,
        }
    }
}

/// Complete role → response mapping.
pub type SpecialistResponses = BTreeMap<SpecialistRole, SpecialistResponse>;

/// Fans one alert out to every specialist role.
pub struct SpecialistDispatcher {
    client: Arc<dyn InferenceClient>,
    timeout: Duration,
    default_workload: String,
}

impl SpecialistDispatcher {
    /// Create a dispatcher over an inference client.
    #[must_use]
    pub fn new(client: Arc<dyn InferenceClient>, timeout: Duration, default_workload: &str) -> Self {
        Self {
            client,
            timeout,
            default_workload: default_workload.to_string(),
        }
    }

    /// Query every role concurrently and wait for all of them to answer or time out.
    pub async fn dispatch(&self, alert: &Alert) -> SpecialistResponses {
        info!(alert = %alert.name, roles = SpecialistRole::ALL.len(), "Dispatching alert to specialists");

        let pool = Arc::new(Semaphore::new(SpecialistRole::ALL.len()));
        let mut join_set: JoinSet<SpecialistResponse> = JoinSet::new();

        for role in SpecialistRole::ALL {
            let pool = Arc::clone(&pool);
            let client = Arc::clone(&self.client);
            let prompt = role.prompt(alert, &self.default_workload);
            let timeout = self.timeout;

            join_set.spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return SpecialistResponse::failed(role, "worker pool closed");
                };
                query_specialist(client.as_ref(), role, &prompt, timeout).await
            });
        }

        let mut responses = SpecialistResponses::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(response) => {
                    debug!(role = %response.role, ok = response.ok, "Specialist finished");
                    responses.insert(response.role, response);
                }
                Err(e) => warn!(error = %e, "Specialist worker panicked"),
            }
        }

        // A panicked worker loses its role; back-fill so the mapping stays complete.
        for role in SpecialistRole::ALL {
            responses
                .entry(role)
                .or_insert_with(|| SpecialistResponse::failed(role, "No response."));
        }

        let failed = responses.values().filter(|r| !r.ok).count();
        if failed > 0 {
            warn!(alert = %alert.name, failed, "Some specialists did not answer");
        }

        responses
    }
}

async fn query_specialist(
    client: &dyn InferenceClient,
    role: SpecialistRole,
    prompt: &str,
    timeout: Duration,
) -> SpecialistResponse {
    match tokio::time::timeout(timeout, client.generate(prompt)).await {
        Ok(Ok(text)) => SpecialistResponse::answered(role, text),
        Ok(Err(e)) => {
            warn!(role = %role, error = %e, "Specialist query failed");
            SpecialistResponse::failed(role, e)
        }
        Err(_) => {
            let e = InferenceError::Timeout(timeout.as_secs());
            warn!(role = %role, error = %e, "Specialist query timed out");
            SpecialistResponse::failed(role, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_names() {
        assert_eq!(SpecialistRole::Network.agent_name(), "NetworkAgent");
        assert_eq!(SpecialistRole::Database.to_string(), "DatabaseAgent");
        assert_eq!(SpecialistRole::ALL.len(), 3);
    }

    #[test]
    fn test_prompt_marks_predictive_alerts() {
        let alert = Alert::from_value(&json!({
            "status": "firing",
            "labels": {"alertname": "DiskFilling", "severity": "warning"}
        }));
        let prompt = SpecialistRole::Compute.prompt(&alert, "frontend");
        assert!(prompt.starts_with("You are a specialized Compute SRE AI."));
        assert!(prompt.contains("A PREDICTIVE alert has been triggered:"));
        assert!(prompt.ends_with("Provide your analysis."));

        let alert = Alert::from_value(&json!({"labels": {"alertname": "Down"}}));
        let prompt = SpecialistRole::Network.prompt(&alert, "frontend");
        assert!(prompt.contains("A alert has been triggered:"));
    }
}
