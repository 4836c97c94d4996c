//! Consensus synthesis.
//!
//! A "director" query merges the specialist analyses into a root cause and a
//! single remediation line. The output is returned unvalidated; the safety
//! gate and the grammar parser downstream treat it as untrusted text.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::alert::Alert;
use crate::error::InferenceError;
use crate::inference::InferenceClient;
use crate::specialists::{SpecialistResponses, SpecialistRole};

/// Verbs that mark a line of consensus text as a remediation directive.
const DIRECTIVE_MARKERS: [&str; 3] = [
    "RESTART DEPLOYMENT",
    "SCALE DEPLOYMENT",
    "ROLLBACK DEPLOYMENT",
];

/// Director-agent synthesizer.
pub struct ConsensusSynthesizer {
    client: Arc<dyn InferenceClient>,
    timeout: Duration,
    default_workload: String,
    default_namespace: String,
}

impl ConsensusSynthesizer {
    /// Create a synthesizer; `timeout` matches the specialist timeout.
    #[must_use]
    pub fn new(
        client: Arc<dyn InferenceClient>,
        timeout: Duration,
        default_workload: &str,
        default_namespace: &str,
    ) -> Self {
        Self {
            client,
            timeout,
            default_workload: default_workload.to_string(),
            default_namespace: default_namespace.to_string(),
        }
    }

    /// Ask the director for a consensus. Any failure yields an empty string.
    pub async fn synthesize(&self, alert: &Alert, responses: &SpecialistResponses) -> String {
        info!(alert = %alert.name, "Aggregating specialist responses and requesting consensus");

        let prompt = self.build_prompt(alert, responses);
        let result = match tokio::time::timeout(self.timeout, self.client.generate(&prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout.as_secs())),
        };

        match result {
            Ok(text) => {
                info!(alert = %alert.name, consensus_len = text.len(), "Consensus received");
                text
            }
            Err(e) => {
                warn!(alert = %alert.name, error = %e, "Consensus query failed, continuing without directive");
                String::new()
            }
        }
    }

    /// Build the director prompt.
    #[must_use]
    pub fn build_prompt(&self, alert: &Alert, responses: &SpecialistResponses) -> String {
        let workload = alert.target_workload(&self.default_workload);
        let namespace = alert.namespace().unwrap_or(&self.default_namespace);

        let mut prompt = String::new();
        prompt.push_str(
            "You are the Director SRE Agent. You have received analyses from specialized agents \
             regarding an alert.\n",
        );
        let _ = writeln!(
            prompt,
            "Alert Context:\n{}\n",
            alert.context_block(&self.default_workload)
        );

        prompt.push_str("Agent Analyses:\n");
        for (i, role) in SpecialistRole::ALL.iter().enumerate() {
            let text = responses
                .get(role)
                .map_or("No response.", |r| r.text.as_str());
            let _ = writeln!(prompt, "{}. {}: {}", i + 1, role.agent_name(), text);
        }

        prompt.push_str(
            "\nYour task is to reach a consensus and provide an actionable remediation.\n\n",
        );
        prompt.push_str("### Guidelines:\n");
        prompt.push_str("1. **RCA**: Synthesize the most plausible Root Cause.\n");
        prompt.push_str("2. **Remediation**: Determine the best command.\n");
        prompt.push_str("   CRITICAL: Use exactly one of the supported formats.\n");
        let _ = writeln!(prompt, "   - RESTART DEPLOYMENT {workload} IN {namespace}");
        let _ = writeln!(prompt, "   - SCALE DEPLOYMENT {workload} IN {namespace} TO <count>");
        prompt.push_str("3. **Few-Shot Examples**:\n");
        prompt.push_str(
            "   - Case: High Latency -> Remediation: RESTART DEPLOYMENT cartservice IN online-boutique\n",
        );
        prompt.push_str(
            "   - Case: Resource Saturation -> Remediation: SCALE DEPLOYMENT frontend IN online-boutique TO 5\n",
        );
        prompt.push_str("4. **Predictive Insight**: Prevention steps.\n\n");
        prompt.push_str("Be concise, elite, and actionable.\n");

        prompt
    }
}

/// Pick the remediation line out of consensus text.
///
/// Returns the first line naming a deployment verb, trimmed. Grammar
/// validation happens later; this only locates the candidate.
#[must_use]
pub fn extract_directive(consensus: &str) -> Option<&str> {
    consensus.lines().map(str::trim).find(|line| {
        let upper = line.to_uppercase();
        DIRECTIVE_MARKERS.iter().any(|marker| upper.contains(marker))
    })
}
