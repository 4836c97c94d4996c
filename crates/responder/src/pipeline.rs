//! Per-alert remediation pipeline.
//!
//! Normalize → dispatch specialists → synthesize consensus → gate →
//! execute → verify → record. Every stage degrades to a safe default
//! instead of failing, so every alert ends in [`IncidentStage::Recorded`]
//! exactly once.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::alert::Alert;
use crate::cluster::ClusterClient;
use crate::config::ResponderConfig;
use crate::consensus::{extract_directive, ConsensusSynthesizer};
use crate::health::{HealthReport, HealthVerifier};
use crate::inference::InferenceClient;
use crate::lifecycle::{
    IncidentOutcome, IncidentRecord, IncidentStage, LifecycleRecorder, RecordedPaths,
};
use crate::remediation::{
    substitute_placeholders, ExecutionOutcome, RemediationAction, RemediationExecutor,
    NO_ACTION_MESSAGE,
};
use crate::safety::{SafetyGate, SafetyVerdict};
use crate::specialists::{SpecialistDispatcher, SpecialistResponses};

/// Result string recorded when the safety gate rejects a directive.
pub const BLOCKED_MESSAGE: &str = "Remediation BLOCKED by Safety Guardrails.";

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedAlert {
    /// Normalized alert name
    pub alert_name: String,
    /// Stage trail, always ending in `Recorded`
    pub stages: Vec<IncidentStage>,
    /// Specialist answers
    pub responses: SpecialistResponses,
    /// Raw consensus text (empty when synthesis failed)
    pub consensus: String,
    /// Directive line after placeholder substitution
    pub directive: Option<String>,
    /// Safety gate verdict, if a directive was found
    pub verdict: Option<SafetyVerdict>,
    /// Parsed action, if the directive passed the gate
    pub action: Option<RemediationAction>,
    /// Result string written to the record
    pub remediation_result: String,
    /// Overall outcome
    pub outcome: IncidentOutcome,
    /// Health read-back after an applied mutation
    pub health: Option<HealthReport>,
    /// Files written, unless recording failed
    #[serde(skip)]
    pub recorded: Option<RecordedPaths>,
}

/// Ordered stage trail for one alert.
#[derive(Debug)]
struct StageTrail {
    alert: String,
    stages: Vec<IncidentStage>,
}

impl StageTrail {
    fn start(alert: &str) -> Self {
        Self {
            alert: alert.to_string(),
            stages: vec![IncidentStage::Received],
        }
    }

    fn advance(&mut self, next: IncidentStage) {
        if let Some(&current) = self.stages.last() {
            debug_assert!(
                current.can_advance_to(next),
                "illegal stage transition {current} -> {next}"
            );
        }
        debug!(alert = %self.alert, stage = %next, "Stage");
        self.stages.push(next);
    }
}

/// Wires the stages together over injected collaborators.
pub struct Pipeline {
    dispatcher: SpecialistDispatcher,
    synthesizer: ConsensusSynthesizer,
    gate: SafetyGate,
    executor: RemediationExecutor,
    verifier: HealthVerifier,
    recorder: LifecycleRecorder,
    default_workload: String,
}

impl Pipeline {
    /// Build a pipeline from configuration and clients.
    #[must_use]
    pub fn new(
        config: &ResponderConfig,
        inference: Arc<dyn InferenceClient>,
        cluster: Arc<dyn ClusterClient>,
    ) -> Self {
        let timeout = config.inference.timeout();
        Self {
            dispatcher: SpecialistDispatcher::new(
                Arc::clone(&inference),
                timeout,
                &config.default_workload,
            ),
            synthesizer: ConsensusSynthesizer::new(
                inference,
                timeout,
                &config.default_workload,
                &config.default_namespace,
            ),
            gate: SafetyGate::new(&config.safety),
            executor: RemediationExecutor::new(Arc::clone(&cluster)),
            verifier: HealthVerifier::new(cluster),
            recorder: LifecycleRecorder::new(&config.storage),
            default_workload: config.default_workload.clone(),
        }
    }

    /// Run one raw alert from a webhook batch through every stage.
    pub async fn process(&self, raw: &Value) -> ProcessedAlert {
        let alert = Alert::from_value(raw);
        let mut trail = StageTrail::start(&alert.name);
        trail.advance(IncidentStage::Normalized);
        self.run(alert, trail).await
    }

    async fn run(&self, alert: Alert, mut trail: StageTrail) -> ProcessedAlert {
        info!(
            alert = %alert.name,
            status = %alert.status,
            predictive = alert.is_predictive(),
            "Processing alert"
        );

        let responses = self.dispatcher.dispatch(&alert).await;
        trail.advance(IncidentStage::Dispatched);

        let consensus = self.synthesizer.synthesize(&alert, &responses).await;
        trail.advance(IncidentStage::Synthesized);

        let workload = alert.target_workload(&self.default_workload);
        let directive = extract_directive(&consensus)
            .map(|line| substitute_placeholders(line, Some(workload)).into_owned());

        let mut verdict = None;
        let mut action = None;
        let mut health = None;

        let (outcome, remediation_result) = match &directive {
            None => {
                info!(alert = %alert.name, "No remediation directive in consensus");
                trail.advance(IncidentStage::Skipped);
                (IncidentOutcome::Skipped, NO_ACTION_MESSAGE.to_string())
            }
            Some(line) => {
                let mut gate_verdict = self.gate.evaluate(line);
                let parsed = RemediationAction::parse(line);

                // The line may name an approved namespace somewhere other than the target
                if let Some(target) = parsed.target() {
                    if gate_verdict.is_allowed() && !self.gate.allows_namespace(&target.namespace) {
                        warn!(
                            alert = %alert.name,
                            namespace = %target.namespace,
                            "Parsed target namespace is not approved"
                        );
                        gate_verdict = SafetyVerdict::NamespaceNotAllowed;
                    }
                }

                if gate_verdict.is_allowed() {
                    trail.advance(IncidentStage::Parsed);
                    info!(alert = %alert.name, directive = %line, "Safety check passed");

                    let executed = self.executor.execute(&parsed).await;
                    let result = executed.message().to_string();

                    let outcome = match (&executed, parsed.target()) {
                        (ExecutionOutcome::Applied(_), Some(target)) => {
                            trail.advance(IncidentStage::Executed);
                            health = Some(self.verifier.verify(target).await);
                            trail.advance(IncidentStage::Verified);
                            IncidentOutcome::Remediated
                        }
                        (ExecutionOutcome::Failed(_), _) => {
                            trail.advance(IncidentStage::Executed);
                            IncidentOutcome::Failed
                        }
                        _ => {
                            trail.advance(IncidentStage::Skipped);
                            IncidentOutcome::Skipped
                        }
                    };

                    info!(alert = %alert.name, action = %parsed, result = %result, "Remediation result");
                    action = Some(parsed);
                    verdict = Some(gate_verdict);
                    (outcome, result)
                } else {
                    warn!(
                        alert = %alert.name,
                        directive = %line,
                        reason = %gate_verdict.reason(),
                        "Remediation blocked"
                    );
                    trail.advance(IncidentStage::Blocked);
                    verdict = Some(gate_verdict);
                    (IncidentOutcome::Blocked, BLOCKED_MESSAGE.to_string())
                }
            }
        };

        let record = IncidentRecord {
            alert_name: alert.name.clone(),
            timestamp: self.recorder.next_timestamp(),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            consensus_text: consensus.clone(),
            remediation_result: remediation_result.clone(),
            outcome,
            health: health.as_ref().map(ToString::to_string),
        };

        let recorded = match self.recorder.record(&record) {
            Ok(paths) => Some(paths),
            Err(e) => {
                error!(alert = %alert.name, error = %e, "Failed to write incident record");
                None
            }
        };
        trail.advance(IncidentStage::Recorded);

        info!(alert = %alert.name, outcome = ?outcome, "Alert processing complete");

        ProcessedAlert {
            alert_name: alert.name,
            stages: trail.stages,
            responses,
            consensus,
            directive,
            verdict,
            action,
            remediation_result,
            outcome,
            health,
            recorded,
        }
    }
}
