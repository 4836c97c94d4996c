//! Safety gate for model-generated directives.
//!
//! A textual firewall, not a semantic validator. A directive passes only when
//! it contains none of the forbidden keywords and explicitly targets an
//! allowed namespace with `IN <namespace>`. Anything else is rejected.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SafetyPolicy;

/// Result of evaluating one directive line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum SafetyVerdict {
    /// Both checks passed
    Allowed {
        /// The allow-listed namespace that matched
        namespace: String,
    },
    /// The first forbidden keyword found
    ForbiddenKeyword { keyword: String },
    /// No `IN <namespace>` for any allow-listed namespace
    NamespaceNotAllowed,
}

impl SafetyVerdict {
    /// Whether execution may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    /// Human-readable reason for logs and records.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Allowed { namespace } => format!("targets approved namespace '{namespace}'"),
            Self::ForbiddenKeyword { keyword } => {
                format!("Action contains forbidden keyword '{keyword}'")
            }
            Self::NamespaceNotAllowed => "Action targets a non-approved namespace".to_string(),
        }
    }
}

/// Deny-list + allow-list gate, built once from the policy at startup.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    /// Upper-cased deny-list, in configured order
    forbidden: Vec<String>,
    /// (original namespace, upper-cased `IN <NS>` needle)
    allowed: Vec<(String, String)>,
}

impl SafetyGate {
    /// Build a gate from a policy.
    #[must_use]
    pub fn new(policy: &SafetyPolicy) -> Self {
        let forbidden = policy
            .forbidden_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| k.to_uppercase())
            .collect();
        let allowed = policy
            .allowed_namespaces
            .iter()
            .filter(|ns| !ns.is_empty())
            .map(|ns| (ns.clone(), format!("IN {}", ns.to_uppercase())))
            .collect();
        Self { forbidden, allowed }
    }

    /// Evaluate a directive line.
    #[must_use]
    pub fn evaluate(&self, directive: &str) -> SafetyVerdict {
        let upper = directive.to_uppercase();

        if let Some(keyword) = self.forbidden.iter().find(|k| upper.contains(k.as_str())) {
            warn!(keyword = %keyword, "Safety violation: forbidden keyword");
            return SafetyVerdict::ForbiddenKeyword {
                keyword: keyword.clone(),
            };
        }

        match self
            .allowed
            .iter()
            .find(|(_, needle)| upper.contains(needle.as_str()))
        {
            Some((namespace, _)) => {
                debug!(namespace = %namespace, "Safety check passed");
                SafetyVerdict::Allowed {
                    namespace: namespace.clone(),
                }
            }
            None => {
                warn!("Safety violation: non-approved namespace");
                SafetyVerdict::NamespaceNotAllowed
            }
        }
    }

    /// Shorthand for `evaluate(..).is_allowed()`.
    #[must_use]
    pub fn is_safe(&self, directive: &str) -> bool {
        self.evaluate(directive).is_allowed()
    }

    /// Exact, case-insensitive allow-list check for a parsed target namespace.
    ///
    /// `evaluate` only proves some `IN <ns>` appears in the line; the
    /// namespace an action actually mutates must match one entry exactly.
    #[must_use]
    pub fn allows_namespace(&self, namespace: &str) -> bool {
        self.allowed
            .iter()
            .any(|(allowed, _)| allowed.eq_ignore_ascii_case(namespace))
    }
}
