use std::collections::BTreeMap;

use serde_json::Value;

/// The outcome of evaluating one message against a rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDecision {
    pub action: ResolvedAction,
    /// Name of the rule that matched, if any.
    pub matched_rule: Option<String>,
    /// Human-readable reason explaining the decision.
    pub reason: String,
}

/// What should happen to the message.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAction {
    Pass,
    /// Deliver, but leave a trace in the log.
    Log,
    Suppress,
    /// JSON pointer → value edits to apply to the payload.
    Rewrite(BTreeMap<String, Value>),
}

impl RuleDecision {
    pub fn pass_default(reason: impl Into<String>) -> Self {
        Self::unmatched(ResolvedAction::Pass, reason)
    }

    pub fn log_default(reason: impl Into<String>) -> Self {
        Self::unmatched(ResolvedAction::Log, reason)
    }

    pub fn suppress_default(reason: impl Into<String>) -> Self {
        Self::unmatched(ResolvedAction::Suppress, reason)
    }

    fn unmatched(action: ResolvedAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            matched_rule: None,
            reason: reason.into(),
        }
    }

    pub fn suppresses(&self) -> bool {
        self.action == ResolvedAction::Suppress
    }
}
