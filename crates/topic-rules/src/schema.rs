use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Schema version; currently must be "1.0".
    pub version: String,
    /// Action taken when no rule matches.
    #[serde(default)]
    pub default_action: DefaultAction,
    #[serde(default)]
    pub rules: Vec<TopicRule>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    #[default]
    Pass,
    Log,
    Suppress,
}

/// A named rule. All matchers must match for the rule to fire; a rule
/// without matchers matches every message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRule {
    /// Human-readable, unique rule name.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Lower numeric priority is evaluated first. Default 100.
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub action: RuleAction,
    /// JSON pointer → replacement value, applied by `rewrite` rules.
    #[serde(default)]
    pub set: BTreeMap<String, Value>,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
}

fn default_priority() -> i32 {
    100
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Deliver unchanged and stop evaluating.
    Pass,
    /// Deliver unchanged but log the match.
    Log,
    /// Keep the client from processing the message.
    Suppress,
    /// Edit the payload before delivery.
    Rewrite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    /// Glob (or regex) over the full topic.
    Topic {
        pattern: String,
        #[serde(default)]
        is_regex: bool,
    },
    /// `|`-separated exact topic prefixes.
    Prefix { pattern: String },
    /// Value at a JSON pointer inside the decoded payload.
    Payload { pointer: String, equals: Value },
}

impl Matcher {
    pub fn needs_payload(&self) -> bool {
        matches!(self, Matcher::Payload { .. })
    }
}
