use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::decision::{ResolvedAction, RuleDecision};
use crate::schema::{DefaultAction, Matcher, RuleAction, RuleSet, TopicRule};

// ---------------------------------------------------------------------------
// Pre-compiled matcher representations
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum TopicPattern {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl TopicPattern {
    fn is_match(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Glob(glob) => glob.is_match(topic),
            TopicPattern::Regex(regex) => regex.is_match(topic),
        }
    }
}

/// A pre-compiled version of a single [`Matcher`].
#[derive(Debug)]
enum CompiledMatcher {
    Topic(TopicPattern),
    Prefix { prefixes: Vec<String> },
    Payload { pointer: String, equals: Value },
}

impl CompiledMatcher {
    fn is_match(&self, topic: &str, prefix: &str, payload: Option<&Value>) -> bool {
        match self {
            CompiledMatcher::Topic(pattern) => pattern.is_match(topic),
            CompiledMatcher::Prefix { prefixes } => prefixes.iter().any(|p| p == prefix),
            CompiledMatcher::Payload { pointer, equals } => payload
                .and_then(|payload| payload.pointer(pointer))
                .is_some_and(|found| found == equals),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: TopicRule,
    matchers: Vec<CompiledMatcher>,
}

// ---------------------------------------------------------------------------
// RuleEngine
// ---------------------------------------------------------------------------

/// Evaluates pubsub messages against a [`RuleSet`].
///
/// Construct via [`RuleEngine::new`], which compiles every pattern up front.
pub struct RuleEngine {
    default_action: DefaultAction,
    /// Sorted by ascending priority; ties keep file order.
    compiled: Vec<CompiledRule>,
    needs_payload: bool,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("default_action", &self.default_action)
            .field("num_rules", &self.compiled.len())
            .field("needs_payload", &self.needs_payload)
            .finish()
    }
}

impl RuleEngine {
    /// Returns an error if any regex or glob pattern is invalid.
    pub fn new(rules: RuleSet) -> Result<Self> {
        let mut sorted = rules.rules;
        sorted.sort_by_key(|r| r.priority);

        let mut compiled = Vec::with_capacity(sorted.len());
        for rule in sorted {
            let matchers = rule
                .matchers
                .iter()
                .map(compile_matcher)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("failed to compile matchers for rule '{}'", rule.name))?;
            compiled.push(CompiledRule { rule, matchers });
        }

        let needs_payload = compiled.iter().any(|c| {
            c.rule.action == RuleAction::Rewrite || c.rule.matchers.iter().any(Matcher::needs_payload)
        });

        Ok(Self {
            default_action: rules.default_action,
            compiled,
            needs_payload,
        })
    }

    /// Whether any rule inspects or edits payloads. When false, callers can
    /// skip decoding entirely.
    pub fn needs_payload(&self) -> bool {
        self.needs_payload
    }

    pub fn rule_count(&self) -> usize {
        self.compiled.len()
    }

    /// Evaluate one message. `payload` is `None` when it was not decoded or
    /// could not be; payload matchers never match then.
    pub fn evaluate(&self, topic: &str, payload: Option<&Value>) -> RuleDecision {
        let prefix = wire_codec::split_topic(topic).prefix;
        debug!(topic, "evaluating message against rules");

        for compiled in &self.compiled {
            let all_match = compiled
                .matchers
                .iter()
                .all(|m| m.is_match(topic, &prefix, payload));

            if all_match {
                trace!(rule = compiled.rule.name, "rule matched message");
                return decision_from_rule(&compiled.rule);
            }
        }

        self.default_decision("no rule matched the message")
    }

    fn default_decision(&self, reason: &str) -> RuleDecision {
        match self.default_action {
            DefaultAction::Pass => RuleDecision::pass_default(reason),
            DefaultAction::Log => RuleDecision::log_default(reason),
            DefaultAction::Suppress => RuleDecision::suppress_default(reason),
        }
    }
}

fn decision_from_rule(rule: &TopicRule) -> RuleDecision {
    let action = match rule.action {
        RuleAction::Pass => ResolvedAction::Pass,
        RuleAction::Log => ResolvedAction::Log,
        RuleAction::Suppress => ResolvedAction::Suppress,
        RuleAction::Rewrite => ResolvedAction::Rewrite(rule.set.clone()),
    };
    RuleDecision {
        action,
        matched_rule: Some(rule.name.clone()),
        reason: rule
            .description
            .clone()
            .unwrap_or_else(|| format!("matched rule '{}'", rule.name)),
    }
}

// ---------------------------------------------------------------------------
// Compilation helpers
// ---------------------------------------------------------------------------

fn compile_matcher(m: &Matcher) -> Result<CompiledMatcher> {
    match m {
        Matcher::Topic { pattern, is_regex } => {
            let pattern = if *is_regex {
                TopicPattern::Regex(
                    Regex::new(pattern).with_context(|| format!("invalid topic regex: {pattern}"))?,
                )
            } else {
                TopicPattern::Glob(
                    Glob::new(pattern)
                        .with_context(|| format!("invalid topic glob: {pattern}"))?
                        .compile_matcher(),
                )
            };
            Ok(CompiledMatcher::Topic(pattern))
        }
        Matcher::Prefix { pattern } => Ok(CompiledMatcher::Prefix {
            prefixes: pattern.split('|').map(|s| s.trim().to_string()).collect(),
        }),
        Matcher::Payload { pointer, equals } => Ok(CompiledMatcher::Payload {
            pointer: pointer.clone(),
            equals: equals.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::loader::load_rules_from_str;

    fn engine_from_yaml(yaml: &str) -> RuleEngine {
        let rules = load_rules_from_str(yaml).expect("test YAML should parse");
        RuleEngine::new(rules).expect("engine construction should succeed")
    }

    #[test]
    fn topic_glob_suppresses() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "drop-ads"
    action: suppress
    matchers:
      - type: topic
        pattern: "ads.*"
"#,
        );

        let d = engine.evaluate("ads.1234", None);
        assert_eq!(d.action, ResolvedAction::Suppress);
        assert_eq!(d.matched_rule.as_deref(), Some("drop-ads"));

        let d = engine.evaluate("adsense", None);
        assert_eq!(d.action, ResolvedAction::Pass);
        assert!(d.matched_rule.is_none());
    }

    #[test]
    fn topic_regex_is_unanchored() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "numeric-channels"
    action: log
    matchers:
      - type: topic
        pattern: "\\.[0-9]+$"
        is_regex: true
"#,
        );

        assert_eq!(engine.evaluate("chat.42", None).action, ResolvedAction::Log);
        assert_eq!(engine.evaluate("chat.abc", None).action, ResolvedAction::Pass);
    }

    #[test]
    fn prefix_alternatives_match_exactly() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
default_action: suppress
rules:
  - name: "known-prefixes"
    action: pass
    matchers:
      - type: prefix
        pattern: "video-playback | chat"
"#,
        );

        assert_eq!(engine.evaluate("chat", None).action, ResolvedAction::Pass);
        assert_eq!(engine.evaluate("video-playback.9", None).action, ResolvedAction::Pass);
        assert!(engine.evaluate("video-playback-by-id.9", None).suppresses());
    }

    #[test]
    fn payload_matcher_needs_decoded_payload() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "viewcount"
    action: log
    matchers:
      - type: payload
        pointer: /type
        equals: "viewcount"
"#,
        );
        assert!(engine.needs_payload());

        let payload = json!({"type": "viewcount", "viewers": 12});
        assert_eq!(engine.evaluate("video-playback.1", Some(&payload)).action, ResolvedAction::Log);
        assert_eq!(engine.evaluate("video-playback.1", None).action, ResolvedAction::Pass);

        let other = json!({"type": "stream-up"});
        assert_eq!(engine.evaluate("video-playback.1", Some(&other)).action, ResolvedAction::Pass);
    }

    #[test]
    fn matchers_are_anded() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "both"
    action: suppress
    matchers:
      - type: prefix
        pattern: "chat"
      - type: payload
        pointer: /spam
        equals: true
"#,
        );

        let spam = json!({"spam": true});
        let ham = json!({"spam": false});
        assert!(engine.evaluate("chat.1", Some(&spam)).suppresses());
        assert!(!engine.evaluate("chat.1", Some(&ham)).suppresses());
        assert!(!engine.evaluate("whispers.1", Some(&spam)).suppresses());
    }

    #[test]
    fn lower_priority_number_wins() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "late"
    priority: 50
    action: suppress
  - name: "early"
    priority: 1
    action: log
    matchers:
      - type: topic
        pattern: "chat.*"
"#,
        );

        let d = engine.evaluate("chat.1", None);
        assert_eq!(d.matched_rule.as_deref(), Some("early"));
        assert_eq!(engine.evaluate("other", None).matched_rule.as_deref(), Some("late"));
    }

    #[test]
    fn rewrite_carries_edits_and_description() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "hide-viewers"
    description: "viewer counts are zeroed"
    action: rewrite
    set:
      /viewers: 0
"#,
        );
        assert!(engine.needs_payload());

        let d = engine.evaluate("video-playback.1", None);
        assert_eq!(d.reason, "viewer counts are zeroed");
        match d.action {
            ResolvedAction::Rewrite(edits) => assert_eq!(edits.get("/viewers"), Some(&json!(0))),
            other => panic!("expected rewrite, got {other:?}"),
        }
    }

    #[test]
    fn topic_only_rules_do_not_need_payload() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
rules:
  - name: "a"
    action: suppress
    matchers:
      - type: topic
        pattern: "x.*"
"#,
        );
        assert!(!engine.needs_payload());
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn invalid_regex_fails_construction() {
        let rules = load_rules_from_str(
            r#"
version: "1.0"
rules:
  - name: "broken"
    action: log
    matchers:
      - type: topic
        pattern: "[unclosed"
        is_regex: true
"#,
        )
        .unwrap();

        let err = RuleEngine::new(rules).unwrap_err();
        assert!(
            format!("{err:#}").contains("invalid topic regex"),
            "unexpected error: {err:#}"
        );
    }

    #[test]
    fn default_log_applies_when_nothing_matches() {
        let engine = engine_from_yaml(
            r#"
version: "1.0"
default_action: log
rules: []
"#,
        );
        let d = engine.evaluate("anything", None);
        assert_eq!(d.action, ResolvedAction::Log);
        assert_eq!(d.reason, "no rule matched the message");
    }
}
