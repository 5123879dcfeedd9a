//! # topic-rules
//!
//! Declarative rules deciding what happens to a pubsub message: pass it
//! through, log it, keep it from the client, or rewrite parts of its
//! payload. Rule files are YAML; matchers are compiled once and evaluated
//! in priority order, first match wins.
//!
//! ## Quick start
//!
//! ```rust
//! use topic_rules::{loader, ResolvedAction, RuleEngine};
//!
//! let rules = loader::load_rules_from_str(r#"
//! version: "1.0"
//! rules:
//!   - name: "drop-ads"
//!     action: suppress
//!     matchers:
//!       - type: topic
//!         pattern: "ads.*"
//! "#).unwrap();
//! let engine = RuleEngine::new(rules).unwrap();
//! assert_eq!(engine.evaluate("ads.1", None).action, ResolvedAction::Suppress);
//! ```

mod decision;
mod evaluator;
pub mod loader;
mod rewrite;
mod schema;

pub use decision::{ResolvedAction, RuleDecision};
pub use evaluator::RuleEngine;
pub use rewrite::apply_edits;
pub use schema::{DefaultAction, Matcher, RuleAction, RuleSet, TopicRule};
