use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::schema::{Matcher, RuleAction, RuleSet};

/// Load a [`RuleSet`] from a YAML file on disk.
///
/// Validates the rules after deserialization.
pub fn load_rules(path: impl AsRef<Path>) -> Result<RuleSet> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file: {}", path.display()))?;
    load_rules_from_str(&contents)
        .with_context(|| format!("failed to parse rule file: {}", path.display()))
}

/// Parse and validate a [`RuleSet`] from a YAML string.
pub fn load_rules_from_str(yaml: &str) -> Result<RuleSet> {
    let rules: RuleSet = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&rules)?;
    Ok(rules)
}

fn validate(rules: &RuleSet) -> Result<()> {
    if rules.version != "1.0" {
        bail!(
            "unsupported rule file version '{}'; only '1.0' is supported",
            rules.version
        );
    }

    let mut seen = HashSet::new();
    for rule in &rules.rules {
        if rule.name.is_empty() {
            bail!("rule name must not be empty");
        }
        if !seen.insert(&rule.name) {
            bail!("duplicate rule name: '{}'", rule.name);
        }

        if rule.action == RuleAction::Rewrite && rule.set.is_empty() {
            bail!("rule '{}' rewrites but has no `set` entries", rule.name);
        }
        for pointer in rule.set.keys() {
            check_pointer(&rule.name, pointer)?;
        }
        for matcher in &rule.matchers {
            if let Matcher::Payload { pointer, .. } = matcher {
                check_pointer(&rule.name, pointer)?;
            }
        }
    }

    Ok(())
}

fn check_pointer(rule: &str, pointer: &str) -> Result<()> {
    if !pointer.starts_with('/') {
        bail!("rule '{rule}': JSON pointer '{pointer}' must start with '/'");
    }
    Ok(())
}
