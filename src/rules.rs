//! Rule set — ordered pattern→command bindings with first-match lookup.

use regex::Regex;
use tracing::debug;

use crate::config::Rule;
use crate::error::ConfigError;

/// A rule with its compiled pattern.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    regex: Regex,
}

/// Ordered, immutable set of rules.
///
/// Patterns are compiled once at startup. Matching never mutates, so a
/// shared `RuleSet` is safe to read from any number of dispatch tasks
/// without synchronization.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile every rule's pattern. Fails on the first invalid rule.
    pub fn compile(rules: Vec<Rule>) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| match Regex::new(&rule.pattern) {
                Ok(regex) => Ok(CompiledRule { rule, regex }),
                Err(e) => Err(ConfigError::InvalidRule {
                    index,
                    name: rule.name.clone(),
                    reason: format!("invalid regex: {e}"),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Return the first rule, in configuration order, whose pattern
    /// matches anywhere in `text`. Unanchored search, not full-string match.
    pub fn first_match(&self, text: &str) -> Option<&Rule> {
        for compiled in &self.rules {
            if compiled.regex.is_match(text) {
                debug!(rule = %compiled.rule.name, "matched rule");
                return Some(&compiled.rule);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rule(name: &str, pattern: &str) -> Rule {
        Rule {
            name: name.into(),
            pattern: pattern.into(),
            working_dir: None,
            use_stdin: false,
            environment: vec![],
            command: vec!["echo".into()],
        }
    }

    #[test]
    fn first_match_wins_in_config_order() {
        let rules = RuleSet::compile(vec![
            make_rule("broad", "deploy"),
            make_rule("narrow", "^deploy prod$"),
        ])
        .unwrap();

        // Both patterns match; the earlier rule must win.
        let matched = rules.first_match("deploy prod").unwrap();
        assert_eq!(matched.name, "broad");
    }

    #[test]
    fn no_match_returns_none() {
        let rules = RuleSet::compile(vec![make_rule("ping", "^ping$")]).unwrap();
        assert!(rules.first_match("pong").is_none());
    }

    #[test]
    fn match_is_unanchored_substring_search() {
        let rules = RuleSet::compile(vec![make_rule("status", "status")]).unwrap();
        assert!(rules.first_match("what is the status of the build?").is_some());
    }

    #[test]
    fn regex_syntax_is_supported() {
        let rules = RuleSet::compile(vec![make_rule("ci", r"(?i)^restart\s+\w+")]).unwrap();
        assert!(rules.first_match("Restart nginx").is_some());
        assert!(rules.first_match("restart").is_none());
    }

    #[test]
    fn duplicate_patterns_are_allowed() {
        let rules = RuleSet::compile(vec![
            make_rule("first", "hello"),
            make_rule("second", "hello"),
        ])
        .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.first_match("hello").unwrap().name, "first");
    }

    #[test]
    fn invalid_pattern_fails_compile() {
        let err = RuleSet::compile(vec![make_rule("bad", "(")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let rules = RuleSet::compile(vec![]).unwrap();
        assert!(rules.is_empty());
        assert!(rules.first_match("anything").is_none());
    }
}
