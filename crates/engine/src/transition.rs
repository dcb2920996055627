//! Transition resolution.
//!
//! Maps an element's exit status onto its transition rules. Rules are tried
//! in declared order; without a match the element falls through to its
//! `next` attribute, then to the following sibling, then to the end of the
//! container. Decisions never fall through.

use regex::Regex;

use crate::error::{EngineError, EngineResult};
use crate::model::TransitionRule;

/// Outcome of resolving an element's transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Continue with the named sibling.
    Next(String),
    /// Finish the current container normally.
    End { exit_status: Option<String> },
    /// Stop the job, optionally naming the restart position.
    Stop {
        exit_status: Option<String>,
        restart: Option<String>,
    },
    /// Fail the job.
    Fail { exit_status: Option<String> },
}

impl From<&TransitionRule> for Resolution {
    fn from(rule: &TransitionRule) -> Self {
        match rule {
            TransitionRule::Next { to, .. } => Resolution::Next(to.clone()),
            TransitionRule::End { exit_status, .. } => Resolution::End {
                exit_status: exit_status.clone(),
            },
            TransitionRule::Stop {
                exit_status,
                restart,
                ..
            } => Resolution::Stop {
                exit_status: exit_status.clone(),
                restart: restart.clone(),
            },
            TransitionRule::Fail { exit_status, .. } => Resolution::Fail {
                exit_status: exit_status.clone(),
            },
        }
    }
}

/// Match an exit status against a rule pattern.
///
/// `*` matches any run of characters, `?` exactly one; everything else is
/// literal and the whole status must match.
pub fn pattern_matches(pattern: &str, exit_status: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("^(?s:");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push_str(")$");

    match Regex::new(&expr) {
        Ok(re) => re.is_match(exit_status),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "Invalid transition pattern");
            false
        }
    }
}

/// First rule whose pattern matches, if any.
pub fn explicit_match<'a>(
    rules: &'a [TransitionRule],
    exit_status: &str,
) -> Option<&'a TransitionRule> {
    rules.iter().find(|rule| pattern_matches(rule.on(), exit_status))
}

/// Resolve where execution goes after `element_id`.
///
/// `fallback_next` is the element's `next` attribute or, when absent, the
/// following sibling in its container. It is ignored for decisions, which
/// must match one of their own rules.
pub fn resolve(
    element_id: &str,
    rules: &[TransitionRule],
    exit_status: &str,
    fallback_next: Option<&str>,
    is_decision: bool,
) -> EngineResult<Resolution> {
    if let Some(rule) = explicit_match(rules, exit_status) {
        tracing::trace!(element = element_id, exit_status, pattern = rule.on(), "Transition matched");
        return Ok(Resolution::from(rule));
    }

    if is_decision {
        return Err(EngineError::NoDecisionTransition {
            decision: element_id.to_string(),
            exit_status: exit_status.to_string(),
        });
    }

    Ok(match fallback_next {
        Some(next) => Resolution::Next(next.to_string()),
        None => Resolution::End { exit_status: None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_wildcards() {
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("*", "ANYTHING"));
        assert!(pattern_matches("COMP*", "COMPLETED"));
        assert!(pattern_matches("*ED", "FAILED"));
        assert!(pattern_matches("F?IL*", "FAILED"));
        assert!(!pattern_matches("F?IL", "FAILED"));
        assert!(!pattern_matches("OK", "OK2"));
        assert!(pattern_matches("OK", "OK"));
    }

    #[test]
    fn test_pattern_treats_regex_metacharacters_literally() {
        assert!(pattern_matches("rc(1).+", "rc(1).+"));
        assert!(!pattern_matches("rc.1", "rcX1"));
        assert!(pattern_matches("[a]*", "[a]-done"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = vec![
            TransitionRule::next("C*", "cleanup"),
            TransitionRule::next("COMPLETED", "report"),
            TransitionRule::fail("*"),
        ];
        let resolution = resolve("a", &rules, "COMPLETED", Some("b"), false).unwrap();
        assert_eq!(resolution, Resolution::Next("cleanup".to_string()));

        let resolution = resolve("a", &rules, "FAILED", Some("b"), false).unwrap();
        assert_eq!(resolution, Resolution::Fail { exit_status: None });
    }

    #[test]
    fn test_fallback_to_sibling_then_end() {
        let rules = vec![TransitionRule::end("SKIP")];
        assert_eq!(
            resolve("a", &rules, "OK", Some("b"), false).unwrap(),
            Resolution::Next("b".to_string())
        );
        assert_eq!(
            resolve("a", &rules, "OK", None, false).unwrap(),
            Resolution::End { exit_status: None }
        );
    }

    #[test]
    fn test_decision_requires_matching_rule() {
        let rules = vec![TransitionRule::next("LEFT", "left")];
        let err = resolve("route", &rules, "RIGHT", Some("sibling"), true).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NoDecisionTransition { ref decision, ref exit_status }
                if decision == "route" && exit_status == "RIGHT"
        ));
    }

    #[test]
    fn test_stop_carries_restart() {
        let rules = vec![TransitionRule::stop("HALT", Some("load"))];
        assert_eq!(
            resolve("a", &rules, "HALT", None, false).unwrap(),
            Resolution::Stop {
                exit_status: None,
                restart: Some("load".to_string())
            }
        );
    }

    #[test]
    fn test_explicit_match_has_no_fallback() {
        let rules = vec![TransitionRule::next("FAILED", "recover")];
        assert!(explicit_match(&rules, "FAILED").is_some());
        assert!(explicit_match(&rules, "COMPLETED").is_none());
        assert!(explicit_match(&[], "FAILED").is_none());
    }
}
