//! Shell command classifier.
//!
//! Every command proposed by the model passes through [`CommandGuard::classify`]
//! before anything else happens. The guard is a denylist, not a shell parser:
//! it matches the command text against two ordered pattern tables and returns
//! the first hit. Unrecognized syntax is allowed — the sandbox is the
//! enforcement boundary of last resort.
//!
//! Evaluation order is the decision algorithm: forbidden rules run before
//! dangerous rules, so a string that is both (`rm -rf /run/secrets`) is
//! reported as exfiltration and can never be downgraded to merely
//! approval-worthy.

use super::patterns::{compile_rules, CompiledRule, RuleSpec};

/// Verdict for a proposed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandDecision {
    /// Safe to hand to the sandbox immediately.
    Allow,
    /// Requires an explicit human approval before execution.
    Dangerous { reason: String },
    /// Secret-exfiltration attack. Never executed.
    Forbidden { reason: String },
}

impl CommandDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::Dangerous { .. })
    }

    /// The reason phrase, if the decision carries one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Dangerous { reason } | Self::Forbidden { reason } => Some(reason),
        }
    }
}

/// Compiled two-tier command classifier.
#[derive(Debug, Clone)]
pub struct CommandGuard {
    forbidden: Vec<CompiledRule>,
    dangerous: Vec<CompiledRule>,
}

/// Strip a matching pair of wrapping quotes from a single shell word.
fn strip_wrapping_quotes(token: &str) -> &str {
    token.trim_matches(|c| c == '"' || c == '\'')
}

/// Light normalization for quoted arguments: strip quotes that wrap whole
/// words and rejoin. `cat "/run/secrets/token"` then matches the same rules
/// as its unquoted form. Deliberately not a shell parser; the raw string is
/// always matched as well.
fn normalize_quoted_words(command: &str) -> String {
    command
        .split_whitespace()
        .map(strip_wrapping_quotes)
        .collect::<Vec<_>>()
        .join(" ")
}

impl CommandGuard {
    /// Compile a guard from ordered rule lists.
    pub fn new(forbidden: &[RuleSpec], dangerous: &[RuleSpec]) -> anyhow::Result<Self> {
        Ok(Self {
            forbidden: compile_rules(forbidden)?,
            dangerous: compile_rules(dangerous)?,
        })
    }

    /// Classify a command. Pure, deterministic, never panics.
    pub fn classify(&self, command: &str) -> CommandDecision {
        let normalized = normalize_quoted_words(command);
        let normalized = if normalized == command {
            None
        } else {
            Some(normalized)
        };
        let matches = |rule: &CompiledRule| {
            rule.regex.is_match(command)
                || normalized.as_deref().is_some_and(|n| rule.regex.is_match(n))
        };

        for rule in &self.forbidden {
            if matches(rule) {
                return CommandDecision::Forbidden {
                    reason: rule.reason.clone(),
                };
            }
        }

        for rule in &self.dangerous {
            if matches(rule) {
                return CommandDecision::Dangerous {
                    reason: rule.reason.clone(),
                };
            }
        }

        CommandDecision::Allow
    }
}
