//! Prompt injection filter at the message boundary.
//!
//! Incoming user text is matched against a curated regex set before it ever
//! reaches the LLM: role-escape directives, bracketed role tags, and known
//! jailbreak tokens, in English plus the Russian variants matching the
//! deployed user base. The set is configuration data; the built-in list below
//! is the default.

use regex::Regex;
use tracing::warn;

/// Default injection patterns. Case-insensitive; order is irrelevant since
/// the filter only answers yes/no.
pub fn default_injection_patterns() -> Vec<String> {
    [
        // Role-escape directives.
        r"(?i)ignore\s+(all\s+)?(previous|above|prior)\s+(instructions?|prompts?|commands?)",
        r"(?i)disregard\s+(all\s+)?(previous|above|prior)",
        r"(?i)forget\s+(all\s+)?(previous|your)\s+(instructions?|rules?|prompts?)",
        r"(?i)you\s+are\s+now\s+(a|an|the|in)\b",
        r"(?i)new\s+system\s+prompt",
        r"(?i)override\s+(system|instructions?|rules?)",
        // Bracketed role tags.
        r"(?i)\[\s*(system|admin|developer|root)\s*\]",
        r"(?i)^(system|assistant)\s*:",
        // Known jailbreak tokens.
        r"(?i)\bDAN\b.{0,20}\bmode\b",
        r"(?i)do\s+anything\s+now",
        r"(?i)\bjailbreak\b",
        r"(?i)(enter|enable)\s+(developer|debug|god)\s+mode",
        // Russian variants.
        r"(?i)забудь\s+(все|всё|предыдущие)",
        r"(?i)игнорируй\s+(все|всё|предыдущие)",
        r"(?i)ты\s+теперь\b",
        r"(?i)новые\s+инструкции",
        r"(?i)отключи\s+(ограничения|фильтры)",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Compiled injection filter. Pure and stateless after construction.
#[derive(Debug)]
pub struct PromptGuard {
    patterns: Vec<Regex>,
}

impl PromptGuard {
    /// Compile the filter. Invalid patterns are skipped with a warning so a
    /// single bad config entry cannot disable the whole filter.
    pub fn new(patterns: &[String]) -> Self {
        let compiled = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "skipping invalid injection pattern");
                    None
                }
            })
            .collect();
        Self { patterns: compiled }
    }

    /// True when the text matches any injection pattern.
    pub fn is_injection(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

impl Default for PromptGuard {
    fn default() -> Self {
        Self::new(&default_injection_patterns())
    }
}
