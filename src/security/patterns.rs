//! Declarative guard rules for the command classifier.
//!
//! Pattern tables are data, not code: each rule is a `(regex, reason)` pair,
//! and list order decides which reason is reported when several rules match.
//! The built-in defaults below are the curated production set; deployments
//! can replace either list wholesale from `config.toml`.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single guard rule as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RuleSpec {
    /// Regular expression matched against the command string.
    pub pattern: String,
    /// Short human-readable phrase reported on match.
    pub reason: String,
}

impl RuleSpec {
    fn new(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A compiled rule ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub regex: Regex,
    pub reason: String,
}

/// Compile an ordered rule list, failing on the first invalid pattern.
///
/// Invalid patterns are a configuration error, not a runtime condition: a
/// silently skipped rule would be a hole in the guard.
pub fn compile_rules(specs: &[RuleSpec]) -> anyhow::Result<Vec<CompiledRule>> {
    specs
        .iter()
        .map(|spec| {
            let regex = Regex::new(&spec.pattern).map_err(|e| {
                anyhow::anyhow!("invalid guard pattern {:?}: {e}", spec.pattern)
            })?;
            Ok(CompiledRule {
                regex,
                reason: spec.reason.clone(),
            })
        })
        .collect()
}

/// Forbidden rules: secret exfiltration. Never executed, never approvable.
///
/// Order matters: the first matching rule supplies the reported reason.
pub fn default_forbidden_rules() -> Vec<RuleSpec> {
    vec![
        // Docker secrets mount. Any mention at all is hostile: legitimate
        // workloads never touch /run/secrets from inside the agent.
        RuleSpec::new(r"(?i)/run/secrets", "Secret path read"),
        // Kernel-exposed process environment.
        RuleSpec::new(r"(?i)/proc/\w+/environ", "Process environment read"),
        // SSH private key material, via home shorthand or bare .ssh/ segment.
        RuleSpec::new(
            r#"(?i)(~|\$HOME|/home/\w+|/root)/\.ssh|(^|[\s"'=])\.ssh/"#,
            "SSH key access",
        ),
        // Interpreter one-liners that print the environment map.
        RuleSpec::new(
            r"(?i)\b(python[\w.]*|node|deno|bun|ruby|perl|php)\b[^|;&]*\s-\w*[ce]\b.*(\benviron\b|process\.env\b|\bgetenv\b|\bENV\b)",
            "Environment dump via interpreter",
        ),
        // env / printenv / export / set as standalone inspection, or piped.
        RuleSpec::new(
            r"(?i)^\s*(env|printenv|export|set)\s*(\||$)",
            "Environment inspection",
        ),
        RuleSpec::new(r"(?i)^\s*printenv\s+\w+\s*$", "Environment inspection"),
        // Echoing known secret-bearing variables.
        RuleSpec::new(
            r"(?i)\becho\b[^|;&]*\$\{?\w*(api[_-]?key|token|secret|passw|credential)",
            "Secret variable echo",
        ),
        // System credential files.
        RuleSpec::new(
            r"(?i)\b(cat|less|more|head|tail|strings|grep|awk|sed|cut|sort|vi|vim|nano|cp|dd|tar)\b[^|;&]*/etc/(passwd|shadow|sudoers|hosts)",
            "System file read",
        ),
        // Credential dotfiles and key files read directly.
        RuleSpec::new(
            r#"(?i)\b(cat|less|more|head|tail|strings|grep|cp|vi|vim|nano|scp|rsync)\b[^|;&]*[\s/"'](\.env\b|\.env\.|\.npmrc\b|\.netrc\b|\.pgpass\b|credentials?\.json\b|secrets?\.(json|ya?ml|toml)\b|id_rsa\b|id_ed25519\b)"#,
            "Sensitive file read",
        ),
        // Encoders pointed at credential files.
        RuleSpec::new(
            r#"(?i)\b(base64|xxd|hexdump|od|openssl\s+enc)\b[^|;&]*[\s/"'](\.env\b|\.env\.|\.npmrc\b|\.netrc\b|credentials?\.json\b|secrets?\.\w+|id_rsa\b|id_ed25519\b)"#,
            "Sensitive file encoding",
        ),
        // Encoders re-encoding an arbitrary stdin stream: `cat f | base64`,
        // `base64 < f`. Re-encoding is how content sneaks past output filters.
        RuleSpec::new(
            r"\|\s*(base64|xxd|hexdump|od|openssl\s+enc)\b",
            "Encoding pipeline for exfiltration",
        ),
        RuleSpec::new(
            r"\b(base64|xxd|hexdump|od)\b\s*<",
            "Encoding pipeline for exfiltration",
        ),
        // HTTP clients aimed at internal service hostnames. The proxy holds
        // the real API keys; reaching it from a sandboxed shell is an attack.
        RuleSpec::new(
            r"(?i)\b(curl|wget|nc|ncat|telnet|httpie)\b[^|;&]*\b(proxy|gateway|core|bot|userbot|tools-api|localhost|127\.0\.0\.1|0\.0\.0\.0|169\.254\.169\.254|host\.docker\.internal)\b",
            "Internal service contact",
        ),
        // On-demand package runners fetching env-harvesting packages.
        RuleSpec::new(
            r"(?i)\b(npx|uvx|pipx\s+run|pnpm\s+dlx|yarn\s+dlx)\s+(-y\s+)?[\w@./-]*(env|secret|token|cred|dump|steal|exfil|harvest)[\w@./-]*",
            "Malicious package execution",
        ),
    ]
}

/// Dangerous rules: destructive or system-level operations that require an
/// explicit out-of-band human approval before execution.
pub fn default_dangerous_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            r"(?i)\brm\s+(-[a-z]*[rf][a-z]*)(\s|$)",
            "Force recursive delete",
        ),
        RuleSpec::new(r"(?i)\b(sudo|doas)\b", "Root privileges"),
        RuleSpec::new(r"(?i)\bsu\s+(-|root)", "Root privileges"),
        RuleSpec::new(
            r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
            "Fork bomb",
        ),
        RuleSpec::new(r"(?i)\bfork\s*\(\s*\)", "Fork bomb"),
        RuleSpec::new(r"(?i)\bwhile\s+(true|:)\s*;?\s*do\b", "Infinite loop"),
        RuleSpec::new(r"(?i)\bmkfs(\.\w+)?\b", "Filesystem format"),
        RuleSpec::new(r"(?i)\bdd\b[^|;&]*\bof=/dev/", "Raw device write"),
        RuleSpec::new(r"(?i)>\s*/dev/sd[a-z]", "Raw device write"),
        RuleSpec::new(r"(?i)\b(shred|wipefs)\b", "Data destruction"),
        RuleSpec::new(
            r"(?i)\bchmod\s+(-[a-z]+\s+)*0?[67]77\b",
            "World-writable permissions",
        ),
        RuleSpec::new(r"(?i)\bchmod\s+-[a-zA-Z]*R", "Recursive permission change"),
        RuleSpec::new(r"(?i)\bchown\b", "Ownership change"),
        RuleSpec::new(r"(?i)\b(shutdown|reboot|poweroff|halt)\b", "System control"),
        RuleSpec::new(
            r"(?i)\bsystemctl\s+(stop|disable|mask|restart)\b",
            "Service control",
        ),
        RuleSpec::new(r"(?i)\b(kill|pkill|killall)\b\s+\S", "Process kill"),
        RuleSpec::new(
            r"(?i)\b(iptables|nft|ufw|firewall-cmd)\b",
            "Firewall modification",
        ),
        RuleSpec::new(
            r"(?i)\bip\s+link\s+set\b[^|;&]*\bdown\b",
            "Network interface down",
        ),
        RuleSpec::new(
            r"(?i)\b(apt(-get)?|yum|dnf|apk|pacman)\b[^|;&]*\b(remove|purge|autoremove)\b",
            "Unattended package removal",
        ),
        RuleSpec::new(
            r"(?i)\b(curl|wget)\b[^|;&]*\|\s*(ba|z|da)?sh\b",
            "Pipe to shell",
        ),
        RuleSpec::new(r"(?i)\bgit\s+push\b[^|;&]*(--force\b|-f\b)", "History rewrite"),
        RuleSpec::new(
            r"(?i)\bgit\s+(reset\s+--hard|clean\s+-[a-z]*f|filter-branch)",
            "History rewrite",
        ),
        RuleSpec::new(
            r"(?i)\b(drop\s+(table|database|schema)|truncate\s+table)\b",
            "Destructive SQL",
        ),
        RuleSpec::new(r"(?i)\bdelete\s+from\s+\w+\s*(;|$)", "Destructive SQL"),
        RuleSpec::new(
            r"(?i)\bunset\s+(PATH|HOME|LD_PRELOAD|LD_LIBRARY_PATH)\b",
            "Critical environment mutation",
        ),
        RuleSpec::new(
            r"(?i)\bexport\s+(PATH|LD_PRELOAD|LD_LIBRARY_PATH)=",
            "Critical environment mutation",
        ),
        RuleSpec::new(
            r"(?i)\bmv\s+[^|;&]*\s+/(etc|usr|bin|sbin|lib|boot)\b",
            "System modification",
        ),
        RuleSpec::new(r"(?i)\bcrontab\s+-r\b", "Cron table removal"),
        RuleSpec::new(r"(?i)\bhistory\s+-c\b", "History wipe"),
    ]
}
