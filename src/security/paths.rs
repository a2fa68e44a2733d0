//! Filesystem access classifier.
//!
//! Every file tool call is checked here before touching the disk. Three
//! layered checks enforce workspace confinement:
//! - sensitive-file rules (base-name allowlist + full-path regex set, plus an
//!   unconditional `.ssh` segment rule),
//! - symlink escape (canonical resolution of the candidate and the workspace),
//! - blocked system directories.
//!
//! String-prefix comparison alone is not containment: paths are lexically
//! normalized and canonicalized before the prefix check so `..`, `./` and
//! symlink traversal cannot escape.

use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Verdict for a proposed filesystem access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    Allow,
    Blocked { reason: String },
}

impl PathDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Blocked { reason } => Some(reason),
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked {
            reason: reason.into(),
        }
    }
}

/// Roots a symlink may never point into, independent of workspace layout.
const SENSITIVE_LINK_ROOTS: &[&str] =
    &["/etc", "/root", "/home", "/proc", "/sys", "/dev", "/var"];

/// Secret file base names blocked regardless of location.
pub fn default_sensitive_names() -> Vec<String> {
    [
        ".env",
        ".npmrc",
        ".netrc",
        ".pgpass",
        ".my.cnf",
        "credentials.json",
        "credential.json",
        "secrets.json",
        "secrets.yaml",
        "secrets.yml",
        "token.json",
        "service-account.json",
        "id_rsa",
        "id_dsa",
        "id_ecdsa",
        "id_ed25519",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Full-path regexes for secret files that vary in naming.
pub fn default_sensitive_patterns() -> Vec<String> {
    [
        r"(?i)/run/secrets(/|$)",
        r"(?i)(^|/)\.env(\.[\w.-]+)?$",
        r"(?i)(^|/)[\w.-]*secret[\w.-]*\.(json|ya?ml|toml|txt)$",
        r"(?i)(^|/)[\w.-]*credential[\w.-]*\.(json|ya?ml)$",
        r"(?i)service[-_]?account[\w.-]*\.json$",
        r"(?i)\.(pem|key|p12|pfx)$",
        r"(?i)(^|/)id_(rsa|dsa|ecdsa|ed25519)(\.pub)?$",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// System directories blocked for listing and containment.
pub fn default_blocked_dirs() -> Vec<String> {
    [
        "/etc", "/root", "/proc", "/sys", "/dev", "/boot", "/var/log", "/var/run",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

/// Compiled path classifier.
#[derive(Debug)]
pub struct PathGuard {
    sensitive_names: HashSet<String>,
    sensitive_patterns: Vec<Regex>,
    blocked_dirs: Vec<PathBuf>,
}

/// Resolve `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize, falling back to canonicalizing the nearest existing ancestor
/// and re-appending the non-existent tail. Keeps symlink resolution for paths
/// that exist while still judging paths about to be created.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let normalized = lexical_normalize(path);
    let mut existing = normalized.as_path();
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if existing.exists() {
            break;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => return normalized,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    resolved
}

fn is_within(candidate: &Path, workspace: &Path) -> bool {
    candidate == workspace || candidate.starts_with(workspace)
}

fn has_ssh_segment(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_string_lossy() == ".ssh")
}

impl PathGuard {
    pub fn new(
        sensitive_names: &[String],
        sensitive_patterns: &[String],
        blocked_dirs: &[String],
    ) -> anyhow::Result<Self> {
        let compiled = sensitive_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| anyhow::anyhow!("invalid sensitive-path pattern {p:?}: {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            sensitive_names: sensitive_names
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            sensitive_patterns: compiled,
            blocked_dirs: blocked_dirs.iter().map(PathBuf::from).collect(),
        })
    }

    /// Whether the path names a secret file.
    ///
    /// Base name first (case-insensitive exact match), then the full
    /// normalized path against the regex set. A `.ssh` directory segment
    /// anywhere forces sensitive regardless of name.
    pub fn is_sensitive_file(&self, path: &Path) -> bool {
        if has_ssh_segment(path) {
            return true;
        }

        if let Some(name) = path.file_name() {
            let lower = name.to_string_lossy().to_lowercase();
            if self.sensitive_names.contains(&lower) {
                return true;
            }
        }

        let normalized = lexical_normalize(path);
        let text = normalized.to_string_lossy();
        self.sensitive_patterns.iter().any(|re| re.is_match(&text))
    }

    /// Guard a read access.
    pub fn check_read(&self, path: &Path, workspace: &Path) -> PathDecision {
        if self.is_sensitive_file(path) {
            return PathDecision::blocked("Sensitive file");
        }
        if let Some(decision) = self.check_symlink(path, workspace) {
            return decision;
        }
        if let Some(decision) = self.check_containment(path, workspace) {
            return decision;
        }
        if let Some(decision) = self.check_blocked_dir(path) {
            return decision;
        }
        PathDecision::Allow
    }

    /// Guard a write access (create, edit, delete).
    pub fn check_write(&self, path: &Path, workspace: &Path) -> PathDecision {
        if self.is_sensitive_file(path) {
            return PathDecision::blocked("Sensitive file");
        }
        if let Some(decision) = self.check_symlink(path, workspace) {
            return decision;
        }
        if let Some(decision) = self.check_containment(path, workspace) {
            return decision;
        }
        if let Some(decision) = self.check_blocked_dir(path) {
            return decision;
        }
        PathDecision::Allow
    }

    /// Guard a directory listing.
    pub fn check_list(&self, path: &Path, workspace: &Path) -> PathDecision {
        if let Some(decision) = self.check_blocked_dir(path) {
            return decision;
        }
        if let Some(decision) = self.check_symlink(path, workspace) {
            return decision;
        }
        if let Some(decision) = self.check_containment(path, workspace) {
            return decision;
        }
        PathDecision::Allow
    }

    /// Blocked when the path is a symlink whose target escapes the workspace
    /// or lands under a sensitive root. Non-existent paths pass: creation is
    /// permitted, the containment check still judges the parent.
    fn check_symlink(&self, path: &Path, workspace: &Path) -> Option<PathDecision> {
        let meta = path.symlink_metadata().ok()?;
        if !meta.file_type().is_symlink() {
            return None;
        }

        if let Ok(target) = std::fs::read_link(path) {
            let absolute = if target.is_absolute() {
                target
            } else {
                path.parent().unwrap_or(Path::new("/")).join(target)
            };
            let normalized = lexical_normalize(&absolute);
            for root in SENSITIVE_LINK_ROOTS {
                if normalized.starts_with(root) {
                    return Some(PathDecision::blocked(format!(
                        "Symlink points to sensitive location ({root})"
                    )));
                }
            }
        }

        let real = canonicalize_best_effort(path);
        let workspace_real = canonicalize_best_effort(workspace);
        if !is_within(&real, &workspace_real) {
            return Some(PathDecision::blocked(format!(
                "Symlink points outside workspace ({})",
                real.display()
            )));
        }

        None
    }

    /// Canonical-prefix workspace containment.
    fn check_containment(&self, path: &Path, workspace: &Path) -> Option<PathDecision> {
        let candidate = canonicalize_best_effort(path);
        let workspace_real = canonicalize_best_effort(workspace);
        if is_within(&candidate, &workspace_real) {
            None
        } else {
            Some(PathDecision::blocked("Path outside workspace"))
        }
    }

    fn check_blocked_dir(&self, path: &Path) -> Option<PathDecision> {
        let candidate = canonicalize_best_effort(path);
        if has_ssh_segment(&candidate) {
            return Some(PathDecision::blocked("Blocked directory (.ssh)"));
        }
        for dir in &self.blocked_dirs {
            if is_within(&candidate, dir) {
                return Some(PathDecision::blocked(format!(
                    "Blocked directory ({})",
                    dir.display()
                )));
            }
        }
        None
    }
}
