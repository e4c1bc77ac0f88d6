//! Candidate fixes, their content key and rejection reasons.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Confidence tier assigned by the analysis service. Only `High` is eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::High)
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown confidence tier: {other}")),
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed, unverified edit to one file.
///
/// `original` and `replacement` are exact text spans; `file_path` is
/// relative to the repository working directory. The remaining fields
/// only feed the pull request description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCandidate {
    pub file_path: String,
    pub original: String,
    pub replacement: String,
    pub confidence: Confidence,
    pub rationale: String,
    pub title: String,
    pub bug_description: String,
    pub fix_description: String,
    pub related_issue: Option<u64>,
}

impl FixCandidate {
    /// Content key of this candidate within `repo`.
    pub fn key(&self, repo: &str) -> FixKey {
        FixKey::compute(repo, &self.file_path, &self.original, &self.replacement)
    }
}

/// Deterministic SHA-256 key over (repository, file, original, replacement).
///
/// Each field is length-prefixed so that no two distinct tuples can
/// produce the same byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixKey(String);

impl FixKey {
    pub fn compute(repo: &str, file_path: &str, original: &str, replacement: &str) -> Self {
        let mut hasher = Sha256::new();
        for field in [repo, file_path, original, replacement] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex_encode(&hasher.finalize()))
    }

    /// Wrap an already-computed hex digest (e.g. read back from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Durable record that an exact edit was rejected for a content reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedFixRecord {
    pub key: FixKey,
    pub repo: String,
    pub file_path: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Why the fix safety pipeline refused a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    InsufficientConfidence { confidence: Confidence },
    PathTraversal { path: String },
    KnownRejected { previous_reason: String },
    FileNotFound { path: String },
    /// The target is not UTF-8 text.
    UnreadableContent { path: String },
    NoMatch,
    AmbiguousMatch { occurrences: usize },
    DiffTooLarge { original_lines: usize, replacement_lines: usize },
    SyntaxInvalid { output: String },
    /// A fail-closed checker could not be run.
    ValidatorUnavailable { checker: String, detail: String },
    TestsFailed { detail: String },
}

impl RejectionReason {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientConfidence { .. } => "insufficient_confidence",
            Self::PathTraversal { .. } => "path_traversal",
            Self::KnownRejected { .. } => "known_rejected",
            Self::FileNotFound { .. } => "file_not_found",
            Self::UnreadableContent { .. } => "unreadable_content",
            Self::NoMatch => "no_match",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::DiffTooLarge { .. } => "diff_too_large",
            Self::SyntaxInvalid { .. } => "syntax_invalid",
            Self::ValidatorUnavailable { .. } => "validator_unavailable",
            Self::TestsFailed { .. } => "tests_failed",
        }
    }

    /// Whether this rejection is derived from the edit's own content and
    /// therefore belongs in rejected-fix memory.
    pub fn is_recorded(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientConfidence { .. }
                | Self::PathTraversal { .. }
                | Self::KnownRejected { .. }
                | Self::ValidatorUnavailable { .. }
        )
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientConfidence { confidence } => {
                write!(f, "confidence {confidence} is below high")
            }
            Self::PathTraversal { path } => write!(f, "path escapes working directory: {path:?}"),
            Self::KnownRejected { previous_reason } => {
                write!(f, "previously rejected: {previous_reason}")
            }
            Self::FileNotFound { path } => write!(f, "file not found: {path}"),
            Self::UnreadableContent { path } => write!(f, "not UTF-8 text: {path}"),
            Self::NoMatch => f.write_str("original text not found in file"),
            Self::AmbiguousMatch { occurrences } => {
                write!(f, "original text matches {occurrences} times")
            }
            Self::DiffTooLarge {
                original_lines,
                replacement_lines,
            } => write!(
                f,
                "edit too large: {original_lines} lines replaced by {replacement_lines}"
            ),
            Self::SyntaxInvalid { output } => write!(f, "syntax check failed: {output}"),
            Self::ValidatorUnavailable { checker, detail } => {
                write!(f, "{checker} checker unavailable: {detail}")
            }
            Self::TestsFailed { detail } => write!(f, "tests {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_key_deterministic() {
        let a = FixKey::compute("acme/app", "src/a.py", "x == None", "x is None");
        let b = FixKey::compute("acme/app", "src/a.py", "x == None", "x is None");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fix_key_field_boundaries_matter() {
        let a = FixKey::compute("acme/app", "ab", "c", "d");
        let b = FixKey::compute("acme/app", "a", "bc", "d");
        assert_ne!(a, b);
    }

    #[test]
    fn test_fix_key_ignores_time_and_reason() {
        let candidate = FixCandidate {
            file_path: "lib.js".into(),
            original: "a".into(),
            replacement: "b".into(),
            confidence: Confidence::High,
            rationale: String::new(),
            title: "one".into(),
            bug_description: String::new(),
            fix_description: String::new(),
            related_issue: None,
        };
        let renamed_title = FixCandidate {
            title: "two".into(),
            ..candidate.clone()
        };
        assert_eq!(candidate.key("o/r"), renamed_title.key("o/r"));
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!("HIGH".parse::<Confidence>().unwrap(), Confidence::High);
        assert_eq!(" medium ".parse::<Confidence>().unwrap(), Confidence::Medium);
        assert!("certain".parse::<Confidence>().is_err());
        assert!(Confidence::High.is_eligible());
        assert!(!Confidence::Low.is_eligible());
    }

    #[test]
    fn test_recorded_reasons() {
        assert!(RejectionReason::NoMatch.is_recorded());
        assert!(RejectionReason::AmbiguousMatch { occurrences: 2 }.is_recorded());
        assert!(RejectionReason::UnreadableContent { path: "a.py".into() }.is_recorded());
        assert!(!RejectionReason::PathTraversal { path: "..".into() }.is_recorded());
        assert!(!RejectionReason::KnownRejected {
            previous_reason: "no_match".into()
        }
        .is_recorded());
    }
}
