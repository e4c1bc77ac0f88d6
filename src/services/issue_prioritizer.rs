//! Heuristic ranking of open issues before they are shown to the analysis service.

use std::cmp::Ordering;

use tracing::debug;

use crate::domain::models::Issue;

/// Issues carrying any of these labels are not actionable.
const SKIP_LABELS: &[&str] = &[
    "question",
    "discussion",
    "wontfix",
    "duplicate",
    "invalid",
    "blocked",
    "on hold",
    "needs info",
];

const LABEL_WEIGHTS: &[(&[&str], f64)] = &[
    (&["bug"], 3.0),
    (&["critical", "urgent"], 2.0),
    (&["security"], 2.5),
    (&["enhancement"], 1.0),
    (&["good first issue"], 0.5),
    (&["help wanted"], 0.5),
];

/// Phrases suggesting a small, mechanically fixable defect.
const FIXABLE_KEYWORDS: &[&str] = &[
    "null pointer",
    "nullpointerexception",
    "typeerror",
    "undefined",
    "none",
    "attributeerror",
    "keyerror",
    "off by one",
    "off-by-one",
    "index out of",
    "crash",
    "exception",
    "error handling",
    "missing check",
    "validation",
    "sanitize",
];

const MIN_ACTIONABLE_BODY: usize = 20;
const VAGUE_BODY: usize = 50;

pub const DEFAULT_ISSUE_LIMIT: usize = 5;

/// Drop issues that cannot be acted on: skip labels or a near-empty body.
pub fn filter_actionable(issues: Vec<Issue>) -> Vec<Issue> {
    issues
        .into_iter()
        .filter(|issue| !SKIP_LABELS.iter().any(|label| issue.has_label(label)))
        .filter(|issue| issue.body.trim().chars().count() >= MIN_ACTIONABLE_BODY)
        .collect()
}

pub fn score(issue: &Issue) -> f64 {
    let mut score: f64 = LABEL_WEIGHTS
        .iter()
        .filter(|(labels, _)| labels.iter().any(|l| issue.has_label(l)))
        .map(|(_, weight)| weight)
        .sum();

    let title = issue.title.to_lowercase();
    let body = issue.body.to_lowercase();
    if FIXABLE_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || body.contains(k))
    {
        score += 0.5;
    }

    if issue.body.chars().count() < VAGUE_BODY {
        score -= 0.5;
    }

    score.max(0.0)
}

/// Highest-scoring issues first, at most `limit`. Ties keep input order.
pub fn prioritize(issues: Vec<Issue>, limit: usize) -> Vec<Issue> {
    let mut scored: Vec<(f64, Issue)> = issues.into_iter().map(|i| (score(&i), i)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(limit);

    for (score, issue) in &scored {
        debug!(issue = issue.number, score, "prioritized issue");
    }
    scored.into_iter().map(|(_, issue)| issue).collect()
}
