//! Pull request text and fix branch naming.

use chrono::{DateTime, Utc};

use crate::domain::models::{FixCandidate, RunTimezone};

const MAX_DIFF_LINES: usize = 60;
const MAX_BRANCH_COMPONENT: usize = 50;

/// Reduce arbitrary text to a safe git branch name component.
pub fn sanitize_branch_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = match c {
            '/' | '\\' | ' ' => '-',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => continue,
        };
        // Collapse runs of dashes and dots; git refuses "..".
        if (c == '-' || c == '.') && out.ends_with(c) {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    trimmed
        .chars()
        .take(MAX_BRANCH_COMPONENT)
        .collect::<String>()
        .trim_end_matches(['-', '.'])
        .to_string()
}

/// `<prefix><YYYYmmdd-HHMMSS>-<sanitised file path>`, stamped in `timezone`.
pub fn branch_name(prefix: &str, at: DateTime<Utc>, timezone: RunTimezone, file_path: &str) -> String {
    let stamp = timezone.wall_clock(at).format("%Y%m%d-%H%M%S");
    let component = sanitize_branch_component(file_path);
    if component.is_empty() {
        format!("{prefix}{stamp}")
    } else {
        format!("{prefix}{stamp}-{component}")
    }
}

/// Line diff of two spans: shared leading and trailing lines as context,
/// the differing middle as removals followed by additions.
pub fn span_diff(original: &str, replacement: &str) -> Vec<String> {
    let old: Vec<&str> = original.lines().collect();
    let new: Vec<&str> = replacement.lines().collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut lines = Vec::with_capacity(old.len() + new.len());
    lines.extend(old[..prefix].iter().map(|l| format!(" {l}")));
    lines.extend(old[prefix..old.len() - suffix].iter().map(|l| format!("-{l}")));
    lines.extend(new[prefix..new.len() - suffix].iter().map(|l| format!("+{l}")));
    lines.extend(old[old.len() - suffix..].iter().map(|l| format!(" {l}")));
    lines
}

/// Markdown body for a fix pull request.
pub fn build_body(fix: &FixCandidate) -> String {
    let mut sections = vec![
        "## Summary".to_string(),
        fix.rationale.clone(),
        String::new(),
        "## Bug".to_string(),
        fix.bug_description.clone(),
        String::new(),
        "## Fix".to_string(),
        fix.fix_description.clone(),
        String::new(),
        format!("**File:** `{}`", fix.file_path),
        format!("**Confidence:** {}", fix.confidence),
    ];

    if let Some(issue) = fix.related_issue {
        sections.push(format!("**Related issue:** #{issue}"));
    }

    sections.push(String::new());
    sections.push("## Code Changes".to_string());
    sections.push("```diff".to_string());
    let diff = span_diff(&fix.original, &fix.replacement);
    if diff.len() > MAX_DIFF_LINES {
        sections.extend(diff[..MAX_DIFF_LINES].iter().cloned());
        sections.push(format!(
            "... ({} more lines, see Files Changed)",
            diff.len() - MAX_DIFF_LINES
        ));
    } else {
        sections.extend(diff);
    }
    sections.push("```".to_string());

    sections.extend([
        String::new(),
        "## Review Checklist".to_string(),
        "- [ ] The fix addresses the described bug".to_string(),
        "- [ ] No unintended side effects".to_string(),
        "- [ ] Tests pass (if applicable)".to_string(),
    ]);

    sections.join("\n")
}

/// Commit message for an applied fix.
pub fn commit_message(fix: &FixCandidate) -> String {
    let mut message = fix.title.clone();
    if !fix.fix_description.is_empty() {
        message.push_str("\n\n");
        message.push_str(&fix.fix_description);
    }
    if let Some(issue) = fix.related_issue {
        message.push_str(&format!("\n\nFixes #{issue}"));
    }
    message
}
