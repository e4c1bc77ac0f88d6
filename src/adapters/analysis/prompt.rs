//! Prompt text for fix generation.

use crate::domain::models::{Issue, SourceFile};
use crate::services::source_collector::format_for_prompt;

const ISSUE_BODY_LIMIT: usize = 500;

pub const SYSTEM_PROMPT: &str = "You are an expert code reviewer focused on finding and fixing bugs.
Your job is to analyze code and identify clear, unambiguous bugs that can be safely fixed.

Focus on these conservative fix types:
- Missing null/None checks
- Error handling gaps
- Off-by-one errors
- Logic typos (wrong operators, inverted conditions)
- Resource leaks (unclosed files, connections)
- Obvious security issues (SQL injection, XSS)

Do NOT suggest style changes, refactoring, performance work, new features,
API signature changes, or anything that requires deep domain knowledge.

Only report HIGH confidence bugs that have clear, safe fixes.";

/// Build the user prompt for one repository.
pub fn build_prompt(repo: &str, files: &[SourceFile], issues: &[Issue], max_chars: usize) -> String {
    format!(
        r#"Analyze this code for bugs and provide ONE actionable fix.

Repository: {repo}

Open Issues (bugs/enhancements):
{issues}

Code Files:
{code}

Instructions:
1. Review the code carefully
2. Consider the open issues if relevant
3. Identify the most important bug that can be safely fixed
4. Provide a complete fix; original_code must be copied exactly from the file

Respond in this exact JSON format:
{{
    "found_bug": true/false,
    "file_path": "path/to/file.py",
    "bug_description": "Brief description of the bug",
    "fix_description": "Brief description of the fix",
    "original_code": "The exact code to replace",
    "fixed_code": "The corrected code",
    "pr_title": "Short PR title",
    "pr_body": "Detailed PR description",
    "confidence": "high/medium/low",
    "related_issue": null or issue_number
}}

If no bugs are found, set found_bug to false and leave other fields empty."#,
        issues = format_issues(issues),
        code = format_for_prompt(files, max_chars),
    )
}

fn format_issues(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "No open issues.".to_string();
    }

    let mut lines = Vec::with_capacity(issues.len() * 4);
    for issue in issues {
        lines.push(format!("Issue #{}: {}", issue.number, issue.title));
        lines.push(format!("  Labels: {}", issue.labels.join(", ")));
        if !issue.body.is_empty() {
            let body = if issue.body.chars().count() > ISSUE_BODY_LIMIT {
                let head: String = issue.body.chars().take(ISSUE_BODY_LIMIT).collect();
                format!("{head}...")
            } else {
                issue.body.clone()
            };
            lines.push(format!("  Description: {body}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}
