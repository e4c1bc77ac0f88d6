//! Source file discovery and prompt formatting.

use std::fs;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::domain::models::{Issue, SourceFile};

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "go", "rs", "rb", "php", "c", "cpp", "h", "hpp", "cs",
];

const SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    "target",
    "vendor",
];

/// Limits applied while collecting files.
#[derive(Debug, Clone, Copy)]
pub struct CollectLimits {
    pub max_files: usize,
    pub max_file_bytes: u64,
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn is_code_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Collect source files under `root`, ranked so that files an issue mentions
/// by path or name come first.
pub fn collect_ranked(root: &Path, issues: &[Issue], limits: CollectLimits) -> Vec<SourceFile> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_code_file(path) {
            continue;
        }
        match entry.metadata() {
            Ok(meta) if meta.len() <= limits.max_file_bytes => {}
            _ => continue,
        }
        let Ok(bytes) = fs::read(path) else {
            continue;
        };
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        files.push(SourceFile {
            path: relative.to_string_lossy().replace('\\', "/"),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    let mentioned = |file: &SourceFile| {
        let name = file.path.rsplit('/').next().unwrap_or(&file.path);
        issues
            .iter()
            .any(|i| i.title.contains(name) || i.body.contains(&file.path) || i.body.contains(name))
    };
    // Stable sort keeps walk order within each group.
    files.sort_by_key(|f| !mentioned(f));
    files.truncate(limits.max_files);
    files
}

/// Concatenate files under per-file headers within a character budget.
///
/// The file that crosses the budget is truncated when a useful amount of it
/// still fits; everything after it is dropped.
pub fn format_for_prompt(files: &[SourceFile], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for file in files {
        let header = format!("\n--- {} ---\n", file.path);
        let header_len = header.chars().count();
        let content_len = file.content.chars().count();

        if used + header_len + content_len > max_chars {
            let remaining = max_chars.saturating_sub(used + header_len + 100);
            if remaining > 500 {
                out.push_str(&header);
                out.extend(file.content.chars().take(remaining));
                out.push_str("\n... [truncated]");
            }
            break;
        }

        out.push_str(&header);
        out.push_str(&file.content);
        used += header_len + content_len;
    }

    out
}
