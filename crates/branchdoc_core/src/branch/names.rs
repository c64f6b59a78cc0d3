//! Branch name normalization and collision handling.

use super::types::{BranchesMetadata, MAIN_BRANCH};

/// Longest branch name kept after sanitizing, in characters.
pub const MAX_BRANCH_NAME_LEN: usize = 64;

/// Normalize user input into a branch name.
///
/// Rules:
/// - Trim surrounding whitespace
/// - Replace runs of whitespace with a single hyphen
/// - Keep letters, digits, `-`, `_`, `.` and `/`; drop everything else
/// - Collapse repeated separators (`--`, `..`, `//`)
/// - Trim leading/trailing separators
/// - Truncate to [`MAX_BRANCH_NAME_LEN`] characters
///
/// Whitespace-only or empty input yields "", which callers treat as invalid.
///
/// Example: `"  My Feature!! "` → `"My-Feature"`
pub fn sanitize_branch_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')) {
            continue;
        }
        if pending_space {
            push_collapsed(&mut name, '-');
            pending_space = false;
        }
        if is_separator(c) {
            push_collapsed(&mut name, c);
        } else {
            name.push(c);
        }
    }

    let trimmed: String = name
        .trim_matches(is_separator)
        .chars()
        .take(MAX_BRANCH_NAME_LEN)
        .collect();
    trimmed.trim_end_matches(is_separator).to_string()
}

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '.' | '/')
}

fn push_collapsed(name: &mut String, c: char) {
    if !name.ends_with(c) {
        name.push(c);
    }
}

/// First of `prefix`, `prefix-1`, `prefix-2`, … not already a branch.
///
/// Without metadata only the implicit "main" branch is taken.
pub fn generate_unique_branch_name(metadata: Option<&BranchesMetadata>, prefix: &str) -> String {
    let taken = |name: &str| match metadata {
        Some(metadata) => metadata.contains(name),
        None => name == MAIN_BRANCH,
    };

    if !taken(prefix) {
        return prefix.to_string();
    }
    (1..)
        .map(|n| format!("{}-{}", prefix, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| prefix.to_string())
}
