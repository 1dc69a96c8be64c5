//! Branch name validation.
//!
//! Branch names follow git's ref-name conventions so they stay unambiguous
//! in URLs, query strings and any client that maps them onto git refs.

use crate::error::{MetaError, MetaResult};

/// Characters that may not appear anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Substrings that may not appear anywhere in a branch name.
const FORBIDDEN_SEQUENCES: &[&str] = &["..", "@{", "//"];

fn branch_name_problem(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("must not be empty".into());
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Some(format!("contains forbidden character {c:?}"));
    }
    if let Some(seq) = FORBIDDEN_SEQUENCES.iter().find(|s| name.contains(*s)) {
        return Some(format!("must not contain {seq:?}"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("must not start or end with '/'".into());
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return Some("must not end with '.' or '.lock'".into());
    }
    if name.split('/').any(|part| part.starts_with('.')) {
        return Some("no path component may start with '.'".into());
    }
    None
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// ```
/// use fbox_meta::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/auth").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> MetaResult<()> {
    match branch_name_problem(name) {
        None => Ok(()),
        Some(reason) => Err(MetaError::InvalidBranchName {
            name: name.to_string(),
            reason,
        }),
    }
}
