//! Branch name to working-copy directory name mapping

/// Directory name for a fixture branch's working copy.
///
/// Slashes and other unsafe characters collapse to single dashes:
/// `e2e/image-automation` -> `e2e-image-automation`. Branches that slug to
/// nothing get `branch`.
pub fn workdir_name(branch: &str) -> String {
    let mut result = String::with_capacity(branch.len());
    let mut last_was_dash = true; // skip leading dashes

    for c in branch.chars() {
        if c.is_alphanumeric() || c == '.' {
            result.push(c);
            last_was_dash = false;
        } else if !last_was_dash {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }
    // Never produce `.` or `..`
    if result.is_empty() || result.chars().all(|c| c == '.') {
        return "branch".to_string();
    }
    result
}
