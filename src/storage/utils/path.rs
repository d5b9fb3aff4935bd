// Translation between hierarchical paths, path components and flat object keys
use crate::storage::constants::{SEPARATOR, SEPARATOR_STR};

/// Split a path into its non-empty components: `"//a//b/"` yields `["a", "b"]`.
pub fn components(path: &str) -> Vec<String> {
    path.split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical form of a path: no leading or trailing separator, no empty,
/// `.` or `..` components. The root normalizes to the empty string.
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split(SEPARATOR) {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join(SEPARATOR_STR)
}

/// Join components with a single separator and normalize the result.
/// Composing nothing yields the root.
pub fn compose<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = components
        .into_iter()
        .filter(|c| !c.as_ref().is_empty())
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(SEPARATOR_STR);
    normalize(&joined)
}

/// The path without its last component.
pub fn parent(path: &str) -> String {
    let mut parts = components(&normalize(path));
    parts.pop();
    compose(parts)
}

/// Portion of `path` below `base`.
///
/// Both arguments are treated as absolute, so whether either already starts
/// with a separator makes no difference. A `path` outside of `base` is
/// returned in normalized form.
pub fn relativize(path: &str, base: &str) -> String {
    let path_parts = components(&normalize(path));
    let base_parts = components(&normalize(base));

    if path_parts.starts_with(&base_parts) {
        compose(&path_parts[base_parts.len()..])
    } else {
        compose(path_parts)
    }
}

pub fn is_root(path: &str) -> bool {
    normalize(path).is_empty()
}

/// Return a new String that guarantees a trailing '/'.
pub fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

pub fn remove_leading_slash(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

/// Key of a directory: the normalized path with a trailing separator, or the
/// empty key for the bucket root.
pub fn directory_key(path: &str) -> String {
    let normal = normalize(path);
    if normal.is_empty() {
        normal
    } else {
        ensure_trailing_slash(&normal)
    }
}
