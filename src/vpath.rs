//! Path algebra over virtual path strings.
//!
//! Every function here is pure. A path is an optional *root* followed by components separated
//! by `/`. Recognised roots, in matching order:
//! - UNC style: `//server/share/`
//! - drive letter: `c:` or `c:/`
//! - protocol style: `scheme://host/`
//! - POSIX style: `/`
//!
//! Backslashes are accepted on input and always emitted as `/`. Case-sensitivity is never
//! stored here; callers pass `ignore_case` explicitly and all comparisons go through [`fold`].

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::core::{Result, VfsError};

/// The canonical separator.
pub const SEPARATOR: char = '/';

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn find_separator(path: &str, from: usize) -> Option<usize> {
    path[from..].find(is_separator).map(|i| i + from)
}

/// Folds `name` for comparison under the given case rule.
pub fn fold(name: &str, ignore_case: bool) -> Cow<'_, str> {
    if ignore_case && name.chars().any(char::is_uppercase) {
        Cow::Owned(name.to_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// Name equality under the case rule.
pub fn equate(a: &str, b: &str, ignore_case: bool) -> bool {
    fold(a, ignore_case) == fold(b, ignore_case)
}

/// Total order on names under the case rule.
pub fn compare(a: &str, b: &str, ignore_case: bool) -> Ordering {
    fold(a, ignore_case).cmp(&fold(b, ignore_case))
}

/// Replaces every separator (and any whitespace around it) with a single `/`, collapses runs of
/// separators after the root and trims the result.
pub fn normalize_separators(path: &str) -> String {
    let mut replaced = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if is_separator(c) {
            let kept = replaced.trim_end().len();
            replaced.truncate(kept);
            replaced.push(SEPARATOR);
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else {
            replaced.push(c);
        }
    }
    let replaced = replaced.trim();

    let root_length = get_root_length(replaced);
    let (root, rest) = replaced.split_at(root_length);
    let mut result = String::with_capacity(replaced.len());
    result.push_str(root);
    let mut previous_was_separator = root.ends_with(SEPARATOR);
    for c in rest.chars() {
        if c == SEPARATOR {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        result.push(c);
    }
    result
}

/// Returns the byte length of the root of `path`, or `0` for a relative path.
pub fn get_root_length(path: &str) -> usize {
    let bytes = path.as_bytes();
    let Some(&first) = bytes.first() else {
        return 0;
    };

    if is_separator(first as char) {
        if bytes.len() < 2 || !is_separator(bytes[1] as char) {
            return 1;
        }
        let Some(server_end) = find_separator(path, 2) else {
            return path.len();
        };
        return match find_separator(path, server_end + 1) {
            Some(share_end) => share_end + 1,
            None => server_end + 1,
        };
    }

    if bytes.len() >= 2 && first.is_ascii_alphabetic() && bytes[1] == b':' {
        return if bytes.len() > 2 && is_separator(bytes[2] as char) {
            3
        } else {
            2
        };
    }

    if let Some(scheme_end) = path.find("://") {
        let scheme = &path[..scheme_end];
        if !scheme.is_empty()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            let host_start = scheme_end + 3;
            return match find_separator(path, host_start) {
                Some(host_end) => host_end + 1,
                None => path.len(),
            };
        }
    }

    0
}

/// Returns the root of `path` together with its length.
pub fn get_root(path: &str) -> (String, usize) {
    let path = normalize_separators(path);
    let length = get_root_length(&path);
    (path[..length].to_string(), length)
}

pub fn has_root(path: &str) -> bool {
    get_root_length(&normalize_separators(path)) > 0
}

/// Absolute means rooted: relative inputs have an empty root.
pub fn is_absolute(path: &str) -> bool {
    has_root(path)
}

pub fn has_trailing_separator(path: &str) -> bool {
    path.ends_with(is_separator)
}

pub fn add_trailing_separator(path: &str) -> String {
    if has_trailing_separator(path) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

/// Strips one trailing separator unless it belongs to the root.
pub fn remove_trailing_separator(path: &str) -> String {
    if has_trailing_separator(path) && path.len() > get_root_length(path) {
        path[..path.len() - 1].to_string()
    } else {
        path.to_string()
    }
}

/// Splits `path` into `[root, component, ...]`. The root is `""` for relative paths.
pub fn parse(path: &str) -> Vec<String> {
    let path = normalize_separators(path);
    let root_length = get_root_length(&path);
    let (root, rest) = path.split_at(root_length);

    let mut components = vec![root.to_string()];
    if !rest.is_empty() {
        let mut parts: Vec<&str> = rest.split(SEPARATOR).collect();
        if parts.last().is_some_and(|last| last.is_empty()) {
            parts.pop();
        }
        components.extend(parts.into_iter().map(|part| part.trim().to_string()));
    }
    components
}

/// Elides `.` and resolves `..` against the preceding component.
///
/// A `..` that would climb past a root is dropped; a `..` at the front of a relative path is
/// kept since there is nothing known to climb into.
pub fn reduce(components: &[String]) -> Vec<String> {
    let Some(root) = components.first() else {
        return Vec::new();
    };

    let mut reduced = vec![root.clone()];
    for component in &components[1..] {
        match component.as_str() {
            "" | "." => continue,
            ".." => {
                if reduced.len() > 1 {
                    if reduced.last().is_some_and(|last| last != "..") {
                        reduced.pop();
                        continue;
                    }
                } else if !reduced[0].is_empty() {
                    continue;
                }
                reduced.push(component.clone());
            }
            _ => reduced.push(component.clone()),
        }
    }
    reduced
}

/// Joins `[root, component, ...]` back into a path string.
///
/// A relative path whose first component reads as a root (`c:`) is prefixed with `./`, so the
/// result stays relative.
pub fn format<S: AsRef<str>>(components: &[S]) -> String {
    let Some((root, rest)) = components.split_first() else {
        return String::new();
    };
    let rest: Vec<&str> = rest.iter().map(AsRef::as_ref).collect();

    let mut path = root.as_ref().to_string();
    if path.is_empty() && rest.first().is_some_and(|first| get_root_length(first) > 0) {
        path.push_str("./");
    }
    path.push_str(&rest.join("/"));
    path
}

/// Canonical form of `path`. A trailing separator survives only when at least one component
/// remains after the root.
pub fn normalize(path: &str) -> String {
    let path = normalize_separators(path);
    let components = reduce(&parse(&path));
    let mut normalized = format(&components);
    if components.len() > 1 && has_trailing_separator(&path) {
        normalized.push(SEPARATOR);
    }
    normalized
}

/// Left fold of `parts` onto `base`. A rooted part replaces everything accumulated so far.
pub fn combine<S: AsRef<str>>(base: &str, parts: &[S]) -> String {
    let mut path = normalize_separators(base);
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        let part = normalize_separators(part);
        if path.is_empty() || get_root_length(&part) > 0 {
            path = part;
        } else {
            path = add_trailing_separator(&path) + &part;
        }
    }
    path
}

/// Appends the entry `name` to `parent` as exactly one component.
///
/// Unlike [`combine`], a name that looks like a root (`c:`) stays a child of `parent`.
pub fn append_name(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return format(&["", name]);
    }
    format!("{}{name}", add_trailing_separator(parent))
}

/// `normalize(combine(base, parts))`.
pub fn resolve<S: AsRef<str>>(base: &str, parts: &[S]) -> String {
    normalize(&combine(base, parts))
}

/// Computes the path that leads from `from` to `to`.
///
/// Both paths must be rooted. When the roots differ the normalized `to` is returned as is.
/// Equal paths give `.`. A trailing separator that survives normalization of `to` is kept.
pub fn relative(from: &str, to: &str, ignore_case: bool) -> Result<String> {
    if !is_absolute(from) {
        return Err(VfsError::InvalidPath(format!("path is not absolute: {from}")));
    }
    if !is_absolute(to) {
        return Err(VfsError::InvalidPath(format!("path is not absolute: {to}")));
    }

    let from_components = reduce(&parse(from));
    let to_components = reduce(&parse(to));

    let start = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| equate(a, b, ignore_case))
        .count();
    if start == 0 {
        return Ok(normalize(to));
    }
    let trailing = to_components.len() > 1 && has_trailing_separator(&normalize_separators(to));

    let mut components = vec![String::new()];
    components.extend((start..from_components.len()).map(|_| "..".to_string()));
    components.extend(to_components[start..].iter().cloned());
    if components.len() == 1 {
        components.push(".".to_string());
    }

    let mut relative = format(&components);
    if trailing {
        relative.push(SEPARATOR);
    }
    Ok(relative)
}

/// Whether `descendant` equals `ancestor` or lies beneath it.
pub fn beneath(ancestor: &str, descendant: &str, ignore_case: bool) -> bool {
    let ancestor = reduce(&parse(ancestor));
    let descendant = reduce(&parse(descendant));
    descendant.len() >= ancestor.len()
        && ancestor
            .iter()
            .zip(descendant.iter())
            .all(|(a, d)| equate(a, d, ignore_case))
}

/// Everything after the last separator that is not part of the root.
pub fn basename(path: &str) -> String {
    let path = normalize_separators(path);
    let root_length = get_root_length(&path);
    if root_length == path.len() {
        return String::new();
    }
    let path = remove_trailing_separator(&path);
    let start = path
        .rfind(SEPARATOR)
        .map_or(0, |i| i + 1)
        .max(get_root_length(&path));
    path[start..].to_string()
}

/// Everything before the last separator, never shorter than the root.
pub fn dirname(path: &str) -> String {
    let path = remove_trailing_separator(&normalize_separators(path));
    let root_length = get_root_length(&path);
    let end = path.rfind(SEPARATOR).unwrap_or(0).max(root_length);
    path[..end].to_string()
}

/// Extension of the basename including the dot, or `""`.
pub fn extname(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(i) if i > 0 => name[i..].to_string(),
        _ => String::new(),
    }
}
