//! Path grammar for the secret namespace
//!
//! User-typed paths come in as `secret/foo:key`: an optional `:key` suffix
//! names one field inside the secret at the prefix. Paths are kept in a
//! canonical form internally: no leading `/`, no trailing `/`, no adjacent
//! `/`s. There is no escape syntax for `:` or `/`.

/// Canonicalize a path: strip one leading and one trailing `/`, then collapse
/// every run of two or more `/` into a single `/`.
///
/// Idempotent. The empty string canonicalizes to the empty string, which
/// denotes the root.
pub fn canonicalize(path: &str) -> String {
    // Collapse first so at most one leading/trailing slash survives; trimming
    // after that is what makes the whole thing idempotent.
    let mut collapsed = String::with_capacity(path.len());
    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_was_slash {
                collapsed.push(c);
            }
            last_was_slash = true;
        } else {
            collapsed.push(c);
            last_was_slash = false;
        }
    }

    let mut s = collapsed.as_str();
    s = s.strip_prefix('/').unwrap_or(s);
    s = s.strip_suffix('/').unwrap_or(s);
    s.to_string()
}

/// Split a user path into `(path, key)` on the **last** `:`.
///
/// Everything before the last `:` is canonicalized as the path; everything
/// after it (possibly empty) is the key. A path without `:` has an empty key.
pub fn parse_path(path: &str) -> (String, String) {
    match path.rfind(':') {
        Some(idx) => (canonicalize(&path[..idx]), path[idx + 1..].to_string()),
        None => (canonicalize(path), String::new()),
    }
}

/// True iff the path carries a non-empty `:key` suffix.
pub fn path_has_key(path: &str) -> bool {
    !parse_path(path).1.is_empty()
}

/// Strip any trailing `/`s without reallocating the remainder.
pub fn trim_trailing_slash(path: &str) -> &str {
    path.trim_end_matches('/')
}
