//! Virtual path handling.
//!
//! Paths are plain `/`-separated strings, optionally carrying a scheme
//! (`zip://`, `zip:`, `file://`, `file:`). Everything here is pure string
//! manipulation: no filesystem access, no `.`/`..` resolution.
//!
//! `dirname` returns `None` once no proper parent remains (a single segment,
//! or a segment directly under `/`). Resolution relies on this to stop its
//! upward walk.

use crate::vfs::{VfsError, VfsResult};

/// Long form of the overlay scheme.
pub const ZIP_SCHEME: &str = "zip://";

/// Short form of the overlay scheme, also the registration predicate.
pub const ZIP_SCHEME_SHORT: &str = "zip:";

/// Scheme of real filesystem urls.
pub const FILE_SCHEME: &str = "file://";

const FILE_SCHEME_SHORT: &str = "file:";

/// Schemes recognized by [`split_scheme`], longest first.
const SCHEMES: [&str; 4] = [ZIP_SCHEME, ZIP_SCHEME_SHORT, FILE_SCHEME, FILE_SCHEME_SHORT];

/// Split a url into its recognized scheme prefix and the remaining path.
///
/// Unrecognized or missing schemes yield an empty prefix.
pub fn split_scheme(url: &str) -> (&str, &str) {
    for scheme in SCHEMES {
        if let Some(rest) = url.strip_prefix(scheme) {
            return (&url[..scheme.len()], rest);
        }
    }
    ("", url)
}

/// Returns true if `url` belongs to the archive overlay.
pub fn is_virtual(url: &str) -> bool {
    url.starts_with(ZIP_SCHEME_SHORT)
}

/// Strip the overlay scheme and any trailing separators.
///
/// `zip:///a/file.zip/dir/` becomes `/a/file.zip/dir`.
pub fn normalize(url: &str) -> String {
    let rest = url
        .strip_prefix(ZIP_SCHEME)
        .or_else(|| url.strip_prefix(ZIP_SCHEME_SHORT))
        .unwrap_or(url);
    rest.trim_end_matches('/').to_string()
}

/// Strip a `file://` or `file:` scheme, yielding the real path.
pub fn real_path(url: &str) -> &str {
    url.strip_prefix(FILE_SCHEME)
        .or_else(|| url.strip_prefix(FILE_SCHEME_SHORT))
        .unwrap_or(url)
}

/// Build a virtual url for a normalized path.
pub fn to_virtual(path: &str) -> String {
    format!("{ZIP_SCHEME}{path}")
}

/// Build a `file://` url for a real path.
pub fn to_file_url(path: &str) -> String {
    format!("{FILE_SCHEME}{path}")
}

/// Parent of `path`, keeping its scheme. `None` when no proper parent remains.
pub fn dirname(path: &str) -> Option<String> {
    let (scheme, rest) = split_scheme(path);
    let rest = rest.trim_end_matches('/');
    match rest.rfind('/') {
        None | Some(0) => None,
        Some(idx) => Some(format!("{scheme}{}", &rest[..idx])),
    }
}

/// Last segment of `path`, ignoring trailing separators.
pub fn basename(path: &str) -> &str {
    let (_, rest) = split_scheme(path);
    let rest = rest.trim_end_matches('/');
    match rest.rfind('/') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    }
}

/// Join `name` onto `base` with exactly one separator.
///
/// An empty base (the archive root) yields `name` alone.
pub fn join(base: &str, name: &str) -> String {
    let (scheme, rest) = split_scheme(base);
    let rest = rest.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if rest.is_empty() && scheme.is_empty() && !base.starts_with('/') {
        name.to_string()
    } else {
        format!("{scheme}{rest}/{name}")
    }
}

/// Path of `path` relative to `prefix`, if `path` is `prefix` or lies under it.
///
/// An empty prefix contains every path.
pub fn strip_dir_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

/// Validate a copy/move destination and bring it into the overlay scheme.
///
/// Real paths and `file:` urls are rewritten to `zip://`; overlay urls pass
/// through; any other scheme is rejected.
pub fn validate_destination(url: &str, action: &str) -> VfsResult<String> {
    if is_virtual(url) {
        return Ok(url.to_string());
    }
    let (scheme, rest) = split_scheme(url);
    if scheme.starts_with(FILE_SCHEME_SHORT) {
        return Ok(to_virtual(rest));
    }
    let has_foreign_scheme = url
        .find(':')
        .is_some_and(|colon| url.find('/').is_none_or(|slash| colon < slash));
    if has_foreign_scheme || url.is_empty() {
        return Err(VfsError::unsupported(format!("{action} to {url}")));
    }
    Ok(to_virtual(url))
}

/// Reject names that would escape or split the target directory.
pub fn validate_name(name: &str) -> VfsResult<&str> {
    let trimmed = name.trim_matches('/');
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(VfsError::invalid_path(name));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("zip:///a/file.zip/dir/"), "/a/file.zip/dir");
        assert_eq!(normalize("zip:/test/file.zip/path"), "/test/file.zip/path");
        assert_eq!(normalize("zip://file.zip/dir/test.txt"), "file.zip/dir/test.txt");
        assert_eq!(normalize("/plain/path//"), "/plain/path");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/a/file.zip/dir").as_deref(), Some("/a/file.zip"));
        assert_eq!(dirname("file.zip/dir/test.txt").as_deref(), Some("file.zip/dir"));
        assert_eq!(dirname("zip:///a/b.zip/x/").as_deref(), Some("zip:///a/b.zip"));
        assert_eq!(dirname("/a"), None);
        assert_eq!(dirname("file.zip"), None);
        assert_eq!(dirname("/"), None);
        assert_eq!(dirname(""), None);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("zip:///a/file.zip/dir/test.txt"), "test.txt");
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("single"), "single");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("dir", "a.txt"), "dir/a.txt");
        assert_eq!(join("", "a.txt"), "a.txt");
        assert_eq!(join("zip:///a.zip/", "/x"), "zip:///a.zip/x");
        assert_eq!(join("/", "x"), "/x");
    }

    #[test]
    fn test_strip_dir_prefix() {
        assert_eq!(strip_dir_prefix("dir/a.txt", "dir"), Some("a.txt"));
        assert_eq!(strip_dir_prefix("dir", "dir"), Some(""));
        assert_eq!(strip_dir_prefix("dirt/a.txt", "dir"), None);
        assert_eq!(strip_dir_prefix("a/b", ""), Some("a/b"));
    }

    #[test]
    fn test_validate_destination() {
        assert_eq!(validate_destination("zip:///a.zip/d", "Copy").unwrap(), "zip:///a.zip/d");
        assert_eq!(validate_destination("file:///tmp/x", "Copy").unwrap(), "zip:///tmp/x");
        assert_eq!(validate_destination("/tmp/x", "Move").unwrap(), "zip:///tmp/x");
        assert!(matches!(
            validate_destination("https://example.com/x", "Copy"),
            Err(VfsError::Unsupported(_))
        ));
        assert!(validate_destination("content:abc", "Copy").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("a.txt").unwrap(), "a.txt");
        assert_eq!(validate_name("/sub/").unwrap(), "sub");
        assert!(validate_name("..").is_err());
        assert!(validate_name("").is_err());
    }
}
