//! Canonical path handling shared by every other layer.
//!
//! Every cache and every Document Store Client lookup is keyed on the
//! output of [`normalize`]. Root is represented as the empty string so
//! that `parent_path` on a top-level entry and the key used to query
//! `/_design/file/_view/byFolder` line up exactly with the CouchDB view
//! emitted by the original `cozyfuse` database design documents.

/// Strips duplicate and trailing separators, producing the canonical key.
///
/// A path made up only of separators (or the empty string) normalizes to
/// the empty string, which is the logical key for the root directory.
pub fn normalize(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Splits a path into its normalized parent path and leaf name.
///
/// `split("/A/B/test.sh") == ("/A/B", "test.sh")`. For a top-level entry
/// the parent normalizes to the empty string: `split("/file.txt") ==
/// ("", "file.txt")`.
pub fn split(path: &str) -> (String, String) {
    let normalized = normalize(path);
    match normalized.rsplit_once('/') {
        Some((parent, leaf)) => (normalize(parent), leaf.to_string()),
        None => (String::new(), normalized),
    }
}

/// Inverse of [`split`]: joins a normalized parent path and a leaf name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        normalize(name)
    } else {
        normalize(&format!("{parent}/{name}"))
    }
}

/// `true` for the root's canonical key.
pub fn is_root(path: &str) -> bool {
    path.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_duplicate_and_trailing_separators() {
        assert_eq!(normalize("/home//user/"), "/home/user");
        assert_eq!(normalize("home/user"), "/home/user");
    }

    #[test]
    fn normalize_root_variants_collapse_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
        assert_eq!(normalize("///"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for p in ["", "/", "/A/B", "A//B/", "/A/B/C/"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn split_top_level_entry_has_empty_parent() {
        assert_eq!(split("/file_test.txt"), ("".to_string(), "file_test.txt".to_string()));
    }

    #[test]
    fn split_nested_entry() {
        assert_eq!(split("/A/B/test.sh"), ("/A/B".to_string(), "test.sh".to_string()));
    }

    #[test]
    fn join_is_inverse_of_split() {
        for p in ["/A/B/test.sh", "/file.txt", "/A"] {
            let (parent, name) = split(p);
            assert_eq!(join(&parent, &name), normalize(p));
        }
    }
}
