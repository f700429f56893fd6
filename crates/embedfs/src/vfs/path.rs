//! Store path rules.
//!
//! Store paths are unrooted, `/`-separated and free of `.`/`..` elements,
//! with `"."` naming the root. Callers hand us looser strings, so they go
//! through [`trim_separators`] first.

/// Path naming the root of a store.
pub const ROOT: &str = ".";

/// Strip every leading and trailing `/` from a query path.
///
/// An empty result means the root and is returned as `"."`.
pub fn trim_separators(name: &str) -> &str {
    let trimmed = name.trim_matches('/');
    if trimmed.is_empty() { ROOT } else { trimmed }
}

/// Check whether `name` is a valid store path.
pub fn is_valid_path(name: &str) -> bool {
    if name == ROOT {
        return true;
    }
    !name.is_empty()
        && name
            .split('/')
            .all(|elem| !elem.is_empty() && elem != "." && elem != "..")
}

/// Join a directory and a name, treating `"."` as the identity on either side.
pub fn join(dir: &str, name: &str) -> String {
    match (dir, name) {
        (ROOT, name) => name.to_string(),
        (dir, ROOT) => dir.to_string(),
        (dir, name) => format!("{dir}/{name}"),
    }
}

/// Final element of a store path (`"."` for the root).
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent of a store path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    Some(path.rsplit_once('/').map_or(ROOT, |(parent, _)| parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_separators() {
        assert_eq!(trim_separators("index.html"), "index.html");
        assert_eq!(trim_separators("/index.html"), "index.html");
        assert_eq!(trim_separators("//css/site.css/"), "css/site.css");
        assert_eq!(trim_separators("/"), ".");
        assert_eq!(trim_separators(""), ".");
    }

    #[test]
    fn test_trim_is_idempotent() {
        for p in ["a", "/a/", "a/b", "//a/b//", "/", ""] {
            let once = trim_separators(p);
            assert_eq!(trim_separators(once), once);
            assert_eq!(trim_separators(&format!("/{once}/")), once);
        }
    }

    #[test]
    fn test_valid_paths() {
        assert!(is_valid_path("."));
        assert!(is_valid_path("files"));
        assert!(is_valid_path("files/css/site.css"));

        assert!(!is_valid_path(""));
        assert!(!is_valid_path("/files"));
        assert!(!is_valid_path("files/"));
        assert!(!is_valid_path("a//b"));
        assert!(!is_valid_path("a/./b"));
        assert!(!is_valid_path("../etc"));
    }

    #[test]
    fn test_join_and_split() {
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("files", "."), "files");
        assert_eq!(join("files", "css/site.css"), "files/css/site.css");

        assert_eq!(base_name("files/css/site.css"), "site.css");
        assert_eq!(base_name("."), ".");
        assert_eq!(parent("files/css"), Some("files"));
        assert_eq!(parent("files"), Some("."));
        assert_eq!(parent("."), None);
    }
}
