//! Path algebra for the VFS layer.
//!
//! A full path is `volume:path`, where the volume is optional. Paths inside a
//! volume are stored without leading or trailing slashes, so `con:` and
//! `con:/` name the same place.

use alloc::string::String;
use alloc::vec::Vec;

/// Check that `volume` matches `[a-z0-9]+`.
pub fn is_volume_name(volume: &str) -> bool {
    !volume.is_empty()
        && volume
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Normalize a path by resolving `.` and `..` segments and removing
/// redundant slashes.
///
/// The result carries no leading or trailing slash. A `..` that would climb
/// above the root is dropped. Segments that merely contain dots
/// (`foo.bar`, `foo..`) are left alone.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// Split a full path into its volume and the path within the volume.
///
/// The volume is the leading `[a-z0-9]+` run directly followed by `:`.
/// Leading colons of the remainder are stripped, so `::bar` has no volume
/// and path `bar`.
pub fn split_path(full: &str) -> (Option<&str>, &str) {
    let prefix = full
        .bytes()
        .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        .count();

    let (volume, rest) = if prefix > 0 && full.as_bytes().get(prefix) == Some(&b':') {
        (Some(&full[..prefix]), &full[prefix + 1..])
    } else {
        (None, full)
    };

    (volume, rest.trim_start_matches(':'))
}

/// Join a volume and a path back into a full path.
pub fn join_volume(volume: &str, path: &str) -> String {
    let mut full = String::with_capacity(volume.len() + 1 + path.len());
    full.push_str(volume);
    full.push(':');
    full.push_str(path);
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapse() {
        assert_eq!(normalize_path("foo/bar"), "foo/bar");
        assert_eq!(normalize_path("/foo/bar/"), "foo/bar");
        assert_eq!(normalize_path("/foo/bar//"), "foo/bar");
        assert_eq!(normalize_path("/foo///bar/"), "foo/bar");
        assert_eq!(normalize_path("/foo/bar//baz/"), "foo/bar/baz");
    }

    #[test]
    fn test_normalize_keeps_dotted_names() {
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("/foo/."), "foo");
        assert_eq!(normalize_path("/foo/./bar/./baz/"), "foo/bar/baz");
        assert_eq!(normalize_path("./././foo/././."), "foo");
        assert_eq!(normalize_path("foo.bar"), "foo.bar");
        assert_eq!(normalize_path("/.foo/"), ".foo");
        assert_eq!(normalize_path("/foo./"), "foo.");
        assert_eq!(normalize_path("foo..bar"), "foo..bar");
    }

    #[test]
    fn test_normalize_parent_segments() {
        assert_eq!(normalize_path("../bar"), "bar");
        assert_eq!(normalize_path("/../bar"), "bar");
        assert_eq!(normalize_path("bar/.."), "");
        assert_eq!(normalize_path("/bar/../"), "");
        assert_eq!(normalize_path("foo/../bar"), "bar");
        assert_eq!(normalize_path("foo../../bar../baz"), "bar../baz");
        assert_eq!(normalize_path("/../foo/../bar../..baz/"), "bar../..baz");
        assert_eq!(normalize_path("/../../../foo/../bar/../baz"), "baz");
        assert_eq!(normalize_path("/foo/bar/../../baz"), "baz");
        assert_eq!(normalize_path("/foo/bar/baz/../.."), "foo");
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in [
            "/foo//bar/./../baz/",
            "../../x/y/..",
            "a/b/c/../../../..",
            "internal:console/../console/",
            "",
        ] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("foo:"), (Some("foo"), ""));
        assert_eq!(split_path("bar"), (None, "bar"));
        assert_eq!(split_path(":bar"), (None, "bar"));
        assert_eq!(split_path("::::bar/baz"), (None, "bar/baz"));
        assert_eq!(split_path("foo:bar/baz"), (Some("foo"), "bar/baz"));
        assert_eq!(split_path("foo:/bar/baz/"), (Some("foo"), "/bar/baz/"));
        assert_eq!(split_path("foo:bar:baz"), (Some("foo"), "bar:baz"));
        assert_eq!(split_path("foo/bar:baz"), (None, "foo/bar:baz"));
        assert_eq!(split_path("Foo:bar"), (None, "Foo:bar"));
    }

    #[test]
    fn test_volume_names() {
        assert!(is_volume_name("internal"));
        assert!(is_volume_name("http2"));
        assert!(!is_volume_name(""));
        assert!(!is_volume_name("Con"));
        assert!(!is_volume_name("a-b"));
    }
}
