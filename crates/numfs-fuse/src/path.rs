//! Path rules for the flat script directory.
//!
//! The mount is a single directory. A script path is `/<name>.py`; anything
//! nested or without the extension is rejected.

use crate::error::{FsError, FsResult};
use numfs_core::file::script_name;
use std::path::Path;

/// Whether `path` names the mount root.
pub fn is_root(path: &str) -> bool {
    Path::new(path) == Path::new("/")
}

/// The final component of `path`, or "" for the root.
pub fn final_segment(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
}

/// Validates a path for create, write, truncate or rename target and
/// returns the record name (display name without ".py").
pub fn validate_script_path(path: &str) -> FsResult<&str> {
    let p = Path::new(path);
    if p.parent() != Some(Path::new("/")) {
        return Err(FsError::InvalidOperation(format!(
            "{path}: scripts must live in the root directory"
        )));
    }
    script_name(final_segment(path))
        .ok_or_else(|| FsError::InvalidOperation(format!("{path}: scripts must end in .py")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_root() {
        assert!(is_root("/"));
        assert!(!is_root("/a.py"));
        assert!(!is_root(""));
    }

    #[test]
    fn test_final_segment() {
        assert_eq!(final_segment("/a.py"), "a.py");
        assert_eq!(final_segment("/dir/b.py"), "b.py");
        assert_eq!(final_segment("/"), "");
    }

    #[test]
    fn test_valid_script_path() {
        assert_eq!(validate_script_path("/hello.py").unwrap(), "hello");
        assert_eq!(validate_script_path("/my.lib.py").unwrap(), "my.lib");
    }

    #[test]
    fn test_rejects_nested_path() {
        assert!(matches!(
            validate_script_path("/dir/x.py"),
            Err(FsError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_extension() {
        for path in ["/x.txt", "/x", "/.py", "/x.pyc"] {
            assert!(
                matches!(validate_script_path(path), Err(FsError::InvalidOperation(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_root() {
        assert!(validate_script_path("/").is_err());
    }
}
