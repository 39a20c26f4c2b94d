//! The user-visible script file entity.

/// Extension appended to every script name to form its display name.
pub const SCRIPT_EXTENSION: &str = "py";

/// A script as seen by the filesystem: a name and its decoded text.
///
/// Equality is by value, which is what session dirtiness is computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    /// Record name, without extension.
    pub name: String,
    /// Logical (UTF-8) content.
    pub content: String,
}

impl ScriptFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Creates an empty script.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }

    /// Name including the script extension, e.g. `hello.py`.
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }

    /// Size of the UTF-8 encoded content in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns true if this file is shown under `display_name`.
    pub fn matches(&self, display_name: &str) -> bool {
        script_name(display_name).is_some_and(|name| name == self.name)
    }
}

/// Builds the display name for a record name.
pub fn display_name(name: &str) -> String {
    format!("{name}.{SCRIPT_EXTENSION}")
}

/// Strips the script extension from a display name.
///
/// Returns `None` when the name does not carry the extension or would be
/// empty once stripped.
pub fn script_name(display_name: &str) -> Option<&str> {
    display_name
        .strip_suffix(SCRIPT_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_and_size() {
        let file = ScriptFile::new("maths", "é = 1\n");
        assert_eq!(file.display_name(), "maths.py");
        // 'é' is two bytes in UTF-8
        assert_eq!(file.size(), 7);
    }

    #[test]
    fn test_script_name() {
        assert_eq!(script_name("foo.py"), Some("foo"));
        assert_eq!(script_name("foo.bar.py"), Some("foo.bar"));
        assert_eq!(script_name("foo.txt"), None);
        assert_eq!(script_name("foopy"), None);
        assert_eq!(script_name(".py"), None);
    }

    #[test]
    fn test_matches() {
        let file = ScriptFile::empty("foo");
        assert!(file.matches("foo.py"));
        assert!(!file.matches("foo"));
        assert!(!file.matches("foo.txt"));
        assert!(!file.matches("bar.py"));
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = ScriptFile::new("a", "x");
        let mut b = a.clone();
        assert_eq!(a, b);
        b.content.push('y');
        assert_ne!(a, b);
    }
}
