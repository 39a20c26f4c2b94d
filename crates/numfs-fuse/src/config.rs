//! Mount configuration for the FUSE filesystem.

use fuser::MountOption;
use std::time::Duration;

/// Attribute cache TTL. Kept short since other clients may edit the device.
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(1);

/// Longest file name the device accepts, extension included.
pub const NAME_MAX: u32 = 219;

/// Permission bits for regular files.
pub const DEFAULT_FILE_PERM: u16 = 0o644;

/// Permission bits for the root directory.
pub const DEFAULT_DIR_PERM: u16 = 0o755;

/// Configuration options for the FUSE filesystem.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Time-to-live for cached attributes and entries.
    pub attr_ttl: Duration,

    /// Maximum file name length reported by statfs.
    pub name_max: u32,

    /// Let users other than the mounting user access the mount.
    ///
    /// Requires `user_allow_other` in /etc/fuse.conf.
    pub allow_other: bool,

    /// Permission bits for script files.
    pub file_perm: u16,

    /// Permission bits for the root directory.
    pub dir_perm: u16,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            attr_ttl: DEFAULT_ATTR_TTL,
            name_max: NAME_MAX,
            allow_other: false,
            file_perm: DEFAULT_FILE_PERM,
            dir_perm: DEFAULT_DIR_PERM,
        }
    }
}

impl MountConfig {
    /// Sets the cache TTL for attributes.
    #[must_use]
    pub fn attr_ttl(mut self, ttl: Duration) -> Self {
        self.attr_ttl = ttl;
        self
    }

    /// Sets the maximum name length reported by statfs.
    #[must_use]
    pub fn name_max(mut self, name_max: u32) -> Self {
        self.name_max = name_max;
        self
    }

    /// Allows other users to access the mount.
    #[must_use]
    pub fn allow_other(mut self, allow: bool) -> Self {
        self.allow_other = allow;
        self
    }

    /// Sets the permission bits for files and the root directory.
    #[must_use]
    pub fn permissions(mut self, file_perm: u16, dir_perm: u16) -> Self {
        self.file_perm = file_perm;
        self.dir_perm = dir_perm;
        self
    }

    /// Builds the fuser mount options for this configuration.
    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName("numworks".to_string()),
            MountOption::Subtype("numfs".to_string()),
            MountOption::DefaultPermissions,
            MountOption::RW,
        ];

        // AutoUnmount requires allow_other with fusermount
        if self.allow_other {
            options.push(MountOption::AllowOther);
            options.push(MountOption::AutoUnmount);
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MountConfig::default();
        assert_eq!(config.attr_ttl, Duration::from_secs(1));
        assert_eq!(config.name_max, 219);
        assert!(!config.allow_other);
        assert_eq!(config.file_perm, 0o644);
        assert_eq!(config.dir_perm, 0o755);
    }

    #[test]
    fn test_builder_pattern() {
        let config = MountConfig::default()
            .attr_ttl(Duration::from_secs(5))
            .name_max(64)
            .allow_other(true)
            .permissions(0o600, 0o700);
        assert_eq!(config.attr_ttl, Duration::from_secs(5));
        assert_eq!(config.name_max, 64);
        assert!(config.allow_other);
        assert_eq!(config.file_perm, 0o600);
        assert_eq!(config.dir_perm, 0o700);
    }

    #[test]
    fn test_mount_options_private_by_default() {
        let options = MountConfig::default().mount_options();
        assert!(options.contains(&MountOption::FSName("numworks".to_string())));
        assert!(options.contains(&MountOption::RW));
        assert!(!options.contains(&MountOption::AllowOther));
        assert!(!options.contains(&MountOption::AutoUnmount));
    }

    #[test]
    fn test_mount_options_allow_other() {
        let options = MountConfig::default().allow_other(true).mount_options();
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::AutoUnmount));
    }
}
