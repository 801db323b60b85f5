//! Common constants used throughout skel.

/// Descriptor every skeleton directory must carry.
pub const SKELETON_FILE: &str = "skeleton.toml";

/// Manifest fragment of a project skeleton.
pub const PROJECT_MANIFEST: &str = "drom.toml";

/// Manifest fragment of a package skeleton.
pub const PACKAGE_MANIFEST: &str = "package.toml";

/// File names never captured as skeleton content (compared lowercased).
pub const RESERVED_FILES: [&str; 3] = [PROJECT_MANIFEST, PACKAGE_MANIFEST, SKELETON_FILE];

/// Per-skeleton ignore file name
pub const IGNORE_FILE: &str = ".skelignore";

/// Project state directory, relative to the project root.
pub const STATE_DIR: &str = ".skel";

/// Backup area for skeleton sources, relative to the state directory.
pub const BACKUP_DIR: &str = "skeleton";

/// Environment variable listing the bundled catalog roots.
pub const SHARE_DIR_ENV: &str = "SKEL_SHARE_DIR";

/// Skeleton used by projects that do not name one.
pub const DEFAULT_PROJECT_SKELETON: &str = "program";

pub const DEFAULT_EDITION: &str = "2021";
