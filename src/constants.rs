//! Constants used throughout Mason

/// Brick metadata file expected at the root of every brick
pub const BRICK_METADATA_FILENAME: &str = "brick.yaml";

/// Directory containing the brick's template tree
pub const TEMPLATE_ROOT_DIR: &str = "__brick__";

/// Directory containing hook scripts and their dependency manifest
pub const HOOKS_DIR: &str = "hooks";

/// File stem of the pre-generation hook (any extension)
pub const PRE_GEN_HOOK_STEM: &str = "pre_gen";

/// File stem of the post-generation hook (any extension)
pub const POST_GEN_HOOK_STEM: &str = "post_gen";

/// Subdirectory of the cache root holding materialized bricks
pub const CACHE_BRICKS_DIR: &str = "bricks";

/// Directory under the system temp dir holding installed hook dependencies
pub const HOOK_DEPS_DIR: &str = ".mason";

/// Hex characters kept from a brick's content hash when naming cache entries
pub const CACHE_KEY_LEN: usize = 40;

/// Dependency manifest filenames recognized inside `hooks/`, in order of
/// preference, each paired with the command that installs it.
pub const HOOK_MANIFESTS: &[(&str, &[&str])] = &[
    ("pubspec.yaml", &["dart", "pub", "get"]),
    ("package.json", &["npm", "install"]),
    ("requirements.txt", &["pip3", "install", "-r", "requirements.txt"]),
];

/// Interpreters for hook scripts, keyed by file extension. Extensions not
/// listed here are executed directly.
pub const HOOK_INTERPRETERS: &[(&str, &[&str])] =
    &[("sh", &["sh"]), ("py", &["python3"]), ("js", &["node"]), ("dart", &["dart", "run"])];

/// Exit codes, following the sysexits convention
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// Malformed inputs, missing bricks, bad metadata
    pub const USAGE: i32 = 64;
    /// Everything else
    pub const SOFTWARE: i32 = 70;
}

/// Verbosity levels
pub mod verbosity {
    pub const OFF: u8 = 0;
    pub const INFO: u8 = 1;
    pub const DEBUG: u8 = 2;
    pub const TRACE: u8 = 3;
}
