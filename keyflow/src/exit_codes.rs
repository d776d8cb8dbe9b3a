//! Stable exit codes for keyflow CLI commands.

/// Command succeeded, or the run finished by navigating back past the root.
pub const OK: i32 = 0;
/// Invalid configuration, document problems, or other errors.
pub const INVALID: i32 = 1;
/// The run was aborted (end of input or an abort reply).
pub const ABORTED: i32 = 2;
/// A document or entry point could not be found.
pub const NOT_FOUND: i32 = 3;
/// A link's permission predicate was denied.
pub const FORBIDDEN: i32 = 4;
