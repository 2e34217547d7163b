//! System-wide constants for the NexusDB statement layer.

// =============================================================================
// Reprepare
// =============================================================================

/// Maximum number of automatic reprepares after stale metadata within a
/// single execute call.
pub const MAX_REPREPARE_ATTEMPTS: u32 = 3;

// =============================================================================
// Statement Limits
// =============================================================================

/// Default maximum number of prepared statements per session.
pub const DEFAULT_MAX_PREPARED_STATEMENTS: usize = 16_382;

/// Maximum number of placeholders in one statement.
///
/// The binary protocol carries the parameter count as a u16.
pub const MAX_PARAMETERS: usize = u16::MAX as usize;

/// Default cap on bytes accumulated per parameter through long data (64 MB).
pub const DEFAULT_MAX_LONG_DATA_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// Diagnostics
// =============================================================================

/// Default maximum number of conditions stored per diagnostics area.
pub const DEFAULT_MAX_ERROR_COUNT: usize = 1024;

/// SQLSTATE used for warnings.
pub const SQLSTATE_WARNING: &str = "01000";

/// SQLSTATE used for errors without a more specific state.
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";
