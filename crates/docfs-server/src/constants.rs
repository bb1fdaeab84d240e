//! Server configuration constants.

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 27117;

/// Default bind address (localhost only).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Database name used when none is configured.
pub const DEFAULT_DATABASE: &str = "test";

/// Longest request line accepted, newline included. Large enough for a
/// base64-encoded write of a full-size file.
pub const MAX_REQUEST_LINE: usize = 96 * 1024 * 1024;

/// Mode passed to `mkdir` when a request leaves it out.
pub const DEFAULT_DIR_MODE: u32 = 0o755;
