pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ARG_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 5_000;
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;
pub const DEFAULT_MAX_MESSAGES_PER_IDLE: usize = 64;

pub(super) const MAX_HANDSHAKE_TIMEOUT_MS: u64 = 120_000;
pub(super) const MAX_ARG_TIMEOUT_MS: u64 = 5_000;
pub(super) const MAX_WRITE_TIMEOUT_MS: u64 = 60_000;
pub(super) const MAX_TERMINATE_GRACE_MS: u64 = 60_000;
pub(super) const MIN_MAX_LINE_BYTES: usize = 64;
pub(super) const MAX_MAX_LINE_BYTES: usize = 64 * 1024 * 1024;
pub(super) const MAX_MESSAGES_PER_IDLE_LIMIT: usize = 4_096;
