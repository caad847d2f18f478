use super::defaults::{
    MAX_ARG_TIMEOUT_MS, MAX_HANDSHAKE_TIMEOUT_MS, MAX_MAX_LINE_BYTES,
    MAX_MESSAGES_PER_IDLE_LIMIT, MAX_TERMINATE_GRACE_MS, MAX_WRITE_TIMEOUT_MS, MIN_MAX_LINE_BYTES,
};
use super::BridgeConfig;
use anyhow::{bail, Result};
use clap::Parser;

impl BridgeConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the idle path block or the channel unusable.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HANDSHAKE_TIMEOUT_MS).contains(&self.handshake_timeout_ms) {
            bail!(
                "--handshake-timeout-ms must be between 1 and {MAX_HANDSHAKE_TIMEOUT_MS}, got {}",
                self.handshake_timeout_ms
            );
        }
        if !(1..=MAX_ARG_TIMEOUT_MS).contains(&self.arg_timeout_ms) {
            bail!(
                "--arg-timeout-ms must be between 1 and {MAX_ARG_TIMEOUT_MS}, got {}",
                self.arg_timeout_ms
            );
        }
        if !(1..=MAX_WRITE_TIMEOUT_MS).contains(&self.write_timeout_ms) {
            bail!(
                "--write-timeout-ms must be between 1 and {MAX_WRITE_TIMEOUT_MS}, got {}",
                self.write_timeout_ms
            );
        }
        if self.terminate_grace_ms > MAX_TERMINATE_GRACE_MS {
            bail!(
                "--terminate-grace-ms must be at most {MAX_TERMINATE_GRACE_MS}, got {}",
                self.terminate_grace_ms
            );
        }
        if !(MIN_MAX_LINE_BYTES..=MAX_MAX_LINE_BYTES).contains(&self.max_line_bytes) {
            bail!(
                "--max-line-bytes must be between {MIN_MAX_LINE_BYTES} and {MAX_MAX_LINE_BYTES}, got {}",
                self.max_line_bytes
            );
        }
        if !(1..=MAX_MESSAGES_PER_IDLE_LIMIT).contains(&self.max_messages_per_idle) {
            bail!(
                "--max-messages-per-idle must be between 1 and {MAX_MESSAGES_PER_IDLE_LIMIT}, got {}",
                self.max_messages_per_idle
            );
        }
        Ok(())
    }
}
