// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Bootloader configuration.
//!
//! All configuration is fixed at construction time; there is no runtime
//! reconfiguration surface.

use crate::time::Millis;

/// Timing and sizing parameters of the bootloader core.
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// How long a valid image waits in the boot-delay window before the
    /// bootloader commits to launching it. During this window remote
    /// actors may cancel the boot to push an update.
    pub boot_delay: Millis,
    /// Wall-clock window after which an unanswered file read request is
    /// cancelled and retried.
    pub request_timeout: Millis,
    /// How many consecutive stalled reads are retried before the update
    /// session is abandoned.
    pub max_read_retries: u8,
    /// File read chunk size in bytes. Must leave room for the response
    /// framing within the transport payload limit.
    pub read_chunk: u16,
}

impl BootConfig {
    /// Default configuration: 2 s boot delay, 1 s stall timeout,
    /// 3 retries, 256-byte read chunks.
    pub const DEFAULT: Self = Self {
        boot_delay: Millis::from_secs(2),
        request_timeout: Millis::from_secs(1),
        max_read_retries: 3,
        read_chunk: 256,
    };
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
