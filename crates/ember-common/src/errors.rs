// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Error types for the Emberline bootloader.
//!
//! One unified error enum is used throughout the workspace. Every error
//! is a plain value; there is no panicking error path in the core.

use core::fmt;

/// Result type alias for bootloader operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the bootloader core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Image integrity
    // =========================================================================
    /// No application descriptor was found, or the image failed its
    /// CRC verification.
    NoValidImage,

    // =========================================================================
    // Program memory
    // =========================================================================
    /// Read from the ROM backend failed.
    RomReadFailed,
    /// Write to the ROM backend failed. Fatal for the active session.
    RomWriteFailed,

    // =========================================================================
    // Update session
    // =========================================================================
    /// The file server stopped answering within the stall window.
    UpdateStalled,
    /// The file server reported an error for the requested read.
    FileServerError,
    /// The requested operation is not valid in the current state.
    BadState,
    /// The supplied file path exceeds the supported length.
    PathTooLong,

    // =========================================================================
    // Buffers
    // =========================================================================
    /// A fixed-capacity buffer was too small for the operation.
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoValidImage => "no valid application image",
            Self::RomReadFailed => "ROM read failed",
            Self::RomWriteFailed => "ROM write failed",
            Self::UpdateStalled => "update stalled",
            Self::FileServerError => "file server error",
            Self::BadState => "operation invalid in current state",
            Self::PathTooLong => "file path too long",
            Self::BufferTooSmall => "buffer too small",
        };
        f.write_str(text)
    }
}
