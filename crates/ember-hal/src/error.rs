// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! HAL error type.

use ember_common::Error;

/// Result alias for HAL operations.
pub type HalResult<T> = core::result::Result<T, HalError>;

/// Errors reported by platform drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HalError {
    /// The requested address range is outside the device.
    OutOfRange,
    /// The device reported a read fault.
    ReadFault,
    /// The device reported a program/erase fault.
    WriteFault,
    /// The peripheral is not ready or not initialized.
    NotReady,
}

impl From<HalError> for Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::ReadFault | HalError::NotReady => Error::RomReadFailed,
            HalError::WriteFault | HalError::OutOfRange => Error::RomWriteFailed,
        }
    }
}
