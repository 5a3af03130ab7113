// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Emberline Bootloader HAL Contracts
//!
//! The bootloader core is platform-agnostic; everything hardware-shaped
//! is consumed through the narrow traits defined here and implemented
//! by the host platform:
//!
//! - [`RomBackend`]: erase/program access to the application region
//! - [`SerialPort`]: non-blocking byte transport
//! - [`Clock`]: monotonic microsecond uptime
//! - [`ResetControl`]: platform reset request
//!
//! The `sim` feature provides in-memory implementations for host tests.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;

#[cfg(feature = "sim")]
pub mod sim;

pub use error::{HalError, HalResult};
pub use traits::{Clock, ResetControl, RomBackend, SerialPort};
