// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Emberline Bootloader Common Library
//!
//! This crate provides the types and primitives shared across the
//! bootloader components:
//!
//! - **CRC**: CRC-64-WE (image integrity) and CRC-32C (frame integrity)
//! - **Volatile storage**: take-once cross-reset record marshalling
//! - **Node seam**: the transport-agnostic node and reactor traits
//! - **Logging**: in-memory circular log ring
//! - **Time**: monotonic microsecond timestamps and deadlines
//! - **Hex dump**: diagnostic formatting of byte buffers
//!
//! No heap allocations are performed anywhere; all buffers are fixed-size
//! arrays or `heapless` collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod crc;
pub mod errors;
pub mod hexdump;
pub mod log;
pub mod node;
pub mod time;
pub mod types;
pub mod volatile;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use time::Micros;
pub use types::{NodeId, PortId, ServiceId, SubjectId, SystemInfo, TransferId, ANONYMOUS_NODE_ID};
