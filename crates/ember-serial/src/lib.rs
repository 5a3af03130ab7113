// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! UAVCAN/serial transport for the Emberline bootloader.
//!
//! Frames are delimited byte streams: a zero-copy [`StreamParser`]
//! extracts single-frame transfers from the receive direction, and a
//! buffer-free [`transmit`] emitter streams transfers out through the
//! byte-stuffing and CRC pipeline. [`SerialNode`] ties both to a
//! [`SerialPort`](ember_hal::SerialPort) and implements the transport
//! node contract consumed by the bootloader core.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod emit;
pub mod frame;
pub mod node;
pub mod parser;

pub use emit::transmit;
pub use frame::{Metadata, Transfer};
pub use node::SerialNode;
pub use parser::StreamParser;
