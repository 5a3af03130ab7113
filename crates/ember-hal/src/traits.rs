// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Platform contracts consumed by the bootloader core.

use ember_common::time::Micros;

use crate::error::HalResult;

/// Access to the non-volatile program memory holding the application
/// image. All offsets are image-relative: offset zero is the first byte
/// of the application region, not of the device.
pub trait RomBackend {
    /// Read `out.len()` bytes starting at `offset`.
    fn read(&self, offset: u32, out: &mut [u8]) -> HalResult<()>;

    /// Program `data` starting at `offset`.
    ///
    /// Erase semantics are the implementation's business; writes are
    /// atomic only at the platform's program unit. The writer above
    /// this trait always writes in aligned blocks of uniform size.
    fn write(&mut self, offset: u32, data: &[u8]) -> HalResult<()>;
}

/// Non-blocking byte port. Both directions must never block.
pub trait SerialPort {
    /// Take one byte from the receive queue, if available.
    fn receive(&mut self) -> Option<u8>;

    /// Enqueue one byte for transmission. Returns false if there is no
    /// space; the caller abandons the current frame in that case.
    fn send(&mut self, byte: u8) -> bool;
}

/// Monotonic wall-clock source. Must never go backwards.
pub trait Clock {
    /// Microseconds since bootloader start.
    fn uptime(&self) -> Micros;
}

/// Platform reset request.
pub trait ResetControl {
    /// Request a platform reset. May not return.
    fn request_reset(&mut self);
}

impl<T: RomBackend> RomBackend for &mut T {
    fn read(&self, offset: u32, out: &mut [u8]) -> HalResult<()> {
        (**self).read(offset, out)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> HalResult<()> {
        (**self).write(offset, data)
    }
}

impl<T: SerialPort> SerialPort for &mut T {
    fn receive(&mut self) -> Option<u8> {
        (**self).receive()
    }

    fn send(&mut self, byte: u8) -> bool {
        (**self).send(byte)
    }
}

impl<T: Clock> Clock for &T {
    fn uptime(&self) -> Micros {
        (**self).uptime()
    }
}

impl<T: ResetControl> ResetControl for &mut T {
    fn request_reset(&mut self) {
        (**self).request_reset()
    }
}
