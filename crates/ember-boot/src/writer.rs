// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Streaming image writer.
//!
//! Incoming payload bytes of any size accumulate in a block buffer and
//! are programmed in aligned, uniformly sized blocks. The trailing
//! partial block is padded with the erased-flash value on completion,
//! so the programmed length is always a whole number of blocks while
//! the reported total counts payload bytes only.
//!
//! A backend write fault latches the writer into a failed state; the
//! session owning it treats that as unrecoverable.

use ember_common::{Error, Result};
use ember_hal::RomBackend;

/// Program block size in bytes. Must be a multiple of the platform's
/// minimum program unit.
pub const WRITE_BLOCK_SIZE: usize = 256;

/// Byte used to pad the trailing partial block.
pub const PAD_BYTE: u8 = 0xFF;

/// Block-buffered writer streaming an image into the ROM backend.
pub struct ImageWriter {
    block: [u8; WRITE_BLOCK_SIZE],
    fill: usize,
    flash_offset: u32,
    total: u32,
    active: bool,
    failed: bool,
}

impl ImageWriter {
    /// Create an idle writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            block: [0; WRITE_BLOCK_SIZE],
            fill: 0,
            flash_offset: 0,
            total: 0,
            active: false,
            failed: false,
        }
    }

    /// Start a new image at offset zero, clearing any previous state.
    pub fn begin(&mut self) {
        self.fill = 0;
        self.flash_offset = 0;
        self.total = 0;
        self.active = true;
        self.failed = false;
    }

    /// Abandon the current image without flushing.
    pub fn abort(&mut self) {
        self.active = false;
    }

    /// Whether a write session is open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the backend reported a fault since `begin`.
    #[must_use]
    pub const fn has_failed(&self) -> bool {
        self.failed
    }

    /// Payload bytes accepted since `begin`.
    #[must_use]
    pub const fn total_written(&self) -> u32 {
        self.total
    }

    /// Accept payload bytes; any length including zero is valid.
    pub fn write<R: RomBackend>(&mut self, rom: &mut R, mut data: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::RomWriteFailed);
        }
        if !self.active {
            return Err(Error::BadState);
        }
        while !data.is_empty() {
            let space = WRITE_BLOCK_SIZE - self.fill;
            let n = space.min(data.len());
            self.block[self.fill..self.fill + n].copy_from_slice(&data[..n]);
            self.fill += n;
            self.total += n as u32;
            data = &data[n..];
            if self.fill == WRITE_BLOCK_SIZE {
                self.flush(rom)?;
            }
        }
        Ok(())
    }

    /// Flush the trailing partial block (padded) and close the session.
    /// Returns the number of payload bytes written.
    pub fn end<R: RomBackend>(&mut self, rom: &mut R) -> Result<u32> {
        if self.failed {
            return Err(Error::RomWriteFailed);
        }
        if !self.active {
            return Err(Error::BadState);
        }
        if self.fill > 0 {
            self.block[self.fill..].fill(PAD_BYTE);
            self.fill = WRITE_BLOCK_SIZE;
            self.flush(rom)?;
        }
        self.active = false;
        Ok(self.total)
    }

    fn flush<R: RomBackend>(&mut self, rom: &mut R) -> Result<()> {
        if rom.write(self.flash_offset, &self.block[..self.fill]).is_err() {
            self.failed = true;
            return Err(Error::RomWriteFailed);
        }
        self.flash_offset += self.fill as u32;
        self.fill = 0;
        Ok(())
    }
}

impl Default for ImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use ember_hal::sim::MemoryRom;

    use super::*;

    #[test]
    fn blocks_flush_only_when_full() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        writer.begin();
        writer.write(&mut rom, &[0xAA; 255]).unwrap();
        assert_eq!(rom.write_count(), 0);
        writer.write(&mut rom, &[0xBB; 2]).unwrap();
        assert_eq!(rom.write_count(), 1);
        assert_eq!(rom.bytes()[254], 0xAA);
        assert_eq!(rom.bytes()[255], 0xBB);
        // The spilled byte is still buffered.
        assert_eq!(rom.bytes()[256], 0xFF);
        assert_eq!(writer.total_written(), 257);
    }

    #[test]
    fn end_pads_trailing_block() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        writer.begin();
        writer.write(&mut rom, &[0x11; 300]).unwrap();
        let total = writer.end(&mut rom).unwrap();
        assert_eq!(total, 300);
        assert_eq!(rom.write_count(), 2);
        assert!(rom.bytes()[..300].iter().all(|&b| b == 0x11));
        assert!(rom.bytes()[300..512].iter().all(|&b| b == PAD_BYTE));
        assert!(!writer.is_active());
    }

    #[test]
    fn zero_length_writes_are_accepted() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        writer.begin();
        writer.write(&mut rom, &[]).unwrap();
        assert_eq!(writer.end(&mut rom).unwrap(), 0);
        assert_eq!(rom.write_count(), 0);
    }

    #[test]
    fn exact_block_multiple_needs_no_padding() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        writer.begin();
        writer.write(&mut rom, &[0x22; 512]).unwrap();
        assert_eq!(writer.end(&mut rom).unwrap(), 512);
        assert_eq!(rom.write_count(), 2);
    }

    #[test]
    fn backend_fault_latches() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        writer.begin();
        rom.set_fail_writes(true);
        assert_eq!(
            writer.write(&mut rom, &[0x33; 256]),
            Err(Error::RomWriteFailed)
        );
        assert!(writer.has_failed());
        rom.set_fail_writes(false);
        // Still failed until the next begin.
        assert_eq!(writer.write(&mut rom, &[1]), Err(Error::RomWriteFailed));
        assert_eq!(writer.end(&mut rom), Err(Error::RomWriteFailed));
        writer.begin();
        assert!(!writer.has_failed());
        writer.write(&mut rom, &[1]).unwrap();
        assert_eq!(writer.end(&mut rom).unwrap(), 1);
    }

    #[test]
    fn write_without_begin_is_rejected() {
        let mut rom = MemoryRom::<1024>::new();
        let mut writer = ImageWriter::new();
        assert_eq!(writer.write(&mut rom, &[1]), Err(Error::BadState));
        assert_eq!(writer.end(&mut rom), Err(Error::BadState));
    }
}
