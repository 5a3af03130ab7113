// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Cyclic redundancy checks used by the bootloader.
//!
//! Two algorithms are carried:
//!
//! - [`Crc64`] — CRC-64-WE, protecting the application image and the
//!   volatile-storage record. Non-reflected, MSB-first.
//! - [`Crc32c`] — CRC-32C (Castagnoli), protecting serial frame headers
//!   and payloads. Reflected, LSB-first.
//!
//! Both are bitwise implementations without lookup tables; the bootloader
//! runs from a few KiB of flash and the throughput requirement is a
//! handful of KiB per boot.
//!
//! Each engine supports a residue self-check: after ingesting a correct
//! message *including* its CRC trailer, the internal register holds a
//! fixed constant. The frame parser relies on this to validate streams
//! without buffering the trailer separately.

/// CRC-64-WE. Check value for `"123456789"` is `0x62EC_59E3_F1A4_F00A`.
#[derive(Debug, Clone, Copy)]
pub struct Crc64 {
    value: u64,
}

impl Crc64 {
    /// Size of the serialized CRC in bytes.
    pub const SIZE: usize = 8;

    const POLY: u64 = 0x42F0_E1EB_A9EA_3693;
    const XOR: u64 = 0xFFFF_FFFF_FFFF_FFFF;
    const RESIDUE: u64 = 0xFCAC_BEBD_5931_A992;

    /// Create a fresh engine.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: Self::XOR }
    }

    /// Feed a single byte.
    pub fn update(&mut self, byte: u8) {
        self.value ^= u64::from(byte) << 56;
        for _ in 0..8 {
            self.value = if self.value & (1 << 63) != 0 {
                (self.value << 1) ^ Self::POLY
            } else {
                self.value << 1
            };
        }
    }

    /// Feed a slice of bytes.
    pub fn add(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// Current CRC value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.value ^ Self::XOR
    }

    /// Current CRC value as big-endian bytes, the order in which the
    /// trailer is laid out in storage and on the wire.
    #[must_use]
    pub const fn bytes(&self) -> [u8; Self::SIZE] {
        self.get().to_be_bytes()
    }

    /// True if the register holds the residue of a correct message,
    /// i.e. the big-endian CRC trailer has just been ingested.
    #[must_use]
    pub const fn is_residue_correct(&self) -> bool {
        self.value == Self::RESIDUE
    }
}

impl Default for Crc64 {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32C (Castagnoli), reflected.
#[derive(Debug, Clone, Copy)]
pub struct Crc32c {
    value: u32,
}

impl Crc32c {
    /// Size of the serialized CRC in bytes.
    pub const SIZE: usize = 4;

    const REFLECTED_POLY: u32 = 0x82F6_3B78;
    const XOR: u32 = 0xFFFF_FFFF;
    const RESIDUE: u32 = 0xB798_B438;

    /// Create a fresh engine.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: Self::XOR }
    }

    /// Feed a single byte.
    pub fn update(&mut self, byte: u8) {
        self.value ^= u32::from(byte);
        for _ in 0..8 {
            self.value = if self.value & 1 != 0 {
                (self.value >> 1) ^ Self::REFLECTED_POLY
            } else {
                self.value >> 1
            };
        }
    }

    /// Feed a slice of bytes.
    pub fn add(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// Current CRC value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.value ^ Self::XOR
    }

    /// Current CRC value as little-endian bytes, the wire trailer order.
    #[must_use]
    pub const fn bytes(&self) -> [u8; Self::SIZE] {
        self.get().to_le_bytes()
    }

    /// True if the register holds the residue of a correct message,
    /// i.e. the little-endian CRC trailer has just been ingested.
    #[must_use]
    pub const fn is_residue_correct(&self) -> bool {
        self.value == Self::RESIDUE
    }
}

impl Default for Crc32c {
    fn default() -> Self {
        Self::new()
    }
}
