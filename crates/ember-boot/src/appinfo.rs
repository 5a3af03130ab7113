// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Application descriptor location and verification.
//!
//! The application carries a fixed 32-byte descriptor embedded at an
//! 8-byte-aligned offset, stamped by the build tooling after linking:
//!
//! ```text
//! Off  Size  Field
//! 0    8     Signature, literal ASCII "APDesc00"
//! 8    8     Image CRC-64-WE, computed with this field zeroed
//! 16   4     Image size in bytes, multiple of 8
//! 20   4     VCS revision (opaque)
//! 24   1     Version major
//! 25   1     Version minor
//! 26   1     Flags: bit 0 release, bit 1 dirty
//! 27   1     Reserved, 0xFF
//! 28   4     Build timestamp, seconds since 1970-01-01 UTC
//! ```
//!
//! Multi-byte fields are little-endian. Verification recomputes the
//! image CRC over `[0, image_size)` with the stored-CRC bytes treated
//! as zero; a mismatch means there is no bootable application.

use ember_common::crc::Crc64;
use ember_hal::RomBackend;

/// Descriptor signature.
pub const SIGNATURE: [u8; 8] = *b"APDesc00";

/// Descriptor length in bytes.
pub const DESCRIPTOR_SIZE: usize = 32;

/// Descriptors sit at offsets aligned to this many bytes.
pub const DESCRIPTOR_ALIGNMENT: u32 = 8;

/// Chunk size for streaming the image through the CRC.
const VERIFY_CHUNK: usize = 256;

/// Decoded application descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppInfo {
    /// CRC-64-WE over the whole image with the CRC field zeroed.
    pub image_crc: u64,
    /// Total image length in bytes.
    pub image_size: u32,
    /// Opaque VCS revision tag.
    pub vcs_revision: u32,
    /// Software version major component.
    pub version_major: u8,
    /// Software version minor component.
    pub version_minor: u8,
    /// Flag bits.
    pub flags: u8,
    /// Build timestamp, seconds since the UNIX epoch.
    pub build_timestamp_utc: u32,
}

impl AppInfo {
    /// Flag: release build.
    pub const FLAG_RELEASE: u8 = 1 << 0;
    /// Flag: built from a dirty working tree.
    pub const FLAG_DIRTY: u8 = 1 << 1;

    /// Whether the image is a release build.
    #[must_use]
    pub const fn is_release(&self) -> bool {
        self.flags & Self::FLAG_RELEASE != 0
    }

    /// Whether the image was built from uncommitted sources.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.flags & Self::FLAG_DIRTY != 0
    }

    /// Decode a raw descriptor. Only the signature is checked here;
    /// size constraints depend on where the descriptor was found.
    #[must_use]
    pub fn parse(raw: &[u8; DESCRIPTOR_SIZE]) -> Option<Self> {
        if raw[..8] != SIGNATURE {
            return None;
        }
        let mut crc = [0u8; 8];
        crc.copy_from_slice(&raw[8..16]);
        let mut size = [0u8; 4];
        size.copy_from_slice(&raw[16..20]);
        let mut vcs = [0u8; 4];
        vcs.copy_from_slice(&raw[20..24]);
        let mut stamp = [0u8; 4];
        stamp.copy_from_slice(&raw[28..32]);
        Some(Self {
            image_crc: u64::from_le_bytes(crc),
            image_size: u32::from_le_bytes(size),
            vcs_revision: u32::from_le_bytes(vcs),
            version_major: raw[24],
            version_minor: raw[25],
            flags: raw[26],
            build_timestamp_utc: u32::from_le_bytes(stamp),
        })
    }
}

/// A descriptor found in ROM, with its location.
#[derive(Debug, Clone, Copy)]
pub struct LocatedImage {
    /// Image-relative offset of the descriptor.
    pub descriptor_offset: u32,
    /// Decoded descriptor fields.
    pub info: AppInfo,
}

/// Scan the image region for the first self-consistent descriptor.
///
/// A candidate must carry the signature, an image size that is a
/// multiple of eight, covers the descriptor itself and fits the region.
/// The reserved byte is not constrained.
pub fn locate<R: RomBackend>(rom: &R, region_size: u32) -> Option<LocatedImage> {
    let mut offset = 0u32;
    while offset + DESCRIPTOR_SIZE as u32 <= region_size {
        let mut raw = [0u8; DESCRIPTOR_SIZE];
        if rom.read(offset, &mut raw).is_err() {
            return None;
        }
        if let Some(info) = AppInfo::parse(&raw) {
            let plausible = info.image_size % 8 == 0
                && info.image_size >= offset + DESCRIPTOR_SIZE as u32
                && info.image_size <= region_size;
            if plausible {
                return Some(LocatedImage {
                    descriptor_offset: offset,
                    info,
                });
            }
        }
        offset += DESCRIPTOR_ALIGNMENT;
    }
    None
}

/// Locate and fully verify the resident image.
///
/// Returns the located descriptor only if the recomputed CRC-64-WE over
/// `[0, image_size)`, with the stored CRC masked to zero, matches the
/// stored value. Any ROM read failure reads as "no valid image".
pub fn verify<R: RomBackend>(rom: &R, region_size: u32) -> Option<LocatedImage> {
    let located = locate(rom, region_size)?;
    let crc_field = located.descriptor_offset + 8;
    let mut crc = Crc64::new();
    let mut buf = [0u8; VERIFY_CHUNK];
    let mut offset = 0u32;
    while offset < located.info.image_size {
        let n = (located.info.image_size - offset).min(VERIFY_CHUNK as u32) as usize;
        if rom.read(offset, &mut buf[..n]).is_err() {
            return None;
        }
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            let position = offset + i as u32;
            if position >= crc_field && position < crc_field + 8 {
                *byte = 0;
            }
        }
        crc.add(&buf[..n]);
        offset += n as u32;
    }
    (crc.get() == located.info.image_crc).then_some(located)
}
