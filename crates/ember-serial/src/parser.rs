// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Stream parser extracting transfers from a raw byte stream.
//!
//! The parser is self-synchronizing: any malformed frame is discarded
//! silently and the next delimiter starts a fresh frame. Memory is one
//! fixed buffer of `MAX_PAYLOAD_SIZE + 4` bytes; the trailing payload
//! CRC is validated through the residue check on the closing delimiter,
//! so the payload never needs to be sized in advance.

use ember_common::crc::Crc32c;
use ember_common::node::MAX_SERIALIZED_SIZE;

use crate::frame::{
    Metadata, Transfer, ESCAPE_PREFIX, FRAME_DELIMITER, FRAME_FORMAT_VERSION, FRAME_INDEX_EOT,
    HEADER_SIZE,
};

/// Largest payload the parser accepts.
pub const MAX_PAYLOAD_SIZE: usize = MAX_SERIALIZED_SIZE;

const BUFFER_SIZE: usize = MAX_PAYLOAD_SIZE + Crc32c::SIZE;

/// Byte-at-a-time frame parser.
pub struct StreamParser {
    inside: bool,
    unescape: bool,
    /// Bytes accepted in the current frame, header included.
    offset: usize,
    crc: Crc32c,
    meta: Metadata,
    buf: [u8; BUFFER_SIZE],
}

impl StreamParser {
    /// Create a parser in the idle (outside-frame) state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inside: false,
            unescape: false,
            offset: 0,
            crc: Crc32c::new(),
            meta: Metadata {
                priority: 0,
                source: 0,
                destination: 0,
                data_spec: 0,
                transfer_id: 0,
            },
            buf: [0; BUFFER_SIZE],
        }
    }

    /// Drop any partially received frame and return to the idle state.
    /// Call when the communication channel is reinitialized.
    pub fn reset(&mut self) {
        self.inside = false;
        self.restart();
    }

    /// Feed one byte from the stream. If this byte completed a
    /// transfer, it is returned; its payload borrows the parser buffer
    /// and must be consumed (or copied) before the next update.
    pub fn update(&mut self, stream_byte: u8) -> Option<Transfer<'_>> {
        if stream_byte == FRAME_DELIMITER {
            let finished = self.inside
                && self.offset >= HEADER_SIZE + Crc32c::SIZE
                && self.crc.is_residue_correct();
            let meta = self.meta;
            let payload_len = self.offset.saturating_sub(HEADER_SIZE + Crc32c::SIZE);
            self.restart();
            self.inside = true;
            return finished.then(|| Transfer {
                meta,
                payload: &self.buf[..payload_len],
            });
        }
        if !self.inside {
            return None; // Inter-frame noise, drop.
        }
        if stream_byte == ESCAPE_PREFIX {
            if self.unescape {
                // Double escape cannot occur in a well-formed stream.
                self.inside = false;
            } else {
                self.unescape = true;
            }
            return None;
        }
        let byte = if self.unescape {
            !stream_byte
        } else {
            stream_byte
        };
        self.unescape = false;
        self.crc.update(byte);
        if self.offset < HEADER_SIZE {
            self.accept_header_byte(byte);
        } else {
            let index = self.offset - HEADER_SIZE;
            if index >= BUFFER_SIZE {
                self.inside = false; // Payload overflow.
                return None;
            }
            self.buf[index] = byte;
        }
        self.offset += 1;
        None
    }

    fn restart(&mut self) {
        self.offset = 0;
        self.unescape = false;
        self.crc = Crc32c::new();
        // Accumulator starts zeroed; anonymous addresses arrive as
        // literal 0xFFFF wire bytes.
        self.meta = Metadata {
            priority: 0,
            source: 0,
            destination: 0,
            data_spec: 0,
            transfer_id: 0,
        };
    }

    fn accept_header_byte(&mut self, byte: u8) {
        match self.offset {
            0 => {
                if byte != FRAME_FORMAT_VERSION {
                    self.inside = false;
                }
            }
            1 => self.meta.priority = byte,
            2..=3 => self.meta.source |= u16::from(byte) << (8 * (self.offset - 2)),
            4..=5 => self.meta.destination |= u16::from(byte) << (8 * (self.offset - 4)),
            6..=7 => self.meta.data_spec |= u16::from(byte) << (8 * (self.offset - 6)),
            8..=15 => {} // Reserved, ignored.
            16..=23 => self.meta.transfer_id |= u64::from(byte) << (8 * (self.offset - 16)),
            24..=27 => {
                if FRAME_INDEX_EOT[self.offset - 24] != byte {
                    self.inside = false; // Multi-frame transfers unsupported.
                }
            }
            _ => {} // Header CRC bytes, consumed by the running CRC.
        }
        if self.offset == HEADER_SIZE - 1 && self.inside {
            if self.crc.is_residue_correct() {
                // Header proven correct; restart the CRC for the payload.
                self.crc = Crc32c::new();
            } else {
                self.inside = false;
            }
        }
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}
