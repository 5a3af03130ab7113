// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Frame emitter.
//!
//! Streams one transfer through the escape and CRC pipeline without
//! intermediate buffering. Every byte goes to the supplied sink; if the
//! sink refuses a byte the frame is abandoned and the function reports
//! failure. The peer discards the partial frame at its next delimiter.

use ember_common::crc::Crc32c;

use crate::frame::{
    Metadata, ESCAPE_PREFIX, FRAME_DELIMITER, FRAME_FORMAT_VERSION, FRAME_INDEX_EOT,
};

struct EscapedSink<'a, F> {
    send: &'a mut F,
    crc: Crc32c,
}

impl<F: FnMut(u8) -> bool> EscapedSink<'_, F> {
    fn put(&mut self, byte: u8) -> bool {
        self.crc.update(byte);
        if byte == FRAME_DELIMITER || byte == ESCAPE_PREFIX {
            (self.send)(ESCAPE_PREFIX) && (self.send)(!byte)
        } else {
            (self.send)(byte)
        }
    }

    fn put_u16(&mut self, value: u16) -> bool {
        let bytes = value.to_le_bytes();
        self.put(bytes[0]) && self.put(bytes[1])
    }

    fn put_u64(&mut self, value: u64) -> bool {
        value.to_le_bytes().iter().all(|&b| self.put(b))
    }

    fn put_crc(&mut self) -> bool {
        let trailer = self.crc.bytes();
        trailer.iter().all(|&b| self.put(b))
    }
}

/// Emit one complete transfer. `send_byte` reflects the serial port
/// send contract: true if the byte was accepted.
pub fn transmit<F: FnMut(u8) -> bool>(
    mut send_byte: F,
    meta: &Metadata,
    payload: &[u8],
) -> bool {
    if !send_byte(FRAME_DELIMITER) {
        return false;
    }
    let mut sink = EscapedSink {
        send: &mut send_byte,
        crc: Crc32c::new(),
    };
    let mut ok = sink.put(FRAME_FORMAT_VERSION)
        && sink.put(meta.priority)
        && sink.put_u16(meta.source)
        && sink.put_u16(meta.destination)
        && sink.put_u16(meta.data_spec);
    for _ in 0..8 {
        ok = ok && sink.put(0); // Reserved field.
    }
    ok = ok && sink.put_u64(meta.transfer_id);
    for b in FRAME_INDEX_EOT {
        ok = ok && sink.put(b);
    }
    ok = ok && sink.put_crc();
    sink.crc = Crc32c::new();
    for &b in payload {
        ok = ok && sink.put(b);
    }
    ok = ok && sink.put_crc();
    drop(sink);
    ok && send_byte(FRAME_DELIMITER)
}
