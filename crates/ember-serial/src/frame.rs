// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Frame-level definitions of the UAVCAN/serial wire format.
//!
//! A frame is a delimited, byte-stuffed unit:
//!
//! ```text
//! 0x9E | 32-byte header | payload | payload CRC-32C | 0x9E
//! ```
//!
//! Within the frame, the bytes 0x9E and 0x8E are escaped as 0x8E
//! followed by the bitwise complement of the original byte.
//!
//! Header layout, little-endian multi-byte fields:
//!
//! ```text
//! Off  Size  Field
//! 0    1     Version, must be 0
//! 1    1     Priority, 0 (highest) .. 7 (lowest, default)
//! 2    2     Source node id, 0xFFFF = anonymous
//! 4    2     Destination node id, 0xFFFF = broadcast/anonymous
//! 6    2     Data specifier
//! 8    8     Reserved, zero on emit, ignored on receive
//! 16   8     Transfer id
//! 24   4     Frame index/EOT, must be {0, 0, 0, 0x80}
//! 28   4     Header CRC-32C over bytes 0..27
//! ```
//!
//! Only single-frame transfers are supported; the frame-index/EOT word
//! must be exactly the first-and-last literal.

use ember_common::types::{NodeId, PortId, ServiceId, SubjectId, TransferId, ANONYMOUS_NODE_ID};

/// Frame boundary byte.
pub const FRAME_DELIMITER: u8 = 0x9E;
/// Escape prefix byte.
pub const ESCAPE_PREFIX: u8 = 0x8E;
/// Header length in bytes.
pub const HEADER_SIZE: usize = 32;
/// The only supported frame format version.
pub const FRAME_FORMAT_VERSION: u8 = 0;
/// Frame-index/EOT literal of a single-frame transfer.
pub const FRAME_INDEX_EOT: [u8; 4] = [0, 0, 0, 0x80];
/// Lowest priority, the default.
pub const DEFAULT_PRIORITY: u8 = 7;

/// Data-specifier bit marking a service request.
pub const DATA_SPEC_REQUEST_MASK: PortId = 0x8000;
/// Data-specifier bits marking a service response.
pub const DATA_SPEC_RESPONSE_MASK: PortId = 0xC000;

/// Transfer metadata carried by the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Transfer priority, 0 (highest) to 7 (lowest).
    pub priority: u8,
    /// Source node id.
    pub source: NodeId,
    /// Destination node id.
    pub destination: NodeId,
    /// Data specifier: subject id, or service id tagged by the masks.
    pub data_spec: PortId,
    /// Transfer id.
    pub transfer_id: TransferId,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            source: ANONYMOUS_NODE_ID,
            destination: ANONYMOUS_NODE_ID,
            data_spec: 0,
            transfer_id: 0,
        }
    }
}

impl Metadata {
    /// Metadata of a service request transfer.
    #[must_use]
    pub fn for_request(
        service_id: ServiceId,
        source: NodeId,
        destination: NodeId,
        transfer_id: TransferId,
    ) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            source,
            destination,
            data_spec: service_id | DATA_SPEC_REQUEST_MASK,
            transfer_id,
        }
    }

    /// Metadata of a service response transfer.
    #[must_use]
    pub fn for_response(
        service_id: ServiceId,
        source: NodeId,
        destination: NodeId,
        transfer_id: TransferId,
    ) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            source,
            destination,
            data_spec: service_id | DATA_SPEC_RESPONSE_MASK,
            transfer_id,
        }
    }

    /// Metadata of a broadcast message transfer.
    #[must_use]
    pub fn for_message(subject_id: SubjectId, source: NodeId, transfer_id: TransferId) -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            source,
            destination: ANONYMOUS_NODE_ID,
            data_spec: subject_id,
            transfer_id,
        }
    }

    /// Decode the data specifier as a service request.
    #[must_use]
    pub fn service_request(&self) -> Option<ServiceId> {
        if self.data_spec & DATA_SPEC_RESPONSE_MASK == DATA_SPEC_REQUEST_MASK {
            Some(self.data_spec & !DATA_SPEC_REQUEST_MASK)
        } else {
            None
        }
    }

    /// Decode the data specifier as a service response.
    #[must_use]
    pub fn service_response(&self) -> Option<ServiceId> {
        if self.data_spec & DATA_SPEC_RESPONSE_MASK == DATA_SPEC_RESPONSE_MASK {
            Some(self.data_spec & !DATA_SPEC_RESPONSE_MASK)
        } else {
            None
        }
    }

    /// Decode the data specifier as a message subject.
    #[must_use]
    pub fn subject(&self) -> Option<SubjectId> {
        if self.data_spec & DATA_SPEC_REQUEST_MASK == 0 {
            Some(self.data_spec)
        } else {
            None
        }
    }
}

/// One received transfer. The payload borrows the parser's internal
/// buffer; copy it before feeding the parser further if it must be
/// retained.
#[derive(Debug, Clone, Copy)]
pub struct Transfer<'a> {
    /// Header metadata.
    pub meta: Metadata,
    /// Payload bytes, CRC stripped.
    pub payload: &'a [u8],
}
