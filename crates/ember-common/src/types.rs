// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Fundamental identifier types of the node protocol.
//!
//! Node ids are 16-bit across all supported transports; a narrower
//! transport would map at its own edge.

/// Node address. `0xFFFF` is anonymous/broadcast.
pub type NodeId = u16;

/// Port identifier: a subject id or a service id, context-dependent.
pub type PortId = u16;

/// Service identifier (request/response exchanges).
pub type ServiceId = PortId;

/// Subject identifier (publish/subscribe topics).
pub type SubjectId = PortId;

/// Transfer-id counter distinguishing retransmissions and pairing
/// requests with responses.
pub type TransferId = u64;

/// The anonymous/broadcast node address.
pub const ANONYMOUS_NODE_ID: NodeId = 0xFFFF;

/// Identity of the device, supplied by the host platform and reported
/// through the standard node-info service.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    /// Globally unique 128-bit device identifier.
    pub unique_id: [u8; 16],
    /// Human-readable node name, e.g. `"io.emberline.boot"`.
    pub node_name: &'static str,
    /// Hardware version (major, minor).
    pub hardware_version: (u8, u8),
}
