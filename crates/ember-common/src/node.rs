// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! The transport seam: the capability set every transport node offers
//! to the bootloader core, and the reactor surface the core offers back.
//!
//! A node is polled by the core; during the same synchronous call it
//! delivers completed transfers back into the core through the
//! [`Reactor`] it was handed. There is no cycle between the two: the
//! node never stores the reactor reference.

use crate::time::Micros;
use crate::types::{NodeId, ServiceId, SubjectId, TransferId};

/// The largest serialized representation of any standard message or
/// service object exchanged by the bootloader. Sized by the node-info
/// response, the biggest of the set.
pub const MAX_SERIALIZED_SIZE: usize = 313;

/// The bootloader core as seen by a transport node.
pub trait Reactor {
    /// Handle a service request addressed to the local node.
    ///
    /// The serialized response is written into `response`; the returned
    /// value is its length. `None` means the service is not provided
    /// and no response is sent.
    fn process_request(
        &mut self,
        service_id: ServiceId,
        client_node_id: NodeId,
        request: &[u8],
        response: &mut [u8],
    ) -> Option<usize>;

    /// Handle the response to the pending request previously sent via
    /// [`Node::send_request`]. The node has already matched service id,
    /// server, destination and transfer-id.
    fn process_response(&mut self, payload: &[u8]);
}

/// A transport node: one network attachment of the bootloader.
///
/// A node holds at most one outstanding request at a time; the reactor
/// guarantees it never issues a second one while the slot is occupied.
pub trait Node {
    /// Make non-blocking progress: drain inbound bytes, deliver
    /// completed transfers to `reactor`, emit pending outbound frames.
    fn poll(&mut self, reactor: &mut dyn Reactor, uptime: Micros);

    /// Send a service request to `server_node_id` and arm the pending
    /// slot for the matching response. Returns false if the transport
    /// refused the frame or the node has no local address yet.
    fn send_request(
        &mut self,
        service_id: ServiceId,
        server_node_id: NodeId,
        transfer_id: TransferId,
        payload: &[u8],
    ) -> bool;

    /// Clear the pending-request slot; a late response is then ignored.
    fn cancel_request(&mut self);

    /// Publish a message transfer on the given subject.
    fn publish_message(
        &mut self,
        subject_id: SubjectId,
        transfer_id: TransferId,
        payload: &[u8],
    ) -> bool;

    /// The local node address, if one is assigned.
    fn local_node_id(&self) -> Option<NodeId>;
}
