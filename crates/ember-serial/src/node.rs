// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! The serial transport node.
//!
//! Bridges a platform [`SerialPort`] to the bootloader core: inbound
//! bytes run through the stream parser and completed transfers are
//! dispatched to the reactor during the same poll; service responses
//! are emitted straight back out of a stack scratch buffer.

use ember_common::node::{Node, Reactor, MAX_SERIALIZED_SIZE};
use ember_common::time::Micros;
use ember_common::types::{NodeId, ServiceId, SubjectId, TransferId};
use ember_hal::SerialPort;

use crate::emit::transmit;
use crate::frame::{Metadata, Transfer};
use crate::parser::StreamParser;

/// Upper bound on bytes consumed from the port per poll, so one poll
/// cannot monopolize the loop on a saturated link.
pub const MAX_BYTES_PER_POLL: usize = MAX_SERIALIZED_SIZE * 3;

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    server_node_id: NodeId,
    service_id: ServiceId,
    transfer_id: TransferId,
}

/// Transport node implementing the UAVCAN/serial wire format over a
/// platform byte port.
pub struct SerialNode<P: SerialPort> {
    port: P,
    parser: StreamParser,
    local_node_id: Option<NodeId>,
    pending: Option<PendingRequest>,
}

impl<P: SerialPort> SerialNode<P> {
    /// Create a node without a local address. Requests and
    /// publications are refused until one is assigned.
    pub fn new(port: P) -> Self {
        Self {
            port,
            parser: StreamParser::new(),
            local_node_id: None,
            pending: None,
        }
    }

    /// Create a node with a local address.
    pub fn with_node_id(port: P, node_id: NodeId) -> Self {
        let mut node = Self::new(port);
        node.local_node_id = Some(node_id);
        node
    }

    /// Assign or clear the local node address.
    pub fn set_local_node_id(&mut self, node_id: Option<NodeId>) {
        self.local_node_id = node_id;
    }

    /// Drop any partially received frame. Call when the communication
    /// channel is reinitialized.
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    /// Access the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    // Associated function so the parser borrow held by `transfer` stays
    // disjoint from the port and pending-slot borrows.
    fn handle_transfer(
        port: &mut P,
        pending: &mut Option<PendingRequest>,
        local_node_id: Option<NodeId>,
        reactor: &mut dyn Reactor,
        transfer: &Transfer<'_>,
    ) {
        if let Some(service_id) = transfer.meta.service_response() {
            let matches = match (&*pending, local_node_id) {
                (Some(p), Some(local)) => {
                    p.service_id == service_id
                        && p.server_node_id == transfer.meta.source
                        && p.transfer_id == transfer.meta.transfer_id
                        && transfer.meta.destination == local
                }
                _ => false,
            };
            if matches {
                *pending = None;
                reactor.process_response(transfer.payload);
            }
        } else if let Some(service_id) = transfer.meta.service_request() {
            let Some(local) = local_node_id else { return };
            if transfer.meta.destination != local {
                return;
            }
            let mut scratch = [0u8; MAX_SERIALIZED_SIZE];
            if let Some(len) =
                reactor.process_request(service_id, transfer.meta.source, transfer.payload, &mut scratch)
            {
                let mut meta =
                    Metadata::for_response(service_id, local, transfer.meta.source, transfer.meta.transfer_id);
                meta.priority = transfer.meta.priority;
                // Backpressure means the client retries; nothing to do here.
                let _ = transmit(|b| port.send(b), &meta, &scratch[..len]);
            }
        }
        // Message transfers: the bootloader subscribes to no subjects.
    }
}

impl<P: SerialPort> Node for SerialNode<P> {
    fn poll(&mut self, reactor: &mut dyn Reactor, _uptime: Micros) {
        for _ in 0..MAX_BYTES_PER_POLL {
            let Some(byte) = self.port.receive() else {
                break;
            };
            if let Some(transfer) = self.parser.update(byte) {
                Self::handle_transfer(
                    &mut self.port,
                    &mut self.pending,
                    self.local_node_id,
                    reactor,
                    &transfer,
                );
            }
        }
    }

    fn send_request(
        &mut self,
        service_id: ServiceId,
        server_node_id: NodeId,
        transfer_id: TransferId,
        payload: &[u8],
    ) -> bool {
        let Some(local) = self.local_node_id else {
            return false;
        };
        let meta = Metadata::for_request(service_id, local, server_node_id, transfer_id);
        if transmit(|b| self.port.send(b), &meta, payload) {
            self.pending = Some(PendingRequest {
                server_node_id,
                service_id,
                transfer_id,
            });
            true
        } else {
            false
        }
    }

    fn cancel_request(&mut self) {
        self.pending = None;
    }

    fn publish_message(
        &mut self,
        subject_id: SubjectId,
        transfer_id: TransferId,
        payload: &[u8],
    ) -> bool {
        let Some(local) = self.local_node_id else {
            return false;
        };
        let meta = Metadata::for_message(subject_id, local, transfer_id);
        transmit(|b| self.port.send(b), &meta, payload)
    }

    fn local_node_id(&self) -> Option<NodeId> {
        self.local_node_id
    }
}
