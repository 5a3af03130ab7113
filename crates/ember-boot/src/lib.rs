// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Emberline Bootloader Core
//!
//! The top-level policy of the device at reset: either hand control to
//! a verified resident application, or stay in a networked
//! update-receiving state and stream a new image into program memory
//! such that the device is always bootable or cleanly failing.
//!
//! The crate is built around three pieces:
//!
//! - **Verify**: locate and check the application descriptor
//!   ([`appinfo`])
//! - **Write**: stream a downloaded image into ROM ([`writer`])
//! - **Decide**: the state machine and node-service reactor
//!   ([`Bootloader`])
//!
//! The host drives everything through [`Bootloader::poll`] from its
//! main loop; all work is synchronous within that call. The hard
//! invariant is that [`State::ReadyToBoot`] is only ever reported
//! after the resident image passed CRC verification.
//!
//! # Typical host loop
//!
//! ```ignore
//! let mut boot = Bootloader::new(rom, reset, REGION, system, config, &mut arena);
//! boot.add_node(&mut serial_node)?;
//! loop {
//!     if let Some(State::ReadyToBoot) = boot.poll(clock.uptime()) {
//!         platform_jump_to_application();
//!     }
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod appinfo;
pub mod protocol;
pub mod writer;

use heapless::Vec;

use ember_common::config::BootConfig;
use ember_common::crc::Crc64;
use ember_common::log::LogRing;
use ember_common::node::{Node, Reactor};
use ember_common::time::{Deadline, Micros, Millis};
use ember_common::types::{NodeId, ServiceId, SystemInfo, TransferId};
use ember_common::volatile::{Marshal, VolatileStorage};
use ember_common::{log_error, log_info, log_warn, Error, Result};
use ember_hal::{ResetControl, RomBackend};

use appinfo::{AppInfo, LocatedImage};
use protocol::{NodeHealth, NodeMode, MAX_PATH_LENGTH};
use writer::ImageWriter;

/// Bootloader state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// No valid resident image; waiting indefinitely for an update.
    NoAppToBoot = 0,
    /// Valid image found; waiting out the boot-delay window during
    /// which remote actors may cancel the boot to push an update.
    BootDelay = 1,
    /// Boot aborted by request; waiting for an update.
    BootCancelled = 2,
    /// A software update session is being served.
    AppUpgradeInProgress = 3,
    /// Image verified and committed to launch; the host performs the
    /// platform jump.
    ReadyToBoot = 4,
}

/// Node status snapshot, as published in heartbeats.
#[derive(Debug, Clone, Copy)]
pub struct NodeStatus {
    /// Bootloader uptime.
    pub uptime: Micros,
    /// Reported operating mode.
    pub mode: NodeMode,
    /// Reported health.
    pub health: NodeHealth,
    /// Vendor-specific status code: the state discriminant.
    pub vssc: u32,
}

/// Cross-reset hint instructing the next boot to resume an update from
/// the given file server without waiting for a new command.
#[derive(Debug, Clone)]
pub struct UpdateSeed {
    /// Node hosting the file server.
    pub server_node_id: NodeId,
    /// Image path on the server.
    pub path: Vec<u8, MAX_PATH_LENGTH>,
}

impl Marshal for UpdateSeed {
    const SIZE: usize = 3 + MAX_PATH_LENGTH;

    fn marshal(&self, out: &mut [u8]) {
        out.fill(0);
        out[..2].copy_from_slice(&self.server_node_id.to_le_bytes());
        out[2] = self.path.len() as u8;
        out[3..3 + self.path.len()].copy_from_slice(&self.path);
    }

    fn unmarshal(bytes: &[u8]) -> Option<Self> {
        let server_node_id = u16::from_le_bytes([bytes[0], bytes[1]]);
        let len = bytes[2] as usize;
        if len > MAX_PATH_LENGTH {
            return None;
        }
        let mut path = Vec::new();
        path.extend_from_slice(&bytes[3..3 + len]).ok()?;
        Some(Self {
            server_node_id,
            path,
        })
    }
}

/// Arena bytes required for the update seed record.
pub const SEED_STORAGE_SIZE: usize = UpdateSeed::SIZE + Crc64::SIZE;

struct Session {
    server_node_id: NodeId,
    node_index: usize,
    path: Vec<u8, MAX_PATH_LENGTH>,
    read_offset: u64,
    retries_left: u8,
    awaiting: Option<Deadline>,
}

/// The reactor half of the bootloader: everything except the transport
/// list, so transports can call back into it while being iterated.
struct Core<'a, R: RomBackend, C: ResetControl> {
    rom: R,
    reset: C,
    region_size: u32,
    system: SystemInfo,
    config: BootConfig,
    arena: &'a mut [u8],
    state: State,
    app: Option<LocatedImage>,
    session: Option<Session>,
    writer: ImageWriter,
    uptime: Micros,
    boot_deadline: Option<Deadline>,
    heartbeat_due: Micros,
    request_transfer_id: TransferId,
    heartbeat_transfer_id: TransferId,
    current_node_index: usize,
    cancel_node_request: Option<usize>,
    reset_pending: bool,
    log: LogRing,
}

impl<R: RomBackend, C: ResetControl> Core<'_, R, C> {
    fn node_mode(&self) -> NodeMode {
        match self.state {
            State::BootDelay | State::ReadyToBoot => NodeMode::Initialization,
            _ => NodeMode::SoftwareUpdate,
        }
    }

    fn node_health(&self) -> NodeHealth {
        match self.state {
            State::NoAppToBoot => NodeHealth::Warning,
            State::BootCancelled => NodeHealth::Caution,
            _ => NodeHealth::Nominal,
        }
    }

    /// Zero the resident descriptor's signature so a partially written
    /// image can never be mistaken for a valid one. First ROM write of
    /// every update session.
    fn invalidate_descriptor(&mut self) {
        if let Some(located) = appinfo::locate(&self.rom, self.region_size) {
            let zeros = [0u8; 8];
            if self.rom.write(located.descriptor_offset, &zeros).is_err() {
                log_warn!(
                    self.log,
                    self.uptime,
                    "session",
                    "descriptor invalidation write failed"
                );
            }
        }
    }

    fn begin_session(&mut self, server_node_id: NodeId, path: &[u8], node_index: usize) -> Result<()> {
        if self.state == State::ReadyToBoot {
            return Err(Error::BadState);
        }
        if path.len() > MAX_PATH_LENGTH {
            return Err(Error::PathTooLong);
        }
        self.abort_session();
        self.invalidate_descriptor();
        self.app = None;
        self.writer.begin();
        let mut stored_path = Vec::new();
        stored_path
            .extend_from_slice(path)
            .map_err(|()| Error::PathTooLong)?;
        self.session = Some(Session {
            server_node_id,
            node_index,
            path: stored_path,
            read_offset: 0,
            retries_left: self.config.max_read_retries,
            awaiting: None,
        });
        self.state = State::AppUpgradeInProgress;
        log_info!(
            self.log,
            self.uptime,
            "session",
            "update from node {} started",
            server_node_id
        );
        Ok(())
    }

    /// Drop the session without deciding the next state. Any in-flight
    /// request is cancelled on the owning node at the next poll.
    fn abort_session(&mut self) {
        if let Some(session) = self.session.take() {
            if session.awaiting.is_some() {
                self.cancel_node_request = Some(session.node_index);
            }
        }
        self.writer.abort();
    }

    fn fail_session(&mut self, error: Error) {
        self.abort_session();
        self.state = State::NoAppToBoot;
        log_error!(self.log, self.uptime, "session", "update failed: {}", error);
    }

    /// The final short read arrived: flush, verify, decide.
    fn finish_session(&mut self) {
        let total = match self.writer.end(&mut self.rom) {
            Ok(total) => total,
            Err(error) => {
                self.fail_session(error);
                return;
            }
        };
        self.session = None;
        self.app = appinfo::verify(&self.rom, self.region_size);
        if self.app.is_some() {
            // Hand off promptly: a zero-length boot delay.
            self.state = State::BootDelay;
            self.boot_deadline = Some(Deadline::after(self.uptime, Millis::ZERO));
            log_info!(
                self.log,
                self.uptime,
                "session",
                "received {} bytes, image verified",
                total
            );
        } else {
            self.state = State::NoAppToBoot;
            log_error!(
                self.log,
                self.uptime,
                "session",
                "received {} bytes: {}",
                total,
                Error::NoValidImage
            );
        }
    }

    fn handle_file_read_response(&mut self, payload: &[u8]) {
        if self.state != State::AppUpgradeInProgress {
            return;
        }
        {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.awaiting.take().is_none() {
                return; // Unsolicited; the node should have filtered it.
            }
        }
        let Some(response) = protocol::decode_file_read_response(payload) else {
            // Malformed response; the same read is reissued next poll.
            return;
        };
        if response.error != 0 {
            self.fail_session(Error::FileServerError);
            return;
        }
        if self.writer.write(&mut self.rom, response.data).is_err() {
            self.fail_session(Error::RomWriteFailed);
            return;
        }
        let complete = response.data.len() < self.config.read_chunk as usize;
        if let Some(session) = self.session.as_mut() {
            session.read_offset += response.data.len() as u64;
            session.retries_left = self.config.max_read_retries;
        }
        if complete {
            self.finish_session();
        }
    }

    fn execute_command(&mut self, command: u16, parameter: &[u8], client: NodeId) -> u8 {
        match command {
            protocol::COMMAND_BEGIN_SOFTWARE_UPDATE => {
                let node_index = self.current_node_index;
                match self.begin_session(client, parameter, node_index) {
                    Ok(()) => protocol::STATUS_SUCCESS,
                    Err(Error::PathTooLong) => protocol::STATUS_BAD_PARAMETER,
                    Err(_) => protocol::STATUS_BAD_STATE,
                }
            }
            protocol::COMMAND_EMERGENCY_STOP => {
                match self.state {
                    State::AppUpgradeInProgress => {
                        self.abort_session();
                        self.state = State::NoAppToBoot;
                        log_warn!(self.log, self.uptime, "command", "emergency stop");
                    }
                    State::BootDelay => {
                        self.state = State::BootCancelled;
                        log_info!(self.log, self.uptime, "command", "boot cancelled");
                    }
                    _ => {}
                }
                protocol::STATUS_SUCCESS
            }
            protocol::COMMAND_RESTART => {
                self.reset_pending = true;
                protocol::STATUS_SUCCESS
            }
            protocol::COMMAND_FACTORY_RESET => {
                // The bootloader owns no persistent configuration.
                log_info!(self.log, self.uptime, "command", "factory reset requested");
                protocol::STATUS_SUCCESS
            }
            _ => protocol::STATUS_BAD_COMMAND,
        }
    }

    /// Timer-driven transitions.
    fn advance(&mut self) {
        if self.state != State::BootDelay {
            return;
        }
        match self.boot_deadline {
            None => {
                self.boot_deadline = Some(Deadline::after(self.uptime, self.config.boot_delay));
            }
            Some(deadline) if deadline.is_expired(self.uptime) => {
                if self.app.is_some() {
                    self.state = State::ReadyToBoot;
                    log_info!(self.log, self.uptime, "boot", "boot delay elapsed");
                } else {
                    self.state = State::NoAppToBoot;
                }
            }
            Some(_) => {}
        }
    }

    /// Persist the resume hint for an interrupted session, so the next
    /// boot re-enters the update without a new command.
    fn persist_session_seed(&mut self) {
        if self.state != State::AppUpgradeInProgress {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let seed = UpdateSeed {
            server_node_id: session.server_node_id,
            path: session.path.clone(),
        };
        let mut storage = VolatileStorage::<UpdateSeed>::new(&mut self.arena[..]);
        if storage.store(&seed).is_err() {
            log_warn!(self.log, self.uptime, "boot", "seed arena too small");
        }
    }
}

impl<R: RomBackend, C: ResetControl> Reactor for Core<'_, R, C> {
    fn process_request(
        &mut self,
        service_id: ServiceId,
        client_node_id: NodeId,
        request: &[u8],
        response: &mut [u8],
    ) -> Option<usize> {
        match service_id {
            protocol::SERVICE_NODE_GET_INFO => protocol::encode_get_info_response(
                &self.system,
                self.app.as_ref().map(|located| &located.info),
                response,
            ),
            protocol::SERVICE_NODE_EXECUTE_COMMAND => {
                let status = match protocol::decode_execute_command_request(request) {
                    Some(command) => {
                        self.execute_command(command.command, command.parameter, client_node_id)
                    }
                    None => protocol::STATUS_BAD_PARAMETER,
                };
                Some(protocol::encode_execute_command_response(status, response))
            }
            _ => None,
        }
    }

    fn process_response(&mut self, payload: &[u8]) {
        self.handle_file_read_response(payload);
    }
}

/// Maximum number of registered transport nodes.
pub const MAX_NODES: usize = 4;

/// The bootloader top object. Owns the ROM backend, the reset control,
/// the volatile-storage arena and the registered transport nodes.
pub struct Bootloader<'a, R: RomBackend, C: ResetControl> {
    core: Core<'a, R, C>,
    nodes: Vec<&'a mut dyn Node, MAX_NODES>,
}

impl<'a, R: RomBackend, C: ResetControl> Bootloader<'a, R, C> {
    /// Construct the bootloader and make the entry decision.
    ///
    /// If `arena` holds a valid [`UpdateSeed`] it is consumed and the
    /// bootloader enters [`State::AppUpgradeInProgress`] against the
    /// first registered node. Otherwise the resident image is verified:
    /// valid goes to [`State::BootDelay`], anything else to
    /// [`State::NoAppToBoot`].
    ///
    /// `arena` is the RAM region preserved across soft resets; it must
    /// be at least [`SEED_STORAGE_SIZE`] bytes for update resumption to
    /// work.
    pub fn new(
        rom: R,
        reset: C,
        region_size: u32,
        system: SystemInfo,
        config: BootConfig,
        arena: &'a mut [u8],
    ) -> Self {
        let seed = VolatileStorage::<UpdateSeed>::new(&mut arena[..]).take();
        let mut core = Core {
            rom,
            reset,
            region_size,
            system,
            config,
            arena,
            state: State::NoAppToBoot,
            app: None,
            session: None,
            writer: ImageWriter::new(),
            uptime: Micros::ZERO,
            boot_deadline: None,
            heartbeat_due: Micros::ZERO,
            request_transfer_id: 0,
            heartbeat_transfer_id: 0,
            current_node_index: 0,
            cancel_node_request: None,
            reset_pending: false,
            log: LogRing::new(),
        };
        match seed {
            Some(seed) => {
                log_info!(
                    core.log,
                    core.uptime,
                    "boot",
                    "resuming update from node {}",
                    seed.server_node_id
                );
                // Seeded sessions run on the first registered node.
                let _ = core.begin_session(seed.server_node_id, &seed.path, 0);
            }
            None => {
                core.app = appinfo::verify(&core.rom, core.region_size);
                if core.app.is_some() {
                    core.state = State::BootDelay;
                    log_info!(core.log, core.uptime, "boot", "valid image found");
                } else {
                    core.state = State::NoAppToBoot;
                    log_warn!(core.log, core.uptime, "boot", "no valid image");
                }
            }
        }
        Self {
            core,
            nodes: Vec::new(),
        }
    }

    /// Register a transport node. Call before the first poll.
    pub fn add_node(&mut self, node: &'a mut dyn Node) -> Result<()> {
        self.nodes.push(node).map_err(|_| Error::BufferTooSmall)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.core.state
    }

    /// The verified resident descriptor, if discovery found one.
    #[must_use]
    pub fn app_info(&self) -> Option<&AppInfo> {
        self.core.app.as_ref().map(|located| &located.info)
    }

    /// Node status as published in heartbeats.
    #[must_use]
    pub fn node_status(&self) -> NodeStatus {
        NodeStatus {
            uptime: self.core.uptime,
            mode: self.core.node_mode(),
            health: self.core.node_health(),
            vssc: self.core.state as u32,
        }
    }

    /// Diagnostic log.
    #[must_use]
    pub fn log(&self) -> &LogRing {
        &self.core.log
    }

    /// Hold the boot: abort the boot-delay window and wait for an
    /// update instead.
    pub fn cancel_boot(&mut self) {
        if self.core.state == State::BootDelay {
            self.core.state = State::BootCancelled;
            log_info!(
                self.core.log,
                self.core.uptime,
                "boot",
                "boot held by host"
            );
        }
    }

    /// Host-initiated software update, equivalent to receiving a
    /// begin-update command on `node_index`.
    pub fn trigger_update(
        &mut self,
        node_index: usize,
        server_node_id: NodeId,
        path: &[u8],
    ) -> Result<()> {
        if node_index >= self.nodes.len() {
            return Err(Error::BadState);
        }
        self.core.begin_session(server_node_id, path, node_index)
    }

    /// Make progress. Call from the main loop or a periodic timer.
    ///
    /// Returns the final state when one is reached:
    /// [`State::ReadyToBoot`] means the caller performs the platform
    /// jump; [`State::NoAppToBoot`] means the caller may keep polling
    /// indefinitely waiting for an update.
    pub fn poll(&mut self, uptime: Micros) -> Option<State> {
        self.core.uptime = uptime;

        for (index, node) in self.nodes.iter_mut().enumerate() {
            self.core.current_node_index = index;
            node.poll(&mut self.core, uptime);
        }

        // Cancellation deferred from reactor context.
        if let Some(index) = self.core.cancel_node_request.take() {
            if let Some(node) = self.nodes.get_mut(index) {
                node.cancel_request();
            }
        }

        self.pump_file_reads(uptime);
        self.core.advance();
        self.publish_heartbeat(uptime);

        if self.core.reset_pending {
            self.core.reset_pending = false;
            self.core.persist_session_seed();
            log_info!(self.core.log, uptime, "boot", "restart requested");
            self.core.reset.request_reset();
        }

        match self.core.state {
            State::ReadyToBoot => Some(State::ReadyToBoot),
            State::NoAppToBoot => Some(State::NoAppToBoot),
            _ => None,
        }
    }

    /// Drive the image pull loop: stall detection, retries, and the
    /// next read request. At most one request is outstanding per node.
    fn pump_file_reads(&mut self, uptime: Micros) {
        if self.core.state != State::AppUpgradeInProgress {
            return;
        }

        let mut stalled_out = false;
        if let Some(session) = self.core.session.as_mut() {
            if let Some(deadline) = session.awaiting {
                if deadline.is_expired(uptime) {
                    if let Some(node) = self.nodes.get_mut(session.node_index) {
                        node.cancel_request();
                    }
                    session.awaiting = None;
                    if session.retries_left == 0 {
                        stalled_out = true;
                    } else {
                        session.retries_left -= 1;
                        log_warn!(
                            self.core.log,
                            uptime,
                            "session",
                            "read timed out, retrying"
                        );
                    }
                }
            }
        }
        if stalled_out {
            self.core.fail_session(Error::UpdateStalled);
            return;
        }

        let mut sent = false;
        let mut transfer_id = 0;
        if let Some(session) = self.core.session.as_ref() {
            if session.awaiting.is_none() {
                let mut request = [0u8; protocol::FILE_READ_REQUEST_MAX];
                if let Some(len) =
                    protocol::encode_file_read_request(session.read_offset, &session.path, &mut request)
                {
                    transfer_id = self.core.request_transfer_id;
                    if let Some(node) = self.nodes.get_mut(session.node_index) {
                        sent = node.send_request(
                            protocol::SERVICE_FILE_READ,
                            session.server_node_id,
                            transfer_id,
                            &request[..len],
                        );
                    }
                }
            }
        }
        if sent {
            self.core.request_transfer_id = transfer_id + 1;
            let timeout = self.core.config.request_timeout;
            if let Some(session) = self.core.session.as_mut() {
                session.awaiting = Some(Deadline::after(uptime, timeout));
            }
        }
        // A refused send is retried on the next poll.
    }

    /// Publish the node heartbeat at 1 Hz on every registered node.
    fn publish_heartbeat(&mut self, uptime: Micros) {
        if uptime < self.core.heartbeat_due {
            return;
        }
        let heartbeat = protocol::encode_heartbeat(
            uptime.as_secs(),
            self.core.node_health(),
            self.core.node_mode(),
            self.core.state as u32,
        );
        let transfer_id = self.core.heartbeat_transfer_id;
        for node in self.nodes.iter_mut() {
            let _ = node.publish_message(protocol::SUBJECT_NODE_HEARTBEAT, transfer_id, &heartbeat);
        }
        self.core.heartbeat_transfer_id = transfer_id + 1;
        self.core.heartbeat_due = uptime + 1_000_000;
    }
}
