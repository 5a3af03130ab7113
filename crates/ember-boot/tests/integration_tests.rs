// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! End-to-end scenarios for the bootloader core: boot decisions, the
//! full update flow over the serial transport, interruption handling,
//! and the single-outstanding-request discipline.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use ember_boot::appinfo::{AppInfo, SIGNATURE};
use ember_boot::protocol::{
    decode_execute_command_response, decode_file_read_request, encode_execute_command_request,
    encode_file_read_response,
    COMMAND_BEGIN_SOFTWARE_UPDATE, COMMAND_EMERGENCY_STOP, COMMAND_RESTART,
    SERVICE_FILE_READ, SERVICE_NODE_EXECUTE_COMMAND, SERVICE_NODE_GET_INFO,
    STATUS_BAD_COMMAND, STATUS_BAD_PARAMETER, STATUS_BAD_STATE, STATUS_SUCCESS,
    SUBJECT_NODE_HEARTBEAT,
};
use ember_boot::protocol::{NodeHealth, NodeMode};
use ember_boot::{Bootloader, State, SEED_STORAGE_SIZE};
use ember_common::config::BootConfig;
use ember_common::crc::Crc64;
use ember_common::node::{Node, Reactor};
use ember_common::time::{Micros, Millis};
use ember_common::types::{NodeId, ServiceId, SubjectId, SystemInfo, TransferId};
use ember_hal::sim::{LoopbackPort, MemoryRom, RecordingReset};
use ember_hal::{HalResult, RomBackend, SerialPort};
use ember_serial::{transmit, Metadata, SerialNode, StreamParser};

const REGION: u32 = 4096;
const LOCAL: NodeId = 42;
const SERVER: NodeId = 7;
const IMAGE_PATH: &[u8] = b"fw/app.img";

fn system() -> SystemInfo {
    SystemInfo {
        unique_id: [0x5A; 16],
        node_name: "io.emberline.boot",
        hardware_version: (2, 0),
    }
}

/// Build a valid image: descriptor at `descriptor_offset`, body filled
/// from `fill_seed`, correct CRC stamped into the descriptor.
fn make_image(size: usize, descriptor_offset: usize, fill_seed: u8) -> Vec<u8> {
    let mut image = vec![0u8; size];
    for (i, b) in image.iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(31).wrapping_add(fill_seed);
    }
    image[descriptor_offset..descriptor_offset + 8].copy_from_slice(&SIGNATURE);
    image[descriptor_offset + 8..descriptor_offset + 16].fill(0);
    image[descriptor_offset + 16..descriptor_offset + 20]
        .copy_from_slice(&(size as u32).to_le_bytes());
    image[descriptor_offset + 20..descriptor_offset + 24]
        .copy_from_slice(&0x0BAD_CAFEu32.to_le_bytes());
    image[descriptor_offset + 24] = 3;
    image[descriptor_offset + 25] = 1;
    image[descriptor_offset + 26] = AppInfo::FLAG_RELEASE;
    image[descriptor_offset + 27] = 0xFF;
    image[descriptor_offset + 28..descriptor_offset + 32]
        .copy_from_slice(&1_700_000_000u32.to_le_bytes());
    let mut crc = Crc64::new();
    crc.add(&image);
    image[descriptor_offset + 8..descriptor_offset + 16]
        .copy_from_slice(&crc.get().to_le_bytes());
    image
}

/// Serial port handle shared between the node under test and the
/// remote-peer harness.
#[derive(Clone)]
struct SharedPort(Rc<RefCell<LoopbackPort>>);

impl SharedPort {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(LoopbackPort::new())))
    }
}

impl SerialPort for SharedPort {
    fn receive(&mut self) -> Option<u8> {
        self.0.borrow_mut().receive()
    }

    fn send(&mut self, byte: u8) -> bool {
        self.0.borrow_mut().send(byte)
    }
}

fn emit_frame(meta: &Metadata, payload: &[u8]) -> Vec<u8> {
    let mut wire = Vec::new();
    assert!(transmit(
        |b| {
            wire.push(b);
            true
        },
        meta,
        payload
    ));
    wire
}

/// The remote peer: file server and command client rolled into one.
struct Remote {
    port: SharedPort,
    parser: StreamParser,
    image: Vec<u8>,
    serve_reads: bool,
    statuses: Vec<u8>,
    info_responses: Vec<Vec<u8>>,
    heartbeats: Vec<Vec<u8>>,
    reads_served: usize,
    next_transfer_id: TransferId,
}

impl Remote {
    fn new(port: SharedPort, image: Vec<u8>) -> Self {
        Self {
            port,
            parser: StreamParser::new(),
            image,
            serve_reads: true,
            statuses: Vec::new(),
            info_responses: Vec::new(),
            heartbeats: Vec::new(),
            reads_served: 0,
            next_transfer_id: 1,
        }
    }

    fn push(&mut self, wire: &[u8]) {
        assert!(self.port.0.borrow_mut().push_rx(wire));
    }

    fn send_command(&mut self, command: u16, parameter: &[u8]) {
        let mut buf = [0u8; 300];
        let len = encode_execute_command_request(command, parameter, &mut buf).unwrap();
        let meta = Metadata::for_request(
            SERVICE_NODE_EXECUTE_COMMAND,
            SERVER,
            LOCAL,
            self.next_transfer_id,
        );
        self.next_transfer_id += 1;
        let wire = emit_frame(&meta, &buf[..len]);
        self.push(&wire);
    }

    fn send_get_info(&mut self) {
        let meta =
            Metadata::for_request(SERVICE_NODE_GET_INFO, SERVER, LOCAL, self.next_transfer_id);
        self.next_transfer_id += 1;
        let wire = emit_frame(&meta, &[]);
        self.push(&wire);
    }

    /// Drain node output, record observations, answer file reads.
    fn service(&mut self) {
        let bytes: Vec<u8> = {
            let mut port = self.port.0.borrow_mut();
            std::iter::from_fn(|| port.pop_tx()).collect()
        };
        let mut transfers = Vec::new();
        for b in bytes {
            if let Some(transfer) = self.parser.update(b) {
                transfers.push((transfer.meta, transfer.payload.to_vec()));
            }
        }
        for (meta, payload) in transfers {
            self.handle(meta, &payload);
        }
    }

    fn handle(&mut self, meta: Metadata, payload: &[u8]) {
        if meta.service_response() == Some(SERVICE_NODE_EXECUTE_COMMAND) {
            self.statuses
                .push(decode_execute_command_response(payload).unwrap());
        } else if meta.service_response() == Some(SERVICE_NODE_GET_INFO) {
            self.info_responses.push(payload.to_vec());
        } else if meta.subject() == Some(SUBJECT_NODE_HEARTBEAT) {
            self.heartbeats.push(payload.to_vec());
        } else if meta.service_request() == Some(SERVICE_FILE_READ) && meta.destination == SERVER {
            if !self.serve_reads {
                return;
            }
            let request = decode_file_read_request(payload).unwrap();
            assert_eq!(request.path, IMAGE_PATH);
            let start = (request.offset as usize).min(self.image.len());
            let end = (start + 256).min(self.image.len());
            let mut buf = vec![0u8; 300];
            let len = encode_file_read_response(0, &self.image[start..end], &mut buf).unwrap();
            let response =
                Metadata::for_response(SERVICE_FILE_READ, SERVER, LOCAL, meta.transfer_id);
            let wire = emit_frame(&response, &buf[..len]);
            self.reads_served += 1;
            self.push(&wire);
        }
    }
}

mod boot_decisions {
    use super::*;

    #[test]
    fn happy_boot_waits_out_the_delay() {
        let image = make_image(1024, 0, 1);
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );

        assert_eq!(boot.state(), State::BootDelay);
        let info = boot.app_info().unwrap();
        assert_eq!(info.image_size, 1024);
        assert_eq!((info.version_major, info.version_minor), (3, 1));

        let status = boot.node_status();
        assert_eq!(status.mode, NodeMode::Initialization);
        assert_eq!(status.health, NodeHealth::Nominal);
        assert_eq!(status.vssc, State::BootDelay as u32);

        assert_eq!(boot.poll(Micros::new(10_000)), None);
        assert_eq!(boot.poll(Micros::new(1_900_000)), None);
        assert_eq!(boot.state(), State::BootDelay);
        assert_eq!(
            boot.poll(Micros::new(2_100_000)),
            Some(State::ReadyToBoot)
        );
        assert_eq!(boot.state(), State::ReadyToBoot);
    }

    #[test]
    fn empty_rom_reports_no_app_forever() {
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        assert_eq!(boot.state(), State::NoAppToBoot);
        assert!(boot.app_info().is_none());
        for step in 1..50u64 {
            assert_eq!(
                boot.poll(Micros::new(step * 1_000_000)),
                Some(State::NoAppToBoot)
            );
        }

        let status = boot.node_status();
        assert_eq!(status.mode, NodeMode::SoftwareUpdate);
        assert_eq!(status.health, NodeHealth::Warning);
        // The discovery failure is on record.
        assert!(!boot.log().is_empty());
    }

    #[test]
    fn corrupted_image_is_not_booted() {
        let mut image = make_image(1024, 0, 1);
        image[900] ^= 0x40;
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        assert_eq!(boot.state(), State::NoAppToBoot);
        assert_eq!(boot.poll(Micros::new(60_000_000)), Some(State::NoAppToBoot));
    }

    #[test]
    fn host_hold_cancels_boot() {
        let image = make_image(1024, 0, 1);
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.poll(Micros::new(10_000));
        boot.cancel_boot();
        assert_eq!(boot.state(), State::BootCancelled);
        // The delay expiring changes nothing once cancelled.
        assert_eq!(boot.poll(Micros::new(10_000_000)), None);
        assert_eq!(boot.state(), State::BootCancelled);
    }
}

mod serial_update {
    use super::*;

    /// Scenario: empty ROM, a remote node commands an update and serves
    /// the image over serial; the bootloader ends up ready to boot.
    #[test]
    fn cold_update_to_ready_to_boot() {
        let image = make_image(1024, 0, 7);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, image.clone());
        {
            let mut boot = Bootloader::new(
                &mut rom,
                &mut reset,
                REGION,
                system(),
                BootConfig::DEFAULT,
                &mut arena,
            );
            boot.add_node(&mut node).unwrap();
            assert_eq!(boot.state(), State::NoAppToBoot);

            remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);

            let mut outcome = None;
            for step in 1..200u64 {
                let result = boot.poll(Micros::new(step * 10_000));
                remote.service();
                if result == Some(State::ReadyToBoot) {
                    outcome = Some(step);
                    break;
                }
                if step == 1 {
                    assert_eq!(boot.state(), State::AppUpgradeInProgress);
                }
            }
            assert!(outcome.is_some(), "update never completed");
            assert_eq!(boot.app_info().unwrap().image_size, 1024);
        }
        assert_eq!(remote.statuses, vec![STATUS_SUCCESS]);
        // Four full chunks plus the final empty read.
        assert_eq!(remote.reads_served, 5);
        assert_eq!(&rom.bytes()[..1024], &image[..]);
        assert!(!reset.was_requested());
    }

    /// Scenario: power is lost mid-update. The next boot must not
    /// report ready-to-boot even though a valid image was resident
    /// before the update began.
    #[test]
    fn power_loss_mid_update_is_not_bootable() {
        let old_image = make_image(1024, 0, 1);
        let new_image = make_image(1024, 0, 99);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::with_image(&old_image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, new_image);
        {
            let mut boot = Bootloader::new(
                &mut rom,
                &mut reset,
                REGION,
                system(),
                BootConfig::DEFAULT,
                &mut arena,
            );
            boot.add_node(&mut node).unwrap();
            assert_eq!(boot.state(), State::BootDelay);

            remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);
            // Serve exactly two chunks, then the power goes out.
            for step in 1..20u64 {
                boot.poll(Micros::new(step * 10_000));
                remote.service();
                if remote.reads_served >= 2 {
                    break;
                }
            }
            assert_eq!(boot.state(), State::AppUpgradeInProgress);
        }

        // Reset: fresh bootloader over the same ROM.
        let mut reset2 = RecordingReset::new();
        let mut arena2 = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset2,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena2,
        );
        assert_eq!(boot.state(), State::NoAppToBoot);
        assert_eq!(boot.poll(Micros::new(10_000_000)), Some(State::NoAppToBoot));
    }

    /// Scenario: a commanded restart mid-update stores the resume hint;
    /// the next boot re-enters the update state without a new command.
    #[test]
    fn restart_mid_update_resumes_after_reset() {
        let image = make_image(1024, 0, 7);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared.clone(), image.clone());
        {
            let mut boot = Bootloader::new(
                &mut rom,
                &mut reset,
                REGION,
                system(),
                BootConfig::DEFAULT,
                &mut arena,
            );
            boot.add_node(&mut node).unwrap();
            remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);
            boot.poll(Micros::new(10_000));
            remote.service();
            assert_eq!(boot.state(), State::AppUpgradeInProgress);

            remote.send_command(COMMAND_RESTART, &[]);
            boot.poll(Micros::new(20_000));
        }
        assert!(reset.was_requested());

        // After the reset the seed is consumed and the update resumes
        // on the first registered node; the remote completes it.
        let mut node2 = SerialNode::with_node_id(shared, LOCAL);
        let mut reset2 = RecordingReset::new();
        {
            let mut boot = Bootloader::new(
                &mut rom,
                &mut reset2,
                REGION,
                system(),
                BootConfig::DEFAULT,
                &mut arena,
            );
            assert_eq!(boot.state(), State::AppUpgradeInProgress);
            boot.add_node(&mut node2).unwrap();
            let mut outcome = None;
            for step in 1..200u64 {
                let result = boot.poll(Micros::new(step * 10_000));
                remote.service();
                if result == Some(State::ReadyToBoot) {
                    outcome = Some(step);
                    break;
                }
            }
            assert!(outcome.is_some(), "resumed update never completed");
        }
        assert_eq!(&rom.bytes()[..1024], &image[..]);
    }

    /// An emergency stop during an update abandons the session; the
    /// device reports no bootable application.
    #[test]
    fn emergency_stop_aborts_update() {
        let image = make_image(1024, 0, 7);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, image);
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();
        remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);
        boot.poll(Micros::new(10_000));
        remote.service();
        assert_eq!(boot.state(), State::AppUpgradeInProgress);

        remote.send_command(COMMAND_EMERGENCY_STOP, &[]);
        assert_eq!(boot.poll(Micros::new(20_000)), Some(State::NoAppToBoot));
        remote.service();
        assert_eq!(remote.statuses, vec![STATUS_SUCCESS, STATUS_SUCCESS]);
    }

    /// A backend write fault is fatal for the session.
    #[test]
    fn write_fault_fails_the_session() {
        struct FlakyRom {
            inner: MemoryRom<4096>,
            writes_allowed: usize,
        }

        impl RomBackend for FlakyRom {
            fn read(&self, offset: u32, out: &mut [u8]) -> HalResult<()> {
                self.inner.read(offset, out)
            }

            fn write(&mut self, offset: u32, data: &[u8]) -> HalResult<()> {
                if self.writes_allowed == 0 {
                    return Err(ember_hal::HalError::WriteFault);
                }
                self.writes_allowed -= 1;
                self.inner.write(offset, data)
            }
        }

        let image = make_image(1024, 0, 7);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let rom = FlakyRom {
            inner: MemoryRom::new(),
            writes_allowed: 1,
        };
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, image);
        let mut boot = Bootloader::new(
            rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();
        remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);

        let mut failed_at = None;
        for step in 1..50u64 {
            let result = boot.poll(Micros::new(step * 10_000));
            remote.service();
            if result == Some(State::NoAppToBoot) {
                failed_at = Some(step);
                break;
            }
        }
        assert!(failed_at.is_some(), "write fault did not fail the session");
        // The first block was programmed, the second write faulted.
        assert!(remote.reads_served >= 2);
    }
}

mod services {
    use super::*;

    #[test]
    fn get_info_reports_resident_image() {
        let image = make_image(1024, 0, 1);
        let expected_crc = {
            let mut descriptor = [0u8; 8];
            descriptor.copy_from_slice(&image[8..16]);
            u64::from_le_bytes(descriptor)
        };
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, Vec::new());
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();

        remote.send_get_info();
        boot.poll(Micros::new(10_000));
        remote.service();

        assert_eq!(remote.info_responses.len(), 1);
        let info = &remote.info_responses[0];
        assert_eq!(&info[..2], &[1, 0]); // protocol version
        assert_eq!(&info[2..4], &[2, 0]); // hardware version
        assert_eq!(&info[4..6], &[3, 1]); // software version
        assert_eq!(&info[14..30], &[0x5A; 16]); // unique id
        let name_len = info[30] as usize;
        assert_eq!(&info[31..31 + name_len], b"io.emberline.boot");
        let crc_at = 31 + name_len;
        assert_eq!(info[crc_at], 1);
        let mut crc_bytes = [0u8; 8];
        crc_bytes.copy_from_slice(&info[crc_at + 1..crc_at + 9]);
        assert_eq!(u64::from_le_bytes(crc_bytes), expected_crc);
    }

    #[test]
    fn unknown_and_malformed_commands_get_error_statuses() {
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, Vec::new());
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();

        remote.send_command(1234, &[]);
        boot.poll(Micros::new(10_000));
        remote.service();
        assert_eq!(remote.statuses, vec![STATUS_BAD_COMMAND]);
        assert_eq!(boot.state(), State::NoAppToBoot);

        // A truncated request payload cannot be decoded.
        let meta = Metadata::for_request(SERVICE_NODE_EXECUTE_COMMAND, SERVER, LOCAL, 50);
        let wire = emit_frame(&meta, &[0xFF]);
        remote.push(&wire);
        boot.poll(Micros::new(20_000));
        remote.service();
        assert_eq!(
            remote.statuses,
            vec![STATUS_BAD_COMMAND, STATUS_BAD_PARAMETER]
        );
    }

    #[test]
    fn update_command_is_rejected_once_committed_to_boot() {
        let image = make_image(1024, 0, 1);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, Vec::new());
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();

        assert_eq!(boot.poll(Micros::new(3_000_000)), None);
        assert_eq!(boot.poll(Micros::new(6_000_000)), Some(State::ReadyToBoot));

        remote.send_command(COMMAND_BEGIN_SOFTWARE_UPDATE, IMAGE_PATH);
        boot.poll(Micros::new(6_010_000));
        remote.service();
        assert_eq!(remote.statuses, vec![STATUS_BAD_STATE]);
        assert_eq!(boot.state(), State::ReadyToBoot);
    }

    #[test]
    fn heartbeats_reflect_state_at_one_hertz() {
        let image = make_image(1024, 0, 1);
        let shared = SharedPort::new();
        let mut node = SerialNode::with_node_id(shared.clone(), LOCAL);
        let mut rom = MemoryRom::<4096>::with_image(&image);
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut remote = Remote::new(shared, Vec::new());
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        boot.add_node(&mut node).unwrap();

        boot.poll(Micros::new(10_000));
        boot.poll(Micros::new(500_000)); // within the same second: no beat
        boot.poll(Micros::new(1_020_000));
        remote.service();
        assert_eq!(remote.heartbeats.len(), 2);

        // BootDelay: mode initialization (1), health nominal (0),
        // vssc = state discriminant (1).
        let beat = &remote.heartbeats[0];
        assert_eq!(&beat[..4], &[0, 0, 0, 0]); // uptime 0 s
        assert_eq!(beat[4], (1 << 2) | (1 << 5));
        assert_eq!(&remote.heartbeats[1][..4], &[1, 0, 0, 0]); // uptime 1 s
    }
}

mod request_discipline {
    use super::*;

    /// A transport spy enforcing the one-outstanding-request contract.
    struct CountingNode {
        pending: bool,
        sends: usize,
        cancels: usize,
        overlaps: usize,
    }

    impl CountingNode {
        fn new() -> Self {
            Self {
                pending: false,
                sends: 0,
                cancels: 0,
                overlaps: 0,
            }
        }
    }

    impl Node for CountingNode {
        fn poll(&mut self, _reactor: &mut dyn Reactor, _uptime: Micros) {}

        fn send_request(
            &mut self,
            _service_id: ServiceId,
            _server_node_id: NodeId,
            _transfer_id: TransferId,
            _payload: &[u8],
        ) -> bool {
            if self.pending {
                self.overlaps += 1;
            }
            self.pending = true;
            self.sends += 1;
            true
        }

        fn cancel_request(&mut self) {
            self.pending = false;
            self.cancels += 1;
        }

        fn publish_message(
            &mut self,
            _subject_id: SubjectId,
            _transfer_id: TransferId,
            _payload: &[u8],
        ) -> bool {
            true
        }

        fn local_node_id(&self) -> Option<NodeId> {
            Some(LOCAL)
        }
    }

    #[test]
    fn stalled_reads_retry_then_fail_without_overlap() {
        let mut node = CountingNode::new();
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let config = BootConfig {
            boot_delay: Millis::from_secs(2),
            request_timeout: Millis::new(100),
            max_read_retries: 3,
            read_chunk: 256,
        };
        let mut final_state = None;
        {
            let mut boot = Bootloader::new(
                &mut rom,
                &mut reset,
                REGION,
                system(),
                config,
                &mut arena,
            );
            boot.add_node(&mut node).unwrap();
            boot.trigger_update(0, SERVER, IMAGE_PATH).unwrap();
            assert_eq!(boot.state(), State::AppUpgradeInProgress);

            let mut t = 0u64;
            for _ in 0..200 {
                t += 10_000;
                if let Some(state) = boot.poll(Micros::new(t)) {
                    final_state = Some(state);
                    break;
                }
            }
        }
        assert_eq!(final_state, Some(State::NoAppToBoot));
        assert_eq!(node.overlaps, 0);
        // The initial request plus three retries, each cancelled.
        assert_eq!(node.sends, 4);
        assert_eq!(node.cancels, 4);
    }

    #[test]
    fn trigger_update_requires_a_registered_node() {
        let mut rom = MemoryRom::<4096>::new();
        let mut reset = RecordingReset::new();
        let mut arena = [0u8; SEED_STORAGE_SIZE];
        let mut boot = Bootloader::new(
            &mut rom,
            &mut reset,
            REGION,
            system(),
            BootConfig::DEFAULT,
            &mut arena,
        );
        assert!(boot.trigger_update(0, SERVER, IMAGE_PATH).is_err());
    }
}
