// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Wire codecs for the standard node services the bootloader speaks.
//!
//! Serialization is manual, little-endian, and bounded; every decoder
//! tolerates arbitrary input and returns `None` on malformed payloads.

use ember_common::types::{ServiceId, SubjectId, SystemInfo};

use crate::appinfo::AppInfo;

/// Node info query service id.
pub const SERVICE_NODE_GET_INFO: ServiceId = 430;
/// Command execution service id.
pub const SERVICE_NODE_EXECUTE_COMMAND: ServiceId = 435;
/// Remote file read service id.
pub const SERVICE_FILE_READ: ServiceId = 408;
/// Periodic node heartbeat subject id.
pub const SUBJECT_NODE_HEARTBEAT: SubjectId = 7509;

/// Command: restart the node.
pub const COMMAND_RESTART: u16 = 65535;
/// Command: begin a software update from the sending node's file server.
pub const COMMAND_BEGIN_SOFTWARE_UPDATE: u16 = 65533;
/// Command: restore factory configuration.
pub const COMMAND_FACTORY_RESET: u16 = 65532;
/// Command: cease all activity immediately.
pub const COMMAND_EMERGENCY_STOP: u16 = 65531;

/// Command accepted.
pub const STATUS_SUCCESS: u8 = 0;
/// Command failed.
pub const STATUS_FAILURE: u8 = 1;
/// Caller is not authorized.
pub const STATUS_NOT_AUTHORIZED: u8 = 2;
/// Command code not recognized.
pub const STATUS_BAD_COMMAND: u8 = 3;
/// Command not valid in the current state.
pub const STATUS_BAD_STATE: u8 = 4;
/// Internal failure while executing.
pub const STATUS_INTERNAL_ERROR: u8 = 5;
/// Command parameter rejected.
pub const STATUS_BAD_PARAMETER: u8 = 6;

/// Longest accepted file path.
pub const MAX_PATH_LENGTH: usize = 255;
/// Serialized heartbeat length.
pub const HEARTBEAT_SIZE: usize = 7;
/// Longest node name reported by the info service.
pub const MAX_NAME_LENGTH: usize = 50;
/// Largest serialized file read request.
pub const FILE_READ_REQUEST_MAX: usize = 6 + MAX_PATH_LENGTH;

/// Operating mode reported in the heartbeat (3-bit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeMode {
    /// Normal operation.
    Operational = 0,
    /// Starting up; about to hand over to the application.
    Initialization = 1,
    /// Servicing or self-test.
    Maintenance = 2,
    /// Receiving a software update.
    SoftwareUpdate = 3,
}

/// Health reported in the heartbeat (2-bit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeHealth {
    /// Everything is fine.
    Nominal = 0,
    /// Minor degradation.
    Advisory = 1,
    /// Degraded, intervention advised.
    Caution = 2,
    /// A major failure; the node cannot perform its function.
    Warning = 3,
}

/// Serialize a heartbeat: u32 uptime seconds, then the 2-bit health,
/// 3-bit mode and 19-bit vendor-specific status code bit-packed LSB
/// first into the trailing three bytes.
#[must_use]
pub fn encode_heartbeat(
    uptime_secs: u32,
    health: NodeHealth,
    mode: NodeMode,
    vssc: u32,
) -> [u8; HEARTBEAT_SIZE] {
    let vssc = vssc & 0x7_FFFF;
    let mut out = [0u8; HEARTBEAT_SIZE];
    out[..4].copy_from_slice(&uptime_secs.to_le_bytes());
    out[4] = (health as u8) | ((mode as u8) << 2) | (((vssc & 0x7) as u8) << 5);
    out[5] = ((vssc >> 3) & 0xFF) as u8;
    out[6] = ((vssc >> 11) & 0xFF) as u8;
    out
}

/// A decoded command request.
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    /// Command code.
    pub command: u16,
    /// Opaque parameter bytes; a file path for software updates.
    pub parameter: &'a [u8],
}

/// Serialize a command request: u16 command, length-prefixed parameter.
#[must_use]
pub fn encode_execute_command_request(
    command: u16,
    parameter: &[u8],
    out: &mut [u8],
) -> Option<usize> {
    if parameter.len() > MAX_PATH_LENGTH || out.len() < 3 + parameter.len() {
        return None;
    }
    out[..2].copy_from_slice(&command.to_le_bytes());
    out[2] = parameter.len() as u8;
    out[3..3 + parameter.len()].copy_from_slice(parameter);
    Some(3 + parameter.len())
}

/// Parse a command request.
#[must_use]
pub fn decode_execute_command_request(payload: &[u8]) -> Option<CommandRequest<'_>> {
    if payload.len() < 3 {
        return None;
    }
    let command = u16::from_le_bytes([payload[0], payload[1]]);
    let len = payload[2] as usize;
    let rest = &payload[3..];
    if len > rest.len() {
        return None;
    }
    Some(CommandRequest {
        command,
        parameter: &rest[..len],
    })
}

/// Serialize a command response: the single status byte.
pub fn encode_execute_command_response(status: u8, out: &mut [u8]) -> usize {
    out[0] = status;
    1
}

/// Parse a command response status.
#[must_use]
pub fn decode_execute_command_response(payload: &[u8]) -> Option<u8> {
    payload.first().copied()
}

/// A decoded file read request.
#[derive(Debug, Clone, Copy)]
pub struct FileReadRequest<'a> {
    /// Read offset within the file (40-bit).
    pub offset: u64,
    /// File path on the server.
    pub path: &'a [u8],
}

/// Serialize a file read request: 40-bit little-endian offset, then the
/// length-prefixed path.
#[must_use]
pub fn encode_file_read_request(offset: u64, path: &[u8], out: &mut [u8]) -> Option<usize> {
    if path.len() > MAX_PATH_LENGTH || out.len() < 6 + path.len() {
        return None;
    }
    let offset_bytes = offset.to_le_bytes();
    out[..5].copy_from_slice(&offset_bytes[..5]);
    out[5] = path.len() as u8;
    out[6..6 + path.len()].copy_from_slice(path);
    Some(6 + path.len())
}

/// Parse a file read request.
#[must_use]
pub fn decode_file_read_request(payload: &[u8]) -> Option<FileReadRequest<'_>> {
    if payload.len() < 6 {
        return None;
    }
    let mut offset_bytes = [0u8; 8];
    offset_bytes[..5].copy_from_slice(&payload[..5]);
    let len = payload[5] as usize;
    let rest = &payload[6..];
    if len > rest.len() {
        return None;
    }
    Some(FileReadRequest {
        offset: u64::from_le_bytes(offset_bytes),
        path: &rest[..len],
    })
}

/// A decoded file read response.
#[derive(Debug, Clone, Copy)]
pub struct FileReadResponse<'a> {
    /// Server error code; zero means success.
    pub error: u16,
    /// Returned chunk. Shorter than the requested length means the end
    /// of the file was reached.
    pub data: &'a [u8],
}

/// Serialize a file read response: u16 error, u16 length, data.
#[must_use]
pub fn encode_file_read_response(error: u16, data: &[u8], out: &mut [u8]) -> Option<usize> {
    if out.len() < 4 + data.len() {
        return None;
    }
    out[..2].copy_from_slice(&error.to_le_bytes());
    out[2..4].copy_from_slice(&(data.len() as u16).to_le_bytes());
    out[4..4 + data.len()].copy_from_slice(data);
    Some(4 + data.len())
}

/// Parse a file read response.
#[must_use]
pub fn decode_file_read_response(payload: &[u8]) -> Option<FileReadResponse<'_>> {
    if payload.len() < 4 {
        return None;
    }
    let error = u16::from_le_bytes([payload[0], payload[1]]);
    let len = u16::from_le_bytes([payload[2], payload[3]]) as usize;
    let rest = &payload[4..];
    if len > rest.len() {
        return None;
    }
    Some(FileReadResponse {
        error,
        data: &rest[..len],
    })
}

/// Serialize a node info response.
///
/// Layout: protocol version (1.0), hardware version, software version,
/// u64 VCS revision, 16-byte unique id, length-prefixed name, the image
/// CRC as a 0/1-element u64 array, and an empty certificate.
#[must_use]
pub fn encode_get_info_response(
    system: &SystemInfo,
    app: Option<&AppInfo>,
    out: &mut [u8],
) -> Option<usize> {
    let name = system.node_name.as_bytes();
    let name_len = name.len().min(MAX_NAME_LENGTH);
    let crc_words: usize = if app.is_some() { 1 } else { 0 };
    let needed = 30 + 1 + name_len + 1 + crc_words * 8 + 1;
    if out.len() < needed {
        return None;
    }
    out[0] = 1; // protocol version major
    out[1] = 0; // protocol version minor
    out[2] = system.hardware_version.0;
    out[3] = system.hardware_version.1;
    let (sw_major, sw_minor) = app.map_or((0, 0), |a| (a.version_major, a.version_minor));
    out[4] = sw_major;
    out[5] = sw_minor;
    let vcs = app.map_or(0u64, |a| u64::from(a.vcs_revision));
    out[6..14].copy_from_slice(&vcs.to_le_bytes());
    out[14..30].copy_from_slice(&system.unique_id);
    out[30] = name_len as u8;
    let mut cursor = 31;
    out[cursor..cursor + name_len].copy_from_slice(&name[..name_len]);
    cursor += name_len;
    out[cursor] = crc_words as u8;
    cursor += 1;
    if let Some(app) = app {
        out[cursor..cursor + 8].copy_from_slice(&app.image_crc.to_le_bytes());
        cursor += 8;
    }
    out[cursor] = 0; // no certificate of authenticity
    Some(cursor + 1)
}
