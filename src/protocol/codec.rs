//! Fixed-layout datagram codec
//!
//! Inbound layouts (bridge side):
//!
//! ```text
//! GET_GAMEPAD        [0]=8 [1..5]=id:i32 [5]=mapper:i8 [6..10]=name_len:i32 [10..]=name
//! GET_GAMEPAD_STATE  [0]=9 [1]=ack [2..6]=id:i32 [6..8]=buttons:u16 [8]=dpad:i8
//!                    [9..11]=lx [11..13]=ly [13..15]=rx [15..17]=ry   (i16 each)
//! RELEASE_GAMEPAD    [0]=10
//! ```
//!
//! The outbound discovery request reuses code 8 with a different body
//! (`[1]=want-notify [2]=notify-enable [3..7]=process id`), so the direction
//! decides how a code-8 datagram is read.

use super::types::{MapperType, RawSample};
use super::{
    BUFFER_SIZE, REQUEST_CODE_GET_GAMEPAD, REQUEST_CODE_GET_GAMEPAD_STATE,
    REQUEST_CODE_RELEASE_GAMEPAD,
};
use std::fmt::{self, Display};

/// Header of a GET_GAMEPAD response before the name bytes.
pub const GAMEPAD_HEADER_SIZE: usize = 10;

/// Length of a pure state frame.
pub const STATE_FRAME_SIZE: usize = 17;

/// Longest name that fits a control datagram.
pub const MAX_NAME_LEN: usize = BUFFER_SIZE - GAMEPAD_HEADER_SIZE;

const DISCOVERY_REQUEST_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramKind {
    GetGamepad,
    GetGamepadState,
    ReleaseGamepad,
}

impl Display for DatagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatagramKind::GetGamepad => write!(f, "GET_GAMEPAD"),
            DatagramKind::GetGamepadState => write!(f, "GET_GAMEPAD_STATE"),
            DatagramKind::ReleaseGamepad => write!(f, "RELEASE_GAMEPAD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Empty datagram")]
    Empty,

    #[error("Unknown request code: {0}")]
    UnknownRequest(u8),

    #[error("Truncated {kind} datagram: expected at least {expected} bytes, got {actual}")]
    Truncated {
        kind: DatagramKind,
        expected: usize,
        actual: usize,
    },

    #[error("Gamepad name length {len} exceeds the {available} bytes received")]
    NameOutOfBounds { len: i32, available: usize },
}

/// A controller announced by the capture host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadAnnouncement {
    pub controller_id: i32,
    pub mapper_type: MapperType,
    pub name: String,
}

/// Datagrams the bridge can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Discovery response; `None` when the host has no controller to offer
    GamepadInfo(Option<GamepadAnnouncement>),
    /// State push for the bound controller
    State {
        ack: u8,
        controller_id: i32,
        sample: RawSample,
    },
    /// The host released the controller
    Release,
}

/// Discovery request as seen by the capture host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    pub want_notify: u8,
    pub notify_enable: u8,
    pub process_id: i32,
}

fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    bytes
        .get(offset..offset + 4)?
        .try_into()
        .ok()
        .map(i32::from_le_bytes)
}

fn read_i16(bytes: &[u8], offset: usize) -> Option<i16> {
    bytes
        .get(offset..offset + 2)?
        .try_into()
        .ok()
        .map(i16::from_le_bytes)
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes
        .get(offset..offset + 2)?
        .try_into()
        .ok()
        .map(u16::from_le_bytes)
}

fn read_i8(bytes: &[u8], offset: usize) -> Option<i8> {
    bytes.get(offset).map(|b| *b as i8)
}

fn require(bytes: &[u8], kind: DatagramKind, expected: usize) -> Result<(), CodecError> {
    if bytes.len() < expected {
        return Err(CodecError::Truncated {
            kind,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Decodes a datagram received by the bridge.
pub fn decode(bytes: &[u8]) -> Result<Datagram, CodecError> {
    let code = *bytes.first().ok_or(CodecError::Empty)?;
    match code {
        REQUEST_CODE_GET_GAMEPAD => decode_gamepad_info(bytes),
        REQUEST_CODE_GET_GAMEPAD_STATE => decode_state(bytes),
        REQUEST_CODE_RELEASE_GAMEPAD => Ok(Datagram::Release),
        other => Err(CodecError::UnknownRequest(other)),
    }
}

fn decode_gamepad_info(bytes: &[u8]) -> Result<Datagram, CodecError> {
    let kind = DatagramKind::GetGamepad;
    let truncated = |expected| CodecError::Truncated {
        kind,
        expected,
        actual: bytes.len(),
    };

    let controller_id = read_i32(bytes, 1).ok_or_else(|| truncated(5))?;
    if controller_id <= 0 {
        return Ok(Datagram::GamepadInfo(None));
    }

    require(bytes, kind, GAMEPAD_HEADER_SIZE)?;
    let mapper_type = read_i8(bytes, 5)
        .map(MapperType::from_wire)
        .ok_or_else(|| truncated(GAMEPAD_HEADER_SIZE))?;
    let name_len = read_i32(bytes, 6).ok_or_else(|| truncated(GAMEPAD_HEADER_SIZE))?;

    let available = bytes.len() - GAMEPAD_HEADER_SIZE;
    let name_bytes = usize::try_from(name_len)
        .ok()
        .filter(|len| *len <= available)
        .and_then(|len| bytes.get(GAMEPAD_HEADER_SIZE..GAMEPAD_HEADER_SIZE + len))
        .ok_or(CodecError::NameOutOfBounds {
            len: name_len,
            available,
        })?;

    Ok(Datagram::GamepadInfo(Some(GamepadAnnouncement {
        controller_id,
        mapper_type,
        name: String::from_utf8_lossy(name_bytes).into_owned(),
    })))
}

fn decode_state(bytes: &[u8]) -> Result<Datagram, CodecError> {
    require(bytes, DatagramKind::GetGamepadState, STATE_FRAME_SIZE)?;
    let truncated = CodecError::Truncated {
        kind: DatagramKind::GetGamepadState,
        expected: STATE_FRAME_SIZE,
        actual: bytes.len(),
    };

    let sample = (|| {
        Some(RawSample {
            buttons: read_u16(bytes, 6)?,
            dpad: read_i8(bytes, 8)?,
            thumb_lx: read_i16(bytes, 9)?,
            thumb_ly: read_i16(bytes, 11)?,
            thumb_rx: read_i16(bytes, 13)?,
            thumb_ry: read_i16(bytes, 15)?,
        })
    })()
    .ok_or_else(|| truncated.clone())?;

    Ok(Datagram::State {
        ack: bytes[1],
        controller_id: read_i32(bytes, 2).ok_or(truncated)?,
        sample,
    })
}

/// Decodes a discovery request the way the capture host reads it.
pub fn decode_discovery_request(bytes: &[u8]) -> Result<DiscoveryRequest, CodecError> {
    let code = *bytes.first().ok_or(CodecError::Empty)?;
    if code != REQUEST_CODE_GET_GAMEPAD {
        return Err(CodecError::UnknownRequest(code));
    }
    require(bytes, DatagramKind::GetGamepad, DISCOVERY_REQUEST_SIZE)?;
    Ok(DiscoveryRequest {
        want_notify: bytes[1],
        notify_enable: bytes[2],
        process_id: read_i32(bytes, 3).unwrap_or_default(),
    })
}

/// Discovery request sent on start and by the keepalive.
pub fn encode_discovery_request(process_id: u32) -> [u8; BUFFER_SIZE] {
    let mut buffer = [0u8; BUFFER_SIZE];
    buffer[0] = REQUEST_CODE_GET_GAMEPAD;
    buffer[1] = 0;
    buffer[2] = 1;
    buffer[3..7].copy_from_slice(&process_id.to_le_bytes());
    buffer
}

pub fn encode_release() -> [u8; BUFFER_SIZE] {
    let mut buffer = [0u8; BUFFER_SIZE];
    buffer[0] = REQUEST_CODE_RELEASE_GAMEPAD;
    buffer
}

/// Discovery response as the capture host sends it. Names longer than
/// [`MAX_NAME_LEN`] bytes are cut to fit the control datagram.
pub fn encode_gamepad_response(announcement: Option<&GamepadAnnouncement>) -> [u8; BUFFER_SIZE] {
    let mut buffer = [0u8; BUFFER_SIZE];
    buffer[0] = REQUEST_CODE_GET_GAMEPAD;

    if let Some(announcement) = announcement {
        let name = announcement.name.as_bytes();
        let name_len = name.len().min(MAX_NAME_LEN);
        buffer[1..5].copy_from_slice(&announcement.controller_id.to_le_bytes());
        buffer[5] = announcement.mapper_type.to_wire() as u8;
        buffer[6..10].copy_from_slice(&(name_len as i32).to_le_bytes());
        buffer[GAMEPAD_HEADER_SIZE..GAMEPAD_HEADER_SIZE + name_len]
            .copy_from_slice(&name[..name_len]);
    }

    buffer
}

pub fn encode_state(ack: u8, controller_id: i32, sample: &RawSample) -> [u8; STATE_FRAME_SIZE] {
    let mut buffer = [0u8; STATE_FRAME_SIZE];
    buffer[0] = REQUEST_CODE_GET_GAMEPAD_STATE;
    buffer[1] = ack;
    buffer[2..6].copy_from_slice(&controller_id.to_le_bytes());
    buffer[6..8].copy_from_slice(&sample.buttons.to_le_bytes());
    buffer[8] = sample.dpad as u8;
    buffer[9..11].copy_from_slice(&sample.thumb_lx.to_le_bytes());
    buffer[11..13].copy_from_slice(&sample.thumb_ly.to_le_bytes());
    buffer[13..15].copy_from_slice(&sample.thumb_rx.to_le_bytes());
    buffer[15..17].copy_from_slice(&sample.thumb_ry.to_le_bytes());
    buffer
}
