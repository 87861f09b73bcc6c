//! Wire protocol spoken with the capture host
//!
//! Every message is a single UDP datagram on the loopback interface. The
//! first byte is a request code selecting the message kind; the rest is a
//! fixed little-endian layout with no length prefixes.
//!
//! ```text
//! bridge (7948) ──GET_GAMEPAD──────────► capture host (7947)
//!               ◄─GET_GAMEPAD (id,name)─
//!               ◄─GET_GAMEPAD_STATE─────  (pushed at the host's rate)
//!               ──RELEASE_GAMEPAD──────►
//! ```
//!
//! - [`codec`] - Encoding and decoding of the fixed-layout datagrams
//! - [`types`] - Raw sample and mapper type carried on the wire

pub mod codec;
pub mod types;

pub use codec::{
    decode, decode_discovery_request, encode_discovery_request, encode_gamepad_response,
    encode_release, encode_state, CodecError, Datagram, DatagramKind, DiscoveryRequest,
    GamepadAnnouncement,
};
pub use types::{MapperType, RawSample};

/// Default local port the bridge listens on.
pub const SERVER_PORT: u16 = 7948;

/// Default port of the capture host.
pub const CLIENT_PORT: u16 = 7947;

/// Size of control datagrams and of the receive buffer.
pub const BUFFER_SIZE: usize = 64;

pub const REQUEST_CODE_GET_GAMEPAD: u8 = 8;
pub const REQUEST_CODE_GET_GAMEPAD_STATE: u8 = 9;
pub const REQUEST_CODE_RELEASE_GAMEPAD: u8 = 10;
