use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Raw bit positions in the capture host's button bitset.
pub const IDX_BUTTON_A: u8 = 0;
pub const IDX_BUTTON_B: u8 = 1;
pub const IDX_BUTTON_X: u8 = 2;
pub const IDX_BUTTON_Y: u8 = 3;
pub const IDX_BUTTON_L1: u8 = 4;
pub const IDX_BUTTON_R1: u8 = 5;
pub const IDX_BUTTON_SELECT: u8 = 6;
pub const IDX_BUTTON_START: u8 = 7;
pub const IDX_BUTTON_L3: u8 = 8;
pub const IDX_BUTTON_R3: u8 = 9;
pub const IDX_BUTTON_L2: u8 = 10;
pub const IDX_BUTTON_R2: u8 = 11;

/// Which object layout the bridge presents for the bound controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MapperType {
    /// Classic joystick layout: X, Y, Z, Rz, POV and 12 buttons
    Standard,
    /// Xinput-style layout: X, Y, Z (triggers), Rx, Ry, POV and 10 buttons
    #[default]
    Extended,
}

impl MapperType {
    /// Unknown wire values fall back to the capture host's default mapper.
    pub fn from_wire(value: i8) -> Self {
        match value {
            0 => MapperType::Standard,
            _ => MapperType::Extended,
        }
    }

    pub fn to_wire(self) -> i8 {
        match self {
            MapperType::Standard => 0,
            MapperType::Extended => 1,
        }
    }
}

impl Display for MapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperType::Standard => write!(f, "Standard"),
            MapperType::Extended => write!(f, "Extended"),
        }
    }
}

/// One controller sample as pushed by the capture host.
///
/// Replaced wholesale by every state datagram; never patched field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawSample {
    pub buttons: u16,
    /// 8-way direction index in 0..=7, or -1 for neutral
    pub dpad: i8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl RawSample {
    pub fn is_pressed(&self, bit: u8) -> bool {
        bit < 16 && self.buttons & (1 << bit) != 0
    }
}
