use super::layout::{Axis, ObjectKind};
use serde::{Deserialize, Serialize};

/// Value a pressed button reports.
pub const BUTTON_PRESSED: i32 = 0x80;

/// POV value for a centered d-pad.
pub const POV_CENTERED: i32 = -1;

/// Calibrated device state as the framework sees it.
///
/// The all-zero default is the state before the first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GamepadSnapshot {
    /// Indexed by [`Axis`]
    pub axes: [i32; Axis::COUNT],
    /// Hundredths of a degree, or [`POV_CENTERED`]
    pub pov: i32,
    /// Bit n set when button slot n is pressed
    pub buttons: u32,
}

impl GamepadSnapshot {
    pub fn axis(&self, axis: Axis) -> i32 {
        self.axes[axis as usize]
    }

    pub fn set_axis(&mut self, axis: Axis, value: i32) {
        self.axes[axis as usize] = value;
    }

    pub fn is_pressed(&self, slot: u8) -> bool {
        slot < 32 && self.buttons & (1 << slot) != 0
    }

    pub fn set_button(&mut self, slot: u8, pressed: bool) {
        if slot >= 32 {
            return;
        }
        if pressed {
            self.buttons |= 1 << slot;
        } else {
            self.buttons &= !(1 << slot);
        }
    }

    /// Framework-facing value of one object.
    pub fn value_of(&self, kind: ObjectKind) -> i32 {
        match kind {
            ObjectKind::Axis(axis) => self.axis(axis),
            ObjectKind::Pov => self.pov,
            ObjectKind::Button(slot) => {
                if self.is_pressed(slot) {
                    BUTTON_PRESSED
                } else {
                    0
                }
            }
        }
    }

    pub fn set_value(&mut self, kind: ObjectKind, value: i32) {
        match kind {
            ObjectKind::Axis(axis) => self.set_axis(axis, value),
            ObjectKind::Pov => self.pov = value,
            ObjectKind::Button(slot) => self.set_button(slot, value & BUTTON_PRESSED != 0),
        }
    }
}
