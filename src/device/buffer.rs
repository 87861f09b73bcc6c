use crate::mapping::layout::{BUTTON_OFFSET, POV_OFFSET};
use crate::mapping::{Axis, DeviceObject, GamepadSnapshot, ObjectKind};

/// Size of the classic joystick state layout: 8 axis slots, 4 POVs and
/// 32 buttons.
pub const JOY_STATE_SIZE: usize = 80;

/// Destination of the values a read publishes.
pub trait DeviceStateBuffer {
    fn write_object(&mut self, object: &DeviceObject, value: i32);
}

/// Byte image of the classic joystick state, written at each object's offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoyStateBuffer {
    bytes: [u8; JOY_STATE_SIZE],
}

impl Default for JoyStateBuffer {
    fn default() -> Self {
        Self {
            bytes: [0; JOY_STATE_SIZE],
        }
    }
}

impl JoyStateBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn read_i32(&self, offset: u32) -> i32 {
        let offset = offset as usize;
        self.bytes
            .get(offset..offset + 4)
            .and_then(|slice| slice.try_into().ok())
            .map(i32::from_le_bytes)
            .unwrap_or_default()
    }

    pub fn axis(&self, axis: Axis) -> i32 {
        self.read_i32(axis.offset())
    }

    pub fn pov(&self) -> i32 {
        self.read_i32(POV_OFFSET)
    }

    pub fn button(&self, slot: u8) -> u8 {
        self.bytes
            .get((BUTTON_OFFSET + slot as u32) as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl DeviceStateBuffer for JoyStateBuffer {
    fn write_object(&mut self, object: &DeviceObject, value: i32) {
        let offset = object.offset as usize;
        match object.kind {
            ObjectKind::Button(_) => {
                if let Some(byte) = self.bytes.get_mut(offset) {
                    *byte = value as u8;
                }
            }
            ObjectKind::Axis(_) | ObjectKind::Pov => {
                if let Some(slot) = self.bytes.get_mut(offset..offset + 4) {
                    slot.copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }
}

impl DeviceStateBuffer for GamepadSnapshot {
    fn write_object(&mut self, object: &DeviceObject, value: i32) {
        self.set_value(object.kind, value);
    }
}
