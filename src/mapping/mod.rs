//! Mapping of raw samples onto the virtual device's objects
//!
//! Two mutually exclusive schemes, selected by the bound controller's
//! [`MapperType`]:
//!
//! - **Standard** - X, Y, Z, Rz, POV and 12 buttons with a fixed permutation
//!   from raw bit to slot
//! - **Extended** - X, Y, Rx, Ry, POV and 10 buttons mapped one to one, plus a
//!   Z pseudo-axis synthesized from the two trigger bits
//!
//! - [`layout`] - Object lists, offsets, names and enumeration filters
//! - [`snapshot`] - Typed calibrated state produced by [`map_sample`]

pub mod layout;
pub mod snapshot;

pub use layout::{
    standard_button_bit, standard_button_slot, Axis, DeviceLayout, DeviceObject, EnumFlow,
    ObjectFilter, ObjectKind, ObjectSource, ObjectType, ObjectTypeMask, Stick,
};
pub use snapshot::{GamepadSnapshot, BUTTON_PRESSED, POV_CENTERED};

use crate::calibration::{scale_axis, scale_linear, ObjectCalibration};
use crate::protocol::types::{IDX_BUTTON_L2, IDX_BUTTON_R2};
use crate::protocol::{MapperType, RawSample};

/// Degrees per d-pad step, in hundredths.
pub const POV_STEP: i32 = 4500;

const TRIGGER_HIGH: i32 = 32_767;
const TRIGGER_LOW: i32 = -32_768;

/// Converts an 8-way d-pad index to hundredths of a degree.
///
/// -1 stays -1; the neutral sentinel is never scaled. Indices outside 0..=7
/// are reported as neutral.
pub fn pov_hundredths(dpad: i8) -> i32 {
    match dpad {
        0..=7 => dpad as i32 * POV_STEP,
        _ => POV_CENTERED,
    }
}

/// Logical value of the Extended Z pseudo-axis. L2 wins over R2.
pub fn trigger_axis_value(buttons: u16) -> i32 {
    if buttons & (1 << IDX_BUTTON_L2) != 0 {
        TRIGGER_HIGH
    } else if buttons & (1 << IDX_BUTTON_R2) != 0 {
        TRIGGER_LOW
    } else {
        0
    }
}

fn stick_value(raw: &RawSample, stick: Stick) -> i32 {
    match stick {
        Stick::LeftX => raw.thumb_lx as i32,
        Stick::LeftY => raw.thumb_ly as i32,
        Stick::RightX => raw.thumb_rx as i32,
        Stick::RightY => raw.thumb_ry as i32,
    }
}

/// Framework-facing value of a single object for the given raw sample.
pub fn object_value(object: &DeviceObject, raw: &RawSample) -> i32 {
    let calibration = object
        .calibration
        .unwrap_or_else(ObjectCalibration::axis);

    match object.source {
        ObjectSource::Stick(stick) => scale_axis(stick_value(raw, stick), &calibration),
        ObjectSource::Triggers => scale_linear(trigger_axis_value(raw.buttons), &calibration),
        ObjectSource::Dpad => pov_hundredths(raw.dpad),
        ObjectSource::Bit(bit) => {
            if raw.is_pressed(bit) {
                BUTTON_PRESSED
            } else {
                0
            }
        }
    }
}

/// Derives the calibrated snapshot for every object of the layout.
pub fn map_sample(layout: &DeviceLayout, raw: &RawSample) -> GamepadSnapshot {
    let mut snapshot = GamepadSnapshot::default();
    for object in layout.objects() {
        snapshot.set_value(object.kind, object_value(object, raw));
    }
    snapshot
}

/// Convenience for callers that only know the mapper type.
pub fn map_with_default_layout(mapper: MapperType, raw: &RawSample) -> GamepadSnapshot {
    map_sample(&DeviceLayout::for_mapper(mapper), raw)
}
