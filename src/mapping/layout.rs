//! Object layouts presented to the input framework
//!
//! Each mapper type exposes a fixed list of objects: axes first, then the
//! POV, then the buttons. The position in that list is the object index used
//! by the state buffer and the event queue.

use crate::calibration::ObjectCalibration;
use crate::protocol::MapperType;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::ops::BitOr;

pub const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
pub const HID_USAGE_PAGE_BUTTON: u16 = 0x09;
pub const HID_USAGE_GENERIC_GAMEPAD: u16 = 0x05;
pub const HID_USAGE_GENERIC_HATSWITCH: u16 = 0x39;

/// Byte offset of the POV in the joystick state layout.
pub const POV_OFFSET: u32 = 32;

/// Byte offset of button 0 in the joystick state layout.
pub const BUTTON_OFFSET: u32 = 48;

/// Raw bit position to standard button slot.
///
/// The capture host orders its bits A, B, X, Y, L1, R1, Select, Start, L3,
/// R3, L2, R2; standard joystick consumers expect X in slot 0 and A in slot 1.
pub const STANDARD_BUTTON_SLOTS: [u8; 12] = [1, 2, 0, 3, 4, 5, 8, 9, 10, 11, 6, 7];

pub const STANDARD_BUTTON_COUNT: u8 = 12;
pub const EXTENDED_BUTTON_COUNT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
}

impl Axis {
    pub const COUNT: usize = 6;

    pub fn offset(self) -> u32 {
        self as u32 * 4
    }

    pub fn usage(self) -> u16 {
        0x30 + self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "X Axis",
            Axis::Y => "Y Axis",
            Axis::Z => "Z Axis",
            Axis::Rx => "Rx Axis",
            Axis::Ry => "Ry Axis",
            Axis::Rz => "Rz Axis",
        }
    }
}

/// What an object is, independent of where it sits in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Axis(Axis),
    Pov,
    /// Button slot as seen by the framework
    Button(u8),
}

impl ObjectKind {
    pub fn object_type(self) -> ObjectType {
        match self {
            ObjectKind::Axis(_) => ObjectType::AbsAxis,
            ObjectKind::Pov => ObjectType::Pov,
            ObjectKind::Button(_) => ObjectType::PushButton,
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Axis(axis) => write!(f, "{}", axis.name()),
            ObjectKind::Pov => write!(f, "POV"),
            ObjectKind::Button(slot) => write!(f, "Button {}", slot),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    AbsAxis,
    Pov,
    PushButton,
}

/// Stick fields of a raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stick {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

/// Where an object's value comes from in the raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectSource {
    Stick(Stick),
    /// Pseudo-axis synthesized from the two trigger bits
    Triggers,
    Dpad,
    /// Raw bit in the button bitset
    Bit(u8),
}

/// One enumerable object of the virtual device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceObject {
    pub index: usize,
    pub kind: ObjectKind,
    pub instance: u8,
    /// Byte offset in the classic joystick state layout
    pub offset: u32,
    pub name: String,
    pub usage_page: u16,
    pub usage: u16,
    pub source: ObjectSource,
    /// Present for axes and the POV
    pub calibration: Option<ObjectCalibration>,
}

impl DeviceObject {
    fn axis(index: usize, instance: u8, axis: Axis, source: ObjectSource) -> Self {
        Self {
            index,
            kind: ObjectKind::Axis(axis),
            instance,
            offset: axis.offset(),
            name: axis.name().to_string(),
            usage_page: HID_USAGE_PAGE_GENERIC,
            usage: axis.usage(),
            source,
            calibration: Some(ObjectCalibration::axis()),
        }
    }

    fn pov(index: usize) -> Self {
        Self {
            index,
            kind: ObjectKind::Pov,
            instance: 0,
            offset: POV_OFFSET,
            name: "POV".to_string(),
            usage_page: HID_USAGE_PAGE_GENERIC,
            usage: HID_USAGE_GENERIC_HATSWITCH,
            source: ObjectSource::Dpad,
            calibration: Some(ObjectCalibration::pov()),
        }
    }

    fn button(index: usize, slot: u8, bit: u8) -> Self {
        Self {
            index,
            kind: ObjectKind::Button(slot),
            instance: slot,
            offset: BUTTON_OFFSET + slot as u32,
            name: format!("Button {}", slot),
            usage_page: HID_USAGE_PAGE_BUTTON,
            usage: slot as u16 + 1,
            source: ObjectSource::Bit(bit),
            calibration: None,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }
}

/// Which objects an enumeration visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFilter {
    Device,
    ByOffset(u32),
    ById {
        object_type: ObjectType,
        instance: u8,
    },
}

impl ObjectFilter {
    fn matches(&self, object: &DeviceObject) -> bool {
        match *self {
            ObjectFilter::Device => true,
            ObjectFilter::ByOffset(offset) => object.offset == offset,
            ObjectFilter::ById {
                object_type,
                instance,
            } => object.object_type() == object_type && object.instance == instance,
        }
    }
}

/// Object types an enumeration visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTypeMask {
    pub axes: bool,
    pub povs: bool,
    pub buttons: bool,
}

impl ObjectTypeMask {
    pub const ALL: Self = Self {
        axes: true,
        povs: true,
        buttons: true,
    };
    pub const AXES: Self = Self {
        axes: true,
        povs: false,
        buttons: false,
    };
    pub const POVS: Self = Self {
        axes: false,
        povs: true,
        buttons: false,
    };
    pub const BUTTONS: Self = Self {
        axes: false,
        povs: false,
        buttons: true,
    };

    pub fn contains(&self, object_type: ObjectType) -> bool {
        match object_type {
            ObjectType::AbsAxis => self.axes,
            ObjectType::Pov => self.povs,
            ObjectType::PushButton => self.buttons,
        }
    }
}

impl BitOr for ObjectTypeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            axes: self.axes || rhs.axes,
            povs: self.povs || rhs.povs,
            buttons: self.buttons || rhs.buttons,
        }
    }
}

/// Returned by enumeration callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFlow {
    Continue,
    Stop,
}

/// Object list of the virtual device for one mapper type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceLayout {
    mapper: MapperType,
    objects: Vec<DeviceObject>,
}

impl DeviceLayout {
    pub fn for_mapper(mapper: MapperType) -> Self {
        let mut objects = Vec::new();

        match mapper {
            MapperType::Standard => {
                let axes = [
                    (Axis::X, Stick::LeftX),
                    (Axis::Y, Stick::LeftY),
                    (Axis::Z, Stick::RightX),
                    (Axis::Rz, Stick::RightY),
                ];
                for (instance, (axis, stick)) in axes.into_iter().enumerate() {
                    objects.push(DeviceObject::axis(
                        objects.len(),
                        instance as u8,
                        axis,
                        ObjectSource::Stick(stick),
                    ));
                }
                objects.push(DeviceObject::pov(objects.len()));
                for slot in 0..STANDARD_BUTTON_COUNT {
                    if let Some(bit) = standard_button_bit(slot) {
                        objects.push(DeviceObject::button(objects.len(), slot, bit));
                    }
                }
            }
            MapperType::Extended => {
                let axes = [
                    (Axis::X, ObjectSource::Stick(Stick::LeftX)),
                    (Axis::Y, ObjectSource::Stick(Stick::LeftY)),
                    (Axis::Z, ObjectSource::Triggers),
                    (Axis::Rx, ObjectSource::Stick(Stick::RightX)),
                    (Axis::Ry, ObjectSource::Stick(Stick::RightY)),
                ];
                for (instance, (axis, source)) in axes.into_iter().enumerate() {
                    objects.push(DeviceObject::axis(
                        objects.len(),
                        instance as u8,
                        axis,
                        source,
                    ));
                }
                objects.push(DeviceObject::pov(objects.len()));
                for slot in 0..EXTENDED_BUTTON_COUNT {
                    objects.push(DeviceObject::button(objects.len(), slot, slot));
                }
            }
        }

        Self { mapper, objects }
    }

    pub fn mapper(&self) -> MapperType {
        self.mapper
    }

    pub fn objects(&self) -> &[DeviceObject] {
        &self.objects
    }

    pub fn object(&self, index: usize) -> Option<&DeviceObject> {
        self.objects.get(index)
    }

    pub fn object_mut(&mut self, index: usize) -> Option<&mut DeviceObject> {
        self.objects.get_mut(index)
    }

    pub fn find(&self, kind: ObjectKind) -> Option<&DeviceObject> {
        self.objects.iter().find(|object| object.kind == kind)
    }

    pub fn button_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|object| matches!(object.kind, ObjectKind::Button(_)))
            .count()
    }

    pub fn axis_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|object| matches!(object.kind, ObjectKind::Axis(_)))
            .count()
    }

    /// Visits matching objects in index order until the callback stops.
    pub fn enumerate<F>(&self, filter: ObjectFilter, mask: ObjectTypeMask, mut callback: F) -> EnumFlow
    where
        F: FnMut(&DeviceObject) -> EnumFlow,
    {
        for object in &self.objects {
            if !mask.contains(object.object_type()) || !filter.matches(object) {
                continue;
            }
            if callback(object) == EnumFlow::Stop {
                return EnumFlow::Stop;
            }
        }
        EnumFlow::Continue
    }
}

/// Standard slot a raw bit lands in; `None` for bits outside the layout.
pub fn standard_button_slot(bit: u8) -> Option<u8> {
    STANDARD_BUTTON_SLOTS.get(bit as usize).copied()
}

/// Raw bit feeding a standard slot.
pub fn standard_button_bit(slot: u8) -> Option<u8> {
    STANDARD_BUTTON_SLOTS
        .iter()
        .position(|s| *s == slot)
        .map(|bit| bit as u8)
}
