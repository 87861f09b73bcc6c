use crate::mapping::layout::{HID_USAGE_GENERIC_GAMEPAD, HID_USAGE_PAGE_GENERIC};
use crate::protocol::MapperType;
use crate::state::SessionIdentity;
use serde::{Deserialize, Serialize};

pub const VENDOR_ID: u16 = 0x045E;
pub const PRODUCT_ID: u16 = 0x028E;
pub const DEVICE_PATH: &str = "virtual#vid_045e&pid_028e&ig_00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Gamepad,
}

/// Device record handed to the framework by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInstance {
    pub instance_name: String,
    pub product_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_type: DeviceType,
    /// Reported through HID
    pub is_hid: bool,
    pub usage_page: u16,
    pub usage: u16,
    pub controller_id: i32,
    pub mapper_type: MapperType,
}

impl DeviceInstance {
    pub fn from_identity(identity: &SessionIdentity) -> Self {
        Self {
            instance_name: identity.display_name.clone(),
            product_name: identity.display_name.clone(),
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            device_type: DeviceType::Gamepad,
            is_hid: true,
            usage_page: HID_USAGE_PAGE_GENERIC,
            usage: HID_USAGE_GENERIC_GAMEPAD,
            controller_id: identity.controller_id,
            mapper_type: identity.mapper_type,
        }
    }

    /// Product and vendor id packed the way joystick property queries expect.
    pub fn vid_pid(&self) -> u32 {
        ((self.product_id as u32) << 16) | self.vendor_id as u32
    }
}

/// Properties readable once the device is enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProperty {
    ProductName,
    InstanceName,
    VidPid,
    JoystickId,
    DevicePath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Dword(u32),
}

impl DeviceInstance {
    pub fn property(&self, property: DeviceProperty) -> PropertyValue {
        match property {
            DeviceProperty::ProductName => PropertyValue::Text(self.product_name.clone()),
            DeviceProperty::InstanceName => PropertyValue::Text(self.instance_name.clone()),
            DeviceProperty::VidPid => PropertyValue::Dword(self.vid_pid()),
            DeviceProperty::JoystickId => PropertyValue::Dword(self.controller_id as u32),
            DeviceProperty::DevicePath => PropertyValue::Text(DEVICE_PATH.to_string()),
        }
    }
}
