//! Virtual gamepad bridge
//!
//! Presents a controller captured by another process as a locally attached
//! gamepad. The capture host pushes samples over loopback UDP; the bridge
//! calibrates them and serves them through a polled device lifecycle.

pub mod calibration;
pub mod device;
pub mod mapping;
pub mod protocol;
pub mod settings;
pub mod state;
pub mod transport;

pub use device::{
    BufferedEventQueue, ChangeEvent, DeviceError, DeviceInstance, DeviceStateBuffer, EventQueue,
    GamepadBridge, JoyStateBuffer, ReadOutcome,
};
pub use mapping::GamepadSnapshot;
pub use settings::{BridgeSettings, ReceiveMode};
pub use state::EventHandle;
