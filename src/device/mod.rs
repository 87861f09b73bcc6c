//! Device lifecycle
//!
//! [`GamepadBridge`] is the polled device the input framework drives:
//!
//! ```text
//! enumerate ──→ acquire(handle) ──→ read(buffer, queue) ... ──→ unacquire ──→ release
//!     │                                   │
//!     └─ starts transport, waits          └─ snapshot diff → ChangeEvent per object
//! ```
//!
//! - [`bridge`] - Lifecycle calls, object enumeration and calibration access
//! - [`buffer`] - Write-object-by-index seam and the joystick byte layout
//! - [`events`] - Timestamped change events and a bounded queue
//! - [`instance`] - Device record and property values

pub mod bridge;
pub mod buffer;
pub mod error;
pub mod events;
pub mod instance;

pub use bridge::{GamepadBridge, ReadOutcome};
pub use buffer::{DeviceStateBuffer, JoyStateBuffer};
pub use error::DeviceError;
pub use events::{BufferedEventQueue, ChangeEvent, EventQueue};
pub use instance::{DeviceInstance, DeviceProperty, DeviceType, PropertyValue};
