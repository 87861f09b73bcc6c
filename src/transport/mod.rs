//! Session transport
//!
//! Owns the UDP socket and the receive thread. Datagrams from the capture
//! host are decoded and applied to the [`SharedState`](crate::state::SharedState):
//!
//! ```text
//! capture host ──UDP──→ SessionTransport<Listening> ──→ SharedState ──→ GamepadBridge::read
//!       ↑                        │
//!       └── discovery / release ─┘
//! ```
//!
//! - [`session`] - Typestate transport (`Idle` → `Listening`) and the receive loop
//! - [`transport_handle`] - Thread lifecycle and the release notice on stop

pub mod error;
pub mod session;
pub mod transport_handle;

pub use error::TransportError;
pub use session::{PollOutcome, SessionTransport, TransportStats};
pub use transport_handle::TransportHandle;
