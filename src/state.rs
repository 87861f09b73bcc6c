//! Shared gamepad state
//!
//! [`BridgeState`] is the single record of "last known truth" shared between
//! the transport thread and the framework-facing calls. It lives behind one
//! mutex with no nested locking; the paired condition variable only serves
//! the bounded wait for the first discovery response.
//!
//! Invariant: the raw sample is only meaningful while an identity is bound.
//! Every transition to unbound zeroes it inside the same critical section.

use crate::device::DeviceInstance;
use crate::mapping::{DeviceLayout, GamepadSnapshot};
use crate::protocol::{MapperType, RawSample};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Caller-provided notification handle, signalled without blocking.
pub type EventHandle = Arc<Notify>;

/// The remote controller currently bound to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub controller_id: i32,
    pub mapper_type: MapperType,
    pub display_name: String,
}

/// Result of offering a discovered identity to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A different controller is now bound; cached state was discarded
    Bound,
    /// The same controller was announced again
    Unchanged,
    /// The mapper type conflicts with the layout already handed out
    MapperConflict,
}

#[derive(Debug, Default)]
pub struct BridgeState {
    pub(crate) identity: Option<SessionIdentity>,
    pub(crate) raw: RawSample,
    pub(crate) acquired: bool,
    pub(crate) notify: Option<EventHandle>,
    /// Object layout pinned by enumeration
    pub(crate) layout: Option<DeviceLayout>,
    pub(crate) instance: Option<DeviceInstance>,
    /// Snapshot published by the last read
    pub(crate) previous: GamepadSnapshot,
    pub(crate) sequence: u32,
}

impl BridgeState {
    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.identity.is_some()
    }

    pub fn raw(&self) -> RawSample {
        self.raw
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn pinned_mapper(&self) -> Option<MapperType> {
        self.layout.as_ref().map(DeviceLayout::mapper)
    }

    pub fn bind(&mut self, identity: SessionIdentity) -> BindOutcome {
        if let Some(pinned) = self.pinned_mapper() {
            if pinned != identity.mapper_type {
                warn!(
                    "Controller {} announced {} mapping but the device was enumerated as {}",
                    identity.controller_id, identity.mapper_type, pinned
                );
                self.unbind();
                return BindOutcome::MapperConflict;
            }
        }

        if self.identity.as_ref() == Some(&identity) {
            debug!("Controller {} announced again", identity.controller_id);
            return BindOutcome::Unchanged;
        }

        info!(
            "Bound controller {} '{}' ({} mapping)",
            identity.controller_id, identity.display_name, identity.mapper_type
        );
        self.identity = Some(identity);
        self.raw = RawSample::default();
        self.previous = GamepadSnapshot::default();
        BindOutcome::Bound
    }

    /// Drops the identity, zeroes the raw sample and clears the published
    /// snapshot. The acquired flag is kept so reads resume once the
    /// controller comes back.
    pub fn unbind(&mut self) {
        if let Some(identity) = self.identity.take() {
            info!("Controller {} unbound", identity.controller_id);
        }
        self.raw = RawSample::default();
        self.previous = GamepadSnapshot::default();
    }

    /// Replaces the raw sample; returns whether it differs from the last one.
    pub fn store_sample(&mut self, sample: RawSample) -> bool {
        let changed = self.raw != sample;
        self.raw = sample;
        changed
    }

    /// Signals the registered handle if the device is acquired.
    pub fn signal(&self) {
        if !self.acquired {
            return;
        }
        if let Some(handle) = &self.notify {
            handle.notify_one();
        }
    }

    /// Back to the initial unbound configuration.
    pub fn reset(&mut self) {
        *self = BridgeState::default();
    }
}

/// Lock and condition variable around [`BridgeState`].
#[derive(Debug, Default)]
pub struct SharedState {
    state: Mutex<BridgeState>,
    binding: Condvar,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Locks the state. A poisoned lock is recovered: every critical section
    /// leaves the state consistent before it can panic.
    pub fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes threads waiting in [`SharedState::wait_for_identity`].
    pub fn notify_binding(&self) {
        self.binding.notify_all();
    }

    /// Waits up to `timeout` for a bound identity.
    pub fn wait_for_identity(&self, timeout: Duration) -> Option<SessionIdentity> {
        let guard = self.lock();
        let (guard, result) = self
            .binding
            .wait_timeout_while(guard, timeout, |state| state.identity.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            debug!("No controller bound within {:?}", timeout);
        }
        guard.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn identity(id: i32, mapper_type: MapperType) -> SessionIdentity {
        SessionIdentity {
            controller_id: id,
            mapper_type,
            display_name: format!("Pad {}", id),
        }
    }

    fn sample() -> RawSample {
        RawSample {
            buttons: 0b101,
            dpad: 3,
            thumb_lx: 1200,
            thumb_ly: -40,
            thumb_rx: 7,
            thumb_ry: 0,
        }
    }

    #[test]
    fn unbind_zeroes_raw_sample() {
        let mut state = BridgeState::default();
        state.bind(identity(5, MapperType::Extended));
        assert!(state.store_sample(sample()));
        state.previous.buttons = 0b1;
        state.acquired = true;
        state.unbind();
        assert!(!state.is_bound());
        assert!(state.is_acquired());
        assert_eq!(state.raw(), RawSample::default());
        assert_eq!(state.previous, GamepadSnapshot::default());
    }

    #[test]
    fn rebinding_a_different_controller_discards_cached_state() {
        let mut state = BridgeState::default();
        state.bind(identity(5, MapperType::Extended));
        state.store_sample(sample());
        state.previous.pov = 4500;

        assert_eq!(state.bind(identity(6, MapperType::Extended)), BindOutcome::Bound);
        assert_eq!(state.raw(), RawSample::default());
        assert_eq!(state.previous, GamepadSnapshot::default());
    }

    #[test]
    fn same_controller_keeps_its_sample() {
        let mut state = BridgeState::default();
        state.bind(identity(5, MapperType::Standard));
        state.store_sample(sample());
        assert_eq!(state.bind(identity(5, MapperType::Standard)), BindOutcome::Unchanged);
        assert_eq!(state.raw(), sample());
    }

    #[test]
    fn pinned_layout_rejects_other_mapper() {
        let mut state = BridgeState::default();
        state.bind(identity(5, MapperType::Standard));
        state.layout = Some(DeviceLayout::for_mapper(MapperType::Standard));
        state.store_sample(sample());

        assert_eq!(
            state.bind(identity(5, MapperType::Extended)),
            BindOutcome::MapperConflict
        );
        assert!(!state.is_bound());
        assert_eq!(state.raw(), RawSample::default());
    }

    #[test]
    fn store_sample_reports_changes() {
        let mut state = BridgeState::default();
        assert!(!state.store_sample(RawSample::default()));
        assert!(state.store_sample(sample()));
        assert!(!state.store_sample(sample()));
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = BridgeState::default();
        state.bind(identity(5, MapperType::Standard));
        state.acquired = true;
        state.notify = Some(Arc::new(Notify::new()));
        state.sequence = 12;
        state.reset();
        assert!(!state.is_bound());
        assert!(!state.is_acquired());
        assert!(state.notify.is_none());
        assert_eq!(state.sequence, 0);
        assert!(state.pinned_mapper().is_none());
    }

    #[test]
    fn wait_for_identity_times_out() {
        let shared = SharedState::new();
        assert!(shared
            .wait_for_identity(Duration::from_millis(20))
            .is_none());
    }

    #[test]
    fn wait_for_identity_wakes_on_binding() {
        let shared = SharedState::new();
        let producer = {
            let shared = shared.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shared.lock().bind(identity(42, MapperType::Extended));
                shared.notify_binding();
            })
        };

        let bound = shared.wait_for_identity(Duration::from_secs(2));
        producer.join().unwrap();
        assert_eq!(bound.map(|i| i.controller_id), Some(42));
    }
}
