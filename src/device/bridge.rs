use crate::calibration::ObjectCalibration;
use crate::device::buffer::DeviceStateBuffer;
use crate::device::error::DeviceError;
use crate::device::events::{ChangeEvent, EventQueue};
use crate::device::instance::{DeviceInstance, DeviceProperty, PropertyValue};
use crate::mapping::{
    map_sample, DeviceLayout, DeviceObject, EnumFlow, GamepadSnapshot, ObjectFilter,
    ObjectTypeMask,
};
use crate::settings::BridgeSettings;
use crate::state::{EventHandle, SessionIdentity, SharedState};
use crate::transport::TransportHandle;
use chrono::Local;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Not acquired; nothing was written
    Idle,
    /// Acquired but the controller went away; nothing was written and the
    /// last published snapshot was cleared
    InputLost,
    /// The buffer was refreshed; `changed` objects differ from the last read
    Updated { changed: usize },
}

/// The virtual device as the input framework sees it.
///
/// Owns the shared state and the transport. Every call takes `&self`, so a
/// bridge can be shared between the polling thread and whoever releases it.
#[derive(Debug)]
pub struct GamepadBridge {
    settings: BridgeSettings,
    shared: Arc<SharedState>,
    // Never held while taking the state lock
    transport: Mutex<Option<TransportHandle>>,
}

impl GamepadBridge {
    pub fn new(settings: BridgeSettings) -> Self {
        debug!("Creating gamepad bridge with settings: {:?}", settings);
        Self {
            settings,
            shared: SharedState::new(),
            transport: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    fn transport_slot(&self) -> MutexGuard<'_, Option<TransportHandle>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the transport unless it is already running.
    fn ensure_transport(&self) -> Result<(), DeviceError> {
        let stale = {
            let mut slot = self.transport_slot();
            match slot.as_ref() {
                Some(handle) if handle.is_running() => return Ok(()),
                _ => slot.take(),
            }
        };
        // Stopping takes the state lock, so the slot must be free here
        if let Some(mut stale) = stale {
            debug!("Restarting stopped session transport");
            stale.stop();
        }

        // Held across the spawn so concurrent callers never race for the port
        let mut slot = self.transport_slot();
        if slot.is_none() {
            *slot = Some(TransportHandle::spawn(
                self.settings.clone(),
                self.shared.clone(),
            )?);
        }
        Ok(())
    }

    /// Starts the transport and waits for the capture host to name a
    /// controller. Pins the object layout on first success.
    pub fn enumerate(&self) -> Result<DeviceInstance, DeviceError> {
        if self.shared.lock().is_acquired() {
            warn!("Enumerate called while the device is acquired");
            return Err(DeviceError::AlreadyAcquired);
        }

        if let Err(e) = self.ensure_transport() {
            warn!("Session transport unavailable: {}", e);
            return Err(DeviceError::NotPresent);
        }

        if self
            .shared
            .wait_for_identity(self.settings.discovery_timeout())
            .is_none()
        {
            info!("No controller offered within {:?}", self.settings.discovery_timeout());
            return Err(DeviceError::NotPresent);
        }

        let mut state = self.shared.lock();
        let Some(identity) = state.identity().cloned() else {
            return Err(DeviceError::NotPresent);
        };

        if state.pinned_mapper() != Some(identity.mapper_type) {
            debug!("Building {} layout", identity.mapper_type);
            state.layout = Some(DeviceLayout::for_mapper(identity.mapper_type));
            state.previous = GamepadSnapshot::default();
        }

        let instance = DeviceInstance::from_identity(&identity);
        state.instance = Some(instance.clone());
        info!(
            "Enumerated '{}' (controller {}, {} mapping)",
            instance.product_name, identity.controller_id, identity.mapper_type
        );
        Ok(instance)
    }

    /// Registers the notification handle. Acquiring again replaces it.
    pub fn acquire(&self, handle: EventHandle) -> Result<(), DeviceError> {
        let mut state = self.shared.lock();
        if !state.is_bound() {
            state.acquired = false;
            state.notify = None;
            return Err(DeviceError::Unplugged);
        }
        if state.layout.is_none() {
            return Err(DeviceError::NotEnumerated);
        }

        state.notify = Some(handle);
        state.acquired = true;
        info!("Device acquired");
        Ok(())
    }

    /// Derives the calibrated snapshot from the latest raw sample, writes
    /// every object into `buffer` and queues one event per changed object.
    pub fn read<B, Q>(&self, buffer: &mut B, queue: &mut Q) -> Result<ReadOutcome, DeviceError>
    where
        B: DeviceStateBuffer + ?Sized,
        Q: EventQueue + ?Sized,
    {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if !state.acquired {
            return Ok(ReadOutcome::Idle);
        }
        if state.identity.is_none() {
            return Ok(ReadOutcome::InputLost);
        }
        let Some(layout) = state.layout.as_ref() else {
            return Ok(ReadOutcome::Idle);
        };

        let snapshot = map_sample(layout, &state.raw);
        let timestamp = Local::now();
        // Events of one read are simultaneous and share a sequence number
        let sequence = state.sequence.wrapping_add(1);
        let mut changed = 0;

        for object in layout.objects() {
            let value = snapshot.value_of(object.kind);
            buffer.write_object(object, value);

            if value != state.previous.value_of(object.kind) {
                queue.push(ChangeEvent {
                    object_index: object.index,
                    offset: object.offset,
                    value,
                    timestamp,
                    sequence,
                });
                changed += 1;
            }
        }

        state.previous = snapshot;
        if changed > 0 {
            state.sequence = sequence;
            debug!("Read published {} changed objects as #{}", changed, sequence);
            state.signal();
        }
        Ok(ReadOutcome::Updated { changed })
    }

    /// Clears the acquired flag and the handle. Succeeds when never acquired.
    pub fn unacquire(&self) {
        let mut state = self.shared.lock();
        if state.acquired {
            info!("Device unacquired");
        }
        state.acquired = false;
        state.notify = None;
    }

    /// Stops the transport, notifies the capture host if a controller is
    /// still bound and resets the state. Safe to call more than once.
    pub fn release(&self) {
        let handle = self.transport_slot().take();
        if let Some(mut handle) = handle {
            handle.stop();
            info!("Device released");
        }
        self.shared.lock().reset();
        self.shared.notify_binding();
    }

    pub fn is_bound(&self) -> bool {
        self.shared.lock().is_bound()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.shared.lock().identity().cloned()
    }

    /// Snapshot published by the last read.
    pub fn snapshot(&self) -> GamepadSnapshot {
        self.shared.lock().previous
    }

    pub fn property(&self, property: DeviceProperty) -> Result<PropertyValue, DeviceError> {
        let state = self.shared.lock();
        let instance = state.instance.as_ref().ok_or(DeviceError::NotEnumerated)?;
        match (property, state.identity()) {
            // The bound controller may have changed since enumeration
            (DeviceProperty::JoystickId, Some(identity)) => {
                Ok(PropertyValue::Dword(identity.controller_id as u32))
            }
            _ => Ok(instance.property(property)),
        }
    }

    /// Visits the enumerated objects. The callback runs without any lock held.
    pub fn enum_objects<F>(
        &self,
        filter: ObjectFilter,
        mask: ObjectTypeMask,
        callback: F,
    ) -> Result<EnumFlow, DeviceError>
    where
        F: FnMut(&DeviceObject) -> EnumFlow,
    {
        let layout = self
            .shared
            .lock()
            .layout
            .clone()
            .ok_or(DeviceError::NotEnumerated)?;
        Ok(layout.enumerate(filter, mask, callback))
    }

    pub fn object_calibration(&self, index: usize) -> Result<ObjectCalibration, DeviceError> {
        self.with_calibration(index, |calibration| *calibration)
    }

    /// Deadzone of an axis or POV in basis points of the half-range.
    pub fn set_deadzone(&self, index: usize, basis_points: i32) -> Result<(), DeviceError> {
        self.with_calibration(index, |calibration| calibration.set_deadzone(basis_points))?;
        debug!("Object {} deadzone set to {}", index, basis_points);
        Ok(())
    }

    pub fn set_saturation(&self, index: usize, basis_points: i32) -> Result<(), DeviceError> {
        self.with_calibration(index, |calibration| calibration.set_saturation(basis_points))?;
        debug!("Object {} saturation set to {}", index, basis_points);
        Ok(())
    }

    fn with_calibration<T>(
        &self,
        index: usize,
        f: impl FnOnce(&mut ObjectCalibration) -> T,
    ) -> Result<T, DeviceError> {
        let mut state = self.shared.lock();
        let layout = state.layout.as_mut().ok_or(DeviceError::NotEnumerated)?;
        let object = layout
            .object_mut(index)
            .ok_or_else(|| DeviceError::UnknownObject(format!("index {}", index)))?;
        let name = object.name.clone();
        let calibration = object
            .calibration
            .as_mut()
            .ok_or_else(|| DeviceError::UnknownObject(format!("{} has no calibration", name)))?;
        Ok(f(calibration))
    }
}

impl Drop for GamepadBridge {
    fn drop(&mut self) {
        self.release();
    }
}
