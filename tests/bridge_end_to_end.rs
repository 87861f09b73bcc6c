//! Drives a real bridge over loopback UDP against a fake capture host.

use padbridge::device::{DeviceError, DeviceProperty, PropertyValue};
use padbridge::mapping::Axis;
use padbridge::protocol::codec::GamepadAnnouncement;
use padbridge::protocol::{
    decode_discovery_request, encode_gamepad_response, encode_state, MapperType, RawSample,
    BUFFER_SIZE, REQUEST_CODE_RELEASE_GAMEPAD,
};
use padbridge::{
    BridgeSettings, BufferedEventQueue, ChangeEvent, EventQueue, GamepadBridge, JoyStateBuffer,
    ReadOutcome,
};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

struct FakeHost {
    socket: UdpSocket,
}

impl FakeHost {
    fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(3)))
            .unwrap();
        Self { socket }
    }

    fn settings(&self) -> BridgeSettings {
        BridgeSettings {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            peer_addr: self.socket.local_addr().unwrap(),
            ..BridgeSettings::default()
        }
    }

    /// Answers the next discovery request and returns the bridge address.
    fn answer_discovery(&self, controller_id: i32, mapper_type: MapperType, name: &str) -> SocketAddr {
        let mut buffer = [0u8; BUFFER_SIZE];
        loop {
            let (len, from) = self.socket.recv_from(&mut buffer).unwrap();
            if decode_discovery_request(&buffer[..len]).is_ok() {
                let response = encode_gamepad_response(Some(&GamepadAnnouncement {
                    controller_id,
                    mapper_type,
                    name: name.to_string(),
                }));
                self.socket.send_to(&response, from).unwrap();
                return from;
            }
        }
    }

    fn push(&self, bridge: SocketAddr, controller_id: i32, sample: &RawSample) {
        self.socket
            .send_to(&encode_state(1, controller_id, sample), bridge)
            .unwrap();
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn wait_for_signal(handle: &Notify) -> bool {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    runtime.block_on(async {
        tokio::time::timeout(Duration::from_secs(2), handle.notified())
            .await
            .is_ok()
    })
}

/// Enumerates against the host, which answers from a helper thread.
fn enumerate_with(host: &Arc<FakeHost>, bridge: &GamepadBridge, id: i32, mapper: MapperType) -> SocketAddr {
    let answering = {
        let host = host.clone();
        thread::spawn(move || host.answer_discovery(id, mapper, "Pad"))
    };
    let instance = bridge.enumerate().unwrap();
    assert_eq!(instance.product_name, "Pad");
    assert_eq!(instance.controller_id, id);
    answering.join().unwrap()
}

#[test]
fn discovery_state_and_read() {
    let host = Arc::new(FakeHost::bind());
    let bridge = GamepadBridge::new(host.settings());
    let bridge_addr = enumerate_with(&host, &bridge, 42, MapperType::Extended);

    assert_eq!(
        bridge.property(DeviceProperty::InstanceName).unwrap(),
        PropertyValue::Text("Pad".to_string())
    );

    let handle = Arc::new(Notify::new());
    bridge.acquire(handle.clone()).unwrap();

    host.push(
        bridge_addr,
        42,
        &RawSample {
            buttons: 0b1,
            dpad: -1,
            thumb_lx: 100,
            ..Default::default()
        },
    );
    assert!(wait_for_signal(&handle));

    let mut buffer = JoyStateBuffer::default();
    let mut queue = BufferedEventQueue::new(64);
    let outcome = bridge.read(&mut buffer, &mut queue).unwrap();

    // X, Y, Z, Rx, Ry, POV and button 0 all differ from the zeroed start
    assert_eq!(outcome, ReadOutcome::Updated { changed: 7 });
    assert_eq!(buffer.axis(Axis::X), 32_868);
    assert_eq!(buffer.axis(Axis::Y), 32_768);
    assert_eq!(buffer.axis(Axis::Z), 32_768);
    assert_eq!(buffer.pov(), -1);
    assert_eq!(buffer.button(0), 0x80);
    assert_eq!(buffer.button(1), 0);

    let events: Vec<_> = queue.drain().collect();
    let indices: Vec<usize> = events.iter().map(|e| e.object_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 6]);
    assert!(events.iter().all(|event| event.sequence == events[0].sequence));

    let snapshot = bridge.snapshot();
    assert!(snapshot.is_pressed(0));
    assert_eq!(snapshot.pov, -1);

    bridge.release();
    bridge.release();
}

#[test]
fn mismatched_controller_id_unbinds() {
    let host = Arc::new(FakeHost::bind());
    let bridge = GamepadBridge::new(host.settings());
    let bridge_addr = enumerate_with(&host, &bridge, 5, MapperType::Standard);
    let handle = Arc::new(Notify::new());
    bridge.acquire(handle.clone()).unwrap();

    host.push(
        bridge_addr,
        5,
        &RawSample {
            thumb_lx: 2000,
            ..Default::default()
        },
    );
    assert!(wait_for_signal(&handle));

    host.push(bridge_addr, 7, &RawSample::default());
    assert!(wait_until(Duration::from_secs(2), || !bridge.is_bound()));

    let mut buffer = JoyStateBuffer::default();
    let mut events: Vec<ChangeEvent> = Vec::new();
    assert_eq!(
        bridge.read(&mut buffer, &mut events).unwrap(),
        ReadOutcome::InputLost
    );
    assert!(events.is_empty());

    assert!(matches!(
        bridge.acquire(handle),
        Err(DeviceError::Unplugged)
    ));
}

#[test]
fn release_notifies_host_once() {
    let host = Arc::new(FakeHost::bind());
    let bridge = GamepadBridge::new(host.settings());
    enumerate_with(&host, &bridge, 9, MapperType::Extended);

    bridge.unacquire();
    bridge.release();

    let mut buffer = [0u8; BUFFER_SIZE];
    let (_, _) = host.socket.recv_from(&mut buffer).unwrap();
    assert_eq!(buffer[0], REQUEST_CODE_RELEASE_GAMEPAD);

    bridge.release();
    assert!(!bridge.is_bound());
    assert!(matches!(
        bridge.property(DeviceProperty::ProductName),
        Err(DeviceError::NotEnumerated)
    ));
}

#[test]
fn no_host_means_not_present() {
    let host = FakeHost::bind();
    let bridge = GamepadBridge::new(BridgeSettings {
        discovery_timeout_ms: 100,
        ..host.settings()
    });
    assert!(matches!(bridge.enumerate(), Err(DeviceError::NotPresent)));
    bridge.release();
}

#[test]
fn queue_accepts_events_through_trait() {
    let mut queue = BufferedEventQueue::new(1);
    let event = ChangeEvent {
        object_index: 0,
        offset: 0,
        value: 1,
        timestamp: chrono::Local::now(),
        sequence: 1,
    };
    EventQueue::push(&mut queue, event.clone());
    EventQueue::push(&mut queue, event);
    assert!(queue.take_overflow());
}
