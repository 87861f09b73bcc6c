use crate::protocol::codec::GamepadAnnouncement;
use crate::protocol::{decode, encode_discovery_request, encode_release, Datagram, BUFFER_SIZE};
use crate::settings::{BridgeSettings, ReceiveMode};
use crate::state::{BindOutcome, SessionIdentity, SharedState};
use crate::transport::error::TransportError;
use statum::{machine, state};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Transport states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum TransportState {
    Idle,
    Listening,
}

/// Counters reported periodically by the receive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub received: u64,
    pub dropped: u64,
    pub discovery_sent: u64,
}

/// What a single receive attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Datagram,
    Idle,
}

#[machine]
#[derive(Debug)]
pub struct SessionTransport<S: TransportState> {
    settings: BridgeSettings,

    // State shared with the framework-facing calls
    shared: Arc<SharedState>,

    // Bound socket, present once listening
    socket: Option<UdpSocket>,

    stats: TransportStats,
}

// Methods available in all states
impl<S: TransportState> SessionTransport<S> {
    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl SessionTransport<Idle> {
    pub fn create(settings: BridgeSettings, shared: Arc<SharedState>) -> Self {
        debug!("Creating session transport for {}", settings.bind_addr);
        Self::new(settings, shared, None, TransportStats::default())
    }

    /// Binds the socket and applies the receive mode.
    pub fn open(mut self) -> Result<SessionTransport<Listening>, TransportError> {
        let addr = self.settings.bind_addr;
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;

        match self.settings.receive_mode {
            ReceiveMode::NonBlocking => socket.set_nonblocking(true)?,
            ReceiveMode::BlockingTimeout => {
                socket.set_read_timeout(Some(self.settings.poll_interval()))?
            }
        }

        info!(
            "Session transport listening on {} ({:?})",
            socket.local_addr()?,
            self.settings.receive_mode
        );
        self.socket = Some(socket);
        Ok(self.transition())
    }
}

impl SessionTransport<Listening> {
    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::NotOpen)
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, TransportError> {
        Ok(self.socket()?.local_addr()?)
    }

    /// Second handle on the socket, used for sends from outside the loop.
    pub fn control_socket(&self) -> Result<UdpSocket, TransportError> {
        Ok(self.socket()?.try_clone()?)
    }

    pub fn send_discovery(&mut self) -> Result<(), TransportError> {
        let peer = self.settings.peer_addr;
        let request = encode_discovery_request(std::process::id());
        self.socket()?
            .send_to(&request, peer)
            .map_err(|source| TransportError::Send {
                what: "discovery request",
                peer,
                source,
            })?;
        self.stats.discovery_sent += 1;
        debug!("Sent discovery request to {}", peer);
        Ok(())
    }

    pub fn send_release(&self) -> Result<(), TransportError> {
        send_release(self.socket()?, self.settings.peer_addr)
    }

    /// One receive attempt. "No data yet" is a normal outcome.
    pub fn poll_once(&mut self, buffer: &mut [u8]) -> Result<PollOutcome, TransportError> {
        match self.socket()?.recv_from(buffer) {
            Ok((len, from)) => {
                self.stats.received += 1;
                debug!("Received {} bytes from {}", len, from);
                self.dispatch(&buffer[..len]);
                Ok(PollOutcome::Datagram)
            }
            Err(e) if is_idle(e.kind()) => Ok(PollOutcome::Idle),
            Err(e) => Err(TransportError::Socket(e)),
        }
    }

    /// Decodes a datagram and applies it to the shared state.
    pub fn dispatch(&mut self, bytes: &[u8]) {
        let datagram = match decode(bytes) {
            Ok(datagram) => datagram,
            Err(e) => {
                self.stats.dropped += 1;
                debug!("Dropping datagram: {}", e);
                return;
            }
        };

        match datagram {
            Datagram::GamepadInfo(announcement) => self.apply_announcement(announcement),
            Datagram::State {
                ack,
                controller_id,
                sample,
            } => {
                let mut state = self.shared.lock();
                let Some(bound_id) = state.identity().map(|i| i.controller_id) else {
                    debug!("State for controller {} while unbound", controller_id);
                    return;
                };

                if ack != 1 || controller_id != bound_id {
                    warn!(
                        "State datagram for controller {} (ack {}) does not match bound controller {}",
                        controller_id, ack, bound_id
                    );
                    state.unbind();
                    return;
                }

                if state.store_sample(sample) {
                    state.signal();
                }
            }
            Datagram::Release => {
                info!("Capture host released the controller");
                self.shared.lock().unbind();
            }
        }
    }

    fn apply_announcement(&mut self, announcement: Option<GamepadAnnouncement>) {
        {
            let mut state = self.shared.lock();
            match announcement {
                Some(announcement) => {
                    let outcome = state.bind(SessionIdentity {
                        controller_id: announcement.controller_id,
                        mapper_type: announcement.mapper_type,
                        display_name: announcement.name,
                    });
                    if outcome == BindOutcome::MapperConflict {
                        self.stats.dropped += 1;
                    }
                }
                None => {
                    debug!("Capture host has no controller to offer");
                    state.unbind();
                }
            }
        }
        self.shared.notify_binding();
    }

    /// Runs until cancelled or the socket fails.
    pub fn run_receive_loop(&mut self, cancel: &CancellationToken) -> Result<(), TransportError> {
        info!("Starting session transport loop");

        let mut buffer = [0u8; BUFFER_SIZE];
        let keepalive = self.settings.keepalive_interval();
        let poll_interval = self.settings.poll_interval();
        let sleep_when_idle = self.settings.receive_mode == ReceiveMode::NonBlocking;

        if let Err(e) = self.send_discovery() {
            warn!("Initial discovery request failed: {}", e);
        }
        let mut last_discovery = Instant::now();

        let stats_interval = Duration::from_secs(10);
        let mut last_stats = Instant::now();

        while !cancel.is_cancelled() {
            match self.poll_once(&mut buffer) {
                Ok(PollOutcome::Datagram) => {}
                Ok(PollOutcome::Idle) => {
                    if sleep_when_idle {
                        std::thread::sleep(poll_interval);
                    }
                }
                Err(e) => {
                    error!("Session transport receive failed: {}", e);
                    self.shared.lock().unbind();
                    self.shared.notify_binding();
                    return Err(e);
                }
            }

            let bound = self.shared.lock().is_bound();
            if !bound && last_discovery.elapsed() >= keepalive {
                if let Err(e) = self.send_discovery() {
                    warn!("Discovery keepalive failed: {}", e);
                }
                last_discovery = Instant::now();
            }

            if last_stats.elapsed() >= stats_interval {
                debug!(
                    "Transport stats: {} received, {} dropped, {} discovery requests",
                    self.stats.received, self.stats.dropped, self.stats.discovery_sent
                );
                last_stats = Instant::now();
            }
        }

        info!("Session transport loop stopped");
        Ok(())
    }
}

fn is_idle(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::ConnectionReset
    )
}

pub(crate) fn send_release(
    socket: &UdpSocket,
    peer: std::net::SocketAddr,
) -> Result<(), TransportError> {
    socket
        .send_to(&encode_release(), peer)
        .map_err(|source| TransportError::Send {
            what: "release notice",
            peer,
            source,
        })?;
    debug!("Sent release notice to {}", peer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::DeviceLayout;
    use crate::protocol::{encode_gamepad_response, encode_state, MapperType, RawSample};
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn loopback_settings() -> BridgeSettings {
        BridgeSettings {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)),
            ..BridgeSettings::default()
        }
    }

    fn listening() -> (SessionTransport<Listening>, Arc<SharedState>) {
        let shared = SharedState::new();
        let transport = SessionTransport::create(loopback_settings(), shared.clone())
            .open()
            .unwrap();
        (transport, shared)
    }

    fn announce(transport: &mut SessionTransport<Listening>, id: i32, mapper: MapperType) {
        let bytes = encode_gamepad_response(Some(&GamepadAnnouncement {
            controller_id: id,
            mapper_type: mapper,
            name: "Pad".to_string(),
        }));
        transport.dispatch(&bytes);
    }

    fn sample(lx: i16) -> RawSample {
        RawSample {
            buttons: 1,
            dpad: -1,
            thumb_lx: lx,
            ..Default::default()
        }
    }

    #[test]
    fn announcement_binds_identity() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 42, MapperType::Extended);

        let state = shared.lock();
        let identity = state.identity().unwrap();
        assert_eq!(identity.controller_id, 42);
        assert_eq!(identity.display_name, "Pad");
        assert_eq!(identity.mapper_type, MapperType::Extended);
    }

    #[test]
    fn empty_announcement_unbinds() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 42, MapperType::Extended);
        transport.dispatch(&encode_gamepad_response(None));
        assert!(!shared.lock().is_bound());
    }

    #[test]
    fn state_for_bound_controller_is_stored() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 42, MapperType::Extended);
        transport.dispatch(&encode_state(1, 42, &sample(100)));
        assert_eq!(shared.lock().raw(), sample(100));
    }

    #[test]
    fn state_while_unbound_is_ignored() {
        let (mut transport, shared) = listening();
        transport.dispatch(&encode_state(1, 42, &sample(100)));
        assert_eq!(shared.lock().raw(), RawSample::default());
        assert!(!shared.lock().is_bound());
    }

    #[test]
    fn mismatched_id_disconnects_even_when_acquired() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 5, MapperType::Extended);
        transport.dispatch(&encode_state(1, 5, &sample(900)));
        shared.lock().acquired = true;

        transport.dispatch(&encode_state(1, 7, &sample(100)));

        let state = shared.lock();
        assert!(!state.is_bound());
        assert_eq!(state.raw(), RawSample::default());
    }

    #[test]
    fn missing_ack_disconnects() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 5, MapperType::Standard);
        transport.dispatch(&encode_state(0, 5, &sample(100)));
        assert!(!shared.lock().is_bound());
    }

    #[test]
    fn release_from_host_disconnects() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 5, MapperType::Standard);
        transport.dispatch(&encode_release());
        assert!(!shared.lock().is_bound());
    }

    #[test]
    fn malformed_datagrams_are_counted_and_dropped() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 5, MapperType::Standard);
        transport.dispatch(&[]);
        transport.dispatch(&[0xEE, 1, 2]);
        transport.dispatch(&encode_state(1, 5, &sample(1))[..10]);
        assert_eq!(transport.stats().dropped, 3);
        assert!(shared.lock().is_bound());
    }

    #[test]
    fn changed_sample_signals_acquired_handle() {
        let (mut transport, shared) = listening();
        let handle = Arc::new(Notify::new());
        announce(&mut transport, 5, MapperType::Extended);
        {
            let mut state = shared.lock();
            state.acquired = true;
            state.notify = Some(handle.clone());
        }

        transport.dispatch(&encode_state(1, 5, &sample(100)));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let woke = runtime.block_on(async {
            tokio::time::timeout(Duration::from_millis(200), handle.notified())
                .await
                .is_ok()
        });
        assert!(woke);
    }

    #[test]
    fn pinned_layout_rejects_mapper_change() {
        let (mut transport, shared) = listening();
        announce(&mut transport, 5, MapperType::Standard);
        shared.lock().layout = Some(DeviceLayout::for_mapper(MapperType::Standard));

        announce(&mut transport, 5, MapperType::Extended);
        assert!(!shared.lock().is_bound());
        assert_eq!(transport.stats().dropped, 1);
    }

    #[test]
    fn receive_loop_stops_on_cancel() {
        let (mut transport, _shared) = listening();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(transport.run_receive_loop(&cancel).is_ok());
        assert_eq!(transport.stats().discovery_sent, 1);
    }

    // Counts discovery requests reaching `host` within `window`.
    fn discovery_requests(host: &UdpSocket, window: Duration) -> usize {
        let mut buffer = [0u8; BUFFER_SIZE];
        let deadline = Instant::now() + window;
        let mut count = 0;
        while Instant::now() < deadline {
            if let Ok((len, _)) = host.recv_from(&mut buffer) {
                if crate::protocol::decode_discovery_request(&buffer[..len]).is_ok() {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn keepalive_repeats_discovery_until_bound() {
        let host = UdpSocket::bind("127.0.0.1:0").unwrap();
        host.set_read_timeout(Some(Duration::from_millis(10)))
            .unwrap();

        let shared = SharedState::new();
        let settings = BridgeSettings {
            peer_addr: host.local_addr().unwrap(),
            keepalive_interval_ms: 30,
            ..loopback_settings()
        };
        let mut transport = SessionTransport::create(settings, shared.clone())
            .open()
            .unwrap();
        let bridge_addr = transport.local_addr().unwrap();

        let cancel = CancellationToken::new();
        let receiver = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                transport.run_receive_loop(&cancel).unwrap();
                transport.stats()
            })
        };

        // Host not answering yet
        assert!(discovery_requests(&host, Duration::from_millis(250)) >= 2);

        let response = encode_gamepad_response(Some(&GamepadAnnouncement {
            controller_id: 8,
            mapper_type: MapperType::Extended,
            name: "Late Pad".to_string(),
        }));
        host.send_to(&response, bridge_addr).unwrap();
        assert!(shared.wait_for_identity(Duration::from_secs(2)).is_some());

        // Requests already in flight when the bind landed
        discovery_requests(&host, Duration::from_millis(50));
        assert_eq!(discovery_requests(&host, Duration::from_millis(200)), 0);

        cancel.cancel();
        let stats = receiver.join().unwrap();
        assert!(stats.discovery_sent >= 3);
    }
}
