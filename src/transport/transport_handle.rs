use crate::settings::BridgeSettings;
use crate::state::SharedState;
use crate::transport::error::TransportError;
use crate::transport::session::{send_release, SessionTransport};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns the receive thread and its socket.
///
/// The socket is bound before the thread starts, so a port conflict is
/// reported to the caller instead of dying inside the thread.
#[derive(Debug)]
pub struct TransportHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    control: UdpSocket,
    peer: SocketAddr,
    local_addr: SocketAddr,
    shared: Arc<SharedState>,
    shutdown_timeout: Duration,
}

impl TransportHandle {
    pub fn spawn(settings: BridgeSettings, shared: Arc<SharedState>) -> Result<Self, TransportError> {
        info!("Spawning session transport");

        let peer = settings.peer_addr;
        let shutdown_timeout = settings.shutdown_timeout();
        let mut transport = SessionTransport::create(settings, shared.clone()).open()?;
        let control = transport.control_socket()?;
        let local_addr = transport.local_addr()?;

        let cancel = CancellationToken::new();
        let thread_cancel = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("padbridge-transport".to_string())
            .spawn(move || {
                if let Err(e) = transport.run_receive_loop(&thread_cancel) {
                    error!("Session transport terminated: {}", e);
                }
                debug!("Final transport stats: {:?}", transport.stats());
            })
            .map_err(|e| TransportError::Thread(e.to_string()))?;

        debug!("Receive thread spawned for {}", local_addr);
        Ok(Self {
            cancel,
            thread: Some(thread),
            control,
            peer,
            local_addr,
            shared,
            shutdown_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the receive thread, telling the capture host first if a
    /// controller is still bound. Safe to call more than once.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        let bound = self.shared.lock().is_bound();
        if bound {
            if let Err(e) = send_release(&self.control, self.peer) {
                warn!("Could not notify capture host: {}", e);
            }
        }

        self.cancel.cancel();

        let deadline = Instant::now() + self.shutdown_timeout;
        while !thread.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        if thread.is_finished() {
            if thread.join().is_err() {
                error!("Receive thread panicked");
            }
            info!("Session transport stopped");
        } else {
            warn!(
                "Receive thread did not exit within {:?}; detaching it",
                self.shutdown_timeout
            );
        }
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
