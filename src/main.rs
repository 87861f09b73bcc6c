use color_eyre::{eyre::eyre, Result};
use padbridge::device::{DeviceError, GamepadBridge};
use padbridge::protocol::codec::GamepadAnnouncement;
use padbridge::protocol::{
    decode_discovery_request, encode_gamepad_response, encode_state, MapperType, RawSample,
    BUFFER_SIZE, REQUEST_CODE_RELEASE_GAMEPAD,
};
use padbridge::{BridgeSettings, BufferedEventQueue, JoyStateBuffer, ReadOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const CONFIG_DIR: &str = "padbridge";
const CONFIG_FILE: &str = "bridge.toml";

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = load_settings().await?;
    info!(
        "Bridge on {}, capture host at {}",
        settings.bind_addr, settings.peer_addr
    );

    let cancel = CancellationToken::new();
    if std::env::args().any(|arg| arg == "--simulate") {
        info!("Starting simulated capture host");
        let simulator = CaptureSimulator::bind(&settings).await?;
        tokio::spawn(simulator.run(cancel.clone()));
    }

    let bridge = Arc::new(GamepadBridge::new(settings.clone()));

    tokio::select! {
        result = monitor(bridge.clone(), &settings) => {
            if let Err(e) = result {
                error!("Monitor stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    cancel.cancel();
    bridge.unacquire();
    let releasing = bridge.clone();
    tokio::task::spawn_blocking(move || releasing.release()).await?;
    info!("Bridge released");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let level = log_level(std::env::var("RUST_LOG").ok().as_deref());
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
    debug!("Logging at {}", level);
    Ok(())
}

/// Plain level names only (`debug`, `trace`, ...); anything else logs at info.
fn log_level(value: Option<&str>) -> Level {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(Level::INFO)
}

fn config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

async fn load_settings() -> Result<BridgeSettings> {
    let path = config_path();

    if !tokio::fs::try_exists(&path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
    {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(BridgeSettings::default());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| eyre!("Failed to read config file: {}", e))?;
    let settings =
        toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
    info!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Enumerates and acquires the bridge, then logs every change event.
/// Goes back to enumeration whenever the controller goes away.
async fn monitor(bridge: Arc<GamepadBridge>, settings: &BridgeSettings) -> Result<()> {
    let notify = Arc::new(Notify::new());
    let mut buffer = JoyStateBuffer::default();
    let mut queue = BufferedEventQueue::new(settings.event_queue_capacity);

    loop {
        let enumerating = bridge.clone();
        let instance = match tokio::task::spawn_blocking(move || enumerating.enumerate()).await? {
            Ok(instance) => instance,
            Err(DeviceError::NotPresent) => {
                info!("Waiting for a controller");
                tokio::time::sleep(settings.keepalive_interval()).await;
                continue;
            }
            Err(e) => return Err(eyre!("Enumeration failed: {}", e)),
        };

        info!(
            "Found '{}' (vid {:04x}, pid {:04x}, {} mapping)",
            instance.product_name, instance.vendor_id, instance.product_id, instance.mapper_type
        );

        match bridge.acquire(notify.clone()) {
            Ok(()) => {}
            Err(DeviceError::Unplugged) => continue,
            Err(e) => return Err(eyre!("Acquire failed: {}", e)),
        }

        let mut status = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = notify.notified() => {
                    match bridge.read(&mut buffer, &mut queue) {
                        Ok(ReadOutcome::Updated { changed }) if changed > 0 => {
                            for event in queue.drain() {
                                info!(
                                    "#{} object {} (offset {}) = {} at {}",
                                    event.sequence,
                                    event.object_index,
                                    event.offset,
                                    event.value,
                                    event.timestamp.format("%H:%M:%S%.3f")
                                );
                            }
                            if queue.take_overflow() {
                                warn!("Change events were dropped");
                            }
                        }
                        Ok(ReadOutcome::InputLost) => {
                            warn!("Input lost");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Read failed: {}", e),
                    }
                }
                _ = status.tick() => {
                    if !bridge.is_bound() {
                        warn!("Controller lost");
                        break;
                    }
                    debug!("Snapshot: {:?}", bridge.snapshot());
                }
            }
        }

        bridge.unacquire();
    }
}

/// Plays the capture host over loopback so the bridge can be exercised
/// without one.
struct CaptureSimulator {
    socket: UdpSocket,
    announcement: GamepadAnnouncement,
}

impl CaptureSimulator {
    async fn bind(settings: &BridgeSettings) -> Result<Self> {
        let socket = UdpSocket::bind(settings.peer_addr)
            .await
            .map_err(|e| eyre!("Failed to bind simulator on {}: {}", settings.peer_addr, e))?;
        Ok(Self {
            socket,
            announcement: GamepadAnnouncement {
                controller_id: 1,
                mapper_type: MapperType::Extended,
                name: "Simulated Pad".to_string(),
            },
        })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut buffer = [0u8; BUFFER_SIZE];
        let mut bridge = None;
        let mut frames = tokio::time::interval(Duration::from_millis(50));
        let mut step: i32 = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buffer) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("Simulator receive failed: {}", e);
                            continue;
                        }
                    };
                    if buffer.first() == Some(&REQUEST_CODE_RELEASE_GAMEPAD) {
                        info!("Simulator: bridge released the controller");
                        bridge = None;
                        continue;
                    }
                    if let Ok(request) = decode_discovery_request(&buffer[..len]) {
                        debug!("Simulator: discovery from process {}", request.process_id);
                        let response = encode_gamepad_response(Some(&self.announcement));
                        if let Err(e) = self.socket.send_to(&response, from).await {
                            warn!("Simulator send failed: {}", e);
                        }
                        bridge = Some(from);
                    }
                }
                _ = frames.tick() => {
                    let Some(target) = bridge else { continue };
                    step = (step + 1) % 64;
                    let frame = encode_state(1, self.announcement.controller_id, &simulated_sample(step));
                    if let Err(e) = self.socket.send_to(&frame, target).await {
                        warn!("Simulator send failed: {}", e);
                    }
                }
            }
        }
        debug!("Simulator stopped");
    }
}

// Triangle sweep on the left stick, d-pad turning every 8 steps, A held
// during the second half.
fn simulated_sample(step: i32) -> RawSample {
    let phase = if step < 32 { step } else { 63 - step };
    RawSample {
        buttons: if step >= 32 { 1 } else { 0 },
        dpad: (step / 8) as i8,
        thumb_lx: (phase * 2048 - 32_768).clamp(-32_768, 32_767) as i16,
        thumb_ly: 0,
        thumb_rx: 0,
        thumb_ry: 0,
    }
}
