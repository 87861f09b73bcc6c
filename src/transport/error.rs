use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("Socket is not open")]
    NotOpen,

    #[error("Failed to send {what} to {peer}: {source}")]
    Send {
        what: &'static str,
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn receive thread: {0}")]
    Thread(String),
}
