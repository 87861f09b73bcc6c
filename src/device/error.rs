use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No controller is offered by the capture host")]
    NotPresent,

    #[error("Device unplugged: no controller is bound")]
    Unplugged,

    #[error("Device has not been enumerated")]
    NotEnumerated,

    #[error("Device is already acquired")]
    AlreadyAcquired,

    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
