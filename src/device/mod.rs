pub mod manager;
pub mod models;

pub use manager::RpcManager;
pub use models::{Device, DeviceDescriptor, DEFAULT_BAUD, DEVICE_COUNT, DEVICE_TABLE};

use std::time::Duration;

use crate::serial::{SerialError, MAX_FRAME_LEN};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("connection to {device} failed: {source}")]
    ConnectionFailed {
        device: Device,
        #[source]
        source: SerialError,
    },

    #[error("transport not connected")]
    NotConnected,

    #[error("unknown device: {0}")]
    UnknownDevice(Device),

    #[error("command frame is {len} bytes, limit is {MAX_FRAME_LEN}")]
    FrameTooLarge { len: usize },

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("malformed response line: {0:?}")]
    MalformedResponse(String),

    #[error("transport failure on {device}: {source}")]
    Transport {
        device: Device,
        #[source]
        source: SerialError,
    },
}

impl RpcError {
    /// Whether calling protocol logic may sensibly retry after this error.
    /// Frame-size and unknown-device violations are programming errors and
    /// are never retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RpcError::Timeout(_) | RpcError::MalformedResponse(_) | RpcError::Transport { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
