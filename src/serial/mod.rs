pub mod channel;
pub mod fake;
pub mod protocol;

pub use channel::{Channel, SerialChannel, MAX_FRAME_LEN};
pub use fake::{FakeChannel, FakeState, ReadScript};
pub use protocol::{Command, Response};

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("peer closed the serial link")]
    Disconnected,

    #[error("write stalled waiting for the port to become ready")]
    WriteStalled,

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
