use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::{Result, SerialError};

/// Hard ceiling on one wire frame, payload plus terminator.
pub const MAX_FRAME_LEN: usize = 256;

const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Total time a single write may spend waiting for the port to accept bytes.
const WRITE_BUDGET: Duration = Duration::from_secs(1);

/// Poll slice used while waiting for write readiness.
const WRITE_POLL_SLICE: Duration = Duration::from_millis(50);

/// Frame-safe line transport over one serial link.
///
/// Two implementations exist: [`SerialChannel`] for real hardware and
/// [`crate::serial::FakeChannel`] for tests; callers pick one at construction
/// time.
pub trait Channel: Send {
    /// Write one line, appending the CRLF terminator if the caller omitted it.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Wait up to `timeout` for one complete line.
    ///
    /// `Ok(Some(line))` holds the bytes before the terminator, terminator
    /// stripped. `Ok(None)` means the deadline expired with no complete line;
    /// partially received bytes stay buffered for the next call. `Err` marks a
    /// hard transport fault, including peer disconnect (which also closes the
    /// channel).
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Release the underlying handle. Safe to call more than once.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Line-framed transport over one POSIX serial device.
///
/// Owns the port exclusively; the handle is released on `close()` and on
/// drop. A partial line survives across `read_line` calls in `rx_buffer`
/// until its terminator arrives.
pub struct SerialChannel {
    port: Option<Box<dyn SerialPort>>,
    rx_buffer: Vec<u8>,
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("open", &self.port.is_some())
            .field("rx_buffer", &self.rx_buffer)
            .finish()
    }
}

impl SerialChannel {
    /// Open and configure the device at `path`: raw 8N1, no flow control,
    /// non-blocking under the hood. One shot, no retries; the caller decides
    /// whether a failure is fatal.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(WRITE_POLL_SLICE)
            .open()
            .map_err(|source| SerialError::OpenFailed {
                path: path.to_string(),
                source,
            })?;

        log::info!("Opened serial device {} at {} baud", path, baud);
        Ok(Self {
            port: Some(port),
            rx_buffer: Vec::new(),
        })
    }

    /// Wrap an already-opened port. Used by the pseudo-terminal tests and by
    /// callers that do their own port discovery.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Some(port),
            rx_buffer: Vec::new(),
        }
    }

    /// Pop one complete line off the accumulator, consuming its terminator
    /// and leaving any trailing bytes for the next call.
    fn take_line(&mut self) -> Option<String> {
        let pos = self
            .rx_buffer
            .windows(LINE_TERMINATOR.len())
            .position(|window| window == LINE_TERMINATOR)?;
        let line = String::from_utf8_lossy(&self.rx_buffer[..pos]).into_owned();
        self.rx_buffer.drain(..pos + LINE_TERMINATOR.len());
        Some(line)
    }
}

impl Channel for SerialChannel {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(line.len() + LINE_TERMINATOR.len());
        frame.extend_from_slice(line.as_bytes());
        if !line.ends_with("\r\n") {
            frame.extend_from_slice(LINE_TERMINATOR);
        }

        let give_up = Instant::now() + WRITE_BUDGET;
        let mut total = 0;
        while total < frame.len() {
            let port = self.port.as_mut().ok_or(SerialError::Disconnected)?;
            port.set_timeout(WRITE_POLL_SLICE)?;
            match port.write(&frame[total..]) {
                Ok(0) => {
                    self.close();
                    return Err(SerialError::Disconnected);
                }
                Ok(written) => total += written,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock =>
                {
                    // The port's own poll already waited out the slice; keep
                    // waiting for readiness until the budget runs dry.
                    if Instant::now() >= give_up {
                        log::warn!("Serial write stalled for {:?}, giving up", WRITE_BUDGET);
                        return Err(SerialError::WriteStalled);
                    }
                }
                Err(e) => {
                    self.close();
                    return Err(SerialError::Io(e));
                }
            }
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        // A previous call may have buffered past a line boundary already.
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        if self.port.is_none() {
            return Err(SerialError::Disconnected);
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let port = self.port.as_mut().ok_or(SerialError::Disconnected)?;
            // Shrinking deadline: every partial read shares the same budget.
            port.set_timeout(deadline - now)?;
            match port.read(&mut chunk) {
                Ok(0) => {
                    log::warn!("Serial peer disconnected");
                    self.close();
                    return Err(SerialError::Disconnected);
                }
                Ok(received) => {
                    self.rx_buffer.extend_from_slice(&chunk[..received]);
                    if let Some(line) = self.take_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e)
                    if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock =>
                {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.close();
                    return Err(SerialError::Io(e));
                }
            }
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::debug!("Serial channel closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
