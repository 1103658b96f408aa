//! Scriptable in-memory channel for exercising the RPC layer without
//! hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Channel, Result, SerialError};

/// One scripted outcome for a `read_line` call.
pub enum ReadScript {
    /// A complete line arrives, terminator already stripped.
    Line(String),
    /// The deadline expires with no complete line.
    Silence,
    /// The peer hangs up; the channel closes itself.
    Disconnect,
    /// A hard I/O fault.
    IoError,
}

#[derive(Default)]
struct FakeInner {
    written: Vec<String>,
    reads: VecDeque<ReadScript>,
    fail_writes: bool,
    open: bool,
    dropped: bool,
}

/// Cloneable handle onto a [`FakeChannel`]'s state.
///
/// Tests keep the handle after moving the channel into an `RpcManager`, so
/// they can script reads and observe writes (and drops) from the outside.
#[derive(Clone, Default)]
pub struct FakeState(Arc<Mutex<FakeInner>>);

impl FakeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the channel half, marking it open.
    pub fn channel(&self) -> FakeChannel {
        self.lock().open = true;
        FakeChannel {
            state: self.clone(),
        }
    }

    /// Every frame observed on the wire, terminators included.
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    pub fn last_written(&self) -> Option<String> {
        self.lock().written.last().cloned()
    }

    /// Queue the outcome of the next unscripted `read_line`.
    pub fn push_read(&self, outcome: ReadScript) {
        self.lock().reads.push_back(outcome);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Whether the channel half has been dropped (e.g. released during a
    /// connect rollback).
    pub fn was_dropped(&self) -> bool {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, FakeInner> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct FakeChannel {
    state: FakeState,
}

impl Channel for FakeChannel {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let mut inner = self.state.lock();
        if !inner.open {
            return Err(SerialError::Disconnected);
        }
        if inner.fail_writes {
            return Err(SerialError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        let mut frame = line.to_string();
        if !frame.ends_with("\r\n") {
            frame.push_str("\r\n");
        }
        inner.written.push(frame);
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
        let mut inner = self.state.lock();
        if !inner.open {
            return Err(SerialError::Disconnected);
        }
        match inner.reads.pop_front() {
            Some(ReadScript::Line(line)) => Ok(Some(line)),
            Some(ReadScript::Silence) | None => Ok(None),
            Some(ReadScript::Disconnect) => {
                inner.open = false;
                Err(SerialError::Disconnected)
            }
            Some(ReadScript::IoError) => Err(SerialError::Io(io::Error::new(
                io::ErrorKind::Other,
                "scripted read failure",
            ))),
        }
    }

    fn close(&mut self) {
        self.state.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        let mut inner = self.state.lock();
        inner.open = false;
        inner.dropped = true;
    }
}
