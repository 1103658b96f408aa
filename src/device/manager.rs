use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::fault::FaultMonitor;
use crate::serial::{self, Channel, Command, Response, SerialChannel, MAX_FRAME_LEN};

use super::{Device, DeviceDescriptor, Result, RpcError, DEVICE_TABLE};

type BoxedChannel = Box<dyn Channel>;

type ChannelOpener = Box<dyn Fn(&DeviceDescriptor) -> serial::Result<BoxedChannel> + Send + Sync>;

/// Serial RPC multiplexer: owns one channel per physical device and provides
/// the connect / send / await contract to protocol execution logic.
///
/// Calls for different devices may run concurrently; each channel sits behind
/// its own mutex and the device map is fixed once `connect` succeeds. The
/// design assumes one command in flight per device at a time, so interleaving
/// two send/await pairs against the same device needs external serialization.
pub struct RpcManager {
    channels: HashMap<Device, Mutex<BoxedChannel>>,
    connected: bool,
    faults: Arc<FaultMonitor>,
    opener: ChannelOpener,
}

impl RpcManager {
    /// Manager backed by real POSIX serial channels.
    pub fn new(faults: Arc<FaultMonitor>) -> Self {
        Self::with_opener(
            faults,
            Box::new(|desc: &DeviceDescriptor| {
                SerialChannel::open(desc.path, desc.baud).map(|ch| Box::new(ch) as BoxedChannel)
            }),
        )
    }

    /// Manager with an injected channel opener. Tests use this to substitute
    /// in-memory channels without touching connect semantics.
    pub fn with_opener(faults: Arc<FaultMonitor>, opener: ChannelOpener) -> Self {
        Self {
            channels: HashMap::new(),
            connected: false,
            faults,
            opener,
        }
    }

    /// Manager wired directly from pre-opened channels, already connected.
    pub fn with_channels(
        faults: Arc<FaultMonitor>,
        channels: HashMap<Device, BoxedChannel>,
    ) -> Self {
        let mut manager = Self::with_opener(
            faults,
            Box::new(|desc: &DeviceDescriptor| {
                SerialChannel::open(desc.path, desc.baud).map(|ch| Box::new(ch) as BoxedChannel)
            }),
        );
        manager.channels = channels
            .into_iter()
            .map(|(device, channel)| (device, Mutex::new(channel)))
            .collect();
        manager.connected = true;
        manager
    }

    /// Open a channel for every entry of the device identity table.
    ///
    /// All-or-nothing: on the first failure every already-open channel is
    /// released, the fault is reported once, and the whole connect fails.
    /// Idempotent when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        self.channels.clear();
        for desc in &DEVICE_TABLE {
            match (self.opener)(desc) {
                Ok(channel) => {
                    self.channels.insert(desc.device, Mutex::new(channel));
                }
                Err(source) => {
                    self.channels.clear();
                    let message =
                        format!("serial device {} open failed: {}", desc.device, source);
                    self.faults.notify_failure(&message);
                    return Err(RpcError::ConnectionFailed {
                        device: desc.device,
                        source,
                    });
                }
            }
        }

        log::info!("Connected {} serial channels", self.channels.len());
        self.connected = true;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Serialize and write one command frame to the device's channel.
    ///
    /// An oversized frame or an unknown device is a programming error and is
    /// rejected before any I/O; a write fault is escalated and surfaced as a
    /// transport failure.
    pub fn send_command(&self, device: Device, command: &Command) -> Result<()> {
        if !self.connected {
            return Err(RpcError::NotConnected);
        }
        let channel = self
            .channels
            .get(&device)
            .ok_or(RpcError::UnknownDevice(device))?;

        let wire = command.to_wire();
        if wire.len() > MAX_FRAME_LEN {
            return Err(RpcError::FrameTooLarge { len: wire.len() });
        }

        if let Err(source) = lock_channel(channel).write_line(&wire) {
            let message = format!("write to {} failed: {}", device, source);
            self.faults.notify_failure(&message);
            return Err(RpcError::Transport { device, source });
        }
        Ok(())
    }

    /// Block up to `timeout` for one response line from the device.
    ///
    /// The three failure outcomes stay distinguishable: `Timeout` when no
    /// line arrived, `MalformedResponse` when a line arrived but did not
    /// parse, `Transport` on a hard fault (also escalated).
    pub fn await_response(&self, device: Device, timeout: Duration) -> Result<Response> {
        if !self.connected {
            return Err(RpcError::NotConnected);
        }
        let channel = self
            .channels
            .get(&device)
            .ok_or(RpcError::UnknownDevice(device))?;

        match lock_channel(channel).read_line(timeout) {
            Ok(Some(line)) => {
                Response::from_wire(&line).ok_or_else(|| RpcError::MalformedResponse(line))
            }
            Ok(None) => Err(RpcError::Timeout(timeout)),
            Err(source) => {
                let message = format!("read from {} failed: {}", device, source);
                self.faults.notify_failure(&message);
                Err(RpcError::Transport { device, source })
            }
        }
    }

    /// One full round trip: send, then await the response under `timeout`.
    pub fn round_trip(
        &self,
        device: Device,
        command: &Command,
        timeout: Duration,
    ) -> Result<Response> {
        self.send_command(device, command)?;
        self.await_response(device, timeout)
    }

    /// Devices with a live channel, for diagnostics.
    pub fn devices(&self) -> Vec<Device> {
        self.channels.keys().copied().collect()
    }
}

fn lock_channel(channel: &Mutex<BoxedChannel>) -> MutexGuard<'_, BoxedChannel> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}
