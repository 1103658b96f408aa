pub mod device;
pub mod fault;
pub mod serial;

pub use device::{Device, DeviceDescriptor, RpcError, RpcManager, DEVICE_COUNT, DEVICE_TABLE};
pub use fault::FaultMonitor;
pub use serial::{Channel, Command, Response, SerialChannel, SerialError, MAX_FRAME_LEN};
