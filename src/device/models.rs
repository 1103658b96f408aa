use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel count for the closed device set. Any code that branches on
/// [`Device`] must be reviewed when this changes.
pub const DEVICE_COUNT: usize = 3;

pub const DEFAULT_BAUD: u32 = 115_200;

/// Logical peripheral identity. Closed set, one serial link each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Pressure generator.
    Pg,
    /// Power supply.
    Psu,
    Pump,
}

impl Device {
    /// Every device, in table order. The array length pins the enum
    /// cardinality to [`DEVICE_COUNT`] at compile time.
    pub const ALL: [Device; DEVICE_COUNT] = [Device::Pg, Device::Psu, Device::Pump];

    pub fn descriptor(self) -> &'static DeviceDescriptor {
        &DEVICE_TABLE[self as usize]
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Device::Pg => "PG",
            Device::Psu => "PSU",
            Device::Pump => "Pump",
        };
        f.write_str(name)
    }
}

/// One entry of the static device identity table: where a logical device
/// lives on the filesystem and how fast it talks. Immutable for the process
/// lifetime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeviceDescriptor {
    pub device: Device,
    /// udev symlink for the physical serial adapter.
    pub path: &'static str,
    pub baud: u32,
}

pub const DEVICE_TABLE: [DeviceDescriptor; DEVICE_COUNT] = [
    DeviceDescriptor {
        device: Device::Pg,
        path: "/dev/ttyPG",
        baud: DEFAULT_BAUD,
    },
    DeviceDescriptor {
        device: Device::Psu,
        path: "/dev/ttyPSU",
        baud: DEFAULT_BAUD,
    },
    DeviceDescriptor {
        device: Device::Pump,
        path: "/dev/ttyPUMP",
        baud: DEFAULT_BAUD,
    },
];
