//! Device and stream value types of the host framework.

use std::fmt;

/// Device index; `None` means "unspecified" (the framework's `-1`).
pub type DeviceIndex = Option<i8>;

/// Backend family a device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    Cuda,
    /// Devices served by the bridged execution engine.
    Ort,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Cuda => "cuda",
            DeviceType::Ort => "ort",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    device_type: DeviceType,
    index: DeviceIndex,
}

impl Device {
    pub const fn new(device_type: DeviceType, index: DeviceIndex) -> Self {
        Device { device_type, index }
    }

    pub const fn cpu() -> Self {
        Device::new(DeviceType::Cpu, None)
    }

    pub const fn ort(index: i8) -> Self {
        Device::new(DeviceType::Ort, Some(index))
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    pub fn is_ort(&self) -> bool {
        self.device_type == DeviceType::Ort
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}:{}", self.device_type, index),
            None => write!(f, "{}", self.device_type),
        }
    }
}

/// Stream identifier within a device; only the default stream exists on bridged devices.
pub type StreamId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stream {
    id: StreamId,
    device: Device,
}

impl Stream {
    pub const DEFAULT: StreamId = 0;

    pub const fn new(id: StreamId, device: Device) -> Self {
        Stream { id, device }
    }

    pub const fn default_on(device: Device) -> Self {
        Stream::new(Stream::DEFAULT, device)
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream {} on device {}", self.id, self.device)
    }
}

/// Scheduling hint attached to event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFlag {
    #[default]
    Default,
    BackendDefault,
}

/// Opaque backend event slot; bridged devices never populate it.
pub type EventHandle = Option<std::ptr::NonNull<std::ffi::c_void>>;
