//! Tensor construction options: dtype, device, layout and memory hints.

use super::device::Device;
use super::scalar_type::ScalarType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    #[default]
    Strided,
    Sparse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryFormat {
    #[default]
    Contiguous,
    Preserve,
    ChannelsLast,
}

/// Partially specified construction options; unset fields fall back to framework defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorOptions {
    dtype: Option<ScalarType>,
    device: Option<Device>,
    layout: Option<Layout>,
    pinned_memory: Option<bool>,
}

impl TensorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dtype(mut self, dtype: ScalarType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_pinned_memory(mut self, pinned: bool) -> Self {
        self.pinned_memory = Some(pinned);
        self
    }

    /// Scalar type, defaulting to `Float`.
    pub fn dtype(&self) -> ScalarType {
        self.dtype.unwrap_or_default()
    }

    /// Device, defaulting to the CPU.
    pub fn device(&self) -> Device {
        self.device.unwrap_or(Device::cpu())
    }

    pub fn layout(&self) -> Layout {
        self.layout.unwrap_or_default()
    }

    pub fn pinned_memory(&self) -> bool {
        self.pinned_memory.unwrap_or(false)
    }
}

/// Shorthand for `TensorOptions::new().with_device(device)`.
pub fn device(device: Device) -> TensorOptions {
    TensorOptions::new().with_device(device)
}
