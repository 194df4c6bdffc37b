use std::fmt;

use crate::buffer::{BufferRef, RawBuffer};

use super::status::EngineResult;

/// Memory kind requested from an execution provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemType {
    CpuInput,
    CpuOutput,
    #[default]
    Default,
}

/// Describes where an allocator places its buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub name: String,
    pub device_id: i32,
    pub mem_type: MemType,
}

impl MemoryInfo {
    pub fn new(name: impl Into<String>, device_id: i32, mem_type: MemType) -> Self {
        MemoryInfo {
            name: name.into(),
            device_id,
            mem_type,
        }
    }
}

impl fmt::Display for MemoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({:?})", self.name, self.device_id, self.mem_type)
    }
}

/// Source of owning buffers for engine values.
pub trait Allocator: Send + Sync {
    fn info(&self) -> &MemoryInfo;

    /// Returns a zero-initialised buffer of exactly `len` bytes.
    fn alloc(&self, len: usize) -> EngineResult<BufferRef>;
}

/// Allocator backed by ordinary host memory.
#[derive(Debug, Clone)]
pub struct HostAllocator {
    info: MemoryInfo,
}

impl HostAllocator {
    pub fn new(name: impl Into<String>, device_id: i32, mem_type: MemType) -> Self {
        HostAllocator {
            info: MemoryInfo::new(name, device_id, mem_type),
        }
    }
}

impl Allocator for HostAllocator {
    fn info(&self) -> &MemoryInfo {
        &self.info
    }

    fn alloc(&self, len: usize) -> EngineResult<BufferRef> {
        Ok(RawBuffer::zeroed(len))
    }
}
