use std::sync::Arc;

use crate::buffer::RawBuffer;

use super::allocator::{Allocator, MemType};
use super::attribute::NodeAttributes;
use super::status::{EngineError, EngineResult};
use super::value::EngineValue;

/// Default operator domain.
pub const ONNX_DOMAIN: &str = "";
/// Domain of the engine's contributed operators (`ZeroGradient`, optimizers).
pub const MS_DOMAIN: &str = "com.microsoft";

/// Execution provider contract consumed by the bridge.
///
/// Implementations own their allocators and kernels; the bridge only asks for an allocator
/// and submits named operator calls.
pub trait ExecutionProvider: Send + Sync {
    /// Provider identifier (e.g. `"cpu"`).
    fn provider_type(&self) -> &str;

    /// Returns the allocator for `device_id` and memory kind.
    fn allocator(&self, device_id: i32, mem_type: MemType) -> EngineResult<Arc<dyn Allocator>>;

    /// Runs a single named operator and returns its outputs in order.
    fn invoke(
        &self,
        op_name: &str,
        domain: &str,
        inputs: &[EngineValue],
        attributes: &NodeAttributes,
    ) -> EngineResult<Vec<EngineValue>>;

    /// Copies the contents of `src` into the buffer of `dst`.
    fn copy_tensor(&self, src: &EngineValue, dst: &EngineValue) -> EngineResult<()> {
        if src.element_type() != dst.element_type() {
            return Err(EngineError::invalid_argument(format!(
                "copy between mismatched element types {} and {}",
                src.element_type(),
                dst.element_type()
            )));
        }
        if src.shape() != dst.shape() {
            return Err(EngineError::invalid_argument(format!(
                "copy between mismatched shapes {:?} and {:?}",
                src.shape(),
                dst.shape()
            )));
        }
        RawBuffer::copy_between(src.buffer(), dst.buffer()).map_err(|(from, to)| {
            EngineError::fail(format!("copy from {from} byte buffer into {to} byte buffer"))
        })
    }
}
