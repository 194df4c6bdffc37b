use std::fmt;
use std::sync::Arc;

use crate::buffer::RawBuffer;

use super::allocator::{Allocator, MemType};
use super::attribute::NodeAttributes;
use super::provider::ExecutionProvider;
use super::status::{EngineError, EngineResult};
use super::value::EngineValue;

/// Per-device execution context: one provider, its allocator and the invocation entry point.
#[derive(Clone)]
pub struct Invoker {
    provider: Arc<dyn ExecutionProvider>,
    device_index: i8,
}

impl Invoker {
    pub fn new(provider: Arc<dyn ExecutionProvider>, device_index: i8) -> Self {
        Invoker {
            provider,
            device_index,
        }
    }

    pub fn current_execution_provider(&self) -> &dyn ExecutionProvider {
        self.provider.as_ref()
    }

    pub fn device_index(&self) -> i8 {
        self.device_index
    }

    /// Allocator used for every value the bridge creates on this device.
    pub fn default_allocator(&self) -> EngineResult<Arc<dyn Allocator>> {
        self.provider.allocator(0, MemType::Default)
    }

    /// Runs `op_name` and checks that exactly `output_count` values come back.
    pub fn invoke(
        &self,
        op_name: &str,
        inputs: Vec<EngineValue>,
        output_count: usize,
        attributes: Option<&NodeAttributes>,
        domain: &str,
    ) -> EngineResult<Vec<EngineValue>> {
        let empty = NodeAttributes::new();
        let attributes = attributes.unwrap_or(&empty);
        let outputs = self
            .provider
            .invoke(op_name, domain, &inputs, attributes)?;
        if outputs.len() != output_count {
            return Err(EngineError::fail(format!(
                "{op_name} produced {} outputs, expected {output_count}",
                outputs.len()
            )));
        }
        Ok(outputs)
    }

    /// Copies `input` into a freshly allocated value with the new `shape`.
    pub fn reshape_copy(&self, input: &EngineValue, shape: &[usize]) -> EngineResult<EngineValue> {
        let numel: usize = shape.iter().product();
        if numel != input.numel() {
            return Err(EngineError::invalid_argument(format!(
                "cannot reshape {:?} ({} elements) into {:?} ({} elements)",
                input.shape(),
                input.numel(),
                shape,
                numel
            )));
        }
        let allocator = self.default_allocator()?;
        let output = EngineValue::allocate(allocator.as_ref(), input.element_type(), shape)?;
        RawBuffer::copy_between(input.buffer(), output.buffer()).map_err(|(from, to)| {
            EngineError::fail(format!("reshape copy of {from} bytes into {to} bytes"))
        })?;
        Ok(output)
    }

    /// Copies `src` into `dst` through the provider's data transfer.
    pub fn copy(&self, src: &EngineValue, dst: &EngineValue) -> EngineResult<()> {
        self.provider.copy_tensor(src, dst)
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("provider", &self.provider.provider_type())
            .field("device_index", &self.device_index)
            .finish()
    }
}
