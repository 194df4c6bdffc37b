use tracing::{debug, warn};

use crate::bridge::{from_engine_value, to_engine_value};
use crate::engine::{EngineValue, MS_DOMAIN};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, HostTensor, Layout, MemoryFormat, ScalarType};
use crate::registry::invoker_for;

use super::dispatch::{arg, IValue, KernelDef, ORT_KERNELS};
use super::write_back;

/// New zero-filled tensor with `self_`'s shape, dtype and options.
///
/// The option overrides are accepted for signature compatibility and not applied.
pub fn zeros_like(
    self_: &HostTensor,
    dtype: Option<ScalarType>,
    layout: Option<Layout>,
    device: Option<Device>,
    pin_memory: Option<bool>,
    memory_format: Option<MemoryFormat>,
) -> BridgeResult<HostTensor> {
    debug!(
        tensor = ?self_,
        ?dtype,
        ?layout,
        ?device,
        ?pin_memory,
        ?memory_format,
        "zeros_like"
    );
    let value = to_engine_value(self_)?;
    let invoker = invoker_for(self_.device())?;
    let allocator = invoker.default_allocator()?;
    let output = EngineValue::allocate(allocator.as_ref(), value.element_type(), value.shape())?;
    output.buffer().fill_zero();
    Ok(from_engine_value(output, self_.options()))
}

/// Zeroes `self_` in place through the engine's `ZeroGradient` operator.
///
/// `self_` keeps its bridged payload; only its buffer contents change, and only after the
/// engine call succeeded.
pub fn zero_(self_: &HostTensor) -> BridgeResult<HostTensor> {
    debug!(tensor = ?self_, "zero_");
    let value = to_engine_value(self_)?;
    let invoker = invoker_for(self_.device())?;
    let allocator = invoker.default_allocator()?;
    let flag = EngineValue::from_slice(allocator.as_ref(), &[], &[1i64])?;

    let outputs = invoker
        .invoke("ZeroGradient", vec![value.clone(), flag], 1, None, MS_DOMAIN)
        .map_err(|err| {
            warn!(error = %err, "ZeroGradient failed");
            BridgeError::invocation("ZeroGradient", err)
        })?;
    write_back("ZeroGradient", &outputs[0], &value)?;
    Ok(self_.clone())
}

fn zeros_like_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let out = zeros_like(
        arg(args, 0).to_tensor()?,
        arg(args, 1).to_opt_scalar_type()?,
        arg(args, 2).to_opt_layout()?,
        arg(args, 3).to_opt_device()?,
        arg(args, 4).to_opt_bool()?,
        arg(args, 5).to_opt_memory_format()?,
    )?;
    Ok(vec![IValue::Tensor(out)])
}

fn zero_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let out = zero_(arg(args, 0).to_tensor()?)?;
    Ok(vec![IValue::Tensor(out)])
}

#[linkme::distributed_slice(ORT_KERNELS)]
static ZEROS_LIKE: KernelDef = KernelDef {
    name: "zeros_like",
    schema: "zeros_like(Tensor self, *, ScalarType? dtype=None, Layout? layout=None, \
             Device? device=None, bool? pin_memory=None, MemoryFormat? memory_format=None) -> Tensor",
    kernel: zeros_like_kernel,
};

#[linkme::distributed_slice(ORT_KERNELS)]
static ZERO: KernelDef = KernelDef {
    name: "zero_",
    schema: "zero_(Tensor(a!) self) -> Tensor(a!)",
    kernel: zero_kernel,
};
