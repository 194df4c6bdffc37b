use tracing::debug;

use crate::bridge::{from_engine_value, to_engine_type};
use crate::engine::EngineValue;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{self, HostTensor, Layout, MemoryFormat, ScalarType, TensorOptions};
use crate::registry::invoker_for;

use super::dispatch::{arg, IValue, KernelDef, ORT_KERNELS};
use super::shape::to_dims;

fn allocate(size: &[i64], options: TensorOptions) -> BridgeResult<HostTensor> {
    let dims = to_dims(size)?;
    let element_type = to_engine_type(options.dtype())?;
    let invoker = invoker_for(options.device())?;
    let allocator = invoker.default_allocator()?;
    let value = EngineValue::allocate(allocator.as_ref(), element_type, &dims)?;
    Ok(from_engine_value(value, options))
}

/// Allocates an uninitialised tensor on the device named by `options`.
///
/// The engine allocator hands out zeroed buffers, but callers must not rely on it.
pub fn empty(
    size: &[i64],
    options: TensorOptions,
    memory_format: Option<MemoryFormat>,
) -> BridgeResult<HostTensor> {
    debug!(?size, ?options, ?memory_format, "empty");
    allocate(size, options)
}

/// Allocates like [`empty`]. `stride` is ignored and the result is contiguous.
pub fn empty_strided(
    size: &[i64],
    stride: &[i64],
    dtype: Option<ScalarType>,
    layout: Option<Layout>,
    device: Option<host::Device>,
    pin_memory: Option<bool>,
) -> BridgeResult<HostTensor> {
    debug!(
        ?size,
        ?stride,
        ?dtype,
        ?layout,
        ?device,
        ?pin_memory,
        "empty_strided"
    );
    let device = device.ok_or(BridgeError::MissingRequiredOption("device"))?;
    if let Some(layout) = layout.filter(|layout| *layout != Layout::Strided) {
        return Err(BridgeError::UnsupportedLayout(layout));
    }
    let options = host::device(device).with_dtype(dtype.unwrap_or_default());
    allocate(size, options)
}

fn empty_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let mut options = TensorOptions::new();
    if let Some(dtype) = arg(args, 1).to_opt_scalar_type()? {
        options = options.with_dtype(dtype);
    }
    if let Some(layout) = arg(args, 2).to_opt_layout()? {
        options = options.with_layout(layout);
    }
    if let Some(device) = arg(args, 3).to_opt_device()? {
        options = options.with_device(device);
    }
    if let Some(pinned) = arg(args, 4).to_opt_bool()? {
        options = options.with_pinned_memory(pinned);
    }
    let out = empty(
        arg(args, 0).to_int_list()?,
        options,
        arg(args, 5).to_opt_memory_format()?,
    )?;
    Ok(vec![IValue::Tensor(out)])
}

fn empty_strided_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let out = empty_strided(
        arg(args, 0).to_int_list()?,
        arg(args, 1).to_int_list()?,
        arg(args, 2).to_opt_scalar_type()?,
        arg(args, 3).to_opt_layout()?,
        arg(args, 4).to_opt_device()?,
        arg(args, 5).to_opt_bool()?,
    )?;
    Ok(vec![IValue::Tensor(out)])
}

#[linkme::distributed_slice(ORT_KERNELS)]
static EMPTY: KernelDef = KernelDef {
    name: "empty.memory_format",
    schema: "empty.memory_format(int[] size, *, ScalarType? dtype=None, Layout? layout=None, \
             Device? device=None, bool? pin_memory=None, MemoryFormat? memory_format=None) -> Tensor",
    kernel: empty_kernel,
};

#[linkme::distributed_slice(ORT_KERNELS)]
static EMPTY_STRIDED: KernelDef = KernelDef {
    name: "empty_strided",
    schema: "empty_strided(int[] size, int[] stride, *, ScalarType? dtype=None, \
             Layout? layout=None, Device? device=None, bool? pin_memory=None) -> Tensor",
    kernel: empty_strided_kernel,
};
