use tracing::debug;

use crate::bridge::{from_engine_value, to_engine_value};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostTensor;
use crate::registry::invoker_for;

use super::dispatch::{arg, IValue, KernelDef, ORT_KERNELS};

/// Converts non-negative framework sizes to dimensions.
pub(crate) fn to_dims(size: &[i64]) -> BridgeResult<Vec<usize>> {
    size.iter()
        .map(|&dim| {
            usize::try_from(dim)
                .map_err(|_| BridgeError::invalid_argument(format!("negative dimension {dim} in {size:?}")))
        })
        .collect()
}

/// Resolves a size with at most one `-1` against `numel` elements.
pub fn infer_size(size: &[i64], numel: usize) -> BridgeResult<Vec<usize>> {
    let invalid = || BridgeError::InvalidViewSize {
        size: size.to_vec(),
        numel,
    };

    let mut inferred = None;
    let mut known: usize = 1;
    let mut dims = Vec::with_capacity(size.len());
    for (axis, &dim) in size.iter().enumerate() {
        if dim == -1 {
            if inferred.replace(axis).is_some() {
                return Err(BridgeError::invalid_argument(
                    "only one dimension can be inferred",
                ));
            }
            dims.push(0);
        } else if dim >= 0 {
            let dim = dim as usize;
            known = known.checked_mul(dim).ok_or_else(invalid)?;
            dims.push(dim);
        } else {
            return Err(BridgeError::invalid_argument(format!(
                "invalid shape dimension {dim}"
            )));
        }
    }

    match inferred {
        Some(axis) => {
            // A zero-sized known part leaves the wildcard ambiguous.
            if known == 0 || numel % known != 0 {
                return Err(invalid());
            }
            dims[axis] = numel / known;
        }
        None if known != numel => return Err(invalid()),
        None => {}
    }
    Ok(dims)
}

fn reshape_copy(self_: &HostTensor, dims: &[usize]) -> BridgeResult<HostTensor> {
    let value = to_engine_value(self_)?;
    let invoker = invoker_for(self_.device())?;
    let output = invoker.reshape_copy(&value, dims)?;
    Ok(from_engine_value(output, self_.options()))
}

/// Returns a copy of `self_` with the requested shape; one `-1` is inferred.
pub fn reshape(self_: &HostTensor, shape: &[i64]) -> BridgeResult<HostTensor> {
    debug!(tensor = ?self_, ?shape, "reshape");
    let dims = infer_size(shape, self_.numel())?;
    reshape_copy(self_, &dims)
}

/// Same as [`reshape`]: the result never shares storage with `self_`.
pub fn view(self_: &HostTensor, size: &[i64]) -> BridgeResult<HostTensor> {
    debug!(tensor = ?self_, ?size, "view");
    let dims = infer_size(size, self_.numel())?;
    reshape_copy(self_, &dims)
}

fn reshape_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let out = reshape(arg(args, 0).to_tensor()?, arg(args, 1).to_int_list()?)?;
    Ok(vec![IValue::Tensor(out)])
}

fn view_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let out = view(arg(args, 0).to_tensor()?, arg(args, 1).to_int_list()?)?;
    Ok(vec![IValue::Tensor(out)])
}

#[linkme::distributed_slice(ORT_KERNELS)]
static RESHAPE: KernelDef = KernelDef {
    name: "reshape",
    schema: "reshape(Tensor(a) self, int[] shape) -> Tensor(a)",
    kernel: reshape_kernel,
};

#[linkme::distributed_slice(ORT_KERNELS)]
static VIEW: KernelDef = KernelDef {
    name: "view",
    schema: "view(Tensor(a) self, int[] size) -> Tensor(a)",
    kernel: view_kernel,
};
