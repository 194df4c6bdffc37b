use tracing::{debug, warn};

use crate::bridge::{assert_tensor_supported, to_engine_value};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostTensor;
use crate::registry::invoker_for;

use super::dispatch::{arg, IValue, KernelDef, ORT_KERNELS};

/// Copies `src` into `self_`'s buffer and returns `self_`.
///
/// The invoker is the one of `self_`'s device when it is an ort device, else `src`'s.
/// `non_blocking` has no effect: every copy completes before returning.
pub fn copy_(self_: &HostTensor, src: &HostTensor, non_blocking: bool) -> BridgeResult<HostTensor> {
    debug!(dst = ?self_, src = ?src, non_blocking, "copy_");
    assert_tensor_supported(self_)?;
    assert_tensor_supported(src)?;

    let device = if self_.device().is_ort() {
        self_.device()
    } else {
        src.device()
    };
    let invoker = invoker_for(device)?;
    let src_value = to_engine_value(src)?;
    let dst_value = to_engine_value(self_)?;
    invoker.copy(&src_value, &dst_value).map_err(|err| {
        warn!(error = %err, "engine copy failed");
        BridgeError::invocation("copy_", err)
    })?;
    Ok(self_.clone())
}

fn copy_kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let non_blocking = arg(args, 2).to_opt_bool()?.unwrap_or(false);
    let out = copy_(arg(args, 0).to_tensor()?, arg(args, 1).to_tensor()?, non_blocking)?;
    Ok(vec![IValue::Tensor(out)])
}

#[linkme::distributed_slice(ORT_KERNELS)]
static COPY: KernelDef = KernelDef {
    name: "copy_",
    schema: "copy_(Tensor(a!) self, Tensor src, bool non_blocking=False) -> Tensor(a!)",
    kernel: copy_kernel,
};
