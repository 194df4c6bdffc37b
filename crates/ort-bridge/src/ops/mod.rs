//! Device-native operators of the ort backend.
//!
//! Each operator bridges its host arguments to engine values, performs the work through the
//! device's [`Invoker`](crate::engine::Invoker), and wraps results back into host handles.
//! `reshape` and `view` always copy; `copy_`, `zero_` and the in-place mapped operators
//! overwrite the destination buffer and return the same handle.

pub mod copy;
pub mod dispatch;
pub mod factory;
pub mod fill;
pub mod mapped;
pub mod shape;

pub use copy::copy_;
pub use dispatch::{call, IValue, KernelDef, ORT_KERNELS};
pub use factory::{empty, empty_strided};
pub use fill::{zero_, zeros_like};
pub use mapped::{
    abs, add, add_, div, exp, leaky_relu, mul, mul_, neg, relu, relu_, sigmoid, sub,
};
pub use shape::{infer_size, reshape, view};

use crate::buffer::RawBuffer;
use crate::engine::{EngineError, EngineValue};
use crate::error::{BridgeError, BridgeResult};

/// Copies the bytes of an operator result over `target`'s buffer.
pub(crate) fn write_back(op: &str, result: &EngineValue, target: &EngineValue) -> BridgeResult<()> {
    RawBuffer::copy_between(result.buffer(), target.buffer()).map_err(|(from, to)| {
        BridgeError::invocation(
            op,
            EngineError::fail(format!(
                "result holds {from} bytes but the destination holds {to}"
            )),
        )
    })
}
