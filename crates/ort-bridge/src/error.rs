use std::fmt;

use thiserror::Error;

use crate::engine::EngineError;
use crate::host::{Device, DeviceType, Layout, ScalarType};

/// Tensor categories the bridge refuses to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorCategory {
    Sparse,
    Quantized,
    Device(DeviceType),
}

impl fmt::Display for TensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorCategory::Sparse => f.write_str("sparse not supported"),
            TensorCategory::Quantized => f.write_str("quantized not supported"),
            TensorCategory::Device(device_type) => {
                write!(f, "device type {device_type} not supported")
            }
        }
    }
}

/// Failure of a single bridged operation. Nothing is retried and nothing falls back to a
/// default value.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("ort bridge: {0}")]
    UnsupportedTensorCategory(TensorCategory),
    #[error("unsupported scalar type {0} for the execution engine")]
    UnsupportedScalarType(ScalarType),
    #[error("attribute '{name}' cannot be encoded from scalar type {scalar_type}")]
    UnsupportedAttributeType {
        name: String,
        scalar_type: ScalarType,
    },
    #[error("missing required option `{0}`")]
    MissingRequiredOption(&'static str),
    #[error("layout {0:?} is not supported; only strided tensors can be allocated")]
    UnsupportedLayout(Layout),
    #[error("engine returned failure status for `{op}`: {message}")]
    EngineInvocationFailure { op: String, message: String },
    #[error("ort backend doesn't support {0}")]
    UnsupportedDeviceOperation(&'static str),
    #[error("shape {size:?} is invalid for input of size {numel}")]
    InvalidViewSize { size: Vec<i64>, numel: usize },
    #[error("invalid device {device}: {reason}")]
    InvalidDevice { device: Device, reason: &'static str },
    #[error("unknown backend kind '{0}'")]
    UnknownBackendKind(String),
    #[error("no execution provider registered under '{0}'")]
    UnknownProvider(String),
    #[error("no kernel for `{op}` with dispatch key {key}")]
    NoKernel { op: String, key: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("config error: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(message.into())
    }

    /// Wraps a failed named-operator call.
    pub fn invocation(op: &str, err: EngineError) -> Self {
        BridgeError::EngineInvocationFailure {
            op: op.to_string(),
            message: err.to_string(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
