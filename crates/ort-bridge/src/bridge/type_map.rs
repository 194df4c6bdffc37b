//! Scalar type mapping between the host framework and the execution engine.

use crate::engine::ElementType;
use crate::error::{BridgeError, BridgeResult};
use crate::host::ScalarType;

/// Maps a host scalar type onto the engine descriptor.
///
/// Total over float32, float64, float16, bfloat16, int32, int16 and int64; every other
/// scalar type fails with [`BridgeError::UnsupportedScalarType`].
pub fn to_engine_type(scalar_type: ScalarType) -> BridgeResult<ElementType> {
    match scalar_type {
        ScalarType::Float => Ok(ElementType::Float),
        ScalarType::Double => Ok(ElementType::Double),
        ScalarType::Half => Ok(ElementType::Float16),
        ScalarType::BFloat16 => Ok(ElementType::BFloat16),
        ScalarType::Int => Ok(ElementType::Int32),
        ScalarType::Short => Ok(ElementType::Int16),
        ScalarType::Long => Ok(ElementType::Int64),
        other => Err(BridgeError::UnsupportedScalarType(other)),
    }
}

/// Reverse lookup used when an engine value has no host options attached (optimizer state).
pub fn from_engine_type(element_type: ElementType) -> Option<ScalarType> {
    match element_type {
        ElementType::Float => Some(ScalarType::Float),
        ElementType::Double => Some(ScalarType::Double),
        ElementType::Float16 => Some(ScalarType::Half),
        ElementType::BFloat16 => Some(ScalarType::BFloat16),
        ElementType::Int32 => Some(ScalarType::Int),
        ElementType::Int16 => Some(ScalarType::Short),
        ElementType::Int64 => Some(ScalarType::Long),
        ElementType::Int8 | ElementType::UInt8 | ElementType::Bool => None,
    }
}
