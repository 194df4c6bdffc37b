//! Scalar type enumeration of the host tensor framework.

use std::fmt;

/// Host-side scalar type tag carried by every tensor handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalarType {
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 8-bit integer.
    Char,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// IEEE-754 half precision.
    Half,
    /// IEEE-754 single precision; the framework default.
    #[default]
    Float,
    /// IEEE-754 double precision.
    Double,
    ComplexFloat,
    ComplexDouble,
    Bool,
    /// Quantized signed 8-bit.
    QInt8,
    /// Quantized unsigned 8-bit.
    QUInt8,
    /// Quantized signed 32-bit.
    QInt32,
    /// Brain floating point (8-bit exponent, 7-bit mantissa).
    BFloat16,
}

impl ScalarType {
    /// Returns the number of bytes per element.
    pub fn element_size(self) -> usize {
        match self {
            ScalarType::Byte
            | ScalarType::Char
            | ScalarType::Bool
            | ScalarType::QInt8
            | ScalarType::QUInt8 => 1,
            ScalarType::Short | ScalarType::Half | ScalarType::BFloat16 => 2,
            ScalarType::Int | ScalarType::Float | ScalarType::QInt32 => 4,
            ScalarType::Long | ScalarType::Double | ScalarType::ComplexFloat => 8,
            ScalarType::ComplexDouble => 16,
        }
    }

    pub fn is_quantized(self) -> bool {
        matches!(
            self,
            ScalarType::QInt8 | ScalarType::QUInt8 | ScalarType::QInt32
        )
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
