use crate::engine::{AttributeProto, AttributeValue};
use crate::error::{BridgeError, BridgeResult};
use crate::host::Scalar;

/// Encodes a host scalar as a named engine attribute.
///
/// `Bool` becomes an integer attribute. `Double` and `Long` both become float attributes,
/// so a `Long` above 2^24 loses precision. Every other scalar kind is rejected.
pub fn create_attribute(name: &str, value: Scalar) -> BridgeResult<AttributeProto> {
    match value {
        Scalar::Bool(v) => Ok(AttributeProto::new(name, AttributeValue::Int(i64::from(v)))),
        Scalar::Double(_) | Scalar::Long(_) => {
            Ok(AttributeProto::new(name, AttributeValue::Float(value.to_f32())))
        }
        Scalar::ComplexDouble { .. } => Err(BridgeError::UnsupportedAttributeType {
            name: name.to_string(),
            scalar_type: value.scalar_type(),
        }),
    }
}
