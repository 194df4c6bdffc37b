//! Type mapping and value conversion between the host framework and the engine.

pub mod attributes;
pub mod type_map;
pub mod value;

pub use attributes::create_attribute;
pub use type_map::{from_engine_type, to_engine_type};
pub use value::{assert_tensor_supported, from_engine_value, scalar_to_engine_value, to_engine_value};
