//! Element-type descriptors of the execution engine.

use std::fmt;

use crate::buffer::LeBytes;

/// Engine-side element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Float,
    Double,
    Float16,
    BFloat16,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    Bool,
}

impl ElementType {
    /// Descriptor for a concrete Rust element type.
    pub fn of<T: EngineElement>() -> ElementType {
        T::ELEMENT_TYPE
    }

    /// Bytes per element.
    pub fn size(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 | ElementType::Bool => 1,
            ElementType::Float16 | ElementType::BFloat16 | ElementType::Int16 => 2,
            ElementType::Float | ElementType::Int32 => 4,
            ElementType::Double | ElementType::Int64 => 8,
        }
    }

    /// Type string in the engine's `tensor(<elem>)` notation.
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Float => "tensor(float)",
            ElementType::Double => "tensor(double)",
            ElementType::Float16 => "tensor(float16)",
            ElementType::BFloat16 => "tensor(bfloat16)",
            ElementType::Int8 => "tensor(int8)",
            ElementType::Int16 => "tensor(int16)",
            ElementType::Int32 => "tensor(int32)",
            ElementType::Int64 => "tensor(int64)",
            ElementType::UInt8 => "tensor(uint8)",
            ElementType::Bool => "tensor(bool)",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            ElementType::Float | ElementType::Double | ElementType::Float16 | ElementType::BFloat16
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalar with a fixed engine element type.
pub trait EngineElement: LeBytes {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! engine_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl EngineElement for $ty {
                const ELEMENT_TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

engine_element!(
    f32 => Float,
    f64 => Double,
    half::f16 => Float16,
    half::bf16 => BFloat16,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
);
