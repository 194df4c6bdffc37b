//! Engine-native tensor values.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::buffer::{decode_slice, encode_slice, BufferRef};

use super::allocator::Allocator;
use super::element_type::{ElementType, EngineElement};
use super::status::{EngineError, EngineResult};

pub type Dims = SmallVec<[usize; 4]>;

/// How an engine value came to hold its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Fresh buffer obtained from an allocator.
    Owned,
    /// Buffer owned by someone else (typically a host tensor's storage).
    Aliased,
}

/// Element type, shape and buffer of one engine tensor.
///
/// The declared element type and shape always account for exactly the buffer's byte length;
/// both constructors reject anything else. Cloning shares the buffer.
#[derive(Clone)]
pub struct EngineValue {
    element_type: ElementType,
    shape: Dims,
    buffer: BufferRef,
    ownership: Ownership,
}

impl EngineValue {
    /// Allocates an owning value from `allocator`. The buffer starts zeroed.
    pub fn allocate(
        allocator: &dyn Allocator,
        element_type: ElementType,
        shape: &[usize],
    ) -> EngineResult<Self> {
        let byte_len = byte_len_for(element_type, shape)?;
        let buffer = allocator.alloc(byte_len)?;
        if buffer.len() != byte_len {
            return Err(EngineError::fail(format!(
                "allocator {} returned {} bytes, expected {}",
                allocator.info(),
                buffer.len(),
                byte_len
            )));
        }
        Ok(EngineValue {
            element_type,
            shape: Dims::from_slice(shape),
            buffer,
            ownership: Ownership::Owned,
        })
    }

    /// Wraps a buffer owned elsewhere without copying.
    pub fn alias(buffer: BufferRef, element_type: ElementType, shape: &[usize]) -> EngineResult<Self> {
        let byte_len = byte_len_for(element_type, shape)?;
        if buffer.len() != byte_len {
            return Err(EngineError::invalid_argument(format!(
                "cannot alias {} byte buffer as {} with shape {:?} ({} bytes)",
                buffer.len(),
                element_type,
                shape,
                byte_len
            )));
        }
        Ok(EngineValue {
            element_type,
            shape: Dims::from_slice(shape),
            buffer,
            ownership: Ownership::Aliased,
        })
    }

    /// Allocates an owning value and copies `values` into it.
    pub fn from_slice<T: EngineElement>(
        allocator: &dyn Allocator,
        shape: &[usize],
        values: &[T],
    ) -> EngineResult<Self> {
        let value = Self::allocate(allocator, T::ELEMENT_TYPE, shape)?;
        if value.numel() != values.len() {
            return Err(EngineError::invalid_argument(format!(
                "{} values do not fill shape {:?}",
                values.len(),
                shape
            )));
        }
        value
            .buffer
            .overwrite(&encode_slice(values))
            .map_err(|len| EngineError::fail(format!("buffer length changed to {len}")))?;
        Ok(value)
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.numel() * self.element_type.size()
    }

    pub fn buffer(&self) -> &BufferRef {
        &self.buffer
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// True when both values point at the same buffer.
    pub fn shares_buffer(&self, other: &EngineValue) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }

    pub fn to_vec<T: EngineElement>(&self) -> EngineResult<Vec<T>> {
        if T::ELEMENT_TYPE != self.element_type {
            return Err(EngineError::invalid_argument(format!(
                "value holds {} but {} was requested",
                self.element_type,
                T::ELEMENT_TYPE
            )));
        }
        decode_slice(&self.buffer.read())
            .ok_or_else(|| EngineError::fail("buffer length is not a multiple of element size"))
    }
}

impl fmt::Debug for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineValue")
            .field("element_type", &self.element_type)
            .field("shape", &self.shape.as_slice())
            .field("ownership", &self.ownership)
            .field("buffer", &Arc::as_ptr(&self.buffer))
            .finish()
    }
}

fn byte_len_for(element_type: ElementType, shape: &[usize]) -> EngineResult<usize> {
    shape
        .iter()
        .try_fold(element_type.size(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| EngineError::invalid_argument(format!("shape {shape:?} overflows usize")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RawBuffer;
    use crate::engine::allocator::{HostAllocator, MemType};

    #[test]
    fn alias_rejects_mismatched_byte_length() {
        let buffer = RawBuffer::zeroed(10);
        let err = EngineValue::alias(buffer, ElementType::Float, &[2, 2]).unwrap_err();
        assert!(err.message.contains("cannot alias"));
    }

    #[test]
    fn zero_dim_value_holds_one_element() {
        let allocator = HostAllocator::new("test", 0, MemType::Default);
        let value = EngineValue::from_slice(&allocator, &[], &[1i64]).unwrap();
        assert_eq!(value.rank(), 0);
        assert_eq!(value.numel(), 1);
        assert_eq!(value.byte_len(), 8);
        assert_eq!(value.ownership(), Ownership::Owned);
        assert_eq!(value.to_vec::<i64>().unwrap(), vec![1]);
        assert!(value.to_vec::<f64>().is_err());
    }
}
