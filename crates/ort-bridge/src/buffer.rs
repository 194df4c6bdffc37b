//! Raw byte storage shared between host tensors and engine values.
//!
//! Both sides of the bridge keep their bytes in a [`RawBuffer`]. Aliasing a host tensor as an
//! engine value means handing out another `Arc` to the same buffer, so writes made through
//! either side are observed by the other.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to a raw buffer.
pub type BufferRef = Arc<RawBuffer>;

/// Fixed-length byte buffer with interior mutability.
#[derive(Debug)]
pub struct RawBuffer {
    bytes: RwLock<Box<[u8]>>,
}

impl RawBuffer {
    /// Allocates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> BufferRef {
        Arc::new(RawBuffer {
            bytes: RwLock::new(vec![0u8; len].into_boxed_slice()),
        })
    }

    /// Takes ownership of an existing byte vector.
    pub fn from_bytes(bytes: Vec<u8>) -> BufferRef {
        Arc::new(RawBuffer {
            bytes: RwLock::new(bytes.into_boxed_slice()),
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.bytes.read().expect("buffer lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.bytes.write().expect("buffer lock poisoned")
    }

    /// Copies the buffer contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().to_vec()
    }

    /// Overwrites the buffer with `src`, which must have the same length.
    pub fn overwrite(&self, src: &[u8]) -> Result<(), usize> {
        let mut dst = self.write();
        if dst.len() != src.len() {
            return Err(dst.len());
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Copies every byte of `src` into `dst`. Copying a buffer onto itself is a no-op.
    pub fn copy_between(src: &BufferRef, dst: &BufferRef) -> Result<(), (usize, usize)> {
        if Arc::ptr_eq(src, dst) {
            return Ok(());
        }
        let from = src.read();
        let mut to = dst.write();
        if from.len() != to.len() {
            return Err((from.len(), to.len()));
        }
        to.copy_from_slice(&from);
        Ok(())
    }

    pub fn fill_zero(&self) {
        self.write().fill(0);
    }
}

/// Fixed-width scalar that can be encoded to and decoded from little-endian bytes.
pub trait LeBytes: Copy + Send + Sync + 'static {
    const WIDTH: usize;

    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes a value from exactly `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_le_bytes {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LeBytes for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_le_bytes!(f32, f64, i8, i16, i32, i64, u8, half::f16, half::bf16);

/// Encodes a typed slice into a little-endian byte vector.
pub fn encode_slice<T: LeBytes>(values: &[T]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * T::WIDTH);
    for &value in values {
        value.write_le(&mut bytes);
    }
    bytes
}

/// Decodes a little-endian byte slice into typed values, or `None` on a ragged tail.
pub fn decode_slice<T: LeBytes>(bytes: &[u8]) -> Option<Vec<T>> {
    if bytes.len() % T::WIDTH != 0 {
        return None;
    }
    Some(bytes.chunks_exact(T::WIDTH).map(T::read_le).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_between_rejects_length_mismatch() {
        let src = RawBuffer::from_bytes(vec![1, 2, 3]);
        let dst = RawBuffer::zeroed(4);
        assert_eq!(RawBuffer::copy_between(&src, &dst), Err((3, 4)));
        assert_eq!(dst.to_vec(), vec![0; 4]);
    }

    #[test]
    fn copy_onto_itself_does_not_deadlock() {
        let buf = RawBuffer::from_bytes(vec![7; 8]);
        RawBuffer::copy_between(&buf, &buf).unwrap();
        assert_eq!(buf.to_vec(), vec![7; 8]);
    }

    #[test]
    fn half_values_decode_from_le_bytes() {
        let values = [half::f16::from_f32(1.5), half::f16::from_f32(-2.0)];
        let bytes = encode_slice(&values);
        assert_eq!(bytes.len(), 4);
        assert_eq!(decode_slice::<half::f16>(&bytes).unwrap(), values.to_vec());
        assert!(decode_slice::<half::f16>(&bytes[..3]).is_none());
    }
}
