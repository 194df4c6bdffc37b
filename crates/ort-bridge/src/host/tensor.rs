//! Reference-counted host tensor handle.
//!
//! A [`HostTensor`] carries shape, scalar type, device and layout plus one backend payload
//! ([`TensorImpl`]). Cloning a handle shares the payload; [`HostTensor::is_same`] compares
//! handle identity the way the framework compares tensor implementations.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::buffer::{decode_slice, encode_slice, BufferRef, LeBytes, RawBuffer};
use crate::engine::EngineValue;
use crate::error::{BridgeError, BridgeResult, TensorCategory};

use super::device::Device;
use super::options::{Layout, TensorOptions};
use super::scalar_type::ScalarType;

pub type Sizes = SmallVec<[usize; 4]>;

/// Rust element type with a host scalar type tag.
pub trait Element: LeBytes {
    const SCALAR_TYPE: ScalarType;
}

macro_rules! impl_element {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const SCALAR_TYPE: ScalarType = ScalarType::$scalar;
            }
        )*
    };
}

impl_element!(
    f32 => Float,
    f64 => Double,
    half::f16 => Half,
    half::bf16 => BFloat16,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    u8 => Byte,
    i8 => Char,
);

/// Payload owned by this backend: exactly one engine value.
#[derive(Debug)]
pub struct BridgedTensorImpl {
    value: EngineValue,
}

impl BridgedTensorImpl {
    pub fn value(&self) -> &EngineValue {
        &self.value
    }
}

#[derive(Debug)]
pub struct SparseCooImpl {
    pub indices: HostTensor,
    pub values: HostTensor,
}

#[derive(Debug)]
pub struct QuantizedImpl {
    pub storage: BufferRef,
    pub scale: f64,
    pub zero_point: i64,
}

/// Backend-specific implementation behind a handle.
#[derive(Debug)]
pub enum TensorImpl {
    /// Contiguous strided storage in host-addressable memory.
    Dense(BufferRef),
    Sparse(SparseCooImpl),
    Quantized(QuantizedImpl),
    Bridged(BridgedTensorImpl),
}

struct TensorInner {
    sizes: Sizes,
    scalar_type: ScalarType,
    device: Device,
    layout: Layout,
    imp: TensorImpl,
}

#[derive(Clone)]
pub struct HostTensor {
    inner: Arc<TensorInner>,
}

impl HostTensor {
    fn new(
        sizes: &[usize],
        scalar_type: ScalarType,
        device: Device,
        layout: Layout,
        imp: TensorImpl,
    ) -> Self {
        HostTensor {
            inner: Arc::new(TensorInner {
                sizes: Sizes::from_slice(sizes),
                scalar_type,
                device,
                layout,
                imp,
            }),
        }
    }

    /// Dense CPU tensor holding `data` in row-major order.
    pub fn from_vec<T: Element>(sizes: &[usize], data: Vec<T>) -> BridgeResult<Self> {
        let numel: usize = sizes.iter().product();
        if numel != data.len() {
            return Err(BridgeError::invalid_argument(format!(
                "{} values do not fill sizes {:?}",
                data.len(),
                sizes
            )));
        }
        let storage = RawBuffer::from_bytes(encode_slice(&data));
        Ok(Self::new(
            sizes,
            T::SCALAR_TYPE,
            Device::cpu(),
            Layout::Strided,
            TensorImpl::Dense(storage),
        ))
    }

    /// Zero-filled dense tensor tagged with `options`' dtype and device.
    ///
    /// The device tag is taken as given; dense storage on a non-CPU device only models a
    /// handle belonging to some other backend.
    pub fn zeros(sizes: &[usize], options: TensorOptions) -> Self {
        let dtype = options.dtype();
        let numel: usize = sizes.iter().product();
        let storage = RawBuffer::zeroed(numel * dtype.element_size());
        Self::new(
            sizes,
            dtype,
            options.device(),
            Layout::Strided,
            TensorImpl::Dense(storage),
        )
    }

    /// Sparse COO tensor; `indices` is `[ndim, nnz]` and `values` is `[nnz]`.
    pub fn sparse_coo(indices: HostTensor, values: HostTensor, sizes: &[usize]) -> Self {
        let scalar_type = values.scalar_type();
        let device = values.device();
        Self::new(
            sizes,
            scalar_type,
            device,
            Layout::Sparse,
            TensorImpl::Sparse(SparseCooImpl { indices, values }),
        )
    }

    /// Per-tensor affine quantization of `values` to `QInt8`.
    pub fn quantize_per_tensor(
        sizes: &[usize],
        values: &[f32],
        scale: f64,
        zero_point: i64,
    ) -> BridgeResult<Self> {
        let numel: usize = sizes.iter().product();
        if numel != values.len() {
            return Err(BridgeError::invalid_argument(format!(
                "{} values do not fill sizes {:?}",
                values.len(),
                sizes
            )));
        }
        if scale <= 0.0 {
            return Err(BridgeError::invalid_argument(format!(
                "quantization scale must be positive, got {scale}"
            )));
        }
        let quantized: Vec<i8> = values
            .iter()
            .map(|&v| {
                let q = (f64::from(v) / scale).round() as i64 + zero_point;
                q.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8
            })
            .collect();
        Ok(Self::new(
            sizes,
            ScalarType::QInt8,
            Device::cpu(),
            Layout::Strided,
            TensorImpl::Quantized(QuantizedImpl {
                storage: RawBuffer::from_bytes(encode_slice(&quantized)),
                scale,
                zero_point,
            }),
        ))
    }

    /// Wraps an engine value in a fresh bridged payload. Never copies the buffer.
    pub fn from_bridged(value: EngineValue, options: TensorOptions) -> Self {
        let sizes = Sizes::from_slice(value.shape());
        Self::new(
            &sizes,
            options.dtype(),
            options.device(),
            Layout::Strided,
            TensorImpl::Bridged(BridgedTensorImpl { value }),
        )
    }

    pub fn sizes(&self) -> &[usize] {
        &self.inner.sizes
    }

    pub fn dim(&self) -> usize {
        self.inner.sizes.len()
    }

    pub fn numel(&self) -> usize {
        self.inner.sizes.iter().product()
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.inner.scalar_type
    }

    pub fn device(&self) -> Device {
        self.inner.device
    }

    pub fn layout(&self) -> Layout {
        self.inner.layout
    }

    /// Options this handle was constructed with.
    pub fn options(&self) -> TensorOptions {
        TensorOptions::new()
            .with_dtype(self.inner.scalar_type)
            .with_device(self.inner.device)
            .with_layout(self.inner.layout)
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.inner.imp, TensorImpl::Sparse(_))
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self.inner.imp, TensorImpl::Quantized(_))
    }

    pub fn tensor_impl(&self) -> &TensorImpl {
        &self.inner.imp
    }

    /// The bridged payload, if this handle is native to the engine backend.
    pub fn bridged(&self) -> Option<&BridgedTensorImpl> {
        match &self.inner.imp {
            TensorImpl::Bridged(imp) => Some(imp),
            _ => None,
        }
    }

    /// Buffer backing a dense or bridged handle.
    pub fn storage(&self) -> Option<&BufferRef> {
        match &self.inner.imp {
            TensorImpl::Dense(buffer) => Some(buffer),
            TensorImpl::Bridged(imp) => Some(imp.value.buffer()),
            TensorImpl::Quantized(imp) => Some(&imp.storage),
            TensorImpl::Sparse(_) => None,
        }
    }

    /// Handle identity.
    pub fn is_same(&self, other: &HostTensor) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn nbytes(&self) -> usize {
        self.numel() * self.scalar_type().element_size()
    }

    /// Copies the raw contents out of a dense or bridged handle.
    pub fn to_bytes(&self) -> BridgeResult<Vec<u8>> {
        match &self.inner.imp {
            TensorImpl::Dense(buffer) => Ok(buffer.to_vec()),
            TensorImpl::Bridged(imp) => Ok(imp.value.to_bytes()),
            TensorImpl::Sparse(_) => Err(BridgeError::UnsupportedTensorCategory(
                TensorCategory::Sparse,
            )),
            TensorImpl::Quantized(_) => Err(BridgeError::UnsupportedTensorCategory(
                TensorCategory::Quantized,
            )),
        }
    }

    pub fn to_vec<T: Element>(&self) -> BridgeResult<Vec<T>> {
        if T::SCALAR_TYPE != self.scalar_type() {
            return Err(BridgeError::invalid_argument(format!(
                "tensor holds {} but {} was requested",
                self.scalar_type(),
                T::SCALAR_TYPE
            )));
        }
        let bytes = self.to_bytes()?;
        decode_slice(&bytes).ok_or_else(|| {
            BridgeError::invalid_argument("storage length is not a multiple of element size")
        })
    }
}

impl fmt::Debug for HostTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner.imp {
            TensorImpl::Dense(_) => "dense",
            TensorImpl::Sparse(_) => "sparse",
            TensorImpl::Quantized(_) => "quantized",
            TensorImpl::Bridged(_) => "bridged",
        };
        f.debug_struct("HostTensor")
            .field("sizes", &self.inner.sizes.as_slice())
            .field("scalar_type", &self.inner.scalar_type)
            .field("device", &self.inner.device)
            .field("impl", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_element_count() {
        assert!(HostTensor::from_vec(&[2, 2], vec![1.0f32; 3]).is_err());
    }

    #[test]
    fn clones_share_identity() {
        let a = HostTensor::from_vec(&[2], vec![1i64, 2]).unwrap();
        let b = a.clone();
        let c = HostTensor::from_vec(&[2], vec![1i64, 2]).unwrap();
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
        assert_eq!(b.to_vec::<i64>().unwrap(), vec![1, 2]);
        assert!(b.to_vec::<i32>().is_err());
    }

    #[test]
    fn quantized_values_clamp_to_int8() {
        let q = HostTensor::quantize_per_tensor(&[3], &[0.0, 1.0, 1000.0], 0.5, 0).unwrap();
        assert!(q.is_quantized());
        assert_eq!(q.scalar_type(), ScalarType::QInt8);
        assert_eq!(q.storage().unwrap().to_vec(), vec![0, 2, 127]);
    }
}
