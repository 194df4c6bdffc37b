//! Conversions between host tensor handles and engine values.

use tracing::trace;

use crate::buffer::encode_slice;
use crate::engine::{ElementType, EngineValue, Invoker};
use crate::error::{BridgeError, BridgeResult, TensorCategory};
use crate::host::{DeviceType, HostTensor, Scalar, TensorImpl, TensorOptions};

use super::type_map::to_engine_type;

fn is_device_supported(device_type: DeviceType) -> bool {
    matches!(device_type, DeviceType::Ort | DeviceType::Cpu)
}

/// Rejects sparse, quantized and foreign-device tensors before any conversion.
pub fn assert_tensor_supported(tensor: &HostTensor) -> BridgeResult<()> {
    if tensor.is_sparse() {
        return Err(BridgeError::UnsupportedTensorCategory(TensorCategory::Sparse));
    }
    if tensor.is_quantized() {
        return Err(BridgeError::UnsupportedTensorCategory(
            TensorCategory::Quantized,
        ));
    }
    let device_type = tensor.device().device_type();
    if !is_device_supported(device_type) {
        return Err(BridgeError::UnsupportedTensorCategory(
            TensorCategory::Device(device_type),
        ));
    }
    Ok(())
}

/// Views a host tensor as an engine value without copying.
///
/// A bridged handle yields its own engine value; a dense handle is aliased over its storage.
/// Either way the result shares the handle's buffer.
pub fn to_engine_value(tensor: &HostTensor) -> BridgeResult<EngineValue> {
    assert_tensor_supported(tensor)?;
    match tensor.tensor_impl() {
        TensorImpl::Bridged(imp) => Ok(imp.value().clone()),
        TensorImpl::Dense(storage) => {
            let element_type = to_engine_type(tensor.scalar_type())?;
            trace!(?element_type, sizes = ?tensor.sizes(), "aliasing dense host storage");
            Ok(EngineValue::alias(
                storage.clone(),
                element_type,
                tensor.sizes(),
            )?)
        }
        TensorImpl::Sparse(_) => Err(BridgeError::UnsupportedTensorCategory(
            TensorCategory::Sparse,
        )),
        TensorImpl::Quantized(_) => Err(BridgeError::UnsupportedTensorCategory(
            TensorCategory::Quantized,
        )),
    }
}

/// Wraps an engine value into a new bridged host handle described by `options`.
pub fn from_engine_value(value: EngineValue, options: TensorOptions) -> HostTensor {
    HostTensor::from_bridged(value, options)
}

/// Zero-dimensional float32 value holding `scalar`.
///
/// Always float32, whatever the scalar's own kind.
pub fn scalar_to_engine_value(invoker: &Invoker, scalar: Scalar) -> BridgeResult<EngineValue> {
    let allocator = invoker.default_allocator()?;
    let value = EngineValue::allocate(allocator.as_ref(), ElementType::Float, &[])?;
    value
        .buffer()
        .overwrite(&encode_slice(&[scalar.to_f32()]))
        .map_err(|len| BridgeError::invalid_argument(format!("scalar buffer has {len} bytes")))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Device, ScalarType};

    #[test]
    fn dense_tensor_is_aliased_not_copied() {
        let tensor = HostTensor::from_vec(&[2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let value = to_engine_value(&tensor).unwrap();
        assert_eq!(value.element_type(), ElementType::Float);
        assert_eq!(value.shape(), &[2, 2]);
        let storage = tensor.storage().unwrap();
        assert!(std::sync::Arc::ptr_eq(storage, value.buffer()));
    }

    #[test]
    fn bridged_tensor_returns_its_own_value() {
        let dense = HostTensor::from_vec(&[3], vec![1i64, 2, 3]).unwrap();
        let value = to_engine_value(&dense).unwrap();
        let options = TensorOptions::new()
            .with_dtype(ScalarType::Long)
            .with_device(Device::ort(0));
        let bridged = from_engine_value(value.clone(), options);
        let again = to_engine_value(&bridged).unwrap();
        assert!(again.shares_buffer(&value));
        assert_eq!(bridged.scalar_type(), ScalarType::Long);
        assert_eq!(bridged.device(), Device::ort(0));
    }

    #[test]
    fn foreign_device_is_rejected() {
        let options = TensorOptions::new().with_device(Device::new(DeviceType::Cuda, Some(0)));
        let tensor = HostTensor::zeros(&[2], options);
        match to_engine_value(&tensor) {
            Err(BridgeError::UnsupportedTensorCategory(TensorCategory::Device(
                DeviceType::Cuda,
            ))) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unmapped_dtype_fails_on_dense_tensor() {
        let tensor = HostTensor::from_vec(&[2], vec![1u8, 2]).unwrap();
        assert!(matches!(
            to_engine_value(&tensor),
            Err(BridgeError::UnsupportedScalarType(ScalarType::Byte))
        ));
    }
}
