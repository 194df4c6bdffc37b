use anyhow::Result;
use ort_bridge::host::{device, Layout, MemoryFormat};
use ort_bridge::ops::{self, IValue};
use ort_bridge::{BridgeError, Device, DeviceType, HostTensor, ScalarType, TensorOptions};

fn setup() {
    ort_bridge_provider_cpu::register_cpu_provider();
}

fn ort_tensor(sizes: &[i64], data: Vec<f32>) -> Result<HostTensor> {
    let dst = ops::empty(sizes, device(Device::ort(0)), None)?;
    let sizes: Vec<usize> = dst.sizes().to_vec();
    let src = HostTensor::from_vec(&sizes, data)?;
    Ok(ops::copy_(&dst, &src, false)?)
}

#[test]
fn empty_keeps_requested_dtype_and_sizes() -> Result<()> {
    setup();
    for dtype in [
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Half,
        ScalarType::BFloat16,
        ScalarType::Int,
        ScalarType::Short,
        ScalarType::Long,
    ] {
        let options = TensorOptions::new()
            .with_dtype(dtype)
            .with_device(Device::ort(0));
        let tensor = ops::empty(&[2, 3], options, Some(MemoryFormat::Contiguous))?;
        assert_eq!(tensor.scalar_type(), dtype);
        assert_eq!(tensor.sizes(), &[2, 3]);
        assert_eq!(tensor.device(), Device::ort(0));
        assert!(tensor.bridged().is_some());
        assert_eq!(tensor.nbytes(), 6 * dtype.element_size());
    }
    Ok(())
}

#[test]
fn empty_rejects_unmapped_dtype() {
    setup();
    let options = TensorOptions::new()
        .with_dtype(ScalarType::Bool)
        .with_device(Device::ort(0));
    let err = ops::empty(&[2], options, None).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedScalarType(ScalarType::Bool)));
}

#[test]
fn empty_strided_requires_device_and_strided_layout() -> Result<()> {
    setup();
    let err = ops::empty_strided(&[2, 2], &[2, 1], None, None, None, None).unwrap_err();
    assert!(matches!(err, BridgeError::MissingRequiredOption("device")));

    let err = ops::empty_strided(
        &[2, 2],
        &[2, 1],
        None,
        Some(Layout::Sparse),
        Some(Device::ort(0)),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedLayout(Layout::Sparse)));

    let tensor = ops::empty_strided(&[2, 2], &[1, 2], None, None, Some(Device::ort(0)), None)?;
    assert_eq!(tensor.scalar_type(), ScalarType::Float);
    assert_eq!(tensor.sizes(), &[2, 2]);
    Ok(())
}

#[test]
fn zeros_like_produces_zero_bytes() -> Result<()> {
    setup();
    let source = ort_tensor(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let zeros = ops::zeros_like(&source, None, None, None, None, None)?;
    assert!(!zeros.is_same(&source));
    assert_eq!(zeros.sizes(), &[2, 3]);
    assert_eq!(zeros.scalar_type(), ScalarType::Float);
    assert_eq!(zeros.to_bytes()?, vec![0u8; 24]);
    assert_eq!(source.to_vec::<f32>()?, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    Ok(())
}

#[test]
fn view_infers_one_dimension() -> Result<()> {
    setup();
    let data: Vec<f32> = (0..6).map(|v| v as f32).collect();
    let source = ort_tensor(&[2, 3], data.clone())?;

    let flat = ops::view(&source, &[-1])?;
    assert_eq!(flat.sizes(), &[6]);
    assert_eq!(flat.to_vec::<f32>()?, data);

    let reshaped = ops::reshape(&source, &[3, -1])?;
    assert_eq!(reshaped.sizes(), &[3, 2]);
    assert_eq!(reshaped.to_vec::<f32>()?, data);

    // Results are copies: source storage is independent of the view.
    let flat_value = flat.bridged().map(|imp| imp.value().clone());
    let source_value = source.bridged().map(|imp| imp.value().clone());
    match (flat_value, source_value) {
        (Some(a), Some(b)) => assert!(!a.shares_buffer(&b)),
        _ => panic!("expected bridged tensors"),
    }
    Ok(())
}

#[test]
fn view_rejects_wrong_element_count() -> Result<()> {
    setup();
    let source = ort_tensor(&[2, 3], vec![0.0; 6])?;
    let err = ops::view(&source, &[4]).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidViewSize { numel: 6, .. }));
    assert!(matches!(
        ops::view(&source, &[-1, -1]).unwrap_err(),
        BridgeError::InvalidArgument(_)
    ));
    Ok(())
}

#[test]
fn copy_is_byte_identical_and_returns_destination() -> Result<()> {
    setup();
    let data = vec![0.5f32, -1.5, 2.25, 8.0];
    let src = HostTensor::from_vec(&[2, 2], data.clone())?;
    let dst = ops::empty(&[2, 2], device(Device::ort(0)), None)?;

    let out = ops::copy_(&dst, &src, false)?;
    assert!(out.is_same(&dst));
    assert_eq!(dst.to_bytes()?, src.to_bytes()?);
    assert_eq!(dst.to_vec::<f32>()?, data);

    // Back to the host side.
    let host = HostTensor::zeros(&[2, 2], TensorOptions::new());
    ops::copy_(&host, &dst, true)?;
    assert_eq!(host.to_vec::<f32>()?, data);
    Ok(())
}

#[test]
fn copy_rejects_shape_mismatch() -> Result<()> {
    setup();
    let src = HostTensor::from_vec(&[4], vec![1.0f32; 4])?;
    let dst = ops::empty(&[2, 2], device(Device::ort(0)), None)?;
    let err = ops::copy_(&dst, &src, false).unwrap_err();
    assert!(matches!(err, BridgeError::EngineInvocationFailure { ref op, .. } if op == "copy_"));
    Ok(())
}

#[test]
fn zero_keeps_identity_and_clears_contents() -> Result<()> {
    setup();
    let tensor = ort_tensor(&[3], vec![1.0, -2.0, 3.0])?;
    let before = tensor.bridged().map(|imp| imp as *const _);

    let out = ops::zero_(&tensor)?;
    assert!(out.is_same(&tensor));
    let after = out.bridged().map(|imp| imp as *const _);
    assert_eq!(before, after);
    assert_eq!(tensor.to_vec::<f32>()?, vec![0.0; 3]);
    Ok(())
}

#[test]
fn dispatch_routes_ort_tensors_only() -> Result<()> {
    setup();
    let out = ops::call(
        "empty.memory_format",
        &[
            IValue::IntList(vec![2, 2]),
            IValue::ScalarType(ScalarType::Double),
            IValue::None,
            IValue::Device(Device::ort(0)),
        ],
    )?;
    let tensor = out.into_iter().next().map(IValue::into_tensor).transpose()?;
    let tensor = tensor.ok_or_else(|| anyhow::anyhow!("empty returned nothing"))?;
    assert_eq!(tensor.scalar_type(), ScalarType::Double);
    assert_eq!(tensor.device().device_type(), DeviceType::Ort);

    let host = HostTensor::from_vec(&[2], vec![1.0f32, 2.0])?;
    let err = ops::call("zero_", &[IValue::Tensor(host)]).unwrap_err();
    assert!(matches!(err, BridgeError::NoKernel { .. }));
    Ok(())
}

#[test]
fn boxed_copy_reaches_host_destination() -> Result<()> {
    setup();
    let src = ort_tensor(&[3], vec![7.0, 8.0, 9.0])?;
    let dst = HostTensor::zeros(&[3], TensorOptions::new());
    let out = ops::call("copy_", &[IValue::Tensor(dst.clone()), IValue::Tensor(src)])?;
    let returned = out
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("copy_ returned nothing"))?
        .into_tensor()?;
    assert!(returned.is_same(&dst));
    assert_eq!(dst.to_vec::<f32>()?, vec![7.0, 8.0, 9.0]);
    Ok(())
}
