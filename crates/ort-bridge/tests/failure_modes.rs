use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use ort_bridge::engine::{
    Allocator, EngineError, EngineResult, EngineValue, ExecutionProvider, Invoker, MemType,
    NodeAttributes,
};
use ort_bridge::error::TensorCategory;
use ort_bridge::host::device;
use ort_bridge::ops;
use ort_bridge::registry::{install_invoker, uninstall_invoker};
use ort_bridge::{BridgeError, Device, DeviceType, HostTensor, Scalar, TensorOptions};
use ort_bridge_provider_cpu::{CpuExecutionProvider, CpuKernelInterceptor, GenericCpuProvider};

/// Fails every `ZeroGradient` call and lets everything else through.
struct FailingZeroGradient;

impl CpuKernelInterceptor for FailingZeroGradient {
    fn try_invoke(
        &self,
        op_name: &str,
        _domain: &str,
        _inputs: &[EngineValue],
        _attributes: &NodeAttributes,
    ) -> Option<EngineResult<Vec<EngineValue>>> {
        (op_name == "ZeroGradient").then(|| Err(EngineError::fail("injected failure")))
    }
}

/// CPU provider that counts every allocator request and engine call.
#[derive(Default)]
struct CountingProvider {
    inner: CpuExecutionProvider,
    allocations: AtomicUsize,
    engine_calls: AtomicUsize,
}

impl CountingProvider {
    fn counts(&self) -> (usize, usize) {
        (
            self.allocations.load(Ordering::SeqCst),
            self.engine_calls.load(Ordering::SeqCst),
        )
    }
}

impl ExecutionProvider for CountingProvider {
    fn provider_type(&self) -> &str {
        "counting"
    }

    fn allocator(&self, device_id: i32, mem_type: MemType) -> EngineResult<Arc<dyn Allocator>> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        self.inner.allocator(device_id, mem_type)
    }

    fn invoke(
        &self,
        op_name: &str,
        domain: &str,
        inputs: &[EngineValue],
        attributes: &NodeAttributes,
    ) -> EngineResult<Vec<EngineValue>> {
        self.engine_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.invoke(op_name, domain, inputs, attributes)
    }

    fn copy_tensor(&self, src: &EngineValue, dst: &EngineValue) -> EngineResult<()> {
        self.engine_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.copy_tensor(src, dst)
    }
}

fn sparse_tensor() -> Result<HostTensor> {
    let indices = HostTensor::from_vec(&[1, 2], vec![0i64, 2])?;
    let values = HostTensor::from_vec(&[2], vec![1.0f32, 2.0])?;
    Ok(HostTensor::sparse_coo(indices, values, &[4]))
}

#[test]
fn sparse_and_quantized_fail_before_the_engine() -> Result<()> {
    ort_bridge_provider_cpu::register_cpu_provider();
    let sparse = sparse_tensor()?;
    let quantized = HostTensor::quantize_per_tensor(&[4], &[0.0, 0.5, 1.0, 1.5], 0.5, 0)?;
    let dst = ops::empty(&[4], device(Device::ort(0)), None)?;

    let err = ops::copy_(&dst, &sparse, false).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnsupportedTensorCategory(TensorCategory::Sparse)
    ));
    assert_eq!(err.to_string(), "ort bridge: sparse not supported");

    let err = ops::copy_(&dst, &quantized, false).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnsupportedTensorCategory(TensorCategory::Quantized)
    ));

    let err = ops::zero_(&quantized).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnsupportedTensorCategory(TensorCategory::Quantized)
    ));
    assert!(ops::add(&sparse, &sparse, Scalar::Long(1)).is_err());
    Ok(())
}

#[test]
fn foreign_device_tensors_are_rejected() -> Result<()> {
    ort_bridge_provider_cpu::register_cpu_provider();
    let cuda = Device::new(DeviceType::Cuda, Some(0));
    let foreign = HostTensor::zeros(&[2], TensorOptions::new().with_device(cuda));
    let dst = ops::empty(&[2], device(Device::ort(0)), None)?;
    let err = ops::copy_(&dst, &foreign, false).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::UnsupportedTensorCategory(TensorCategory::Device(DeviceType::Cuda))
    ));
    Ok(())
}

#[test]
fn failed_zero_leaves_contents_untouched() -> Result<()> {
    let provider = Arc::new(GenericCpuProvider::with_interceptor(FailingZeroGradient));
    install_invoker(1, Invoker::new(provider, 1));

    let tensor = ops::empty(&[3], device(Device::ort(1)), None)?;
    let src = HostTensor::from_vec(&[3], vec![4.0f32, 5.0, 6.0])?;
    ops::copy_(&tensor, &src, false)?;

    let err = ops::zero_(&tensor).unwrap_err();
    match err {
        BridgeError::EngineInvocationFailure { op, message } => {
            assert_eq!(op, "ZeroGradient");
            assert!(message.contains("injected failure"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(tensor.to_vec::<f32>()?, vec![4.0, 5.0, 6.0]);
    Ok(())
}

#[test]
fn unconfigured_device_index_is_invalid() {
    ort_bridge_provider_cpu::register_cpu_provider();
    let err = ops::empty(&[1], device(Device::ort(9)), None).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidDevice { .. }));
}

#[test]
fn unsupported_tensors_never_reach_the_engine() -> Result<()> {
    const INDEX: i8 = 3;
    let provider = Arc::new(CountingProvider::default());
    install_invoker(INDEX, Invoker::new(provider.clone(), INDEX));
    let ort = Device::ort(INDEX);

    let dst = ops::empty(&[4], device(ort), None)?;
    let indices = HostTensor::from_vec(&[1, 2], vec![0i64, 2])?;
    let values = ops::empty(&[2], device(ort), None)?;
    let sparse = HostTensor::sparse_coo(indices, values, &[4]);
    assert_eq!(sparse.device(), ort);
    let quantized = HostTensor::quantize_per_tensor(&[4], &[0.0, 0.5, 1.0, 1.5], 0.5, 0)?;
    let before = provider.counts();

    for bad in [&sparse, &quantized] {
        assert!(ops::copy_(&dst, bad, false).is_err());
        assert!(ops::copy_(bad, &dst, false).is_err());
        assert!(ops::zero_(bad).is_err());
        assert!(ops::zeros_like(bad, None, None, None, None, None).is_err());
        assert!(ops::reshape(bad, &[2, 2]).is_err());
        assert!(ops::view(bad, &[-1]).is_err());
        assert!(ops::add(&dst, bad, Scalar::Long(1)).is_err());
        assert!(ops::add_(bad, &dst, Scalar::Long(1)).is_err());
        assert!(ops::relu(bad).is_err());
    }
    assert_eq!(provider.counts(), before);

    assert!(uninstall_invoker(INDEX).is_some());
    assert!(matches!(
        ops::empty(&[1], device(ort), None),
        Err(BridgeError::InvalidDevice { .. })
    ));
    Ok(())
}
