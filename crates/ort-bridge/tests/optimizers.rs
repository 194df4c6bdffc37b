use std::sync::Arc;

use anyhow::Result;
use ort_bridge::engine::{EngineError, EngineResult, EngineValue, Invoker, NodeAttributes};
use ort_bridge::host::device;
use ort_bridge::ops;
use ort_bridge::optim::{Adam, AdamConfig, Optimizer, Sgd};
use ort_bridge::registry::install_invoker;
use ort_bridge::{BridgeError, Device, HostTensor};
use ort_bridge_provider_cpu::{CpuKernelInterceptor, GenericCpuProvider};

/// Fails both fused optimizer operators.
struct FailingOptimizers;

impl CpuKernelInterceptor for FailingOptimizers {
    fn try_invoke(
        &self,
        op_name: &str,
        _domain: &str,
        _inputs: &[EngineValue],
        _attributes: &NodeAttributes,
    ) -> Option<EngineResult<Vec<EngineValue>>> {
        matches!(op_name, "SGDOptimizer" | "AdamOptimizer")
            .then(|| Err(EngineError::fail("optimizer unavailable")))
    }
}

const FAILING_INDEX: i8 = 2;

/// Parameter on a device whose provider rejects every optimizer call.
fn failing_param(data: Vec<f32>) -> Result<HostTensor> {
    let provider = Arc::new(GenericCpuProvider::with_interceptor(FailingOptimizers));
    install_invoker(FAILING_INDEX, Invoker::new(provider, FAILING_INDEX));
    let sizes = [data.len()];
    let param = ops::empty(&[data.len() as i64], device(Device::ort(FAILING_INDEX)), None)?;
    ops::copy_(&param, &HostTensor::from_vec(&sizes, data)?, false)?;
    Ok(param)
}

fn sparse_grad() -> Result<HostTensor> {
    let indices = HostTensor::from_vec(&[1, 1], vec![0i64])?;
    let values = HostTensor::from_vec(&[1], vec![1.0f32])?;
    Ok(HostTensor::sparse_coo(indices, values, &[2]))
}

fn setup() {
    ort_bridge_provider_cpu::register_cpu_provider();
}

#[test]
fn sgd_updates_parameters_in_place() -> Result<()> {
    setup();
    let weights = HostTensor::from_vec(&[3], vec![1.0f32, 2.0, 3.0])?;
    let grads = HostTensor::from_vec(&[3], vec![10.0f32, -10.0, 0.0])?;
    let mut sgd = Sgd::new(vec![weights.clone()], 0.1)?;

    sgd.step(&[grads.clone()])?;
    assert!(sgd.params()[0].is_same(&weights));
    let updated = weights.to_vec::<f32>()?;
    for (got, want) in updated.iter().zip([0.0f32, 3.0, 3.0]) {
        assert!((got - want).abs() < 1e-6, "{got} vs {want}");
    }

    sgd.lr = 0.0;
    sgd.step(&[grads])?;
    assert_eq!(weights.to_vec::<f32>()?, updated);
    Ok(())
}

#[test]
fn adam_tracks_state_across_steps() -> Result<()> {
    setup();
    let weights = HostTensor::from_vec(&[2], vec![0.5f32, -0.5])?;
    let grads = HostTensor::from_vec(&[2], vec![1.0f32, -2.0])?;
    let config = AdamConfig {
        lr: 0.01,
        ..AdamConfig::default()
    };
    let mut adam = Adam::new(vec![weights.clone()], config)?;

    adam.step(&[grads.clone()])?;
    let first = weights.to_vec::<f32>()?;
    assert!((first[0] - 0.49).abs() < 1e-4);
    assert!((first[1] + 0.49).abs() < 1e-4);

    adam.step(&[grads])?;
    let state = adam
        .state(0)
        .ok_or_else(|| anyhow::anyhow!("missing adam state"))?;
    assert_eq!(state.step.to_vec::<i64>()?, vec![2]);
    let second = weights.to_vec::<f32>()?;
    assert!(second[0] < first[0]);
    assert!(second[1] > first[1]);
    Ok(())
}

#[test]
fn optimizers_validate_gradients() -> Result<()> {
    setup();
    let weights = HostTensor::from_vec(&[2], vec![0.0f32; 2])?;
    assert!(Sgd::new(Vec::new(), 0.1).is_err());

    let mut sgd = Sgd::new(vec![weights], 0.1)?;
    let err = sgd.step(&[]).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument(_)));
    let wrong = HostTensor::from_vec(&[3], vec![0.0f32; 3])?;
    assert!(sgd.step(&[wrong]).is_err());
    Ok(())
}

#[test]
fn sgd_leaves_every_parameter_alone_when_a_later_one_fails() -> Result<()> {
    setup();
    let first = HostTensor::from_vec(&[2], vec![1.0f32, 1.0])?;
    let second = HostTensor::from_vec(&[2], vec![2.0f32, 2.0])?;
    let mut sgd = Sgd::new(vec![first.clone(), second.clone()], 0.5)?;

    let grad = HostTensor::from_vec(&[2], vec![1.0f32, 1.0])?;
    let err = sgd.step(&[grad.clone(), sparse_grad()?]).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedTensorCategory(_)));
    assert_eq!(first.to_vec::<f32>()?, vec![1.0, 1.0]);

    let failing = failing_param(vec![3.0, 3.0])?;
    let mut sgd = Sgd::new(vec![first.clone(), failing.clone()], 0.5)?;
    let err = sgd.step(&[grad.clone(), grad]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::EngineInvocationFailure { ref op, .. } if op == "SGDOptimizer"
    ));
    assert_eq!(first.to_vec::<f32>()?, vec![1.0, 1.0]);
    assert_eq!(failing.to_vec::<f32>()?, vec![3.0, 3.0]);
    Ok(())
}

#[test]
fn adam_keeps_weights_and_state_when_a_later_parameter_fails() -> Result<()> {
    setup();
    let first = HostTensor::from_vec(&[2], vec![1.0f32, -1.0])?;
    let failing = failing_param(vec![4.0, 4.0])?;
    let mut adam = Adam::new(vec![first.clone(), failing], AdamConfig::default())?;

    let grad = HostTensor::from_vec(&[2], vec![0.5f32, 0.5])?;
    let err = adam.step(&[grad.clone(), grad]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::EngineInvocationFailure { ref op, .. } if op == "AdamOptimizer"
    ));
    assert_eq!(first.to_vec::<f32>()?, vec![1.0, -1.0]);
    let state = adam
        .state(0)
        .ok_or_else(|| anyhow::anyhow!("missing adam state"))?;
    assert_eq!(state.step.to_vec::<i64>()?, vec![0]);
    assert_eq!(state.moment1.to_vec::<f32>()?, vec![0.0, 0.0]);
    Ok(())
}
