use std::sync::Arc;

use ort_bridge::bridge::{create_attribute, scalar_to_engine_value, to_engine_value};
use ort_bridge::engine::{
    ElementType, EngineValue, ExecutionProvider, Invoker, MemType, NodeAttributes, MS_DOMAIN,
    ONNX_DOMAIN,
};
use ort_bridge::host::{HostTensor, Scalar};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn invoker<P: ExecutionProvider + 'static>(provider: &Arc<P>) -> Invoker {
    let provider: Arc<dyn ExecutionProvider> = provider.clone();
    Invoker::new(provider, 0)
}

fn random_values(seed: u64, len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-2.0f32..2.0)).collect()
}

fn value_from(invoker: &Invoker, shape: &[usize], data: &[f32]) -> EngineValue {
    let allocator = invoker.default_allocator().expect("default allocator");
    EngineValue::from_slice(allocator.as_ref(), shape, data).expect("engine value")
}

fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= tol, "lane {i}: {a} vs {e}");
    }
}

pub fn allocator_returns_zeroed_buffers<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let allocator = provider
        .allocator(0, MemType::Default)
        .expect("default allocator");
    assert_eq!(allocator.info().device_id, 0);
    let value = EngineValue::allocate(allocator.as_ref(), ElementType::Double, &[3, 5])
        .expect("allocate");
    assert_eq!(value.byte_len(), 3 * 5 * 8);
    assert!(value.to_bytes().iter().all(|b| *b == 0));
}

pub fn zero_gradient_zeroes_every_lane<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let data = random_values(1, 12);
    let x = value_from(&invoker, &[3, 4], &data);
    let allocator = invoker.default_allocator().expect("default allocator");
    let flag = EngineValue::from_slice(allocator.as_ref(), &[], &[1i64]).expect("flag");
    let out = invoker
        .invoke("ZeroGradient", vec![x.clone(), flag], 1, None, MS_DOMAIN)
        .expect("ZeroGradient");
    assert_eq!(out[0].shape(), &[3, 4]);
    assert_eq!(out[0].element_type(), ElementType::Float);
    assert!(out[0].to_bytes().iter().all(|b| *b == 0));
    assert_eq!(x.to_vec::<f32>().expect("input"), data);
}

pub fn copy_tensor_overwrites_destination<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let data = random_values(2, 6);
    let src = value_from(&invoker, &[2, 3], &data);
    let dst = value_from(&invoker, &[2, 3], &[0.0; 6]);
    invoker.copy(&src, &dst).expect("copy");
    assert_eq!(dst.to_bytes(), src.to_bytes());
    assert!(!dst.shares_buffer(&src));
}

pub fn copy_tensor_rejects_mismatched_shapes<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let src = value_from(&invoker, &[2, 3], &[1.0; 6]);
    let dst = value_from(&invoker, &[6], &[0.0; 6]);
    assert!(invoker.copy(&src, &dst).is_err());
    assert!(dst.to_bytes().iter().all(|b| *b == 0));
}

pub fn reshape_copy_preserves_bytes<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let src = value_from(&invoker, &[2, 3], &random_values(3, 6));
    let out = invoker.reshape_copy(&src, &[3, 2]).expect("reshape copy");
    assert_eq!(out.shape(), &[3, 2]);
    assert_eq!(out.to_bytes(), src.to_bytes());
    assert!(!out.shares_buffer(&src));
    assert!(invoker.reshape_copy(&src, &[4]).is_err());
}

pub fn add_with_scaled_other_matches_reference<P: ExecutionProvider + 'static>(
    provider: &Arc<P>,
) {
    let invoker = invoker(provider);
    let a = random_values(4, 8);
    let b = random_values(5, 8);
    let lhs = HostTensor::from_vec(&[2, 4], a.clone()).expect("lhs");
    let rhs = HostTensor::from_vec(&[2, 4], b.clone()).expect("rhs");

    let alpha = scalar_to_engine_value(&invoker, Scalar::Double(0.5)).expect("alpha");
    let lhs_value = to_engine_value(&lhs).expect("bridge lhs");
    let rhs_value = to_engine_value(&rhs).expect("bridge rhs");
    let scaled = invoker
        .invoke("Mul", vec![alpha, rhs_value], 1, None, ONNX_DOMAIN)
        .expect("Mul")
        .remove(0);
    let sum = invoker
        .invoke("Add", vec![lhs_value, scaled], 1, None, ONNX_DOMAIN)
        .expect("Add")
        .remove(0);

    let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + 0.5 * y).collect();
    assert_eq!(sum.shape(), &[2, 4]);
    assert_close(&sum.to_vec::<f32>().expect("sum"), &expected, 1e-6);
}

pub fn leaky_relu_reads_alpha_attribute<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let x = value_from(&invoker, &[4], &[-2.0, -0.5, 0.0, 3.0]);
    let attributes: NodeAttributes = [create_attribute("alpha", Scalar::Double(0.25))
        .expect("alpha attribute")]
    .into_iter()
    .collect();
    let out = invoker
        .invoke("LeakyRelu", vec![x], 1, Some(&attributes), ONNX_DOMAIN)
        .expect("LeakyRelu");
    assert_close(
        &out[0].to_vec::<f32>().expect("output"),
        &[-0.5, -0.125, 0.0, 3.0],
        1e-6,
    );
}

pub fn sgd_step_matches_reference<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let w = random_values(6, 5);
    let g = random_values(7, 5);
    let lr = scalar_to_engine_value(&invoker, Scalar::Double(0.1)).expect("lr");
    let out = invoker
        .invoke(
            "SGDOptimizer",
            vec![lr, value_from(&invoker, &[5], &w), value_from(&invoker, &[5], &g)],
            1,
            None,
            MS_DOMAIN,
        )
        .expect("SGDOptimizer");
    let expected: Vec<f32> = w.iter().zip(&g).map(|(w, g)| w - 0.1 * g).collect();
    assert_close(&out[0].to_vec::<f32>().expect("weights"), &expected, 1e-6);
}

pub fn adam_first_step_moves_against_gradient<P: ExecutionProvider + 'static>(
    provider: &Arc<P>,
) {
    let invoker = invoker(provider);
    let allocator = invoker.default_allocator().expect("default allocator");
    let w = random_values(8, 4);
    let g = vec![0.5f32, -1.0, 2.0, -0.25];
    let lr = scalar_to_engine_value(&invoker, Scalar::Double(0.01)).expect("lr");
    let step = EngineValue::from_slice(allocator.as_ref(), &[], &[0i64]).expect("step");
    let inputs = vec![
        lr,
        step,
        value_from(&invoker, &[4], &w),
        value_from(&invoker, &[4], &g),
        value_from(&invoker, &[4], &[0.0; 4]),
        value_from(&invoker, &[4], &[0.0; 4]),
    ];
    let attributes: NodeAttributes = [
        ("alpha", 0.9),
        ("beta", 0.999),
        ("lambda", 0.0),
        ("epsilon", 1e-8),
    ]
    .into_iter()
    .map(|(name, v)| create_attribute(name, Scalar::Double(v)).expect("attribute"))
    .collect();

    let out = invoker
        .invoke("AdamOptimizer", inputs, 4, Some(&attributes), MS_DOMAIN)
        .expect("AdamOptimizer");
    assert_eq!(out[0].to_vec::<i64>().expect("step"), vec![1]);
    let m1: Vec<f32> = g.iter().map(|g| 0.1 * g).collect();
    assert_close(&out[1].to_vec::<f32>().expect("moment1"), &m1, 1e-6);
    let expected: Vec<f32> = w
        .iter()
        .zip(&g)
        .map(|(w, g)| w - 0.01 * g.signum())
        .collect();
    assert_close(&out[3].to_vec::<f32>().expect("weights"), &expected, 1e-4);
}

pub fn unknown_operator_fails<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let x = value_from(&invoker, &[1], &[1.0]);
    assert!(invoker
        .invoke("DefinitelyNotAnOp", vec![x], 1, None, ONNX_DOMAIN)
        .is_err());
}

pub fn invoke_checks_output_count<P: ExecutionProvider + 'static>(provider: &Arc<P>) {
    let invoker = invoker(provider);
    let x = value_from(&invoker, &[2], &[1.0, 2.0]);
    assert!(invoker
        .invoke("Relu", vec![x], 2, None, ONNX_DOMAIN)
        .is_err());
}
