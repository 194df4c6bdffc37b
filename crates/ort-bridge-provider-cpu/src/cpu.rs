use std::sync::Arc;

use half::{bf16, f16};
use ort_bridge::engine::{
    Allocator, ElementType, EngineError, EngineResult, EngineValue, ExecutionProvider,
    HostAllocator, MemType, NodeAttributes, MS_DOMAIN, ONNX_DOMAIN,
};
use tracing::trace;

/// Hook that can answer an operator call before the built-in kernels see it.
pub trait CpuKernelInterceptor: Send + Sync {
    fn try_invoke(
        &self,
        op_name: &str,
        domain: &str,
        inputs: &[EngineValue],
        attributes: &NodeAttributes,
    ) -> Option<EngineResult<Vec<EngineValue>>>;
}

#[derive(Default)]
pub struct NoopInterceptor;

impl CpuKernelInterceptor for NoopInterceptor {
    fn try_invoke(
        &self,
        _op_name: &str,
        _domain: &str,
        _inputs: &[EngineValue],
        _attributes: &NodeAttributes,
    ) -> Option<EngineResult<Vec<EngineValue>>> {
        None
    }
}

#[derive(Clone)]
pub struct GenericCpuProvider<I: CpuKernelInterceptor> {
    interceptor: Arc<I>,
    allocator: Arc<HostAllocator>,
}

impl<I: CpuKernelInterceptor> GenericCpuProvider<I> {
    pub fn with_interceptor(interceptor: I) -> Self {
        Self::with_arc(Arc::new(interceptor))
    }

    pub fn with_arc(interceptor: Arc<I>) -> Self {
        Self {
            interceptor,
            allocator: Arc::new(HostAllocator::new("Cpu", 0, MemType::Default)),
        }
    }

    pub fn interceptor(&self) -> &I {
        self.interceptor.as_ref()
    }
}

impl GenericCpuProvider<NoopInterceptor> {
    pub fn new() -> Self {
        Self::with_interceptor(NoopInterceptor)
    }
}

impl Default for GenericCpuProvider<NoopInterceptor> {
    fn default() -> Self {
        Self::new()
    }
}

pub type CpuExecutionProvider = GenericCpuProvider<NoopInterceptor>;

impl<I: CpuKernelInterceptor> ExecutionProvider for GenericCpuProvider<I> {
    fn provider_type(&self) -> &str {
        "cpu"
    }

    fn allocator(&self, device_id: i32, mem_type: MemType) -> EngineResult<Arc<dyn Allocator>> {
        if device_id == 0 && mem_type == MemType::Default {
            return Ok(self.allocator.clone());
        }
        Ok(Arc::new(HostAllocator::new("Cpu", device_id, mem_type)))
    }

    fn invoke(
        &self,
        op_name: &str,
        domain: &str,
        inputs: &[EngineValue],
        attributes: &NodeAttributes,
    ) -> EngineResult<Vec<EngineValue>> {
        trace!(op = op_name, domain, inputs = inputs.len(), "cpu invoke");
        if let Some(result) = self
            .interceptor
            .try_invoke(op_name, domain, inputs, attributes)
        {
            return result;
        }
        execute_op(self.allocator.as_ref(), op_name, domain, inputs, attributes)
    }
}

fn execute_op(
    allocator: &dyn Allocator,
    op_name: &str,
    domain: &str,
    inputs: &[EngineValue],
    attributes: &NodeAttributes,
) -> EngineResult<Vec<EngineValue>> {
    match (domain, op_name) {
        (MS_DOMAIN, "ZeroGradient") => zero_gradient(allocator, inputs),
        (MS_DOMAIN, "SGDOptimizer") => sgd_optimizer(allocator, inputs),
        (MS_DOMAIN, "AdamOptimizer") => adam_optimizer(allocator, inputs, attributes),
        (ONNX_DOMAIN, "Add") => binary(allocator, op_name, inputs, |a, b| a + b),
        (ONNX_DOMAIN, "Sub") => binary(allocator, op_name, inputs, |a, b| a - b),
        (ONNX_DOMAIN, "Mul") => binary(allocator, op_name, inputs, |a, b| a * b),
        (ONNX_DOMAIN, "Div") => binary(allocator, op_name, inputs, |a, b| a / b),
        (ONNX_DOMAIN, "Relu") => unary(allocator, op_name, inputs, |x| x.max(0.0)),
        (ONNX_DOMAIN, "Neg") => unary(allocator, op_name, inputs, |x| -x),
        (ONNX_DOMAIN, "Abs") => unary(allocator, op_name, inputs, f64::abs),
        (ONNX_DOMAIN, "Exp") => unary(allocator, op_name, inputs, f64::exp),
        (ONNX_DOMAIN, "Sigmoid") => {
            unary(allocator, op_name, inputs, |x| 1.0 / (1.0 + (-x).exp()))
        }
        (ONNX_DOMAIN, "LeakyRelu") => {
            let alpha = f64::from(attributes.get_float("alpha").unwrap_or(0.01));
            unary(allocator, op_name, inputs, move |x| if x < 0.0 { alpha * x } else { x })
        }
        (ONNX_DOMAIN, "Identity") => unary(allocator, op_name, inputs, |x| x),
        _ => Err(EngineError::not_implemented(format!(
            "cpu provider has no kernel for {}{}",
            if domain.is_empty() {
                String::new()
            } else {
                format!("{domain}:")
            },
            op_name
        ))),
    }
}

fn expect_inputs(op: &str, inputs: &[EngineValue], count: usize) -> EngineResult<()> {
    if inputs.len() != count {
        return Err(EngineError::invalid_argument(format!(
            "{op} expects {count} inputs, got {}",
            inputs.len()
        )));
    }
    Ok(())
}

/// Decodes any element type into `f64` lanes.
fn decode(value: &EngineValue) -> EngineResult<Vec<f64>> {
    let lanes: Vec<f64> = match value.element_type() {
        ElementType::Float => value.to_vec::<f32>()?.into_iter().map(f64::from).collect(),
        ElementType::Double => value.to_vec::<f64>()?,
        ElementType::Float16 => value.to_vec::<f16>()?.into_iter().map(f16::to_f64).collect(),
        ElementType::BFloat16 => value.to_vec::<bf16>()?.into_iter().map(bf16::to_f64).collect(),
        ElementType::Int8 => value.to_vec::<i8>()?.into_iter().map(f64::from).collect(),
        ElementType::Int16 => value.to_vec::<i16>()?.into_iter().map(f64::from).collect(),
        ElementType::Int32 => value.to_vec::<i32>()?.into_iter().map(f64::from).collect(),
        ElementType::Int64 => value.to_vec::<i64>()?.into_iter().map(|v| v as f64).collect(),
        ElementType::UInt8 => value.to_vec::<u8>()?.into_iter().map(f64::from).collect(),
        ElementType::Bool => value
            .to_bytes()
            .into_iter()
            .map(|b| if b != 0 { 1.0 } else { 0.0 })
            .collect(),
    };
    Ok(lanes)
}

/// Encodes `f64` lanes into a fresh value of `element_type`. Integer types truncate.
fn encode(
    allocator: &dyn Allocator,
    element_type: ElementType,
    shape: &[usize],
    lanes: &[f64],
) -> EngineResult<EngineValue> {
    match element_type {
        ElementType::Float => {
            let data: Vec<f32> = lanes.iter().map(|&v| v as f32).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Double => EngineValue::from_slice(allocator, shape, lanes),
        ElementType::Float16 => {
            let data: Vec<f16> = lanes.iter().map(|&v| f16::from_f64(v)).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::BFloat16 => {
            let data: Vec<bf16> = lanes.iter().map(|&v| bf16::from_f64(v)).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Int8 => {
            let data: Vec<i8> = lanes.iter().map(|&v| v as i8).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Int16 => {
            let data: Vec<i16> = lanes.iter().map(|&v| v as i16).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Int32 => {
            let data: Vec<i32> = lanes.iter().map(|&v| v as i32).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Int64 => {
            let data: Vec<i64> = lanes.iter().map(|&v| v as i64).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::UInt8 => {
            let data: Vec<u8> = lanes.iter().map(|&v| v as u8).collect();
            EngineValue::from_slice(allocator, shape, &data)
        }
        ElementType::Bool => {
            let value = EngineValue::allocate(allocator, element_type, shape)?;
            let bytes: Vec<u8> = lanes.iter().map(|&v| u8::from(v != 0.0)).collect();
            value
                .buffer()
                .overwrite(&bytes)
                .map_err(|len| EngineError::fail(format!("bool buffer holds {len} bytes")))?;
            Ok(value)
        }
    }
}

fn unary(
    allocator: &dyn Allocator,
    op: &str,
    inputs: &[EngineValue],
    f: impl Fn(f64) -> f64,
) -> EngineResult<Vec<EngineValue>> {
    expect_inputs(op, inputs, 1)?;
    let x = &inputs[0];
    let lanes: Vec<f64> = decode(x)?.into_iter().map(f).collect();
    Ok(vec![encode(allocator, x.element_type(), x.shape(), &lanes)?])
}

/// Elementwise binary op. Operands must agree in shape unless one holds a single element.
fn binary(
    allocator: &dyn Allocator,
    op: &str,
    inputs: &[EngineValue],
    f: impl Fn(f64, f64) -> f64,
) -> EngineResult<Vec<EngineValue>> {
    expect_inputs(op, inputs, 2)?;
    let (lhs, rhs) = (&inputs[0], &inputs[1]);
    let a = decode(lhs)?;
    let b = decode(rhs)?;

    let out = if lhs.shape() == rhs.shape() {
        if lhs.element_type() != rhs.element_type() {
            return Err(EngineError::invalid_argument(format!(
                "{op} operands have element types {} and {}",
                lhs.element_type(),
                rhs.element_type()
            )));
        }
        lhs
    } else if b.len() == 1 {
        lhs
    } else if a.len() == 1 {
        rhs
    } else {
        return Err(EngineError::invalid_argument(format!(
            "{op} cannot broadcast {:?} with {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    };

    let lanes: Vec<f64> = (0..out.numel())
        .map(|i| {
            let x = if a.len() == 1 { a[0] } else { a[i] };
            let y = if b.len() == 1 { b[0] } else { b[i] };
            f(x, y)
        })
        .collect();
    Ok(vec![encode(allocator, out.element_type(), out.shape(), &lanes)?])
}

fn scalar_lane(op: &str, name: &str, value: &EngineValue) -> EngineResult<f64> {
    let lanes = decode(value)?;
    match lanes.as_slice() {
        [v] => Ok(*v),
        _ => Err(EngineError::invalid_argument(format!(
            "{op} expects a single-element {name}, got shape {:?}",
            value.shape()
        ))),
    }
}

fn same_shape(op: &str, reference: &EngineValue, other: &EngineValue) -> EngineResult<()> {
    if reference.shape() != other.shape() {
        return Err(EngineError::invalid_argument(format!(
            "{op} expects shape {:?}, got {:?}",
            reference.shape(),
            other.shape()
        )));
    }
    Ok(())
}

/// `ZeroGradient(x, flag)`: zeros shaped like `x`. The flag only orders execution.
fn zero_gradient(
    allocator: &dyn Allocator,
    inputs: &[EngineValue],
) -> EngineResult<Vec<EngineValue>> {
    expect_inputs("ZeroGradient", inputs, 2)?;
    let x = &inputs[0];
    Ok(vec![EngineValue::allocate(
        allocator,
        x.element_type(),
        x.shape(),
    )?])
}

/// `SGDOptimizer(lr, w, g) -> w - lr * g`.
fn sgd_optimizer(
    allocator: &dyn Allocator,
    inputs: &[EngineValue],
) -> EngineResult<Vec<EngineValue>> {
    expect_inputs("SGDOptimizer", inputs, 3)?;
    let lr = scalar_lane("SGDOptimizer", "learning rate", &inputs[0])?;
    let (w, g) = (&inputs[1], &inputs[2]);
    same_shape("SGDOptimizer", w, g)?;
    let lanes: Vec<f64> = decode(w)?
        .into_iter()
        .zip(decode(g)?)
        .map(|(w, g)| w - lr * g)
        .collect();
    Ok(vec![encode(allocator, w.element_type(), w.shape(), &lanes)?])
}

/// `AdamOptimizer(lr, step, w, g, m1, m2) -> (step', m1', m2', w')` with bias correction.
fn adam_optimizer(
    allocator: &dyn Allocator,
    inputs: &[EngineValue],
    attributes: &NodeAttributes,
) -> EngineResult<Vec<EngineValue>> {
    const OP: &str = "AdamOptimizer";
    expect_inputs(OP, inputs, 6)?;
    let alpha = f64::from(attributes.get_float("alpha").unwrap_or(0.9));
    let beta = f64::from(attributes.get_float("beta").unwrap_or(0.999));
    let lambda = f64::from(attributes.get_float("lambda").unwrap_or(0.0));
    let epsilon = f64::from(attributes.get_float("epsilon").unwrap_or(1e-8));

    let lr = scalar_lane(OP, "learning rate", &inputs[0])?;
    let step_value = &inputs[1];
    let step = scalar_lane(OP, "step", step_value)? + 1.0;
    let (w, g, m1, m2) = (&inputs[2], &inputs[3], &inputs[4], &inputs[5]);
    for other in [g, m1, m2] {
        same_shape(OP, w, other)?;
    }

    let weights = decode(w)?;
    let grads = decode(g)?;
    let mut moment1 = decode(m1)?;
    let mut moment2 = decode(m2)?;
    let mut updated = Vec::with_capacity(weights.len());
    let bias1 = 1.0 - alpha.powf(step);
    let bias2 = 1.0 - beta.powf(step);
    for i in 0..weights.len() {
        moment1[i] = alpha * moment1[i] + (1.0 - alpha) * grads[i];
        moment2[i] = beta * moment2[i] + (1.0 - beta) * grads[i] * grads[i];
        let m_hat = moment1[i] / bias1;
        let v_hat = moment2[i] / bias2;
        updated.push(weights[i] - lr * (m_hat / (v_hat.sqrt() + epsilon) + lambda * weights[i]));
    }

    Ok(vec![
        encode(allocator, step_value.element_type(), step_value.shape(), &[step])?,
        encode(allocator, m1.element_type(), m1.shape(), &moment1)?,
        encode(allocator, m2.element_type(), m2.shape(), &moment2)?,
        encode(allocator, w.element_type(), w.shape(), &updated)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> HostAllocator {
        HostAllocator::new("Cpu", 0, MemType::Default)
    }

    #[test]
    fn integer_division_truncates() {
        let alloc = allocator();
        let a = EngineValue::from_slice(&alloc, &[2], &[7i32, -7]).unwrap();
        let b = EngineValue::from_slice(&alloc, &[], &[2i32]).unwrap();
        let out = execute_op(&alloc, "Div", ONNX_DOMAIN, &[a, b], &NodeAttributes::new()).unwrap();
        assert_eq!(out[0].to_vec::<i32>().unwrap(), vec![3, -3]);
    }

    #[test]
    fn scalar_broadcast_keeps_tensor_element_type() {
        let alloc = allocator();
        let scalar = EngineValue::from_slice(&alloc, &[], &[2.0f32]).unwrap();
        let x = EngineValue::from_slice(&alloc, &[3], &[1.0f64, 2.0, 3.0]).unwrap();
        let out = execute_op(&alloc, "Mul", ONNX_DOMAIN, &[scalar, x], &NodeAttributes::new())
            .unwrap();
        assert_eq!(out[0].element_type(), ElementType::Double);
        assert_eq!(out[0].to_vec::<f64>().unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let alloc = allocator();
        let a = EngineValue::from_slice(&alloc, &[2], &[1.0f32, 2.0]).unwrap();
        let b = EngineValue::from_slice(&alloc, &[3], &[1.0f32, 2.0, 3.0]).unwrap();
        assert!(execute_op(&alloc, "Add", ONNX_DOMAIN, &[a, b], &NodeAttributes::new()).is_err());
    }

    #[test]
    fn onnx_ops_are_not_found_in_the_ms_domain() {
        let alloc = allocator();
        let x = EngineValue::from_slice(&alloc, &[1], &[1.0f32]).unwrap();
        let err = execute_op(&alloc, "Relu", MS_DOMAIN, &[x], &NodeAttributes::new()).unwrap_err();
        assert_eq!(err.code, ort_bridge::engine::StatusCode::NotImplemented);
        assert!(err.message.contains("com.microsoft:Relu"));
    }

    #[test]
    fn half_precision_round_trips_through_f64_lanes() {
        let alloc = allocator();
        let x = EngineValue::from_slice(&alloc, &[2], &[f16::from_f32(-1.5), f16::from_f32(2.0)])
            .unwrap();
        let out = execute_op(&alloc, "Abs", ONNX_DOMAIN, &[x], &NodeAttributes::new()).unwrap();
        assert_eq!(
            out[0].to_vec::<f16>().unwrap(),
            vec![f16::from_f32(1.5), f16::from_f32(2.0)]
        );
    }
}
