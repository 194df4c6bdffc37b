//! Optimizers that run their update rule as engine operators.
//!
//! Parameters and gradients are host tensors on an ort device (or dense CPU tensors, which
//! are aliased). Each step invokes the engine's fused optimizer operator per parameter and
//! writes the new weights back into the parameter's own buffer. A step either updates every
//! parameter (and its state) or none of them.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bridge::{
    assert_tensor_supported, create_attribute, scalar_to_engine_value, to_engine_value,
};
use crate::engine::{EngineError, EngineValue, Invoker, NodeAttributes, MS_DOMAIN};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, HostTensor, Scalar};
use crate::ops::write_back;
use crate::registry::invoker_for;

pub trait Optimizer {
    fn step(&mut self, grads: &[HostTensor]) -> BridgeResult<()>;
}

fn check_params(params: &[HostTensor]) -> BridgeResult<()> {
    if params.is_empty() {
        return Err(BridgeError::invalid_argument("optimizer needs at least one parameter"));
    }
    for param in params {
        assert_tensor_supported(param)?;
    }
    Ok(())
}

fn check_grads(params: &[HostTensor], grads: &[HostTensor]) -> BridgeResult<()> {
    if params.len() != grads.len() {
        return Err(BridgeError::invalid_argument(format!(
            "{} gradients for {} parameters",
            grads.len(),
            params.len()
        )));
    }
    for (param, grad) in params.iter().zip(grads) {
        if param.sizes() != grad.sizes() {
            return Err(BridgeError::invalid_argument(format!(
                "gradient sizes {:?} do not match parameter sizes {:?}",
                grad.sizes(),
                param.sizes()
            )));
        }
    }
    Ok(())
}

/// Dense CPU parameters are updated through the default ort device.
fn param_invoker(param: &HostTensor) -> BridgeResult<Arc<Invoker>> {
    let device = if param.device().is_ort() {
        param.device()
    } else {
        Device::ort(0)
    };
    invoker_for(device)
}

/// One parameter and its gradient, bridged and bound to the invoker that updates them.
struct BridgedParam {
    weights: EngineValue,
    gradients: EngineValue,
    invoker: Arc<Invoker>,
}

/// Bridges every parameter and gradient before any engine work starts.
fn bridge_all(params: &[HostTensor], grads: &[HostTensor]) -> BridgeResult<Vec<BridgedParam>> {
    params
        .iter()
        .zip(grads)
        .map(|(param, grad)| {
            Ok(BridgedParam {
                weights: to_engine_value(param)?,
                gradients: to_engine_value(grad)?,
                invoker: param_invoker(param)?,
            })
        })
        .collect()
}

/// Writes every updated weight back once all of them are known to fit.
fn commit_weights(op: &str, bridged: &[BridgedParam], updates: &[EngineValue]) -> BridgeResult<()> {
    for (slot, update) in bridged.iter().zip(updates) {
        if update.byte_len() != slot.weights.byte_len() {
            return Err(BridgeError::invocation(
                op,
                EngineError::fail(format!(
                    "result holds {} bytes but the parameter holds {}",
                    update.byte_len(),
                    slot.weights.byte_len()
                )),
            ));
        }
    }
    for (slot, update) in bridged.iter().zip(updates) {
        write_back(op, update, &slot.weights)?;
    }
    Ok(())
}

/// Plain stochastic gradient descent through `SGDOptimizer`.
pub struct Sgd {
    params: Vec<HostTensor>,
    pub lr: f64,
}

impl Sgd {
    pub fn new(params: Vec<HostTensor>, lr: f64) -> BridgeResult<Self> {
        check_params(&params)?;
        Ok(Sgd { params, lr })
    }

    pub fn params(&self) -> &[HostTensor] {
        &self.params
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, grads: &[HostTensor]) -> BridgeResult<()> {
        check_grads(&self.params, grads)?;
        debug!(params = self.params.len(), lr = self.lr, "sgd step");
        let bridged = bridge_all(&self.params, grads)?;

        let mut updates = Vec::with_capacity(bridged.len());
        for slot in &bridged {
            let lr = scalar_to_engine_value(&slot.invoker, Scalar::Double(self.lr))?;
            let mut outputs = slot
                .invoker
                .invoke(
                    "SGDOptimizer",
                    vec![lr, slot.weights.clone(), slot.gradients.clone()],
                    1,
                    None,
                    MS_DOMAIN,
                )
                .map_err(|err| {
                    warn!(error = %err, "SGDOptimizer failed");
                    BridgeError::invocation("SGDOptimizer", err)
                })?;
            updates.push(outputs.remove(0));
        }

        commit_weights("SGDOptimizer", &bridged, &updates)
    }
}

/// Hyperparameters of [`Adam`], named after the engine operator's attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub lr: f64,
    /// First moment decay.
    pub alpha: f64,
    /// Second moment decay.
    pub beta: f64,
    /// Weight decay.
    pub lambda: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            lr: 1e-3,
            alpha: 0.9,
            beta: 0.999,
            lambda: 0.0,
            epsilon: 1e-8,
        }
    }
}

/// Per-parameter optimizer state kept as engine values between steps.
#[derive(Debug, Clone)]
pub struct AdamState {
    pub step: EngineValue,
    pub moment1: EngineValue,
    pub moment2: EngineValue,
}

/// Adam through the fused `AdamOptimizer` operator.
pub struct Adam {
    params: Vec<HostTensor>,
    states: Vec<AdamState>,
    pub config: AdamConfig,
}

impl Adam {
    pub fn new(params: Vec<HostTensor>, config: AdamConfig) -> BridgeResult<Self> {
        check_params(&params)?;
        let mut states = Vec::with_capacity(params.len());
        for param in &params {
            let weights = to_engine_value(param)?;
            let invoker = param_invoker(param)?;
            let allocator = invoker.default_allocator()?;
            states.push(AdamState {
                step: EngineValue::from_slice(allocator.as_ref(), &[], &[0i64])?,
                moment1: EngineValue::allocate(
                    allocator.as_ref(),
                    weights.element_type(),
                    weights.shape(),
                )?,
                moment2: EngineValue::allocate(
                    allocator.as_ref(),
                    weights.element_type(),
                    weights.shape(),
                )?,
            });
        }
        Ok(Adam {
            params,
            states,
            config,
        })
    }

    pub fn params(&self) -> &[HostTensor] {
        &self.params
    }

    pub fn state(&self, index: usize) -> Option<&AdamState> {
        self.states.get(index)
    }

    fn attributes(&self) -> BridgeResult<NodeAttributes> {
        [
            ("alpha", self.config.alpha),
            ("beta", self.config.beta),
            ("lambda", self.config.lambda),
            ("epsilon", self.config.epsilon),
        ]
        .into_iter()
        .map(|(name, value)| create_attribute(name, Scalar::Double(value)))
        .collect()
    }
}

impl Optimizer for Adam {
    fn step(&mut self, grads: &[HostTensor]) -> BridgeResult<()> {
        check_grads(&self.params, grads)?;
        debug!(params = self.params.len(), config = ?self.config, "adam step");
        let attributes = self.attributes()?;
        let bridged = bridge_all(&self.params, grads)?;

        let mut updates = Vec::with_capacity(bridged.len());
        let mut next_states = Vec::with_capacity(bridged.len());
        for (slot, state) in bridged.iter().zip(&self.states) {
            let lr = scalar_to_engine_value(&slot.invoker, Scalar::Double(self.config.lr))?;
            let inputs = vec![
                lr,
                state.step.clone(),
                slot.weights.clone(),
                slot.gradients.clone(),
                state.moment1.clone(),
                state.moment2.clone(),
            ];
            let mut outputs = slot
                .invoker
                .invoke("AdamOptimizer", inputs, 4, Some(&attributes), MS_DOMAIN)
                .map_err(|err| {
                    warn!(error = %err, "AdamOptimizer failed");
                    BridgeError::invocation("AdamOptimizer", err)
                })?;
            updates.push(outputs.remove(3));
            let moment2 = outputs.remove(2);
            let moment1 = outputs.remove(1);
            next_states.push(AdamState {
                step: outputs.remove(0),
                moment1,
                moment2,
            });
        }

        commit_weights("AdamOptimizer", &bridged, &updates)?;
        self.states = next_states;
        Ok(())
    }
}
