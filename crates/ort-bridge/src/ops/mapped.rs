//! Host operators lowered onto chains of named engine operators.
//!
//! Each [`MappedOp`] lists engine nodes in evaluation order. A node reads positional host
//! arguments or the outputs of earlier nodes; the last node produces the result. In-place
//! variants copy that result over the first argument's buffer and return the same handle.

use tracing::{debug, warn};

use crate::bridge::{
    create_attribute, from_engine_value, scalar_to_engine_value, to_engine_value,
};
use crate::engine::{EngineValue, NodeAttributes, ONNX_DOMAIN};
use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostTensor, Scalar};
use crate::registry::invoker_for;

use super::dispatch::{arg, IValue, KernelDef, ORT_KERNELS};
use super::write_back;

#[derive(Debug, Clone, Copy)]
pub enum Operand {
    /// Positional host argument.
    Arg(usize),
    /// Output of an earlier node.
    Node(usize),
}

#[derive(Debug)]
pub struct NodeSpec {
    pub op: &'static str,
    pub domain: &'static str,
    pub inputs: &'static [Operand],
    /// Attribute name and the positional scalar argument that supplies it.
    pub attributes: &'static [(&'static str, usize)],
}

#[derive(Debug)]
pub struct MappedOp {
    pub name: &'static str,
    pub nodes: &'static [NodeSpec],
    /// Values for trailing scalar arguments the caller may omit.
    pub defaults: &'static [(usize, Scalar)],
    pub in_place: bool,
}

macro_rules! node {
    ($op:literal ( $($input:expr),* )) => {
        NodeSpec {
            op: $op,
            domain: ONNX_DOMAIN,
            inputs: &[$($input),*],
            attributes: &[],
        }
    };
    ($op:literal ( $($input:expr),* ) { $($attr:literal => $index:literal),* }) => {
        NodeSpec {
            op: $op,
            domain: ONNX_DOMAIN,
            inputs: &[$($input),*],
            attributes: &[$(($attr, $index)),*],
        }
    };
}

use Operand::{Arg, Node};

const ALPHA_ONE: &[(usize, Scalar)] = &[(2, Scalar::Long(1))];

pub const ADD: MappedOp = MappedOp {
    name: "add.Tensor",
    nodes: &[node!("Mul"(Arg(2), Arg(1))), node!("Add"(Arg(0), Node(0)))],
    defaults: ALPHA_ONE,
    in_place: false,
};

pub const SUB: MappedOp = MappedOp {
    name: "sub.Tensor",
    nodes: &[node!("Mul"(Arg(2), Arg(1))), node!("Sub"(Arg(0), Node(0)))],
    defaults: ALPHA_ONE,
    in_place: false,
};

pub const MUL: MappedOp = MappedOp {
    name: "mul.Tensor",
    nodes: &[node!("Mul"(Arg(0), Arg(1)))],
    defaults: &[],
    in_place: false,
};

pub const DIV: MappedOp = MappedOp {
    name: "div.Tensor",
    nodes: &[node!("Div"(Arg(0), Arg(1)))],
    defaults: &[],
    in_place: false,
};

pub const RELU: MappedOp = MappedOp {
    name: "relu",
    nodes: &[node!("Relu"(Arg(0)))],
    defaults: &[],
    in_place: false,
};

pub const NEG: MappedOp = MappedOp {
    name: "neg",
    nodes: &[node!("Neg"(Arg(0)))],
    defaults: &[],
    in_place: false,
};

pub const ABS: MappedOp = MappedOp {
    name: "abs",
    nodes: &[node!("Abs"(Arg(0)))],
    defaults: &[],
    in_place: false,
};

pub const EXP: MappedOp = MappedOp {
    name: "exp",
    nodes: &[node!("Exp"(Arg(0)))],
    defaults: &[],
    in_place: false,
};

pub const SIGMOID: MappedOp = MappedOp {
    name: "sigmoid",
    nodes: &[node!("Sigmoid"(Arg(0)))],
    defaults: &[],
    in_place: false,
};

pub const LEAKY_RELU: MappedOp = MappedOp {
    name: "leaky_relu",
    nodes: &[node!("LeakyRelu"(Arg(0)) { "alpha" => 1 })],
    defaults: &[(1, Scalar::Double(0.01))],
    in_place: false,
};

pub const ADD_: MappedOp = MappedOp {
    name: "add_.Tensor",
    nodes: &[node!("Mul"(Arg(2), Arg(1))), node!("Add"(Arg(0), Node(0)))],
    defaults: ALPHA_ONE,
    in_place: true,
};

pub const MUL_: MappedOp = MappedOp {
    name: "mul_.Tensor",
    nodes: &[node!("Mul"(Arg(0), Arg(1)))],
    defaults: &[],
    in_place: true,
};

pub const RELU_: MappedOp = MappedOp {
    name: "relu_",
    nodes: &[node!("Relu"(Arg(0)))],
    defaults: &[],
    in_place: true,
};

/// Every mapped operator, in registration order.
pub static MAPPED_OPS: &[&MappedOp] = &[
    &ADD, &SUB, &MUL, &DIV, &RELU, &NEG, &ABS, &EXP, &SIGMOID, &LEAKY_RELU, &ADD_, &MUL_, &RELU_,
];

fn scalar_arg(op: &MappedOp, args: &[IValue], index: usize) -> BridgeResult<Scalar> {
    let value = arg(args, index);
    if value.is_none() {
        if let Some((_, default)) = op.defaults.iter().find(|(i, _)| *i == index) {
            return Ok(*default);
        }
    }
    value.to_scalar()
}

/// Evaluates `op` over boxed arguments. The first argument must be a tensor.
pub fn run(op: &MappedOp, args: &[IValue]) -> BridgeResult<HostTensor> {
    debug!(op = op.name, ?args, "mapped op");
    let self_ = arg(args, 0).to_tensor()?;

    // Tensor arguments are bridged before anything touches the engine.
    let mut bridged: Vec<Option<EngineValue>> = Vec::with_capacity(args.len());
    for value in args {
        bridged.push(match value {
            IValue::Tensor(tensor) => Some(to_engine_value(tensor)?),
            _ => None,
        });
    }

    let invoker = invoker_for(self_.device())?;
    let mut outputs: Vec<EngineValue> = Vec::with_capacity(op.nodes.len());
    for node_spec in op.nodes {
        let mut inputs = Vec::with_capacity(node_spec.inputs.len());
        for operand in node_spec.inputs {
            let value = match *operand {
                Operand::Node(index) => outputs.get(index).cloned().ok_or_else(|| {
                    BridgeError::invalid_argument(format!(
                        "{} reads node {index} before it is evaluated",
                        op.name
                    ))
                })?,
                Operand::Arg(index) => match bridged.get(index).cloned().flatten() {
                    Some(value) => value,
                    None => scalar_to_engine_value(&invoker, scalar_arg(op, args, index)?)?,
                },
            };
            inputs.push(value);
        }

        let mut attributes = NodeAttributes::new();
        for &(name, index) in node_spec.attributes {
            attributes.insert(create_attribute(name, scalar_arg(op, args, index)?)?);
        }

        let mut result = invoker
            .invoke(node_spec.op, inputs, 1, Some(&attributes), node_spec.domain)
            .map_err(|err| {
                warn!(op = op.name, node = node_spec.op, error = %err, "engine node failed");
                BridgeError::invocation(node_spec.op, err)
            })?;
        outputs.push(result.remove(0));
    }

    let last = outputs
        .pop()
        .ok_or_else(|| BridgeError::invalid_argument(format!("{} has no nodes", op.name)))?;
    if op.in_place {
        let target = bridged
            .first()
            .cloned()
            .flatten()
            .ok_or_else(|| BridgeError::invalid_argument("in-place target is not a tensor"))?;
        write_back(op.name, &last, &target)?;
        Ok(self_.clone())
    } else {
        Ok(from_engine_value(last, self_.options()))
    }
}

macro_rules! mapped_kernel {
    ($($kernel:ident, $reg:ident => $op:ident, $schema:literal;)*) => {
        $(
            fn $kernel(args: &[IValue]) -> BridgeResult<Vec<IValue>> {
                Ok(vec![IValue::Tensor(run(&$op, args)?)])
            }

            #[linkme::distributed_slice(ORT_KERNELS)]
            static $reg: KernelDef = KernelDef {
                name: $op.name,
                schema: $schema,
                kernel: $kernel,
            };
        )*
    };
}

mapped_kernel! {
    add_kernel, ADD_KERNEL => ADD,
        "add.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor";
    sub_kernel, SUB_KERNEL => SUB,
        "sub.Tensor(Tensor self, Tensor other, *, Scalar alpha=1) -> Tensor";
    mul_kernel, MUL_KERNEL => MUL, "mul.Tensor(Tensor self, Tensor other) -> Tensor";
    div_kernel, DIV_KERNEL => DIV, "div.Tensor(Tensor self, Tensor other) -> Tensor";
    relu_kernel, RELU_KERNEL => RELU, "relu(Tensor self) -> Tensor";
    neg_kernel, NEG_KERNEL => NEG, "neg(Tensor self) -> Tensor";
    abs_kernel, ABS_KERNEL => ABS, "abs(Tensor self) -> Tensor";
    exp_kernel, EXP_KERNEL => EXP, "exp(Tensor self) -> Tensor";
    sigmoid_kernel, SIGMOID_KERNEL => SIGMOID, "sigmoid(Tensor self) -> Tensor";
    leaky_relu_kernel, LEAKY_RELU_KERNEL => LEAKY_RELU,
        "leaky_relu(Tensor self, Scalar negative_slope=0.01) -> Tensor";
    add_inplace_kernel, ADD_INPLACE_KERNEL => ADD_,
        "add_.Tensor(Tensor(a!) self, Tensor other, *, Scalar alpha=1) -> Tensor(a!)";
    mul_inplace_kernel, MUL_INPLACE_KERNEL => MUL_, "mul_.Tensor(Tensor(a!) self, Tensor other) -> Tensor(a!)";
    relu_inplace_kernel, RELU_INPLACE_KERNEL => RELU_, "relu_(Tensor(a!) self) -> Tensor(a!)";
}

fn tensor(t: &HostTensor) -> IValue {
    IValue::Tensor(t.clone())
}

pub fn add(self_: &HostTensor, other: &HostTensor, alpha: Scalar) -> BridgeResult<HostTensor> {
    run(&ADD, &[tensor(self_), tensor(other), IValue::Scalar(alpha)])
}

pub fn sub(self_: &HostTensor, other: &HostTensor, alpha: Scalar) -> BridgeResult<HostTensor> {
    run(&SUB, &[tensor(self_), tensor(other), IValue::Scalar(alpha)])
}

pub fn mul(self_: &HostTensor, other: &HostTensor) -> BridgeResult<HostTensor> {
    run(&MUL, &[tensor(self_), tensor(other)])
}

pub fn div(self_: &HostTensor, other: &HostTensor) -> BridgeResult<HostTensor> {
    run(&DIV, &[tensor(self_), tensor(other)])
}

pub fn relu(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&RELU, &[tensor(self_)])
}

pub fn neg(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&NEG, &[tensor(self_)])
}

pub fn abs(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&ABS, &[tensor(self_)])
}

pub fn exp(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&EXP, &[tensor(self_)])
}

pub fn sigmoid(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&SIGMOID, &[tensor(self_)])
}

pub fn leaky_relu(self_: &HostTensor, negative_slope: Scalar) -> BridgeResult<HostTensor> {
    run(&LEAKY_RELU, &[tensor(self_), IValue::Scalar(negative_slope)])
}

pub fn add_(self_: &HostTensor, other: &HostTensor, alpha: Scalar) -> BridgeResult<HostTensor> {
    run(&ADD_, &[tensor(self_), tensor(other), IValue::Scalar(alpha)])
}

pub fn mul_(self_: &HostTensor, other: &HostTensor) -> BridgeResult<HostTensor> {
    run(&MUL_, &[tensor(self_), tensor(other)])
}

pub fn relu_(self_: &HostTensor) -> BridgeResult<HostTensor> {
    run(&RELU_, &[tensor(self_)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_only_read_earlier_outputs() {
        for op in MAPPED_OPS {
            assert!(!op.nodes.is_empty(), "{} has no nodes", op.name);
            for (position, node_spec) in op.nodes.iter().enumerate() {
                for operand in node_spec.inputs {
                    if let Operand::Node(index) = operand {
                        assert!(*index < position, "{} node {position} reads ahead", op.name);
                    }
                }
            }
        }
    }

    #[test]
    fn every_mapped_op_has_a_kernel() {
        for op in MAPPED_OPS {
            assert!(super::super::dispatch::find_kernel(op.name).is_some(), "{}", op.name);
        }
    }

    #[test]
    fn sparse_argument_fails_before_engine_lookup() {
        let indices = HostTensor::from_vec(&[1, 1], vec![0i64]).unwrap();
        let values = HostTensor::from_vec(&[1], vec![1.0f32]).unwrap();
        let sparse = HostTensor::sparse_coo(indices, values, &[4]);
        assert!(matches!(
            relu(&sparse),
            Err(BridgeError::UnsupportedTensorCategory(
                crate::error::TensorCategory::Sparse
            ))
        ));
    }
}
