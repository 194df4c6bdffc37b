//! Boxed kernel table and dispatch-key selection.
//!
//! Every operator this backend implements contributes a [`KernelDef`] to [`ORT_KERNELS`].
//! [`call`] picks the kernel only when the dispatch key of the arguments is the ort device
//! type, mirroring how the host framework routes calls by backend.

use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, DeviceType, HostTensor, Layout, MemoryFormat, Scalar, ScalarType};

/// Boxed operator argument or result.
#[derive(Debug, Clone)]
pub enum IValue {
    None,
    Tensor(HostTensor),
    Scalar(Scalar),
    IntList(Vec<i64>),
    Bool(bool),
    ScalarType(ScalarType),
    Layout(Layout),
    Device(Device),
    MemoryFormat(MemoryFormat),
}

static NONE: IValue = IValue::None;

impl IValue {
    pub fn is_none(&self) -> bool {
        matches!(self, IValue::None)
    }

    pub fn to_tensor(&self) -> BridgeResult<&HostTensor> {
        match self {
            IValue::Tensor(tensor) => Ok(tensor),
            other => Err(mismatch("Tensor", other)),
        }
    }

    pub fn into_tensor(self) -> BridgeResult<HostTensor> {
        match self {
            IValue::Tensor(tensor) => Ok(tensor),
            other => Err(mismatch("Tensor", &other)),
        }
    }

    pub fn to_scalar(&self) -> BridgeResult<Scalar> {
        match self {
            IValue::Scalar(scalar) => Ok(*scalar),
            IValue::Bool(v) => Ok(Scalar::Bool(*v)),
            other => Err(mismatch("Scalar", other)),
        }
    }

    pub fn to_int_list(&self) -> BridgeResult<&[i64]> {
        match self {
            IValue::IntList(values) => Ok(values),
            other => Err(mismatch("int[]", other)),
        }
    }

    pub fn to_bool(&self) -> BridgeResult<bool> {
        match self {
            IValue::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }

    pub fn to_opt_bool(&self) -> BridgeResult<Option<bool>> {
        match self {
            IValue::None => Ok(None),
            other => other.to_bool().map(Some),
        }
    }

    pub fn to_opt_scalar_type(&self) -> BridgeResult<Option<ScalarType>> {
        match self {
            IValue::None => Ok(None),
            IValue::ScalarType(v) => Ok(Some(*v)),
            other => Err(mismatch("ScalarType?", other)),
        }
    }

    pub fn to_opt_layout(&self) -> BridgeResult<Option<Layout>> {
        match self {
            IValue::None => Ok(None),
            IValue::Layout(v) => Ok(Some(*v)),
            other => Err(mismatch("Layout?", other)),
        }
    }

    pub fn to_opt_device(&self) -> BridgeResult<Option<Device>> {
        match self {
            IValue::None => Ok(None),
            IValue::Device(v) => Ok(Some(*v)),
            other => Err(mismatch("Device?", other)),
        }
    }

    pub fn to_opt_memory_format(&self) -> BridgeResult<Option<MemoryFormat>> {
        match self {
            IValue::None => Ok(None),
            IValue::MemoryFormat(v) => Ok(Some(*v)),
            other => Err(mismatch("MemoryFormat?", other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            IValue::None => "None",
            IValue::Tensor(_) => "Tensor",
            IValue::Scalar(_) => "Scalar",
            IValue::IntList(_) => "int[]",
            IValue::Bool(_) => "bool",
            IValue::ScalarType(_) => "ScalarType",
            IValue::Layout(_) => "Layout",
            IValue::Device(_) => "Device",
            IValue::MemoryFormat(_) => "MemoryFormat",
        }
    }
}

fn mismatch(expected: &str, got: &IValue) -> BridgeError {
    BridgeError::invalid_argument(format!("expected {expected}, got {}", got.kind()))
}

impl From<HostTensor> for IValue {
    fn from(tensor: HostTensor) -> Self {
        IValue::Tensor(tensor)
    }
}

impl From<Scalar> for IValue {
    fn from(scalar: Scalar) -> Self {
        IValue::Scalar(scalar)
    }
}

impl From<Vec<i64>> for IValue {
    fn from(values: Vec<i64>) -> Self {
        IValue::IntList(values)
    }
}

impl From<Device> for IValue {
    fn from(device: Device) -> Self {
        IValue::Device(device)
    }
}

impl From<ScalarType> for IValue {
    fn from(scalar_type: ScalarType) -> Self {
        IValue::ScalarType(scalar_type)
    }
}

impl From<bool> for IValue {
    fn from(value: bool) -> Self {
        IValue::Bool(value)
    }
}

/// Positional argument `index`; trailing optional arguments may be omitted.
pub fn arg(args: &[IValue], index: usize) -> &IValue {
    args.get(index).unwrap_or(&NONE)
}

pub type KernelFn = fn(&[IValue]) -> BridgeResult<Vec<IValue>>;

/// One registered kernel: operator name, its schema string and the boxed entry point.
pub struct KernelDef {
    pub name: &'static str,
    pub schema: &'static str,
    pub kernel: KernelFn,
}

#[linkme::distributed_slice]
pub static ORT_KERNELS: [KernelDef] = [..];

pub fn kernels() -> &'static [KernelDef] {
    &ORT_KERNELS
}

pub fn find_kernel(name: &str) -> Option<&'static KernelDef> {
    ORT_KERNELS.iter().find(|def| def.name == name)
}

/// Highest-priority device type among the arguments.
///
/// Tensor arguments decide when there are any, device arguments otherwise. Within either
/// group the ort device wins over every other device type; failing that, the first one is
/// used.
pub fn dispatch_key(args: &[IValue]) -> Option<DeviceType> {
    let tensor_devices = args.iter().filter_map(|value| match value {
        IValue::Tensor(tensor) => Some(tensor.device().device_type()),
        _ => None,
    });
    let device_args = args.iter().filter_map(|value| match value {
        IValue::Device(device) => Some(device.device_type()),
        _ => None,
    });
    highest_priority(tensor_devices).or_else(|| highest_priority(device_args))
}

fn highest_priority(mut device_types: impl Iterator<Item = DeviceType>) -> Option<DeviceType> {
    let first = device_types.next()?;
    if first == DeviceType::Ort || device_types.any(|t| t == DeviceType::Ort) {
        Some(DeviceType::Ort)
    } else {
        Some(first)
    }
}

/// Routes `name` to this backend's kernel when the arguments dispatch to the ort device.
pub fn call(name: &str, args: &[IValue]) -> BridgeResult<Vec<IValue>> {
    let key = dispatch_key(args);
    if key != Some(DeviceType::Ort) {
        return Err(BridgeError::NoKernel {
            op: name.to_string(),
            key: key.map_or_else(|| "undefined".to_string(), |k| k.to_string()),
        });
    }
    let def = find_kernel(name).ok_or_else(|| BridgeError::NoKernel {
        op: name.to_string(),
        key: DeviceType::Ort.to_string(),
    })?;
    debug!(op = def.name, "dispatching boxed call");
    (def.kernel)(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_key_prefers_tensor_over_device() {
        let cpu = HostTensor::from_vec(&[1], vec![1.0f32]).unwrap();
        let args = vec![IValue::Device(Device::ort(0)), IValue::Tensor(cpu)];
        assert_eq!(dispatch_key(&args), Some(DeviceType::Cpu));
        assert_eq!(
            dispatch_key(&[IValue::Device(Device::ort(0))]),
            Some(DeviceType::Ort)
        );
        assert_eq!(dispatch_key(&[IValue::IntList(vec![1])]), None);
    }

    #[test]
    fn ort_tensor_anywhere_selects_ort() {
        let cpu = HostTensor::from_vec(&[1], vec![1.0f32]).unwrap();
        let ort = HostTensor::zeros(&[1], crate::host::device(Device::ort(0)));
        let args = vec![IValue::Tensor(cpu.clone()), IValue::Tensor(ort)];
        assert_eq!(dispatch_key(&args), Some(DeviceType::Ort));
        let args = vec![
            IValue::Device(Device::cpu()),
            IValue::Device(Device::ort(0)),
        ];
        assert_eq!(dispatch_key(&args), Some(DeviceType::Ort));
        assert_eq!(dispatch_key(&[IValue::Tensor(cpu)]), Some(DeviceType::Cpu));
    }

    #[test]
    fn cpu_arguments_find_no_kernel() {
        let cpu = HostTensor::from_vec(&[1], vec![1.0f32]).unwrap();
        match call("zero_", &[IValue::Tensor(cpu)]) {
            Err(BridgeError::NoKernel { op, key }) => {
                assert_eq!(op, "zero_");
                assert_eq!(key, "cpu");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn every_kernel_name_is_unique() {
        let mut names: Vec<&str> = kernels().iter().map(|def| def.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(find_kernel("empty.memory_format").is_some());
        assert!(find_kernel("add.Tensor").is_some());
        for name in ["add_.Tensor", "mul_.Tensor", "relu_"] {
            assert!(find_kernel(name).is_some(), "{name} is not registered");
        }
    }
}
