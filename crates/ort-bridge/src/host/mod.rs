//! Host tensor framework model: scalar types, devices, options, scalars and tensor handles.

mod device;
mod options;
mod scalar;
mod scalar_type;
mod tensor;

pub use device::{Device, DeviceIndex, DeviceType, EventFlag, EventHandle, Stream, StreamId};
pub use options::{device, Layout, MemoryFormat, TensorOptions};
pub use scalar::Scalar;
pub use scalar_type::ScalarType;
pub use tensor::{
    BridgedTensorImpl, Element, HostTensor, QuantizedImpl, Sizes, SparseCooImpl, TensorImpl,
};
