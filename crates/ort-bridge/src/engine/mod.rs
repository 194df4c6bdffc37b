//! Contract of the external execution engine.
//!
//! The bridge consumes the engine through four things only: element-type descriptors,
//! [`EngineValue`]s built from an allocator or an existing buffer, a provider's
//! [`Allocator`], and named operator invocation through an [`Invoker`].

mod allocator;
mod attribute;
mod element_type;
mod invoker;
mod provider;
mod status;
mod value;

pub use allocator::{Allocator, HostAllocator, MemType, MemoryInfo};
pub use attribute::{AttributeProto, AttributeType, AttributeValue, NodeAttributes};
pub use element_type::{ElementType, EngineElement};
pub use invoker::Invoker;
pub use provider::{ExecutionProvider, MS_DOMAIN, ONNX_DOMAIN};
pub use status::{EngineError, EngineResult, StatusCode};
pub use value::{Dims, EngineValue, Ownership};
