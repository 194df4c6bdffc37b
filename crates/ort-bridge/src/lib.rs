//! Bridges a host tensor framework onto an external execution engine exposed as the `ort`
//! device type.
//!
//! [`bridge`] converts between host tensor handles and engine values, [`ops`] implements the
//! device-native operators on top of it, [`registry`] resolves the per-device
//! [`Invoker`](engine::Invoker), and [`guard`] satisfies the host's device-context contract
//! for the single ort device.

pub use linkme;

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod guard;
pub mod host;
pub mod ops;
pub mod optim;
pub mod registry;
mod env;

pub use error::{BridgeError, BridgeResult, TensorCategory};
pub use host::{Device, DeviceType, HostTensor, Scalar, ScalarType, TensorOptions};
