pub mod cpu;

use std::sync::Arc;

pub use cpu::{CpuExecutionProvider, CpuKernelInterceptor, GenericCpuProvider, NoopInterceptor};

/// Registers the CPU provider with the global provider registry under `"cpu"`.
///
/// Linking this crate registers it automatically through
/// [`PROVIDER_REGISTRARS`](ort_bridge::registry::PROVIDER_REGISTRARS); calling it again
/// is harmless.
pub fn register_cpu_provider() {
    ort_bridge::registry::register_provider("cpu", || Arc::new(CpuExecutionProvider::new()));
}

#[ort_bridge::linkme::distributed_slice(ort_bridge::registry::PROVIDER_REGISTRARS)]
#[linkme(crate = ort_bridge::linkme)]
static REGISTER_CPU_PROVIDER: fn() = register_cpu_provider;
