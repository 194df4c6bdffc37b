//! Device factory: one entry point per configured backend kind.

use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, DeviceType};
use crate::registry;

/// Index value meaning "unspecified".
pub const UNSPECIFIED_INDEX: i64 = -1;

/// Backend kinds from the active configuration, in device-index order.
pub fn backend_kinds() -> BridgeResult<Vec<String>> {
    Ok(registry::config()?.kinds())
}

/// Ort device handle for a configured backend `kind`. `-1` leaves the index unspecified.
pub fn device(kind: &str, index: i64) -> BridgeResult<Device> {
    if !registry::config()?.kinds().iter().any(|k| k == kind) {
        return Err(BridgeError::UnknownBackendKind(kind.to_string()));
    }
    if index == UNSPECIFIED_INDEX {
        return Ok(Device::new(DeviceType::Ort, None));
    }
    let index = i8::try_from(index)
        .ok()
        .filter(|index| *index >= 0)
        .ok_or_else(|| BridgeError::invalid_argument(format!("invalid device index {index}")))?;
    Ok(Device::ort(index))
}
