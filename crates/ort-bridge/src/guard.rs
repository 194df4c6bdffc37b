//! Device-context contract for the single synthetic ort device.
//!
//! The ort backend exposes exactly one device (index 0) and one default stream. Setting any
//! other index is an error, stream switches are no-ops, and every event operation except
//! `destroy_event` fails.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use tracing::{trace, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::host::{Device, DeviceIndex, DeviceType, EventFlag, EventHandle, Stream};

/// Device-guard operations the host framework calls when it switches device context.
pub trait DeviceGuardImpl: Send + Sync {
    fn device_type(&self) -> DeviceType;

    /// Makes `device` current and returns the previously current device.
    fn exchange_device(&self, device: Device) -> BridgeResult<Device>;

    fn get_device(&self) -> Device;

    fn set_device(&self, device: Device) -> BridgeResult<()>;

    /// Like `set_device` but infallible; used when restoring a saved device.
    fn unchecked_set_device(&self, device: Device);

    fn get_stream(&self, device: Device) -> Stream;

    /// Makes `stream` current and returns the previously current stream.
    fn exchange_stream(&self, stream: Stream) -> Stream;

    fn device_count(&self) -> i8;

    fn record(
        &self,
        event: &mut EventHandle,
        stream: &Stream,
        device_index: DeviceIndex,
        flag: EventFlag,
    ) -> BridgeResult<()>;

    fn block(&self, event: EventHandle, stream: &Stream) -> BridgeResult<()>;

    fn query_event(&self, event: EventHandle) -> BridgeResult<bool>;

    fn destroy_event(&self, event: EventHandle, device_index: DeviceIndex);
}

/// Guard for [`DeviceType::Ort`]. Stateless: the current device is always `ort:0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrtGuardImpl;

pub static ORT_GUARD: OrtGuardImpl = OrtGuardImpl;

const ORT_DEVICE: Device = Device::ort(0);

impl OrtGuardImpl {
    fn check(device: Device) -> BridgeResult<()> {
        if device.device_type() != DeviceType::Ort {
            return Err(BridgeError::InvalidDevice {
                device,
                reason: "the ort guard only handles ort devices",
            });
        }
        // An unspecified index names the only device.
        if device.index().unwrap_or(0) != 0 {
            return Err(BridgeError::InvalidDevice {
                device,
                reason: "the ort backend has a single device with index 0",
            });
        }
        Ok(())
    }
}

impl DeviceGuardImpl for OrtGuardImpl {
    fn device_type(&self) -> DeviceType {
        trace!("OrtGuardImpl::device_type");
        DeviceType::Ort
    }

    fn exchange_device(&self, device: Device) -> BridgeResult<Device> {
        trace!(%device, "OrtGuardImpl::exchange_device");
        Self::check(device)?;
        Ok(ORT_DEVICE)
    }

    fn get_device(&self) -> Device {
        trace!("OrtGuardImpl::get_device");
        ORT_DEVICE
    }

    fn set_device(&self, device: Device) -> BridgeResult<()> {
        trace!(%device, "OrtGuardImpl::set_device");
        Self::check(device)
    }

    fn unchecked_set_device(&self, device: Device) {
        trace!(%device, "OrtGuardImpl::unchecked_set_device");
        if let Err(err) = Self::check(device) {
            warn!(error = %err, "ignoring unchecked device switch");
            debug_assert!(false, "unchecked_set_device({device}): {err}");
        }
    }

    fn get_stream(&self, device: Device) -> Stream {
        trace!(%device, "OrtGuardImpl::get_stream");
        Stream::default_on(ORT_DEVICE)
    }

    fn exchange_stream(&self, stream: Stream) -> Stream {
        trace!(%stream, "OrtGuardImpl::exchange_stream");
        Stream::default_on(ORT_DEVICE)
    }

    fn device_count(&self) -> i8 {
        trace!("OrtGuardImpl::device_count");
        1
    }

    fn record(
        &self,
        _event: &mut EventHandle,
        _stream: &Stream,
        _device_index: DeviceIndex,
        _flag: EventFlag,
    ) -> BridgeResult<()> {
        Err(BridgeError::UnsupportedDeviceOperation("events"))
    }

    fn block(&self, _event: EventHandle, _stream: &Stream) -> BridgeResult<()> {
        Err(BridgeError::UnsupportedDeviceOperation("events"))
    }

    fn query_event(&self, _event: EventHandle) -> BridgeResult<bool> {
        Err(BridgeError::UnsupportedDeviceOperation("events"))
    }

    fn destroy_event(&self, _event: EventHandle, _device_index: DeviceIndex) {}
}

static GUARD_IMPLS: OnceLock<RwLock<HashMap<DeviceType, &'static dyn DeviceGuardImpl>>> =
    OnceLock::new();

fn guard_table() -> &'static RwLock<HashMap<DeviceType, &'static dyn DeviceGuardImpl>> {
    GUARD_IMPLS.get_or_init(|| {
        let mut table: HashMap<DeviceType, &'static dyn DeviceGuardImpl> = HashMap::new();
        table.insert(DeviceType::Ort, &ORT_GUARD);
        RwLock::new(table)
    })
}

/// Registers the guard for one device type, replacing an earlier one.
pub fn register_guard_impl(device_type: DeviceType, guard: &'static dyn DeviceGuardImpl) {
    guard_table()
        .write()
        .expect("guard table lock poisoned")
        .insert(device_type, guard);
}

pub fn guard_impl(device_type: DeviceType) -> Option<&'static dyn DeviceGuardImpl> {
    guard_table()
        .read()
        .expect("guard table lock poisoned")
        .get(&device_type)
        .copied()
}

/// Switches to a device for the guard's lifetime and restores the original on drop.
pub struct DeviceGuard {
    guard: &'static dyn DeviceGuardImpl,
    original: Device,
    current: Device,
}

impl DeviceGuard {
    pub fn new(device: Device) -> BridgeResult<Self> {
        let guard = guard_impl(device.device_type()).ok_or(BridgeError::InvalidDevice {
            device,
            reason: "no device guard registered for this device type",
        })?;
        let original = guard.exchange_device(device)?;
        Ok(DeviceGuard {
            guard,
            original,
            current: device,
        })
    }

    pub fn original_device(&self) -> Device {
        self.original
    }

    pub fn current_device(&self) -> Device {
        self.current
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.guard.unchecked_set_device(self.original);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_device_zero_is_accepted() {
        assert!(ORT_GUARD.set_device(Device::ort(0)).is_ok());
        assert!(ORT_GUARD.set_device(Device::new(DeviceType::Ort, None)).is_ok());
        assert!(matches!(
            ORT_GUARD.set_device(Device::ort(1)),
            Err(BridgeError::InvalidDevice { .. })
        ));
        assert!(ORT_GUARD.exchange_device(Device::cpu()).is_err());
        assert_eq!(ORT_GUARD.get_device(), Device::ort(0));
        assert_eq!(ORT_GUARD.device_count(), 1);
    }

    #[test]
    fn streams_never_change() {
        let other = Stream::new(7, Device::ort(0));
        let stream = ORT_GUARD.exchange_stream(other);
        assert_eq!(stream.id(), Stream::DEFAULT);
        assert_eq!(stream.device(), Device::ort(0));
        assert_eq!(ORT_GUARD.get_stream(Device::ort(0)), stream);
    }

    #[test]
    fn events_always_fail() {
        let stream = Stream::default_on(Device::ort(0));
        let mut event: EventHandle = None;
        let err = ORT_GUARD
            .record(&mut event, &stream, Some(0), EventFlag::Default)
            .unwrap_err();
        assert_eq!(err.to_string(), "ort backend doesn't support events");
        assert!(ORT_GUARD.block(None, &stream).is_err());
        assert!(ORT_GUARD.query_event(None).is_err());
        ORT_GUARD.destroy_event(None, Some(0));
        assert!(event.is_none());
    }

    #[test]
    fn registering_replaces_the_table_entry() {
        register_guard_impl(DeviceType::Ort, &ORT_GUARD);
        let guard = guard_impl(DeviceType::Ort).unwrap();
        assert_eq!(guard.device_type(), DeviceType::Ort);
        assert!(guard_impl(DeviceType::Cuda).is_none());
    }

    #[test]
    fn scoped_guard_restores_device() {
        let guard = DeviceGuard::new(Device::ort(0)).unwrap();
        assert_eq!(guard.original_device(), Device::ort(0));
        assert_eq!(guard.current_device(), Device::ort(0));
        drop(guard);
        assert!(DeviceGuard::new(Device::ort(2)).is_err());
        assert!(DeviceGuard::new(Device::cpu()).is_err());
    }
}
