//! Seam between the session and the TEMPered driver
//!
//! `Driver` mirrors the native C call set one method per call. Failures
//! come back as the driver's own message text; the session decides which
//! `TemperedError` they map to.

use crate::temper::DeviceInfo;
use bitflags::bitflags;

bitflags! {
    /// Sensor capability bits for one slot.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[repr(transparent)]
    pub struct SensorType: i32 {
        const TEMPERATURE = 1;
        const HUMIDITY    = 2;
    }
}

impl SensorType {
    /// A slot with no usable sensor.
    pub const NONE: SensorType = SensorType::empty();
}

/// Opaque ownership token for one opened native device.
///
/// Not `Clone` or `Copy`. `Driver::close` consumes it,
/// so a handle can be closed at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct Handle(usize);

impl Handle {
    /// Wrap a driver-specific raw value (a pointer address for the native
    /// driver). Only drivers should construct handles.
    pub fn from_raw(raw: usize) -> Self {
        Handle(raw)
    }

    pub fn as_raw(&self) -> usize {
        self.0
    }
}

/// Native driver operations, one method per C call.
///
/// Implementations need not be thread-safe; the session serializes all
/// calls through `&mut self`.
pub trait Driver {
    fn init(&mut self) -> Result<(), String>;

    fn exit(&mut self) -> Result<(), String>;

    /// Enumerate attached devices. The driver keeps the underlying list
    /// alive until `free_device_list` so entries can be opened by index.
    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, String>;

    fn free_device_list(&mut self);

    /// Open the `index`th entry of the current enumeration.
    fn open(&mut self, index: usize) -> Result<Handle, String>;

    fn close(&mut self, handle: Handle) -> Result<(), String>;

    /// Take a fresh reading into the device's internal buffers.
    fn read_sensors(&mut self, handle: &Handle) -> Result<(), String>;

    fn sensor_count(&mut self, handle: &Handle) -> i32;

    fn sensor_type(&mut self, handle: &Handle, slot: i32) -> SensorType;

    fn temperature(&mut self, handle: &Handle, slot: i32) -> Result<f32, String>;

    fn humidity(&mut self, handle: &Handle, slot: i32) -> Result<f32, String>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn init(&mut self) -> Result<(), String> {
        (**self).init()
    }

    fn exit(&mut self) -> Result<(), String> {
        (**self).exit()
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, String> {
        (**self).enumerate()
    }

    fn free_device_list(&mut self) {
        (**self).free_device_list()
    }

    fn open(&mut self, index: usize) -> Result<Handle, String> {
        (**self).open(index)
    }

    fn close(&mut self, handle: Handle) -> Result<(), String> {
        (**self).close(handle)
    }

    fn read_sensors(&mut self, handle: &Handle) -> Result<(), String> {
        (**self).read_sensors(handle)
    }

    fn sensor_count(&mut self, handle: &Handle) -> i32 {
        (**self).sensor_count(handle)
    }

    fn sensor_type(&mut self, handle: &Handle, slot: i32) -> SensorType {
        (**self).sensor_type(handle, slot)
    }

    fn temperature(&mut self, handle: &Handle, slot: i32) -> Result<f32, String> {
        (**self).temperature(handle, slot)
    }

    fn humidity(&mut self, handle: &Handle, slot: i32) -> Result<f32, String> {
        (**self).humidity(handle, slot)
    }
}
