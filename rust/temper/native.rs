//! libtempered FFI
//!
//! Raw declarations for the TEMPered C API and `NativeDriver`, the
//! `Driver` implementation over them. Error strings returned through
//! `char **` out-parameters are heap-allocated by the library; they are
//! copied and freed immediately.

use crate::temper::claim::{DriverClaim, ALREADY_CLAIMED};
use crate::temper::driver::{Driver, Handle, SensorType};
use crate::temper::{DeviceInfo, Result};
use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr::{self, NonNull};

#[repr(C)]
struct RawDevice {
    _private: [u8; 0],
}

#[repr(C)]
struct RawDeviceList {
    next: *mut RawDeviceList,
    path: *mut c_char,
    type_name: *mut c_char,
    vendor_id: u16,
    product_id: u16,
    interface_number: c_int,
    internal_data: *mut c_void,
}

#[link(name = "tempered")]
#[link(name = "hidapi-libusb")]
extern "C" {
    fn tempered_init(error: *mut *mut c_char) -> bool;
    fn tempered_exit(error: *mut *mut c_char) -> bool;
    fn tempered_enumerate(error: *mut *mut c_char) -> *mut RawDeviceList;
    fn tempered_free_device_list(list: *mut RawDeviceList);
    fn tempered_open(list: *mut RawDeviceList, error: *mut *mut c_char) -> *mut RawDevice;
    fn tempered_close(device: *mut RawDevice);
    fn tempered_error(device: *mut RawDevice) -> *mut c_char;
    fn tempered_read_sensors(device: *mut RawDevice) -> bool;
    fn tempered_get_sensor_count(device: *mut RawDevice) -> c_int;
    fn tempered_get_sensor_type(device: *mut RawDevice, sensor: c_int) -> c_int;
    fn tempered_get_temperature(device: *mut RawDevice, sensor: c_int, temp_c: *mut f32) -> bool;
    fn tempered_get_humidity(device: *mut RawDevice, sensor: c_int, rel_hum: *mut f32) -> bool;
}

extern "C" {
    fn free(ptr: *mut c_void);
}

/// Copy a C string, mapping null to `fallback`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn copy_string(ptr: *const c_char, fallback: &str) -> String {
    if ptr.is_null() {
        fallback.to_string()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Copy then release an error string from a `char **` out-parameter.
///
/// # Safety
/// `ptr` must be null or a `malloc`ed string owned by the caller.
unsafe fn take_error(ptr: *mut c_char) -> String {
    let message = copy_string(ptr, "unknown error");
    if !ptr.is_null() {
        free(ptr.cast());
    }
    message
}

/// Driver backed by libtempered.
///
/// At most one driver holds the process-wide claim at a time. The claim is
/// given up when `exit` runs, so a new driver can be created as soon as the
/// previous session is closed.
pub struct NativeDriver {
    list: *mut RawDeviceList,
    entries: Vec<NonNull<RawDeviceList>>,
    claim: DriverClaim,
    initialized: bool,
}

// SAFETY: the raw pointers are only dereferenced through `&mut self`, and
// the owning session is always accessed behind one exclusive lock.
unsafe impl Send for NativeDriver {}

impl NativeDriver {
    /// Claim the process-wide driver slot.
    pub fn new() -> Result<Self> {
        Ok(Self {
            list: ptr::null_mut(),
            entries: Vec::new(),
            claim: DriverClaim::acquire()?,
            initialized: false,
        })
    }

    fn device(handle: &Handle) -> *mut RawDevice {
        handle.as_raw() as *mut RawDevice
    }

    fn last_error(handle: &Handle) -> String {
        // SAFETY: the handle came from `tempered_open` and is still open.
        // The returned string is owned by the device and must not be freed.
        unsafe { copy_string(tempered_error(Self::device(handle)), "unknown error") }
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        self.free_device_list();
    }
}

impl Driver for NativeDriver {
    fn init(&mut self) -> std::result::Result<(), String> {
        if self.initialized {
            return Err("driver already initialized".into());
        }
        self.claim.ensure().map_err(|_| ALREADY_CLAIMED.to_string())?;
        let mut error = ptr::null_mut();
        // SAFETY: `error` is a valid out-parameter.
        if unsafe { tempered_init(&mut error) } {
            self.initialized = true;
            Ok(())
        } else {
            Err(unsafe { take_error(error) })
        }
    }

    fn exit(&mut self) -> std::result::Result<(), String> {
        self.free_device_list();
        let mut error = ptr::null_mut();
        // SAFETY: `error` is a valid out-parameter.
        let ok = unsafe { tempered_exit(&mut error) };
        self.initialized = false;
        self.claim.release();
        if ok {
            Ok(())
        } else {
            Err(unsafe { take_error(error) })
        }
    }

    fn enumerate(&mut self) -> std::result::Result<Vec<DeviceInfo>, String> {
        self.free_device_list();

        let mut error = ptr::null_mut();
        // SAFETY: `error` is a valid out-parameter.
        let list = unsafe { tempered_enumerate(&mut error) };
        if list.is_null() {
            // A null list with no error just means nothing is attached
            if error.is_null() {
                return Ok(Vec::new());
            }
            return Err(unsafe { take_error(error) });
        }
        self.list = list;

        let mut infos = Vec::new();
        let mut node = NonNull::new(list);
        while let Some(entry) = node {
            // SAFETY: nodes stay valid until `tempered_free_device_list`.
            let raw = unsafe { entry.as_ref() };
            infos.push(DeviceInfo {
                vendor_id: raw.vendor_id,
                product_id: raw.product_id,
                interface_number: raw.interface_number,
                path: unsafe { copy_string(raw.path, "") },
                type_name: unsafe { copy_string(raw.type_name, "") },
            });
            self.entries.push(entry);
            node = NonNull::new(raw.next);
        }
        Ok(infos)
    }

    fn free_device_list(&mut self) {
        self.entries.clear();
        if !self.list.is_null() {
            // SAFETY: `list` came from `tempered_enumerate` and is freed once.
            unsafe { tempered_free_device_list(self.list) };
            self.list = ptr::null_mut();
        }
    }

    fn open(&mut self, index: usize) -> std::result::Result<Handle, String> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| format!("no enumerated device at index {}", index))?;
        let mut error = ptr::null_mut();
        // SAFETY: `entry` belongs to the live enumeration list.
        let device = unsafe { tempered_open(entry.as_ptr(), &mut error) };
        if device.is_null() {
            Err(unsafe { take_error(error) })
        } else {
            Ok(Handle::from_raw(device as usize))
        }
    }

    fn close(&mut self, handle: Handle) -> std::result::Result<(), String> {
        // SAFETY: consuming the handle guarantees a single close.
        unsafe { tempered_close(Self::device(&handle)) };
        Ok(())
    }

    fn read_sensors(&mut self, handle: &Handle) -> std::result::Result<(), String> {
        // SAFETY: the handle is open for as long as the session holds it.
        if unsafe { tempered_read_sensors(Self::device(handle)) } {
            Ok(())
        } else {
            Err(Self::last_error(handle))
        }
    }

    fn sensor_count(&mut self, handle: &Handle) -> i32 {
        unsafe { tempered_get_sensor_count(Self::device(handle)) }
    }

    fn sensor_type(&mut self, handle: &Handle, slot: i32) -> SensorType {
        SensorType::from_bits_retain(unsafe { tempered_get_sensor_type(Self::device(handle), slot) })
    }

    fn temperature(&mut self, handle: &Handle, slot: i32) -> std::result::Result<f32, String> {
        let mut temp_c = 0.0f32;
        if unsafe { tempered_get_temperature(Self::device(handle), slot, &mut temp_c) } {
            Ok(temp_c)
        } else {
            Err(Self::last_error(handle))
        }
    }

    fn humidity(&mut self, handle: &Handle, slot: i32) -> std::result::Result<f32, String> {
        let mut rel_hum = 0.0f32;
        if unsafe { tempered_get_humidity(Self::device(handle), slot, &mut rel_hum) } {
            Ok(rel_hum)
        } else {
            Err(Self::last_error(handle))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temper::claim::tests::serial;
    use crate::temper::{Session, SessionConfig, TemperedError};

    #[test]
    fn test_second_driver_is_rejected() {
        let _guard = serial();
        let first = NativeDriver::new().unwrap();
        assert!(matches!(
            NativeDriver::new(),
            Err(TemperedError::DriverInit(_))
        ));
        drop(first);
        assert!(NativeDriver::new().is_ok());
    }

    #[test]
    #[ignore = "requires an attached TEMPer device"]
    fn test_hardware_session() {
        let _guard = serial();
        let mut session = Session::open(NativeDriver::new().unwrap(), &SessionConfig::default())
            .unwrap();
        assert!(!session.is_empty().unwrap(), "no TEMPer devices attached");
        for index in 0..session.len().unwrap() {
            let sensing = session.sense(index).unwrap();
            assert!((-40.0..=120.0).contains(&sensing.temp_c));
        }
        session.close().unwrap();

        // A closed session must not block the next one
        let mut reopened =
            Session::open(NativeDriver::new().unwrap(), &SessionConfig::default()).unwrap();
        reopened.close().unwrap();
        drop(session);
    }
}
