//! Device descriptors from enumeration

use pyo3::prelude::*;

/// Identity of one enumerated TEMPer interface.
#[pyclass(frozen)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    #[pyo3(get)]
    pub vendor_id: u16,

    #[pyo3(get)]
    pub product_id: u16,

    #[pyo3(get)]
    pub interface_number: i32,

    /// Transport path as reported by the driver
    #[pyo3(get)]
    pub path: String,

    /// Driver's name for this device model, e.g. "TEMPerHUM"
    #[pyo3(get)]
    pub type_name: String,
}

#[pymethods]
impl DeviceInfo {
    fn __repr__(&self) -> String {
        format!(
            "DeviceInfo(vendor_id=0x{:04x}, product_id=0x{:04x}, interface={}, type_name={:?})",
            self.vendor_id, self.product_id, self.interface_number, self.type_name
        )
    }
}

/// Which enumerated devices a session opens.
///
/// A zero `vendor_id` or `product_id` matches everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl SessionConfig {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn matches(&self, info: &DeviceInfo) -> bool {
        (self.vendor_id == 0 || info.vendor_id == self.vendor_id)
            && (self.product_id == 0 || info.product_id == self.product_id)
    }
}
