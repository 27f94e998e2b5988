//! A single temperature/humidity reading

use pyo3::prelude::*;

/// One reading from a device.
///
/// Channels the device does not provide stay at `0.0`.
#[pyclass(frozen, eq)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sensing {
    /// Temperature in degrees Celsius
    #[pyo3(get)]
    pub temp_c: f32,

    /// Relative humidity in percent
    #[pyo3(get)]
    pub rel_hum: f32,
}

impl Sensing {
    pub const fn new(temp_c: f32, rel_hum: f32) -> Self {
        Self { temp_c, rel_hum }
    }
}

#[pymethods]
impl Sensing {
    fn __repr__(&self) -> String {
        format!(
            "Sensing(temp_c={:.2}, rel_hum={:.2})",
            self.temp_c, self.rel_hum
        )
    }
}
