//! Native Rust extension for tempered
//!
//! Python bindings for libtempered, the TEMPer USB thermometer and
//! hygrometer driver:
//! - Driver session lifecycle (init, enumerate, open, close, exit)
//! - Per-device sensing with partial-failure reporting
//! - Async sensing with optional timeouts

use pyo3::prelude::*;

pub mod temper;

// Re-export for benchmarks and Rust callers
#[cfg(any(test, feature = "testing"))]
pub use temper::fake::{FakeCalls, FakeDevice, FakeDriver, FakeSlot};
pub use temper::{DeviceInfo, Sensing, SensorType, Session, SessionConfig, TemperedError};

/// Native bindings for the TEMPered driver library.
#[pymodule(name = "_tempered")]
fn _tempered(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Session types
    m.add_class::<temper::PyTempered>()?;
    m.add_class::<temper::PyDevice>()?;
    m.add_class::<temper::DeviceInfo>()?;
    m.add_class::<temper::Sensing>()?;

    // Errors
    temper::error::register_exceptions(m)?;

    // Sensor type constants
    m.add("SENSOR_TYPE_NONE", SensorType::NONE.bits())?;
    m.add("SENSOR_TYPE_TEMPERATURE", SensorType::TEMPERATURE.bits())?;
    m.add("SENSOR_TYPE_HUMIDITY", SensorType::HUMIDITY.bits())?;

    Ok(())
}
