//! Error types for TEMPer session operations

use crate::temper::Sensing;
use pyo3::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemperedError {
    #[error("Driver initialization failed: {0}")]
    DriverInit(String),

    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Failed to open device {path}: {message}")]
    DeviceOpen { path: String, message: String },

    #[error("Failed to read the sensors: {0}")]
    SensorRead(String),

    #[error("No such sensor, or type is not supported (slot {slot})")]
    SensorUnsupported { slot: i32, partial: Sensing },

    #[error("Temperature failed on slot {slot}: {message}")]
    TemperatureRead {
        slot: i32,
        message: String,
        partial: Sensing,
    },

    #[error("Humidity failed on slot {slot}: {message}")]
    HumidityRead {
        slot: i32,
        message: String,
        partial: Sensing,
    },

    #[error("Driver shutdown failed: {0}")]
    DriverShutdown(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("No device at index {index} (session has {count})")]
    NoSuchDevice { index: usize, count: usize },

    #[error("Sensor read timed out after {0:?}")]
    SenseTimeout(std::time::Duration),
}

impl TemperedError {
    /// Readings that succeeded before a read failure. A failed native read
    /// yields the zero-valued `Sensing`.
    pub fn partial(&self) -> Option<Sensing> {
        match self {
            TemperedError::SensorRead(_) => Some(Sensing::default()),
            TemperedError::SensorUnsupported { partial, .. }
            | TemperedError::TemperatureRead { partial, .. }
            | TemperedError::HumidityRead { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}

/// Python exception hierarchy, rooted at `TemperedError(OSError)`.
pub mod exceptions {
    use pyo3::create_exception;
    use pyo3::exceptions::PyOSError;

    create_exception!(_tempered, TemperedError, PyOSError);
    create_exception!(_tempered, DriverInitError, TemperedError);
    create_exception!(_tempered, EnumerationError, TemperedError);
    create_exception!(_tempered, DeviceOpenError, TemperedError);
    create_exception!(_tempered, SensorReadError, TemperedError);
    create_exception!(_tempered, SensorUnsupportedError, TemperedError);
    create_exception!(_tempered, TemperatureReadError, TemperedError);
    create_exception!(_tempered, HumidityReadError, TemperedError);
    create_exception!(_tempered, DriverShutdownError, TemperedError);
    create_exception!(_tempered, SessionClosedError, TemperedError);
    create_exception!(_tempered, NoSuchDeviceError, TemperedError);
    create_exception!(_tempered, SenseTimeoutError, TemperedError);
}

impl From<TemperedError> for PyErr {
    fn from(err: TemperedError) -> PyErr {
        use exceptions::{
            DeviceOpenError, DriverInitError, DriverShutdownError, EnumerationError,
            HumidityReadError, NoSuchDeviceError, SenseTimeoutError, SensorReadError,
            SensorUnsupportedError, SessionClosedError, TemperatureReadError,
        };

        let message = err.to_string();
        match err {
            TemperedError::DriverInit(_) => DriverInitError::new_err(message),
            TemperedError::Enumeration(_) => EnumerationError::new_err(message),
            TemperedError::DeviceOpen { .. } => DeviceOpenError::new_err(message),
            // Read failures carry the readings that did succeed
            TemperedError::SensorRead(_) => {
                SensorReadError::new_err((message, Sensing::default()))
            }
            TemperedError::SensorUnsupported { partial, .. } => {
                SensorUnsupportedError::new_err((message, partial))
            }
            TemperedError::TemperatureRead { partial, .. } => {
                TemperatureReadError::new_err((message, partial))
            }
            TemperedError::HumidityRead { partial, .. } => {
                HumidityReadError::new_err((message, partial))
            }
            TemperedError::DriverShutdown(_) => DriverShutdownError::new_err(message),
            TemperedError::SessionClosed => SessionClosedError::new_err(message),
            TemperedError::NoSuchDevice { .. } => NoSuchDeviceError::new_err(message),
            TemperedError::SenseTimeout(_) => SenseTimeoutError::new_err(message),
        }
    }
}

/// Register the exception hierarchy on the extension module.
pub fn register_exceptions(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add("TemperedError", py.get_type::<exceptions::TemperedError>())?;
    m.add("DriverInitError", py.get_type::<exceptions::DriverInitError>())?;
    m.add("EnumerationError", py.get_type::<exceptions::EnumerationError>())?;
    m.add("DeviceOpenError", py.get_type::<exceptions::DeviceOpenError>())?;
    m.add("SensorReadError", py.get_type::<exceptions::SensorReadError>())?;
    m.add("SensorUnsupportedError", py.get_type::<exceptions::SensorUnsupportedError>())?;
    m.add("TemperatureReadError", py.get_type::<exceptions::TemperatureReadError>())?;
    m.add("HumidityReadError", py.get_type::<exceptions::HumidityReadError>())?;
    m.add("DriverShutdownError", py.get_type::<exceptions::DriverShutdownError>())?;
    m.add("SessionClosedError", py.get_type::<exceptions::SessionClosedError>())?;
    m.add("NoSuchDeviceError", py.get_type::<exceptions::NoSuchDeviceError>())?;
    m.add("SenseTimeoutError", py.get_type::<exceptions::SenseTimeoutError>())?;
    Ok(())
}

pub type Result<T> = std::result::Result<T, TemperedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_only_on_read_failures() {
        let partial = Sensing::new(21.5, 0.0);
        let err = TemperedError::HumidityRead {
            slot: 1,
            message: "checksum mismatch".into(),
            partial,
        };
        assert_eq!(err.partial(), Some(partial));
        assert_eq!(
            TemperedError::SensorRead("io".into()).partial(),
            Some(Sensing::default())
        );
        assert_eq!(TemperedError::SessionClosed.partial(), None);
    }

    #[test]
    fn test_messages_keep_native_text() {
        let err = TemperedError::DeviceOpen {
            path: "0001:0004:00".into(),
            message: "Permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to open device 0001:0004:00: Permission denied"
        );
        let err = TemperedError::TemperatureRead {
            slot: 0,
            message: "timeout".into(),
            partial: Sensing::default(),
        };
        assert_eq!(err.to_string(), "Temperature failed on slot 0: timeout");
    }

    #[cfg(feature = "auto-initialize")]
    mod python {
        use super::*;
        use pyo3::exceptions::PyOSError;

        fn args<'py>(py: Python<'py>, err: &PyErr) -> Bound<'py, PyAny> {
            err.value(py).getattr("args").unwrap()
        }

        #[test]
        fn test_variants_map_to_exception_classes() {
            Python::attach(|py| {
                let err = PyErr::from(TemperedError::DriverInit("no hid".into()));
                assert!(err.is_instance_of::<exceptions::DriverInitError>(py));

                let err = PyErr::from(TemperedError::DeviceOpen {
                    path: "p".into(),
                    message: "busy".into(),
                });
                assert!(err.is_instance_of::<exceptions::DeviceOpenError>(py));

                let err = PyErr::from(TemperedError::SessionClosed);
                assert!(err.is_instance_of::<exceptions::SessionClosedError>(py));
                assert!(err.is_instance_of::<exceptions::TemperedError>(py));
                assert!(err.is_instance_of::<PyOSError>(py));
                assert!(!err.is_instance_of::<exceptions::DriverShutdownError>(py));

                let err = PyErr::from(TemperedError::SenseTimeout(
                    std::time::Duration::from_millis(50),
                ));
                assert!(err.is_instance_of::<exceptions::SenseTimeoutError>(py));
            });
        }

        #[test]
        fn test_hierarchy_roots_at_oserror() {
            Python::attach(|py| {
                let base = py.get_type::<exceptions::TemperedError>();
                assert!(base.is_subclass_of::<PyOSError>().unwrap());
                assert!(py
                    .get_type::<exceptions::SessionClosedError>()
                    .is_subclass_of::<exceptions::TemperedError>()
                    .unwrap());
                assert!(py
                    .get_type::<exceptions::HumidityReadError>()
                    .is_subclass_of::<exceptions::TemperedError>()
                    .unwrap());
            });
        }

        #[test]
        fn test_partial_failure_args() {
            Python::attach(|py| {
                let err = PyErr::from(TemperedError::HumidityRead {
                    slot: 0,
                    message: "bad checksum".into(),
                    partial: Sensing::new(21.0, 0.0),
                });
                assert!(err.is_instance_of::<exceptions::HumidityReadError>(py));

                let args = args(py, &err);
                assert_eq!(args.len().unwrap(), 2);
                let message: String = args.get_item(0).unwrap().extract().unwrap();
                assert_eq!(message, "Humidity failed on slot 0: bad checksum");
                let partial = args.get_item(1).unwrap();
                let temp_c: f32 = partial.getattr("temp_c").unwrap().extract().unwrap();
                let rel_hum: f32 = partial.getattr("rel_hum").unwrap().extract().unwrap();
                assert_eq!((temp_c, rel_hum), (21.0, 0.0));
            });
        }

        #[test]
        fn test_sensor_read_carries_zero_sensing() {
            Python::attach(|py| {
                let err = PyErr::from(TemperedError::SensorRead("io".into()));
                assert!(err.is_instance_of::<exceptions::SensorReadError>(py));

                let args = args(py, &err);
                assert_eq!(args.len().unwrap(), 2);
                let partial = args.get_item(1).unwrap();
                let temp_c: f32 = partial.getattr("temp_c").unwrap().extract().unwrap();
                let rel_hum: f32 = partial.getattr("rel_hum").unwrap().extract().unwrap();
                assert_eq!((temp_c, rel_hum), (0.0, 0.0));
            });
        }

        #[test]
        fn test_plain_errors_have_message_only() {
            Python::attach(|py| {
                let err = PyErr::from(TemperedError::Enumeration("no devices".into()));
                let args = args(py, &err);
                assert_eq!(args.len().unwrap(), 1);
                let message: String = args.get_item(0).unwrap().extract().unwrap();
                assert_eq!(message, "Device enumeration failed: no devices");
            });
        }
    }
}
