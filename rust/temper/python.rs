//! Python classes over `Session`
//!
//! `Tempered` and every `Device` it hands out share one session behind a
//! single lock. Blocking calls release the GIL while they wait.

use crate::temper::session::BoxedDriver;
use crate::temper::{DeviceInfo, Result, Sensing, Session, SessionConfig, TemperedError};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyType;
use pyo3_async_runtimes::tokio::future_into_py;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type SharedSession = Arc<Mutex<Session>>;

#[cfg(feature = "native")]
fn host_driver() -> Result<BoxedDriver> {
    Ok(Box::new(crate::temper::native::NativeDriver::new()?))
}

#[cfg(not(feature = "native"))]
fn host_driver() -> Result<BoxedDriver> {
    Err(TemperedError::DriverInit(
        "built without the native libtempered driver".into(),
    ))
}

/// An open TEMPered session with all matching devices opened.
#[pyclass(name = "Tempered")]
pub struct PyTempered {
    session: SharedSession,
}

impl PyTempered {
    /// Wrap an already opened session, e.g. one over a fake driver.
    pub fn from_session(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}

#[pymethods]
impl PyTempered {
    /// Initialize the driver and open every attached device.
    ///
    /// Args:
    ///     vendor_id: Only open devices with this vendor ID (0 for any)
    ///     product_id: Only open devices with this product ID (0 for any)
    #[new]
    #[pyo3(signature = (vendor_id=0, product_id=0))]
    fn new(py: Python<'_>, vendor_id: u16, product_id: u16) -> Result<Self> {
        let config = SessionConfig::new(vendor_id, product_id);
        let session = py.detach(|| Session::open_boxed(host_driver()?, &config))?;
        Ok(Self::from_session(session))
    }

    /// Opened devices, in enumeration order.
    #[getter]
    fn devices(&self, py: Python<'_>) -> Result<Vec<PyDevice>> {
        let infos = py.detach(|| self.session.blocking_lock().devices())?;
        Ok(infos
            .into_iter()
            .enumerate()
            .map(|(index, info)| PyDevice {
                session: Arc::clone(&self.session),
                index,
                info,
            })
            .collect())
    }

    #[getter]
    fn is_open(&self, py: Python<'_>) -> bool {
        py.detach(|| !self.session.blocking_lock().is_closed())
    }

    /// Close all devices and shut the driver down.
    fn close(&self, py: Python<'_>) -> Result<()> {
        py.detach(|| self.session.blocking_lock().close())
    }

    fn __len__(&self, py: Python<'_>) -> Result<usize> {
        py.detach(|| self.session.blocking_lock().len())
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (exc_type=None, _exc_value=None, _traceback=None))]
    fn __exit__(
        &self,
        py: Python<'_>,
        exc_type: Option<Bound<'_, PyType>>,
        _exc_value: Option<Bound<'_, PyAny>>,
        _traceback: Option<Bound<'_, PyAny>>,
    ) -> PyResult<bool> {
        let result = py.detach(|| {
            let mut session = self.session.blocking_lock();
            if session.is_closed() {
                Ok(())
            } else {
                session.close()
            }
        });
        match result {
            // An exception already in flight wins over a shutdown failure
            Err(err) if exc_type.is_none() => Err(err.into()),
            _ => Ok(false),
        }
    }

    fn __repr__(&self, py: Python<'_>) -> String {
        py.detach(|| {
            let session = self.session.blocking_lock();
            match session.len() {
                Ok(count) => format!("Tempered(devices={})", count),
                Err(_) => "Tempered(closed)".to_string(),
            }
        })
    }
}

/// Run one blocking read on tokio's blocking pool, optionally bounded.
async fn sense_on_worker(
    session: SharedSession,
    index: usize,
    timeout: Option<Duration>,
) -> PyResult<Sensing> {
    let read = tokio::task::spawn_blocking(move || session.blocking_lock().sense(index));
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| PyErr::from(TemperedError::SenseTimeout(limit)))?,
        None => read.await,
    };
    let sensing = joined
        .map_err(|e| PyRuntimeError::new_err(format!("sense task failed: {}", e)))??;
    Ok(sensing)
}

/// One opened device. Valid until its session is closed.
#[pyclass(name = "Device")]
pub struct PyDevice {
    session: SharedSession,
    index: usize,
    info: DeviceInfo,
}

#[pymethods]
impl PyDevice {
    #[getter]
    fn vendor_id(&self) -> u16 {
        self.info.vendor_id
    }

    #[getter]
    fn product_id(&self) -> u16 {
        self.info.product_id
    }

    #[getter]
    fn interface_number(&self) -> i32 {
        self.info.interface_number
    }

    #[getter]
    fn path(&self) -> String {
        self.info.path.clone()
    }

    #[getter]
    fn type_name(&self) -> String {
        self.info.type_name.clone()
    }

    /// Device info.
    #[getter]
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    /// Take a reading (blocking).
    fn sense(&self, py: Python<'_>) -> Result<Sensing> {
        py.detach(|| self.session.blocking_lock().sense(self.index))
    }

    /// Take a reading (async).
    ///
    /// The read runs on a blocking worker. If `timeout` seconds pass first,
    /// `SenseTimeoutError` is raised; the abandoned read still holds the
    /// session until the driver returns.
    #[pyo3(signature = (timeout=None))]
    fn sense_async<'py>(
        &self,
        py: Python<'py>,
        timeout: Option<f64>,
    ) -> PyResult<Bound<'py, PyAny>> {
        let session = Arc::clone(&self.session);
        let index = self.index;
        let timeout = timeout
            .map(Duration::try_from_secs_f64)
            .transpose()
            .map_err(|e| PyValueError::new_err(format!("invalid timeout: {}", e)))?;

        future_into_py(py, sense_on_worker(session, index, timeout))
    }

    fn __repr__(&self) -> String {
        format!(
            "Device(vendor_id=0x{:04x}, product_id=0x{:04x}, interface={}, type_name={:?}, path={:?})",
            self.info.vendor_id,
            self.info.product_id,
            self.info.interface_number,
            self.info.type_name,
            self.info.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temper::fake::{FakeDevice, FakeDriver, FakeSlot};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn shared(driver: FakeDriver) -> SharedSession {
        Arc::new(Mutex::new(
            Session::open(driver, &SessionConfig::default()).unwrap(),
        ))
    }

    #[test]
    fn test_from_session_shares_one_lock() {
        let driver = FakeDriver::new()
            .with_device(FakeDevice::new("TEMPerHUM", "p").with_slot(FakeSlot::combined(20.0, 50.0)));
        let calls = driver.calls();
        let tempered =
            PyTempered::from_session(Session::open(driver, &SessionConfig::default()).unwrap());

        let sensing = tempered.session.blocking_lock().sense(0).unwrap();
        assert_eq!(sensing, Sensing::new(20.0, 50.0));

        tempered.session.blocking_lock().close().unwrap();
        assert_eq!(calls.exit_calls(), 1);
        assert_eq!(
            tempered.session.blocking_lock().sense(0).unwrap_err(),
            TemperedError::SessionClosed
        );
    }

    #[test]
    fn test_sense_on_worker_returns_reading() {
        let session = shared(
            FakeDriver::new()
                .with_device(FakeDevice::new("TEMPerHUM", "p").with_slot(FakeSlot::combined(20.0, 50.0))),
        );
        let result = runtime().block_on(sense_on_worker(
            session,
            0,
            Some(Duration::from_secs(5)),
        ));
        assert!(matches!(result, Ok(s) if s == Sensing::new(20.0, 50.0)));
    }

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_host_driver_unavailable_without_native() {
        assert!(matches!(host_driver(), Err(TemperedError::DriverInit(_))));
    }

    #[cfg(feature = "auto-initialize")]
    mod python {
        use super::*;
        use crate::temper::error::exceptions;

        #[test]
        fn test_sense_timeout_releases_session_afterwards() {
            let session = shared(
                FakeDriver::new().with_device(
                    FakeDevice::new("TEMPer1F", "p")
                        .with_slot(FakeSlot::temperature(19.0))
                        .with_read_delay(Duration::from_millis(300)),
                ),
            );
            let rt = runtime();

            let timed_out = rt.block_on(sense_on_worker(
                Arc::clone(&session),
                0,
                Some(Duration::from_millis(20)),
            ));
            Python::attach(|py| {
                let err = timed_out.err().unwrap();
                assert!(err.is_instance_of::<exceptions::SenseTimeoutError>(py));
            });

            // The abandoned read finishes, then the session is usable again
            let sensing = session.blocking_lock().sense(0).unwrap();
            assert_eq!(sensing.temp_c, 19.0);
        }

        #[test]
        fn test_sense_on_worker_maps_read_failure() {
            let session = shared(FakeDriver::new().with_device(
                FakeDevice::new("TEMPer1F", "p").failing_read("Failed to read from device"),
            ));
            let result = runtime().block_on(sense_on_worker(session, 0, None));
            Python::attach(|py| {
                assert!(result
                    .err()
                    .unwrap()
                    .is_instance_of::<exceptions::SensorReadError>(py));
            });
        }

        #[test]
        fn test_exit_raises_shutdown_failure() {
            let tempered = PyTempered::from_session(
                Session::open(
                    FakeDriver::new().failing_exit("hid_exit failed"),
                    &SessionConfig::default(),
                )
                .unwrap(),
            );
            Python::attach(|py| {
                let err = tempered.__exit__(py, None, None, None).unwrap_err();
                assert!(err.is_instance_of::<exceptions::DriverShutdownError>(py));
                assert!(!tempered.is_open(py));
            });
        }

        #[test]
        fn test_exit_keeps_exception_in_flight() {
            let driver = FakeDriver::new().failing_exit("hid_exit failed");
            let calls = driver.calls();
            let tempered =
                PyTempered::from_session(Session::open(driver, &SessionConfig::default()).unwrap());
            Python::attach(|py| {
                let exc_type = py.get_type::<PyValueError>();
                let suppress = tempered.__exit__(py, Some(exc_type), None, None).unwrap();
                assert!(!suppress);
            });
            assert_eq!(calls.exit_calls(), 1);
        }

        #[test]
        fn test_exit_after_close_is_quiet() {
            let driver = FakeDriver::new();
            let calls = driver.calls();
            let tempered =
                PyTempered::from_session(Session::open(driver, &SessionConfig::default()).unwrap());
            Python::attach(|py| {
                tempered.close(py).unwrap();
                assert!(!tempered.__exit__(py, None, None, None).unwrap());
            });
            assert_eq!(calls.exit_calls(), 1);
        }
    }
}
