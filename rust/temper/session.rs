//! Driver session lifecycle
//!
//! A `Session` initializes the driver, opens every matching device, and
//! owns their handles until `close`. Handles never leave the session, so
//! nothing can reach a native device after teardown.

use crate::temper::driver::{Driver, Handle, SensorType};
use crate::temper::{DeviceInfo, Result, Sensing, SessionConfig, TemperedError};

/// Type-erased driver owned by a session.
pub type BoxedDriver = Box<dyn Driver + Send>;

/// An opened device: its descriptor and exclusive handle.
#[derive(Debug)]
struct OpenDevice {
    info: DeviceInfo,
    handle: Handle,
}

/// The driver plus the devices opened through it.
pub struct Session {
    driver: BoxedDriver,
    devices: Vec<OpenDevice>,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("devices", &self.devices)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Initialize `driver` and open every enumerated device matching
    /// `config`, in enumeration order.
    ///
    /// On failure nothing is leaked: devices opened so far are closed and
    /// the driver is shut down before the error is returned.
    pub fn open(driver: impl Driver + Send + 'static, config: &SessionConfig) -> Result<Self> {
        Self::open_boxed(Box::new(driver), config)
    }

    /// `open` for a driver that is already boxed.
    pub fn open_boxed(mut driver: BoxedDriver, config: &SessionConfig) -> Result<Self> {
        driver.init().map_err(TemperedError::DriverInit)?;
        log::debug!("tempered driver initialized");

        let listing = match driver.enumerate() {
            Ok(listing) => listing,
            Err(message) => {
                shutdown_quietly(&mut driver);
                return Err(TemperedError::Enumeration(message));
            }
        };

        let mut session = Session {
            driver,
            devices: Vec::with_capacity(listing.len()),
            closed: false,
        };

        for (index, info) in listing.into_iter().enumerate() {
            if !config.matches(&info) {
                log::debug!("skipping {} at {} (filtered)", info.type_name, info.path);
                continue;
            }
            match session.driver.open(index) {
                Ok(handle) => {
                    log::debug!(
                        "opened {} {:04x}:{:04x} at {}",
                        info.type_name,
                        info.vendor_id,
                        info.product_id,
                        info.path
                    );
                    session.devices.push(OpenDevice { info, handle });
                }
                Err(message) => {
                    session.driver.free_device_list();
                    // Drop closes what was opened and shuts the driver down
                    drop(session);
                    return Err(TemperedError::DeviceOpen {
                        path: info.path,
                        message,
                    });
                }
            }
        }

        session.driver.free_device_list();
        Ok(session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(TemperedError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Number of opened devices.
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.devices.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Descriptors of the opened devices, in enumeration order.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.ensure_open()?;
        Ok(self.devices.iter().map(|d| d.info.clone()).collect())
    }

    pub fn device(&self, index: usize) -> Result<&DeviceInfo> {
        self.ensure_open()?;
        self.devices
            .get(index)
            .map(|d| &d.info)
            .ok_or(TemperedError::NoSuchDevice {
                index,
                count: self.devices.len(),
            })
    }

    /// Read every sensor slot of device `index`.
    ///
    /// Slots are applied in order, so a later slot overwrites an earlier
    /// slot's value for the same channel. A failed channel does not stop
    /// the remaining slots; the last channel failure is returned with the
    /// readings that did succeed.
    pub fn sense(&mut self, index: usize) -> Result<Sensing> {
        self.ensure_open()?;
        let count = self.devices.len();
        let device = self
            .devices
            .get(index)
            .ok_or(TemperedError::NoSuchDevice { index, count })?;
        let driver = &mut self.driver;
        let handle = &device.handle;

        driver
            .read_sensors(handle)
            .map_err(TemperedError::SensorRead)?;

        let mut sensing = Sensing::default();
        let mut failure: Option<ChannelFailure> = None;

        for slot in 0..driver.sensor_count(handle) {
            let kind = driver.sensor_type(handle, slot);
            if kind.is_empty() {
                return Err(TemperedError::SensorUnsupported {
                    slot,
                    partial: sensing,
                });
            }

            if kind.contains(SensorType::TEMPERATURE) {
                match driver.temperature(handle, slot) {
                    Ok(temp_c) => sensing.temp_c = temp_c,
                    Err(message) => {
                        failure = Some(ChannelFailure::Temperature { slot, message })
                    }
                }
            }

            if kind.contains(SensorType::HUMIDITY) {
                match driver.humidity(handle, slot) {
                    Ok(rel_hum) => sensing.rel_hum = rel_hum,
                    Err(message) => failure = Some(ChannelFailure::Humidity { slot, message }),
                }
            }
        }

        match failure {
            None => Ok(sensing),
            Some(failure) => Err(failure.into_error(sensing)),
        }
    }

    /// Close every device, then shut the driver down.
    ///
    /// Device close failures are logged and skipped. The session counts
    /// as closed afterwards even if the shutdown itself fails.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;

        for device in self.devices.drain(..) {
            let OpenDevice { info, handle } = device;
            match self.driver.close(handle) {
                Ok(()) => log::debug!("closed {} at {}", info.type_name, info.path),
                Err(message) => log::warn!("failed to close {}: {}", info.path, message),
            }
        }

        self.driver
            .exit()
            .map_err(TemperedError::DriverShutdown)?;
        log::debug!("tempered driver shut down");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            log::error!("closing dropped session: {}", err);
        }
    }
}

enum ChannelFailure {
    Temperature { slot: i32, message: String },
    Humidity { slot: i32, message: String },
}

impl ChannelFailure {
    fn into_error(self, partial: Sensing) -> TemperedError {
        match self {
            ChannelFailure::Temperature { slot, message } => TemperedError::TemperatureRead {
                slot,
                message,
                partial,
            },
            ChannelFailure::Humidity { slot, message } => TemperedError::HumidityRead {
                slot,
                message,
                partial,
            },
        }
    }
}

fn shutdown_quietly(driver: &mut BoxedDriver) {
    if let Err(message) = driver.exit() {
        log::warn!("driver shutdown after failed open: {}", message);
    }
}
