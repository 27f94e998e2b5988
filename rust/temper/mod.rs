//! TEMPered driver bindings
//!
//! Session-based access to TEMPer thermometers and hygrometers through
//! libtempered, for Python and for Rust callers.

#[cfg(any(test, feature = "native", feature = "testing"))]
pub mod claim;
pub mod device_info;
pub mod driver;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
#[cfg(feature = "native")]
pub mod native;
pub mod python;
pub mod sensing;
pub mod session;

pub use device_info::{DeviceInfo, SessionConfig};
pub use driver::{Driver, Handle, SensorType};
pub use error::{Result, TemperedError};
pub use python::{PyDevice, PyTempered};
pub use sensing::Sensing;
pub use session::Session;
