//! Scripted in-memory driver
//!
//! Stands in for libtempered in tests and benchmarks. Each fake device is
//! described up front; a `FakeCalls` view shares the driver's call log so
//! callers can check what the session did after handing the driver over.

use crate::temper::claim::{DriverClaim, ALREADY_CLAIMED};
use crate::temper::driver::{Driver, Handle, SensorType};
use crate::temper::DeviceInfo;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One sensor slot on a fake device.
#[derive(Clone, Debug)]
pub struct FakeSlot {
    pub kind: SensorType,
    pub temperature: Result<f32, String>,
    pub humidity: Result<f32, String>,
}

impl FakeSlot {
    pub fn temperature(temp_c: f32) -> Self {
        Self {
            kind: SensorType::TEMPERATURE,
            temperature: Ok(temp_c),
            humidity: Err("no humidity sensor".into()),
        }
    }

    pub fn humidity(rel_hum: f32) -> Self {
        Self {
            kind: SensorType::HUMIDITY,
            temperature: Err("no temperature sensor".into()),
            humidity: Ok(rel_hum),
        }
    }

    pub fn combined(temp_c: f32, rel_hum: f32) -> Self {
        Self {
            kind: SensorType::TEMPERATURE | SensorType::HUMIDITY,
            temperature: Ok(temp_c),
            humidity: Ok(rel_hum),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            kind: SensorType::NONE,
            temperature: Err("no sensor".into()),
            humidity: Err("no sensor".into()),
        }
    }

    pub fn with_temperature_error(mut self, message: &str) -> Self {
        self.temperature = Err(message.to_string());
        self
    }

    pub fn with_humidity_error(mut self, message: &str) -> Self {
        self.humidity = Err(message.to_string());
        self
    }
}

/// One attached fake device.
#[derive(Clone, Debug)]
pub struct FakeDevice {
    pub info: DeviceInfo,
    pub slots: Vec<FakeSlot>,
    pub open_error: Option<String>,
    pub read_error: Option<String>,
    pub close_error: Option<String>,
    /// How long `read_sensors` blocks before returning
    pub read_delay: Option<Duration>,
}

impl FakeDevice {
    pub fn new(type_name: &str, path: &str) -> Self {
        Self {
            info: DeviceInfo {
                vendor_id: 0x0c45,
                product_id: 0x7401,
                interface_number: 1,
                path: path.to_string(),
                type_name: type_name.to_string(),
            },
            slots: Vec::new(),
            open_error: None,
            read_error: None,
            close_error: None,
            read_delay: None,
        }
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.info.vendor_id = vendor_id;
        self.info.product_id = product_id;
        self
    }

    pub fn with_slot(mut self, slot: FakeSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_string());
        self
    }

    pub fn failing_read(mut self, message: &str) -> Self {
        self.read_error = Some(message.to_string());
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn failing_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    devices: Vec<FakeDevice>,
    init_error: Option<String>,
    exit_error: Option<String>,
    enumerate_error: Option<String>,

    init_calls: usize,
    exit_calls: usize,
    list_live: bool,
    lists_freed: usize,
    opened: Vec<usize>,
    closed: Vec<usize>,
    reads: usize,
}

/// Scripted driver. Handles are `device index + 1`.
#[derive(Debug, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
    claiming: bool,
    claim: Option<DriverClaim>,
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, device: FakeDevice) -> Self {
        lock(&self.state).devices.push(device);
        self
    }

    pub fn failing_init(self, message: &str) -> Self {
        lock(&self.state).init_error = Some(message.to_string());
        self
    }

    pub fn failing_exit(self, message: &str) -> Self {
        lock(&self.state).exit_error = Some(message.to_string());
        self
    }

    pub fn failing_enumerate(self, message: &str) -> Self {
        lock(&self.state).enumerate_error = Some(message.to_string());
        self
    }

    /// Hold the process-wide driver claim from `init` until `exit`, as the
    /// native driver does.
    pub fn claiming(mut self) -> Self {
        self.claiming = true;
        self
    }

    fn take_claim(&mut self) -> crate::temper::Result<()> {
        let claim = match self.claim.take() {
            Some(mut claim) => {
                claim.ensure()?;
                claim
            }
            None => DriverClaim::acquire()?,
        };
        self.claim = Some(claim);
        Ok(())
    }

    /// Observer sharing this driver's call log.
    pub fn calls(&self) -> FakeCalls {
        FakeCalls {
            state: Arc::clone(&self.state),
        }
    }

    fn index(handle: &Handle) -> usize {
        handle.as_raw() - 1
    }
}

impl Driver for FakeDriver {
    fn init(&mut self) -> Result<(), String> {
        if self.claiming {
            self.take_claim().map_err(|_| ALREADY_CLAIMED.to_string())?;
        }
        let mut state = lock(&self.state);
        state.init_calls += 1;
        match &state.init_error {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn exit(&mut self) -> Result<(), String> {
        if let Some(claim) = self.claim.as_mut() {
            claim.release();
        }
        let mut state = lock(&self.state);
        state.exit_calls += 1;
        match &state.exit_error {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, String> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.enumerate_error {
            return Err(message.clone());
        }
        state.list_live = true;
        Ok(state.devices.iter().map(|d| d.info.clone()).collect())
    }

    fn free_device_list(&mut self) {
        let mut state = lock(&self.state);
        state.list_live = false;
        state.lists_freed += 1;
    }

    fn open(&mut self, index: usize) -> Result<Handle, String> {
        let mut state = lock(&self.state);
        if !state.list_live {
            return Err("device list already freed".into());
        }
        let device = state
            .devices
            .get(index)
            .ok_or_else(|| format!("no device at index {}", index))?;
        if let Some(message) = &device.open_error {
            return Err(message.clone());
        }
        state.opened.push(index);
        Ok(Handle::from_raw(index + 1))
    }

    fn close(&mut self, handle: Handle) -> Result<(), String> {
        let index = Self::index(&handle);
        let mut state = lock(&self.state);
        state.closed.push(index);
        match &state.devices[index].close_error {
            Some(message) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn read_sensors(&mut self, handle: &Handle) -> Result<(), String> {
        let (delay, result) = {
            let mut state = lock(&self.state);
            state.reads += 1;
            let device = &state.devices[Self::index(handle)];
            let result = match &device.read_error {
                Some(message) => Err(message.clone()),
                None => Ok(()),
            };
            (device.read_delay, result)
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        result
    }

    fn sensor_count(&mut self, handle: &Handle) -> i32 {
        lock(&self.state).devices[Self::index(handle)].slots.len() as i32
    }

    fn sensor_type(&mut self, handle: &Handle, slot: i32) -> SensorType {
        lock(&self.state).devices[Self::index(handle)]
            .slots
            .get(slot as usize)
            .map_or(SensorType::NONE, |s| s.kind)
    }

    fn temperature(&mut self, handle: &Handle, slot: i32) -> Result<f32, String> {
        lock(&self.state).devices[Self::index(handle)]
            .slots
            .get(slot as usize)
            .ok_or_else(|| "invalid sensor".to_string())?
            .temperature
            .clone()
    }

    fn humidity(&mut self, handle: &Handle, slot: i32) -> Result<f32, String> {
        lock(&self.state).devices[Self::index(handle)]
            .slots
            .get(slot as usize)
            .ok_or_else(|| "invalid sensor".to_string())?
            .humidity
            .clone()
    }
}

/// Read-only view of a `FakeDriver`'s call log.
#[derive(Clone, Debug)]
pub struct FakeCalls {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCalls {
    pub fn init_calls(&self) -> usize {
        lock(&self.state).init_calls
    }

    pub fn exit_calls(&self) -> usize {
        lock(&self.state).exit_calls
    }

    pub fn lists_freed(&self) -> usize {
        lock(&self.state).lists_freed
    }

    /// Device indices opened, in call order.
    pub fn opened(&self) -> Vec<usize> {
        lock(&self.state).opened.clone()
    }

    /// Device indices closed, in call order.
    pub fn closed(&self) -> Vec<usize> {
        lock(&self.state).closed.clone()
    }

    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }
}
