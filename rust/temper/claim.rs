//! Process-wide driver claim
//!
//! libtempered keeps global HID state, so at most one driver may be between
//! `tempered_init` and `tempered_exit` at a time.

use crate::temper::{Result, TemperedError};
use std::sync::atomic::{AtomicBool, Ordering};

static DRIVER_CLAIMED: AtomicBool = AtomicBool::new(false);

pub const ALREADY_CLAIMED: &str = "driver already initialized in this process";

/// Holder of the process-wide slot. Released on `release` or drop.
#[derive(Debug)]
pub struct DriverClaim {
    held: bool,
}

impl DriverClaim {
    pub fn acquire() -> Result<Self> {
        let mut claim = Self { held: false };
        claim.ensure()?;
        Ok(claim)
    }

    /// Take the slot again if this holder gave it up.
    pub fn ensure(&mut self) -> Result<()> {
        if self.held {
            return Ok(());
        }
        DRIVER_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TemperedError::DriverInit(ALREADY_CLAIMED.into()))?;
        self.held = true;
        Ok(())
    }

    pub fn release(&mut self) {
        if self.held {
            self.held = false;
            DRIVER_CLAIMED.store(false, Ordering::Release);
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Drop for DriverClaim {
    fn drop(&mut self) {
        self.release();
    }
}
