//! Driver shared with a timer thread.

use std::sync::{Arc, Mutex};

use nalgebra::DVector;

use crate::driver::{RealTimeDriver, TickOutput};
use crate::error::{RtiError, RtiResult};

/// Cloneable handle serializing ticks through a mutex.
#[derive(Clone)]
pub struct SharedDriver {
    inner: Arc<Mutex<RealTimeDriver>>,
}

impl SharedDriver {
    pub fn new(driver: RealTimeDriver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    pub fn tick(&self, time: f64, measured: &DVector<f64>) -> RtiResult<TickOutput> {
        let mut driver = self.inner.lock().map_err(|_| RtiError::Poisoned)?;
        driver.tick(time, measured)
    }

    /// Run `f` with exclusive access to the driver.
    pub fn with<R>(&self, f: impl FnOnce(&mut RealTimeDriver) -> R) -> RtiResult<R> {
        let mut driver = self.inner.lock().map_err(|_| RtiError::Poisoned)?;
        Ok(f(&mut driver))
    }
}
