//! Real-time iteration driver.
//!
//! Each control tick shifts the previous solution, embeds the measured state
//! and runs a fixed number of SQP iterations, returning the first control.

pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod shared;

pub use clock::SampleClock;
pub use config::RtiConfig;
pub use driver::{RealTimeDriver, TickOutput};
pub use error::{RtiError, RtiResult};
pub use shared::SharedDriver;
