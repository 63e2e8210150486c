//! rc-core: shared foundation for the receding-horizon solver crates.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - timing (stopwatches and solve deadlines)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod timing;

pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use timing::{Deadline, Timer};
