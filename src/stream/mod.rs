//! Stream combinators for view updates

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
