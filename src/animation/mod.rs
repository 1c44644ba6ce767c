//! Time-based scalar animation

mod animated;
mod clock;
mod easing;

pub use animated::{Animated, RETARGET_EPSILON};
pub use clock::{Clock, ManualClock, SystemClock};
pub use easing::Easing;
