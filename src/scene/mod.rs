//! Scene management
//!
//! A widget's scene is one camera and one model transform shared by every
//! model the widget draws.

mod camera;
mod transform;

pub use camera::*;
pub use transform::*;
