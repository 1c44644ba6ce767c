//! Ornaments - interactive 3D decorative widgets
//!
//! Renders small animated models (a star, a golden star, a diamond) that
//! spin continuously and tilt toward the pointer while hovered.
//!
//! Two backends implement [`backend::GpuBackend`]:
//! - **wgpu**: WebGL2 in the browser, any wgpu backend natively
//! - **headless**: records frames without a GPU, for tests and offline checks
//!
//! # Features
//! - Binary mesh decoding with bounds-checked reads
//! - WGSL programs compiled and reflected with naga, with cached lookups
//! - Eased hover animation with an injectable clock
//! - Fixed per-variant draw order, including the diamond's layered shells
//! - A `wasm-bindgen` host that mounts widgets onto canvases

pub mod animation;
pub mod backend;
pub mod config;
pub mod resources;
pub mod scene;
pub mod widget;

// Web-specific modules
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use animation::{Animated, Clock, Easing, ManualClock, SystemClock};
pub use backend::{GpuBackend, HeadlessBackend, WgpuBackend};
pub use config::WidgetConfig;
pub use resources::{preprocess_shader, DecodeError, Mesh, ShaderCompileError};
pub use widget::{Widget, WidgetError, WidgetFactory, WidgetKind};

// Web initialization helper
#[cfg(target_arch = "wasm32")]
pub fn init_web_logging() {
    // Set up panic hook for better error messages in console
    console_error_panic_hook::set_once();
    // A second call fails because a logger is already set
    let _ = console_log::init_with_level(log::Level::Info);
}
