//! Backend abstraction layer
//!
//! Provides the common trait and types that the wgpu and headless backends implement.

pub mod headless;
pub(crate) mod reflect;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use headless::{HeadlessBackend, HeadlessCommand, ResourceCounts};
pub use reflect::SAMPLER_SUFFIX;
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
