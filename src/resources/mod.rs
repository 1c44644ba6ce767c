//! Resource management
//!
//! CPU-side builders and decoders plus thin owners of GPU objects: buffers,
//! mesh files, models, shader programs, textures and the procedural
//! gradient.

pub mod buffer;
pub mod color;
pub mod gradient;
pub mod mesh_file;
pub mod model;
pub mod program;
pub mod shader_source;
pub mod texture;

pub use buffer::{GrowableBuffer, Scalar, ScalarKind};
pub use color::Rgb;
pub use gradient::{linear_gradient, GradientStop};
pub use mesh_file::{Corner, DecodeError, FaceIndex, Mesh};
pub use model::Model;
pub use program::{ShaderCompileError, ShaderProgram};
pub use shader_source::preprocess_shader;
pub use texture::{decode_image, ImageDecodeError, Texture};
