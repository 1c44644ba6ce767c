//! Core backend abstraction traits
//!
//! These traits define the interface that both the wgpu and the headless
//! backends implement. The surface is deliberately close to a GL context:
//! a bound program, texture units, attribute bindings and immediate draws.

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to initialize backend: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire next image: {0}")]
    AcquireImageFailed(String),
    #[error("Failed to compile shader: {0}")]
    ShaderCompilationFailed(String),
    #[error("Failed to link program: {0}")]
    ProgramLinkFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Invalid {kind} handle {id}")]
    InvalidHandle { kind: &'static str, id: u64 },
    #[error("No program is bound")]
    NoProgramBound,
    #[error("Vertex attribute `{name}` has no buffer bound")]
    MissingAttribute { name: String },
    #[error("Vertex attribute `{name}` expects {expected} components, buffer provides {actual}")]
    AttributeFormatMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
    #[error("Draw of vertices {first}..{end} exceeds {available} vertices in attribute `{name}`")]
    DrawOutOfRange {
        name: String,
        first: u32,
        end: u32,
        available: u32,
    },
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a compiled shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Main graphics backend trait
///
/// Handles are plain ids; destroying a handle twice or using it after
/// destruction yields [`BackendError::InvalidHandle`] (or is ignored for
/// destroy calls), never undefined behavior.
pub trait GpuBackend {
    /// Human readable backend name
    fn name(&self) -> &'static str;

    // Programs

    /// Compile one shader stage. Nothing is created when compilation fails.
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> BackendResult<ShaderHandle>;

    /// Release a shader stage
    fn destroy_shader(&mut self, shader: ShaderHandle);

    /// Link compiled stages into a program. Nothing is created when linking fails.
    fn link_program(
        &mut self,
        shaders: &[ShaderHandle],
        state: &PipelineState,
    ) -> BackendResult<ProgramHandle>;

    /// Release a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Make a program current for uniform assignment and draws
    fn use_program(&mut self, program: ProgramHandle) -> BackendResult<()>;

    /// Look up a vertex attribute by name
    fn attribute_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> BackendResult<AttributeLocation>;

    /// Look up a uniform by name
    fn uniform_location(&self, program: ProgramHandle, name: &str)
        -> BackendResult<UniformLocation>;

    /// Assign a uniform of the current program
    fn set_uniform(&mut self, location: &UniformLocation, value: UniformValue)
        -> BackendResult<()>;

    // Buffers

    /// Create an empty buffer
    fn create_buffer(&mut self) -> BackendResult<BufferHandle>;

    /// Replace the contents of a buffer
    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> BackendResult<()>;

    /// Release a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Source an attribute from tightly packed `f32` components of a buffer.
    /// Binding [`AttributeLocation::NONE`] is a no-op.
    fn bind_vertex_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
    ) -> BackendResult<()>;

    // Textures

    /// Create a texture and upload its pixels. Sampling is linear with
    /// clamp-to-edge wrapping and no mipmaps.
    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle>;

    /// Bind a texture to a texture unit
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    // Frames

    /// Current drawable size in pixels
    fn drawable_size(&self) -> (u32, u32);

    /// Resize the drawable (and the depth buffer with it)
    fn resize(&mut self, width: u32, height: u32);

    /// Begin a new frame
    fn begin_frame(&mut self) -> BackendResult<()>;

    /// Clear the selected attachments
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) -> BackendResult<()>;

    /// Draw `count` vertices starting at `first` as a triangle list
    fn draw_arrays(&mut self, first: u32, count: u32) -> BackendResult<()>;

    /// End and present the frame
    fn end_frame(&mut self) -> BackendResult<()>;
}
