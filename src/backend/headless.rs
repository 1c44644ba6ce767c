//! Headless GPU backend for testing and offline checks.
//!
//! This backend doesn't touch a GPU, but it does compile and link shaders
//! with the same front end as the wgpu backend, validates draws against the
//! bound attributes, and records every clear and draw so callers can inspect
//! what a frame would have rendered.

use std::cell::Cell;
use std::collections::HashMap;

use crate::backend::reflect::{
    check_draw, check_image, compile_stage, link, AttributeBinding, CompiledStage, ProgramLayout,
    UniformStore,
};
use crate::backend::traits::*;
use crate::backend::types::*;

/// A command recorded during a frame
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessCommand {
    Clear {
        flags: ClearFlags,
        color: [f32; 4],
    },
    Draw {
        program: ProgramHandle,
        first: u32,
        count: u32,
        /// Every uniform of the program by name, as it was at draw time
        uniforms: HashMap<String, UniformValue>,
        /// Texture sampled by each texture uniform
        textures: HashMap<String, Option<TextureHandle>>,
    },
}

impl HeadlessCommand {
    /// Uniform value of a recorded draw
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        match self {
            HeadlessCommand::Draw { uniforms, .. } => uniforms.get(name).copied(),
            HeadlessCommand::Clear { .. } => None,
        }
    }
}

/// Number of live objects of each kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub shaders: usize,
    pub programs: usize,
    pub buffers: usize,
    pub textures: usize,
}

struct HeadlessProgram {
    layout: ProgramLayout,
    uniforms: UniformStore,
}

struct HeadlessBuffer {
    data: Vec<u8>,
    target: Option<BufferTarget>,
    usage: BufferUsage,
}

/// Headless backend
pub struct HeadlessBackend {
    width: u32,
    height: u32,

    shaders: HashMap<u64, CompiledStage>,
    programs: HashMap<u64, HeadlessProgram>,
    buffers: HashMap<u64, HeadlessBuffer>,
    textures: HashMap<u64, ImageData>,

    next_shader_id: u64,
    next_program_id: u64,
    next_buffer_id: u64,
    next_texture_id: u64,

    current_program: Option<ProgramHandle>,
    attribute_bindings: HashMap<u32, AttributeBinding>,
    texture_units: HashMap<u32, TextureHandle>,

    in_frame: bool,
    commands: Vec<HeadlessCommand>,
    frames: Vec<Vec<HeadlessCommand>>,
    lookups: Cell<usize>,
    fail_next_draw: bool,
    device_error: Option<BackendError>,
}

impl HeadlessBackend {
    /// Create a new headless backend with a drawable of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            next_shader_id: 1,
            next_program_id: 1,
            next_buffer_id: 1,
            next_texture_id: 1,
            current_program: None,
            attribute_bindings: HashMap::new(),
            texture_units: HashMap::new(),
            in_frame: false,
            commands: Vec::new(),
            frames: Vec::new(),
            lookups: Cell::new(0),
            fail_next_draw: false,
            device_error: None,
        }
    }

    /// Live object counts
    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            shaders: self.shaders.len(),
            programs: self.programs.len(),
            buffers: self.buffers.len(),
            textures: self.textures.len(),
        }
    }

    /// Number of attribute/uniform name lookups performed so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    /// Commands recorded by completed frames, oldest first
    pub fn frames(&self) -> &[Vec<HeadlessCommand>] {
        &self.frames
    }

    /// Commands of the most recently completed frame
    pub fn last_frame(&self) -> Option<&[HeadlessCommand]> {
        self.frames.last().map(Vec::as_slice)
    }

    /// Contents of a buffer as last uploaded
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|b| b.data.as_slice())
    }

    /// Target and usage hint of the last upload to a buffer
    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<(BufferTarget, BufferUsage)> {
        let buffer = self.buffers.get(&buffer.0)?;
        Some((buffer.target?, buffer.usage))
    }

    /// Pixels of a texture
    pub fn texture_image(&self, texture: TextureHandle) -> Option<&ImageData> {
        self.textures.get(&texture.0)
    }

    /// Make the next draw fail as if the device had been lost
    pub fn fail_next_draw(&mut self) {
        self.fail_next_draw = true;
    }

    /// Raise an asynchronous device error, as a GPU driver would.
    ///
    /// The error surfaces from the next `begin_frame` or `end_frame`. Only
    /// the first error is kept until it is returned.
    pub fn report_device_error(&mut self, error: BackendError) {
        if self.device_error.is_none() {
            self.device_error = Some(error);
        }
    }

    fn check_device(&mut self) -> BackendResult<()> {
        match self.device_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn program(&self, program: ProgramHandle) -> BackendResult<&HeadlessProgram> {
        self.programs.get(&program.0).ok_or(BackendError::InvalidHandle {
            kind: "program",
            id: program.0,
        })
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(300, 300)
    }
}

impl GpuBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> BackendResult<ShaderHandle> {
        let compiled = compile_stage(stage, source).map_err(BackendError::ShaderCompilationFailed)?;

        let id = self.next_shader_id;
        self.next_shader_id += 1;
        self.shaders.insert(id, compiled);
        log::trace!("HeadlessBackend: created {} shader {}", stage, id);

        Ok(ShaderHandle(id))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        log::trace!("HeadlessBackend: destroying shader {}", shader.0);
        self.shaders.remove(&shader.0);
    }

    fn link_program(
        &mut self,
        shaders: &[ShaderHandle],
        _state: &PipelineState,
    ) -> BackendResult<ProgramHandle> {
        let stages = shaders
            .iter()
            .map(|s| {
                self.shaders.get(&s.0).ok_or(BackendError::InvalidHandle {
                    kind: "shader",
                    id: s.0,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;
        let layout = link(&stages).map_err(BackendError::ProgramLinkFailed)?;

        let id = self.next_program_id;
        self.next_program_id += 1;
        let uniforms = UniformStore::new(&layout);
        self.programs.insert(id, HeadlessProgram { layout, uniforms });
        log::trace!("HeadlessBackend: linked program {}", id);

        Ok(ProgramHandle(id))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        log::trace!("HeadlessBackend: destroying program {}", program.0);
        self.programs.remove(&program.0);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        self.program(program)?;
        self.current_program = Some(program);
        Ok(())
    }

    fn attribute_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> BackendResult<AttributeLocation> {
        self.lookups.set(self.lookups.get() + 1);
        let program = self.program(program)?;
        Ok(AttributeLocation(
            program.layout.attribute(name).map(|a| a.location),
        ))
    }

    fn uniform_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> BackendResult<UniformLocation> {
        self.lookups.set(self.lookups.get() + 1);
        let program = self.program(program)?;
        Ok(UniformLocation(program.layout.uniforms.get(name).copied()))
    }

    fn set_uniform(
        &mut self,
        location: &UniformLocation,
        value: UniformValue,
    ) -> BackendResult<()> {
        let current = self.current_program.ok_or(BackendError::NoProgramBound)?;
        let Some(slot) = location.slot() else {
            return Ok(());
        };
        let program = self
            .programs
            .get_mut(&current.0)
            .ok_or(BackendError::NoProgramBound)?;
        if !program.uniforms.write(&slot, value) {
            log::warn!("HeadlessBackend: {:?} does not fit uniform slot {:?}", value, slot);
        }
        Ok(())
    }

    fn create_buffer(&mut self) -> BackendResult<BufferHandle> {
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(
            id,
            HeadlessBuffer {
                data: Vec::new(),
                target: None,
                usage: BufferUsage::default(),
            },
        );
        log::trace!("HeadlessBackend: created buffer {}", id);
        Ok(BufferHandle(id))
    }

    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> BackendResult<()> {
        let entry = self
            .buffers
            .get_mut(&buffer.0)
            .ok_or(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        log::trace!(
            "HeadlessBackend: uploading {} bytes to buffer {} ({:?}, {:?})",
            data.len(),
            buffer.0,
            target,
            usage
        );
        entry.data = data.to_vec();
        entry.target = Some(target);
        entry.usage = usage;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("HeadlessBackend: destroying buffer {}", buffer.0);
        self.buffers.remove(&buffer.0);
        self.attribute_bindings.retain(|_, b| b.buffer != buffer);
    }

    fn bind_vertex_attribute(
        &mut self,
        location: AttributeLocation,
        buffer: BufferHandle,
        components: u32,
    ) -> BackendResult<()> {
        let Some(index) = location.index() else {
            return Ok(());
        };
        if !self.buffers.contains_key(&buffer.0) {
            return Err(BackendError::InvalidHandle {
                kind: "buffer",
                id: buffer.0,
            });
        }
        self.attribute_bindings
            .insert(index, AttributeBinding { buffer, components });
        Ok(())
    }

    fn create_texture(&mut self, image: &ImageData) -> BackendResult<TextureHandle> {
        check_image(image)?;
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        log::trace!(
            "HeadlessBackend: creating texture {} ({}x{})",
            id,
            image.width,
            image.height
        );
        self.textures.insert(id, image.clone());
        Ok(TextureHandle(id))
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            });
        }
        self.texture_units.insert(unit, texture);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        log::trace!("HeadlessBackend: destroying texture {}", texture.0);
        self.textures.remove(&texture.0);
        self.texture_units.retain(|_, t| *t != texture);
    }

    fn drawable_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        self.check_device()?;
        self.in_frame = true;
        self.commands.clear();
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) -> BackendResult<()> {
        if self.in_frame {
            self.commands.push(HeadlessCommand::Clear { flags, color });
        }
        Ok(())
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> BackendResult<()> {
        if std::mem::take(&mut self.fail_next_draw) {
            return Err(BackendError::DeviceLost);
        }

        let current = self.current_program.ok_or(BackendError::NoProgramBound)?;
        let program = self.program(current)?;
        let buffers = &self.buffers;
        check_draw(
            &program.layout,
            &self.attribute_bindings,
            |b| buffers.get(&b.0).map(|b| b.data.len()),
            first,
            count,
        )?;

        let uniforms = program
            .layout
            .uniforms
            .iter()
            .filter_map(|(name, slot)| Some((name.clone(), program.uniforms.read(slot)?)))
            .collect();
        let textures = program
            .layout
            .textures
            .iter()
            .map(|t| {
                let unit = program.uniforms.texture_unit(t.texture_binding);
                (t.name.clone(), self.texture_units.get(&unit).copied())
            })
            .collect();

        if self.in_frame {
            self.commands.push(HeadlessCommand::Draw {
                program: current,
                first,
                count,
                uniforms,
                textures,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.in_frame {
            self.in_frame = false;
            self.frames.push(std::mem::take(&mut self.commands));
        }
        self.check_device()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> scale: f32;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position * scale, 1.0);
}
"#;

    const FRAGMENT: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn linked(backend: &mut HeadlessBackend) -> ProgramHandle {
        let vs = backend.create_shader(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = backend.create_shader(ShaderStage::Fragment, FRAGMENT).unwrap();
        let program = backend
            .link_program(&[vs, fs], &PipelineState::default())
            .unwrap();
        backend.destroy_shader(vs);
        backend.destroy_shader(fs);
        program
    }

    #[test]
    fn test_compile_failure_creates_nothing() {
        let mut backend = HeadlessBackend::default();
        let err = backend.create_shader(ShaderStage::Vertex, "not wgsl");
        assert!(matches!(err, Err(BackendError::ShaderCompilationFailed(_))));
        assert_eq!(backend.resource_counts(), ResourceCounts::default());
    }

    #[test]
    fn test_draw_records_uniforms() {
        let mut backend = HeadlessBackend::default();
        let program = linked(&mut backend);
        backend.use_program(program).unwrap();

        let scale = backend.uniform_location(program, "scale").unwrap();
        backend.set_uniform(&scale, UniformValue::Float(2.0)).unwrap();

        let buffer = backend.create_buffer().unwrap();
        let data: Vec<f32> = vec![0.0; 9];
        backend
            .buffer_data(
                buffer,
                BufferTarget::Array,
                bytemuck::cast_slice(&data),
                BufferUsage::StaticDraw,
            )
            .unwrap();
        let position = backend.attribute_location(program, "position").unwrap();
        backend.bind_vertex_attribute(position, buffer, 3).unwrap();

        backend.begin_frame().unwrap();
        backend.clear(ClearFlags::ALL, [0.0; 4]).unwrap();
        backend.draw_arrays(0, 3).unwrap();
        backend.end_frame().unwrap();

        let frame = backend.last_frame().unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1].uniform("scale"), Some(UniformValue::Float(2.0)));
    }

    #[test]
    fn test_draw_validates_attributes() {
        let mut backend = HeadlessBackend::default();
        let program = linked(&mut backend);
        backend.use_program(program).unwrap();

        assert!(matches!(
            backend.draw_arrays(0, 3),
            Err(BackendError::MissingAttribute { .. })
        ));

        let buffer = backend.create_buffer().unwrap();
        backend
            .buffer_data(buffer, BufferTarget::Array, &[0; 24], BufferUsage::StaticDraw)
            .unwrap();
        let position = backend.attribute_location(program, "position").unwrap();
        backend.bind_vertex_attribute(position, buffer, 3).unwrap();
        assert!(matches!(
            backend.draw_arrays(0, 3),
            Err(BackendError::DrawOutOfRange { available: 2, .. })
        ));
        assert!(backend.draw_arrays(0, 2).is_ok());
    }

    #[test]
    fn test_unknown_names_yield_none() {
        let mut backend = HeadlessBackend::default();
        let program = linked(&mut backend);
        assert!(backend.attribute_location(program, "missing").unwrap().is_none());
        assert!(backend.uniform_location(program, "missing").unwrap().is_none());
        assert_eq!(backend.lookup_count(), 2);

        backend.use_program(program).unwrap();
        assert!(backend
            .set_uniform(&UniformLocation::NONE, UniformValue::Float(1.0))
            .is_ok());
    }

    #[test]
    fn test_injected_failure() {
        let mut backend = HeadlessBackend::default();
        backend.fail_next_draw();
        assert!(matches!(
            backend.draw_arrays(0, 0),
            Err(BackendError::DeviceLost)
        ));
    }

    #[test]
    fn test_device_error_surfaces_at_frame_boundaries() {
        let mut backend = HeadlessBackend::default();
        backend.report_device_error(BackendError::Validation("first".into()));
        backend.report_device_error(BackendError::OutOfMemory);

        match backend.begin_frame() {
            Err(BackendError::Validation(text)) => assert_eq!(text, "first"),
            other => panic!("unexpected result: {:?}", other),
        }
        backend.begin_frame().unwrap();
        backend.clear(ClearFlags::ALL, [0.0; 4]).unwrap();

        // Raised mid-frame: the frame completes, then the error is returned
        backend.report_device_error(BackendError::DeviceLost);
        assert!(matches!(backend.end_frame(), Err(BackendError::DeviceLost)));
        assert_eq!(backend.frames().len(), 1);
        assert!(backend.end_frame().is_ok());
    }
}
