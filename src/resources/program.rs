//! Shader programs with cached attribute and uniform lookups

use std::collections::HashMap;

use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Error building a shader program
#[derive(Error, Debug)]
pub enum ShaderCompileError {
    #[error("Failed to compile {stage} shader:\n{diagnostic}")]
    Compile {
        stage: ShaderStage,
        diagnostic: String,
    },
    #[error("Failed to link program:\n{diagnostic}")]
    Link { diagnostic: String },
    #[error(transparent)]
    Backend(BackendError),
}

impl ShaderCompileError {
    /// Compiler or linker output, if any
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ShaderCompileError::Compile { diagnostic, .. }
            | ShaderCompileError::Link { diagnostic } => Some(diagnostic),
            ShaderCompileError::Backend(_) => None,
        }
    }
}

/// A linked shader program
///
/// Location lookups go to the backend once per name; hits and misses are
/// both cached. The program must be released with [`ShaderProgram::destroy`].
#[derive(Debug)]
pub struct ShaderProgram {
    handle: ProgramHandle,
    attributes: HashMap<String, AttributeLocation>,
    uniforms: HashMap<String, UniformLocation>,
}

impl ShaderProgram {
    /// Compile every stage and link them into one program.
    ///
    /// On failure every stage compiled so far is released before the error
    /// is returned. On success the stage objects are released after linking.
    pub fn compile<B: GpuBackend>(
        backend: &mut B,
        stages: &[(ShaderStage, &str)],
        state: &PipelineState,
    ) -> Result<Self, ShaderCompileError> {
        let mut shaders = Vec::with_capacity(stages.len());

        for &(stage, source) in stages {
            match backend.create_shader(stage, source) {
                Ok(shader) => shaders.push(shader),
                Err(err) => {
                    release(backend, &shaders);
                    return Err(match err {
                        BackendError::ShaderCompilationFailed(diagnostic) => {
                            ShaderCompileError::Compile { stage, diagnostic }
                        }
                        other => ShaderCompileError::Backend(other),
                    });
                }
            }
        }

        let linked = backend.link_program(&shaders, state);
        release(backend, &shaders);

        let handle = linked.map_err(|err| match err {
            BackendError::ProgramLinkFailed(diagnostic) => ShaderCompileError::Link { diagnostic },
            other => ShaderCompileError::Backend(other),
        })?;
        log::debug!("Linked shader program {:?}", handle);

        Ok(Self {
            handle,
            attributes: HashMap::new(),
            uniforms: HashMap::new(),
        })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Make this the active program
    pub fn bind<B: GpuBackend>(&self, backend: &mut B) -> BackendResult<()> {
        backend.use_program(self.handle)
    }

    pub fn attribute_location<B: GpuBackend>(
        &mut self,
        backend: &B,
        name: &str,
    ) -> BackendResult<AttributeLocation> {
        if let Some(location) = self.attributes.get(name) {
            return Ok(*location);
        }
        let location = backend.attribute_location(self.handle, name)?;
        if location.is_none() {
            log::debug!("Attribute `{}` is not used by program {:?}", name, self.handle);
        }
        self.attributes.insert(name.to_string(), location);
        Ok(location)
    }

    pub fn uniform_location<B: GpuBackend>(
        &mut self,
        backend: &B,
        name: &str,
    ) -> BackendResult<UniformLocation> {
        if let Some(location) = self.uniforms.get(name) {
            return Ok(*location);
        }
        let location = backend.uniform_location(self.handle, name)?;
        if location.is_none() {
            log::debug!("Uniform `{}` is not used by program {:?}", name, self.handle);
        }
        self.uniforms.insert(name.to_string(), location);
        Ok(location)
    }

    /// Look up and assign a uniform. The program must be bound.
    pub fn set_uniform<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> BackendResult<()> {
        let location = self.uniform_location(backend, name)?;
        backend.set_uniform(&location, value.into())
    }

    /// Release the program
    pub fn destroy<B: GpuBackend>(self, backend: &mut B) {
        log::debug!("Destroying shader program {:?}", self.handle);
        backend.destroy_program(self.handle);
    }
}

fn release<B: GpuBackend>(backend: &mut B, shaders: &[ShaderHandle]) {
    for &shader in shaders {
        backend.destroy_shader(shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, ResourceCounts};

    const VERTEX: &str = r#"
struct Params {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) tex_coord: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = params.mvp * vec4<f32>(position, 1.0);
    out.uv = tex_coord;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
struct Params {
    mvp: mat4x4<f32>,
    tint: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return params.tint * vec4<f32>(uv, 0.0, 1.0);
}
"#;

    const BAD_FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(3) missing: f32) -> @location(0) vec4<f32> {
    return vec4<f32>(missing);
}
"#;

    fn compile(backend: &mut HeadlessBackend, fragment: &str) -> Result<ShaderProgram, ShaderCompileError> {
        ShaderProgram::compile(
            backend,
            &[(ShaderStage::Vertex, VERTEX), (ShaderStage::Fragment, fragment)],
            &PipelineState::default(),
        )
    }

    #[test]
    fn test_compile_releases_stages() {
        let mut backend = HeadlessBackend::default();
        let program = compile(&mut backend, FRAGMENT).unwrap();
        assert_eq!(
            backend.resource_counts(),
            ResourceCounts {
                programs: 1,
                ..Default::default()
            }
        );
        program.destroy(&mut backend);
        assert_eq!(backend.resource_counts(), ResourceCounts::default());
    }

    #[test]
    fn test_compile_failure_leaks_nothing() {
        let mut backend = HeadlessBackend::default();
        let err = compile(&mut backend, "fn broken(").unwrap_err();
        match &err {
            ShaderCompileError::Compile { stage, diagnostic } => {
                assert_eq!(*stage, ShaderStage::Fragment);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.resource_counts(), ResourceCounts::default());
    }

    #[test]
    fn test_link_failure_leaks_nothing() {
        let mut backend = HeadlessBackend::default();
        let err = compile(&mut backend, BAD_FRAGMENT).unwrap_err();
        assert!(matches!(err, ShaderCompileError::Link { .. }));
        assert!(err.diagnostic().is_some());
        assert_eq!(backend.resource_counts(), ResourceCounts::default());
    }

    #[test]
    fn test_lookups_are_cached() {
        let mut backend = HeadlessBackend::default();
        let mut program = compile(&mut backend, FRAGMENT).unwrap();

        let first = program.attribute_location(&backend, "tex_coord").unwrap();
        let second = program.attribute_location(&backend, "tex_coord").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.index(), Some(1));

        let missing = program.uniform_location(&backend, "nope").unwrap();
        assert!(missing.is_none());
        program.uniform_location(&backend, "nope").unwrap();

        assert_eq!(backend.lookup_count(), 2);
    }

    #[test]
    fn test_set_uniform_through_cache() {
        let mut backend = HeadlessBackend::default();
        let mut program = compile(&mut backend, FRAGMENT).unwrap();
        program.bind(&mut backend).unwrap();

        program
            .set_uniform(&mut backend, "tint", glam::Vec4::ONE)
            .unwrap();
        program.set_uniform(&mut backend, "unused", 1.0f32).unwrap();
        program
            .set_uniform(&mut backend, "tint", glam::Vec4::ZERO)
            .unwrap();
        assert_eq!(backend.lookup_count(), 2);
    }
}
