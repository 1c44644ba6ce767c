//! WGSL front end shared by the backends.
//!
//! Stages are parsed and validated with naga, then linked by matching the
//! vertex outputs against the fragment inputs and merging the resource
//! declarations of both stages. The resulting [`ProgramLayout`] is what the
//! name lookups, uniform staging and pipeline creation work from.

use std::collections::HashMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{
    AddressSpace, Binding, Handle, ImageClass, ImageDimension, Module, Scalar, ScalarKind, Type,
    TypeInner, VectorSize,
};

use crate::backend::traits::{BackendError, BackendResult, BufferHandle};
use crate::backend::types::{ImageData, ShaderStage, UniformKind, UniformSlot, UniformValue};

/// Suffix naming the sampler that accompanies a texture
pub const SAMPLER_SUFFIX: &str = "_sampler";

/// A parsed and validated shader stage
pub(crate) struct CompiledStage {
    pub stage: ShaderStage,
    pub source: String,
    pub entry_point: String,
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    resources: Vec<(u32, Resource)>,
}

#[derive(Debug, Clone)]
struct Varying {
    name: String,
    location: u32,
    inner: TypeInner,
}

#[derive(Debug, Clone, PartialEq)]
enum Resource {
    Block {
        name: String,
        size: u32,
        members: Vec<(String, u32, UniformKind)>,
    },
    Texture {
        name: String,
    },
    Sampler {
        name: String,
    },
}

/// A vertex attribute consumed by a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub components: u32,
}

/// A uniform block and the size of its backing storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockInfo {
    pub binding: u32,
    pub size: u32,
}

/// A texture/sampler pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextureInfo {
    pub name: String,
    pub texture_binding: u32,
    pub sampler_binding: u32,
}

/// Everything the backends need to know about a linked program
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgramLayout {
    pub attributes: Vec<AttributeInfo>,
    pub uniforms: HashMap<String, UniformSlot>,
    pub blocks: Vec<BlockInfo>,
    pub textures: Vec<TextureInfo>,
}

impl ProgramLayout {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Parse and validate a single stage.
///
/// The error string is naga's rendered diagnostic.
pub(crate) fn compile_stage(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let mut candidates = module.entry_points.iter().filter(|ep| ep.stage == wanted);
    let entry = candidates
        .next()
        .ok_or_else(|| format!("no @{} entry point", stage))?;
    if candidates.next().is_some() {
        log::debug!("multiple @{} entry points, using `{}`", stage, entry.name);
    }

    let mut inputs = Vec::new();
    for arg in &entry.function.arguments {
        collect_varyings(
            &module,
            arg.name.as_deref(),
            arg.ty,
            arg.binding.as_ref(),
            &mut inputs,
        );
    }

    let mut outputs = Vec::new();
    if let Some(result) = &entry.function.result {
        collect_varyings(&module, None, result.ty, result.binding.as_ref(), &mut outputs);
    }

    Ok(CompiledStage {
        stage,
        source: source.to_string(),
        entry_point: entry.name.clone(),
        inputs,
        outputs,
        resources: collect_resources(&module)?,
    })
}

fn collect_varyings(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Varying {
            name: name.unwrap_or_default().to_string(),
            location: *location,
            inner: module.types[ty].inner.clone(),
        }),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_varyings(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(s) if s == Scalar::F32 => Some(UniformKind::Float),
        TypeInner::Scalar(s) if s == Scalar::I32 => Some(UniformKind::Int),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        }),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn attribute_components(inner: &TypeInner) -> Option<u32> {
    match *inner {
        TypeInner::Scalar(s) if s == Scalar::F32 => Some(1),
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(size as u32),
        _ => None,
    }
}

fn collect_resources(module: &Module) -> Result<Vec<(u32, Resource)>, String> {
    let mut resources = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        if binding.group != 0 {
            return Err(format!(
                "`{}` uses bind group {}, only group 0 is supported",
                name, binding.group
            ));
        }

        let inner = &module.types[var.ty].inner;
        let resource = match var.space {
            AddressSpace::Uniform => match inner {
                TypeInner::Struct { members, span } => {
                    let mut fields = Vec::with_capacity(members.len());
                    for member in members {
                        let member_name = member.name.clone().unwrap_or_default();
                        let kind = uniform_kind(&module.types[member.ty].inner).ok_or_else(|| {
                            format!("uniform member `{}.{}` has an unsupported type", name, member_name)
                        })?;
                        fields.push((member_name, member.offset, kind));
                    }
                    Resource::Block {
                        name,
                        size: *span,
                        members: fields,
                    }
                }
                other => {
                    let kind = uniform_kind(other)
                        .ok_or_else(|| format!("uniform `{}` has an unsupported type", name))?;
                    let size = (kind.size() as u32).next_multiple_of(16);
                    Resource::Block {
                        name: name.clone(),
                        size,
                        members: vec![(name, 0, kind)],
                    }
                }
            },
            AddressSpace::Handle => match inner {
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class:
                        ImageClass::Sampled {
                            kind: ScalarKind::Float,
                            multi: false,
                        },
                } => Resource::Texture { name },
                TypeInner::Sampler { comparison: false } => Resource::Sampler { name },
                _ => return Err(format!("`{}` is not a texture_2d<f32> or sampler", name)),
            },
            other => {
                return Err(format!(
                    "`{}` lives in unsupported address space {:?}",
                    name, other
                ))
            }
        };
        resources.push((binding.binding, resource));
    }

    Ok(resources)
}

/// Link a vertex and a fragment stage.
pub(crate) fn link(stages: &[&CompiledStage]) -> Result<ProgramLayout, String> {
    let mut vertex = None;
    let mut fragment = None;
    for stage in stages {
        let slot = match stage.stage {
            ShaderStage::Vertex => &mut vertex,
            ShaderStage::Fragment => &mut fragment,
        };
        if slot.replace(*stage).is_some() {
            return Err(format!("more than one {} stage attached", stage.stage));
        }
    }
    let vertex = vertex.ok_or("no vertex stage attached")?;
    let fragment = fragment.ok_or("no fragment stage attached")?;

    for input in &fragment.inputs {
        let output = vertex
            .outputs
            .iter()
            .find(|o| o.location == input.location)
            .ok_or_else(|| {
                format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )
            })?;
        if output.inner != input.inner {
            return Err(format!(
                "fragment input `{}` at location {} does not match the vertex output type",
                input.name, input.location
            ));
        }
    }

    let mut attributes = Vec::with_capacity(vertex.inputs.len());
    for input in &vertex.inputs {
        let components = attribute_components(&input.inner).ok_or_else(|| {
            format!("attribute `{}` must be an f32 scalar or vector", input.name)
        })?;
        attributes.push(AttributeInfo {
            name: input.name.clone(),
            location: input.location,
            components,
        });
    }
    attributes.sort_by_key(|a| a.location);

    let mut merged: Vec<(u32, &Resource)> = Vec::new();
    for (binding, resource) in vertex.resources.iter().chain(fragment.resources.iter()) {
        match merged.iter().find(|(b, _)| b == binding) {
            Some((_, existing)) if *existing != resource => {
                return Err(format!(
                    "binding {} is declared differently by the vertex and fragment stages",
                    binding
                ));
            }
            Some(_) => {}
            None => merged.push((*binding, resource)),
        }
    }
    merged.sort_by_key(|(b, _)| *b);

    let mut layout = ProgramLayout {
        attributes,
        ..Default::default()
    };

    for (binding, resource) in &merged {
        match resource {
            Resource::Block { size, members, .. } => {
                layout.blocks.push(BlockInfo {
                    binding: *binding,
                    size: *size,
                });
                for (name, offset, kind) in members {
                    let slot = UniformSlot::Block {
                        binding: *binding,
                        offset: *offset,
                        kind: *kind,
                    };
                    if layout.uniforms.insert(name.clone(), slot).is_some() {
                        return Err(format!("uniform `{}` is declared twice", name));
                    }
                }
            }
            Resource::Texture { name } => {
                let sampler_name = format!("{}{}", name, SAMPLER_SUFFIX);
                let sampler_binding = merged
                    .iter()
                    .find_map(|(b, r)| match r {
                        Resource::Sampler { name } if *name == sampler_name => Some(*b),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        format!("texture `{}` has no sampler named `{}`", name, sampler_name)
                    })?;
                let slot = UniformSlot::Sampler {
                    texture_binding: *binding,
                    sampler_binding,
                };
                if layout.uniforms.insert(name.clone(), slot).is_some() {
                    return Err(format!("uniform `{}` is declared twice", name));
                }
                layout.textures.push(TextureInfo {
                    name: name.clone(),
                    texture_binding: *binding,
                    sampler_binding,
                });
            }
            Resource::Sampler { name } => {
                let paired = name
                    .strip_suffix(SAMPLER_SUFFIX)
                    .is_some_and(|texture| {
                        merged.iter().any(|(_, r)| {
                            matches!(r, Resource::Texture { name } if name == texture)
                        })
                    });
                if !paired {
                    log::warn!("sampler `{}` is not paired with any texture", name);
                }
            }
        }
    }

    Ok(layout)
}

/// CPU side uniform values of one program
#[derive(Debug, Clone)]
pub(crate) struct UniformStore {
    blocks: Vec<(u32, Vec<u8>)>,
    texture_units: HashMap<u32, u32>,
}

impl UniformStore {
    pub fn new(layout: &ProgramLayout) -> Self {
        Self {
            blocks: layout
                .blocks
                .iter()
                .map(|b| (b.binding, vec![0; b.size as usize]))
                .collect(),
            texture_units: HashMap::new(),
        }
    }

    /// Store a value; returns false when the value does not fit the slot
    pub fn write(&mut self, slot: &UniformSlot, value: UniformValue) -> bool {
        match (*slot, value) {
            (UniformSlot::Sampler { texture_binding, .. }, UniformValue::Int(unit)) => {
                match u32::try_from(unit) {
                    Ok(unit) => {
                        self.texture_units.insert(texture_binding, unit);
                        true
                    }
                    Err(_) => false,
                }
            }
            (UniformSlot::Block { binding, offset, kind }, value) if value.kind() == kind => {
                let Some((_, bytes)) = self.blocks.iter_mut().find(|(b, _)| *b == binding) else {
                    return false;
                };
                let start = offset as usize;
                match bytes.get_mut(start..start + kind.size()) {
                    Some(dst) => {
                        value.write_bytes(dst);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    pub fn read(&self, slot: &UniformSlot) -> Option<UniformValue> {
        match *slot {
            UniformSlot::Sampler { texture_binding, .. } => {
                Some(UniformValue::Int(self.texture_unit(texture_binding) as i32))
            }
            UniformSlot::Block { binding, offset, kind } => {
                let (_, bytes) = self.blocks.iter().find(|(b, _)| *b == binding)?;
                UniformValue::read_bytes(kind, bytes.get(offset as usize..)?)
            }
        }
    }

    /// Block contents in binding order
    pub fn blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks.iter().map(|(_, bytes)| bytes.as_slice())
    }

    /// Texture unit sampled through a texture binding; unit 0 until assigned
    pub fn texture_unit(&self, texture_binding: u32) -> u32 {
        self.texture_units.get(&texture_binding).copied().unwrap_or(0)
    }
}

/// Buffer currently sourcing an attribute location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttributeBinding {
    pub buffer: BufferHandle,
    pub components: u32,
}

/// Check that every attribute of `layout` is sourced by a buffer that holds
/// at least `first + count` vertices. Returns the buffers in attribute order.
pub(crate) fn check_draw(
    layout: &ProgramLayout,
    bindings: &HashMap<u32, AttributeBinding>,
    buffer_len: impl Fn(BufferHandle) -> Option<usize>,
    first: u32,
    count: u32,
) -> BackendResult<Vec<BufferHandle>> {
    let end = first.saturating_add(count);
    let mut buffers = Vec::with_capacity(layout.attributes.len());

    for attribute in &layout.attributes {
        let binding = bindings
            .get(&attribute.location)
            .ok_or_else(|| BackendError::MissingAttribute {
                name: attribute.name.clone(),
            })?;
        if binding.components != attribute.components {
            return Err(BackendError::AttributeFormatMismatch {
                name: attribute.name.clone(),
                expected: attribute.components,
                actual: binding.components,
            });
        }
        let bytes = buffer_len(binding.buffer).ok_or(BackendError::InvalidHandle {
            kind: "buffer",
            id: binding.buffer.0,
        })?;
        let available = (bytes / (4 * binding.components as usize)) as u32;
        if end > available {
            return Err(BackendError::DrawOutOfRange {
                name: attribute.name.clone(),
                first,
                end,
                available,
            });
        }
        buffers.push(binding.buffer);
    }

    Ok(buffers)
}

/// Check that an image holds exactly `width * height` RGBA8 pixels
pub(crate) fn check_image(image: &ImageData) -> BackendResult<()> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
        return Err(BackendError::TextureCreationFailed(format!(
            "{}x{} image needs {} bytes, got {}",
            image.width,
            image.height,
            expected,
            image.rgba.len()
        )));
    }
    Ok(())
}
