//! wgpu backend implementation
//!
//! Draws are not encoded immediately. Clears and draws are buffered into
//! pending passes (a clear starts a new pass) together with a snapshot of
//! the bound program's uniforms, and the whole frame is encoded and
//! submitted in [`GpuBackend::end_frame`]. Uniform snapshots go into one
//! per-frame arena that is bound with dynamic offsets.

use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

mod errors;

use errors::{surface_error, DeviceErrors};

use crate::backend::reflect::{
    check_draw, check_image, compile_stage, link, AttributeBinding, CompiledStage, ProgramLayout,
    UniformStore,
};
use crate::backend::traits::*;
use crate::backend::types::*;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const STRAIGHT_ALPHA: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::SrcAlpha,
    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
    operation: wgpu::BlendOperation::Add,
};

/// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA` on color and alpha alike
const ALPHA_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: STRAIGHT_ALPHA,
    alpha: STRAIGHT_ALPHA,
};

/// Texture id of the 1x1 white texture sampled by unbound texture units
const FALLBACK_TEXTURE: u64 = 0;

struct WgpuShader {
    compiled: CompiledStage,
    module: wgpu::ShaderModule,
}

struct WgpuProgram {
    layout: ProgramLayout,
    uniforms: UniformStore,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::RenderPipeline,
}

struct WgpuBuffer {
    buffer: Option<wgpu::Buffer>,
    len: usize,
}

struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Buffered draw call
struct PendingDraw {
    program: u64,
    first: u32,
    count: u32,
    dynamic_offsets: Vec<u32>,
    textures: Vec<u64>,
    vertex_buffers: Vec<u64>,
}

/// Pending render pass with buffered draws
struct PendingRenderPass {
    /// `None` keeps the previous color contents
    clear_color: Option<[f32; 4]>,
    clear_depth: bool,
    draws: Vec<PendingDraw>,
}

struct PendingFrame {
    surface_texture: wgpu::SurfaceTexture,
    passes: Vec<PendingRenderPass>,
    uniform_arena: Vec<u8>,
}

type BindGroupKey = (u64, Vec<u64>);

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    // Resource storage
    shaders: HashMap<u64, WgpuShader>,
    programs: HashMap<u64, WgpuProgram>,
    buffers: HashMap<u64, WgpuBuffer>,
    textures: HashMap<u64, WgpuTexture>,
    bind_groups: HashMap<BindGroupKey, wgpu::BindGroup>,

    // Handle counters
    next_shader_id: u64,
    next_program_id: u64,
    next_buffer_id: u64,
    next_texture_id: u64,

    // GL style bindings
    current_program: Option<ProgramHandle>,
    attribute_bindings: HashMap<u32, AttributeBinding>,
    texture_units: HashMap<u32, u64>,

    uniform_buffer: wgpu::Buffer,
    uniform_alignment: usize,

    frame: Option<PendingFrame>,
    device_errors: DeviceErrors,
}

impl WgpuBackend {
    fn convert_vertex_format(components: u32) -> wgpu::VertexFormat {
        match components {
            1 => wgpu::VertexFormat::Float32,
            2 => wgpu::VertexFormat::Float32x2,
            3 => wgpu::VertexFormat::Float32x3,
            _ => wgpu::VertexFormat::Float32x4,
        }
    }

    /// Clamp to device limits while maintaining aspect ratio
    fn clamp_size(&self, width: u32, height: u32) -> (u32, u32) {
        let max_size = self.device.limits().max_texture_dimension_2d;
        if width > max_size || height > max_size {
            let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
            (
                ((width as f32 * scale) as u32).max(1),
                ((height as f32 * scale) as u32).max(1),
            )
        } else {
            (width.max(1), height.max(1))
        }
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Buffer"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Uniform Arena"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn upload_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &ImageData,
    ) -> WgpuTexture {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        WgpuTexture {
            texture,
            view,
            sampler,
        }
    }
}

impl WgpuBackend {
    /// Create a backend rendering into a canvas through WebGL2
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(canvas: web_sys::HtmlCanvasElement) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            ..Default::default()
        });
        let (width, height) = (canvas.width(), canvas.height());
        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        Self::init(instance, surface, width, height).await
    }

    /// Create a backend rendering into a native window
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn from_window(window: std::sync::Arc<winit::window::Window>) -> BackendResult<Self> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all());

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let size = window.inner_size();
        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        Self::init(instance, surface, size.width, size.height).await
    }

    async fn init(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ornament Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let device_errors = DeviceErrors::default();
        device_errors.install(&device);

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::SurfaceCreationFailed("Surface has no formats".into()))?;
        let alpha_mode = if surface_caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let max_size = device.limits().max_texture_dimension_2d;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.clamp(1, max_size),
            height: height.clamp(1, max_size),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view =
            Self::create_depth_view(&device, surface_config.width, surface_config.height);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        let uniform_buffer = Self::create_uniform_buffer(&device, 4096);

        let mut textures = HashMap::new();
        textures.insert(
            FALLBACK_TEXTURE,
            Self::upload_texture(
                &device,
                &queue,
                &ImageData::solid([255, 255, 255, 255]),
            ),
        );

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            depth_view,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures,
            bind_groups: HashMap::new(),
            next_shader_id: 1,
            next_program_id: 1,
            next_buffer_id: 1,
            next_texture_id: 1,
            current_program: None,
            attribute_bindings: HashMap::new(),
            texture_units: HashMap::new(),
            uniform_buffer,
            uniform_alignment: uniform_alignment.max(1),
            frame: None,
            device_errors,
        })
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = Self::create_depth_view(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
        );
    }

    fn current_pass(&mut self) -> Option<&mut PendingRenderPass> {
        let frame = self.frame.as_mut()?;
        if frame.passes.is_empty() {
            frame.passes.push(PendingRenderPass {
                clear_color: None,
                clear_depth: false,
                draws: Vec::new(),
            });
        }
        frame.passes.last_mut()
    }

    fn create_bind_group(&self, key: &BindGroupKey) -> Option<wgpu::BindGroup> {
        let program = self.programs.get(&key.0)?;
        let mut entries = Vec::new();

        for block in &program.layout.blocks {
            entries.push(wgpu::BindGroupEntry {
                binding: block.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &self.uniform_buffer,
                    offset: 0,
                    size: NonZeroU64::new(block.size as u64),
                }),
            });
        }
        for (info, texture) in program.layout.textures.iter().zip(&key.1) {
            let texture = self
                .textures
                .get(texture)
                .or_else(|| self.textures.get(&FALLBACK_TEXTURE))?;
            entries.push(wgpu::BindGroupEntry {
                binding: info.texture_binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: info.sampler_binding,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    fn encode_frame(&mut self, frame: &PendingFrame) {
        if frame.uniform_arena.len() as u64 > self.uniform_buffer.size() {
            let size = (frame.uniform_arena.len() as u64).next_power_of_two();
            log::debug!("Growing uniform arena to {} bytes", size);
            self.uniform_buffer = Self::create_uniform_buffer(&self.device, size);
            self.bind_groups.clear();
        }
        if !frame.uniform_arena.is_empty() {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &frame.uniform_arena);
        }

        for draw in frame.passes.iter().flat_map(|p| &p.draws) {
            let key = (draw.program, draw.textures.clone());
            if !self.bind_groups.contains_key(&key) {
                if let Some(bind_group) = self.create_bind_group(&key) {
                    self.bind_groups.insert(key, bind_group);
                }
            }
        }

        let view = frame
            .surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for pass in &frame.passes {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ornament Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.clear_color {
                            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: c[0] as f64,
                                g: c[1] as f64,
                                b: c[2] as f64,
                                a: c[3] as f64,
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if pass.clear_depth {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let key = (draw.program, draw.textures.clone());
                let (Some(program), Some(bind_group)) =
                    (self.programs.get(&draw.program), self.bind_groups.get(&key))
                else {
                    log::warn!("Skipping draw of released program {}", draw.program);
                    continue;
                };
                let buffers: Option<Vec<&wgpu::Buffer>> = draw
                    .vertex_buffers
                    .iter()
                    .map(|id| self.buffers.get(id).and_then(|b| b.buffer.as_ref()))
                    .collect();
                let Some(buffers) = buffers else {
                    log::warn!("Skipping draw with released vertex buffers");
                    continue;
                };

                render_pass.set_pipeline(&program.pipeline);
                render_pass.set_bind_group(0, bind_group, &draw.dynamic_offsets);
                for (slot, buffer) in buffers.into_iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> BackendResult<ShaderHandle> {
        let compiled = compile_stage(stage, source).map_err(BackendError::ShaderCompilationFailed)?;
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(compiled.entry_point.as_str()),
                source: wgpu::ShaderSource::Wgsl(compiled.source.as_str().into()),
            });

        let id = self.next_shader_id;
        self.next_shader_id += 1;
        self.shaders.insert(id, WgpuShader { compiled, module });

        Ok(ShaderHandle(id))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(
        &mut self,
        shaders: &[ShaderHandle],
        state: &PipelineState,
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
        let compiled: Vec<&CompiledStage> = stages.iter().map(|s| &s.compiled).collect();
        let layout = link(&compiled).map_err(BackendError::ProgramLinkFailed)?;

        // `link` guarantees exactly one stage of each kind
        let stage = |kind: ShaderStage| stages.iter().find(|s| s.compiled.stage == kind);
        let (Some(vertex), Some(fragment)) = (stage(ShaderStage::Vertex), stage(ShaderStage::Fragment))
        else {
            return Err(BackendError::ProgramLinkFailed("missing stage".into()));
        };

        let mut layout_entries = Vec::new();
        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        for block in &layout.blocks {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(block.size as u64),
                },
                count: None,
            });
        }
        for texture in &layout.textures {
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture.texture_binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: texture.sampler_binding,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        // Layout and pipeline validation failures are link failures
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: None,
                    entries: &layout_entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        // One tightly packed buffer per attribute, in location order
        let vertex_attrs: Vec<[wgpu::VertexAttribute; 1]> = layout
            .attributes
            .iter()
            .map(|a| {
                [wgpu::VertexAttribute {
                    format: Self::convert_vertex_format(a.components),
                    offset: 0,
                    shader_location: a.location,
                }]
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = layout
            .attributes
            .iter()
            .zip(vertex_attrs.iter())
            .map(|(a, attrs)| wgpu::VertexBufferLayout {
                array_stride: a.components as u64 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let color_targets = [Some(wgpu::ColorTargetState {
            format: self.surface_config.format,
            blend: state.alpha_blend.then_some(ALPHA_BLEND),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: None,
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: &vertex.compiled.entry_point,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: &fragment.compiled.entry_point,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: state.cull_back_faces.then_some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: state.depth_test,
                    depth_compare: if state.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
        // The GL backend reports synchronously, so the scope resolves at once
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::warn!("Pipeline rejected: {}", error);
            return Err(BackendError::ProgramLinkFailed(error.to_string()));
        }

        let id = self.next_program_id;
        self.next_program_id += 1;
        let uniforms = UniformStore::new(&layout);
        self.programs.insert(
            id,
            WgpuProgram {
                layout,
                uniforms,
                bind_group_layout,
                pipeline,
            },
        );

        Ok(ProgramHandle(id))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        self.bind_groups.retain(|(p, _), _| *p != program.0);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        if !self.programs.contains_key(&program.0) {
            return Err(BackendError::InvalidHandle {
                kind: "program",
                id: program.0,
            });
        }
        self.current_program = Some(program);
        Ok(())
    }

    fn attribute_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> BackendResult<AttributeLocation> {
        let program = self.programs.get(&program.0).ok_or(BackendError::InvalidHandle {
            kind: "program",
            id: program.0,
        })?;
        Ok(AttributeLocation(
            program.layout.attribute(name).map(|a| a.location),
        ))
    }

    fn uniform_location(
        &self,
        program: ProgramHandle,
        name: &str,
    ) -> BackendResult<UniformLocation> {
        let program = self.programs.get(&program.0).ok_or(BackendError::InvalidHandle {
            kind: "program",
            id: program.0,
        })?;
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
            log::warn!("{:?} does not fit uniform slot {:?}", value, slot);
        }
        Ok(())
    }

    fn create_buffer(&mut self) -> BackendResult<BufferHandle> {
        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, WgpuBuffer { buffer: None, len: 0 });
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

        // wgpu has no usage hints; static and dynamic data live in the same kind of buffer
        log::trace!("Uploading {} bytes ({:?}, {:?})", data.len(), target, usage);
        let usages = match target {
            BufferTarget::Array => wgpu::BufferUsages::VERTEX,
            BufferTarget::ElementArray => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let reusable = entry
            .buffer
            .as_ref()
            .filter(|b| b.size() == data.len() as u64 && b.usage() == usages);
        if let Some(existing) = reusable {
            self.queue.write_buffer(existing, 0, data);
        } else if data.is_empty() {
            entry.buffer = None;
        } else {
            entry.buffer = Some(self.device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: None,
                    contents: data,
                    usage: usages,
                },
            ));
        }
        entry.len = data.len();
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(entry) = self.buffers.remove(&buffer.0) {
            if let Some(buffer) = entry.buffer {
                buffer.destroy();
            }
        }
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
        let max_size = self.device.limits().max_texture_dimension_2d;
        if image.width > max_size || image.height > max_size {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} exceeds the {} pixel limit",
                image.width, image.height, max_size
            )));
        }

        let texture = Self::upload_texture(&self.device, &self.queue, image);
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);

        Ok(TextureHandle(id))
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()> {
        if texture.0 == FALLBACK_TEXTURE || !self.textures.contains_key(&texture.0) {
            return Err(BackendError::InvalidHandle {
                kind: "texture",
                id: texture.0,
            });
        }
        self.texture_units.insert(unit, texture.0);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if texture.0 == FALLBACK_TEXTURE {
            return;
        }
        if let Some(entry) = self.textures.remove(&texture.0) {
            entry.texture.destroy();
        }
        self.texture_units.retain(|_, t| *t != texture.0);
        self.bind_groups
            .retain(|(_, textures), _| !textures.contains(&texture.0));
    }

    fn drawable_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) = self.clamp_size(width, height);
        if (width, height) != self.drawable_size() {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.reconfigure();
        }
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        self.frame = None;
        // Errors raised by uploads since the last frame
        self.device_errors.check()?;

        let surface_texture = match self.surface.get_current_texture() {
            Ok(surface_texture) => surface_texture,
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring surface texture, skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                log::warn!("Surface outdated, reconfiguring");
                self.reconfigure();
                self.surface
                    .get_current_texture()
                    .map_err(surface_error)?
            }
            Err(error) => return Err(surface_error(error)),
        };
        self.frame = Some(PendingFrame {
            surface_texture,
            passes: Vec::new(),
            uniform_arena: Vec::new(),
        });
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) -> BackendResult<()> {
        if let Some(frame) = self.frame.as_mut() {
            frame.passes.push(PendingRenderPass {
                clear_color: flags.contains(ClearFlags::COLOR).then_some(color),
                clear_depth: flags.contains(ClearFlags::DEPTH),
                draws: Vec::new(),
            });
        }
        Ok(())
    }

    fn draw_arrays(&mut self, first: u32, count: u32) -> BackendResult<()> {
        let current = self.current_program.ok_or(BackendError::NoProgramBound)?;
        let program = self
            .programs
            .get(&current.0)
            .ok_or(BackendError::NoProgramBound)?;
        let buffers = &self.buffers;
        let vertex_buffers = check_draw(
            &program.layout,
            &self.attribute_bindings,
            |b| buffers.get(&b.0).map(|b| b.len),
            first,
            count,
        )?;
        if count == 0 || self.frame.is_none() {
            return Ok(());
        }

        let textures: Vec<u64> = program
            .layout
            .textures
            .iter()
            .map(|t| {
                let unit = program.uniforms.texture_unit(t.texture_binding);
                self.texture_units
                    .get(&unit)
                    .copied()
                    .unwrap_or(FALLBACK_TEXTURE)
            })
            .collect();
        let blocks: Vec<Vec<u8>> = program.uniforms.blocks().map(<[u8]>::to_vec).collect();

        let alignment = self.uniform_alignment;
        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        let mut dynamic_offsets = Vec::with_capacity(blocks.len());
        for block in blocks {
            let offset = frame.uniform_arena.len().next_multiple_of(alignment);
            frame.uniform_arena.resize(offset, 0);
            frame.uniform_arena.extend_from_slice(&block);
            dynamic_offsets.push(offset as u32);
        }

        let draw = PendingDraw {
            program: current.0,
            first,
            count,
            dynamic_offsets,
            textures,
            vertex_buffers: vertex_buffers.into_iter().map(|b| b.0).collect(),
        };
        if let Some(pass) = self.current_pass() {
            pass.draws.push(draw);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        let Some(frame) = self.frame.take() else {
            return self.device_errors.check();
        };
        self.encode_frame(&frame);
        frame.surface_texture.present();
        self.device_errors.check()
    }
}
