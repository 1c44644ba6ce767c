//! Widgets: one animated model set rendered into one surface
//!
//! A [`WidgetFactory`] runs the ordered setup sequence (shaders, program,
//! models, textures) against an [`AssetSource`] and returns a [`Widget`].
//! The host then calls [`Widget::render_frame`] once per display refresh
//! and forwards pointer input through [`Widget::pointer_moved`] and
//! [`Widget::set_hovered`].

pub mod assets;
mod kind;
pub mod renderer;
mod state;

pub use assets::{AssetError, AssetSource, FsAssetSource, MemoryAssetSource};
pub use kind::*;
pub use renderer::{draw_order, DrawStep, Material};
pub use state::RenderState;

use glam::Vec2;
use thiserror::Error;

use crate::animation::{Animated, Clock, SystemClock};
use crate::backend::{BackendError, BackendResult, GpuBackend, PipelineState, ShaderStage};
use crate::config::WidgetConfig;
use crate::resources::{
    linear_gradient, mesh_file, preprocess_shader, DecodeError, Model, ShaderCompileError,
    ShaderProgram, Texture,
};
use crate::scene::{tilt_degrees, Camera, Transform};
use renderer::{
    set_draw_uniforms, set_frame_uniforms, FrameUniforms, BACKGROUND_UNIT, NORMAL_MAP_UNIT,
    TEXTURE_UNIT,
};

/// Error setting up a widget
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Widget kind `{0}` has no assets")]
    UnsupportedKind(WidgetKind),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("Failed to decode model `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Shader(#[from] ShaderCompileError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Builds widgets from a shared configuration
#[derive(Debug, Clone, Default)]
pub struct WidgetFactory {
    config: WidgetConfig,
}

impl WidgetFactory {
    pub fn new(config: WidgetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Set up a widget animated by the host's wall clock
    pub async fn create<B, A>(
        &self,
        backend: B,
        kind: WidgetKind,
        assets: &A,
    ) -> Result<Widget<B, SystemClock>, WidgetError>
    where
        B: GpuBackend,
        A: AssetSource,
    {
        self.create_with_clock(backend, kind, assets, SystemClock::new())
            .await
    }

    /// Set up a widget.
    ///
    /// Steps run strictly in order: load shaders, compile the program, load
    /// and upload models, load textures. When a step fails the backend is
    /// dropped together with everything created on it.
    pub async fn create_with_clock<B, A, C>(
        &self,
        mut backend: B,
        kind: WidgetKind,
        assets: &A,
        clock: C,
    ) -> Result<Widget<B, C>, WidgetError>
    where
        B: GpuBackend,
        A: AssetSource,
        C: Clock + Clone,
    {
        if !kind.is_supported() {
            return Err(WidgetError::UnsupportedKind(kind));
        }
        let config = &self.config;
        log::info!("Setting up {} widget on {}", kind, backend.name());

        let vertex = assets.load_text(&config.vertex_shader).await?;
        let fragment = preprocess_shader(&assets.load_text(kind.fragment_shader(config)).await?);
        let mut program = ShaderProgram::compile(
            &mut backend,
            &[
                (ShaderStage::Vertex, vertex.as_str()),
                (ShaderStage::Fragment, fragment.as_str()),
            ],
            &PipelineState::default(),
        )?;
        program.bind(&mut backend)?;

        let mut models = Vec::new();
        for path in kind.model_paths(config) {
            let bytes = assets.load_bytes(&path).await?;
            let mesh = mesh_file::decode(&bytes).map_err(|source| WidgetError::Decode {
                path: path.clone(),
                source,
            })?;
            let mut model = Model::from_mesh(&mesh, kind.model_scale());
            model.upload(&mut backend)?;
            log::debug!("Loaded model {} ({} vertices)", path, model.vertex_count());
            models.push(model);
        }

        let mut textures = Vec::new();
        if kind.is_star() {
            let image = assets.load_image(&config.star_texture).await?;
            textures.push((TEXTURE_UNIT, Texture::from_image(&mut backend, &image)?));

            let image = assets.load_image(&config.normal_map).await?;
            textures.push((NORMAL_MAP_UNIT, Texture::from_image(&mut backend, &image)?));
        }
        if kind.has_background() {
            let (start, end) = BACKGROUND_LINE;
            let image = linear_gradient(
                BACKGROUND_SIZE,
                BACKGROUND_SIZE,
                start,
                end,
                &background_stops(),
            );
            textures.push((BACKGROUND_UNIT, Texture::from_image(&mut backend, &image)?));
        }
        for ((name, unit), texture) in &textures {
            texture.bind(&mut backend, *unit)?;
            program.set_uniform(&mut backend, name, *unit as i32)?;
        }

        let hover = Animated::new(config.hover_duration, config.hover_easing, clock.clone());
        let steps = draw_order(kind, models.len());
        log::info!(
            "{} widget ready: {} models, {} textures",
            kind,
            models.len(),
            textures.len()
        );

        Ok(Widget {
            kind,
            backend,
            program,
            models,
            textures: textures.into_iter().map(|(_, texture)| texture).collect(),
            camera: kind.camera(),
            material: Material::for_kind(kind),
            hover,
            state: RenderState::new(clock.now()),
            clock,
            steps,
            clear_color: config.clear_color,
        })
    }
}

/// A set-up widget
///
/// Owns its backend and every GPU object created on it. Nothing is shared
/// between widgets.
pub struct Widget<B: GpuBackend, C: Clock> {
    kind: WidgetKind,
    backend: B,
    program: ShaderProgram,
    models: Vec<Model>,
    textures: Vec<Texture>,
    camera: Camera,
    material: Material,
    hover: Animated<C>,
    clock: C,
    state: RenderState,
    steps: Vec<DrawStep>,
    clear_color: [f32; 4],
}

impl<B: GpuBackend, C: Clock> Widget<B, C> {
    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Current eased hover factor in `[0, 1]`
    pub fn hover_factor(&self) -> f64 {
        self.hover.get()
    }

    /// Record the pointer and the widget center, both in page pixels
    pub fn pointer_moved(&mut self, pointer: Vec2, center: Vec2) {
        self.state.pointer = pointer;
        self.state.center = center;
    }

    pub fn set_hovered(&mut self, hovered: bool) {
        self.state.hovered = hovered;
    }

    /// Current model transform: pointer tilt, then spin
    pub fn transform(&mut self) -> Transform {
        let hover = self.hover.set_flag(self.state.hovered) as f32;
        let tilt = tilt_degrees(hover, self.state.pointer, self.state.center);
        Transform::new(tilt, self.state.time as f32)
    }

    /// Render one frame into a drawable of `viewport` pixels.
    ///
    /// Any backend error is returned as is; the widget should not be
    /// rendered again after a failure.
    pub fn render_frame(&mut self, viewport: (u32, u32)) -> BackendResult<()> {
        let (width, height) = (viewport.0.max(1), viewport.1.max(1));
        if self.backend.drawable_size() != (width, height) {
            self.backend.resize(width, height);
        }
        let (width, height) = self.backend.drawable_size();
        self.state.viewport = (width, height);
        self.state.advance(self.clock.now());

        let world = self.transform().matrix();
        self.camera.set_viewport(width as f32, height as f32);
        let frame = FrameUniforms {
            mvp: self.camera.view_projection_matrix() * world,
            world,
            resolution: Vec2::new(width as f32, height as f32),
            time: self.state.time as f32,
        };

        self.backend.begin_frame()?;
        self.program.bind(&mut self.backend)?;
        set_frame_uniforms(&mut self.backend, &mut self.program, &frame)?;

        for step in &self.steps {
            match *step {
                DrawStep::Clear(flags) => self.backend.clear(flags, self.clear_color)?,
                DrawStep::Draw { model, behind } => {
                    let Some(mesh) = self.models.get(model) else {
                        continue;
                    };
                    mesh.bind(&mut self.backend, &mut self.program)?;
                    set_draw_uniforms(
                        &mut self.backend,
                        &mut self.program,
                        &self.material,
                        &frame,
                        model,
                        behind,
                    )?;
                    mesh.draw(&mut self.backend)?;
                }
            }
        }

        self.backend.end_frame()
    }

    /// Release every GPU object and hand the backend back
    pub fn destroy(self) -> B {
        let Widget {
            mut backend,
            program,
            models,
            textures,
            kind,
            ..
        } = self;
        for model in models {
            model.destroy(&mut backend);
        }
        for texture in textures {
            texture.destroy(&mut backend);
        }
        program.destroy(&mut backend);
        log::info!("Destroyed {} widget", kind);
        backend
    }
}
