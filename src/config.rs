//! Widget configuration

use crate::animation::Easing;

/// Configuration shared by every widget a host creates
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Vertex shader used by every widget
    pub vertex_shader: String,
    /// Fragment shader for the star variants
    pub star_shader: String,
    /// Fragment shader for the diamond
    pub diamond_shader: String,
    /// Mesh used by both star variants
    pub star_model: String,
    /// Diamond shells, drawn outermost first
    pub diamond_models: Vec<String>,
    /// Color texture of the star variants
    pub star_texture: String,
    /// Normal map of the star variants
    pub normal_map: String,
    /// Seconds the hover factor takes to ease in or out
    pub hover_duration: f64,
    pub hover_easing: Easing,
    /// Clear color (premultiplied RGBA)
    pub clear_color: [f32; 4],
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            vertex_shader: "shaders/vertex.wgsl".to_string(),
            star_shader: "shaders/star.wgsl".to_string(),
            diamond_shader: "shaders/diamond.wgsl".to_string(),
            star_model: "models/star.binobj".to_string(),
            diamond_models: vec![
                "models/diamond_outer_2.binobj".to_string(),
                "models/diamond_outer.binobj".to_string(),
                "models/diamond.binobj".to_string(),
            ],
            star_texture: "models/star_texture.png".to_string(),
            normal_map: "models/flecks.png".to_string(),
            hover_duration: 0.32,
            hover_easing: Easing::EaseOutQuint,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl WidgetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertex_shader(mut self, path: impl Into<String>) -> Self {
        self.vertex_shader = path.into();
        self
    }

    pub fn with_star_shader(mut self, path: impl Into<String>) -> Self {
        self.star_shader = path.into();
        self
    }

    pub fn with_diamond_shader(mut self, path: impl Into<String>) -> Self {
        self.diamond_shader = path.into();
        self
    }

    pub fn with_star_model(mut self, path: impl Into<String>) -> Self {
        self.star_model = path.into();
        self
    }

    pub fn with_diamond_models<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diamond_models = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_star_texture(mut self, path: impl Into<String>) -> Self {
        self.star_texture = path.into();
        self
    }

    pub fn with_normal_map(mut self, path: impl Into<String>) -> Self {
        self.normal_map = path.into();
        self
    }

    pub fn with_hover(mut self, duration: f64, easing: Easing) -> Self {
        self.hover_duration = duration;
        self.hover_easing = easing;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }
}
