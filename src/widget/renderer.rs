//! Draw order and per-draw uniforms

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::backend::{BackendResult, ClearFlags, GpuBackend};
use crate::resources::ShaderProgram;
use crate::widget::kind::WidgetKind;

/// Texture unit names and the units they sample
pub const TEXTURE_UNIT: (&str, u32) = ("u_texture", 0);
pub const NORMAL_MAP_UNIT: (&str, u32) = ("u_normal_map", 1);
pub const BACKGROUND_UNIT: (&str, u32) = ("u_background", 2);

/// One step of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStep {
    Clear(ClearFlags),
    Draw { model: usize, behind: bool },
}

/// Steps of one frame for `model_count` models.
///
/// The diamond first draws every shell but the innermost with `behind` set,
/// clearing depth after each so the next shell shows through. It then draws
/// all models innermost first with `behind` cleared. Other variants draw
/// each model once in order.
pub fn draw_order(kind: WidgetKind, model_count: usize) -> Vec<DrawStep> {
    let mut steps = vec![DrawStep::Clear(ClearFlags::ALL)];

    if kind == WidgetKind::Diamond {
        for model in 0..model_count.saturating_sub(1) {
            steps.push(DrawStep::Draw {
                model,
                behind: true,
            });
            steps.push(DrawStep::Clear(ClearFlags::DEPTH));
        }
        for model in (0..model_count).rev() {
            steps.push(DrawStep::Draw {
                model,
                behind: false,
            });
        }
    } else {
        for model in 0..model_count {
            steps.push(DrawStep::Draw {
                model,
                behind: false,
            });
        }
    }

    steps
}

/// Material constants of a variant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub spec1: f32,
    pub spec2: f32,
    pub white: f32,
    pub golden: f32,
    pub diffuse: f32,
    pub normal_spec: f32,
    pub gradient_color1: Vec3,
    pub gradient_color2: Vec3,
    pub normal_spec_color: Vec3,
    pub spec_color: Vec3,
    pub gradient_position: Vec4,
    pub alpha: f32,
    pub night: i32,
}

impl Material {
    pub fn for_kind(kind: WidgetKind) -> Self {
        let (gradient_color1, gradient_color2) = kind.gradient_colors();
        Self {
            spec1: 2.0,
            spec2: 0.13,
            white: 0.0,
            golden: if kind.is_golden() { 1.0 } else { 0.0 },
            diffuse: 1.0,
            normal_spec: 0.2,
            gradient_color1,
            gradient_color2,
            normal_spec_color: Vec3::ONE,
            spec_color: Vec3::ONE,
            gradient_position: Vec4::new(0.0, 0.0, 1.0, 1.0),
            alpha: 1.0,
            night: 1,
        }
    }
}

/// Values that change every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub mvp: Mat4,
    pub world: Mat4,
    pub resolution: Vec2,
    pub time: f32,
}

/// Assign the per-frame matrices. The program must be bound.
pub fn set_frame_uniforms<B: GpuBackend>(
    backend: &mut B,
    program: &mut ShaderProgram,
    frame: &FrameUniforms,
) -> BackendResult<()> {
    program.set_uniform(backend, "mvp", frame.mvp)?;
    program.set_uniform(backend, "world", frame.world)?;
    Ok(())
}

/// Assign every uniform of one draw. The program must be bound.
pub fn set_draw_uniforms<B: GpuBackend>(
    backend: &mut B,
    program: &mut ShaderProgram,
    material: &Material,
    frame: &FrameUniforms,
    model_index: usize,
    behind: bool,
) -> BackendResult<()> {
    program.set_uniform(backend, "behind", if behind { 1.0f32 } else { 0.0 })?;
    program.set_uniform(backend, "spec1", material.spec1)?;
    program.set_uniform(backend, "spec2", material.spec2)?;
    program.set_uniform(backend, "white", material.white)?;
    program.set_uniform(backend, "golden", material.golden)?;
    program.set_uniform(backend, "diffuse", material.diffuse)?;
    program.set_uniform(backend, "normal_spec", material.normal_spec)?;
    program.set_uniform(backend, "gradient_color1", material.gradient_color1)?;
    program.set_uniform(backend, "gradient_color2", material.gradient_color2)?;
    program.set_uniform(backend, "normal_spec_color", material.normal_spec_color)?;
    program.set_uniform(backend, "spec_color", material.spec_color)?;
    program.set_uniform(backend, "resolution", frame.resolution)?;
    program.set_uniform(backend, "gradient_position", material.gradient_position)?;
    program.set_uniform(backend, "alpha", material.alpha)?;
    program.set_uniform(backend, "time", frame.time)?;
    program.set_uniform(backend, "night", material.night)?;
    program.set_uniform(backend, "model_index", model_index as i32)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draws(steps: &[DrawStep]) -> Vec<(usize, bool)> {
        steps
            .iter()
            .filter_map(|step| match *step {
                DrawStep::Draw { model, behind } => Some((model, behind)),
                DrawStep::Clear(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_diamond_order() {
        let steps = draw_order(WidgetKind::Diamond, 3);
        assert_eq!(
            steps,
            vec![
                DrawStep::Clear(ClearFlags::ALL),
                DrawStep::Draw {
                    model: 0,
                    behind: true
                },
                DrawStep::Clear(ClearFlags::DEPTH),
                DrawStep::Draw {
                    model: 1,
                    behind: true
                },
                DrawStep::Clear(ClearFlags::DEPTH),
                DrawStep::Draw {
                    model: 2,
                    behind: false
                },
                DrawStep::Draw {
                    model: 1,
                    behind: false
                },
                DrawStep::Draw {
                    model: 0,
                    behind: false
                },
            ]
        );
    }

    #[test]
    fn test_single_model_order() {
        for kind in [WidgetKind::Star, WidgetKind::GoldenStar] {
            let steps = draw_order(kind, 1);
            assert_eq!(steps[0], DrawStep::Clear(ClearFlags::ALL));
            assert_eq!(draws(&steps), vec![(0, false)]);
        }
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            draw_order(WidgetKind::Diamond, 0),
            vec![DrawStep::Clear(ClearFlags::ALL)]
        );
    }

    #[test]
    fn test_materials() {
        let golden = Material::for_kind(WidgetKind::GoldenStar);
        assert_eq!(golden.golden, 1.0);
        assert_eq!(golden.gradient_color1, Vec3::new(0.996, 0.784, 0.274));

        let star = Material::for_kind(WidgetKind::Star);
        assert_eq!(star.golden, 0.0);
        assert_eq!(star.gradient_color1, Vec3::ONE);
        assert_eq!(star.spec1, 2.0);
        assert_eq!(star.night, 1);
    }
}
