use glam::{Vec2, Vec3};

use crate::config::WidgetConfig;
use crate::resources::gradient::GradientStop;
use crate::resources::Rgb;
use crate::scene::{Camera, Projection};

/// Near clip plane shared by every variant
pub const NEAR: f32 = 1.0;
/// Far clip plane shared by every variant
pub const FAR: f32 = 200.0;

/// Widget variant
///
/// The numeric ids are the ones page markup uses to select a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Star,
    /// Reserved; there are no coin assets
    Coin,
    GoldenStar,
    Diamond,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 4] = [
        WidgetKind::Star,
        WidgetKind::Coin,
        WidgetKind::GoldenStar,
        WidgetKind::Diamond,
    ];

    pub fn id(self) -> u32 {
        match self {
            WidgetKind::Star => 0,
            WidgetKind::Coin => 1,
            WidgetKind::GoldenStar => 2,
            WidgetKind::Diamond => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WidgetKind::Star => "star",
            WidgetKind::Coin => "coin",
            WidgetKind::GoldenStar => "golden-star",
            WidgetKind::Diamond => "diamond",
        }
    }

    pub fn is_supported(self) -> bool {
        self != WidgetKind::Coin
    }

    pub fn is_star(self) -> bool {
        matches!(self, WidgetKind::Star | WidgetKind::GoldenStar)
    }

    /// Fragment shader path
    pub fn fragment_shader(self, config: &WidgetConfig) -> &str {
        match self {
            WidgetKind::Diamond => &config.diamond_shader,
            _ => &config.star_shader,
        }
    }

    /// Model paths in draw order
    pub fn model_paths(self, config: &WidgetConfig) -> Vec<String> {
        match self {
            WidgetKind::Star | WidgetKind::GoldenStar => vec![config.star_model.clone()],
            WidgetKind::Diamond => config.diamond_models.clone(),
            WidgetKind::Coin => Vec::new(),
        }
    }

    /// Scale applied to model positions
    pub fn model_scale(self) -> f32 {
        match self {
            WidgetKind::Diamond => 8.0,
            _ => 1.0,
        }
    }

    /// Camera for this variant; the diamond is seen from above through a
    /// narrow lens
    pub fn camera(self) -> Camera {
        let (fov, eye) = match self {
            WidgetKind::Diamond => (12.0, Vec3::new(0.0, 40.0, 100.0)),
            _ => (53.13, Vec3::new(0.0, 0.0, 100.0)),
        };
        Camera::new(eye, Vec3::ZERO, Projection::perspective(fov, 1.0, NEAR, FAR))
    }

    /// The two colors of the material gradient
    pub fn gradient_colors(self) -> (Vec3, Vec3) {
        match self {
            // #FEC846 to #EC920A
            WidgetKind::GoldenStar => (
                Vec3::new(0.996, 0.784, 0.274),
                Vec3::new(0.925, 0.572, 0.039),
            ),
            // White to #E3ECFA
            _ => (Vec3::ONE, Vec3::new(0.890, 0.925, 0.980)),
        }
    }

    pub fn is_golden(self) -> bool {
        self == WidgetKind::GoldenStar
    }

    pub fn has_background(self) -> bool {
        self == WidgetKind::Star
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown widget variant name or id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown widget kind `{0}`")]
pub struct UnknownKind(pub String);

impl std::str::FromStr for WidgetKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u32>() {
            return WidgetKind::try_from(id);
        }
        WidgetKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

impl TryFrom<u32> for WidgetKind {
    type Error = UnknownKind;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        WidgetKind::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| UnknownKind(id.to_string()))
    }
}

/// Size of the star's background gradient texture
pub const BACKGROUND_SIZE: u32 = 100;
/// Start and end of the background gradient line, in texture pixels
pub const BACKGROUND_LINE: (Vec2, Vec2) = (Vec2::new(0.0, 100.0), Vec2::new(150.0, 0.0));

/// Stops of the star's background gradient
pub fn background_stops() -> [GradientStop; 4] {
    [
        GradientStop::new(0.0, Rgb::new(0x55, 0xA5, 0xFF)),
        GradientStop::new(0.5, Rgb::new(0xA7, 0x67, 0xFF)),
        GradientStop::new(0.78, Rgb::new(0xDB, 0x5C, 0x9D)),
        GradientStop::new(1.0, Rgb::new(0xF3, 0x89, 0x26)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for kind in WidgetKind::ALL {
            assert_eq!(WidgetKind::try_from(kind.id()), Ok(kind));
            assert_eq!(kind.name().parse::<WidgetKind>(), Ok(kind));
        }
        assert!(WidgetKind::try_from(3).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("4".parse::<WidgetKind>(), Ok(WidgetKind::Diamond));
        assert_eq!(" Golden-Star ".parse::<WidgetKind>(), Ok(WidgetKind::GoldenStar));
        assert_eq!(
            "ruby".parse::<WidgetKind>(),
            Err(UnknownKind("ruby".to_string()))
        );
    }

    #[test]
    fn test_models() {
        let config = WidgetConfig::default();
        assert_eq!(WidgetKind::Diamond.model_paths(&config).len(), 3);
        assert_eq!(
            WidgetKind::GoldenStar.model_paths(&config),
            vec!["models/star.binobj".to_string()]
        );
        assert!(WidgetKind::Coin.model_paths(&config).is_empty());
        assert_eq!(WidgetKind::Diamond.model_scale(), 8.0);
        assert_eq!(WidgetKind::Star.fragment_shader(&config), "shaders/star.wgsl");
    }

    #[test]
    fn test_cameras() {
        let diamond = WidgetKind::Diamond.camera();
        assert_eq!(diamond.position, Vec3::new(0.0, 40.0, 100.0));
        assert!((diamond.projection.fov_y - 12f32.to_radians()).abs() < 1e-6);

        let star = WidgetKind::Star.camera();
        assert_eq!(star.position, Vec3::new(0.0, 0.0, 100.0));
        assert_eq!(star.projection.near, NEAR);
        assert_eq!(star.projection.far, FAR);
    }
}
