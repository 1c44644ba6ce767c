//! Procedural linear gradient images

use glam::Vec2;

use crate::backend::ImageData;
use crate::resources::color::Rgb;

/// A color stop at `offset` in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgb,
}

impl GradientStop {
    pub const fn new(offset: f32, color: Rgb) -> Self {
        Self { offset, color }
    }
}

/// Render an opaque linear gradient running from `start` to `end`.
///
/// Each pixel is sampled at its center and projected onto the gradient
/// line; positions before the first stop or after the last take the
/// nearest stop's color. Stops must be sorted by offset.
pub fn linear_gradient(
    width: u32,
    height: u32,
    start: Vec2,
    end: Vec2,
    stops: &[GradientStop],
) -> ImageData {
    let direction = end - start;
    let length_squared = direction.length_squared();
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);

    for y in 0..height {
        for x in 0..width {
            let point = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let t = if length_squared > 0.0 {
                (point - start).dot(direction) / length_squared
            } else {
                0.0
            };
            rgba.extend_from_slice(&sample(stops, t.clamp(0.0, 1.0)));
        }
    }

    ImageData::new(width, height, rgba)
}

fn sample(stops: &[GradientStop], t: f32) -> [u8; 4] {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return [0, 0, 0, 0];
    };
    if t <= first.offset {
        return first.color.to_rgba(255);
    }
    if t >= last.offset {
        return last.color.to_rgba(255);
    }

    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let f = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            let mixed = a.color.to_vec3().lerp(b.color.to_vec3(), f) * 255.0;
            return [
                mixed.x.round() as u8,
                mixed.y.round() as u8,
                mixed.z.round() as u8,
                255,
            ];
        }
    }
    last.color.to_rgba(255)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stops() -> [GradientStop; 2] {
        [
            GradientStop::new(0.0, Rgb::BLACK),
            GradientStop::new(1.0, Rgb::WHITE),
        ]
    }

    #[test]
    fn test_horizontal_gradient() {
        let image = linear_gradient(4, 1, Vec2::ZERO, Vec2::new(4.0, 0.0), &two_stops());
        let reds: Vec<u8> = (0..4).map(|x| image.pixel(x, 0).unwrap()[0]).collect();
        // Centers at 0.5, 1.5, 2.5, 3.5 out of 4
        assert_eq!(reds, vec![32, 96, 159, 223]);
        assert_eq!(image.pixel(0, 0).unwrap()[3], 255);
    }

    #[test]
    fn test_clamps_outside_line() {
        let image = linear_gradient(
            10,
            1,
            Vec2::new(3.0, 0.0),
            Vec2::new(7.0, 0.0),
            &two_stops(),
        );
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(9, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_stop_colors_at_ends() {
        let stops = [
            GradientStop::new(0.0, Rgb::new(0x55, 0xA5, 0xFF)),
            GradientStop::new(0.5, Rgb::new(0xA7, 0x67, 0xFF)),
            GradientStop::new(1.0, Rgb::new(0xF3, 0x89, 0x26)),
        ];
        // Diagonal from bottom-left to top-right
        let image = linear_gradient(100, 100, Vec2::new(0.0, 100.0), Vec2::new(100.0, 0.0), &stops);
        let bottom_left = image.pixel(0, 99).unwrap();
        let top_right = image.pixel(99, 0).unwrap();
        assert!(bottom_left[..3]
            .iter()
            .zip([0x55u8, 0xA5, 0xFF])
            .all(|(a, b)| a.abs_diff(b) <= 2));
        assert!(top_right[..3]
            .iter()
            .zip([0xF3u8, 0x89, 0x26])
            .all(|(a, b)| a.abs_diff(b) <= 2));
    }

    #[test]
    fn test_degenerate_line_uses_first_stop() {
        let image = linear_gradient(2, 2, Vec2::ONE, Vec2::ONE, &two_stops());
        assert!(image.rgba.chunks(4).all(|p| p == [0, 0, 0, 255]));
    }
}
