//! Shader source preprocessing
//!
//! Shader files may spell color constants as `RGB#RRGGBB`. Before the text
//! is compiled every such token is replaced with a `vec3(r, g, b)` literal
//! whose channels are normalized to three decimal places.

use crate::resources::color::Rgb;

const MARKER: &str = "RGB#";
const HEX_DIGITS: usize = 6;

/// Replace every `RGB#RRGGBB` token with a `vec3` literal.
///
/// Text without a complete token is returned unchanged.
pub fn preprocess_shader(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find(MARKER) {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);

        let digits_start = MARKER.len();
        let color = tail
            .get(digits_start..digits_start + HEX_DIGITS)
            .and_then(Rgb::from_hex);

        match color {
            Some(color) => {
                out.push_str(&vec3_literal(color));
                rest = &tail[digits_start + HEX_DIGITS..];
            }
            None => {
                out.push_str(MARKER);
                rest = &tail[digits_start..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn vec3_literal(color: Rgb) -> String {
    let c = color.to_vec3();
    format!("vec3({:.3}, {:.3}, {:.3})", c.x, c.y, c.z)
}
