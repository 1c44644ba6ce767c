//! sRGB colors parsed from hex notation

use glam::Vec3;

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse exactly six hex digits, with or without a leading `#`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Channels normalized to `0.0..=1.0`
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    /// RGBA bytes with the given alpha
    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Rgb::from_hex("#55A5FF"), Some(Rgb::new(0x55, 0xA5, 0xFF)));
        assert_eq!(Rgb::from_hex("db5c9d"), Some(Rgb::new(0xDB, 0x5C, 0x9D)));
        assert_eq!(Rgb::from_hex("#FFF"), None);
        assert_eq!(Rgb::from_hex("#GGGGGG"), None);
        assert_eq!(Rgb::from_hex("#+1+1+1"), None);
    }

    #[test]
    fn test_display_round_trip() {
        let color = Rgb::new(0xF3, 0x89, 0x26);
        assert_eq!(color.to_string(), "#F38926");
        assert_eq!(Rgb::from_hex(&color.to_string()), Some(color));
    }

    #[test]
    fn test_to_vec3() {
        assert_eq!(Rgb::WHITE.to_vec3(), Vec3::ONE);
        assert_eq!(Rgb::BLACK.to_vec3(), Vec3::ZERO);
    }
}
