//! Common types shared between backends

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    /// Per-vertex attribute data
    Array,
    /// Index data
    ElementArray,
}

/// How often the contents of a buffer are expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times
    #[default]
    StaticDraw,
    /// Rewritten occasionally
    DynamicDraw,
}

/// Which attachments a clear affects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags(u32);

impl ClearFlags {
    pub const COLOR: Self = Self(1 << 0);
    pub const DEPTH: Self = Self(1 << 1);
    pub const ALL: Self = Self((1 << 0) | (1 << 1));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for ClearFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Scalar layout of a uniform value as declared by a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Size in bytes of the value inside a uniform block
    pub fn size(&self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }
}

/// A value assigned to a uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Write the value as tightly packed little-endian std140 bytes
    pub fn write_bytes(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec4(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Mat4(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
        }
    }

    /// Read a value of `kind` back from bytes produced by [`Self::write_bytes`]
    pub fn read_bytes(kind: UniformKind, bytes: &[u8]) -> Option<Self> {
        if bytes.len() < kind.size() {
            return None;
        }
        let floats: Vec<f32> = bytes[..kind.size()]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(match kind {
            UniformKind::Float => UniformValue::Float(floats[0]),
            UniformKind::Int => {
                UniformValue::Int(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            UniformKind::Vec2 => UniformValue::Vec2(Vec2::from_slice(&floats)),
            UniformKind::Vec3 => UniformValue::Vec3(Vec3::from_slice(&floats)),
            UniformKind::Vec4 => UniformValue::Vec4(Vec4::from_slice(&floats)),
            UniformKind::Mat4 => UniformValue::Mat4(Mat4::from_cols_slice(&floats)),
        })
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// Where a named uniform lives inside a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    /// A member of a uniform block
    Block {
        binding: u32,
        offset: u32,
        kind: UniformKind,
    },
    /// A texture and its companion sampler; the value is a texture unit
    Sampler {
        texture_binding: u32,
        sampler_binding: u32,
    },
}

/// Location of a vertex attribute, or [`AttributeLocation::NONE`] when the
/// program does not use the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeLocation(pub(crate) Option<u32>);

impl AttributeLocation {
    pub const NONE: Self = Self(None);

    pub fn index(&self) -> Option<u32> {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Location of a uniform, or [`UniformLocation::NONE`] when the program does
/// not use the name. Assigning through `NONE` is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation(pub(crate) Option<UniformSlot>);

impl UniformLocation {
    pub const NONE: Self = Self(None);

    pub fn slot(&self) -> Option<UniformSlot> {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

/// Fixed-function state baked into a program when it is linked.
///
/// Front faces wind counter-clockwise. The depth test uses `Less` and
/// writes depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA` on every channel
    pub alpha_blend: bool,
    pub depth_test: bool,
    pub cull_back_faces: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            alpha_blend: true,
            depth_test: true,
            cull_back_faces: true,
        }
    }
}

/// Decoded RGBA8 pixels, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba,
        }
    }

    /// A single pixel image
    pub fn solid(color: [u8; 4]) -> Self {
        Self::new(1, 1, color.to_vec())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        let p = self.rgba.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_value_bytes() {
        let m = Mat4::from_rotation_y(0.5);
        let mut bytes = [0u8; 64];
        UniformValue::Mat4(m).write_bytes(&mut bytes);
        assert_eq!(
            UniformValue::read_bytes(UniformKind::Mat4, &bytes),
            Some(UniformValue::Mat4(m))
        );

        let mut bytes = [0u8; 4];
        UniformValue::Int(-7).write_bytes(&mut bytes);
        assert_eq!(
            UniformValue::read_bytes(UniformKind::Int, &bytes),
            Some(UniformValue::Int(-7))
        );
        assert_eq!(UniformValue::read_bytes(UniformKind::Vec4, &bytes), None);
    }

    #[test]
    fn test_clear_flags() {
        assert!(ClearFlags::ALL.contains(ClearFlags::DEPTH));
        assert!((ClearFlags::COLOR | ClearFlags::DEPTH).contains(ClearFlags::ALL));
        assert!(!ClearFlags::DEPTH.contains(ClearFlags::COLOR));
    }

    #[test]
    fn test_image_pixel() {
        let image = ImageData::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(image.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(image.pixel(2, 0), None);
    }
}
