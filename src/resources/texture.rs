//! Texture loading and management

use image::GenericImageView;
use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Error decoding an encoded image
#[derive(Error, Debug)]
#[error("Failed to decode image: {0}")]
pub struct ImageDecodeError(#[from] image::ImageError);

/// Decode PNG/JPEG/... bytes into RGBA8 pixels
pub fn decode_image(bytes: &[u8]) -> Result<ImageData, ImageDecodeError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    let rgba = img.to_rgba8().into_raw();
    Ok(ImageData::new(width, height, rgba))
}

/// A GPU texture sampled with linear filtering and clamp-to-edge wrapping
#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    width: u32,
    height: u32,
}

impl Texture {
    /// Upload an image right away
    pub fn from_image<B: GpuBackend>(backend: &mut B, image: &ImageData) -> BackendResult<Self> {
        let handle = backend.create_texture(image)?;
        log::debug!(
            "Created {}x{} texture {:?}",
            image.width,
            image.height,
            handle
        );
        Ok(Self {
            handle,
            width: image.width,
            height: image.height,
        })
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bind to a texture unit
    pub fn bind<B: GpuBackend>(&self, backend: &mut B, unit: u32) -> BackendResult<()> {
        backend.bind_texture(unit, self.handle)
    }

    /// Release the GPU texture
    pub fn destroy<B: GpuBackend>(self, backend: &mut B) {
        backend.destroy_texture(self.handle);
    }
}
