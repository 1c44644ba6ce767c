//! Translation of wgpu failures into [`BackendError`]
//!
//! wgpu reports validation errors and device loss through callbacks rather
//! than return values. The callbacks record into a [`DeviceErrors`] slot
//! that the frame lifecycle drains.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::traits::BackendError;

/// First device error raised since the slot was last drained
#[derive(Debug, Clone, Default)]
pub(crate) struct DeviceErrors {
    first: Arc<Mutex<Option<BackendError>>>,
}

impl DeviceErrors {
    /// Keep `error` unless an earlier one is still pending
    pub fn record(&self, error: BackendError) {
        let mut first = self.first.lock();
        if first.is_none() {
            *first = Some(error);
        }
    }

    pub fn take(&self) -> Option<BackendError> {
        self.first.lock().take()
    }

    /// `Err` with the pending error, clearing it
    pub fn check(&self) -> Result<(), BackendError> {
        match self.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Route uncaptured errors and device loss into this slot
    pub fn install(&self, device: &wgpu::Device) {
        let errors = self.clone();
        device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
            log::error!("wgpu error: {}", error);
            errors.record(device_error(&error));
        }));

        let errors = self.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("Device lost ({:?}): {}", reason, message);
            errors.record(BackendError::DeviceLost);
        });
    }
}

pub(crate) fn device_error(error: &wgpu::Error) -> BackendError {
    match error {
        wgpu::Error::OutOfMemory { .. } => BackendError::OutOfMemory,
        wgpu::Error::Validation { description, .. } => {
            BackendError::Validation(description.clone())
        }
    }
}

/// Error for a surface that could not be acquired even after reconfiguring
pub(crate) fn surface_error(error: wgpu::SurfaceError) -> BackendError {
    match error {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
        wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
        wgpu::SurfaceError::Timeout => BackendError::AcquireImageFailed(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation(description: &str) -> wgpu::Error {
        wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_first_error_wins() {
        let errors = DeviceErrors::default();
        assert!(errors.check().is_ok());

        let shared = errors.clone();
        shared.record(BackendError::DeviceLost);
        errors.record(BackendError::OutOfMemory);

        assert!(matches!(errors.check(), Err(BackendError::DeviceLost)));
        assert!(errors.check().is_ok());
        assert!(shared.take().is_none());
    }

    #[test]
    fn test_device_error_mapping() {
        match device_error(&validation("bind group layout mismatch")) {
            BackendError::Validation(text) => assert_eq!(text, "bind group layout mismatch"),
            other => panic!("unexpected error: {:?}", other),
        }
        let oom = wgpu::Error::OutOfMemory {
            source: Box::new(std::fmt::Error),
        };
        assert!(matches!(device_error(&oom), BackendError::OutOfMemory));
    }

    #[test]
    fn test_surface_error_mapping() {
        assert!(matches!(
            surface_error(wgpu::SurfaceError::Lost),
            BackendError::SurfaceLost
        ));
        assert!(matches!(
            surface_error(wgpu::SurfaceError::Outdated),
            BackendError::SurfaceLost
        ));
        assert!(matches!(
            surface_error(wgpu::SurfaceError::OutOfMemory),
            BackendError::OutOfMemory
        ));
        assert!(matches!(
            surface_error(wgpu::SurfaceError::Timeout),
            BackendError::AcquireImageFailed(_)
        ));
    }
}
