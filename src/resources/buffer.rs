//! Growable typed buffers that build vertex data on the CPU before upload.

use bytemuck::Pod;

use crate::backend::{BackendResult, BufferHandle, BufferTarget, BufferUsage, GpuBackend};

/// Capacity of a freshly created [`GrowableBuffer`]
pub const INITIAL_CAPACITY: usize = 1024;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
    impl Sealed for u16 {}
}

/// Element kinds a [`GrowableBuffer`] can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
    U16,
}

/// A scalar type that can back a [`GrowableBuffer`]
pub trait Scalar: sealed::Sealed + Pod + Default + std::fmt::Debug {
    const KIND: ScalarKind;
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;
}

impl Scalar for i32 {
    const KIND: ScalarKind = ScalarKind::I32;
}

impl Scalar for u32 {
    const KIND: ScalarKind = ScalarKind::U32;
}

impl Scalar for u16 {
    const KIND: ScalarKind = ScalarKind::U16;
}

/// Homogeneous numeric buffer with an append cursor.
///
/// The backing storage only ever grows. Appending `k` elements when
/// `size() + k >= capacity()` reallocates to
/// `max(capacity * 2, size + k + 1)` first.
#[derive(Debug, Clone)]
pub struct GrowableBuffer<T: Scalar> {
    data: Vec<T>,
    position: usize,
    handle: Option<BufferHandle>,
}

impl<T: Scalar> Default for GrowableBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> GrowableBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity],
            position: 0,
            handle: None,
        }
    }

    /// Element kind of this buffer
    pub fn kind(&self) -> ScalarKind {
        T::KIND
    }

    /// Reset the logical length without releasing storage
    pub fn clear(&mut self) {
        self.position = 0;
    }

    /// Number of elements appended since the last [`Self::clear`]
    pub fn size(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn ensure_capacity(&mut self, extra: usize) {
        let capacity = self.data.len();
        if self.position + extra >= capacity {
            let new_capacity = (capacity * 2).max(self.position + extra + 1);
            let mut grown = vec![T::default(); new_capacity];
            grown[..self.position].copy_from_slice(&self.data[..self.position]);
            self.data = grown;
        }
    }

    pub fn add(&mut self, x: T) {
        self.ensure_capacity(1);
        self.data[self.position] = x;
        self.position += 1;
    }

    pub fn add2(&mut self, x: T, y: T) {
        self.ensure_capacity(2);
        self.data[self.position] = x;
        self.data[self.position + 1] = y;
        self.position += 2;
    }

    pub fn add3(&mut self, x: T, y: T, z: T) {
        self.ensure_capacity(3);
        self.data[self.position] = x;
        self.data[self.position + 1] = y;
        self.data[self.position + 2] = z;
        self.position += 3;
    }

    pub fn add_all(&mut self, values: &[T]) {
        self.ensure_capacity(values.len());
        self.data[self.position..self.position + values.len()].copy_from_slice(values);
        self.position += values.len();
    }

    /// The appended elements
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.position]
    }

    /// GPU buffer this buffer was last uploaded to
    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Upload the appended elements, creating the GPU buffer on first use.
    /// The unused tail of the backing storage is never uploaded.
    pub fn upload<B: GpuBackend>(
        &mut self,
        backend: &mut B,
        target: BufferTarget,
        usage: BufferUsage,
    ) -> BackendResult<BufferHandle> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = backend.create_buffer()?;
                self.handle = Some(handle);
                handle
            }
        };
        backend.buffer_data(
            handle,
            target,
            bytemuck::cast_slice(self.as_slice()),
            usage,
        )?;
        Ok(handle)
    }

    /// Release the GPU buffer, if any
    pub fn destroy<B: GpuBackend>(&mut self, backend: &mut B) {
        if let Some(handle) = self.handle.take() {
            backend.destroy_buffer(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    #[test]
    fn test_appends_in_order() {
        let mut buffer = GrowableBuffer::<f32>::new();
        buffer.add(1.0);
        buffer.add2(2.0, 3.0);
        buffer.add3(4.0, 5.0, 6.0);
        buffer.add_all(&[7.0, 8.0]);

        assert_eq!(buffer.size(), 8);
        assert_eq!(buffer.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(buffer.kind(), ScalarKind::F32);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = GrowableBuffer::<i32>::with_capacity(4);
        buffer.add_all(&[1, 2, 3, 4, 5]);
        let capacity = buffer.capacity();

        buffer.clear();
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.capacity(), capacity);

        buffer.add(9);
        assert_eq!(buffer.as_slice(), &[9]);
    }

    #[test]
    fn test_growth_policy() {
        let mut buffer = GrowableBuffer::<u16>::with_capacity(4);
        buffer.add3(1, 2, 3);
        assert_eq!(buffer.capacity(), 4);

        // 3 + 1 reaches the capacity, so it doubles
        buffer.add(4);
        assert_eq!(buffer.capacity(), 8);

        // A bulk append larger than double grows to fit exactly plus one
        buffer.add_all(&[0; 20]);
        assert_eq!(buffer.capacity(), 25);
        assert_eq!(buffer.size(), 24);
        assert_eq!(&buffer.as_slice()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_many_appends_never_truncate() {
        let mut buffer = GrowableBuffer::<u32>::with_capacity(1);
        for i in 0..5000 {
            buffer.add(i);
        }
        assert_eq!(buffer.size(), 5000);
        assert!(buffer.as_slice().iter().copied().eq(0..5000));
    }

    #[test]
    fn test_upload_exports_logical_prefix() {
        let mut backend = HeadlessBackend::default();
        let mut buffer = GrowableBuffer::<f32>::new();
        buffer.add3(1.0, 2.0, 3.0);

        let handle = buffer
            .upload(&mut backend, BufferTarget::Array, BufferUsage::StaticDraw)
            .unwrap();
        assert_eq!(backend.buffer_contents(handle).map(<[u8]>::len), Some(12));
        assert_eq!(
            backend.buffer_usage(handle),
            Some((BufferTarget::Array, BufferUsage::StaticDraw))
        );

        // Re-uploading reuses the same GPU buffer
        buffer.add(4.0);
        let again = buffer
            .upload(&mut backend, BufferTarget::Array, BufferUsage::DynamicDraw)
            .unwrap();
        assert_eq!(again, handle);
        assert_eq!(backend.resource_counts().buffers, 1);

        buffer.destroy(&mut backend);
        assert_eq!(backend.resource_counts().buffers, 0);
        assert_eq!(buffer.handle(), None);
    }
}
