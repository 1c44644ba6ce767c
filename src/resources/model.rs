//! GPU-resident models expanded from decoded meshes

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::buffer::GrowableBuffer;
use crate::resources::mesh_file::Mesh;
use crate::resources::program::ShaderProgram;

pub const POSITION_ATTRIBUTE: &str = "position";
pub const TEX_COORD_ATTRIBUTE: &str = "tex_coord";
pub const NORMAL_ATTRIBUTE: &str = "normal";

/// Flat per-corner attribute arrays for one mesh.
///
/// Every face entry of the mesh becomes one vertex, so consecutive triples of
/// vertices form the mesh's triangles. Nothing is deduplicated.
#[derive(Debug)]
pub struct Model {
    positions: GrowableBuffer<f32>,
    tex_coords: GrowableBuffer<f32>,
    normals: GrowableBuffer<f32>,
}

impl Model {
    /// Expand a mesh, scaling positions and flipping the v coordinate
    pub fn from_mesh(mesh: &Mesh, scale: f32) -> Self {
        let mut positions = GrowableBuffer::new();
        let mut tex_coords = GrowableBuffer::new();
        let mut normals = GrowableBuffer::new();

        for corner in mesh.corners() {
            let [x, y, z] = corner.position;
            positions.add3(x * scale, y * scale, z * scale);

            let [u, v] = corner.tex_coord;
            tex_coords.add2(u, 1.0 - v);

            let [nx, ny, nz] = corner.normal;
            normals.add3(nx, ny, nz);
        }

        Self {
            positions,
            tex_coords,
            normals,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        (self.positions.size() / 3) as u32
    }

    pub fn positions(&self) -> &[f32] {
        self.positions.as_slice()
    }

    pub fn tex_coords(&self) -> &[f32] {
        self.tex_coords.as_slice()
    }

    pub fn normals(&self) -> &[f32] {
        self.normals.as_slice()
    }

    /// Upload all three attribute buffers
    pub fn upload<B: GpuBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        for buffer in [&mut self.positions, &mut self.tex_coords, &mut self.normals] {
            buffer.upload(backend, BufferTarget::Array, BufferUsage::StaticDraw)?;
        }
        log::debug!("Uploaded model with {} vertices", self.vertex_count());
        Ok(())
    }

    /// Connect the uploaded buffers to the program's vertex attributes.
    /// Attributes the program doesn't use are skipped.
    pub fn bind<B: GpuBackend>(
        &self,
        backend: &mut B,
        program: &mut ShaderProgram,
    ) -> BackendResult<()> {
        let attributes = [
            (POSITION_ATTRIBUTE, &self.positions, 3),
            (TEX_COORD_ATTRIBUTE, &self.tex_coords, 2),
            (NORMAL_ATTRIBUTE, &self.normals, 3),
        ];
        for (name, buffer, components) in attributes {
            let location = program.attribute_location(backend, name)?;
            if location.is_none() {
                continue;
            }
            let handle = buffer.handle().ok_or_else(|| BackendError::MissingAttribute {
                name: name.to_string(),
            })?;
            backend.bind_vertex_attribute(location, handle, components)?;
        }
        Ok(())
    }

    /// Draw every triangle with the bound program
    pub fn draw<B: GpuBackend>(&self, backend: &mut B) -> BackendResult<()> {
        backend.draw_arrays(0, self.vertex_count())
    }

    /// Release the GPU buffers
    pub fn destroy<B: GpuBackend>(mut self, backend: &mut B) {
        self.positions.destroy(backend);
        self.tex_coords.destroy(backend);
        self.normals.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::resources::mesh_file::FaceIndex;

    fn quad() -> Mesh {
        Mesh::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0],
            vec![
                FaceIndex::new(0, 0, 0),
                FaceIndex::new(1, 1, 0),
                FaceIndex::new(2, 2, 0),
                FaceIndex::new(0, 0, 0),
                FaceIndex::new(2, 2, 0),
                FaceIndex::new(3, 3, 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_expansion_counts() {
        let mesh = quad();
        let model = Model::from_mesh(&mesh, 1.0);
        let corners = mesh.face_indexes().len();

        assert_eq!(model.vertex_count() as usize, corners);
        assert_eq!(model.positions().len() / 3, corners);
        assert_eq!(model.tex_coords().len() / 2, corners);
        assert_eq!(model.normals().len() / 3, corners);
    }

    #[test]
    fn test_scale_and_uv_flip() {
        let model = Model::from_mesh(&quad(), 8.0);
        // Third corner is vertex 2 (1, 1, 0) with uv (1, 1)
        assert_eq!(&model.positions()[6..9], &[8.0, 8.0, 0.0]);
        assert_eq!(&model.tex_coords()[4..6], &[1.0, 0.0]);
        assert_eq!(&model.tex_coords()[0..2], &[0.0, 1.0]);
    }

    #[test]
    fn test_upload_and_destroy() {
        let mut backend = HeadlessBackend::default();
        let mut model = Model::from_mesh(&quad(), 1.0);
        model.upload(&mut backend).unwrap();
        assert_eq!(backend.resource_counts().buffers, 3);

        model.destroy(&mut backend);
        assert_eq!(backend.resource_counts().buffers, 0);
    }
}
