//! Binary mesh format
//!
//! A mesh file is a stream of 4-byte big-endian words:
//!
//! ```text
//! i32 vertex_count,  f32[vertex_count]   flattened xyz positions
//! i32 texture_count, f32[texture_count]  flattened uv coordinates
//! i32 normal_count,  f32[normal_count]   flattened xyz normals
//! i32 face_count,    (i32 vertex, i32 texture, i32 normal)[face_count]
//! ```
//!
//! Counts are scalar counts, not triple counts. Every face entry is one
//! triangle corner whose indices address a triple (positions, normals) or a
//! pair (uvs).

use thiserror::Error;

/// Error produced when decoding a mesh file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Mesh data is {len} bytes long, not a whole number of 4-byte words")]
    Misaligned { len: usize },
    #[error("Truncated {section} section: needs {needed} words, {available} left")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("Negative {section} count {count}")]
    NegativeCount { section: &'static str, count: i32 },
    #[error("Face entry {entry} has {attribute} index {index} outside 0..{limit}")]
    IndexOutOfRange {
        entry: usize,
        attribute: &'static str,
        index: i32,
        limit: usize,
    },
}

/// Indices of one triangle corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceIndex {
    pub vertex: i32,
    pub texture: i32,
    pub normal: i32,
}

impl FaceIndex {
    pub fn new(vertex: i32, texture: i32, normal: i32) -> Self {
        Self {
            vertex,
            texture,
            normal,
        }
    }
}

/// Decoded mesh with indexed triangle corners
///
/// Every face index is known to address a full triple or pair, so
/// [`Mesh::position`], [`Mesh::tex_coord`] and [`Mesh::normal`] never fail
/// for indices taken from [`Mesh::face_indexes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<f32>,
    textures: Vec<f32>,
    normals: Vec<f32>,
    face_indexes: Vec<FaceIndex>,
}

impl Mesh {
    /// Build a mesh, checking every face index
    pub fn new(
        vertices: Vec<f32>,
        textures: Vec<f32>,
        normals: Vec<f32>,
        face_indexes: Vec<FaceIndex>,
    ) -> Result<Self, DecodeError> {
        let vertex_limit = vertices.len() / 3;
        let texture_limit = textures.len() / 2;
        let normal_limit = normals.len() / 3;

        for (entry, face) in face_indexes.iter().enumerate() {
            check_index(entry, "vertex", face.vertex, vertex_limit)?;
            check_index(entry, "texture", face.texture, texture_limit)?;
            check_index(entry, "normal", face.normal, normal_limit)?;
        }

        Ok(Self {
            vertices,
            textures,
            normals,
            face_indexes,
        })
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn textures(&self) -> &[f32] {
        &self.textures
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn face_indexes(&self) -> &[FaceIndex] {
        &self.face_indexes
    }

    /// Number of whole triangles
    pub fn triangle_count(&self) -> usize {
        self.face_indexes.len() / 3
    }

    /// Position triple `index`, if the mesh has one
    pub fn position(&self, index: i32) -> Option<[f32; 3]> {
        element(&self.vertices, index)
    }

    pub fn tex_coord(&self, index: i32) -> Option<[f32; 2]> {
        element(&self.textures, index)
    }

    pub fn normal(&self, index: i32) -> Option<[f32; 3]> {
        element(&self.normals, index)
    }

    /// Attributes of every face entry, in order
    pub fn corners(&self) -> impl Iterator<Item = Corner> + '_ {
        // Face indexes are range checked on construction
        self.face_indexes.iter().filter_map(|face| {
            Some(Corner {
                position: self.position(face.vertex)?,
                tex_coord: self.tex_coord(face.texture)?,
                normal: self.normal(face.normal)?,
            })
        })
    }
}

/// Attributes addressed by one face entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

fn element<const N: usize>(data: &[f32], index: i32) -> Option<[f32; N]> {
    let start = usize::try_from(index).ok()?.checked_mul(N)?;
    let slice = data.get(start..start.checked_add(N)?)?;
    slice.try_into().ok()
}

fn check_index(
    entry: usize,
    attribute: &'static str,
    index: i32,
    limit: usize,
) -> Result<(), DecodeError> {
    if index < 0 || index as usize >= limit {
        return Err(DecodeError::IndexOutOfRange {
            entry,
            attribute,
            index,
            limit,
        });
    }
    Ok(())
}

/// Word stream over big-endian input, converted to host order on read
struct WordReader<'a> {
    words: std::slice::ChunksExact<'a, u8>,
}

impl<'a> WordReader<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(DecodeError::Misaligned { len: bytes.len() });
        }
        Ok(Self {
            words: bytes.chunks_exact(4),
        })
    }

    fn remaining(&self) -> usize {
        self.words.len()
    }

    fn ensure(&self, section: &'static str, needed: usize) -> Result<(), DecodeError> {
        let available = self.remaining();
        if needed > available {
            return Err(DecodeError::Truncated {
                section,
                needed,
                available,
            });
        }
        Ok(())
    }

    fn next_word(&mut self) -> u32 {
        // Callers check `ensure` first
        self.words
            .next()
            .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            .unwrap_or_default()
    }

    fn read_i32(&mut self) -> i32 {
        self.next_word() as i32
    }

    fn read_count(&mut self, section: &'static str) -> Result<usize, DecodeError> {
        self.ensure(section, 1)?;
        let count = self.read_i32();
        if count < 0 {
            return Err(DecodeError::NegativeCount { section, count });
        }
        Ok(count as usize)
    }

    fn read_floats(&mut self, section: &'static str) -> Result<Vec<f32>, DecodeError> {
        let count = self.read_count(section)?;
        self.ensure(section, count)?;
        Ok((0..count).map(|_| f32::from_bits(self.next_word())).collect())
    }

    fn read_faces(&mut self) -> Result<Vec<FaceIndex>, DecodeError> {
        let count = self.read_count("face")?;
        self.ensure("face", count.saturating_mul(3))?;
        Ok((0..count)
            .map(|_| {
                let vertex = self.read_i32();
                let texture = self.read_i32();
                let normal = self.read_i32();
                FaceIndex::new(vertex, texture, normal)
            })
            .collect())
    }
}

/// Decode a mesh file
pub fn decode(bytes: &[u8]) -> Result<Mesh, DecodeError> {
    let mut reader = WordReader::new(bytes)?;

    let vertices = reader.read_floats("vertex")?;
    let textures = reader.read_floats("texture")?;
    let normals = reader.read_floats("normal")?;
    let face_indexes = reader.read_faces()?;

    if reader.remaining() > 0 {
        log::warn!(
            "Ignoring {} trailing words after mesh data",
            reader.remaining()
        );
    }

    let mesh = Mesh::new(vertices, textures, normals, face_indexes)?;
    log::debug!(
        "Decoded mesh: {} vertices, {} uvs, {} normals, {} face entries",
        mesh.vertices.len() / 3,
        mesh.textures.len() / 2,
        mesh.normals.len() / 3,
        mesh.face_indexes.len()
    );
    Ok(mesh)
}

/// Encode a mesh in the same layout [`decode`] reads
pub fn encode(mesh: &Mesh) -> Vec<u8> {
    let words = 4
        + mesh.vertices.len()
        + mesh.textures.len()
        + mesh.normals.len()
        + mesh.face_indexes.len() * 3;
    let mut out = Vec::with_capacity(words * 4);

    for section in [&mesh.vertices, &mesh.textures, &mesh.normals] {
        out.extend_from_slice(&(section.len() as i32).to_be_bytes());
        for value in section {
            out.extend_from_slice(&value.to_bits().to_be_bytes());
        }
    }

    out.extend_from_slice(&(mesh.face_indexes.len() as i32).to_be_bytes());
    for face in &mesh.face_indexes {
        out.extend_from_slice(&face.vertex.to_be_bytes());
        out.extend_from_slice(&face.texture.to_be_bytes());
        out.extend_from_slice(&face.normal.to_be_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0],
            vec![
                FaceIndex::new(0, 0, 0),
                FaceIndex::new(1, 1, 0),
                FaceIndex::new(2, 2, 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decode_explicit_bytes() {
        #[rustfmt::skip]
        let bytes: [u8; 48] = [
            0x00, 0x00, 0x00, 0x03,
            0x3F, 0x80, 0x00, 0x00, // 1.0
            0x40, 0x00, 0x00, 0x00, // 2.0
            0xC0, 0x40, 0x00, 0x00, // -3.0
            0x00, 0x00, 0x00, 0x02,
            0x3F, 0x00, 0x00, 0x00, // 0.5
            0x3E, 0x80, 0x00, 0x00, // 0.25
            0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x3F, 0x80, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
        ];
        // The face block needs three more words
        let mut data = bytes.to_vec();
        data.extend_from_slice(&[0; 12]);

        let mesh = decode(&data).unwrap();
        assert_eq!(mesh.vertices(), &[1.0, 2.0, -3.0]);
        assert_eq!(mesh.textures(), &[0.5, 0.25]);
        assert_eq!(mesh.normals(), &[0.0, 0.0, 1.0]);
        assert_eq!(mesh.face_indexes(), &[FaceIndex::new(0, 0, 0)]);
    }

    fn bits(values: &[f32]) -> Vec<u32> {
        values.iter().map(|v| v.to_bits()).collect()
    }

    fn faces(indexes: &[(i32, i32, i32)]) -> Vec<FaceIndex> {
        indexes
            .iter()
            .map(|&(v, t, n)| FaceIndex::new(v, t, n))
            .collect()
    }

    #[test]
    fn test_encoded_size() {
        let bytes = encode(&triangle());
        assert_eq!(bytes.len(), (4 + 9 + 6 + 3 + 9) * 4);
    }

    #[rstest]
    #[case::single_triangle(triangle())]
    #[case::no_faces(Mesh::new(
        vec![1.0, 2.0, 3.0],
        vec![0.5, 0.5],
        vec![0.0, 1.0, 0.0],
        Vec::new(),
    ).unwrap())]
    #[case::shared_and_repeated_indices(Mesh::new(
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        vec![0.0, 0.0, 1.0],
        faces(&[(0, 0, 0), (1, 1, 0), (2, 2, 0), (0, 0, 0), (2, 2, 0), (3, 3, 0), (3, 3, 0), (3, 3, 0), (3, 3, 0)]),
    ).unwrap())]
    #[case::special_floats(Mesh::new(
        vec![-0.0, 0.0, -1.5, f32::from_bits(0x7FC0_1234), f32::from_bits(1), -f32::MIN_POSITIVE],
        vec![f32::INFINITY, f32::NEG_INFINITY, f32::from_bits(0xFFC0_0001), -f32::from_bits(0x007F_FFFF)],
        vec![f32::MAX, f32::MIN, -0.0],
        faces(&[(1, 1, 0), (0, 0, 0), (1, 0, 0)]),
    ).unwrap())]
    #[case::indices_at_last_element(Mesh::new(
        vec![0.0; 3 * 7],
        vec![0.25; 2 * 5],
        vec![1.0; 3 * 2],
        faces(&[(6, 4, 1), (0, 0, 0), (6, 4, 1)]),
    ).unwrap())]
    fn test_round_trip(#[case] mesh: Mesh) {
        let decoded = decode(&encode(&mesh)).unwrap();
        assert_eq!(bits(decoded.vertices()), bits(mesh.vertices()));
        assert_eq!(bits(decoded.textures()), bits(mesh.textures()));
        assert_eq!(bits(decoded.normals()), bits(mesh.normals()));
        assert_eq!(decoded.face_indexes(), mesh.face_indexes());
    }

    #[test]
    fn test_empty_mesh() {
        let bytes = [0u8; 16];
        let mesh = decode(&bytes).unwrap();
        assert!(mesh.face_indexes().is_empty());
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_misaligned() {
        let mut bytes = encode(&triangle());
        bytes.push(0);
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::Misaligned { len: bytes.len() })
        );
    }

    #[test]
    fn test_truncated() {
        let bytes = encode(&triangle());
        let cut = &bytes[..bytes.len() - 4];
        assert_eq!(
            decode(cut),
            Err(DecodeError::Truncated {
                section: "face",
                needed: 9,
                available: 8,
            })
        );

        assert_eq!(
            decode(&[]),
            Err(DecodeError::Truncated {
                section: "vertex",
                needed: 1,
                available: 0,
            })
        );
    }

    #[test]
    fn test_negative_count() {
        let bytes = (-1i32).to_be_bytes();
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::NegativeCount {
                section: "vertex",
                count: -1,
            })
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let mut bytes = encode(&triangle());
        // Last word is the normal index of the third corner
        let last = bytes.len() - 4;
        bytes[last..].copy_from_slice(&1i32.to_be_bytes());
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::IndexOutOfRange {
                entry: 2,
                attribute: "normal",
                index: 1,
                limit: 1,
            })
        );
    }

    #[test]
    fn test_trailing_words_ignored() {
        let mesh = triangle();
        let mut bytes = encode(&mesh);
        bytes.extend_from_slice(&[0xFF; 8]);
        assert_eq!(decode(&bytes).unwrap(), mesh);
    }

    #[test]
    fn test_corner_accessors() {
        let mesh = triangle();
        assert_eq!(mesh.position(1), Some([1.0, 0.0, 0.0]));
        assert_eq!(mesh.tex_coord(2), Some([0.0, 1.0]));
        assert_eq!(mesh.normal(0), Some([0.0, 0.0, 1.0]));
        assert_eq!(mesh.triangle_count(), 1);

        let corners: Vec<Corner> = mesh.corners().collect();
        assert_eq!(corners.len(), 3);
        assert_eq!(corners[1].position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_accessors_out_of_range() {
        let mesh = triangle();
        assert_eq!(mesh.position(3), None);
        assert_eq!(mesh.position(-1), None);
        assert_eq!(mesh.tex_coord(3), None);
        assert_eq!(mesh.normal(i32::MAX), None);
    }
}
