//! Core geometry types for displacement transfer.

use nalgebra::{Point3, Vector3};

use crate::error::{TransferError, TransferResult};

/// Immutable per-call capture of a mesh in world space.
///
/// A snapshot owns its geometry and is never mutated after construction.
/// Positions and normals are parallel arrays; faces index into them.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    /// Vertex positions, world space.
    positions: Vec<Point3<f64>>,

    /// Unit vertex normals, parallel to `positions`.
    normals: Vec<Vector3<f64>>,

    /// Triangles as indices into the vertex arrays.
    faces: Vec<[u32; 3]>,
}

impl MeshSnapshot {
    /// Create a snapshot, validating the geometry up front.
    ///
    /// Rejects empty meshes, mismatched position/normal counts, out-of-range
    /// face indices, and non-finite coordinates.
    pub fn new(
        positions: Vec<Point3<f64>>,
        normals: Vec<Vector3<f64>>,
        faces: Vec<[u32; 3]>,
    ) -> TransferResult<Self> {
        if positions.is_empty() || faces.is_empty() {
            return Err(TransferError::empty_snapshot(
                "mesh",
                format!("{} vertices, {} faces", positions.len(), faces.len()),
            ));
        }
        if normals.len() != positions.len() {
            return Err(TransferError::empty_snapshot(
                "mesh",
                format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    positions.len()
                ),
            ));
        }

        for (i, p) in positions.iter().enumerate() {
            for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
                if !value.is_finite() {
                    return Err(TransferError::InvalidCoordinate {
                        vertex_index: i,
                        coordinate,
                        value,
                    });
                }
            }
        }
        for (i, n) in normals.iter().enumerate() {
            for (coordinate, value) in [("nx", n.x), ("ny", n.y), ("nz", n.z)] {
                if !value.is_finite() {
                    return Err(TransferError::InvalidCoordinate {
                        vertex_index: i,
                        coordinate,
                        value,
                    });
                }
            }
        }

        let vertex_count = positions.len();
        for (face_index, face) in faces.iter().enumerate() {
            for &vertex_index in face {
                if vertex_index as usize >= vertex_count {
                    return Err(TransferError::InvalidVertexIndex {
                        face_index,
                        vertex_index,
                        vertex_count,
                    });
                }
            }
        }

        Ok(Self {
            positions,
            normals,
            faces,
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Vertex normals.
    #[inline]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Triangle faces.
    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Positions of the three corners of a face.
    #[inline]
    pub fn triangle(&self, face_idx: usize) -> [Point3<f64>; 3] {
        let [i0, i1, i2] = self.faces[face_idx];
        [
            self.positions[i0 as usize],
            self.positions[i1 as usize],
            self.positions[i2 as usize],
        ]
    }

    /// Compute the axis-aligned bounding box.
    pub fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = self.positions[0];
        let mut max = self.positions[0];
        for p in &self.positions[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        (min, max)
    }
}

/// A per-vertex field of 3D offsets from a mesh's base shape.
///
/// Read-only during a transfer; the only mutation in the pipeline is the
/// final write-back through a [`crate::provider::MeshDataProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    offsets: Vec<Vector3<f64>>,
}

impl DisplacementField {
    /// Wrap per-vertex offsets into a field.
    pub fn new(offsets: Vec<Vector3<f64>>) -> Self {
        Self { offsets }
    }

    /// An all-zero field over `n` vertices.
    pub fn zeros(n: usize) -> Self {
        Self {
            offsets: vec![Vector3::zeros(); n],
        }
    }

    /// Number of per-vertex offsets.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True if the field is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset for a vertex.
    #[inline]
    pub fn get(&self, vertex: usize) -> Vector3<f64> {
        self.offsets[vertex]
    }

    /// Set the offset for a vertex.
    #[inline]
    pub fn set(&mut self, vertex: usize, offset: Vector3<f64>) {
        self.offsets[vertex] = offset;
    }

    /// All offsets as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Vector3<f64>] {
        &self.offsets
    }

    /// Largest offset magnitude in the field.
    pub fn max_norm(&self) -> f64 {
        self.offsets.iter().map(|v| v.norm()).fold(0.0, f64::max)
    }

    /// Check the field against the mesh it is supposed to cover.
    pub fn check_len(&self, expected: usize) -> TransferResult<()> {
        if self.offsets.len() != expected {
            return Err(TransferError::FieldSizeMismatch {
                expected,
                actual: self.offsets.len(),
            });
        }
        Ok(())
    }
}

impl std::ops::Index<usize> for DisplacementField {
    type Output = Vector3<f64>;

    #[inline]
    fn index(&self, vertex: usize) -> &Vector3<f64> {
        &self.offsets[vertex]
    }
}

/// RGB color with 8-bit components, used by the quality visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl VertexColor {
    /// Create a new color from RGB components.
    #[inline]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from floating point values in [0, 1] range.
    #[inline]
    pub fn from_float(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (b.clamp(0.0, 1.0) * 255.0) as u8,
        }
    }
}
