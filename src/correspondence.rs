//! Correspondence matching between target vertices and the source surface.
//!
//! For each target vertex, projects onto the source mesh, interpolates the
//! source displacement with barycentric weights, and validates the match
//! against distance and normal-alignment thresholds. Vertices that fail
//! validation stay unmatched and are filled in by the harmonic solve.

use nalgebra::{Point3, Vector3};
use parry3d::query::PointQuery;
use parry3d::shape::TriMesh;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{TransferError, TransferResult};
use crate::params::TransferParams;
use crate::types::{DisplacementField, MeshSnapshot};

/// How well a target vertex matched the source surface, relative to the
/// distance threshold `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    /// Distance <= 0.1 * t.
    Perfect,
    /// Distance <= 0.5 * t.
    Good,
    /// Distance <= t.
    Acceptable,
    /// Failed the distance or normal test.
    Unmatched,
}

impl MatchQuality {
    /// True for any quality that produced a displacement.
    #[inline]
    pub fn is_matched(&self) -> bool {
        !matches!(self, MatchQuality::Unmatched)
    }
}

/// The result of matching one target vertex against the source surface.
#[derive(Debug, Clone)]
pub struct Correspondence {
    /// Interpolated source displacement, present only for matched vertices.
    pub displacement: Option<Vector3<f64>>,
    /// Distance from the target vertex to its projection on the source.
    pub distance: f64,
    /// |cosine| between the target normal and the interpolated source normal.
    pub normal_alignment: f64,
    /// Quality band relative to the distance threshold.
    pub quality: MatchQuality,
}

impl Correspondence {
    fn unmatched(distance: f64, normal_alignment: f64) -> Self {
        Self {
            displacement: None,
            distance,
            normal_alignment,
            quality: MatchQuality::Unmatched,
        }
    }
}

/// Per-vertex correspondences for an entire target mesh.
#[derive(Debug, Clone)]
pub struct CorrespondenceSet {
    /// One entry per target vertex.
    pub entries: Vec<Correspondence>,
    /// Number of matched entries.
    pub matched: usize,
}

impl CorrespondenceSet {
    /// Fraction of target vertices with a valid match.
    pub fn coverage(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.matched as f64 / self.entries.len() as f64
        }
    }

    /// Boolean mask of matched vertices, parallel to the target vertex array.
    pub fn matched_mask(&self) -> Vec<bool> {
        self.entries.iter().map(|c| c.quality.is_matched()).collect()
    }
}

/// Match every target vertex against the source surface.
///
/// Returns an error only when not a single vertex matches; partial coverage
/// is the normal case and is handled downstream by the inpainting solve.
pub fn find_correspondence(
    source: &MeshSnapshot,
    target: &MeshSnapshot,
    field: &DisplacementField,
    params: &TransferParams,
) -> TransferResult<CorrespondenceSet> {
    info!(
        source_verts = source.vertex_count(),
        target_verts = target.vertex_count(),
        distance_threshold = params.distance_threshold,
        normal_threshold = params.normal_threshold,
        "Matching target vertices against source surface"
    );

    // Build parry3d TriMesh for closest point queries
    let vertices: Vec<parry3d::math::Point<f32>> = source
        .positions()
        .iter()
        .map(|p| parry3d::math::Point::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    let indices: Vec<[u32; 3]> = source.faces().to_vec();
    let trimesh = TriMesh::new(vertices, indices);

    let entries: Vec<Correspondence> = target
        .positions()
        .par_iter()
        .zip(target.normals().par_iter())
        .map(|(position, normal)| {
            match_vertex(&trimesh, source, field, params, position, normal)
        })
        .collect();

    let matched = entries.iter().filter(|c| c.quality.is_matched()).count();

    if matched == 0 {
        return Err(TransferError::NoCorrespondenceFound {
            target_vertices: target.vertex_count(),
            distance_threshold: params.distance_threshold,
            normal_threshold: params.normal_threshold,
        });
    }

    debug!(
        matched,
        total = entries.len(),
        coverage = format!("{:.1}%", 100.0 * matched as f64 / entries.len() as f64),
        "Correspondence complete"
    );

    Ok(CorrespondenceSet { entries, matched })
}

fn match_vertex(
    trimesh: &TriMesh,
    source: &MeshSnapshot,
    field: &DisplacementField,
    params: &TransferParams,
    position: &Point3<f64>,
    normal: &Vector3<f64>,
) -> Correspondence {
    let query_point =
        parry3d::math::Point::new(position.x as f32, position.y as f32, position.z as f32);

    let (projection, feature) = trimesh.project_local_point_and_get_feature(&query_point);

    // Resolve the triangle the projection landed on; fall back to the
    // nearest source vertex when the feature is not a face.
    let face_idx = match feature {
        parry3d::shape::FeatureId::Face(idx) => idx as usize,
        _ => {
            let mut min_dist = f64::MAX;
            let mut nearest = 0usize;
            for (i, p) in source.positions().iter().enumerate() {
                let d = (position - p).norm_squared();
                if d < min_dist {
                    min_dist = d;
                    nearest = i;
                }
            }
            let distance = min_dist.sqrt();
            let alignment = normal.dot(&source.normals()[nearest]).abs();
            return classify(
                field.get(nearest),
                distance,
                alignment,
                params,
            );
        }
    };

    if face_idx >= source.face_count() {
        return Correspondence::unmatched(f64::MAX, 0.0);
    }

    let [v0, v1, v2] = source.faces()[face_idx];
    let proj_point = Point3::new(
        projection.point.x as f64,
        projection.point.y as f64,
        projection.point.z as f64,
    );

    let [p0, p1, p2] = source.triangle(face_idx);
    let bary = compute_barycentric(&proj_point, &p0, &p1, &p2);

    let distance = (position - proj_point).norm();

    // Interpolated source normal, renormalized. Near-zero means the corner
    // normals cancel; treat the alignment as failed rather than guessing.
    let n0 = source.normals()[v0 as usize];
    let n1 = source.normals()[v1 as usize];
    let n2 = source.normals()[v2 as usize];
    let source_normal = bary[0] * n0 + bary[1] * n1 + bary[2] * n2;
    let norm = source_normal.norm();
    let alignment = if norm > 1e-12 {
        normal.dot(&(source_normal / norm)).abs()
    } else {
        0.0
    };

    let d0 = field.get(v0 as usize);
    let d1 = field.get(v1 as usize);
    let d2 = field.get(v2 as usize);
    let displacement = bary[0] * d0 + bary[1] * d1 + bary[2] * d2;

    classify(displacement, distance, alignment, params)
}

fn classify(
    displacement: Vector3<f64>,
    distance: f64,
    alignment: f64,
    params: &TransferParams,
) -> Correspondence {
    if distance > params.distance_threshold || alignment < params.normal_threshold {
        return Correspondence::unmatched(distance, alignment);
    }

    let quality = if distance <= 0.1 * params.distance_threshold {
        MatchQuality::Perfect
    } else if distance <= 0.5 * params.distance_threshold {
        MatchQuality::Good
    } else {
        MatchQuality::Acceptable
    };

    Correspondence {
        displacement: Some(displacement),
        distance,
        normal_alignment: alignment,
        quality,
    }
}

/// Compute barycentric coordinates for point p in triangle (p0, p1, p2).
fn compute_barycentric(
    p: &Point3<f64>,
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
) -> [f64; 3] {
    let v0 = p1 - p0;
    let v1 = p2 - p0;
    let v2 = p - p0;

    let d00 = v0.dot(&v0);
    let d01 = v0.dot(&v1);
    let d11 = v1.dot(&v1);
    let d20 = v2.dot(&v0);
    let d21 = v2.dot(&v1);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < 1e-10 {
        // Degenerate triangle, return equal weights
        return [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
    }

    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;

    [u.clamp(0.0, 1.0), v.clamp(0.0, 1.0), w.clamp(0.0, 1.0)]
}
