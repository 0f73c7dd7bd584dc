//! The transfer pipeline.
//!
//! Orchestrates the stages: correspondence matching, island detection,
//! constrained harmonic inpainting, optional smoothing, and optional
//! quality visualization. Each stage logs its summary so a failed
//! transfer can be diagnosed from the trace alone.

use tracing::{info, warn};

use crate::adjacency::VertexAdjacency;
use crate::correspondence::find_correspondence;
use crate::error::TransferResult;
use crate::inpaint::{inpaint_displacements, IslandReport};
use crate::islands::{annotate_matches, detect_islands};
use crate::params::TransferParams;
use crate::quality::quality_colors;
use crate::smoothing::smooth_unmatched;
use crate::solve::{ConjugateGradient, SparseSolverBackend};
use crate::types::{DisplacementField, MeshSnapshot, VertexColor};

/// Coverage below this triggers a threshold-tuning warning.
const LOW_COVERAGE_WARNING: f64 = 0.2;

/// Summary of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Target vertices with a valid correspondence.
    pub matched_vertices: usize,
    /// Total target vertices.
    pub total_vertices: usize,
    /// `matched_vertices / total_vertices`.
    pub coverage: f64,
    /// Number of connected islands in the target.
    pub island_count: usize,
    /// Per-island outcomes, by island id.
    pub islands: Vec<IslandReport>,
}

/// A completed transfer: the target-side displacement field plus
/// diagnostics.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Displacement field over the target vertices.
    pub field: DisplacementField,
    /// Per-vertex match-quality colors, when requested.
    pub quality_colors: Option<Vec<VertexColor>>,
    /// Summary of what happened.
    pub report: TransferReport,
}

/// Transfer a displacement field from `source` onto `target` using the
/// default conjugate-gradient backend.
pub fn transfer(
    source: &MeshSnapshot,
    target: &MeshSnapshot,
    field: &DisplacementField,
    params: &TransferParams,
) -> TransferResult<TransferOutcome> {
    transfer_with_backend(source, target, field, params, &ConjugateGradient::default())
}

/// Transfer a displacement field with an explicit solver backend.
pub fn transfer_with_backend(
    source: &MeshSnapshot,
    target: &MeshSnapshot,
    field: &DisplacementField,
    params: &TransferParams,
    backend: &dyn SparseSolverBackend,
) -> TransferResult<TransferOutcome> {
    params.validate()?;
    field.check_len(source.vertex_count())?;

    info!(
        source_verts = source.vertex_count(),
        target_verts = target.vertex_count(),
        max_displacement = field.max_norm(),
        "Starting displacement transfer"
    );

    let correspondence = find_correspondence(source, target, field, params)?;
    let coverage = correspondence.coverage();
    if coverage < LOW_COVERAGE_WARNING {
        warn!(
            coverage = format!("{:.1}%", 100.0 * coverage),
            "Low match coverage; consider relaxing the thresholds"
        );
    }

    let adjacency = VertexAdjacency::build(target.vertex_count(), target.faces());
    let mut islands = detect_islands(&adjacency);
    annotate_matches(&mut islands, &correspondence);

    let (mut result, island_reports) =
        inpaint_displacements(target, &correspondence, &islands, params, backend)?;

    if params.post_smooth_iterations > 0 {
        smooth_unmatched(
            &mut result,
            target,
            &correspondence.matched_mask(),
            &adjacency,
            params.post_smooth_iterations,
        );
    }

    let colors = params
        .debug_visualization
        .then(|| quality_colors(&correspondence));

    let report = TransferReport {
        matched_vertices: correspondence.matched,
        total_vertices: target.vertex_count(),
        coverage,
        island_count: islands.island_count(),
        islands: island_reports,
    };

    info!(
        matched = report.matched_vertices,
        total = report.total_vertices,
        islands = report.island_count,
        max_displacement = result.max_norm(),
        "Transfer complete"
    );

    Ok(TransferOutcome {
        field: result,
        quality_colors: colors,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    /// A flat grid in the XY plane with `cols x rows` vertices.
    fn grid(cols: usize, rows: usize, spacing: f64) -> MeshSnapshot {
        let mut positions = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                positions.push(Point3::new(c as f64 * spacing, r as f64 * spacing, 0.0));
            }
        }
        let mut faces = Vec::new();
        for r in 0..rows - 1 {
            for c in 0..cols - 1 {
                let a = (r * cols + c) as u32;
                let b = a + 1;
                let d = a + cols as u32;
                let e = d + 1;
                faces.push([a, b, e]);
                faces.push([a, e, d]);
            }
        }
        let n = positions.len();
        MeshSnapshot::new(positions, vec![Vector3::new(0.0, 0.0, 1.0); n], faces).unwrap()
    }

    #[test]
    fn test_identity_transfer_reproduces_field() {
        let mesh = grid(5, 5, 0.25);
        let field = DisplacementField::new(
            mesh.positions()
                .iter()
                .map(|p| Vector3::new(0.0, 0.0, 0.05 * (p.x + p.y)))
                .collect(),
        );

        let outcome = transfer(&mesh, &mesh, &field, &TransferParams::default()).unwrap();

        assert_eq!(outcome.report.matched_vertices, 25);
        for i in 0..mesh.vertex_count() {
            assert_relative_eq!(outcome.field.get(i).z, field.get(i).z, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_field_stays_zero() {
        let source = grid(5, 5, 0.25);
        let target = grid(9, 9, 0.125);
        let field = DisplacementField::zeros(source.vertex_count());

        let outcome = transfer(&source, &target, &field, &TransferParams::default()).unwrap();
        assert_relative_eq!(outcome.field.max_norm(), 0.0);
    }

    #[test]
    fn test_field_size_mismatch_rejected() {
        let mesh = grid(3, 3, 0.5);
        let field = DisplacementField::zeros(4);
        let err = transfer(&mesh, &mesh, &field, &TransferParams::default()).unwrap_err();
        assert!(matches!(err, TransferError::FieldSizeMismatch { .. }));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mesh = grid(3, 3, 0.5);
        let field = DisplacementField::zeros(9);
        let params = TransferParams::default().with_distance_threshold(0.0);
        let err = transfer(&mesh, &mesh, &field, &params).unwrap_err();
        assert!(matches!(err, TransferError::InvalidConfig { .. }));
    }

    #[test]
    fn test_quality_colors_only_on_request() {
        let mesh = grid(3, 3, 0.5);
        let field = DisplacementField::zeros(9);

        let outcome = transfer(&mesh, &mesh, &field, &TransferParams::default()).unwrap();
        assert!(outcome.quality_colors.is_none());

        let params = TransferParams {
            debug_visualization: true,
            ..Default::default()
        };
        let outcome = transfer(&mesh, &mesh, &field, &params).unwrap();
        let colors = outcome.quality_colors.unwrap();
        assert_eq!(colors.len(), 9);
    }

    #[test]
    fn test_finer_target_interpolates_smoothly() {
        // Source is a coarse grid with a linear ramp; a finer overlapping
        // grid must pick up interpolated values without overshoot.
        let source = grid(5, 5, 0.25);
        let target = grid(9, 9, 0.125);
        let field = DisplacementField::new(
            source
                .positions()
                .iter()
                .map(|p| Vector3::new(0.0, 0.0, 0.1 * p.x))
                .collect(),
        );

        let outcome = transfer(&source, &target, &field, &TransferParams::default()).unwrap();

        let max_source = field.max_norm();
        for i in 0..target.vertex_count() {
            let z = outcome.field.get(i).z;
            assert!(z >= -1e-9 && z <= max_source + 1e-9, "vertex {i}: z = {z}");
            // Linear ramp should be reproduced exactly by barycentric
            // interpolation on a flat grid.
            assert_relative_eq!(z, 0.1 * target.positions()[i].x, epsilon = 1e-7);
        }
    }
}
