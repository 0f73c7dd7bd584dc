//! Constrained harmonic inpainting of unmatched displacements.
//!
//! Matched vertices carry Dirichlet values taken from the source; the
//! displacement over the remaining vertices is the harmonic extension
//! under the chosen Laplacian. Splitting the operator `L` into known
//! (`K`) and unknown (`U`) blocks gives `L_UU x_U = -L_UK x_K`; since
//! the operators here are negative semi-definite, the solver sees the
//! positive semi-definite system `(-L_UU) x_U = L_UK x_K`.
//!
//! Mesh-Laplacian solves run per island so one degenerate piece cannot
//! poison the rest; the point-cloud operator intentionally spans islands
//! and is solved as a single global system.

use nalgebra::Vector3;
use sprs::{CsMat, TriMat};
use tracing::{debug, info, warn};

use crate::adjacency::VertexAdjacency;
use crate::correspondence::CorrespondenceSet;
use crate::error::TransferResult;
use crate::islands::{Island, IslandAnalysis, MIN_ISLAND_COVERAGE};
use crate::laplacian::{
    cotangent_laplacian, pointcloud_laplacian, uniform_laplacian, POINTCLOUD_NEIGHBORS,
};
use crate::params::{IslandPolicy, TransferParams};
use crate::solve::SparseSolverBackend;
use crate::types::{DisplacementField, MeshSnapshot};

/// What the pipeline did with an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandAction {
    /// Unmatched vertices filled by the harmonic solve.
    Solved,
    /// Pinned to zero displacement by the island policy.
    Excluded,
    /// Pinned to the island's best matched displacement.
    Averaged,
    /// The solve did not converge; unmatched vertices fell back to the
    /// island policy (zero when auto handling is off).
    SolveFailed,
}

impl std::fmt::Display for IslandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IslandAction::Solved => "solved",
            IslandAction::Excluded => "excluded",
            IslandAction::Averaged => "averaged",
            IslandAction::SolveFailed => "solve-failed",
        };
        write!(f, "{s}")
    }
}

/// Per-island outcome, reported alongside the displacement field.
#[derive(Debug, Clone)]
pub struct IslandReport {
    pub island_id: usize,
    pub size: usize,
    pub coverage: f64,
    pub action: IslandAction,
}

/// Fill unmatched displacements by constrained harmonic extension.
///
/// Matched correspondences become Dirichlet constraints; islands with no
/// usable constraints get the configured policy instead of an ill-posed
/// solve. Returns the completed field plus one report per island.
pub fn inpaint_displacements(
    target: &MeshSnapshot,
    correspondence: &CorrespondenceSet,
    islands: &IslandAnalysis,
    params: &TransferParams,
    backend: &dyn SparseSolverBackend,
) -> TransferResult<(DisplacementField, Vec<IslandReport>)> {
    let n = target.vertex_count();
    let mut field = DisplacementField::zeros(n);
    let mut known = vec![false; n];

    for (i, entry) in correspondence.entries.iter().enumerate() {
        if let Some(d) = entry.displacement {
            field.set(i, d);
            known[i] = true;
        }
    }

    // Policy pass: pin islands that cannot or should not be solved.
    let mut reports: Vec<IslandReport> = Vec::with_capacity(islands.islands.len());
    let mut solve_islands: Vec<&Island> = Vec::new();

    for island in &islands.islands {
        let coverage = island.coverage();
        let policy = if island.matched == 0 {
            if params.auto_island_handling {
                Some(params.island_policy)
            } else if params.force_point_cloud {
                // The global point-cloud system couples this island to
                // its spatial neighbors, so the solve is still anchored.
                None
            } else {
                warn!(
                    island_id = island.id,
                    size = island.len(),
                    "Island has no matches and auto handling is off; excluding it"
                );
                Some(IslandPolicy::Exclude)
            }
        } else if params.auto_island_handling
            && island.len() <= params.island_size_threshold
            && coverage < MIN_ISLAND_COVERAGE
        {
            Some(params.island_policy)
        } else {
            None
        };

        match policy {
            Some(IslandPolicy::Exclude) => {
                for &v in &island.vertices {
                    field.set(v as usize, Vector3::zeros());
                    known[v as usize] = true;
                }
                debug!(island_id = island.id, size = island.len(), "Island excluded");
                reports.push(IslandReport {
                    island_id: island.id,
                    size: island.len(),
                    coverage,
                    action: IslandAction::Excluded,
                });
            }
            Some(IslandPolicy::Average) => {
                let pinned = best_matched_displacement(island, correspondence);
                for &v in &island.vertices {
                    field.set(v as usize, pinned);
                    known[v as usize] = true;
                }
                debug!(
                    island_id = island.id,
                    size = island.len(),
                    "Island pinned to its best matched displacement"
                );
                reports.push(IslandReport {
                    island_id: island.id,
                    size: island.len(),
                    coverage,
                    action: IslandAction::Averaged,
                });
            }
            None => solve_islands.push(island),
        }
    }

    if params.force_point_cloud {
        solve_global_pointcloud(
            target,
            &mut field,
            &known,
            &solve_islands,
            correspondence,
            params,
            backend,
            &mut reports,
        )?;
    } else {
        for island in &solve_islands {
            let report =
                solve_island(target, &mut field, &known, island, correspondence, params, backend);
            reports.push(report);
        }
    }

    reports.sort_by_key(|r| r.island_id);

    let solved = reports
        .iter()
        .filter(|r| r.action == IslandAction::Solved)
        .count();
    info!(
        islands = reports.len(),
        solved,
        backend = backend.name(),
        "Inpainting complete"
    );

    Ok((field, reports))
}

/// Displacement of the island's best correspondence (lowest distance),
/// or zero if nothing in the island matched.
fn best_matched_displacement(
    island: &Island,
    correspondence: &CorrespondenceSet,
) -> Vector3<f64> {
    let mut best: Option<(f64, Vector3<f64>)> = None;
    for &v in &island.vertices {
        let entry = &correspondence.entries[v as usize];
        if let Some(d) = entry.displacement {
            if best.map_or(true, |(dist, _)| entry.distance < dist) {
                best = Some((entry.distance, d));
            }
        }
    }
    best.map(|(_, d)| d).unwrap_or_else(Vector3::zeros)
}

/// Value pinned to an island's unknowns when its solve fails: the
/// configured policy when auto handling is on, zero otherwise.
fn solve_failure_fallback(
    island: &Island,
    correspondence: &CorrespondenceSet,
    params: &TransferParams,
) -> Vector3<f64> {
    if params.auto_island_handling {
        match params.island_policy {
            IslandPolicy::Exclude => Vector3::zeros(),
            IslandPolicy::Average => best_matched_displacement(island, correspondence),
        }
    } else {
        Vector3::zeros()
    }
}

/// Split `L` against the known mask and assemble the positive
/// semi-definite system over the unknowns.
///
/// `unknown_of[i]` carries the solve index of row `i`, or `None` when
/// the row is a Dirichlet constraint. Returns `A = -L_UU` and the three
/// per-axis right-hand sides `b = L_UK x_K`.
fn constrained_system(
    l: &CsMat<f64>,
    unknown_of: &[Option<usize>],
    values: &[Vector3<f64>],
    unknown_count: usize,
) -> (CsMat<f64>, [Vec<f64>; 3]) {
    let mut a = TriMat::new((unknown_count, unknown_count));
    let mut b = [
        vec![0.0; unknown_count],
        vec![0.0; unknown_count],
        vec![0.0; unknown_count],
    ];

    for (i, row) in l.outer_iterator().enumerate() {
        let Some(ui) = unknown_of[i] else { continue };
        for (j, &v) in row.iter() {
            match unknown_of[j] {
                Some(uj) => a.add_triplet(ui, uj, -v),
                None => {
                    let x = values[j];
                    b[0][ui] += v * x.x;
                    b[1][ui] += v * x.y;
                    b[2][ui] += v * x.z;
                }
            }
        }
    }

    (a.to_csr(), b)
}

/// Solve one island with a mesh Laplacian over its own submesh.
fn solve_island(
    target: &MeshSnapshot,
    field: &mut DisplacementField,
    known: &[bool],
    island: &Island,
    correspondence: &CorrespondenceSet,
    params: &TransferParams,
    backend: &dyn SparseSolverBackend,
) -> IslandReport {
    let report = |action| IslandReport {
        island_id: island.id,
        size: island.len(),
        coverage: island.coverage(),
        action,
    };

    let unknowns: Vec<u32> = island
        .vertices
        .iter()
        .copied()
        .filter(|&v| !known[v as usize])
        .collect();
    if unknowns.is_empty() {
        return report(IslandAction::Solved);
    }

    // Remap the island to local indices and collect its faces.
    let m = island.len();
    let mut local_of = hashbrown::HashMap::with_capacity(m);
    let mut local_positions = Vec::with_capacity(m);
    let mut local_values = Vec::with_capacity(m);
    let mut local_known = vec![false; m];
    for (li, &v) in island.vertices.iter().enumerate() {
        local_of.insert(v, li as u32);
        local_positions.push(target.positions()[v as usize]);
        local_values.push(field.get(v as usize));
        local_known[li] = known[v as usize];
    }
    let local_faces: Vec<[u32; 3]> = target
        .faces()
        .iter()
        .filter_map(|face| {
            Some([
                *local_of.get(&face[0])?,
                *local_of.get(&face[1])?,
                *local_of.get(&face[2])?,
            ])
        })
        .collect();

    let l = match cotangent_laplacian(&local_positions, &local_faces) {
        Ok(l) => l,
        Err(err) => {
            warn!(
                island_id = island.id,
                %err,
                "Cotangent operator failed; falling back to uniform weights"
            );
            uniform_laplacian(&VertexAdjacency::build(m, &local_faces))
        }
    };

    let mut unknown_of = vec![None; m];
    for (ui, &v) in unknowns.iter().enumerate() {
        unknown_of[local_of[&v] as usize] = Some(ui);
    }
    let (a, b) = constrained_system(&l, &unknown_of, &local_values, unknowns.len());

    let mut solutions = Vec::with_capacity(3);
    for rhs in &b {
        match backend.solve(&a, rhs) {
            Ok(x) => solutions.push(x),
            Err(failure) => {
                let fallback = solve_failure_fallback(island, correspondence, params);
                warn!(
                    island_id = island.id,
                    unknowns = unknowns.len(),
                    %failure,
                    "Island solve failed; pinning unmatched vertices to the policy fallback"
                );
                for &v in &unknowns {
                    field.set(v as usize, fallback);
                }
                return report(IslandAction::SolveFailed);
            }
        }
    }

    for (ui, &v) in unknowns.iter().enumerate() {
        field.set(
            v as usize,
            Vector3::new(solutions[0][ui], solutions[1][ui], solutions[2][ui]),
        );
    }

    debug!(
        island_id = island.id,
        unknowns = unknowns.len(),
        "Island solved"
    );
    report(IslandAction::Solved)
}

/// Solve all remaining unknowns as one system under the point-cloud
/// operator. Proximity edges carry constraints across island gaps.
fn solve_global_pointcloud(
    target: &MeshSnapshot,
    field: &mut DisplacementField,
    known: &[bool],
    solve_islands: &[&Island],
    correspondence: &CorrespondenceSet,
    params: &TransferParams,
    backend: &dyn SparseSolverBackend,
    reports: &mut Vec<IslandReport>,
) -> TransferResult<()> {
    let report = |island: &Island, action| IslandReport {
        island_id: island.id,
        size: island.len(),
        coverage: island.coverage(),
        action,
    };

    let n = target.vertex_count();
    let unknowns: Vec<u32> = (0..n as u32).filter(|&v| !known[v as usize]).collect();
    if unknowns.is_empty() {
        for island in solve_islands {
            reports.push(report(island, IslandAction::Solved));
        }
        return Ok(());
    }

    let l = pointcloud_laplacian(target.positions(), POINTCLOUD_NEIGHBORS)?;

    let mut unknown_of = vec![None; n];
    for (ui, &v) in unknowns.iter().enumerate() {
        unknown_of[v as usize] = Some(ui);
    }
    let (a, b) = constrained_system(&l, &unknown_of, field.as_slice(), unknowns.len());

    let mut solutions = Vec::with_capacity(3);
    for rhs in &b {
        match backend.solve(&a, rhs) {
            Ok(x) => solutions.push(x),
            Err(failure) => {
                warn!(
                    unknowns = unknowns.len(),
                    %failure,
                    "Point-cloud solve failed; pinning unmatched vertices to the policy fallback"
                );
                for island in solve_islands {
                    let fallback = solve_failure_fallback(island, correspondence, params);
                    for &v in &island.vertices {
                        if !known[v as usize] {
                            field.set(v as usize, fallback);
                        }
                    }
                    reports.push(report(island, IslandAction::SolveFailed));
                }
                return Ok(());
            }
        }
    }

    for (ui, &v) in unknowns.iter().enumerate() {
        field.set(
            v as usize,
            Vector3::new(solutions[0][ui], solutions[1][ui], solutions[2][ui]),
        );
    }
    for island in solve_islands {
        reports.push(report(island, IslandAction::Solved));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::{Correspondence, MatchQuality};
    use crate::islands::{annotate_matches, detect_islands};
    use crate::solve::{ConjugateGradient, SolveFailure};
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    /// Backend that never converges, for exercising the failure paths.
    struct NonConverging;

    impl SparseSolverBackend for NonConverging {
        fn name(&self) -> &'static str {
            "non-converging"
        }

        fn solve(&self, _a: &CsMat<f64>, _b: &[f64]) -> Result<Vec<f64>, SolveFailure> {
            Err(SolveFailure {
                iterations: 0,
                residual: f64::NAN,
            })
        }
    }

    fn matched(d: Vector3<f64>) -> Correspondence {
        Correspondence {
            displacement: Some(d),
            distance: 0.001,
            normal_alignment: 1.0,
            quality: MatchQuality::Perfect,
        }
    }

    fn unmatched() -> Correspondence {
        Correspondence {
            displacement: None,
            distance: 1.0,
            normal_alignment: 0.0,
            quality: MatchQuality::Unmatched,
        }
    }

    /// A strip of 5 vertices in a line, triangulated against a parallel
    /// row, with the middle vertices unmatched.
    fn strip() -> MeshSnapshot {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(1.5, 1.0, 0.0),
            Point3::new(2.5, 1.0, 0.0),
        ];
        let normals = vec![Vector3::new(0.0, 0.0, 1.0); 7];
        let faces = vec![
            [0, 1, 4],
            [1, 5, 4],
            [1, 2, 5],
            [2, 6, 5],
            [2, 3, 6],
        ];
        MeshSnapshot::new(positions, normals, faces).unwrap()
    }

    fn build_set(entries: Vec<Correspondence>) -> CorrespondenceSet {
        let matched = entries.iter().filter(|c| c.quality.is_matched()).count();
        CorrespondenceSet { entries, matched }
    }

    #[test]
    fn test_all_matched_passthrough() {
        let target = strip();
        let d = Vector3::new(0.0, 0.0, 0.5);
        let set = build_set(vec![matched(d); 7]);
        let adj = VertexAdjacency::build(7, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let backend = ConjugateGradient::default();
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &TransferParams::default(), &backend)
                .unwrap();

        for i in 0..7 {
            assert_relative_eq!(field.get(i).z, 0.5, epsilon = 1e-9);
        }
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].action, IslandAction::Solved);
    }

    #[test]
    fn test_constant_boundary_gives_constant_interior() {
        // Harmonic extension of a constant is that constant.
        let target = strip();
        let d = Vector3::new(0.1, -0.2, 0.3);
        let mut entries = vec![matched(d); 7];
        entries[1] = unmatched();
        entries[2] = unmatched();
        entries[5] = unmatched();
        let set = build_set(entries);
        let adj = VertexAdjacency::build(7, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let backend = ConjugateGradient::default();
        let (field, _) =
            inpaint_displacements(&target, &set, &islands, &TransferParams::default(), &backend)
                .unwrap();

        for i in 0..7 {
            assert_relative_eq!(field.get(i).x, d.x, epsilon = 1e-7);
            assert_relative_eq!(field.get(i).y, d.y, epsilon = 1e-7);
            assert_relative_eq!(field.get(i).z, d.z, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_interpolated_value_between_boundary_values() {
        let target = strip();
        let mut entries: Vec<Correspondence> = Vec::new();
        for i in 0..7 {
            // Ends at z=0, z=1; interior unmatched.
            match i {
                0 | 4 => entries.push(matched(Vector3::zeros())),
                3 | 6 => entries.push(matched(Vector3::new(0.0, 0.0, 1.0))),
                _ => entries.push(unmatched()),
            }
        }
        let set = build_set(entries);
        let adj = VertexAdjacency::build(7, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let backend = ConjugateGradient::default();
        let (field, _) =
            inpaint_displacements(&target, &set, &islands, &TransferParams::default(), &backend)
                .unwrap();

        // Discrete maximum principle: interior values stay inside the
        // boundary range.
        for i in [1usize, 2, 5] {
            let z = field.get(i).z;
            assert!(z > 0.0 && z < 1.0, "vertex {i} got z = {z}");
        }
        // Monotone along the strip.
        assert!(field.get(1).z < field.get(2).z);
    }

    #[test]
    fn test_unmatched_island_averaged() {
        // Two disconnected triangles; second has no matches.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(11.0, 0.0, 0.0),
            Point3::new(10.0, 1.0, 0.0),
        ];
        let target = MeshSnapshot::new(
            positions,
            vec![Vector3::new(0.0, 0.0, 1.0); 6],
            vec![[0, 1, 2], [3, 4, 5]],
        )
        .unwrap();
        let d = Vector3::new(0.0, 0.0, 0.7);
        let set = build_set(vec![
            matched(d),
            matched(d),
            matched(d),
            unmatched(),
            unmatched(),
            unmatched(),
        ]);
        let adj = VertexAdjacency::build(6, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let params = TransferParams::default(); // Average policy
        let backend = ConjugateGradient::default();
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &params, &backend).unwrap();

        // Second island had no match at all, so Average pins zero.
        for i in 3..6 {
            assert_relative_eq!(field.get(i).norm(), 0.0);
        }
        assert_eq!(reports[1].action, IslandAction::Averaged);
        // First island untouched.
        for i in 0..3 {
            assert_relative_eq!(field.get(i).z, 0.7);
        }
    }

    #[test]
    fn test_unmatched_island_excluded_without_auto_handling() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(11.0, 0.0, 0.0),
            Point3::new(10.0, 1.0, 0.0),
        ];
        let target = MeshSnapshot::new(
            positions,
            vec![Vector3::new(0.0, 0.0, 1.0); 6],
            vec![[0, 1, 2], [3, 4, 5]],
        )
        .unwrap();
        let set = build_set(vec![
            matched(Vector3::new(0.0, 0.0, 1.0)),
            matched(Vector3::new(0.0, 0.0, 1.0)),
            matched(Vector3::new(0.0, 0.0, 1.0)),
            unmatched(),
            unmatched(),
            unmatched(),
        ]);
        let adj = VertexAdjacency::build(6, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let params = TransferParams {
            auto_island_handling: false,
            ..Default::default()
        };
        let backend = ConjugateGradient::default();
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &params, &backend).unwrap();

        assert_eq!(reports[1].action, IslandAction::Excluded);
        for i in 3..6 {
            assert!(field.get(i).norm().is_finite());
            assert_relative_eq!(field.get(i).norm(), 0.0);
        }
    }

    #[test]
    fn test_single_match_anchors_island_solve() {
        // Quad strip of 10 vertices with exactly one matched vertex:
        // coverage sits at the floor (0.1), so the island is solved,
        // and the single Dirichlet value propagates everywhere.
        let mut positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        for col in 0..5 {
            let x = 10.0 + col as f64;
            positions.push(Point3::new(x, 0.0, 0.0));
            positions.push(Point3::new(x, 1.0, 0.0));
        }
        let mut faces = vec![[0u32, 1, 2]];
        // Strip over vertices 3..=12, one quad per column pair.
        for i in 0..4 {
            let a = 3 + i * 2;
            faces.push([a, a + 2, a + 1]);
            faces.push([a + 1, a + 2, a + 3]);
        }
        let target = MeshSnapshot::new(
            positions,
            vec![Vector3::new(0.0, 0.0, 1.0); 13],
            faces,
        )
        .unwrap();

        let pinned = Vector3::new(0.0, 0.0, 0.42);
        let mut entries = vec![
            matched(Vector3::new(0.0, 0.0, 1.0)),
            matched(Vector3::new(0.0, 0.0, 1.0)),
            matched(Vector3::new(0.0, 0.0, 1.0)),
        ];
        entries.push(matched(pinned)); // vertex 3: the only match in island 1
        entries.extend(std::iter::repeat_with(unmatched).take(9));
        let set = build_set(entries);

        let adj = VertexAdjacency::build(13, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);
        // 1 match out of 10: coverage 0.1 is not below the floor, so
        // the island stays on the solve path.
        assert_eq!(islands.islands[1].len(), 10);
        assert!(islands.islands[1].coverage() >= MIN_ISLAND_COVERAGE);

        let backend = ConjugateGradient::default();
        let (field, reports) = inpaint_displacements(
            &target,
            &set,
            &islands,
            &TransferParams::default(),
            &backend,
        )
        .unwrap();

        // Coverage at the floor: solved, not averaged, anchored by the
        // single match so the island converges to it.
        assert_eq!(reports[1].action, IslandAction::Solved);
        for i in 3..13 {
            assert_relative_eq!(field.get(i).z, 0.42, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_failed_solve_falls_back_to_island_policy() {
        // One match out of 7 keeps the island on the solve path; when
        // the backend gives up, the Average policy pins the unmatched
        // vertices to the best matched displacement instead of zero.
        let target = strip();
        let d = Vector3::new(0.0, 0.0, 0.9);
        let mut entries = vec![unmatched(); 7];
        entries[0] = matched(d);
        let set = build_set(entries);
        let adj = VertexAdjacency::build(7, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);
        assert!(islands.islands[0].coverage() >= MIN_ISLAND_COVERAGE);

        let params = TransferParams::default(); // auto handling, Average
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &params, &NonConverging).unwrap();

        assert_eq!(reports[0].action, IslandAction::SolveFailed);
        for i in 0..7 {
            assert_relative_eq!(field.get(i).z, 0.9);
        }
    }

    #[test]
    fn test_failed_solve_zeroes_without_auto_handling() {
        let target = strip();
        let mut entries = vec![unmatched(); 7];
        entries[0] = matched(Vector3::new(0.0, 0.0, 0.9));
        let set = build_set(entries);
        let adj = VertexAdjacency::build(7, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let params = TransferParams {
            auto_island_handling: false,
            ..Default::default()
        };
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &params, &NonConverging).unwrap();

        assert_eq!(reports[0].action, IslandAction::SolveFailed);
        assert_relative_eq!(field.get(0).z, 0.9);
        for i in 1..7 {
            assert_relative_eq!(field.get(i).norm(), 0.0);
        }
    }

    #[test]
    fn test_failed_pointcloud_solve_falls_back_to_island_policy() {
        // Three islands; the middle one is partially matched and stays on
        // the solve path. A failing global solve must pin its unmatched
        // vertices to the island's own best match.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(11.0, 0.0, 0.0),
            Point3::new(10.0, 1.0, 0.0),
        ];
        let target = MeshSnapshot::new(
            positions,
            vec![Vector3::new(0.0, 0.0, 1.0); 9],
            vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]],
        )
        .unwrap();
        let d = Vector3::new(0.0, 0.0, 0.6);
        let mut entries = vec![matched(Vector3::new(0.0, 0.0, 0.1)); 9];
        entries[3] = matched(d);
        entries[4] = unmatched();
        entries[5] = unmatched();
        let set = build_set(entries);
        let adj = VertexAdjacency::build(9, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let params = TransferParams {
            force_point_cloud: true,
            ..Default::default()
        };
        let (field, reports) =
            inpaint_displacements(&target, &set, &islands, &params, &NonConverging).unwrap();

        assert_eq!(reports[1].action, IslandAction::SolveFailed);
        assert_relative_eq!(field.get(4).z, 0.6);
        assert_relative_eq!(field.get(5).z, 0.6);
        // Fully matched islands are untouched by the failure.
        for i in [0usize, 1, 2, 6, 7, 8] {
            assert_relative_eq!(field.get(i).z, 0.1);
        }
    }

    #[test]
    fn test_pointcloud_path_bridges_islands() {
        // Two nearby triangles; force_point_cloud couples them so the
        // unmatched one picks up its neighbor's displacement.
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(1.1, 0.1, 0.0),
            Point3::new(0.1, 1.1, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let target = MeshSnapshot::new(
            positions,
            vec![Vector3::new(0.0, 0.0, 1.0); 9],
            vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]],
        )
        .unwrap();

        let d = Vector3::new(0.0, 0.0, 0.5);
        let mut entries = vec![matched(d); 9];
        entries[3] = unmatched();
        entries[4] = unmatched();
        entries[5] = unmatched();
        let set = build_set(entries);

        let adj = VertexAdjacency::build(9, target.faces());
        let mut islands = detect_islands(&adj);
        annotate_matches(&mut islands, &set);

        let params = TransferParams {
            force_point_cloud: true,
            auto_island_handling: false,
            ..Default::default()
        };
        let backend = ConjugateGradient::default();
        let (field, _) =
            inpaint_displacements(&target, &set, &islands, &params, &backend).unwrap();

        // Everything matched carries 0.5; the coupled solve pulls the
        // unmatched triangle to the same constant.
        for i in 3..6 {
            assert_relative_eq!(field.get(i).z, 0.5, epsilon = 1e-6);
        }
    }
}
