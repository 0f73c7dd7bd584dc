//! Robust shape key transfer between meshes with different topology.
//!
//! A shape key (blend shape, morph target) is a per-vertex displacement
//! field on top of a mesh's base shape. This crate transfers such fields
//! from a source mesh onto a target mesh with a different vertex count
//! and triangulation, e.g. from a character body onto a fitted garment.
//!
//! # Pipeline
//!
//! 1. **Correspondence**: each target vertex is projected onto the source
//!    surface and picks up a barycentrically interpolated displacement,
//!    validated against distance and normal-alignment thresholds.
//! 2. **Islands**: disconnected pieces of the target are detected so each
//!    gets its own boundary conditions.
//! 3. **Inpainting**: unmatched vertices are filled by a constrained
//!    harmonic solve under a cotangent (or point-cloud, or uniform)
//!    Laplacian, with matched vertices as Dirichlet constraints.
//! 4. **Smoothing / visualization** (optional): extra relaxation over the
//!    inpainted region and per-vertex match-quality colors.
//!
//! # Quick Start
//!
//! ```
//! use nalgebra::{Point3, Vector3};
//! use shapekey_transfer::{transfer, DisplacementField, MeshSnapshot, TransferParams};
//!
//! // A unit quad with every vertex displaced 0.1 along +Z.
//! let source = MeshSnapshot::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![Vector3::new(0.0, 0.0, 1.0); 4],
//!     vec![[0, 1, 2], [0, 2, 3]],
//! )
//! .unwrap();
//! let field = DisplacementField::new(vec![Vector3::new(0.0, 0.0, 0.1); 4]);
//!
//! // Transferring onto the same geometry reproduces the field.
//! let outcome = transfer(&source, &source, &field, &TransferParams::default()).unwrap();
//! assert_eq!(outcome.report.matched_vertices, 4);
//! ```
//!
//! # Units and Thresholds
//!
//! All geometry is in world units; the thresholds in [`TransferParams`]
//! are expressed in the same units. The defaults (distance `0.01`,
//! normal alignment `0.5`) suit meter-scale character meshes; use
//! [`TransferParams::strict`] or [`TransferParams::relaxed`] as starting
//! points for tighter or looser fits.
//!
//! # Error Handling
//!
//! Operations return [`TransferResult`]. Global failures (invalid
//! configuration, no correspondence at all) surface as a
//! [`TransferError`] with a machine-readable `XFER-XXXX` code; local
//! failures (one island failing to solve) degrade gracefully and are
//! recorded in the per-island reports of [`TransferOutcome`].

pub mod adjacency;
pub mod correspondence;
mod error;
pub mod inpaint;
pub mod islands;
pub mod laplacian;
mod params;
pub mod provider;
pub mod quality;
pub mod smoothing;
pub mod solve;
mod transfer;
mod types;

// Re-export core types at crate root
pub use error::{ErrorCode, TransferError, TransferResult};
pub use params::{IslandPolicy, TransferParams};
pub use types::{DisplacementField, MeshSnapshot, VertexColor};

// The pipeline entry points
pub use transfer::{transfer, transfer_with_backend, TransferOutcome, TransferReport};

// Commonly used pieces of the pipeline
pub use adjacency::VertexAdjacency;
pub use correspondence::{
    find_correspondence, Correspondence, CorrespondenceSet, MatchQuality,
};
pub use inpaint::{inpaint_displacements, IslandAction, IslandReport};
pub use islands::{annotate_matches, detect_islands, Island, IslandAnalysis};
pub use laplacian::{cotangent_laplacian, pointcloud_laplacian, uniform_laplacian};
pub use provider::{transfer_shape_key, InMemoryMesh, MeshDataProvider};
pub use quality::quality_colors;
pub use smoothing::smooth_unmatched;
pub use solve::{ConjugateGradient, GaussSeidel, SolveFailure, SparseSolverBackend};
