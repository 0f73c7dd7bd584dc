//! Transfer parameters.
//!
//! Every knob of the pipeline lives in one immutable [`TransferParams`]
//! struct supplied per call; no global settings object leaks into the core.

use crate::error::{TransferError, TransferResult};

/// What to do with an island that cannot be solved harmonically
/// (no matched vertices to anchor it, or too few to trust).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandPolicy {
    /// Reset the island's displacement to zero, leaving it at its base
    /// position.
    Exclude,
    /// Assign every vertex of the island the displacement of the island's
    /// best correspondence, or zero if it has none.
    Average,
}

/// Parameters for a single transfer invocation.
#[derive(Debug, Clone)]
pub struct TransferParams {
    /// Maximum distance from a target vertex to the source surface for a
    /// valid match, in world units. Must be > 0.
    pub distance_threshold: f64,

    /// Minimum normal alignment (|cosine|) for a valid match, in [0, 1].
    /// The absolute value tolerates inward/outward-flipped normals on
    /// either mesh.
    pub normal_threshold: f64,

    /// Detect poorly-matched islands and apply `island_policy` to them
    /// instead of attempting an ill-posed solve.
    pub auto_island_handling: bool,

    /// Always use the k-NN point-cloud Laplacian instead of the cotangent
    /// operator. Slower and less faithful, but robust on disconnected or
    /// badly triangulated meshes.
    pub force_point_cloud: bool,

    /// Policy applied to poorly-matched islands when `auto_island_handling`
    /// is set.
    pub island_policy: IslandPolicy,

    /// Islands with at most this many vertices are eligible for the
    /// override policy when their match coverage is poor. Must be >= 1.
    pub island_size_threshold: usize,

    /// Extra passes of edge-weighted smoothing over unmatched vertices
    /// after the solve. Zero (the default) is a no-op; inpainting rarely
    /// needs it.
    pub post_smooth_iterations: usize,

    /// Produce a per-vertex match-quality color array alongside the result.
    pub debug_visualization: bool,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.01,
            normal_threshold: 0.5,
            auto_island_handling: true,
            force_point_cloud: false,
            island_policy: IslandPolicy::Average,
            island_size_threshold: 500,
            post_smooth_iterations: 0,
            debug_visualization: false,
        }
    }
}

impl TransferParams {
    /// Tight thresholds for closely fitting meshes (e.g. a second skin).
    pub fn strict() -> Self {
        Self {
            distance_threshold: 0.005,
            normal_threshold: 0.7,
            ..Default::default()
        }
    }

    /// Loose thresholds for loosely fitting meshes (e.g. baggy garments).
    pub fn relaxed() -> Self {
        Self {
            distance_threshold: 0.05,
            normal_threshold: 0.3,
            ..Default::default()
        }
    }

    /// Set the distance threshold.
    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    /// Set the normal alignment threshold.
    pub fn with_normal_threshold(mut self, threshold: f64) -> Self {
        self.normal_threshold = threshold;
        self
    }

    /// Set the island policy.
    pub fn with_island_policy(mut self, policy: IslandPolicy) -> Self {
        self.island_policy = policy;
        self
    }

    /// Set the post-smoothing iteration count.
    pub fn with_post_smooth_iterations(mut self, iterations: usize) -> Self {
        self.post_smooth_iterations = iterations;
        self
    }

    /// Reject out-of-range values before any computation starts.
    pub fn validate(&self) -> TransferResult<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(TransferError::invalid_config(format!(
                "distance_threshold must be > 0, got {}",
                self.distance_threshold
            )));
        }
        if !self.normal_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.normal_threshold)
        {
            return Err(TransferError::invalid_config(format!(
                "normal_threshold must be in [0, 1], got {}",
                self.normal_threshold
            )));
        }
        if self.island_size_threshold == 0 {
            return Err(TransferError::invalid_config(
                "island_size_threshold must be >= 1",
            ));
        }
        Ok(())
    }
}
