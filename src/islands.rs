//! Connected island detection on the target mesh.
//!
//! Disconnected pieces (buttons, shoe soles, accessory parts) each need
//! their own boundary conditions: a harmonic solve cannot propagate
//! displacements across a topological gap. Islands are connected
//! components over vertex adjacency, so two faces sharing only a vertex
//! still land in the same island.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::adjacency::VertexAdjacency;
use crate::correspondence::CorrespondenceSet;

/// An island with match coverage below this fraction is considered
/// poorly matched and eligible for the override policy.
pub const MIN_ISLAND_COVERAGE: f64 = 0.1;

/// One connected component of target vertices.
#[derive(Debug, Clone)]
pub struct Island {
    /// Island id in discovery order.
    pub id: usize,
    /// Member vertices, ascending.
    pub vertices: Vec<u32>,
    /// Number of members with a valid correspondence.
    pub matched: usize,
}

impl Island {
    /// Number of member vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// True if the island has no members (never produced by detection).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Fraction of members with a valid correspondence.
    pub fn coverage(&self) -> f64 {
        if self.vertices.is_empty() {
            0.0
        } else {
            self.matched as f64 / self.vertices.len() as f64
        }
    }
}

/// Result of island detection over a target mesh.
#[derive(Debug, Clone)]
pub struct IslandAnalysis {
    /// Islands in discovery order (lowest unvisited vertex first).
    pub islands: Vec<Island>,
}

impl IslandAnalysis {
    /// Check if the mesh is fully connected (single island).
    pub fn is_connected(&self) -> bool {
        self.islands.len() == 1
    }

    /// Number of islands.
    pub fn island_count(&self) -> usize {
        self.islands.len()
    }
}

impl std::fmt::Display for IslandAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Island Analysis:")?;
        writeln!(f, "  Islands: {}", self.islands.len())?;
        for island in &self.islands {
            writeln!(
                f,
                "    Island {}: {} vertices, {:.1}% matched",
                island.id,
                island.len(),
                100.0 * island.coverage()
            )?;
        }
        Ok(())
    }
}

/// Find all connected islands over vertex adjacency.
///
/// Uses a breadth-first flood fill from each unvisited vertex. Every
/// vertex lands in exactly one island; isolated vertices become
/// single-vertex islands. Discovery order and member order are
/// deterministic for a given mesh.
pub fn detect_islands(adjacency: &VertexAdjacency) -> IslandAnalysis {
    let vertex_count = adjacency.vertex_count();
    let mut visited = vec![false; vertex_count];
    let mut islands: Vec<Island> = Vec::new();

    for start in 0..vertex_count {
        if visited[start] {
            continue;
        }

        let mut members = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(start as u32);
        visited[start] = true;

        while let Some(vertex) = queue.pop_front() {
            members.push(vertex);
            for &neighbor in adjacency.neighbors(vertex as usize) {
                if !visited[neighbor as usize] {
                    visited[neighbor as usize] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        members.sort_unstable();
        islands.push(Island {
            id: islands.len(),
            vertices: members,
            matched: 0,
        });
    }

    info!(
        island_count = islands.len(),
        vertex_count, "Detected connected islands"
    );
    if islands.len() > 1 {
        debug!(
            sizes = ?islands.iter().map(|i| i.len()).collect::<Vec<_>>(),
            "Island sizes"
        );
    }

    IslandAnalysis { islands }
}

/// Fill in per-island match counts from a correspondence set.
pub fn annotate_matches(analysis: &mut IslandAnalysis, correspondence: &CorrespondenceSet) {
    for island in &mut analysis.islands {
        island.matched = island
            .vertices
            .iter()
            .filter(|&&v| correspondence.entries[v as usize].quality.is_matched())
            .count();
    }
}
