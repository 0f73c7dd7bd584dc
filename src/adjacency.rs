//! Vertex adjacency from a triangle list.
//!
//! Both the island walk and the uniform/smoothing weights need the
//! one-ring of every vertex; we build it once per transfer and share it.

use hashbrown::HashSet;

/// Undirected vertex adjacency of a triangle mesh.
#[derive(Debug, Clone)]
pub struct VertexAdjacency {
    /// Neighbor lists, sorted ascending, no duplicates.
    neighbors: Vec<Vec<u32>>,
    /// Unique undirected edges as `[lo, hi]` pairs.
    edges: Vec<[u32; 2]>,
}

impl VertexAdjacency {
    /// Build adjacency for `vertex_count` vertices from a triangle list.
    ///
    /// Face indices are assumed in range (snapshots validate this at
    /// construction). Isolated vertices get empty neighbor lists.
    pub fn build(vertex_count: usize, faces: &[[u32; 3]]) -> Self {
        let mut seen: HashSet<[u32; 2]> = HashSet::with_capacity(faces.len() * 3);
        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
        let mut edges: Vec<[u32; 2]> = Vec::with_capacity(faces.len() * 3 / 2);

        for face in faces {
            for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
                let key = if a < b { [a, b] } else { [b, a] };
                if a != b && seen.insert(key) {
                    neighbors[a as usize].push(b);
                    neighbors[b as usize].push(a);
                    edges.push(key);
                }
            }
        }

        // Deterministic ordering regardless of face order.
        for list in &mut neighbors {
            list.sort_unstable();
        }
        edges.sort_unstable();

        Self { neighbors, edges }
    }

    /// Number of vertices covered.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.neighbors.len()
    }

    /// One-ring neighbors of a vertex, sorted ascending.
    #[inline]
    pub fn neighbors(&self, vertex: usize) -> &[u32] {
        &self.neighbors[vertex]
    }

    /// All unique undirected edges.
    #[inline]
    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }
}
