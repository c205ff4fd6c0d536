//! Mesh diagnostics.
//!
//! A [`MeshDiagnostics`] summarizes a finished [`Mesh`]: sizes, the work the
//! assembly dedup window did, and the edge topology of its triangle
//! submeshes. It is cheap enough to compute after every build in tests and
//! in the CLI.
//!
//! # Example
//!
//! ```ignore
//! use mesh_engine::geom::{Mesh, PrimitiveMode};
//!
//! let mut mesh = Mesh::new();
//! // ... build ...
//! let diagnostics = mesh.diagnostics();
//! if !diagnostics.is_watertight() {
//!     println!("mesh has {} open edges", diagnostics.open_edge_count);
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use super::format::PrimitiveKind;
use super::mesh::Mesh;
use super::submesh::position_key;

/// Counts and topology report for a mesh.
///
/// # Topology Metrics
///
/// Edges are keyed by the exact positions of their endpoints, so two
/// triangles sharing an edge through duplicated vertices still count as
/// neighbours.
///
/// - `open_edge_count`: edges used by exactly one triangle
/// - `non_manifold_edge_count`: edges used by more than two triangles
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshDiagnostics {
    pub submesh_count: usize,

    /// Total number of vertices across all submeshes.
    pub vertex_count: usize,

    /// Total number of primitives (triangles, lines and points).
    pub primitive_count: usize,

    /// Triangles among `primitive_count`.
    pub triangle_count: usize,

    /// Triangles dropped during assembly because two of their corners
    /// shared a position.
    pub degenerate_triangle_count: usize,

    /// Triangle corners redirected to an identical earlier vertex by the
    /// assembly dedup window.
    pub reused_vertex_count: usize,

    /// Number of open (boundary) edges over the triangle submeshes.
    ///
    /// A closed surface has zero open edges.
    pub open_edge_count: usize,

    /// Number of edges shared by more than two triangles.
    pub non_manifold_edge_count: usize,

    /// Human-readable warnings, for example "mesh has open edges".
    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects diagnostics for `mesh`.
    #[must_use]
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let mut diagnostics = Self {
            submesh_count: mesh.submeshes().len(),
            vertex_count: mesh.vertex_count(),
            primitive_count: mesh.primitive_count(),
            ..Self::default()
        };

        let mut edge_uses: HashMap<([u64; 3], [u64; 3]), usize> = HashMap::new();
        for submesh in mesh.submeshes() {
            diagnostics.degenerate_triangle_count += submesh.degenerate_triangle_count();
            diagnostics.reused_vertex_count += submesh.reused_vertex_count();
            if submesh.primitive_type() != PrimitiveKind::Triangles {
                continue;
            }
            diagnostics.triangle_count += submesh.primitive_count();

            for tri in submesh.indices().chunks_exact(3) {
                let keys = [tri[0], tri[1], tri[2]].map(|i| position_key(submesh.position(i as usize)));
                for (a, b) in [(keys[0], keys[1]), (keys[1], keys[2]), (keys[2], keys[0])] {
                    let edge = if a <= b { (a, b) } else { (b, a) };
                    *edge_uses.entry(edge).or_insert(0) += 1;
                }
            }
        }

        diagnostics.open_edge_count = edge_uses.values().filter(|&&uses| uses == 1).count();
        diagnostics.non_manifold_edge_count = edge_uses.values().filter(|&&uses| uses > 2).count();

        if diagnostics.open_edge_count > 0 {
            diagnostics.add_warning("mesh has open edges");
        }
        if diagnostics.non_manifold_edge_count > 0 {
            diagnostics.add_warning("mesh has non-manifold edges");
        }
        diagnostics
    }

    /// Returns `true` if the triangle submeshes have no open edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.open_edge_count == 0
    }

    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    /// Returns `true` if nothing was dropped during assembly and the
    /// topology is closed and manifold.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.is_watertight()
            && self.is_manifold()
            && self.degenerate_triangle_count == 0
            && self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Sums counts and appends warnings from `other`.
    pub fn merge(&mut self, other: &MeshDiagnostics) {
        self.submesh_count += other.submesh_count;
        self.vertex_count += other.vertex_count;
        self.primitive_count += other.primitive_count;
        self.triangle_count += other.triangle_count;
        self.degenerate_triangle_count += other.degenerate_triangle_count;
        self.reused_vertex_count += other.reused_vertex_count;
        self.open_edge_count += other.open_edge_count;
        self.non_manifold_edge_count += other.non_manifold_edge_count;
        self.warnings.extend(other.warnings.iter().cloned());
    }

    /// Returns a short summary string suitable for logging.
    ///
    /// Format: `"V:{vertices} P:{primitives} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} P:{}", self.vertex_count, self.primitive_count)];

        if self.reused_vertex_count > 0 {
            parts.push(format!("reused:{}", self.reused_vertex_count));
        }
        if self.degenerate_triangle_count > 0 {
            parts.push(format!("degenerate:{}", self.degenerate_triangle_count));
        }
        if self.open_edge_count > 0 {
            parts.push(format!("open:{}", self.open_edge_count));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }

        parts.join(" ")
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Submeshes: {}", self.submesh_count)?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Primitives: {}", self.primitive_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;

        if self.reused_vertex_count > 0 || self.degenerate_triangle_count > 0 {
            writeln!(f, "  Assembly:")?;
            if self.reused_vertex_count > 0 {
                writeln!(f, "    - Reused vertices: {}", self.reused_vertex_count)?;
            }
            if self.degenerate_triangle_count > 0 {
                writeln!(f, "    - Degenerate triangles dropped: {}", self.degenerate_triangle_count)?;
            }
        }

        if self.open_edge_count > 0 || self.non_manifold_edge_count > 0 {
            writeln!(f, "  Topology issues:")?;
            if self.open_edge_count > 0 {
                writeln!(f, "    - Open edges: {}", self.open_edge_count)?;
            }
            if self.non_manifold_edge_count > 0 {
                writeln!(f, "    - Non-manifold edges: {}", self.non_manifold_edge_count)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {}", warning)?;
            }
        }

        let status = if self.is_clean() {
            "CLEAN"
        } else if self.is_watertight() && self.is_manifold() {
            "CLOSED (with assembly fixes)"
        } else {
            "ISSUES DETECTED"
        };
        writeln!(f, "  Status: {}", status)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = MeshDiagnostics::default();
        assert!(diag.is_clean());
        assert!(diag.is_watertight());
        assert!(diag.is_manifold());
    }

    #[test]
    fn test_open_edges_not_watertight() {
        let diag = MeshDiagnostics {
            open_edge_count: 3,
            ..Default::default()
        };
        assert!(!diag.is_watertight());
        assert!(diag.is_manifold());
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_merge() {
        let mut diag1 = MeshDiagnostics {
            vertex_count: 100,
            primitive_count: 50,
            open_edge_count: 2,
            warnings: vec!["first warning".to_string()],
            ..Default::default()
        };
        let diag2 = MeshDiagnostics {
            vertex_count: 200,
            primitive_count: 100,
            open_edge_count: 3,
            warnings: vec!["second warning".to_string()],
            ..Default::default()
        };

        diag1.merge(&diag2);

        assert_eq!(diag1.vertex_count, 300);
        assert_eq!(diag1.primitive_count, 150);
        assert_eq!(diag1.open_edge_count, 5);
        assert_eq!(diag1.warnings.len(), 2);
    }

    #[test]
    fn test_summary_and_display() {
        let diag = MeshDiagnostics {
            vertex_count: 100,
            primitive_count: 50,
            reused_vertex_count: 5,
            open_edge_count: 2,
            warnings: vec!["mesh has open edges".to_string()],
            ..Default::default()
        };

        let summary = diag.summary();
        assert!(summary.contains("V:100"));
        assert!(summary.contains("P:50"));
        assert!(summary.contains("reused:5"));
        assert!(summary.contains("open:2"));

        let output = format!("{}", diag);
        assert!(output.contains("Open edges: 2"));
        assert!(output.contains("mesh has open edges"));
        assert!(output.contains("ISSUES DETECTED"));
    }
}
