use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::core::{Matrix3, Point3, Transform, Vec3};
use super::format::{PrimitiveKind, PrimitiveMode, VertexFormat, relayout_vertices};
use super::mesh::MeshError;

/// The "current" per-vertex attributes a [`Mesh`](super::Mesh) applies to
/// every vertex it receives.
///
/// Values are sticky: they stay in effect until changed. `defined` records
/// which attributes were set at least once; only those are added to a
/// submesh layout when a vertex is pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttributeState {
    pub normal: [f64; 3],
    pub color: [f64; 3],
    pub uv: [f64; 2],
    pub tangent: [f64; 3],
    pub bitangent: [f64; 3],
    pub defined: VertexFormat,
}

impl Default for VertexAttributeState {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            color: [0.0; 3],
            uv: [0.0; 2],
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
            defined: VertexFormat::EMPTY,
        }
    }
}

/// One contiguous, fixed-stride vertex buffer plus the index buffer of a
/// single primitive kind.
///
/// The vertex buffer is reference counted so that a wireframe derived with
/// [`to_wire_frame`](Self::to_wire_frame) shares it without copying; any
/// later mutation of either side copies the buffer first.
#[derive(Debug, Clone, PartialEq)]
pub struct SubMesh {
    vertices: Arc<Vec<f64>>,
    indices: Vec<u32>,
    format: VertexFormat,
    /// Vertex index at which the current strip/fan/list started.
    primitive_start: usize,
    degenerate_triangles: usize,
    reused_vertices: usize,
}

impl SubMesh {
    /// How many preceding vertices the triangle dedup scan looks at.
    pub const DEDUP_WINDOW: usize = 16;

    pub fn new(format: VertexFormat) -> Result<Self, MeshError> {
        Ok(Self {
            vertices: Arc::new(Vec::new()),
            indices: Vec::new(),
            format: format.validate()?,
            primitive_start: 0,
            degenerate_triangles: 0,
            reused_vertices: 0,
        })
    }

    /// An empty submesh carrying only the primitive-kind bits of `kind`.
    #[must_use]
    pub fn for_kind(kind: PrimitiveKind) -> Self {
        Self {
            vertices: Arc::new(Vec::new()),
            indices: Vec::new(),
            format: VertexFormat::for_kind(kind),
            primitive_start: 0,
            degenerate_triangles: 0,
            reused_vertices: 0,
        }
    }

    /// Wraps existing buffers after checking stride and index invariants.
    pub fn from_buffers(
        vertices: Vec<f64>,
        indices: Vec<u32>,
        format: VertexFormat,
    ) -> Result<Self, MeshError> {
        let format = format.validate()?;
        let stride = format.stride();
        if vertices.len() % stride != 0 {
            return Err(MeshError::VertexBufferLength {
                len: vertices.len(),
                stride,
            });
        }
        let kind = format.primitive_kind();
        if indices.len() % kind.index_count() != 0 {
            return Err(MeshError::IndexCount {
                len: indices.len(),
                kind,
            });
        }
        let vertex_count = vertices.len() / stride;
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                index: index as usize,
                vertex_count,
            });
        }

        Ok(Self {
            vertices: Arc::new(vertices),
            indices,
            format,
            primitive_start: vertex_count,
            degenerate_triangles: 0,
            reused_vertices: 0,
        })
    }

    #[must_use]
    pub fn vertices(&self) -> &[f64] {
        &self.vertices
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub const fn format(&self) -> VertexFormat {
        self.format
    }

    #[must_use]
    pub const fn stride(&self) -> usize {
        self.format.stride()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.stride()
    }

    #[must_use]
    pub const fn primitive_type(&self) -> PrimitiveKind {
        self.format.primitive_kind()
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.indices.len() / self.primitive_type().index_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// True when both submeshes read the very same vertex allocation.
    #[must_use]
    pub fn shares_vertices_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.vertices, &other.vertices)
    }

    /// Triangles dropped during assembly because two corners coincided.
    #[must_use]
    pub const fn degenerate_triangle_count(&self) -> usize {
        self.degenerate_triangles
    }

    /// Triangle corners redirected to an identical earlier vertex.
    #[must_use]
    pub const fn reused_vertex_count(&self) -> usize {
        self.reused_vertices
    }

    /// Starts a new strip/fan/list at the current end of the buffer.
    pub fn new_primitive(&mut self) {
        self.primitive_start = self.vertex_count();
    }

    /// Widens the layout with `bits`, zero-filling new attribute slots.
    /// Vertex order and indices are untouched.
    pub fn rebuild_vertices(&mut self, bits: VertexFormat) {
        let new_format = self.format | bits.attributes();
        if new_format == self.format {
            return;
        }
        let relaid = relayout_vertices(&self.vertices, self.format, new_format);
        self.vertices = Arc::new(relaid);
        self.format = new_format;
    }

    /// Appends one vertex built from `state`, then emits whatever primitives
    /// `mode` completes.
    pub fn vertex3(&mut self, x: f64, y: f64, z: f64, mode: PrimitiveMode, state: &VertexAttributeState) {
        let wanted = state.defined.attributes();
        if !self.format.contains(wanted) {
            self.rebuild_vertices(wanted);
        }

        let format = self.format;
        let vertices = Arc::make_mut(&mut self.vertices);
        vertices.extend_from_slice(&[x, y, z]);
        if format.has_normal() {
            vertices.extend_from_slice(&state.normal);
        }
        if format.has_color() {
            vertices.extend_from_slice(&state.color);
        }
        if format.has_texcoord() {
            vertices.extend_from_slice(&state.uv);
        }
        if format.has_tangent() {
            vertices.extend_from_slice(&state.tangent);
        }
        if format.has_bitangent() {
            vertices.extend_from_slice(&state.bitangent);
        }

        let n = self.vertex_count() - 1;
        let first = self.primitive_start;
        let count = n + 1 - first;
        let window = Self::DEDUP_WINDOW;

        match mode {
            PrimitiveMode::Triangles => {
                if count >= 3 && count % 3 == 0 {
                    self.add_triangle_deduped(n - 2, n - 1, n, window);
                }
            }
            PrimitiveMode::TriangleStrip => {
                if count >= 3 {
                    if (n - first) % 2 == 0 {
                        self.add_triangle_deduped(n - 2, n - 1, n, window);
                    } else {
                        self.add_triangle_deduped(n - 1, n - 2, n, window);
                    }
                }
            }
            PrimitiveMode::TriangleFan => {
                if count >= 3 {
                    self.add_triangle_deduped(first, n - 1, n, window);
                }
            }
            PrimitiveMode::Quads => {
                if count >= 4 && count % 4 == 0 {
                    self.add_triangle_deduped(n - 3, n - 2, n - 1, window);
                    self.add_triangle_deduped(n - 3, n - 1, n, window);
                }
            }
            PrimitiveMode::QuadStrip => {
                if count >= 4 && count % 2 == 0 {
                    self.add_triangle_deduped(n - 3, n - 2, n - 1, window);
                    self.add_triangle_deduped(n - 1, n - 2, n, window);
                }
            }
            PrimitiveMode::Lines => {
                if count >= 2 && count % 2 == 0 {
                    self.push_indices(&[n - 1, n]);
                }
            }
            PrimitiveMode::LineStrip => {
                if count >= 2 {
                    self.push_indices(&[n - 1, n]);
                }
            }
            PrimitiveMode::Points => self.push_indices(&[n]),
        }
    }

    fn push_indices(&mut self, indices: &[usize]) {
        self.indices.extend(indices.iter().map(|&i| i as u32));
    }

    /// Appends triangle `(i1, i2, i3)`, redirecting each corner to an
    /// identical vertex among the `window` vertices before it. Triangles
    /// with two coincident corner positions are dropped.
    pub fn add_triangle_deduped(&mut self, i1: usize, i2: usize, i3: usize, window: usize) {
        let corners = [i1, i2, i3].map(|i| self.find_duplicate(i, window));

        let p = corners.map(|i| self.position_slice(i));
        if p[0] == p[1] || p[1] == p[2] || p[0] == p[2] {
            self.degenerate_triangles += 1;
            return;
        }

        for (&redirected, original) in corners.iter().zip([i1, i2, i3]) {
            if redirected != original {
                self.reused_vertices += 1;
            }
        }
        self.push_indices(&corners);
    }

    fn find_duplicate(&self, index: usize, window: usize) -> usize {
        let stride = self.stride();
        let target = &self.vertices[index * stride..(index + 1) * stride];
        let lowest = index.saturating_sub(window);
        (lowest..index)
            .rev()
            .find(|&j| {
                let candidate = &self.vertices[j * stride..(j + 1) * stride];
                candidate
                    .iter()
                    .zip(target)
                    .all(|(a, b)| a.to_bits() == b.to_bits())
            })
            .unwrap_or(index)
    }

    fn position_slice(&self, index: usize) -> [f64; 3] {
        let base = index * self.stride();
        [self.vertices[base], self.vertices[base + 1], self.vertices[base + 2]]
    }

    /// Position of local vertex `index`.
    #[must_use]
    pub fn position(&self, index: usize) -> Point3 {
        Point3::from_slice(&self.vertices, index * self.stride())
    }

    pub fn set_position(&mut self, index: usize, p: Point3) {
        let base = index * self.stride();
        let vertices = Arc::make_mut(&mut self.vertices);
        vertices[base..base + 3].copy_from_slice(&p.to_array());
    }

    /// Normal of local vertex `index`, if the layout has normals.
    #[must_use]
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        let offset = self.format.normal_offset()?;
        Some(Vec3::from_slice(&self.vertices, index * self.stride() + offset))
    }

    /// Writes a normal, adding a normal slot to the layout if necessary.
    pub fn set_normal(&mut self, index: usize, n: Vec3) {
        self.rebuild_vertices(VertexFormat::NORMAL);
        let base = index * self.stride() + self.normal_offset_unchecked();
        let vertices = Arc::make_mut(&mut self.vertices);
        vertices[base..base + 3].copy_from_slice(&n.to_array());
    }

    fn normal_offset_unchecked(&self) -> usize {
        self.format.normal_offset().unwrap_or(3)
    }

    /// Gives every index its own private copy of the vertex it references.
    pub fn make_redundant(&mut self) {
        let stride = self.stride();
        let mut vertices = Vec::with_capacity(self.indices.len() * stride);
        for &index in &self.indices {
            let base = index as usize * stride;
            vertices.extend_from_slice(&self.vertices[base..base + stride]);
        }
        self.indices = (0..self.indices.len() as u32).collect();
        self.vertices = Arc::new(vertices);
        self.primitive_start = self.vertex_count();
    }

    /// Swaps the second and third index of every triangle.
    pub fn reverse_winding(&mut self) {
        if self.primitive_type() != PrimitiveKind::Triangles {
            return;
        }
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Line submesh with every distinct undirected triangle edge once.
    /// Shares this submesh's vertex buffer.
    #[must_use]
    pub fn to_wire_frame(&self) -> Self {
        if self.primitive_type() != PrimitiveKind::Triangles {
            return self.clone();
        }

        let mut seen = HashSet::new();
        let mut indices = Vec::with_capacity(self.indices.len() * 2);
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                if seen.insert((a.min(b), a.max(b))) {
                    indices.push(a);
                    indices.push(b);
                }
            }
        }

        let vertex_count = self.vertex_count();
        Self {
            vertices: Arc::clone(&self.vertices),
            indices,
            format: self.format.attributes() | VertexFormat::LINES,
            primitive_start: vertex_count,
            degenerate_triangles: 0,
            reused_vertices: 0,
        }
    }

    /// Recomputes vertex normals from primitive geometry.
    ///
    /// With `flat`, vertices are first unshared so each triangle's corners
    /// carry that triangle's normal. Otherwise face normals are summed over
    /// all vertices with bit-identical positions. `inward` flips the result.
    pub fn recalc_normals(&mut self, flat: bool, inward: bool) {
        let kind = self.primitive_type();
        if kind == PrimitiveKind::Points {
            return;
        }
        self.rebuild_vertices(VertexFormat::NORMAL);
        if flat {
            self.make_redundant();
        }

        let stride = self.stride();
        let offset = self.normal_offset_unchecked();
        let per_primitive = kind.index_count();

        let mut face_normals = Vec::with_capacity(self.indices.len() / per_primitive);
        for prim in self.indices.chunks_exact(per_primitive) {
            let mut normal = if kind == PrimitiveKind::Triangles {
                let p0 = self.position(prim[0] as usize);
                let p1 = self.position(prim[1] as usize);
                let p2 = self.position(prim[2] as usize);
                (p1 - p0).cross(p2 - p0)
            } else {
                let p0 = self.position(prim[0] as usize);
                let p1 = self.position(prim[1] as usize);
                line_normal(p1 - p0)
            };
            if inward {
                normal = -normal;
            }
            face_normals.push(normal);
        }

        let vertex_count = self.vertex_count();
        let mut accumulated = vec![Vec3::ZERO; vertex_count];
        if flat {
            for (prim, normal) in self.indices.chunks_exact(per_primitive).zip(&face_normals) {
                for &index in prim {
                    accumulated[index as usize] += *normal;
                }
            }
        } else {
            let mut by_position: HashMap<[u64; 3], Vec3> = HashMap::new();
            for (prim, normal) in self.indices.chunks_exact(per_primitive).zip(&face_normals) {
                for &index in prim {
                    *by_position
                        .entry(position_key(self.position(index as usize)))
                        .or_insert(Vec3::ZERO) += *normal;
                }
            }
            for (index, slot) in accumulated.iter_mut().enumerate() {
                if let Some(sum) = by_position.get(&position_key(self.position(index))) {
                    *slot = *sum;
                }
            }
        }

        let vertices = Arc::make_mut(&mut self.vertices);
        for (vertex, normal) in vertices.chunks_exact_mut(stride).zip(accumulated) {
            let normal = normal.normalized_or_zero();
            vertex[offset..offset + 3].copy_from_slice(&normal.to_array());
        }
    }

    /// Builds per-triangle tangent frames from positions and texture
    /// coordinates. A no-op unless the layout has both normals and
    /// texture coordinates.
    pub fn recalc_tangents(&mut self) {
        if self.primitive_type() != PrimitiveKind::Triangles
            || !self.format.has_normal()
            || !self.format.has_texcoord()
        {
            return;
        }
        self.rebuild_vertices(VertexFormat::TANGENT | VertexFormat::BITANGENT);
        // Tangent frames are per triangle; UV seams make them unshareable.
        self.make_redundant();

        let format = self.format;
        let stride = format.stride();
        let (Some(normal_at), Some(uv_at), Some(tangent_at), Some(bitangent_at)) = (
            format.normal_offset(),
            format.texcoord_offset(),
            format.tangent_offset(),
            format.bitangent_offset(),
        ) else {
            return;
        };

        let vertices = Arc::make_mut(&mut self.vertices);
        for tri in self.indices.chunks_exact(3) {
            let base = [tri[0], tri[1], tri[2]].map(|i| i as usize * stride);
            let p = base.map(|b| Point3::from_slice(vertices, b));
            let uv = base.map(|b| [vertices[b + uv_at], vertices[b + uv_at + 1]]);

            let e1 = p[1] - p[0];
            let e2 = p[2] - p[0];
            let (du1, dv1) = (uv[1][0] - uv[0][0], uv[1][1] - uv[0][1]);
            let (du2, dv2) = (uv[2][0] - uv[0][0], uv[2][1] - uv[0][1]);
            let det = du1 * dv2 - du2 * dv1;
            let (raw_tangent, raw_bitangent) = if det != 0.0 && det.is_finite() {
                let r = 1.0 / det;
                ((e1 * dv2 - e2 * dv1) * r, (e2 * du1 - e1 * du2) * r)
            } else {
                (Vec3::ZERO, Vec3::ZERO)
            };
            let face_normal = e1.cross(e2).normalized().unwrap_or(Vec3::Z);

            for b in base {
                let n = Vec3::from_slice(vertices, b + normal_at)
                    .normalized()
                    .unwrap_or(face_normal);
                let (tangent, bitangent) = orthonormal_frame(n, raw_tangent, raw_bitangent);
                vertices[b + tangent_at..b + tangent_at + 3].copy_from_slice(&tangent.to_array());
                vertices[b + bitangent_at..b + bitangent_at + 3]
                    .copy_from_slice(&bitangent.to_array());
            }
        }
    }

    /// Overwrites every vertex color, adding a color slot if needed.
    pub fn set_color3(&mut self, r: f64, g: f64, b: f64) {
        self.rebuild_vertices(VertexFormat::COLOR);
        let stride = self.stride();
        let offset = self.format.color_offset().unwrap_or(3);
        let vertices = Arc::make_mut(&mut self.vertices);
        for vertex in vertices.chunks_exact_mut(stride) {
            vertex[offset..offset + 3].copy_from_slice(&[r, g, b]);
        }
    }

    pub fn normalize_normals(&mut self) {
        self.map_normals(Vec3::normalized_or_zero);
    }

    pub fn reverse_normals(&mut self) {
        self.map_normals(|n| -n);
    }

    fn map_normals(&mut self, f: impl Fn(Vec3) -> Vec3) {
        let Some(offset) = self.format.normal_offset() else {
            return;
        };
        let stride = self.stride();
        let vertices = Arc::make_mut(&mut self.vertices);
        for vertex in vertices.chunks_exact_mut(stride) {
            let n = f(Vec3::from_slice(vertex, offset));
            vertex[offset..offset + 3].copy_from_slice(&n.to_array());
        }
    }

    /// Transforms positions by `matrix`; when `normal_matrix` is given,
    /// normals go through it and tangent vectors through the linear part of
    /// `matrix`, all renormalized.
    pub fn transform(&mut self, matrix: &Transform, normal_matrix: Option<&Matrix3>) {
        let format = self.format;
        let stride = format.stride();
        let linear = matrix.linear_part();
        let vertices = Arc::make_mut(&mut self.vertices);

        for vertex in vertices.chunks_exact_mut(stride) {
            let p = matrix.apply_point(Point3::from_slice(vertex, 0));
            vertex[..3].copy_from_slice(&p.to_array());

            let Some(normal_matrix) = normal_matrix else {
                continue;
            };
            if let Some(offset) = format.normal_offset() {
                let n = normal_matrix.apply(Vec3::from_slice(vertex, offset));
                vertex[offset..offset + 3].copy_from_slice(&n.normalized_or_zero().to_array());
            }
            for offset in [format.tangent_offset(), format.bitangent_offset()]
                .into_iter()
                .flatten()
            {
                let t = linear.apply(Vec3::from_slice(vertex, offset));
                vertex[offset..offset + 3].copy_from_slice(&t.normalized_or_zero().to_array());
            }
        }
    }

    /// Appends `other`'s vertices and indices; layouts must match.
    pub(crate) fn append(&mut self, other: &Self) {
        debug_assert_eq!(self.format, other.format);
        let offset = self.vertex_count() as u32;
        Arc::make_mut(&mut self.vertices).extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
        self.degenerate_triangles += other.degenerate_triangles;
        self.reused_vertices += other.reused_vertices;
    }
}

/// Hash key for exact position matching; `-0.0` and `0.0` share a key.
pub(crate) fn position_key(p: Point3) -> [u64; 3] {
    Point3::new(p.x + 0.0, p.y + 0.0, p.z + 0.0).bits_key()
}

/// A vector perpendicular to a line direction, scaled like a face normal.
fn line_normal(direction: Vec3) -> Vec3 {
    if direction.is_zero() {
        return Vec3::ZERO;
    }
    let side = direction.cross(direction.any_orthogonal());
    side.cross(direction)
}

/// Unit tangent and bitangent, orthogonal to the unit normal `n`.
fn orthonormal_frame(n: Vec3, tangent: Vec3, bitangent: Vec3) -> (Vec3, Vec3) {
    let t = (tangent - n * n.dot(tangent))
        .normalized()
        .unwrap_or_else(|| n.any_orthogonal());
    let b = (bitangent - n * n.dot(bitangent) - t * t.dot(bitangent))
        .normalized()
        .unwrap_or_else(|| n.cross(t).normalized_or_zero());
    (t, b)
}
