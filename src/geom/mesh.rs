use serde::Serialize;

use super::core::{BBox, Point3, Transform, Vec3};
use super::diagnostics::MeshDiagnostics;
use super::format::{PrimitiveKind, PrimitiveMode, VertexFormat};
use super::submesh::{SubMesh, VertexAttributeState};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("vertex added before a primitive mode was set")]
    NoPrimitiveMode,
    #[error("vertex format {bits:#x} sets both the lines and points bits")]
    ConflictingPrimitiveBits { bits: u32 },
    #[error("vertex buffer length {len} is not a multiple of stride {stride}")]
    VertexBufferLength { len: usize, stride: usize },
    #[error("index {index} is out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: usize, vertex_count: usize },
    #[error("index buffer length {len} is not a whole number of {kind}")]
    IndexCount { len: usize, kind: PrimitiveKind },
}

/// One vertex of a primitive as reported by [`Mesh::enum_primitives`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimitiveVertex {
    pub position: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 2]>,
}

/// An incrementally built, attribute-interleaved mesh.
///
/// Vertices stream in through [`vertex3`](Self::vertex3) after a
/// [`mode`](Self::mode) call; the active draw mode decides which triangles,
/// lines or points they complete. Attributes set with `normal3`, `color3`
/// and friends are sticky and apply to every later vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    submeshes: Vec<SubMesh>,
    state: VertexAttributeState,
    mode: Option<PrimitiveMode>,
}

impl Mesh {
    /// Vertex ceiling per submesh, so every index fits in 16 bits.
    pub const MAX_SUBMESH_VERTICES: usize = 65535;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing vertex and index buffer as a one-submesh mesh.
    pub fn from_buffers(
        vertices: Vec<f64>,
        indices: Vec<u32>,
        format: VertexFormat,
    ) -> Result<Self, MeshError> {
        let submesh = SubMesh::from_buffers(vertices, indices, format)?;
        Ok(Self {
            submeshes: vec![submesh],
            ..Self::default()
        })
    }

    // ========================================================================
    // Building
    // ========================================================================

    /// Selects the draw mode for subsequent vertices and starts a fresh
    /// primitive. A different primitive family, or a full active submesh,
    /// starts a new submesh.
    pub fn mode(&mut self, mode: PrimitiveMode) -> &mut Self {
        self.mode = Some(mode);
        match self.submeshes.last_mut() {
            Some(active)
                if active.primitive_type() == mode.kind()
                    && active.vertex_count() < Self::MAX_SUBMESH_VERTICES =>
            {
                active.new_primitive();
            }
            _ => self.start_submesh(mode.kind()),
        }
        self
    }

    fn start_submesh(&mut self, kind: PrimitiveKind) {
        if self.submeshes.last().is_some_and(SubMesh::is_empty) {
            self.submeshes.pop();
        }
        self.submeshes.push(SubMesh::for_kind(kind));
        log::debug!("mesh: started {kind} submesh #{}", self.submeshes.len() - 1);
    }

    pub fn normal3(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.state.normal = [x, y, z];
        self.state.defined |= VertexFormat::NORMAL;
        self
    }

    pub fn color3(&mut self, r: f64, g: f64, b: f64) -> &mut Self {
        self.state.color = [r, g, b];
        self.state.defined |= VertexFormat::COLOR;
        self
    }

    pub fn tex_coord2(&mut self, u: f64, v: f64) -> &mut Self {
        self.state.uv = [u, v];
        self.state.defined |= VertexFormat::TEXCOORD;
        self
    }

    pub fn tangent3(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.state.tangent = [x, y, z];
        self.state.defined |= VertexFormat::TANGENT;
        self
    }

    pub fn bitangent3(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.state.bitangent = [x, y, z];
        self.state.defined |= VertexFormat::BITANGENT;
        self
    }

    /// Adds a vertex carrying the current attribute state.
    pub fn vertex3(&mut self, x: f64, y: f64, z: f64) -> Result<&mut Self, MeshError> {
        let mode = self.mode.ok_or(MeshError::NoPrimitiveMode)?;
        // A merge may have left a trailing submesh of another family.
        if self
            .submeshes
            .last()
            .is_none_or(|active| active.primitive_type() != mode.kind())
        {
            self.start_submesh(mode.kind());
        }
        let state = self.state;
        if let Some(active) = self.submeshes.last_mut() {
            active.vertex3(x, y, z, mode, &state);
        }
        Ok(self)
    }

    pub fn vertex2(&mut self, x: f64, y: f64) -> Result<&mut Self, MeshError> {
        self.vertex3(x, y, 0.0)
    }

    #[must_use]
    pub const fn attribute_state(&self) -> VertexAttributeState {
        self.state
    }

    pub fn restore_attribute_state(&mut self, state: VertexAttributeState) -> &mut Self {
        self.state = state;
        self
    }

    #[must_use]
    pub const fn current_mode(&self) -> Option<PrimitiveMode> {
        self.mode
    }

    // ========================================================================
    // Post-processing
    // ========================================================================

    /// Appends copies of `other`'s non-empty submeshes, extending the
    /// trailing submesh when its layout matches and the vertex ceiling
    /// allows.
    pub fn merge(&mut self, other: &Mesh) -> &mut Self {
        let before = self.submeshes.len();
        for incoming in other.submeshes.iter().filter(|s| !s.is_empty()) {
            if self.submeshes.last().is_some_and(SubMesh::is_empty) {
                self.submeshes.pop();
            }
            match self.submeshes.last_mut() {
                Some(last)
                    if last.format() == incoming.format()
                        && last.vertex_count() + incoming.vertex_count()
                            <= Self::MAX_SUBMESH_VERTICES =>
                {
                    last.append(incoming);
                }
                _ => self.submeshes.push(incoming.clone()),
            }
        }
        if let Some(last) = self.submeshes.last_mut() {
            last.new_primitive();
        }
        log::debug!(
            "mesh: merged {} submeshes, {} -> {}",
            other.submeshes.len(),
            before,
            self.submeshes.len()
        );
        self
    }

    /// Transforms every position; normals follow the inverse transpose of
    /// the upper 3x3 block unless that block is the identity.
    pub fn transform(&mut self, matrix: &Transform) -> &mut Self {
        let normal_matrix = if matrix.linear_part().is_identity() {
            None
        } else {
            let inverse_transpose = matrix.normal_matrix();
            if inverse_transpose.is_none() {
                log::warn!("mesh: transform has a singular linear part, normals left unchanged");
            }
            inverse_transpose
        };
        for submesh in &mut self.submeshes {
            submesh.transform(matrix, normal_matrix.as_ref());
        }
        self
    }

    pub fn recalc_normals(&mut self, flat: bool, inward: bool) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.recalc_normals(flat, inward);
        }
        self
    }

    /// Generates tangents and bitangents for triangle submeshes that have
    /// both normals and texture coordinates; others are left untouched.
    pub fn recalc_tangents(&mut self) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.recalc_tangents();
        }
        self
    }

    pub fn normalize_normals(&mut self) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.normalize_normals();
        }
        self
    }

    pub fn reverse_normals(&mut self) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.reverse_normals();
        }
        self
    }

    pub fn reverse_winding(&mut self) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.reverse_winding();
        }
        self
    }

    pub fn set_color3(&mut self, r: f64, g: f64, b: f64) -> &mut Self {
        for submesh in &mut self.submeshes {
            submesh.set_color3(r, g, b);
        }
        self
    }

    /// A new mesh whose triangle submeshes become their unique edges.
    /// Line and point submeshes are carried over as they are.
    #[must_use]
    pub fn to_wire_frame(&self) -> Mesh {
        Mesh {
            submeshes: self.submeshes.iter().map(SubMesh::to_wire_frame).collect(),
            state: self.state,
            mode: None,
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[must_use]
    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::vertex_count).sum()
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.submeshes.iter().map(SubMesh::primitive_count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// Maps a global vertex index to `(submesh, local index)`.
    fn locate(&self, mut index: usize) -> Option<(usize, usize)> {
        for (position, submesh) in self.submeshes.iter().enumerate() {
            let count = submesh.vertex_count();
            if index < count {
                return Some((position, index));
            }
            index -= count;
        }
        None
    }

    #[must_use]
    pub fn get_vertex(&self, index: usize) -> Option<Point3> {
        let (submesh, local) = self.locate(index)?;
        Some(self.submeshes[submesh].position(local))
    }

    /// Out-of-range indices are ignored.
    pub fn set_vertex(&mut self, index: usize, x: f64, y: f64, z: f64) -> &mut Self {
        if let Some((submesh, local)) = self.locate(index) {
            self.submeshes[submesh].set_position(local, Point3::new(x, y, z));
        }
        self
    }

    #[must_use]
    pub fn get_vertex_normal(&self, index: usize) -> Option<Vec3> {
        let (submesh, local) = self.locate(index)?;
        self.submeshes[submesh].normal(local)
    }

    /// Out-of-range indices are ignored. Adds a normal slot to the owning
    /// submesh when it has none.
    pub fn set_vertex_normal(&mut self, index: usize, x: f64, y: f64, z: f64) -> &mut Self {
        if let Some((submesh, local)) = self.locate(index) {
            self.submeshes[submesh].set_normal(local, Vec3::new(x, y, z));
        }
        self
    }

    /// Bounds of every vertex referenced by a primitive, or
    /// [`BBox::EMPTY`] for a mesh without primitives.
    #[must_use]
    pub fn bounding_box(&self) -> BBox {
        self.submeshes.iter().fold(BBox::EMPTY, |bbox, submesh| {
            submesh
                .indices()
                .iter()
                .fold(bbox, |bbox, &index| bbox.expand_point(submesh.position(index as usize)))
        })
    }

    /// Calls `f` once per primitive with its 1-3 vertices.
    pub fn enum_primitives<F>(&self, mut f: F)
    where
        F: FnMut(&[PrimitiveVertex]),
    {
        let mut scratch = Vec::with_capacity(3);
        for submesh in &self.submeshes {
            let format = submesh.format();
            let stride = format.stride();
            let vertices = submesh.vertices();
            let read3 = |base: usize, offset: Option<usize>| {
                offset.map(|o| [vertices[base + o], vertices[base + o + 1], vertices[base + o + 2]])
            };

            for primitive in submesh.indices().chunks_exact(submesh.primitive_type().index_count()) {
                scratch.clear();
                for &index in primitive {
                    let base = index as usize * stride;
                    scratch.push(PrimitiveVertex {
                        position: [vertices[base], vertices[base + 1], vertices[base + 2]],
                        normal: read3(base, format.normal_offset()),
                        color: read3(base, format.color_offset()),
                        uv: format
                            .texcoord_offset()
                            .map(|o| [vertices[base + o], vertices[base + o + 1]]),
                    });
                }
                f(&scratch);
            }
        }
    }

    /// Every primitive as an owned vertex list.
    #[must_use]
    pub fn primitives(&self) -> Vec<Vec<PrimitiveVertex>> {
        let mut primitives = Vec::with_capacity(self.primitive_count());
        self.enum_primitives(|vertices| primitives.push(vertices.to_vec()));
        primitives
    }

    #[must_use]
    pub fn diagnostics(&self) -> MeshDiagnostics {
        MeshDiagnostics::from_mesh(self)
    }
}
