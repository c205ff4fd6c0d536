//! Vertex layouts and primitive modes.
//!
//! A [`VertexFormat`] is a bitmask over the optional per-vertex attributes
//! plus the primitive-kind bits of a submesh. Attributes are always laid out
//! in the order position, normal, color, texcoord, tangent, bitangent; the
//! offset functions below depend on that order.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use super::mesh::MeshError;

/// Attribute and primitive-kind bits of a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat(u32);

impl VertexFormat {
    /// Position only, triangle primitives.
    pub const EMPTY: Self = Self(0);
    pub const NORMAL: Self = Self(1);
    pub const COLOR: Self = Self(2);
    pub const TEXCOORD: Self = Self(4);
    pub const TANGENT: Self = Self(8);
    pub const BITANGENT: Self = Self(16);
    /// Submesh holds line segments.
    pub const LINES: Self = Self(256);
    /// Submesh holds points.
    pub const POINTS: Self = Self(512);

    const ATTRIBUTE_MASK: u32 = 0x1f;
    const PRIMITIVE_MASK: u32 = 256 | 512;

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Attribute bits only, primitive kind stripped.
    #[must_use]
    pub const fn attributes(self) -> Self {
        Self(self.0 & Self::ATTRIBUTE_MASK)
    }

    /// Primitive-kind bits only.
    #[must_use]
    pub const fn primitive_bits(self) -> Self {
        Self(self.0 & Self::PRIMITIVE_MASK)
    }

    /// Fails when both LINES and POINTS are set.
    pub fn validate(self) -> Result<Self, MeshError> {
        if self.contains(Self::LINES.union(Self::POINTS)) {
            return Err(MeshError::ConflictingPrimitiveBits { bits: self.0 });
        }
        Ok(self)
    }

    /// Primitive kind encoded in this format. A malformed format (LINES and
    /// POINTS both set) reports `Lines`; [`validate`](Self::validate) rejects
    /// such formats at construction.
    #[must_use]
    pub const fn primitive_kind(self) -> PrimitiveKind {
        if self.0 & Self::LINES.0 != 0 {
            PrimitiveKind::Lines
        } else if self.0 & Self::POINTS.0 != 0 {
            PrimitiveKind::Points
        } else {
            PrimitiveKind::Triangles
        }
    }

    #[must_use]
    pub const fn for_kind(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Triangles => Self::EMPTY,
            PrimitiveKind::Lines => Self::LINES,
            PrimitiveKind::Points => Self::POINTS,
        }
    }

    #[must_use]
    pub const fn has_normal(self) -> bool {
        self.intersects(Self::NORMAL)
    }

    #[must_use]
    pub const fn has_color(self) -> bool {
        self.intersects(Self::COLOR)
    }

    #[must_use]
    pub const fn has_texcoord(self) -> bool {
        self.intersects(Self::TEXCOORD)
    }

    #[must_use]
    pub const fn has_tangent(self) -> bool {
        self.intersects(Self::TANGENT)
    }

    #[must_use]
    pub const fn has_bitangent(self) -> bool {
        self.intersects(Self::BITANGENT)
    }

    /// Number of `f64` components per vertex.
    #[must_use]
    pub const fn stride(self) -> usize {
        let mut stride = 3;
        if self.has_normal() {
            stride += 3;
        }
        if self.has_color() {
            stride += 3;
        }
        if self.has_texcoord() {
            stride += 2;
        }
        if self.has_tangent() {
            stride += 3;
        }
        if self.has_bitangent() {
            stride += 3;
        }
        stride
    }

    /// Offset of the first attribute slot following everything before `attribute`.
    const fn offset_before(self, attribute: Self) -> usize {
        let mut offset = 3;
        if attribute.0 > Self::NORMAL.0 && self.has_normal() {
            offset += 3;
        }
        if attribute.0 > Self::COLOR.0 && self.has_color() {
            offset += 3;
        }
        if attribute.0 > Self::TEXCOORD.0 && self.has_texcoord() {
            offset += 2;
        }
        if attribute.0 > Self::TANGENT.0 && self.has_tangent() {
            offset += 3;
        }
        offset
    }

    #[must_use]
    pub const fn normal_offset(self) -> Option<usize> {
        if self.has_normal() {
            Some(self.offset_before(Self::NORMAL))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn color_offset(self) -> Option<usize> {
        if self.has_color() {
            Some(self.offset_before(Self::COLOR))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn texcoord_offset(self) -> Option<usize> {
        if self.has_texcoord() {
            Some(self.offset_before(Self::TEXCOORD))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn tangent_offset(self) -> Option<usize> {
        if self.has_tangent() {
            Some(self.offset_before(Self::TANGENT))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn bitangent_offset(self) -> Option<usize> {
        if self.has_bitangent() {
            Some(self.offset_before(Self::BITANGENT))
        } else {
            None
        }
    }
}

impl BitOr for VertexFormat {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOrAssign for VertexFormat {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[position", self.primitive_kind())?;
        for (flag, name) in [
            (Self::NORMAL, "normal"),
            (Self::COLOR, "color"),
            (Self::TEXCOORD, "uv"),
            (Self::TANGENT, "tangent"),
            (Self::BITANGENT, "bitangent"),
        ] {
            if self.contains(flag) {
                write!(f, ", {name}")?;
            }
        }
        f.write_str("]")
    }
}

/// The primitive family stored in a submesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Triangles,
    Lines,
    Points,
}

impl PrimitiveKind {
    /// Indices per primitive.
    #[must_use]
    pub const fn index_count(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
            Self::Points => 1,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Triangles => "triangles",
            Self::Lines => "lines",
            Self::Points => "points",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Draw modes accepted by [`Mesh::mode`](super::Mesh::mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
}

impl PrimitiveMode {
    pub const ALL: [Self; 8] = [
        Self::Points,
        Self::Lines,
        Self::LineStrip,
        Self::Triangles,
        Self::TriangleStrip,
        Self::TriangleFan,
        Self::Quads,
        Self::QuadStrip,
    ];

    #[must_use]
    pub const fn kind(self) -> PrimitiveKind {
        match self {
            Self::Points => PrimitiveKind::Points,
            Self::Lines | Self::LineStrip => PrimitiveKind::Lines,
            Self::Triangles
            | Self::TriangleStrip
            | Self::TriangleFan
            | Self::Quads
            | Self::QuadStrip => PrimitiveKind::Triangles,
        }
    }

    /// Numeric code used by the wasm API (the classic GL enumeration, with
    /// 7 and 8 for quads and quad strips).
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Points => 0,
            Self::Lines => 1,
            Self::LineStrip => 3,
            Self::Triangles => 4,
            Self::TriangleStrip => 5,
            Self::TriangleFan => 6,
            Self::Quads => 7,
            Self::QuadStrip => 8,
        }
    }

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }
}

/// Re-lays out a vertex buffer from `old` to `new`, keeping the values of
/// attributes present in both and zero-filling the ones only in `new`.
/// Attributes missing from `new` are dropped.
#[must_use]
pub fn relayout_vertices(vertices: &[f64], old: VertexFormat, new: VertexFormat) -> Vec<f64> {
    let old_stride = old.stride();
    let new_stride = new.stride();
    let count = vertices.len() / old_stride;
    let mut out = vec![0.0; count * new_stride];

    let slots: [(Option<usize>, Option<usize>, usize); 5] = [
        (old.normal_offset(), new.normal_offset(), 3),
        (old.color_offset(), new.color_offset(), 3),
        (old.texcoord_offset(), new.texcoord_offset(), 2),
        (old.tangent_offset(), new.tangent_offset(), 3),
        (old.bitangent_offset(), new.bitangent_offset(), 3),
    ];

    for (src, dst) in vertices
        .chunks_exact(old_stride)
        .zip(out.chunks_exact_mut(new_stride))
    {
        dst[..3].copy_from_slice(&src[..3]);
        for &(from, to, len) in &slots {
            if let (Some(from), Some(to)) = (from, to) {
                dst[to..to + len].copy_from_slice(&src[from..from + len]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_attribute_sets() -> impl Iterator<Item = VertexFormat> {
        (0..32).map(VertexFormat::from_bits)
    }

    #[test]
    fn stride_counts_active_attributes() {
        assert_eq!(VertexFormat::EMPTY.stride(), 3);
        assert_eq!(VertexFormat::NORMAL.stride(), 6);
        assert_eq!((VertexFormat::NORMAL | VertexFormat::TEXCOORD).stride(), 8);
        assert_eq!(VertexFormat::from_bits(31).stride(), 17);
        assert_eq!((VertexFormat::LINES | VertexFormat::COLOR).stride(), 6);
    }

    #[test]
    fn offsets_increase_in_attribute_order() {
        for format in all_attribute_sets() {
            let offsets = [
                format.normal_offset().map(|o| (o, 3)),
                format.color_offset().map(|o| (o, 3)),
                format.texcoord_offset().map(|o| (o, 2)),
                format.tangent_offset().map(|o| (o, 3)),
                format.bitangent_offset().map(|o| (o, 3)),
            ];
            let mut next = 3;
            for (offset, len) in offsets.into_iter().flatten() {
                assert_eq!(offset, next, "format {format}");
                next = offset + len;
            }
            assert_eq!(next, format.stride());
        }
    }

    #[test]
    fn conflicting_primitive_bits_are_rejected() {
        assert!((VertexFormat::LINES | VertexFormat::POINTS).validate().is_err());
        assert!(VertexFormat::LINES.validate().is_ok());
        assert_eq!(VertexFormat::POINTS.primitive_kind(), PrimitiveKind::Points);
        assert_eq!(VertexFormat::NORMAL.primitive_kind(), PrimitiveKind::Triangles);
    }

    #[test]
    fn relayout_preserves_values_and_zero_fills() {
        let old = VertexFormat::TEXCOORD;
        let new = VertexFormat::NORMAL | VertexFormat::TEXCOORD;
        let vertices = [1.0, 2.0, 3.0, 0.25, 0.75, 4.0, 5.0, 6.0, 0.5, 1.0];

        let out = relayout_vertices(&vertices, old, new);
        assert_eq!(
            out,
            vec![
                1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.25, 0.75, //
                4.0, 5.0, 6.0, 0.0, 0.0, 0.0, 0.5, 1.0,
            ]
        );
    }

    #[test]
    fn mode_codes_round_trip() {
        for mode in PrimitiveMode::ALL {
            assert_eq!(PrimitiveMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(PrimitiveMode::from_code(2), None);
        assert_eq!(PrimitiveMode::QuadStrip.kind(), PrimitiveKind::Triangles);
    }
}
