mod bspline;
mod core;
mod diagnostics;
mod eval;
mod evaluator;
mod format;
mod implicit;
mod marching_tables;
mod mesh;
mod shapes;
mod submesh;

pub use bspline::{
    BSplineCurve, BSplineSurface, SplineError, SplineFlags, clamped_knots, uniform_knots,
};
pub use core::{BBox, Matrix3, Point3, Tolerance, Transform, Vec3};
pub use diagnostics::MeshDiagnostics;
pub use eval::{CurveEval, EvalError, EvalMode, SurfaceEval};
pub use evaluator::{CurveEvaluator, SurfaceEvaluator};
pub use format::{PrimitiveKind, PrimitiveMode, VertexFormat, relayout_vertices};
pub use implicit::{GridBox, ImplicitSurface, ImplicitSurfaceError, MarchingAlgorithm, ScalarField};
pub use mesh::{Mesh, MeshError, PrimitiveVertex};
pub use shapes::{
    ShapeError, create_box, create_closed_cylinder, create_cylinder, create_disk,
    create_partial_disk, create_plane, create_sphere, create_torus,
};
pub use submesh::{SubMesh, VertexAttributeState};

#[cfg(test)]
mod tests;
