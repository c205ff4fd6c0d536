//! Drivers that sample parametric evaluators into a [`Mesh`].
//!
//! Each driver holds up to four evaluators (vertex, normal, color, texture
//! coordinate). Sampled attributes go through the mesh's attribute calls
//! right before the matching `vertex3`, and the mesh's prior attribute state
//! is restored afterwards so sampling leaves no sticky state behind.

use super::core::Vec3;
use super::evaluator::{CurveEvaluator, SurfaceEvaluator};
use super::format::PrimitiveMode;
use super::mesh::{Mesh, MeshError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalMode {
    Points,
    Lines,
    Triangles,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("subdivision counts must be at least 1")]
    InvalidSubdivisions,
    #[error("{0:?} sampling is not supported by this evaluator")]
    UnsupportedMode(EvalMode),
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// One sampled vertex; attributes without an evaluator stay `None`.
#[derive(Debug, Clone, Copy)]
struct Sample {
    position: Option<[f64; 3]>,
    normal: Option<[f64; 3]>,
    color: Option<[f64; 3]>,
    uv: Option<[f64; 2]>,
}

impl Sample {
    fn emit(&self, mesh: &mut Mesh) -> Result<(), MeshError> {
        if let Some([x, y, z]) = self.normal {
            mesh.normal3(x, y, z);
        }
        if let Some([r, g, b]) = self.color {
            mesh.color3(r, g, b);
        }
        if let Some([u, v]) = self.uv {
            mesh.tex_coord2(u, v);
        }
        if let Some([x, y, z]) = self.position {
            mesh.vertex3(x, y, z)?;
        }
        Ok(())
    }
}

/// Parameter `i` of `n` evenly spaced steps from `a` to `b`, ending exactly on `b`.
fn step(a: f64, b: f64, i: usize, n: usize) -> f64 {
    if i == n {
        b
    } else {
        a + (b - a) * (i as f64 / n as f64)
    }
}

/// Runs `f` and puts the mesh attribute state back however it ends.
fn with_saved_state<T>(
    mesh: &mut Mesh,
    f: impl FnOnce(&mut Mesh) -> Result<T, EvalError>,
) -> Result<T, EvalError> {
    let saved = mesh.attribute_state();
    let result = f(mesh);
    mesh.restore_attribute_state(saved);
    result
}

// ============================================================================
// Curves
// ============================================================================

#[derive(Default)]
pub struct CurveEval<'a> {
    vertex: Option<Box<dyn CurveEvaluator<3> + 'a>>,
    normal: Option<Box<dyn CurveEvaluator<3> + 'a>>,
    color: Option<Box<dyn CurveEvaluator<3> + 'a>>,
    tex_coord: Option<Box<dyn CurveEvaluator<2> + 'a>>,
}

impl<'a> CurveEval<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&mut self, evaluator: impl CurveEvaluator<3> + 'a) -> &mut Self {
        self.vertex = Some(Box::new(evaluator));
        self
    }

    pub fn normal(&mut self, evaluator: impl CurveEvaluator<3> + 'a) -> &mut Self {
        self.normal = Some(Box::new(evaluator));
        self
    }

    pub fn color(&mut self, evaluator: impl CurveEvaluator<3> + 'a) -> &mut Self {
        self.color = Some(Box::new(evaluator));
        self
    }

    pub fn tex_coord(&mut self, evaluator: impl CurveEvaluator<2> + 'a) -> &mut Self {
        self.tex_coord = Some(Box::new(evaluator));
        self
    }

    fn sample(&self, u: f64) -> Sample {
        Sample {
            position: self.vertex.as_ref().map(|e| e.evaluate(u)),
            normal: self.normal.as_ref().map(|e| e.evaluate(u)),
            color: self.color.as_ref().map(|e| e.evaluate(u)),
            uv: self.tex_coord.as_ref().map(|e| e.evaluate(u)),
        }
    }

    /// Emits a single vertex at `u` under the mesh's current mode.
    pub fn eval_one(&self, mesh: &mut Mesh, u: f64) -> Result<(), EvalError> {
        with_saved_state(mesh, |mesh| Ok(self.sample(u).emit(mesh)?))
    }

    /// Samples `n + 1` evenly spaced parameters from `u1` to `u2` as points
    /// or as one line strip.
    pub fn eval_curve(
        &self,
        mesh: &mut Mesh,
        mode: EvalMode,
        n: usize,
        u1: f64,
        u2: f64,
    ) -> Result<(), EvalError> {
        if n == 0 {
            return Err(EvalError::InvalidSubdivisions);
        }
        let primitive = match mode {
            EvalMode::Points => PrimitiveMode::Points,
            EvalMode::Lines => PrimitiveMode::LineStrip,
            EvalMode::Triangles => return Err(EvalError::UnsupportedMode(mode)),
        };

        log::debug!("curve eval: {} samples as {:?}", n + 1, mode);
        with_saved_state(mesh, |mesh| {
            mesh.mode(primitive);
            for i in 0..=n {
                self.sample(step(u1, u2, i, n)).emit(mesh)?;
            }
            Ok(())
        })
    }
}

// ============================================================================
// Surfaces
// ============================================================================

#[derive(Default)]
pub struct SurfaceEval<'a> {
    vertex: Option<Box<dyn SurfaceEvaluator<3> + 'a>>,
    normal: Option<Box<dyn SurfaceEvaluator<3> + 'a>>,
    color: Option<Box<dyn SurfaceEvaluator<3> + 'a>>,
    tex_coord: Option<Box<dyn SurfaceEvaluator<2> + 'a>>,
    auto_normal: bool,
}

impl<'a> SurfaceEval<'a> {
    /// Parameter offset of the finite differences behind auto-normals.
    pub const AUTO_NORMAL_EPSILON: f64 = 1e-5;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&mut self, evaluator: impl SurfaceEvaluator<3> + 'a) -> &mut Self {
        self.vertex = Some(Box::new(evaluator));
        self
    }

    pub fn normal(&mut self, evaluator: impl SurfaceEvaluator<3> + 'a) -> &mut Self {
        self.normal = Some(Box::new(evaluator));
        self
    }

    pub fn color(&mut self, evaluator: impl SurfaceEvaluator<3> + 'a) -> &mut Self {
        self.color = Some(Box::new(evaluator));
        self
    }

    pub fn tex_coord(&mut self, evaluator: impl SurfaceEvaluator<2> + 'a) -> &mut Self {
        self.tex_coord = Some(Box::new(evaluator));
        self
    }

    /// Derive normals from the vertex evaluator when no normal evaluator is
    /// set. Finite differences misbehave at true singularities such as the
    /// poles of a sphere, where the result is only a best guess.
    pub fn set_auto_normal(&mut self, enabled: bool) -> &mut Self {
        self.auto_normal = enabled;
        self
    }

    fn sample(&self, u: f64, v: f64) -> Sample {
        let position = self.vertex.as_ref().map(|e| e.evaluate(u, v));
        let normal = match (&self.normal, &self.vertex, position) {
            (Some(normal), _, _) => Some(normal.evaluate(u, v)),
            (None, Some(vertex), Some(p)) if self.auto_normal => {
                Some(auto_normal(vertex.as_ref(), u, v, p).to_array())
            }
            _ => None,
        };
        Sample {
            position,
            normal,
            color: self.color.as_ref().map(|e| e.evaluate(u, v)),
            uv: self.tex_coord.as_ref().map(|e| e.evaluate(u, v)),
        }
    }

    fn sample_row(&self, v: f64, un: usize, u1: f64, u2: f64) -> Vec<Sample> {
        (0..=un).map(|j| self.sample(step(u1, u2, j, un), v)).collect()
    }

    /// Emits a single vertex at `(u, v)` under the mesh's current mode.
    pub fn eval_one(&self, mesh: &mut Mesh, u: f64, v: f64) -> Result<(), EvalError> {
        with_saved_state(mesh, |mesh| Ok(self.sample(u, v).emit(mesh)?))
    }

    /// Samples a `(un + 1) x (vn + 1)` parameter grid over
    /// `[u1, u2] x [v1, v2]`.
    ///
    /// Points emit every grid sample, lines emit every grid row and column
    /// as line strips, and triangles emit one triangle strip per pair of
    /// adjacent rows. Each grid point is evaluated exactly once.
    #[allow(clippy::too_many_arguments)]
    pub fn eval_surface(
        &self,
        mesh: &mut Mesh,
        mode: EvalMode,
        un: usize,
        vn: usize,
        u1: f64,
        u2: f64,
        v1: f64,
        v2: f64,
    ) -> Result<(), EvalError> {
        if un == 0 || vn == 0 {
            return Err(EvalError::InvalidSubdivisions);
        }
        log::debug!("surface eval: {un}x{vn} grid as {mode:?}");

        with_saved_state(mesh, |mesh| match mode {
            EvalMode::Points => {
                mesh.mode(PrimitiveMode::Points);
                for i in 0..=vn {
                    for sample in self.sample_row(step(v1, v2, i, vn), un, u1, u2) {
                        sample.emit(mesh)?;
                    }
                }
                Ok(())
            }
            EvalMode::Lines => {
                let rows: Vec<Vec<Sample>> = (0..=vn)
                    .map(|i| self.sample_row(step(v1, v2, i, vn), un, u1, u2))
                    .collect();
                for row in &rows {
                    mesh.mode(PrimitiveMode::LineStrip);
                    for sample in row {
                        sample.emit(mesh)?;
                    }
                }
                for j in 0..=un {
                    mesh.mode(PrimitiveMode::LineStrip);
                    for row in &rows {
                        row[j].emit(mesh)?;
                    }
                }
                Ok(())
            }
            EvalMode::Triangles => {
                let mut previous = self.sample_row(v1, un, u1, u2);
                for i in 1..=vn {
                    let current = self.sample_row(step(v1, v2, i, vn), un, u1, u2);
                    mesh.mode(PrimitiveMode::TriangleStrip);
                    for (upper, lower) in current.iter().zip(&previous) {
                        upper.emit(mesh)?;
                        lower.emit(mesh)?;
                    }
                    previous = current;
                }
                Ok(())
            }
        })
    }
}

fn difference(vertex: &dyn SurfaceEvaluator<3>, from: (f64, f64), to: (f64, f64)) -> Vec3 {
    Vec3::from_array(vertex.evaluate(to.0, to.1)) - Vec3::from_array(vertex.evaluate(from.0, from.1))
}

/// Parameter nudged by `eps` towards the inside of `[0, 1]`.
fn nudge(t: f64, eps: f64) -> f64 {
    if t + eps > 1.0 { t - eps } else { t + eps }
}

/// Unit normal at `(u, v)` from forward differences of `vertex`.
///
/// When one difference vanishes (a pole), it is retaken on a parameter line
/// nudged off the singular one; if a direction is still degenerate the
/// normal falls back to a vector perpendicular to the other one, or `+Z`.
fn auto_normal(vertex: &dyn SurfaceEvaluator<3>, u: f64, v: f64, p: [f64; 3]) -> Vec3 {
    let eps = SurfaceEval::AUTO_NORMAL_EPSILON;
    let base = Vec3::from_array(p);

    let mut du = Vec3::from_array(vertex.evaluate(u + eps, v)) - base;
    if du.is_zero() {
        let vn = nudge(v, eps);
        du = difference(vertex, (u, vn), (u + eps, vn));
    }
    let mut dv = Vec3::from_array(vertex.evaluate(u, v + eps)) - base;
    if dv.is_zero() {
        let un = nudge(u, eps);
        dv = difference(vertex, (un, v), (un, v + eps));
    }

    match (du.normalized(), dv.normalized()) {
        (Some(tu), Some(tv)) => tu.cross(tv).normalized().unwrap_or_else(|| tu.any_orthogonal()),
        (Some(t), None) | (None, Some(t)) => t.any_orthogonal(),
        (None, None) => Vec3::Z,
    }
}
