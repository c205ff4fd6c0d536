//! B-spline and Bézier curves and surfaces of any degree and dimension.
//!
//! Control points are plain coordinate tuples. With [`SplineFlags::WEIGHTED`]
//! the last component of each control point is a weight; the remaining
//! components are either plain coordinates (multiplied by the weight during
//! evaluation) or, with [`SplineFlags::HOMOGENEOUS`], already premultiplied.
//! [`SplineFlags::DIVIDE`] divides the result by its last component and
//! drops it, whichever of the other flags are set; `WEIGHTED | DIVIDE` is
//! how rational curves and surfaces (NURBS) are built.
//!
//! Parameters are always in `[0, 1]` and are remapped onto the effective
//! knot domain `[knots[order - 1], knots[count]]`.

use std::fmt;
use std::ops::BitOr;

use super::evaluator::{CurveEvaluator, SurfaceEvaluator, fit};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("spline requires at least one control point")]
    NoControlPoints,
    #[error("spline order {order} must be between 2 and the control point count {count}")]
    InvalidOrder { order: usize, count: usize },
    #[error("knot vector needs at least {expected} values, got {actual}")]
    KnotCount { expected: usize, actual: usize },
    #[error("knots must be non-decreasing")]
    KnotsNotNondecreasing,
    #[error("first and last knot must differ")]
    DegenerateKnots,
    #[error("control point {index} has {actual} components, expected {expected}")]
    InconsistentDimension { index: usize, expected: usize, actual: usize },
    #[error("control grid row {row} has {actual} points, expected {expected}")]
    GridShape { row: usize, expected: usize, actual: usize },
    #[error("knots must be finite")]
    NonFiniteKnot,
}

/// How control point components are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SplineFlags(u32);

impl SplineFlags {
    pub const NONE: Self = Self(0);
    /// The last component is a weight.
    pub const WEIGHTED: Self = Self(1);
    /// The other components are already multiplied by the weight.
    pub const HOMOGENEOUS: Self = Self(2);
    /// Divide by the weight and drop it from the output.
    pub const DIVIDE: Self = Self(4);
    pub const RATIONAL: Self = Self(1 | 4);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 7)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    const fn divides(self) -> bool {
        self.contains(Self::DIVIDE)
    }
}

impl BitOr for SplineFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for SplineFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::WEIGHTED, "weighted"),
            (Self::HOMOGENEOUS, "homogeneous"),
            (Self::DIVIDE, "divide"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

// ============================================================================
// Knot vectors
// ============================================================================

/// Knot vector of `count + degree + 1` values in `[0, 1]` whose end knots
/// are repeated `degree + 1` times, so the curve passes through its first
/// and last control points.
#[must_use]
pub fn clamped_knots(count: usize, degree: usize) -> Vec<f64> {
    let order = degree + 1;
    let interior = count.saturating_sub(order);
    let segments = (interior + 1) as f64;

    let mut knots = Vec::with_capacity(count + order);
    knots.extend(std::iter::repeat_n(0.0, order));
    knots.extend((1..=interior).map(|i| i as f64 / segments));
    knots.extend(std::iter::repeat_n(1.0, order));
    knots
}

/// Evenly spaced knot vector of `count + degree + 1` values in `[0, 1]`.
/// Curves built on it do not, in general, touch their end control points.
#[must_use]
pub fn uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    let len = count + degree + 1;
    let last = len.saturating_sub(1).max(1) as f64;
    (0..len).map(|i| i as f64 / last).collect()
}

fn validate_knots(knots: &[f64]) -> Result<(), SplineError> {
    if knots.iter().any(|k| !k.is_finite()) {
        return Err(SplineError::NonFiniteKnot);
    }
    if knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(SplineError::KnotsNotNondecreasing);
    }
    if knots.first() == knots.last() {
        return Err(SplineError::DegenerateKnots);
    }
    Ok(())
}

/// Derives the order from the knot count and checks `2 <= order <= count`.
fn derive_order(count: usize, knot_len: usize) -> Result<usize, SplineError> {
    if knot_len < count + 2 {
        return Err(SplineError::KnotCount {
            expected: count + 2,
            actual: knot_len,
        });
    }
    let order = knot_len - count;
    if order > count {
        return Err(SplineError::InvalidOrder { order, count });
    }
    Ok(order)
}

fn common_dimension<'p>(points: impl IntoIterator<Item = &'p Vec<f64>>) -> Result<usize, SplineError> {
    let mut expected = None;
    for (index, point) in points.into_iter().enumerate() {
        match expected {
            None => expected = Some(point.len()),
            Some(expected) if expected != point.len() => {
                return Err(SplineError::InconsistentDimension {
                    index,
                    expected,
                    actual: point.len(),
                });
            }
            Some(_) => {}
        }
    }
    expected.ok_or(SplineError::NoControlPoints)
}

/// Rewrites a control point so evaluation is a plain weighted sum.
fn linear_form(point: &[f64], flags: SplineFlags) -> Vec<f64> {
    if !flags.contains(SplineFlags::WEIGHTED) || flags.contains(SplineFlags::HOMOGENEOUS) {
        return point.to_vec();
    }
    let Some((&weight, coords)) = point.split_last() else {
        return Vec::new();
    };
    coords
        .iter()
        .map(|c| c * weight)
        .chain(std::iter::once(weight))
        .collect()
}

/// Applies the perspective divide when `flags` asks for it.
fn finish(mut sum: Vec<f64>, flags: SplineFlags) -> Vec<f64> {
    if !flags.divides() {
        return sum;
    }
    let Some(weight) = sum.pop() else {
        return sum;
    };
    for c in &mut sum {
        *c /= weight;
    }
    sum
}

/// Maps `u` in `[0, 1]` onto `[a, b]`, hitting both ends exactly.
fn remap(u: f64, a: f64, b: f64) -> f64 {
    if u >= 1.0 {
        b + (b - a) * (u - 1.0)
    } else {
        a + (b - a) * u
    }
}

/// Index of the nonempty knot span containing `u`, clamped to `[p, n]`.
fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        let mut span = n;
        while span > p && knots[span] == knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    if u <= knots[p] {
        let mut span = p;
        while span < n && knots[span] == knots[span + 1] {
            span += 1;
        }
        return span;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// The `p + 1` basis functions that can be nonzero in knot span `span`,
/// built bottom-up with the Cox-de Boor recurrence.
pub(crate) fn basis_functions(span: usize, u: f64, p: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    n[0] = 1.0;
    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom == 0.0 { 0.0 } else { n[r] / denom };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Knot span and basis values for one axis at parameter `u` in `[0, 1]`.
fn axis_basis(u: f64, count: usize, order: usize, knots: &[f64]) -> (usize, Vec<f64>) {
    let degree = order - 1;
    let t = remap(u, knots[degree], knots[count]);
    let span = find_span(count - 1, degree, t, knots);
    (span - degree, basis_functions(span, t, degree, knots))
}

// ============================================================================
// Curves
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    control_points: Vec<Vec<f64>>,
    /// Control points rewritten so evaluation is a plain weighted sum.
    linear: Vec<Vec<f64>>,
    knots: Vec<f64>,
    order: usize,
    flags: SplineFlags,
}

impl BSplineCurve {
    /// Builds a curve; the order is `knots.len() - control_points.len()`.
    pub fn new(
        control_points: Vec<Vec<f64>>,
        knots: Vec<f64>,
        flags: SplineFlags,
    ) -> Result<Self, SplineError> {
        if control_points.is_empty() {
            return Err(SplineError::NoControlPoints);
        }
        let order = derive_order(control_points.len(), knots.len())?;
        validate_knots(&knots)?;
        common_dimension(&control_points)?;

        let linear = control_points.iter().map(|p| linear_form(p, flags)).collect();
        Ok(Self {
            control_points,
            linear,
            knots,
            order,
            flags,
        })
    }

    /// Bézier curve of degree `control_points.len() - 1`.
    pub fn bezier(control_points: Vec<Vec<f64>>, flags: SplineFlags) -> Result<Self, SplineError> {
        let count = control_points.len();
        let knots = clamped_knots(count, count.saturating_sub(1));
        Self::new(control_points, knots, flags)
    }

    /// Curve of the given degree on a clamped knot vector.
    pub fn clamped(
        control_points: Vec<Vec<f64>>,
        degree: usize,
        flags: SplineFlags,
    ) -> Result<Self, SplineError> {
        let knots = clamped_knots(control_points.len(), degree);
        Self::new(control_points, knots, flags)
    }

    #[must_use]
    pub fn control_points(&self) -> &[Vec<f64>] {
        &self.control_points
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    #[must_use]
    pub const fn degree(&self) -> usize {
        self.order - 1
    }

    #[must_use]
    pub const fn flags(&self) -> SplineFlags {
        self.flags
    }

    /// Number of components `evaluate` returns.
    #[must_use]
    pub fn dimension(&self) -> usize {
        let input = self.control_points.first().map_or(0, Vec::len);
        if self.flags.divides() { input.saturating_sub(1) } else { input }
    }

    /// Point at `u` in `[0, 1]`.
    #[must_use]
    pub fn evaluate(&self, u: f64) -> Vec<f64> {
        finish(self.weighted_sum(u), self.flags)
    }

    fn weighted_sum(&self, u: f64) -> Vec<f64> {
        weighted_sum_of(&self.linear, &self.knots, self.order, u)
    }

    /// Points at `u = 0` and `u = 1`.
    #[must_use]
    pub fn end_points(&self) -> (Vec<f64>, Vec<f64>) {
        (self.evaluate(0.0), self.evaluate(1.0))
    }

    /// First derivative with respect to `u` in `[0, 1]`.
    ///
    /// Rational curves use the quotient rule on the homogeneous form.
    #[must_use]
    pub fn derivative(&self, u: f64) -> Vec<f64> {
        let degree = self.degree();
        let domain = self.knots[self.control_points.len()] - self.knots[degree];

        let hodograph: Vec<Vec<f64>> = self
            .linear
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let denom = self.knots[i + self.order] - self.knots[i + 1];
                let scale = if denom == 0.0 { 0.0 } else { degree as f64 / denom };
                pair[1]
                    .iter()
                    .zip(&pair[0])
                    .map(|(b, a)| (b - a) * scale * domain)
                    .collect()
            })
            .collect();

        let dimension = self.linear.first().map_or(0, Vec::len);
        let d_linear = if hodograph.is_empty() {
            vec![0.0; dimension]
        } else {
            let knots = &self.knots[1..self.knots.len() - 1];
            weighted_sum_of(&hodograph, knots, self.order - 1, u)
        };

        if !self.flags.divides() {
            return d_linear;
        }
        let linear = self.weighted_sum(u);
        let (Some((&w, coords)), Some((&dw, d_coords))) = (linear.split_last(), d_linear.split_last())
        else {
            return Vec::new();
        };
        coords
            .iter()
            .zip(d_coords)
            .map(|(a, da)| (da * w - a * dw) / (w * w))
            .collect()
    }
}

/// `sum_i N_i(u) * points[i]` for an order-`order` spline on `knots`.
fn weighted_sum_of(points: &[Vec<f64>], knots: &[f64], order: usize, u: f64) -> Vec<f64> {
    let dimension = points.first().map_or(0, Vec::len);
    let mut sum = vec![0.0; dimension];
    let (first, basis) = axis_basis(u, points.len(), order, knots);
    for (point, weight) in points[first..].iter().zip(&basis) {
        for (s, c) in sum.iter_mut().zip(point) {
            *s += weight * c;
        }
    }
    sum
}

impl<const N: usize> CurveEvaluator<N> for BSplineCurve {
    fn evaluate(&self, u: f64) -> [f64; N] {
        fit(&BSplineCurve::evaluate(self, u))
    }
}

// ============================================================================
// Surfaces
// ============================================================================

/// Tensor-product spline surface over a grid of control points.
///
/// `grid[v][u]`: each row runs along `u`, rows advance along `v`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurface {
    control_points: Vec<Vec<Vec<f64>>>,
    linear: Vec<Vec<Vec<f64>>>,
    knots_u: Vec<f64>,
    knots_v: Vec<f64>,
    order_u: usize,
    order_v: usize,
    flags: SplineFlags,
}

impl BSplineSurface {
    pub fn new(
        control_points: Vec<Vec<Vec<f64>>>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        flags: SplineFlags,
    ) -> Result<Self, SplineError> {
        let v_count = control_points.len();
        let u_count = control_points.first().map_or(0, Vec::len);
        if v_count == 0 || u_count == 0 {
            return Err(SplineError::NoControlPoints);
        }
        for (row, points) in control_points.iter().enumerate() {
            if points.len() != u_count {
                return Err(SplineError::GridShape {
                    row,
                    expected: u_count,
                    actual: points.len(),
                });
            }
        }

        let order_u = derive_order(u_count, knots_u.len())?;
        let order_v = derive_order(v_count, knots_v.len())?;
        validate_knots(&knots_u)?;
        validate_knots(&knots_v)?;
        common_dimension(control_points.iter().flatten())?;

        let linear = control_points
            .iter()
            .map(|row| row.iter().map(|p| linear_form(p, flags)).collect())
            .collect();
        Ok(Self {
            control_points,
            linear,
            knots_u,
            knots_v,
            order_u,
            order_v,
            flags,
        })
    }

    /// Bézier patch whose degree along each axis is the point count minus one.
    pub fn bezier(control_points: Vec<Vec<Vec<f64>>>, flags: SplineFlags) -> Result<Self, SplineError> {
        let v_count = control_points.len();
        let u_count = control_points.first().map_or(0, Vec::len);
        let knots_u = clamped_knots(u_count, u_count.saturating_sub(1));
        let knots_v = clamped_knots(v_count, v_count.saturating_sub(1));
        Self::new(control_points, knots_u, knots_v, flags)
    }

    /// Surface of the given degrees on clamped knot vectors.
    pub fn clamped(
        control_points: Vec<Vec<Vec<f64>>>,
        degree_u: usize,
        degree_v: usize,
        flags: SplineFlags,
    ) -> Result<Self, SplineError> {
        let v_count = control_points.len();
        let u_count = control_points.first().map_or(0, Vec::len);
        let knots_u = clamped_knots(u_count, degree_u);
        let knots_v = clamped_knots(v_count, degree_v);
        Self::new(control_points, knots_u, knots_v, flags)
    }

    #[must_use]
    pub fn control_points(&self) -> &[Vec<Vec<f64>>] {
        &self.control_points
    }

    #[must_use]
    pub fn knots_u(&self) -> &[f64] {
        &self.knots_u
    }

    #[must_use]
    pub fn knots_v(&self) -> &[f64] {
        &self.knots_v
    }

    /// `(order_u, order_v)`.
    #[must_use]
    pub const fn order(&self) -> (usize, usize) {
        (self.order_u, self.order_v)
    }

    #[must_use]
    pub const fn degree(&self) -> (usize, usize) {
        (self.order_u - 1, self.order_v - 1)
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        let input = self
            .control_points
            .first()
            .and_then(|row| row.first())
            .map_or(0, Vec::len);
        if self.flags.divides() { input.saturating_sub(1) } else { input }
    }

    /// Point at `(u, v)` in `[0, 1]^2`.
    #[must_use]
    pub fn evaluate(&self, u: f64, v: f64) -> Vec<f64> {
        let u_count = self.linear[0].len();
        let (first_u, basis_u) = axis_basis(u, u_count, self.order_u, &self.knots_u);
        let (first_v, basis_v) = axis_basis(v, self.linear.len(), self.order_v, &self.knots_v);

        let dimension = self.linear[0][0].len();
        let mut sum = vec![0.0; dimension];
        for (row, bv) in self.linear[first_v..].iter().zip(&basis_v) {
            for (point, bu) in row[first_u..].iter().zip(&basis_u) {
                let weight = bu * bv;
                for (s, c) in sum.iter_mut().zip(point) {
                    *s += weight * c;
                }
            }
        }
        finish(sum, self.flags)
    }
}

impl<const N: usize> SurfaceEvaluator<N> for BSplineSurface {
    fn evaluate(&self, u: f64, v: f64) -> [f64; N] {
        fit(&BSplineSurface::evaluate(self, u, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_functions_partition_unity() {
        let knots = clamped_knots(6, 3);
        for step in 0..=20 {
            let t = step as f64 / 20.0;
            let span = find_span(5, 3, t, &knots);
            let sum: f64 = basis_functions(span, t, 3, &knots).iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "t={t} sum={sum}");
        }
    }

    #[test]
    fn end_spans_skip_overrepeated_knots() {
        let knots = [0.0, 0.0, 1.0, 1.0, 1.0];
        assert_eq!(find_span(2, 1, 1.0, &knots), 1);
        let knots = [0.0, 0.0, 0.0, 1.0, 1.0];
        assert_eq!(find_span(2, 1, 0.0, &knots), 2);
    }

    #[test]
    fn clamped_knots_layout() {
        assert_eq!(clamped_knots(4, 3), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(clamped_knots(5, 2), vec![0.0, 0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn uniform_knots_are_evenly_spaced() {
        let knots = uniform_knots(4, 2);
        assert_eq!(knots.len(), 7);
        assert_eq!(knots[0], 0.0);
        assert_eq!(knots[6], 1.0);
        assert!((knots[3] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn linear_form_premultiplies_plain_weights() {
        let point = [2.0, 4.0, 0.5];
        assert_eq!(linear_form(&point, SplineFlags::WEIGHTED), vec![1.0, 2.0, 0.5]);
        assert_eq!(
            linear_form(&point, SplineFlags::WEIGHTED | SplineFlags::HOMOGENEOUS),
            vec![2.0, 4.0, 0.5]
        );
        assert_eq!(linear_form(&point, SplineFlags::NONE), vec![2.0, 4.0, 0.5]);
    }

    #[test]
    fn flags_display() {
        assert_eq!(SplineFlags::NONE.to_string(), "none");
        assert_eq!(SplineFlags::RATIONAL.to_string(), "weighted|divide");
    }
}
