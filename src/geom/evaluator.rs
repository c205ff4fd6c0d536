//! Parametric evaluator seams.
//!
//! Anything that maps parameters to a fixed-size tuple can drive
//! [`CurveEval`](super::CurveEval) and [`SurfaceEval`](super::SurfaceEval):
//! splines implement these traits directly and plain closures get them
//! through the blanket impls.

/// Maps a curve parameter `u` to an `N`-tuple.
pub trait CurveEvaluator<const N: usize> {
    fn evaluate(&self, u: f64) -> [f64; N];
}

/// Maps surface parameters `(u, v)` to an `N`-tuple.
pub trait SurfaceEvaluator<const N: usize> {
    fn evaluate(&self, u: f64, v: f64) -> [f64; N];
}

impl<F, const N: usize> CurveEvaluator<N> for F
where
    F: Fn(f64) -> [f64; N],
{
    fn evaluate(&self, u: f64) -> [f64; N] {
        self(u)
    }
}

impl<F, const N: usize> SurfaceEvaluator<N> for F
where
    F: Fn(f64, f64) -> [f64; N],
{
    fn evaluate(&self, u: f64, v: f64) -> [f64; N] {
        self(u, v)
    }
}

/// Copies `values` into an `N`-tuple, truncating or zero-padding.
pub(crate) fn fit<const N: usize>(values: &[f64]) -> [f64; N] {
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = *value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve<E: CurveEvaluator<3>>(evaluator: &E, u: f64) -> [f64; 3] {
        evaluator.evaluate(u)
    }

    #[test]
    fn closures_are_evaluators() {
        let line = |u: f64| [u, 2.0 * u, 0.0];
        assert_eq!(sample_curve(&line, 0.5), [0.5, 1.0, 0.0]);

        let plane = |u: f64, v: f64| [u, v];
        assert_eq!(SurfaceEvaluator::<2>::evaluate(&plane, 0.25, 0.75), [0.25, 0.75]);
    }

    #[test]
    fn fit_pads_and_truncates() {
        assert_eq!(fit::<3>(&[1.0, 2.0]), [1.0, 2.0, 0.0]);
        assert_eq!(fit::<2>(&[1.0, 2.0, 3.0, 4.0]), [1.0, 2.0]);
    }
}
