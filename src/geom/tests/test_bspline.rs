use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    BSplineCurve, BSplineSurface, CurveEvaluator, SplineError, SplineFlags, SurfaceEvaluator,
    Tolerance, clamped_knots, uniform_knots,
};

fn random_points(rng: &mut StdRng, count: usize, dimension: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.random_range(-5.0..5.0)).collect())
        .collect()
}

fn unit_circle() -> BSplineCurve {
    let w = std::f64::consts::FRAC_1_SQRT_2;
    let control_points = vec![
        vec![1.0, 0.0, 1.0],
        vec![1.0, 1.0, w],
        vec![0.0, 1.0, 1.0],
        vec![-1.0, 1.0, w],
        vec![-1.0, 0.0, 1.0],
        vec![-1.0, -1.0, w],
        vec![0.0, -1.0, 1.0],
        vec![1.0, -1.0, w],
        vec![1.0, 0.0, 1.0],
    ];
    let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
    BSplineCurve::new(control_points, knots, SplineFlags::RATIONAL).unwrap()
}

#[test]
fn clamped_curves_interpolate_their_end_points() {
    let mut rng = StdRng::seed_from_u64(42);
    let tol = Tolerance::DEFAULT;
    for degree in 1..=5 {
        for _ in 0..10 {
            let count = rng.random_range(degree + 1..degree + 8);
            let points = random_points(&mut rng, count, 3);
            let curve = BSplineCurve::clamped(points.clone(), degree, SplineFlags::NONE).unwrap();

            assert_eq!(curve.degree(), degree);
            assert_eq!(curve.knots().len(), count + degree + 1);
            let (start, end) = curve.end_points();
            assert!(tol.approx_eq_slice(&start, &points[0]));
            assert!(tol.approx_eq_slice(&end, &points[count - 1]));
        }
    }
}

#[test]
fn linear_bezier_is_linear_interpolation() {
    let p0 = [1.0, -2.0, 0.5];
    let p1 = [4.0, 2.0, -1.5];
    let line = BSplineCurve::bezier(vec![p0.to_vec(), p1.to_vec()], SplineFlags::NONE).unwrap();
    assert_eq!(line.order(), 2);

    let tol = Tolerance::DEFAULT;
    for step in 0..=16 {
        let u = f64::from(step) / 16.0;
        let expected: Vec<f64> = p0.iter().zip(&p1).map(|(a, b)| a + u * (b - a)).collect();
        assert!(tol.approx_eq_slice(&line.evaluate(u), &expected), "u={u}");
    }
}

#[test]
fn uniform_knots_do_not_reach_the_end_points() {
    let points: Vec<Vec<f64>> = (0..4).map(|i| vec![f64::from(i), 0.0]).collect();
    let curve = BSplineCurve::new(points, uniform_knots(4, 3), SplineFlags::NONE).unwrap();
    let (start, end) = curve.end_points();
    assert!((start[0] - 1.0).abs() < 1e-12);
    assert!((end[0] - 2.0).abs() < 1e-12);
}

#[test]
fn rational_circle_stays_on_the_unit_circle() {
    let circle = unit_circle();
    assert_eq!(circle.dimension(), 2);
    assert_eq!(circle.degree(), 2);

    for step in 0..=64 {
        let u = f64::from(step) / 64.0;
        let p = circle.evaluate(u);
        let radius = (p[0] * p[0] + p[1] * p[1]).sqrt();
        assert!((radius - 1.0).abs() < 1e-12, "u={u} radius={radius}");
    }
    let quarter = circle.evaluate(0.25);
    assert!(Tolerance::DEFAULT.approx_eq_slice(&quarter, &[0.0, 1.0]));
}

#[test]
fn homogeneous_weights_match_plain_weights() {
    let plain = vec![vec![0.0, 0.0, 1.0], vec![1.0, 2.0, 2.0], vec![3.0, 0.0, 1.0]];
    let homogeneous: Vec<Vec<f64>> = plain
        .iter()
        .map(|p| vec![p[0] * p[2], p[1] * p[2], p[2]])
        .collect();

    let a = BSplineCurve::bezier(plain, SplineFlags::RATIONAL).unwrap();
    let b = BSplineCurve::bezier(homogeneous, SplineFlags::RATIONAL | SplineFlags::HOMOGENEOUS)
        .unwrap();
    for step in 0..=8 {
        let u = f64::from(step) / 8.0;
        assert!(Tolerance::DEFAULT.approx_eq_slice(&a.evaluate(u), &b.evaluate(u)));
    }

    // Without DIVIDE the weight comes back as the last component.
    let raw = BSplineCurve::bezier(vec![vec![2.0, 1.0], vec![4.0, 3.0]], SplineFlags::WEIGHTED).unwrap();
    assert_eq!(raw.dimension(), 2);
    assert!(Tolerance::DEFAULT.approx_eq_slice(&raw.evaluate(1.0), &[12.0, 3.0]));
}

#[test]
fn divide_applies_without_the_weighted_flag() {
    let points = vec![vec![2.0, 0.0, 2.0], vec![0.0, 4.0, 2.0]];
    let tol = Tolerance::DEFAULT;
    for flags in [SplineFlags::HOMOGENEOUS | SplineFlags::DIVIDE, SplineFlags::DIVIDE] {
        let line = BSplineCurve::bezier(points.clone(), flags).unwrap();
        assert_eq!(line.dimension(), 2, "{flags}");
        assert!(tol.approx_eq_slice(&line.evaluate(0.0), &[1.0, 0.0]), "{flags}");
        assert!(tol.approx_eq_slice(&line.evaluate(0.5), &[0.5, 1.0]), "{flags}");
        assert!(tol.approx_eq_slice(&line.evaluate(1.0), &[0.0, 2.0]), "{flags}");
    }
}

#[test]
fn end_knots_repeated_past_the_order_still_hit_the_ends() {
    let points = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![2.0, 5.0]];
    let tol = Tolerance::DEFAULT;

    let heavy_end = BSplineCurve::new(points.clone(), vec![0.0, 0.0, 1.0, 1.0, 1.0], SplineFlags::NONE)
        .unwrap();
    assert!(tol.approx_eq_slice(&heavy_end.evaluate(1.0), &[1.0, 0.0]));
    assert!(tol.approx_eq_slice(&heavy_end.evaluate(0.0), &[0.0, 0.0]));
    let near_end = heavy_end.evaluate(0.999_999);
    assert!((near_end[0] - 0.999_999).abs() < 1e-9);

    let heavy_start = BSplineCurve::new(points, vec![0.0, 0.0, 0.0, 1.0, 1.0], SplineFlags::NONE)
        .unwrap();
    assert!(tol.approx_eq_slice(&heavy_start.evaluate(0.0), &[1.0, 0.0]));
    assert!(tol.approx_eq_slice(&heavy_start.evaluate(1.0), &[2.0, 5.0]));
    let near_start = heavy_start.evaluate(1e-6);
    assert!((near_start[0] - 1.000_001).abs() < 1e-9);
}

#[test]
fn derivative_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    let points = random_points(&mut rng, 7, 3);
    let curve = BSplineCurve::clamped(points, 3, SplineFlags::NONE).unwrap();

    let h = 1e-6;
    for u in [0.1, 0.37, 0.5, 0.81] {
        let d = curve.derivative(u);
        let ahead = curve.evaluate(u + h);
        let behind = curve.evaluate(u - h);
        for (axis, value) in d.iter().enumerate() {
            let numeric = (ahead[axis] - behind[axis]) / (2.0 * h);
            assert!((value - numeric).abs() < 1e-4 * (1.0 + numeric.abs()), "u={u} axis={axis}");
        }
    }
}

#[test]
fn circle_derivative_is_tangent() {
    let circle = unit_circle();
    for step in 0..16 {
        let u = (f64::from(step) + 0.5) / 16.0;
        let p = circle.evaluate(u);
        let d = circle.derivative(u);
        let dot = p[0] * d[0] + p[1] * d[1];
        assert!(dot.abs() < 1e-9, "u={u} dot={dot}");
        assert!(d[0].hypot(d[1]) > 1.0);
    }
}

#[test]
fn curve_construction_errors() {
    let flags = SplineFlags::NONE;
    assert_eq!(
        BSplineCurve::new(vec![], vec![0.0, 1.0], flags).unwrap_err(),
        SplineError::NoControlPoints
    );

    let three = vec![vec![0.0], vec![1.0], vec![2.0]];
    assert_eq!(
        BSplineCurve::new(three, vec![0.0, 0.0, 1.0, 1.0], flags).unwrap_err(),
        SplineError::KnotCount { expected: 5, actual: 4 }
    );

    let two = vec![vec![0.0], vec![1.0]];
    assert_eq!(
        BSplineCurve::new(two.clone(), vec![0.0, 0.0, 0.0, 1.0, 1.0], flags).unwrap_err(),
        SplineError::InvalidOrder { order: 3, count: 2 }
    );
    assert_eq!(
        BSplineCurve::new(two.clone(), vec![0.0, 0.0, 1.0, 0.5], flags).unwrap_err(),
        SplineError::KnotsNotNondecreasing
    );
    assert_eq!(
        BSplineCurve::new(two.clone(), vec![0.0; 4], flags).unwrap_err(),
        SplineError::DegenerateKnots
    );
    assert_eq!(
        BSplineCurve::new(two, vec![0.0, f64::NAN, 1.0, 1.0], flags).unwrap_err(),
        SplineError::NonFiniteKnot
    );
    assert_eq!(
        BSplineCurve::bezier(vec![vec![0.0, 0.0], vec![1.0, 1.0, 1.0]], flags).unwrap_err(),
        SplineError::InconsistentDimension {
            index: 1,
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn bilinear_patch_interpolates() {
    let grid = vec![
        vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
        vec![vec![0.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]],
    ];
    let patch = BSplineSurface::bezier(grid, SplineFlags::NONE).unwrap();
    assert_eq!(patch.degree(), (1, 1));
    assert_eq!(patch.dimension(), 3);
    assert!(Tolerance::DEFAULT.approx_eq_slice(&patch.evaluate(0.25, 0.75), &[0.25, 0.75, 0.75]));
}

#[test]
fn clamped_surface_corners_hit_control_points() {
    let mut rng = StdRng::seed_from_u64(5);
    let grid: Vec<Vec<Vec<f64>>> = (0..5).map(|_| random_points(&mut rng, 6, 3)).collect();
    let surface = BSplineSurface::clamped(grid.clone(), 3, 2, SplineFlags::NONE).unwrap();
    assert_eq!(surface.knots_u(), clamped_knots(6, 3).as_slice());
    assert_eq!(surface.knots_v(), clamped_knots(5, 2).as_slice());

    let tol = Tolerance::DEFAULT;
    assert!(tol.approx_eq_slice(&surface.evaluate(0.0, 0.0), &grid[0][0]));
    assert!(tol.approx_eq_slice(&surface.evaluate(1.0, 0.0), &grid[0][5]));
    assert!(tol.approx_eq_slice(&surface.evaluate(0.0, 1.0), &grid[4][0]));
    assert!(tol.approx_eq_slice(&surface.evaluate(1.0, 1.0), &grid[4][5]));
}

#[test]
fn surface_grid_must_be_rectangular() {
    let grid = vec![
        vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
        vec![vec![0.0, 1.0, 0.0]],
    ];
    assert_eq!(
        BSplineSurface::bezier(grid, SplineFlags::NONE).unwrap_err(),
        SplineError::GridShape {
            row: 1,
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn evaluator_traits_fit_the_output_width() {
    let curve = BSplineCurve::bezier(vec![vec![1.0, 2.0], vec![1.0, 2.0]], SplineFlags::NONE).unwrap();
    assert_eq!(CurveEvaluator::<3>::evaluate(&curve, 0.5), [1.0, 2.0, 0.0]);
    assert_eq!(CurveEvaluator::<1>::evaluate(&curve, 0.5), [1.0]);

    let grid = vec![vec![vec![1.0, 2.0, 3.0, 4.0]; 2]; 2];
    let patch = BSplineSurface::bezier(grid, SplineFlags::NONE).unwrap();
    assert_eq!(SurfaceEvaluator::<2>::evaluate(&patch, 0.5, 0.5), [1.0, 2.0]);
}
