use super::signed_volume;
use crate::geom::{GridBox, ImplicitSurface, ImplicitSurfaceError, MarchingAlgorithm, Mesh, Point3};

fn unit_sphere(x: f64, y: f64, z: f64) -> f64 {
    x * x + y * y + z * z - 1.0
}

fn polygonize(algorithm: MarchingAlgorithm) -> (Mesh, usize) {
    let surface = ImplicitSurface::new(unit_sphere);
    let mut mesh = Mesh::new();
    let triangles = surface
        .eval_surface(&mut mesh, &GridBox::centered(1.5, 20), algorithm)
        .unwrap();
    (mesh, triangles)
}

fn assert_on_unit_sphere(mesh: &Mesh) {
    for index in 0..mesh.vertex_count() {
        let p = mesh.get_vertex(index).unwrap().to_vec3();
        assert!((p.length() - 1.0).abs() < 0.1, "vertex {index} at radius {}", p.length());
    }

    let bbox = mesh.bounding_box();
    for (lo, hi) in bbox.min.to_array().into_iter().zip(bbox.max.to_array()) {
        assert!((lo + 1.0).abs() < 0.1, "min {lo}");
        assert!((hi - 1.0).abs() < 0.1, "max {hi}");
    }
}

fn assert_encloses_unit_ball(mesh: &Mesh) {
    let ball = 4.0 / 3.0 * std::f64::consts::PI;
    let volume = signed_volume(mesh);
    assert!((volume - ball).abs() < 0.05 * ball, "volume {volume}");
}

#[test]
fn marching_cubes_sphere_lies_on_the_sphere() {
    let (mesh, triangles) = polygonize(MarchingAlgorithm::Cubes);
    assert!(triangles > 0);
    assert_eq!(triangles, mesh.primitive_count());
    assert_on_unit_sphere(&mesh);
    assert_encloses_unit_ball(&mesh);
}

#[test]
fn marching_tetrahedra_sphere_is_closed() {
    let (mesh, triangles) = polygonize(MarchingAlgorithm::Tetrahedra);
    assert_on_unit_sphere(&mesh);
    assert_encloses_unit_ball(&mesh);

    let diagnostics = mesh.diagnostics();
    assert_eq!(diagnostics.triangle_count, triangles);
    assert!(diagnostics.is_watertight(), "{}", diagnostics.summary());
    assert!(diagnostics.is_manifold(), "{}", diagnostics.summary());

    let (_, cube_triangles) = polygonize(MarchingAlgorithm::Cubes);
    assert!(triangles > cube_triangles);
}

#[test]
fn normals_follow_the_field_gradient() {
    let (mesh, _) = polygonize(MarchingAlgorithm::Cubes);
    for index in 0..mesh.vertex_count() {
        let p = mesh.get_vertex(index).unwrap().to_vec3();
        let n = mesh.get_vertex_normal(index).unwrap();
        assert!(n.dot(p.normalized().unwrap()) > 0.95);
    }
}

#[test]
fn field_without_a_zero_crossing_adds_nothing() {
    let surface = ImplicitSurface::new(|_: f64, _: f64, _: f64| 1.0);
    let mut mesh = Mesh::new();
    let grid = GridBox::centered(1.0, 6);

    assert_eq!(surface.eval_surface(&mut mesh, &grid, MarchingAlgorithm::Cubes).unwrap(), 0);
    assert_eq!(
        surface.eval_surface(&mut mesh, &grid, MarchingAlgorithm::Tetrahedra).unwrap(),
        0
    );
    assert!(mesh.is_empty());
    assert_eq!(surface.find_box(&grid).unwrap(), None);
}

#[test]
fn eval_surface_restores_attribute_state() {
    let surface = ImplicitSurface::new(unit_sphere);
    let mut mesh = Mesh::new();
    mesh.color3(0.5, 0.5, 0.5).normal3(0.0, 0.0, -1.0);
    let before = mesh.attribute_state();

    surface
        .eval_surface(&mut mesh, &GridBox::centered(1.5, 6), MarchingAlgorithm::Cubes)
        .unwrap();
    assert_eq!(mesh.attribute_state(), before);
    assert!(mesh.submeshes()[0].format().has_color());
}

#[test]
fn find_box_bounds_the_surface() {
    let surface = ImplicitSurface::new(unit_sphere);
    let grid = GridBox::centered(1.5, 12);
    let found = surface.find_box(&grid).unwrap().unwrap();

    for (lo, hi) in found.min.to_array().into_iter().zip(found.max.to_array()) {
        assert!((-1.5..=-0.75).contains(&lo), "min {lo}");
        assert!((0.75..=1.5).contains(&hi), "max {hi}");
    }
}

#[test]
fn off_center_grids_are_supported() {
    let shifted = |x: f64, y: f64, z: f64| unit_sphere(x - 3.0, y, z + 2.0);
    let surface = ImplicitSurface::new(shifted);
    let grid = GridBox::new(Point3::new(1.5, -1.5, -3.5), Point3::new(4.5, 1.5, -0.5), [15, 15, 15]);

    let mut mesh = Mesh::new();
    surface
        .eval_surface(&mut mesh, &grid, MarchingAlgorithm::Tetrahedra)
        .unwrap();
    let center = mesh.bounding_box().center();
    assert!((center.x - 3.0).abs() < 0.05);
    assert!(center.y.abs() < 0.05);
    assert!((center.z + 2.0).abs() < 0.05);
}

#[test]
fn invalid_grids_are_rejected() {
    let surface = ImplicitSurface::new(unit_sphere);
    let mut mesh = Mesh::new();

    let flat = GridBox::new(Point3::ORIGIN, Point3::new(1.0, 1.0, 1.0), [4, 0, 4]);
    assert_eq!(
        surface.eval_surface(&mut mesh, &flat, MarchingAlgorithm::Cubes),
        Err(ImplicitSurfaceError::InvalidResolution { resolution: [4, 0, 4] })
    );

    let inverted = GridBox::new(Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0), [4, 4, 4]);
    assert_eq!(
        surface.find_box(&inverted),
        Err(ImplicitSurfaceError::InvalidBounds)
    );
    assert!(mesh.is_empty());
}
