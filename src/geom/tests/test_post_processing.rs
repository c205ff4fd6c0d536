use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    Mesh, PrimitiveKind, PrimitiveMode, Tolerance, Transform, Vec3, VertexFormat, create_box,
    create_sphere,
};

fn random_triangles(rng: &mut StdRng, count: usize) -> Mesh {
    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Triangles);
    for _ in 0..count * 3 {
        let [x, y, z] = [(); 3].map(|()| rng.random_range(-10.0..10.0));
        mesh.vertex3(x, y, z).unwrap();
    }
    mesh
}

fn textured_triangle() -> Mesh {
    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Triangles).normal3(0.2, -0.1, 1.0);
    mesh.tex_coord2(0.0, 0.0).vertex3(0.0, 0.0, 0.0).unwrap();
    mesh.tex_coord2(1.0, 0.0).vertex3(2.0, 0.5, 0.0).unwrap();
    mesh.tex_coord2(0.0, 1.0).vertex3(0.3, 1.5, 0.2).unwrap();
    mesh
}

#[test]
fn smooth_box_normals_point_outward() {
    let mut mesh = create_box(2.0, 3.0, 4.0, false).unwrap();
    mesh.recalc_normals(false, false);

    let centroid = mesh.bounding_box().center();
    for index in 0..mesh.vertex_count() {
        let p = mesh.get_vertex(index).unwrap();
        let n = mesh.get_vertex_normal(index).unwrap();
        assert!(n.dot(p - centroid) > 0.0, "vertex {index} normal {n:?} points inward");
        assert!((n.length() - 1.0).abs() < 1e-12);
    }

    mesh.recalc_normals(true, true);
    for index in 0..mesh.vertex_count() {
        let p = mesh.get_vertex(index).unwrap();
        let n = mesh.get_vertex_normal(index).unwrap();
        assert!(n.dot(p - centroid) < 0.0);
    }
}

#[test]
fn flat_normals_unshare_vertices() {
    let mut mesh = create_box(1.0, 1.0, 1.0, false).unwrap();
    let triangles = mesh.primitive_count();
    mesh.recalc_normals(true, false);

    assert_eq!(mesh.vertex_count(), triangles * 3);
    assert_eq!(mesh.primitive_count(), triangles);
    // Flat normals of an axis-aligned box are axis-aligned.
    for index in 0..mesh.vertex_count() {
        let n = mesh.get_vertex_normal(index).unwrap().to_array();
        assert_eq!(n.iter().filter(|c| c.abs() == 1.0).count(), 1);
    }
}

#[test]
fn line_normals_are_perpendicular() {
    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Lines);
    mesh.vertex3(0.0, 0.0, 0.0).unwrap();
    mesh.vertex3(3.0, 4.0, 0.0).unwrap();
    mesh.recalc_normals(false, false);

    let n = mesh.get_vertex_normal(0).unwrap();
    assert!(n.dot(Vec3::new(3.0, 4.0, 0.0)).abs() < 1e-12);
    assert!((n.length() - 1.0).abs() < 1e-12);
}

#[test]
fn tangents_are_unit_and_orthogonal_to_normals() {
    let mut mesh = textured_triangle();
    mesh.recalc_tangents();

    let submesh = &mesh.submeshes()[0];
    let format = submesh.format();
    assert!(format.has_tangent() && format.has_bitangent());

    let stride = submesh.stride();
    let (Some(n_at), Some(t_at), Some(b_at)) = (
        format.normal_offset(),
        format.tangent_offset(),
        format.bitangent_offset(),
    ) else {
        panic!("missing tangent frame slots");
    };

    for vertex in submesh.vertices().chunks_exact(stride) {
        let n = Vec3::from_slice(vertex, n_at).normalized().unwrap();
        let t = Vec3::from_slice(vertex, t_at);
        let b = Vec3::from_slice(vertex, b_at);
        assert!((t.length() - 1.0).abs() < 1e-9);
        assert!((b.length() - 1.0).abs() < 1e-9);
        assert!(t.dot(n).abs() < 1e-9);
        assert!(b.dot(n).abs() < 1e-9);
    }
}

#[test]
fn tangents_without_texcoords_are_a_no_op() {
    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Triangles).normal3(0.0, 0.0, 1.0);
    mesh.vertex3(0.0, 0.0, 0.0).unwrap();
    mesh.vertex3(1.0, 0.0, 0.0).unwrap();
    mesh.vertex3(0.0, 1.0, 0.0).unwrap();

    let before = mesh.clone();
    mesh.recalc_tangents();
    assert_eq!(mesh, before);
}

#[test]
fn reverse_winding_is_an_involution() {
    let mut rng = StdRng::seed_from_u64(11);
    let original = random_triangles(&mut rng, 20);

    let mut mesh = original.clone();
    mesh.reverse_winding();
    assert_ne!(mesh.submeshes()[0].indices(), original.submeshes()[0].indices());
    mesh.reverse_winding();
    assert_eq!(mesh, original);
}

#[test]
fn wireframe_edges_are_unique_and_bounded() {
    let sphere = create_sphere(1.0, 12, 6, false).unwrap();
    let triangles = sphere.primitive_count();
    let wire = sphere.to_wire_frame();

    let lines = wire.primitive_count();
    assert!(lines <= 3 * triangles);
    assert!(lines >= (3 * triangles).div_ceil(2));

    for (solid, lines) in sphere.submeshes().iter().zip(wire.submeshes()) {
        assert_eq!(lines.primitive_type(), PrimitiveKind::Lines);
        assert!(lines.shares_vertices_with(solid));

        let mut seen = std::collections::HashSet::new();
        for edge in lines.indices().chunks_exact(2) {
            assert!(seen.insert((edge[0].min(edge[1]), edge[0].max(edge[1]))));
        }
    }
}

#[test]
fn wireframe_copy_on_write_keeps_source_intact() {
    let sphere = create_sphere(1.0, 8, 4, false).unwrap();
    let mut wire = sphere.to_wire_frame();
    let before = sphere.get_vertex(0);

    wire.set_vertex(0, 9.0, 9.0, 9.0);
    assert_eq!(sphere.get_vertex(0), before);
    assert!(!wire.submeshes()[0].shares_vertices_with(&sphere.submeshes()[0]));
}

#[test]
fn merge_adds_vertex_and_primitive_counts() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..5 {
        let (a_count, c_count) = (rng.random_range(1..30), rng.random_range(1..30));
        let a = random_triangles(&mut rng, a_count);
        let b = create_box(1.0, 1.0, 1.0, false).unwrap();
        let c = random_triangles(&mut rng, c_count);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        let vertices = a.vertex_count() + b.vertex_count() + c.vertex_count();
        let primitives = a.primitive_count() + b.primitive_count() + c.primitive_count();
        assert_eq!(left.vertex_count(), vertices);
        assert_eq!(right.vertex_count(), vertices);
        assert_eq!(left.primitive_count(), primitives);
        assert_eq!(right.primitive_count(), primitives);
    }
}

#[test]
fn merge_extends_matching_submeshes_and_restarts_primitives() {
    let mut a = Mesh::new();
    a.mode(PrimitiveMode::TriangleStrip);
    a.vertex3(0.0, 0.0, 0.0).unwrap();
    a.vertex3(1.0, 0.0, 0.0).unwrap();
    a.vertex3(0.0, 1.0, 0.0).unwrap();

    let b = a.clone();
    a.merge(&b);
    assert_eq!(a.submeshes().len(), 1);
    assert_eq!(a.submeshes()[0].indices(), &[0, 1, 2, 3, 4, 5]);

    // The merged-in strip does not continue into new vertices.
    a.vertex3(1.0, 1.0, 0.0).unwrap();
    assert_eq!(a.primitive_count(), 2);
}

#[test]
fn transform_moves_points_and_rotates_normals() {
    let mut mesh = create_box(2.0, 2.0, 2.0, false).unwrap();
    let rotate = Transform::rotate_axis(Vec3::Z, std::f64::consts::FRAC_PI_2).unwrap();
    let matrix = Transform::translate(Vec3::new(10.0, 0.0, 0.0)).compose(rotate);
    mesh.transform(&matrix);

    let tol = Tolerance::LOOSE;
    let bbox = mesh.bounding_box();
    assert!(tol.approx_eq_f64(bbox.center().x, 10.0));

    // The +X face (first four vertices) now faces +Y.
    let n = mesh.get_vertex_normal(0).unwrap();
    assert!(tol.approx_eq_vec3(n, Vec3::Y));
}

#[test]
fn non_uniform_scale_keeps_normals_perpendicular() {
    let mut mesh = textured_triangle();
    mesh.recalc_normals(false, false);
    mesh.transform(&Transform::scale(1.0, 4.0, 0.5));
    let p: Vec<_> = (0..3).map(|i| mesh.get_vertex(i).unwrap()).collect();
    let n = mesh.get_vertex_normal(0).unwrap();

    assert!(n.dot(p[1] - p[0]).abs() < 1e-9);
    assert!(n.dot(p[2] - p[0]).abs() < 1e-9);
    assert!((n.length() - 1.0).abs() < 1e-12);
}

#[test]
fn set_color_and_normal_helpers() {
    let mut mesh = create_box(1.0, 1.0, 1.0, false).unwrap();
    mesh.set_color3(0.1, 0.2, 0.3);
    for submesh in mesh.submeshes() {
        assert!(submesh.format().contains(VertexFormat::COLOR));
    }
    let primitives = mesh.primitives();
    assert!(primitives.iter().flatten().all(|v| v.color == Some([0.1, 0.2, 0.3])));

    mesh.set_vertex_normal(0, 0.0, 0.0, 5.0);
    mesh.normalize_normals();
    assert_eq!(mesh.get_vertex_normal(0), Some(Vec3::Z));
    mesh.reverse_normals();
    assert_eq!(mesh.get_vertex_normal(0), Some(-Vec3::Z));
}

fn point_cloud(count: u32, z: f64) -> Mesh {
    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Points);
    for k in 0..count {
        mesh.vertex3(f64::from(k), 0.0, z).unwrap();
    }
    mesh
}

#[test]
fn merge_past_the_vertex_ceiling_starts_a_new_submesh() {
    let mut merged = point_cloud(40_000, 0.0);
    merged.merge(&point_cloud(40_000, 1.0));

    assert_eq!(merged.submeshes().len(), 2);
    assert_eq!(merged.vertex_count(), 80_000);
    assert_eq!(merged.primitive_count(), 80_000);
    for submesh in merged.submeshes() {
        assert!(submesh.vertex_count() <= Mesh::MAX_SUBMESH_VERTICES);
        assert_eq!(submesh.vertex_count(), 40_000);
    }
    assert_eq!(merged.get_vertex(40_000).unwrap().z, 1.0);

    let mut small = point_cloud(40_000, 0.0);
    small.merge(&point_cloud(25_535, 1.0));
    assert_eq!(small.submeshes().len(), 1);
    assert_eq!(small.vertex_count(), Mesh::MAX_SUBMESH_VERTICES);
}
