use mesh_engine::MeshHandle;
use mesh_engine::geom::{
    BSplineSurface, EvalMode, GridBox, ImplicitSurface, MarchingAlgorithm, Mesh, PrimitiveKind,
    PrimitiveMode, SplineFlags, SurfaceEval, Transform, Vec3, VertexFormat, clamped_knots,
    create_sphere, create_torus,
};

fn wavy_patch() -> BSplineSurface {
    let grid: Vec<Vec<Vec<f64>>> = (0..5)
        .map(|row| {
            (0..5)
                .map(|col| {
                    let (x, y) = (f64::from(col), f64::from(row));
                    vec![x, y, ((x + y) * 0.7).sin()]
                })
                .collect()
        })
        .collect();
    BSplineSurface::new(grid, clamped_knots(5, 3), clamped_knots(5, 3), SplineFlags::NONE)
        .expect("valid patch")
}

#[test]
fn spline_patch_to_textured_mesh() {
    let patch = wavy_patch();
    let mut eval = SurfaceEval::new();
    eval.vertex(patch)
        .tex_coord(|u: f64, v: f64| [u, v])
        .set_auto_normal(true);

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, 12, 12, 0.0, 1.0, 0.0, 1.0)
        .expect("evaluate patch");
    mesh.recalc_tangents();

    assert_eq!(mesh.primitive_count(), 2 * 12 * 12);
    let format = mesh.submeshes()[0].format();
    assert!(format.contains(VertexFormat::NORMAL | VertexFormat::TEXCOORD));
    assert!(format.has_tangent() && format.has_bitangent());

    let bbox = mesh.bounding_box();
    assert!(bbox.min.x.abs() < 1e-9 && (bbox.max.x - 4.0).abs() < 1e-9);
    assert!(bbox.min.y.abs() < 1e-9 && (bbox.max.y - 4.0).abs() < 1e-9);

    let diagnostics = mesh.diagnostics();
    assert_eq!(diagnostics.open_edge_count, 4 * 12);
    assert_eq!(diagnostics.non_manifold_edge_count, 0);
}

#[test]
fn implicit_and_parametric_meshes_merge_and_transform() {
    let mut scene = create_torus(0.25, 1.0, 24, 12, false).expect("torus");
    let torus_vertices = scene.vertex_count();

    let blob = ImplicitSurface::new(|x: f64, y: f64, z: f64| x * x + y * y + z * z - 0.25);
    let mut ball = Mesh::new();
    let added = blob
        .eval_surface(&mut ball, &GridBox::centered(0.75, 10), MarchingAlgorithm::Tetrahedra)
        .expect("polygonize");
    assert!(added > 0);

    scene.merge(&ball);
    assert_eq!(scene.vertex_count(), torus_vertices + ball.vertex_count());

    let shift = Transform::translate(Vec3::new(0.0, 0.0, 5.0));
    scene.transform(&shift);
    let bbox = scene.bounding_box();
    assert!((4.4..4.6).contains(&bbox.min.z), "min z {}", bbox.min.z);
    assert!((5.4..5.6).contains(&bbox.max.z), "max z {}", bbox.max.z);
    assert!(scene.diagnostics().is_watertight());
}

#[test]
fn wireframe_of_a_sphere_is_all_lines() {
    let sphere = create_sphere(1.0, 16, 8, false).expect("sphere");
    let wire = sphere.to_wire_frame();

    assert_eq!(wire.vertex_count(), sphere.vertex_count());
    assert!(
        wire.submeshes()
            .iter()
            .all(|s| s.primitive_type() == PrimitiveKind::Lines)
    );
    assert_eq!(wire.diagnostics().triangle_count, 0);
}

#[test]
fn evaluation_is_deterministic() {
    let build = || {
        let mut eval = SurfaceEval::new();
        eval.vertex(wavy_patch()).set_auto_normal(true);
        let mut mesh = Mesh::new();
        eval.eval_surface(&mut mesh, EvalMode::Triangles, 7, 5, 0.0, 1.0, 0.0, 1.0)
            .expect("evaluate");
        mesh
    };
    assert_eq!(build(), build());
}

#[test]
fn handle_drives_the_same_builder() {
    let mut handle = MeshHandle::new();
    assert!(handle.mode(PrimitiveMode::TriangleFan.code()).is_ok());
    handle.color3(1.0, 0.0, 0.0);
    for k in 0..6 {
        let angle = f64::from(k) * std::f64::consts::TAU / 6.0;
        assert!(handle.vertex2(angle.cos(), angle.sin()).is_ok());
    }
    assert_eq!(handle.primitive_count(), 4);

    let mut native = Mesh::new();
    native.mode(PrimitiveMode::TriangleFan).color3(1.0, 0.0, 0.0);
    for k in 0..6 {
        let angle = f64::from(k) * std::f64::consts::TAU / 6.0;
        native.vertex2(angle.cos(), angle.sin()).expect("mode is set");
    }
    assert_eq!(handle.mesh(), &native);

    let wire = handle.to_wire_frame();
    assert_eq!(wire.primitive_count(), 6 + 3);
    assert!(handle.diagnostics_summary().starts_with("V:6 P:4"));
}

#[test]
fn handle_shapes_report_invalid_arguments() {
    assert!(MeshHandle::create_sphere(-1.0, 8, 4, false).is_err());
    assert!(MeshHandle::create_torus(0.5, 2.0, 2, 8, false).is_err());

    let Ok(handle) = MeshHandle::create_closed_cylinder(1.0, 1.0, 2.0, 12, 1, false) else {
        panic!("closed cylinder");
    };
    assert!(handle.mesh().diagnostics().is_watertight());
    assert_eq!(handle.into_mesh().bounding_box().max.z, 2.0);
}
