#[cfg(target_arch = "wasm32")]
fn main() {
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use mesh_engine::geom::{
        BSplineCurve, BSplineSurface, CurveEval, EvalMode, GridBox, ImplicitSurface,
        MarchingAlgorithm, Mesh, MeshDiagnostics, Point3, PrimitiveKind, PrimitiveMode,
        SplineFlags, SubMesh, SurfaceEval, create_box, create_closed_cylinder, create_sphere,
        create_torus,
    };
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"mesh_cli (mesh-engine)

USAGE:
  mesh_cli list
  mesh_cli run <scenario|all> [options]

SCENARIOS:
  isosurface_sphere
  tetrahedra_torus
  bezier_patch
  nurbs_circle
  shape_box
  shape_sphere
  shape_closed_cylinder
  shape_torus
  sphere_wireframe
  fan_pentagon

OPTIONS (run):
  --out-dir <dir>    Write <scenario>.obj and/or <scenario>.snap to this dir (required for `all`)
  --obj <path>       Write OBJ (single scenario only)
  --snap <path>      Write snapshot (single scenario only)
  --no-obj           Skip OBJ when using --out-dir
  --no-snap          Skip snapshot when using --out-dir
  --overwrite        Overwrite existing output files
  -h, --help         Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut write_obj = true;
        let mut write_snap = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--overwrite" => overwrite = true,
                "--no-obj" => write_obj = false,
                "--no-snap" => write_snap = false,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if !write_obj && !write_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, dir, write_obj, write_snap, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str())
                .ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, dir, write_obj, write_snap, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario =
            Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn run_one_scenario_to_dir(
        scenario: Scenario,
        dir: &Path,
        write_obj: bool,
        write_snap: bool,
        overwrite: bool,
    ) -> Result<(), String> {
        let output = run_scenario(scenario)?;

        if write_snap {
            let path = dir.join(format!("{}.snap", output.name));
            write_text_file(&path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        if write_obj {
            let path = dir.join(format!("{}.obj", output.name));
            write_obj_file(&path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn report(output: &ScenarioOutput) {
        eprintln!(
            "{}: submeshes={} | {}",
            output.name,
            output.mesh.submeshes().len(),
            output.diagnostics.summary()
        );
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = String::new();
        let _ = writeln!(msg, "unknown scenario `{name}`\n\navailable scenarios:");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    // ========================================================================
    // OBJ
    // ========================================================================

    fn write_obj_file(path: &Path, mesh: &Mesh, name: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# mesh-engine mesh_cli").map_err(|e| format!("write obj: {e}"))?;
        writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;

        // OBJ indices are 1-based and global across the file.
        let mut v_base = 1usize;
        let mut vt_base = 1usize;
        let mut vn_base = 1usize;
        for (idx, submesh) in mesh.submeshes().iter().enumerate() {
            write_obj_submesh(&mut w, idx, submesh, v_base, vt_base, vn_base)
                .map_err(|e| format!("write obj: {e}"))?;
            let count = submesh.vertex_count();
            v_base += count;
            if submesh.format().has_texcoord() {
                vt_base += count;
            }
            if submesh.format().has_normal() {
                vn_base += count;
            }
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn write_obj_submesh(
        w: &mut impl Write,
        idx: usize,
        submesh: &SubMesh,
        v_base: usize,
        vt_base: usize,
        vn_base: usize,
    ) -> std::io::Result<()> {
        let format = submesh.format();
        let stride = submesh.stride();
        let vertices = submesh.vertices();

        writeln!(w, "g submesh_{idx}")?;
        for vertex in vertices.chunks_exact(stride) {
            writeln!(w, "v {} {} {}", vertex[0], vertex[1], vertex[2])?;
        }
        if let Some(o) = format.texcoord_offset() {
            for vertex in vertices.chunks_exact(stride) {
                writeln!(w, "vt {} {}", vertex[o], vertex[o + 1])?;
            }
        }
        if let Some(o) = format.normal_offset() {
            for vertex in vertices.chunks_exact(stride) {
                writeln!(w, "vn {} {} {}", vertex[o], vertex[o + 1], vertex[o + 2])?;
            }
        }

        let has_uvs = format.has_texcoord();
        let has_normals = format.has_normal();
        let corner = |index: u32| {
            let i = index as usize;
            let (a, t, n) = (v_base + i, vt_base + i, vn_base + i);
            match (has_uvs, has_normals) {
                (true, true) => format!("{a}/{t}/{n}"),
                (true, false) => format!("{a}/{t}"),
                (false, true) => format!("{a}//{n}"),
                (false, false) => format!("{a}"),
            }
        };

        match submesh.primitive_type() {
            PrimitiveKind::Triangles => {
                for tri in submesh.indices().chunks_exact(3) {
                    writeln!(w, "f {} {} {}", corner(tri[0]), corner(tri[1]), corner(tri[2]))?;
                }
            }
            PrimitiveKind::Lines => {
                for line in submesh.indices().chunks_exact(2) {
                    writeln!(w, "l {} {}", v_base + line[0] as usize, v_base + line[1] as usize)?;
                }
            }
            PrimitiveKind::Points => {
                for &point in submesh.indices() {
                    writeln!(w, "p {}", v_base + point as usize)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let value = if value == -0.0 { 0.0 } else { value };
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == -0.0 { 0.0 } else { q }
    }

    fn write_values_line(out: &mut String, prefix: &str, values: &[f64]) {
        out.push_str(prefix);
        for value in values {
            let _ = write!(out, " {:.SNAPSHOT_DECIMALS$}", quantize_f64(*value));
        }
        out.push('\n');
    }

    fn write_mesh_diagnostics(out: &mut String, diag: &MeshDiagnostics) {
        let _ = writeln!(out, "mesh_diag.submesh_count {}", diag.submesh_count);
        let _ = writeln!(out, "mesh_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "mesh_diag.primitive_count {}", diag.primitive_count);
        let _ = writeln!(out, "mesh_diag.triangle_count {}", diag.triangle_count);
        let _ = writeln!(
            out,
            "mesh_diag.degenerate_triangle_count {}",
            diag.degenerate_triangle_count
        );
        let _ = writeln!(out, "mesh_diag.reused_vertex_count {}", diag.reused_vertex_count);
        let _ = writeln!(out, "mesh_diag.open_edge_count {}", diag.open_edge_count);
        let _ = writeln!(
            out,
            "mesh_diag.non_manifold_edge_count {}",
            diag.non_manifold_edge_count
        );
        let _ = writeln!(out, "mesh_diag.warning_count {}", diag.warnings.len());
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "mesh_diag.warning.{idx} {warning}");
        }
    }

    fn write_mesh(out: &mut String, mesh: &Mesh) {
        let bbox = mesh.bounding_box();
        write_values_line(out, "mesh.bbox", &bbox.to_array());
        let _ = writeln!(out, "mesh.submeshes {}", mesh.submeshes().len());

        for (idx, submesh) in mesh.submeshes().iter().enumerate() {
            let _ = writeln!(out, "submesh.{idx}.primitive {}", submesh.primitive_type());
            let _ = writeln!(out, "submesh.{idx}.format {}", submesh.format());
            let _ = writeln!(out, "submesh.{idx}.stride {}", submesh.stride());
            let _ = writeln!(out, "submesh.{idx}.vertices {}", submesh.vertex_count());
            for vertex in submesh.vertices().chunks_exact(submesh.stride()) {
                write_values_line(out, "v", vertex);
            }

            let index_count = submesh.primitive_type().index_count();
            let _ = writeln!(out, "submesh.{idx}.indices {}", submesh.indices().len());
            for primitive in submesh.indices().chunks_exact(index_count) {
                out.push('i');
                for index in primitive {
                    let _ = write!(out, " {index}");
                }
                out.push('\n');
            }
        }
    }

    fn snapshot(op: &str, mesh: &Mesh, diag: &MeshDiagnostics) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# mesh-engine golden v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        write_mesh_diagnostics(&mut out, diag);
        write_mesh(&mut out, mesh);
        normalize_snapshot_text(&out)
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        IsosurfaceSphere,
        TetrahedraTorus,
        BezierPatch,
        NurbsCircle,
        ShapeBox,
        ShapeSphere,
        ShapeClosedCylinder,
        ShapeTorus,
        SphereWireframe,
        FanPentagon,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::IsosurfaceSphere,
            Scenario::TetrahedraTorus,
            Scenario::BezierPatch,
            Scenario::NurbsCircle,
            Scenario::ShapeBox,
            Scenario::ShapeSphere,
            Scenario::ShapeClosedCylinder,
            Scenario::ShapeTorus,
            Scenario::SphereWireframe,
            Scenario::FanPentagon,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::IsosurfaceSphere => "isosurface_sphere",
                Scenario::TetrahedraTorus => "tetrahedra_torus",
                Scenario::BezierPatch => "bezier_patch",
                Scenario::NurbsCircle => "nurbs_circle",
                Scenario::ShapeBox => "shape_box",
                Scenario::ShapeSphere => "shape_sphere",
                Scenario::ShapeClosedCylinder => "shape_closed_cylinder",
                Scenario::ShapeTorus => "shape_torus",
                Scenario::SphereWireframe => "sphere_wireframe",
                Scenario::FanPentagon => "fan_pentagon",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|scenario| scenario.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: Mesh,
        diagnostics: MeshDiagnostics,
        snapshot: String,
    }

    impl ScenarioOutput {
        fn new(name: &'static str, mesh: Mesh) -> Self {
            let diagnostics = mesh.diagnostics();
            let snapshot = snapshot(name, &mesh, &diagnostics);
            Self {
                name,
                mesh,
                diagnostics,
                snapshot,
            }
        }
    }

    fn run_scenario(scenario: Scenario) -> Result<ScenarioOutput, String> {
        let mesh = match scenario {
            Scenario::IsosurfaceSphere => scenario_isosurface_sphere(),
            Scenario::TetrahedraTorus => scenario_tetrahedra_torus(),
            Scenario::BezierPatch => scenario_bezier_patch(),
            Scenario::NurbsCircle => scenario_nurbs_circle(),
            Scenario::ShapeBox => scenario_shape_box(),
            Scenario::ShapeSphere => create_sphere(1.0, 16, 8, false).map_err(|e| e.to_string()),
            Scenario::ShapeClosedCylinder => {
                create_closed_cylinder(0.5, 0.25, 1.5, 12, 2, false).map_err(|e| e.to_string())
            }
            Scenario::ShapeTorus => create_torus(0.25, 1.0, 16, 8, false).map_err(|e| e.to_string()),
            Scenario::SphereWireframe => create_sphere(1.0, 8, 4, false)
                .map(|sphere| sphere.to_wire_frame())
                .map_err(|e| e.to_string()),
            Scenario::FanPentagon => scenario_fan_pentagon(),
        }?;
        Ok(ScenarioOutput::new(scenario.name(), mesh))
    }

    fn scenario_isosurface_sphere() -> Result<Mesh, String> {
        let surface = ImplicitSurface::new(|x: f64, y: f64, z: f64| x * x + y * y + z * z - 1.0);
        let mut mesh = Mesh::new();
        surface
            .eval_surface(&mut mesh, &GridBox::centered(1.5, 12), MarchingAlgorithm::Cubes)
            .map_err(|e| e.to_string())?;
        Ok(mesh)
    }

    fn scenario_tetrahedra_torus() -> Result<Mesh, String> {
        let (major, minor) = (1.0, 0.35);
        let surface = ImplicitSurface::new(move |x: f64, y: f64, z: f64| {
            let ring = (x * x + y * y).sqrt() - major;
            ring * ring + z * z - minor * minor
        });
        let grid = GridBox::new(
            Point3::new(-1.5, -1.5, -0.5),
            Point3::new(1.5, 1.5, 0.5),
            [18, 18, 6],
        );
        let mut mesh = Mesh::new();
        surface
            .eval_surface(&mut mesh, &grid, MarchingAlgorithm::Tetrahedra)
            .map_err(|e| e.to_string())?;
        Ok(mesh)
    }

    fn scenario_bezier_patch() -> Result<Mesh, String> {
        let grid: Vec<Vec<Vec<f64>>> = (0..4)
            .map(|row| {
                (0..4)
                    .map(|col| {
                        let bump = if (1..3).contains(&row) && (1..3).contains(&col) { 1.0 } else { 0.0 };
                        vec![f64::from(col), f64::from(row), bump]
                    })
                    .collect()
            })
            .collect();
        let patch = BSplineSurface::bezier(grid, SplineFlags::NONE).map_err(|e| e.to_string())?;

        let mut eval = SurfaceEval::new();
        eval.vertex(patch)
            .tex_coord(|u: f64, v: f64| [u, v])
            .set_auto_normal(true);

        let mut mesh = Mesh::new();
        eval.eval_surface(&mut mesh, EvalMode::Triangles, 8, 8, 0.0, 1.0, 0.0, 1.0)
            .map_err(|e| e.to_string())?;
        Ok(mesh)
    }

    fn scenario_nurbs_circle() -> Result<Mesh, String> {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let control_points = vec![
            vec![1.0, 0.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0, w],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![-1.0, 1.0, 0.0, w],
            vec![-1.0, 0.0, 0.0, 1.0],
            vec![-1.0, -1.0, 0.0, w],
            vec![0.0, -1.0, 0.0, 1.0],
            vec![1.0, -1.0, 0.0, w],
            vec![1.0, 0.0, 0.0, 1.0],
        ];
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0];
        let circle =
            BSplineCurve::new(control_points, knots, SplineFlags::RATIONAL).map_err(|e| e.to_string())?;

        let mut eval = CurveEval::new();
        eval.vertex(circle);

        let mut mesh = Mesh::new();
        eval.eval_curve(&mut mesh, EvalMode::Lines, 32, 0.0, 1.0)
            .map_err(|e| e.to_string())?;
        Ok(mesh)
    }

    fn scenario_shape_box() -> Result<Mesh, String> {
        let mut mesh = create_box(1.0, 2.0, 3.0, false).map_err(|e| e.to_string())?;
        mesh.recalc_tangents();
        Ok(mesh)
    }

    fn scenario_fan_pentagon() -> Result<Mesh, String> {
        let mut mesh = Mesh::new();
        mesh.mode(PrimitiveMode::TriangleFan).normal3(0.0, 0.0, 1.0);
        for k in 0..5 {
            let angle = f64::from(k) * std::f64::consts::TAU / 5.0;
            mesh.vertex3(angle.cos(), angle.sin(), 0.0).map_err(|e| e.to_string())?;
        }
        Ok(mesh)
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
