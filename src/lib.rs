#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;

use std::fmt;

use geom::{Mesh, PrimitiveMode, SubMesh, Transform};
use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            // no-op fallback when panic hook is disabled
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {
    // no-op fallback when debug logs are disabled
}

#[derive(Debug, Serialize)]
struct SubMeshExport {
    primitive: &'static str,
    format: u32,
    stride: usize,
    vertex_count: usize,
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl From<&SubMesh> for SubMeshExport {
    fn from(submesh: &SubMesh) -> Self {
        Self {
            primitive: submesh.primitive_type().name(),
            format: submesh.format().bits(),
            stride: submesh.stride(),
            vertex_count: submesh.vertex_count(),
            vertices: narrow(submesh.vertices()),
            indices: submesh.indices().to_vec(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn narrow(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Mesh-bouwer voor de JS-renderlaag.
#[wasm_bindgen]
#[derive(Debug, Clone, Default)]
pub struct MeshHandle {
    mesh: Mesh,
}

#[wasm_bindgen]
impl MeshHandle {
    #[wasm_bindgen(constructor)]
    pub fn new() -> MeshHandle {
        MeshHandle { mesh: Mesh::new() }
    }

    /// Kies de tekenmodus (GL-codes: 0 punten, 1 lijnen, 3 lijnstrook,
    /// 4 driehoeken, 5 driehoekstrook, 6 waaier, 7 quads, 8 quadstrook).
    #[wasm_bindgen]
    pub fn mode(&mut self, code: u32) -> Result<(), JsValue> {
        let Some(mode) = PrimitiveMode::from_code(code) else {
            return Err(js_error(&format!("onbekende tekenmodus {code}")));
        };
        self.mesh.mode(mode);
        Ok(())
    }

    #[wasm_bindgen]
    pub fn normal3(&mut self, x: f64, y: f64, z: f64) {
        self.mesh.normal3(x, y, z);
    }

    #[wasm_bindgen]
    pub fn color3(&mut self, r: f64, g: f64, b: f64) {
        self.mesh.color3(r, g, b);
    }

    #[wasm_bindgen]
    pub fn tex_coord2(&mut self, u: f64, v: f64) {
        self.mesh.tex_coord2(u, v);
    }

    #[wasm_bindgen]
    pub fn tangent3(&mut self, x: f64, y: f64, z: f64) {
        self.mesh.tangent3(x, y, z);
    }

    #[wasm_bindgen]
    pub fn bitangent3(&mut self, x: f64, y: f64, z: f64) {
        self.mesh.bitangent3(x, y, z);
    }

    /// Voeg een vertex toe; faalt zolang er geen tekenmodus gekozen is.
    #[wasm_bindgen]
    pub fn vertex3(&mut self, x: f64, y: f64, z: f64) -> Result<(), JsValue> {
        self.mesh.vertex3(x, y, z).map_err(to_js_error)?;
        Ok(())
    }

    #[wasm_bindgen]
    pub fn vertex2(&mut self, x: f64, y: f64) -> Result<(), JsValue> {
        self.vertex3(x, y, 0.0)
    }

    #[wasm_bindgen]
    pub fn merge(&mut self, other: &MeshHandle) {
        self.mesh.merge(&other.mesh);
    }

    /// Pas een 4x4-matrix toe (16 waarden, kolom-major).
    #[wasm_bindgen]
    pub fn transform(&mut self, matrix: &[f64]) -> Result<(), JsValue> {
        let Ok(values) = <&[f64; 16]>::try_from(matrix) else {
            return Err(js_error("transformatie verwacht precies 16 waarden"));
        };
        self.mesh.transform(&Transform::from_cols_array(values));
        Ok(())
    }

    #[wasm_bindgen]
    pub fn recalc_normals(&mut self, flat: bool, inward: bool) {
        self.mesh.recalc_normals(flat, inward);
    }

    #[wasm_bindgen]
    pub fn recalc_tangents(&mut self) {
        self.mesh.recalc_tangents();
    }

    #[wasm_bindgen]
    pub fn normalize_normals(&mut self) {
        self.mesh.normalize_normals();
    }

    #[wasm_bindgen]
    pub fn reverse_normals(&mut self) {
        self.mesh.reverse_normals();
    }

    #[wasm_bindgen]
    pub fn reverse_winding(&mut self) {
        self.mesh.reverse_winding();
    }

    #[wasm_bindgen]
    pub fn set_color3(&mut self, r: f64, g: f64, b: f64) {
        self.mesh.set_color3(r, g, b);
    }

    #[wasm_bindgen]
    pub fn to_wire_frame(&self) -> MeshHandle {
        MeshHandle {
            mesh: self.mesh.to_wire_frame(),
        }
    }

    #[wasm_bindgen]
    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    #[wasm_bindgen]
    pub fn primitive_count(&self) -> usize {
        self.mesh.primitive_count()
    }

    /// Positie van een globale vertex-index, of `undefined` buiten bereik.
    #[wasm_bindgen]
    pub fn get_vertex(&self, index: i32) -> Option<Vec<f64>> {
        let index = usize::try_from(index).ok()?;
        self.mesh.get_vertex(index).map(|p| p.to_array().to_vec())
    }

    #[wasm_bindgen]
    pub fn set_vertex(&mut self, index: i32, x: f64, y: f64, z: f64) {
        if let Ok(index) = usize::try_from(index) {
            self.mesh.set_vertex(index, x, y, z);
        }
    }

    #[wasm_bindgen]
    pub fn get_vertex_normal(&self, index: i32) -> Option<Vec<f64>> {
        let index = usize::try_from(index).ok()?;
        self.mesh.get_vertex_normal(index).map(|n| n.to_array().to_vec())
    }

    #[wasm_bindgen]
    pub fn set_vertex_normal(&mut self, index: i32, x: f64, y: f64, z: f64) {
        if let Ok(index) = usize::try_from(index) {
            self.mesh.set_vertex_normal(index, x, y, z);
        }
    }

    /// `[minX, minY, minZ, maxX, maxY, maxZ]`; leeg geeft +inf/-inf.
    #[wasm_bindgen]
    pub fn bounding_box(&self) -> Vec<f64> {
        self.mesh.bounding_box().to_array().to_vec()
    }

    #[wasm_bindgen]
    pub fn submesh_count(&self) -> usize {
        self.mesh.submeshes().len()
    }

    #[wasm_bindgen]
    pub fn submesh_format(&self, index: usize) -> Result<u32, JsValue> {
        Ok(self.submesh(index)?.format().bits())
    }

    #[wasm_bindgen]
    pub fn submesh_stride(&self, index: usize) -> Result<usize, JsValue> {
        Ok(self.submesh(index)?.stride())
    }

    /// Vertexbuffer van een submesh als `Float32Array`.
    #[wasm_bindgen]
    pub fn submesh_vertices(&self, index: usize) -> Result<Vec<f32>, JsValue> {
        Ok(narrow(self.submesh(index)?.vertices()))
    }

    #[wasm_bindgen]
    pub fn submesh_indices(&self, index: usize) -> Result<Vec<u32>, JsValue> {
        Ok(self.submesh(index)?.indices().to_vec())
    }

    /// Alle submeshes in één keer, klaar voor upload naar GPU-buffers.
    #[wasm_bindgen]
    pub fn get_submeshes(&self) -> Result<JsValue, JsValue> {
        let exports: Vec<SubMeshExport> = self.mesh.submeshes().iter().map(SubMeshExport::from).collect();
        serde_wasm_bindgen::to_value(&exports).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Primitieven met hun vertex-attributen, voor inspectie of export.
    #[wasm_bindgen]
    pub fn get_primitives(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.mesh.primitives())
            .map_err(|err| JsError::new(&err.to_string()).into())
    }

    #[wasm_bindgen]
    pub fn diagnostics_summary(&self) -> String {
        self.mesh.diagnostics().summary()
    }

    // Vormen

    #[wasm_bindgen]
    pub fn create_box(x_size: f64, y_size: f64, z_size: f64, inward: bool) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_box(x_size, y_size, z_size, inward))
    }

    #[wasm_bindgen]
    pub fn create_plane(
        width: f64,
        height: f64,
        width_div: usize,
        height_div: usize,
        inward: bool,
    ) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_plane(width, height, width_div, height_div, inward))
    }

    #[wasm_bindgen]
    pub fn create_disk(inner: f64, outer: f64, slices: usize, loops: usize, inward: bool) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_disk(inner, outer, slices, loops, inward))
    }

    #[wasm_bindgen]
    pub fn create_partial_disk(
        inner: f64,
        outer: f64,
        slices: usize,
        loops: usize,
        start_degrees: f64,
        sweep_degrees: f64,
        inward: bool,
    ) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_partial_disk(
            inner,
            outer,
            slices,
            loops,
            start_degrees,
            sweep_degrees,
            inward,
        ))
    }

    #[wasm_bindgen]
    pub fn create_cylinder(
        base_radius: f64,
        top_radius: f64,
        height: f64,
        slices: usize,
        stacks: usize,
        inward: bool,
    ) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_cylinder(base_radius, top_radius, height, slices, stacks, inward))
    }

    #[wasm_bindgen]
    pub fn create_closed_cylinder(
        base_radius: f64,
        top_radius: f64,
        height: f64,
        slices: usize,
        stacks: usize,
        inward: bool,
    ) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_closed_cylinder(base_radius, top_radius, height, slices, stacks, inward))
    }

    #[wasm_bindgen]
    pub fn create_sphere(radius: f64, slices: usize, stacks: usize, inward: bool) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_sphere(radius, slices, stacks, inward))
    }

    #[wasm_bindgen]
    pub fn create_torus(inner: f64, outer: f64, slices: usize, stacks: usize, inward: bool) -> Result<MeshHandle, JsValue> {
        wrap(geom::create_torus(inner, outer, slices, stacks, inward))
    }
}

impl MeshHandle {
    /// Native toegang tot de onderliggende mesh.
    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[must_use]
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    fn submesh(&self, index: usize) -> Result<&SubMesh, JsValue> {
        self.mesh
            .submeshes()
            .get(index)
            .ok_or_else(|| js_error(&format!("submesh {index} bestaat niet")))
    }
}

impl From<Mesh> for MeshHandle {
    fn from(mesh: Mesh) -> Self {
        Self { mesh }
    }
}

fn wrap<E: fmt::Display>(result: Result<Mesh, E>) -> Result<MeshHandle, JsValue> {
    result.map(MeshHandle::from).map_err(to_js_error)
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(&error.to_string())
}

fn js_error(message: &str) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}
