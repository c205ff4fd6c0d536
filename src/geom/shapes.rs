//! Built-in primitive shapes with normals and texture coordinates.
//!
//! Every builder produces triangles wound counter-clockwise when seen from
//! the side the normals point to. `inward` flips both.

use std::f64::consts::TAU;

use super::core::{Transform, Vec3};
use super::eval::{EvalError, EvalMode, SurfaceEval};
use super::format::PrimitiveMode;
use super::mesh::{Mesh, MeshError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("{name} must be a finite, positive number (got {value})")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("{name} must be at least {min} (got {value})")]
    InvalidSubdivisions { name: &'static str, value: usize, min: usize },
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn positive(name: &'static str, value: f64) -> Result<f64, ShapeError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ShapeError::InvalidDimension { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<f64, ShapeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ShapeError::InvalidDimension { name, value })
    }
}

fn subdivisions(name: &'static str, value: usize, min: usize) -> Result<usize, ShapeError> {
    if value >= min {
        Ok(value)
    } else {
        Err(ShapeError::InvalidSubdivisions { name, value, min })
    }
}

fn finish(mut mesh: Mesh, inward: bool) -> Mesh {
    if inward {
        mesh.reverse_winding().reverse_normals();
    }
    mesh
}

/// Full turn at `u`, with `u = 1` landing exactly on the `u = 0` angle.
fn turn(u: f64) -> f64 {
    if u >= 1.0 { 0.0 } else { u * TAU }
}

/// Axis-aligned box centered at the origin.
pub fn create_box(x_size: f64, y_size: f64, z_size: f64, inward: bool) -> Result<Mesh, ShapeError> {
    let hx = positive("x_size", x_size)? / 2.0;
    let hy = positive("y_size", y_size)? / 2.0;
    let hz = positive("z_size", z_size)? / 2.0;

    let faces: [([f64; 3], [[f64; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[hx, -hy, -hz], [hx, hy, -hz], [hx, hy, hz], [hx, -hy, hz]]),
        ([-1.0, 0.0, 0.0], [[-hx, hy, -hz], [-hx, -hy, -hz], [-hx, -hy, hz], [-hx, hy, hz]]),
        ([0.0, 1.0, 0.0], [[hx, hy, -hz], [-hx, hy, -hz], [-hx, hy, hz], [hx, hy, hz]]),
        ([0.0, -1.0, 0.0], [[-hx, -hy, -hz], [hx, -hy, -hz], [hx, -hy, hz], [-hx, -hy, hz]]),
        ([0.0, 0.0, 1.0], [[-hx, -hy, hz], [hx, -hy, hz], [hx, hy, hz], [-hx, hy, hz]]),
        ([0.0, 0.0, -1.0], [[-hx, hy, -hz], [hx, hy, -hz], [hx, -hy, -hz], [-hx, -hy, -hz]]),
    ];
    const UVS: [[f64; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

    let mut mesh = Mesh::new();
    mesh.mode(PrimitiveMode::Quads);
    for ([nx, ny, nz], corners) in faces {
        mesh.normal3(nx, ny, nz);
        for ([x, y, z], [u, v]) in corners.into_iter().zip(UVS) {
            mesh.tex_coord2(u, v).vertex3(x, y, z)?;
        }
    }
    Ok(finish(mesh, inward))
}

/// Rectangle in the XY plane centered at the origin, facing +Z.
pub fn create_plane(
    width: f64,
    height: f64,
    width_div: usize,
    height_div: usize,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    let width = positive("width", width)?;
    let height = positive("height", height)?;
    let width_div = subdivisions("width_div", width_div, 1)?;
    let height_div = subdivisions("height_div", height_div, 1)?;

    let mut eval = SurfaceEval::new();
    eval.vertex(move |u: f64, v: f64| [(u - 0.5) * width, (v - 0.5) * height, 0.0])
        .normal(|_: f64, _: f64| [0.0, 0.0, 1.0])
        .tex_coord(|u: f64, v: f64| [u, v]);

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, width_div, height_div, 0.0, 1.0, 0.0, 1.0)?;
    Ok(finish(mesh, inward))
}

/// Annulus in the XY plane facing +Z. An inner radius of zero gives a
/// filled disk.
pub fn create_disk(
    inner: f64,
    outer: f64,
    slices: usize,
    loops: usize,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    create_partial_disk(inner, outer, slices, loops, 0.0, 360.0, inward)
}

/// Sector of an annulus in the XY plane facing +Z.
///
/// Angles are in degrees, counter-clockwise from +X. A negative sweep runs
/// clockwise; the triangles still face +Z.
pub fn create_partial_disk(
    inner: f64,
    outer: f64,
    slices: usize,
    loops: usize,
    start_degrees: f64,
    sweep_degrees: f64,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    let inner = non_negative("inner", inner)?;
    let outer = positive("outer", outer)?;
    if inner >= outer {
        return Err(ShapeError::InvalidDimension {
            name: "inner",
            value: inner,
        });
    }
    let slices = subdivisions("slices", slices, 3)?;
    let loops = subdivisions("loops", loops, 1)?;
    if !start_degrees.is_finite() {
        return Err(ShapeError::InvalidDimension {
            name: "start_degrees",
            value: start_degrees,
        });
    }
    if !sweep_degrees.is_finite() || sweep_degrees == 0.0 {
        return Err(ShapeError::InvalidDimension {
            name: "sweep_degrees",
            value: sweep_degrees,
        });
    }

    let sweep = sweep_degrees.clamp(-360.0, 360.0);
    let full = sweep.abs() >= 360.0;
    let start = start_degrees.to_radians();
    let angle = move |v: f64| {
        if full { start + sweep.signum() * turn(v) } else { start + (sweep * v).to_radians() }
    };
    let point = move |u: f64, v: f64| {
        let radius = inner + (outer - inner) * u;
        let (sin, cos) = angle(v).sin_cos();
        [radius * cos, radius * sin]
    };

    let mut eval = SurfaceEval::new();
    eval.vertex(move |u: f64, v: f64| {
        let [x, y] = point(u, v);
        [x, y, 0.0]
    })
    .normal(|_: f64, _: f64| [0.0, 0.0, 1.0])
    .tex_coord(move |u: f64, v: f64| {
        let [x, y] = point(u, v);
        [0.5 + x / (2.0 * outer), 0.5 + y / (2.0 * outer)]
    });

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, loops, slices, 0.0, 1.0, 0.0, 1.0)?;
    if sweep < 0.0 {
        mesh.reverse_winding();
    }
    Ok(finish(mesh, inward))
}

/// Open cylinder or cone along +Z from `z = 0` to `z = height`. Either
/// radius may be zero for a cone.
pub fn create_cylinder(
    base_radius: f64,
    top_radius: f64,
    height: f64,
    slices: usize,
    stacks: usize,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    let base = non_negative("base_radius", base_radius)?;
    let top = non_negative("top_radius", top_radius)?;
    if base == 0.0 && top == 0.0 {
        return Err(ShapeError::InvalidDimension {
            name: "base_radius",
            value: base,
        });
    }
    let height = positive("height", height)?;
    let slices = subdivisions("slices", slices, 3)?;
    let stacks = subdivisions("stacks", stacks, 1)?;

    let slope = base - top;
    let mut eval = SurfaceEval::new();
    eval.vertex(move |u: f64, v: f64| {
        let radius = base + (top - base) * v;
        let (sin, cos) = turn(u).sin_cos();
        [radius * cos, radius * sin, height * v]
    })
    .normal(move |u: f64, _: f64| {
        let (sin, cos) = turn(u).sin_cos();
        let len = (height * height + slope * slope).sqrt();
        [height * cos / len, height * sin / len, slope / len]
    })
    .tex_coord(|u: f64, v: f64| [u, v]);

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, slices, stacks, 0.0, 1.0, 0.0, 1.0)?;
    Ok(finish(mesh, inward))
}

/// Cylinder with disks closing the base and top (a zero radius end gets
/// no disk).
pub fn create_closed_cylinder(
    base_radius: f64,
    top_radius: f64,
    height: f64,
    slices: usize,
    stacks: usize,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    let mut mesh = create_cylinder(base_radius, top_radius, height, slices, stacks, false)?;

    if base_radius > 0.0 {
        let base_cap = create_disk(0.0, base_radius, slices, 1, true)?;
        mesh.merge(&base_cap);
    }
    if top_radius > 0.0 {
        let mut top_cap = create_disk(0.0, top_radius, slices, 1, false)?;
        top_cap.transform(&Transform::translate(Vec3::new(0.0, 0.0, height)));
        mesh.merge(&top_cap);
    }
    Ok(finish(mesh, inward))
}

/// Sphere centered at the origin; `slices` run around Z, `stacks` from
/// pole to pole.
pub fn create_sphere(radius: f64, slices: usize, stacks: usize, inward: bool) -> Result<Mesh, ShapeError> {
    let radius = positive("radius", radius)?;
    let slices = subdivisions("slices", slices, 3)?;
    let stacks = subdivisions("stacks", stacks, 2)?;

    let direction = |u: f64, v: f64| {
        let (sin_lat, cos_lat) = if v <= 0.0 {
            (-1.0, 0.0)
        } else if v >= 1.0 {
            (1.0, 0.0)
        } else {
            (std::f64::consts::PI * (v - 0.5)).sin_cos()
        };
        let (sin_lon, cos_lon) = turn(u).sin_cos();
        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
    };

    let mut eval = SurfaceEval::new();
    eval.vertex(move |u: f64, v: f64| direction(u, v).map(|c| c * radius))
        .normal(direction)
        .tex_coord(|u: f64, v: f64| [u, v]);

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, slices, stacks, 0.0, 1.0, 0.0, 1.0)?;
    Ok(finish(mesh, inward))
}

/// Torus around Z: `outer` is the distance from the center to the middle
/// of the tube, `inner` the tube radius.
pub fn create_torus(
    inner: f64,
    outer: f64,
    slices: usize,
    stacks: usize,
    inward: bool,
) -> Result<Mesh, ShapeError> {
    let inner = positive("inner", inner)?;
    let outer = positive("outer", outer)?;
    let slices = subdivisions("slices", slices, 3)?;
    let stacks = subdivisions("stacks", stacks, 3)?;

    let tube = |u: f64, v: f64| {
        let (sin_ring, cos_ring) = turn(u).sin_cos();
        let (sin_tube, cos_tube) = turn(v).sin_cos();
        ([cos_ring, sin_ring], [cos_tube, sin_tube])
    };

    let mut eval = SurfaceEval::new();
    eval.vertex(move |u: f64, v: f64| {
        let ([cr, sr], [ct, st]) = tube(u, v);
        let r = outer + inner * ct;
        [r * cr, r * sr, inner * st]
    })
    .normal(move |u: f64, v: f64| {
        let ([cr, sr], [ct, st]) = tube(u, v);
        [ct * cr, ct * sr, st]
    })
    .tex_coord(|u: f64, v: f64| [u, v]);

    let mut mesh = Mesh::new();
    eval.eval_surface(&mut mesh, EvalMode::Triangles, slices, stacks, 0.0, 1.0, 0.0, 1.0)?;
    Ok(finish(mesh, inward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_rejects_bad_inputs() {
        assert!(matches!(
            create_box(0.0, 1.0, 1.0, false),
            Err(ShapeError::InvalidDimension { name: "x_size", .. })
        ));
        assert!(matches!(
            create_sphere(1.0, 2, 4, false),
            Err(ShapeError::InvalidSubdivisions { name: "slices", .. })
        ));
        assert!(matches!(
            create_disk(2.0, 1.0, 8, 1, false),
            Err(ShapeError::InvalidDimension { name: "inner", .. })
        ));
        assert!(create_cylinder(0.0, 0.0, 1.0, 8, 1, false).is_err());
    }

    #[test]
    fn turn_closes_exactly() {
        assert_eq!(turn(1.0), turn(0.0));
    }
}
