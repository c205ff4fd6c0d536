mod test_bspline;
mod test_implicit;
mod test_post_processing;

use crate::geom::{Mesh, Vec3};

/// Signed volume enclosed by the triangles; positive when they face outward.
fn signed_volume(mesh: &Mesh) -> f64 {
    let mut volume = 0.0;
    mesh.enum_primitives(|vertices| {
        if let [a, b, c] = vertices {
            let [a, b, c] = [a, b, c].map(|v| Vec3::from_array(v.position));
            volume += a.dot(b.cross(c)) / 6.0;
        }
    });
    volume
}
