//! Trilinear interpolation on RegularGrid3D and cubic Hermite segments.

use crate::vector::Vector3;
use ndarray::{Array3, Array4};
use synrad_types::grid::RegularGrid3D;

/// Corner indices and weights of the cell containing `point`.
///
/// Returns `None` outside the sampled extent. Invariant axes (one sample)
/// contribute a single corner with full weight.
fn cell_corners(grid: &RegularGrid3D, point: [f64; 3]) -> Option<[([usize; 3], f64); 8]> {
    let (ix, tx) = grid.locate(0, point[0])?;
    let (iy, ty) = grid.locate(1, point[1])?;
    let (iz, tz) = grid.locate(2, point[2])?;
    let hi = |i: usize, axis: usize| (i + 1).min(grid.shape[axis] - 1);
    let (ix1, iy1, iz1) = (hi(ix, 0), hi(iy, 1), hi(iz, 2));

    Some([
        ([ix, iy, iz], (1.0 - tx) * (1.0 - ty) * (1.0 - tz)),
        ([ix1, iy, iz], tx * (1.0 - ty) * (1.0 - tz)),
        ([ix, iy1, iz], (1.0 - tx) * ty * (1.0 - tz)),
        ([ix1, iy1, iz], tx * ty * (1.0 - tz)),
        ([ix, iy, iz1], (1.0 - tx) * (1.0 - ty) * tz),
        ([ix1, iy, iz1], tx * (1.0 - ty) * tz),
        ([ix, iy1, iz1], (1.0 - tx) * ty * tz),
        ([ix1, iy1, iz1], tx * ty * tz),
    ])
}

/// Trilinear interpolation of a scalar field with shape `grid.shape`.
pub fn trilinear(field: &Array3<f64>, grid: &RegularGrid3D, point: [f64; 3]) -> Option<f64> {
    let corners = cell_corners(grid, point)?;
    Some(
        corners
            .iter()
            .filter(|(_, w)| *w != 0.0)
            .map(|(i, w)| w * field[*i])
            .sum(),
    )
}

/// Trilinear interpolation of a vector field stored as `(nx, ny, nz, 3)`.
pub fn trilinear_vector(
    field: &Array4<f64>,
    grid: &RegularGrid3D,
    point: [f64; 3],
) -> Option<Vector3> {
    let corners = cell_corners(grid, point)?;
    let mut out = Vector3::ZERO;
    for ([i, j, k], w) in corners.iter() {
        if *w == 0.0 {
            continue;
        }
        out += Vector3::new(field[[*i, *j, *k, 0]], field[[*i, *j, *k, 1]], field[[*i, *j, *k, 2]]) * *w;
    }
    Some(out)
}

/// Cubic Hermite interpolation on one segment of length `h`.
///
/// `p0`, `p1` are the end values, `d0`, `d1` their derivatives with respect
/// to the physical coordinate, and `s ∈ [0, 1]` the fractional position.
pub fn hermite(p0: Vector3, d0: Vector3, p1: Vector3, d1: Vector3, h: f64, s: f64) -> Vector3 {
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    p0 * h00 + d0 * (h10 * h) + p1 * h01 + d1 * (h11 * h)
}

/// Derivative of [`hermite`] with respect to the physical coordinate.
pub fn hermite_derivative(
    p0: Vector3,
    d0: Vector3,
    p1: Vector3,
    d1: Vector3,
    h: f64,
    s: f64,
) -> Vector3 {
    let s2 = s * s;
    let g00 = 6.0 * s2 - 6.0 * s;
    let g10 = 3.0 * s2 - 4.0 * s + 1.0;
    let g01 = -6.0 * s2 + 6.0 * s;
    let g11 = 3.0 * s2 - 2.0 * s;
    (p0 * g00 + p1 * g01) / h + d0 * g10 + d1 * g11
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trilinear_exact_gridpoint() {
        let grid = RegularGrid3D::new([3, 4, 5], [0.0; 3], [1.0; 3]).unwrap();
        let field = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| (i * 100 + j * 10 + k) as f64);
        let val = trilinear(&field, &grid, [2.0, 1.0, 3.0]).unwrap();
        assert!((val - 213.0).abs() < 1e-10, "val = {val}, expected 213");
    }

    #[test]
    fn test_trilinear_reproduces_linear_field() {
        let grid = RegularGrid3D::from_extent([6, 6, 6], [-1.0; 3], [1.0; 3]).unwrap();
        let field = Array3::from_shape_fn((6, 6, 6), |(i, j, k)| {
            2.0 * grid.axes[0][i] - grid.axes[1][j] + 0.5 * grid.axes[2][k] + 3.0
        });
        let p = [0.13, -0.71, 0.44];
        let val = trilinear(&field, &grid, p).unwrap();
        let expected = 2.0 * p[0] - p[1] + 0.5 * p[2] + 3.0;
        assert!((val - expected).abs() < 1e-12, "{val} vs {expected}");
    }

    #[test]
    fn test_trilinear_invariant_axis_and_outside() {
        // Single-sample x and y: the field only varies along z.
        let grid = RegularGrid3D::new([1, 1, 3], [0.0; 3], [0.0, 0.0, 1.0]).unwrap();
        let field = Array4::from_shape_fn((1, 1, 3, 3), |(_, _, k, c)| if c == 1 { k as f64 } else { 0.0 });
        let b = trilinear_vector(&field, &grid, [10.0, -4.0, 1.5]).unwrap();
        assert!((b.y - 1.5).abs() < 1e-12);
        assert!(trilinear_vector(&field, &grid, [0.0, 0.0, 2.5]).is_none());
    }

    #[test]
    fn test_hermite_exact_for_cubic() {
        // f(t) = t^3 on [1, 3]
        let f = |t: f64| Vector3::new(t * t * t, 0.0, 0.0);
        let df = |t: f64| Vector3::new(3.0 * t * t, 0.0, 0.0);
        let h = 2.0;
        for s in [0.0, 0.25, 0.5, 0.9, 1.0] {
            let t = 1.0 + s * h;
            let v = hermite(f(1.0), df(1.0), f(3.0), df(3.0), h, s);
            let dv = hermite_derivative(f(1.0), df(1.0), f(3.0), df(3.0), h, s);
            assert!((v.x - f(t).x).abs() < 1e-12, "s={s}: {} vs {}", v.x, f(t).x);
            assert!((dv.x - df(t).x).abs() < 1e-12);
        }
    }
}
