// ─────────────────────────────────────────────────────────────────────
// SynRad — Observation Surfaces
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Observation points with optional outward normals.
//!
//! A normal points along the direction radiation must travel to count as
//! incident, i.e. away from the source for a screen facing the beam.

use ndarray::Array2;
use synrad_math::vector::Vector3;
use synrad_types::error::{SynRadError, SynRadResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vector3,
    pub normal: Option<Vector3>,
}

impl SurfacePoint {
    pub fn new(position: Vector3) -> Self {
        SurfacePoint {
            position,
            normal: None,
        }
    }

    pub fn with_normal(position: Vector3, normal: Vector3) -> Self {
        SurfacePoint {
            position,
            normal: Some(normal.unit()),
        }
    }
}

/// Plane spanned by the two grid axes of a rectangle before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// Axes x̂, ŷ; normal +ẑ.
    XY,
    /// Axes x̂, ẑ; normal +ŷ.
    XZ,
    /// Axes ŷ, ẑ; normal +x̂.
    YZ,
}

impl Plane {
    fn axes(self) -> (Vector3, Vector3, Vector3) {
        match self {
            Plane::XY => (Vector3::X, Vector3::Y, Vector3::Z),
            Plane::XZ => (Vector3::X, Vector3::Z, Vector3::Y),
            Plane::YZ => (Vector3::Y, Vector3::Z, Vector3::X),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangleSpec {
    pub plane: Plane,
    pub width: [f64; 2],
    pub npoints: [usize; 2],
    /// Rotation angles about x, y, z applied in that order (rad).
    pub rotations: [f64; 3],
    pub translation: Vector3,
    pub flip_normal: bool,
}

impl RectangleSpec {
    pub fn new(plane: Plane, width: [f64; 2], npoints: [usize; 2]) -> Self {
        RectangleSpec {
            plane,
            width,
            npoints,
            rotations: [0.0; 3],
            translation: Vector3::ZERO,
            flip_normal: false,
        }
    }

    pub fn translated(mut self, translation: Vector3) -> Self {
        self.translation = translation;
        self
    }

    pub fn rotated(mut self, rotations: [f64; 3]) -> Self {
        self.rotations = rotations;
        self
    }

    pub fn flipped(mut self) -> Self {
        self.flip_normal = !self.flip_normal;
        self
    }
}

/// Grid coordinate `i` of `n` points centred on zero across `width`.
fn centred(width: f64, n: usize, i: usize) -> f64 {
    if n == 1 {
        0.0
    } else {
        -0.5 * width + width * i as f64 / (n - 1) as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    points: Vec<SurfacePoint>,
    /// `[n_first, n_second]` for structured grids, first axis fastest.
    shape: Option<[usize; 2]>,
}

impl Surface {
    pub fn single(position: Vector3) -> Self {
        Surface {
            points: vec![SurfacePoint::new(position)],
            shape: None,
        }
    }

    /// Centred rectangular grid, first axis varying fastest.
    pub fn rectangle(spec: &RectangleSpec) -> SynRadResult<Self> {
        let [nu, nv] = spec.npoints;
        if nu == 0 || nv == 0 {
            return Err(SynRadError::ConfigError(format!(
                "rectangle npoints must be >= 1, got {:?}",
                spec.npoints
            )));
        }
        for w in spec.width {
            if !w.is_finite() || w < 0.0 {
                return Err(SynRadError::ConfigError(format!(
                    "rectangle width must be finite and >= 0, got {w}"
                )));
            }
        }
        if !spec.translation.is_finite() || spec.rotations.iter().any(|r| !r.is_finite()) {
            return Err(SynRadError::ConfigError(
                "rectangle placement must be finite".to_string(),
            ));
        }

        let (a, b, normal) = spec.plane.axes();
        let normal = if spec.flip_normal { -normal } else { normal };
        let normal = normal.rotate_xyz(spec.rotations);
        let mut points = Vec::with_capacity(nu * nv);
        for j in 0..nv {
            let v = centred(spec.width[1], nv, j);
            for i in 0..nu {
                let u = centred(spec.width[0], nu, i);
                let local = a * u + b * v;
                points.push(SurfacePoint {
                    position: local.rotate_xyz(spec.rotations) + spec.translation,
                    normal: Some(normal),
                });
            }
        }
        Ok(Surface {
            points,
            shape: Some([nu, nv]),
        })
    }

    /// Unstructured point set; normals, when given, must match the points.
    pub fn from_points(positions: Vec<Vector3>, normals: Option<Vec<Vector3>>) -> SynRadResult<Self> {
        if positions.is_empty() {
            return Err(SynRadError::ConfigError(
                "surface needs at least one point".to_string(),
            ));
        }
        if let Some(p) = positions.iter().find(|p| !p.is_finite()) {
            return Err(SynRadError::ConfigError(format!(
                "surface point must be finite, got {p:?}"
            )));
        }
        let points = match normals {
            None => positions.into_iter().map(SurfacePoint::new).collect(),
            Some(normals) => {
                if normals.len() != positions.len() {
                    return Err(SynRadError::ConfigError(format!(
                        "surface has {} points but {} normals",
                        positions.len(),
                        normals.len()
                    )));
                }
                positions
                    .into_iter()
                    .zip(normals)
                    .map(|(p, n)| {
                        if !n.is_finite() || n.is_zero() {
                            Err(SynRadError::ConfigError(format!(
                                "surface normal must be finite and non-zero, got {n:?}"
                            )))
                        } else {
                            Ok(SurfacePoint::with_normal(p, n))
                        }
                    })
                    .collect::<SynRadResult<Vec<_>>>()?
            }
        };
        Ok(Surface {
            points,
            shape: None,
        })
    }

    /// Surface `f(u, v)` sampled on an `nu × nv` grid (u fastest).
    ///
    /// Normals are `∂f/∂u × ∂f/∂v` from central differences; degenerate
    /// points get no normal.
    pub fn parametric<F>(
        npoints: [usize; 2],
        u_range: [f64; 2],
        v_range: [f64; 2],
        f: F,
        flip_normal: bool,
    ) -> SynRadResult<Self>
    where
        F: Fn(f64, f64) -> Vector3,
    {
        let [nu, nv] = npoints;
        if nu == 0 || nv == 0 {
            return Err(SynRadError::ConfigError(format!(
                "parametric surface npoints must be >= 1, got {npoints:?}"
            )));
        }
        if u_range.iter().chain(v_range.iter()).any(|r| !r.is_finite()) {
            return Err(SynRadError::ConfigError(
                "parametric surface ranges must be finite".to_string(),
            ));
        }
        let param = |range: [f64; 2], n: usize, i: usize| {
            if n == 1 {
                0.5 * (range[0] + range[1])
            } else {
                range[0] + (range[1] - range[0]) * i as f64 / (n - 1) as f64
            }
        };
        let step = |range: [f64; 2]| {
            let span = (range[1] - range[0]).abs();
            if span > 0.0 {
                1e-4 * span
            } else {
                1e-6
            }
        };
        let (hu, hv) = (step(u_range), step(v_range));
        let sign = if flip_normal { -1.0 } else { 1.0 };

        let mut points = Vec::with_capacity(nu * nv);
        for j in 0..nv {
            let v = param(v_range, nv, j);
            for i in 0..nu {
                let u = param(u_range, nu, i);
                let position = f(u, v);
                if !position.is_finite() {
                    return Err(SynRadError::ConfigError(format!(
                        "parametric surface is not finite at u={u}, v={v}"
                    )));
                }
                let du = (f(u + hu, v) - f(u - hu, v)) / (2.0 * hu);
                let dv = (f(u, v + hv) - f(u, v - hv)) / (2.0 * hv);
                let n = du.cross(dv);
                let normal = if n.is_finite() && !n.is_zero() {
                    Some(n.unit() * sign)
                } else {
                    None
                };
                points.push(SurfacePoint { position, normal });
            }
        }
        Ok(Surface {
            points,
            shape: Some([nu, nv]),
        })
    }

    pub fn points(&self) -> &[SurfacePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn shape(&self) -> Option<[usize; 2]> {
        self.shape
    }
}

/// Scalar result per surface point (flux or power density).
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMap {
    pub points: Vec<SurfacePoint>,
    pub values: Vec<f64>,
    pub shape: Option<[usize; 2]>,
}

impl SurfaceMap {
    pub fn new(surface: &Surface, values: Vec<f64>) -> SynRadResult<Self> {
        if values.len() != surface.len() {
            return Err(SynRadError::ConfigError(format!(
                "surface map has {} values for {} points",
                values.len(),
                surface.len()
            )));
        }
        Ok(SurfaceMap {
            points: surface.points().to_vec(),
            values,
            shape: surface.shape(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest value and its point.
    pub fn max(&self) -> Option<(SurfacePoint, f64)> {
        self.points
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| !v.is_nan())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(p, v)| (*p, *v))
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Values as `[n_second, n_first]` for structured maps.
    pub fn to_array2(&self) -> Option<Array2<f64>> {
        let [nu, nv] = self.shape?;
        Array2::from_shape_vec((nv, nu), self.values.clone()).ok()
    }

    pub(crate) fn scaled(mut self, factor: f64) -> Self {
        for v in &mut self.values {
            *v *= factor;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rectangle_layout() {
        let spec = RectangleSpec::new(Plane::XY, [0.02, 0.01], [3, 2]).translated(Vector3::new(0.0, 0.0, 30.0));
        let s = Surface::rectangle(&spec).unwrap();
        assert_eq!(s.len(), 6);
        assert_eq!(s.shape(), Some([3, 2]));
        let p = s.points();
        assert_eq!(p[0].position, Vector3::new(-0.01, -0.005, 30.0));
        assert_eq!(p[1].position, Vector3::new(0.0, -0.005, 30.0));
        assert!((p[3].position - Vector3::new(-0.01, 0.005, 30.0)).norm() < 1e-15);
        assert!(p.iter().all(|q| q.normal == Some(Vector3::Z)));
    }

    #[test]
    fn test_single_point_rectangle_is_centre() {
        let spec = RectangleSpec::new(Plane::XZ, [1.0, 1.0], [1, 1]).translated(Vector3::new(1.0, 2.0, 3.0));
        let s = Surface::rectangle(&spec).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.points()[0].position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(s.points()[0].normal, Some(Vector3::Y));
    }

    #[test]
    fn test_rectangle_rotation_and_flip() {
        let spec = RectangleSpec::new(Plane::XY, [1.0, 1.0], [2, 2])
            .rotated([0.0, FRAC_PI_2, 0.0])
            .flipped();
        let s = Surface::rectangle(&spec).unwrap();
        let n = s.points()[0].normal.unwrap();
        // -ẑ rotated by +90° about y is -x̂.
        assert!((n - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-12, "{n:?}");
        for q in s.points() {
            assert!(q.position.x.abs() < 1e-12);
        }
    }

    #[test]
    fn test_rectangle_rejects_bad_input() {
        assert!(Surface::rectangle(&RectangleSpec::new(Plane::XY, [1.0, 1.0], [0, 2])).is_err());
        assert!(Surface::rectangle(&RectangleSpec::new(Plane::XY, [-1.0, 1.0], [2, 2])).is_err());
    }

    #[test]
    fn test_from_points() {
        let s = Surface::from_points(vec![Vector3::Z, Vector3::X], Some(vec![Vector3::Z * 2.0, Vector3::X])).unwrap();
        assert_eq!(s.points()[0].normal, Some(Vector3::Z));
        assert!(s.shape().is_none());
        assert!(Surface::from_points(vec![Vector3::Z], Some(vec![])).is_err());
        assert!(Surface::from_points(vec![Vector3::Z], Some(vec![Vector3::ZERO])).is_err());
        assert!(Surface::from_points(vec![], None).is_err());
    }

    #[test]
    fn test_parametric_cylinder_normals_point_outward() {
        let radius = 0.5;
        let s = Surface::parametric(
            [8, 3],
            [0.0, 2.0 * std::f64::consts::PI * 7.0 / 8.0],
            [-1.0, 1.0],
            |u, v| Vector3::new(radius * u.cos(), radius * u.sin(), v),
            false,
        )
        .unwrap();
        assert_eq!(s.len(), 24);
        for q in s.points() {
            let radial = Vector3::new(q.position.x, q.position.y, 0.0).unit();
            let n = q.normal.unwrap();
            assert!((n - radial).norm() < 1e-6, "{n:?} vs {radial:?}");
        }
    }

    #[test]
    fn test_surface_map_helpers() {
        let spec = RectangleSpec::new(Plane::XY, [1.0, 1.0], [2, 3]);
        let s = Surface::rectangle(&spec).unwrap();
        let map = SurfaceMap::new(&s, vec![0.0, 1.0, 5.0, 2.0, 3.0, 4.0]).unwrap();
        let (p, v) = map.max().unwrap();
        assert_eq!(v, 5.0);
        assert_eq!(p, s.points()[2]);
        let arr = map.to_array2().unwrap();
        assert_eq!(arr.shape(), &[3, 2]);
        assert_eq!(arr[[1, 0]], 5.0);
        assert_eq!(map.clone().scaled(2.0).sum(), 30.0);
        assert!(SurfaceMap::new(&s, vec![1.0]).is_err());
    }
}
