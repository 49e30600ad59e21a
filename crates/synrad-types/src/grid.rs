// ─────────────────────────────────────────────────────────────────────
// SynRad — Grid
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{SynRadError, SynRadResult};
use ndarray::Array1;

/// Regular 3D sampling grid with precomputed axis coordinates.
///
/// Samples are stored with the z index fastest:
/// `flat = (ix * ny + iy) * nz + iz`.
/// An axis with a single sample is invariant: it has no extent and
/// every coordinate along it maps to that sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid3D {
    pub shape: [usize; 3],
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    pub axes: [Array1<f64>; 3],
}

impl RegularGrid3D {
    /// Create a grid from sample counts, the first sample position and spacing.
    pub fn new(shape: [usize; 3], origin: [f64; 3], spacing: [f64; 3]) -> SynRadResult<Self> {
        for axis in 0..3 {
            if shape[axis] == 0 {
                return Err(SynRadError::ConfigError(format!(
                    "grid axis {axis} must have at least one sample"
                )));
            }
            if !origin[axis].is_finite() {
                return Err(SynRadError::ConfigError(format!(
                    "grid origin[{axis}] must be finite"
                )));
            }
            if shape[axis] > 1 && (!spacing[axis].is_finite() || spacing[axis] <= 0.0) {
                return Err(SynRadError::ConfigError(format!(
                    "grid spacing[{axis}] must be finite and > 0, got {}",
                    spacing[axis]
                )));
            }
        }
        let axes = [0, 1, 2].map(|a| {
            Array1::from_shape_fn(shape[a], |i| origin[a] + i as f64 * spacing[a])
        });
        Ok(RegularGrid3D {
            shape,
            origin,
            spacing,
            axes,
        })
    }

    /// Create a grid spanning `[min, max]` on each axis (inclusive), like `linspace`.
    pub fn from_extent(shape: [usize; 3], min: [f64; 3], max: [f64; 3]) -> SynRadResult<Self> {
        let mut spacing = [0.0; 3];
        for axis in 0..3 {
            if shape[axis] > 1 {
                if !(max[axis] > min[axis]) {
                    return Err(SynRadError::ConfigError(format!(
                        "grid axis {axis} requires max > min, got [{}, {}]",
                        min[axis], max[axis]
                    )));
                }
                spacing[axis] = (max[axis] - min[axis]) / (shape[axis] - 1) as f64;
            }
        }
        Self::new(shape, min, spacing)
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flat_index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (ix * self.shape[1] + iy) * self.shape[2] + iz
    }

    /// Last coordinate on `axis`.
    pub fn axis_max(&self, axis: usize) -> f64 {
        self.origin[axis] + (self.shape[axis] - 1) as f64 * self.spacing[axis]
    }

    /// Smallest spacing among axes that have extent.
    pub fn min_spacing(&self) -> Option<f64> {
        (0..3)
            .filter(|&a| self.shape[a] > 1)
            .map(|a| self.spacing[a])
            .reduce(f64::min)
    }

    /// Locate `coord` on `axis`: lower sample index and fractional offset in `[0, 1]`.
    ///
    /// Returns `None` outside the sampled extent.
    pub fn locate(&self, axis: usize, coord: f64) -> Option<(usize, f64)> {
        let n = self.shape[axis];
        if n == 1 {
            return Some((0, 0.0));
        }
        if !coord.is_finite() {
            return None;
        }
        let f = (coord - self.origin[axis]) / self.spacing[axis];
        let last = (n - 1) as f64;
        if f < 0.0 || f > last {
            return None;
        }
        let i0 = (f.floor() as usize).min(n - 2);
        Some((i0, (f - i0 as f64).clamp(0.0, 1.0)))
    }

    /// True when the point lies inside the sampled extent on every bounded axis.
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|a| self.locate(a, point[a]).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_from_extent_matches_linspace() {
        let grid = RegularGrid3D::from_extent([5, 1, 11], [-0.01, 0.0, -1.0], [0.01, 0.0, 1.0])
            .unwrap();
        assert_eq!(grid.len(), 55);
        assert!((grid.spacing[0] - 0.005).abs() < 1e-15);
        assert!((grid.spacing[2] - 0.2).abs() < 1e-15);
        assert!((grid.axes[2][10] - 1.0).abs() < 1e-12);
        assert!((grid.axis_max(0) - 0.01).abs() < 1e-15);
        assert_eq!(grid.min_spacing(), Some(0.005));
    }

    #[test]
    fn test_grid_locate_inside_and_outside() {
        let grid = RegularGrid3D::new([1, 1, 5], [0.0, 0.0, 0.0], [0.0, 0.0, 0.5]).unwrap();
        let (i, t) = grid.locate(2, 1.25).unwrap();
        assert_eq!(i, 2);
        assert!((t - 0.5).abs() < 1e-12);
        // Upper edge maps into the last cell.
        let (i, t) = grid.locate(2, 2.0).unwrap();
        assert_eq!(i, 3);
        assert!((t - 1.0).abs() < 1e-12);
        assert!(grid.locate(2, 2.01).is_none());
        assert!(grid.locate(2, -0.01).is_none());
        // Invariant axes accept any coordinate.
        assert_eq!(grid.locate(0, 123.0), Some((0, 0.0)));
        assert!(grid.contains([5.0, -3.0, 1.0]));
    }

    #[test]
    fn test_grid_rejects_degenerate_axes() {
        assert!(RegularGrid3D::new([0, 1, 1], [0.0; 3], [1.0; 3]).is_err());
        assert!(RegularGrid3D::new([2, 1, 1], [0.0; 3], [0.0, 1.0, 1.0]).is_err());
        assert!(RegularGrid3D::from_extent([3, 1, 1], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_flat_index_is_z_fastest() {
        let grid = RegularGrid3D::new([2, 3, 4], [0.0; 3], [1.0; 3]).unwrap();
        assert_eq!(grid.flat_index(0, 0, 1), 1);
        assert_eq!(grid.flat_index(0, 1, 0), 4);
        assert_eq!(grid.flat_index(1, 0, 0), 12);
        assert_eq!(grid.flat_index(1, 2, 3), grid.len() - 1);
    }
}
