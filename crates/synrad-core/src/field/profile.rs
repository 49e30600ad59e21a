//! Field profile shapes. All evaluate in the source's local frame.

use ndarray::Array4;
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;
use synrad_math::interp::trilinear_vector;
use synrad_math::vector::Vector3;
use synrad_types::constants::{C_LIGHT, EV_TO_J, H_PLANCK, M_ELECTRON, Q_ELEMENTARY};
use synrad_types::error::{SynRadError, SynRadResult};
use synrad_types::grid::RegularGrid3D;

fn require_finite_vector(v: Vector3, label: &str) -> SynRadResult<()> {
    if !v.is_finite() {
        return Err(SynRadError::ConfigError(format!(
            "{label} components must be finite"
        )));
    }
    Ok(())
}

fn require_non_negative_vector(v: Vector3, label: &str) -> SynRadResult<()> {
    require_finite_vector(v, label)?;
    if v.x < 0.0 || v.y < 0.0 || v.z < 0.0 {
        return Err(SynRadError::ConfigError(format!(
            "{label} components must be >= 0"
        )));
    }
    Ok(())
}

/// Constant field inside an axis-aligned box centred on the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBox {
    pub field: Vector3,
    /// Full width per axis in m; 0 leaves the axis unbounded.
    pub width: Vector3,
}

impl UniformBox {
    pub fn new(field: Vector3, width: Vector3) -> SynRadResult<Self> {
        require_finite_vector(field, "uniform.field")?;
        require_non_negative_vector(width, "uniform.width")?;
        Ok(UniformBox { field, width })
    }

    fn value_at(&self, p: Vector3) -> Vector3 {
        for axis in 0..3 {
            let w = self.width[axis];
            if w > 0.0 && p[axis].abs() > 0.5 * w {
                return Vector3::ZERO;
            }
        }
        self.field
    }
}

/// Gaussian envelope `field · exp(−½ Σ (x_i/σ_i)²)` over axes with σ_i > 0.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianField {
    pub field: Vector3,
    pub sigma: Vector3,
}

impl GaussianField {
    pub fn new(field: Vector3, sigma: Vector3) -> SynRadResult<Self> {
        require_finite_vector(field, "gaussian.field")?;
        require_non_negative_vector(sigma, "gaussian.sigma")?;
        Ok(GaussianField { field, sigma })
    }

    fn value_at(&self, p: Vector3) -> Vector3 {
        let mut exponent = 0.0;
        for axis in 0..3 {
            let s = self.sigma[axis];
            if s > 0.0 {
                let u = p[axis] / s;
                exponent += u * u;
            }
        }
        self.field * (-0.5 * exponent).exp()
    }

    fn characteristic_length(&self) -> Option<f64> {
        (0..3)
            .map(|a| self.sigma[a])
            .filter(|&s| s > 0.0)
            .map(|s| 4.0 * s)
            .reduce(f64::min)
    }
}

/// Ideal planar/helical undulator without end terminations.
///
/// With `s = x · λ̂`, inside `|s| ≤ N λ/2` the field is
/// `field · (1 + taper·s) · cos(2π s/λ + phase)`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdealUndulator {
    pub field: Vector3,
    /// Undulator axis scaled to the period length λ (m).
    pub period: Vector3,
    pub nperiods: usize,
    pub phase: f64,
    /// Linear taper in 1/m.
    pub taper: f64,
}

impl IdealUndulator {
    pub fn new(
        field: Vector3,
        period: Vector3,
        nperiods: usize,
        phase: f64,
        taper: f64,
    ) -> SynRadResult<Self> {
        require_finite_vector(field, "undulator.field")?;
        require_finite_vector(period, "undulator.period")?;
        if period.norm() <= 0.0 {
            return Err(SynRadError::ConfigError(
                "undulator.period must have non-zero length".to_string(),
            ));
        }
        if nperiods == 0 {
            return Err(SynRadError::ConfigError(
                "undulator.nperiods must be >= 1".to_string(),
            ));
        }
        if !phase.is_finite() || !taper.is_finite() {
            return Err(SynRadError::ConfigError(
                "undulator.phase and undulator.taper must be finite".to_string(),
            ));
        }
        Ok(IdealUndulator {
            field,
            period,
            nperiods,
            phase,
            taper,
        })
    }

    pub fn period_m(&self) -> f64 {
        self.period.norm()
    }

    pub fn length_m(&self) -> f64 {
        self.nperiods as f64 * self.period_m()
    }

    /// Deflection parameter `K = e B λ / (2π m_e c)`.
    pub fn deflection_parameter(&self) -> f64 {
        Q_ELEMENTARY * self.field.norm() * self.period_m() / (2.0 * PI * M_ELECTRON * C_LIGHT)
    }

    /// On-axis fundamental `2γ² h c / (λ (1 + K²/2))` in eV.
    pub fn fundamental_energy_ev(&self, gamma: f64) -> f64 {
        let k = self.deflection_parameter();
        2.0 * gamma * gamma * H_PLANCK * C_LIGHT
            / (self.period_m() * (1.0 + 0.5 * k * k))
            / EV_TO_J
    }

    fn value_at(&self, p: Vector3) -> Vector3 {
        let lambda = self.period_m();
        if lambda <= 0.0 {
            return Vector3::ZERO;
        }
        let s = p.dot(self.period / lambda);
        if s.abs() > 0.5 * self.length_m() {
            return Vector3::ZERO;
        }
        self.field * ((1.0 + self.taper * s) * (2.0 * PI * s / lambda + self.phase).cos())
    }
}

/// Hard-edge quadrupole along z: `B = (G y, G x, 0)` for `|z| ≤ L/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrupole {
    pub gradient_t_m: f64,
    pub length_m: f64,
}

impl Quadrupole {
    pub fn new(gradient_t_m: f64, length_m: f64) -> SynRadResult<Self> {
        if !gradient_t_m.is_finite() {
            return Err(SynRadError::ConfigError(
                "quadrupole.gradient_t_m must be finite".to_string(),
            ));
        }
        if !length_m.is_finite() || length_m <= 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "quadrupole.length_m must be finite and > 0, got {length_m}"
            )));
        }
        Ok(Quadrupole {
            gradient_t_m,
            length_m,
        })
    }

    fn value_at(&self, p: Vector3) -> Vector3 {
        if p.z.abs() > 0.5 * self.length_m {
            return Vector3::ZERO;
        }
        Vector3::new(self.gradient_t_m * p.y, self.gradient_t_m * p.x, 0.0)
    }
}

/// Sampled vector field on a regular grid, stored as `(nx, ny, nz, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    pub grid: RegularGrid3D,
    pub samples: Array4<f64>,
}

impl GridField {
    pub fn new(grid: RegularGrid3D, samples: Array4<f64>) -> SynRadResult<Self> {
        let expected = [grid.shape[0], grid.shape[1], grid.shape[2], 3];
        if samples.shape() != expected {
            return Err(SynRadError::ConfigError(format!(
                "grid field shape mismatch: samples={:?}, expected={expected:?}",
                samples.shape()
            )));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(SynRadError::ConfigError(
                "grid field samples must be finite".to_string(),
            ));
        }
        Ok(GridField { grid, samples })
    }

    /// Build from vectors ordered with z fastest.
    pub fn from_vectors(grid: RegularGrid3D, values: &[[f64; 3]]) -> SynRadResult<Self> {
        if values.len() != grid.len() {
            return Err(SynRadError::ConfigError(format!(
                "grid field expects {} samples, got {}",
                grid.len(),
                values.len()
            )));
        }
        let [nx, ny, nz] = grid.shape;
        let samples = Array4::from_shape_fn((nx, ny, nz, 3), |(i, j, k, c)| {
            values[grid.flat_index(i, j, k)][c]
        });
        Self::new(grid, samples)
    }

    fn value_at(&self, p: Vector3) -> Vector3 {
        trilinear_vector(&self.samples, &self.grid, p.to_array()).unwrap_or(Vector3::ZERO)
    }
}

type FieldFn = dyn Fn(Vector3, f64) -> Vector3 + Send + Sync;

/// Externally supplied field `f(position, time)`.
///
/// The function must be pure; it is called concurrently from worker threads.
#[derive(Clone)]
pub struct FieldFunction {
    func: Arc<FieldFn>,
    pub length_scale_m: Option<f64>,
}

impl FieldFunction {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Vector3, f64) -> Vector3 + Send + Sync + 'static,
    {
        FieldFunction {
            func: Arc::new(func),
            length_scale_m: None,
        }
    }

    pub fn with_length_scale(mut self, length_m: f64) -> SynRadResult<Self> {
        if !length_m.is_finite() || length_m <= 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "function length scale must be finite and > 0, got {length_m}"
            )));
        }
        self.length_scale_m = Some(length_m);
        Ok(self)
    }
}

impl fmt::Debug for FieldFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldFunction")
            .field("length_scale_m", &self.length_scale_m)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum FieldProfile {
    UniformBox(UniformBox),
    Gaussian(GaussianField),
    IdealUndulator(IdealUndulator),
    Quadrupole(Quadrupole),
    Grid(GridField),
    Function(FieldFunction),
}

impl FieldProfile {
    pub fn value_at(&self, position: Vector3, time: f64) -> Vector3 {
        match self {
            FieldProfile::UniformBox(u) => u.value_at(position),
            FieldProfile::Gaussian(g) => g.value_at(position),
            FieldProfile::IdealUndulator(u) => u.value_at(position),
            FieldProfile::Quadrupole(q) => q.value_at(position),
            FieldProfile::Grid(g) => g.value_at(position),
            FieldProfile::Function(f) => (f.func)(position, time),
        }
    }

    pub fn characteristic_length(&self) -> Option<f64> {
        match self {
            FieldProfile::UniformBox(_) | FieldProfile::Quadrupole(_) => None,
            FieldProfile::Gaussian(g) => g.characteristic_length(),
            FieldProfile::IdealUndulator(u) => Some(u.period_m()),
            FieldProfile::Grid(g) => g.grid.min_spacing().map(|d| 2.0 * d),
            FieldProfile::Function(f) => f.length_scale_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_box_zero_width_is_unbounded() {
        let u = UniformBox::new(Vector3::Y, Vector3::new(0.0, 0.0, 2.0)).unwrap();
        assert_eq!(u.value_at(Vector3::new(1e6, -1e6, 0.999)), Vector3::Y);
        assert_eq!(u.value_at(Vector3::new(0.0, 0.0, 1.001)), Vector3::ZERO);
        assert!(UniformBox::new(Vector3::Y, Vector3::new(-1.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_gaussian_profile_and_length() {
        let g = GaussianField::new(Vector3::new(0.0, 2.0, 0.0), Vector3::new(0.0, 0.0, 0.1)).unwrap();
        let at_sigma = g.value_at(Vector3::new(5.0, 5.0, 0.1));
        assert!((at_sigma.y - 2.0 * (-0.5f64).exp()).abs() < 1e-14);
        assert_eq!(FieldProfile::Gaussian(g).characteristic_length(), Some(0.4));
    }

    #[test]
    fn test_undulator_shape_and_extent() {
        let u = IdealUndulator::new(Vector3::Y, Vector3::new(0.0, 0.0, 0.05), 10, 0.0, 0.0).unwrap();
        assert!((u.value_at(Vector3::ZERO).y - 1.0).abs() < 1e-15);
        assert!((u.value_at(Vector3::new(0.0, 0.0, 0.025)).y + 1.0).abs() < 1e-12);
        assert!((u.value_at(Vector3::new(0.0, 0.0, 0.0125)).y).abs() < 1e-12);
        assert_eq!(u.value_at(Vector3::new(0.0, 0.0, 0.2501)), Vector3::ZERO);
        assert!((u.length_m() - 0.5).abs() < 1e-15);
    }

    #[test]
    fn test_undulator_deflection_parameter() {
        // K ≈ 0.934 B[T] λ[cm]
        let u = IdealUndulator::new(Vector3::Y, Vector3::new(0.0, 0.0, 0.049), 21, 0.0, 0.0).unwrap();
        let k = u.deflection_parameter();
        assert!((k - 0.9337 * 4.9).abs() < 0.01, "K = {k}");
    }

    #[test]
    fn test_undulator_taper_scales_amplitude() {
        let u = IdealUndulator::new(Vector3::Y, Vector3::new(0.0, 0.0, 0.1), 10, 0.0, 0.5).unwrap();
        // cos(2π · 0.2/0.1) = 1
        let v = u.value_at(Vector3::new(0.0, 0.0, 0.2));
        assert!((v.y - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_undulator_rejects_degenerate_period() {
        assert!(IdealUndulator::new(Vector3::Y, Vector3::ZERO, 10, 0.0, 0.0).is_err());
        assert!(IdealUndulator::new(Vector3::Y, Vector3::Z, 0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_quadrupole_field() {
        let q = Quadrupole::new(10.0, 0.3).unwrap();
        let b = q.value_at(Vector3::new(0.01, -0.02, 0.1));
        assert!((b.x + 0.2).abs() < 1e-14);
        assert!((b.y - 0.1).abs() < 1e-14);
        assert_eq!(q.value_at(Vector3::new(0.01, 0.0, 0.2)), Vector3::ZERO);
        assert!(Quadrupole::new(10.0, 0.0).is_err());
    }

    #[test]
    fn test_grid_field_interpolates_and_vanishes_outside() {
        let grid = RegularGrid3D::from_extent([1, 1, 5], [0.0, 0.0, -1.0], [0.0, 0.0, 1.0]).unwrap();
        let values: Vec<[f64; 3]> = (0..5).map(|k| [0.0, k as f64, 0.0]).collect();
        let g = GridField::from_vectors(grid, &values).unwrap();
        let b = g.value_at(Vector3::new(0.3, -0.3, 0.25));
        assert!((b.y - 2.5).abs() < 1e-12);
        assert_eq!(g.value_at(Vector3::new(0.0, 0.0, 1.5)), Vector3::ZERO);
        assert_eq!(FieldProfile::Grid(g).characteristic_length(), Some(1.0));
    }

    #[test]
    fn test_grid_field_rejects_wrong_count() {
        let grid = RegularGrid3D::new([2, 2, 2], [0.0; 3], [1.0; 3]).unwrap();
        assert!(GridField::from_vectors(grid, &[[0.0; 3]; 7]).is_err());
    }

    #[test]
    fn test_function_profile_time_dependence() {
        let f = FieldFunction::new(|_p, t| Vector3::new(0.0, t, 0.0))
            .with_length_scale(0.02)
            .unwrap();
        let profile = FieldProfile::Function(f);
        assert_eq!(profile.value_at(Vector3::ZERO, 3.0), Vector3::new(0.0, 3.0, 0.0));
        assert_eq!(profile.characteristic_length(), Some(0.02));
        assert!(format!("{profile:?}").contains("FieldFunction"));
    }
}
