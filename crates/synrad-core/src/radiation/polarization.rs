use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::config::PolarizationConfig;
use synrad_types::error::{SynRadError, SynRadResult};

/// Polarization filter applied to complex fields before squaring.
///
/// Left circular is `(x̂ + iŷ)/√2`, right circular `(x̂ − iŷ)/√2`, with the
/// time convention `e^{+iωt}` of the radiation integrals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Polarization {
    #[default]
    All,
    LinearHorizontal,
    LinearVertical,
    CircularLeft,
    CircularRight,
    /// Unit-normalized custom projection vector.
    Custom(Vector3C),
}

impl Polarization {
    pub fn custom(vector: Vector3C) -> SynRadResult<Self> {
        let norm = vector.norm_sqr().sqrt();
        if !vector.is_finite() || norm == 0.0 {
            return Err(SynRadError::ConfigError(
                "custom polarization vector must be finite and non-zero".to_string(),
            ));
        }
        Ok(Polarization::Custom(vector * (1.0 / norm)))
    }

    pub fn from_config(cfg: &PolarizationConfig) -> SynRadResult<Self> {
        Ok(match cfg {
            PolarizationConfig::All => Polarization::All,
            PolarizationConfig::LinearHorizontal => Polarization::LinearHorizontal,
            PolarizationConfig::LinearVertical => Polarization::LinearVertical,
            PolarizationConfig::CircularLeft => Polarization::CircularLeft,
            PolarizationConfig::CircularRight => Polarization::CircularRight,
            PolarizationConfig::Custom { re, im } => {
                Polarization::custom(Vector3C::from_parts(Vector3::from(*re), Vector3::from(*im)))?
            }
        })
    }

    fn vector(&self) -> Option<Vector3C> {
        let s = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let i = Complex64::new(0.0, FRAC_1_SQRT_2);
        let zero = Complex64::new(0.0, 0.0);
        match self {
            Polarization::All => None,
            Polarization::LinearHorizontal => Some(Vector3C::from(Vector3::X)),
            Polarization::LinearVertical => Some(Vector3C::from(Vector3::Y)),
            Polarization::CircularLeft => Some(Vector3C::new(s, i, zero)),
            Polarization::CircularRight => Some(Vector3C::new(s, -i, zero)),
            Polarization::Custom(v) => Some(*v),
        }
    }

    /// `P (P*·E)`, or `E` unchanged for [`Polarization::All`].
    pub fn project(&self, e: Vector3C) -> Vector3C {
        match self.vector() {
            None => e,
            Some(p) => p * p.hdot(e),
        }
    }

    /// Real time-domain fields only support the linear filters.
    pub fn project_real(&self, e: Vector3) -> SynRadResult<Vector3> {
        match self {
            Polarization::All => Ok(e),
            Polarization::LinearHorizontal => Ok(Vector3::X * e.x),
            Polarization::LinearVertical => Ok(Vector3::Y * e.y),
            other => Err(SynRadError::ConfigError(format!(
                "polarization {other:?} has no real time-domain projection"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circular(sign: f64) -> Vector3C {
        // e^{+iωt} convention: (x̂ ± iŷ)/√2
        Vector3C::new(
            Complex64::new(FRAC_1_SQRT_2, 0.0),
            Complex64::new(0.0, sign * FRAC_1_SQRT_2),
            Complex64::new(0.0, 0.0),
        )
    }

    #[test]
    fn test_all_is_identity() {
        let e = Vector3C::from_parts(Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.0, 0.5, 0.0));
        assert_eq!(Polarization::All.project(e), e);
    }

    #[test]
    fn test_linear_components_add_up() {
        let e = Vector3C::from_parts(Vector3::new(1.0, 2.0, 0.0), Vector3::new(0.0, -3.0, 0.0));
        let h = Polarization::LinearHorizontal.project(e).norm_sqr();
        let v = Polarization::LinearVertical.project(e).norm_sqr();
        assert!((h - 1.0).abs() < 1e-15);
        assert!((v - 13.0).abs() < 1e-12);
        assert!((h + v - e.norm_sqr()).abs() < 1e-12);
    }

    #[test]
    fn test_circular_selects_handedness() {
        let left = circular(1.0);
        assert!((Polarization::CircularLeft.project(left).norm_sqr() - 1.0).abs() < 1e-14);
        assert!(Polarization::CircularRight.project(left).norm_sqr() < 1e-14);
        let right = circular(-1.0);
        assert!((Polarization::CircularRight.project(right).norm_sqr() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_custom_is_normalized() {
        let p = Polarization::custom(Vector3C::from(Vector3::new(0.0, 0.0, 2.0))).unwrap();
        let e = Vector3C::from(Vector3::new(1.0, 1.0, 3.0));
        assert!((p.project(e).norm_sqr() - 9.0).abs() < 1e-12);
        assert!(Polarization::custom(Vector3C::ZERO).is_err());
    }

    #[test]
    fn test_from_config() {
        let cfg = PolarizationConfig::Custom {
            re: [1.0, 0.0, 0.0],
            im: [0.0, 1.0, 0.0],
        };
        match Polarization::from_config(&cfg).unwrap() {
            Polarization::Custom(v) => assert!((v.norm_sqr() - 1.0).abs() < 1e-14),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Polarization::from_config(&PolarizationConfig::LinearVertical).unwrap(),
            Polarization::LinearVertical
        );
    }

    #[test]
    fn test_real_projection() {
        let e = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(Polarization::LinearVertical.project_real(e).unwrap(), Vector3::new(0.0, 2.0, 0.0));
        assert!(Polarization::CircularLeft.project_real(e).is_err());
    }
}
