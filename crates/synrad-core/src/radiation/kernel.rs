//! Pure per-point radiation integrals over a flat trajectory buffer.
//!
//! Every function here is a deterministic function of its inputs, so the
//! sequential and threaded backends produce bit-identical results.
//!
//! Conventions: SI units, `f(ω) = (2π)^{-1/2} ∫ f(t) e^{iωt} dt`, and phases
//! referenced to `R_ref = |x_obs|` so that fields from different particles
//! share one time origin.

use crate::trajectory::Trajectory;
use num_complex::Complex64;
use std::f64::consts::PI;
use synrad_math::quadrature::trapezoid_weights;
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::constants::{C_LIGHT, EPSILON_0};
use synrad_types::error::{SynRadError, SynRadResult};

/// Values per sample: t, x(3), β(3), β̇(3), 1−|β|, trapezoid weight.
pub const FLAT_STRIDE: usize = 12;
const T: usize = 0;
const X: usize = 1;
const BETA: usize = 4;
const BETA_DOT: usize = 7;
const ONE_MINUS_BETA: usize = 10;
const WEIGHT: usize = 11;

/// Trajectory packed into a contiguous `f64` buffer for the integrators
/// and for offload devices.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTrajectory {
    data: Vec<f64>,
    charge_c: f64,
}

impl FlatTrajectory {
    pub fn from_trajectory(trajectory: &Trajectory) -> Self {
        let points = trajectory.points();
        let weights = trapezoid_weights(&trajectory.times());
        let mut data = Vec::with_capacity(points.len() * FLAT_STRIDE);
        for (p, w) in points.iter().zip(weights) {
            let b = p.beta.norm();
            let one_minus_beta = 1.0 / (p.gamma * p.gamma * (1.0 + b));
            data.extend_from_slice(&[
                p.t_s,
                p.x.x,
                p.x.y,
                p.x.z,
                p.beta.x,
                p.beta.y,
                p.beta.z,
                p.beta_dot.x,
                p.beta_dot.y,
                p.beta_dot.z,
                one_minus_beta,
                w,
            ]);
        }
        FlatTrajectory {
            data,
            charge_c: trajectory.charge_c(),
        }
    }

    pub fn from_raw(data: Vec<f64>, charge_c: f64) -> SynRadResult<Self> {
        if data.len() % FLAT_STRIDE != 0 || data.len() < 2 * FLAT_STRIDE {
            return Err(SynRadError::ConfigError(format!(
                "flat trajectory length {} is not a multiple of {FLAT_STRIDE} with >= 2 samples",
                data.len()
            )));
        }
        Ok(FlatTrajectory { data, charge_c })
    }

    pub fn len(&self) -> usize {
        self.data.len() / FLAT_STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn charge_c(&self) -> f64 {
        self.charge_c
    }

    fn v3(&self, i: usize, offset: usize) -> Vector3 {
        let k = i * FLAT_STRIDE + offset;
        Vector3::new(self.data[k], self.data[k + 1], self.data[k + 2])
    }

    pub fn t(&self, i: usize) -> f64 {
        self.data[i * FLAT_STRIDE + T]
    }

    pub fn x(&self, i: usize) -> Vector3 {
        self.v3(i, X)
    }

    pub fn beta(&self, i: usize) -> Vector3 {
        self.v3(i, BETA)
    }

    pub fn beta_dot(&self, i: usize) -> Vector3 {
        self.v3(i, BETA_DOT)
    }

    pub fn one_minus_beta(&self, i: usize) -> f64 {
        self.data[i * FLAT_STRIDE + ONE_MINUS_BETA]
    }

    pub fn weight(&self, i: usize) -> f64 {
        self.data[i * FLAT_STRIDE + WEIGHT]
    }

    /// Quadrature-weighted mean position.
    pub fn centroid(&self) -> Vector3 {
        let mut sum = Vector3::ZERO;
        let mut total = 0.0;
        for i in 0..self.len() {
            sum += self.x(i) * self.weight(i);
            total += self.weight(i);
        }
        if total > 0.0 {
            sum / total
        } else {
            sum
        }
    }
}

/// Observation geometry of one trajectory sample.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    n: Vector3,
    r: f64,
    /// `1 − n·β`
    g: f64,
    /// `1/γ²`
    inv_gamma2: f64,
    /// `(R − R_ref)/c`
    delay: f64,
}

fn geometry(traj: &FlatTrajectory, i: usize, point: Vector3, r_ref: f64) -> Option<Geometry> {
    let x = traj.x(i);
    let d = point - x;
    let r = d.norm();
    if r == 0.0 || !r.is_finite() {
        return None;
    }
    let n = d / r;
    let beta = traj.beta(i);
    let b = beta.norm();
    let omb = traj.one_minus_beta(i);
    // 1 − n·β = (1 − |β|) + |β| |n − β̂|²/2, free of cancellation.
    let g = if b > 0.0 {
        omb + 0.5 * b * (n - beta / b).norm_sqr()
    } else {
        1.0
    };
    // R − R_ref = (|r|² − 2 r·x_obs)/(R + R_ref)
    let delay = (x.norm_sqr() - 2.0 * x.dot(point)) / (r + r_ref) / C_LIGHT;
    Some(Geometry {
        n,
        r,
        g,
        inv_gamma2: omb * (1.0 + b),
        delay,
    })
}

fn on_trajectory(quantity: &str, point: Vector3, omega: f64, t: f64) -> SynRadError {
    SynRadError::QuadratureDiverged {
        quantity: quantity.to_string(),
        point: point.to_array(),
        omega,
        message: format!("observation point lies on the trajectory at t={t:e} s"),
    }
}

/// Retarded phase offset `ω (t'_0 + (R_0 − R_ref)/c)` of the first sample,
/// reduced to `[0, 2π)`.
pub fn initial_phase(traj: &FlatTrajectory, point: Vector3, omega: f64) -> f64 {
    match geometry(traj, 0, point, point.norm()) {
        Some(geo) => (omega * (traj.t(0) + geo.delay)).rem_euclid(2.0 * PI),
        None => 0.0,
    }
}

/// Frequency-domain electric field `E(ω)` at `point`.
///
/// `q/(4πε0√2π) ∫ [n×((n−β)×β̇)/(c g² R) + (n−β)/(γ² g² R²)] e^{iωτ} dt'`
/// with `τ = t' + (R − R_ref)/c`. A phase advance above π between samples
/// is reported as a quadrature divergence.
pub fn electric_field_at(traj: &FlatTrajectory, point: Vector3, omega: f64) -> SynRadResult<Vector3C> {
    const QUANTITY: &str = "electric field spectrum";
    let r_ref = point.norm();
    let mut sum = Vector3C::ZERO;
    let mut previous_tau: Option<f64> = None;

    for i in 0..traj.len() {
        let t = traj.t(i);
        let geo = geometry(traj, i, point, r_ref).ok_or_else(|| on_trajectory(QUANTITY, point, omega, t))?;
        let tau = t + geo.delay;
        if let Some(prev) = previous_tau {
            let step = (omega * (tau - prev)).abs();
            if step > PI {
                return Err(SynRadError::QuadratureDiverged {
                    quantity: QUANTITY.to_string(),
                    point: point.to_array(),
                    omega,
                    message: format!(
                        "phase advance {step:.3} rad between samples {} and {i} exceeds π; increase npoints",
                        i - 1
                    ),
                });
            }
        }
        previous_tau = Some(tau);

        let beta = traj.beta(i);
        let n_minus_beta = geo.n - beta;
        let g2 = geo.g * geo.g;
        let acceleration = geo.n.cross(n_minus_beta.cross(traj.beta_dot(i))) / (C_LIGHT * g2 * geo.r);
        let velocity = n_minus_beta * (geo.inv_gamma2 / (g2 * geo.r * geo.r));
        let integrand = (acceleration + velocity) * traj.weight(i);

        let (s, c) = (omega * tau).sin_cos();
        sum += Vector3C::from(integrand) * Complex64::new(c, s);
    }

    let prefactor = traj.charge_c() / (4.0 * PI * EPSILON_0 * (2.0 * PI).sqrt());
    let result = sum * prefactor;
    if !result.is_finite() {
        return Err(SynRadError::QuadratureDiverged {
            quantity: QUANTITY.to_string(),
            point: point.to_array(),
            omega,
            message: "non-finite field".to_string(),
        });
    }
    Ok(result)
}

/// Radiated energy per unit area (J/m²) through `point` for one passage.
///
/// `∫ ε0 c |E_rad|² (n·normal)⁺ g dt'`, `E_rad = q/(4πε0) n×((n−β)×β̇)/(c g³ R)`.
/// Without a normal the projection factor is 1.
pub fn power_density_at(traj: &FlatTrajectory, point: Vector3, normal: Option<Vector3>) -> SynRadResult<f64> {
    const QUANTITY: &str = "power density";
    let r_ref = point.norm();
    let k = traj.charge_c() / (4.0 * PI * EPSILON_0);
    let mut sum = 0.0;
    for i in 0..traj.len() {
        let t = traj.t(i);
        let geo = geometry(traj, i, point, r_ref).ok_or_else(|| on_trajectory(QUANTITY, point, 0.0, t))?;
        let projection = match normal {
            Some(nrm) => geo.n.dot(nrm).max(0.0),
            None => 1.0,
        };
        if projection == 0.0 {
            continue;
        }
        let n_minus_beta = geo.n - traj.beta(i);
        let e_rad = geo.n.cross(n_minus_beta.cross(traj.beta_dot(i)))
            * (k / (C_LIGHT * geo.g * geo.g * geo.g * geo.r));
        sum += traj.weight(i) * EPSILON_0 * C_LIGHT * e_rad.norm_sqr() * projection * geo.g;
    }
    if !sum.is_finite() {
        return Err(SynRadError::QuadratureDiverged {
            quantity: QUANTITY.to_string(),
            point: point.to_array(),
            omega: 0.0,
            message: "non-finite power density".to_string(),
        });
    }
    Ok(sum)
}

/// Energy (J) radiated over the trajectory by the relativistic Larmor formula.
///
/// `q² γ⁶ [β̇² − (β×β̇)²]/(6π ε0 c)`, evaluated as `γ⁴β̇² + γ⁶(β·β̇)²`.
pub fn larmor_energy(traj: &FlatTrajectory) -> f64 {
    let q = traj.charge_c();
    let k = q * q / (6.0 * PI * EPSILON_0 * C_LIGHT);
    let mut sum = 0.0;
    for i in 0..traj.len() {
        let beta = traj.beta(i);
        let bd = traj.beta_dot(i);
        let gamma2 = 1.0 / (traj.one_minus_beta(i) * (1.0 + beta.norm()));
        let bdb = beta.dot(bd);
        sum += traj.weight(i) * (gamma2 * gamma2 * bd.norm_sqr() + gamma2 * gamma2 * gamma2 * bdb * bdb);
    }
    k * sum
}

/// Liénard–Wiechert field at `point` against observer time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDomainField {
    /// Observer time minus `R_ref/c` (s), strictly increasing.
    pub t_obs: Vec<f64>,
    pub e: Vec<Vector3>,
    /// `R_ref/c` (s), add to `t_obs` for absolute arrival times.
    pub offset_s: f64,
}

impl TimeDomainField {
    pub fn len(&self) -> usize {
        self.t_obs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t_obs.is_empty()
    }
}

/// Full retarded field (velocity and acceleration terms) at each sample's
/// arrival time `t' + R/c`.
pub fn time_domain_field(traj: &FlatTrajectory, point: Vector3) -> SynRadResult<TimeDomainField> {
    const QUANTITY: &str = "time-domain field";
    let r_ref = point.norm();
    let k = traj.charge_c() / (4.0 * PI * EPSILON_0);
    let mut t_obs = Vec::with_capacity(traj.len());
    let mut e = Vec::with_capacity(traj.len());
    for i in 0..traj.len() {
        let t = traj.t(i);
        let geo = geometry(traj, i, point, r_ref).ok_or_else(|| on_trajectory(QUANTITY, point, 0.0, t))?;
        let n_minus_beta = geo.n - traj.beta(i);
        let g3 = geo.g * geo.g * geo.g;
        let velocity = n_minus_beta * (geo.inv_gamma2 / (g3 * geo.r * geo.r));
        let acceleration = geo.n.cross(n_minus_beta.cross(traj.beta_dot(i))) / (C_LIGHT * g3 * geo.r);
        t_obs.push(t + geo.delay);
        e.push((velocity + acceleration) * k);
    }
    Ok(TimeDomainField {
        t_obs,
        e,
        offset_s: r_ref / C_LIGHT,
    })
}
