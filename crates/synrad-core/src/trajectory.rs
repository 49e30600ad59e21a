// ─────────────────────────────────────────────────────────────────────
// SynRad — Trajectory Integrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Relativistic equations of motion through a field container.
//!
//! `du/dt = q/(m c) (E + c β × B)` with `u = γβ`. The default stepper is the
//! relativistic Boris push; RK4 on `(x, β)` is available as an alternative.
//! Samples lie on a time grid anchored at the particle's `t0`.

use crate::field::{FieldContainer, FieldSample};
use crate::particle::{beta_from_gamma, Particle};
use synrad_math::interp::hermite;
use synrad_math::ode::rk4_step;
use synrad_math::vector::Vector3;
use synrad_types::config::{StepperKind, TrajectoryConfig};
use synrad_types::constants::C_LIGHT;
use synrad_types::error::{SynRadError, SynRadResult};
use tracing::debug;

/// Minimum samples per shortest field length scale.
pub const MIN_SAMPLES_PER_PERIOD: usize = 16;
/// Samples per shortest field length scale when `npoints` is not given.
pub const DEFAULT_SAMPLES_PER_PERIOD: usize = 32;
/// Sample count when no source has a length scale.
pub const DEFAULT_NPOINTS: usize = 20_001;
/// Upper bound on automatically or explicitly requested samples.
pub const MAX_NPOINTS: usize = 100_000_000;

const GRID_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stepper {
    #[default]
    Boris,
    Rk4,
}

impl From<StepperKind> for Stepper {
    fn from(kind: StepperKind) -> Self {
        match kind {
            StepperKind::Boris => Stepper::Boris,
            StepperKind::Rk4 => Stepper::Rk4,
        }
    }
}

/// Integration window in units of `c·t` (m).
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySettings {
    pub ct_start_m: f64,
    pub ct_stop_m: f64,
    pub npoints: Option<usize>,
    pub stepper: Stepper,
}

impl TrajectorySettings {
    pub fn new(ct_start_m: f64, ct_stop_m: f64) -> SynRadResult<Self> {
        let settings = TrajectorySettings {
            ct_start_m,
            ct_stop_m,
            npoints: None,
            stepper: Stepper::Boris,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_npoints(mut self, npoints: usize) -> SynRadResult<Self> {
        self.npoints = Some(npoints);
        self.validate()?;
        Ok(self)
    }

    pub fn with_stepper(mut self, stepper: Stepper) -> Self {
        self.stepper = stepper;
        self
    }

    pub fn from_config(cfg: &TrajectoryConfig) -> SynRadResult<Self> {
        let settings = TrajectorySettings {
            ct_start_m: cfg.ct_start_m,
            ct_stop_m: cfg.ct_stop_m,
            npoints: cfg.npoints,
            stepper: cfg.stepper.into(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> SynRadResult<()> {
        if !self.ct_start_m.is_finite() || !self.ct_stop_m.is_finite() {
            return Err(SynRadError::ConfigError(
                "trajectory window bounds must be finite".to_string(),
            ));
        }
        if self.ct_stop_m <= self.ct_start_m {
            return Err(SynRadError::ConfigError(format!(
                "trajectory window is empty or reversed: ct_start_m={}, ct_stop_m={}",
                self.ct_start_m, self.ct_stop_m
            )));
        }
        if let Some(n) = self.npoints {
            if n < 2 {
                return Err(SynRadError::ConfigError(format!(
                    "trajectory npoints must be >= 2, got {n}"
                )));
            }
            if n > MAX_NPOINTS {
                return Err(SynRadError::ConfigError(format!(
                    "trajectory npoints must be <= {MAX_NPOINTS}, got {n}"
                )));
            }
        }
        Ok(())
    }

    /// Sample count satisfying the sampling contract for `fields`.
    pub fn resolve_npoints(&self, fields: &FieldContainer) -> SynRadResult<usize> {
        let span = self.ct_stop_m - self.ct_start_m;
        let scale = fields.characteristic_length();
        match (self.npoints, scale) {
            (Some(n), Some(length)) => {
                let step = span / (n - 1) as f64;
                let limit = length / MIN_SAMPLES_PER_PERIOD as f64;
                if step > limit * (1.0 + 1e-12) {
                    return Err(SynRadError::ConfigError(format!(
                        "npoints={n} gives a c·dt step of {step:e} m, above 1/{MIN_SAMPLES_PER_PERIOD} \
                         of the shortest field length {length:e} m; use npoints >= {}",
                        (span / limit).ceil() as usize + 1
                    )));
                }
                Ok(n)
            }
            (Some(n), None) => Ok(n),
            (None, Some(length)) => {
                let n = (span * DEFAULT_SAMPLES_PER_PERIOD as f64 / length).ceil() + 1.0;
                if !n.is_finite() || n > MAX_NPOINTS as f64 {
                    return Err(SynRadError::ConfigError(format!(
                        "window of {span} m at field length {length:e} m needs more than {MAX_NPOINTS} samples"
                    )));
                }
                Ok((n as usize).max(2))
            }
            (None, None) => Ok(DEFAULT_NPOINTS),
        }
    }
}

/// One trajectory sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub t_s: f64,
    pub x: Vector3,
    pub beta: Vector3,
    /// dβ/dt in 1/s.
    pub beta_dot: Vector3,
    pub gamma: f64,
}

/// Strictly time-ordered samples of one particle's motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    points: Vec<TrajectoryPoint>,
    charge_c: f64,
    mass_kg: f64,
}

impl Trajectory {
    pub fn from_points(points: Vec<TrajectoryPoint>, charge_c: f64, mass_kg: f64) -> SynRadResult<Self> {
        if points.len() < 2 {
            return Err(SynRadError::ConfigError(format!(
                "trajectory needs at least 2 samples, got {}",
                points.len()
            )));
        }
        for pair in points.windows(2) {
            if !(pair[1].t_s > pair[0].t_s) {
                return Err(SynRadError::ConfigError(format!(
                    "trajectory samples must strictly increase in time at t={:e} s",
                    pair[1].t_s
                )));
            }
        }
        Ok(Trajectory {
            points,
            charge_c,
            mass_kg,
        })
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn charge_c(&self) -> f64 {
        self.charge_c
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }

    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.t_s).collect()
    }

    pub fn start_s(&self) -> f64 {
        self.points.first().map_or(0.0, |p| p.t_s)
    }

    pub fn stop_s(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.t_s)
    }

    /// Cubic Hermite interpolation at time `t_s`; `None` outside the samples.
    ///
    /// Position uses `c β` as its derivative and β uses β̇. γ is interpolated
    /// linearly and β is rescaled to match it.
    pub fn interpolate_at(&self, t_s: f64) -> Option<TrajectoryPoint> {
        if self.points.len() < 2 || !(t_s >= self.start_s() && t_s <= self.stop_s()) {
            return None;
        }
        let i = self
            .points
            .partition_point(|p| p.t_s <= t_s)
            .saturating_sub(1)
            .min(self.points.len() - 2);
        let (a, b) = (&self.points[i], &self.points[i + 1]);
        let h = b.t_s - a.t_s;
        let s = (t_s - a.t_s) / h;

        let x = hermite(a.x, a.beta * C_LIGHT, b.x, b.beta * C_LIGHT, h, s);
        let direction = hermite(a.beta, a.beta_dot, b.beta, b.beta_dot, h, s);
        let gamma = a.gamma + s * (b.gamma - a.gamma);
        let beta = direction.unit() * beta_from_gamma(gamma);
        let beta_dot = a.beta_dot + (b.beta_dot - a.beta_dot) * s;
        Some(TrajectoryPoint {
            t_s,
            x,
            beta,
            beta_dot,
            gamma,
        })
    }

    /// Insert `factor − 1` interpolated samples into every interval.
    pub fn refined(&self, factor: usize) -> SynRadResult<Trajectory> {
        if factor == 0 {
            return Err(SynRadError::ConfigError(
                "refinement factor must be >= 1".to_string(),
            ));
        }
        if factor == 1 {
            return Ok(self.clone());
        }
        let mut points = Vec::with_capacity((self.points.len() - 1) * factor + 1);
        for pair in self.points.windows(2) {
            points.push(pair[0]);
            let h = (pair[1].t_s - pair[0].t_s) / factor as f64;
            for j in 1..factor {
                if let Some(p) = self.interpolate_at(pair[0].t_s + j as f64 * h) {
                    points.push(p);
                }
            }
        }
        if let Some(last) = self.points.last() {
            points.push(*last);
        }
        Trajectory::from_points(points, self.charge_c, self.mass_kg)
    }
}

/// `dβ/dt = q/(γ m c) [E + c β×B − β(β·E)]`.
pub fn lorentz_beta_dot(beta: Vector3, gamma: f64, field: &FieldSample, charge_c: f64, mass_kg: f64) -> Vector3 {
    let force = field.e + beta.cross(field.b) * C_LIGHT - beta * beta.dot(field.e);
    force * (charge_c / (gamma * mass_kg * C_LIGHT))
}

/// One relativistic Boris step of `u = γβ` over `dt`, with fields held fixed.
pub fn boris_push(u: Vector3, field: &FieldSample, charge_c: f64, mass_kg: f64, dt: f64) -> Vector3 {
    let eps = charge_c * dt / (2.0 * mass_kg * C_LIGHT);
    let u_minus = u + field.e * eps;
    let gamma_minus = (1.0 + u_minus.norm_sqr()).sqrt();
    let tau = field.b * (charge_c * dt / (2.0 * mass_kg * gamma_minus));
    let s = tau * (2.0 / (1.0 + tau.norm_sqr()));
    let u_prime = u_minus + u_minus.cross(tau);
    let u_plus = u_minus + u_prime.cross(s);
    u_plus + field.e * eps
}

fn checked_field(fields: &FieldContainer, x: Vector3, t: f64) -> SynRadResult<FieldSample> {
    let f = fields.field_at(x, t);
    if !f.is_finite() {
        return Err(SynRadError::NonFinite {
            quantity: "field".to_string(),
            time_s: t,
        });
    }
    Ok(f)
}

fn check_finite(v: Vector3, quantity: &str, t: f64) -> SynRadResult<()> {
    if !v.is_finite() {
        return Err(SynRadError::NonFinite {
            quantity: quantity.to_string(),
            time_s: t,
        });
    }
    Ok(())
}

/// Stepper state marching on `t0 + n·dt` (dt may be negative).
trait Pusher {
    fn sample(&mut self) -> SynRadResult<TrajectoryPoint>;
    fn advance(&mut self) -> SynRadResult<()>;
}

/// Staggered Boris state: position at `t`, momentum at `t − dt/2`.
struct BorisPusher<'a> {
    fields: &'a FieldContainer,
    charge_c: f64,
    mass_kg: f64,
    t0: f64,
    dt: f64,
    step: i64,
    x: Vector3,
    u_half: Vector3,
    cached: Option<(Vector3, FieldSample)>,
}

impl<'a> BorisPusher<'a> {
    fn new(particle: &Particle, fields: &'a FieldContainer, dt: f64) -> SynRadResult<Self> {
        let (q, m) = (particle.charge_c(), particle.mass_kg());
        let u0 = particle.beta0 * particle.gamma();
        let f0 = checked_field(fields, particle.x0, particle.t0_s)?;
        let u_half = boris_push(u0, &f0, q, m, -0.5 * dt);
        check_finite(u_half, "momentum", particle.t0_s)?;
        Ok(BorisPusher {
            fields,
            charge_c: q,
            mass_kg: m,
            t0: particle.t0_s,
            dt,
            step: 0,
            x: particle.x0,
            u_half,
            cached: None,
        })
    }

    fn time(&self) -> f64 {
        self.t0 + self.step as f64 * self.dt
    }

    fn next_momentum(&mut self) -> SynRadResult<(Vector3, FieldSample)> {
        if let Some(c) = self.cached {
            return Ok(c);
        }
        let t = self.time();
        let f = checked_field(self.fields, self.x, t)?;
        let u_next = boris_push(self.u_half, &f, self.charge_c, self.mass_kg, self.dt);
        check_finite(u_next, "momentum", t)?;
        self.cached = Some((u_next, f));
        Ok((u_next, f))
    }
}

impl Pusher for BorisPusher<'_> {
    fn sample(&mut self) -> SynRadResult<TrajectoryPoint> {
        let (u_next, f) = self.next_momentum()?;
        let t = self.time();
        // Average the half-step momenta, keeping their mean magnitude so a
        // pure magnetic rotation leaves γ unchanged.
        let mean = (self.u_half + u_next) * 0.5;
        let magnitude = 0.5 * (self.u_half.norm() + u_next.norm());
        let u = if mean.norm() > 0.0 {
            mean.unit() * magnitude
        } else {
            mean
        };
        let gamma = (1.0 + u.norm_sqr()).sqrt();
        let beta = u / gamma;
        let b = beta.norm();
        if !(b < 1.0) {
            return Err(SynRadError::Superluminal { time_s: t, beta: b });
        }
        Ok(TrajectoryPoint {
            t_s: t,
            x: self.x,
            beta,
            beta_dot: lorentz_beta_dot(beta, gamma, &f, self.charge_c, self.mass_kg),
            gamma,
        })
    }

    fn advance(&mut self) -> SynRadResult<()> {
        let (u_next, _) = self.next_momentum()?;
        let gamma = (1.0 + u_next.norm_sqr()).sqrt();
        self.x += u_next * (C_LIGHT * self.dt / gamma);
        self.u_half = u_next;
        self.cached = None;
        self.step += 1;
        check_finite(self.x, "position", self.time())
    }
}

/// Classical RK4 on `y = (x, β)`.
struct Rk4Pusher<'a> {
    fields: &'a FieldContainer,
    charge_c: f64,
    mass_kg: f64,
    t0: f64,
    dt: f64,
    step: i64,
    y: [f64; 6],
}

impl<'a> Rk4Pusher<'a> {
    fn new(particle: &Particle, fields: &'a FieldContainer, dt: f64) -> Self {
        let (x, b) = (particle.x0, particle.beta0);
        Rk4Pusher {
            fields,
            charge_c: particle.charge_c(),
            mass_kg: particle.mass_kg(),
            t0: particle.t0_s,
            dt,
            step: 0,
            y: [x.x, x.y, x.z, b.x, b.y, b.z],
        }
    }

    fn time(&self) -> f64 {
        self.t0 + self.step as f64 * self.dt
    }
}

impl Pusher for Rk4Pusher<'_> {
    fn sample(&mut self) -> SynRadResult<TrajectoryPoint> {
        let t = self.time();
        let x = Vector3::new(self.y[0], self.y[1], self.y[2]);
        let beta = Vector3::new(self.y[3], self.y[4], self.y[5]);
        check_finite(beta, "velocity", t)?;
        let b = beta.norm();
        if !(b < 1.0) {
            return Err(SynRadError::Superluminal { time_s: t, beta: b });
        }
        let gamma = 1.0 / ((1.0 - b) * (1.0 + b)).sqrt();
        let f = checked_field(self.fields, x, t)?;
        Ok(TrajectoryPoint {
            t_s: t,
            x,
            beta,
            beta_dot: lorentz_beta_dot(beta, gamma, &f, self.charge_c, self.mass_kg),
            gamma,
        })
    }

    fn advance(&mut self) -> SynRadResult<()> {
        let (fields, q, m) = (self.fields, self.charge_c, self.mass_kg);
        let system = |t: f64, y: &[f64; 6]| -> [f64; 6] {
            let x = Vector3::new(y[0], y[1], y[2]);
            let beta = Vector3::new(y[3], y[4], y[5]);
            // |·| keeps an overshooting stage finite; the sample check
            // reports it as superluminal.
            let gamma = 1.0 / (1.0 - beta.norm_sqr()).abs().sqrt();
            let bd = lorentz_beta_dot(beta, gamma, &fields.field_at(x, t), q, m);
            [
                C_LIGHT * beta.x,
                C_LIGHT * beta.y,
                C_LIGHT * beta.z,
                bd.x,
                bd.y,
                bd.z,
            ]
        };
        self.y = rk4_step(&system, self.time(), &self.y, self.dt);
        self.step += 1;
        check_finite(Vector3::new(self.y[0], self.y[1], self.y[2]), "position", self.time())
    }
}

fn make_pusher<'a>(
    particle: &Particle,
    fields: &'a FieldContainer,
    dt: f64,
    stepper: Stepper,
) -> SynRadResult<Box<dyn Pusher + 'a>> {
    Ok(match stepper {
        Stepper::Boris => Box::new(BorisPusher::new(particle, fields, dt)?),
        Stepper::Rk4 => Box::new(Rk4Pusher::new(particle, fields, dt)),
    })
}

/// Integrate `particle` through `fields` over the settings window.
///
/// Samples lie at `t0 + k·dt` inside the window. The particle is integrated
/// forward and backward from `t0`; a `t0` outside the window is propagated
/// without recording until the window is reached.
pub fn integrate(
    particle: &Particle,
    fields: &FieldContainer,
    settings: &TrajectorySettings,
) -> SynRadResult<Trajectory> {
    particle.validate()?;
    settings.validate()?;
    let npoints = settings.resolve_npoints(fields)?;
    let t_start = settings.ct_start_m / C_LIGHT;
    let t_stop = settings.ct_stop_m / C_LIGHT;
    let dt = (t_stop - t_start) / (npoints - 1) as f64;
    let t0 = particle.t0_s;
    let k_lo = ((t_start - t0) / dt - GRID_EPS).ceil() as i64;
    let k_hi = ((t_stop - t0) / dt + GRID_EPS).floor() as i64;
    debug!(
        npoints,
        dt_s = dt,
        k_lo,
        k_hi,
        stepper = ?settings.stepper,
        "integrating trajectory"
    );

    let mut points = Vec::with_capacity((k_hi - k_lo + 1).max(0) as usize);
    if k_lo < 0 {
        let last = k_hi.min(-1);
        let mut pusher = make_pusher(particle, fields, -dt, settings.stepper)?;
        let mut backward = Vec::new();
        let mut k = 0;
        loop {
            if k <= last {
                backward.push(pusher.sample()?);
            }
            if k == k_lo {
                break;
            }
            pusher.advance()?;
            k -= 1;
        }
        backward.reverse();
        points.extend(backward);
    }
    if k_hi >= 0 {
        let first = k_lo.max(0);
        let mut pusher = make_pusher(particle, fields, dt, settings.stepper)?;
        let mut k = 0;
        loop {
            if k >= first {
                points.push(pusher.sample()?);
            }
            if k == k_hi {
                break;
            }
            pusher.advance()?;
            k += 1;
        }
    }
    Trajectory::from_points(points, particle.charge_c(), particle.mass_kg())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldProfile, FieldSource, IdealUndulator, UniformBox};
    use crate::particle::{ParticleType, Species};

    fn electron(gamma: f64, t0: f64) -> Particle {
        let species = Species::new(ParticleType::Electron).unwrap();
        let beta = beta_from_gamma(gamma);
        Particle::new(species, Vector3::ZERO, Vector3::new(0.0, 0.0, beta), t0).unwrap()
    }

    fn uniform(b: Vector3) -> FieldContainer {
        let mut c = FieldContainer::new();
        c.add(
            "dipole",
            FieldSource::Magnetic(FieldProfile::UniformBox(UniformBox::new(b, Vector3::ZERO).unwrap())),
        );
        c
    }

    #[test]
    fn test_zero_field_is_straight_line() {
        let p = electron(10.0, 0.0);
        let settings = TrajectorySettings::new(-1.0, 1.0).unwrap().with_npoints(201).unwrap();
        let traj = integrate(&p, &FieldContainer::new(), &settings).unwrap();
        assert_eq!(traj.len(), 201);
        for s in traj.points() {
            let expected = p.beta0 * (C_LIGHT * s.t_s);
            assert!((s.x - expected).norm() < 1e-12, "{:?}", s.x);
            assert_eq!(s.beta, p.beta0);
            assert!(s.beta_dot.is_zero());
        }
    }

    #[test]
    fn test_uniform_field_gives_circle() {
        let gamma = 100.0;
        let b_field = 0.01;
        let p = electron(gamma, 0.0);
        let fields = uniform(Vector3::new(0.0, b_field, 0.0));
        for stepper in [Stepper::Boris, Stepper::Rk4] {
            let settings = TrajectorySettings::new(0.0, 1.0)
                .unwrap()
                .with_npoints(10_001)
                .unwrap()
                .with_stepper(stepper);
            let traj = integrate(&p, &fields, &settings).unwrap();
            let v = p.beta0.norm() * C_LIGHT;
            let radius = gamma * p.mass_kg() * v / (p.charge_c().abs() * b_field);
            // Electron moving +z in +y field bends towards +x.
            let centre = Vector3::new(radius, 0.0, 0.0);
            for s in traj.points() {
                let r = (s.x - centre).norm();
                assert!((r / radius - 1.0).abs() < 1e-6, "{stepper:?}: r = {r}, R = {radius}");
            }
            assert!(traj.points().last().unwrap().x.x > 0.0);
        }
    }

    #[test]
    fn test_boris_keeps_gamma_constant_in_pure_magnetic_field() {
        let gamma = 5870.85;
        let p = electron(gamma, 0.0);
        let fields = uniform(Vector3::new(0.0, 0.4, 0.0));
        let settings = TrajectorySettings::new(-0.5, 0.5).unwrap().with_npoints(5001).unwrap();
        let traj = integrate(&p, &fields, &settings).unwrap();
        let g0 = traj.points()[0].gamma;
        for s in traj.points() {
            assert!((s.gamma / g0 - 1.0).abs() < 1e-12);
            assert!(s.beta.norm() < 1.0);
        }
        assert!((g0 / gamma - 1.0).abs() < 1e-7);
    }

    #[test]
    fn test_time_grid_anchored_at_t0() {
        let t0 = 0.1 / C_LIGHT;
        let p = electron(10.0, t0);
        let settings = TrajectorySettings::new(-1.0, 1.0).unwrap().with_npoints(101).unwrap();
        let traj = integrate(&p, &FieldContainer::new(), &settings).unwrap();
        let times = traj.times();
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(times.iter().filter(|&&t| (t - t0).abs() < 1e-20).count(), 1);
        assert!(times[0] >= -1.0 / C_LIGHT * (1.0 + 1e-9));
        assert!(*times.last().unwrap() <= 1.0 / C_LIGHT * (1.0 + 1e-9));
        assert!(traj.len() == 100 || traj.len() == 101);
    }

    #[test]
    fn test_t0_outside_window_propagates_first() {
        let p = electron(10.0, -2.0 / C_LIGHT);
        let settings = TrajectorySettings::new(0.0, 1.0).unwrap().with_npoints(11).unwrap();
        let traj = integrate(&p, &FieldContainer::new(), &settings).unwrap();
        let first = traj.points()[0];
        assert!(first.t_s >= -1e-18);
        // Travelled ~2 m before recording started.
        assert!((first.x.z - 2.0 * p.beta0.z).abs() < 1e-9);

        let late = electron(10.0, 3.0 / C_LIGHT);
        let traj = integrate(&late, &FieldContainer::new(), &settings).unwrap();
        assert_eq!(traj.len(), 11);
        assert!((traj.stop_s() - 1.0 / C_LIGHT).abs() < 1e-18);
    }

    #[test]
    fn test_sampling_contract() {
        let mut fields = FieldContainer::new();
        fields.add(
            "und",
            FieldSource::Magnetic(FieldProfile::IdealUndulator(
                IdealUndulator::new(Vector3::Y, Vector3::new(0.0, 0.0, 0.05), 10, 0.0, 0.0).unwrap(),
            )),
        );
        let coarse = TrajectorySettings::new(-1.0, 1.0).unwrap().with_npoints(100).unwrap();
        match coarse.resolve_npoints(&fields) {
            Err(SynRadError::ConfigError(msg)) => assert!(msg.contains("npoints=100")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
        let fine = TrajectorySettings::new(-1.0, 1.0).unwrap().with_npoints(641).unwrap();
        assert_eq!(fine.resolve_npoints(&fields).unwrap(), 641);
        let auto = TrajectorySettings::new(-1.0, 1.0).unwrap();
        assert_eq!(auto.resolve_npoints(&fields).unwrap(), 1281);
        assert_eq!(auto.resolve_npoints(&FieldContainer::new()).unwrap(), DEFAULT_NPOINTS);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(TrajectorySettings::new(1.0, 1.0).is_err());
        assert!(TrajectorySettings::new(1.0, -1.0).is_err());
        assert!(TrajectorySettings::new(f64::NAN, 1.0).is_err());
        assert!(TrajectorySettings::new(0.0, 1.0).unwrap().with_npoints(1).is_err());
    }

    #[test]
    fn test_rk4_overshoot_is_superluminal() {
        let species = Species::new(ParticleType::Positron).unwrap();
        let p = Particle::new(species, Vector3::ZERO, Vector3::new(0.0, 0.0, 0.99), 0.0).unwrap();
        let mut fields = FieldContainer::new();
        fields.add(
            "gap",
            FieldSource::Electric(FieldProfile::UniformBox(
                UniformBox::new(Vector3::new(0.0, 0.0, 1e10), Vector3::ZERO).unwrap(),
            )),
        );
        let settings = TrajectorySettings::new(0.0, 1.0)
            .unwrap()
            .with_npoints(3)
            .unwrap()
            .with_stepper(Stepper::Rk4);
        match integrate(&p, &fields, &settings) {
            Err(SynRadError::Superluminal { beta, .. }) => assert!(beta >= 1.0),
            other => panic!("expected Superluminal, got {other:?}"),
        }
        // Boris cannot exceed c.
        let traj = integrate(&p, &fields, &settings.clone().with_stepper(Stepper::Boris)).unwrap();
        assert!(traj.points().iter().all(|s| s.beta.norm() < 1.0));
    }

    #[test]
    fn test_non_finite_field_is_reported_with_time() {
        let mut fields = FieldContainer::new();
        fields.add(
            "bad",
            FieldSource::Magnetic(FieldProfile::Function(crate::field::FieldFunction::new(
                |x, _t| {
                    if x.z > 0.5 {
                        Vector3::new(f64::NAN, 0.0, 0.0)
                    } else {
                        Vector3::ZERO
                    }
                },
            ))),
        );
        let settings = TrajectorySettings::new(0.0, 1.0).unwrap().with_npoints(101).unwrap();
        match integrate(&electron(10.0, 0.0), &fields, &settings) {
            Err(SynRadError::NonFinite { quantity, time_s }) => {
                assert_eq!(quantity, "field");
                assert!(time_s > 0.5 / C_LIGHT);
            }
            other => panic!("expected NonFinite, got {other:?}"),
        }
    }

    #[test]
    fn test_refined_trajectory_matches_circle() {
        let gamma = 100.0;
        let p = electron(gamma, 0.0);
        let fields = uniform(Vector3::new(0.0, 0.01, 0.0));
        let settings = TrajectorySettings::new(0.0, 1.0).unwrap().with_npoints(2001).unwrap();
        let coarse = integrate(&p, &fields, &settings).unwrap();
        let fine = coarse.refined(4).unwrap();
        assert_eq!(fine.len(), (coarse.len() - 1) * 4 + 1);
        let radius = gamma * p.mass_kg() * p.beta0.norm() * C_LIGHT / (p.charge_c().abs() * 0.01);
        let centre = Vector3::new(radius, 0.0, 0.0);
        for s in fine.points() {
            assert!(((s.x - centre).norm() / radius - 1.0).abs() < 1e-6);
            assert!((s.gamma / gamma - 1.0).abs() < 1e-9);
        }
        assert!(coarse.interpolate_at(-1.0).is_none());
        assert!(coarse.refined(0).is_err());
    }
}
