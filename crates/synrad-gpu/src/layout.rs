//! Single-precision buffers consumed by `radiation.wgsl`.
//!
//! Positions are shifted to the trajectory centroid and the per-step chord
//! quantities are formed in f64 on the host, so the shader only handles
//! differences that f32 resolves. The retarded phase is rebuilt on the
//! device as a compensated sum of steps starting from the f64 `ω τ_0`.

use std::f64::consts::PI;
use synrad_core::radiation::backend::{FIELD_STRIDE, POINT_STRIDE};
use synrad_core::radiation::FlatTrajectory;
use synrad_math::vector::Vector3;
use synrad_types::constants::{C_LIGHT, EPSILON_0};
use synrad_types::error::{SynRadError, SynRadResult};

/// f32 values per trajectory sample (four `vec4`).
pub const SAMPLE_STRIDE: usize = 16;
/// f32 values per observation point (two `vec4`).
pub const GPU_POINT_STRIDE: usize = 8;
/// f32 values written back per point (two `vec4`).
pub const OUTPUT_STRIDE: usize = 8;

/// `[x − origin, Δt, β, 1 − |β|, β̇, w, Δx, 1 − |Δx|/(cΔt)]` per sample.
pub fn pack_samples(trajectory: &FlatTrajectory, origin: Vector3) -> Vec<f32> {
    let n = trajectory.len();
    let mut out = Vec::with_capacity(n * SAMPLE_STRIDE);
    for i in 0..n {
        let x = trajectory.x(i) - origin;
        let (dx, dt, omb_chord) = if i == 0 {
            (Vector3::ZERO, 0.0, 1.0)
        } else {
            let dx = trajectory.x(i) - trajectory.x(i - 1);
            let dt = trajectory.t(i) - trajectory.t(i - 1);
            (dx, dt, 1.0 - dx.norm() / (C_LIGHT * dt))
        };
        let beta = trajectory.beta(i);
        let beta_dot = trajectory.beta_dot(i);
        out.extend_from_slice(&[
            x.x as f32,
            x.y as f32,
            x.z as f32,
            dt as f32,
            beta.x as f32,
            beta.y as f32,
            beta.z as f32,
            trajectory.one_minus_beta(i) as f32,
            beta_dot.x as f32,
            beta_dot.y as f32,
            beta_dot.z as f32,
            trajectory.weight(i) as f32,
            dx.x as f32,
            dx.y as f32,
            dx.z as f32,
            omb_chord as f32,
        ]);
    }
    out
}

/// Re-layout [`POINT_STRIDE`] host points as `[p − origin, phase0, normal, flag]`.
pub fn pack_points(points: &[f64], origin: Vector3) -> SynRadResult<Vec<f32>> {
    if points.len() % POINT_STRIDE != 0 {
        return Err(SynRadError::AcceleratorUnavailable(format!(
            "packed point buffer length {} is not a multiple of {POINT_STRIDE}",
            points.len()
        )));
    }
    let mut out = Vec::with_capacity(points.len() / POINT_STRIDE * GPU_POINT_STRIDE);
    for p in points.chunks_exact(POINT_STRIDE) {
        out.extend_from_slice(&[
            (p[0] - origin.x) as f32,
            (p[1] - origin.y) as f32,
            (p[2] - origin.z) as f32,
            p[7] as f32,
            p[3] as f32,
            p[4] as f32,
            p[5] as f32,
            p[6] as f32,
        ]);
    }
    Ok(out)
}

/// `q/(4πε0√2π)`, applied on the host to the raw field sums.
pub fn field_prefactor(trajectory: &FlatTrajectory) -> f64 {
    trajectory.charge_c() / (4.0 * PI * EPSILON_0 * (2.0 * PI).sqrt())
}

/// `q/(4πε0)`, applied on the device before squaring.
pub fn radiation_scale(trajectory: &FlatTrajectory) -> f64 {
    trajectory.charge_c() / (4.0 * PI * EPSILON_0)
}

/// Scale raw device sums into the [`FIELD_STRIDE`] host layout. A phase
/// advance above π between samples is reported the way the CPU kernel does.
pub fn unpack_fields(raw: &[f32], points: &[f64], omega: f64, prefactor: f64) -> SynRadResult<Vec<f64>> {
    let npoints = points.len() / POINT_STRIDE;
    if raw.len() != npoints * OUTPUT_STRIDE {
        return Err(SynRadError::AcceleratorUnavailable(format!(
            "shader wrote {} values for {npoints} points",
            raw.len()
        )));
    }
    let mut out = Vec::with_capacity(npoints * FIELD_STRIDE);
    for (o, p) in raw.chunks_exact(OUTPUT_STRIDE).zip(points.chunks_exact(POINT_STRIDE)) {
        let max_step = o[7] as f64;
        if max_step > PI {
            return Err(SynRadError::QuadratureDiverged {
                quantity: "electric field spectrum".to_string(),
                point: [p[0], p[1], p[2]],
                omega,
                message: format!("phase advance {max_step:.3} rad between samples exceeds π; increase npoints"),
            });
        }
        for axis in 0..3 {
            out.push(o[axis] as f64 * prefactor);
            out.push(o[4 + axis] as f64 * prefactor);
        }
    }
    Ok(out)
}

pub fn unpack_powers(raw: &[f32], npoints: usize) -> SynRadResult<Vec<f64>> {
    if raw.len() != npoints * OUTPUT_STRIDE {
        return Err(SynRadError::AcceleratorUnavailable(format!(
            "shader wrote {} values for {npoints} points",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(OUTPUT_STRIDE)
        .map(|o| o[3] as f64 * EPSILON_0 * C_LIGHT)
        .collect())
}

#[cfg(test)]
mod tests {
    //! `radiation.wgsl` transcribed to host f32, so the single-precision
    //! scheme is checked against the f64 kernel without an adapter.

    use super::*;
    use synrad_core::field::{FieldContainer, FieldProfile, FieldSource, IdealUndulator};
    use synrad_core::particle::{Particle, ParticleType, Species};
    use synrad_core::radiation::backend;
    use synrad_core::radiation::kernel;
    use synrad_core::surface::SurfacePoint;
    use synrad_core::trajectory::{integrate, TrajectorySettings};
    use synrad_types::constants::{EV_TO_J, HBAR};

    type V = [f32; 3];
    const C32: f32 = 299_792_458.0;
    const TWO_PI32: f32 = std::f32::consts::TAU;

    fn add(a: V, b: V) -> V {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }
    fn sub(a: V, b: V) -> V {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }
    fn scale(a: V, s: f32) -> V {
        [a[0] * s, a[1] * s, a[2] * s]
    }
    fn dot(a: V, b: V) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }
    fn cross(a: V, b: V) -> V {
        [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
    }
    fn length(a: V) -> f32 {
        dot(a, a).sqrt()
    }

    struct Sample {
        x: V,
        dt: f32,
        beta: V,
        omb: f32,
        beta_dot: V,
        w: f32,
        dx: V,
        omb_chord: f32,
    }

    fn load(samples: &[f32], k: usize) -> Sample {
        let s = &samples[k * SAMPLE_STRIDE..(k + 1) * SAMPLE_STRIDE];
        Sample {
            x: [s[0], s[1], s[2]],
            dt: s[3],
            beta: [s[4], s[5], s[6]],
            omb: s[7],
            beta_dot: [s[8], s[9], s[10]],
            w: s[11],
            dx: [s[12], s[13], s[14]],
            omb_chord: s[15],
        }
    }

    fn one_minus_n_beta(n: V, beta: V, omb: f32) -> f32 {
        let b = length(beta);
        if b == 0.0 {
            return 1.0;
        }
        let diff = sub(n, scale(beta, 1.0 / b));
        omb + 0.5 * b * dot(diff, diff)
    }

    fn radiation_term(n: V, nmb: V, beta_dot: V, g: f32) -> V {
        sub(scale(nmb, dot(n, beta_dot)), scale(beta_dot, g))
    }

    fn tau_rate(d: V, r: f32, s: &Sample) -> f32 {
        let d_prev = add(d, s.dx);
        let r_prev = length(d_prev);
        let sum = add(d, d_prev);
        let sum_len = length(sum);
        let big_s = r + r_prev;
        let cr = cross(d, s.dx);
        let denom = r * r_prev + dot(d, d_prev);
        let one_minus_u = if denom > 0.0 {
            (2.0 * dot(cr, cr) / denom) / (big_s * (big_s + sum_len))
        } else {
            0.0
        };
        let u_len = 1.0 - one_minus_u;
        let dx_len = length(s.dx);
        let half_angle_sq = if dx_len > 0.0 && sum_len > 0.0 {
            let diff = sub(scale(s.dx, 1.0 / dx_len), scale(sum, 1.0 / sum_len));
            0.5 * dot(diff, diff)
        } else {
            0.0
        };
        s.omb_chord * u_len + one_minus_u + (1.0 - s.omb_chord) * u_len * half_angle_sq
    }

    fn mirror_fields(samples: &[f32], point: &[f32], omega: f32) -> [f32; OUTPUT_STRIDE] {
        let p = [point[0], point[1], point[2]];
        let mut phase = point[3];
        let mut comp = 0.0f32;
        let mut max_step = 0.0f32;
        let mut re = [0.0f32; 3];
        let mut im = [0.0f32; 3];
        for k in 0..samples.len() / SAMPLE_STRIDE {
            let s = load(samples, k);
            let d = sub(p, s.x);
            let r = length(d);
            if k > 0 {
                let inc = (omega * s.dt) * tau_rate(d, r, &s);
                max_step = max_step.max(inc.abs());
                let y = inc - comp;
                let t = phase + y;
                comp = (t - phase) - y;
                phase = t;
                if phase >= TWO_PI32 {
                    phase -= (phase / TWO_PI32).floor() * TWO_PI32;
                }
            }
            let n = scale(d, 1.0 / r);
            let g = one_minus_n_beta(n, s.beta, s.omb);
            let nmb = sub(n, s.beta);
            let inv_gamma2 = s.omb * (1.0 + length(s.beta));
            let acc = scale(radiation_term(n, nmb, s.beta_dot, g), 1.0 / (C32 * g * g * r));
            let vel = scale(nmb, inv_gamma2 / (g * g * r * r));
            let amp = scale(add(acc, vel), s.w);
            re = add(re, scale(amp, phase.cos()));
            im = add(im, scale(amp, phase.sin()));
        }
        [re[0], re[1], re[2], 0.0, im[0], im[1], im[2], max_step]
    }

    fn mirror_power(samples: &[f32], point: &[f32], rad_scale: f32) -> [f32; OUTPUT_STRIDE] {
        let p = [point[0], point[1], point[2]];
        let normal = [point[4], point[5], point[6]];
        let mut power = 0.0f32;
        for k in 0..samples.len() / SAMPLE_STRIDE {
            let s = load(samples, k);
            let d = sub(p, s.x);
            let r = length(d);
            let n = scale(d, 1.0 / r);
            let proj = if point[7] != 0.0 { dot(n, normal).max(0.0) } else { 1.0 };
            if proj > 0.0 {
                let g = one_minus_n_beta(n, s.beta, s.omb);
                let nmb = sub(n, s.beta);
                let e = scale(radiation_term(n, nmb, s.beta_dot, g), ((rad_scale / (C32 * r)) / g) / g / g);
                power += s.w * dot(e, e) * proj * g;
            }
        }
        [0.0, 0.0, 0.0, power, 0.0, 0.0, 0.0, 0.0]
    }

    fn undulator_trajectory() -> (FlatTrajectory, f64) {
        let und = IdealUndulator::new(Vector3::new(0.0, 0.3, 0.0), Vector3::new(0.0, 0.0, 0.05), 20, 0.0, 0.0)
            .unwrap();
        let species = Species::new(ParticleType::Electron).unwrap();
        let particle = Particle::from_energy(species, 3.0, Vector3::ZERO, Vector3::Z, 0.0).unwrap();
        let e1 = und.fundamental_energy_ev(particle.gamma());
        let mut fields = FieldContainer::new();
        fields.add("und", FieldSource::Magnetic(FieldProfile::IdealUndulator(und)));
        let settings = TrajectorySettings::new(-0.6, 0.6).unwrap().with_npoints(4001).unwrap();
        let traj = integrate(&particle, &fields, &settings).unwrap();
        (FlatTrajectory::from_trajectory(&traj), e1)
    }

    fn intensity(buf: &[f64]) -> f64 {
        buf.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_layout_strides() {
        let (flat, _) = undulator_trajectory();
        let samples = pack_samples(&flat, flat.centroid());
        assert_eq!(samples.len(), flat.len() * SAMPLE_STRIDE);
        assert_eq!(samples[3], 0.0);
        assert_eq!(samples[15], 1.0);
        assert!(samples[SAMPLE_STRIDE + 3] > 0.0);
        let chord = samples[2 * SAMPLE_STRIDE - 1];
        assert!(chord > 0.0 && chord < 1e-6, "1 - |chord beta| = {chord}");

        let host = [1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 1.0, 0.5];
        let gpu = pack_points(&host, Vector3::new(1.0, 1.0, 1.0)).unwrap();
        assert_eq!(gpu, vec![0.0, 1.0, 2.0, 0.5, 0.0, 0.0, 1.0, 1.0]);
        assert!(pack_points(&host[..5], Vector3::ZERO).is_err());
    }

    #[test]
    fn test_single_precision_fields_match_kernel() {
        let (flat, e1) = undulator_trajectory();
        let origin = flat.centroid();
        let samples = pack_samples(&flat, origin);
        let points = [
            SurfacePoint::new(Vector3::new(0.0, 0.0, 30.0)),
            SurfacePoint::new(Vector3::new(0.001, 0.0005, 30.0)),
            SurfacePoint::new(Vector3::new(0.003, 0.0, 10.0)),
        ];
        for energy in [e1, 0.97 * e1] {
            let omega = energy * EV_TO_J / HBAR;
            let host = backend::pack_points(&flat, &points, omega);
            let gpu = pack_points(&host, origin).unwrap();
            let raw: Vec<f32> = gpu
                .chunks_exact(GPU_POINT_STRIDE)
                .flat_map(|p| mirror_fields(&samples, p, omega as f32))
                .collect();
            let fields = unpack_fields(&raw, &host, omega, field_prefactor(&flat)).unwrap();
            for (i, sp) in points.iter().enumerate() {
                let e = kernel::electric_field_at(&flat, sp.position, omega).unwrap();
                let expected = e.norm_sqr();
                let got = intensity(&fields[i * FIELD_STRIDE..(i + 1) * FIELD_STRIDE]);
                assert!(
                    (got / expected - 1.0).abs() < 1e-3,
                    "point {i} at {energy} eV: {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_single_precision_power_matches_kernel() {
        let (flat, _) = undulator_trajectory();
        let origin = flat.centroid();
        let samples = pack_samples(&flat, origin);
        let points = [
            SurfacePoint::with_normal(Vector3::new(0.0, 0.0, 30.0), Vector3::Z),
            SurfacePoint::new(Vector3::new(0.002, 0.0, 30.0)),
        ];
        let host = backend::pack_points(&flat, &points, 0.0);
        let gpu = pack_points(&host, origin).unwrap();
        let raw: Vec<f32> = gpu
            .chunks_exact(GPU_POINT_STRIDE)
            .flat_map(|p| mirror_power(&samples, p, radiation_scale(&flat) as f32))
            .collect();
        let powers = unpack_powers(&raw, points.len()).unwrap();
        for (sp, got) in points.iter().zip(&powers) {
            let expected = kernel::power_density_at(&flat, sp.position, sp.normal).unwrap();
            assert!(expected > 0.0);
            assert!((got / expected - 1.0).abs() < 1e-3, "{got} vs {expected}");
        }
    }

    #[test]
    fn test_large_phase_step_reported_as_divergence() {
        let host = [0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let raw = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 4.0];
        let err = unpack_fields(&raw, &host, 1e19, 1.0).unwrap_err();
        assert!(err.is_numerical(), "{err}");
        assert!(unpack_fields(&raw[..4], &host, 1e19, 1.0).is_err());
    }
}
