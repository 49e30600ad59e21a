use super::kernel::TimeDomainField;
use super::polarization::Polarization;
use num_complex::Complex64;
use std::f64::consts::PI;
use synrad_math::fft::ifft;
use synrad_math::vector::Vector3C;
use synrad_types::constants::{omega_to_ev, C_LIGHT, EPSILON_0, HBAR};
use synrad_types::error::{SynRadError, SynRadResult};

/// Photons/s/mm²/0.1%bw per `|E(ω)|²` for one elementary charge per second.
///
/// `2 ε0 c |E|² / (ħ ω) · ω · 1e-3 / 1e6`
pub fn flux_per_field_sqr() -> f64 {
    2.0 * EPSILON_0 * C_LIGHT * 1e-3 / HBAR * 1e-6
}

/// Flux (photons/s/mm²/0.1%bw) or power per energy sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    energies_ev: Vec<f64>,
    flux: Vec<f64>,
}

impl Spectrum {
    pub fn new(energies_ev: Vec<f64>, flux: Vec<f64>) -> SynRadResult<Self> {
        if energies_ev.len() != flux.len() {
            return Err(SynRadError::ConfigError(format!(
                "spectrum has {} energies but {} values",
                energies_ev.len(),
                flux.len()
            )));
        }
        Ok(Spectrum { energies_ev, flux })
    }

    pub fn energies_ev(&self) -> &[f64] {
        &self.energies_ev
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.energies_ev.iter().copied().zip(self.flux.iter().copied())
    }

    /// `(energy, flux)` of the largest sample.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.iter()
            .filter(|(_, f)| !f.is_nan())
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub(crate) fn scaled(mut self, factor: f64) -> Self {
        for f in &mut self.flux {
            *f *= factor;
        }
        self
    }
}

/// Uniform energy grid `[start, stop]` with `n` points (eV).
pub fn energy_range(start_ev: f64, stop_ev: f64, n: usize) -> SynRadResult<Vec<f64>> {
    if n == 0 || !start_ev.is_finite() || !stop_ev.is_finite() || start_ev <= 0.0 || stop_ev < start_ev {
        return Err(SynRadError::ConfigError(format!(
            "energy range needs 0 < start <= stop and n >= 1, got [{start_ev}, {stop_ev}] x {n}"
        )));
    }
    if n == 1 {
        return Ok(vec![start_ev]);
    }
    let step = (stop_ev - start_ev) / (n - 1) as f64;
    Ok((0..n).map(|i| start_ev + step * i as f64).collect())
}

fn lerp_at(t: &[f64], y: &[f64], x: f64) -> f64 {
    let hi = t.partition_point(|&v| v < x).clamp(1, t.len() - 1);
    let lo = hi - 1;
    let span = t[hi] - t[lo];
    if span <= 0.0 {
        return y[lo];
    }
    let s = ((x - t[lo]) / span).clamp(0.0, 1.0);
    y[lo] + s * (y[hi] - y[lo])
}

/// Spectrum of a time-domain field via FFT on a uniform resampling of the
/// observer-time axis. Positive frequencies only; DC is dropped.
pub fn fft_spectrum(field: &TimeDomainField, polarization: &Polarization) -> SynRadResult<Spectrum> {
    let n = field.len();
    if n < 4 {
        return Err(SynRadError::ConfigError(format!(
            "FFT spectrum needs at least 4 samples, got {n}"
        )));
    }
    let t0 = field.t_obs[0];
    let span = field.t_obs[n - 1] - t0;
    if !(span > 0.0) {
        return Err(SynRadError::PhysicsViolation(
            "observer time span must be positive".to_string(),
        ));
    }
    let dt = span / (n - 1) as f64;
    let components: [Vec<f64>; 3] = [
        field.e.iter().map(|e| e.x).collect(),
        field.e.iter().map(|e| e.y).collect(),
        field.e.iter().map(|e| e.z).collect(),
    ];

    // n · ifft(x)[j] = Σ_k x_k e^{+2πi jk/n}
    let mut transformed = Vec::with_capacity(3);
    for comp in &components {
        let uniform: Vec<Complex64> = (0..n)
            .map(|k| Complex64::new(lerp_at(&field.t_obs, comp, t0 + dt * k as f64), 0.0))
            .collect();
        let spectrum: Vec<Complex64> = ifft(&uniform).into_iter().map(|c| c * n as f64).collect();
        transformed.push(spectrum);
    }

    let scale = dt / (2.0 * PI).sqrt();
    let flux_factor = flux_per_field_sqr();
    let half = n / 2;
    let mut energies = Vec::with_capacity(half);
    let mut flux = Vec::with_capacity(half);
    for j in 1..=half {
        let omega = 2.0 * PI * j as f64 / (n as f64 * dt);
        let shift = Complex64::from_polar(scale, omega * (t0 + field.offset_s));
        let e = Vector3C::new(transformed[0][j], transformed[1][j], transformed[2][j]) * shift;
        energies.push(omega_to_ev(omega));
        flux.push(flux_factor * polarization.project(e).norm_sqr());
    }
    Spectrum::new(energies, flux)
}
