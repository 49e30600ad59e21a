// ─────────────────────────────────────────────────────────────────────
// SynRad — Simulation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Beam-summed radiation runs.
//!
//! Each particle `i` draws from its own RNG stream `(seed, i)`, is
//! integrated independently, and contributes with weight `rate/N_ok`.
//! Results are reduced in particle-index order once every worker is done.

use crate::beam::{particle_rng, BeamContainer, ParticleBeam};
use crate::field::FieldContainer;
use crate::particle::Particle;
use crate::radiation::{
    flux_per_field_sqr, Backend, FieldAccumulator, OffloadDevice, Polarization, RadiationCalculator, Spectrum,
    SummationMode,
};
use crate::surface::{Surface, SurfaceMap};
use crate::trajectory::{integrate, Trajectory, TrajectorySettings};
use std::sync::Arc;
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::config::SimulationConfig;
use synrad_types::error::{SynRadError, SynRadResult};
use tracing::{info, warn};

/// A particle excluded from a beam run.
#[derive(Debug)]
pub struct ParticleFailure {
    pub index: usize,
    pub error: SynRadError,
}

/// Result of a run plus what was left out of it.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub particles_ok: usize,
    pub failures: Vec<ParticleFailure>,
    pub notices: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Particles per second carried by `beam`; beams without a current count
/// as one particle per second.
fn particle_rate(beam: &ParticleBeam) -> f64 {
    if beam.current_a > 0.0 {
        beam.particles_per_second()
    } else {
        1.0
    }
}

#[derive(Debug)]
pub struct Simulation {
    pub fields: FieldContainer,
    pub beams: BeamContainer,
    pub settings: TrajectorySettings,
    calculator: RadiationCalculator,
    summation: SummationMode,
    fail_fast: bool,
    seed: u64,
}

impl Simulation {
    pub fn new(
        fields: FieldContainer,
        beams: BeamContainer,
        settings: TrajectorySettings,
        calculator: RadiationCalculator,
    ) -> Self {
        Simulation {
            fields,
            beams,
            settings,
            calculator,
            summation: SummationMode::Incoherent,
            fail_fast: false,
            seed: 0,
        }
    }

    pub fn with_summation(mut self, summation: SummationMode) -> Self {
        self.summation = summation;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn from_config(cfg: &SimulationConfig) -> SynRadResult<Self> {
        Self::from_config_with_device(cfg, None)
    }

    /// Build from a config; a GPU backend uses `device`, or falls back to
    /// CPU threads with a notice when none is given.
    pub fn from_config_with_device(
        cfg: &SimulationConfig,
        device: Option<Arc<dyn OffloadDevice>>,
    ) -> SynRadResult<Self> {
        cfg.validate()?;
        let fields = FieldContainer::from_configs(&cfg.fields)?;
        let beams = BeamContainer::from_configs(&cfg.beams)?;
        let settings = TrajectorySettings::from_config(&cfg.trajectory)?;
        let rad = &cfg.radiation;

        let (backend, fallback) = match Backend::from_kind(rad.backend, rad.threads, device) {
            Some(backend) => (backend, None),
            None => (
                Backend::Threaded { threads: rad.threads },
                Some("GPU backend requested but no offload device is available; using CPU threads".to_string()),
            ),
        };
        let calculator = RadiationCalculator::new(backend)?
            .with_polarization(Polarization::from_config(&rad.polarization)?)
            .with_adaptive(rad.precision, rad.max_level)?;
        if let Some(message) = fallback {
            warn!("{message}");
            calculator.notice(message);
        }

        Ok(Simulation::new(fields, beams, settings, calculator)
            .with_summation(rad.summation.into())
            .with_fail_fast(rad.fail_fast)
            .with_seed(cfg.seed))
    }

    pub fn calculator(&self) -> &RadiationCalculator {
        &self.calculator
    }

    pub fn summation(&self) -> SummationMode {
        self.summation
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn notices(&self) -> Vec<String> {
        self.calculator.notices()
    }

    fn first_beam(&self) -> SynRadResult<&ParticleBeam> {
        self.beams
            .beams()
            .first()
            .ok_or_else(|| SynRadError::ConfigError("simulation has no beams".to_string()))
    }

    /// Trajectory of the first beam's nominal particle.
    pub fn ideal_trajectory(&self) -> SynRadResult<Trajectory> {
        let particle = self.first_beam()?.ideal_particle()?;
        integrate(&particle, &self.fields, &self.settings)
    }

    /// Particle `index` of a beam run, with the beam it came from.
    pub fn particle(&self, index: usize) -> SynRadResult<(usize, Particle)> {
        let mut rng = particle_rng(self.seed, index as u64);
        self.beams.sample_particle(&mut rng)
    }

    pub fn trajectory(&self, index: usize) -> SynRadResult<Trajectory> {
        let (_, particle) = self.particle(index)?;
        integrate(&particle, &self.fields, &self.settings)
    }

    fn outcome<T>(&self, value: T, particles_ok: usize, failures: Vec<ParticleFailure>) -> Outcome<T> {
        Outcome {
            value,
            particles_ok,
            failures,
            notices: self.calculator.notices(),
        }
    }

    /// Evaluate `eval` on `n` sampled particles. Successful results come back
    /// in index order with their particle rate.
    #[allow(clippy::type_complexity)]
    fn run_particles<T, F>(
        &self,
        quantity: &str,
        n: usize,
        eval: F,
    ) -> SynRadResult<(Vec<(f64, T)>, Vec<ParticleFailure>)>
    where
        T: Send,
        F: Fn(&Trajectory) -> SynRadResult<T> + Sync + Send,
    {
        let results = self.calculator.executor().map_all(n, |i| {
            let (beam, particle) = self.particle(i)?;
            let trajectory = integrate(&particle, &self.fields, &self.settings)?;
            Ok((particle_rate(&self.beams.beams()[beam]), eval(&trajectory)?))
        });

        let mut ok = Vec::with_capacity(n);
        let mut failures = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(value) => ok.push(value),
                Err(error) if self.fail_fast => return Err(SynRadError::for_particle(index, error)),
                Err(error) => {
                    warn!(particle = index, %error, "{quantity}: particle excluded from beam sum");
                    failures.push(ParticleFailure { index, error });
                }
            }
        }
        if ok.is_empty() {
            if let Some(first) = failures.into_iter().next() {
                return Err(SynRadError::for_particle(first.index, first.error));
            }
            return Err(SynRadError::ConfigError(format!(
                "{quantity}: nparticles must be >= 1"
            )));
        }
        info!(
            quantity,
            particles = n,
            ok = ok.len(),
            failed = failures.len(),
            "beam run complete"
        );
        Ok((ok, failures))
    }

    fn accumulate(&self, ok: &[(f64, Vec<Vector3C>)], len: usize) -> SynRadResult<Vec<f64>> {
        let mut acc = FieldAccumulator::new(self.summation, len);
        let n_ok = ok.len() as f64;
        for (rate, fields) in ok {
            acc.add(rate / n_ok, fields)?;
        }
        Ok(acc.intensities())
    }

    fn average(ok: &[(f64, Vec<f64>)], len: usize) -> Vec<f64> {
        let n_ok = ok.len() as f64;
        let mut sum = vec![0.0; len];
        for (rate, values) in ok {
            for (s, v) in sum.iter_mut().zip(values) {
                *s += rate / n_ok * v;
            }
        }
        sum
    }

    /// Flux density spectrum (photons/s/mm²/0.1%bw) at `point`.
    ///
    /// `nparticles = 0` uses the first beam's nominal particle.
    pub fn spectrum(&self, point: Vector3, energies_ev: &[f64], nparticles: usize) -> SynRadResult<Outcome<Spectrum>> {
        if nparticles == 0 {
            let rate = particle_rate(self.first_beam()?);
            let trajectory = self.ideal_trajectory()?;
            let spectrum = self.calculator.spectrum(&trajectory, point, energies_ev)?.scaled(rate);
            return Ok(self.outcome(spectrum, 1, Vec::new()));
        }
        let (ok, failures) = self.run_particles("spectrum", nparticles, |t| {
            self.calculator.spectrum_fields(t, point, energies_ev)
        })?;
        let factor = flux_per_field_sqr();
        let flux = self
            .accumulate(&ok, energies_ev.len())?
            .into_iter()
            .map(|v| v * factor)
            .collect();
        let spectrum = Spectrum::new(energies_ev.to_vec(), flux)?;
        Ok(self.outcome(spectrum, ok.len(), failures))
    }

    /// Flux density map (photons/s/mm²/0.1%bw) at one photon energy.
    pub fn flux_map(&self, surface: &Surface, energy_ev: f64, nparticles: usize) -> SynRadResult<Outcome<SurfaceMap>> {
        if nparticles == 0 {
            let rate = particle_rate(self.first_beam()?);
            let trajectory = self.ideal_trajectory()?;
            let map = self.calculator.flux_map(&trajectory, surface, energy_ev)?.scaled(rate);
            return Ok(self.outcome(map, 1, Vec::new()));
        }
        let (ok, failures) = self.run_particles("flux map", nparticles, |t| {
            self.calculator.flux_fields(t, surface, energy_ev)
        })?;
        let factor = flux_per_field_sqr();
        let values = self
            .accumulate(&ok, surface.len())?
            .into_iter()
            .map(|v| v * factor)
            .collect();
        let map = SurfaceMap::new(surface, values)?;
        Ok(self.outcome(map, ok.len(), failures))
    }

    /// Power density map (W/mm²).
    pub fn power_density_map(&self, surface: &Surface, nparticles: usize) -> SynRadResult<Outcome<SurfaceMap>> {
        if nparticles == 0 {
            let rate = particle_rate(self.first_beam()?);
            let trajectory = self.ideal_trajectory()?;
            let map = self.calculator.power_density_map(&trajectory, surface)?.scaled(rate);
            return Ok(self.outcome(map, 1, Vec::new()));
        }
        let (ok, failures) = self.run_particles("power density", nparticles, |t| {
            self.calculator.power_densities(t, surface)
        })?;
        let map = SurfaceMap::new(surface, Self::average(&ok, surface.len()))?.scaled(1e-6);
        Ok(self.outcome(map, ok.len(), failures))
    }

    /// Total radiated power (W).
    pub fn total_power(&self, nparticles: usize) -> SynRadResult<Outcome<f64>> {
        if nparticles == 0 {
            let rate = particle_rate(self.first_beam()?);
            let trajectory = self.ideal_trajectory()?;
            let power = self.calculator.total_power(&trajectory)? * rate;
            return Ok(self.outcome(power, 1, Vec::new()));
        }
        let (ok, failures) = self.run_particles("total power", nparticles, |t| {
            self.calculator.total_power(t).map(|p| vec![p])
        })?;
        let power = Self::average(&ok, 1)[0];
        Ok(self.outcome(power, ok.len(), failures))
    }
}
