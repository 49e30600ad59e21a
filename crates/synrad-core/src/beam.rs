// ─────────────────────────────────────────────────────────────────────
// SynRad — Beams
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Particle beams: Twiss-parameterized phase-space sampling, presets and
//! weighted beam containers.
//!
//! Every random draw comes from an explicitly passed RNG. [`particle_rng`]
//! derives an independent stream per particle index so parallel and
//! sequential runs draw identical particles.

use crate::particle::{gamma_from_energy, Particle, Species};
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use synrad_math::vector::{Vector2, Vector3};
use synrad_types::config::BeamConfig;
use synrad_types::error::{SynRadError, SynRadResult};

/// Twiss optics and energy spread of a beam.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeamDistribution {
    /// Twiss β (horizontal, vertical) in m.
    pub beta: Vector2,
    pub alpha: Vector2,
    /// Emittance (horizontal, vertical) in m·rad.
    pub emittance: Vector2,
    /// RMS energy spread in GeV.
    pub sigma_energy_gev: f64,
}

impl BeamDistribution {
    /// Sample `(offset, angle)` in one plane. Planes without β or ε are ideal.
    fn sample_plane<R: Rng>(beta: f64, alpha: f64, emittance: f64, rng: &mut R) -> (f64, f64) {
        if beta <= 0.0 || emittance <= 0.0 {
            return (0.0, 0.0);
        }
        let z1: f64 = rng.sample(StandardNormal);
        let z2: f64 = rng.sample(StandardNormal);
        // cov = ε [[β, −α], [−α, γ]]
        let offset = (emittance * beta).sqrt() * z1;
        let angle = (emittance / beta).sqrt() * (z2 - alpha * z1);
        (offset, angle)
    }
}

/// Named lattice presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamPreset {
    Nsls2,
    Nsls2ShortStraight,
    Nsls2LongStraight,
}

impl BeamPreset {
    pub fn from_name(name: &str) -> SynRadResult<Self> {
        match name {
            "NSLSII" => Ok(BeamPreset::Nsls2),
            "NSLSII-ShortStraight" => Ok(BeamPreset::Nsls2ShortStraight),
            "NSLSII-LongStraight" => Ok(BeamPreset::Nsls2LongStraight),
            other => Err(SynRadError::ConfigError(format!(
                "unknown predefined beam '{other}'"
            ))),
        }
    }

    pub fn energy_gev(self) -> f64 {
        3.0
    }

    pub fn current_a(self) -> f64 {
        0.5
    }

    pub fn distribution(self) -> BeamDistribution {
        let beta = match self {
            BeamPreset::Nsls2 => Vector2::new(0.0, 0.0),
            BeamPreset::Nsls2ShortStraight => Vector2::new(1.84, 1.17),
            BeamPreset::Nsls2LongStraight => Vector2::new(20.85, 3.4),
        };
        BeamDistribution {
            beta,
            alpha: Vector2::new(0.0, 0.0),
            emittance: Vector2::new(0.55e-9, 0.008e-9),
            sigma_energy_gev: 0.00089 * 3.0,
        }
    }
}

/// A particle beam: species, energy, current, optics and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBeam {
    pub name: String,
    pub species: Species,
    pub energy_gev: f64,
    pub current_a: f64,
    pub distribution: BeamDistribution,
    pub x0: Vector3,
    direction: Vector3,
    horizontal: Vector3,
    pub lattice_reference: Vector3,
    pub t0_s: f64,
    pub weight: f64,
}

fn default_horizontal(direction: Vector3) -> Vector3 {
    let h = Vector3::Y.cross(direction);
    if h.norm() > 1e-12 {
        h.unit()
    } else {
        Vector3::Z.cross(direction).unit()
    }
}

impl ParticleBeam {
    pub fn new(
        name: impl Into<String>,
        species: Species,
        energy_gev: f64,
        current_a: f64,
        x0: Vector3,
        direction: Vector3,
    ) -> SynRadResult<Self> {
        let name = name.into();
        gamma_from_energy(&species, energy_gev)?;
        if !current_a.is_finite() || current_a < 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{name}' current_a must be finite and >= 0, got {current_a}"
            )));
        }
        if !x0.is_finite() {
            return Err(SynRadError::ConfigError(format!(
                "beam '{name}' x0 components must be finite"
            )));
        }
        if !direction.is_finite() || direction.norm() == 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{name}' direction must be finite and non-zero"
            )));
        }
        let direction = direction.unit();
        Ok(ParticleBeam {
            name,
            species,
            energy_gev,
            current_a,
            distribution: BeamDistribution::default(),
            x0,
            direction,
            horizontal: default_horizontal(direction),
            lattice_reference: x0,
            t0_s: 0.0,
            weight: 1.0,
        })
    }

    pub fn with_twiss(mut self, beta: Vector2, alpha: Vector2, emittance: Vector2) -> SynRadResult<Self> {
        let finite = [beta, alpha, emittance]
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite());
        if !finite || beta.x < 0.0 || beta.y < 0.0 || emittance.x < 0.0 || emittance.y < 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' Twiss beta and emittance must be finite and >= 0",
                self.name
            )));
        }
        self.distribution.beta = beta;
        self.distribution.alpha = alpha;
        self.distribution.emittance = emittance;
        Ok(self)
    }

    pub fn with_energy_spread(mut self, sigma_energy_gev: f64) -> SynRadResult<Self> {
        if !sigma_energy_gev.is_finite() || sigma_energy_gev < 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' sigma_energy_gev must be finite and >= 0, got {sigma_energy_gev}",
                self.name
            )));
        }
        self.distribution.sigma_energy_gev = sigma_energy_gev;
        Ok(self)
    }

    /// Horizontal axis; projected perpendicular to the beam direction.
    pub fn with_horizontal_direction(mut self, horizontal: Vector3) -> SynRadResult<Self> {
        let h = horizontal - self.direction * horizontal.dot(self.direction);
        if !h.is_finite() || h.norm() < 1e-12 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' horizontal_direction must not be parallel to direction",
                self.name
            )));
        }
        self.horizontal = h.unit();
        Ok(self)
    }

    /// Point where the Twiss parameters are specified.
    pub fn with_lattice_reference(mut self, reference: Vector3) -> SynRadResult<Self> {
        if !reference.is_finite() {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' lattice_reference components must be finite",
                self.name
            )));
        }
        self.lattice_reference = reference;
        Ok(self)
    }

    pub fn with_t0(mut self, t0_s: f64) -> SynRadResult<Self> {
        if !t0_s.is_finite() {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' t0_s must be finite",
                self.name
            )));
        }
        self.t0_s = t0_s;
        Ok(self)
    }

    pub fn with_weight(mut self, weight: f64) -> SynRadResult<Self> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "beam '{}' weight must be finite and >= 0, got {weight}",
                self.name
            )));
        }
        self.weight = weight;
        Ok(self)
    }

    /// Build from a descriptor; a `predefined` preset supplies unset values.
    pub fn from_config(cfg: &BeamConfig) -> SynRadResult<Self> {
        let preset = cfg
            .predefined
            .as_deref()
            .map(BeamPreset::from_name)
            .transpose()?;
        let base = preset.map(BeamPreset::distribution).unwrap_or_default();
        let energy = cfg
            .energy_gev
            .or(preset.map(BeamPreset::energy_gev))
            .ok_or_else(|| {
                SynRadError::ConfigError(format!(
                    "beam '{}' requires energy_gev or a predefined lattice",
                    cfg.name
                ))
            })?;
        let current = cfg
            .current_a
            .or(preset.map(BeamPreset::current_a))
            .unwrap_or(0.0);
        let species = Species::from_config(&cfg.particle)?;

        let mut beam = ParticleBeam::new(
            cfg.name.clone(),
            species,
            energy,
            current,
            cfg.x0.into(),
            cfg.direction.into(),
        )?
        .with_twiss(
            cfg.beta.map(Vector2::from).unwrap_or(base.beta),
            cfg.alpha.map(Vector2::from).unwrap_or(base.alpha),
            cfg.emittance.map(Vector2::from).unwrap_or(base.emittance),
        )?
        .with_energy_spread(cfg.sigma_energy_gev.unwrap_or(base.sigma_energy_gev))?
        .with_t0(cfg.t0_s)?
        .with_weight(cfg.weight)?;
        if let Some(h) = cfg.horizontal_direction {
            beam = beam.with_horizontal_direction(h.into())?;
        }
        if let Some(r) = cfg.lattice_reference {
            beam = beam.with_lattice_reference(r.into())?;
        }
        Ok(beam)
    }

    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    pub fn horizontal_direction(&self) -> Vector3 {
        self.horizontal
    }

    /// `direction × horizontal`.
    pub fn vertical_direction(&self) -> Vector3 {
        self.direction.cross(self.horizontal)
    }

    /// Beam particles per second, `I/|q|`.
    pub fn particles_per_second(&self) -> f64 {
        self.current_a / self.species.charge_c.abs()
    }

    /// The on-axis particle at nominal energy.
    pub fn ideal_particle(&self) -> SynRadResult<Particle> {
        Particle::from_energy(self.species, self.energy_gev, self.x0, self.direction, self.t0_s)
    }

    /// Draw one particle from the beam distribution.
    ///
    /// The phase-space point is drawn at the lattice reference and drifted
    /// back along the particle's own direction to the plane through `x0`.
    pub fn sample_particle<R: Rng>(&self, rng: &mut R) -> SynRadResult<Particle> {
        let d = &self.distribution;
        let (xh, xph) = BeamDistribution::sample_plane(d.beta.x, d.alpha.x, d.emittance.x, rng);
        let (xv, xpv) = BeamDistribution::sample_plane(d.beta.y, d.alpha.y, d.emittance.y, rng);
        let energy = if d.sigma_energy_gev > 0.0 {
            let z: f64 = rng.sample(StandardNormal);
            self.energy_gev + d.sigma_energy_gev * z
        } else {
            self.energy_gev
        };

        let h = self.horizontal;
        let v = self.vertical_direction();
        let at_reference = self.lattice_reference + h * xh + v * xv;
        let direction = (self.direction + h * xph + v * xpv).unit();
        let drift = (self.lattice_reference - self.x0).dot(self.direction);
        let start = at_reference - direction * (drift / direction.dot(self.direction));

        Particle::from_energy(self.species, energy, start, direction, self.t0_s)
    }
}

/// Named beams with independent weights.
#[derive(Debug, Clone, Default)]
pub struct BeamContainer {
    beams: Vec<ParticleBeam>,
}

impl BeamContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, beam: ParticleBeam) -> &mut Self {
        self.beams.push(beam);
        self
    }

    pub fn beams(&self) -> &[ParticleBeam] {
        &self.beams
    }

    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    pub fn clear(&mut self) {
        self.beams.clear();
    }

    pub fn get(&self, name: &str) -> Option<&ParticleBeam> {
        self.beams.iter().find(|b| b.name == name)
    }

    pub fn from_configs(configs: &[BeamConfig]) -> SynRadResult<Self> {
        let mut container = BeamContainer::new();
        for cfg in configs {
            container.add(ParticleBeam::from_config(cfg)?);
        }
        Ok(container)
    }

    /// Pick a beam by weight, then draw a particle from it.
    pub fn sample_particle<R: Rng>(&self, rng: &mut R) -> SynRadResult<(usize, Particle)> {
        let index = match self.beams.len() {
            0 => {
                return Err(SynRadError::ConfigError(
                    "no beams defined".to_string(),
                ))
            }
            1 => 0,
            _ => {
                let weights = WeightedIndex::new(self.beams.iter().map(|b| b.weight))
                    .map_err(|e| SynRadError::ConfigError(format!("beam weights: {e}")))?;
                weights.sample(rng)
            }
        };
        Ok((index, self.beams[index].sample_particle(rng)?))
    }
}

/// Independent, reproducible RNG stream for particle `index`.
pub fn particle_rng(seed: u64, index: u64) -> StdRng {
    // splitmix64 finalizer over the combined key
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    StdRng::seed_from_u64(z)
}
