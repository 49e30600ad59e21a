//! Charged-particle species and initial state for a trajectory run.

use synrad_math::vector::{Vector3, Vector4};
use synrad_types::config::ParticleKind;
use synrad_types::constants::{C_LIGHT, GEV_TO_J, M_ELECTRON, M_MUON, M_PROTON, Q_ELEMENTARY};
use synrad_types::error::{SynRadError, SynRadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleType {
    Electron,
    Positron,
    Proton,
    Antiproton,
    Muon,
    Antimuon,
    Custom,
}

/// Charge (C) and rest mass (kg) of a particle species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
    pub kind: ParticleType,
    pub charge_c: f64,
    pub mass_kg: f64,
}

impl Species {
    pub fn new(kind: ParticleType) -> SynRadResult<Self> {
        let (charge_c, mass_kg) = match kind {
            ParticleType::Electron => (-Q_ELEMENTARY, M_ELECTRON),
            ParticleType::Positron => (Q_ELEMENTARY, M_ELECTRON),
            ParticleType::Proton => (Q_ELEMENTARY, M_PROTON),
            ParticleType::Antiproton => (-Q_ELEMENTARY, M_PROTON),
            ParticleType::Muon => (-Q_ELEMENTARY, M_MUON),
            ParticleType::Antimuon => (Q_ELEMENTARY, M_MUON),
            ParticleType::Custom => {
                return Err(SynRadError::ConfigError(
                    "custom particle requires explicit charge and mass".to_string(),
                ))
            }
        };
        Ok(Species {
            kind,
            charge_c,
            mass_kg,
        })
    }

    pub fn custom(charge_c: f64, mass_kg: f64) -> SynRadResult<Self> {
        let species = Species {
            kind: ParticleType::Custom,
            charge_c,
            mass_kg,
        };
        species.validate("particle")?;
        Ok(species)
    }

    pub fn from_config(kind: &ParticleKind) -> SynRadResult<Self> {
        match *kind {
            ParticleKind::Electron => Self::new(ParticleType::Electron),
            ParticleKind::Positron => Self::new(ParticleType::Positron),
            ParticleKind::Proton => Self::new(ParticleType::Proton),
            ParticleKind::Antiproton => Self::new(ParticleType::Antiproton),
            ParticleKind::Muon => Self::new(ParticleType::Muon),
            ParticleKind::Antimuon => Self::new(ParticleType::Antimuon),
            ParticleKind::Custom { mass_kg, charge_c } => Self::custom(charge_c, mass_kg),
        }
    }

    /// Rest energy `m c²` in J.
    pub fn rest_energy_j(&self) -> f64 {
        self.mass_kg * C_LIGHT * C_LIGHT
    }

    fn validate(&self, label: &str) -> SynRadResult<()> {
        if !self.mass_kg.is_finite() || self.mass_kg <= 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "{label}.mass_kg must be finite and > 0, got {}",
                self.mass_kg
            )));
        }
        if !self.charge_c.is_finite() || self.charge_c == 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "{label}.charge_c must be finite and non-zero, got {}",
                self.charge_c
            )));
        }
        Ok(())
    }
}

/// Initial state of one particle. Immutable for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub species: Species,
    pub x0: Vector3,
    /// Initial velocity in units of c.
    pub beta0: Vector3,
    pub t0_s: f64,
}

impl Particle {
    pub fn new(species: Species, x0: Vector3, beta0: Vector3, t0_s: f64) -> SynRadResult<Self> {
        let particle = Particle {
            species,
            x0,
            beta0,
            t0_s,
        };
        particle.validate()?;
        Ok(particle)
    }

    /// Particle with total energy `energy_gev` moving along `direction`.
    pub fn from_energy(
        species: Species,
        energy_gev: f64,
        x0: Vector3,
        direction: Vector3,
        t0_s: f64,
    ) -> SynRadResult<Self> {
        let gamma = gamma_from_energy(&species, energy_gev)?;
        if !direction.is_finite() || direction.norm() == 0.0 {
            return Err(SynRadError::ConfigError(
                "particle direction must be finite and non-zero".to_string(),
            ));
        }
        let beta = beta_from_gamma(gamma);
        Self::new(species, x0, direction.unit() * beta, t0_s)
    }

    pub fn validate(&self) -> SynRadResult<()> {
        self.species.validate("particle")?;
        if !self.x0.is_finite() {
            return Err(SynRadError::ConfigError(
                "particle.x0 components must be finite".to_string(),
            ));
        }
        if !self.beta0.is_finite() {
            return Err(SynRadError::ConfigError(
                "particle.beta0 components must be finite".to_string(),
            ));
        }
        let beta = self.beta0.norm();
        if beta >= 1.0 {
            return Err(SynRadError::ConfigError(format!(
                "particle |beta0| must be < 1, got {beta}"
            )));
        }
        if !self.t0_s.is_finite() {
            return Err(SynRadError::ConfigError(
                "particle.t0_s must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn charge_c(&self) -> f64 {
        self.species.charge_c
    }

    pub fn mass_kg(&self) -> f64 {
        self.species.mass_kg
    }

    pub fn gamma(&self) -> f64 {
        let b = self.beta0.norm();
        1.0 / ((1.0 - b) * (1.0 + b)).sqrt()
    }

    /// Total energy in GeV.
    pub fn energy_gev(&self) -> f64 {
        self.gamma() * self.species.rest_energy_j() / GEV_TO_J
    }

    /// Dimensionless four-velocity `γ(1, β)`.
    pub fn four_velocity(&self) -> Vector4 {
        Vector4::four_velocity(self.beta0)
    }
}

/// Lorentz factor for total energy `energy_gev`; rejects `E ≤ m c²`.
pub fn gamma_from_energy(species: &Species, energy_gev: f64) -> SynRadResult<f64> {
    let rest = species.rest_energy_j();
    let energy_j = energy_gev * GEV_TO_J;
    if !energy_j.is_finite() || energy_j <= rest {
        return Err(SynRadError::ConfigError(format!(
            "particle energy must exceed its rest energy {:.6e} GeV, got {energy_gev} GeV",
            rest / GEV_TO_J
        )));
    }
    Ok(energy_j / rest)
}

/// `|β| = √(1 − 1/γ²)`, evaluated without cancellation.
pub fn beta_from_gamma(gamma: f64) -> f64 {
    let inv = 1.0 / gamma;
    ((1.0 - inv) * (1.0 + inv)).sqrt()
}
