// ─────────────────────────────────────────────────────────────────────
// SynRad — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{SynRadError, SynRadResult};
use serde::{Deserialize, Serialize};

/// Top-level simulation configuration.
///
/// Structured descriptors only: field-map files are converted by the caller
/// before they reach this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub beams: Vec<BeamConfig>,
    pub trajectory: TrajectoryConfig,
    #[serde(default)]
    pub radiation: RadiationConfig,
    /// Seed for all beam realizations (default: 0)
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Magnetic,
    Electric,
}

/// One placed field source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Ignored for composite sources, whose children carry their own kind.
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub name: String,
    pub source: FieldSourceConfig,
    /// Euler angles in radians, applied X then Y then Z.
    #[serde(default)]
    pub rotations: [f64; 3],
    #[serde(default)]
    pub translation: [f64; 3],
}

/// Field source shapes. Field vectors are in T (magnetic) or V/m (electric).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSourceConfig {
    /// Zero width on an axis leaves that axis unbounded.
    Uniform {
        field: [f64; 3],
        #[serde(default)]
        width: [f64; 3],
    },
    Gaussian {
        field: [f64; 3],
        sigma: [f64; 3],
    },
    /// `period` carries both the undulator axis and the period length.
    Undulator {
        field: [f64; 3],
        period: [f64; 3],
        nperiods: usize,
        #[serde(default)]
        phase: f64,
        #[serde(default)]
        taper: f64,
    },
    Quadrupole {
        gradient_t_m: f64,
        length_m: f64,
    },
    /// Samples ordered with z fastest, see `RegularGrid3D`.
    Grid {
        origin: [f64; 3],
        spacing: [f64; 3],
        shape: [usize; 3],
        values: Vec<[f64; 3]>,
    },
    Composite {
        fields: Vec<FieldConfig>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    #[default]
    Electron,
    Positron,
    Proton,
    Antiproton,
    Muon,
    Antimuon,
    Custom {
        mass_kg: f64,
        charge_c: f64,
    },
}

/// Beam descriptor. A `predefined` lattice supplies defaults for every
/// optional field left unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamConfig {
    #[serde(default = "default_beam_name")]
    pub name: String,
    #[serde(default)]
    pub particle: ParticleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_gev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigma_energy_gev: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_a: Option<f64>,
    /// Twiss beta (horizontal, vertical) in m
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<[f64; 2]>,
    /// Emittance (horizontal, vertical) in m·rad
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emittance: Option<[f64; 2]>,
    #[serde(default)]
    pub x0: [f64; 3],
    #[serde(default = "default_direction")]
    pub direction: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_direction: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice_reference: Option<[f64; 3]>,
    #[serde(default)]
    pub t0_s: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_beam_name() -> String {
    "beam".to_string()
}
fn default_direction() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}
fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepperKind {
    #[default]
    Boris,
    Rk4,
}

/// Trajectory window in units of c·t.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    pub ct_start_m: f64,
    pub ct_stop_m: f64,
    /// When absent, chosen from the shortest field length scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npoints: Option<usize>,
    #[serde(default)]
    pub stepper: StepperKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sequential,
    #[default]
    Threaded,
    Gpu,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummationKind {
    #[default]
    Incoherent,
    Coherent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolarizationConfig {
    #[default]
    All,
    LinearHorizontal,
    LinearVertical,
    CircularLeft,
    CircularRight,
    /// Complex projection vector given as real and imaginary parts.
    Custom { re: [f64; 3], im: [f64; 3] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiationConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Worker threads for the threaded backend (default: rayon global pool size)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default)]
    pub summation: SummationKind,
    #[serde(default)]
    pub polarization: PolarizationConfig,
    /// Abort a beam run on the first particle failure (default: false)
    #[serde(default)]
    pub fail_fast: bool,
    /// Relative tolerance for adaptive trajectory refinement (default: 0.01)
    #[serde(default = "default_precision")]
    pub precision: f64,
    /// Maximum number of trajectory doublings; 0 disables refinement (default: 0)
    #[serde(default)]
    pub max_level: u32,
}

fn default_precision() -> f64 {
    0.01
}

impl Default for RadiationConfig {
    fn default() -> Self {
        RadiationConfig {
            backend: BackendKind::default(),
            threads: None,
            summation: SummationKind::default(),
            polarization: PolarizationConfig::default(),
            fail_fast: false,
            precision: default_precision(),
            max_level: 0,
        }
    }
}

impl SimulationConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> SynRadResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> SynRadResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> SynRadResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not need the physics layer. Field and beam parameters
    /// are validated when the core builds sources from them.
    pub fn validate(&self) -> SynRadResult<()> {
        let t = &self.trajectory;
        if !t.ct_start_m.is_finite() || !t.ct_stop_m.is_finite() {
            return Err(SynRadError::ConfigError(
                "trajectory window bounds must be finite".to_string(),
            ));
        }
        if t.ct_stop_m <= t.ct_start_m {
            return Err(SynRadError::ConfigError(format!(
                "trajectory window is empty or reversed: ct_start_m={}, ct_stop_m={}",
                t.ct_start_m, t.ct_stop_m
            )));
        }
        if let Some(n) = t.npoints {
            if n < 2 {
                return Err(SynRadError::ConfigError(format!(
                    "trajectory npoints must be >= 2, got {n}"
                )));
            }
        }
        let r = &self.radiation;
        if !r.precision.is_finite() || r.precision <= 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "radiation precision must be finite and > 0, got {}",
                r.precision
            )));
        }
        if r.threads == Some(0) {
            return Err(SynRadError::ConfigError(
                "radiation threads must be > 0".to_string(),
            ));
        }
        for beam in &self.beams {
            if !beam.weight.is_finite() || beam.weight < 0.0 {
                return Err(SynRadError::ConfigError(format!(
                    "beam '{}' weight must be finite and >= 0, got {}",
                    beam.name, beam.weight
                )));
            }
        }
        Ok(())
    }
}
