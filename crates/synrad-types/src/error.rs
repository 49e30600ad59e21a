// ─────────────────────────────────────────────────────────────────────
// SynRad — Errors
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynRadError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Physics constraint violated: {0}")]
    PhysicsViolation(String),

    #[error("Superluminal particle at t={time_s:e} s: |beta| = {beta}")]
    Superluminal { time_s: f64, beta: f64 },

    #[error("Non-finite {quantity} at t={time_s:e} s")]
    NonFinite { quantity: String, time_s: f64 },

    #[error(
        "Radiation integral for {quantity} diverged at point ({}, {}, {}) m, omega={omega:e} rad/s: {message}",
        .point[0], .point[1], .point[2]
    )]
    QuadratureDiverged {
        quantity: String,
        point: [f64; 3],
        omega: f64,
        message: String,
    },

    #[error("Accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    #[error("Particle {index} failed: {source}")]
    ParticleFailed {
        index: usize,
        #[source]
        source: Box<SynRadError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),
}

impl SynRadError {
    /// Wrap an error raised while processing particle `index` of a beam run.
    pub fn for_particle(index: usize, source: SynRadError) -> Self {
        SynRadError::ParticleFailed {
            index,
            source: Box::new(source),
        }
    }

    /// True for errors that describe a broken trajectory or integral rather
    /// than a broken configuration.
    pub fn is_numerical(&self) -> bool {
        match self {
            SynRadError::Superluminal { .. }
            | SynRadError::NonFinite { .. }
            | SynRadError::QuadratureDiverged { .. } => true,
            SynRadError::ParticleFailed { source, .. } => source.is_numerical(),
            _ => false,
        }
    }
}

pub type SynRadResult<T> = Result<T, SynRadError>;
