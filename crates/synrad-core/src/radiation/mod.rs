// ─────────────────────────────────────────────────────────────────────
// SynRad — Radiation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Retarded-field radiation from sampled trajectories.
//!
//! [`kernel`] holds the per-point integrals, [`backend`] decides where they
//! run, and [`RadiationCalculator`] turns them into spectra, flux maps and
//! power densities.

pub mod backend;
mod accumulator;
mod calculator;
pub mod kernel;
mod polarization;
mod spectrum;

pub use accumulator::{FieldAccumulator, SummationMode};
pub use backend::{Backend, OffloadDevice};
pub use calculator::RadiationCalculator;
pub use kernel::{FlatTrajectory, TimeDomainField};
pub use polarization::Polarization;
pub use spectrum::{energy_range, fft_spectrum, flux_per_field_sqr, Spectrum};
