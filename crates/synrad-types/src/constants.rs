// ─────────────────────────────────────────────────────────────────────
// SynRad — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Physical constants (CODATA 2018, SI).

/// Speed of light in vacuum (m/s).
pub const C_LIGHT: f64 = 299_792_458.0;

/// Elementary charge (C).
pub const Q_ELEMENTARY: f64 = 1.602_176_634e-19;

/// Vacuum permittivity (F/m).
pub const EPSILON_0: f64 = 8.854_187_812_8e-12;

/// Vacuum permeability (H/m).
pub const MU_0: f64 = 1.256_637_062_12e-6;

/// Planck constant (J s).
pub const H_PLANCK: f64 = 6.626_070_15e-34;

/// Reduced Planck constant (J s).
pub const HBAR: f64 = 1.054_571_817e-34;

/// Electron rest mass (kg).
pub const M_ELECTRON: f64 = 9.109_383_701_5e-31;

/// Proton rest mass (kg).
pub const M_PROTON: f64 = 1.672_621_923_69e-27;

/// Muon rest mass (kg).
pub const M_MUON: f64 = 1.883_531_627e-28;

/// Joules per electron-volt.
pub const EV_TO_J: f64 = Q_ELEMENTARY;

/// Joules per GeV.
pub const GEV_TO_J: f64 = 1.0e9 * Q_ELEMENTARY;

/// Coulomb prefactor 1/(4π ε0) (m/F).
pub const COULOMB_K: f64 = 1.0 / (4.0 * std::f64::consts::PI * EPSILON_0);

/// Convert a photon energy in eV to angular frequency in rad/s.
pub fn ev_to_omega(energy_ev: f64) -> f64 {
    energy_ev * EV_TO_J / HBAR
}

/// Convert an angular frequency in rad/s to photon energy in eV.
pub fn omega_to_ev(omega: f64) -> f64 {
    omega * HBAR / EV_TO_J
}
