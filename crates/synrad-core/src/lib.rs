//! Relativistic particle trajectories and their synchrotron radiation.
//!
//! Fields and beams feed the trajectory integrator; the radiation calculator
//! evaluates retarded-field integrals over the sampled trajectories.

pub mod beam;
pub mod export;
pub mod field;
pub mod particle;
pub mod radiation;
pub mod simulation;
pub mod surface;
pub mod trajectory;
