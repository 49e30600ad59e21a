//! Mathematical primitives for SynRad.

pub mod fft;
pub mod interp;
pub mod ode;
pub mod quadrature;
pub mod vector;
