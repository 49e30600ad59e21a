// ─────────────────────────────────────────────────────────────────────
// SynRad — Field Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! External electromagnetic field sources and their superposition.
//!
//! Every source evaluates to a [`FieldSample`] at a position and time and is
//! total: outside its validity region it contributes zero. Sources are placed
//! into a [`FieldContainer`] with a translation and Euler rotation.

mod container;
mod profile;

pub use container::{FieldContainer, FieldEntry, Placement};
pub use profile::{
    FieldFunction, FieldProfile, GaussianField, GridField, IdealUndulator, Quadrupole, UniformBox,
};

use std::ops::{Add, AddAssign};
use synrad_math::vector::Vector3;

/// Magnetic (T) and electric (V/m) field at one space-time point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldSample {
    pub b: Vector3,
    pub e: Vector3,
}

impl FieldSample {
    pub const ZERO: FieldSample = FieldSample {
        b: Vector3::ZERO,
        e: Vector3::ZERO,
    };

    pub fn magnetic(b: Vector3) -> Self {
        FieldSample { b, e: Vector3::ZERO }
    }

    pub fn electric(e: Vector3) -> Self {
        FieldSample { b: Vector3::ZERO, e }
    }

    pub fn is_finite(&self) -> bool {
        self.b.is_finite() && self.e.is_finite()
    }

    fn rotate_xyz(self, angles: [f64; 3]) -> Self {
        FieldSample {
            b: self.b.rotate_xyz(angles),
            e: self.e.rotate_xyz(angles),
        }
    }
}

impl Add for FieldSample {
    type Output = FieldSample;
    fn add(self, rhs: FieldSample) -> FieldSample {
        FieldSample {
            b: self.b + rhs.b,
            e: self.e + rhs.e,
        }
    }
}

impl AddAssign for FieldSample {
    fn add_assign(&mut self, rhs: FieldSample) {
        self.b += rhs.b;
        self.e += rhs.e;
    }
}

/// A field source: a profile interpreted as magnetic or electric, or a
/// nested group of placed sources.
#[derive(Debug, Clone)]
pub enum FieldSource {
    Magnetic(FieldProfile),
    Electric(FieldProfile),
    Composite(FieldContainer),
}

impl FieldSource {
    /// Field at `position` (m) and `time` (s) in the source's own frame.
    pub fn field_at(&self, position: Vector3, time: f64) -> FieldSample {
        match self {
            FieldSource::Magnetic(p) => FieldSample::magnetic(p.value_at(position, time)),
            FieldSource::Electric(p) => FieldSample::electric(p.value_at(position, time)),
            FieldSource::Composite(c) => c.field_at(position, time),
        }
    }

    /// Shortest length over which the source varies, if it has one.
    pub fn characteristic_length(&self) -> Option<f64> {
        match self {
            FieldSource::Magnetic(p) | FieldSource::Electric(p) => p.characteristic_length(),
            FieldSource::Composite(c) => c.characteristic_length(),
        }
    }
}
