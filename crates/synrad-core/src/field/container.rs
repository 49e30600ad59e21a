//! Ordered superposition of placed field sources.

use super::profile::{
    FieldProfile, GaussianField, GridField, IdealUndulator, Quadrupole, UniformBox,
};
use super::{FieldSample, FieldSource};
use synrad_math::vector::Vector3;
use synrad_types::config::{FieldConfig, FieldKind, FieldSourceConfig};
use synrad_types::error::{SynRadError, SynRadResult};
use synrad_types::grid::RegularGrid3D;

/// Rigid placement of a source: rotate (X, then Y, then Z), then translate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub translation: Vector3,
    pub rotations: [f64; 3],
}

impl Placement {
    pub fn new(translation: Vector3, rotations: [f64; 3]) -> SynRadResult<Self> {
        if !translation.is_finite() || rotations.iter().any(|r| !r.is_finite()) {
            return Err(SynRadError::ConfigError(
                "placement translation and rotations must be finite".to_string(),
            ));
        }
        Ok(Placement {
            translation,
            rotations,
        })
    }

    pub fn translated(translation: Vector3) -> Self {
        Placement {
            translation,
            rotations: [0.0; 3],
        }
    }

    fn is_rotated(&self) -> bool {
        self.rotations.iter().any(|&r| r != 0.0)
    }

    /// Global position to the source frame.
    pub fn to_local(&self, position: Vector3) -> Vector3 {
        let shifted = position - self.translation;
        if self.is_rotated() {
            shifted.rotate_xyz_inverse(self.rotations)
        } else {
            shifted
        }
    }

    fn sample_to_global(&self, sample: FieldSample) -> FieldSample {
        if self.is_rotated() {
            sample.rotate_xyz(self.rotations)
        } else {
            sample
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub source: FieldSource,
    pub placement: Placement,
}

/// Owns an ordered list of placed sources; evaluation sums all of them.
#[derive(Debug, Clone, Default)]
pub struct FieldContainer {
    entries: Vec<FieldEntry>,
}

impl FieldContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, source: FieldSource) -> &mut Self {
        self.add_placed(name, source, Placement::default())
    }

    pub fn add_placed(
        &mut self,
        name: impl Into<String>,
        source: FieldSource,
        placement: Placement,
    ) -> &mut Self {
        self.entries.push(FieldEntry {
            name: name.into(),
            source,
            placement,
        });
        self
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry named `name`; returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        before - self.entries.len()
    }

    /// Superposed field at a global position and time.
    pub fn field_at(&self, position: Vector3, time: f64) -> FieldSample {
        let mut total = FieldSample::ZERO;
        for entry in &self.entries {
            let local = entry.placement.to_local(position);
            total += entry
                .placement
                .sample_to_global(entry.source.field_at(local, time));
        }
        total
    }

    pub fn b_at(&self, position: Vector3, time: f64) -> Vector3 {
        self.field_at(position, time).b
    }

    pub fn e_at(&self, position: Vector3, time: f64) -> Vector3 {
        self.field_at(position, time).e
    }

    /// Smallest characteristic length over all sources.
    pub fn characteristic_length(&self) -> Option<f64> {
        self.entries
            .iter()
            .filter_map(|e| e.source.characteristic_length())
            .reduce(f64::min)
    }

    /// Field sampled at `npoints` evenly spaced positions from `start` to `stop`.
    pub fn sample_line(
        &self,
        start: Vector3,
        stop: Vector3,
        npoints: usize,
        time: f64,
    ) -> SynRadResult<Vec<(Vector3, FieldSample)>> {
        if npoints < 2 {
            return Err(SynRadError::ConfigError(format!(
                "field line sampling requires npoints >= 2, got {npoints}"
            )));
        }
        let step = (stop - start) / (npoints - 1) as f64;
        Ok((0..npoints)
            .map(|i| {
                let p = start + step * i as f64;
                (p, self.field_at(p, time))
            })
            .collect())
    }

    /// Build a container from structured descriptors.
    pub fn from_configs(configs: &[FieldConfig]) -> SynRadResult<Self> {
        let mut container = FieldContainer::new();
        for (i, cfg) in configs.iter().enumerate() {
            let name = if cfg.name.is_empty() {
                format!("field_{i}")
            } else {
                cfg.name.clone()
            };
            let source = source_from_config(cfg).map_err(|e| match e {
                SynRadError::ConfigError(msg) => {
                    SynRadError::ConfigError(format!("field '{name}': {msg}"))
                }
                other => other,
            })?;
            let placement = Placement::new(cfg.translation.into(), cfg.rotations)?;
            container.add_placed(name, source, placement);
        }
        Ok(container)
    }
}

fn source_from_config(cfg: &FieldConfig) -> SynRadResult<FieldSource> {
    let profile = match &cfg.source {
        FieldSourceConfig::Composite { fields } => {
            return Ok(FieldSource::Composite(FieldContainer::from_configs(fields)?));
        }
        FieldSourceConfig::Uniform { field, width } => {
            FieldProfile::UniformBox(UniformBox::new((*field).into(), (*width).into())?)
        }
        FieldSourceConfig::Gaussian { field, sigma } => {
            FieldProfile::Gaussian(GaussianField::new((*field).into(), (*sigma).into())?)
        }
        FieldSourceConfig::Undulator {
            field,
            period,
            nperiods,
            phase,
            taper,
        } => FieldProfile::IdealUndulator(IdealUndulator::new(
            (*field).into(),
            (*period).into(),
            *nperiods,
            *phase,
            *taper,
        )?),
        FieldSourceConfig::Quadrupole {
            gradient_t_m,
            length_m,
        } => FieldProfile::Quadrupole(Quadrupole::new(*gradient_t_m, *length_m)?),
        FieldSourceConfig::Grid {
            origin,
            spacing,
            shape,
            values,
        } => {
            let grid = RegularGrid3D::new(*shape, *origin, *spacing)?;
            FieldProfile::Grid(GridField::from_vectors(grid, values)?)
        }
    };
    Ok(match cfg.kind {
        FieldKind::Magnetic => FieldSource::Magnetic(profile),
        FieldKind::Electric => FieldSource::Electric(profile),
    })
}
