use synrad_math::vector::Vector3C;
use synrad_types::config::SummationKind;
use synrad_types::error::{SynRadError, SynRadResult};

/// How per-particle fields combine into an intensity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummationMode {
    /// `Σ w |E|²`
    #[default]
    Incoherent,
    /// `|Σ √w E|²`
    Coherent,
}

impl From<SummationKind> for SummationMode {
    fn from(kind: SummationKind) -> Self {
        match kind {
            SummationKind::Incoherent => SummationMode::Incoherent,
            SummationKind::Coherent => SummationMode::Coherent,
        }
    }
}

/// Running sum of (projected) fields over particles, one slot per
/// energy or surface point.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccumulator {
    mode: SummationMode,
    intensity: Vec<f64>,
    field: Vec<Vector3C>,
    count: usize,
}

impl FieldAccumulator {
    pub fn new(mode: SummationMode, len: usize) -> Self {
        let (intensity, field) = match mode {
            SummationMode::Incoherent => (vec![0.0; len], Vec::new()),
            SummationMode::Coherent => (Vec::new(), vec![Vector3C::ZERO; len]),
        };
        FieldAccumulator {
            mode,
            intensity,
            field,
            count: 0,
        }
    }

    pub fn mode(&self) -> SummationMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        match self.mode {
            SummationMode::Incoherent => self.intensity.len(),
            SummationMode::Coherent => self.field.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Particles added so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, weight: f64, fields: &[Vector3C]) -> SynRadResult<()> {
        if fields.len() != self.len() {
            return Err(SynRadError::ConfigError(format!(
                "accumulator holds {} slots, got {} fields",
                self.len(),
                fields.len()
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "accumulator weight must be finite and >= 0, got {weight}"
            )));
        }
        match self.mode {
            SummationMode::Incoherent => {
                for (acc, e) in self.intensity.iter_mut().zip(fields) {
                    *acc += weight * e.norm_sqr();
                }
            }
            SummationMode::Coherent => {
                let amplitude = weight.sqrt();
                for (acc, e) in self.field.iter_mut().zip(fields) {
                    *acc += *e * amplitude;
                }
            }
        }
        self.count += 1;
        Ok(())
    }

    /// `|E|²`-like intensity per slot.
    pub fn intensities(&self) -> Vec<f64> {
        match self.mode {
            SummationMode::Incoherent => self.intensity.clone(),
            SummationMode::Coherent => self.field.iter().map(|e| e.norm_sqr()).collect(),
        }
    }
}
