//! Execution strategies for the per-point radiation integrals.

use super::kernel::{self, FlatTrajectory};
use crate::surface::SurfacePoint;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::config::BackendKind;
use synrad_types::error::{SynRadError, SynRadResult};

/// Values per packed observation point: position(3), normal(3),
/// has-normal flag, initial phase `ω τ_0 mod 2π`.
pub const POINT_STRIDE: usize = 8;
/// Values per returned field: Re/Im of x, y, z.
pub const FIELD_STRIDE: usize = 6;

/// Device evaluating the per-point integrals in bulk.
///
/// Implementations may compute in reduced precision; results are expected
/// to agree with [`kernel`] to about 1e-2 relative.
pub trait OffloadDevice: Send + Sync {
    fn name(&self) -> String;

    /// `E(ω)` for each packed point, [`FIELD_STRIDE`] values per point.
    fn electric_fields(&self, trajectory: &FlatTrajectory, points: &[f64], omega: f64) -> SynRadResult<Vec<f64>>;

    /// Energy per area (J/m²) per passage, one value per packed point.
    fn power_densities(&self, trajectory: &FlatTrajectory, points: &[f64]) -> SynRadResult<Vec<f64>>;
}

pub fn pack_points(trajectory: &FlatTrajectory, points: &[SurfacePoint], omega: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len() * POINT_STRIDE);
    for p in points {
        let (normal, flag) = match p.normal {
            Some(n) => (n, 1.0),
            None => (Vector3::ZERO, 0.0),
        };
        let phase0 = if omega == 0.0 {
            0.0
        } else {
            kernel::initial_phase(trajectory, p.position, omega)
        };
        out.extend_from_slice(&[
            p.position.x,
            p.position.y,
            p.position.z,
            normal.x,
            normal.y,
            normal.z,
            flag,
            phase0,
        ]);
    }
    out
}

pub fn unpack_fields(buffer: &[f64], npoints: usize) -> SynRadResult<Vec<Vector3C>> {
    if buffer.len() != npoints * FIELD_STRIDE {
        return Err(SynRadError::AcceleratorUnavailable(format!(
            "device returned {} values for {npoints} points",
            buffer.len()
        )));
    }
    let fields: Vec<Vector3C> = buffer
        .chunks_exact(FIELD_STRIDE)
        .map(|c| {
            Vector3C::from_parts(
                [c[0], c[2], c[4]].into(),
                [c[1], c[3], c[5]].into(),
            )
        })
        .collect();
    if fields.iter().any(|e| !e.is_finite()) {
        return Err(SynRadError::AcceleratorUnavailable(
            "device returned non-finite fields".to_string(),
        ));
    }
    Ok(fields)
}

#[derive(Clone)]
pub enum Backend {
    Sequential,
    /// Data-parallel over points or particles. `threads: None` uses the
    /// global rayon pool.
    Threaded { threads: Option<usize> },
    Offload(Arc<dyn OffloadDevice>),
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Threaded { threads: None }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sequential => write!(f, "Sequential"),
            Backend::Threaded { threads: None } => write!(f, "Threaded"),
            Backend::Threaded { threads: Some(n) } => write!(f, "Threaded({n})"),
            Backend::Offload(device) => write!(f, "Offload({})", device.name()),
        }
    }
}

impl Backend {
    /// Backend for a config; `Gpu` needs a device and yields `None` without one.
    pub fn from_kind(
        kind: BackendKind,
        threads: Option<usize>,
        device: Option<Arc<dyn OffloadDevice>>,
    ) -> Option<Backend> {
        match kind {
            BackendKind::Sequential => Some(Backend::Sequential),
            BackendKind::Threaded => Some(Backend::Threaded { threads }),
            BackendKind::Gpu => device.map(Backend::Offload),
        }
    }

    pub fn is_offload(&self) -> bool {
        matches!(self, Backend::Offload(_))
    }
}

/// CPU work distribution derived from a [`Backend`].
#[derive(Clone)]
pub(crate) struct Executor {
    sequential: bool,
    pool: Option<Arc<ThreadPool>>,
}

impl Executor {
    pub(crate) fn new(backend: &Backend) -> SynRadResult<Self> {
        match backend {
            Backend::Sequential => Ok(Executor {
                sequential: true,
                pool: None,
            }),
            Backend::Threaded { threads: None } | Backend::Offload(_) => Ok(Executor {
                sequential: false,
                pool: None,
            }),
            Backend::Threaded { threads: Some(threads) } => {
                if *threads == 0 {
                    return Err(SynRadError::ConfigError(
                        "threaded backend needs at least 1 thread".to_string(),
                    ));
                }
                let pool = ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .thread_name(|i| format!("synrad-{i}"))
                    .build()
                    .map_err(|e| SynRadError::ConfigError(format!("thread pool: {e}")))?;
                Ok(Executor {
                    sequential: false,
                    pool: Some(Arc::new(pool)),
                })
            }
        }
    }

    /// `f(0..n)` in index order. The first failing index wins, so errors
    /// are the same whichever backend runs the work.
    pub(crate) fn map<T, F>(&self, n: usize, f: F) -> SynRadResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> SynRadResult<T> + Sync + Send,
    {
        self.map_all(n, f).into_iter().collect()
    }

    /// Like [`Executor::map`] but keeps every individual outcome.
    pub(crate) fn map_all<T, F>(&self, n: usize, f: F) -> Vec<SynRadResult<T>>
    where
        T: Send,
        F: Fn(usize) -> SynRadResult<T> + Sync + Send,
    {
        if self.sequential || n <= 1 {
            return (0..n).map(f).collect();
        }
        let run = || (0..n).into_par_iter().map(&f).collect::<Vec<_>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
