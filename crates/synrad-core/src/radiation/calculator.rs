use super::backend::{pack_points, unpack_fields, Backend, Executor, OffloadDevice};
use super::kernel::{self, FlatTrajectory, TimeDomainField};
use super::polarization::Polarization;
use super::spectrum::{self, flux_per_field_sqr, Spectrum};
use crate::surface::{Surface, SurfaceMap, SurfacePoint};
use crate::trajectory::Trajectory;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use synrad_math::vector::{Vector3, Vector3C};
use synrad_types::constants::ev_to_omega;
use synrad_types::error::{SynRadError, SynRadResult};
use tracing::{debug, warn};

/// Radiation integrals for one trajectory, dispatched to a [`Backend`].
///
/// Single-trajectory results are normalized to one particle per second
/// (`I = |q|`); beam runs rescale them by `I/|q|`.
pub struct RadiationCalculator {
    backend: Backend,
    executor: Executor,
    polarization: Polarization,
    precision: f64,
    max_level: u32,
    offload_failed: AtomicBool,
    notices: Mutex<Vec<String>>,
}

impl std::fmt::Debug for RadiationCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadiationCalculator")
            .field("backend", &self.backend)
            .field("polarization", &self.polarization)
            .field("precision", &self.precision)
            .field("max_level", &self.max_level)
            .finish()
    }
}

fn validate_energy(energy_ev: f64) -> SynRadResult<f64> {
    if !energy_ev.is_finite() || energy_ev <= 0.0 {
        return Err(SynRadError::ConfigError(format!(
            "photon energy must be finite and > 0 eV, got {energy_ev}"
        )));
    }
    Ok(ev_to_omega(energy_ev))
}

fn relative_change(current: f64, previous: f64) -> f64 {
    let scale = current.abs().max(previous.abs());
    if scale == 0.0 {
        0.0
    } else {
        (current - previous).abs() / scale
    }
}

impl RadiationCalculator {
    pub fn new(backend: Backend) -> SynRadResult<Self> {
        let executor = Executor::new(&backend)?;
        Ok(RadiationCalculator {
            backend,
            executor,
            polarization: Polarization::All,
            precision: 0.01,
            max_level: 0,
            offload_failed: AtomicBool::new(false),
            notices: Mutex::new(Vec::new()),
        })
    }

    pub fn with_polarization(mut self, polarization: Polarization) -> Self {
        self.polarization = polarization;
        self
    }

    /// Spectrum refinement: double the trajectory sampling up to `max_level`
    /// times until `|E|²` changes by less than `precision` (relative).
    pub fn with_adaptive(mut self, precision: f64, max_level: u32) -> SynRadResult<Self> {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(SynRadError::ConfigError(format!(
                "precision must be finite and > 0, got {precision}"
            )));
        }
        self.precision = precision;
        self.max_level = max_level;
        Ok(self)
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn polarization(&self) -> Polarization {
        self.polarization
    }

    /// Fallbacks and other non-fatal events recorded so far.
    pub fn notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn notice(&self, message: String) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    pub(crate) fn executor(&self) -> &Executor {
        &self.executor
    }

    fn device(&self) -> Option<&dyn OffloadDevice> {
        match &self.backend {
            Backend::Offload(device) if !self.offload_failed.load(Ordering::Acquire) => Some(device.as_ref()),
            _ => None,
        }
    }

    fn fall_back(&self, device: &dyn OffloadDevice, err: &SynRadError) {
        if !self.offload_failed.swap(true, Ordering::AcqRel) {
            let message = format!(
                "offload device '{}' failed, continuing on CPU threads: {err}",
                device.name()
            );
            warn!("{message}");
            self.notice(message);
        }
    }

    /// Unprojected `E(ω)` at each point.
    fn point_fields(&self, flat: &FlatTrajectory, points: &[SurfacePoint], omega: f64) -> SynRadResult<Vec<Vector3C>> {
        if let Some(device) = self.device() {
            let packed = pack_points(flat, points, omega);
            match device
                .electric_fields(flat, &packed, omega)
                .and_then(|buf| unpack_fields(&buf, points.len()))
            {
                Ok(fields) => return Ok(fields),
                // A diverged integral is a property of the trajectory, not of the device.
                Err(err) if err.is_numerical() => return Err(err),
                Err(err) => self.fall_back(device, &err),
            }
        }
        self.executor
            .map(points.len(), |i| kernel::electric_field_at(flat, points[i].position, omega))
    }

    fn point_powers(&self, flat: &FlatTrajectory, points: &[SurfacePoint]) -> SynRadResult<Vec<f64>> {
        if let Some(device) = self.device() {
            let packed = pack_points(flat, points, 0.0);
            let result = device.power_densities(flat, &packed).and_then(|buf| {
                if buf.len() != points.len() || buf.iter().any(|v| !v.is_finite()) {
                    Err(SynRadError::AcceleratorUnavailable(format!(
                        "device returned {} power values for {} points",
                        buf.len(),
                        points.len()
                    )))
                } else {
                    Ok(buf)
                }
            });
            match result {
                Ok(values) => return Ok(values),
                Err(err) => self.fall_back(device, &err),
            }
        }
        self.executor.map(points.len(), |i| {
            kernel::power_density_at(flat, points[i].position, points[i].normal)
        })
    }

    /// Projected `E(ω)` at `point` for each photon energy.
    pub fn spectrum_fields(&self, trajectory: &Trajectory, point: Vector3, energies_ev: &[f64]) -> SynRadResult<Vec<Vector3C>> {
        let omegas = energies_ev
            .iter()
            .map(|&e| validate_energy(e))
            .collect::<SynRadResult<Vec<_>>>()?;
        let n = omegas.len();
        let mut accepted: Vec<Option<Vector3C>> = vec![None; n];
        let mut previous: Vec<Option<Vector3C>> = vec![None; n];
        let mut pending: Vec<usize> = (0..n).collect();
        let mut current = trajectory.clone();
        let mut level = 0u32;

        while !pending.is_empty() {
            let flat = FlatTrajectory::from_trajectory(&current);
            let results = self.executor.map_all(pending.len(), |k| {
                kernel::electric_field_at(&flat, point, omegas[pending[k]])
                    .map(|e| self.polarization.project(e))
            });
            let mut next = Vec::new();
            for (&j, result) in pending.iter().zip(results) {
                match result {
                    Ok(e) if self.max_level == 0 || level == self.max_level => accepted[j] = Some(e),
                    Ok(e) => match previous[j] {
                        Some(prev) if relative_change(e.norm_sqr(), prev.norm_sqr()) < self.precision => {
                            accepted[j] = Some(e)
                        }
                        _ => {
                            previous[j] = Some(e);
                            next.push(j);
                        }
                    },
                    Err(SynRadError::QuadratureDiverged { .. }) if level < self.max_level => {
                        previous[j] = None;
                        next.push(j);
                    }
                    Err(err) => return Err(err),
                }
            }
            pending = next;
            if !pending.is_empty() {
                level += 1;
                current = current.refined(2)?;
                debug!(
                    level,
                    npoints = current.len(),
                    pending = pending.len(),
                    "refining trajectory for spectrum"
                );
            }
        }
        Ok(accepted.into_iter().map(|e| e.unwrap_or(Vector3C::ZERO)).collect())
    }

    /// Flux density (photons/s/mm²/0.1%bw) at `point`.
    pub fn spectrum(&self, trajectory: &Trajectory, point: Vector3, energies_ev: &[f64]) -> SynRadResult<Spectrum> {
        let fields = self.spectrum_fields(trajectory, point, energies_ev)?;
        let factor = flux_per_field_sqr();
        Spectrum::new(
            energies_ev.to_vec(),
            fields.iter().map(|e| factor * e.norm_sqr()).collect(),
        )
    }

    /// Projected `E(ω)` on a surface, scaled by `√max(n̂·normal, 0)` where
    /// `n̂` points from the trajectory centroid to the surface point.
    pub fn flux_fields(&self, trajectory: &Trajectory, surface: &Surface, energy_ev: f64) -> SynRadResult<Vec<Vector3C>> {
        let omega = validate_energy(energy_ev)?;
        let flat = FlatTrajectory::from_trajectory(trajectory);
        let fields = self.point_fields(&flat, surface.points(), omega)?;
        let centroid = flat.centroid();
        Ok(fields
            .into_iter()
            .zip(surface.points())
            .map(|(e, p)| {
                let e = self.polarization.project(e);
                match p.normal {
                    Some(normal) => e * (p.position - centroid).unit().dot(normal).max(0.0).sqrt(),
                    None => e,
                }
            })
            .collect())
    }

    /// Flux density map (photons/s/mm²/0.1%bw) at one photon energy.
    pub fn flux_map(&self, trajectory: &Trajectory, surface: &Surface, energy_ev: f64) -> SynRadResult<SurfaceMap> {
        let fields = self.flux_fields(trajectory, surface, energy_ev)?;
        let factor = flux_per_field_sqr();
        SurfaceMap::new(surface, fields.iter().map(|e| factor * e.norm_sqr()).collect())
    }

    /// Energy per unit area (J/m²) deposited by one passage.
    pub fn power_densities(&self, trajectory: &Trajectory, surface: &Surface) -> SynRadResult<Vec<f64>> {
        let flat = FlatTrajectory::from_trajectory(trajectory);
        self.point_powers(&flat, surface.points())
    }

    /// Power density map (W/mm²).
    pub fn power_density_map(&self, trajectory: &Trajectory, surface: &Surface) -> SynRadResult<SurfaceMap> {
        let values = self.power_densities(trajectory, surface)?;
        Ok(SurfaceMap::new(surface, values)?.scaled(1e-6))
    }

    /// Radiated power (W).
    pub fn total_power(&self, trajectory: &Trajectory) -> SynRadResult<f64> {
        let energy = kernel::larmor_energy(&FlatTrajectory::from_trajectory(trajectory));
        if !energy.is_finite() {
            return Err(SynRadError::NonFinite {
                quantity: "total radiated power".to_string(),
                time_s: trajectory.start_s(),
            });
        }
        Ok(energy)
    }

    /// Retarded field (V/m) at `point` against observer time.
    pub fn electric_field_vs_time(&self, trajectory: &Trajectory, point: Vector3) -> SynRadResult<TimeDomainField> {
        let mut field = kernel::time_domain_field(&FlatTrajectory::from_trajectory(trajectory), point)?;
        for e in &mut field.e {
            *e = self.polarization.project_real(*e)?;
        }
        Ok(field)
    }

    /// Flux density spectrum from the FFT of the time-domain field.
    pub fn fft_spectrum(&self, trajectory: &Trajectory, point: Vector3) -> SynRadResult<Spectrum> {
        let field = kernel::time_domain_field(&FlatTrajectory::from_trajectory(trajectory), point)?;
        spectrum::fft_spectrum(&field, &self.polarization)
    }
}
