// ─────────────────────────────────────────────────────────────────────
// SynRad — Result Export
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `.npy`/`.npz` and JSON export of trajectories, spectra and maps.
//!
//! Column layouts:
//! - trajectory: `t, x, y, z, βx, βy, βz, β̇x, β̇y, β̇z`
//! - spectrum: `energy_ev, value`
//! - surface map: `x, y, z, nx, ny, nz, value` (zero normal when absent)

use crate::radiation::Spectrum;
use crate::surface::SurfaceMap;
use crate::trajectory::Trajectory;
use ndarray::Array2;
use ndarray_npy::{write_npy, NpzWriter};
use serde_json::{json, Value};
use std::fs::File;
use std::path::Path;
use synrad_types::error::{SynRadError, SynRadResult};

fn export_err(what: &str, err: impl std::fmt::Display) -> SynRadError {
    SynRadError::Export(format!("{what}: {err}"))
}

fn rows_to_array(rows: Vec<f64>, ncols: usize) -> SynRadResult<Array2<f64>> {
    let nrows = rows.len() / ncols;
    Array2::from_shape_vec((nrows, ncols), rows).map_err(|e| export_err("array shape", e))
}

pub fn trajectory_array(trajectory: &Trajectory) -> SynRadResult<Array2<f64>> {
    let mut rows = Vec::with_capacity(trajectory.len() * 10);
    for p in trajectory.points() {
        rows.push(p.t_s);
        rows.extend_from_slice(&p.x.to_array());
        rows.extend_from_slice(&p.beta.to_array());
        rows.extend_from_slice(&p.beta_dot.to_array());
    }
    rows_to_array(rows, 10)
}

pub fn spectrum_array(spectrum: &Spectrum) -> SynRadResult<Array2<f64>> {
    let rows = spectrum.iter().flat_map(|(e, v)| [e, v]).collect();
    rows_to_array(rows, 2)
}

pub fn surface_map_array(map: &SurfaceMap) -> SynRadResult<Array2<f64>> {
    let mut rows = Vec::with_capacity(map.len() * 7);
    for (p, v) in map.points.iter().zip(&map.values) {
        rows.extend_from_slice(&p.position.to_array());
        rows.extend_from_slice(&p.normal.map(|n| n.to_array()).unwrap_or([0.0; 3]));
        rows.push(*v);
    }
    rows_to_array(rows, 7)
}

pub fn write_trajectory_npy(path: impl AsRef<Path>, trajectory: &Trajectory) -> SynRadResult<()> {
    write_npy(path, &trajectory_array(trajectory)?).map_err(|e| export_err("trajectory .npy", e))
}

pub fn write_spectrum_npy(path: impl AsRef<Path>, spectrum: &Spectrum) -> SynRadResult<()> {
    write_npy(path, &spectrum_array(spectrum)?).map_err(|e| export_err("spectrum .npy", e))
}

pub fn write_surface_map_npy(path: impl AsRef<Path>, map: &SurfaceMap) -> SynRadResult<()> {
    write_npy(path, &surface_map_array(map)?).map_err(|e| export_err("surface map .npy", e))
}

/// Surface map as an `.npz` with `points` (N×7) and, for rectangular
/// grids, `grid` (n_second × n_first).
pub fn write_surface_map_npz(path: impl AsRef<Path>, map: &SurfaceMap) -> SynRadResult<()> {
    let file = File::create(path)?;
    let mut npz = NpzWriter::new(file);
    npz.add_array("points", &surface_map_array(map)?)
        .map_err(|e| export_err("surface map .npz", e))?;
    if let Some(grid) = map.to_array2() {
        npz.add_array("grid", &grid)
            .map_err(|e| export_err("surface map .npz", e))?;
    }
    npz.finish().map_err(|e| export_err("surface map .npz", e))?;
    Ok(())
}

pub fn spectrum_to_json(spectrum: &Spectrum) -> Value {
    json!({
        "energies_ev": spectrum.energies_ev(),
        "flux": spectrum.flux(),
        "peak": spectrum.peak().map(|(e, f)| json!({ "energy_ev": e, "flux": f })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Plane, RectangleSpec, Surface};
    use crate::trajectory::TrajectoryPoint;
    use ndarray_npy::read_npy;
    use synrad_math::vector::Vector3;

    fn trajectory() -> Trajectory {
        let points = (0..4)
            .map(|i| TrajectoryPoint {
                t_s: i as f64,
                x: Vector3::new(i as f64, 0.0, 0.0),
                beta: Vector3::new(0.5, 0.0, 0.0),
                beta_dot: Vector3::ZERO,
                gamma: 1.0 / 0.75f64.sqrt(),
            })
            .collect();
        Trajectory::from_points(points, -1.0, 1.0).unwrap()
    }

    #[test]
    fn test_trajectory_npy_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.npy");
        write_trajectory_npy(&path, &trajectory()).unwrap();
        let arr: Array2<f64> = read_npy(&path).unwrap();
        assert_eq!(arr.shape(), &[4, 10]);
        assert_eq!(arr[[2, 0]], 2.0);
        assert_eq!(arr[[3, 1]], 3.0);
        assert_eq!(arr[[0, 4]], 0.5);
    }

    #[test]
    fn test_surface_map_layout() {
        let surface = Surface::rectangle(&RectangleSpec::new(Plane::XY, [1.0, 1.0], [2, 2])).unwrap();
        let map = SurfaceMap::new(&surface, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let arr = surface_map_array(&map).unwrap();
        assert_eq!(arr.shape(), &[4, 7]);
        assert_eq!(arr[[1, 0]], 0.5);
        assert_eq!(arr[[1, 5]], 1.0);
        assert_eq!(arr[[3, 6]], 4.0);

        let dir = tempfile::tempdir().unwrap();
        write_surface_map_npz(dir.path().join("map.npz"), &map).unwrap();
        write_surface_map_npy(dir.path().join("map.npy"), &map).unwrap();
        assert!(dir.path().join("map.npz").exists());
    }

    #[test]
    fn test_spectrum_json() {
        let spectrum = Spectrum::new(vec![10.0, 20.0], vec![1.0, 3.0]).unwrap();
        let v = spectrum_to_json(&spectrum);
        assert_eq!(v["peak"]["energy_ev"], 20.0);
        assert_eq!(v["flux"][0], 1.0);
        assert_eq!(spectrum_array(&spectrum).unwrap().shape(), &[2, 2]);
    }

    #[test]
    fn test_unwritable_path_is_export_error() {
        let err = write_spectrum_npy(
            "/nonexistent-dir/definitely/missing.npy",
            &Spectrum::new(vec![1.0], vec![1.0]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, SynRadError::Export(_)), "{err}");
    }
}
