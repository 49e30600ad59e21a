// ─────────────────────────────────────────────────────────────────────
// SynRad — GPU Radiation Kernel
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! wgpu compute offload of the per-point radiation integrals.
//!
//! [`GpuRadiationKernel`] implements [`OffloadDevice`]: one shader
//! invocation per observation point sums the whole trajectory in f32.
//! Results agree with the CPU kernel to about 1e-3 relative. The
//! calculator falls back to CPU threads if the device fails.

pub mod layout;

use bytemuck::{Pod, Zeroable};
use layout::{GPU_POINT_STRIDE, OUTPUT_STRIDE, SAMPLE_STRIDE};
use std::borrow::Cow;
use std::sync::Arc;
use synrad_core::radiation::backend::POINT_STRIDE;
use synrad_core::radiation::{FlatTrajectory, OffloadDevice};
use synrad_core::simulation::Simulation;
use synrad_types::config::{BackendKind, SimulationConfig};
use synrad_types::error::{SynRadError, SynRadResult};
use tracing::{debug, info, warn};

const WORKGROUP_SIZE: u32 = 64;
const MAX_WORKGROUPS: u32 = 65_535;

/// Uniform parameters passed to the compute shader.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuParams {
    n_samples: u32,
    n_points: u32,
    point_offset: u32,
    _pad0: u32,
    omega: f32,
    rad_scale: f32,
    _pad1: f32,
    _pad2: f32,
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Fields,
    Power,
}

/// Radiation integrals on a wgpu compute device.
pub struct GpuRadiationKernel {
    device: wgpu::Device,
    queue: wgpu::Queue,
    layout: wgpu::BindGroupLayout,
    fields_pipeline: wgpu::ComputePipeline,
    power_pipeline: wgpu::ComputePipeline,
    adapter_name: String,
    max_binding_size: u64,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn request_adapter(instance: &wgpu::Instance) -> Option<wgpu::Adapter> {
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
}

fn unavailable(message: impl Into<String>) -> SynRadError {
    SynRadError::AcceleratorUnavailable(message.into())
}

impl GpuRadiationKernel {
    /// Compile the radiation shader on the first high-performance adapter.
    ///
    /// Returns `Err` if no suitable GPU adapter is found.
    pub fn new() -> SynRadResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = request_adapter(&instance).ok_or_else(|| unavailable("no suitable GPU adapter found"))?;
        let info = adapter.get_info();
        let adapter_name = format!("{} ({:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("synrad-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| unavailable(format!("GPU device request failed: {e}")))?;

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("radiation"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("radiation.wgsl"))),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("radiation_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("radiation_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let fields_pipeline = pipeline("electric_fields");
        let power_pipeline = pipeline("power_densities");

        let max_binding_size = u64::from(device.limits().max_storage_buffer_binding_size);
        info!(adapter = %adapter_name, "GPU radiation kernel ready");
        Ok(GpuRadiationKernel {
            device,
            queue,
            layout,
            fields_pipeline,
            power_pipeline,
            adapter_name,
            max_binding_size,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn storage_buffer(&self, label: &str, data: &[f32]) -> SynRadResult<wgpu::Buffer> {
        use wgpu::util::DeviceExt;
        let size = std::mem::size_of_val(data) as u64;
        if size > self.max_binding_size {
            return Err(unavailable(format!(
                "{label} buffer of {size} bytes exceeds the device limit of {} bytes",
                self.max_binding_size
            )));
        }
        Ok(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE,
        }))
    }

    /// Run one pass over all points and read back [`OUTPUT_STRIDE`] f32 per point.
    fn run(&self, pass: Pass, trajectory: &FlatTrajectory, points: &[f64], omega: f64) -> SynRadResult<Vec<f32>> {
        let npoints = points.len() / POINT_STRIDE;
        let origin = trajectory.centroid();
        let samples = layout::pack_samples(trajectory, origin);
        let packed = layout::pack_points(points, origin)?;
        debug_assert_eq!(samples.len(), trajectory.len() * SAMPLE_STRIDE);
        debug_assert_eq!(packed.len(), npoints * GPU_POINT_STRIDE);

        let n_samples = u32::try_from(trajectory.len()).map_err(|_| unavailable("too many trajectory samples"))?;
        let n_points = u32::try_from(npoints).map_err(|_| unavailable("too many observation points"))?;
        let out_size = (npoints * OUTPUT_STRIDE * std::mem::size_of::<f32>()) as u64;
        if out_size > self.max_binding_size {
            return Err(unavailable(format!(
                "output buffer of {out_size} bytes exceeds the device limit"
            )));
        }

        let sample_buffer = self.storage_buffer("samples", &samples)?;
        let point_buffer = self.storage_buffer("points", &packed)?;
        let out_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("out"),
            size: out_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: out_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let param_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("params"),
            size: std::mem::size_of::<GpuParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("radiation_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: param_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sample_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: point_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: out_buffer.as_entire_binding(),
                },
            ],
        });
        let pipeline = match pass {
            Pass::Fields => &self.fields_pipeline,
            Pass::Power => &self.power_pipeline,
        };

        // One submission per chunk so each sees its own point offset.
        let per_dispatch = WORKGROUP_SIZE * MAX_WORKGROUPS;
        let mut offset = 0u32;
        while offset < n_points {
            let count = (n_points - offset).min(per_dispatch);
            let params = GpuParams {
                n_samples,
                n_points,
                point_offset: offset,
                _pad0: 0,
                omega: omega as f32,
                rad_scale: layout::radiation_scale(trajectory) as f32,
                _pad1: 0.0,
                _pad2: 0.0,
            };
            self.queue.write_buffer(&param_buffer, 0, bytemuck::bytes_of(&params));
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("radiation_encoder"),
            });
            {
                let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("radiation_pass"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(pipeline);
                cpass.set_bind_group(0, &bind_group, &[]);
                cpass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
            }
            self.queue.submit(Some(encoder.finish()));
            offset += count;
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("download_encoder"),
        });
        encoder.copy_buffer_to_buffer(&out_buffer, 0, &staging_buffer, 0, out_size);
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| unavailable(format!("GPU download channel error: {e}")))?
            .map_err(|e| unavailable(format!("GPU buffer map failed: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let result: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging_buffer.unmap();
        debug!(?pass, npoints, nsamples = n_samples, "GPU pass complete");
        Ok(result)
    }
}

impl OffloadDevice for GpuRadiationKernel {
    fn name(&self) -> String {
        format!("wgpu:{}", self.adapter_name)
    }

    fn electric_fields(&self, trajectory: &FlatTrajectory, points: &[f64], omega: f64) -> SynRadResult<Vec<f64>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.run(Pass::Fields, trajectory, points, omega)?;
        layout::unpack_fields(&raw, points, omega, layout::field_prefactor(trajectory))
    }

    fn power_densities(&self, trajectory: &FlatTrajectory, points: &[f64]) -> SynRadResult<Vec<f64>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.run(Pass::Power, trajectory, points, 0.0)?;
        layout::unpack_powers(&raw, points.len() / POINT_STRIDE)
    }
}

/// Offload device for a config asking for the GPU backend, if one can be
/// created. Other backends never probe the adapter.
pub fn offload_device(cfg: &SimulationConfig) -> Option<Arc<dyn OffloadDevice>> {
    if cfg.radiation.backend != BackendKind::Gpu {
        return None;
    }
    match GpuRadiationKernel::new() {
        Ok(kernel) => Some(Arc::new(kernel)),
        Err(e) => {
            warn!("GPU backend requested but unavailable: {e}");
            None
        }
    }
}

/// [`Simulation::from_config_with_device`] with the wgpu kernel as device.
pub fn simulation_from_config(cfg: &SimulationConfig) -> SynRadResult<Simulation> {
    Simulation::from_config_with_device(cfg, offload_device(cfg))
}

/// Check if a GPU adapter is available without compiling the kernel.
pub fn gpu_available() -> bool {
    request_adapter(&wgpu::Instance::default()).is_some()
}

/// Get GPU adapter info string.
pub fn gpu_info() -> Option<String> {
    let adapter = request_adapter(&wgpu::Instance::default())?;
    let info = adapter.get_info();
    Some(format!(
        "{} ({:?}, {:?})",
        info.name, info.backend, info.device_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use synrad_core::radiation::backend;
    use synrad_core::radiation::kernel;
    use synrad_core::surface::{Plane, RectangleSpec, Surface};
    use synrad_core::trajectory::{Trajectory, TrajectoryPoint};
    use synrad_math::vector::Vector3;
    use synrad_types::constants::{C_LIGHT, EV_TO_J, HBAR};

    #[test]
    fn test_gpu_params_size() {
        assert_eq!(std::mem::size_of::<GpuParams>(), 32);
    }

    #[test]
    fn test_gpu_available_does_not_panic() {
        let _ = gpu_available();
    }

    #[test]
    fn test_gpu_info_does_not_panic() {
        let _ = gpu_info();
    }

    #[test]
    fn test_non_gpu_config_does_not_probe() {
        let cfg = SimulationConfig::from_json_str(
            r#"{"trajectory": {"ct_start_m": -1.0, "ct_stop_m": 1.0}, "radiation": {"backend": "threaded"}}"#,
        )
        .unwrap();
        assert!(offload_device(&cfg).is_none());
    }

    /// Circular arc of radius `rho_m` in the x-z plane.
    fn arc_trajectory(npoints: usize, rho_m: f64, gamma: f64) -> Trajectory {
        let beta = (1.0 - 1.0 / (gamma * gamma)).sqrt();
        let omega0 = beta * C_LIGHT / rho_m;
        let t_half = 0.01 / omega0;
        let points = (0..npoints)
            .map(|i| {
                let t = -t_half + 2.0 * t_half * i as f64 / (npoints - 1) as f64;
                let phi = omega0 * t;
                TrajectoryPoint {
                    t_s: t,
                    x: Vector3::new(rho_m * (1.0 - phi.cos()), 0.0, rho_m * phi.sin()),
                    beta: Vector3::new(beta * phi.sin(), 0.0, beta * phi.cos()),
                    beta_dot: Vector3::new(beta * omega0 * phi.cos(), 0.0, -beta * omega0 * phi.sin()),
                    gamma,
                }
            })
            .collect();
        Trajectory::from_points(points, -1.602_176_634e-19, 9.109_383_701_5e-31).unwrap()
    }

    #[test]
    fn test_gpu_matches_cpu_kernel() {
        let kernel_gpu = match GpuRadiationKernel::new() {
            Ok(k) => k,
            Err(e) => {
                eprintln!("Skipping GPU test: {e}");
                return;
            }
        };
        let traj = arc_trajectory(4001, 10.0, 2000.0);
        let flat = FlatTrajectory::from_trajectory(&traj);
        let surface = Surface::rectangle(
            &RectangleSpec::new(Plane::XY, [0.004, 0.004], [5, 5]).translated(Vector3::new(0.0, 0.0, 10.0)),
        )
        .unwrap();
        let omega = 10.0 * EV_TO_J / HBAR;
        let packed = backend::pack_points(&flat, surface.points(), omega);
        let fields = kernel_gpu.electric_fields(&flat, &packed, omega).unwrap();
        let powers = kernel_gpu
            .power_densities(&flat, &backend::pack_points(&flat, surface.points(), 0.0))
            .unwrap();
        for (i, p) in surface.points().iter().enumerate() {
            let e = kernel::electric_field_at(&flat, p.position, omega).unwrap().norm_sqr();
            let g: f64 = fields[i * 6..(i + 1) * 6].iter().map(|v| v * v).sum();
            assert!((g / e - 1.0).abs() < 1e-2, "point {i}: {g} vs {e}");
            let pw = kernel::power_density_at(&flat, p.position, p.normal).unwrap();
            assert!((powers[i] / pw - 1.0).abs() < 1e-2, "point {i}: {} vs {pw}", powers[i]);
        }
        assert!(kernel_gpu.electric_fields(&flat, &[], omega).unwrap().is_empty());
    }
}
