//! GPU-accelerated Jacobi sweeps.
//!
//! The field is uploaded once into two device buffers (A and B). Each sweep
//! is one dispatch over the flat list of free-cell indices followed by a
//! single-workgroup reduction that folds the per-workgroup maxima into a
//! status record. Buffer roles alternate by binding one of two prebuilt bind
//! groups, so a swap never copies data. When a tolerance is set, the status
//! record latches a converged flag and every later sweep in flight becomes a
//! no-op; the device sweep count then tells which buffer holds the result.

use bytemuck::{Pod, Zeroable};
use ndarray::{Array2, ArrayView2};
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use crate::error::{JacobiError, JacobiResult};
use crate::field::CellLayout;

const WORKGROUP_SIZE: u32 = 256;
const MAX_GROUPS_PER_DIM: u32 = 65_535;
/// Sweeps encoded per command buffer. With a tolerance, the 16-byte status
/// is read back once per chunk.
const SWEEPS_PER_SUBMIT: usize = 250;

// ── Uniform buffer (must match Params in jacobi.wgsl) ───────────────────

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct JacobiParams {
    n_free: u32,
    cols: u32,
    n_partials: u32,
    has_tol: u32,
    tol: f64,
    _padding: f64,
}

// ── Status record (must match Status in jacobi.wgsl) ────────────────────

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
struct SweepStatus {
    converged: u32,
    sweeps: u32,
    last_delta: f64,
}

/// Result of a GPU solve, before it is wrapped into a `SolveOutcome`.
pub struct GpuSolveResult {
    pub field: Array2<f64>,
    pub sweeps: usize,
    pub converged: bool,
    pub last_delta: Option<f64>,
}

/// Cached GPU buffers for one field shape.
/// Sized for a fully free interior so any mask of that shape fits.
struct CachedBuffers {
    rows: usize,
    cols: usize,
    // Binding 0: Params (UNIFORM | COPY_DST)
    params_buffer: wgpu::Buffer,
    // Binding 1: free-cell flat indices (STORAGE | COPY_DST)
    free_cells_buffer: wgpu::Buffer,
    // Bindings 2-3: ping-pong field pair (STORAGE | COPY_SRC | COPY_DST)
    field_a: wgpu::Buffer,
    field_b: wgpu::Buffer,
    // Binding 4: per-workgroup max delta
    partial_buffer: wgpu::Buffer,
    // Binding 5: converged flag, sweep count, last delta
    status_buffer: wgpu::Buffer,
    // Staging buffers for GPU -> CPU readback (MAP_READ | COPY_DST)
    field_staging: wgpu::Buffer,
    status_staging: wgpu::Buffer,
    // [0]: A -> B, [1]: B -> A
    bind_groups: [wgpu::BindGroup; 2],
}

/// GPU context for Jacobi solves - maintains GPU resources across calls.
pub struct JacobiGpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    /// Adapter-reported maximum single buffer size in bytes.
    max_buffer_size: u64,
    sweep_pipeline: wgpu::ComputePipeline,
    finish_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// Cached buffers reused across calls with the same field shape
    cached: Mutex<Option<CachedBuffers>>,
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

/// Workgroup grid covering `n_free` invocations, split over x/y when the
/// count exceeds the per-dimension dispatch limit.
fn dispatch_dims(n_free: usize) -> (u32, u32, u32) {
    let groups = (n_free as u32).div_ceil(WORKGROUP_SIZE).max(1);
    let x = groups.min(MAX_GROUPS_PER_DIM);
    let y = groups.div_ceil(x);
    (groups, x, y)
}

impl JacobiGpuContext {
    /// Initialize GPU context - call once at startup.
    ///
    /// Fails when no adapter is found or the adapter cannot run f64 shaders.
    pub async fn new() -> JacobiResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JacobiError::Gpu(format!("Failed to find suitable GPU adapter: {:?}", e)))?;

        let adapter_name = adapter.get_info().name;
        if !adapter.features().contains(wgpu::Features::SHADER_F64) {
            return Err(JacobiError::Gpu(format!(
                "adapter '{}' does not support SHADER_F64",
                adapter_name
            )));
        }

        let adapter_limits = adapter.limits();
        let mut limits = wgpu::Limits::default();
        limits.max_buffer_size = adapter_limits.max_buffer_size;
        limits.max_storage_buffer_binding_size = adapter_limits.max_storage_buffer_binding_size;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Jacobi Compute Device"),
                required_features: wgpu::Features::SHADER_F64,
                required_limits: limits,
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| JacobiError::Gpu(format!("Failed to create device: {}", e)))?;

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Jacobi Sweep Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("jacobi.wgsl").into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Jacobi Bind Group Layout"),
                entries: &[
                    // Binding 0: Params buffer (uniforms)
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
                    // Binding 1: free-cell indices
                    storage_entry(1, true),
                    // Binding 2: source field
                    storage_entry(2, true),
                    // Binding 3: destination field
                    storage_entry(3, false),
                    // Binding 4: per-workgroup maxima
                    storage_entry(4, false),
                    // Binding 5: status
                    storage_entry(5, false),
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Jacobi Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sweep_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Jacobi Sweep Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("sweep"),
            compilation_options: Default::default(),
            cache: None,
        });

        let finish_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Jacobi Finish Sweep Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("finish_sweep"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            adapter_name,
            max_buffer_size: adapter_limits.max_buffer_size,
            sweep_pipeline,
            finish_pipeline,
            bind_group_layout,
            cached: Mutex::new(None),
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Allocate a fresh set of GPU buffers for the given field shape.
    fn allocate_buffers(&self, rows: usize, cols: usize) -> CachedBuffers {
        let field_size = (rows * cols * std::mem::size_of::<f64>()) as u64;
        let max_free = rows.saturating_sub(2) * cols.saturating_sub(2);
        let free_size = (max_free.max(1) * std::mem::size_of::<u32>()) as u64;
        let (max_groups, _, _) = dispatch_dims(max_free);
        let partial_size = (max_groups as usize * std::mem::size_of::<f64>()) as u64;
        let status_size = std::mem::size_of::<SweepStatus>() as u64;

        let make_buffer = |label: &str, size: u64, usage: wgpu::BufferUsages| -> wgpu::Buffer {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        };

        let field_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;
        let staging_usage = wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST;

        let params_buffer = make_buffer(
            "Jacobi Params Buffer",
            std::mem::size_of::<JacobiParams>() as u64,
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let free_cells_buffer = make_buffer(
            "Free Cells Buffer",
            free_size,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        let field_a = make_buffer("Field A Buffer", field_size, field_usage);
        let field_b = make_buffer("Field B Buffer", field_size, field_usage);
        let partial_buffer =
            make_buffer("Partial Max Buffer", partial_size, wgpu::BufferUsages::STORAGE);
        let status_buffer = make_buffer("Sweep Status Buffer", status_size, field_usage);
        let field_staging = make_buffer("Field Staging Buffer", field_size, staging_usage);
        let status_staging = make_buffer("Status Staging Buffer", status_size, staging_usage);

        let make_bind_group = |label: &str, src: &wgpu::Buffer, dst: &wgpu::Buffer| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: free_cells_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: dst.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: partial_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: status_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [
            make_bind_group("Jacobi Bind Group A->B", &field_a, &field_b),
            make_bind_group("Jacobi Bind Group B->A", &field_b, &field_a),
        ];

        tracing::debug!(
            "[GPU] Allocated buffer cache for {}x{} field ({:.1} MB)",
            rows,
            cols,
            (field_size * 3 + free_size + partial_size) as f64 / 1_048_576.0
        );

        CachedBuffers {
            rows,
            cols,
            params_buffer,
            free_cells_buffer,
            field_a,
            field_b,
            partial_buffer,
            status_buffer,
            field_staging,
            status_staging,
            bind_groups,
        }
    }

    /// Map a staging buffer, copy its contents out and unmap it.
    fn read_back<T: Pod>(&self, buffer: &wgpu::Buffer) -> JacobiResult<Vec<T>> {
        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| JacobiError::Gpu(format!("Device poll failed: {:?}", e)))?;
        receiver
            .recv()
            .map_err(|e| JacobiError::Gpu(format!("Map callback dropped: {}", e)))?
            .map_err(|e| JacobiError::Gpu(format!("Failed to map buffer: {:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let out = bytemuck::pod_collect_to_vec::<u8, T>(&data);
        drop(data);
        buffer.unmap();
        Ok(out)
    }

    fn read_status(&self, buffers: &CachedBuffers) -> JacobiResult<SweepStatus> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Status Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &buffers.status_buffer,
            0,
            &buffers.status_staging,
            0,
            std::mem::size_of::<SweepStatus>() as u64,
        );
        self.queue.submit(Some(encoder.finish()));
        self.read_back::<SweepStatus>(&buffers.status_staging)?
            .first()
            .copied()
            .ok_or_else(|| JacobiError::Gpu("empty status readback".to_string()))
    }

    /// Run up to `max_iter` sweeps of `u0` under `layout` on the device.
    pub fn solve(
        &self,
        u0: ArrayView2<f64>,
        layout: &CellLayout,
        max_iter: usize,
        tol: Option<f64>,
    ) -> JacobiResult<GpuSolveResult> {
        let (rows, cols) = u0.dim();
        let total_cells = rows * cols;
        let field_size = (total_cells * std::mem::size_of::<f64>()) as u64;

        if total_cells > u32::MAX as usize {
            return Err(JacobiError::Gpu(format!(
                "{}x{} field exceeds 32-bit cell indexing",
                rows, cols
            )));
        }
        if field_size > self.max_buffer_size {
            return Err(JacobiError::Gpu(format!(
                "{}x{} field needs {} bytes, adapter allows {}",
                rows, cols, field_size, self.max_buffer_size
            )));
        }

        let field_data: Cow<[f64]> = match u0.as_slice() {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(u0.iter().copied().collect()),
        };
        let free_cells = layout.free_indices();
        let (n_groups, groups_x, groups_y) = dispatch_dims(free_cells.len());

        let params = JacobiParams {
            n_free: free_cells.len() as u32,
            cols: cols as u32,
            n_partials: n_groups,
            has_tol: u32::from(tol.is_some()),
            tol: tol.unwrap_or(0.0),
            _padding: 0.0,
        };

        // Get or create cached buffers for this field shape
        let mut cache_guard = self
            .cached
            .lock()
            .map_err(|e| JacobiError::Gpu(format!("Failed to lock buffer cache: {}", e)))?;

        let needs_realloc = match cache_guard.as_ref() {
            Some(c) => c.rows != rows || c.cols != cols,
            None => true,
        };
        if needs_realloc {
            *cache_guard = Some(self.allocate_buffers(rows, cols));
        }

        let buffers = cache_guard
            .as_ref()
            .ok_or_else(|| JacobiError::Gpu("Buffer cache unexpectedly empty".to_string()))?;

        // Host -> device, once per solve. Both halves of the pair start as u0.
        self.queue
            .write_buffer(&buffers.params_buffer, 0, bytemuck::cast_slice(&[params]));
        self.queue.write_buffer(
            &buffers.free_cells_buffer,
            0,
            bytemuck::cast_slice(&free_cells),
        );
        self.queue
            .write_buffer(&buffers.field_a, 0, bytemuck::cast_slice(&field_data[..]));
        self.queue
            .write_buffer(&buffers.field_b, 0, bytemuck::cast_slice(&field_data[..]));
        self.queue.write_buffer(
            &buffers.status_buffer,
            0,
            bytemuck::cast_slice(&[SweepStatus::default()]),
        );

        let mut submitted = 0usize;
        while submitted < max_iter {
            let chunk = SWEEPS_PER_SUBMIT.min(max_iter - submitted);
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Jacobi Sweep Encoder"),
                });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Jacobi Sweep Pass"),
                    timestamp_writes: None,
                });
                for k in 0..chunk {
                    let bind_group = &buffers.bind_groups[(submitted + k) % 2];
                    compute_pass.set_pipeline(&self.sweep_pipeline);
                    compute_pass.set_bind_group(0, bind_group, &[]);
                    compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
                    compute_pass.set_pipeline(&self.finish_pipeline);
                    compute_pass.dispatch_workgroups(1, 1, 1);
                }
            }
            self.queue.submit(Some(encoder.finish()));
            submitted += chunk;

            if tol.is_some() && submitted < max_iter {
                let status = self.read_status(buffers)?;
                if status.converged != 0 {
                    break;
                }
            }
        }

        let status = self.read_status(buffers)?;
        let sweeps = status.sweeps as usize;
        // Real sweeps are a prefix of the submitted ones: A holds the result
        // after an even count, B after an odd one.
        let result_buffer = if sweeps % 2 == 0 {
            &buffers.field_a
        } else {
            &buffers.field_b
        };

        // Device -> host, once per solve.
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Field Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(result_buffer, 0, &buffers.field_staging, 0, field_size);
        self.queue.submit(Some(encoder.finish()));
        let data = self.read_back::<f64>(&buffers.field_staging)?;

        let field = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| JacobiError::Gpu(format!("Failed to create field array: {}", e)))?;

        tracing::debug!(
            "[GPU] {} sweeps over {} free cells (converged: {})",
            sweeps,
            free_cells.len(),
            status.converged != 0
        );

        Ok(GpuSolveResult {
            field,
            sweeps,
            converged: status.converged != 0,
            last_delta: (sweeps > 0).then_some(status.last_delta),
        })
    }
}

pub fn create_jacobi_gpu_context() -> JacobiResult<JacobiGpuContext> {
    pollster::block_on(JacobiGpuContext::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, InteriorMask};
    use crate::solver::{solve_with, Backend, SolverOptions};
    use ndarray::s;
    use ndarray_stats::DeviationExt;

    fn context_or_skip() -> Option<JacobiGpuContext> {
        match create_jacobi_gpu_context() {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                eprintln!("skipping GPU test: {}", e);
                None
            }
        }
    }

    fn plan() -> (Field, InteriorMask) {
        let n = 40;
        let mut u0 = Field::zeros((n + 2, n + 2));
        u0.row_mut(0).fill(25.0);
        u0.slice_mut(s![1..n + 1, 1..n + 1]).fill(12.0);
        let mut mask = InteriorMask::from_elem((n, n), true);
        mask.slice_mut(s![10..30, 20]).fill(false);
        (u0, mask)
    }

    #[test]
    fn test_dispatch_dims() {
        assert_eq!(dispatch_dims(0), (1, 1, 1));
        assert_eq!(dispatch_dims(512 * 512), (1024, 1024, 1));
        let (groups, x, y) = dispatch_dims(20_000_000);
        assert_eq!(x, MAX_GROUPS_PER_DIM);
        assert!(x * y >= groups);
    }

    #[test]
    fn test_gpu_matches_cpu_fixed_budget() {
        let Some(ctx) = context_or_skip() else { return };
        let (u0, mask) = plan();
        let layout = CellLayout::new(u0.dim(), mask.view()).unwrap();

        let gpu = ctx.solve(u0.view(), &layout, 301, None).unwrap();
        let cpu = solve_with(
            u0.clone(),
            mask.view(),
            &SolverOptions::new(301, None).unwrap().with_backend(Backend::Cpu),
        )
        .unwrap();

        assert_eq!(gpu.sweeps, 301);
        assert!(!gpu.converged);
        assert!(gpu.field.linf_dist(&cpu.field).unwrap() < 1e-12);
        assert_eq!(gpu.field.row(0), u0.row(0));
    }

    #[test]
    fn test_gpu_early_stop() {
        let Some(ctx) = context_or_skip() else { return };
        let (u0, mask) = plan();
        let layout = CellLayout::new(u0.dim(), mask.view()).unwrap();

        let gpu = ctx.solve(u0.view(), &layout, 20_000, Some(1e-4)).unwrap();
        let cpu = solve_with(
            u0.clone(),
            mask.view(),
            &SolverOptions::new(20_000, Some(1e-4)).unwrap().with_backend(Backend::Cpu),
        )
        .unwrap();

        assert!(gpu.converged);
        assert!(gpu.sweeps < 20_000);
        assert!(gpu.sweeps.abs_diff(cpu.sweeps) <= 1);
        assert!(gpu.field.linf_dist(&cpu.field).unwrap() < 1e-4);
    }
}
