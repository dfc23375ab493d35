//! GPU simulation back-end using WebGPU compute shaders.
//!
//! The stencil and analysis kernels are separate dispatches chained inside a
//! single command encoder per `step` batch, so step `k + 1` observes the
//! completed writes of step `k` without any host round-trip. Per-step scalars
//! (source sample, Welford sample count) are staged up front in a uniform
//! buffer read through dynamic offsets; buffer rotation is realised as three
//! pre-built bind groups cycled by phase.

use super::GpuError;
use crate::compute::analysis::ewma_alpha;
use crate::compute::grid::{ANALYSIS_CHANNELS, SimulationGrid};
use crate::schema::SimulationParameters;

const STENCIL_SHADER: &str = include_str!("shaders/stencil.wgsl");
const ANALYSIS_SHADER: &str = include_str!("shaders/analysis.wgsl");

/// Uniform offset stride per step entry; matches the WebGPU minimum
/// dynamic-offset alignment.
const STEP_STRIDE: u64 = 256;

/// Static per-run parameters shared by both shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct GridParams {
    width: u32,
    height: u32,
    depth: u32,
    cell_count: u32,
    d1: f32,
    d2: f32,
    d3: f32,
    d4: f32,
    lambda: f32,
    ewma_alpha: f32,
    _pad0: f32,
    _pad1: f32,
}

/// Per-step scalars, one entry per step at `STEP_STRIDE` alignment.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct StepParams {
    signal: f32,
    sample_count: f32,
    inject: u32,
    _pad: u32,
}

/// Device mirror of one simulation: context, pipelines, and buffers.
pub struct GpuSimulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    width: u32,
    height: u32,
    depth: u32,
    size: usize,

    stencil_pipeline: wgpu::ComputePipeline,
    analysis_pipeline: wgpu::ComputePipeline,

    pressure_buffers: [wgpu::Buffer; 3],
    geometry_buffer: wgpu::Buffer,
    neighbours_buffer: wgpu::Buffer,
    beta_buffer: wgpu::Buffer,
    analysis_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    step_buffer: wgpu::Buffer,
    step_capacity: usize,
    staging_buffer: wgpu::Buffer,

    step_bind_group_layout: wgpu::BindGroupLayout,
    stencil_bind_groups: [wgpu::BindGroup; 3],
    analysis_bind_groups: [wgpu::BindGroup; 3],
    step_bind_group: wgpu::BindGroup,

    /// Steps taken since the last reset, modulo the buffer cycle.
    phase: usize,
}

impl GpuSimulation {
    /// Create the device context and mirror the given grid.
    pub async fn new(
        grid: &SimulationGrid,
        parameters: &SimulationParameters,
    ) -> Result<Self, GpuError> {
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
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("FDTD GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let stencil_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Stencil Shader"),
            source: wgpu::ShaderSource::Wgsl(STENCIL_SHADER.into()),
        });
        let analysis_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Analysis Shader"),
            source: wgpu::ShaderSource::Wgsl(ANALYSIS_SHADER.into()),
        });

        let stencil_bind_group_layout = create_stencil_bind_group_layout(&device);
        let analysis_bind_group_layout = create_analysis_bind_group_layout(&device);
        let step_bind_group_layout = create_step_bind_group_layout(&device);

        let stencil_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Stencil Pipeline Layout"),
                bind_group_layouts: &[&stencil_bind_group_layout, &step_bind_group_layout],
                ..Default::default()
            });
        let analysis_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Analysis Pipeline Layout"),
                bind_group_layouts: &[&analysis_bind_group_layout, &step_bind_group_layout],
                ..Default::default()
            });

        let stencil_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Stencil Pipeline"),
            layout: Some(&stencil_pipeline_layout),
            module: &stencil_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });
        let analysis_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Analysis Pipeline"),
            layout: Some(&analysis_pipeline_layout),
            module: &analysis_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let size = grid.size();
        let cell_bytes = (size * std::mem::size_of::<f32>()) as u64;

        let pressure_buffers = std::array::from_fn(|i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Pressure Buffer {i}")),
                size: cell_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });
        let geometry_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Buffer"),
            size: (size * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let neighbours_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Neighbour Mask Buffer"),
            size: (size * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let beta_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Beta Buffer"),
            size: cell_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let analysis_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Analysis Buffer"),
            size: cell_bytes * ANALYSIS_CHANNELS as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Params"),
            size: std::mem::size_of::<GridParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let step_capacity = 1024;
        let step_buffer = create_step_buffer(&device, step_capacity);
        // Staging holds current pressure, previous pressure, then analysis.
        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Staging Buffer"),
            size: cell_bytes * (2 + ANALYSIS_CHANNELS) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let stencil_bind_groups = create_stencil_bind_groups(
            &device,
            &stencil_bind_group_layout,
            &params_buffer,
            &pressure_buffers,
            &geometry_buffer,
            &neighbours_buffer,
            &beta_buffer,
        );
        let analysis_bind_groups = create_analysis_bind_groups(
            &device,
            &analysis_bind_group_layout,
            &params_buffer,
            &pressure_buffers,
            &geometry_buffer,
            &analysis_buffer,
        );
        let step_bind_group =
            create_step_bind_group(&device, &step_bind_group_layout, &step_buffer);

        let mut gpu = Self {
            device,
            queue,
            width: grid.width() as u32,
            height: grid.height() as u32,
            depth: grid.depth() as u32,
            size,
            stencil_pipeline,
            analysis_pipeline,
            pressure_buffers,
            geometry_buffer,
            neighbours_buffer,
            beta_buffer,
            analysis_buffer,
            params_buffer,
            step_buffer,
            step_capacity,
            staging_buffer,
            step_bind_group_layout,
            stencil_bind_groups,
            analysis_bind_groups,
            step_bind_group,
            phase: 0,
        };
        gpu.sync_read_buffers(grid, parameters);
        gpu.reset(grid);
        Ok(gpu)
    }

    /// Upload geometry, neighbour masks, β, and scheme coefficients.
    pub fn sync_read_buffers(&mut self, grid: &SimulationGrid, parameters: &SimulationParameters) {
        let geometry: Vec<u32> = grid.geometry().iter().map(|&flag| flag as u32).collect();
        self.queue
            .write_buffer(&self.geometry_buffer, 0, bytemuck::cast_slice(&geometry));
        self.queue.write_buffer(
            &self.neighbours_buffer,
            0,
            bytemuck::cast_slice(grid.neighbours()),
        );
        let beta: Vec<f32> = grid.beta().iter().map(|&b| b as f32).collect();
        self.queue
            .write_buffer(&self.beta_buffer, 0, bytemuck::cast_slice(&beta));

        let coefficients = parameters.coefficients();
        let params = GridParams {
            width: self.width,
            height: self.height,
            depth: self.depth,
            cell_count: self.size as u32,
            d1: coefficients.d1 as f32,
            d2: coefficients.d2 as f32,
            d3: coefficients.d3 as f32,
            d4: coefficients.d4 as f32,
            lambda: coefficients.lambda as f32,
            ewma_alpha: ewma_alpha(parameters.dt(), parameters.ewma_time_constant()) as f32,
            _pad0: 0.0,
            _pad1: 0.0,
        };
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Zero the device pressure buffers, mirror the host analysis state
    /// (NaN at walls), and restart the rotation cycle.
    pub fn reset(&mut self, grid: &SimulationGrid) {
        let zeros = vec![0.0f32; self.size];
        for buffer in &self.pressure_buffers {
            self.queue
                .write_buffer(buffer, 0, bytemuck::cast_slice(&zeros));
        }
        let analysis: Vec<f32> = grid.analysis().iter().map(|&v| v as f32).collect();
        self.queue
            .write_buffer(&self.analysis_buffer, 0, bytemuck::cast_slice(&analysis));
        self.phase = 0;
    }

    /// Dispatch one stencil/analysis pair per signal sample.
    ///
    /// All passes go through a single command encoder, so the dependency
    /// chain across steps is enforced on the device without host transfers.
    pub fn step_batch(&mut self, signals: &[f32], start_iteration: u64) -> Result<(), GpuError> {
        if signals.is_empty() {
            return Ok(());
        }
        self.ensure_step_capacity(signals.len());

        let mut entries = vec![0u8; signals.len() * STEP_STRIDE as usize];
        for (k, &signal) in signals.iter().enumerate() {
            let inject = signal.is_finite();
            let entry = StepParams {
                signal: if inject { signal } else { 0.0 },
                sample_count: (start_iteration + k as u64 + 1) as f32,
                inject: inject as u32,
                _pad: 0,
            };
            let offset = k * STEP_STRIDE as usize;
            entries[offset..offset + std::mem::size_of::<StepParams>()]
                .copy_from_slice(bytemuck::bytes_of(&entry));
        }
        self.queue.write_buffer(&self.step_buffer, 0, &entries);

        let workgroups_x = self.width.div_ceil(8);
        let workgroups_y = self.height.div_ceil(8);
        let workgroups_z = self.depth.div_ceil(4);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Step Batch Encoder"),
            });

        for k in 0..signals.len() {
            let step_offset = (k as u64 * STEP_STRIDE) as u32;
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Stencil Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.stencil_pipeline);
                pass.set_bind_group(0, &self.stencil_bind_groups[self.phase], &[]);
                pass.set_bind_group(1, &self.step_bind_group, &[step_offset]);
                pass.dispatch_workgroups(workgroups_x, workgroups_y, workgroups_z);
            }
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Analysis Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.analysis_pipeline);
                pass.set_bind_group(0, &self.analysis_bind_groups[self.phase], &[]);
                pass.set_bind_group(1, &self.step_bind_group, &[step_offset]);
                pass.dispatch_workgroups(workgroups_x, workgroups_y, workgroups_z);
            }
            self.phase = (self.phase + 1) % 3;
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Copy device pressure and analysis state back into the host grid.
    pub fn read_back(&mut self, grid: &mut SimulationGrid) -> Result<(), GpuError> {
        let cell_bytes = (self.size * std::mem::size_of::<f32>()) as u64;
        let current = (self.phase + 1) % 3;
        let previous = self.phase;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &self.pressure_buffers[current],
            0,
            &self.staging_buffer,
            0,
            cell_bytes,
        );
        encoder.copy_buffer_to_buffer(
            &self.pressure_buffers[previous],
            0,
            &self.staging_buffer,
            cell_bytes,
            cell_bytes,
        );
        encoder.copy_buffer_to_buffer(
            &self.analysis_buffer,
            0,
            &self.staging_buffer,
            cell_bytes * 2,
            cell_bytes * ANALYSIS_CHANNELS as u64,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        rx.recv().expect("map_async callback dropped")?;

        {
            let data = buffer_slice.get_mapped_range();
            let values: &[f32] = bytemuck::cast_slice(&data);
            let (host_previous, host_current, host_analysis) = grid.readback_buffers();
            for (host, &device) in host_current.iter_mut().zip(&values[..self.size]) {
                *host = device as f64;
            }
            for (host, &device) in host_previous
                .iter_mut()
                .zip(&values[self.size..2 * self.size])
            {
                *host = device as f64;
            }
            for (host, &device) in host_analysis.iter_mut().zip(&values[2 * self.size..]) {
                *host = device as f64;
            }
        }
        self.staging_buffer.unmap();
        Ok(())
    }

    fn ensure_step_capacity(&mut self, steps: usize) {
        if steps <= self.step_capacity {
            return;
        }
        self.step_capacity = steps.next_power_of_two();
        self.step_buffer = create_step_buffer(&self.device, self.step_capacity);
        self.step_bind_group = create_step_bind_group(
            &self.device,
            &self.step_bind_group_layout,
            &self.step_buffer,
        );
    }
}

fn create_step_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Step Params Buffer"),
        size: capacity as u64 * STEP_STRIDE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_step_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    step_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Step Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: step_buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<StepParams>() as u64),
            }),
        }],
    })
}

fn create_stencil_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    params_buffer: &wgpu::Buffer,
    pressure_buffers: &[wgpu::Buffer; 3],
    geometry_buffer: &wgpu::Buffer,
    neighbours_buffer: &wgpu::Buffer,
    beta_buffer: &wgpu::Buffer,
) -> [wgpu::BindGroup; 3] {
    std::array::from_fn(|phase| {
        let previous = &pressure_buffers[phase];
        let current = &pressure_buffers[(phase + 1) % 3];
        let next = &pressure_buffers[(phase + 2) % 3];
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Stencil Bind Group {phase}")),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: previous.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: current.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: geometry_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: neighbours_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: beta_buffer.as_entire_binding(),
                },
            ],
        })
    })
}

fn create_analysis_bind_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    params_buffer: &wgpu::Buffer,
    pressure_buffers: &[wgpu::Buffer; 3],
    geometry_buffer: &wgpu::Buffer,
    analysis_buffer: &wgpu::Buffer,
) -> [wgpu::BindGroup; 3] {
    std::array::from_fn(|phase| {
        // The buffer written by the stencil at this phase is the freshly
        // rotated current pressure the analysis kernel must read.
        let written = &pressure_buffers[(phase + 2) % 3];
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Analysis Bind Group {phase}")),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: written.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: geometry_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: analysis_buffer.as_entire_binding(),
                },
            ],
        })
    })
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

fn uniform_entry(binding: u32, has_dynamic_offset: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_stencil_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Stencil Bind Group Layout"),
        entries: &[
            uniform_entry(0, false),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
            storage_entry(4, true),
            storage_entry(5, true),
            storage_entry(6, true),
        ],
    })
}

fn create_analysis_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Analysis Bind Group Layout"),
        entries: &[
            uniform_entry(0, false),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
        ],
    })
}

fn create_step_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Step Bind Group Layout"),
        entries: &[uniform_entry(0, true)],
    })
}
