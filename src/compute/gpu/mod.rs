//! GPU compute back-end for the FDTD solver.
//!
//! Mirrors the grid arrays in device buffers and dispatches the stencil and
//! analysis kernels as separate compute passes, one work-item per cell.
//! WGSL has no `f64`, so device mirrors are `f32`; cross-back-end
//! bit-reproducibility is not a goal.

mod simulation;

pub use simulation::GpuSimulation;

/// Error type for GPU operations.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
}
