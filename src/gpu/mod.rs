// GPU acceleration module for Jacobi sweeps
#[cfg(feature = "gpu")]
pub mod jacobi_gpu;

#[cfg(feature = "gpu")]
pub use jacobi_gpu::{create_jacobi_gpu_context, GpuSolveResult, JacobiGpuContext};
