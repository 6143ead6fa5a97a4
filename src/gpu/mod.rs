// ============================================================================
// GPU MODULE — compute backend for the pass library
// ============================================================================
//
// Architecture:
//   context.rs — wgpu Device, Queue, adapter init, error scopes
//   shaders.rs — WGSL source for every pass (one module, one entry per pass)
//   texture.rs — Rgba16Float target wrapper and readback row layout
//   compute.rs — GpuBackend: PassBackend over compute dispatches
// ============================================================================

pub mod compute;
pub mod context;
pub mod shaders;
pub mod texture;

pub use compute::GpuBackend;
pub use context::GpuContext;
pub use texture::GpuTarget;
