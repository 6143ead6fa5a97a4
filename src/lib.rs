//! MapForge derives a full PBR texture set (normal, height, occlusion,
//! specular, roughness, metallic) from one image, on the CPU or the GPU.
//!
//! The core is [`pipeline::Pipeline`], generic over a [`passes::PassBackend`]:
//! [`ops::CpuBackend`] (rayon) or [`gpu::GpuBackend`] (wgpu compute).
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

#[macro_use]
pub mod logger;
pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod gpu;
pub mod io;
pub mod ops;
pub mod passes;
pub mod pipeline;

pub use buffer::PixelBuffer;
pub use channel::{ChannelMap, InputSource, TextureChannel};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use ops::CpuBackend;
pub use passes::{Pass, PassBackend, SamplerSettings};
pub use pipeline::{ConversionCommand, ConversionKind, Pipeline, RenderReport};
