// ============================================================================
// GPU PASS BACKEND — every `Pass` as a compute dispatch over Rgba16Float
// ============================================================================

use std::collections::HashMap;
use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use half::f16;
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::shaders::{PASS_SHADER, WORKGROUP};
use super::texture::{GpuTarget, TARGET_FORMAT, padded_bytes_per_row, strip_row_padding};
use crate::buffer::PixelBuffer;
use crate::error::{PipelineError, Result};
use crate::passes::{Axis, FilterMode, NormalCombine, Pass, PassBackend, SamplerSettings, WrapMode};

/// Mirror of `PassParams` in the shader (160 bytes, uniform layout).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct PassUniforms {
    out_size: [u32; 2],
    flags: u32,
    pad0: u32,
    iv: [i32; 4],
    p: [[f32; 4]; 8],
}

const FLAG_CLAMP: u32 = 1;
const FLAG_NEAREST: u32 = 2;

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

fn axis_index(axis: Axis) -> i32 {
    match axis {
        Axis::Horizontal => 0,
        Axis::Vertical => 1,
    }
}

impl PassUniforms {
    /// Pack `pass` for an output of `size`.  Integer parameters go to `iv`,
    /// float parameters to `p`, in the order the entry point reads them.
    pub fn encode(pass: &Pass, size: (u32, u32), sampler: SamplerSettings) -> Self {
        let mut u = PassUniforms {
            out_size: [size.0, size.1],
            ..Default::default()
        };
        if sampler.wrap == WrapMode::Clamp {
            u.flags |= FLAG_CLAMP;
        }
        if sampler.filter == FilterMode::Nearest {
            u.flags |= FLAG_NEAREST;
        }
        match *pass {
            Pass::Copy | Pass::Downsample => {}
            Pass::Resample { filter } => u.iv[0] = (filter == FilterMode::Nearest) as i32,
            Pass::Fill { color } => u.p[0] = color,
            Pass::GaussianBlur { radius, sigma, axis } => {
                u.iv[0] = radius as i32;
                u.iv[1] = axis_index(axis);
                u.p[0][0] = sigma;
            }
            Pass::Grayscale { weights } => u.p[0] = [weights[0], weights[1], weights[2], 0.0],
            Pass::GrayscaleAnchored { min_color, max_color } => {
                u.p[0] = [min_color[0], min_color[1], min_color[2], 0.0];
                u.p[1] = [max_color[0], max_color[1], max_color[2], 0.0];
            }
            Pass::InvertComponents { components } => {
                u.p[0] = [flag(components[0]), flag(components[1]), flag(components[2]), 0.0];
            }
            Pass::HueShift { shift } => u.p[0][0] = shift,
            Pass::Enhance { contrast, brightness } => u.p[0] = [contrast, brightness, 0.0, 0.0],
            Pass::RemoveShading { strength } => u.p[0][0] = strength,
            Pass::DetailBoost { small, medium } => u.p[0] = [small, medium, 0.0, 0.0],
            Pass::Sharpen { amount } => u.p[0][0] = amount,
            Pass::Levels { min, max } => u.p[0] = [min, max, 0.0, 0.0],
            Pass::SobelToNormal { amplitude } => u.p[0][0] = amplitude,
            Pass::NormalExpansion { combine } => match combine {
                NormalCombine::Replace { radius } => {
                    u.iv[0] = 0;
                    u.iv[1] = radius as i32;
                }
                NormalCombine::WeightedMix {
                    edge_mix,
                    blending,
                    flatness,
                } => {
                    u.iv[0] = 1;
                    u.p[0] = [edge_mix, blending, flatness, 0.0];
                }
            },
            Pass::MixNormalLevels { weights } => u.p[0] = weights,
            Pass::AngleCorrection { angle, correction } => u.p[0] = [angle, correction, 0.0, 0.0],
            Pass::HeightFromNormalStep { scale } => u.iv[0] = scale as i32,
            Pass::NormalFromHeight { depth } => u.p[0][0] = depth,
            Pass::Occlusion {
                samples,
                radius,
                depth,
                bias,
                intensity,
            } => {
                u.iv[0] = samples as i32;
                u.p[0] = [radius, depth, bias, intensity];
            }
            Pass::Remap { min, max } => {
                u.p[0] = [min[0], min[1], min[2], 0.0];
                u.p[1] = [max[0], max[1], max[2], 0.0];
            }
            Pass::Noise { level, seed } => {
                u.iv[0] = seed as i32;
                u.p[0][0] = level;
            }
            Pass::SeamlessSimple {
                radius,
                axis,
                strength,
                power,
            } => {
                u.iv[0] = radius as i32;
                u.iv[1] = axis_index(axis);
                u.p[0] = [strength, power, 0.0, 0.0];
            }
            Pass::SeamlessMirror {
                radius,
                mirror_x,
                mirror_y,
                strength,
                power,
            } => {
                u.iv = [radius as i32, mirror_x as i32, mirror_y as i32, 0];
                u.p[0] = [strength, power, 0.0, 0.0];
            }
            Pass::SeamlessRandom {
                radius,
                strength,
                power,
                random,
            } => {
                u.iv[0] = radius as i32;
                u.p[0] = [strength, power, 0.0, 0.0];
                u.p[1] = [random.angles[0], random.angles[1], random.angles[2], random.phase];
                u.p[2] = [random.inner_radius, random.outer_radius, 0.0, 0.0];
            }
            Pass::Perspective { corners, weights } => {
                u.p[0] = [corners[0][0], corners[0][1], corners[1][0], corners[1][1]];
                u.p[1] = [corners[2][0], corners[2][1], corners[3][0], corners[3][1]];
                u.p[2] = weights;
            }
            Pass::OverlayBlend { weight } => u.p[0][0] = weight,
            Pass::GrungeNormalWarp { weight, depth } => u.p[0] = [weight, depth, 0.0, 0.0],
            Pass::NormalStep { step } => u.p[0][0] = step,
            Pass::NormalMixer { weight, angle, scale } => u.p[0] = [weight, angle, scale, 0.0],
            Pass::RoughnessNoise {
                depth,
                threshold,
                amount,
            } => u.p[0] = [depth, threshold, amount, 0.0],
            Pass::ColorRemap {
                color,
                softness,
                invert,
            } => {
                u.iv[0] = invert as i32;
                u.p[0] = [color[0], color[1], color[2], softness];
            }
            Pass::MaskSelect { color } => u.p[0] = [color[0], color[1], color[2], 0.0],
        }
        u
    }
}

/// Readback in flight: the staging buffer plus the map callback's channel.
pub struct GpuReadback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
    mapped: mpsc::Receiver<std::result::Result<(), wgpu::BufferAsyncError>>,
}

/// Compute backend.  One shader module holds every pass; pipelines are built
/// on first use of each entry point.
pub struct GpuBackend {
    ctx: GpuContext,
    settings: SamplerSettings,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<&'static str, wgpu::ComputePipeline>,
    /// Bound to input slots a pass does not use.
    dummy: GpuTarget,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl GpuBackend {
    /// Acquire an adapter (hardware, then software fallback) and compile the
    /// pass shader.
    pub fn new(preferred_gpu: &str) -> Result<Self> {
        let ctx = GpuContext::new(preferred_gpu).map_err(PipelineError::Gpu)?;
        Self::with_context(ctx)
    }

    pub fn with_context(ctx: GpuContext) -> Result<Self> {
        let module = ctx
            .scoped(wgpu::ErrorFilter::Validation, |device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("pass_shader"),
                    source: wgpu::ShaderSource::Wgsl(PASS_SHADER.into()),
                })
            })
            .map_err(PipelineError::Gpu)?;

        let device = &ctx.device;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass_bgl"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: TARGET_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let dummy = GpuTarget::new(device, 1, 1, "pass_dummy_input");

        Ok(Self {
            ctx,
            settings: SamplerSettings::default(),
            module,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            dummy,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn ensure_pipeline(&mut self, name: &'static str) -> Result<()> {
        if self.pipelines.contains_key(name) {
            return Ok(());
        }
        let entry = format!("cs_{}", name);
        let layout = &self.pipeline_layout;
        let module = &self.module;
        let pipeline = self
            .ctx
            .scoped(wgpu::ErrorFilter::Validation, |device| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(name),
                    layout: Some(layout),
                    module,
                    entry_point: &entry,
                    compilation_options: Default::default(),
                })
            })
            .map_err(|e| PipelineError::Gpu(format!("pipeline {}: {}", name, e)))?;
        crate::log_debug!("Built compute pipeline {}", entry);
        self.pipelines.insert(name, pipeline);
        Ok(())
    }
}

impl PassBackend for GpuBackend {
    type Target = GpuTarget;
    type Pending = GpuReadback;

    fn name(&self) -> &str {
        "gpu"
    }

    fn sampler(&self) -> SamplerSettings {
        self.settings
    }

    fn set_sampler(&mut self, settings: SamplerSettings) {
        self.settings = settings;
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<GpuTarget> {
        if width == 0 || height == 0 || !self.ctx.supports_size(width, height) {
            return Err(PipelineError::Allocation {
                width,
                height,
                reason: format!("outside the device limit of {}", self.ctx.max_texture_dim),
            });
        }
        self.ctx
            .scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
                GpuTarget::new(device, width, height, "pass_target")
            })
            .map_err(|reason| PipelineError::Allocation { width, height, reason })
    }

    fn target_size(&self, target: &GpuTarget) -> (u32, u32) {
        (target.width, target.height)
    }

    fn upload(&mut self, target: &mut GpuTarget, pixels: &PixelBuffer) -> Result<()> {
        if (target.width, target.height) != pixels.dimensions() {
            return Err(PipelineError::InvalidInput(format!(
                "upload of {:?} into a {}x{} target",
                pixels.dimensions(),
                target.width,
                target.height
            )));
        }
        let texels = pixels.to_f16_texels();
        target.write(&self.ctx.queue, bytemuck::cast_slice(&texels));
        Ok(())
    }

    fn run(&mut self, pass: &Pass, inputs: &[&GpuTarget], output: &mut GpuTarget) -> Result<()> {
        pass.check_inputs(inputs.len())?;
        let name = pass.name();
        self.ensure_pipeline(name)?;
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| PipelineError::Gpu(format!("pipeline {} missing", name)))?;

        let device = &self.ctx.device;
        let uniforms = PassUniforms::encode(pass, (output.width, output.height), self.settings);
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass_params"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let view = |i: usize| inputs.get(i).map_or(&self.dummy.view, |t| &t.view);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass_bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view(0)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view(1)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(view(2)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(view(3)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(name),
        });
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(name),
                timestamp_writes: None,
            });
            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            cpass.dispatch_workgroups(output.width.div_ceil(WORKGROUP), output.height.div_ceil(WORKGROUP), 1);
        }
        self.ctx.submit_one(encoder);
        Ok(())
    }

    fn begin_readback(&mut self, target: &GpuTarget) -> Result<GpuReadback> {
        let device = &self.ctx.device;
        let padded_row = padded_bytes_per_row(target.width);
        let size = padded_row as u64 * target.height as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(target.height),
                },
            },
            target.extent(),
        );
        self.ctx.submit_one(encoder);

        let (tx, rx) = mpsc::channel();
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        Ok(GpuReadback {
            buffer,
            width: target.width,
            height: target.height,
            padded_row,
            mapped: rx,
        })
    }

    fn finish_readback(&mut self, pending: GpuReadback) -> Result<PixelBuffer> {
        let _ = self.ctx.device.poll(wgpu::Maintain::Wait);
        pending.mapped.recv()??;

        let bytes = {
            let mapped = pending.buffer.slice(..).get_mapped_range();
            strip_row_padding(&mapped, pending.width, pending.height, pending.padded_row)
        };
        pending.buffer.unmap();

        let texels: Vec<f16> = bytes
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]))
            .collect();
        PixelBuffer::from_f16_texels(pending.width, pending.height, &texels)
    }
}
