//! Frame dispatch controller for the sharpen-upscale stage
//!
//! This module orchestrates per-frame execution: it decides whether upscaling
//! is needed at all, keeps the coefficient bank uploaded, derives the filter
//! configuration, sizes the render-target pool to the output resolution and
//! records the compute dispatch into the caller's command encoder. The stage
//! records no internal submissions and never waits on the GPU.

use tracing::{debug, trace};

use crate::coefficients::{self, FILTER_SIZE, PHASE_COUNT};
use crate::config::{DynamicRange, FilterConfig, Viewport, derive_config};
use crate::pool::TargetPool;

/// Output tile width covered by one workgroup
pub const BLOCK_WIDTH: u32 = 32;
/// Output tile height covered by one workgroup
pub const BLOCK_HEIGHT: u32 = 24;
/// Invocations per workgroup; must match `@workgroup_size` in the kernel
const THREAD_GROUP_SIZE: u32 = 256;

/// Pixel format of pooled output targets
///
/// 16-bit float keeps HDR-range sharpened color without clipping; the format
/// is fixed, the stage performs no format negotiation.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Workgroup grid for an output extent: one 32x24 tile per workgroup
pub fn dispatch_grid(output_size: (u32, u32)) -> (u32, u32) {
    (
        output_size.0.div_ceil(BLOCK_WIDTH),
        output_size.1.div_ceil(BLOCK_HEIGHT),
    )
}

/// Errors fatal to the current frame's upscale attempt
///
/// Configuration rejection is absorbed internally (the frame passes through);
/// everything here propagates to the caller because a missing render target
/// cannot be recovered mid-frame.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested output extent cannot be allocated on this device
    #[error("output target {width}x{height} exceeds the device texture limit {limit}")]
    TargetTooLarge { width: u32, height: u32, limit: u32 },
}

/// Caller-facing settings for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscaleSettings {
    /// Whether the stage runs at all; disabled means pass-through
    pub enabled: bool,
    /// Sharpness slider, 0.0 to 1.0
    pub sharpness: f32,
    /// Dynamic range of the frame's color data
    pub dynamic_range: DynamicRange,
}

impl Default for UpscaleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sharpness: 0.5,
            dynamic_range: DynamicRange::Sdr,
        }
    }
}

/// Result of one frame through the stage
///
/// Whether the upscaler actually ran is part of the return value rather than
/// shared mutable state, so multiple stage instances (split-screen,
/// multi-viewport) never clobber one flag.
#[derive(Debug, Clone)]
pub enum FrameOutput {
    /// The input frame, returned unchanged
    PassThrough(wgpu::TextureView),
    /// A pooled target holding the upscaled frame
    ///
    /// The texture stays owned by the stage's pool and is recycled on the
    /// next resolution change; use it within the current frame only.
    Upscaled {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

impl FrameOutput {
    /// The view to present or feed into the next pass
    pub fn view(&self) -> &wgpu::TextureView {
        match self {
            Self::PassThrough(view) => view,
            Self::Upscaled { view, .. } => view,
        }
    }

    /// The pooled output texture, when the stage ran
    ///
    /// Pooled targets carry `COPY_SRC` usage so callers can read results
    /// back; pass-through frames expose no texture.
    pub fn texture(&self) -> Option<&wgpu::Texture> {
        match self {
            Self::PassThrough(_) => None,
            Self::Upscaled { texture, .. } => Some(texture),
        }
    }

    /// True when the upscaler ran this frame
    pub fn is_upscaled(&self) -> bool {
        matches!(self, Self::Upscaled { .. })
    }
}

/// A pooled output image and its view
#[derive(Debug)]
struct OutputTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// One coefficient table resident on the device
#[derive(Debug)]
struct CoefficientTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Spatial upscale + sharpen stage
///
/// Construct once per renderer; [`render`](Self::render) records at most one
/// compute dispatch per frame into the caller's encoder. The single uniform
/// buffer assumes frames are recorded and submitted sequentially; a caller
/// recording several frames before submitting needs one stage instance per
/// frame in flight.
#[derive(Debug)]
pub struct SharpenUpscalePass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    config_buffer: wgpu::Buffer,
    coef_scale: CoefficientTexture,
    coef_usm: CoefficientTexture,
    coefficients_uploaded: bool,
    pool: TargetPool<OutputTarget>,
}

impl SharpenUpscalePass {
    /// Creates the stage's pipeline and resources
    ///
    /// `ring_size` is the number of pooled output images; it must exceed the
    /// maximum number of frames the caller's submission pipeline keeps in
    /// flight (typically 2 or 3).
    pub fn new(device: &wgpu::Device, ring_size: usize) -> Self {
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sharpen upscale"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sharpen_upscale.wgsl").into()),
        });

        // 6 bindings: config, sampler, input, output, coef scale, coef usm
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sharpen upscale"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size_of::<FilterConfig>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: OUTPUT_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        // RGBA32F is read with textureLoad, never filtered
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sharpen upscale"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("sharpen upscale"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sharpen upscale sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        let config_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sharpen upscale config"),
            size: size_of::<FilterConfig>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let coef_scale = create_coefficient_texture(device, "sharpen upscale coef scale");
        let coef_usm = create_coefficient_texture(device, "sharpen upscale coef usm");

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            config_buffer,
            coef_scale,
            coef_usm,
            coefficients_uploaded: false,
            pool: TargetPool::new(ring_size),
        }
    }

    /// Runs the stage for one frame
    ///
    /// Returns [`FrameOutput::PassThrough`] without recording any GPU work
    /// when the stage is disabled, the input already covers the output extent
    /// on both axes, or the configuration is rejected (invalid scale ratio or
    /// empty viewport). Otherwise records one compute dispatch into `encoder`
    /// and returns the pooled result.
    ///
    /// # Errors
    /// Fails only when the output target cannot be allocated; see [`Error`].
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        input: &wgpu::TextureView,
        input_size: (u32, u32),
        output_size: (u32, u32),
        settings: &UpscaleSettings,
    ) -> Result<FrameOutput, Error> {
        if !settings.enabled {
            trace!("upscaler disabled, passing frame through");
            return Ok(FrameOutput::PassThrough(input.clone()));
        }
        if input_size.0 >= output_size.0 && input_size.1 >= output_size.1 {
            trace!(
                input_width = input_size.0,
                input_height = input_size.1,
                "input already covers the output extent, passing frame through"
            );
            return Ok(FrameOutput::PassThrough(input.clone()));
        }

        self.upload_coefficients(queue);

        let config = match derive_config(
            settings.sharpness,
            settings.dynamic_range,
            Viewport::FULL,
            input_size,
            Viewport::FULL,
            output_size,
        ) {
            Ok(config) => config,
            Err(err) => {
                debug!(%err, "upscale configuration rejected, passing frame through");
                return Ok(FrameOutput::PassThrough(input.clone()));
            }
        };

        let target = self
            .pool
            .acquire(output_size, |slot, extent| create_output_target(device, slot, extent))?;

        let (grid_x, grid_y) = dispatch_grid(output_size);
        debug_assert!(grid_x > 0 && grid_y > 0, "dispatch grid must be non-empty");

        queue.write_buffer(&self.config_buffer, 0, bytemuck::bytes_of(&config));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sharpen upscale"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.config_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&target.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.coef_scale.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&self.coef_usm.view),
                },
            ],
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("sharpen upscale"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(grid_x, grid_y, 1);
        }

        trace!(
            output_width = output_size.0,
            output_height = output_size.1,
            grid_x,
            grid_y,
            "recorded upscale dispatch"
        );
        Ok(FrameOutput::Upscaled {
            texture: target.texture.clone(),
            view: target.view.clone(),
        })
    }

    /// Uploads both coefficient tables to the device
    ///
    /// The tables never change, so this runs once per pass instance and is a
    /// no-op afterwards.
    fn upload_coefficients(&mut self, queue: &wgpu::Queue) {
        if self.coefficients_uploaded {
            return;
        }
        for (texture, table) in [
            (&self.coef_scale.texture, &coefficients::SCALE_COEFFICIENTS),
            (&self.coef_usm.texture, &coefficients::USM_COEFFICIENTS),
        ] {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                coefficients::table_bytes(table),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some((FILTER_SIZE * size_of::<f32>()) as u32),
                    rows_per_image: Some(PHASE_COUNT as u32),
                },
                coefficient_texture_extent(),
            );
        }
        self.coefficients_uploaded = true;
    }
}

fn coefficient_texture_extent() -> wgpu::Extent3d {
    wgpu::Extent3d {
        // 8 taps packed 4 per RGBA32F texel
        width: (FILTER_SIZE / 4) as u32,
        height: PHASE_COUNT as u32,
        depth_or_array_layers: 1,
    }
}

fn create_coefficient_texture(device: &wgpu::Device, label: &str) -> CoefficientTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: coefficient_texture_extent(),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    CoefficientTexture { texture, view }
}

fn create_output_target(
    device: &wgpu::Device,
    slot: usize,
    extent: (u32, u32),
) -> Result<OutputTarget, Error> {
    let limit = device.limits().max_texture_dimension_2d;
    if extent.0 > limit || extent.1 > limit {
        return Err(Error::TargetTooLarge {
            width: extent.0,
            height: extent.1,
            limit,
        });
    }

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("sharpen upscale output #{slot}")),
        size: wgpu::Extent3d {
            width: extent.0,
            height: extent.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(OutputTarget { texture, view })
}
