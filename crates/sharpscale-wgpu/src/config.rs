//! Sharpness-driven filter parameter derivation
//!
//! This module maps a user-facing sharpness slider and a dynamic-range mode to
//! the full bundle of filter-control values the upscale kernel reads from its
//! uniform buffer. Derivation is a pure function: invalid requests are
//! rejected with a [`ConfigError`] and never reach the GPU.

use bytemuck::{Pod, Zeroable};

/// Dynamic range of the color data flowing through the upscaler
///
/// HDR content concentrates visible detail at lower relative luma, so the HDR
/// modes use lower detection thresholds and a narrower, darker sharpening
/// band than SDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DynamicRange {
    /// Standard dynamic range
    #[default]
    Sdr,
    /// Linear-encoded HDR
    HdrLinear,
    /// Perceptual-quantizer-encoded HDR
    HdrPq,
}

/// A texel-space viewport into a texture
///
/// A zero extent on either axis means "use the full texture extent on that
/// axis"; [`Viewport::FULL`] selects the whole texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The whole texture, whatever its size
    pub const FULL: Viewport = Viewport {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };
}

/// Filter-control block uploaded to the GPU once per dispatch
///
/// Field order and layout match the uniform block declared in
/// `sharpen_upscale.wgsl`; all members are 4-byte scalars, so the `#[repr(C)]`
/// layout is also the WGSL uniform layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FilterConfig {
    pub detect_ratio: f32,
    pub detect_thres: f32,
    pub min_contrast_ratio: f32,
    pub ratio_norm: f32,

    pub contrast_boost: f32,
    pub eps: f32,
    pub sharp_start_y: f32,
    pub sharp_scale_y: f32,

    pub sharp_strength_min: f32,
    pub sharp_strength_scale: f32,
    pub sharp_limit_min: f32,
    pub sharp_limit_scale: f32,

    pub scale_x: f32,
    pub scale_y: f32,
    pub dst_norm_x: f32,
    pub dst_norm_y: f32,

    pub src_norm_x: f32,
    pub src_norm_y: f32,

    pub input_viewport_origin_x: u32,
    pub input_viewport_origin_y: u32,
    pub input_viewport_width: u32,
    pub input_viewport_height: u32,

    pub output_viewport_origin_x: u32,
    pub output_viewport_origin_y: u32,
    pub output_viewport_width: u32,
    pub output_viewport_height: u32,

    pub reserved0: f32,
    pub reserved1: f32,
}

/// Reasons a filter configuration request is rejected
///
/// Rejection is recoverable: the dispatch controller responds by passing the
/// input frame through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A viewport resolved to a zero extent on at least one axis
    #[error("viewport resolves to a zero extent")]
    EmptyViewport,
    /// The input/output ratio falls outside the supported [0.5, 1.0] range
    ///
    /// The coefficient bank is tuned for upscale factors between 1x and 2x;
    /// anything else would sample the tables outside their design range.
    #[error("{axis} scale factor {scale} outside the supported [0.5, 1.0] range")]
    ScaleOutOfRange { axis: &'static str, scale: f32 },
}

/// Derives the filter-control block for one upscale dispatch
///
/// `sharpness` is clamped to `[0, 1]`. Viewports default to the full texture
/// when given a zero extent. Returns [`ConfigError`] when a resolved viewport
/// is empty or the per-axis input/output ratio leaves `[0.5, 1.0]` (the stage
/// only performs 1x to 2x upscales).
#[allow(clippy::too_many_arguments)]
pub fn derive_config(
    sharpness: f32,
    mode: DynamicRange,
    input_viewport: Viewport,
    input_texture_size: (u32, u32),
    output_viewport: Viewport,
    output_texture_size: (u32, u32),
) -> Result<FilterConfig, ConfigError> {
    let sharpness = sharpness.clamp(0.0, 1.0);
    // Map 0..1 to -0.5..+0.5
    let slider = sharpness - 0.5;

    // Different ranges for the two slider halves: 0% must map to
    // no-sharpening while 100% must not over-sharpen, so the positive half is
    // compressed relative to the negative half.
    let (max_scale, min_scale, limit_scale) = if slider >= 0.0 {
        (1.25f32, 1.25f32, 1.25f32)
    } else {
        (1.75f32, 1.0f32, 1.0f32)
    };

    let detect_ratio = 2.0 * 1127.0 / 1024.0;

    // SDR constants
    let mut detect_thres = 64.0 / 1024.0;
    let mut min_contrast_ratio = 2.0;
    let mut max_contrast_ratio = 10.0;

    let mut sharp_start_y = 0.45f32;
    let mut sharp_end_y = 0.9f32;
    let mut sharp_strength_min = (0.4 + slider * min_scale * 1.2).max(0.0);
    let mut sharp_strength_max = 1.6 + slider * max_scale * 1.8;
    let mut sharp_limit_min = (0.14 + slider * limit_scale * 0.32).max(0.1);
    let mut sharp_limit_max = 0.5 + slider * limit_scale * 0.6;

    if mode != DynamicRange::Sdr {
        detect_thres = 32.0 / 1024.0;

        min_contrast_ratio = 1.5;
        max_contrast_ratio = 5.0;

        sharp_strength_min = (0.4 + slider * min_scale * 1.1).max(0.0);
        sharp_strength_max = 2.2 + slider * max_scale * 1.8;
        sharp_limit_min = (0.10 + slider * limit_scale * 0.28).max(0.06);
        sharp_limit_max = 0.6 + slider * limit_scale * 0.6;

        if mode == DynamicRange::HdrPq {
            sharp_start_y = 0.35;
            sharp_end_y = 0.55;
        } else {
            sharp_start_y = 0.3;
            sharp_end_y = 0.5;
        }
    }

    // A zero viewport extent defaults to the whole texture.
    let input_width = resolve_extent(input_viewport.width, input_texture_size.0);
    let input_height = resolve_extent(input_viewport.height, input_texture_size.1);
    let output_width = resolve_extent(output_viewport.width, output_texture_size.0);
    let output_height = resolve_extent(output_viewport.height, output_texture_size.1);
    if input_width == 0 || input_height == 0 || output_width == 0 || output_height == 0 {
        return Err(ConfigError::EmptyViewport);
    }

    let scale_x = input_width as f32 / output_width as f32;
    let scale_y = input_height as f32 / output_height as f32;
    if !(0.5..=1.0).contains(&scale_x) {
        return Err(ConfigError::ScaleOutOfRange {
            axis: "horizontal",
            scale: scale_x,
        });
    }
    if !(0.5..=1.0).contains(&scale_y) {
        return Err(ConfigError::ScaleOutOfRange {
            axis: "vertical",
            scale: scale_y,
        });
    }

    Ok(FilterConfig {
        detect_ratio,
        detect_thres,
        min_contrast_ratio,
        ratio_norm: 1.0 / (max_contrast_ratio - min_contrast_ratio),
        contrast_boost: 1.0,
        eps: 1.0 / 255.0,
        sharp_start_y,
        sharp_scale_y: 1.0 / (sharp_end_y - sharp_start_y),
        sharp_strength_min,
        sharp_strength_scale: sharp_strength_max - sharp_strength_min,
        sharp_limit_min,
        sharp_limit_scale: sharp_limit_max - sharp_limit_min,
        scale_x,
        scale_y,
        dst_norm_x: 1.0 / output_texture_size.0 as f32,
        dst_norm_y: 1.0 / output_texture_size.1 as f32,
        src_norm_x: 1.0 / input_texture_size.0 as f32,
        src_norm_y: 1.0 / input_texture_size.1 as f32,
        input_viewport_origin_x: input_viewport.x,
        input_viewport_origin_y: input_viewport.y,
        input_viewport_width: input_width,
        input_viewport_height: input_height,
        output_viewport_origin_x: output_viewport.x,
        output_viewport_origin_y: output_viewport.y,
        output_viewport_width: output_width,
        output_viewport_height: output_height,
        reserved0: 0.0,
        reserved1: 0.0,
    })
}

fn resolve_extent(viewport_extent: u32, texture_extent: u32) -> u32 {
    if viewport_extent == 0 {
        texture_extent
    } else {
        viewport_extent
    }
}
