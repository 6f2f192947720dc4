//! Capability seam for vendor temporal upscalers
//!
//! Motion-vector-based temporal upscalers ship as licensed vendor SDKs and
//! are out of scope for this crate. Rather than holding opaque context
//! pointers, the renderer talks to them through [`TemporalUpscaler`];
//! [`NullTemporalUpscaler`] is the default variant wired in when no SDK
//! backend was selected at startup, and a real backend is injected in its
//! place when one is available.

use crate::jitter::JitterSequence;

/// Quality presets mapping a display resolution to a render resolution
///
/// These divisors are the conventional temporal-upscaler presets. They apply
/// to temporal backends only: the spatial sharpen-upscale stage keeps its own
/// [0.5, 1.0] per-axis ratio bound regardless of the preset in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalQuality {
    /// Render at display resolution, anti-alias only
    NativeAa,
    Quality,
    Balanced,
    Performance,
    /// 3x per-axis upscale; spatial-only configurations cannot reach this
    UltraPerformance,
}

impl TemporalQuality {
    /// Per-axis ratio between display and render resolution
    pub fn scale_factor(&self) -> f32 {
        match self {
            TemporalQuality::NativeAa => 1.0,
            TemporalQuality::Quality => 1.5,
            TemporalQuality::Balanced => 1.7,
            TemporalQuality::Performance => 2.0,
            TemporalQuality::UltraPerformance => 3.0,
        }
    }

    /// Render resolution for a display resolution under this preset
    pub fn render_resolution(&self, display_size: (u32, u32)) -> (u32, u32) {
        let scale = self.scale_factor();
        (
            (display_size.0 as f32 / scale) as u32,
            (display_size.1 as f32 / scale) as u32,
        )
    }
}

/// Per-frame inputs a temporal backend consumes
#[derive(Debug, Clone, Copy)]
pub struct TemporalFrame<'a> {
    /// The frame's color output at render resolution
    pub color: &'a wgpu::TextureView,
    /// Scene depth, when the renderer produces it
    pub depth: Option<&'a wgpu::TextureView>,
    /// Per-pixel motion vectors, when the renderer produces them
    pub motion_vectors: Option<&'a wgpu::TextureView>,
    /// Sub-pixel camera jitter applied to this frame, from a [`JitterSequence`]
    pub jitter: (f32, f32),
    /// Seconds since the previous frame
    pub delta_time: f32,
    /// Discard accumulated history (camera cut, resolution change)
    pub reset: bool,
}

/// A motion-vector-based temporal upscaling backend
pub trait TemporalUpscaler {
    /// Whether the backend initialized successfully and can dispatch
    fn is_available(&self) -> bool;

    /// Records this frame's upscale, returning the output view
    ///
    /// Returns `None` when the backend is unavailable; callers fall back to
    /// the spatial stage or pass-through.
    fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        frame: TemporalFrame<'_>,
        input_size: (u32, u32),
        output_size: (u32, u32),
    ) -> Option<wgpu::TextureView>;
}

/// Stand-in used when no vendor backend is wired in
#[derive(Debug, Default)]
pub struct NullTemporalUpscaler;

impl TemporalUpscaler for NullTemporalUpscaler {
    fn is_available(&self) -> bool {
        false
    }

    fn render(
        &mut self,
        _encoder: &mut wgpu::CommandEncoder,
        _frame: TemporalFrame<'_>,
        _input_size: (u32, u32),
        _output_size: (u32, u32),
    ) -> Option<wgpu::TextureView> {
        None
    }
}

/// Jitter phase count for a temporal accumulation window
///
/// The conventional window is 8 times the pixel ratio between display and
/// render resolution, so lower render resolutions cycle through more
/// sub-pixel positions before repeating.
pub fn jitter_phase_count(render_size: (u32, u32), display_size: (u32, u32)) -> u32 {
    let render_pixels = (render_size.0 as f32 * render_size.1 as f32).max(1.0);
    let display_pixels = display_size.0 as f32 * display_size.1 as f32;
    (8.0 * (display_pixels / render_pixels).ceil()) as u32
}

/// A [`JitterSequence`] sized for the given render/display resolutions
pub fn jitter_sequence_for(render_size: (u32, u32), display_size: (u32, u32)) -> JitterSequence {
    JitterSequence::new(jitter_phase_count(render_size, display_size).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_preset_resolutions() {
        let display = (3840, 2160);
        assert_eq!(TemporalQuality::NativeAa.render_resolution(display), (3840, 2160));
        assert_eq!(TemporalQuality::Quality.render_resolution(display), (2560, 1440));
        assert_eq!(TemporalQuality::Performance.render_resolution(display), (1920, 1080));
        assert_eq!(TemporalQuality::UltraPerformance.render_resolution(display), (1280, 720));
    }

    #[test]
    fn test_balanced_preset_rounds_down() {
        assert_eq!(TemporalQuality::Balanced.render_resolution((1920, 1080)), (1129, 635));
    }

    #[test]
    fn test_jitter_window_grows_with_upscale_ratio() {
        // Native: 8 phases; 2x per axis: 4x the pixels, 32 phases
        assert_eq!(jitter_phase_count((1920, 1080), (1920, 1080)), 8);
        assert_eq!(jitter_phase_count((960, 540), (1920, 1080)), 32);
    }

    #[test]
    fn test_null_upscaler_never_renders() {
        let null = NullTemporalUpscaler;
        assert!(!null.is_available());
    }
}
