//! Adaptive spatial upscaling and sharpening for wgpu render pipelines
//!
//! This crate implements a sharpness-driven upscale stage that runs as one
//! compute dispatch per frame: a 64-phase polyphase filter reconstructs the
//! image at the target resolution while an adaptive unsharp mask restores
//! edge contrast. The stage is bounded to 1x-2x upscales, falls back to
//! passing the input through whenever it cannot or need not run, and records
//! all of its work into a caller-supplied command encoder without ever
//! blocking on the GPU.
//!
//! Also included are the shared numeric utilities sibling passes rely on: a
//! restartable low-discrepancy jitter sequence for temporal accumulation and
//! a capability seam for vendor temporal-upscaler backends.

pub mod coefficients;
mod config;
pub mod jitter;
mod pass;
mod pool;
pub mod temporal;

pub use config::{ConfigError, DynamicRange, FilterConfig, Viewport, derive_config};
pub use pass::{
    BLOCK_HEIGHT, BLOCK_WIDTH, Error, FrameOutput, OUTPUT_FORMAT, SharpenUpscalePass,
    UpscaleSettings, dispatch_grid,
};
pub use pool::TargetPool;
