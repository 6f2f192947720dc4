//! Command-line image upscaler
//!
//! Runs the sharpen-upscale stage once over a still image: load, upload to a
//! GPU texture, dispatch, read the result back and save it. Useful for
//! eyeballing filter behavior at different sharpness levels without a full
//! renderer around the stage.
//!
//! ```bash
//! cargo run --example upscale -- input.png output.png --scale 1.5 --sharpness 0.7
//! ```

use clap::Parser;
use image::GenericImageView;
use sharpscale_wgpu::{DynamicRange, SharpenUpscalePass, UpscaleSettings};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "Upscale and sharpen an image on the GPU")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// Upscale factor per axis; the stage supports factors in (1.0, 2.0]
    #[arg(long, short, default_value = "1.5")]
    scale: f32,

    /// Sharpness slider, 0.0 to 1.0
    #[arg(long, short = 'p', default_value = "0.5")]
    sharpness: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if !(1.0..=2.0).contains(&args.scale) || args.scale == 1.0 {
        return Err(format!("scale factor {} not in (1.0, 2.0]", args.scale).into());
    }

    let input_image = image::open(&args.input)?;
    let (input_width, input_height) = input_image.dimensions();
    let output_width = (input_width as f32 * args.scale).round() as u32;
    let output_height = (input_height as f32 * args.scale).round() as u32;
    println!("Upscaling {input_width}x{input_height} -> {output_width}x{output_height}");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: Default::default(),
    }))?;

    let input_texture = upload_image(&device, &queue, &input_image);
    let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut pass = SharpenUpscalePass::new(&device, 2);
    let settings = UpscaleSettings {
        enabled: true,
        sharpness: args.sharpness,
        dynamic_range: DynamicRange::Sdr,
    };

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("upscale") });
    let output = pass.render(
        &device,
        &queue,
        &mut encoder,
        &input_view,
        (input_width, input_height),
        (output_width, output_height),
        &settings,
    )?;
    queue.submit(std::iter::once(encoder.finish()));
    device.poll(wgpu::PollType::Wait)?;

    let Some(texture) = output.texture() else {
        return Err("stage passed the frame through; check the scale factor".into());
    };
    let result = read_back_rgba16f(&device, &queue, texture)?;
    result.save(&args.output)?;
    println!("Saved {}", args.output.display());
    Ok(())
}

/// Uploads an image as an RGBA8 texture the stage can sample
fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &image::DynamicImage,
) -> wgpu::Texture {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("upscale input"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    texture
}

/// Reads an RGBA16F texture back into an 8-bit image
fn read_back_rgba16f(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
    let width = texture.width();
    let height = texture.height();
    // Copy rows must be 256-byte aligned; pad and strip below.
    let bytes_per_row = (width * 8).div_ceil(256) * 256;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: (bytes_per_row * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        sender.send(result).unwrap();
    });
    device.poll(wgpu::PollType::Wait)?;
    pollster::block_on(receiver.receive()).ok_or("failed to map readback buffer")??;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let row_start = (y * bytes_per_row) as usize;
        let row: &[u16] = bytemuck::cast_slice(&data[row_start..row_start + (width * 8) as usize]);
        for &texel in row {
            let value = half::f16::from_bits(texel).to_f32();
            pixels.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }
    image::RgbaImage::from_raw(width, height, pixels).ok_or_else(|| "image conversion failed".into())
}
