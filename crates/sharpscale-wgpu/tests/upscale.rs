//! End-to-end tests for the sharpen-upscale stage on a real device
//!
//! Each test acquires a wgpu adapter and skips gracefully when the machine
//! has none (e.g. headless CI without a software rasterizer).

use sharpscale_wgpu::{DynamicRange, FrameOutput, SharpenUpscalePass, UpscaleSettings};

fn create_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::default(),
        trace: Default::default(),
    }))
    .ok()
}

/// Uploads a gradient test pattern as the stage's input
fn create_input_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test input"),
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

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 255 / width) as u8);
            pixels.push((y * 255 / height) as u8);
            pixels.push(128);
            pixels.push(255);
        }
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels,
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

fn enabled_settings() -> UpscaleSettings {
    UpscaleSettings {
        enabled: true,
        sharpness: 0.5,
        dynamic_range: DynamicRange::Sdr,
    }
}

/// Reads one RGBA16F texel back from an output texture
fn read_texel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
) -> [f32; 4] {
    let width = texture.width();
    let height = texture.height();
    let bytes_per_row = width * 8;
    assert_eq!(bytes_per_row % 256, 0, "test sizes must satisfy copy alignment");

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
    device.poll(wgpu::PollType::Wait).unwrap();
    pollster::block_on(receiver.receive()).unwrap().unwrap();

    let data = slice.get_mapped_range();
    let texels: &[u16] = bytemuck::cast_slice(&data);
    let offset = ((y * width + x) * 4) as usize;
    let mut out = [0.0f32; 4];
    for (i, value) in out.iter_mut().enumerate() {
        *value = half::f16::from_bits(texels[offset + i]).to_f32();
    }
    out
}

#[test]
fn test_upscales_720p_to_1080p() {
    let Some((device, queue)) = create_device() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let input = create_input_texture(&device, &queue, 1280, 720);
    let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
    let mut pass = SharpenUpscalePass::new(&device, 2);

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let output = pass
        .render(
            &device,
            &queue,
            &mut encoder,
            &input_view,
            (1280, 720),
            (1920, 1080),
            &enabled_settings(),
        )
        .unwrap();
    queue.submit(std::iter::once(encoder.finish()));
    device.poll(wgpu::PollType::Wait).unwrap();

    assert!(output.is_upscaled());
    let texture = output.texture().expect("upscaled frames expose their texture");
    assert_eq!(texture.width(), 1920);
    assert_eq!(texture.height(), 1080);

    let error = pollster::block_on(device.pop_error_scope());
    assert!(error.is_none(), "validation error: {error:?}");

    // The gradient's center must survive the filter as non-black color.
    let center = read_texel(&device, &queue, texture, 960, 540);
    assert!(center[0] > 0.1 && center[1] > 0.1 && center[2] > 0.1, "center texel {center:?}");
}

#[test]
fn test_equal_size_passes_through() {
    let Some((device, queue)) = create_device() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };

    let input = create_input_texture(&device, &queue, 256, 256);
    let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
    let mut pass = SharpenUpscalePass::new(&device, 2);

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let output = pass
        .render(
            &device,
            &queue,
            &mut encoder,
            &input_view,
            (256, 256),
            (256, 256),
            &enabled_settings(),
        )
        .unwrap();

    assert!(matches!(output, FrameOutput::PassThrough(_)));
    assert!(output.texture().is_none());
}

#[test]
fn test_downscale_is_rejected_and_passes_through() {
    let Some((device, queue)) = create_device() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };

    let input = create_input_texture(&device, &queue, 512, 256);
    let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
    let mut pass = SharpenUpscalePass::new(&device, 2);

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    // Width shrinks while height grows: the width ratio 1.28 is out of range.
    let output = pass
        .render(
            &device,
            &queue,
            &mut encoder,
            &input_view,
            (512, 256),
            (400, 300),
            &enabled_settings(),
        )
        .unwrap();

    assert!(!output.is_upscaled());
}

#[test]
fn test_disabled_stage_passes_through() {
    let Some((device, queue)) = create_device() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };

    let input = create_input_texture(&device, &queue, 128, 128);
    let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
    let mut pass = SharpenUpscalePass::new(&device, 2);

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    let output = pass
        .render(
            &device,
            &queue,
            &mut encoder,
            &input_view,
            (128, 128),
            (256, 256),
            &UpscaleSettings::default(),
        )
        .unwrap();

    assert!(!output.is_upscaled());
}

#[test]
fn test_resolution_change_recreates_targets() {
    let Some((device, queue)) = create_device() else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let input = create_input_texture(&device, &queue, 1280, 720);
    let input_view = input.create_view(&wgpu::TextureViewDescriptor::default());
    let mut pass = SharpenUpscalePass::new(&device, 2);

    for output_size in [(1920, 1080), (1920, 1080), (2048, 1152), (2048, 1152)] {
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        let output = pass
            .render(
                &device,
                &queue,
                &mut encoder,
                &input_view,
                (1280, 720),
                output_size,
                &enabled_settings(),
            )
            .unwrap();
        queue.submit(std::iter::once(encoder.finish()));

        assert!(output.is_upscaled());
        let texture = output.texture().unwrap();
        assert_eq!((texture.width(), texture.height()), output_size);
    }
    device.poll(wgpu::PollType::Wait).unwrap();

    let error = pollster::block_on(device.pop_error_scope());
    assert!(error.is_none(), "validation error: {error:?}");
}
