use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use lumen_gpu::{
    BufferDescriptor, BufferRegion, BufferUsage, ColorTargetDescription, ColorTargetInfo,
    DeviceDescriptor, DummyBackend, GpuDevice, GraphicsPipelineDescriptor, ShaderDescriptor,
    ShaderFormat, ShaderStage, TextureDescriptor, TextureFormat, TextureUsage,
    TransferBufferDescriptor, TransferBufferLocation,
};

const SPIRV_STUB: &[u8] = &[0x03, 0x02, 0x23, 0x07];

fn create_device() -> GpuDevice {
    GpuDevice::with_backend(
        Arc::new(DummyBackend::new()),
        &DeviceDescriptor::new(ShaderFormat::SPIRV),
    )
    .expect("Failed to create device")
}

// ---------------------------------------------------------------------------
// Resource creation
// ---------------------------------------------------------------------------

fn bench_buffer_create_release(c: &mut Criterion) {
    let device = create_device();
    c.bench_function("buffer_create_release_4k", |b| {
        b.iter(|| {
            let buffer = device
                .create_buffer(&BufferDescriptor::new(4096, BufferUsage::VERTEX))
                .unwrap();
            black_box(buffer.handle());
        });
    });
}

fn bench_texture_create_release(c: &mut Criterion) {
    let device = create_device();
    c.bench_function("texture_create_release_256x256_mips", |b| {
        b.iter(|| {
            let texture = device
                .create_texture(
                    &TextureDescriptor::new_2d(
                        256,
                        256,
                        TextureFormat::Rgba8Unorm,
                        TextureUsage::SAMPLER,
                    )
                    .with_mip_levels(9),
                )
                .unwrap();
            black_box(texture.handle());
        });
    });
}

// ---------------------------------------------------------------------------
// Command recording and submission
// ---------------------------------------------------------------------------

fn bench_record_draws(c: &mut Criterion) {
    let device = create_device();
    let target = device
        .create_texture(&TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::COLOR_TARGET,
        ))
        .unwrap();
    let vertex = device
        .create_shader(&ShaderDescriptor::new(
            ShaderStage::Vertex,
            ShaderFormat::SPIRV,
            SPIRV_STUB,
            "main",
        ))
        .unwrap();
    let fragment = device
        .create_shader(&ShaderDescriptor::new(
            ShaderStage::Fragment,
            ShaderFormat::SPIRV,
            SPIRV_STUB,
            "main",
        ))
        .unwrap();
    let pipeline = device
        .create_graphics_pipeline(
            &GraphicsPipelineDescriptor::new(&vertex, &fragment)
                .with_color_target(ColorTargetDescription::new(TextureFormat::Rgba8Unorm)),
        )
        .unwrap();

    c.bench_function("record_and_submit_1000_draws", |b| {
        b.iter(|| {
            let mut cmd = device.acquire_command_buffer().unwrap();
            {
                let mut pass = cmd
                    .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
                    .unwrap();
                pass.bind_graphics_pipeline(&pipeline);
                for i in 0..1000 {
                    pass.push_vertex_uniforms(0, &[i as f32; 4]);
                    pass.draw_primitives(3, 1, 0, 0);
                }
            }
            cmd.submit_and_acquire_fence().unwrap().wait().unwrap();
        });
    });
}

fn bench_upload_roundtrip(c: &mut Criterion) {
    const SIZE: u64 = 1 << 20;
    let device = create_device();
    let buffer = device
        .create_buffer(&BufferDescriptor::new(SIZE, BufferUsage::VERTEX))
        .unwrap();
    let mut upload = device
        .create_transfer_buffer(&TransferBufferDescriptor::upload(SIZE))
        .unwrap();
    let data = vec![0xABu8; SIZE as usize];

    c.bench_function("upload_1mib_cycled", |b| {
        b.iter(|| {
            upload.write(0, &data, true).unwrap();
            let mut cmd = device.acquire_command_buffer().unwrap();
            cmd.begin_copy_pass().upload_to_buffer(
                &TransferBufferLocation::new(&upload, 0),
                &BufferRegion::whole(&buffer),
                false,
            );
            cmd.submit().unwrap();
        });
        device.wait_for_idle().unwrap();
    });
}

criterion_group!(
    benches,
    bench_buffer_create_release,
    bench_texture_create_release,
    bench_record_draws,
    bench_upload_roundtrip,
);
criterion_main!(benches);
