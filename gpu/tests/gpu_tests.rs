//! GPU integration tests.
//!
//! These tests drive the public API end to end against the dummy backend,
//! which executes copy work on the CPU and validates draws and dispatches.
//! Tests are parameterized using `rstest` to run against an immediate and a
//! delayed queue.
//!
//! # Test Categories
//!
//! - **Copy Tests**: Buffer and texture round trips through transfer buffers
//! - **Render Tests**: Clears, draws and indirect draws with readback validation
//! - **Synchronization Tests**: Fences, cancellation and idle waits
//! - **Lifetime Tests**: Release idempotency and device destruction
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test gpu_tests
//! ```

mod common;

use rstest::rstest;

use common::{Backend, TestContext, generate_test_pattern};
use lumen_gpu::{
    BlitInfo, BlitRegion, BufferBinding, BufferLocation, BufferRegion, BufferUsage, Color,
    ColorTargetInfo, DrawIndirectArgs, GpuBackend, GpuError, TextureDescriptor, TextureFormat,
    TextureLocation, TextureRegion, TextureTransferInfo, TextureUsage, TransferBufferLocation,
};

// ============================================================================
// Copy Tests
// ============================================================================

/// Upload to a buffer, download it again and compare.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_buffer_copy_roundtrip(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    const BUFFER_SIZE: u64 = 1024;
    let test_data = generate_test_pattern(BUFFER_SIZE as usize);

    let buffer = ctx.create_buffer(BUFFER_SIZE, BufferUsage::VERTEX);
    ctx.upload_buffer(&buffer, &test_data);

    assert_eq!(ctx.read_buffer(&buffer, BUFFER_SIZE), test_data);
    assert_eq!(ctx.backend.stats().copy_operations, 2);
}

/// Copy a sub-range between two buffers.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_buffer_copy_partial(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    const BUFFER_SIZE: u64 = 2048;
    const COPY_SIZE: u64 = 512;
    const SRC_OFFSET: u64 = 256;
    const DST_OFFSET: u64 = 1024;

    let src = ctx.create_buffer(BUFFER_SIZE, BufferUsage::COMPUTE_STORAGE_READ);
    let dst = ctx.create_buffer(BUFFER_SIZE, BufferUsage::COMPUTE_STORAGE_READ);
    let pattern = generate_test_pattern(BUFFER_SIZE as usize);
    ctx.upload_buffer(&src, &pattern);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass().copy_buffer_to_buffer(
        &BufferLocation::new(&src, SRC_OFFSET),
        &BufferLocation::new(&dst, DST_OFFSET),
        COPY_SIZE,
        false,
    );
    cmd.submit().unwrap();
    ctx.device.wait_for_idle().unwrap();

    let result = ctx.read_buffer(&dst, BUFFER_SIZE);
    let (src_start, dst_start) = (SRC_OFFSET as usize, DST_OFFSET as usize);
    let copy = COPY_SIZE as usize;
    assert!(result[..dst_start].iter().all(|&b| b == 0));
    assert_eq!(
        &result[dst_start..dst_start + copy],
        &pattern[src_start..src_start + copy]
    );
    assert!(result[dst_start + copy..].iter().all(|&b| b == 0));
}

/// Upload texels with a padded row pitch, download them tightly packed.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_texture_upload_with_row_pitch(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    const WIDTH: u32 = 4;
    const HEIGHT: u32 = 3;
    const PITCH_PIXELS: u32 = 6;

    let texture = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(
            WIDTH,
            HEIGHT,
            TextureFormat::Rgba8Unorm,
            TextureUsage::SAMPLER,
        ))
        .unwrap();

    let padded = generate_test_pattern((PITCH_PIXELS * HEIGHT * 4) as usize);
    let upload = ctx.create_upload(&padded);
    let mut download = ctx.create_download(u64::from(WIDTH * HEIGHT * 4));

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    {
        let mut copy = cmd.begin_copy_pass();
        copy.upload_to_texture(
            &TextureTransferInfo::new(&upload, 0).with_layout(PITCH_PIXELS, HEIGHT),
            &TextureRegion::whole(&texture),
            false,
        );
        copy.download_from_texture(
            &TextureRegion::whole(&texture),
            &TextureTransferInfo::new(&download, 0),
        );
    }
    cmd.submit_and_acquire_fence().unwrap().wait().unwrap();

    let row_bytes = (WIDTH * 4) as usize;
    let pitch_bytes = (PITCH_PIXELS * 4) as usize;
    let expected: Vec<u8> = (0..HEIGHT as usize)
        .flat_map(|row| padded[row * pitch_bytes..row * pitch_bytes + row_bytes].to_vec())
        .collect();
    let packed = download.read::<u8>(0, expected.len()).unwrap();
    assert_eq!(packed, expected);
}

/// Copy a texel box from one texture into an offset inside another.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_texture_to_texture_copy(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let src = ctx.create_color_target(2, 2);
    let dst = ctx.create_color_target(4, 4);

    let texels: Vec<u8> = (1..=16).collect();
    let upload = ctx.create_upload(&texels);
    let mut download = ctx.create_download(4 * 4 * 4);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    {
        let mut copy = cmd.begin_copy_pass();
        copy.upload_to_texture(
            &TextureTransferInfo::new(&upload, 0),
            &TextureRegion::whole(&src),
            false,
        );
        copy.copy_texture_to_texture(
            &TextureLocation::origin(&src),
            &TextureLocation {
                x: 2,
                y: 1,
                ..TextureLocation::origin(&dst)
            },
            2,
            2,
            1,
            false,
        );
        copy.download_from_texture(
            &TextureRegion::whole(&dst),
            &TextureTransferInfo::new(&download, 0),
        );
    }
    cmd.submit_and_acquire_fence().unwrap().wait().unwrap();

    let result = download.read::<u8>(0, 64).unwrap();
    let texel = |x: usize, y: usize| &result[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
    assert_eq!(texel(2, 1), &[1, 2, 3, 4]);
    assert_eq!(texel(3, 1), &[5, 6, 7, 8]);
    assert_eq!(texel(2, 2), &[9, 10, 11, 12]);
    assert_eq!(texel(3, 2), &[13, 14, 15, 16]);
    assert_eq!(texel(0, 0), &[0, 0, 0, 0]);
}

/// Writing a transfer buffer with cycling while an upload from it is queued
/// leaves the queued upload reading the old contents.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_transfer_cycle_preserves_queued_upload(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let buffer = ctx.create_buffer(4, BufferUsage::VERTEX);
    let mut upload = ctx.create_upload(&[1, 2, 3, 4]);

    ctx.backend.suspend_execution();
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass().upload_to_buffer(
        &TransferBufferLocation::new(&upload, 0),
        &BufferRegion::whole(&buffer),
        false,
    );
    cmd.submit().unwrap();

    upload.write(0, &[9u8, 9, 9, 9], true).unwrap();
    ctx.backend.resume_execution();
    ctx.device.wait_for_idle().unwrap();

    assert_eq!(ctx.read_buffer(&buffer, 4), vec![1, 2, 3, 4]);
    assert_eq!(upload.read::<u8>(0, 4).unwrap(), vec![9, 9, 9, 9]);
}

// ============================================================================
// Render Tests
// ============================================================================

/// A cleared color target reads back as the clear color.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_clear_color_target(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let target = ctx.create_color_target(4, 4);
    let mut download = ctx.create_download(64);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_render_pass(
        &[ColorTargetInfo::new(&target).with_clear(Color::new(1.0, 0.0, 0.0, 1.0))],
        None,
    )
    .unwrap()
    .end();
    cmd.begin_copy_pass().download_from_texture(
        &TextureRegion::whole(&target),
        &TextureTransferInfo::new(&download, 0),
    );
    cmd.submit_and_acquire_fence().unwrap().wait().unwrap();

    let pixels = download.read::<[u8; 4]>(0, 16).unwrap();
    assert!(pixels.iter().all(|p| *p == [255, 0, 0, 255]), "{pixels:?}");
}

/// Draws are counted; draws without a pipeline never reach the backend.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_draw_statistics(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let target = ctx.create_color_target(8, 8);
    let pipeline = ctx.create_pipeline(TextureFormat::Rgba8Unorm);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    {
        let mut pass = cmd
            .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
            .unwrap();
        pass.draw_primitives(3, 1, 0, 0);
        pass.bind_graphics_pipeline(&pipeline);
        pass.draw_primitives(3, 1, 0, 0);
        pass.draw_primitives(6, 2, 0, 0);
    }
    cmd.submit().unwrap();
    ctx.device.wait_for_idle().unwrap();

    let stats = ctx.backend.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.validation_errors, 0);
    assert_eq!(stats.submissions_completed, 1);
}

/// Indirect draws read their arguments from the buffer at execution time.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_indirect_draws(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let target = ctx.create_color_target(8, 8);
    let pipeline = ctx.create_pipeline(TextureFormat::Rgba8Unorm);
    let args = [DrawIndirectArgs::new(3, 1), DrawIndirectArgs::new(6, 4)];
    let indirect = ctx.create_buffer(2 * DrawIndirectArgs::SIZE, BufferUsage::INDIRECT);
    ctx.upload_buffer(&indirect, bytemuck::cast_slice(&args));

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    {
        let mut pass = cmd
            .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
            .unwrap();
        pass.bind_graphics_pipeline(&pipeline);
        pass.draw_primitives_indirect(&indirect, 0, 2);
    }
    cmd.submit().unwrap();
    ctx.device.wait_for_idle().unwrap();

    assert_eq!(ctx.backend.stats().draw_calls, 2);
}

/// Indexed draws need an index buffer bound in the pass.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_indexed_draw_needs_index_buffer(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let target = ctx.create_color_target(8, 8);
    let pipeline = ctx.create_pipeline(TextureFormat::Rgba8Unorm);
    let indices = ctx.create_buffer(12, BufferUsage::INDEX);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    {
        let mut pass = cmd
            .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
            .unwrap();
        pass.bind_graphics_pipeline(&pipeline);
        pass.draw_indexed_primitives(3, 1, 0, 0, 0);
        pass.bind_index_buffer(
            BufferBinding::new(&indices, 0),
            lumen_gpu::IndexElementSize::Sixteen,
        );
        pass.draw_indexed_primitives(6, 1, 0, 0, 0);
    }
    assert_eq!(cmd.commands().draw_count(), 1);
    cmd.submit().unwrap();
    ctx.device.wait_for_idle().unwrap();
    assert_eq!(ctx.backend.stats().draw_calls, 1);
}

/// Mipmap generation blits once per level below the first.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_generate_mipmaps_and_blit(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let texture = ctx
        .device
        .create_texture(
            &TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET,
            )
            .with_mip_levels(3),
        )
        .unwrap();
    let target = ctx.create_color_target(32, 32);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.generate_mipmaps(&texture);
    cmd.blit_texture(&BlitInfo::new(
        BlitRegion::level(&texture, 0, 0),
        BlitRegion::level(&target, 0, 0),
    ));
    cmd.submit().unwrap();
    ctx.device.wait_for_idle().unwrap();

    assert_eq!(ctx.backend.stats().blits, 3);
}

/// Blitting with a clear load op clears the whole destination level first.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_blit_clears_destination(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let src = ctx.create_color_target(2, 2);
    let dst = ctx.create_color_target(4, 4);
    let red: Vec<u8> = [255u8, 0, 0, 255].repeat(4);
    let upload = ctx.create_upload(&red);
    let mut download = ctx.create_download(4 * 4 * 4);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass().upload_to_texture(
        &TextureTransferInfo::new(&upload, 0),
        &TextureRegion::whole(&src),
        false,
    );
    cmd.blit_texture(
        &BlitInfo::new(
            BlitRegion::level(&src, 0, 0),
            BlitRegion {
                width: 2,
                height: 2,
                ..BlitRegion::level(&dst, 0, 0)
            },
        )
        .with_clear(Color::WHITE),
    );
    cmd.begin_copy_pass().download_from_texture(
        &TextureRegion::whole(&dst),
        &TextureTransferInfo::new(&download, 0),
    );
    cmd.submit_and_acquire_fence().unwrap().wait().unwrap();

    let result = download.read::<u8>(0, 64).unwrap();
    let texel = |x: usize, y: usize| &result[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
    assert_eq!(texel(0, 0), &[255, 0, 0, 255]);
    assert_eq!(texel(1, 1), &[255, 0, 0, 255]);
    assert_eq!(texel(3, 3), &[255, 255, 255, 255]);
    assert_eq!(texel(2, 0), &[255, 255, 255, 255]);
    assert_eq!(ctx.backend.stats().blits, 1);
}

/// Texture transfers recorded with regions outside the texture.
#[derive(Debug, Clone, Copy)]
enum OversizedRegion {
    BlitDestination,
    Upload,
    Download,
    TextureCopy,
}

/// Out-of-range texture regions are skipped at execution and counted; the
/// queue keeps running afterwards.
#[rstest]
#[case::blit(OversizedRegion::BlitDestination)]
#[case::upload(OversizedRegion::Upload)]
#[case::download(OversizedRegion::Download)]
#[case::texture_copy(OversizedRegion::TextureCopy)]
fn test_oversized_texture_region_is_skipped(
    #[case] region: OversizedRegion,
    #[values(Backend::Dummy, Backend::DelayedDummy)] backend: Backend,
) {
    const HUGE: u32 = 70_000;
    let ctx = TestContext::new(backend);
    let src = ctx.create_color_target(4, 4);
    let dst = ctx.create_color_target(4, 4);
    let upload = ctx.create_upload(&generate_test_pattern(64));
    let download = ctx.create_download(64);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    match region {
        OversizedRegion::BlitDestination => cmd.blit_texture(&BlitInfo::new(
            BlitRegion::level(&src, 0, 0),
            BlitRegion {
                width: HUGE,
                height: HUGE,
                ..BlitRegion::level(&dst, 0, 0)
            },
        )),
        OversizedRegion::Upload => cmd.begin_copy_pass().upload_to_texture(
            &TextureTransferInfo::new(&upload, 0),
            &TextureRegion {
                height: HUGE,
                depth: HUGE,
                ..TextureRegion::whole(&dst)
            },
            false,
        ),
        OversizedRegion::Download => cmd.begin_copy_pass().download_from_texture(
            &TextureRegion {
                width: HUGE,
                ..TextureRegion::whole(&src)
            },
            &TextureTransferInfo::new(&download, 0),
        ),
        OversizedRegion::TextureCopy => cmd.begin_copy_pass().copy_texture_to_texture(
            &TextureLocation::origin(&src),
            &TextureLocation {
                x: 3,
                ..TextureLocation::origin(&dst)
            },
            2,
            2,
            1,
            false,
        ),
    }
    let fence = cmd.submit_and_acquire_fence().unwrap();
    fence.wait().unwrap();
    assert!(fence.query());
    assert_eq!(ctx.backend.stats().validation_errors, 1);

    // Later submissions still execute.
    let next = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();
    ctx.device.wait_for_idle().unwrap();
    assert!(next.query());
    assert_eq!(ctx.backend.stats().submissions_completed, 2);
}

// ============================================================================
// Synchronization Tests
// ============================================================================

/// Waiting for all fences returns only after every submission completed.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_wait_for_all_fences(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    ctx.backend.suspend_execution();
    let first = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();
    let second = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();
    assert!(!first.query());
    assert!(!second.query());

    ctx.backend.resume_execution();
    ctx.device.wait_for_fences(&[&first, &second], true).unwrap();
    assert!(first.query());
    assert!(second.query());
}

/// Waiting for any fence returns as soon as one is signalled.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_wait_for_any_fence(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let done = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();
    done.wait().unwrap();

    ctx.backend.suspend_execution();
    let pending = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();
    ctx.device.wait_for_fences(&[&pending, &done], false).unwrap();
    assert!(!pending.query());

    ctx.backend.resume_execution();
    pending.wait().unwrap();
}

/// A cancelled command buffer executes nothing and does not block idle waits.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_cancel_then_idle(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let buffer = ctx.create_buffer(16, BufferUsage::VERTEX);
    let upload = ctx.create_upload(&[7; 16]);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass().upload_to_buffer(
        &TransferBufferLocation::new(&upload, 0),
        &BufferRegion::whole(&buffer),
        false,
    );
    cmd.cancel();
    ctx.device.wait_for_idle().unwrap();

    let stats = ctx.backend.stats();
    assert_eq!(stats.submissions_completed, 0);
    assert_eq!(stats.copy_operations, 0);
    assert_eq!(ctx.read_buffer(&buffer, 16), vec![0; 16]);
}

/// Submitting while a transfer buffer it uses is mapped fails.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_submit_with_mapped_transfer_buffer(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let buffer = ctx.create_buffer(16, BufferUsage::VERTEX);
    let mut upload = ctx.create_upload(&[1; 16]);
    let location = TransferBufferLocation::new(&upload, 0);
    let mapping = upload.map(false).unwrap();

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    cmd.begin_copy_pass()
        .upload_to_buffer(&location, &BufferRegion::whole(&buffer), false);
    assert!(matches!(cmd.submit(), Err(GpuError::InvalidState(_))));
    drop(mapping);
}

// ============================================================================
// Lifetime Tests
// ============================================================================

/// Releasing a resource twice is a no-op.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_release_is_idempotent(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let before = ctx.backend.live_resource_count();
    let mut buffer = ctx.create_buffer(64, BufferUsage::VERTEX);
    let mut texture = ctx.create_color_target(4, 4);
    assert_eq!(ctx.backend.live_resource_count(), before + 2);

    buffer.release();
    buffer.release();
    texture.release();
    drop(texture);
    assert!(buffer.is_released());
    assert_eq!(ctx.backend.live_resource_count(), before);
}

/// Resources outliving a destroyed device release nothing and do not panic.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_destroy_with_live_resources(#[case] backend: Backend) {
    let mut ctx = TestContext::new(backend);
    let mut buffer = ctx.create_buffer(64, BufferUsage::VERTEX);
    let _fence = ctx
        .device
        .acquire_command_buffer()
        .unwrap()
        .submit_and_acquire_fence()
        .unwrap();

    ctx.device.destroy();
    ctx.device.destroy();
    assert!(ctx.device.is_destroyed());
    assert!(matches!(
        ctx.device.acquire_command_buffer(),
        Err(GpuError::DeviceDestroyed)
    ));
    buffer.release();
    assert_eq!(ctx.backend.live_resource_count(), 0);
}

/// Dropping a device whose queue is suspended runs the queued work and returns.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_drop_device_with_suspended_queue(#[case] backend: Backend) {
    let TestContext { backend, device } = TestContext::new(backend);
    backend.suspend_execution();
    device.acquire_command_buffer().unwrap().submit().unwrap();
    assert_eq!(backend.stats().submissions_completed, 0);

    drop(device);
    assert_eq!(backend.stats().submissions_completed, 1);
}
