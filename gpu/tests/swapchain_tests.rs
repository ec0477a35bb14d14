//! Window and swapchain integration tests.
//!
//! Windows are simulated by the dummy backend: tests register them with
//! [`DummyBackend::add_window`](lumen_gpu::DummyBackend::add_window), claim
//! them on the device and inspect what was presented.
//!
//! # Running This Test
//!
//! ```bash
//! cargo test --test swapchain_tests
//! ```

mod common;

use rstest::rstest;

use common::{Backend, TestContext};
use lumen_gpu::{
    Color, ColorTargetInfo, GpuError, PresentMode, SwapchainComposition, TextureFormat,
};

/// Number of frames to render in the present loop test.
const FRAMES_TO_RENDER: u64 = 5;

/// Clear the swapchain image of every frame and present it.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_present_loop(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(8, 4);
    ctx.device.claim_window(window).unwrap();
    assert_eq!(
        ctx.device.swapchain_texture_format(window).unwrap(),
        TextureFormat::Bgra8Unorm
    );

    for _ in 0..FRAMES_TO_RENDER {
        let mut cmd = ctx.device.acquire_command_buffer().unwrap();
        let frame = cmd
            .wait_and_acquire_swapchain_texture(window)
            .unwrap()
            .expect("a frame should become available");
        assert_eq!((frame.width, frame.height), (8, 4));
        cmd.begin_render_pass(
            &[ColorTargetInfo::new(&frame).with_clear(Color::new(1.0, 0.0, 0.0, 1.0))],
            None,
        )
        .unwrap()
        .end();
        cmd.submit().unwrap();
    }
    ctx.device.wait_for_idle().unwrap();

    assert_eq!(ctx.backend.presented_count(window), FRAMES_TO_RENDER);
    let pixels = ctx.backend.presented_frame(window).unwrap();
    assert_eq!(pixels.len(), 8 * 4 * 4);
    assert!(pixels.chunks(4).all(|p| p == [0, 0, 255, 255]));
}

/// A swapchain target whose window was released cannot begin a pass.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_render_to_released_window(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(16, 16);
    ctx.device.claim_window(window).unwrap();

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let frame = cmd.acquire_swapchain_texture(window).unwrap().unwrap();
    ctx.device.release_window(window);

    let result = cmd.begin_render_pass(&[ColorTargetInfo::new(&frame)], None);
    assert!(matches!(result, Err(GpuError::WindowNotClaimed)));
    drop(result);
    cmd.cancel();
    assert_eq!(ctx.backend.presented_count(window), 0);
}

/// Acquiring from a window that was never claimed fails.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_acquire_unclaimed_window(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(16, 16);
    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    assert!(matches!(
        cmd.acquire_swapchain_texture(window),
        Err(GpuError::WindowNotClaimed)
    ));
    cmd.cancel();
}

/// Claiming twice is rejected; releasing an unclaimed window is a no-op.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_claim_twice(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(16, 16);
    ctx.device.claim_window(window).unwrap();
    assert!(matches!(
        ctx.device.claim_window(window),
        Err(GpuError::InvalidState(_))
    ));
    ctx.device.release_window(window);
    ctx.device.release_window(window);
    assert!(!ctx.device.is_window_claimed(window));
}

/// Resizing invalidates the swapchain once; the next acquire sees the new size.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_resize_recreates_swapchain(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(16, 16);
    ctx.device.claim_window(window).unwrap();
    ctx.backend.resize_window(window, 32, 8);

    let mut cmd = ctx.device.acquire_command_buffer().unwrap();
    let err = cmd.acquire_swapchain_texture(window).unwrap_err();
    assert!(err.requires_swapchain_recreation());
    let frame = cmd.acquire_swapchain_texture(window).unwrap().unwrap();
    assert_eq!((frame.width, frame.height), (32, 8));
    cmd.cancel();
}

/// With one frame in flight, a second acquire fails until the first presents.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::delayed(Backend::DelayedDummy)]
fn test_frames_in_flight_limit(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(4, 4);
    ctx.device.claim_window(window).unwrap();
    ctx.device.set_allowed_frames_in_flight(1).unwrap();

    ctx.backend.suspend_execution();
    let mut first = ctx.device.acquire_command_buffer().unwrap();
    assert!(first.acquire_swapchain_texture(window).unwrap().is_some());
    first.submit().unwrap();

    let mut second = ctx.device.acquire_command_buffer().unwrap();
    assert!(second.acquire_swapchain_texture(window).unwrap().is_none());

    ctx.backend.resume_execution();
    assert!(
        second
            .wait_and_acquire_swapchain_texture(window)
            .unwrap()
            .is_some()
    );
    second.cancel();
    ctx.device.wait_for_idle().unwrap();
    assert_eq!(ctx.backend.presented_count(window), 1);
}

/// Frames-in-flight outside 1..=3 are rejected.
#[rstest]
#[case::zero(0)]
#[case::four(4)]
fn test_frames_in_flight_range(#[case] frames: u32) {
    let ctx = TestContext::new(Backend::Dummy);
    assert!(matches!(
        ctx.device.set_allowed_frames_in_flight(frames),
        Err(GpuError::InvalidParameter(_))
    ));
}

/// Supported compositions and present modes.
#[rstest]
#[case::dummy(Backend::Dummy)]
fn test_swapchain_parameters(#[case] backend: Backend) {
    let ctx = TestContext::new(backend);
    let window = ctx.backend.add_window(4, 4);
    assert!(!ctx.device.window_supports_present_mode(window, PresentMode::Vsync));
    ctx.device.claim_window(window).unwrap();

    assert!(
        ctx.device
            .window_supports_swapchain_composition(window, SwapchainComposition::SdrLinear)
    );
    assert!(ctx.device.window_supports_present_mode(window, PresentMode::Immediate));
    ctx.device
        .set_swapchain_parameters(window, SwapchainComposition::SdrLinear, PresentMode::Immediate)
        .unwrap();
    assert_eq!(
        ctx.device.swapchain_texture_format(window).unwrap(),
        TextureFormat::Bgra8UnormSrgb
    );
    assert!(
        ctx.device
            .set_swapchain_parameters(
                window,
                SwapchainComposition::HdrExtendedLinear,
                PresentMode::Vsync
            )
            .is_err()
    );
}
