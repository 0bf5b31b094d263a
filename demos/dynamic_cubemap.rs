//! # Dynamic Cube Map Demo
//!
//! Runs the dynamic cube map scene headless on the dummy backend:
//! - A thread stands in for the GPU and completes each frame after a delay
//! - The orbiter circles the mirror globe, which is re-captured every frame
//! - The camera walks slowly toward the globe
//!
//! ```text
//! cargo run --example dynamic_cubemap -- --frames 300 --frames-in-flight 3
//! ```
//!
//! Pass `--assets <dir>` to load `Textures/*.png` and `Shaders/*.cso` from
//! disk instead of the built-in procedural assets.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clap::Parser;

use dynamic_cubemap::backend::{DummyBackend, DummyTimeline, TimelineMode};
use dynamic_cubemap::resources::{FileShaderProvider, FileTextureProvider, TargetFormats};
use dynamic_cubemap::scene::demo::{animate, build_dynamic_cube_scene, headless_assets};
use dynamic_cubemap::scene::{CameraController, CameraInput, FirstPersonController};
use dynamic_cubemap::{Engine, EngineConfig, EngineResult, FrameTime, Scene};

#[derive(Parser, Debug)]
#[command(
    name = "Dynamic Cube Map",
    about = "Dynamic cube map reflection demo on a simulated GPU"
)]
struct Args {
    /// Number of frames to render before exiting.
    #[arg(long, default_value = "240")]
    frames: u64,

    /// Frame resource slots; the CPU runs at most this many minus one frames ahead.
    #[arg(long, default_value = "3")]
    frames_in_flight: usize,

    /// Edge length of each cube face in pixels.
    #[arg(long, default_value = "512")]
    cube_size: u32,

    /// Back buffer width in pixels.
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Back buffer height in pixels.
    #[arg(long, default_value = "720")]
    height: u32,

    /// Simulated GPU time per frame in milliseconds.
    #[arg(long, default_value = "4")]
    gpu_latency_ms: u64,

    /// Simulate a device loss after this many frames.
    #[arg(long)]
    lose_device_after: Option<u64>,

    /// Asset root with Textures/ and Shaders/ subdirectories.
    #[arg(long)]
    assets: Option<PathBuf>,
}

/// Completes queued fence values on its own thread, like a GPU would.
struct SimulatedGpu {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedGpu {
    fn spawn(timeline: DummyTimeline, latency: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) && !timeline.is_device_lost() {
                if timeline.pending().is_empty() {
                    std::thread::sleep(Duration::from_micros(250));
                    continue;
                }
                std::thread::sleep(latency);
                if let Some(value) = timeline.complete_next() {
                    log::trace!("GPU finished frame {value}");
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SimulatedGpu {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn build_scene(
    args: &Args,
    backend: &mut DummyBackend,
    config: &EngineConfig,
) -> EngineResult<Scene> {
    let formats = TargetFormats {
        color: config.cube_color_format,
        depth: config.depth_format,
    };
    match &args.assets {
        Some(root) => {
            log::info!("Loading assets from {}", root.display());
            let textures = FileTextureProvider::new(root.join("Textures"));
            let shaders = FileShaderProvider::new(root.join("Shaders"));
            build_dynamic_cube_scene(backend, &textures, &shaders, formats)
        }
        None => {
            let (textures, shaders) = headless_assets();
            build_dynamic_cube_scene(backend, &textures, &shaders, formats)
        }
    }
}

fn run(args: &Args) -> EngineResult<()> {
    let config = EngineConfig {
        width: args.width,
        height: args.height,
        frames_in_flight: args.frames_in_flight,
        cube_map_size: args.cube_size,
        ..Default::default()
    };

    let mut backend = DummyBackend::with_timeline(args.width, args.height, TimelineMode::Manual);
    let timeline = backend.timeline();
    // Declared before the engine so it outlives the engine's shutdown flush.
    let _gpu = SimulatedGpu::spawn(
        timeline.clone(),
        Duration::from_millis(args.gpu_latency_ms),
    );

    let mut scene = build_scene(args, &mut backend, &config)?;
    let mut engine = Engine::new(backend, config, &scene)?;

    let mut controller = FirstPersonController::new().with_speed(0.5);
    let input = CameraInput {
        forward: true,
        ..Default::default()
    };

    let start = Instant::now();
    let mut last = start;
    for frame in 0..args.frames {
        if args.lose_device_after == Some(frame) {
            log::warn!("Simulating device loss at frame {frame}");
            timeline.lose_device();
        }

        let now = Instant::now();
        let time = FrameTime {
            delta: (now - last).as_secs_f32(),
            total: (now - start).as_secs_f32(),
        };
        last = now;

        controller.update(engine.camera_mut(), &input, time.delta);
        animate(&mut scene, time.total);

        engine.update(&time, &scene)?;
        engine.draw(&scene)?;
    }

    let stats = engine.frame_stats();
    log::info!(
        "Rendered {} frames in {:.2}s ({} presented)",
        stats.total_frames(),
        start.elapsed().as_secs_f32(),
        engine.backend().frames_presented()
    );
    engine.shutdown()
}

fn main() -> ExitCode {
    dynamic_cubemap::init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.is_fatal() {
                log::error!("Fatal: {err}");
            } else {
                log::error!("{err}");
            }
            ExitCode::FAILURE
        }
    }
}
