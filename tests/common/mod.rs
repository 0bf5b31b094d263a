//! Shared fixtures for the engine integration tests.
//!
//! Every test runs against the dummy backend, which records each command
//! stream and validates resource states, so a broken barrier or an early
//! allocator reset shows up as a failed frame.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dynamic_cubemap::backend::{
    CommandStream, DummyBackend, DummyTimeline, RecordedCommand, TextureFormat, TimelineMode,
};
use dynamic_cubemap::resources::TargetFormats;
use dynamic_cubemap::scene::demo::{build_dynamic_cube_scene, headless_assets};
use dynamic_cubemap::{Engine, EngineConfig, EngineResult, FrameTime, Scene};

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;
pub const CUBE_SIZE: u32 = 64;

/// Engine, scene and a handle to the simulated GPU timeline
pub struct TestRig {
    pub engine: Engine<DummyBackend>,
    pub scene: Scene,
    pub timeline: DummyTimeline,
    pub frame: u32,
}

pub fn config(frames_in_flight: usize) -> EngineConfig {
    EngineConfig {
        width: WIDTH,
        height: HEIGHT,
        frames_in_flight,
        cube_map_size: CUBE_SIZE,
        ..Default::default()
    }
}

/// The demo scene with headless assets, uploaded to `backend`
pub fn demo_scene(backend: &mut DummyBackend, config: &EngineConfig) -> Scene {
    let (textures, shaders) = headless_assets();
    build_dynamic_cube_scene(
        backend,
        &textures,
        &shaders,
        TargetFormats {
            color: config.cube_color_format,
            depth: TextureFormat::Depth24PlusStencil8,
        },
    )
    .expect("demo scene")
}

/// Build the demo scene on a fresh dummy backend and hand both to a new engine.
pub fn rig(frames_in_flight: usize, mode: TimelineMode) -> TestRig {
    let mut backend = DummyBackend::with_timeline(WIDTH, HEIGHT, mode);
    let timeline = backend.timeline();
    let config = config(frames_in_flight);
    let scene = demo_scene(&mut backend, &config);
    let engine = Engine::new(backend, config, &scene).expect("engine");
    TestRig {
        engine,
        scene,
        timeline,
        frame: 0,
    }
}

/// Host time for frame `index` at 60 Hz
pub fn frame_time(index: u32) -> FrameTime {
    FrameTime {
        delta: 1.0 / 60.0,
        total: index as f32 / 60.0,
    }
}

impl TestRig {
    /// One Update/Draw tick
    pub fn tick(&mut self) -> EngineResult<()> {
        let time = frame_time(self.frame);
        self.frame += 1;
        self.engine.update(&time, &self.scene)?;
        self.engine.draw(&self.scene)
    }

    pub fn backend(&self) -> &DummyBackend {
        self.engine.backend()
    }

    pub fn last_stream(&self) -> &CommandStream {
        self.backend()
            .last_submission()
            .expect("at least one submitted frame")
    }
}

impl Drop for TestRig {
    fn drop(&mut self) {
        // Let the engine's shutdown flush finish on manual timelines.
        if !self.timeline.is_device_lost() {
            self.timeline.complete_all();
        }
    }
}

/// A thread playing the GPU: completes queued fence values after `latency`.
pub struct GpuThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl GpuThread {
    pub fn spawn(timeline: DummyTimeline, latency: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let mut completed = 0;
            while !flag.load(Ordering::Acquire) {
                if timeline.pending().is_empty() {
                    std::thread::sleep(Duration::from_micros(200));
                    continue;
                }
                std::thread::sleep(latency);
                if let Some(value) = timeline.complete_next() {
                    completed = value;
                }
            }
            completed
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the thread and return the last value it completed
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        self.handle
            .take()
            .map(|h| h.join().expect("gpu thread panicked"))
            .unwrap_or(0)
    }
}

impl Drop for GpuThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Index of the first command matching `predicate`
pub fn position(stream: &CommandStream, predicate: impl Fn(&RecordedCommand) -> bool) -> Option<usize> {
    stream.commands.iter().position(predicate)
}

/// Index of the last command matching `predicate`
pub fn last_position(
    stream: &CommandStream,
    predicate: impl Fn(&RecordedCommand) -> bool,
) -> Option<usize> {
    stream.commands.iter().rposition(predicate)
}
