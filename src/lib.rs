//! Dynamic Cube Map - a frame-pipelined renderer with a real-time reflection pass
//!
//! Every frame renders the scene six times into an off-screen cube target and
//! then samples that cube on a reflective object in the main pass, while the
//! CPU prepares up to N-1 frames ahead of the GPU.
//!
//! # Features
//! - Ring of per-frame constant buffers gated by GPU fence values
//! - Generation-based propagation of changed object and material constants
//! - Cube capture pass producing a typed token consumed by the main pass
//! - Fixed-layout descriptor tables for textures, render targets and depth
//! - Backend trait with a headless recording backend for tests

pub mod backend;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod resources;
pub mod scene;

pub use backend::{DummyBackend, GraphicsBackend};
pub use engine::{Engine, FrameStats, FrameTime};
pub use error::{AssetKind, EngineError, EngineResult};
pub use scene::Scene;

use backend::TextureFormat;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial back buffer width
    pub width: u32,
    /// Initial back buffer height
    pub height: u32,
    /// Number of frame resource slots (frames the CPU may run ahead, plus one)
    pub frames_in_flight: usize,
    /// Edge length of each cube face in pixels. Fixed for the process lifetime.
    pub cube_map_size: u32,
    /// Must match the swap chain's format and `cube_color_format`; every
    /// pipeline is built once and used for both targets.
    pub back_buffer_format: TextureFormat,
    pub depth_format: TextureFormat,
    pub cube_color_format: TextureFormat,
    /// Clear color for the primary and cube targets
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Dynamic Cube Map".to_string(),
            width: 1280,
            height: 720,
            frames_in_flight: 3,
            cube_map_size: 512,
            back_buffer_format: TextureFormat::Rgba8Unorm,
            depth_format: TextureFormat::Depth24PlusStencil8,
            cube_color_format: TextureFormat::Rgba8Unorm,
            // LightSteelBlue
            clear_color: [0.690, 0.769, 0.871, 1.0],
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "back buffer size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frames_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        if self.cube_map_size == 0 {
            return Err(EngineError::InvalidConfig(
                "cube_map_size must be non-zero".into(),
            ));
        }
        if !self.depth_format.is_depth() {
            return Err(EngineError::InvalidConfig(format!(
                "{:?} is not a depth format",
                self.depth_format
            )));
        }
        if self.cube_color_format.is_depth() || self.back_buffer_format.is_depth() {
            return Err(EngineError::InvalidConfig(
                "color targets cannot use a depth format".into(),
            ));
        }
        if self.back_buffer_format != self.cube_color_format {
            return Err(EngineError::InvalidConfig(format!(
                "back buffer format {:?} differs from cube format {:?}",
                self.back_buffer_format, self.cube_color_format
            )));
        }
        Ok(())
    }
}

/// Install the `env_logger` backend, defaulting to `info`.
///
/// Safe to call more than once; later calls are ignored.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.frames_in_flight, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_frames() {
        let config = EngineConfig {
            frames_in_flight: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_rejects_color_depth_format() {
        let config = EngineConfig {
            depth_format: TextureFormat::Rgba8Unorm,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_mismatched_color_formats() {
        let config = EngineConfig {
            back_buffer_format: TextureFormat::Bgra8Unorm,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(ref msg) if msg.contains("Bgra8Unorm")));
    }
}
