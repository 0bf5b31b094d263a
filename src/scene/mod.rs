//! Scene management

mod camera;
mod camera_controller;
pub mod demo;
mod light;
mod render_item;

pub use camera::*;
pub use camera_controller::*;
pub use light::*;
pub use render_item::*;

use glam::Vec3;

use crate::resources::ResourceRegistry;

/// Everything the engine draws, built once by the scene-setup stage.
///
/// The engine only reads the scene; the host mutates the catalog and
/// materials between frames, before [`Engine::update`](crate::Engine::update).
#[derive(Debug, Default)]
pub struct Scene {
    pub registry: ResourceRegistry,
    pub catalog: RenderItemCatalog,
    pub lighting: SceneLighting,
    /// Registry names of the 2D textures bound to the diffuse table, in slot order
    pub diffuse_textures: Vec<String>,
    /// Registry name of the static background cube texture
    pub sky_cube: String,
    /// World position the cube faces are captured from.
    ///
    /// Read once when the engine is created; moving it later has no effect
    /// on the captured faces.
    pub capture_center: Vec3,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }
}
