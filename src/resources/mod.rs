//! Resource management
//!
//! Loading and registration of geometry, materials, textures, shaders and
//! pipeline configurations.

mod generators;
mod material;
mod mesh;
mod pipeline_state;
mod registry;
mod shader;
mod texture;

pub use generators::*;
pub use material::*;
pub use mesh::*;
pub use pipeline_state::*;
pub use registry::*;
pub use shader::*;
pub use texture::*;
