//! GPU-visible constant layouts
//!
//! Matrices are stored transposed so shaders can read them row-major.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use static_assertions::const_assert_eq;

/// Maximum lights in one pass
pub const MAX_LIGHTS: usize = 16;

/// Number of per-pass constant blocks per frame: the main camera plus six cube faces
pub const PASS_COUNT: usize = 7;

/// Pass constant index of the main camera
pub const MAIN_PASS_INDEX: usize = 0;

/// Pass constant index of a cube face (array-layer order)
pub fn cube_face_pass_index(face: usize) -> usize {
    assert!(face < 6, "cube face {face} out of range");
    1 + face
}

/// Per-object constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: Mat4,
    pub tex_transform: Mat4,
    pub material_index: u32,
    pub _padding: [u32; 3],
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
            material_index: 0,
            _padding: [0; 3],
        }
    }
}

impl ObjectConstants {
    /// Pack untransposed matrices for upload
    pub fn new(world: Mat4, tex_transform: Mat4, material_index: u32) -> Self {
        Self {
            world: world.transpose(),
            tex_transform: tex_transform.transpose(),
            material_index,
            _padding: [0; 3],
        }
    }
}

/// One light as the shaders see it.
///
/// Directional lights only use `strength` and `direction`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightData {
    pub strength: Vec3,
    pub falloff_start: f32,
    pub direction: Vec3,
    pub falloff_end: f32,
    pub position: Vec3,
    pub spot_power: f32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            strength: Vec3::ZERO,
            falloff_start: 1.0,
            direction: Vec3::NEG_Y,
            falloff_end: 10.0,
            position: Vec3::ZERO,
            spot_power: 64.0,
        }
    }
}

/// Per-view constants: camera matrices, target size, timing and lighting
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub eye_pos: Vec3,
    pub _padding0: f32,
    pub render_target_size: Vec2,
    pub inv_render_target_size: Vec2,
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: Vec4,
    pub lights: [LightData; MAX_LIGHTS],
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            inv_proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
            eye_pos: Vec3::ZERO,
            _padding0: 0.0,
            render_target_size: Vec2::ZERO,
            inv_render_target_size: Vec2::ZERO,
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: Vec4::new(0.0, 0.0, 0.0, 1.0),
            lights: [LightData::default(); MAX_LIGHTS],
        }
    }
}

/// Material entry of the structured material buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialData {
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub mat_transform: Mat4,
    pub diffuse_map_index: u32,
    pub _padding: [u32; 3],
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.64,
            mat_transform: Mat4::IDENTITY,
            diffuse_map_index: 0,
            _padding: [0; 3],
        }
    }
}

const_assert_eq!(std::mem::size_of::<ObjectConstants>() % 16, 0);
const_assert_eq!(std::mem::size_of::<LightData>(), 48);
const_assert_eq!(std::mem::size_of::<PassConstants>() % 16, 0);
const_assert_eq!(std::mem::size_of::<MaterialData>() % 16, 0);
