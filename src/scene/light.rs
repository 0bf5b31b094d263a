//! Light types for the scene

use glam::{Vec3, Vec4};

use crate::pipeline::constants::{LightData, MAX_LIGHTS};

/// Directional light (like the sun)
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    /// Radiant strength per color channel
    pub strength: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            strength: Vec3::ONE,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, strength: Vec3) -> Self {
        Self {
            direction: direction.normalize(),
            strength,
        }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> LightData {
        LightData {
            strength: self.strength,
            direction: self.direction,
            ..LightData::default()
        }
    }
}

/// Ambient term plus the directional key/fill/back lights shared by every pass
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLighting {
    pub ambient: Vec4,
    pub directional: Vec<DirectionalLight>,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.25, 0.25, 0.35, 1.0),
            directional: vec![
                DirectionalLight::new(
                    Vec3::new(0.57735, -0.57735, 0.57735),
                    Vec3::new(0.8, 0.8, 0.8),
                ),
                DirectionalLight::new(
                    Vec3::new(-0.57735, -0.57735, 0.57735),
                    Vec3::new(0.4, 0.4, 0.4),
                ),
                DirectionalLight::new(
                    Vec3::new(0.0, -0.707, -0.707),
                    Vec3::new(0.2, 0.2, 0.2),
                ),
            ],
        }
    }
}

impl SceneLighting {
    /// Pack lights into the fixed-size GPU array. Extra lights are dropped.
    pub fn gpu_lights(&self) -> [LightData; MAX_LIGHTS] {
        if self.directional.len() > MAX_LIGHTS {
            log::warn!(
                "{} directional lights exceed the limit of {MAX_LIGHTS}; extra lights ignored",
                self.directional.len()
            );
        }
        let mut lights = [LightData::default(); MAX_LIGHTS];
        for (slot, light) in lights.iter_mut().zip(&self.directional) {
            *slot = light.to_gpu_data();
        }
        lights
    }
}
