//! Camera controller system
//!
//! Host key and mouse state arrives as a [`CameraInput`] each tick; a
//! [`CameraController`] turns it into camera motion.

use glam::Vec2;

use super::Camera;

/// Input state for camera controllers, filled by the host each tick
#[derive(Debug, Clone, Default)]
pub struct CameraInput {
    /// W
    pub forward: bool,
    /// S
    pub backward: bool,
    /// A
    pub left: bool,
    /// D
    pub right: bool,

    /// Mouse delta since last tick (in pixels)
    pub mouse_delta: Vec2,

    /// Whether the look button is held
    pub mouse_look_active: bool,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-tick deltas (call after update)
    pub fn reset_deltas(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }
}

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;
}

/// First-person walk camera
///
/// - W/S: walk forward/backward
/// - A/D: strafe left/right
/// - Mouse drag: pitch and yaw
pub struct FirstPersonController {
    /// Movement speed in units per second
    pub move_speed: f32,
    /// Mouse sensitivity in degrees per pixel
    pub degrees_per_pixel: f32,
}

impl Default for FirstPersonController {
    fn default() -> Self {
        Self {
            move_speed: 10.0,
            degrees_per_pixel: 0.25,
        }
    }
}

impl FirstPersonController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom speed settings
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }
}

impl CameraController for FirstPersonController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32) {
        if input.mouse_look_active && input.mouse_delta != Vec2::ZERO {
            let dx = (self.degrees_per_pixel * input.mouse_delta.x).to_radians();
            let dy = (self.degrees_per_pixel * input.mouse_delta.y).to_radians();
            // Screen y grows downward; dragging down looks down.
            camera.pitch(-dy);
            camera.rotate_y(-dx);
        }

        let step = self.move_speed * dt;
        if input.forward {
            camera.walk(step);
        }
        if input.backward {
            camera.walk(-step);
        }
        if input.right {
            camera.strafe(step);
        }
        if input.left {
            camera.strafe(-step);
        }
    }

    fn name(&self) -> &'static str {
        "FirstPerson"
    }
}
