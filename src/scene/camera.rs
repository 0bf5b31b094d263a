//! Camera system

use glam::{Mat3, Mat4, Vec3};

/// Coordinate convention of a camera's view and projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handedness {
    /// Views look down -Z. Used by the main camera.
    #[default]
    Right,
    /// Views look down +Z, with +X to the right of the look direction.
    /// Cube map faces are addressed this way.
    Left,
}

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Projection {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 16.0 / 9.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn matrix_lh(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub handedness: Handedness,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 15.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::default(),
            handedness: Handedness::Right,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
            handedness: Handedness::Right,
        }
    }

    /// Point the camera from `position` at `target` with the given up hint
    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.target = target;
        self.up = up;
    }

    pub fn set_position(&mut self, position: Vec3) {
        let offset = self.target - self.position;
        self.position = position;
        self.target = position + offset;
    }

    /// Set the perspective frustum. `fov_y` is in radians.
    pub fn set_lens(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    /// Update aspect ratio for perspective projection
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.projection.aspect = width / height;
        }
    }

    pub fn near(&self) -> f32 {
        self.projection.near
    }

    pub fn far(&self) -> f32 {
        self.projection.far
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        match self.handedness {
            Handedness::Right => Mat4::look_at_rh(self.position, self.target, self.up),
            Handedness::Left => Mat4::look_at_lh(self.position, self.target, self.up),
        }
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        match self.handedness {
            Handedness::Right => self.projection.matrix(),
            Handedness::Left => self.projection.matrix_lh(),
        }
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Get the right direction
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Move along the look direction
    pub fn walk(&mut self, distance: f32) {
        let step = self.forward() * distance;
        self.position += step;
        self.target += step;
    }

    /// Move along the right vector
    pub fn strafe(&mut self, distance: f32) {
        let step = self.right() * distance;
        self.position += step;
        self.target += step;
    }

    /// Rotate the look and up vectors about the right vector
    pub fn pitch(&mut self, angle: f32) {
        let rotation = Mat3::from_axis_angle(self.right(), angle);
        self.rotate_view(rotation);
    }

    /// Rotate the look and up vectors about the world Y axis
    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate_view(Mat3::from_rotation_y(angle));
    }

    fn rotate_view(&mut self, rotation: Mat3) {
        let distance = (self.target - self.position).length();
        let forward = rotation * self.forward();
        self.up = (rotation * self.up).normalize();
        self.target = self.position + forward * distance;
    }
}

/// One face of a cube map, in the fixed array-layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const COUNT: usize = 6;

    /// Faces in array-layer order
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look direction
    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// Up vector. The Y faces look along Y, so they use Z instead.
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::NEG_Z,
            CubeFace::NegativeY => Vec3::Z,
            _ => Vec3::Y,
        }
    }
}

/// Build the six capture cameras around `center`.
///
/// Each camera has a 90 degree field of view and a square aspect so the six
/// frusta tile the full sphere of directions. The cameras are left-handed so
/// each face image is laid out the way cube map sampling addresses it: for
/// +X, screen right is -Z; for +Y and +Z, screen right is +X.
///
/// The mirrored views flip triangle winding, so face passes cull front faces.
pub fn cube_face_cameras(center: Vec3, near: f32, far: f32) -> [Camera; 6] {
    CubeFace::ALL.map(|face| {
        let mut camera = Camera {
            handedness: Handedness::Left,
            ..Camera::default()
        };
        camera.look_at(center, center + face.direction(), face.up());
        camera.set_lens(std::f32::consts::FRAC_PI_2, 1.0, near, far);
        camera
    })
}
