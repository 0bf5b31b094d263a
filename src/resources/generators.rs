//! Procedural shape generation

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::backend::types::Vertex;
use crate::error::{AssetKind, EngineError, EngineResult};

use super::mesh::{GeometryProvider, MeshData};

/// Parameters of a procedural shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned box centered at the origin
    Box { width: f32, height: f32, depth: f32 },
    /// Flat grid on the XZ plane with `rows` x `columns` vertices
    Grid {
        width: f32,
        depth: f32,
        rows: u32,
        columns: u32,
    },
    /// UV sphere
    Sphere { radius: f32, slices: u32, stacks: u32 },
    /// Capped cylinder (or cone frustum) along Y, centered at the origin
    Cylinder {
        bottom_radius: f32,
        top_radius: f32,
        height: f32,
        slices: u32,
    },
}

/// Geometry provider producing a configured list of named shapes
#[derive(Debug, Clone, Default)]
pub struct ShapeGenerator {
    shapes: Vec<(String, Shape)>,
}

impl ShapeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, name: &str, shape: Shape) -> Self {
        self.shapes.push((name.to_string(), shape));
        self
    }

    /// Generate one shape
    pub fn generate(name: &str, shape: Shape) -> EngineResult<MeshData> {
        match shape {
            Shape::Box {
                width,
                height,
                depth,
            } => Ok(Self::create_box(name, width, height, depth)),
            Shape::Grid {
                width,
                depth,
                rows,
                columns,
            } => {
                if rows < 2 || columns < 2 {
                    return Err(EngineError::asset(
                        AssetKind::Geometry,
                        name,
                        format!("grid needs at least 2x2 vertices, got {rows}x{columns}"),
                    ));
                }
                Ok(Self::create_grid(name, width, depth, rows, columns))
            }
            Shape::Sphere {
                radius,
                slices,
                stacks,
            } => {
                if slices < 3 || stacks < 2 {
                    return Err(EngineError::asset(
                        AssetKind::Geometry,
                        name,
                        format!("sphere needs at least 3 slices and 2 stacks, got {slices}/{stacks}"),
                    ));
                }
                Ok(Self::create_sphere(name, radius, slices, stacks))
            }
            Shape::Cylinder {
                bottom_radius,
                top_radius,
                height,
                slices,
            } => {
                if slices < 3 {
                    return Err(EngineError::asset(
                        AssetKind::Geometry,
                        name,
                        format!("cylinder needs at least 3 slices, got {slices}"),
                    ));
                }
                Ok(Self::create_cylinder(
                    name,
                    bottom_radius,
                    top_radius,
                    height,
                    slices,
                ))
            }
        }
    }

    fn create_box(name: &str, width: f32, height: f32, depth: f32) -> MeshData {
        let mut mesh = MeshData::new(name);
        let h = Vec3::new(width, height, depth) * 0.5;

        // (normal, u axis, v axis) per face; v points down the face.
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::NEG_Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::NEG_Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::NEG_Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::NEG_Y),
            (Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
        ];

        for (face, (normal, u_axis, v_axis)) in faces.into_iter().enumerate() {
            let corners = [
                (Vec2::new(0.0, 1.0), -u_axis + v_axis),
                (Vec2::new(1.0, 1.0), u_axis + v_axis),
                (Vec2::new(1.0, 0.0), u_axis - v_axis),
                (Vec2::new(0.0, 0.0), -u_axis - v_axis),
            ];
            for (uv, offset) in corners {
                mesh.vertices
                    .push(Vertex::new((normal + offset) * h, normal, uv));
            }
            let base = face as u32 * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    fn create_grid(name: &str, width: f32, depth: f32, rows: u32, columns: u32) -> MeshData {
        let mut mesh = MeshData::new(name);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let dx = width / (columns - 1) as f32;
        let dz = depth / (rows - 1) as f32;

        for row in 0..rows {
            for column in 0..columns {
                let x = -half_width + column as f32 * dx;
                let z = half_depth - row as f32 * dz;
                mesh.vertices.push(Vertex::new(
                    Vec3::new(x, 0.0, z),
                    Vec3::Y,
                    Vec2::new(
                        column as f32 / (columns - 1) as f32,
                        row as f32 / (rows - 1) as f32,
                    ),
                ));
            }
        }

        for row in 0..rows - 1 {
            for column in 0..columns - 1 {
                let current = row * columns + column;
                let next = current + columns;
                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    next,
                    current + 1,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    fn create_sphere(name: &str, radius: f32, slices: u32, stacks: u32) -> MeshData {
        let mut mesh = MeshData::new(name);

        let slice_angle = 2.0 * PI / slices as f32;
        let stack_angle = PI / stacks as f32;

        for stack in 0..=stacks {
            let phi = stack as f32 * stack_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for slice in 0..=slices {
                let theta = slice as f32 * slice_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
                mesh.vertices.push(Vertex::new(
                    normal * radius,
                    normal.normalize_or_zero(),
                    Vec2::new(
                        slice as f32 / slices as f32,
                        stack as f32 / stacks as f32,
                    ),
                ));
            }
        }

        for stack in 0..stacks {
            for slice in 0..slices {
                let current = stack * (slices + 1) + slice;
                let next = current + slices + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }

    fn create_cylinder(
        name: &str,
        bottom_radius: f32,
        top_radius: f32,
        height: f32,
        slices: u32,
    ) -> MeshData {
        let mut mesh = MeshData::new(name);

        let half_height = height / 2.0;
        let angle_step = 2.0 * PI / slices as f32;
        let slope = (bottom_radius - top_radius) / height;

        // Side
        for i in 0..=slices {
            let angle = i as f32 * angle_step;
            let (sin, cos) = angle.sin_cos();
            let normal = Vec3::new(cos, slope, sin).normalize();
            let u = i as f32 / slices as f32;

            mesh.vertices.push(Vertex::new(
                Vec3::new(cos * bottom_radius, -half_height, sin * bottom_radius),
                normal,
                Vec2::new(u, 1.0),
            ));
            mesh.vertices.push(Vertex::new(
                Vec3::new(cos * top_radius, half_height, sin * top_radius),
                normal,
                Vec2::new(u, 0.0),
            ));
        }

        for i in 0..slices {
            let base = i * 2;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 1, base + 3, base + 2]);
        }

        // Caps
        for (y, radius, normal) in [
            (half_height, top_radius, Vec3::Y),
            (-half_height, bottom_radius, Vec3::NEG_Y),
        ] {
            let center = mesh.vertices.len() as u32;
            mesh.vertices
                .push(Vertex::new(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5)));

            for i in 0..=slices {
                let angle = i as f32 * angle_step;
                let (sin, cos) = angle.sin_cos();
                mesh.vertices.push(Vertex::new(
                    Vec3::new(cos * radius, y, sin * radius),
                    normal,
                    Vec2::new(0.5 + cos * 0.5, 0.5 + sin * 0.5),
                ));
            }

            for i in 0..slices {
                let a = center + 1 + i;
                if normal.y > 0.0 {
                    mesh.indices.extend_from_slice(&[center, a + 1, a]);
                } else {
                    mesh.indices.extend_from_slice(&[center, a, a + 1]);
                }
            }
        }

        mesh
    }
}

impl GeometryProvider for ShapeGenerator {
    fn meshes(&self) -> EngineResult<Vec<MeshData>> {
        self.shapes
            .iter()
            .map(|(name, shape)| Self::generate(name, *shape))
            .collect()
    }
}
