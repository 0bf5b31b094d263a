//! The dynamic cube map demo scene.
//!
//! A mirror globe at the capture center reflects a textured room of columns,
//! a box and a small orbiting object, all under a sky sphere.

use glam::{Mat4, Vec3, Vec4};

use crate::backend::GraphicsBackend;
use crate::error::EngineResult;
use crate::resources::{
    capture_opaque_pipeline, opaque_pipeline, sky_pipeline, InlineShaderProvider, Material, MeshGeometryBuilder,
    Procedural, ProceduralTextureProvider, ResourceRegistry, Shape, ShapeGenerator, ShaderKey,
    ShaderProvider, TargetFormats, TextureKind, TextureProvider, CAPTURE_OPAQUE_PIPELINE, OPAQUE_PIPELINE,
    SKY_PIPELINE,
};

use super::{ItemId, RenderItem, RenderItemCatalog, RenderLayer, Scene, SceneLighting};

pub const BRICKS_TEXTURE: &str = "bricks2.png";
pub const TILE_TEXTURE: &str = "tile.png";
pub const WHITE_TEXTURE: &str = "white1x1.png";
pub const SKY_TEXTURE: &str = "grasscube1024.png";

/// Name of the shared geometry holding every demo shape
pub const SHAPES_GEOMETRY: &str = "shapeGeo";
/// Name of the animated item
pub const ORBITER: &str = "orbiter";
/// Name of the mirror globe
pub const GLOBE: &str = "globe";

/// Where the globe sits and the cube faces are captured from
pub const CAPTURE_CENTER: Vec3 = Vec3::new(0.0, 2.0, 0.0);

/// Registry name and source of each compiled shader
pub fn shader_keys() -> [(&'static str, ShaderKey); 4] {
    [
        ("standardVS", ShaderKey::new("Default.hlsl", "VS", "vs_5_1")),
        ("opaquePS", ShaderKey::new("Default.hlsl", "PS", "ps_5_1")),
        ("skyVS", ShaderKey::new("Sky.hlsl", "VS", "vs_5_1")),
        ("skyPS", ShaderKey::new("Sky.hlsl", "PS", "ps_5_1")),
    ]
}

/// In-memory textures and placeholder bytecode for running without assets
pub fn headless_assets() -> (ProceduralTextureProvider, InlineShaderProvider) {
    let textures = ProceduralTextureProvider::new()
        .with_texture(
            BRICKS_TEXTURE,
            Procedural::Checker {
                size: 64,
                even: [150, 60, 40, 255],
                odd: [200, 200, 190, 255],
            },
        )
        .with_texture(
            TILE_TEXTURE,
            Procedural::Checker {
                size: 64,
                even: [230, 230, 230, 255],
                odd: [40, 40, 40, 255],
            },
        )
        .with_texture(WHITE_TEXTURE, Procedural::Solid([255; 4]))
        .with_texture(SKY_TEXTURE, Procedural::Solid([120, 170, 230, 255]));

    let shaders = shader_keys()
        .into_iter()
        .fold(InlineShaderProvider::new(), |provider, (name, key)| {
            provider.with_blob(key, name.as_bytes())
        });

    (textures, shaders)
}

/// Load every asset and lay out the demo scene.
///
/// Fails with [`EngineError::AssetLoad`](crate::EngineError::AssetLoad) if a
/// texture or shader is missing.
pub fn build_dynamic_cube_scene(
    backend: &mut dyn GraphicsBackend,
    textures: &dyn TextureProvider,
    shaders: &dyn ShaderProvider,
    formats: TargetFormats,
) -> EngineResult<Scene> {
    let mut registry = ResourceRegistry::new();

    let diffuse_textures = vec![
        BRICKS_TEXTURE.to_string(),
        TILE_TEXTURE.to_string(),
        WHITE_TEXTURE.to_string(),
    ];
    for name in &diffuse_textures {
        registry.load_texture(backend, textures, name, TextureKind::Texture2d)?;
    }
    registry.load_texture(backend, textures, SKY_TEXTURE, TextureKind::Cube)?;

    for (name, key) in shader_keys() {
        registry.load_shader(shaders, name, &key)?;
    }
    registry.add_pipeline(
        OPAQUE_PIPELINE,
        opaque_pipeline(
            registry.shader("standardVS")?.clone(),
            registry.shader("opaquePS")?.clone(),
            formats,
        ),
    );
    registry.add_pipeline(
        CAPTURE_OPAQUE_PIPELINE,
        capture_opaque_pipeline(
            registry.shader("standardVS")?.clone(),
            registry.shader("opaquePS")?.clone(),
            formats,
        ),
    );
    registry.add_pipeline(
        SKY_PIPELINE,
        sky_pipeline(
            registry.shader("skyVS")?.clone(),
            registry.shader("skyPS")?.clone(),
            formats,
        ),
    );

    build_shape_geometry(backend, &mut registry)?;
    build_materials(&mut registry)?;
    let catalog = build_render_items(&registry)?;

    log::info!(
        "Demo scene: {} render items, {} materials",
        catalog.len(),
        registry.materials().len()
    );

    Ok(Scene {
        registry,
        catalog,
        lighting: SceneLighting::default(),
        diffuse_textures,
        sky_cube: SKY_TEXTURE.to_string(),
        capture_center: CAPTURE_CENTER,
    })
}

fn build_shape_geometry(
    backend: &mut dyn GraphicsBackend,
    registry: &mut ResourceRegistry,
) -> EngineResult<()> {
    let shapes = ShapeGenerator::new()
        .with_shape(
            "box",
            Shape::Box {
                width: 1.0,
                height: 1.0,
                depth: 1.0,
            },
        )
        .with_shape(
            "grid",
            Shape::Grid {
                width: 20.0,
                depth: 30.0,
                rows: 60,
                columns: 40,
            },
        )
        .with_shape(
            "sphere",
            Shape::Sphere {
                radius: 0.5,
                slices: 20,
                stacks: 20,
            },
        )
        .with_shape(
            "cylinder",
            Shape::Cylinder {
                bottom_radius: 0.5,
                top_radius: 0.3,
                height: 3.0,
                slices: 20,
            },
        )
        .with_shape(
            ORBITER,
            Shape::Sphere {
                radius: 1.0,
                slices: 12,
                stacks: 8,
            },
        );

    let mut builder = MeshGeometryBuilder::new(SHAPES_GEOMETRY);
    builder.add_from(&shapes)?;
    registry.add_mesh(builder.build(backend)?);
    Ok(())
}

fn build_materials(registry: &mut ResourceRegistry) -> EngineResult<()> {
    let materials = registry.materials_mut();
    materials.add(
        Material::new("bricks0")
            .with_diffuse_map(0)
            .with_fresnel(Vec3::splat(0.1))
            .with_roughness(0.3),
    )?;
    materials.add(
        Material::new("tile0")
            .with_diffuse_map(1)
            .with_albedo(Vec4::new(0.9, 0.9, 0.9, 1.0))
            .with_fresnel(Vec3::splat(0.2))
            .with_roughness(0.1),
    )?;
    materials.add(Material::mirror().with_diffuse_map(2))?;
    // Samples the sky cube, which sits right after the diffuse table.
    materials.add(Material::sky().with_diffuse_map(3))?;
    materials.add(
        Material::new("orbiterMat")
            .with_diffuse_map(2)
            .with_albedo(Vec4::new(0.8, 0.8, 0.8, 1.0))
            .with_fresnel(Vec3::splat(0.2))
            .with_roughness(0.2),
    )?;
    Ok(())
}

fn build_render_items(registry: &ResourceRegistry) -> EngineResult<RenderItemCatalog> {
    let geometry = registry.mesh(SHAPES_GEOMETRY)?;
    let materials = registry.materials();
    let item = |name: &str, layer: RenderLayer, submesh: &str, material: &str| {
        Ok::<_, crate::EngineError>(RenderItem::new(
            name,
            layer,
            SHAPES_GEOMETRY,
            geometry.submesh(submesh)?,
            materials.id(material)?,
        ))
    };

    let mut catalog = RenderItemCatalog::new();

    catalog.add(
        item("sky", RenderLayer::Sky, "sphere", "sky")?
            .with_world(Mat4::from_scale(Vec3::splat(5000.0))),
    );
    catalog.add(
        item(ORBITER, RenderLayer::Opaque, ORBITER, "orbiterMat")?
            .with_world(orbiter_world(0.0)),
    );
    catalog.add(
        item("box", RenderLayer::Opaque, "box", "bricks0")?.with_world(
            Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))
                * Mat4::from_scale(Vec3::new(2.0, 1.0, 2.0)),
        ),
    );
    catalog.add(
        item(GLOBE, RenderLayer::DynamicReflector, "sphere", "mirror")?.with_world(
            Mat4::from_translation(CAPTURE_CENTER) * Mat4::from_scale(Vec3::splat(2.0)),
        ),
    );
    catalog.add(
        item("grid", RenderLayer::Opaque, "grid", "tile0")?
            .with_tex_transform(Mat4::from_scale(Vec3::new(8.0, 8.0, 1.0))),
    );

    for row in 0..5 {
        let z = -10.0 + row as f32 * 5.0;
        for (side, x) in [("left", -5.0), ("right", 5.0)] {
            catalog.add(
                item(&format!("{side}Cylinder{row}"), RenderLayer::Opaque, "cylinder", "bricks0")?
                    .with_world(Mat4::from_translation(Vec3::new(x, 1.5, z))),
            );
            catalog.add(
                item(&format!("{side}Sphere{row}"), RenderLayer::Opaque, "sphere", "mirror")?
                    .with_world(Mat4::from_translation(Vec3::new(x, 3.5, z))),
            );
        }
    }

    Ok(catalog)
}

/// World transform of the orbiter at `total_time` seconds.
///
/// Spins about its own axis while circling the globe at radius 3.
pub fn orbiter_world(total_time: f32) -> Mat4 {
    let scale = Mat4::from_scale(Vec3::splat(0.2));
    let local_rotate = Mat4::from_rotation_y(2.0 * total_time);
    let offset = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
    let global_rotate = Mat4::from_rotation_y(0.5 * total_time);
    Mat4::from_translation(CAPTURE_CENTER) * global_rotate * offset * local_rotate * scale
}

/// Move the animated items to their pose at `total_time`.
pub fn animate(scene: &mut Scene, total_time: f32) -> Option<ItemId> {
    let id = scene.catalog.find(ORBITER)?;
    scene.catalog.set_world(id, orbiter_world(total_time));
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, TextureFormat};

    fn formats() -> TargetFormats {
        TargetFormats {
            color: TextureFormat::Rgba8Unorm,
            depth: TextureFormat::Depth24PlusStencil8,
        }
    }

    fn scene(backend: &mut DummyBackend) -> Scene {
        let (textures, shaders) = headless_assets();
        build_dynamic_cube_scene(backend, &textures, &shaders, formats()).unwrap()
    }

    #[test]
    fn test_scene_layers() {
        let mut backend = DummyBackend::default();
        let scene = scene(&mut backend);

        assert_eq!(scene.catalog.layer(RenderLayer::Sky).len(), 1);
        assert_eq!(scene.catalog.layer(RenderLayer::DynamicReflector).len(), 1);
        // orbiter, box, grid and 20 columns/spheres
        assert_eq!(scene.catalog.layer(RenderLayer::Opaque).len(), 23);
        assert_eq!(scene.catalog.len(), 25);
        assert_eq!(scene.diffuse_textures.len(), 3);
        assert_eq!(scene.capture_center, CAPTURE_CENTER);
    }

    #[test]
    fn test_missing_texture_aborts_setup() {
        let mut backend = DummyBackend::default();
        let (_, shaders) = headless_assets();
        let textures = ProceduralTextureProvider::new();
        let result = build_dynamic_cube_scene(&mut backend, &textures, &shaders, formats());
        assert!(matches!(
            result,
            Err(crate::EngineError::AssetLoad {
                kind: crate::AssetKind::Texture,
                ..
            })
        ));
    }

    #[test]
    fn test_animate_moves_orbiter() {
        let mut backend = DummyBackend::default();
        let mut scene = scene(&mut backend);
        let id = animate(&mut scene, 1.0).unwrap();
        let item = scene.catalog.get(id).unwrap();
        assert_eq!(item.generation(), 2);
        assert_eq!(item.world, orbiter_world(1.0));

        let position = item.world.transform_point3(Vec3::ZERO);
        assert!((position.distance(CAPTURE_CENTER) - 3.0).abs() < 1e-4);
    }
}
