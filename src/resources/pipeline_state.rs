//! Pipeline configurations shared by both passes

use crate::backend::*;

/// Registry name of the lit opaque pipeline
pub const OPAQUE_PIPELINE: &str = "opaque";
/// Registry name of the opaque pipeline used by the cube face passes
pub const CAPTURE_OPAQUE_PIPELINE: &str = "captureOpaque";
/// Registry name of the sky pipeline
pub const SKY_PIPELINE: &str = "sky";

/// The six static samplers bound at registers s0..s5:
/// point, linear and anisotropic filtering, each with wrap and clamp addressing.
pub fn static_samplers() -> Vec<SamplerDescriptor> {
    let modes = [
        ("point_wrap", FilterMode::Nearest, AddressMode::Repeat),
        ("point_clamp", FilterMode::Nearest, AddressMode::ClampToEdge),
        ("linear_wrap", FilterMode::Linear, AddressMode::Repeat),
        ("linear_clamp", FilterMode::Linear, AddressMode::ClampToEdge),
        ("anisotropic_wrap", FilterMode::Anisotropic, AddressMode::Repeat),
        ("anisotropic_clamp", FilterMode::Anisotropic, AddressMode::ClampToEdge),
    ];

    modes
        .into_iter()
        .enumerate()
        .map(|(register, (label, filter, address_mode))| SamplerDescriptor {
            label: Some(label.to_string()),
            register: register as u32,
            filter,
            address_mode,
            max_anisotropy: if filter == FilterMode::Anisotropic { 8 } else { 1 },
            mip_lod_bias: 0.0,
        })
        .collect()
}

/// Target formats a pipeline renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    pub color: TextureFormat,
    pub depth: TextureFormat,
}

/// Back-face culled, depth-tested opaque geometry
pub fn opaque_pipeline(
    vertex_shader: ShaderBytecode,
    pixel_shader: ShaderBytecode,
    formats: TargetFormats,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: Some(OPAQUE_PIPELINE.to_string()),
        vertex_shader,
        pixel_shader,
        vertex_layout: Vertex::layout(),
        cull_mode: CullMode::Back,
        depth_compare: CompareFunction::Less,
        depth_write_enabled: true,
        color_format: formats.color,
        depth_format: formats.depth,
        static_samplers: static_samplers(),
    }
}

/// Opaque geometry seen through a left-handed cube face camera.
///
/// The face views are mirror images of a right-handed view, so the winding of
/// every triangle flips and the surfaces facing the camera are the ones the
/// main pass would call back faces.
pub fn capture_opaque_pipeline(
    vertex_shader: ShaderBytecode,
    pixel_shader: ShaderBytecode,
    formats: TargetFormats,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: Some(CAPTURE_OPAQUE_PIPELINE.to_string()),
        cull_mode: CullMode::Front,
        ..opaque_pipeline(vertex_shader, pixel_shader, formats)
    }
}

/// Sky sphere seen from inside.
///
/// No culling because the camera sits inside the sphere; LessEqual because
/// the sky is drawn at the far plane after the depth buffer was cleared to 1.
pub fn sky_pipeline(
    vertex_shader: ShaderBytecode,
    pixel_shader: ShaderBytecode,
    formats: TargetFormats,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: Some(SKY_PIPELINE.to_string()),
        cull_mode: CullMode::None,
        depth_compare: CompareFunction::LessEqual,
        ..opaque_pipeline(vertex_shader, pixel_shader, formats)
    }
}
