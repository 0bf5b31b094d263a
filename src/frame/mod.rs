//! Frame resources and the per-frame update pass

mod frame_resource;
mod ring;
pub mod update;
mod upload_buffer;

pub use frame_resource::FrameResource;
pub use ring::FrameResourceRing;
pub use upload_buffer::{align_up, UploadBuffer, UploadLayout, CONSTANT_BUFFER_ALIGNMENT};

/// Host timing for one tick, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    pub delta: f32,
    pub total: f32,
}
