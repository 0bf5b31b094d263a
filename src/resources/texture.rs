//! Texture loading and management

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{AssetKind, EngineError, EngineResult};

/// Whether a texture is sampled as a 2D image or a cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Texture2d,
    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order
    Cube,
}

impl TextureKind {
    pub fn layers(self) -> u32 {
        match self {
            TextureKind::Texture2d => 1,
            TextureKind::Cube => 6,
        }
    }
}

/// Decoded texture pixels, layers stored back to back
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub kind: TextureKind,
    /// Width of one layer
    pub width: u32,
    /// Height of one layer
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Load texture from file
    pub fn from_file(path: &Path, name: &str, kind: TextureKind) -> EngineResult<Self> {
        let img = image::open(path).map_err(|e| {
            EngineError::asset(AssetKind::Texture, name, format!("{}: {e}", path.display()))
        })?;
        Self::from_image(img, name, kind)
    }

    /// Load texture from encoded bytes
    pub fn from_bytes(bytes: &[u8], name: &str, kind: TextureKind) -> EngineResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| EngineError::asset(AssetKind::Texture, name, e.to_string()))?;
        Self::from_image(img, name, kind)
    }

    /// Cube images hold their six faces stacked vertically.
    fn from_image(img: DynamicImage, name: &str, kind: TextureKind) -> EngineResult<Self> {
        let (width, height) = img.dimensions();
        let layer_height = match kind {
            TextureKind::Texture2d => height,
            TextureKind::Cube => {
                if height != width * 6 {
                    return Err(EngineError::asset(
                        AssetKind::Texture,
                        name,
                        format!("cube image must be {width}x{}, got {width}x{height}", width * 6),
                    ));
                }
                width
            }
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            width,
            height: layer_height,
            format: TextureFormat::Rgba8UnormSrgb,
            data: img.to_rgba8().into_raw(),
        })
    }

    /// Create a solid color texture
    pub fn solid_color(name: &str, kind: TextureKind, color: [u8; 4]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.repeat(kind.layers() as usize),
        }
    }

    /// Create a checkerboard texture with 8-pixel cells
    pub fn checkerboard(name: &str, size: u32, color1: [u8; 4], color2: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            name: name.to_string(),
            kind: TextureKind::Texture2d,
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
        }
    }

    /// Bytes of one layer
    pub fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }

    pub fn layer(&self, index: u32) -> Option<&[u8]> {
        let size = self.layer_size();
        let start = index as usize * size;
        self.data.get(start..start + size)
    }
}

/// Source of decoded textures by name
pub trait TextureProvider {
    fn load(&self, name: &str, kind: TextureKind) -> EngineResult<TextureData>;
}

/// Loads textures from files under a root directory.
///
/// The texture name is the file name relative to the root.
#[derive(Debug, Clone)]
pub struct FileTextureProvider {
    root: PathBuf,
}

impl FileTextureProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TextureProvider for FileTextureProvider {
    fn load(&self, name: &str, kind: TextureKind) -> EngineResult<TextureData> {
        let path = self.root.join(name);
        log::debug!("Loading texture '{name}' from {}", path.display());
        TextureData::from_file(&path, name, kind)
    }
}

/// How a procedural texture is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedural {
    Solid([u8; 4]),
    Checker {
        size: u32,
        even: [u8; 4],
        odd: [u8; 4],
    },
}

/// Generates textures in memory; used when no asset directory is available.
#[derive(Debug, Clone, Default)]
pub struct ProceduralTextureProvider {
    textures: HashMap<String, Procedural>,
}

impl ProceduralTextureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture(mut self, name: &str, texture: Procedural) -> Self {
        self.textures.insert(name.to_string(), texture);
        self
    }
}

impl TextureProvider for ProceduralTextureProvider {
    fn load(&self, name: &str, kind: TextureKind) -> EngineResult<TextureData> {
        let procedural = self
            .textures
            .get(name)
            .ok_or_else(|| EngineError::asset(AssetKind::Texture, name, "no such procedural texture"))?;

        let texture = match (*procedural, kind) {
            (Procedural::Solid(color), kind) => TextureData::solid_color(name, kind, color),
            (Procedural::Checker { size, even, odd }, TextureKind::Texture2d) => {
                TextureData::checkerboard(name, size, even, odd)
            }
            (Procedural::Checker { .. }, TextureKind::Cube) => {
                return Err(EngineError::asset(
                    AssetKind::Texture,
                    name,
                    "checker textures cannot be cubes",
                ))
            }
        };
        Ok(texture)
    }
}

/// Texture uploaded to the GPU
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAsset {
    pub name: String,
    pub handle: TextureHandle,
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_levels: u32,
}

impl TextureAsset {
    /// Create and upload texture to GPU
    pub fn upload(backend: &mut dyn GraphicsBackend, data: &TextureData) -> EngineResult<Self> {
        let layers = data.kind.layers();
        if data.data.len() != data.layer_size() * layers as usize {
            return Err(EngineError::asset(
                AssetKind::Texture,
                &data.name,
                format!(
                    "expected {} bytes of pixels, got {}",
                    data.layer_size() * layers as usize,
                    data.data.len()
                ),
            ));
        }

        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            array_layers: layers,
            mip_levels: 1,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            dimension: match data.kind {
                TextureKind::Texture2d => TextureDimension::D2,
                TextureKind::Cube => TextureDimension::Cube,
            },
            initial_state: ResourceState::PixelShaderResource,
        })?;

        for layer in 0..layers {
            if let Some(pixels) = data.layer(layer) {
                backend.write_texture(handle, layer, pixels)?;
            }
        }

        Ok(Self {
            name: data.name.clone(),
            handle,
            kind: data.kind,
            width: data.width,
            height: data.height,
            format: data.format,
            mip_levels: 1,
        })
    }

    /// Shader resource view for this texture
    pub fn view(&self) -> ViewDescriptor {
        match self.kind {
            TextureKind::Texture2d => ViewDescriptor::Texture2d {
                texture: self.handle,
                format: self.format,
                mip_levels: self.mip_levels,
            },
            TextureKind::Cube => ViewDescriptor::TextureCube {
                texture: self.handle,
                format: self.format,
                mip_levels: self.mip_levels,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_checkerboard_pattern() {
        let texture = TextureData::checkerboard("c", 16, [255; 4], [0, 0, 0, 255]);
        assert_eq!(texture.data.len(), 16 * 16 * 4);
        assert_eq!(&texture.data[0..4], &[255; 4]);
        // Pixel (8, 0) is in the next cell.
        assert_eq!(&texture.data[32..36], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_solid_cube_has_six_layers() {
        let texture = TextureData::solid_color("sky", TextureKind::Cube, [10, 20, 30, 255]);
        assert_eq!(texture.data.len(), 24);
        assert_eq!(texture.layer(5), Some(&[10u8, 20, 30, 255][..]));
        assert_eq!(texture.layer(6), None);
    }

    #[test]
    fn test_upload_cube_writes_every_face() {
        let mut backend = DummyBackend::default();
        let data = TextureData::solid_color("sky", TextureKind::Cube, [0; 4]);
        let asset = TextureAsset::upload(&mut backend, &data).unwrap();
        for layer in 0..6 {
            assert!(backend.texture_layer_uploaded(asset.handle, layer));
        }
        assert!(matches!(asset.view(), ViewDescriptor::TextureCube { .. }));
    }

    #[test]
    fn test_procedural_provider_unknown_name() {
        let provider = ProceduralTextureProvider::new();
        assert!(matches!(
            provider.load("bricks", TextureKind::Texture2d),
            Err(EngineError::AssetLoad {
                kind: AssetKind::Texture,
                ..
            })
        ));
    }

    #[test]
    fn test_file_provider_missing_file() {
        let provider = FileTextureProvider::new("/nonexistent/textures");
        let err = provider.load("bricks.png", TextureKind::Texture2d).unwrap_err();
        assert!(matches!(err, EngineError::AssetLoad { .. }));
    }

    #[test]
    fn test_cube_image_from_bytes() {
        let img = image::RgbaImage::from_pixel(2, 12, image::Rgba([1, 2, 3, 255]));
        let mut png = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();
        let texture = TextureData::from_bytes(png.get_ref(), "cube", TextureKind::Cube).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.layer(5).unwrap().len(), 16);
    }
}
