//! Compiled shader providers
//!
//! Shaders arrive precompiled; a provider maps a (file, entry point, target
//! profile) triple to an opaque bytecode blob.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::ShaderBytecode;
use crate::error::{AssetKind, EngineError, EngineResult};

/// Identifies one compiled shader stage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderKey {
    pub file: String,
    pub entry_point: String,
    pub target: String,
}

impl ShaderKey {
    pub fn new(file: &str, entry_point: &str, target: &str) -> Self {
        Self {
            file: file.to_string(),
            entry_point: entry_point.to_string(),
            target: target.to_string(),
        }
    }

    fn display_name(&self) -> String {
        format!("{}:{}({})", self.file, self.entry_point, self.target)
    }
}

/// Source of compiled shader bytecode
pub trait ShaderProvider {
    fn load(&self, key: &ShaderKey) -> EngineResult<ShaderBytecode>;
}

/// Reads `<root>/<file stem>_<entry>_<target>.cso` blobs produced by an
/// offline compiler.
#[derive(Debug, Clone)]
pub struct FileShaderProvider {
    root: PathBuf,
}

impl FileShaderProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn blob_path(&self, key: &ShaderKey) -> PathBuf {
        let stem = key
            .file
            .rsplit_once('.')
            .map_or(key.file.as_str(), |(stem, _)| stem);
        self.root
            .join(format!("{stem}_{}_{}.cso", key.entry_point, key.target))
    }
}

impl ShaderProvider for FileShaderProvider {
    fn load(&self, key: &ShaderKey) -> EngineResult<ShaderBytecode> {
        let path = self.blob_path(key);
        let bytes = std::fs::read(&path).map_err(|e| {
            EngineError::asset(
                AssetKind::Shader,
                key.display_name(),
                format!("{}: {e}", path.display()),
            )
        })?;
        if bytes.is_empty() {
            return Err(EngineError::asset(
                AssetKind::Shader,
                key.display_name(),
                "empty bytecode",
            ));
        }
        log::debug!("Loaded shader {} ({} bytes)", key.display_name(), bytes.len());
        Ok(ShaderBytecode {
            entry_point: key.entry_point.clone(),
            target: key.target.clone(),
            bytes: bytes.into(),
        })
    }
}

/// Bytecode blobs registered in memory
#[derive(Debug, Clone, Default)]
pub struct InlineShaderProvider {
    blobs: HashMap<ShaderKey, Arc<[u8]>>,
}

impl InlineShaderProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(mut self, key: ShaderKey, bytes: &[u8]) -> Self {
        self.blobs.insert(key, Arc::from(bytes));
        self
    }
}

impl ShaderProvider for InlineShaderProvider {
    fn load(&self, key: &ShaderKey) -> EngineResult<ShaderBytecode> {
        let bytes = self.blobs.get(key).ok_or_else(|| {
            EngineError::asset(AssetKind::Shader, key.display_name(), "not registered")
        })?;
        Ok(ShaderBytecode {
            entry_point: key.entry_point.clone(),
            target: key.target.clone(),
            bytes: Arc::clone(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_provider() {
        let key = ShaderKey::new("Default.hlsl", "VS", "vs_5_1");
        let provider = InlineShaderProvider::new().with_blob(key.clone(), b"dxbc");
        let bytecode = provider.load(&key).unwrap();
        assert_eq!(&*bytecode.bytes, b"dxbc");
        assert_eq!(bytecode.entry_point, "VS");

        let missing = ShaderKey::new("Sky.hlsl", "VS", "vs_5_1");
        assert!(matches!(
            provider.load(&missing),
            Err(EngineError::AssetLoad {
                kind: AssetKind::Shader,
                ..
            })
        ));
    }

    #[test]
    fn test_blob_path() {
        let provider = FileShaderProvider::new("/shaders");
        let path = provider.blob_path(&ShaderKey::new("Sky.hlsl", "PS", "ps_5_1"));
        assert_eq!(path, PathBuf::from("/shaders/Sky_PS_ps_5_1.cso"));
    }

    #[test]
    fn test_file_provider_missing_blob() {
        let provider = FileShaderProvider::new("/nonexistent");
        let err = provider
            .load(&ShaderKey::new("Default.hlsl", "VS", "vs_5_1"))
            .unwrap_err();
        assert!(err.to_string().contains("Default.hlsl:VS(vs_5_1)"));
    }
}
