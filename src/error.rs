//! Engine error types.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Kind of asset that failed to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Texture,
    Shader,
    Geometry,
    Material,
    Pipeline,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Texture => "texture",
            Self::Shader => "shader",
            Self::Geometry => "geometry",
            Self::Material => "material",
            Self::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building or driving the renderer.
///
/// None of these are retried. A failure during a frame aborts that frame and
/// is returned to the host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The GPU timeline became unreachable. Fatal.
    #[error("GPU device lost")]
    DeviceLost,
    /// A texture, shader, mesh, material or pipeline could not be produced.
    #[error("failed to load {kind} '{name}': {reason}")]
    AssetLoad {
        kind: AssetKind,
        name: String,
        reason: String,
    },
    /// An internal ordering invariant was broken (slot reuse before its fence
    /// completed, sampling a texture still in render-target state, ...).
    #[error("synchronization violation: {0}")]
    SynchronizationViolation(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl EngineError {
    pub fn asset(kind: AssetKind, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AssetLoad {
            kind,
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the device can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost | Self::SynchronizationViolation(_))
    }
}

impl From<BackendError> for EngineError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceLost => Self::DeviceLost,
            BackendError::Validation(msg) => Self::SynchronizationViolation(msg),
            other => Self::Backend(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::asset(AssetKind::Texture, "bricks", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load texture 'bricks': file not found"
        );
        assert_eq!(EngineError::DeviceLost.to_string(), "GPU device lost");
    }

    #[test]
    fn test_backend_error_mapping() {
        assert_eq!(
            EngineError::from(BackendError::DeviceLost),
            EngineError::DeviceLost
        );
        assert!(matches!(
            EngineError::from(BackendError::Validation("bad barrier".into())),
            EngineError::SynchronizationViolation(_)
        ));
        assert!(matches!(
            EngineError::from(BackendError::OutOfMemory),
            EngineError::Backend(BackendError::OutOfMemory)
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::DeviceLost.is_fatal());
        assert!(!EngineError::InvalidConfig("x".into()).is_fatal());
    }
}
