use kascade_gfx::error::GfxError;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// 文件格式错误，或者使用了不支持的特性
    #[error("failed to parse gltf: {0}")]
    Parse(String),

    #[error("failed to read gltf: {0}")]
    Io(#[from] std::io::Error),

    #[error("primitive {primitive} of mesh {mesh} has no {attribute} attribute")]
    MissingRequiredAttribute {
        mesh: usize,
        primitive: usize,
        attribute: &'static str,
    },

    #[error("primitive {primitive} of mesh {mesh} has no vertices or no indices")]
    EmptyPrimitive { mesh: usize, primitive: usize },

    #[error("unsupported index type: {0}")]
    UnsupportedIndexType(String),

    #[error(transparent)]
    Gfx(#[from] GfxError),
}

impl From<gltf::Error> for SceneError {
    fn from(e: gltf::Error) -> Self {
        match e {
            gltf::Error::Io(e) => SceneError::Io(e),
            other => SceneError::Parse(other.to_string()),
        }
    }
}

pub type SceneResult<T> = Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gltf_io_error_maps_to_io() {
        let err: SceneError = gltf::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).into();
        assert!(matches!(err, SceneError::Io(_)));
    }

    #[test]
    fn test_gltf_other_error_maps_to_parse() {
        let err: SceneError = gltf::Error::UnsupportedScheme.into();
        assert!(matches!(err, SceneError::Parse(_)));
    }
}
