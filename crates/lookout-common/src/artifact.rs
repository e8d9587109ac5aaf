//! Helpers for reading frozen JSON artifacts.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::ArtifactError;

/// Read and deserialize one artifact file.
pub fn load_json_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path)
        .map_err(|source| ArtifactError::Io { path: path.to_path_buf(), source })?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read artifact");
    serde_json::from_slice(&bytes)
        .map_err(|source| ArtifactError::Parse { path: path.to_path_buf(), source })
}

/// Dependent artifacts must have been produced against the model's schema.
pub fn check_schema_version(expected: &str, actual: &str) -> Result<(), ArtifactError> {
    if expected != actual {
        return Err(ArtifactError::SchemaMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tiny {
        version: String,
    }

    #[test]
    fn loads_and_reports_paths() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"version": "v3"}}"#).unwrap();
        let tiny: Tiny = load_json_artifact(file.path()).unwrap();
        assert_eq!(tiny, Tiny { version: "v3".into() });

        let missing = load_json_artifact::<Tiny>(Path::new("/nonexistent/artifact.json"));
        assert!(matches!(missing, Err(ArtifactError::Io { .. })));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        assert!(matches!(load_json_artifact::<Tiny>(bad.path()), Err(ArtifactError::Parse { .. })));
    }

    #[test]
    fn schema_versions_must_match() {
        assert!(check_schema_version("v1", "v1").is_ok());
        assert!(matches!(
            check_schema_version("v1", "v0"),
            Err(ArtifactError::SchemaMismatch { .. })
        ));
    }
}
