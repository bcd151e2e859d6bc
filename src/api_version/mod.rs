// src/api_version/mod.rs
//
// Serves the API versions a service supports, read once from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionInfo {
    #[serde(default)]
    pub spec_root_url: String,
    pub major: Option<u32>,
    pub minor: Option<u32>,
    #[serde(default)]
    pub supported_majors: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionResponse {
    pub specs: Vec<ApiVersionInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiVersionError {
    #[error("Failed to read api version file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse api version file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("specs[{index}].{field} field can not be empty")]
    MissingField { index: usize, field: &'static str },
}

/// Reads the version file on first use and serves the cached copy afterwards.
///
/// A failed read is not cached, so a fixed file is picked up on the next call.
pub struct ApiVersionService {
    path: PathBuf,
    cache: OnceCell<Arc<ApiVersionResponse>>,
}

impl ApiVersionService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_api_version(&self) -> Result<Arc<ApiVersionResponse>, ApiVersionError> {
        self.cache
            .get_or_try_init(|| async {
                debug!("Reading api version info from {}", self.path.display());
                read_specs(&self.path).await.map(Arc::new).map_err(|e| {
                    error!("Error during parsing api version file: {}", e);
                    e
                })
            })
            .await
            .cloned()
    }
}

async fn read_specs(path: &Path) -> Result<ApiVersionResponse, ApiVersionError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| ApiVersionError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let response: ApiVersionResponse = serde_json::from_slice(&data)?;
    for (index, spec) in response.specs.iter().enumerate() {
        let missing = if spec.spec_root_url.is_empty() {
            Some("specRootUrl")
        } else if spec.minor.is_none() {
            Some("minor")
        } else if spec.major.is_none() {
            Some("major")
        } else if spec.supported_majors.is_empty() {
            Some("supportedMajors")
        } else {
            None
        };

        if let Some(field) = missing {
            return Err(ApiVersionError::MissingField { index, field });
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("api-version-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_reads_and_caches_specs() {
        let path = write_temp(
            r#"{"specs":[{"specRootUrl":"/api/orders","major":2,"minor":1,"supportedMajors":[1,2]}]}"#,
        )
        .await;
        let service = ApiVersionService::new(&path);

        let response = service.get_api_version().await.unwrap();
        assert_eq!(response.specs[0].spec_root_url, "/api/orders");
        assert_eq!(response.specs[0].supported_majors, vec![1, 2]);

        // served from cache once the file is gone
        tokio::fs::remove_file(&path).await.unwrap();
        let cached = service.get_api_version().await.unwrap();
        assert!(Arc::ptr_eq(&response, &cached));
    }

    #[tokio::test]
    async fn test_missing_minor_is_rejected() {
        let path = write_temp(r#"{"specs":[{"specRootUrl":"/api","major":1,"supportedMajors":[1]}]}"#).await;
        let err = ApiVersionService::new(&path)
            .get_api_version()
            .await
            .unwrap_err();
        assert!(matches!(err, ApiVersionError::MissingField { index: 0, field: "minor" }));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_retried() {
        let path = std::env::temp_dir().join(format!("api-version-{}.json", uuid::Uuid::new_v4()));
        let service = ApiVersionService::new(&path);
        assert!(matches!(
            service.get_api_version().await,
            Err(ApiVersionError::Read { .. })
        ));

        tokio::fs::write(&path, r#"{"specs":[]}"#).await.unwrap();
        assert!(service.get_api_version().await.unwrap().specs.is_empty());
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
