//! Remote translation service trait and wire types
//!
//! This module defines the `TranslationService` trait for provider
//! abstraction, so the synchronization pipeline can run against POEditor,
//! an in-memory mock, or any other backend without knowing which.
//!
//! # Example
//!
//! ```ignore
//! use poesync::{PoEditorClient, TranslationService};
//!
//! let client = PoEditorClient::from_env()?;
//! for project in client.list_projects().await? {
//!     println!("{} {}", project.id, project.name);
//! }
//!
//! let job = client.export_locale("fr", "7717").await?;
//! client.download_file(&job.download_url, Path::new("/tmp/fr.xliff")).await?;
//! ```

use crate::error::ServiceResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A project visible to the service credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// A finished server-side export for one locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub locale: String,
    pub download_url: String,
}

/// Generic trait for remote translation services
///
/// None of the operations retry; retry policy belongs to the caller.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// List the projects visible to the held credential
    async fn list_projects(&self) -> ServiceResult<Vec<Project>>;

    /// Request an export of `locale` from `project_id`
    ///
    /// A logical failure reported by the server is returned as
    /// `ServiceError::Data` with the server message.
    async fn export_locale(&self, locale: &str, project_id: &str) -> ServiceResult<ExportJob>;

    /// Download an exported payload to `destination`
    async fn download_file(&self, url: &str, destination: &Path) -> ServiceResult<()>;

    /// Name of this service, for logging
    fn service_name(&self) -> &str;
}

/// Accept both `"7717"` and `7717` for identifier fields
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_as_number() {
        let project: Project = serde_json::from_str(r#"{"id": 7717, "name": "Game"}"#).unwrap();
        assert_eq!(project.id, "7717");
        assert_eq!(project.name, "Game");
    }

    #[test]
    fn test_project_id_as_string() {
        let project: Project =
            serde_json::from_str(r#"{"id": "7717", "name": "Game", "public": 0}"#).unwrap();
        assert_eq!(project.id, "7717");
    }
}
