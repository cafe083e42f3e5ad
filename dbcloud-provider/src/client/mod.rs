//! dbcloud API client
//!
//! [`CloudApi`] is the seam between resource handlers and the service: the
//! provider talks to it through a trait object, [`HttpClient`] implements it
//! over HTTPS, and tests substitute a mock.

mod http;
pub mod types;

pub use http::HttpClient;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use types::*;

/// Errors returned by the dbcloud API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed resource does not exist
    #[error("resource not found")]
    NotFound,

    /// The service answered with a non-success status
    #[error("API returned {status}{}: {message}", .code.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default())]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport or decoding failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The configured endpoint is not a usable base URL
    #[error("invalid API endpoint '{0}'")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations of the dbcloud API used by the provider
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudApi: Send + Sync {
    // Clusters
    async fn get_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<Cluster>;
    async fn create_cluster(
        &self,
        project_id: &str,
        request: &CreateClusterRequest,
    ) -> ApiResult<CreatedResource>;
    async fn update_cluster(
        &self,
        project_id: &str,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> ApiResult<()>;
    async fn pause_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()>;
    async fn resume_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()>;
    async fn delete_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()>;

    // Node groups
    async fn get_node_group(&self, cluster_id: &str, node_group_id: &str) -> ApiResult<NodeGroup>;
    async fn create_node_group(
        &self,
        cluster_id: &str,
        request: &CreateNodeGroupRequest,
    ) -> ApiResult<CreatedResource>;
    async fn update_node_group(
        &self,
        cluster_id: &str,
        node_group_id: &str,
        request: &UpdateNodeGroupRequest,
    ) -> ApiResult<()>;
    async fn delete_node_group(&self, cluster_id: &str, node_group_id: &str) -> ApiResult<()>;

    // Private endpoints
    async fn get_private_endpoint(
        &self,
        cluster_id: &str,
        endpoint_id: &str,
    ) -> ApiResult<PrivateEndpoint>;
    async fn create_private_endpoint(
        &self,
        cluster_id: &str,
        request: &CreatePrivateEndpointRequest,
    ) -> ApiResult<CreatedResource>;
    async fn delete_private_endpoint(&self, cluster_id: &str, endpoint_id: &str) -> ApiResult<()>;

    // SQL users
    async fn get_sql_user(&self, cluster_id: &str, user_name: &str) -> ApiResult<SqlUser>;
    async fn create_sql_user(
        &self,
        cluster_id: &str,
        request: &CreateSqlUserRequest,
    ) -> ApiResult<SqlUser>;
    async fn update_sql_user(
        &self,
        cluster_id: &str,
        user_name: &str,
        request: &UpdateSqlUserRequest,
    ) -> ApiResult<SqlUser>;
    async fn delete_sql_user(&self, cluster_id: &str, user_name: &str) -> ApiResult<()>;

    // Backups
    async fn get_backup(&self, cluster_id: &str, backup_id: &str) -> ApiResult<Backup>;
    async fn create_backup(
        &self,
        cluster_id: &str,
        request: &CreateBackupRequest,
    ) -> ApiResult<CreatedResource>;
    async fn delete_backup(&self, cluster_id: &str, backup_id: &str) -> ApiResult<()>;

    // Restores
    async fn get_restore(&self, project_id: &str, restore_id: &str) -> ApiResult<Restore>;
    async fn create_restore(
        &self,
        project_id: &str,
        request: &CreateRestoreRequest,
    ) -> ApiResult<CreatedResource>;

    // Exports
    async fn get_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<Export>;
    async fn create_export(
        &self,
        cluster_id: &str,
        request: &CreateExportRequest,
    ) -> ApiResult<CreatedResource>;
    async fn cancel_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<()>;
    async fn delete_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = ApiError::Status {
            status: 400,
            code: Some("49900001".to_string()),
            message: "invalid node size".to_string(),
        };
        assert_eq!(err.to_string(), "API returned 400 (49900001): invalid node size");

        let err = ApiError::Status {
            status: 503,
            code: None,
            message: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "API returned 503: service unavailable");
    }

    #[test]
    fn not_found_is_detected() {
        assert!(ApiError::NotFound.is_not_found());
        assert!(!ApiError::InvalidUrl("x".to_string()).is_not_found());
    }
}
