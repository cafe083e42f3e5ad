//! HTTPS implementation of [`CloudApi`]

use async_trait::async_trait;
use log::debug;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::*;
use super::{ApiError, ApiResult, CloudApi};

const USER_AGENT: &str = concat!("dbcloud-provider/", env!("CARGO_PKG_VERSION"));

/// Client for the dbcloud REST API
///
/// Requests authenticate with the API key pair as basic-auth credentials.
pub struct HttpClient {
    /// Base URL of the API (e.g., https://api.dbcloud.example)
    base_url: Url,
    public_key: String,
    private_key: String,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(
        host: &str,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
    ) -> ApiResult<Self> {
        let base_url = Url::parse(host).map_err(|_| ApiError::InvalidUrl(host.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(host.to_string()));
        }

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            base_url,
            public_key: public_key.into(),
            private_key: private_key.into(),
            client,
        })
    }

    /// Build `/api/v1/<segments...>`, percent-encoding each segment
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .basic_auth(&self.public_key, Some(&self.private_key))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.url(segments)?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn send_json<B, T>(&self, method: Method, segments: &[&str], body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(segments)?;
        let response = self.request(method, url).json(body).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn send_unit<B>(&self, method: Method, segments: &[&str], body: Option<&B>) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        check(builder.send().await?).await?;
        Ok(())
    }

    async fn post_action(&self, segments: &[&str]) -> ApiResult<()> {
        self.send_unit::<()>(Method::POST, segments, None).await
    }

    async fn delete(&self, segments: &[&str]) -> ApiResult<()> {
        self.send_unit::<()>(Method::DELETE, segments, None).await
    }
}

/// Turn non-success responses into [`ApiError`]
async fn check(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Option<ErrorBody> = serde_json::from_str(&text).ok();

    let code = body
        .as_ref()
        .and_then(|b| b.code.as_ref())
        .map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    let message = body
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text.clone()
            }
        });

    Err(ApiError::Status {
        status: status.as_u16(),
        code,
        message,
    })
}

#[async_trait]
impl CloudApi for HttpClient {
    async fn get_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<Cluster> {
        self.get(&["projects", project_id, "clusters", cluster_id])
            .await
    }

    async fn create_cluster(
        &self,
        project_id: &str,
        request: &CreateClusterRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(Method::POST, &["projects", project_id, "clusters"], request)
            .await
    }

    async fn update_cluster(
        &self,
        project_id: &str,
        cluster_id: &str,
        request: &UpdateClusterRequest,
    ) -> ApiResult<()> {
        self.send_unit(
            Method::PATCH,
            &["projects", project_id, "clusters", cluster_id],
            Some(request),
        )
        .await
    }

    async fn pause_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()> {
        self.post_action(&["projects", project_id, "clusters", cluster_id, "pause"])
            .await
    }

    async fn resume_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()> {
        self.post_action(&["projects", project_id, "clusters", cluster_id, "resume"])
            .await
    }

    async fn delete_cluster(&self, project_id: &str, cluster_id: &str) -> ApiResult<()> {
        self.delete(&["projects", project_id, "clusters", cluster_id])
            .await
    }

    async fn get_node_group(&self, cluster_id: &str, node_group_id: &str) -> ApiResult<NodeGroup> {
        self.get(&["clusters", cluster_id, "node-groups", node_group_id])
            .await
    }

    async fn create_node_group(
        &self,
        cluster_id: &str,
        request: &CreateNodeGroupRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(Method::POST, &["clusters", cluster_id, "node-groups"], request)
            .await
    }

    async fn update_node_group(
        &self,
        cluster_id: &str,
        node_group_id: &str,
        request: &UpdateNodeGroupRequest,
    ) -> ApiResult<()> {
        self.send_unit(
            Method::PATCH,
            &["clusters", cluster_id, "node-groups", node_group_id],
            Some(request),
        )
        .await
    }

    async fn delete_node_group(&self, cluster_id: &str, node_group_id: &str) -> ApiResult<()> {
        self.delete(&["clusters", cluster_id, "node-groups", node_group_id])
            .await
    }

    async fn get_private_endpoint(
        &self,
        cluster_id: &str,
        endpoint_id: &str,
    ) -> ApiResult<PrivateEndpoint> {
        self.get(&["clusters", cluster_id, "private-endpoints", endpoint_id])
            .await
    }

    async fn create_private_endpoint(
        &self,
        cluster_id: &str,
        request: &CreatePrivateEndpointRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(
            Method::POST,
            &["clusters", cluster_id, "private-endpoints"],
            request,
        )
        .await
    }

    async fn delete_private_endpoint(&self, cluster_id: &str, endpoint_id: &str) -> ApiResult<()> {
        self.delete(&["clusters", cluster_id, "private-endpoints", endpoint_id])
            .await
    }

    async fn get_sql_user(&self, cluster_id: &str, user_name: &str) -> ApiResult<SqlUser> {
        self.get(&["clusters", cluster_id, "sql-users", user_name])
            .await
    }

    async fn create_sql_user(
        &self,
        cluster_id: &str,
        request: &CreateSqlUserRequest,
    ) -> ApiResult<SqlUser> {
        self.send_json(Method::POST, &["clusters", cluster_id, "sql-users"], request)
            .await
    }

    async fn update_sql_user(
        &self,
        cluster_id: &str,
        user_name: &str,
        request: &UpdateSqlUserRequest,
    ) -> ApiResult<SqlUser> {
        self.send_json(
            Method::PATCH,
            &["clusters", cluster_id, "sql-users", user_name],
            request,
        )
        .await
    }

    async fn delete_sql_user(&self, cluster_id: &str, user_name: &str) -> ApiResult<()> {
        self.delete(&["clusters", cluster_id, "sql-users", user_name])
            .await
    }

    async fn get_backup(&self, cluster_id: &str, backup_id: &str) -> ApiResult<Backup> {
        self.get(&["clusters", cluster_id, "backups", backup_id])
            .await
    }

    async fn create_backup(
        &self,
        cluster_id: &str,
        request: &CreateBackupRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(Method::POST, &["clusters", cluster_id, "backups"], request)
            .await
    }

    async fn delete_backup(&self, cluster_id: &str, backup_id: &str) -> ApiResult<()> {
        self.delete(&["clusters", cluster_id, "backups", backup_id])
            .await
    }

    async fn get_restore(&self, project_id: &str, restore_id: &str) -> ApiResult<Restore> {
        self.get(&["projects", project_id, "restores", restore_id])
            .await
    }

    async fn create_restore(
        &self,
        project_id: &str,
        request: &CreateRestoreRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(Method::POST, &["projects", project_id, "restores"], request)
            .await
    }

    async fn get_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<Export> {
        self.get(&["clusters", cluster_id, "exports", export_id])
            .await
    }

    async fn create_export(
        &self,
        cluster_id: &str,
        request: &CreateExportRequest,
    ) -> ApiResult<CreatedResource> {
        self.send_json(Method::POST, &["clusters", cluster_id, "exports"], request)
            .await
    }

    async fn cancel_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<()> {
        self.post_action(&["clusters", cluster_id, "exports", export_id, "cancel"])
            .await
    }

    async fn delete_export(&self, cluster_id: &str, export_id: &str) -> ApiResult<()> {
        self.delete(&["clusters", cluster_id, "exports", export_id])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HttpClient {
        HttpClient::new(&server.base_url(), "public", "private").unwrap()
    }

    #[tokio::test]
    async fn get_cluster_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/projects/p1/clusters/c1")
                    .header_exists("Authorization");
                then.status(200).json_body(json!({
                    "id": "c1",
                    "project_id": "p1",
                    "name": "analytics",
                    "cluster_type": "DEDICATED",
                    "cloud_provider": "AWS",
                    "region": "us-east-1",
                    "port": 4000,
                    "status": "ACTIVE",
                    "host": "analytics.dbcloud.example",
                }));
            })
            .await;

        let cluster = client(&server).get_cluster("p1", "c1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(cluster.status, ClusterState::Active);
        assert_eq!(cluster.host.as_deref(), Some("analytics.dbcloud.example"));
    }

    #[tokio::test]
    async fn get_cluster_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/projects/p1/clusters/missing");
                then.status(404);
            })
            .await;

        let err = client(&server)
            .get_cluster("p1", "missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn error_body_is_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/projects/p1/clusters");
                then.status(400)
                    .json_body(json!({"code": 49900001, "message": "invalid node size"}));
            })
            .await;

        let request = CreateClusterRequest {
            name: "analytics".to_string(),
            cluster_type: "DEVELOPER".to_string(),
            cloud_provider: "AWS".to_string(),
            region: "us-east-1".to_string(),
            port: 4000,
            root_password: "s3cret".to_string(),
            components: None,
            ip_access_list: vec![],
        };
        let err = client(&server)
            .create_cluster("p1", &request)
            .await
            .unwrap_err();

        match err {
            ApiError::Status {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("49900001"));
                assert_eq!(message, "invalid node size");
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_without_body_uses_reason_phrase() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/v1/clusters/c1/backups/b1");
                then.status(503);
            })
            .await;

        let err = client(&server).delete_backup("c1", "b1").await.unwrap_err();
        assert_eq!(err.to_string(), "API returned 503: Service Unavailable");
    }

    #[tokio::test]
    async fn create_sends_json_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/clusters/c1/backups")
                    .json_body(json!({"name": "nightly"}));
                then.status(200).json_body(json!({"id": "b1"}));
            })
            .await;

        let created = client(&server)
            .create_backup(
                "c1",
                &CreateBackupRequest {
                    name: "nightly".to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created.id, "b1");
    }

    #[tokio::test]
    async fn actions_post_to_sub_resource() {
        let server = MockServer::start_async().await;
        let pause = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/projects/p1/clusters/c1/pause");
                then.status(200);
            })
            .await;
        let cancel = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/clusters/c1/exports/e1/cancel");
                then.status(200);
            })
            .await;

        let client = client(&server);
        client.pause_cluster("p1", "c1").await.unwrap();
        client.cancel_export("c1", "e1").await.unwrap();

        pause.assert_async().await;
        cancel.assert_async().await;
    }

    #[test]
    fn url_joins_segments_under_api_prefix() {
        let client = HttpClient::new("https://api.dbcloud.example/", "public", "private").unwrap();
        let url = client.url(&["clusters", "c1", "sql-users", "app user"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.dbcloud.example/api/v1/clusters/c1/sql-users/app%20user"
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert!(matches!(
            HttpClient::new("not a url", "public", "private"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpClient::new("mailto:ops@dbcloud.example", "public", "private"),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
