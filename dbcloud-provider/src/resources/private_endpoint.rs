//! private_endpoint - Private network connection to a cluster
//!
//! Identifier: `cluster_id,endpoint_id`. Immutable: any change replaces it.

use std::collections::HashMap;

use dbcloud_core::provider::ProviderResult;
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::Context;
use crate::client::types::{CreatePrivateEndpointRequest, EndpointState, PrivateEndpoint};
use crate::client::{ApiError, CloudApi};
use crate::utils::{api_err, join_identifier, require_str, split_identifier};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("private_endpoint")
        .with_description("Private endpoint connection to a cluster")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("endpoint_name", AttributeType::String)
                .required()
                .force_new()
                .with_description("Name of the endpoint in the customer network"),
        )
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("endpoint_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("service_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("message", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, endpoint: &PrivateEndpoint) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("cluster_id".to_string(), Value::String(endpoint.cluster_id.clone()));
    attributes.insert("endpoint_id".to_string(), Value::String(endpoint.id.clone()));
    attributes.insert(
        "endpoint_name".to_string(),
        Value::String(endpoint.endpoint_name.clone()),
    );
    attributes.insert("status".to_string(), Value::String(endpoint.status.to_string()));
    if let Some(service_name) = &endpoint.service_name {
        attributes.insert("service_name".to_string(), Value::String(service_name.clone()));
    }
    if let Some(message) = &endpoint.message {
        attributes.insert("message".to_string(), Value::String(message.clone()));
    }
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&endpoint.cluster_id, &endpoint.id))
}

async fn fetch(
    api: &dyn CloudApi,
    cluster_id: &str,
    endpoint_id: &str,
) -> Result<(PrivateEndpoint, EndpointState), ApiError> {
    let endpoint = api.get_private_endpoint(cluster_id, endpoint_id).await?;
    let status = endpoint.status.clone();
    Ok((endpoint, status))
}

async fn fetch_deleted(
    api: &dyn CloudApi,
    cluster_id: &str,
    endpoint_id: &str,
) -> Result<((), EndpointState), ApiError> {
    match api.get_private_endpoint(cluster_id, endpoint_id).await {
        Ok(endpoint) => Ok(((), endpoint.status)),
        Err(ApiError::NotFound) => Ok(((), EndpointState::Deleted)),
        Err(e) => Err(e),
    }
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (cluster_id, endpoint_id) = split_identifier(identifier)?;
    match ctx.api.get_private_endpoint(cluster_id, endpoint_id).await {
        Ok(endpoint) if endpoint.status == EndpointState::Deleted => {
            Ok(State::not_found(id.clone()))
        }
        Ok(endpoint) => Ok(to_state(id, &endpoint)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read private endpoint")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let cluster_id = require_str(attrs, "cluster_id")?;
    let request = CreatePrivateEndpointRequest {
        endpoint_name: require_str(attrs, "endpoint_name")?.to_string(),
    };

    info!(
        "Creating private endpoint '{}' for cluster {}",
        request.endpoint_name, cluster_id
    );
    let created = ctx
        .api
        .create_private_endpoint(cluster_id, &request)
        .await
        .map_err(api_err("create private endpoint"))?;
    let endpoint_id = created.id.as_str();
    let identifier = join_identifier(cluster_id, endpoint_id);

    let endpoint = waits
        .waiter(
            [EndpointState::Pending],
            [EndpointState::Active],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, cluster_id, endpoint_id))
        .await?;

    Ok(to_state(&resource.id, &endpoint))
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (cluster_id, endpoint_id) = split_identifier(identifier)?;

    info!("Deleting private endpoint {}", identifier);
    match ctx.api.delete_private_endpoint(cluster_id, endpoint_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_err("delete private endpoint")(e)),
    }

    ctx.waits
        .waiter(
            [
                EndpointState::Active,
                EndpointState::Failed,
                EndpointState::Deleting,
            ],
            [EndpointState::Deleted],
            ctx.waits.delete_timeout,
        )
        .wait(identifier, |_| fetch_deleted(ctx.api, cluster_id, endpoint_id))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockCloudApi;
    use crate::client::types::CreatedResource;
    use crate::config::WaitConfig;

    fn endpoint(status: EndpointState) -> PrivateEndpoint {
        PrivateEndpoint {
            id: "pe1".to_string(),
            cluster_id: "c1".to_string(),
            endpoint_name: "vpce-0a1b2c3d".to_string(),
            status,
            service_name: Some("com.dbcloud.example.vpce-svc".to_string()),
            message: None,
        }
    }

    fn desired() -> Resource {
        Resource::new("private_endpoint", "app")
            .with_attribute("cluster_id", Value::String("c1".to_string()))
            .with_attribute("endpoint_name", Value::String("vpce-0a1b2c3d".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_active() {
        let mut api = MockCloudApi::new();
        api.expect_create_private_endpoint()
            .withf(|_, request| request.endpoint_name == "vpce-0a1b2c3d")
            .returning(|_, _| {
                Ok(CreatedResource {
                    id: "pe1".to_string(),
                })
            });
        let mut calls = 0;
        api.expect_get_private_endpoint().returning(move |_, _| {
            calls += 1;
            Ok(endpoint(if calls < 2 {
                EndpointState::Pending
            } else {
                EndpointState::Active
            }))
        });

        let waits = WaitConfig::default();
        let ctx = Context {
            api: &api,
            waits: &waits,
        };
        let state = create(ctx, &desired()).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("c1,pe1"));
        assert_eq!(
            state.attributes["service_name"],
            Value::String("com.dbcloud.example.vpce-svc".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connection_is_reported() {
        let mut api = MockCloudApi::new();
        api.expect_create_private_endpoint().returning(|_, _| {
            Ok(CreatedResource {
                id: "pe1".to_string(),
            })
        });
        api.expect_get_private_endpoint()
            .returning(|_, _| Ok(endpoint(EndpointState::Failed)));

        let waits = WaitConfig::default();
        let ctx = Context {
            api: &api,
            waits: &waits,
        };
        let err = create(ctx, &desired()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected state 'FAILED' for c1,pe1, wanted one of: ACTIVE"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_until_gone() {
        let mut api = MockCloudApi::new();
        api.expect_delete_private_endpoint().returning(|_, _| Ok(()));
        let mut calls = 0;
        api.expect_get_private_endpoint().returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Ok(endpoint(EndpointState::Deleting))
            } else {
                Ok(endpoint(EndpointState::Deleted))
            }
        });

        let waits = WaitConfig::default();
        let ctx = Context {
            api: &api,
            waits: &waits,
        };
        delete(ctx, "c1,pe1").await.unwrap();
    }
}
