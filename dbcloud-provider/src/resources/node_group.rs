//! node_group - Additional compute node group of a cluster
//!
//! Identifier: `cluster_id,node_group_id`. Only `node_count` can change in place.

use std::collections::HashMap;

use dbcloud_core::provider::ProviderResult;
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::Context;
use crate::client::types::{
    CreateNodeGroupRequest, NodeGroup, NodeGroupState, UpdateNodeGroupRequest,
};
use crate::client::{ApiError, CloudApi};
use crate::utils::{api_err, join_identifier, require_int, require_str, split_identifier};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("node_group")
        .with_description("Compute node group attached to a cluster")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", types::name()).required().force_new())
        .attribute(
            AttributeSchema::new("node_spec", AttributeType::String)
                .required()
                .force_new()
                .with_description("Node size, e.g. 8C16G"),
        )
        .attribute(AttributeSchema::new("node_count", types::positive_int()).required())
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("node_group_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, group: &NodeGroup) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("cluster_id".to_string(), Value::String(group.cluster_id.clone()));
    attributes.insert("node_group_id".to_string(), Value::String(group.id.clone()));
    attributes.insert("name".to_string(), Value::String(group.name.clone()));
    attributes.insert("node_spec".to_string(), Value::String(group.node_spec.clone()));
    attributes.insert("node_count".to_string(), Value::Int(group.node_count));
    attributes.insert(
        "status".to_string(),
        Value::String(group.status.to_string()),
    );
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&group.cluster_id, &group.id))
}

async fn fetch(
    api: &dyn CloudApi,
    cluster_id: &str,
    node_group_id: &str,
) -> Result<(NodeGroup, NodeGroupState), ApiError> {
    let group = api.get_node_group(cluster_id, node_group_id).await?;
    let status = group.status.clone();
    Ok((group, status))
}

async fn fetch_deleted(
    api: &dyn CloudApi,
    cluster_id: &str,
    node_group_id: &str,
) -> Result<((), NodeGroupState), ApiError> {
    match api.get_node_group(cluster_id, node_group_id).await {
        Ok(group) => Ok(((), group.status)),
        Err(ApiError::NotFound) => Ok(((), NodeGroupState::Deleted)),
        Err(e) => Err(e),
    }
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (cluster_id, node_group_id) = split_identifier(identifier)?;
    match ctx.api.get_node_group(cluster_id, node_group_id).await {
        Ok(group) if group.status == NodeGroupState::Deleted => Ok(State::not_found(id.clone())),
        Ok(group) => Ok(to_state(id, &group)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read node group")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let cluster_id = require_str(attrs, "cluster_id")?;

    let request = CreateNodeGroupRequest {
        name: require_str(attrs, "name")?.to_string(),
        node_spec: require_str(attrs, "node_spec")?.to_string(),
        node_count: require_int(attrs, "node_count")?,
    };

    info!(
        "Creating node group '{}' ({} x {}) in cluster {}",
        request.name, request.node_count, request.node_spec, cluster_id
    );
    let created = ctx
        .api
        .create_node_group(cluster_id, &request)
        .await
        .map_err(api_err("create node group"))?;
    let node_group_id = created.id.as_str();
    let identifier = join_identifier(cluster_id, node_group_id);

    let group = waits
        .waiter(
            [NodeGroupState::Creating, NodeGroupState::Modifying],
            [NodeGroupState::Active],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, cluster_id, node_group_id))
        .await?;

    Ok(to_state(&resource.id, &group))
}

pub async fn update(ctx: Context<'_>, identifier: &str, to: &Resource) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let (cluster_id, node_group_id) = split_identifier(identifier)?;
    let node_count = require_int(attrs, "node_count")?;

    info!("Resizing node group {} to {} nodes", identifier, node_count);
    ctx.api
        .update_node_group(cluster_id, node_group_id, &UpdateNodeGroupRequest { node_count })
        .await
        .map_err(api_err("update node group"))?;

    let group = waits
        .waiter(
            [NodeGroupState::Creating, NodeGroupState::Modifying],
            [NodeGroupState::Active],
            waits.update_timeout,
        )
        .wait(identifier, |_| fetch(ctx.api, cluster_id, node_group_id))
        .await?;

    Ok(to_state(&to.id, &group))
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (cluster_id, node_group_id) = split_identifier(identifier)?;

    info!("Deleting node group {}", identifier);
    match ctx.api.delete_node_group(cluster_id, node_group_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_err("delete node group")(e)),
    }

    ctx.waits
        .waiter(
            [NodeGroupState::Active, NodeGroupState::Deleting],
            [NodeGroupState::Deleted],
            ctx.waits.delete_timeout,
        )
        .wait(identifier, |_| fetch_deleted(ctx.api, cluster_id, node_group_id))
        .await?;
    Ok(())
}
