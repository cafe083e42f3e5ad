//! restore - Restore a backup into a new cluster
//!
//! Identifier: `project_id,restore_id`. The service keeps restore jobs as
//! history and offers no delete, so deleting the resource only drops it from
//! state. The restored cluster is left running.

use std::collections::HashMap;

use dbcloud_core::provider::{ProviderError, ProviderResult};
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::{info, warn};

use super::Context;
use super::cluster::{DEFAULT_PORT, components_type};
use crate::client::types::{
    Components, CreateRestoreRequest, Restore, RestoreConfig, RestoreState,
};
use crate::client::{ApiError, CloudApi};
use crate::utils::{
    api_err, decode_block, join_identifier, optional_int, require_str, split_identifier,
};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("restore")
        .with_description("Restore of a backup into a new cluster")
        .attribute(
            AttributeSchema::new("project_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("backup_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("name", types::name())
                .required()
                .force_new()
                .with_description("Name of the cluster created by the restore"),
        )
        .attribute(
            AttributeSchema::new("root_password", AttributeType::String)
                .required()
                .sensitive()
                .write_only()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("port", types::port())
                .write_only()
                .force_new()
                .with_default(Value::Int(DEFAULT_PORT)),
        )
        .attribute(
            AttributeSchema::new("components", components_type())
                .required()
                .write_only()
                .force_new(),
        )
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("restore_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .computed()
                .with_description("Cluster created by the restore"),
        )
        .attribute(AttributeSchema::new("create_timestamp", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, restore: &Restore) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("project_id".to_string(), Value::String(restore.project_id.clone()));
    attributes.insert("restore_id".to_string(), Value::String(restore.id.clone()));
    attributes.insert("backup_id".to_string(), Value::String(restore.backup_id.clone()));
    attributes.insert("name".to_string(), Value::String(restore.name.clone()));
    attributes.insert("status".to_string(), Value::String(restore.status.to_string()));
    if let Some(cluster_id) = &restore.cluster_id {
        attributes.insert("cluster_id".to_string(), Value::String(cluster_id.clone()));
    }
    if let Some(ts) = &restore.create_timestamp {
        attributes.insert("create_timestamp".to_string(), Value::String(ts.clone()));
    }
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&restore.project_id, &restore.id))
}

async fn fetch(
    api: &dyn CloudApi,
    project_id: &str,
    restore_id: &str,
) -> Result<(Restore, RestoreState), ApiError> {
    let restore = api.get_restore(project_id, restore_id).await?;
    let status = restore.status.clone();
    Ok((restore, status))
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (project_id, restore_id) = split_identifier(identifier)?;
    match ctx.api.get_restore(project_id, restore_id).await {
        Ok(restore) => Ok(to_state(id, &restore)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read restore")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let project_id = require_str(attrs, "project_id")?;
    let components: Components = attrs
        .get("components")
        .map(|v| decode_block("components", v))
        .transpose()?
        .ok_or_else(|| ProviderError::new("Attribute 'components' is required"))?;

    let request = CreateRestoreRequest {
        backup_id: require_str(attrs, "backup_id")?.to_string(),
        name: require_str(attrs, "name")?.to_string(),
        config: RestoreConfig {
            root_password: require_str(attrs, "root_password")?.to_string(),
            port: optional_int(attrs, "port")?.unwrap_or(DEFAULT_PORT),
            components,
        },
    };

    info!(
        "Restoring backup {} into cluster '{}' in project {}",
        request.backup_id, request.name, project_id
    );
    let created = ctx
        .api
        .create_restore(project_id, &request)
        .await
        .map_err(api_err("create restore"))?;
    let restore_id = created.id.as_str();
    let identifier = join_identifier(project_id, restore_id);

    let restore = waits
        .waiter(
            [RestoreState::Pending, RestoreState::Running],
            [RestoreState::Success],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, project_id, restore_id))
        .await?;

    Ok(to_state(&resource.id, &restore)
        .carry_over(resource, &schema().write_only_attributes()))
}

pub async fn delete(_ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (_, restore_id) = split_identifier(identifier)?;
    warn!(
        "Restore {} cannot be deleted; removing it from state only. The restored cluster is kept.",
        restore_id
    );
    Ok(())
}
