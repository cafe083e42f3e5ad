//! backup - Manual backup of a cluster
//!
//! Identifier: `cluster_id,backup_id`. Immutable. Creation returns once the
//! backup job has finished; a FAILED job is an error.

use std::collections::HashMap;

use dbcloud_core::provider::ProviderResult;
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::Context;
use crate::client::types::{Backup, BackupState, CreateBackupRequest};
use crate::client::{ApiError, CloudApi};
use crate::utils::{api_err, join_identifier, optional_str, require_str, split_identifier};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("backup")
        .with_description("Manual cluster backup")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("backup_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("size_bytes", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("create_timestamp", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, backup: &Backup) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("cluster_id".to_string(), Value::String(backup.cluster_id.clone()));
    attributes.insert("backup_id".to_string(), Value::String(backup.id.clone()));
    attributes.insert("name".to_string(), Value::String(backup.name.clone()));
    if !backup.description.is_empty() {
        attributes.insert(
            "description".to_string(),
            Value::String(backup.description.clone()),
        );
    }
    attributes.insert("status".to_string(), Value::String(backup.status.to_string()));
    if let Some(size) = backup.size_bytes {
        attributes.insert("size_bytes".to_string(), Value::Int(size));
    }
    if let Some(ts) = &backup.create_timestamp {
        attributes.insert("create_timestamp".to_string(), Value::String(ts.clone()));
    }
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&backup.cluster_id, &backup.id))
}

async fn fetch(
    api: &dyn CloudApi,
    cluster_id: &str,
    backup_id: &str,
) -> Result<(Backup, BackupState), ApiError> {
    let backup = api.get_backup(cluster_id, backup_id).await?;
    let status = backup.status.clone();
    Ok((backup, status))
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (cluster_id, backup_id) = split_identifier(identifier)?;
    match ctx.api.get_backup(cluster_id, backup_id).await {
        Ok(backup) => Ok(to_state(id, &backup)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read backup")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let cluster_id = require_str(attrs, "cluster_id")?;
    let request = CreateBackupRequest {
        name: require_str(attrs, "name")?.to_string(),
        description: optional_str(attrs, "description")?
            .unwrap_or_default()
            .to_string(),
    };

    info!("Creating backup '{}' of cluster {}", request.name, cluster_id);
    let created = ctx
        .api
        .create_backup(cluster_id, &request)
        .await
        .map_err(api_err("create backup"))?;
    let backup_id = created.id.as_str();
    let identifier = join_identifier(cluster_id, backup_id);

    let backup = waits
        .waiter(
            [BackupState::Pending, BackupState::Running],
            [BackupState::Success],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, cluster_id, backup_id))
        .await?;

    Ok(to_state(&resource.id, &backup))
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (cluster_id, backup_id) = split_identifier(identifier)?;
    info!("Deleting backup {}", identifier);
    match ctx.api.delete_backup(cluster_id, backup_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_err("delete backup")(e)),
    }
}
