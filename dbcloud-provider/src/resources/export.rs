//! export - Data export from a cluster to object storage
//!
//! Identifier: `cluster_id,export_id`. Immutable. Deleting a running export
//! cancels it first and waits for the job to stop.

use std::collections::HashMap;

use dbcloud_core::provider::ProviderResult;
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::Context;
use crate::client::types::{CreateExportRequest, Export, ExportState};
use crate::client::{ApiError, CloudApi};
use crate::utils::{
    api_err, join_identifier, optional_str, require_str, split_identifier, string_list,
    string_list_value,
};

fn enum_of(values: &[&str]) -> AttributeType {
    AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("export")
        .with_description("Export of cluster data to object storage")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("file_type", enum_of(&["CSV", "SQL", "PARQUET"]))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("target_uri", AttributeType::String)
                .required()
                .force_new()
                .with_description("Destination, e.g. s3://bucket/prefix"),
        )
        .attribute(
            AttributeSchema::new("compression", enum_of(&["GZIP", "SNAPPY", "ZSTD", "NONE"]))
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "databases",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .force_new()
            .with_description("Databases to export; all when empty"),
        )
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("export_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("reason", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, export: &Export) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("cluster_id".to_string(), Value::String(export.cluster_id.clone()));
    attributes.insert("export_id".to_string(), Value::String(export.id.clone()));
    attributes.insert("file_type".to_string(), Value::String(export.file_type.clone()));
    attributes.insert("target_uri".to_string(), Value::String(export.target_uri.clone()));
    attributes.insert("databases".to_string(), string_list_value(&export.databases));
    attributes.insert("status".to_string(), Value::String(export.status.to_string()));
    // The service leaves compression out for uncompressed exports
    let compression = export.compression.as_deref().unwrap_or("NONE");
    attributes.insert("compression".to_string(), Value::String(compression.to_string()));
    if let Some(reason) = &export.reason {
        attributes.insert("reason".to_string(), Value::String(reason.clone()));
    }
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&export.cluster_id, &export.id))
}

async fn fetch(
    api: &dyn CloudApi,
    cluster_id: &str,
    export_id: &str,
) -> Result<(Export, ExportState), ApiError> {
    let export = api.get_export(cluster_id, export_id).await?;
    let status = export.status.clone();
    Ok((export, status))
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (cluster_id, export_id) = split_identifier(identifier)?;
    match ctx.api.get_export(cluster_id, export_id).await {
        Ok(export) => Ok(to_state(id, &export)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read export")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let cluster_id = require_str(attrs, "cluster_id")?;
    let request = CreateExportRequest {
        file_type: require_str(attrs, "file_type")?.to_ascii_uppercase(),
        target_uri: require_str(attrs, "target_uri")?.to_string(),
        compression: optional_str(attrs, "compression")?.map(str::to_ascii_uppercase),
        databases: string_list(attrs, "databases")?,
    };

    info!(
        "Exporting cluster {} as {} to {}",
        cluster_id, request.file_type, request.target_uri
    );
    let created = ctx
        .api
        .create_export(cluster_id, &request)
        .await
        .map_err(api_err("create export"))?;
    let export_id = created.id.as_str();
    let identifier = join_identifier(cluster_id, export_id);

    let export = waits
        .waiter(
            [ExportState::Running],
            [ExportState::Succeeded],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, cluster_id, export_id))
        .await?;

    Ok(to_state(&resource.id, &export))
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (cluster_id, export_id) = split_identifier(identifier)?;

    let export = match ctx.api.get_export(cluster_id, export_id).await {
        Ok(export) => export,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_err("read export")(e)),
    };

    if export.status == ExportState::Running {
        info!("Canceling running export {}", identifier);
        ctx.api
            .cancel_export(cluster_id, export_id)
            .await
            .map_err(api_err("cancel export"))?;
        ctx.waits
            .waiter(
                [ExportState::Running],
                [
                    ExportState::Canceled,
                    ExportState::Failed,
                    ExportState::Succeeded,
                ],
                ctx.waits.delete_timeout,
            )
            .wait(identifier, |_| fetch(ctx.api, cluster_id, export_id))
            .await?;
    }

    info!("Deleting export {}", identifier);
    match ctx.api.delete_export(cluster_id, export_id).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_err("delete export")(e)),
    }
}
