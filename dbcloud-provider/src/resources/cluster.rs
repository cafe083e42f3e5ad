//! cluster - Managed database cluster
//!
//! Identifier: `project_id,cluster_id`. Creation, scaling, pausing and
//! deletion are asynchronous on the service side; every mutating call is
//! followed by a wait on the cluster status.

use std::collections::HashMap;
use std::time::Duration;

use dbcloud_core::provider::{ProviderError, ProviderResult};
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::info;

use super::Context;
use crate::client::types::{
    Cluster, ClusterState, Components, CreateClusterRequest, IpAccessEntry, UpdateClusterRequest,
};
use crate::client::{ApiError, CloudApi};
use crate::config::WaitConfig;
use crate::utils::{
    api_err, decode_block, encode_block, join_identifier, optional_bool, optional_int,
    require_str, split_identifier,
};

pub const DEFAULT_PORT: i64 = 4000;

fn component() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("node_size", AttributeType::String).required(),
        AttributeSchema::new("node_quantity", types::positive_int()).required(),
        AttributeSchema::new("storage_size_gib", types::positive_int()),
    ])
}

/// Compute, storage and optional analytics tiers
pub fn components_type() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("compute", component()).required(),
        AttributeSchema::new("storage", component()).required(),
        AttributeSchema::new("analytics", component()),
    ])
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("cluster")
        .with_description("Managed database cluster")
        .attribute(
            AttributeSchema::new("project_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", types::name()).required().force_new())
        .attribute(
            AttributeSchema::new(
                "cluster_type",
                AttributeType::Enum(vec!["DEDICATED".to_string(), "DEVELOPER".to_string()]),
            )
            .required()
            .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "cloud_provider",
                AttributeType::Enum(vec![
                    "AWS".to_string(),
                    "GCP".to_string(),
                    "AZURE".to_string(),
                ]),
            )
            .required()
            .force_new(),
        )
        .attribute(
            AttributeSchema::new("region", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("port", types::port())
                .force_new()
                .with_default(Value::Int(DEFAULT_PORT)),
        )
        .attribute(
            AttributeSchema::new("root_password", AttributeType::String)
                .required()
                .sensitive()
                .write_only()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "ip_access_list",
                AttributeType::List(Box::new(AttributeType::Object(vec![
                    AttributeSchema::new("cidr", AttributeType::String).required(),
                    AttributeSchema::new("description", AttributeType::String),
                ]))),
            )
            .write_only()
            .force_new(),
        )
        .attribute(
            AttributeSchema::new("components", components_type())
                .with_description("Node sizes and counts; required for DEDICATED clusters"),
        )
        .attribute(
            AttributeSchema::new("paused", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(AttributeSchema::new("timeouts", types::timeouts()))
        .attribute(AttributeSchema::new("cluster_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
        .attribute(AttributeSchema::new("version", AttributeType::String).computed())
        .attribute(AttributeSchema::new("host", AttributeType::String).computed())
        .attribute(AttributeSchema::new("create_timestamp", AttributeType::String).computed())
}

fn to_state(id: &ResourceId, cluster: &Cluster) -> State {
    let mut attributes = HashMap::new();
    let mut set = |key: &str, value: &str| {
        attributes.insert(key.to_string(), Value::String(value.to_string()));
    };
    set("project_id", cluster.project_id.as_str());
    set("cluster_id", cluster.id.as_str());
    set("name", cluster.name.as_str());
    set("cluster_type", cluster.cluster_type.as_str());
    set("cloud_provider", cluster.cloud_provider.as_str());
    set("region", cluster.region.as_str());
    set("status", cluster.status.as_str());
    for (key, value) in [
        ("version", &cluster.version),
        ("host", &cluster.host),
        ("create_timestamp", &cluster.create_timestamp),
    ] {
        if let Some(value) = value {
            set(key, value.as_str());
        }
    }

    attributes.insert("port".to_string(), Value::Int(cluster.port));
    attributes.insert(
        "paused".to_string(),
        Value::Bool(matches!(
            cluster.status,
            ClusterState::Paused | ClusterState::Pausing
        )),
    );
    if let Some(components) = cluster.components.as_ref().and_then(encode_block) {
        attributes.insert("components".to_string(), components);
    }

    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(&cluster.project_id, &cluster.id))
}

async fn fetch(
    api: &dyn CloudApi,
    project_id: &str,
    cluster_id: &str,
) -> Result<(Cluster, ClusterState), ApiError> {
    let cluster = api.get_cluster(project_id, cluster_id).await?;
    let status = cluster.status.clone();
    Ok((cluster, status))
}

/// Status lookup for delete waits; a vanished cluster counts as deleted
async fn fetch_deleted(
    api: &dyn CloudApi,
    project_id: &str,
    cluster_id: &str,
) -> Result<((), ClusterState), ApiError> {
    match api.get_cluster(project_id, cluster_id).await {
        Ok(cluster) => Ok(((), cluster.status)),
        Err(ApiError::NotFound) => Ok(((), ClusterState::Deleted)),
        Err(e) => Err(e),
    }
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (project_id, cluster_id) = split_identifier(identifier)?;
    match ctx.api.get_cluster(project_id, cluster_id).await {
        Ok(cluster) if cluster.status == ClusterState::Deleted => Ok(State::not_found(id.clone())),
        Ok(cluster) => Ok(to_state(id, &cluster)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read cluster")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;

    let project_id = require_str(attrs, "project_id")?;
    let cluster_type = require_str(attrs, "cluster_type")?.to_ascii_uppercase();
    let components: Option<Components> = attrs
        .get("components")
        .map(|v| decode_block("components", v))
        .transpose()?;
    if cluster_type == "DEDICATED" && components.is_none() {
        return Err(ProviderError::new(
            "Attribute 'components' is required for DEDICATED clusters",
        ));
    }
    let ip_access_list: Vec<IpAccessEntry> = attrs
        .get("ip_access_list")
        .map(|v| decode_block("ip_access_list", v))
        .transpose()?
        .unwrap_or_default();

    let request = CreateClusterRequest {
        name: require_str(attrs, "name")?.to_string(),
        cluster_type,
        cloud_provider: require_str(attrs, "cloud_provider")?.to_ascii_uppercase(),
        region: require_str(attrs, "region")?.to_string(),
        port: optional_int(attrs, "port")?.unwrap_or(DEFAULT_PORT),
        root_password: require_str(attrs, "root_password")?.to_string(),
        components,
        ip_access_list,
    };

    info!(
        "Creating {} cluster '{}' in project {}",
        request.cluster_type, request.name, project_id
    );
    let created = ctx
        .api
        .create_cluster(project_id, &request)
        .await
        .map_err(api_err("create cluster"))?;
    let cluster_id = created.id.as_str();
    let identifier = join_identifier(project_id, cluster_id);

    let mut cluster = waits
        .waiter(
            [ClusterState::Creating],
            [ClusterState::Active],
            waits.create_timeout,
        )
        .wait(&identifier, |_| fetch(ctx.api, project_id, cluster_id))
        .await?;

    if optional_bool(attrs, "paused")?.unwrap_or(false) {
        cluster = pause(ctx.api, &waits, project_id, cluster_id).await?;
    }

    Ok(to_state(&resource.id, &cluster)
        .carry_over(resource, &schema().write_only_attributes()))
}

/// Apply `paused` and `components` changes.
///
/// A paused cluster is resumed before scaling and paused again afterwards
/// only when the configuration asks for it.
pub async fn update(
    ctx: Context<'_>,
    identifier: &str,
    to: &Resource,
    changed: &[String],
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let waits = ctx.waits.with_overrides(attrs.get("timeouts"))?;
    let (project_id, cluster_id) = split_identifier(identifier)?;

    let want_paused = optional_bool(attrs, "paused")?.unwrap_or(false);
    let components: Option<Components> = if changed.iter().any(|c| c == "components") {
        attrs
            .get("components")
            .map(|v| decode_block("components", v))
            .transpose()?
    } else {
        None
    };
    if want_paused && components.is_some() {
        return Err(ProviderError::new(
            "Cannot change components of a cluster that stays paused; set paused = false first",
        ));
    }

    let cluster = ctx
        .api
        .get_cluster(project_id, cluster_id)
        .await
        .map_err(api_err("read cluster"))?;
    let mut cluster = settle(ctx.api, &waits, project_id, cluster_id, cluster).await?;

    if !want_paused && cluster.status == ClusterState::Paused {
        cluster = resume(ctx.api, &waits, project_id, cluster_id).await?;
    }

    if let Some(components) = components {
        info!("Scaling cluster {}", identifier);
        ctx.api
            .update_cluster(project_id, cluster_id, &UpdateClusterRequest { components })
            .await
            .map_err(api_err("update cluster"))?;
        cluster = waits
            .waiter(
                [ClusterState::Modifying, ClusterState::Maintenance],
                [ClusterState::Active],
                waits.update_timeout,
            )
            .wait(identifier, |_| fetch(ctx.api, project_id, cluster_id))
            .await?;
    }

    if want_paused && cluster.status != ClusterState::Paused {
        cluster = pause(ctx.api, &waits, project_id, cluster_id).await?;
    }

    Ok(to_state(&to.id, &cluster)
        .carry_over(to, &schema().write_only_attributes()))
}

/// Let a pause or resume already running on the service finish.
async fn settle(
    api: &dyn CloudApi,
    waits: &WaitConfig,
    project_id: &str,
    cluster_id: &str,
    cluster: Cluster,
) -> ProviderResult<Cluster> {
    let (pending, target) = match cluster.status {
        ClusterState::Pausing => (ClusterState::Pausing, ClusterState::Paused),
        ClusterState::Resuming => (ClusterState::Resuming, ClusterState::Active),
        _ => return Ok(cluster),
    };
    let identifier = join_identifier(project_id, cluster_id);
    info!("Cluster {} is {}, waiting for {}", identifier, pending, target);
    let cluster = waits
        .waiter([pending], [target], waits.update_timeout)
        .wait(&identifier, |_| fetch(api, project_id, cluster_id))
        .await?;
    Ok(cluster)
}

async fn pause(
    api: &dyn CloudApi,
    waits: &WaitConfig,
    project_id: &str,
    cluster_id: &str,
) -> ProviderResult<Cluster> {
    let identifier = join_identifier(project_id, cluster_id);
    info!("Pausing cluster {}", identifier);
    api.pause_cluster(project_id, cluster_id)
        .await
        .map_err(api_err("pause cluster"))?;
    let cluster = waits
        .waiter(
            [ClusterState::Active, ClusterState::Pausing],
            [ClusterState::Paused],
            waits.update_timeout,
        )
        .wait(&identifier, |_| fetch(api, project_id, cluster_id))
        .await?;
    Ok(cluster)
}

async fn resume(
    api: &dyn CloudApi,
    waits: &WaitConfig,
    project_id: &str,
    cluster_id: &str,
) -> ProviderResult<Cluster> {
    let identifier = join_identifier(project_id, cluster_id);
    info!("Resuming cluster {}", identifier);
    api.resume_cluster(project_id, cluster_id)
        .await
        .map_err(api_err("resume cluster"))?;
    let cluster = waits
        .waiter(
            [ClusterState::Paused, ClusterState::Resuming],
            [ClusterState::Active],
            waits.update_timeout,
        )
        .wait(&identifier, |_| fetch(api, project_id, cluster_id))
        .await?;
    Ok(cluster)
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (project_id, cluster_id) = split_identifier(identifier)?;

    info!("Deleting cluster {}", identifier);
    match ctx.api.delete_cluster(project_id, cluster_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(api_err("delete cluster")(e)),
    }

    ctx.waits
        .waiter(
            [
                ClusterState::Active,
                ClusterState::Paused,
                ClusterState::Deleting,
            ],
            [ClusterState::Deleted],
            ctx.waits.delete_timeout,
        )
        .wait(identifier, |_| fetch_deleted(ctx.api, project_id, cluster_id))
        .await?;
    Ok(())
}

/// Wait until an existing cluster is ACTIVE (e.g., after a change made outside the provider)
pub async fn wait_until_active(
    ctx: Context<'_>,
    id: &ResourceId,
    identifier: &str,
    timeout: Duration,
) -> ProviderResult<State> {
    let (project_id, cluster_id) = split_identifier(identifier)?;
    let cluster = ctx
        .waits
        .waiter(
            [
                ClusterState::Creating,
                ClusterState::Modifying,
                ClusterState::Maintenance,
                ClusterState::Resuming,
            ],
            [ClusterState::Active],
            timeout,
        )
        .wait(identifier, |_| fetch(ctx.api, project_id, cluster_id))
        .await?;
    Ok(to_state(id, &cluster))
}
