//! dbcloud Provider implementation
//!
//! Dispatches resource operations to the per-resource handlers and applies
//! the checks every resource shares: schema validation and defaults before
//! create, change detection and replacement checks before update.

use std::sync::Arc;
use std::time::Duration;

use dbcloud_core::differ::{
    find_changed_attributes, replacement_attributes, without_unknown_write_only,
};
use dbcloud_core::provider::{ProviderError, ProviderResult};
use dbcloud_core::resource::{Resource, ResourceId, State};
use dbcloud_core::schema::ResourceSchema;
use log::{debug, info};

use crate::client::{CloudApi, HttpClient};
use crate::config::{ProviderConfig, WaitConfig};
use crate::resources::{
    Context, backup, cluster, export, node_group, private_endpoint, restore, sql_user,
};

/// Look up the schema of a resource type
fn get_schema(resource_type: &str) -> Option<ResourceSchema> {
    crate::resources::resource_types()
        .into_iter()
        .find(|t| t.name() == resource_type)
        .map(|t| t.schema())
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

/// dbcloud Provider
pub struct DbCloudProvider {
    api: Arc<dyn CloudApi>,
    waits: WaitConfig,
}

impl DbCloudProvider {
    /// Create a provider talking to the configured endpoint
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let client = HttpClient::new(&config.host, config.public_key, config.private_key)
            .map_err(|e| ProviderError::new(format!("Failed to create API client: {}", e)).with_cause(e))?;
        Ok(Self::with_api(Arc::new(client), config.waits))
    }

    /// Create a provider on top of any API implementation
    pub fn with_api(api: Arc<dyn CloudApi>, waits: WaitConfig) -> Self {
        Self { api, waits }
    }

    fn context(&self) -> Context<'_> {
        Context {
            api: self.api.as_ref(),
            waits: &self.waits,
        }
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    pub async fn read_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let ctx = self.context();
        let result = match id.resource_type.as_str() {
            "cluster" => cluster::read(ctx, id, identifier).await,
            "node_group" => node_group::read(ctx, id, identifier).await,
            "private_endpoint" => private_endpoint::read(ctx, id, identifier).await,
            "sql_user" => sql_user::read(ctx, id, identifier).await,
            "backup" => backup::read(ctx, id, identifier).await,
            "restore" => restore::read(ctx, id, identifier).await,
            "export" => export::read(ctx, id, identifier).await,
            _ => return Err(unknown_type(id)),
        };
        result.map_err(|e| e.for_resource(id.clone()))
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let schema = get_schema(&id.resource_type).ok_or_else(|| unknown_type(id))?;

        let mut resource = resource.clone();
        schema.normalize(&mut resource.attributes);
        validate(&schema, &resource)?;
        schema.apply_defaults(&mut resource.attributes);

        info!("Creating {}", id);
        let ctx = self.context();
        let result = match id.resource_type.as_str() {
            "cluster" => cluster::create(ctx, &resource).await,
            "node_group" => node_group::create(ctx, &resource).await,
            "private_endpoint" => private_endpoint::create(ctx, &resource).await,
            "sql_user" => sql_user::create(ctx, &resource).await,
            "backup" => backup::create(ctx, &resource).await,
            "restore" => restore::create(ctx, &resource).await,
            "export" => export::create(ctx, &resource).await,
            _ => return Err(unknown_type(id)),
        };
        result.map_err(|e| e.for_resource(id.clone()))
    }

    /// Update a resource in place.
    ///
    /// Fails without touching the service when a changed attribute can only
    /// be applied by replacing the resource.
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let schema = get_schema(&id.resource_type).ok_or_else(|| unknown_type(id))?;

        let mut to = to.clone();
        schema.normalize(&mut to.attributes);
        validate(&schema, &to)?;
        schema.apply_defaults(&mut to.attributes);

        let changed = without_unknown_write_only(
            &schema,
            &from.attributes,
            find_changed_attributes(&to.attributes, &from.attributes),
        );
        if changed.is_empty() {
            debug!("{} is up to date", id);
            return Ok(from.clone());
        }

        let replace = replacement_attributes(&schema, &changed);
        if !replace.is_empty() {
            return Err(ProviderError::new(format!(
                "Changing {} requires replacement",
                replace.join(", ")
            ))
            .for_resource(id.clone()));
        }

        info!("Updating {} ({})", id, changed.join(", "));
        let ctx = self.context();
        let result = match id.resource_type.as_str() {
            "cluster" => cluster::update(ctx, identifier, &to, &changed).await,
            "node_group" => node_group::update(ctx, identifier, &to).await,
            "sql_user" => sql_user::update(ctx, identifier, &to, &changed).await,
            _ => Err(ProviderError::new(format!(
                "Update not supported for {}, delete and recreate",
                id.resource_type
            ))),
        };
        result.map_err(|e| e.for_resource(id.clone()))
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        info!("Deleting {}", id);
        let ctx = self.context();
        let result = match id.resource_type.as_str() {
            "cluster" => cluster::delete(ctx, identifier).await,
            "node_group" => node_group::delete(ctx, identifier).await,
            "private_endpoint" => private_endpoint::delete(ctx, identifier).await,
            "sql_user" => sql_user::delete(ctx, identifier).await,
            "backup" => backup::delete(ctx, identifier).await,
            "restore" => restore::delete(ctx, identifier).await,
            "export" => export::delete(ctx, identifier).await,
            _ => return Err(unknown_type(id)),
        };
        result.map_err(|e| e.for_resource(id.clone()))
    }

    /// Wait until a cluster reports ACTIVE
    pub async fn wait_for_cluster(
        &self,
        id: &ResourceId,
        identifier: &str,
        timeout: Duration,
    ) -> ProviderResult<State> {
        cluster::wait_until_active(self.context(), id, identifier, timeout)
            .await
            .map_err(|e| e.for_resource(id.clone()))
    }
}

fn validate(schema: &ResourceSchema, resource: &Resource) -> ProviderResult<()> {
    schema.validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ProviderError::new(format!("Invalid configuration: {}", messages.join("; ")))
            .for_resource(resource.id.clone())
    })
}
