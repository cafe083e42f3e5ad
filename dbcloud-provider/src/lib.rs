//! dbcloud Provider
//!
//! Provider for the dbcloud managed database service.
//!
//! ## Module Structure
//!
//! - `client` - `CloudApi` trait, wire types and the HTTP client
//! - `config` - Provider configuration and wait timeouts
//! - `provider` - DbCloudProvider implementation
//! - `resources` - Resource schemas and per-resource handlers
//! - `utils` - Identifier and attribute helpers

pub mod client;
pub mod config;
pub mod provider;
pub mod resources;
pub mod utils;

// Re-export main types
pub use client::{ApiError, CloudApi, HttpClient};
pub use config::{ConfigError, ProviderConfig, WaitConfig};
pub use provider::DbCloudProvider;

use dbcloud_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use dbcloud_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for DbCloudProvider {
    fn name(&self) -> &'static str {
        "dbcloud"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.read_resource(&id, &identifier).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
