//! Provider - Trait abstracting resource operations
//!
//! A Provider maps resource CRUD onto a concrete service API. It is
//! responsible for translating attributes into API calls and back.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;
use crate::waiter::WaitError;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl<E> From<WaitError<E>> for ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: WaitError<E>) -> Self {
        ProviderError::new(err.to_string()).with_cause(err)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "cluster")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "dbcloud")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Schema of a single resource type
    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        self.resource_types()
            .into_iter()
            .find(|t| t.name() == resource_type)
            .map(|t| t.schema())
    }

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if the resource does not exist.
    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource and wait until it is usable
    ///
    /// Returns State with identifier set to the service identifier
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource and wait until it is gone
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn schema(&self, resource_type: &str) -> Option<ResourceSchema> {
        (**self).schema(resource_type)
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(id, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(id, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    struct WidgetType;

    impl ResourceType for WidgetType {
        fn name(&self) -> &'static str {
            "widget"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("widget")
                .attribute(AttributeSchema::new("size", AttributeType::Int).required())
        }
    }

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![Box::new(WidgetType)]
        }

        fn read(
            &self,
            id: &ResourceId,
            _identifier: &str,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("mock-id-123")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete(&self, _id: &ResourceId, _identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let id = ResourceId::new("widget", "example");
        let state = provider.read(&id, "mock-id-123").await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_existing() {
        let provider = MockProvider;
        let resource = Resource::new("widget", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("mock-id-123".to_string()));
    }

    #[test]
    fn schema_lookup_by_type_name() {
        let provider = MockProvider;
        assert!(provider.schema("widget").is_some());
        assert!(provider.schema("gadget").is_none());
    }

    #[test]
    fn error_display_includes_resource() {
        let err = ProviderError::new("boom").for_resource(ResourceId::new("cluster", "main"));
        assert_eq!(err.to_string(), "[cluster.main] boom");
    }

    #[test]
    fn wait_error_converts_with_cause() {
        let wait: WaitError<std::io::Error> = WaitError::UnexpectedState {
            id: "42".to_string(),
            status: "PAUSED".to_string(),
            expected: "ACTIVE".to_string(),
        };
        let err: ProviderError = wait.into();
        assert_eq!(
            err.to_string(),
            "unexpected state 'PAUSED' for 42, wanted one of: ACTIVE"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
