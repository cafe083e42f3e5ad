//! Resource type definitions and per-resource handlers
//!
//! Every module exposes `schema()` plus async `read` / `create` / `delete`
//! handlers (and `update` where the service supports in-place changes).
//! Handlers only see the [`CloudApi`] trait, so they run unchanged against
//! the HTTP client or a mock.

pub mod backup;
pub mod cluster;
pub mod export;
pub mod node_group;
pub mod private_endpoint;
pub mod restore;
pub mod sql_user;

use dbcloud_core::provider::ResourceType;
use dbcloud_core::schema::ResourceSchema;

use crate::client::CloudApi;
use crate::config::WaitConfig;

/// Everything a handler needs besides its inputs
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub api: &'a dyn CloudApi,
    pub waits: &'a WaitConfig,
}

/// Macro to define resource types
macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $module:ident) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $module::schema()
            }
        }
    };
}

define_resource_type!(ClusterType, "cluster", cluster);
define_resource_type!(NodeGroupType, "node_group", node_group);
define_resource_type!(PrivateEndpointType, "private_endpoint", private_endpoint);
define_resource_type!(SqlUserType, "sql_user", sql_user);
define_resource_type!(BackupType, "backup", backup);
define_resource_type!(RestoreType, "restore", restore);
define_resource_type!(ExportType, "export", export);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ClusterType),
        Box::new(NodeGroupType),
        Box::new(PrivateEndpointType),
        Box::new(SqlUserType),
        Box::new(BackupType),
        Box::new(RestoreType),
        Box::new(ExportType),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_names_match_type_names() {
        for resource_type in resource_types() {
            assert_eq!(resource_type.schema().resource_type, resource_type.name());
        }
    }
}
