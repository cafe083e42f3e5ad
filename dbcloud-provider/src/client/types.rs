//! Request and response bodies of the dbcloud API

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// Lifecycle states
// =============================================================================

/// Define a lifecycle state enum with its wire names.
///
/// Unknown wire values are kept in `Other` so they survive a round trip and
/// are reported verbatim when a waiter rejects them.
macro_rules! define_state {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum $name {
            $($variant,)+
            /// State not known to this provider version
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(s) => s.as_str(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                match s.to_ascii_uppercase().as_str() {
                    $($wire => $name::$variant,)+
                    _ => $name::Other(s.to_string()),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok($name::from(s.as_str()))
            }
        }
    };
}

define_state!(
    /// Cluster lifecycle
    ClusterState {
        Creating => "CREATING",
        Active => "ACTIVE",
        Modifying => "MODIFYING",
        Pausing => "PAUSING",
        Paused => "PAUSED",
        Resuming => "RESUMING",
        Maintenance => "MAINTENANCE",
        Unavailable => "UNAVAILABLE",
        Deleting => "DELETING",
        Deleted => "DELETED",
    }
);

define_state!(
    /// Node group lifecycle
    NodeGroupState {
        Creating => "CREATING",
        Active => "ACTIVE",
        Modifying => "MODIFYING",
        Deleting => "DELETING",
        Deleted => "DELETED",
    }
);

define_state!(
    /// Private endpoint connection lifecycle
    EndpointState {
        Pending => "PENDING",
        Active => "ACTIVE",
        Failed => "FAILED",
        Deleting => "DELETING",
        Deleted => "DELETED",
    }
);

define_state!(
    /// Backup job lifecycle
    BackupState {
        Pending => "PENDING",
        Running => "RUNNING",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
);

define_state!(
    /// Restore job lifecycle
    RestoreState {
        Pending => "PENDING",
        Running => "RUNNING",
        Success => "SUCCESS",
        Failed => "FAILED",
    }
);

define_state!(
    /// Data export lifecycle
    ExportState {
        Running => "RUNNING",
        Succeeded => "SUCCEEDED",
        Failed => "FAILED",
        Canceled => "CANCELED",
    }
);

// =============================================================================
// Shared
// =============================================================================

/// Response of every create call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedResource {
    pub id: String,
}

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Clusters
// =============================================================================

/// Size of one cluster component tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub node_size: String,
    pub node_quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_size_gib: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub compute: ComponentSpec,
    pub storage: ComponentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<ComponentSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAccessEntry {
    pub cidr: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub cluster_type: String,
    pub cloud_provider: String,
    pub region: String,
    pub port: i64,
    pub status: ClusterState,
    #[serde(default)]
    pub components: Option<Components>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub create_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub cluster_type: String,
    pub cloud_provider: String,
    pub region: String,
    pub port: i64,
    pub root_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_access_list: Vec<IpAccessEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateClusterRequest {
    pub components: Components,
}

// =============================================================================
// Node groups
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub node_spec: String,
    pub node_count: i64,
    pub status: NodeGroupState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNodeGroupRequest {
    pub name: String,
    pub node_spec: String,
    pub node_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNodeGroupRequest {
    pub node_count: i64,
}

// =============================================================================
// Private endpoints
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateEndpoint {
    pub id: String,
    pub cluster_id: String,
    pub endpoint_name: String,
    pub status: EndpointState,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePrivateEndpointRequest {
    pub endpoint_name: String,
}

// =============================================================================
// SQL users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUser {
    pub user_name: String,
    pub builtin_role: String,
    #[serde(default)]
    pub custom_roles: Vec<String>,
    #[serde(default)]
    pub auth_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSqlUserRequest {
    pub user_name: String,
    pub password: String,
    pub builtin_role: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_roles: Vec<String>,
    pub auth_method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSqlUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_roles: Option<Vec<String>>,
}

// =============================================================================
// Backups and restores
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: BackupState,
    #[serde(default)]
    pub size_bytes: Option<i64>,
    #[serde(default)]
    pub create_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBackupRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restore {
    pub id: String,
    pub project_id: String,
    pub backup_id: String,
    pub name: String,
    pub status: RestoreState,
    /// Cluster created by the restore, once known
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub create_timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreConfig {
    pub root_password: String,
    pub port: i64,
    pub components: Components,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRestoreRequest {
    pub backup_id: String,
    pub name: String,
    pub config: RestoreConfig,
}

// =============================================================================
// Exports
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub id: String,
    pub cluster_id: String,
    pub status: ExportState,
    pub file_type: String,
    pub target_uri: String,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    /// Failure reason reported by the service
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExportRequest {
    pub file_type: String,
    pub target_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<String>,
}
