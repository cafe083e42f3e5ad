//! sql_user - Database user of a cluster
//!
//! Identifier: `cluster_id,user_name`. User changes are synchronous, so no
//! waits are involved.

use std::collections::HashMap;

use dbcloud_core::provider::ProviderResult;
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use log::info;

use super::Context;
use crate::client::types::{CreateSqlUserRequest, SqlUser, UpdateSqlUserRequest};
use crate::utils::{
    api_err, join_identifier, optional_str, require_str, split_identifier, string_list,
    string_list_value,
};

pub const DEFAULT_AUTH_METHOD: &str = "mysql_native_password";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("sql_user")
        .with_description("SQL user of a cluster")
        .attribute(
            AttributeSchema::new("cluster_id", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("user_name", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("password", AttributeType::String)
                .required()
                .sensitive()
                .write_only(),
        )
        .attribute(
            AttributeSchema::new(
                "builtin_role",
                AttributeType::Enum(vec![
                    "role_admin".to_string(),
                    "role_readwrite".to_string(),
                    "role_readonly".to_string(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new(
            "custom_roles",
            AttributeType::List(Box::new(AttributeType::String)),
        ))
        .attribute(
            AttributeSchema::new("auth_method", AttributeType::String)
                .force_new()
                .with_default(Value::String(DEFAULT_AUTH_METHOD.to_string())),
        )
}

fn to_state(id: &ResourceId, cluster_id: &str, user: &SqlUser) -> State {
    let mut attributes = HashMap::new();
    attributes.insert("cluster_id".to_string(), Value::String(cluster_id.to_string()));
    attributes.insert("user_name".to_string(), Value::String(user.user_name.clone()));
    attributes.insert(
        "builtin_role".to_string(),
        Value::String(user.builtin_role.clone()),
    );
    attributes.insert("custom_roles".to_string(), string_list_value(&user.custom_roles));
    if let Some(auth_method) = &user.auth_method {
        attributes.insert("auth_method".to_string(), Value::String(auth_method.clone()));
    }
    State::existing(id.clone(), attributes)
        .with_identifier(join_identifier(cluster_id, &user.user_name))
}

pub async fn read(ctx: Context<'_>, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let (cluster_id, user_name) = split_identifier(identifier)?;
    match ctx.api.get_sql_user(cluster_id, user_name).await {
        Ok(user) => Ok(to_state(id, cluster_id, &user)),
        Err(e) if e.is_not_found() => Ok(State::not_found(id.clone())),
        Err(e) => Err(api_err("read SQL user")(e)),
    }
}

pub async fn create(ctx: Context<'_>, resource: &Resource) -> ProviderResult<State> {
    let attrs = &resource.attributes;
    let cluster_id = require_str(attrs, "cluster_id")?;
    let request = CreateSqlUserRequest {
        user_name: require_str(attrs, "user_name")?.to_string(),
        password: require_str(attrs, "password")?.to_string(),
        builtin_role: require_str(attrs, "builtin_role")?.to_string(),
        custom_roles: string_list(attrs, "custom_roles")?,
        auth_method: optional_str(attrs, "auth_method")?
            .unwrap_or(DEFAULT_AUTH_METHOD)
            .to_string(),
    };

    info!("Creating SQL user '{}' in cluster {}", request.user_name, cluster_id);
    let user = ctx
        .api
        .create_sql_user(cluster_id, &request)
        .await
        .map_err(api_err("create SQL user"))?;

    Ok(to_state(&resource.id, cluster_id, &user)
        .carry_over(resource, &schema().write_only_attributes()))
}

/// Send only the changed fields
pub async fn update(
    ctx: Context<'_>,
    identifier: &str,
    to: &Resource,
    changed: &[String],
) -> ProviderResult<State> {
    let attrs = &to.attributes;
    let (cluster_id, user_name) = split_identifier(identifier)?;
    let has_changed = |name: &str| changed.iter().any(|c| c == name);

    let mut request = UpdateSqlUserRequest::default();
    if has_changed("password") {
        request.password = Some(require_str(attrs, "password")?.to_string());
    }
    if has_changed("builtin_role") {
        request.builtin_role = Some(require_str(attrs, "builtin_role")?.to_string());
    }
    if has_changed("custom_roles") {
        request.custom_roles = Some(string_list(attrs, "custom_roles")?);
    }

    let user = if request == UpdateSqlUserRequest::default() {
        ctx.api
            .get_sql_user(cluster_id, user_name)
            .await
            .map_err(api_err("read SQL user"))?
    } else {
        info!("Updating SQL user {}", identifier);
        ctx.api
            .update_sql_user(cluster_id, user_name, &request)
            .await
            .map_err(api_err("update SQL user"))?
    };

    Ok(to_state(&to.id, cluster_id, &user)
        .carry_over(to, &schema().write_only_attributes()))
}

pub async fn delete(ctx: Context<'_>, identifier: &str) -> ProviderResult<()> {
    let (cluster_id, user_name) = split_identifier(identifier)?;
    info!("Deleting SQL user {}", identifier);
    match ctx.api.delete_sql_user(cluster_id, user_name).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(api_err("delete SQL user")(e)),
    }
}
