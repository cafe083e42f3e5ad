use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;
use serde::Deserialize;

use dbcloud_core::differ::{Diff, diff, without_unknown_write_only};
use dbcloud_core::duration::parse_duration;
use dbcloud_core::provider::{Provider, ProviderError, ProviderResult};
use dbcloud_core::resource::{Resource, ResourceId, State, Value};
use dbcloud_core::schema::ResourceSchema;
use dbcloud_provider::resources::resource_types;
use dbcloud_provider::utils::join_identifier;
use dbcloud_provider::{DbCloudProvider, ProviderConfig};

#[derive(Parser)]
#[command(name = "dbcloud")]
#[command(about = "Manage dbcloud database clusters and their resources", long_about = None)]
struct Cli {
    /// Provider settings as a JSON object; credentials fall back to DBCLOUD_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a resource file against the resource schemas
    Validate {
        /// Path to the JSON resource file
        #[arg(default_value = "resources.json")]
        file: PathBuf,
    },
    /// Show the schema of one or all resource types
    Schema {
        /// Resource type (e.g. cluster)
        resource_type: Option<String>,
    },
    /// Read the current state of a resource
    Read {
        resource_type: String,
        /// Service identifier (e.g. project_id,cluster_id)
        identifier: String,
    },
    /// Create or update the resources of a resource file
    Apply {
        /// Path to the JSON resource file
        #[arg(default_value = "resources.json")]
        file: PathBuf,
    },
    /// Delete a resource and wait until it is gone
    Delete {
        resource_type: String,
        /// Service identifier (e.g. project_id,cluster_id)
        identifier: String,
    },
    /// Wait until a cluster is ACTIVE
    Wait {
        project_id: String,
        cluster_id: String,

        /// Give up after this long (e.g. 30m, 1h)
        #[arg(long, default_value = "30m")]
        timeout: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::Read {
            resource_type,
            identifier,
        } => run_read(config, &resource_type, &identifier).await,
        Commands::Apply { file } => run_apply(config, &file).await,
        Commands::Delete {
            resource_type,
            identifier,
        } => run_delete(config, &resource_type, &identifier).await,
        Commands::Wait {
            project_id,
            cluster_id,
            timeout,
        } => run_wait(config, &project_id, &cluster_id, &timeout).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

// =============================================================================
// Resource Files
// =============================================================================

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

/// A resource from the resource file, with its service identifier when it
/// already exists
#[derive(Debug)]
struct Declared {
    resource: Resource,
    identifier: Option<String>,
}

fn load_resources(path: &Path) -> Result<Vec<Declared>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let declared = parse_resources(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    debug!("Loaded {} resource(s) from {}", declared.len(), path.display());
    Ok(declared)
}

fn parse_resources(content: &str) -> Result<Vec<Declared>, String> {
    let entries: Vec<ResourceEntry> = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut seen = HashSet::new();
    let mut declared = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut resource = Resource::new(entry.resource_type, entry.name);
        if !seen.insert(resource.id.clone()) {
            return Err(format!("Duplicate resource {}", resource.id));
        }
        // null means "not set"
        for (key, value) in &entry.attributes {
            if let Some(value) = Value::from_json(value) {
                resource.attributes.insert(key.clone(), value);
            }
        }
        declared.push(Declared {
            resource,
            identifier: entry.identifier,
        });
    }
    Ok(declared)
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn validate_resources(declared: &[Declared]) -> Result<(), String> {
    let schemas = get_schemas();
    let mut all_errors = Vec::new();

    for Declared { resource, .. } in declared {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    for error in errors {
                        all_errors.push(format!("{}: {}", resource.id, error));
                    }
                }
            }
            None => all_errors.push(format!(
                "{}: Unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

fn load_provider_attributes(path: &Path) -> Result<HashMap<String, Value>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    match Value::from_json(&json) {
        Some(Value::Map(attributes)) => Ok(attributes),
        _ => Err(format!("{} must contain a JSON object", path.display())),
    }
}

fn get_provider(config: Option<&Path>) -> Result<DbCloudProvider, String> {
    let attributes = match config {
        Some(path) => load_provider_attributes(path)?,
        None => HashMap::new(),
    };
    let config = ProviderConfig::from_attributes(&attributes)
        .map_err(|e| format!("Invalid provider configuration: {}", e))?;
    debug!("Using {:?}", config);
    DbCloudProvider::new(config).map_err(|e| e.to_string())
}

// =============================================================================
// Commands
// =============================================================================

fn run_validate(file: &Path) -> Result<(), String> {
    let declared = load_resources(file)?;

    println!("{}", "Validating...".cyan());
    validate_resources(&declared)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", declared.len())
            .green()
            .bold()
    );
    for Declared { resource, .. } in &declared {
        println!("  • {}", resource.id);
    }
    Ok(())
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let schemas = get_schemas();
    let mut names: Vec<&String> = match resource_type {
        Some(name) => {
            let (name, _) = schemas
                .get_key_value(name)
                .ok_or_else(|| format!("Unknown resource type '{}'", name))?;
            vec![name]
        }
        None => schemas.keys().collect(),
    };
    names.sort();

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_schema(&schemas[*name]);
    }
    Ok(())
}

async fn run_read(config: Option<&Path>, resource_type: &str, identifier: &str) -> Result<(), String> {
    let provider = get_provider(config)?;
    let id = ResourceId::new(resource_type, identifier);
    let state = provider.read(&id, identifier).await.map_err(|e| e.to_string())?;

    if !state.exists {
        println!("{}", format!("{} {} not found.", resource_type, identifier).yellow());
        return Ok(());
    }
    print_state(&state, provider.schema(resource_type).as_ref());
    Ok(())
}

async fn run_apply(config: Option<&Path>, file: &Path) -> Result<(), String> {
    let declared = load_resources(file)?;
    validate_resources(&declared)?;
    let provider = get_provider(config)?;

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;
    for Declared {
        resource,
        identifier,
    } in &declared
    {
        match apply_resource(&provider, resource, identifier.as_deref()).await {
            Ok((action, state)) => {
                println!("  {} {} {}", "✓".green(), action, resource.id);
                if let Some(identifier) = &state.identifier {
                    println!("      identifier: {}", identifier);
                }
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), resource.id, e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} resource(s) applied.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            success_count, failure_count
        ))
    }
}

/// Action taken for one resource during apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Update,
    NoChange,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "Create"),
            Action::Update => write!(f, "Update"),
            Action::NoChange => write!(f, "No change"),
        }
    }
}

async fn apply_resource(
    provider: &impl Provider,
    resource: &Resource,
    identifier: Option<&str>,
) -> ProviderResult<(Action, State)> {
    let Some(identifier) = identifier else {
        return Ok((Action::Create, provider.create(resource).await?));
    };

    let schema = provider.schema(&resource.id.resource_type).ok_or_else(|| {
        ProviderError::new(format!("Unknown resource type: {}", resource.id.resource_type))
            .for_resource(resource.id.clone())
    })?;
    let mut desired = resource.clone();
    schema.normalize(&mut desired.attributes);
    schema.apply_defaults(&mut desired.attributes);

    let current = provider.read(&resource.id, identifier).await?;
    match diff(&desired, &current) {
        Diff::Create(to) => Ok((Action::Create, provider.create(&to).await?)),
        Diff::Update {
            id,
            from,
            to,
            changed_attributes,
        } => {
            if without_unknown_write_only(&schema, &from.attributes, changed_attributes).is_empty() {
                return Ok((Action::NoChange, from));
            }
            let state = provider.update(&id, identifier, &from, &to).await?;
            Ok((Action::Update, state))
        }
        Diff::NoChange(_) => Ok((Action::NoChange, current)),
    }
}

async fn run_delete(config: Option<&Path>, resource_type: &str, identifier: &str) -> Result<(), String> {
    let provider = get_provider(config)?;
    let id = ResourceId::new(resource_type, identifier);

    println!("{}", format!("Deleting {} {}...", resource_type, identifier).red().bold());
    provider.delete(&id, identifier).await.map_err(|e| e.to_string())?;
    println!("  {} Deleted {} {}", "✓".green(), resource_type, identifier);
    Ok(())
}

async fn run_wait(
    config: Option<&Path>,
    project_id: &str,
    cluster_id: &str,
    timeout: &str,
) -> Result<(), String> {
    let timeout = parse_duration(timeout).map_err(|e| format!("Invalid --timeout: {}", e))?;
    let provider = get_provider(config)?;
    let identifier = join_identifier(project_id, cluster_id);
    let id = ResourceId::new("cluster", cluster_id);

    println!("{}", format!("Waiting for cluster {}...", identifier).cyan());
    let state = provider
        .wait_for_cluster(&id, &identifier, timeout)
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state, provider.schema("cluster").as_ref());
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_schema(schema: &ResourceSchema) {
    println!("{}", schema.resource_type.cyan().bold());
    if let Some(description) = &schema.description {
        println!("  {}", description.dimmed());
    }

    let mut attributes: Vec<_> = schema.attributes.values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));
    for attr in attributes {
        let mut flags = Vec::new();
        if attr.required {
            flags.push("required".to_string());
        }
        if attr.computed {
            flags.push("computed".to_string());
        }
        if attr.sensitive {
            flags.push("sensitive".to_string());
        }
        if attr.write_only {
            flags.push("write-only".to_string());
        }
        if attr.force_new {
            flags.push("forces replacement".to_string());
        }
        if let Some(default) = &attr.default {
            flags.push(format!("default {}", format_value(default)));
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", flags.join(", "))
        };
        println!("  {}: {}{}", attr.name.bold(), attr.attr_type, flags.dimmed());
    }
}

fn print_state(state: &State, schema: Option<&ResourceSchema>) {
    match &state.identifier {
        Some(identifier) => println!("{} {}", state.id.resource_type.cyan().bold(), identifier),
        None => println!("{}", state.id.resource_type.cyan().bold()),
    }

    let mut keys: Vec<&String> = state.attributes.keys().collect();
    keys.sort();
    for key in keys {
        let sensitive = schema.is_some_and(|s| s.is_sensitive(key));
        println!(
            "  {}: {}",
            key.bold(),
            display_value(&state.attributes[key], sensitive)
        );
    }
}

fn display_value(value: &Value, sensitive: bool) -> String {
    if sensitive {
        "(sensitive)".to_string()
    } else {
        format_value(value)
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
    }
}
