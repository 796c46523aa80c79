use anyhow::{Context, Result};
use router_api::Destinations;
use router_core::{
    DarkLaunchSource, MemoryGovernanceStore, OutputFormat, RouteRuleRegistry, RouterSettings,
    YamlFileLoader,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = RouterSettings::from_env()?;
    info!("Router config file: {}", settings.router_config_file.display());

    let store = match &settings.darklaunch_file {
        Some(path) => {
            let values = load_darklaunch_seed(path)?;
            info!("Seeded {} dark launch policies from {}", values.len(), path.display());
            MemoryGovernanceStore::with_values(values)
        }
        None => MemoryGovernanceStore::new(),
    };

    let loader = Arc::new(YamlFileLoader::new(settings.router_config_file.clone()));
    let registry = RouteRuleRegistry::init(loader, Arc::new(store)).await?;

    // Keys given on the command line are looked up one by one
    let keys: Vec<String> = std::env::args().skip(1).collect();
    let table = if keys.is_empty() {
        registry.get_configurations().await?
    } else {
        let mut table = Destinations::new();
        for key in keys {
            match registry.get_configuration_by_key(&key).await {
                Ok(rules) => {
                    table.insert(key, rules);
                }
                Err(e) => warn!("No route rules for {}: {}", key, e),
            }
        }
        table
    };

    let rendered = match settings.output {
        OutputFormat::Json => serde_json::to_string_pretty(&table)?,
        OutputFormat::Yaml => serde_yaml::to_string(&table)?,
    };
    println!("{}", rendered);

    registry.cleanup().await?;
    Ok(())
}

/// Read a JSON object of routing key to policy into governance keys.
///
/// Policies may be given as JSON documents or as already-encoded strings.
fn load_darklaunch_seed(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading dark launch policies from {}", path.display()))?;
    let entries: BTreeMap<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("parsing dark launch policies from {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|(key, policy)| {
            let raw = match policy {
                Value::String(raw) => raw,
                other => other.to_string(),
            };
            (DarkLaunchSource::policy_key(&key), raw)
        })
        .collect())
}
