use ccm_core::ProviderRegistry;
use serde_json::json;

use crate::config::CliConfig;

pub fn execute(cfg: &CliConfig, json: bool) -> anyhow::Result<()> {
    let registry = cfg.registry()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&registry))?);
        return Ok(());
    }

    println!("Consent platforms:");
    for (key, sig) in registry.providers() {
        println!(
            "  {key:<14} {:<14} {} (banner: {})",
            sig.provider_name,
            sig.provider_base_domain,
            sig.banner_element_ids.join(", ")
        );
    }
    println!("Analytics:");
    for (key, sig) in registry.analytics_providers() {
        println!("  {key:<14} {:<18} {}", sig.provider_name, sig.container_domains.join(", "));
    }
    Ok(())
}

fn to_json(registry: &ProviderRegistry) -> serde_json::Value {
    let consent: serde_json::Map<String, serde_json::Value> = registry
        .providers()
        .map(|(k, s)| (k.to_string(), json!(s)))
        .collect();
    let analytics: serde_json::Map<String, serde_json::Value> = registry
        .analytics_providers()
        .map(|(k, s)| (k.to_string(), json!(s)))
        .collect();
    json!({ "providers": consent, "analytics": analytics })
}
