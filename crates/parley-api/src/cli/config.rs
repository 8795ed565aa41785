//! `parley config`: show the configuration the server would run with.

use anyhow::Result;
use console::style;

use parley_types::config::ParleyConfig;

/// Print the resolved config. The API key is never printed.
pub fn show_config(config: &ParleyConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!();
    println!("  {} Parley v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();
    println!(
        "  {} {} ({})",
        style("Provider:").dim(),
        style(&config.provider.name).cyan(),
        config.provider.kind
    );
    println!(
        "  {} {}",
        style("API key:").dim(),
        if config.provider.api_key.is_some() {
            style("set").green()
        } else {
            style("missing").yellow()
        }
    );
    println!();
    for line in toml::to_string_pretty(config)?.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}
