//! `heimdall status`: show the resolved configuration.

use anyhow::Context;
use heimdall_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    let search = &config.tools.web_search;

    println!("Heimdall Status");
    println!("===============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Workspace:      {}", config.workspace.dir.display());
    println!("  Provider:       {}", config.provider);
    println!("  Model:          {}", config.resolved_model());
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Temperature:    {}", config.temperature);
    println!("  Max steps:      {}", config.agent.max_steps_per_turn);
    println!(
        "  History window: {}",
        config
            .agent
            .history_window
            .map_or_else(|| "all".to_string(), |n| n.to_string())
    );
    println!("  Console:        timeout {} s", config.tools.console.timeout_secs);
    println!(
        "  File writes:    {}",
        if config.tools.file_manager.confirm_writes { "need approval" } else { "direct" }
    );
    println!(
        "  Web search:     region {}, safesearch {}, {} results, fetch top {}{}",
        search.region,
        search.safesearch,
        search.max_results,
        search.fetch_top,
        if search.summarize { ", summarized" } else { "" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; run `heimdall onboard` first");
    }
    Ok(())
}
