//! `heimdall onboard`: first-time setup.

use anyhow::Context;
use heimdall_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Heimdall: First-Time Setup");
    println!("==========================\n");

    if config_dir.exists() {
        println!("  Config directory exists: {}", config_dir.display());
    } else {
        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("cannot create {}", config_dir.display()))?;
        println!("  Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())
            .with_context(|| format!("cannot write {}", config_path.display()))?;
        println!("  Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load().context("failed to load config")?;
    let workspace = &config.workspace.dir;
    if workspace.exists() {
        println!("  Workspace exists: {}", workspace.display());
    } else {
        std::fs::create_dir_all(workspace)
            .with_context(|| format!("cannot create {}", workspace.display()))?;
        println!("  Created workspace: {}", workspace.display());
    }

    println!("\nNext steps:");
    if !config.has_api_key() && config.provider != "ollama" {
        println!("  1. Set HEIMDALL_API_KEY (or add api_key to {})", config_path.display());
        println!("  2. Run: heimdall chat\n");
    } else {
        println!("  Run: heimdall chat\n");
    }
    Ok(())
}
