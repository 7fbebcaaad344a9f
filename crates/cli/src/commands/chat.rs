//! `heimdall chat`: interactive session, or a single turn with `--message`.

use crate::operator::ConsoleOperator;
use anyhow::Context;
use heimdall_agent::{DecisionStep, Session};
use heimdall_config::AppConfig;
use std::sync::Arc;

pub async fn run(message: Option<String>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;

    let provider = heimdall_providers::build_from_config(&config).with_context(|| {
        format!(
            "provider '{}' is not usable; run `heimdall onboard` or check {}",
            config.provider,
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let operator = Arc::new(ConsoleOperator::stdin());
    let tools = heimdall_tools::default_registry(&config, operator.clone(), Some(provider.clone()))
        .context("failed to set up tools")?;
    let tool_names = tools.names().join(", ");

    let decider = DecisionStep::from_config(provider, &config);
    let model = decider.model().to_string();
    let mut session = Session::new(decider, tools, operator).with_agent_config(&config.agent);

    if let Some(message) = message {
        session.handle_input(&message).await?;
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      Heimdall: Pentest Assistant Session      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {model}");
    println!("  Tools:     {tool_names}");
    println!("  Workspace: {}", config.workspace.dir.display());
    println!();
    println!("  Only test systems you are authorized to test.");
    println!("  Every command is shown to you for approval before it runs.");
    println!("  Type 'exit' or 'quit' to end the session.");

    session.run().await?;

    println!();
    println!("  Session ended.");
    println!();
    Ok(())
}
