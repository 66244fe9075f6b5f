//! Watch the asset root until Ctrl-C

use anyhow::Result;
use owo_colors::OwoColorize;
use thumbgen_cli::Runner;
use thumbgen_core::Config;
use tracing::warn;

pub async fn run(config: Config) -> Result<()> {
    let runner = Runner::open(config)?;

    let store = runner.engine().store();
    println!("{} {}", "Watching".green().bold(), store.root().display());
    let profiles: Vec<&str> = store.profiles().iter().map(|p| p.name.as_str()).collect();
    println!("{}: {}", "Profiles".dimmed(), profiles.join(", "));
    println!("{}", "Press Ctrl-C to stop".dimmed());

    runner.watch(shutdown_signal()).await?;

    println!("{}", "Stopped".yellow());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the only way out is killing the process
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
