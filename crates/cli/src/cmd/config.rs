//! Configuration management command
//!
//! Provides CLI interface to view the effective configuration.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use thumbgen_cli::system_config::{self, ConfigSource};
use thumbgen_core::Config;

/// List all configuration values
pub fn run_list(config: &Config, source: &ConfigSource) -> Result<()> {
    println!("{}", "Thumbgen Configuration".bold());
    println!("{}: {}\n", "Source".dimmed(), source.to_string().dimmed());

    println!("  {} = {}", "root".cyan(), config.root.display());

    println!("\n{}", "[watch]".yellow());
    println!(
        "  {} = {} {}",
        "debounce_ms".cyan(),
        config.watch.debounce_ms,
        format!("({}ms)", config.watch.debounce_ms).dimmed()
    );
    println!("  {} = {}", "workers".cyan(), config.watch.workers);
    println!(
        "  {} = {} {}",
        "reconcile_interval_secs".cyan(),
        config.watch.reconcile_interval_secs,
        if config.watch.reconcile_interval_secs == 0 {
            "(startup only)".dimmed().to_string()
        } else {
            format!("({}s)", config.watch.reconcile_interval_secs).dimmed().to_string()
        }
    );

    println!("\n{}", "[render]".yellow());
    println!("  {} = {}", "quality".cyan(), config.render.quality);
    for profile in &config.render.profiles {
        println!(
            "  {} {} {}",
            "profile".cyan(),
            profile.name,
            format!("(max {}x{})", profile.max_width, profile.max_height).dimmed()
        );
    }

    println!("\n{}", "[video]".yellow());
    println!("  {} = {}", "ffmpeg".cyan(), config.video.ffmpeg.display());
    println!("  {} = {}", "timeout_secs".cyan(), config.video.timeout_secs);

    println!("\n{}", "[ignore]".yellow());
    println!("  {} = {}", "use_ignore_file".cyan(), config.ignore.use_ignore_file);
    println!("  {} = {:?}", "patterns".cyan(), config.ignore.patterns);

    println!("\n{}", "[logging]".yellow());
    println!("  {} = {}", "level".cyan(), config.logging.level);
    match &config.logging.dir {
        Some(dir) => println!("  {} = {}", "dir".cyan(), dir.display()),
        None => println!("  {} = {}", "dir".cyan(), "(stderr only)".dimmed()),
    }

    Ok(())
}

/// Show the config file path and optionally create it
pub fn run_path(create: bool) -> Result<()> {
    let config_path = system_config::config_file_path().context("Could not determine config file path")?;

    if create {
        let (path, created) = system_config::init_if_missing()?;
        if created {
            println!("{} Created config file at: {}", "✓".green(), path.display());
        } else {
            println!("{}", path.display());
        }
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", system_config::example_config());
    Ok(())
}
