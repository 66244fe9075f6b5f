//! Re-derive every asset once

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::Instant;
use thumbgen_cli::{util, Runner};
use thumbgen_core::{Config, Outcome};

pub async fn run(config: Config) -> Result<()> {
    let runner = Runner::open(config)?;
    let start = Instant::now();

    println!(
        "{} {}",
        "Regenerating thumbnails in".bold(),
        runner.engine().store().root().display()
    );

    let bar = ProgressBar::new(runner.asset_count()? as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let (reconciled, summary) = runner
        .regenerate(|asset, result| {
            bar.set_message(asset.key.clone());
            bar.inc(1);
            if let Err(e) = result {
                bar.println(format!("{} {}: {}", "✗".red(), asset.key, e));
            } else if let Ok(Outcome::Derived(report)) = result {
                for (profile, e) in &report.failed {
                    bar.println(format!("{} {} [{}]: {}", "!".yellow(), asset.key, profile, e));
                }
            }
        })
        .await?;
    bar.finish_and_clear();

    if !reconciled.removed.is_empty() {
        println!(
            "Removed {} ({})",
            util::plural(reconciled.removed.len(), "orphaned artifact"),
            util::format_size(reconciled.bytes_freed)
        );
    }

    println!(
        "{} {} in {}",
        "✓".green(),
        util::plural(summary.derived, "asset").green(),
        util::format_elapsed(start.elapsed())
    );
    if summary.partial > 0 {
        println!("{} partially derived", util::plural(summary.partial, "asset").yellow());
    }
    if summary.failed > 0 {
        println!("{} failed", util::plural(summary.failed, "asset").red());
    }

    Ok(())
}
