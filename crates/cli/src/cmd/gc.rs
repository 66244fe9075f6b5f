//! Run one reconciliation pass

use anyhow::Result;
use owo_colors::OwoColorize;
use thumbgen_cli::{util, Runner};
use thumbgen_core::Config;

pub async fn run(config: Config) -> Result<()> {
    let runner = Runner::open(config)?;

    println!("{}", "Removing orphaned thumbnails...".bold());
    println!();

    let report = runner.reconcile().await;

    println!("{}", "GC Complete".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Source assets:       {}", report.valid_keys);
    println!("Artifacts scanned:   {}", report.scanned);

    if report.removed.is_empty() {
        println!("{}", "No orphans found - thumbnails are already clean".dimmed());
    } else {
        println!("Orphans removed:     {}", report.removed.len().to_string().yellow());
        println!("Space freed:         {}", util::format_size(report.bytes_freed).green());
    }

    for (path, e) in &report.failed {
        println!("{} could not remove {}: {}", "✗".red(), path.display(), e);
    }
    for dir in &report.skipped_dirs {
        println!("{} could not scan {}", "✗".red(), dir.display());
    }

    Ok(())
}
