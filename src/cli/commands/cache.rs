//! Cache command - inspect and clear the source cache

use crate::cache::SourceCache;
use crate::cli::args::{CacheAction, CacheArgs};
use crate::error::GroundworkResult;
use console::style;
use std::io::{self, Write};

/// Execute the cache command
pub async fn execute(args: CacheArgs) -> GroundworkResult<()> {
    let cache = SourceCache::new();
    match args.action {
        CacheAction::Info => info(&cache),
        CacheAction::Clear { yes } => clear(&cache, yes),
    }
}

fn info(cache: &SourceCache) -> GroundworkResult<()> {
    let usage = cache.usage()?;
    println!("Location: {}", usage.base.display());
    println!("Entries:  {}", usage.entries);
    println!("Size:     {}", format_bytes(usage.total_bytes));

    let entries = cache.entries()?;
    if entries.is_empty() {
        return Ok(());
    }

    println!();
    println!("{:<14} {:<44} {:<14} {:<10}", "KEY", "URI", "VERSION", "POLICY");
    for entry in entries {
        let policy = if entry.ttl_secs == 0 {
            style("permanent").green().to_string()
        } else {
            style(format!("ttl {}s", entry.ttl_secs)).yellow().to_string()
        };
        println!(
            "{:<14} {:<44} {:<14} {:<10}",
            &entry.key[..entry.key.len().min(12)],
            entry.uri,
            entry.version.as_deref().unwrap_or("-"),
            policy
        );
    }
    Ok(())
}

fn clear(cache: &SourceCache, yes: bool) -> GroundworkResult<()> {
    if !yes {
        print!("Remove the entire source cache? [y/N] ");
        io::stdout().flush().ok();
        let mut answer = String::new();
        io::stdin().read_line(&mut answer).ok();
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }
    cache.clear()?;
    println!("{}", style("Source cache cleared.").green().bold());
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
