//! Clean command - remove provisioned workdirs

use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::error::GroundworkResult;
use crate::metadata::MetadataStore;
use crate::ttl::parse_ttl;
use crate::workdir::{clean, find_expired, format_age, CleanOptions};
use console::style;

/// Execute the clean command
pub async fn execute(args: CleanArgs, config: &Config) -> GroundworkResult<()> {
    let store = MetadataStore::new();
    let opts = CleanOptions {
        component: args.component,
        stack: args.stack,
        all: args.all,
        expired: args.expired,
        ttl: args.ttl,
        dry_run: args.dry_run,
    };

    // Expired mode gets a listing up front so dry runs show what
    // would go.
    if opts.expired {
        if let Some(ttl) = opts.ttl.as_deref() {
            let ttl = chrono::Duration::from_std(parse_ttl(ttl)?)
                .unwrap_or_else(|_| chrono::Duration::MAX);
            let expired = find_expired(config, &store, ttl)?;
            if expired.is_empty() {
                println!("No expired workdirs.");
                return Ok(());
            }
            println!("{:<30} {:<12} {}", "WORKDIR", "IDLE", "PATH");
            for workdir in &expired {
                println!(
                    "{:<30} {:<12} {}",
                    workdir.name,
                    format_age(workdir.age),
                    workdir.path.display()
                );
            }
            println!();
        }
    }

    clean(config, &store, &opts)?;

    if opts.dry_run {
        println!("{}", style("Dry run, nothing removed.").yellow());
    } else {
        println!("{}", style("Cleanup complete.").green().bold());
    }
    Ok(())
}
