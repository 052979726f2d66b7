//! Command handlers.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use localsets_core::formats::aliases;
use localsets_core::{
    resolve_aliases, Config, DataCache, Format, FormatError, HttpFetcher, SyncReport,
};

use crate::display;
use crate::{Cli, Commands};

/// Open the cache described by the config file and global flags.
/// `refresh` allows the stale-data refresh on open.
async fn open_cache(cli: &Cli, refresh: bool) -> Result<DataCache> {
    let mut config = Config::load()
        .context("Failed to load config")?
        .cache_config()?;
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if cli.no_refresh || !refresh {
        config.auto_refresh = false;
    }

    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
    DataCache::open(config, Arc::new(fetcher)).await
}

/// Expand format ids and aliases given on the command line.
/// Unlike the config file, an unrecognized token is an error here.
fn resolve_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Format>> {
    let mut formats = BTreeSet::new();
    for token in tokens {
        let resolved = resolve_aliases([token.as_ref()]);
        if resolved.is_empty() {
            return Err(FormatError::Unknown(token.as_ref().trim().to_string()).into());
        }
        formats.extend(resolved);
    }
    Ok(Format::all().filter(|f| formats.contains(f)).collect())
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Get { name, format, json } => get(&cli, name, *format, *json).await,
        Commands::List { format, count } => list(&cli, format, *count).await,
        Commands::Update { format, all, force } => update(&cli, format, *all, *force).await,
        Commands::Info { json } => info(&cli, *json).await,
        Commands::Formats => {
            formats();
            Ok(())
        }
        Commands::Search { name } => search(&cli, name).await,
        Commands::Stats { name, format } => stats(&cli, name, *format).await,
    }
}

async fn get(cli: &Cli, name: &str, format: Option<Format>, json: bool) -> Result<()> {
    let cache = open_cache(cli, true).await?;
    if let Some(format) = format {
        cache.initialize(&[format]);
    }

    let Some(record) = cache.get(name, format) else {
        match format {
            Some(format) => bail!("{} not found in {}", name, format),
            None => bail!("{} not found in any loaded format", name),
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        display::print_record(name, format, &record);
    }
    Ok(())
}

async fn list(cli: &Cli, token: &str, count: bool) -> Result<()> {
    let formats = resolve_tokens(&[token])?;
    let cache = open_cache(cli, true).await?;
    cache.initialize(&formats);

    let grouped = formats.len() > 1;
    for format in formats {
        let names = cache.list(format);
        match (count, grouped) {
            (true, true) => println!("{:<28} {}", format.id(), names.len()),
            (true, false) => println!("{}", names.len()),
            (false, true) => {
                println!("{} ({})", format, names.len());
                for name in &names {
                    println!("  {}", name);
                }
            }
            (false, false) => {
                for name in &names {
                    println!("{}", name);
                }
            }
        }
    }
    Ok(())
}

async fn update(cli: &Cli, tokens: &[String], all: bool, force: bool) -> Result<()> {
    let cache = open_cache(cli, false).await?;
    let targets: Vec<Format> = if all {
        Format::all().collect()
    } else if tokens.is_empty() {
        cache.list_formats()
    } else {
        resolve_tokens(tokens)?
    };

    eprintln!("Refreshing {} format(s)...", targets.len());
    let report = if force {
        cache.force_refresh(Some(&targets)).await
    } else {
        cache.refresh(Some(&targets)).await
    };
    print_report(&report);

    if !targets.is_empty() && report.failed().len() == targets.len() {
        bail!("Every format failed to refresh");
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let updated = report.updated();
    let unchanged = report.unchanged();
    let failed = report.failed();

    if !updated.is_empty() {
        println!("Updated ({}):", updated.len());
        for format in &updated {
            println!("  {}", format);
        }
    }
    if !unchanged.is_empty() {
        println!("Unchanged ({}):", unchanged.len());
        for format in &unchanged {
            println!("  {}", format);
        }
    }
    if !failed.is_empty() {
        println!("Failed ({}):", failed.len());
        for (format, reason) in &failed {
            println!("  {}: {}", format, display::truncate_string(reason, 80));
        }
    }
}

async fn info(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli, false).await?;
    let info = cache.describe_cache();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Cache directory: {}", info.root_dir.display());
    println!("Last refresh:    {}", info.last_refresh_display());
    println!("Total records:   {}", info.total_records);
    println!();
    for count in &info.format_counts {
        println!(
            "  {:<28} {:>5}  {}",
            count.format.id(),
            count.count,
            count.source.label()
        );
    }
    Ok(())
}

fn formats() {
    for format in Format::all() {
        let info = format.describe();
        println!(
            "{:<28} {:<9} {:<8} {:<8} {}",
            format.id(),
            info.source.label(),
            info.generation_display(),
            info.battle_type.label(),
            info.description
        );
    }

    println!();
    println!("Aliases:");
    for (alias, members) in aliases() {
        let ids: Vec<&str> = members.iter().map(|f| f.id()).collect();
        println!("  {:<8} {}", alias, display::truncate_string(&ids.join(", "), 100));
    }
    println!("  {:<8} every random battle format", "all");
    println!("  {:<8} every Smogon format", "smogon");
}

async fn search(cli: &Cli, name: &str) -> Result<()> {
    let cache = open_cache(cli, true).await?;
    let hits = cache.search(name);
    if hits.is_empty() {
        println!("No sets found for {}", name);
        return Ok(());
    }

    for hit in &hits {
        println!(
            "{:<28} {:<9} {}",
            hit.format.id(),
            hit.source.label(),
            display::summarize_record(&hit.record)
        );
    }
    Ok(())
}

async fn stats(cli: &Cli, name: &str, format: Format) -> Result<()> {
    let cache = open_cache(cli, true).await?;
    cache.initialize(&[format]);

    let stats = cache
        .stats(name, format)
        .with_context(|| format!("No statistics for {} in {}", name, format))?;
    display::print_stats(name, format, &stats);
    Ok(())
}
