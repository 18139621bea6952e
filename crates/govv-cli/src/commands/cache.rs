//! `govv cache`: drive the offline cache manager against the app origin.

use anyhow::{Context, Result};
use serde_json::json;

use govv_core::cache::{
    CacheManager, DiskStorage, FetchDisposition, HttpFetcher, Request, ResponseSource,
};
use govv_core::Config;

use crate::CacheCommands;

/// Subdirectory of the cache dir holding cache generations
const OFFLINE_CACHE_DIR: &str = "offline";

type Manager = CacheManager<HttpFetcher, DiskStorage>;

fn manager(config: &Config) -> Result<Manager> {
    let storage = DiskStorage::new(config.cache_dir()?.join(OFFLINE_CACHE_DIR))?;
    let fetcher = HttpFetcher::new()?;
    Ok(CacheManager::new(config.cache_manager_config()?, fetcher, storage))
}

fn source_label(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
        ResponseSource::OfflineFallback => "offline page",
    }
}

pub async fn run(config: &Config, command: CacheCommands) -> Result<()> {
    let manager = manager(config)?;
    match command {
        CacheCommands::Update => update(&manager).await,
        CacheCommands::Fetch { path, navigate } => fetch(&manager, &path, navigate).await,
        CacheCommands::Status => status(&manager),
    }
}

async fn update(manager: &Manager) -> Result<()> {
    let version = &manager.config().version_tag;
    println!("Installing {} from {}", version, manager.config().origin);

    let report = manager.install().await?;
    for path in &report.cached {
        println!("  cached   {}", path);
    }
    for path in &report.skipped {
        println!("  skipped  {}", path);
    }

    manager.handle_message(&json!({ "type": "SKIP_WAITING" }));
    if !manager.lifecycle().ready_to_activate() {
        println!("Installed; waiting to activate");
        return Ok(());
    }

    let report = manager.activate()?;
    if report.deleted.is_empty() {
        println!("Activated {}", version);
    } else {
        println!("Activated {}, removed {}", version, report.deleted.join(", "));
    }
    Ok(())
}

async fn fetch(manager: &Manager, path: &str, navigate: bool) -> Result<()> {
    let url = manager
        .config()
        .resolve(path)
        .with_context(|| format!("Invalid path {:?}", path))?;
    let request = if navigate { Request::navigate(url) } else { Request::get(url) };

    match manager.handle_fetch(request).await? {
        FetchDisposition::PassThrough => println!("Not handled by the cache; passed through"),
        FetchDisposition::Respond(served) => {
            println!(
                "{} from {} ({} bytes)",
                served.response.status,
                source_label(served.source),
                served.response.body.len()
            );
            if let Some(refresh) = served.revalidation {
                // Let the background refresh land before exiting
                refresh.await.context("Background refresh panicked")?;
            }
        }
    }
    Ok(())
}

fn status(manager: &Manager) -> Result<()> {
    let generations = manager.storage().generations()?;
    if generations.is_empty() {
        println!("No cache generations. Run `govv cache update`.");
        return Ok(());
    }

    let current = &manager.config().version_tag;
    for generation in generations {
        let marker = if &generation.name == current { "*" } else { " " };
        if !generation.readable {
            println!("{} {:<20} unreadable, replaced on next update", marker, generation.name);
            continue;
        }
        println!(
            "{} {:<20} {:>4} entries  {}",
            marker, generation.name, generation.entries, generation.age
        );
    }
    Ok(())
}
