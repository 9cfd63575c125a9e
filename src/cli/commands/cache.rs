//! Cache command - manage cache stores

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::{AssetCacheError, AssetCacheResult};
use crate::manifest::{is_stale_store, PrecacheManifest, PRECACHE_MANIFEST_FILE};
use crate::ui::{self, UiContext};
use crate::worker::{self, format_bytes, CacheStorage, StoreInfo};
use console::style;
use std::path::Path;
use tracing::debug;

/// How a store relates to the last build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreStatus {
    Current,
    Stale,
    Foreign,
}

impl StoreStatus {
    fn of(store: &str, manifest: Option<&PrecacheManifest>) -> Self {
        match manifest {
            Some(m) if m.store_name() == store => Self::Current,
            Some(m) if is_stale_store(store, &m.cache_name, &m.store_name()) => Self::Stale,
            _ => Self::Foreign,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::Foreign => "-",
        }
    }
}

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, root: &Path) -> AssetCacheResult<()> {
    let storage = worker::open_storage(config, root);
    debug!("Cache storage at {}", storage.root().display());

    match args.action {
        CacheAction::List { format } => list_stores(&storage, config, root, format).await,
        CacheAction::Gc { dry_run } => gc_stores(&storage, config, root, dry_run).await,
        CacheAction::Clear { yes } => clear_stores(&storage, yes).await,
    }
}

/// Manifest of the last build, if there is one
async fn current_manifest(config: &Config, root: &Path) -> AssetCacheResult<Option<PrecacheManifest>> {
    let path = root.join(&config.build.out_dir).join(PRECACHE_MANIFEST_FILE);
    match PrecacheManifest::load(&path).await {
        Ok(manifest) => Ok(Some(manifest)),
        Err(AssetCacheError::ManifestNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn store_infos(storage: &dyn CacheStorage) -> AssetCacheResult<Vec<StoreInfo>> {
    let mut infos = Vec::new();
    for name in storage.store_names().await? {
        if let Some(info) = storage.info(&name).await? {
            infos.push(info);
        }
    }
    Ok(infos)
}

/// List all cache stores
async fn list_stores(
    storage: &dyn CacheStorage,
    config: &Config,
    root: &Path,
    format: OutputFormat,
) -> AssetCacheResult<()> {
    let stores = store_infos(storage).await?;
    let manifest = current_manifest(config, root).await?;

    if stores.is_empty() {
        println!("No cache stores found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_store_table(&stores, manifest.as_ref()),
        OutputFormat::Json => print_store_json(&stores, manifest.as_ref())?,
        OutputFormat::Plain => {
            for store in &stores {
                println!("{}", store.name);
            }
        }
    }

    Ok(())
}

fn print_store_table(stores: &[StoreInfo], manifest: Option<&PrecacheManifest>) {
    println!(
        "{:<32} {:>8} {:>10} {:<18} {:<8}",
        "STORE", "ENTRIES", "SIZE", "CREATED", "STATUS"
    );
    println!("{}", "-".repeat(80));

    for store in stores {
        let status = StoreStatus::of(&store.name, manifest);
        let status_display = match status {
            StoreStatus::Current => style(status.label()).green().to_string(),
            StoreStatus::Stale => style(status.label()).yellow().to_string(),
            StoreStatus::Foreign => style(status.label()).dim().to_string(),
        };
        let created = store
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<32} {:>8} {:>10} {:<18} {:<8}",
            store.name,
            store.entries,
            format_bytes(store.bytes),
            created,
            status_display
        );
    }

    println!();
    println!("Total: {} store(s)", stores.len());
}

fn print_store_json(stores: &[StoreInfo], manifest: Option<&PrecacheManifest>) -> AssetCacheResult<()> {
    #[derive(serde::Serialize)]
    struct StoreJson<'a> {
        name: &'a str,
        entries: usize,
        bytes: u64,
        created_at: Option<String>,
        status: &'static str,
    }

    let json: Vec<StoreJson> = stores
        .iter()
        .map(|s| StoreJson {
            name: &s.name,
            entries: s.entries,
            bytes: s.bytes,
            created_at: s.created_at.map(|t| t.to_rfc3339()),
            status: StoreStatus::of(&s.name, manifest).label(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Remove stores an activation of the current build would remove
async fn gc_stores(
    storage: &dyn CacheStorage,
    config: &Config,
    root: &Path,
    dry_run: bool,
) -> AssetCacheResult<()> {
    let ctx = UiContext::detect();
    let manifest_path = root.join(&config.build.out_dir).join(PRECACHE_MANIFEST_FILE);
    let manifest = PrecacheManifest::load(&manifest_path).await?;
    let current = manifest.store_name();

    let stale: Vec<String> = storage
        .store_names()
        .await?
        .into_iter()
        .filter(|name| is_stale_store(name, &manifest.cache_name, &current))
        .collect();

    if stale.is_empty() {
        ui::step_ok_detail(&ctx, "No stale stores", &current);
        return Ok(());
    }

    for name in &stale {
        ui::remark(&ctx, name);
    }

    if dry_run {
        ui::step_info(
            &ctx,
            &format!("Dry run - {} store(s) would be removed", stale.len()),
        );
        return Ok(());
    }

    let mut removed = 0;
    for name in &stale {
        if storage.delete(name).await? {
            removed += 1;
        }
    }

    ui::step_ok(&ctx, &format!("Removed {} stale store(s)", removed));
    Ok(())
}

/// Remove every store
async fn clear_stores(storage: &dyn CacheStorage, yes: bool) -> AssetCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);
    let names = storage.store_names().await?;

    if names.is_empty() {
        println!("No cache stores to clear.");
        return Ok(());
    }

    println!("This will remove {} cache store(s):", names.len());
    for name in &names {
        println!("  {} {}", style("•").red(), name);
    }
    println!();

    if !ui::confirm(&ctx, "Remove these stores?", false).await? {
        println!("Aborted.");
        return Ok(());
    }

    let mut removed = 0;
    for name in &names {
        if storage.delete(name).await? {
            removed += 1;
        }
    }

    ui::step_ok(&ctx, &format!("Cleared {} store(s)", removed));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::MemoryStorage;

    #[test]
    fn store_status_against_manifest() {
        let manifest = PrecacheManifest::new("app-cache", "v2", vec![]);
        assert_eq!(
            StoreStatus::of("app-cache-v2", Some(&manifest)),
            StoreStatus::Current
        );
        assert_eq!(
            StoreStatus::of("app-cache-v1", Some(&manifest)),
            StoreStatus::Stale
        );
        assert_eq!(
            StoreStatus::of("other-v1", Some(&manifest)),
            StoreStatus::Foreign
        );
        assert_eq!(StoreStatus::of("app-cache-v2", None), StoreStatus::Foreign);
    }

    #[tokio::test]
    async fn clear_with_yes_removes_everything() {
        let storage = MemoryStorage::new();
        storage.open("app-cache-v1").await.unwrap();
        storage.open("app-cache-v2").await.unwrap();

        clear_stores(&storage, true).await.unwrap();
        assert!(storage.store_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gc_dry_run_keeps_stores() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::default();
        let out = dir.path().join(&config.build.out_dir);
        std::fs::create_dir_all(&out).unwrap();
        let manifest = PrecacheManifest::new("app-cache", "v2", vec![]);
        std::fs::write(out.join(PRECACHE_MANIFEST_FILE), manifest.to_json().unwrap()).unwrap();

        let storage = MemoryStorage::new();
        storage.open("app-cache-v1").await.unwrap();
        storage.open("app-cache-v2").await.unwrap();

        gc_stores(&storage, &config, dir.path(), true).await.unwrap();
        assert_eq!(storage.store_names().await.unwrap().len(), 2);

        gc_stores(&storage, &config, dir.path(), false).await.unwrap();
        assert_eq!(storage.store_names().await.unwrap(), vec!["app-cache-v2"]);
    }
}
