//! Cache command implementation.
use std::collections::BTreeSet;
use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cache::{CacheEntry, CacheManager, CacheStatus, ProbeSpec, validate_key};
use crate::cli::{CacheAction, CacheOpts, GlobalOpts};
use crate::config::CacheSettings;
use crate::exec::{SystemExecutor, running_as_root};
use crate::logging::{Log, Logger};

/// Run the cache command.
///
/// # Errors
///
/// Returns an error if the root, environment or settings cannot be loaded,
/// or if the cache directory cannot be listed.
pub fn run(global: &GlobalOpts, opts: &CacheOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let cache = setup.cache_manager(log.clone())?;
    let catalog = setup.catalog();
    let settings = &setup.settings.cache;

    match &opts.action {
        CacheAction::Status { json, keys } => {
            let keys = select_keys(keys, &catalog, &cache, log.as_ref())?;
            let statuses = keys
                .iter()
                .map(|key| entry_status(&cache, settings, find(&catalog, key), key))
                .collect::<Result<Vec<_>, _>>()?;
            if *json {
                let out = serde_json::to_string_pretty(&statuses)
                    .context("serializing cache status")?;
                writeln!(std::io::stdout().lock(), "{out}")
                    .context("writing cache status")?;
            } else {
                log.stage(&format!("Cache ({})", cache.dir().display()));
                if statuses.is_empty() {
                    log.info("no cache entries");
                }
                for status in &statuses {
                    log.info(&format_status(status));
                }
            }
        }
        CacheAction::Clear { keys } => {
            log.stage("Clearing cache");
            for key in select_keys(keys, &catalog, &cache, log.as_ref())? {
                clear(&cache, &key, global.dry_run, log.as_ref());
            }
        }
        CacheAction::Refresh { keys } => {
            log.stage("Refreshing cache");
            let as_root = running_as_root(&SystemExecutor::new());
            for key in select_keys(keys, &catalog, &cache, log.as_ref())? {
                let Some(entry) = find(&catalog, &key) else {
                    log.warn(&format!("{key}: no command known for this key"));
                    continue;
                };
                refresh(&cache, settings, entry, as_root, global.dry_run, log.as_ref());
            }
        }
    }
    Ok(())
}

fn find<'a>(catalog: &'a [CacheEntry], key: &str) -> Option<&'a CacheEntry> {
    catalog.iter().find(|e| e.key == key)
}

/// The keys an action applies to: the requested ones, or every key that is
/// either cataloged or cached.  Invalid requested keys are warned about and
/// dropped.
///
/// # Errors
///
/// Returns an error if the cache directory cannot be listed.
pub fn select_keys(
    requested: &[String],
    catalog: &[CacheEntry],
    cache: &CacheManager,
    log: &dyn Log,
) -> Result<Vec<String>> {
    if requested.is_empty() {
        let mut keys: BTreeSet<String> = catalog.iter().map(|e| e.key.clone()).collect();
        keys.extend(cache.keys()?);
        return Ok(keys.into_iter().collect());
    }
    Ok(requested
        .iter()
        .filter(|key| match validate_key(key) {
            Ok(()) => true,
            Err(e) => {
                log.warn(&e.to_string());
                false
            }
        })
        .cloned()
        .collect())
}

fn entry_status(
    cache: &CacheManager,
    settings: &CacheSettings,
    entry: Option<&CacheEntry>,
    key: &str,
) -> Result<CacheStatus> {
    let ttl = entry.map_or_else(|| settings.ttl(), |e| e.ttl(settings));
    let probe = entry.and_then(|e| e.probe.as_ref()).map(ProbeSpec::probe);
    Ok(cache.status(key, ttl, probe.as_deref())?)
}

fn clear(cache: &CacheManager, key: &str, dry_run: bool, log: &dyn Log) {
    if dry_run {
        log.dry_run(&format!("would remove cache entry {key}"));
        return;
    }
    match cache.invalidate(key) {
        Ok(true) => log.info(&format!("removed {key}")),
        Ok(false) => log.debug(&format!("{key} was not cached")),
        Err(e) => log.warn(&e.to_string()),
    }
}

fn refresh(
    cache: &CacheManager,
    settings: &CacheSettings,
    entry: &CacheEntry,
    as_root: bool,
    dry_run: bool,
    log: &dyn Log,
) {
    if dry_run {
        log.dry_run(&format!(
            "would regenerate {} from {}",
            entry.key,
            entry.command.join(" ")
        ));
        return;
    }
    if let Err(e) = cache.invalidate(&entry.key) {
        log.warn(&e.to_string());
        return;
    }
    match entry.fetch(cache, settings, as_root) {
        Ok(payload) => log.info(&format!("refreshed {} ({} bytes)", entry.key, payload.len())),
        Err(e) => log.warn(&e.to_string()),
    }
}

/// One human-readable status line.
#[must_use]
pub fn format_status(status: &CacheStatus) -> String {
    let Some(age) = status.age else {
        return format!("{}: not cached", status.key);
    };
    let state = if status.valid { "fresh" } else { "stale" };
    let mut line = format!("{}: {state}, age {age}s of {}s", status.key, status.ttl);
    if let Some(marker) = &status.marker {
        let short: String = marker.chars().take(12).collect();
        line.push_str(&format!(", marker {short}"));
    }
    line
}
