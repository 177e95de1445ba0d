//! Handlers behind the `raid-cache` subcommands.
//!
//! Each handler returns the text printed on stdout; `main` owns the I/O.

use serde::Serialize;
use tracing::info;

use crate::{
    cache::{
        CacheBackend, CacheConfig, CacheContext, CacheKeys, CacheStore, KeyPatterns, hash_object,
        invalidate,
    },
    config::{InvalidateArgs, KeyArgs, KeyKind},
    domain::items::ItemName,
};

use super::error::AppError;

/// Compute the key a service would read for the requested entity.
pub fn cache_key(args: &KeyArgs) -> Result<String, AppError> {
    let qualifier = resolve_qualifier(args)?;
    let qualifier = qualifier.as_deref();

    let key = match args.kind {
        KeyKind::User => CacheKeys::user(require_id(args)?, qualifier),
        KeyKind::DiscordUser => {
            reject_qualifier(args.kind, qualifier)?;
            CacheKeys::discord_user(require_id(args)?)
        }
        KeyKind::UserServers => CacheKeys::user_servers(require_id(args)?, qualifier),
        KeyKind::Server => CacheKeys::server(require_id(args)?, qualifier),
        KeyKind::ServerMembers => CacheKeys::server_members(require_id(args)?, qualifier),
        KeyKind::ServerMember => {
            reject_qualifier(args.kind, qualifier)?;
            CacheKeys::server_member(require_server(args)?, require_id(args)?)
        }
        KeyKind::Raid => CacheKeys::raid(require_id(args)?, qualifier),
        KeyKind::ServerRaids => CacheKeys::server_raids(require_id(args)?, qualifier),
        KeyKind::RaidSlots => {
            reject_qualifier(args.kind, qualifier)?;
            CacheKeys::raid_slots(require_id(args)?)
        }
        KeyKind::Build => CacheKeys::build(require_id(args)?, qualifier),
        KeyKind::ServerBuilds => CacheKeys::server_builds(require_id(args)?, qualifier),
        KeyKind::Item => {
            reject_qualifier(args.kind, qualifier)?;
            let name = ItemName::parse(require_id(args)?)?;
            CacheKeys::item(&name.to_string())
        }
        KeyKind::Items => {
            // The positional id doubles as the filter for collection keys.
            let filter = match (args.id.as_deref(), qualifier) {
                (Some(_), Some(_)) => {
                    return Err(AppError::validation(
                        "items accepts either a positional filter or --qualifier, not both",
                    ));
                }
                (id, qualifier) => id.or(qualifier),
            };
            CacheKeys::items(filter)
        }
        KeyKind::Permissions => {
            reject_qualifier(args.kind, qualifier)?;
            CacheKeys::permissions(require_server(args)?, require_id(args)?)
        }
    };

    Ok(key)
}

/// Connect the shared store that `get` and `invalidate` operate on.
///
/// A memory store lives inside one process, so a fresh one here is always
/// empty; only Redis is accepted.
pub async fn connect_shared(config: &CacheConfig) -> Result<CacheContext, AppError> {
    match config.backend {
        CacheBackend::Redis => Ok(CacheContext::connect(config).await?),
        CacheBackend::Memory => Err(AppError::validation(
            "the memory backend is private to each process; set cache.backend = \"redis\" to inspect a shared cache",
        )),
        CacheBackend::Disabled => Err(AppError::validation("cache backend is disabled")),
    }
}

/// Fetch the raw payload stored under `key`.
pub async fn get_entry<S>(store: Option<&S>, key: &str) -> Result<String, AppError>
where
    S: CacheStore + ?Sized,
{
    let store = require_store(store)?;
    store
        .get(key)
        .await?
        .ok_or_else(|| AppError::not_found(key))
}

/// Expand the requested entities into patterns and delete every match.
pub async fn invalidate_entries<S>(store: Option<&S>, args: &InvalidateArgs) -> Result<u64, AppError>
where
    S: CacheStore + ?Sized,
{
    let patterns = invalidation_patterns(args);
    if patterns.is_empty() {
        return Err(AppError::validation(
            "invalidate requires at least one of --pattern, --user, --server, --raid, --build or --items",
        ));
    }

    let store = require_store(store)?;
    let removed = invalidate(store, &patterns).await?;
    info!(
        target = "raid_cache::invalidate",
        backend = store.backend(),
        patterns = patterns.len(),
        removed,
        "invalidation finished"
    );
    Ok(removed)
}

/// Patterns covering everything named in `args`, in a stable order.
pub fn invalidation_patterns(args: &InvalidateArgs) -> Vec<String> {
    let mut patterns = args.patterns.clone();
    if let Some(user) = args.user.as_deref() {
        patterns.extend(KeyPatterns::user_all(user));
    }
    if let Some(server) = args.server.as_deref() {
        patterns.extend(KeyPatterns::server_all(server));
    }
    if let Some(raid) = args.raid.as_deref() {
        patterns.extend(KeyPatterns::raid_all(raid));
    }
    if let Some(build) = args.build.as_deref() {
        patterns.extend(KeyPatterns::build_all(build));
    }
    if args.items {
        patterns.extend(KeyPatterns::items_all());
    }
    patterns
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub name: String,
    pub base_name: String,
    pub tier: u8,
    pub identifier: String,
    pub enchantment: u8,
    pub cache_key: String,
}

/// Validate an item name and describe its parts.
pub fn describe_item(raw: &str) -> Result<ItemSummary, AppError> {
    let item = ItemName::parse(raw)?;
    let name = item.to_string();

    Ok(ItemSummary {
        cache_key: CacheKeys::item(&name),
        base_name: item.base_name(),
        tier: item.tier(),
        identifier: item.identifier().to_string(),
        enchantment: item.enchantment_level(),
        name,
    })
}

fn resolve_qualifier(args: &KeyArgs) -> Result<Option<String>, AppError> {
    if let Some(raw) = args.filter_json.as_deref() {
        let filter: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| AppError::validation(format!("--filter-json is not valid JSON: {err}")))?;
        return Ok(Some(hash_object(&filter)?));
    }
    Ok(args.qualifier.clone())
}

fn require_id(args: &KeyArgs) -> Result<&str, AppError> {
    args.id
        .as_deref()
        .ok_or_else(|| AppError::validation(format!("{:?} keys require an ID", args.kind)))
}

fn require_server(args: &KeyArgs) -> Result<&str, AppError> {
    args.server
        .as_deref()
        .ok_or_else(|| AppError::validation(format!("{:?} keys require --server", args.kind)))
}

fn reject_qualifier(kind: KeyKind, qualifier: Option<&str>) -> Result<(), AppError> {
    match qualifier {
        Some(_) => Err(AppError::validation(format!(
            "{kind:?} keys do not take a qualifier"
        ))),
        None => Ok(()),
    }
}

fn require_store<S: ?Sized>(store: Option<&S>) -> Result<&S, AppError> {
    store.ok_or_else(|| AppError::validation("cache backend is disabled"))
}
