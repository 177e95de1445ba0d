//! Cache key namespace.
//!
//! Keys take the shape `<type>:<id>[:<qualifier>]`, collections use
//! `<collection>:<parent-type>:<parent-id>[:<filter>]`. Identifier and
//! qualifier components are escaped (`%` as `%25`, `:` as `%3A`) so a caller
//! supplied id can never forge extra segments, and every constructor owns a
//! distinct leading segment.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

const SEPARATOR: char = ':';

const TAG_USER: &str = "user";
const TAG_DISCORD_USER: &str = "discord-user";
const TAG_USER_SERVERS: &str = "servers";
const TAG_SERVER: &str = "server";
const TAG_SERVER_MEMBERS: &str = "members";
const TAG_SERVER_MEMBER: &str = "member";
const TAG_RAID: &str = "raid";
const TAG_SERVER_RAIDS: &str = "raids";
const TAG_RAID_SLOTS: &str = "slots";
const TAG_BUILD: &str = "build";
const TAG_SERVER_BUILDS: &str = "builds";
const TAG_ITEM: &str = "item";
const TAG_ITEMS: &str = "items";
const TAG_PERMISSIONS: &str = "permissions";

/// Leading segments owned by the [`CacheKeys`] constructors.
pub const KEY_TAGS: &[&str] = &[
    TAG_USER,
    TAG_DISCORD_USER,
    TAG_USER_SERVERS,
    TAG_SERVER,
    TAG_SERVER_MEMBERS,
    TAG_SERVER_MEMBER,
    TAG_RAID,
    TAG_SERVER_RAIDS,
    TAG_RAID_SLOTS,
    TAG_BUILD,
    TAG_SERVER_BUILDS,
    TAG_ITEM,
    TAG_ITEMS,
    TAG_PERMISSIONS,
];

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to encode value for hashing: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Escape a single key component so it cannot contain the separator.
pub fn escape_component(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['%', SEPARATOR]) {
        return Cow::Borrowed(raw);
    }

    let mut escaped = String::with_capacity(raw.len() + 4);
    for ch in raw.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            SEPARATOR => escaped.push_str("%3A"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Incremental key construction.
///
/// Tags are fixed literals; ids and qualifiers go through [`escape_component`].
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    buf: String,
}

impl KeyBuilder {
    pub fn new(tag: &'static str) -> Self {
        Self {
            buf: tag.to_string(),
        }
    }

    pub fn tag(mut self, tag: &'static str) -> Self {
        self.buf.push(SEPARATOR);
        self.buf.push_str(tag);
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.buf.push(SEPARATOR);
        self.buf.push_str(&escape_component(id));
        self
    }

    pub fn qualifier(self, qualifier: Option<&str>) -> Self {
        match qualifier {
            Some(qualifier) => self.id(qualifier),
            None => self,
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Catalog of cache key constructors.
pub struct CacheKeys;

impl CacheKeys {
    pub fn user(id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_USER)
            .id(id)
            .qualifier(qualifier)
            .finish()
    }

    /// User lookup by Discord snowflake, as done by the bot on every interaction.
    pub fn discord_user(discord_id: &str) -> String {
        KeyBuilder::new(TAG_DISCORD_USER).id(discord_id).finish()
    }

    /// Servers a user belongs to.
    pub fn user_servers(user_id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_USER_SERVERS)
            .tag(TAG_USER)
            .id(user_id)
            .qualifier(qualifier)
            .finish()
    }

    pub fn server(id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_SERVER)
            .id(id)
            .qualifier(qualifier)
            .finish()
    }

    pub fn server_members(server_id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_SERVER_MEMBERS)
            .tag(TAG_SERVER)
            .id(server_id)
            .qualifier(qualifier)
            .finish()
    }

    pub fn server_member(server_id: &str, user_id: &str) -> String {
        KeyBuilder::new(TAG_SERVER_MEMBER)
            .id(server_id)
            .id(user_id)
            .finish()
    }

    pub fn raid(id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_RAID)
            .id(id)
            .qualifier(qualifier)
            .finish()
    }

    pub fn server_raids(server_id: &str, filter: Option<&str>) -> String {
        KeyBuilder::new(TAG_SERVER_RAIDS)
            .tag(TAG_SERVER)
            .id(server_id)
            .qualifier(filter)
            .finish()
    }

    pub fn raid_slots(raid_id: &str) -> String {
        KeyBuilder::new(TAG_RAID_SLOTS)
            .tag(TAG_RAID)
            .id(raid_id)
            .finish()
    }

    pub fn build(id: &str, qualifier: Option<&str>) -> String {
        KeyBuilder::new(TAG_BUILD)
            .id(id)
            .qualifier(qualifier)
            .finish()
    }

    pub fn server_builds(server_id: &str, filter: Option<&str>) -> String {
        KeyBuilder::new(TAG_SERVER_BUILDS)
            .tag(TAG_SERVER)
            .id(server_id)
            .qualifier(filter)
            .finish()
    }

    pub fn item(name: &str) -> String {
        KeyBuilder::new(TAG_ITEM).id(name).finish()
    }

    pub fn items(filter: Option<&str>) -> String {
        KeyBuilder::new(TAG_ITEMS).qualifier(filter).finish()
    }

    pub fn permissions(server_id: &str, user_id: &str) -> String {
        KeyBuilder::new(TAG_PERMISSIONS)
            .id(server_id)
            .id(user_id)
            .finish()
    }
}

/// Glob patterns (Redis `MATCH` syntax) covering every key derived from an entity.
pub struct KeyPatterns;

impl KeyPatterns {
    /// The key itself plus all of its qualified variants.
    pub fn prefix(key: &str) -> Vec<String> {
        let exact = escape_glob(key);
        let qualified = format!("{exact}{SEPARATOR}*");
        vec![exact, qualified]
    }

    pub fn user_all(user_id: &str) -> Vec<String> {
        let mut patterns = Self::prefix(&CacheKeys::user(user_id, None));
        patterns.extend(Self::prefix(&CacheKeys::user_servers(user_id, None)));
        patterns.push(format!(
            "{TAG_SERVER_MEMBER}{SEPARATOR}*{SEPARATOR}{}",
            escape_glob(&escape_component(user_id))
        ));
        patterns.push(format!(
            "{TAG_PERMISSIONS}{SEPARATOR}*{SEPARATOR}{}",
            escape_glob(&escape_component(user_id))
        ));
        patterns
    }

    pub fn server_all(server_id: &str) -> Vec<String> {
        let mut patterns = Self::prefix(&CacheKeys::server(server_id, None));
        patterns.extend(Self::prefix(&CacheKeys::server_members(server_id, None)));
        patterns.extend(Self::prefix(&CacheKeys::server_raids(server_id, None)));
        patterns.extend(Self::prefix(&CacheKeys::server_builds(server_id, None)));
        let id = escape_glob(&escape_component(server_id));
        patterns.push(format!("{TAG_SERVER_MEMBER}{SEPARATOR}{id}{SEPARATOR}*"));
        patterns.push(format!("{TAG_PERMISSIONS}{SEPARATOR}{id}{SEPARATOR}*"));
        patterns
    }

    pub fn raid_all(raid_id: &str) -> Vec<String> {
        let mut patterns = Self::prefix(&CacheKeys::raid(raid_id, None));
        patterns.extend(Self::prefix(&CacheKeys::raid_slots(raid_id)));
        patterns
    }

    pub fn build_all(build_id: &str) -> Vec<String> {
        Self::prefix(&CacheKeys::build(build_id, None))
    }

    pub fn items_all() -> Vec<String> {
        let mut patterns = vec![format!("{TAG_ITEM}{SEPARATOR}*")];
        patterns.extend(Self::prefix(&CacheKeys::items(None)));
        patterns
    }
}

/// Escape glob metacharacters so `raw` only matches itself.
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// SHA-256 hex digest of the canonical JSON form of `value`.
///
/// Object keys are sorted recursively before encoding, so two values that
/// differ only in field order hash identically.
pub fn hash_object<T>(value: &T) -> Result<String, KeyError>
where
    T: Serialize + ?Sized,
{
    let canonical = canonicalize(serde_json::to_value(value)?);
    let encoded = serde_json::to_vec(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(hex::encode(hasher.finalize()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|left, right| left.0.cmp(&right.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
