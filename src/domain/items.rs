//! Albion Online item identifiers.
//!
//! Item names look like `T6_2H_HOLYSTAFF@0`: a tier marker (`T1`..`T8`), an
//! uppercase identifier made of `_`-separated segments, and an optional
//! enchantment level (`@0`..`@4`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_TIER: u8 = 1;
pub const MAX_TIER: u8 = 8;
pub const MAX_ENCHANTMENT: u8 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemNameError {
    #[error("item name is empty")]
    Empty,
    #[error("item name `{input}` must start with a tier marker like `T4_`")]
    MissingTier { input: String },
    #[error("item tier `{tier}` is not a number")]
    InvalidTier { tier: String },
    #[error("item tier {tier} is outside T1..=T8")]
    TierOutOfRange { tier: u8 },
    #[error("item name `{input}` has no identifier after the tier")]
    MissingIdentifier { input: String },
    #[error("item identifier `{identifier}` must be uppercase letters, digits and single underscores")]
    InvalidIdentifier { identifier: String },
    #[error("enchantment `{enchantment}` is not a number")]
    InvalidEnchantment { enchantment: String },
    #[error("enchantment level {level} is above 4")]
    EnchantmentOutOfRange { level: u8 },
}

/// A validated item name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemName {
    tier: u8,
    identifier: String,
    enchantment: Option<u8>,
}

impl ItemName {
    pub fn parse(input: &str) -> Result<Self, ItemNameError> {
        if input.is_empty() {
            return Err(ItemNameError::Empty);
        }

        let rest = input
            .strip_prefix('T')
            .ok_or_else(|| ItemNameError::MissingTier {
                input: input.to_string(),
            })?;
        let (tier, rest) = rest
            .split_once('_')
            .ok_or_else(|| ItemNameError::MissingIdentifier {
                input: input.to_string(),
            })?;
        let tier = parse_tier(tier)?;

        let (identifier, enchantment) = match rest.split_once('@') {
            Some((identifier, enchantment)) => (identifier, Some(parse_enchantment(enchantment)?)),
            None => (rest, None),
        };

        if identifier.is_empty() {
            return Err(ItemNameError::MissingIdentifier {
                input: input.to_string(),
            });
        }
        validate_identifier(identifier)?;

        Ok(Self {
            tier,
            identifier: identifier.to_string(),
            enchantment,
        })
    }

    pub fn tier(&self) -> u8 {
        self.tier
    }

    /// The part between the tier and the enchantment, e.g. `2H_HOLYSTAFF`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Enchantment as written, `None` when the name carried no `@` suffix.
    pub fn enchantment(&self) -> Option<u8> {
        self.enchantment
    }

    /// Enchantment level with the game's implicit `@0` default.
    pub fn enchantment_level(&self) -> u8 {
        self.enchantment.unwrap_or(0)
    }

    /// Name without the enchantment suffix, e.g. `T6_2H_HOLYSTAFF`.
    pub fn base_name(&self) -> String {
        format!("T{}_{}", self.tier, self.identifier)
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}_{}", self.tier, self.identifier)?;
        if let Some(level) = self.enchantment {
            write!(f, "@{level}")?;
        }
        Ok(())
    }
}

impl FromStr for ItemName {
    type Err = ItemNameError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for ItemName {
    type Error = ItemNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ItemName> for String {
    fn from(value: ItemName) -> Self {
        value.to_string()
    }
}

/// Convenience check for request validation.
pub fn is_valid_item_name(input: &str) -> bool {
    ItemName::parse(input).is_ok()
}

fn parse_tier(raw: &str) -> Result<u8, ItemNameError> {
    let tier = parse_small_number(raw).ok_or_else(|| ItemNameError::InvalidTier {
        tier: raw.to_string(),
    })?;
    if !(MIN_TIER..=MAX_TIER).contains(&tier) {
        return Err(ItemNameError::TierOutOfRange { tier });
    }
    Ok(tier)
}

fn parse_enchantment(raw: &str) -> Result<u8, ItemNameError> {
    let level = parse_small_number(raw).ok_or_else(|| ItemNameError::InvalidEnchantment {
        enchantment: raw.to_string(),
    })?;
    if level > MAX_ENCHANTMENT {
        return Err(ItemNameError::EnchantmentOutOfRange { level });
    }
    Ok(level)
}

/// Canonical decimal only: no sign and no leading zeros, so every accepted
/// name prints back unchanged.
fn parse_small_number(raw: &str) -> Option<u8> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse().ok()
}

fn validate_identifier(identifier: &str) -> Result<(), ItemNameError> {
    let well_formed = identifier.split('_').all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
    });

    if well_formed {
        Ok(())
    } else {
        Err(ItemNameError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}
