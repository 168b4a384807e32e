//! Alloha API data structures
//!
//! Object key order is significant (seasons and episodes are listed in the
//! order the provider sends them), so every keyed collection is an
//! [`IndexMap`].

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Top-level `{"data": ...}` wrapper of every search response
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub data: Option<T>,
}

/// Content kind, from the `category` / `category_id` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Movie,
    Series,
}

impl Category {
    /// Codes 1 and 3 are single-asset content; anything else has seasons
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 | 3 => Self::Movie,
            _ => Self::Series,
        }
    }
}

/// One title as returned by either search shape
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    /// Discriminator of the by-id search
    #[serde(default, deserialize_with = "lenient_int")]
    pub category: Option<i64>,
    /// Discriminator of the by-title search
    #[serde(default, deserialize_with = "lenient_int")]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub year: Option<i64>,
    #[serde(default)]
    pub country: Option<String>,
    /// Movie translations, by translation id
    #[serde(default, deserialize_with = "lenient_map")]
    pub translation_iframe: IndexMap<String, IframeTranslation>,
    /// Series seasons, by season number
    #[serde(default, deserialize_with = "lenient_map")]
    pub seasons: IndexMap<String, Season>,
}

impl Content {
    /// Content kind, or `None` when the response carries no discriminator
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.category.or(self.category_id).map(Category::from_code)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IframeTranslation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quality: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Season {
    #[serde(default, deserialize_with = "lenient_map")]
    pub episodes: IndexMap<String, Episode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Episode {
    /// Translations this episode is available in, by translation id
    #[serde(default, deserialize_with = "lenient_map")]
    pub translation: IndexMap<String, EpisodeTranslation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EpisodeTranslation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub translation: String,
}

/// An object, or `null`/`[]` standing for an empty one.
/// Any other shape is a decode error.
fn lenient_map<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(D::Error::custom),
        Value::Null => Ok(IndexMap::new()),
        Value::Array(items) if items.is_empty() => Ok(IndexMap::new()),
        other => Err(D::Error::custom(format!("expected object, found {other}"))),
    }
}

/// Integer sent either as a number or as a numeric string
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// String sent as a string, a number, or `null`
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
