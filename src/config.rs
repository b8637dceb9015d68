//! Settings persistence
//!
//! One JSON record holding the credential, pricing, context depth, naming
//! mode, model variant, prompt wrappers and the conversation index. Loading
//! degrades gracefully: a missing file yields defaults, a file missing newer
//! fields is upgraded in memory, and legacy registry entries are accepted.

use crate::llm::ModelVariant;
use crate::store::RegistryRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_PRICE_PER_1K: &str = "0.02";
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const HISTORY_LIMIT_MIN: usize = 1;
pub const HISTORY_LIMIT_MAX: usize = 20;

/// Process-wide configuration
///
/// Loaded at start, mutated during the session, persisted by the autosave
/// task and once more at shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API credential for the chat-completion endpoint
    pub api_key: String,

    /// Price per 1000 tokens, kept as entered and parsed defensively
    #[serde(alias = "price_per_token", with = "price_text")]
    pub price_per_1k: String,

    /// How many prior turns to replay as context
    pub history_limit: usize,

    /// Whether new conversations are named from their creation time
    pub name_by_timestamp: bool,

    /// Selected model variant
    pub model: ModelVariant,

    /// Sampling temperature for the remote call
    pub temperature: f32,

    /// Text prepended to every prompt
    pub prefix: String,

    /// Text appended to every prompt
    pub suffix: String,

    /// The conversation index; bare-id entries come from older writers
    pub conversations: Vec<RegistryRecord>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            price_per_1k: DEFAULT_PRICE_PER_1K.to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            name_by_timestamp: true,
            model: ModelVariant::default(),
            temperature: 0.7,
            prefix: String::new(),
            suffix: String::new(),
            conversations: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults on any read or parse failure
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %err, "can't read config, using defaults");
                }
                return Self::default();
            }
        };

        match serde_json::from_str::<Settings>(&raw) {
            Ok(mut settings) => {
                settings.history_limit = settings
                    .history_limit
                    .clamp(HISTORY_LIMIT_MIN, HISTORY_LIMIT_MAX);
                settings.temperature = settings.temperature.clamp(0.0, 2.0);
                settings
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "config is unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Persist the settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// The parsed per-1000-token price, 0 when the field is unusable
    pub fn price(&self) -> f64 {
        crate::usage::parse_price(&self.price_per_1k)
    }
}

/// Accept the price as either a string or a bare number
///
/// The original config format stored a float; the field is free text now.
mod price_text {
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PriceVisitor;

        impl serde::de::Visitor<'_> for PriceVisitor {
            type Value = String;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or number")
            }

            fn visit_str<E>(self, value: &str) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_f64<E>(self, value: f64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_i64<E>(self, value: i64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }

            fn visit_u64<E>(self, value: u64) -> Result<String, E>
            where
                E: serde::de::Error,
            {
                Ok(value.to_string())
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }
}
