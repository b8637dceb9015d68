//! Model variant selection and backend construction
//!
//! Two DeepSeek variants are recognized by name and mapped to their
//! upstream model identifiers. Anything else is a caller error.

use crate::llm::deepseek::DeepSeekBackend;
use crate::llm::{Backend, LlmError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The model variants the client knows how to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelVariant {
    /// DeepSeek-V3 general chat model
    #[default]
    Chat,
    /// DeepSeek-R1 reasoner model
    Reasoner,
}

impl ModelVariant {
    /// The model identifier the upstream API expects
    pub fn upstream_id(self) -> &'static str {
        match self {
            ModelVariant::Chat => "deepseek-chat",
            ModelVariant::Reasoner => "deepseek-reasoner",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Chat => write!(f, "chat"),
            ModelVariant::Reasoner => write!(f, "reasoner"),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chat" | "deepseek-chat" => Ok(ModelVariant::Chat),
            "reasoner" | "deepseek-reasoner" => Ok(ModelVariant::Reasoner),
            other => Err(format!(
                "unknown model variant '{}' (expected 'chat' or 'reasoner')",
                other
            )),
        }
    }
}

/// Create a backend for the selected variant
pub fn create_backend(
    variant: ModelVariant,
    api_key: String,
) -> Result<Box<dyn Backend>, LlmError> {
    if api_key.trim().is_empty() {
        return Err(LlmError::Config("API key is not set".into()));
    }

    Ok(Box::new(DeepSeekBackend::new(
        api_key,
        variant.upstream_id().to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_name_mapping() {
        assert_eq!("chat".parse::<ModelVariant>().unwrap(), ModelVariant::Chat);
        assert_eq!(
            "deepseek-chat".parse::<ModelVariant>().unwrap(),
            ModelVariant::Chat
        );
        assert_eq!(
            "reasoner".parse::<ModelVariant>().unwrap(),
            ModelVariant::Reasoner
        );
        assert_eq!(
            "DeepSeek-Reasoner".parse::<ModelVariant>().unwrap(),
            ModelVariant::Reasoner
        );

        assert_eq!(ModelVariant::Chat.upstream_id(), "deepseek-chat");
        assert_eq!(ModelVariant::Reasoner.upstream_id(), "deepseek-reasoner");
    }

    #[test]
    fn test_unknown_variant_is_an_error() {
        assert!("gpt-4o".parse::<ModelVariant>().is_err());
        assert!("".parse::<ModelVariant>().is_err());
    }

    #[test]
    fn test_backend_requires_api_key() {
        assert!(create_backend(ModelVariant::Chat, String::new()).is_err());
        assert!(create_backend(ModelVariant::Chat, "  ".into()).is_err());

        let backend = create_backend(ModelVariant::Reasoner, "sk-test".into()).unwrap();
        assert_eq!(backend.model(), "deepseek-reasoner");
    }
}
