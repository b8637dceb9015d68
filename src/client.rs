//! Chat client
//!
//! Owns the settings, the conversation store, the usage tracker and the
//! LLM backend, and executes one user action at a time. The presentation
//! layer only ever issues requests here and renders the results; it holds
//! no conversation state of its own beyond the active id kept for it.

use crate::config::{Settings, HISTORY_LIMIT_MAX, HISTORY_LIMIT_MIN};
use crate::context::build_context;
use crate::llm::{create_backend, Backend, LlmError, ModelVariant};
use crate::store::{Conversation, ConversationStore, RegistryEntry, StoreError, Turn};
use crate::usage::{estimate_tokens, UsageTracker};
use anyhow::bail;
use std::path::PathBuf;

/// Result of one send action
#[derive(Debug)]
pub struct SendOutcome {
    /// The model's answer, or the error text that substituted for it
    pub response: String,

    /// Reasoner chain-of-thought, when the variant provides one
    pub reasoning: Option<String>,

    /// Tokens billed for this exchange
    pub tokens: u64,

    /// Estimated size of the assembled prompt, for display
    pub prompt_tokens: usize,

    /// Set when the exchange could not be appended to the log
    pub persist_error: Option<StoreError>,
}

pub struct ChatClient {
    settings: Settings,
    store: ConversationStore,
    usage: UsageTracker,
    backend: Option<Box<dyn Backend>>,
    active: Option<String>,
    config_path: PathBuf,
}

impl ChatClient {
    pub fn new(settings: Settings, config_path: PathBuf, log_dir: PathBuf) -> Self {
        let store = ConversationStore::new(log_dir, settings.conversations.clone());
        Self {
            settings,
            store,
            usage: UsageTracker::new(),
            backend: None,
            active: None,
            config_path,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// The active conversation body, when one is selected and loaded
    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_deref().and_then(|id| self.store.get(id))
    }

    /// Assemble the full prompt, call the model, record usage and append the
    /// exchange to the active conversation
    ///
    /// A remote failure is not an error here: its message substitutes for
    /// the response with usage 0 and the exchange is logged like any other.
    pub async fn send(&mut self, body: &str) -> anyhow::Result<SendOutcome> {
        let full_prompt = format!("{}{}{}", self.settings.prefix, body, self.settings.suffix);
        if full_prompt.trim().is_empty() {
            bail!("prompt can't be empty");
        }
        let prompt_tokens = estimate_tokens(&full_prompt);

        // Make sure the active body is in the cache before building context
        if let Some(id) = self.active.clone() {
            if let Err(err) = self.store.load(&id) {
                tracing::warn!(%err, "active conversation is unavailable, sending without context");
            }
        }

        let messages = {
            let conversation = self.active.as_deref().and_then(|id| self.store.get(id));
            build_context(conversation, self.settings.history_limit, &full_prompt)
        };
        let temperature = self.settings.temperature;

        let call = match self.ensure_backend() {
            Ok(backend) => backend.send_message(&messages, temperature).await,
            Err(err) => Err(err),
        };
        let (response, reasoning, tokens) = match call {
            Ok(reply) => (reply.content, reply.reasoning, reply.total_tokens),
            Err(err) => (format!("API error: {}", err), None, 0),
        };

        self.usage.record(tokens);

        let mut persist_error = None;
        if let Some(id) = self.active.clone() {
            let turn = Turn::new(full_prompt, response.clone(), tokens);
            if let Err(err) = self.store.append_turn(&id, turn) {
                persist_error = Some(err);
            }
        }
        self.save_state();

        Ok(SendOutcome {
            response,
            reasoning,
            tokens,
            prompt_tokens,
            persist_error,
        })
    }

    /// Create a conversation and make it active
    ///
    /// An explicit name always wins; the naming mode only decides what
    /// happens without one (auto-name in timestamp mode, error otherwise).
    pub fn new_conversation(&mut self, name: Option<&str>) -> anyhow::Result<RegistryEntry> {
        if name.is_none() && !self.settings.name_by_timestamp {
            bail!("a name is required (naming mode is user-supplied; try /new <name>)");
        }

        let conv = self.store.create(name)?;
        let entry = RegistryEntry {
            id: conv.id.clone(),
            name: conv.name.clone(),
            location: conv.path.clone(),
        };
        self.active = Some(entry.id.clone());
        self.save_state();
        Ok(entry)
    }

    /// Make a conversation active, loading its body by id or name
    pub fn open(&mut self, key: &str) -> Result<&Conversation, StoreError> {
        let id = self
            .store
            .find(key)
            .map(|entry| entry.id.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        self.store.load(&id)?;
        self.active = Some(id.clone());
        self.store
            .get(&id)
            .ok_or(StoreError::NotFound(id))
    }

    /// Rename the active conversation
    pub fn rename_active(&mut self, new_name: &str) -> anyhow::Result<()> {
        let Some(id) = self.active.clone() else {
            bail!("no active conversation");
        };
        self.store.rename(&id, new_name)?;
        self.save_state();
        Ok(())
    }

    /// Drop the most recent turn of the active conversation
    pub fn drop_last(&mut self) -> anyhow::Result<Turn> {
        let Some(id) = self.active.clone() else {
            bail!("no active conversation");
        };
        self.store.load(&id)?;
        let turn = self.store.truncate_last(&id)?;
        Ok(turn)
    }

    /// Delete a conversation by id; returns whether it was the active one
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(id)?;
        let was_active = self.active.as_deref() == Some(id);
        if was_active {
            self.active = None;
        }
        self.save_state();
        Ok(was_active)
    }

    pub fn set_api_key(&mut self, key: &str) {
        self.settings.api_key = key.trim().to_string();
        self.backend = None;
    }

    pub fn set_model(&mut self, model: ModelVariant) {
        self.settings.model = model;
        self.backend = None;
    }

    pub fn set_price(&mut self, raw: &str) {
        self.settings.price_per_1k = raw.trim().to_string();
    }

    pub fn set_history_limit(&mut self, limit: usize) -> usize {
        self.settings.history_limit = limit.clamp(HISTORY_LIMIT_MIN, HISTORY_LIMIT_MAX);
        self.settings.history_limit
    }

    pub fn set_temperature(&mut self, temperature: f32) -> f32 {
        self.settings.temperature = temperature.clamp(0.0, 2.0);
        self.settings.temperature
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.settings.prefix = prefix.to_string();
    }

    pub fn set_suffix(&mut self, suffix: &str) {
        self.settings.suffix = suffix.to_string();
    }

    pub fn set_name_by_timestamp(&mut self, enabled: bool) {
        self.settings.name_by_timestamp = enabled;
    }

    /// Persist settings plus the current registry snapshot, warning on failure
    pub fn save_state(&mut self) {
        self.settings.conversations = self.store.records();
        if let Err(err) = self.settings.save(&self.config_path) {
            tracing::warn!(path = %self.config_path.display(), %err, "can't save config");
        }
    }

    /// Settings with a fresh registry snapshot, for the autosave task
    pub fn settings_snapshot(&self) -> Settings {
        let mut snapshot = self.settings.clone();
        snapshot.conversations = self.store.records();
        snapshot
    }

    fn ensure_backend(&mut self) -> Result<&dyn Backend, LlmError> {
        if self.backend.is_none() {
            self.backend = Some(create_backend(
                self.settings.model,
                self.settings.api_key.clone(),
            )?);
        }
        self.backend
            .as_deref()
            .ok_or_else(|| LlmError::Config("backend unavailable".into()))
    }

    #[cfg(test)]
    fn with_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }
}
