//! Configuration for command execution and for the engine.
//!
//! [`CommandConfig`] is the small immutable value passed with every call
//! through the chain. [`EngineSettings`] is the serialisable part of the
//! engine configuration; [`EngineConfiguration`] adds the runtime
//! collaborators (the compatibility handler) and is shared as an `Arc`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compatibility::CompatibilityHandler;
use crate::types::EngineName;

/// Per-call execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Whether the command may run inside an already active context.
    pub context_reuse_possible: bool,
    /// Whether a frame that created its own context returns the recorded
    /// failure as an error after teardown instead of an empty result.
    pub surface_failures: bool,
}

impl CommandConfig {
    /// Reuse allowed, failures absorbed into the context.
    pub const fn new() -> Self {
        Self {
            context_reuse_possible: true,
            surface_failures: false,
        }
    }

    /// Is context reuse permitted for this call?
    pub const fn is_context_reuse_possible(&self) -> bool {
        self.context_reuse_possible
    }

    /// Returns a copy with the reuse flag set to `possible`.
    #[must_use]
    pub const fn with_context_reuse_possible(mut self, possible: bool) -> Self {
        self.context_reuse_possible = possible;
        self
    }

    /// Returns a copy with failure surfacing set to `surface`.
    #[must_use]
    pub const fn with_surface_failures(mut self, surface: bool) -> Self {
        self.surface_failures = surface;
        self
    }

    /// Returns a copy that always runs in a fresh context.
    #[must_use]
    pub const fn transaction_not_supported(self) -> Self {
        self.with_context_reuse_possible(false)
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialisable engine settings.
///
/// Missing fields fall back to their defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Name of the engine, used in logs.
    pub engine_name: EngineName,
    /// Configuration used when a caller does not pass one explicitly.
    pub default_command_config: CommandConfig,
}

impl EngineSettings {
    /// Parses settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or a field fails
    /// validation (for example an empty engine name).
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Engine-wide configuration shared by every link of a chain.
#[derive(Debug, Clone, Default)]
pub struct EngineConfiguration {
    settings: EngineSettings,
    compatibility_handler: Option<Arc<dyn CompatibilityHandler>>,
}

impl EngineConfiguration {
    /// Creates a configuration from settings, without a compatibility handler.
    pub const fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            compatibility_handler: None,
        }
    }

    /// Sets the compatibility handler installed as the thread's fallback.
    #[must_use]
    pub fn with_compatibility_handler(mut self, handler: Arc<dyn CompatibilityHandler>) -> Self {
        self.compatibility_handler = Some(handler);
        self
    }

    /// Wraps the configuration for sharing across links.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The engine name.
    pub const fn engine_name(&self) -> &EngineName {
        &self.settings.engine_name
    }

    /// The serialisable settings.
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Configuration used when a caller does not pass one explicitly.
    pub const fn default_command_config(&self) -> CommandConfig {
        self.settings.default_command_config
    }

    /// The compatibility handler, if one is configured.
    pub fn compatibility_handler(&self) -> Option<Arc<dyn CompatibilityHandler>> {
        self.compatibility_handler.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct LegacyHandler;

    impl CompatibilityHandler for LegacyHandler {
        fn name(&self) -> &str {
            "legacy"
        }
    }

    #[test]
    fn command_config_defaults_allow_reuse_and_absorb_failures() {
        let config = CommandConfig::default();

        assert!(config.is_context_reuse_possible());
        assert!(!config.surface_failures);
    }

    #[test]
    fn transaction_not_supported_disables_reuse_only() {
        let config = CommandConfig::new()
            .with_surface_failures(true)
            .transaction_not_supported();

        assert!(!config.is_context_reuse_possible());
        assert!(config.surface_failures);
    }

    #[test]
    fn empty_settings_document_uses_defaults() {
        let settings = EngineSettings::from_json_str("{}").unwrap();

        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.engine_name.as_ref(), "default");
    }

    #[test]
    fn settings_document_overrides_fields() {
        let settings = EngineSettings::from_json_str(
            r#"{
                "engine_name": "orders",
                "default_command_config": { "context_reuse_possible": false }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.engine_name.as_ref(), "orders");
        assert!(!settings.default_command_config.context_reuse_possible);
        assert!(!settings.default_command_config.surface_failures);
    }

    #[test]
    fn settings_reject_blank_engine_name() {
        assert!(EngineSettings::from_json_str(r#"{ "engine_name": "  " }"#).is_err());
    }

    #[test]
    fn engine_configuration_exposes_handler() {
        let engine = EngineConfiguration::default().with_compatibility_handler(Arc::new(LegacyHandler));

        let handler = engine.compatibility_handler().unwrap();
        assert_eq!(handler.name(), "legacy");
        assert_eq!(engine.engine_name().as_ref(), "default");
    }
}
