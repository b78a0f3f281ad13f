//! # Engine Routing
//!
//! Decides which KV engines a BMCSecret is written to, based on its labels.
//!
//! A label predicate is either `key` (the label must be present, any value) or
//! `key=value` (exact match). The global sync label, when configured, is ANDed with
//! every engine's own predicate.

use crate::config::ConfigError;
use crate::paths::PathTemplateBuilder;
use crate::provider::SecretStore;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// `key` or `key=value` label match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPredicate {
    key: String,
    value: Option<String>,
}

impl LabelPredicate {
    /// Parse a predicate
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the key is empty.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut parts = spec.trim().splitn(2, '=');
        let key = parts.next().unwrap_or_default().trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "sync label {spec:?} has an empty key"
            )));
        }
        Ok(Self {
            key: key.to_string(),
            value: parts.next().map(|v| v.trim().to_string()),
        })
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match (labels.get(&self.key), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for LabelPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={value}", self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// A configured engine with its connected store
#[derive(Debug, Clone)]
pub struct EngineRoute {
    pub name: String,
    pub mount_path: String,
    pub store: Arc<dyn SecretStore>,
    pub template: PathTemplateBuilder,
    pub predicate: LabelPredicate,
}

/// One destination a BMCSecret is synced to
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    /// `None` for the default single-destination store
    pub engine: Option<&'a str>,
    pub store: &'a dyn SecretStore,
    pub template: &'a PathTemplateBuilder,
}

impl Route<'_> {
    /// Prefix error text with the engine name in multi-engine mode
    pub fn qualify(&self, message: &str) -> String {
        match self.engine {
            Some(engine) => format!("[{engine}] {message}"),
            None => message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineRouter {
    global: Option<LabelPredicate>,
    engines: Vec<EngineRoute>,
}

impl EngineRouter {
    pub fn new(global: Option<LabelPredicate>, engines: Vec<EngineRoute>) -> Self {
        Self { global, engines }
    }

    /// `true` when at least one engine is configured
    pub fn is_multi_engine(&self) -> bool {
        !self.engines.is_empty()
    }

    pub fn global_sync_label(&self) -> Option<&LabelPredicate> {
        self.global.as_ref()
    }

    pub fn engines(&self) -> &[EngineRoute] {
        &self.engines
    }

    /// Engines whose predicate (and the global one) match `labels`, in configuration order
    ///
    /// An empty result is a valid outcome: the secret routes nowhere.
    pub fn resolve(&self, labels: &BTreeMap<String, String>) -> Vec<&EngineRoute> {
        if self.global.as_ref().is_some_and(|global| !global.matches(labels)) {
            return Vec::new();
        }
        self.resolve_engines(labels)
    }

    /// Engines whose own predicate matches `labels`, regardless of the global sync label
    ///
    /// Cleanup uses this: a secret that lost the global label still owns what was
    /// written for it.
    pub fn resolve_engines(&self, labels: &BTreeMap<String, String>) -> Vec<&EngineRoute> {
        self.engines
            .iter()
            .filter(|engine| engine.predicate.matches(labels))
            .collect()
    }
}
