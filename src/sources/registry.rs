//! Registry of the available database backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{acm::AcmBackend, scopus::ScopusBackend, Backend, SourceError};
use crate::config::{Config, SourcesConfig};
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a backend can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendCapabilities: u32 {
        const SEARCH = 1 << 0;
        const BIBLIOMETRICS = 1 << 1;
        const PAPER_DETAILS = 1 << 2;
    }
}

/// Registry for database backends, ordered by id
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in backend, sharing one HTTP client
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = HttpClient::from_config(&config.http)?;
        let mut registry = Self::new();

        registry.register(Arc::new(ScopusBackend::new(
            client.clone(),
            config.api_keys.scopus.clone(),
            config.search.page_size,
        )));
        registry.register(Arc::new(AcmBackend::new(client, config.search.page_size)));

        Ok(registry)
    }

    /// Register a backend, replacing any backend with the same id
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.id().to_string(), backend);
    }

    /// Get a backend by id
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Backend>> {
        self.backends.get(&id.to_lowercase())
    }

    /// Get a backend by id, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Backend>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", id)))
    }

    /// Get all registered backends
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.values()
    }

    /// Get all backend ids
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(|s| s.as_str())
    }

    /// Get backends that support a specific capability
    pub fn with_capability(&self, capability: BackendCapabilities) -> Vec<&Arc<dyn Backend>> {
        self.all()
            .filter(|b| b.capabilities().contains(capability))
            .collect()
    }

    /// Backends to search, after applying the enabled and disabled lists.
    ///
    /// When `enabled` is given only those backends are used; `disabled`
    /// always takes precedence.
    pub fn select(&self, enabled: Option<&[String]>, disabled: &[String]) -> Vec<Arc<dyn Backend>> {
        let listed = |list: &[String], id: &str| list.iter().any(|item| item.eq_ignore_ascii_case(id));

        self.all()
            .filter(|b| b.capabilities().contains(BackendCapabilities::SEARCH))
            .filter(|b| enabled.map_or(true, |enabled| listed(enabled, b.id())))
            .filter(|b| !listed(disabled, b.id()))
            .cloned()
            .collect()
    }

    /// Backends selected by the `[sources]` configuration section
    pub fn select_from_config(&self, config: &SourcesConfig) -> Vec<Arc<dyn Backend>> {
        let enabled = config.enabled();
        self.select(enabled.as_deref(), &config.disabled())
    }

    /// Check if a backend exists
    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get the number of registered backends
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
