//! Registry of named server configurations.

use crate::LanternConfig;
use chrono::{DateTime, Utc};
use lantern_core::ServerConfiguration;
use lantern_error::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument};

/// A server configuration shared between the registry and its clients.
///
/// Each record carries its own lock so health updates on one server never
/// contend with reads of another.
pub type SharedConfiguration = Arc<RwLock<ServerConfiguration>>;

/// Holds every named server configuration.
///
/// # Example
///
/// ```
/// use lantern_config::ConfigRegistry;
/// use lantern_core::ServerConfigurationBuilder;
///
/// let registry = ConfigRegistry::new();
/// let config = ServerConfigurationBuilder::default().name("gpu").build().unwrap();
/// registry.insert(config).unwrap();
///
/// assert_eq!(registry.names(), vec!["gpu".to_string()]);
/// assert!(registry.snapshot("gpu").is_some());
/// ```
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    servers: RwLock<HashMap<String, SharedConfiguration>>,
    default_server: RwLock<Option<String>>,
}

impl ConfigRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any server configuration is invalid.
    #[instrument(skip(config), fields(servers = config.servers.len()))]
    pub fn from_config(config: &LanternConfig) -> ConfigResult<Self> {
        let registry = Self::new();
        for server in config.servers.values() {
            registry.insert(server.clone())?;
        }
        if let Some(default) = &config.default_server {
            registry.set_default(default)?;
        }
        info!(servers = registry.len(), "Configuration registry ready");
        Ok(registry)
    }

    /// Add or replace a configuration after validating it.
    ///
    /// Replacing keeps the existing shared record so clients holding it see
    /// the new values.
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub fn insert(&self, config: ServerConfiguration) -> ConfigResult<SharedConfiguration> {
        config.validate()?;
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = servers.get(&config.name) {
            debug!("Replacing server configuration");
            *existing.write().unwrap_or_else(PoisonError::into_inner) = config;
            return Ok(Arc::clone(existing));
        }
        debug!("Registering server configuration");
        let shared = Arc::new(RwLock::new(config));
        let name = shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone();
        servers.insert(name, Arc::clone(&shared));
        Ok(shared)
    }

    /// Shared record for `name`.
    pub fn get(&self, name: &str) -> Option<SharedConfiguration> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Point-in-time copy of the configuration for `name`.
    pub fn snapshot(&self, name: &str) -> Option<ServerConfiguration> {
        self.get(name)
            .map(|shared| shared.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Remove a configuration. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self
            .servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if removed {
            let mut default = self
                .default_server
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if default.as_deref() == Some(name) {
                *default = None;
            }
        }
        removed
    }

    /// Sorted configuration names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of configurations.
    pub fn len(&self) -> usize {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no configuration is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configurations with `is_active` set, sorted by name.
    pub fn active(&self) -> Vec<SharedConfiguration> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(&name))
            .filter(|shared| {
                shared
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_active
            })
            .collect()
    }

    /// Choose the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not registered.
    pub fn set_default(&self, name: &str) -> ConfigResult<()> {
        if self.get(name).is_none() {
            return Err(ConfigError::new(format!(
                "Cannot make unknown server '{}' the default",
                name
            )));
        }
        *self
            .default_server
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        Ok(())
    }

    /// The default configuration: the one chosen explicitly, else the first
    /// active one by name.
    pub fn default_config(&self) -> Option<SharedConfiguration> {
        let chosen = self
            .default_server
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match chosen {
            Some(name) => self.get(&name),
            None => self.active().into_iter().next(),
        }
    }

    /// Record a health check outcome for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not registered.
    pub fn mark_health(&self, name: &str, healthy: bool, at: DateTime<Utc>) -> ConfigResult<()> {
        let shared = self
            .get(name)
            .ok_or_else(|| ConfigError::new(format!("Unknown server '{}'", name)))?;
        shared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record_health(healthy, at);
        Ok(())
    }
}
