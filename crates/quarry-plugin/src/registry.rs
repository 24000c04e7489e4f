// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of plugins served by an extension.
//!
//! Plugins are keyed by registry category and then by name. The registry is
//! populated before the server starts and only read afterwards, so lookups
//! need no locking.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use quarry_core::{ExtensionRegistry, Plugin, QuarryError, RegistryCategory};
use strum::IntoEnumIterator;
use tracing::{debug, error};

/// Why a dispatched `(category, item)` pair resolved to no plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// The category string is not one of the fixed registry names.
    UnknownRegistry(String),
    /// The category exists but holds no plugin by that name.
    UnknownItem(String),
}

impl fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupMiss::UnknownRegistry(name) => write!(f, "Unknown registry: {name}"),
            LookupMiss::UnknownItem(name) => write!(f, "Unknown registry item: {name}"),
        }
    }
}

/// Two-level mapping of registry category to plugin name to plugin.
///
/// Every category is present from construction, so a known category with no
/// plugins reports an unknown item rather than an unknown registry.
pub struct Registry {
    plugins: BTreeMap<RegistryCategory, BTreeMap<String, Box<dyn Plugin>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: RegistryCategory::iter()
                .map(|category| (category, BTreeMap::new()))
                .collect(),
        }
    }

    /// Adds a plugin, replacing any plugin of the same category and name.
    ///
    /// A plugin declaring a registry outside the fixed set is rejected with
    /// [`QuarryError::InvalidRegistry`] and the registry is left untouched.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), QuarryError> {
        let category = parse_category(plugin.as_ref())?;
        self.insert(category, plugin);
        Ok(())
    }

    /// Adds several plugins. All categories are checked before any plugin is
    /// inserted, so a single invalid plugin leaves the registry untouched.
    pub fn register_all(
        &mut self,
        plugins: impl IntoIterator<Item = Box<dyn Plugin>>,
    ) -> Result<(), QuarryError> {
        let checked = plugins
            .into_iter()
            .map(|plugin| parse_category(plugin.as_ref()).map(|category| (category, plugin)))
            .collect::<Result<Vec<_>, _>>()?;
        for (category, plugin) in checked {
            self.insert(category, plugin);
        }
        Ok(())
    }

    fn insert(&mut self, category: RegistryCategory, plugin: Box<dyn Plugin>) {
        let name = plugin.name().to_string();
        debug!(registry = %category, plugin = %name, "plugin registered");
        self.plugins.entry(category).or_default().insert(name, plugin);
    }

    /// Resolves the plugin addressed by a host call.
    pub fn lookup(&self, category: &str, name: &str) -> Result<&dyn Plugin, LookupMiss> {
        let plugins = RegistryCategory::from_str(category)
            .ok()
            .and_then(|category| self.plugins.get(&category))
            .ok_or_else(|| LookupMiss::UnknownRegistry(category.to_string()))?;
        plugins
            .get(name)
            .map(|plugin| plugin.as_ref())
            .ok_or_else(|| LookupMiss::UnknownItem(name.to_string()))
    }

    /// Route table of every plugin, grouped by category. Categories without
    /// plugins are included with an empty mapping.
    pub fn routes(&self) -> ExtensionRegistry {
        self.plugins
            .iter()
            .map(|(category, plugins)| {
                let routes = plugins
                    .iter()
                    .map(|(name, plugin)| (name.clone(), plugin.routes()))
                    .collect();
                (category.to_string(), routes)
            })
            .collect()
    }

    /// Iterates over every registered plugin.
    pub fn plugins(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins
            .values()
            .flat_map(|plugins| plugins.values().map(|plugin| plugin.as_ref()))
    }

    /// Calls `shutdown` on each registered plugin.
    pub async fn shutdown_all(&self) {
        for plugin in self.plugins() {
            debug!(plugin = plugin.name(), "shutting down plugin");
            plugin.shutdown().await;
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_category(plugin: &dyn Plugin) -> Result<RegistryCategory, QuarryError> {
    RegistryCategory::from_str(plugin.registry_name()).map_err(|_| {
        error!(
            plugin = plugin.name(),
            registry = plugin.registry_name(),
            "plugin declares an invalid registry"
        );
        QuarryError::InvalidRegistry {
            name: plugin.registry_name().to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use quarry_core::{row, ExtensionResponse, PluginRequest, PluginRoutes};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Named {
        name: String,
        registry: String,
        shutdowns: Arc<AtomicUsize>,
    }

    impl Named {
        fn boxed(registry: &str, name: &str) -> Box<dyn Plugin> {
            Box::new(Named {
                name: name.to_string(),
                registry: registry.to_string(),
                shutdowns: Arc::default(),
            })
        }
    }

    #[async_trait]
    impl Plugin for Named {
        fn name(&self) -> &str {
            &self.name
        }

        fn registry_name(&self) -> &str {
            &self.registry
        }

        fn routes(&self) -> PluginRoutes {
            vec![row([("name", self.name.as_str())])]
        }

        async fn call(&self, _request: PluginRequest) -> ExtensionResponse {
            ExtensionResponse::ok(vec![row([("from", self.name.as_str())])])
        }

        async fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_registry_has_every_category() {
        let registry = Registry::new();
        let routes = registry.routes();
        let categories: Vec<&str> = routes.keys().map(String::as_str).collect();
        assert_eq!(categories, vec!["config", "distributed", "logger", "table"]);
        assert!(routes.values().all(BTreeMap::is_empty));
        assert!(registry.is_empty());
    }

    #[test]
    fn register_rejects_invalid_registry_without_mutation() {
        let mut registry = Registry::new();
        registry.register(Named::boxed("table", "kept")).unwrap();

        let err = registry
            .register(Named::boxed("tables", "dropped"))
            .unwrap_err();
        assert!(matches!(err, QuarryError::InvalidRegistry { ref name } if name == "tables"));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("table", "dropped").is_err());
    }

    #[test]
    fn register_all_is_all_or_nothing() {
        let mut registry = Registry::new();
        let result = registry.register_all(vec![
            Named::boxed("table", "a"),
            Named::boxed("bogus", "b"),
            Named::boxed("logger", "c"),
        ]);
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_distinguishes_unknown_registry_and_item() {
        let mut registry = Registry::new();
        registry.register(Named::boxed("config", "cfg")).unwrap();

        assert_eq!(
            registry.lookup("nope", "cfg").err(),
            Some(LookupMiss::UnknownRegistry("nope".into()))
        );
        assert_eq!(
            registry.lookup("config", "other").err(),
            Some(LookupMiss::UnknownItem("other".into()))
        );
        assert_eq!(
            LookupMiss::UnknownRegistry("x".into()).to_string(),
            "Unknown registry: x"
        );
        assert_eq!(
            LookupMiss::UnknownItem("y".into()).to_string(),
            "Unknown registry item: y"
        );
        assert_eq!(registry.lookup("config", "cfg").unwrap().name(), "cfg");
    }

    #[test]
    fn same_name_replaces_within_category_only() {
        let mut registry = Registry::new();
        registry.register(Named::boxed("table", "dup")).unwrap();
        registry.register(Named::boxed("table", "dup")).unwrap();
        registry.register(Named::boxed("logger", "dup")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn routes_snapshot_includes_plugin_routes() {
        let mut registry = Registry::new();
        registry.register(Named::boxed("table", "t1")).unwrap();
        let routes = registry.routes();
        assert_eq!(routes["table"]["t1"], vec![row([("name", "t1")])]);
    }

    #[tokio::test]
    async fn shutdown_all_reaches_each_plugin_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        for (registry_name, name) in [("table", "a"), ("config", "b"), ("logger", "c")] {
            registry
                .register(Box::new(Named {
                    name: name.into(),
                    registry: registry_name.into(),
                    shutdowns: Arc::clone(&counter),
                }))
                .unwrap();
        }
        registry.shutdown_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    fn category() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("table"),
            Just("logger"),
            Just("config"),
            Just("distributed"),
        ]
    }

    proptest! {
        #[test]
        fn lookup_finds_exactly_the_registered_pairs(
            entries in proptest::collection::vec((category(), "[a-z]{1,6}"), 0..12),
            probe_category in "[a-z]{1,12}",
            probe_name in "[a-z]{1,6}",
        ) {
            let mut registry = Registry::new();
            for (category, name) in &entries {
                registry.register(Named::boxed(category, name)).unwrap();
            }
            for (category, name) in &entries {
                let plugin = registry.lookup(category, name).unwrap();
                prop_assert_eq!(plugin.name(), name.as_str());
                prop_assert_eq!(plugin.registry_name(), *category);
            }
            let registered = entries
                .iter()
                .any(|(c, n)| *c == probe_category && *n == probe_name);
            prop_assert_eq!(registry.lookup(&probe_category, &probe_name).is_ok(), registered);
        }
    }
}
