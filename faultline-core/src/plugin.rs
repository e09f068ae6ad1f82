//! This module provides support for plugins.
//!
//! Plugins are registered on the options and loaded once when the client is
//! constructed.  They are wired independently of the notify pipeline: a
//! plugin usually registers hooks or keeps a handle to the client it was
//! loaded into.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::Client;

/// Plugin abstraction.
// NOTE: we need `Any` here so that the `TypeId` machinery works correctly.
pub trait Plugin: Sync + Send + Any + AsAny {
    /// Name of this plugin.
    ///
    /// Plugins are looked up by this name; a later plugin with the same name
    /// replaces an earlier one.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Called once when the plugin is loaded into a client.
    fn load(&self, client: &Client) {
        let _ = client;
    }
}

// This is needed as a workaround to be able to safely downcast plugins
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Default)]
pub(crate) struct PluginRegistry {
    plugins: Vec<(TypeId, Arc<dyn Plugin>)>,
}

impl PluginRegistry {
    pub fn new(plugins: &[Arc<dyn Plugin>]) -> PluginRegistry {
        let mut registry = PluginRegistry::default();
        for plugin in plugins {
            registry.insert(plugin.clone());
        }
        registry
    }

    fn insert(&mut self, plugin: Arc<dyn Plugin>) {
        let name = plugin.name();
        self.plugins.retain(|(_, existing)| existing.name() != name);
        self.plugins.push((plugin.as_ref().type_id(), plugin));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter().map(|(_, plugin)| plugin)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|(_, plugin)| plugin.name() == name)
            .map(|(_, plugin)| plugin.clone())
    }

    pub fn get_as<P: Plugin>(&self) -> Option<&P> {
        let id = TypeId::of::<P>();
        let plugin = &self.plugins.iter().find(|(pid, _)| *pid == id)?.1;
        plugin.as_ref().as_any().downcast_ref()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|(_, plugin)| plugin.name()).collect()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
