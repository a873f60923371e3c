use super::Plugin;
use crate::error::{Error, Result};
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// The plugins of a run, in execution order.
///
/// The order is a linear extension of the required-plugin relation: a plugin
/// always runs after the plugins it requires, and otherwise by ascending
/// `order`, ties broken by registration position.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Result<Self> {
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (position, plugin) in plugins.iter().enumerate() {
            if index.insert(plugin.name(), position).is_some() {
                return Err(Error::Configuration(format!(
                    "plugin `{}` is registered twice",
                    plugin.name()
                )));
            }
        }

        // edges: required -> dependent
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); plugins.len()];
        let mut pending: Vec<usize> = vec![0; plugins.len()];
        for (position, plugin) in plugins.iter().enumerate() {
            for required in plugin.required_plugins() {
                let Some(&required_position) = index.get(required) else {
                    return Err(Error::Configuration(format!(
                        "plugin `{}` requires plugin `{}`, which is not registered",
                        plugin.name(),
                        required
                    )));
                };
                dependents[required_position].push(position);
                pending[position] += 1;
            }
        }

        let mut ready: BTreeSet<(i32, usize)> = plugins
            .iter()
            .enumerate()
            .filter(|(position, _)| pending[*position] == 0)
            .map(|(position, plugin)| (plugin.order(), position))
            .collect();

        let mut sorted = Vec::with_capacity(plugins.len());
        while let Some((order, position)) = ready.pop_first() {
            sorted.push(position);
            debug!("Plugin {} scheduled (order {})", plugins[position].name(), order);
            for &dependent in &dependents[position] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert((plugins[dependent].order(), dependent));
                }
            }
        }

        if sorted.len() < plugins.len() {
            let mut cyclic: Vec<String> = plugins
                .iter()
                .enumerate()
                .filter(|(position, _)| pending[*position] > 0)
                .map(|(_, plugin)| plugin.name().to_string())
                .collect();
            cyclic.sort();
            return Err(Error::PluginOrdering(cyclic));
        }

        let mut slots: Vec<Option<Box<dyn Plugin>>> = plugins.into_iter().map(Some).collect();
        let plugins = sorted
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect();
        Ok(Self { plugins })
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
