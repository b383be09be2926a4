//! The [`Plugin`] trait and the explicit name-to-constructor registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fp_av::{CapabilityCatalog, Framework, MediaInfo};
use fp_core::{Error, JobId, Result};

use crate::command::Command;

/// A unit contributing commands to a job.
pub trait Plugin: Send + Sync {
    /// Registry name, also used to look up this plugin's assets.
    fn name(&self) -> &str;

    /// Named output paths other plugins may consume.
    fn assets(&self, ctx: &JobContext<'_>) -> BTreeMap<String, PathBuf> {
        let _ = ctx;
        BTreeMap::new()
    }

    /// Commands this plugin contributes for the job in `ctx`.
    fn commands(&self, ctx: &JobContext<'_>) -> Result<Vec<Command>>;
}

/// Read-only view of a job handed to plugins during graph build.
pub struct JobContext<'a> {
    pub id: JobId,
    pub source: &'a Path,
    pub output_dir: &'a Path,
    pub media: &'a MediaInfo,
    pub framework: &'a dyn Framework,
    pub(crate) plugins: &'a [Box<dyn Plugin>],
}

impl JobContext<'_> {
    /// Path of `relative` inside the job's output directory.
    pub fn output_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(relative)
    }

    pub fn catalog(&self) -> Arc<CapabilityCatalog> {
        self.framework.catalog()
    }

    /// Asset `asset` of the attached plugin named `plugin`.
    pub fn asset(&self, plugin: &str, asset: &str) -> Option<PathBuf> {
        self.plugins
            .iter()
            .find(|p| p.name() == plugin)
            .and_then(|p| p.assets(self).remove(asset))
    }

    pub fn has_plugin(&self, plugin: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == plugin)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Builds a plugin from its `[plugins.<name>]` option table.
pub type PluginConstructor = fn(&toml::Table) -> Result<Box<dyn Plugin>>;

/// Explicit mapping from plugin name to constructor.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    constructors: BTreeMap<String, PluginConstructor>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::plugins::register_builtins(&mut registry);
        registry
    }

    /// Register `constructor` under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `name` is already registered.
    pub fn register(&mut self, name: &str, constructor: PluginConstructor) -> Result<()> {
        if self.constructors.contains_key(name) {
            return Err(Error::Config(format!("plugin '{name}' registered twice")));
        }
        self.constructors.insert(name.to_string(), constructor);
        Ok(())
    }

    /// Construct the plugin registered as `name`.
    pub fn create(&self, name: &str, options: &toml::Table) -> Result<Box<dyn Plugin>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            Error::Config(format!(
                "unknown plugin '{name}' (available: {})",
                self.names().join(", ")
            ))
        })?;
        constructor(options)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

/// Deserialize typed plugin options from a raw table.
pub fn parse_options<T: serde::de::DeserializeOwned>(plugin: &str, table: &toml::Table) -> Result<T> {
    toml::Value::Table(table.clone())
        .try_into()
        .map_err(|e| Error::Config(format!("invalid options for plugin '{plugin}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Noop;

    impl Plugin for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn commands(&self, _ctx: &JobContext<'_>) -> Result<Vec<Command>> {
            Ok(Vec::new())
        }
    }

    fn noop(_: &toml::Table) -> Result<Box<dyn Plugin>> {
        Ok(Box::new(Noop))
    }

    #[test]
    fn register_and_create() {
        let mut registry = PluginRegistry::new();
        registry.register("noop", noop).unwrap();
        assert!(registry.contains("noop"));
        let plugin = registry.create("noop", &toml::Table::new()).unwrap();
        assert_eq!(plugin.name(), "noop");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = PluginRegistry::new();
        registry.register("noop", noop).unwrap();
        assert_matches!(registry.register("noop", noop), Err(Error::Config(_)));
    }

    #[test]
    fn unknown_plugin_lists_available() {
        let registry = PluginRegistry::with_builtins();
        let err = registry.create("watermark", &toml::Table::new()).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("watermark"));
        assert!(msg.contains("thumbnail"));
    }

    #[test]
    fn builtins_registered() {
        let registry = PluginRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["audio", "hls", "metadata", "subtitles", "thumbnail"]
        );
    }

    #[test]
    fn options_parse_errors_name_plugin() {
        #[derive(serde::Deserialize)]
        struct Opts {
            #[allow(dead_code)]
            width: u32,
        }
        let mut table = toml::Table::new();
        table.insert("width".into(), toml::Value::String("wide".into()));
        let err = parse_options::<Opts>("thumbnail", &table).err().unwrap();
        assert!(err.to_string().contains("thumbnail"));
    }
}
