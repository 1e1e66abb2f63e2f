//! Named resolver lookup and resolver sequence loading.

use super::node::{NodeResolver, NODE_RESOLVER_NAME};
use super::{
    normalize_resolvers, EntrySource, ResolverEntry, ResolverError, ResolverModule,
    ResolverRecord, ResolverSetting,
};
use crate::config::Settings;
use crate::paths::{is_absolute_specifier, normalize};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::RwLock;

/// Prefix tried first when loading a resolver by bare name.
pub const RESOLVER_PREFIX: &str = "modmap-resolver";

/// Where named resolvers come from.
///
/// A bare name `x` is looked up as `modmap-resolver-x`, then `x`, then as a
/// path relative to the package root of the file being linted.
#[derive(Debug, Default)]
pub struct ResolverRegistry {
    modules: RwLock<FxHashMap<String, ResolverModule>>,
}

impl ResolverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in node resolver.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(
            format!("{RESOLVER_PREFIX}-{NODE_RESOLVER_NAME}"),
            NodeResolver::module(),
        );
        registry
    }

    /// Make `module` loadable under `name`.
    pub fn register(&self, name: impl Into<String>, module: ResolverModule) {
        self.modules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.into(), module);
    }

    /// Make `module` loadable from a filesystem path.
    pub fn register_path(&self, path: &Path, module: ResolverModule) {
        self.register(path_key(path), module);
    }

    fn lookup(&self, key: &str) -> Option<ResolverModule> {
        self.modules
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Load a resolver by name or path.
    pub fn load(&self, name: &str, base_dir: &Path) -> Result<ResolverModule, ResolverError> {
        let by_path = || self.lookup(&path_key(&base_dir.join(name)));

        let found = if is_path_like(name) {
            by_path()
        } else {
            self.lookup(&format!("{RESOLVER_PREFIX}-{name}"))
                .or_else(|| self.lookup(name))
                .or_else(by_path)
        };
        found.ok_or_else(|| ResolverError::NotFound(name.to_string()))
    }

    /// Build the prioritized resolver sequence for `settings`.
    ///
    /// `resolver` entries come first (the node resolver when neither
    /// setting is present), then `resolver-next` entries. Every record keeps
    /// its own contract, so legacy resolvers listed under `resolver-next`
    /// still receive the caller's options and cwd. Disabled entries are
    /// skipped.
    pub fn load_sequence(
        &self,
        settings: &Settings,
        base_dir: &Path,
    ) -> Result<Vec<ResolverRecord>, ResolverError> {
        let legacy = match &settings.resolver {
            Some(setting) => Some(setting.clone()),
            None if settings.resolver_next.is_empty() => {
                Some(ResolverSetting::from(NODE_RESOLVER_NAME))
            }
            None => None,
        };

        let mut records = Vec::new();
        if let Some(setting) = legacy {
            for entry in normalize_resolvers(&setting)? {
                if entry.enable {
                    records.push(self.instantiate(entry, base_dir)?);
                }
            }
        }
        if !settings.resolver_next.is_empty() {
            let next = ResolverSetting::List(settings.resolver_next.clone());
            for entry in normalize_resolvers(&next)? {
                if entry.enable {
                    records.push(self.instantiate(entry, base_dir)?);
                }
            }
        }

        tracing::debug!(
            resolvers = ?records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "loaded resolver sequence"
        );
        Ok(records)
    }

    fn instantiate(
        &self,
        entry: ResolverEntry,
        base_dir: &Path,
    ) -> Result<ResolverRecord, ResolverError> {
        let module = match entry.source {
            EntrySource::Named(name) => self.load(&name, base_dir)?,
            EntrySource::Module(module) => module,
        };
        let kind = module.inspect(&entry.name)?;
        Ok(ResolverRecord {
            name: entry.name,
            enabled: entry.enable,
            options: entry.options,
            kind,
        })
    }
}

fn is_path_like(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../") || is_absolute_specifier(name)
}

fn path_key(path: &Path) -> String {
    normalize(path).to_string_lossy().into_owned()
}
