//! Queries over an export map and everything it re-exports.

use super::{ExportEntry, ExportKind, ExportMap};
use crate::config::Settings;
use crate::engine::EngineState;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of looking up one exported name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLookup {
    Found(ExportEntry),
    /// The name is re-exported from a module that could not be resolved or
    /// parsed, so it cannot be verified.
    Unresolved,
    Missing,
}

impl ExportLookup {
    #[must_use]
    pub fn entry(&self) -> Option<&ExportEntry> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::Unresolved | Self::Missing => None,
        }
    }
}

/// Result of [`ModuleNamespace::has_deep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeepLookup {
    pub found: bool,
    /// Modules traversed, starting with the queried one.
    pub path: Vec<PathBuf>,
}

/// Result of walking `ns.a.b.c` through nested namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dereference {
    /// Every segment exists. `None` when no segment was given.
    Found(Option<ExportEntry>),
    /// `name` is a plain value inside `namespace`; deeper segments are not
    /// checked.
    NotANamespace { name: String, namespace: String },
    /// A module on the way could not be resolved or parsed.
    Unresolved { namespace: String },
    /// `name` is not exported by `namespace`.
    NotFound { name: String, namespace: String },
}

impl Dereference {
    /// Lint message for [`Dereference::NotFound`].
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let Self::NotFound { name, namespace } = self else {
            return None;
        };
        let depth = if namespace.contains('.') {
            "deeply imported"
        } else {
            "imported"
        };
        Some(format!("'{name}' not found in {depth} namespace '{namespace}'."))
    }
}

/// Read-only view of a module's export surface, following re-exports
/// through the engine's cache.
#[derive(Debug, Clone)]
pub struct ModuleNamespace<'a> {
    map: Arc<ExportMap>,
    engine: &'a EngineState,
    settings: &'a Arc<Settings>,
}

type Visited = FxHashSet<(PathBuf, String)>;

impl<'a> ModuleNamespace<'a> {
    #[must_use]
    pub fn new(map: Arc<ExportMap>, engine: &'a EngineState, settings: &'a Arc<Settings>) -> Self {
        Self {
            map,
            engine,
            settings,
        }
    }

    #[must_use]
    pub fn map(&self) -> &Arc<ExportMap> {
        &self.map
    }

    fn follow(&self, target: Option<&super::ExportMapRef>) -> Option<Arc<ExportMap>> {
        self.engine.follow(target?, self.settings)
    }

    /// Whether `name` is exported, directly or through `export *`.
    /// `default` never comes from a wildcard.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.has_in(&self.map, name, &mut Visited::default())
    }

    fn has_in(&self, map: &ExportMap, name: &str, visited: &mut Visited) -> bool {
        if !visited.insert((map.path.clone(), name.to_string())) {
            return false;
        }
        if map.entries.contains_key(name) {
            return true;
        }
        if name == "default" {
            return false;
        }
        map.namespace_reexports.iter().any(|dep| {
            self.follow(Some(dep))
                .is_some_and(|inner| self.has_in(&inner, name, visited))
        })
    }

    /// The entry `name` finally refers to, following re-exports.
    #[must_use]
    pub fn get(&self, name: &str) -> ExportLookup {
        self.get_in(&self.map, name, &mut Visited::default())
    }

    fn get_in(&self, map: &ExportMap, name: &str, visited: &mut Visited) -> ExportLookup {
        if !visited.insert((map.path.clone(), name.to_string())) {
            return ExportLookup::Missing;
        }

        if let Some(entry) = map.entries.get(name) {
            if entry.kind != ExportKind::ReExport {
                return ExportLookup::Found(entry.clone());
            }
            let Some(target) = self.follow(entry.source.as_ref()) else {
                return ExportLookup::Unresolved;
            };
            let local = entry.local.as_deref().unwrap_or(name);
            if target.path == map.path && local == name {
                return ExportLookup::Missing;
            }
            return self.get_in(&target, local, visited);
        }

        if name == "default" {
            return ExportLookup::Missing;
        }
        for dep in &map.namespace_reexports {
            let Some(inner) = self.follow(Some(dep)) else {
                continue;
            };
            if inner.path == map.path {
                continue;
            }
            match self.get_in(&inner, name, visited) {
                ExportLookup::Missing => {}
                found => return found,
            }
        }
        ExportLookup::Missing
    }

    /// Like [`ModuleNamespace::has`], but also reports the modules walked.
    /// Anything that cannot be verified counts as found.
    #[must_use]
    pub fn has_deep(&self, name: &str) -> DeepLookup {
        self.has_deep_in(&self.map, name, &mut Visited::default())
    }

    fn has_deep_in(&self, map: &ExportMap, name: &str, visited: &mut Visited) -> DeepLookup {
        let here = || vec![map.path.clone()];
        if !visited.insert((map.path.clone(), name.to_string())) {
            return DeepLookup {
                found: false,
                path: here(),
            };
        }

        if let Some(entry) = map.entries.get(name) {
            if entry.kind != ExportKind::ReExport {
                return DeepLookup {
                    found: true,
                    path: here(),
                };
            }
            let Some(target) = self.follow(entry.source.as_ref()) else {
                return DeepLookup {
                    found: true,
                    path: here(),
                };
            };
            let local = entry.local.as_deref().unwrap_or(name);
            if target.path == map.path && local == name {
                return DeepLookup {
                    found: false,
                    path: here(),
                };
            }
            let mut deep = self.has_deep_in(&target, local, visited);
            deep.path.insert(0, map.path.clone());
            return deep;
        }

        if name != "default" {
            for dep in &map.namespace_reexports {
                let Some(inner) = self.follow(Some(dep)) else {
                    return DeepLookup {
                        found: true,
                        path: here(),
                    };
                };
                if inner.path == map.path {
                    continue;
                }
                let mut deep = self.has_deep_in(&inner, name, visited);
                if deep.found {
                    deep.path.insert(0, map.path.clone());
                    return deep;
                }
            }
        }

        DeepLookup {
            found: false,
            path: here(),
        }
    }

    /// Call `f` once per exported name: own entries first, then names
    /// reachable through `export *` (never `default`).
    pub fn for_each(&self, mut f: impl FnMut(&str, ExportLookup)) {
        let mut seen = FxHashSet::default();
        let mut maps = FxHashSet::default();
        self.for_each_in(&self.map, true, &mut seen, &mut maps, &mut f);
    }

    fn for_each_in(
        &self,
        map: &ExportMap,
        include_default: bool,
        seen: &mut FxHashSet<String>,
        maps: &mut FxHashSet<PathBuf>,
        f: &mut impl FnMut(&str, ExportLookup),
    ) {
        if !maps.insert(map.path.clone()) {
            return;
        }
        for (name, entry) in &map.entries {
            if (!include_default && name == "default") || !seen.insert(name.clone()) {
                continue;
            }
            let value = if entry.kind == ExportKind::ReExport {
                self.get_in(map, name, &mut Visited::default())
            } else {
                ExportLookup::Found(entry.clone())
            };
            f(name, value);
        }
        for dep in &map.namespace_reexports {
            if let Some(inner) = self.follow(Some(dep)) {
                self.for_each_in(&inner, false, seen, maps, f);
            }
        }
    }

    /// Number of distinct names [`ModuleNamespace::for_each`] visits.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut count = 0;
        self.for_each(|_, _| count += 1);
        count
    }

    /// Walk `segments` starting from this module, imported as `root`.
    ///
    /// Failures name the deepest namespace reached, e.g. `a.b.c` for
    /// `a.b.c.missing`.
    #[must_use]
    pub fn dereference(&self, root: &str, segments: &[&str]) -> Dereference {
        let mut current = self.clone();
        let mut namepath = root.to_string();

        for (i, segment) in segments.iter().enumerate() {
            if !current.has(segment) {
                return Dereference::NotFound {
                    name: (*segment).to_string(),
                    namespace: namepath,
                };
            }
            let entry = match current.get(segment) {
                ExportLookup::Found(entry) => entry,
                ExportLookup::Unresolved | ExportLookup::Missing => {
                    return Dereference::Unresolved { namespace: namepath };
                }
            };
            namepath.push('.');
            namepath.push_str(segment);

            if i + 1 == segments.len() {
                return Dereference::Found(Some(entry));
            }
            let Some(target) = entry.namespace.as_ref() else {
                return Dereference::NotANamespace {
                    name: (*segment).to_string(),
                    namespace: namepath,
                };
            };
            match self.engine.follow(target, self.settings) {
                Some(map) => current = ModuleNamespace::new(map, self.engine, self.settings),
                None => return Dereference::Unresolved { namespace: namepath },
            }
        }
        Dereference::Found(None)
    }
}
