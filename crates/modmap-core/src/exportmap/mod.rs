//! Export map engine.
//!
//! An [`ExportMap`] is the structural export surface of one module: its own
//! bindings, what it re-exports and from where, and which modules it
//! imports. Maps are built lazily, cached per (file, export settings) and
//! invalidated when the file's mtime changes. Re-export targets are held as
//! [`ExportMapRef`] handles and dereferenced through the cache at query
//! time, so cyclic graphs never own each other.

mod builder;
mod doc;
mod namespace;
mod unambiguous;

pub use builder::ParserKind;
pub use doc::{capture_doc, parse_jsdoc, DocSummary, DocTag};
pub use namespace::{DeepLookup, Dereference, ExportLookup, ModuleNamespace};
pub use unambiguous::is_maybe_module;

use crate::config::Settings;
use crate::context::{Diagnostic, ModuleContext};
use crate::engine::EngineState;
use crate::paths::canonical;
use builder::{parse_source, ParsedModule, RawOrigin};
use indexmap::IndexMap;
use modmap_util::fs::{modified, read_to_string_lossy};
use modmap_util::hash::Fingerprint;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use swc_common::{BytePos, SourceMap};

/// Name under which a binding is exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportName {
    Named(String),
    Default,
}

impl ExportName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Default => "default",
        }
    }
}

impl From<&str> for ExportName {
    fn from(name: &str) -> Self {
        if name == "default" {
            Self::Default
        } else {
            Self::Named(name.to_string())
        }
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ExportName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What an export entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// A binding of this module.
    Value,
    /// Another module's namespace object.
    Namespace,
    /// A binding of another module, looked up there at query time.
    ReExport,
}

/// Handle to another module's export map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExportMapRef {
    pub specifier: String,
    /// `None` when the specifier did not resolve to a file.
    pub path: Option<PathBuf>,
}

/// One exported name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    /// Local binding, or the name in `source` for re-exports.
    pub local: Option<String>,
    pub exported: ExportName,
    pub kind: ExportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ExportMapRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<ExportMapRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<DocSummary>,
}

/// A syntax error found while parsing a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub message: String,
    /// 1-based.
    pub line: usize,
    /// 0-based.
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at(cm: &SourceMap, pos: BytePos, message: impl Into<String>) -> Self {
        let loc = cm.lookup_char_pos(pos);
        Self {
            message: message.into(),
            line: loc.line,
            column: loc.col_display,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

/// How the module was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseGoal {
    Module,
    /// No import/export declarations, only dynamic `import()`.
    Script,
}

/// One import or re-export declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDeclaration {
    pub source: String,
    pub line: usize,
    pub type_only: bool,
    /// Imported names; `default` and `*` for default and namespace imports.
    pub imported: Vec<String>,
    pub dynamic: bool,
}

/// Every declaration importing one resolved module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ImportRecord {
    pub declarations: Vec<ImportDeclaration>,
}

/// The export surface of one module.
#[derive(Debug, Clone, Serialize)]
pub struct ExportMap {
    pub path: PathBuf,
    #[serde(skip)]
    pub mtime: Option<SystemTime>,
    pub entries: IndexMap<String, ExportEntry>,
    /// Targets of `export * from`, without duplicates.
    pub namespace_reexports: Vec<ExportMapRef>,
    pub imports: IndexMap<PathBuf, ImportRecord>,
    pub errors: Vec<ParseError>,
    pub doc: Option<DocSummary>,
    pub parse_goal: ParseGoal,
}

impl ExportMap {
    fn empty(path: &Path, mtime: Option<SystemTime>) -> Self {
        Self {
            path: path.to_path_buf(),
            mtime,
            entries: IndexMap::new(),
            namespace_reexports: Vec::new(),
            imports: IndexMap::new(),
            errors: Vec::new(),
            doc: None,
            parse_goal: ParseGoal::Module,
        }
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.entries.contains_key("default")
    }

    /// Diagnostic for an import of this module by `specifier`, if it had
    /// syntax errors.
    #[must_use]
    pub fn report_errors(&self, specifier: &str) -> Option<Diagnostic> {
        if self.errors.is_empty() {
            return None;
        }
        let details = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Some(Diagnostic::at_file_start(format!(
            "Parse errors in imported module '{specifier}': {details}"
        )))
    }
}

#[derive(Debug, Clone)]
struct CachedExports {
    mtime: SystemTime,
    map: Option<Arc<ExportMap>>,
}

/// Export maps keyed by canonical path and export settings fingerprint.
///
/// Entries never expire by age; each lookup re-checks the file's mtime.
#[derive(Debug, Default)]
pub struct ExportCache {
    entries: RwLock<FxHashMap<(PathBuf, Fingerprint), CachedExports>>,
}

impl ExportCache {
    /// Cached outcome for `path` if it was built from the same mtime.
    /// The inner `None` is a cached "no export map".
    fn get(&self, path: &Path, fingerprint: Fingerprint, mtime: SystemTime) -> Option<Option<Arc<ExportMap>>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let cached = entries.get(&(path.to_path_buf(), fingerprint))?;
        (cached.mtime == mtime).then(|| cached.map.clone())
    }

    fn insert(&self, path: PathBuf, fingerprint: Fingerprint, mtime: SystemTime, map: Option<Arc<ExportMap>>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((path, fingerprint), CachedExports { mtime, map });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Paths being built by the current top-level call.
///
/// Re-entering a path that is still in flight yields no map; the outer
/// frame completes it and later queries find it in the cache.
#[derive(Debug, Default)]
struct ParseChain {
    in_flight: FxHashSet<PathBuf>,
}

impl ParseChain {
    fn enter(&mut self, path: &Path) -> bool {
        self.in_flight.insert(path.to_path_buf())
    }

    fn leave(&mut self, path: &Path) {
        self.in_flight.remove(path);
    }
}

impl EngineState {
    /// Export map of the module `specifier` imported from `ctx`'s file.
    ///
    /// Resolution failures are reported to `ctx`. `None` when the module
    /// does not resolve, is ignored or is not an ES module.
    pub fn export_map(&self, specifier: &str, ctx: &ModuleContext) -> Option<Arc<ExportMap>> {
        let path = self.resolved_path(specifier, ctx)?;
        self.export_map_for(&path, ctx.settings())
    }

    /// Cached export map of the file at `path`.
    pub fn export_map_for(&self, path: &Path, settings: &Arc<Settings>) -> Option<Arc<ExportMap>> {
        let mut chain = ParseChain::default();
        self.export_map_in(path, settings, &mut chain)
    }

    /// Build an export map from `content` without touching the cache.
    ///
    /// Skips the extension, ignore and unambiguous-module checks.
    pub fn parse(&self, path: &Path, content: &str, settings: &Arc<Settings>) -> Option<ExportMap> {
        let mut chain = ParseChain::default();
        chain.enter(path);
        self.build(path, modified(path), content, settings, &mut chain)
    }

    /// Query view over `map`.
    #[must_use]
    pub fn namespace<'a>(&'a self, map: Arc<ExportMap>, settings: &'a Arc<Settings>) -> ModuleNamespace<'a> {
        ModuleNamespace::new(map, self, settings)
    }

    /// Dereference a handle to another module's export map.
    pub fn follow(&self, target: &ExportMapRef, settings: &Arc<Settings>) -> Option<Arc<ExportMap>> {
        self.export_map_for(target.path.as_deref()?, settings)
    }

    fn export_map_in(&self, path: &Path, settings: &Arc<Settings>, chain: &mut ParseChain) -> Option<Arc<ExportMap>> {
        let path = canonical(path);
        let fingerprint = self.fingerprints(settings).exports;
        let Some(mtime) = modified(&path) else {
            tracing::debug!(path = %path.display(), "no export map for missing file");
            return None;
        };

        if let Some(hit) = self.exports.get(&path, fingerprint, mtime) {
            tracing::debug!(path = %path.display(), "export map cache hit");
            return hit;
        }
        if !chain.enter(&path) {
            tracing::debug!(path = %path.display(), "export map already in flight");
            return None;
        }

        let map = self.load(&path, mtime, settings, chain).map(Arc::new);
        chain.leave(&path);
        self.exports.insert(path, fingerprint, mtime, map.clone());
        map
    }

    fn load(&self, path: &Path, mtime: SystemTime, settings: &Arc<Settings>, chain: &mut ParseChain) -> Option<ExportMap> {
        if self.is_ignored(path, settings) {
            tracing::debug!(path = %path.display(), "ignored");
            return None;
        }
        let content = match read_to_string_lossy(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read module");
                return None;
            }
        };
        if !is_maybe_module(&content) {
            tracing::debug!(path = %path.display(), "ignored non-module");
            return None;
        }
        self.build(path, Some(mtime), &content, settings, chain)
    }

    fn build(
        &self,
        path: &Path,
        mtime: Option<SystemTime>,
        content: &str,
        settings: &Arc<Settings>,
        chain: &mut ParseChain,
    ) -> Option<ExportMap> {
        let parsed = parse_source(path, content, settings);
        let mut map = ExportMap::empty(path, mtime);

        if parsed.fatal {
            map.errors = parsed.errors;
            return Some(map);
        }
        if !parsed.has_module_syntax && !parsed.has_dynamic_imports {
            tracing::debug!(path = %path.display(), "no module syntax");
            return None;
        }

        let mut linker = Linker {
            engine: self,
            from: path,
            settings,
            resolved: FxHashMap::default(),
        };
        map.parse_goal = if parsed.has_module_syntax {
            ParseGoal::Module
        } else {
            ParseGoal::Script
        };
        linker.link(&mut map, parsed);

        for target in map.namespace_reexports.clone() {
            if let Some(target_path) = &target.path {
                self.export_map_in(target_path, settings, chain);
            }
        }
        Some(map)
    }
}

/// Turns raw parse output into map entries, resolving each specifier once.
struct Linker<'a> {
    engine: &'a EngineState,
    from: &'a Path,
    settings: &'a Arc<Settings>,
    resolved: FxHashMap<String, Option<PathBuf>>,
}

impl Linker<'_> {
    fn resolve(&mut self, specifier: &str) -> Option<PathBuf> {
        if let Some(hit) = self.resolved.get(specifier) {
            return hit.clone();
        }
        let path = match self
            .engine
            .resolve_relative(specifier, self.from, self.settings)
        {
            Ok(resolution) => resolution.module.path,
            Err(err) => {
                tracing::debug!(specifier, from = %self.from.display(), error = %err, "re-export target unresolved");
                None
            }
        };
        self.resolved.insert(specifier.to_string(), path.clone());
        path
    }

    fn reference(&mut self, specifier: &str) -> ExportMapRef {
        ExportMapRef {
            specifier: specifier.to_string(),
            path: self.resolve(specifier),
        }
    }

    fn link(&mut self, map: &mut ExportMap, parsed: ParsedModule) {
        for raw in parsed.exports {
            let (kind, source, namespace) = match raw.origin {
                RawOrigin::Local => (ExportKind::Value, None, None),
                RawOrigin::LocalNamespace(spec) | RawOrigin::NamespaceReExport(spec) => {
                    (ExportKind::Namespace, None, Some(self.reference(&spec)))
                }
                RawOrigin::ReExport(spec) => (ExportKind::ReExport, Some(self.reference(&spec)), None),
            };
            map.entries.insert(
                raw.exported.as_str().to_string(),
                ExportEntry {
                    local: raw.local,
                    exported: raw.exported,
                    kind,
                    source,
                    namespace,
                    doc: raw.doc,
                },
            );
        }

        for spec in parsed.star_exports {
            let target = self.reference(&spec);
            if !map.namespace_reexports.contains(&target) {
                map.namespace_reexports.push(target);
            }
        }

        for import in parsed.imports {
            let Some(path) = self.resolve(&import.source) else {
                continue;
            };
            map.imports
                .entry(path)
                .or_default()
                .declarations
                .push(ImportDeclaration {
                    source: import.source,
                    line: import.line,
                    type_only: import.type_only,
                    imported: import.imported,
                    dynamic: import.dynamic,
                });
        }

        map.errors = parsed.errors;
        map.doc = parsed.doc;
    }
}
