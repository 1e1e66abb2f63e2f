//! Process-wide engine state.
//!
//! One [`EngineState`] owns every cache the resolver, classifier and export
//! map engine share. Construct it once per run and pass it by reference.

use crate::cache::TtlCache;
use crate::config::Settings;
use crate::context::{ContextId, Diagnostic, ModuleContext};
use crate::exportmap::ExportCache;
use crate::ignore::CompiledPatterns;
use crate::paths::package_root;
use crate::resolve::{ResolutionKey, Resolution};
use crate::resolver::{ResolverError, ResolverRecord, ResolverRegistry};
use modmap_util::hash::Fingerprint;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// Settings hashes computed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsFingerprints {
    /// Covers what module resolution depends on.
    pub resolution: Fingerprint,
    /// Covers what export maps depend on.
    pub exports: Fingerprint,
    /// Covers `ignore` and `internal-regex`.
    pub patterns: Fingerprint,
}

impl SettingsFingerprints {
    fn compute(settings: &Settings) -> Self {
        Self {
            resolution: settings.resolution_fingerprint(),
            exports: settings.export_fingerprint(),
            patterns: settings.pattern_fingerprint(),
        }
    }
}

/// Caches and registries shared by every lookup in a run.
#[derive(Debug)]
pub struct EngineState {
    pub(crate) registry: ResolverRegistry,
    pub(crate) resolutions: TtlCache<ResolutionKey, Resolution>,
    pub(crate) exports: ExportCache,
    pub(crate) case_checks: TtlCache<(PathBuf, bool), bool>,
    pub(crate) case_sensitive_fs: bool,
    sequences: RwLock<FxHashMap<(Fingerprint, PathBuf), Arc<[ResolverRecord]>>>,
    last_settings: Mutex<Option<(Weak<Settings>, SettingsFingerprints)>>,
    errored: Mutex<FxHashSet<(ContextId, Fingerprint)>>,
    package_roots: RwLock<FxHashMap<PathBuf, Option<PathBuf>>>,
    patterns: RwLock<FxHashMap<Fingerprint, Arc<CompiledPatterns>>>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineState {
    /// Engine with the built-in node resolver registered.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ResolverRegistry::with_builtins())
    }

    /// Engine resolving through `registry`.
    #[must_use]
    pub fn with_registry(registry: ResolverRegistry) -> Self {
        Self {
            registry,
            resolutions: TtlCache::new(),
            exports: ExportCache::default(),
            case_checks: TtlCache::new(),
            case_sensitive_fs: crate::resolve::case_sensitive_fs(),
            sequences: RwLock::new(FxHashMap::default()),
            last_settings: Mutex::new(None),
            errored: Mutex::new(FxHashSet::default()),
            package_roots: RwLock::new(FxHashMap::default()),
            patterns: RwLock::new(FxHashMap::default()),
        }
    }

    /// Override filesystem case-sensitivity detection.
    #[must_use]
    pub fn with_case_sensitive_fs(mut self, sensitive: bool) -> Self {
        self.case_sensitive_fs = sensitive;
        self
    }

    /// The resolver registry, for registering custom resolvers.
    #[must_use]
    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Settings hashes, memoized against the last-seen settings instance.
    pub fn fingerprints(&self, settings: &Arc<Settings>) -> SettingsFingerprints {
        let mut last = self.last_settings.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((seen, fps)) = last.as_ref() {
            if Weak::ptr_eq(seen, &Arc::downgrade(settings)) {
                return *fps;
            }
        }
        let fps = SettingsFingerprints::compute(settings);
        *last = Some((Arc::downgrade(settings), fps));
        fps
    }

    /// Compiled `ignore` and `internal-regex` patterns for `settings`.
    pub fn patterns(&self, settings: &Arc<Settings>) -> Arc<CompiledPatterns> {
        let key = self.fingerprints(settings).patterns;
        if let Some(patterns) = self
            .patterns
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return patterns.clone();
        }
        let compiled = Arc::new(CompiledPatterns::new(settings));
        self.patterns
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key)
            .or_insert(compiled)
            .clone()
    }

    /// Whether `path` is skipped by the export map engine.
    pub fn is_ignored(&self, path: &Path, settings: &Arc<Settings>) -> bool {
        self.patterns(settings).is_ignored(path, settings)
    }

    /// Prioritized resolver records for `settings`, loaded once per
    /// (settings, base directory).
    pub(crate) fn resolver_sequence(
        &self,
        settings: &Settings,
        fingerprint: Fingerprint,
        base_dir: &Path,
    ) -> Result<Arc<[ResolverRecord]>, ResolverError> {
        let key = (fingerprint, base_dir.to_path_buf());
        if let Some(records) = self
            .sequences
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(records.clone());
        }

        let records: Arc<[ResolverRecord]> =
            self.registry.load_sequence(settings, base_dir)?.into();
        self.sequences
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, records.clone());
        Ok(records)
    }

    /// Nearest directory at or above `dir` holding a package manifest, memoized.
    pub fn package_root_of(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(root) = self
            .package_roots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(dir)
        {
            return root.clone();
        }
        let root = package_root(dir);
        self.package_roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(dir.to_path_buf(), root.clone());
        root
    }

    /// Report `message` to `ctx` unless something was already reported for
    /// this context and settings. Returns whether it was reported.
    pub(crate) fn report_once(
        &self,
        ctx: &ModuleContext,
        fingerprint: Fingerprint,
        message: impl Into<String>,
    ) -> bool {
        let first = self
            .errored
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((ctx.id(), fingerprint));
        if first {
            ctx.report(Diagnostic::at_file_start(message));
        }
        first
    }

    /// Number of cached export map outcomes.
    #[must_use]
    pub fn export_maps_cached(&self) -> usize {
        self.exports.len()
    }

    /// Number of cached resolutions, fresh or stale.
    #[must_use]
    pub fn resolutions_cached(&self) -> usize {
        self.resolutions.len()
    }

    /// Drop every cache, loaded resolver and reported-failure record.
    pub fn clear(&self) {
        self.resolutions.clear();
        self.exports.clear();
        self.case_checks.clear();
        self.sequences
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.package_roots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.patterns
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.errored
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        *self.last_settings.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
