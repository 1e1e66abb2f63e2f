//! Resolution engine: built-in short-circuits, the settings-keyed
//! resolution cache and the resolver fallback loop.

mod case;

pub use case::{case_sensitive_fs, exists_with_case, CaseCheckOptions};

use crate::builtins::is_node_builtin;
use crate::config::Settings;
use crate::context::ModuleContext;
use crate::engine::EngineState;
use crate::paths::{is_absolute_specifier, normalize};
use crate::resolver::{ResolvedModule, ResolverError};
use modmap_util::hash::Fingerprint;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Prefix of every resolution diagnostic.
pub const RESOLVE_ERROR_PREFIX: &str = "Resolve error: ";

/// Errors that stop resolution before any resolver runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// A resolution outcome and the resolver that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub module: ResolvedModule,
    /// Name of the resolver that found the module. `None` for built-ins
    /// and misses.
    pub resolved_by: Option<String>,
}

impl Resolution {
    fn builtin() -> Self {
        Self {
            module: ResolvedModule::builtin(),
            resolved_by: None,
        }
    }
}

/// Cache key of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    dir: PathBuf,
    settings: Fingerprint,
    specifier: String,
}

impl EngineState {
    /// Resolve `specifier` from the file being linted by `ctx`.
    ///
    /// Failures are reported to `ctx` as `Resolve error: <message>`, at most
    /// once per context and settings. A setup failure yields "not found".
    pub fn resolve(&self, specifier: &str, ctx: &ModuleContext) -> ResolvedModule {
        let fingerprint = self.fingerprints(ctx.settings()).resolution;
        match self.resolve_in(specifier, ctx.filename(), ctx.settings(), ctx.cwd()) {
            Ok(resolution) => {
                if let Some(error) = &resolution.module.error {
                    self.report_once(ctx, fingerprint, format!("{RESOLVE_ERROR_PREFIX}{error}"));
                }
                resolution.module
            }
            Err(err) => {
                tracing::warn!(specifier, error = %err, "resolver setup failed");
                self.report_once(ctx, fingerprint, format!("{RESOLVE_ERROR_PREFIX}{err}"));
                ResolvedModule::failed(err.to_string())
            }
        }
    }

    /// Resolve without reporting, using the process working directory.
    pub fn resolve_relative(
        &self,
        specifier: &str,
        source_file: &Path,
        settings: &Arc<Settings>,
    ) -> Result<Resolution, ResolveError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        self.resolve_in(specifier, source_file, settings, &cwd)
    }

    pub(crate) fn resolve_in(
        &self,
        specifier: &str,
        source_file: &Path,
        settings: &Arc<Settings>,
        cwd: &Path,
    ) -> Result<Resolution, ResolveError> {
        if is_node_builtin(specifier) || settings.is_core_module(specifier) {
            return Ok(Resolution::builtin());
        }

        let fingerprint = self.fingerprints(settings).resolution;
        let dir = source_file
            .parent()
            .map_or_else(|| PathBuf::from("/"), normalize);
        let key = ResolutionKey {
            dir,
            settings: fingerprint,
            specifier: specifier.to_string(),
        };
        let lifetime = settings.cache.lifetime;

        if let Some(hit) = self.resolutions.get(&key, lifetime) {
            tracing::debug!(specifier, from = %source_file.display(), "resolution cache hit");
            return Ok(hit);
        }

        let base_dir = source_file
            .parent()
            .and_then(|dir| self.package_root_of(dir))
            .unwrap_or_else(|| cwd.to_path_buf());
        let records = self.resolver_sequence(settings, fingerprint, &base_dir)?;

        let mut first_error: Option<String> = None;
        let mut outcome = Resolution {
            module: ResolvedModule::not_found(),
            resolved_by: None,
        };
        for record in records.iter() {
            match record.resolve_one(specifier, source_file, cwd) {
                Ok(module) if module.found => {
                    outcome = Resolution {
                        module: ResolvedModule {
                            error: None,
                            ..module
                        },
                        resolved_by: Some(record.name.clone()),
                    };
                    break;
                }
                Ok(_) => {
                    tracing::debug!(specifier, resolver = %record.name, "not found, trying next resolver");
                }
                Err(err) => {
                    tracing::warn!(specifier, resolver = %record.name, error = %err, "resolver failed");
                    first_error.get_or_insert_with(|| err.to_string());
                }
            }
        }
        outcome.module.error = first_error;

        Ok(self.resolutions.set(key, outcome))
    }

    /// Resolved path of `specifier`, or `None` for built-ins and misses.
    pub fn resolved_path(&self, specifier: &str, ctx: &ModuleContext) -> Option<PathBuf> {
        if is_absolute_specifier(specifier) && Path::new(specifier).is_file() {
            return Some(PathBuf::from(specifier));
        }
        self.resolve(specifier, ctx).path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLifetime;
    use crate::resolver::{
        FnResolver, ImportLookup, ResolverModule, ResolverRegistry,
    };
    use serde_json::{json, Value};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixed(name: &str, path: &'static str) -> ResolverModule {
        ResolverModule::v3(FnResolver::new(name, move |_: &str, _: &Path| {
            Ok(ResolvedModule::found(path))
        }))
    }

    #[test]
    fn test_builtins_short_circuit() {
        // no resolver registered at all
        let engine = EngineState::with_registry(ResolverRegistry::new());
        let settings = Arc::new(Settings::default().with_core_modules(["electron"]));
        let ctx = ModuleContext::new("/repo/src/a.js", settings);

        assert!(engine.resolve("fs", &ctx).is_builtin());
        assert!(engine.resolve("node:fs", &ctx).is_builtin());
        assert!(engine.resolve("electron", &ctx).is_builtin());
        assert!(ctx.diagnostics().is_empty());
        assert!(engine.resolutions.is_empty());
    }

    #[test]
    fn test_node_resolution_end_to_end() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("package.json"), "{}");
        write(&dir.path().join("src/a.js"), "export const a = 1;");
        let engine = EngineState::new();
        let ctx = ModuleContext::new(
            dir.path().join("src/index.js"),
            Arc::new(Settings::default()),
        );

        let resolved = engine.resolve("./a", &ctx);
        assert!(resolved.found);
        assert_eq!(
            resolved.path,
            Some(crate::paths::canonical(&dir.path().join("src/a.js")))
        );
        assert!(!engine.resolve("./nope", &ctx).found);
    }

    #[test]
    fn test_fallback_to_second_resolver() {
        let registry = ResolverRegistry::new();
        registry.register(
            "a",
            ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer)),
        );
        registry.register("b", fixed("b", "/lib/b.js"));
        let engine = EngineState::with_registry(registry);
        let ctx = ModuleContext::new(
            "/repo/src/index.js",
            Arc::new(Settings::default().with_resolver(json!(["a", "b"]))),
        );

        let resolved = engine.resolve("s", &ctx);
        assert_eq!(resolved.path, Some(PathBuf::from("/lib/b.js")));
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_throwing_resolver_reports_once_and_falls_through() {
        let registry = ResolverRegistry::new();
        registry.register(
            "a",
            ResolverModule::v1(|_: &str, _: &Path, _: &Value| {
                Err(ResolverError::failed("kaboom"))
            }),
        );
        registry.register("b", fixed("b", "/lib/b.js"));
        let engine = EngineState::with_registry(registry);
        let settings = Arc::new(Settings::default().with_resolver(json!(["a", "b"])));
        let ctx = ModuleContext::new("/repo/src/index.js", settings.clone());

        let resolved = engine.resolve("s", &ctx);
        assert_eq!(resolved.path, Some(PathBuf::from("/lib/b.js")));
        // a second lookup in the same context stays quiet
        engine.resolve("t", &ctx);

        let diagnostics = ctx.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Resolve error: kaboom");
        assert_eq!(diagnostics[0].loc, crate::context::Loc::FILE_START);

        // a fresh context hears about it once too, even from the cache
        let other = ModuleContext::new("/repo/src/other.js", settings);
        engine.resolve("s", &other);
        assert_eq!(other.diagnostics().len(), 1);
    }

    #[test]
    fn test_unknown_resolver_reports_setup_error() {
        let engine = EngineState::with_registry(ResolverRegistry::new());
        let ctx = ModuleContext::new(
            "/repo/src/index.js",
            Arc::new(Settings::default().with_resolver("missing")),
        );

        let resolved = engine.resolve("./a", &ctx);
        assert!(!resolved.found);
        engine.resolve("./b", &ctx);
        assert_eq!(
            ctx.diagnostics(),
            vec![crate::context::Diagnostic::at_file_start(
                "Resolve error: unable to load resolver \"missing\"."
            )]
        );
    }

    #[test]
    fn test_negative_results_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = ResolverRegistry::new();
        registry.register(
            "counting",
            ResolverModule::v1(move |_: &str, _: &Path, _: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ImportLookup::Defer)
            }),
        );
        let engine = EngineState::with_registry(registry);
        let settings = Arc::new(Settings::default().with_resolver("counting"));

        let src = Path::new("/repo/src/index.js");
        let first = engine.resolve_relative("x", src, &settings).unwrap();
        let second = engine.resolve_relative("x", src, &settings).unwrap();
        assert!(!first.module.found);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // same directory shares the entry
        engine
            .resolve_relative("x", Path::new("/repo/src/other.js"), &settings)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_lifetime_disables_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = ResolverRegistry::new();
        registry.register(
            "counting",
            ResolverModule::v1(move |_: &str, _: &Path, _: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ImportLookup::Defer)
            }),
        );
        let engine = EngineState::with_registry(registry);
        let settings = Arc::new(
            Settings::default()
                .with_resolver("counting")
                .with_cache_lifetime(CacheLifetime::Seconds(0.0)),
        );

        let src = Path::new("/repo/src/index.js");
        engine.resolve_relative("x", src, &settings).unwrap();
        engine.resolve_relative("x", src, &settings).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_settings_keep_separate_entries() {
        let registry = ResolverRegistry::new();
        registry.register("one", fixed("one", "/one.js"));
        registry.register("two", fixed("two", "/two.js"));
        let engine = EngineState::with_registry(registry);
        let src = Path::new("/repo/src/index.js");

        let one = Arc::new(Settings::default().with_resolver("one"));
        let two = Arc::new(Settings::default().with_resolver("two"));
        let r1 = engine.resolve_relative("x", src, &one).unwrap();
        let r2 = engine.resolve_relative("x", src, &two).unwrap();

        assert_eq!(r1.resolved_by.as_deref(), Some("one"));
        assert_eq!(r2.module.path, Some(PathBuf::from("/two.js")));
    }

    #[test]
    fn test_v2_resolver_gets_context_cwd() {
        let registry = ResolverRegistry::new();
        registry.register(
            "cwd-echo",
            ResolverModule::v2(
                |_: &str, _: &Path, _: &Value, opts: &crate::resolver::ResolveOptions| {
                    Ok(ResolvedModule::found(opts.context.cwd.join("echo.js")))
                },
            ),
        );
        let engine = EngineState::with_registry(registry);
        let ctx = ModuleContext::new(
            "/repo/src/index.js",
            Arc::new(Settings::default().with_resolver("cwd-echo")),
        )
        .with_cwd("/work");

        assert_eq!(
            engine.resolve("x", &ctx).path,
            Some(PathBuf::from("/work/echo.js"))
        );
    }

    #[test]
    fn test_legacy_resolver_under_resolver_next_gets_context_cwd() {
        let registry = ResolverRegistry::new();
        registry.register(
            "cwd-echo",
            ResolverModule::v2(
                |_: &str, _: &Path, _: &Value, opts: &crate::resolver::ResolveOptions| {
                    Ok(ResolvedModule::found(opts.context.cwd.join("echo.js")))
                },
            ),
        );
        let engine = EngineState::with_registry(registry);
        let ctx = ModuleContext::new(
            "/repo/src/index.js",
            Arc::new(Settings::default().with_resolver_next("cwd-echo")),
        )
        .with_cwd("/work");

        assert_eq!(
            engine.resolve("x", &ctx).path,
            Some(PathBuf::from("/work/echo.js"))
        );
    }

    #[test]
    fn test_panicking_resolver_reports_once_and_falls_through() {
        let registry = ResolverRegistry::new();
        registry.register(
            "a",
            ResolverModule::v3(FnResolver::new(
                "a",
                |_: &str, _: &Path| -> Result<ResolvedModule, ResolverError> {
                    panic!("resolver exploded")
                },
            )),
        );
        registry.register("b", fixed("b", "/lib/b.js"));
        let engine = EngineState::with_registry(registry);
        let ctx = ModuleContext::new(
            "/repo/src/index.js",
            Arc::new(Settings::default().with_resolver(json!(["a", "b"]))),
        );

        let resolved = engine.resolve("s", &ctx);
        assert_eq!(resolved.path, Some(PathBuf::from("/lib/b.js")));
        assert_eq!(
            ctx.diagnostics(),
            vec![crate::context::Diagnostic::at_file_start(
                "Resolve error: resolver exploded"
            )]
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_relative_uses_process_cwd() {
        let dir = tempdir().unwrap();
        let registry = ResolverRegistry::new();
        registry.register(
            "cwd-echo",
            ResolverModule::v2(
                |_: &str, _: &Path, _: &Value, opts: &crate::resolver::ResolveOptions| {
                    Ok(ResolvedModule::found(opts.context.cwd.join("echo.js")))
                },
            ),
        );
        let engine = EngineState::with_registry(registry);
        let settings = Arc::new(Settings::default().with_resolver("cwd-echo"));

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let resolved = engine.resolve_relative("x", Path::new("/repo/src/index.js"), &settings);
        let cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(resolved.unwrap().module.path, Some(cwd.join("echo.js")));
    }
}
