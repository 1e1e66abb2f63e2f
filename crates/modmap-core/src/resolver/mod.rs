//! Resolver compatibility layer.
//!
//! Three generations of resolver contracts are accepted:
//! - V1: [`ResolveImport`], `resolve_import(module_path, source_file, config)`
//! - V2: [`LegacyResolver`], `resolve(module_path, source_file, config, options)`
//! - V3: [`Resolver`], a self-contained object with `name` and `resolve(module_path, source_file)`
//!
//! A loaded [`ResolverModule`] is inspected once and turned into a
//! [`ResolverKind`]; every call afterwards dispatches on that tag.

mod exports;
mod manifest;
mod node;
mod registry;
mod setting;

pub use exports::{resolve_exports, resolve_exports_root, resolve_imports_map};
pub use manifest::ManifestCache;
pub use node::{NodeResolver, NodeResolverOptions, DEFAULT_NODE_EXTENSIONS};
pub use registry::{ResolverRegistry, RESOLVER_PREFIX};
pub use setting::ResolverSetting;
pub(crate) use setting::{normalize_resolvers, EntrySource, ResolverEntry};

use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of resolving a specifier against a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ResolvedModule {
    /// Whether some resolver claimed the specifier.
    pub found: bool,
    /// Resolved file. `None` with `found` means a built-in module.
    pub path: Option<PathBuf>,
    /// Message of a failure that happened along the way, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedModule {
    /// Resolved to a file.
    pub fn found(path: impl Into<PathBuf>) -> Self {
        Self {
            found: true,
            path: Some(path.into()),
            error: None,
        }
    }

    /// A built-in module with no filesystem path.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            found: true,
            path: None,
            error: None,
        }
    }

    /// Nobody could resolve the specifier.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Resolution failed with an error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            found: false,
            path: None,
            error: Some(message.into()),
        }
    }

    /// Whether this names a built-in module.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.found && self.path.is_none()
    }
}

/// Result of a V1 `resolve_import` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLookup {
    /// Not handled here; ask the next resolver.
    Defer,
    /// A built-in module.
    Builtin,
    /// Resolved to a file.
    Path(PathBuf),
}

/// Errors raised while configuring, loading or running resolvers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("invalid resolver config")]
    InvalidConfig,

    #[error("unable to load resolver \"{0}\".")]
    NotFound(String),

    #[error("{0} with invalid interface loaded as resolver")]
    InvalidInterface(String),

    #[error("{0}")]
    Failed(String),
}

impl ResolverError {
    /// A runtime failure inside a resolver.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Whether this is a configuration/loading problem rather than a runtime failure.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Extra arguments handed to V2 resolvers.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub context: ResolveOptionsContext,
}

/// Caller context for V2 resolvers.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptionsContext {
    /// Working directory of the lint run.
    pub cwd: PathBuf,
}

/// V1 contract.
pub trait ResolveImport: Send + Sync {
    fn resolve_import(
        &self,
        module_path: &str,
        source_file: &Path,
        config: &Value,
    ) -> Result<ImportLookup, ResolverError>;
}

impl<F> ResolveImport for F
where
    F: Fn(&str, &Path, &Value) -> Result<ImportLookup, ResolverError> + Send + Sync,
{
    fn resolve_import(
        &self,
        module_path: &str,
        source_file: &Path,
        config: &Value,
    ) -> Result<ImportLookup, ResolverError> {
        self(module_path, source_file, config)
    }
}

/// V2 contract.
pub trait LegacyResolver: Send + Sync {
    fn resolve(
        &self,
        module_path: &str,
        source_file: &Path,
        config: &Value,
        options: &ResolveOptions,
    ) -> Result<ResolvedModule, ResolverError>;
}

impl<F> LegacyResolver for F
where
    F: Fn(&str, &Path, &Value, &ResolveOptions) -> Result<ResolvedModule, ResolverError>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        module_path: &str,
        source_file: &Path,
        config: &Value,
        options: &ResolveOptions,
    ) -> Result<ResolvedModule, ResolverError> {
        self(module_path, source_file, config, options)
    }
}

/// V3 contract: self-contained, no configuration threading.
pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    fn interface_version(&self) -> u32 {
        3
    }

    fn resolve(&self, module_path: &str, source_file: &Path)
        -> Result<ResolvedModule, ResolverError>;
}

/// A V3 resolver built from a closure.
pub struct FnResolver<F> {
    name: String,
    f: F,
}

impl<F> FnResolver<F>
where
    F: Fn(&str, &Path) -> Result<ResolvedModule, ResolverError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Resolver for FnResolver<F>
where
    F: Fn(&str, &Path) -> Result<ResolvedModule, ResolverError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(
        &self,
        module_path: &str,
        source_file: &Path,
    ) -> Result<ResolvedModule, ResolverError> {
        (self.f)(module_path, source_file)
    }
}

/// Duck-typed description of a resolver as found by the registry.
///
/// Any combination of hooks may be present; [`ResolverModule::inspect`]
/// decides which contract it satisfies.
#[derive(Clone, Default)]
pub struct ResolverModule {
    pub name: Option<String>,
    pub interface_version: Option<u32>,
    pub resolve_import: Option<Arc<dyn ResolveImport>>,
    pub resolve: Option<Arc<dyn LegacyResolver>>,
    pub resolver: Option<Arc<dyn Resolver>>,
}

impl fmt::Debug for ResolverModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverModule")
            .field("name", &self.name)
            .field("interface_version", &self.interface_version)
            .field("resolve_import", &self.resolve_import.is_some())
            .field("resolve", &self.resolve.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl ResolverModule {
    /// A V1 module exposing `resolve_import`.
    pub fn v1(resolver: impl ResolveImport + 'static) -> Self {
        Self {
            interface_version: Some(1),
            resolve_import: Some(Arc::new(resolver)),
            ..Self::default()
        }
    }

    /// A V2 module exposing `resolve`.
    pub fn v2(resolver: impl LegacyResolver + 'static) -> Self {
        Self {
            interface_version: Some(2),
            resolve: Some(Arc::new(resolver)),
            ..Self::default()
        }
    }

    /// A V3 resolver object.
    pub fn v3(resolver: impl Resolver + 'static) -> Self {
        Self {
            name: Some(resolver.name().to_string()),
            interface_version: Some(resolver.interface_version()),
            resolver: Some(Arc::new(resolver)),
            ..Self::default()
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Decide which contract this module satisfies.
    pub fn inspect(&self, name: &str) -> Result<ResolverKind, ResolverError> {
        let invalid = || ResolverError::InvalidInterface(name.to_string());
        match self.interface_version {
            Some(3) => {
                let resolver = self.resolver.clone().ok_or_else(invalid)?;
                if resolver.interface_version() != 3 {
                    return Err(invalid());
                }
                Ok(ResolverKind::Modern3(resolver))
            }
            Some(2) => self
                .resolve
                .clone()
                .map(ResolverKind::Legacy2)
                .ok_or_else(invalid),
            _ => self
                .resolve_import
                .clone()
                .map(ResolverKind::Legacy1)
                .ok_or_else(invalid),
        }
    }

    /// Identity string used when fingerprinting settings that hold instances.
    #[must_use]
    pub fn identity(&self) -> String {
        fn addr<T: ?Sized>(hook: Option<&Arc<T>>) -> usize {
            hook.map_or(0, |a| Arc::as_ptr(a).cast::<()>() as usize)
        }
        format!(
            "{}@{:x}:{:x}:{:x}",
            self.name.as_deref().unwrap_or("anonymous"),
            addr(self.resolve_import.as_ref()),
            addr(self.resolve.as_ref()),
            addr(self.resolver.as_ref()),
        )
    }
}

/// The contract a loaded resolver satisfies.
#[derive(Clone)]
pub enum ResolverKind {
    Legacy1(Arc<dyn ResolveImport>),
    Legacy2(Arc<dyn LegacyResolver>),
    Modern3(Arc<dyn Resolver>),
}

impl fmt::Debug for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy1(_) => "Legacy1",
            Self::Legacy2(_) => "Legacy2",
            Self::Modern3(_) => "Modern3",
        })
    }
}

impl ResolverKind {
    /// Interface version number of this contract.
    #[must_use]
    pub fn version(&self) -> u32 {
        match self {
            Self::Legacy1(_) => 1,
            Self::Legacy2(_) => 2,
            Self::Modern3(_) => 3,
        }
    }

    /// Run the resolver. A panic inside it becomes [`ResolverError::Failed`].
    fn dispatch(
        &self,
        module_path: &str,
        source_file: &Path,
        options: &Value,
        cwd: &Path,
    ) -> Result<ResolvedModule, ResolverError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch_inner(module_path, source_file, options, cwd)
        }))
        .unwrap_or_else(|payload| Err(ResolverError::Failed(panic_message(payload.as_ref()))))
    }

    fn dispatch_inner(
        &self,
        module_path: &str,
        source_file: &Path,
        options: &Value,
        cwd: &Path,
    ) -> Result<ResolvedModule, ResolverError> {
        match self {
            Self::Legacy1(r) => Ok(
                match r.resolve_import(module_path, source_file, options)? {
                    ImportLookup::Defer => ResolvedModule::not_found(),
                    ImportLookup::Builtin => ResolvedModule::builtin(),
                    ImportLookup::Path(path) => ResolvedModule::found(path),
                },
            ),
            Self::Legacy2(r) => {
                let extra = ResolveOptions {
                    context: ResolveOptionsContext {
                        cwd: cwd.to_path_buf(),
                    },
                };
                r.resolve(module_path, source_file, options, &extra)
            }
            Self::Modern3(r) => r.resolve(module_path, source_file),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "resolver panicked".to_string())
}

/// One entry of the prioritized resolver sequence.
#[derive(Debug, Clone)]
pub struct ResolverRecord {
    pub name: String,
    pub enabled: bool,
    pub options: Value,
    pub kind: ResolverKind,
}

impl ResolverRecord {
    /// Run this resolver once.
    pub fn resolve_one(
        &self,
        specifier: &str,
        source_file: &Path,
        cwd: &Path,
    ) -> Result<ResolvedModule, ResolverError> {
        self.kind
            .dispatch(specifier, source_file, &self.options, cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> PathBuf {
        PathBuf::from("/project/src/index.js")
    }

    #[test]
    fn test_inspect_v1() {
        let module = ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer));
        assert_eq!(module.inspect("a").unwrap().version(), 1);
    }

    #[test]
    fn test_inspect_v2() {
        let module = ResolverModule::v2(
            |_: &str, _: &Path, _: &Value, _: &ResolveOptions| Ok(ResolvedModule::not_found()),
        );
        assert_eq!(module.inspect("a").unwrap().version(), 2);
    }

    #[test]
    fn test_inspect_v3() {
        let module = ResolverModule::v3(FnResolver::new("fixed", |_: &str, _: &Path| {
            Ok(ResolvedModule::found("/x.js"))
        }));
        assert_eq!(module.name.as_deref(), Some("fixed"));
        assert_eq!(module.inspect("fixed").unwrap().version(), 3);
    }

    #[test]
    fn test_inspect_rejects_empty_module() {
        let err = ResolverModule::default().inspect("broken").unwrap_err();
        assert_eq!(err, ResolverError::InvalidInterface("broken".to_string()));
        assert_eq!(
            err.to_string(),
            "broken with invalid interface loaded as resolver"
        );
    }

    #[test]
    fn test_inspect_rejects_mismatched_version() {
        // claims version 2 but only carries a V1 hook
        let mut module =
            ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer));
        module.interface_version = Some(2);
        assert!(module.inspect("odd").is_err());
    }

    #[test]
    fn test_v1_lookup_mapping() {
        let module = ResolverModule::v1(|spec: &str, _: &Path, _: &Value| {
            Ok(match spec {
                "fs" => ImportLookup::Builtin,
                "./a" => ImportLookup::Path(PathBuf::from("/project/src/a.js")),
                _ => ImportLookup::Defer,
            })
        });
        let record = ResolverRecord {
            name: "v1".to_string(),
            enabled: true,
            options: Value::Null,
            kind: module.inspect("v1").unwrap(),
        };
        let cwd = PathBuf::from("/project");

        assert!(record.resolve_one("fs", &src(), &cwd).unwrap().is_builtin());
        assert_eq!(
            record.resolve_one("./a", &src(), &cwd).unwrap().path,
            Some(PathBuf::from("/project/src/a.js"))
        );
        assert!(!record.resolve_one("nope", &src(), &cwd).unwrap().found);
    }

    #[test]
    fn test_v2_receives_options_and_cwd() {
        let module = ResolverModule::v2(
            |_: &str, _: &Path, config: &Value, options: &ResolveOptions| {
                let root = config["root"].as_str().unwrap_or_default();
                assert_eq!(options.context.cwd, PathBuf::from("/project"));
                Ok(ResolvedModule::found(format!("{root}/x.js")))
            },
        );
        let record = ResolverRecord {
            name: "v2".to_string(),
            enabled: true,
            options: serde_json::json!({ "root": "/lib" }),
            kind: module.inspect("v2").unwrap(),
        };

        let resolved = record
            .resolve_one("x", &src(), Path::new("/project"))
            .unwrap();
        assert_eq!(resolved.path, Some(PathBuf::from("/lib/x.js")));
    }

    #[test]
    fn test_panicking_resolver_becomes_failure() {
        let module = ResolverModule::v3(FnResolver::new(
            "explodes",
            |spec: &str, _: &Path| -> Result<ResolvedModule, ResolverError> {
                panic!("cannot handle {spec}")
            },
        ));
        let record = ResolverRecord {
            name: "explodes".to_string(),
            enabled: true,
            options: Value::Null,
            kind: module.inspect("explodes").unwrap(),
        };

        let err = record
            .resolve_one("x", &src(), Path::new("/"))
            .unwrap_err();
        assert_eq!(err, ResolverError::failed("cannot handle x"));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42_u8), "resolver panicked");
    }

    #[test]
    fn test_identity_distinguishes_instances() {
        let a = ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer));
        let b = ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer));
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.identity(), a.clone().identity());
    }
}
