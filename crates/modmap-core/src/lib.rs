#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Module graph core: pluggable resolvers behind a versioned compatibility
//! layer, a settings-keyed resolution cache, import classification and
//! cached export maps with namespace queries.

pub mod builtins;
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exportmap;
pub mod ignore;
pub mod import_type;
pub mod paths;
pub mod resolve;
pub mod resolver;

pub use cache::{CacheLifetime, TtlCache};
pub use config::{DocStyle, Settings};
pub use context::{Diagnostic, Loc, ModuleContext};
pub use engine::EngineState;
pub use error::Error;
pub use exportmap::{
    DeepLookup, Dereference, ExportEntry, ExportKind, ExportLookup, ExportMap, ExportMapRef,
    ExportName, ModuleNamespace,
};
pub use ignore::CompiledPatterns;
pub use import_type::{import_type, import_type_with, ImportType};
pub use resolve::{CaseCheckOptions, Resolution, ResolveError};
pub use resolver::{
    ResolvedModule, Resolver, ResolverError, ResolverModule, ResolverRegistry, ResolverSetting,
};

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
