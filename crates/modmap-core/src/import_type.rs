//! Import-type classification.
//!
//! Combines the lexical shape of a specifier with where it resolved to,
//! relative to the importing file's package root. The checks run in a
//! fixed order and the first match wins.

use crate::builtins::is_node_builtin;
use crate::config::Settings;
use crate::context::ModuleContext;
use crate::engine::EngineState;
use crate::ignore::CompiledPatterns;
use crate::paths::{canonical, is_absolute_specifier, is_within, normalize};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an import points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    Absolute,
    Builtin,
    Internal,
    External,
    Parent,
    Index,
    Sibling,
    Mapped,
    Unknown,
}

impl ImportType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::Builtin => "builtin",
            Self::Internal => "internal",
            Self::External => "external",
            Self::Parent => "parent",
            Self::Index => "index",
            Self::Sibling => "sibling",
            Self::Mapped => "mapped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const INDEX_NAMES: &[&str] = &[".", "./", "./index", "./index.js"];

/// Package name part of a specifier: `@scope/pkg/x` -> `@scope/pkg`, `pkg/x` -> `pkg`.
#[must_use]
pub fn base_module(name: &str) -> &str {
    let end = if is_scoped(name) {
        name.match_indices('/').nth(1).map_or(name.len(), |(i, _)| i)
    } else {
        name.find('/').unwrap_or(name.len())
    };
    &name[..end]
}

fn starts_with_word_char(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `^\w`: looks like a package name.
fn is_module(name: &str) -> bool {
    starts_with_word_char(name)
}

/// A package name with no subpath.
fn is_module_main(name: &str) -> bool {
    starts_with_word_char(name) && !name.contains('/')
}

/// `@scope/name`, optionally followed by a subpath.
#[must_use]
pub fn is_scoped(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('@') else {
        return false;
    };
    let scope_len = rest.find('/').unwrap_or(rest.len());
    match scope_len {
        0 => false,
        // a one-char scope needs a name after the slash
        1 => rest[1..]
            .strip_prefix('/')
            .and_then(|tail| tail.chars().next())
            .is_some_and(|c| c != '/'),
        _ => true,
    }
}

/// `@scope/name` with no subpath.
#[must_use]
pub fn is_scoped_main(name: &str) -> bool {
    is_scoped(name)
        && match name.find('/') {
            None => true,
            Some(i) => i + 1 < name.len() && !name[i + 1..].contains('/'),
        }
}

fn is_relative_to_parent(name: &str) -> bool {
    name == ".." || name.starts_with("../") || name.starts_with("..\\")
}

fn is_relative_to_sibling(name: &str) -> bool {
    name.starts_with("./") || name.starts_with(".\\")
}

fn is_builtin(name: &str, resolved: Option<&Path>, settings: &Settings) -> bool {
    if resolved.is_some() || name.is_empty() {
        return false;
    }
    let base = base_module(name);
    is_node_builtin(name) || is_node_builtin(base) || settings.is_core_module(base)
}

fn is_external_path(resolved: Option<&Path>, package_root: &Path, settings: &Settings) -> bool {
    let Some(path) = resolved else {
        return false;
    };
    if !is_within(package_root, path) {
        return true;
    }
    settings
        .external_module_folders
        .iter()
        .any(|folder| is_within(&normalize(&package_root.join(folder)), path))
}

fn is_internal_path(resolved: Option<&Path>, package_root: &Path) -> bool {
    resolved.is_some_and(|path| is_within(package_root, path))
}

/// Classify `name` given where it resolved to (`None` for misses and
/// built-ins) and the importing file's package root.
#[must_use]
pub fn import_type(
    name: &str,
    resolved: Option<&Path>,
    package_root: &Path,
    settings: &Settings,
) -> ImportType {
    let patterns = CompiledPatterns::new(settings);
    import_type_with(name, resolved, package_root, settings, &patterns)
}

/// [`import_type`] with `internal-regex` already compiled.
#[must_use]
pub fn import_type_with(
    name: &str,
    resolved: Option<&Path>,
    package_root: &Path,
    settings: &Settings,
    patterns: &CompiledPatterns,
) -> ImportType {
    if patterns.is_internal(name) {
        ImportType::Internal
    } else if is_absolute_specifier(name) {
        ImportType::Absolute
    } else if is_builtin(name, resolved, settings) {
        ImportType::Builtin
    } else if name.starts_with('#') {
        ImportType::Mapped
    } else if is_relative_to_parent(name) {
        ImportType::Parent
    } else if INDEX_NAMES.contains(&name) {
        ImportType::Index
    } else if is_relative_to_sibling(name) {
        ImportType::Sibling
    } else if is_external_path(resolved, package_root, settings) {
        ImportType::External
    } else if is_internal_path(resolved, package_root) {
        ImportType::Internal
    } else if is_module(name) || is_scoped(name) {
        ImportType::External
    } else {
        ImportType::Unknown
    }
}

/// Whether `name` looks like a package and classifies as external.
#[must_use]
pub fn is_external_module(
    name: &str,
    resolved: Option<&Path>,
    package_root: &Path,
    settings: &Settings,
) -> bool {
    (is_module(name) || is_scoped(name))
        && import_type(name, resolved, package_root, settings) == ImportType::External
}

/// Like [`is_external_module`] but only for package names without a subpath.
#[must_use]
pub fn is_external_module_main(
    name: &str,
    resolved: Option<&Path>,
    package_root: &Path,
    settings: &Settings,
) -> bool {
    is_module_main(name)
        && import_type(name, resolved, package_root, settings) == ImportType::External
}

impl EngineState {
    /// Classify `name` as imported from the file linted by `ctx`.
    pub fn classify(&self, name: &str, ctx: &ModuleContext) -> ImportType {
        let resolved = self.resolve(name, ctx).path.map(|path| canonical(&path));
        let root = self.context_package_root(ctx);
        let patterns = self.patterns(ctx.settings());
        import_type_with(name, resolved.as_deref(), &root, ctx.settings(), &patterns)
    }

    /// Package root of the file linted by `ctx`, or its working directory,
    /// with symlinks resolved.
    pub fn context_package_root(&self, ctx: &ModuleContext) -> PathBuf {
        let root = ctx
            .filename()
            .parent()
            .and_then(|dir| self.package_root_of(dir))
            .unwrap_or_else(|| ctx.cwd().to_path_buf());
        canonical(&root)
    }
}
