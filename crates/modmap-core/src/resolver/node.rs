//! Built-in Node-style resolver.
//!
//! Resolution order:
//! 1. Built-in modules resolve without a path.
//! 2. `#name` goes through the nearest manifest's `imports` field.
//! 3. Relative and absolute specifiers probe the file, then `file + ext`,
//!    then the directory (`exports` root, `main`, `index + ext`).
//! 4. Bare specifiers walk up the module directories, honoring `exports`
//!    for package subpaths, then the extra `paths`.

use super::exports::{resolve_exports, resolve_exports_root, resolve_imports_map};
use super::manifest::ManifestCache;
use super::{LegacyResolver, ResolveOptions, ResolvedModule, ResolverError, ResolverModule};
use crate::builtins::is_node_builtin;
use crate::paths::{canonical, is_absolute_specifier, PACKAGE_MANIFEST};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Extensions probed when the options do not name any.
pub const DEFAULT_NODE_EXTENSIONS: &[&str] = &[".mjs", ".js", ".json", ".node"];

/// Name the node resolver is registered under.
pub(crate) const NODE_RESOLVER_NAME: &str = "node";

/// Options accepted by the node resolver, e.g.
/// `{ "node": { "extensions": [".js", ".ts"], "moduleDirectory": ["node_modules", "src"] } }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeResolverOptions {
    pub extensions: Vec<String>,
    pub module_directory: Vec<String>,
    /// Extra directories searched after the module directories.
    pub paths: Vec<PathBuf>,
    /// Active `exports` / `imports` conditions.
    pub condition_names: Vec<String>,
}

impl Default for NodeResolverOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_NODE_EXTENSIONS.iter().map(ToString::to_string).collect(),
            module_directory: vec!["node_modules".to_string()],
            paths: Vec::new(),
            condition_names: vec![
                "node".to_string(),
                "import".to_string(),
                "require".to_string(),
            ],
        }
    }
}

impl NodeResolverOptions {
    /// Read options from a resolver config value. `null` means defaults.
    pub fn from_config(config: &Value) -> Result<Self, ResolverError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(config.clone())
            .map_err(|e| ResolverError::failed(format!("invalid node resolver options: {e}")))
    }
}

/// Node-style resolver (V2 contract).
#[derive(Debug, Default)]
pub struct NodeResolver {
    manifests: ManifestCache,
}

impl NodeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This resolver packaged for the registry.
    #[must_use]
    pub fn module() -> ResolverModule {
        ResolverModule::v2(Self::new()).named(NODE_RESOLVER_NAME)
    }

    /// Resolve `spec` from `source_file` with explicit options.
    #[must_use]
    pub fn resolve_with(
        &self,
        spec: &str,
        source_file: &Path,
        opts: &NodeResolverOptions,
    ) -> ResolvedModule {
        if is_node_builtin(spec) {
            return ResolvedModule::builtin();
        }
        if spec.is_empty() || spec.contains("://") || spec.starts_with("data:") {
            return ResolvedModule::not_found();
        }

        let parent = source_file.parent().unwrap_or_else(|| Path::new("/"));
        let probe = Probe {
            manifests: &self.manifests,
            opts,
        };

        let resolved = if spec.starts_with('#') {
            probe.hash_import(parent, spec)
        } else if is_relative(spec) {
            probe.path(&parent.join(spec))
        } else if is_absolute_specifier(spec) {
            probe.path(Path::new(spec))
        } else {
            probe.bare(parent, spec)
        };

        match resolved {
            Some(path) => ResolvedModule::found(canonical(&path)),
            None => {
                tracing::trace!(spec, from = %source_file.display(), "node resolver: not found");
                ResolvedModule::not_found()
            }
        }
    }
}

impl LegacyResolver for NodeResolver {
    fn resolve(
        &self,
        module_path: &str,
        source_file: &Path,
        config: &Value,
        _options: &ResolveOptions,
    ) -> Result<ResolvedModule, ResolverError> {
        let opts = NodeResolverOptions::from_config(config)?;
        Ok(self.resolve_with(module_path, source_file, &opts))
    }
}

fn is_relative(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

/// Split a bare specifier into package name and subpath.
///
/// `"lodash/fp"` -> `("lodash", Some("fp"))`, `"@scope/pkg"` -> `("@scope/pkg", None)`.
fn split_package(spec: &str) -> (&str, Option<&str>) {
    let name_end = if spec.starts_with('@') {
        spec.match_indices('/').nth(1).map(|(i, _)| i)
    } else {
        spec.find('/')
    };
    match name_end {
        Some(i) => (&spec[..i], Some(&spec[i + 1..])),
        None => (spec, None),
    }
}

struct Probe<'a> {
    manifests: &'a ManifestCache,
    opts: &'a NodeResolverOptions,
}

impl Probe<'_> {
    fn path(&self, base: &Path) -> Option<PathBuf> {
        self.file(base).or_else(|| self.directory(base))
    }

    /// `base` itself, then `base` with each extension appended.
    fn file(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        let raw = base.as_os_str();
        self.opts.extensions.iter().find_map(|ext| {
            let mut candidate = raw.to_os_string();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }

    fn directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }
        if let Some(manifest) = self.manifests.read(&dir.join(PACKAGE_MANIFEST)) {
            if let Some(target) = resolve_exports_root(&manifest, &self.opts.condition_names) {
                // an exports root that does not exist is final
                return self.file(&join_target(dir, &target));
            }
            if let Some(main) = manifest.get("main").and_then(Value::as_str) {
                let main_path = dir.join(main);
                if let Some(found) = self
                    .file(&main_path)
                    .or_else(|| self.index(&main_path))
                {
                    return Some(found);
                }
            }
        }
        self.index(dir)
    }

    fn index(&self, dir: &Path) -> Option<PathBuf> {
        self.file(&dir.join("index"))
    }

    fn hash_import(&self, parent: &Path, spec: &str) -> Option<PathBuf> {
        let (root, manifest) = parent.ancestors().find_map(|dir| {
            self.manifests
                .read(&dir.join(PACKAGE_MANIFEST))
                .map(|m| (dir, m))
        })?;
        let target = resolve_imports_map(&manifest, spec, &self.opts.condition_names)?;
        if target.starts_with("./") {
            self.path(&join_target(root, &target))
        } else {
            self.bare(root, &target)
        }
    }

    fn bare(&self, parent: &Path, spec: &str) -> Option<PathBuf> {
        let (name, subpath) = split_package(spec);

        for dir in parent.ancestors() {
            for module_dir in &self.opts.module_directory {
                let modules = dir.join(module_dir);
                if !modules.is_dir() {
                    continue;
                }
                if let Some(found) = self.in_modules_dir(&modules, name, subpath, spec) {
                    return Some(found);
                }
            }
        }

        self.opts
            .paths
            .iter()
            .find_map(|extra| self.in_modules_dir(extra, name, subpath, spec))
    }

    fn in_modules_dir(
        &self,
        modules: &Path,
        name: &str,
        subpath: Option<&str>,
        spec: &str,
    ) -> Option<PathBuf> {
        let pkg_dir = modules.join(name);
        if let (Some(sub), true) = (subpath, pkg_dir.is_dir()) {
            if let Some(manifest) = self.manifests.read(&pkg_dir.join(PACKAGE_MANIFEST)) {
                if manifest.get("exports").is_some() {
                    let target = resolve_exports(
                        &manifest,
                        Some(&format!("./{sub}")),
                        &self.opts.condition_names,
                    )?;
                    return self.file(&join_target(&pkg_dir, &target));
                }
            }
        }
        self.path(&modules.join(spec))
    }
}

fn join_target(dir: &Path, target: &str) -> PathBuf {
    dir.join(target.trim_start_matches("./"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolve(root: &Path, spec: &str) -> ResolvedModule {
        NodeResolver::new().resolve_with(
            spec,
            &root.join("src/index.js"),
            &NodeResolverOptions::default(),
        )
    }

    fn found_path(root: &Path, spec: &str) -> PathBuf {
        resolve(root, spec)
            .path
            .unwrap_or_else(|| panic!("{spec} should resolve"))
    }

    #[test]
    fn test_builtins_have_no_path() {
        let dir = tempdir().unwrap();
        assert!(resolve(dir.path(), "fs").is_builtin());
        assert!(resolve(dir.path(), "node:path").is_builtin());
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("src/a.js"), "");
        write(&dir.path().join("src/b.min.js"), "");

        assert_eq!(found_path(dir.path(), "./a"), canonical(&dir.path().join("src/a.js")));
        assert_eq!(found_path(dir.path(), "./a.js"), canonical(&dir.path().join("src/a.js")));
        // appended, not replaced
        assert_eq!(
            found_path(dir.path(), "./b.min"),
            canonical(&dir.path().join("src/b.min.js"))
        );
        assert!(!resolve(dir.path(), "./missing").found);
    }

    #[test]
    fn test_directory_index_and_main() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("src/lib/index.js"), "");
        write(&dir.path().join("src/pkg/package.json"), r#"{"main": "entry"}"#);
        write(&dir.path().join("src/pkg/entry.js"), "");

        assert_eq!(
            found_path(dir.path(), "./lib"),
            canonical(&dir.path().join("src/lib/index.js"))
        );
        assert_eq!(
            found_path(dir.path(), "./pkg"),
            canonical(&dir.path().join("src/pkg/entry.js"))
        );
        // src has no index file
        assert!(!resolve(dir.path(), ".").found);
    }

    #[test]
    fn test_bare_package() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/lodash");
        write(&pkg.join("package.json"), r#"{"main": "./lodash.js"}"#);
        write(&pkg.join("lodash.js"), "");
        write(&pkg.join("fp.js"), "");

        assert_eq!(found_path(dir.path(), "lodash"), canonical(&pkg.join("lodash.js")));
        assert_eq!(found_path(dir.path(), "lodash/fp"), canonical(&pkg.join("fp.js")));
        assert!(!resolve(dir.path(), "missing-pkg").found);
    }

    #[test]
    fn test_scoped_package_with_exports() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@scope/ui");
        write(
            &pkg.join("package.json"),
            r#"{"exports": {".": "./dist/index.js", "./button": {"import": "./dist/button.mjs"}}}"#,
        );
        write(&pkg.join("dist/index.js"), "");
        write(&pkg.join("dist/button.mjs"), "");
        write(&pkg.join("hidden.js"), "");

        assert_eq!(
            found_path(dir.path(), "@scope/ui"),
            canonical(&pkg.join("dist/index.js"))
        );
        assert_eq!(
            found_path(dir.path(), "@scope/ui/button"),
            canonical(&pkg.join("dist/button.mjs"))
        );
        // not exported
        assert!(!resolve(dir.path(), "@scope/ui/hidden").found);
    }

    #[test]
    fn test_hash_imports() {
        let dir = tempdir().unwrap();
        write(
            &dir.path().join("package.json"),
            r##"{"imports": {"#utils/*": "./src/utils/*.js"}}"##,
        );
        write(&dir.path().join("src/utils/str.js"), "");

        assert_eq!(
            found_path(dir.path(), "#utils/str"),
            canonical(&dir.path().join("src/utils/str.js"))
        );
        assert!(!resolve(dir.path(), "#nope").found);
    }

    #[test]
    fn test_module_directory_option() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("web_modules/widget.js"), "");

        let opts = NodeResolverOptions::from_config(&serde_json::json!({
            "moduleDirectory": ["web_modules"]
        }))
        .unwrap();
        let resolved =
            NodeResolver::new().resolve_with("widget", &dir.path().join("src/index.js"), &opts);
        assert_eq!(resolved.path, Some(canonical(&dir.path().join("web_modules/widget.js"))));
    }

    #[test]
    fn test_invalid_options_fail() {
        let err = NodeResolverOptions::from_config(&serde_json::json!({ "extensions": 3 }))
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid node resolver options"));
    }

    #[test]
    fn test_split_package() {
        assert_eq!(split_package("lodash"), ("lodash", None));
        assert_eq!(split_package("lodash/fp/map"), ("lodash", Some("fp/map")));
        assert_eq!(split_package("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(split_package("@scope/pkg/sub"), ("@scope/pkg", Some("sub")));
    }
}
