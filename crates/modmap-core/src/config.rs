//! Settings consumed by the resolver, classifier and export map engine.
//!
//! The JSON shape mirrors the `import/*` settings bag of the lint host, with
//! the `import/` prefix dropped and keys in kebab-case.

use crate::cache::CacheLifetime;
use crate::error::Error;
use crate::resolver::ResolverSetting;
use indexmap::IndexMap;
use modmap_util::hash::{Fingerprint, Fingerprinter};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for when no explicit settings file is given.
pub const SETTINGS_FILE_NAME: &str = ".modmaprc.json";

/// Extensions treated as parseable when `extensions` is not configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".js"];

/// Folder names that hold third-party packages by default.
pub const DEFAULT_EXTERNAL_MODULE_FOLDERS: &[&str] = &["node_modules"];

/// Settings for one lint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Extensions whose files get an export map.
    pub extensions: Vec<String>,
    /// Alternate parser name -> extensions it owns.
    pub parsers: IndexMap<String, Vec<String>>,
    /// Specifiers matching this regex classify as `internal`.
    pub internal_regex: Option<String>,
    /// Folders whose contents classify as `external`.
    pub external_module_folders: Vec<String>,
    /// Extra module names treated as built-ins.
    pub core_modules: Vec<String>,
    /// Legacy resolver configuration (V1/V2/V3, any accepted shape).
    pub resolver: Option<ResolverSetting>,
    /// Ordered list of interface-version-3 resolvers.
    pub resolver_next: Vec<ResolverSetting>,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Paths matching any of these regexes never get an export map.
    pub ignore: Vec<String>,
    /// Comment styles searched for export documentation.
    pub docstyle: Vec<DocStyle>,
}

/// Cache section of the settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheSettings {
    /// How long resolution results stay fresh.
    pub lifetime: CacheLifetime,
}

/// Documentation comment style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStyle {
    /// `/** ... */` block comments with `@tag` lines.
    Jsdoc,
    /// `// Public: ...` line comments.
    Tomdoc,
}

impl DocStyle {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jsdoc => "jsdoc",
            Self::Tomdoc => "tomdoc",
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            parsers: IndexMap::new(),
            internal_regex: None,
            external_module_folders: DEFAULT_EXTERNAL_MODULE_FOLDERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            core_modules: Vec::new(),
            resolver: None,
            resolver_next: Vec::new(),
            cache: CacheSettings::default(),
            ignore: Vec::new(),
            docstyle: vec![DocStyle::Jsdoc],
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the parseable extensions.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Map an alternate parser to the extensions it owns.
    #[must_use]
    pub fn with_parser<I, S>(mut self, parser: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parsers.insert(
            parser.into(),
            extensions.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Set the legacy resolver configuration.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl Into<ResolverSetting>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }

    /// Append a version-3 resolver.
    #[must_use]
    pub fn with_resolver_next(mut self, resolver: impl Into<ResolverSetting>) -> Self {
        self.resolver_next.push(resolver.into());
        self
    }

    /// Set the cache lifetime.
    #[must_use]
    pub fn with_cache_lifetime(mut self, lifetime: CacheLifetime) -> Self {
        self.cache.lifetime = lifetime;
        self
    }

    /// Add extra core module names.
    #[must_use]
    pub fn with_core_modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core_modules.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the internal-module regex.
    #[must_use]
    pub fn with_internal_regex(mut self, pattern: impl Into<String>) -> Self {
        self.internal_regex = Some(pattern.into());
        self
    }

    /// All extensions that get an export map: `extensions` plus every parser's.
    #[must_use]
    pub fn file_extensions(&self) -> FxHashSet<&str> {
        self.extensions
            .iter()
            .chain(self.parsers.values().flatten())
            .map(String::as_str)
            .collect()
    }

    /// Name of the alternate parser that owns `path`'s extension, if any.
    #[must_use]
    pub fn parser_for(&self, path: &Path) -> Option<&str> {
        let ext = extension_of(path)?;
        self.parsers
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| *e == ext))
            .map(|(name, _)| name.as_str())
    }

    /// Whether `name` was registered as an additional core module.
    #[must_use]
    pub fn is_core_module(&self, name: &str) -> bool {
        self.core_modules.iter().any(|m| m == name)
    }

    /// Fingerprint of the fields that influence module resolution:
    /// `resolver`, `resolver-next`, `core-modules`, `extensions` and
    /// `cache.lifetime`.
    #[must_use]
    pub fn resolution_fingerprint(&self) -> Fingerprint {
        let mut fp = Fingerprinter::new("modmap/resolution");
        self.mix_resolution(&mut fp);
        fp.finish()
    }

    /// Fingerprint of the fields that influence export maps: everything in
    /// [`Settings::resolution_fingerprint`] plus `parsers`, `ignore` and
    /// `docstyle`.
    #[must_use]
    pub fn export_fingerprint(&self) -> Fingerprint {
        let mut fp = Fingerprinter::new("modmap/exports");
        self.mix_resolution(&mut fp);
        for (parser, exts) in &self.parsers {
            fp.str("parser", parser).list("parser-extensions", exts);
        }
        fp.list("ignore", &self.ignore);
        fp.list("docstyle", self.docstyle.iter().map(DocStyle::as_str));
        fp.finish()
    }

    /// Fingerprint of `ignore` and `internal-regex`.
    #[must_use]
    pub fn pattern_fingerprint(&self) -> Fingerprint {
        let mut fp = Fingerprinter::new("modmap/patterns");
        fp.list("ignore", &self.ignore);
        fp.str("internal-regex", self.internal_regex.as_deref().unwrap_or(""));
        fp.finish()
    }

    fn mix_resolution(&self, fp: &mut Fingerprinter) {
        match &self.resolver {
            Some(setting) => fp.str("resolver", &setting.fingerprint_text()),
            None => fp.str("resolver", ""),
        };
        fp.list(
            "resolver-next",
            self.resolver_next.iter().map(ResolverSetting::fingerprint_text),
        );
        fp.list("core-modules", &self.core_modules);
        fp.list("extensions", &self.extensions);
        fp.str("cache-lifetime", &self.cache.lifetime.to_string());
    }
}

/// Extension of `path` including the leading dot, e.g. `".js"`.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
}

/// Find the settings file by walking up from `cwd`.
#[must_use]
pub fn find_settings_file(cwd: &Path) -> Option<PathBuf> {
    cwd.ancestors()
        .map(|dir| dir.join(SETTINGS_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.extensions, vec![".js"]);
        assert_eq!(settings.external_module_folders, vec!["node_modules"]);
        assert_eq!(settings.docstyle, vec![DocStyle::Jsdoc]);
        assert_eq!(settings.cache.lifetime, CacheLifetime::default());
    }

    #[test]
    fn test_parse_kebab_case_json() {
        let settings = Settings::from_json_str(
            r#"{
                "extensions": [".js", ".jsx"],
                "parsers": { "typescript": [".ts", ".tsx"] },
                "internal-regex": "^@app/",
                "core-modules": ["electron"],
                "resolver": { "node": { "extensions": [".js"] } },
                "cache": { "lifetime": "Infinity" },
                "docstyle": ["jsdoc", "tomdoc"]
            }"#,
        )
        .unwrap();

        assert_eq!(settings.extensions, vec![".js", ".jsx"]);
        assert_eq!(settings.internal_regex.as_deref(), Some("^@app/"));
        assert!(settings.is_core_module("electron"));
        assert_eq!(settings.cache.lifetime, CacheLifetime::Infinite);
        assert_eq!(settings.docstyle.len(), 2);
        assert!(settings.resolver.is_some());
        // untouched fields keep their defaults
        assert_eq!(settings.external_module_folders, vec!["node_modules"]);
    }

    #[test]
    fn test_file_extensions_include_parsers() {
        let settings = Settings::default().with_parser("typescript", [".ts", ".tsx"]);
        let exts = settings.file_extensions();
        assert!(exts.contains(".js"));
        assert!(exts.contains(".ts"));
        assert!(exts.contains(".tsx"));
        assert!(!exts.contains(".json"));
    }

    #[test]
    fn test_parser_for() {
        let settings = Settings::default().with_parser("typescript", [".ts"]);
        assert_eq!(settings.parser_for(Path::new("/a/b.ts")), Some("typescript"));
        assert_eq!(settings.parser_for(Path::new("/a/b.js")), None);
    }

    #[test]
    fn test_fingerprints_track_relevant_fields() {
        let base = Settings::default();
        let with_parser = Settings::default().with_parser("typescript", [".ts"]);

        // parsers only matter to export maps
        assert_eq!(
            base.resolution_fingerprint(),
            with_parser.resolution_fingerprint()
        );
        assert_ne!(base.export_fingerprint(), with_parser.export_fingerprint());

        let infinite = Settings::default().with_cache_lifetime(CacheLifetime::Infinite);
        assert_ne!(
            base.resolution_fingerprint(),
            infinite.resolution_fingerprint()
        );
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            Settings::from_json_file(&missing),
            Err(Error::ConfigRead { .. })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ nope").unwrap();
        assert!(matches!(
            Settings::from_json_file(&broken),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_find_settings_file_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE_NAME), "{}").unwrap();
        let nested = dir.path().join("src/lib");
        fs::create_dir_all(&nested).unwrap();

        let found = find_settings_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(SETTINGS_FILE_NAME));
    }
}
