//! Which files get an export map.

use crate::config::{extension_of, Settings};
use crate::error::Error;
use regex_lite::Regex;
use std::path::Path;

/// Compile `ignore`-style patterns.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, Error> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| Error::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Whether `path` has an extension listed in `extensions` or owned by a parser.
#[must_use]
pub fn has_valid_extension(path: &Path, settings: &Settings) -> bool {
    extension_of(path).is_some_and(|ext| settings.file_extensions().contains(ext.as_str()))
}

/// The `ignore` and `internal-regex` patterns of one settings value,
/// compiled once. Invalid patterns are logged and dropped.
#[derive(Debug, Default)]
pub struct CompiledPatterns {
    ignore: Vec<Regex>,
    internal: Option<Regex>,
}

impl CompiledPatterns {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let ignore = settings
            .ignore
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "invalid ignore pattern");
                    None
                }
            })
            .collect();
        let internal = settings
            .internal_regex
            .as_deref()
            .and_then(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!(pattern, error = %err, "invalid internal-regex");
                    None
                }
            });
        Self { ignore, internal }
    }

    /// Whether `path` should be skipped: unknown extension, or matched by an
    /// `ignore` pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Path, settings: &Settings) -> bool {
        if !has_valid_extension(path, settings) {
            return true;
        }
        if self.ignore.is_empty() {
            return false;
        }
        let text = path.to_string_lossy();
        self.ignore.iter().any(|re| re.is_match(&text))
    }

    /// Whether `name` matches `internal-regex`.
    #[must_use]
    pub fn is_internal(&self, name: &str) -> bool {
        self.internal.as_ref().is_some_and(|re| re.is_match(name))
    }
}

/// One-off form of [`CompiledPatterns::is_ignored`]. Prefer
/// [`EngineState::is_ignored`](crate::EngineState::is_ignored), which
/// compiles the patterns once per settings.
#[must_use]
pub fn is_ignored(path: &Path, settings: &Settings) -> bool {
    CompiledPatterns::new(settings).is_ignored(path, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        let settings = Settings::default().with_parser("typescript", [".ts"]);
        assert!(has_valid_extension(Path::new("/a/b.js"), &settings));
        assert!(has_valid_extension(Path::new("/a/b.ts"), &settings));
        assert!(!has_valid_extension(Path::new("/a/b.css"), &settings));
        assert!(!has_valid_extension(Path::new("/a/Makefile"), &settings));
    }

    #[test]
    fn test_ignore_patterns() {
        let mut settings = Settings::default();
        settings.ignore = vec!["node_modules".to_string(), r"\.generated\.js$".to_string()];

        assert!(is_ignored(Path::new("/repo/node_modules/x/index.js"), &settings));
        assert!(is_ignored(Path::new("/repo/src/api.generated.js"), &settings));
        assert!(!is_ignored(Path::new("/repo/src/api.js"), &settings));
        assert!(is_ignored(Path::new("/repo/src/style.css"), &settings));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let mut settings = Settings::default();
        settings.ignore = vec!["(".to_string(), "vendor".to_string()];
        assert!(!is_ignored(Path::new("/repo/src/a.js"), &settings));
        assert!(is_ignored(Path::new("/repo/vendor/a.js"), &settings));
        assert!(compile_patterns(&settings.ignore).is_err());
    }

    #[test]
    fn test_internal_pattern() {
        let patterns = CompiledPatterns::new(&Settings::default().with_internal_regex("^@app/"));
        assert!(patterns.is_internal("@app/ui"));
        assert!(!patterns.is_internal("@other/ui"));
        assert!(!CompiledPatterns::new(&Settings::default()).is_internal("@app/ui"));

        let broken = CompiledPatterns::new(&Settings::default().with_internal_regex("("));
        assert!(!broken.is_internal("("));
    }
}
