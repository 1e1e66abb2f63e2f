//! Cheap textual check that a file may be an ES module.

use regex_lite::Regex;
use std::sync::OnceLock;

/// A statement starting with `import`/`export`, or a dynamic `import(`.
const MODULE_PATTERN: &str = r"(?m)(?:^|;)\s*(?:export|import)(?:(?:\s+\w)|(?:\s*[{*=]))|import\(";

fn module_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MODULE_PATTERN).ok()).as_ref()
}

/// Whether `content` might contain ES module syntax. False negatives are
/// not possible for real modules; false positives are settled by parsing.
#[must_use]
pub fn is_maybe_module(content: &str) -> bool {
    module_regex().map_or(true, |re| re.is_match(content))
}
