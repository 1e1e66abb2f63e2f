//! `exports` / `imports` field evaluation for package manifests.
//!
//! Conditions are matched against a caller-supplied list of active
//! condition names. Within a conditions object the first key (in manifest
//! order) that is active wins, the same as Node does. Array targets are
//! tried in order.

use serde_json::{Map, Value};

/// Resolve the `exports` target for `subpath` (`None` means the package root).
///
/// Returns the target, which always starts with `./`.
#[must_use]
pub fn resolve_exports(
    manifest: &Value,
    subpath: Option<&str>,
    conditions: &[String],
) -> Option<String> {
    match subpath {
        None => resolve_exports_root(manifest, conditions),
        Some(sub) => {
            let obj = manifest.get("exports")?.as_object()?;
            if !has_subpath_keys(obj) {
                return None;
            }
            if let Some(target) = obj.get(sub) {
                return resolve_target(target, conditions, None);
            }
            resolve_pattern(obj, sub, conditions)
        }
    }
}

/// Resolve the root export: a string, `{ ".": ... }` or a root conditions object.
#[must_use]
pub fn resolve_exports_root(manifest: &Value, conditions: &[String]) -> Option<String> {
    let exports = manifest.get("exports")?;
    match exports {
        Value::Object(obj) if has_subpath_keys(obj) || obj.contains_key(".") => {
            resolve_target(obj.get(".")?, conditions, None)
        }
        other => resolve_target(other, conditions, None),
    }
}

/// Resolve a `#`-prefixed specifier through the `imports` field.
///
/// Unlike `exports`, targets here may name bare packages; those are returned as-is.
#[must_use]
pub fn resolve_imports_map(manifest: &Value, spec: &str, conditions: &[String]) -> Option<String> {
    if !spec.starts_with('#') {
        return None;
    }
    let imports = manifest.get("imports")?.as_object()?;
    if let Some(target) = imports.get(spec) {
        return resolve_import_target(target, conditions);
    }

    let (pattern, star) = best_pattern(imports, spec, "#")?;
    let target = resolve_import_target(&imports[pattern], conditions)?;
    target.contains('*').then(|| target.replace('*', &star))
}

fn resolve_import_target(target: &Value, conditions: &[String]) -> Option<String> {
    match target {
        Value::String(s) if s.starts_with("./") || !(s.starts_with('.') || s.starts_with('/')) => {
            Some(s.clone())
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| resolve_import_target(item, conditions)),
        Value::Object(obj) => active_condition(obj, conditions)
            .and_then(|value| resolve_import_target(value, conditions)),
        _ => None,
    }
}

fn has_subpath_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with("./"))
}

fn resolve_pattern(obj: &Map<String, Value>, subpath: &str, conditions: &[String]) -> Option<String> {
    let (pattern, star) = best_pattern(obj, subpath, "./")?;
    resolve_target(&obj[pattern], conditions, Some(&star))
}

/// Find the most specific single-`*` key matching `subpath`.
///
/// Longer prefixes win; ties go to the longer key.
fn best_pattern<'a>(
    obj: &'a Map<String, Value>,
    subpath: &str,
    key_prefix: &str,
) -> Option<(&'a str, String)> {
    obj.keys()
        .filter(|key| key.starts_with(key_prefix) && key.matches('*').count() == 1)
        .filter_map(|key| match_pattern(key, subpath).map(|star| (key.as_str(), star)))
        .max_by(|(a, _), (b, _)| {
            let prefix = |k: &str| k.find('*').unwrap_or(k.len());
            prefix(a).cmp(&prefix(b)).then(a.len().cmp(&b.len()))
        })
}

/// Match `pattern` (one `*`) against `subpath`, returning the text the star covers.
fn match_pattern(pattern: &str, subpath: &str) -> Option<String> {
    let (prefix, suffix) = pattern.split_once('*')?;
    let rest = subpath.strip_prefix(prefix)?;
    let star = rest.strip_suffix(suffix)?;
    (!star.is_empty()).then(|| star.to_string())
}

fn resolve_target(target: &Value, conditions: &[String], star: Option<&str>) -> Option<String> {
    match target {
        Value::String(s) => {
            let path = match star {
                Some(star) if s.contains('*') => s.replace('*', star),
                Some(_) => return None,
                None => s.clone(),
            };
            is_valid_target(&path).then_some(path)
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| resolve_target(item, conditions, star)),
        Value::Object(obj) => {
            active_condition(obj, conditions).and_then(|v| resolve_target(v, conditions, star))
        }
        _ => None,
    }
}

fn active_condition<'a>(obj: &'a Map<String, Value>, conditions: &[String]) -> Option<&'a Value> {
    obj.iter()
        .find(|(key, _)| *key == "default" || conditions.iter().any(|c| c == *key))
        .map(|(_, value)| value)
}

/// Targets must stay inside the package: `./` prefix and no `..` segment.
fn is_valid_target(path: &str) -> bool {
    path.starts_with("./") && !path.split('/').any(|segment| segment == "..")
}
