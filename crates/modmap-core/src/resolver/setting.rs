//! Accepted shapes of the `resolver` / `resolver-next` settings.

use super::{ResolverError, ResolverModule};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A resolver setting as written by the user or built in code.
///
/// From JSON:
/// - `"node"`: one resolver by name
/// - `["node", "webpack"]`: several by name, in priority order
/// - `{ "node": { ... }, "webpack": true }`: name -> options, `false` disables
/// - `{ "name": "x", "resolver": "path/or/name", "options": { ... } }`: an explicit record
///
/// In code, loaded resolver instances can be passed directly.
#[derive(Debug, Clone)]
pub enum ResolverSetting {
    /// Any JSON form.
    Json(Value),
    /// An already-instantiated resolver.
    Instance(ResolverModule),
    /// A named instance with options.
    Record {
        name: String,
        enable: bool,
        options: Value,
        resolver: ResolverModule,
    },
    /// Several settings in priority order.
    List(Vec<ResolverSetting>),
}

impl ResolverSetting {
    /// Stable text used in settings fingerprints.
    ///
    /// Instances contribute their pointer identity, so two distinct
    /// instances never share cache entries.
    #[must_use]
    pub fn fingerprint_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Instance(module) => format!("instance:{}", module.identity()),
            Self::Record {
                name,
                enable,
                options,
                resolver,
            } => format!("record:{name}:{enable}:{options}:{}", resolver.identity()),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(Self::fingerprint_text).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }
}

impl Serialize for ResolverSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Json(value) => value.serialize(serializer),
            Self::Instance(module) => {
                serializer.serialize_str(module.name.as_deref().unwrap_or("<instance>"))
            }
            Self::Record { name, .. } => serializer.serialize_str(name),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ResolverSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Json)
    }
}

impl From<&str> for ResolverSetting {
    fn from(name: &str) -> Self {
        Self::Json(Value::String(name.to_string()))
    }
}

impl From<String> for ResolverSetting {
    fn from(name: String) -> Self {
        Self::Json(Value::String(name))
    }
}

impl From<Value> for ResolverSetting {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<ResolverModule> for ResolverSetting {
    fn from(module: ResolverModule) -> Self {
        Self::Instance(module)
    }
}

impl From<Vec<ResolverSetting>> for ResolverSetting {
    fn from(items: Vec<ResolverSetting>) -> Self {
        Self::List(items)
    }
}

/// Where a normalized entry's implementation comes from.
#[derive(Debug, Clone)]
pub(crate) enum EntrySource {
    /// Load through the registry by name or path.
    Named(String),
    /// Use this instance.
    Module(ResolverModule),
}

/// One normalized resolver entry.
#[derive(Debug, Clone)]
pub(crate) struct ResolverEntry {
    pub name: String,
    pub enable: bool,
    pub options: Value,
    pub source: EntrySource,
}

/// Flatten any accepted shape into entries keyed by name.
///
/// A name seen twice keeps its first position and takes the later entry's
/// contents.
pub(crate) fn normalize_resolvers(
    setting: &ResolverSetting,
) -> Result<Vec<ResolverEntry>, ResolverError> {
    let mut entries = IndexMap::new();
    collect(setting, &mut entries)?;
    Ok(entries.into_values().collect())
}

fn collect(
    setting: &ResolverSetting,
    out: &mut IndexMap<String, ResolverEntry>,
) -> Result<(), ResolverError> {
    match setting {
        ResolverSetting::List(items) => {
            for item in items {
                collect(item, out)?;
            }
        }
        ResolverSetting::Instance(module) => {
            let name = module
                .name
                .clone()
                .unwrap_or_else(|| format!("anonymous:{}", module.identity()));
            insert(
                out,
                ResolverEntry {
                    name,
                    enable: true,
                    options: Value::Null,
                    source: EntrySource::Module(module.clone()),
                },
            );
        }
        ResolverSetting::Record {
            name,
            enable,
            options,
            resolver,
        } => insert(
            out,
            ResolverEntry {
                name: name.clone(),
                enable: *enable,
                options: options.clone(),
                source: EntrySource::Module(resolver.clone()),
            },
        ),
        ResolverSetting::Json(value) => collect_json(value, out)?,
    }
    Ok(())
}

fn collect_json(
    value: &Value,
    out: &mut IndexMap<String, ResolverEntry>,
) -> Result<(), ResolverError> {
    match value {
        Value::String(name) => insert(out, named(name, true, Value::Null)),
        Value::Array(items) => {
            for item in items {
                collect_json(item, out)?;
            }
        }
        Value::Object(map) if is_record(map) => {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .ok_or(ResolverError::InvalidConfig)?;
            let resolver = map
                .get("resolver")
                .and_then(Value::as_str)
                .ok_or(ResolverError::InvalidConfig)?;
            let enable = match map.get("enable") {
                None => true,
                Some(Value::Bool(b)) => *b,
                Some(_) => return Err(ResolverError::InvalidConfig),
            };
            let options = map.get("options").cloned().unwrap_or(Value::Null);
            insert(
                out,
                ResolverEntry {
                    name: name.to_string(),
                    enable,
                    options,
                    source: EntrySource::Named(resolver.to_string()),
                },
            );
        }
        Value::Object(map) => {
            for (name, options) in map {
                let entry = match options {
                    Value::Bool(enable) => named(name, *enable, Value::Null),
                    other => named(name, true, other.clone()),
                };
                insert(out, entry);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            return Err(ResolverError::InvalidConfig)
        }
    }
    Ok(())
}

fn is_record(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key("name") && map.contains_key("resolver")
}

fn named(name: &str, enable: bool, options: Value) -> ResolverEntry {
    ResolverEntry {
        name: name.to_string(),
        enable,
        options,
        source: EntrySource::Named(name.to_string()),
    }
}

fn insert(out: &mut IndexMap<String, ResolverEntry>, entry: ResolverEntry) {
    // IndexMap::insert keeps the original slot for an existing key
    out.insert(entry.name.clone(), entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{ImportLookup, ResolvedModule, FnResolver};
    use serde_json::json;
    use std::path::Path;

    fn names(entries: &[ResolverEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_string_setting() {
        let entries = normalize_resolvers(&"node".into()).unwrap();
        assert_eq!(names(&entries), vec!["node"]);
        assert!(entries[0].enable);
        assert_eq!(entries[0].options, Value::Null);
    }

    #[test]
    fn test_map_setting() {
        let setting = ResolverSetting::Json(json!({
            "node": { "extensions": [".ts"] },
            "webpack": false,
            "custom": true
        }));
        let entries = normalize_resolvers(&setting).unwrap();
        let by_name = |n: &str| entries.iter().find(|e| e.name == n).unwrap();

        assert_eq!(by_name("node").options, json!({ "extensions": [".ts"] }));
        assert!(!by_name("webpack").enable);
        assert!(by_name("custom").enable);
    }

    #[test]
    fn test_array_setting_keeps_order() {
        let setting = ResolverSetting::Json(json!(["b", "a", { "c": {} }]));
        let entries = normalize_resolvers(&setting).unwrap();
        assert_eq!(names(&entries), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_keeps_first_position() {
        let setting = ResolverSetting::Json(json!(["a", "b", { "a": { "x": 1 } }]));
        let entries = normalize_resolvers(&setting).unwrap();
        assert_eq!(names(&entries), vec!["a", "b"]);
        assert_eq!(entries[0].options, json!({ "x": 1 }));
    }

    #[test]
    fn test_explicit_record() {
        let setting = ResolverSetting::Json(json!({
            "name": "local",
            "resolver": "./tools/resolver",
            "options": { "root": "src" }
        }));
        let entries = normalize_resolvers(&setting).unwrap();
        assert_eq!(names(&entries), vec!["local"]);
        assert!(matches!(
            &entries[0].source,
            EntrySource::Named(path) if path == "./tools/resolver"
        ));
    }

    #[test]
    fn test_invalid_shapes() {
        for bad in [json!(42), json!(true), json!(null), json!([1])] {
            let err = normalize_resolvers(&ResolverSetting::Json(bad)).unwrap_err();
            assert_eq!(err, ResolverError::InvalidConfig);
            assert_eq!(err.to_string(), "invalid resolver config");
        }
    }

    #[test]
    fn test_instances() {
        let v1 = ResolverModule::v1(|_: &str, _: &Path, _: &Value| Ok(ImportLookup::Defer));
        let v3 = ResolverModule::v3(FnResolver::new("fixed", |_: &str, _: &Path| {
            Ok(ResolvedModule::not_found())
        }));
        let setting = ResolverSetting::List(vec![v1.into(), v3.into()]);
        let entries = normalize_resolvers(&setting).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].name.starts_with("anonymous:"));
        assert_eq!(entries[1].name, "fixed");
    }

    #[test]
    fn test_fingerprint_text_differs_per_instance() {
        let make = || {
            ResolverSetting::from(ResolverModule::v1(|_: &str, _: &Path, _: &Value| {
                Ok(ImportLookup::Defer)
            }))
        };
        assert_ne!(make().fingerprint_text(), make().fingerprint_text());
        assert_eq!(
            ResolverSetting::from("node").fingerprint_text(),
            "\"node\""
        );
    }

    #[test]
    fn test_deserialize_any_json() {
        let setting: ResolverSetting = serde_json::from_str(r#"{"node": {}}"#).unwrap();
        assert!(matches!(setting, ResolverSetting::Json(Value::Object(_))));
    }
}
