use super::{print_json, stdout, w, Env};
use miette::{miette, Result};
use modmap_core::{ExportKind, ExportLookup, ExportMap};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct NameReport {
    name: String,
    /// `found`, `unresolved` or `missing`.
    status: &'static str,
    deprecated: bool,
}

#[derive(Debug, Serialize)]
struct ExportsReport<'a> {
    map: &'a ExportMap,
    /// Every name importable from the module, wildcards included.
    names: Vec<NameReport>,
}

/// Run the exports command.
pub fn run(env: &Env, file: &Path) -> Result<()> {
    let path = env.path(file);
    let map = env
        .engine
        .export_map_for(&path, &env.settings)
        .ok_or_else(|| miette!("no export map for {}: missing, ignored or not an ES module", path.display()))?;

    let mut names = Vec::new();
    env.engine
        .namespace(map.clone(), &env.settings)
        .for_each(|name, lookup| {
            let (status, deprecated) = match &lookup {
                ExportLookup::Found(entry) => (
                    "found",
                    entry.doc.as_ref().is_some_and(|doc| doc.is_deprecated()),
                ),
                ExportLookup::Unresolved => ("unresolved", false),
                ExportLookup::Missing => ("missing", false),
            };
            names.push(NameReport {
                name: name.to_string(),
                status,
                deprecated,
            });
        });

    if env.json {
        return print_json(&ExportsReport { map: &map, names });
    }

    let mut out = stdout();
    w(&mut out, &format!("\x1b[1m## {}\x1b[0m\n", map.path.display()))?;
    if let Some(doc) = &map.doc {
        w(&mut out, &format!("  {}\n", doc.description))?;
    }
    w(&mut out, "\n")?;

    for (name, entry) in &map.entries {
        let detail = match entry.kind {
            ExportKind::Value => entry
                .local
                .as_deref()
                .filter(|local| *local != name.as_str())
                .map(|local| format!("local {local}"))
                .unwrap_or_default(),
            ExportKind::Namespace => entry
                .namespace
                .as_ref()
                .map(|ns| format!("namespace of {}", ns.specifier))
                .unwrap_or_default(),
            ExportKind::ReExport => entry
                .source
                .as_ref()
                .map(|src| {
                    let local = entry.local.as_deref().unwrap_or(name);
                    format!("{local} from {}", src.specifier)
                })
                .unwrap_or_default(),
        };
        w(&mut out, &format!("  {name:<24} {detail}\n"))?;
    }
    for star in &map.namespace_reexports {
        let note = if star.path.is_some() { "" } else { " (unresolved)" };
        w(&mut out, &format!("  * from {}{note}\n", star.specifier))?;
    }

    let via_wildcard: Vec<&NameReport> = names
        .iter()
        .filter(|n| !map.entries.contains_key(&n.name))
        .collect();
    if !via_wildcard.is_empty() {
        w(&mut out, "\n  via export *:\n")?;
        for name in via_wildcard {
            w(&mut out, &format!("    {}\n", name.name))?;
        }
    }

    for error in &map.errors {
        w(&mut out, &format!("\n  parse error: {error}\n"))?;
    }
    Ok(())
}
