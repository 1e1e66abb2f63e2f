use super::{print_json, stdout, w, Env};
use miette::Result;
use modmap_core::ignore::has_valid_extension;
use modmap_core::{Diagnostic, ExportMap};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    exports: usize,
    imports: usize,
    /// Re-export sources that did not resolve.
    unresolved: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Serialize, Default)]
struct ScanReport {
    root: PathBuf,
    files_seen: usize,
    modules: usize,
    files: Vec<FileReport>,
}

/// Run the scan command.
pub fn run(env: &Env, root: Option<&Path>) -> Result<()> {
    let root = root.map_or_else(|| env.cwd.clone(), |r| env.path(r));
    let root = dunce::canonicalize(&root).unwrap_or(root);
    let mut report = ScanReport {
        root: root.clone(),
        ..ScanReport::default()
    };

    let skip_dirs = &env.settings.external_module_folders;
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.') || skip_dirs.iter().any(|d| d == name))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_valid_extension(entry.path(), &env.settings) {
            continue;
        }
        report.files_seen += 1;
        if env.engine.is_ignored(entry.path(), &env.settings) {
            continue;
        }

        let Some(map) = env.engine.export_map_for(entry.path(), &env.settings) else {
            continue;
        };
        report.modules += 1;
        report.files.push(file_report(&root, &map));
    }
    tracing::debug!(
        files = report.files_seen,
        modules = report.modules,
        export_maps = env.engine.export_maps_cached(),
        resolutions = env.engine.resolutions_cached(),
        "scan finished"
    );

    if env.json {
        return print_json(&report);
    }

    let mut out = stdout();
    for file in &report.files {
        if file.unresolved.is_empty() && file.diagnostics.is_empty() {
            continue;
        }
        w(&mut out, &format!("{}\n", file.path.display()))?;
        for spec in &file.unresolved {
            w(&mut out, &format!("  unresolved re-export: {spec}\n"))?;
        }
        for diagnostic in &file.diagnostics {
            w(&mut out, &format!("  {}\n", diagnostic.message))?;
        }
    }
    w(
        &mut out,
        &format!(
            "{} modules in {} files under {}\n",
            report.modules,
            report.files_seen,
            root.display()
        ),
    )?;
    Ok(())
}

fn file_report(root: &Path, map: &ExportMap) -> FileReport {
    let relative = map.path.strip_prefix(root).unwrap_or(&map.path).to_path_buf();

    let mut unresolved: Vec<String> = map
        .entries
        .values()
        .filter_map(|entry| entry.source.as_ref().or(entry.namespace.as_ref()))
        .chain(&map.namespace_reexports)
        .filter(|target| target.path.is_none())
        .map(|target| target.specifier.clone())
        .collect();
    unresolved.sort();
    unresolved.dedup();

    let specifier = format!("./{}", relative.display());
    FileReport {
        exports: map.entries.len(),
        imports: map.imports.len(),
        unresolved,
        diagnostics: map.report_errors(&specifier).into_iter().collect(),
        path: relative,
    }
}
