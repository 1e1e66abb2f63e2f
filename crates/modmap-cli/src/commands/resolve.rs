use super::{print_json, stdout, w, Env};
use miette::Result;
use modmap_core::{CaseCheckOptions, Diagnostic, ImportType, ResolvedModule};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ResolveReport<'a> {
    specifier: &'a str,
    from: PathBuf,
    #[serde(flatten)]
    module: ResolvedModule,
    resolved_by: Option<String>,
    import_type: ImportType,
    diagnostics: Vec<Diagnostic>,
}

/// Run the resolve command.
pub fn run(env: &Env, specifier: &str, from: &Path, strict_case: bool) -> Result<()> {
    let ctx = env.context(from);
    let module = env.engine.resolve(specifier, &ctx);

    let case = CaseCheckOptions {
        enabled: true,
        strict: strict_case,
    };
    if let Some(diagnostic) = env.engine.check_case(specifier, &module, case, &ctx) {
        ctx.report(diagnostic);
    }

    // served from the resolution cache
    let resolved_by = env
        .engine
        .resolve_relative(specifier, ctx.filename(), &env.settings)
        .ok()
        .and_then(|resolution| resolution.resolved_by);

    let report = ResolveReport {
        specifier,
        from: ctx.filename().to_path_buf(),
        import_type: env.engine.classify(specifier, &ctx),
        module,
        resolved_by,
        diagnostics: ctx.take_diagnostics(),
    };

    if env.json {
        return print_json(&report);
    }

    let mut out = stdout();
    let target = match (&report.module.path, report.module.found) {
        (Some(path), _) => path.display().to_string(),
        (None, true) => "(builtin)".to_string(),
        (None, false) => "(not found)".to_string(),
    };
    w(&mut out, &format!("{specifier} -> {target}\n"))?;
    w(&mut out, &format!("  type:     {}\n", report.import_type))?;
    if let Some(name) = &report.resolved_by {
        w(&mut out, &format!("  resolver: {name}\n"))?;
    }
    for diagnostic in &report.diagnostics {
        w(&mut out, &format!("  warning:  {}\n", diagnostic.message))?;
    }
    Ok(())
}
