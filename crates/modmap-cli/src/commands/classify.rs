use super::{print_json, Env};
use miette::Result;
use serde_json::json;
use std::path::Path;

/// Run the classify command.
pub fn run(env: &Env, specifier: &str, from: &Path) -> Result<()> {
    let ctx = env.context(from);
    let import_type = env.engine.classify(specifier, &ctx);

    if env.json {
        return print_json(&json!({
            "specifier": specifier,
            "from": ctx.filename(),
            "import_type": import_type,
            "package_root": env.engine.context_package_root(&ctx),
            "diagnostics": ctx.take_diagnostics(),
        }));
    }

    println!("{import_type}");
    for diagnostic in ctx.take_diagnostics() {
        eprintln!("warning: {}", diagnostic.message);
    }
    Ok(())
}
