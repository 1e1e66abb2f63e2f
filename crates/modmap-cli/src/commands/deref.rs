use super::{print_json, Env};
use miette::{miette, Result};
use modmap_core::Dereference;
use serde_json::json;
use std::path::Path;

/// Run the deref command.
pub fn run(env: &Env, file: &Path, access: &str) -> Result<()> {
    let mut parts = access.split('.');
    let root = parts.next().filter(|r| !r.is_empty()).ok_or_else(|| miette!("empty access path"))?;
    let segments: Vec<&str> = parts.collect();

    let path = env.path(file);
    let map = env
        .engine
        .export_map_for(&path, &env.settings)
        .ok_or_else(|| miette!("no export map for {}", path.display()))?;
    let outcome = env.engine.namespace(map, &env.settings).dereference(root, &segments);

    let (status, namespace, entry) = match &outcome {
        Dereference::Found(entry) => ("found", access.to_string(), entry.clone()),
        Dereference::NotANamespace { namespace, .. } => ("value", namespace.clone(), None),
        Dereference::Unresolved { namespace } => ("unresolved", namespace.clone(), None),
        Dereference::NotFound { namespace, .. } => ("not-found", namespace.clone(), None),
    };

    if env.json {
        print_json(&json!({
            "access": access,
            "status": status,
            "namespace": namespace,
            "entry": entry,
            "message": outcome.message(),
        }))?;
    } else {
        match &outcome {
            Dereference::Found(_) => println!("{access}: ok"),
            Dereference::NotANamespace { name, .. } => {
                println!("{access}: '{name}' is not a namespace, stopping at {namespace}");
            }
            Dereference::Unresolved { .. } => println!("{access}: cannot verify past {namespace}"),
            Dereference::NotFound { .. } => {}
        }
    }

    match outcome.message() {
        Some(message) => Err(miette!("{message}")),
        None => Ok(()),
    }
}
