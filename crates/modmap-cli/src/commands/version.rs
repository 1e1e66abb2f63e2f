use miette::Result;
use modmap_core::VERSION;
use serde_json::json;

pub fn run(json: bool) -> Result<()> {
    if json {
        return super::print_json(&json!({ "name": "modmap", "version": VERSION }));
    }
    println!("modmap {VERSION}");
    Ok(())
}
