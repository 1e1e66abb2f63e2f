pub mod classify;
pub mod deref;
pub mod exports;
pub mod resolve;
pub mod scan;
pub mod version;

use miette::{IntoDiagnostic, Result};
use modmap_core::config::find_settings_file;
use modmap_core::ignore::compile_patterns;
use modmap_core::{EngineState, Error, ModuleContext, Settings};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a command needs: working directory, settings and the engine.
pub struct Env {
    pub cwd: PathBuf,
    pub settings: Arc<Settings>,
    pub settings_file: Option<PathBuf>,
    pub engine: EngineState,
    pub json: bool,
}

impl Env {
    /// Load settings from `explicit`, or the nearest settings file above
    /// `cwd`, or defaults.
    pub fn load(cwd: PathBuf, explicit: Option<&Path>, json: bool) -> Result<Self> {
        let settings_file = match explicit {
            Some(path) => Some(absolutize(&cwd, path)),
            None => find_settings_file(&cwd),
        };
        let settings = match &settings_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading settings");
                Settings::from_json_file(path).into_diagnostic()?
            }
            None => Settings::default(),
        };
        validate(&settings).into_diagnostic()?;

        Ok(Self {
            cwd,
            settings: Arc::new(settings),
            settings_file,
            engine: EngineState::new(),
            json,
        })
    }

    /// Absolute form of a path given on the command line.
    pub fn path(&self, path: &Path) -> PathBuf {
        absolutize(&self.cwd, path)
    }

    /// Lint context for `file`.
    pub fn context(&self, file: &Path) -> ModuleContext {
        ModuleContext::new(self.path(file), self.settings.clone()).with_cwd(&self.cwd)
    }
}

/// Reject settings whose regexes do not compile.
fn validate(settings: &Settings) -> Result<(), Error> {
    compile_patterns(&settings.ignore)?;
    if let Some(pattern) = &settings.internal_regex {
        compile_patterns(std::slice::from_ref(pattern))?;
    }
    Ok(())
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

pub fn w(out: &mut impl Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes()).into_diagnostic()
}

pub fn stdout() -> io::StdoutLock<'static> {
    io::stdout().lock()
}
