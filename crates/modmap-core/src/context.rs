//! Per-file lint context and the diagnostics it collects.

use crate::config::Settings;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one consuming context (one rule run over one file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Source location of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Loc {
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl Loc {
    /// The first character of a file. Module-level problems anchor here.
    pub const FILE_START: Self = Self { line: 1, column: 0 };
}

/// A reportable problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub loc: Loc,
}

impl Diagnostic {
    /// A diagnostic anchored at the start of the file.
    pub fn at_file_start(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            loc: Loc::FILE_START,
        }
    }
}

/// What a rule sees while linting one file.
#[derive(Debug)]
pub struct ModuleContext {
    id: ContextId,
    filename: PathBuf,
    cwd: PathBuf,
    settings: Arc<Settings>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl ModuleContext {
    /// Create a context for `filename` using the process working directory.
    pub fn new(filename: impl Into<PathBuf>, settings: Arc<Settings>) -> Self {
        Self {
            id: ContextId::next(),
            filename: filename.into(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            settings,
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Override the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Record a diagnostic.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic);
    }

    /// Diagnostics reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the reported diagnostics.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap_or_else(|e| e.into_inner()))
    }
}
