//! Path casing verification for case-insensitive filesystems.

use crate::context::{Diagnostic, ModuleContext};
use crate::engine::EngineState;
use crate::resolver::ResolvedModule;
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;

static CASE_SENSITIVE_FS: OnceLock<bool> = OnceLock::new();

/// Whether the filesystem distinguishes case. Probed once per process by
/// looking up the running executable under a case-swapped name.
pub fn case_sensitive_fs() -> bool {
    *CASE_SENSITIVE_FS.get_or_init(|| {
        let Ok(exe) = std::env::current_exe() else {
            return true;
        };
        let Some(name) = exe.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        let swapped: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect();
        if swapped == name {
            return true;
        }
        !exe.with_file_name(swapped).exists()
    })
}

/// Options for [`EngineState::check_case`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseCheckOptions {
    /// Run the check at all.
    pub enabled: bool,
    /// Also check the segments of the working directory.
    pub strict: bool,
}

impl Default for CaseCheckOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
        }
    }
}

/// Whether every segment of `path` appears with this exact casing in its
/// parent's directory listing.
///
/// Without `strict`, reaching a directory equal to `cwd` (ignoring case)
/// stops the walk successfully.
#[must_use]
pub fn exists_with_case(path: &Path, strict: bool, cwd: &Path) -> bool {
    let mut current = path;
    loop {
        if !strict && eq_ignore_case(current.as_os_str(), cwd.as_os_str()) {
            return true;
        }
        let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
            return true;
        };
        let Ok(listing) = std::fs::read_dir(parent) else {
            return false;
        };
        let present = listing
            .filter_map(Result::ok)
            .any(|entry| entry.file_name() == name);
        if !present {
            return false;
        }
        current = parent;
    }
}

fn eq_ignore_case(a: &std::ffi::OsStr, b: &std::ffi::OsStr) -> bool {
    let lower = |s: &std::ffi::OsStr| -> OsString { s.to_ascii_lowercase() };
    lower(a) == lower(b)
}

impl EngineState {
    /// [`exists_with_case`] memoized under the settings' cache lifetime.
    ///
    /// Always true on case-sensitive filesystems.
    pub fn file_exists_with_case(&self, path: &Path, strict: bool, ctx: &ModuleContext) -> bool {
        if self.case_sensitive_fs {
            return true;
        }
        let key = (path.to_path_buf(), strict);
        let lifetime = ctx.settings().cache.lifetime;
        if let Some(hit) = self.case_checks.get(&key, lifetime) {
            return hit;
        }
        let exists = exists_with_case(path, strict, ctx.cwd());
        self.case_checks.set(key, exists)
    }

    /// Diagnostic for a resolved import whose casing differs from the filesystem.
    pub fn check_case(
        &self,
        specifier: &str,
        resolved: &ResolvedModule,
        opts: CaseCheckOptions,
        ctx: &ModuleContext,
    ) -> Option<Diagnostic> {
        if !opts.enabled {
            return None;
        }
        let path = resolved.path.as_deref()?;
        if self.file_exists_with_case(path, opts.strict, ctx) {
            return None;
        }
        Some(Diagnostic::at_file_start(format!(
            "Casing of {specifier} does not match the underlying filesystem."
        )))
    }
}
