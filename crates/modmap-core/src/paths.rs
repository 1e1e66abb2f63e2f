use std::path::{Component, Path, PathBuf};

/// Name of the package manifest that marks a package root.
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Find the package root by walking up from `start` looking for `package.json`.
///
/// `start` may be a file or a directory. Returns the first ancestor directory
/// containing a manifest, or `None` if there is none.
#[must_use]
pub fn package_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PACKAGE_MANIFEST).is_file())
        .map(Path::to_path_buf)
}

/// Lexically normalize a path: drop `.` components and fold `..` into the parent.
///
/// Does not touch the filesystem, so symlinks are not followed.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize a path. When it does not exist, the nearest existing
/// ancestor is canonicalized and the missing tail is appended lexically.
#[must_use]
pub fn canonical(path: &Path) -> PathBuf {
    if let Ok(real) = dunce::canonicalize(path) {
        return real;
    }
    let path = normalize(path);
    let mut tail = Vec::new();
    let mut current = path.as_path();
    while let (Some(parent), Some(name)) = (current.parent(), current.file_name()) {
        tail.push(name);
        current = parent;
        if let Ok(real) = dunce::canonicalize(current) {
            return tail.iter().rev().fold(real, |acc, name| acc.join(name));
        }
    }
    path
}

/// Whether `path` lies at or below `base`.
#[must_use]
pub fn is_within(base: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(base))
}

/// Check if a specifier is an absolute filesystem path.
#[must_use]
pub fn is_absolute_specifier(spec: &str) -> bool {
    // Unix absolute
    if spec.starts_with('/') {
        return true;
    }

    // Windows absolute: C:\, D:\, etc.
    let bytes = spec.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return true;
    }

    // UNC path: \\server\share
    spec.starts_with("\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn test_canonical_resolves_missing_file_under_symlink() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("link")).unwrap();

        let base = canonical(&real);
        assert_eq!(
            canonical(&dir.path().join("link/missing/a.js")),
            base.join("missing/a.js")
        );
        assert_eq!(canonical(Path::new("/no/such/../file.js")), PathBuf::from("/no/file.js"));
    }

    #[test]
    fn test_package_root_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(package_root(&nested).unwrap(), dir.path());
        assert_eq!(package_root(&nested.join("file.js")).unwrap(), dir.path());
    }

    #[test]
    fn test_package_root_prefers_nearest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let inner = dir.path().join("packages/inner");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join("package.json"), "{}").unwrap();

        assert_eq!(package_root(&inner.join("index.js")).unwrap(), inner);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/repo"), Path::new("/repo/src/a.js")));
        assert!(is_within(Path::new("/repo"), Path::new("/repo")));
        assert!(!is_within(Path::new("/repo"), Path::new("/repository/a.js")));
        assert!(!is_within(Path::new("/repo/src"), Path::new("/repo/src/../lib/a.js")));
    }

    #[test]
    fn test_is_absolute_specifier() {
        assert!(is_absolute_specifier("/usr/lib/a.js"));
        assert!(is_absolute_specifier("C:\\code\\a.js"));
        assert!(is_absolute_specifier("\\\\server\\share"));
        assert!(!is_absolute_specifier("./a"));
        assert!(!is_absolute_specifier("lodash"));
    }
}
