//! Path guard - keeps every file operation inside the repository root

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::types::PathEscapeError;

/// The directory all tools operate in
///
/// Canonicalized once at construction and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root(PathBuf);

impl Root {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let canonical = path.as_ref().canonicalize()?;
        if !canonical.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", canonical.display()),
            ));
        }
        Ok(Self(canonical))
    }

    /// The working directory of the current process
    pub fn current() -> io::Result<Self> {
        Self::new(std::env::current_dir()?)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.0.join(relative)
    }

    /// True for the root itself and anything below it (component-wise)
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.0)
    }
}

/// Resolves caller-supplied paths against [`Root`]
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: Root,
}

impl PathGuard {
    pub fn new(root: Root) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Resolve `requested` to an absolute path inside the root
    ///
    /// `.` and `..` are folded before the containment check, then symlinks on
    /// the longest existing prefix are resolved and the check is repeated.
    /// The leaf does not have to exist.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, PathEscapeError> {
        let escape = || PathEscapeError {
            requested: requested.to_string(),
        };

        let normalized = normalize(&self.root.join(requested));
        if !self.root.contains(&normalized) {
            return Err(escape());
        }

        let resolved = resolve_existing_prefix(&normalized).ok_or_else(escape)?;
        if !self.root.contains(&resolved) {
            tracing::warn!(
                requested,
                resolved = %resolved.display(),
                "Symlink resolves outside root"
            );
            return Err(escape());
        }

        Ok(resolved)
    }
}

/// Lexically fold `.` and `..`; `..` at the filesystem root stays at the root
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component)
            }
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest
///
/// Returns `None` when a dangling symlink sits on the path, since writing
/// through it would create its target wherever it points.
fn resolve_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut suffix = Vec::new();
    let mut current = path;

    loop {
        match current.canonicalize() {
            Ok(canonical) => {
                let mut resolved = canonical;
                for part in suffix.iter().rev() {
                    resolved.push(part);
                }
                return Some(resolved);
            }
            Err(_) => {
                if current.symlink_metadata().is_ok() {
                    // Exists as a link but its target does not
                    return None;
                }
                suffix.push(current.file_name()?.to_owned());
                current = current.parent()?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard() -> (TempDir, PathGuard) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn main() {}").unwrap();
        let root = Root::new(dir.path()).unwrap();
        (dir, PathGuard::new(root))
    }

    #[test]
    fn test_resolves_inside_root() {
        let (_dir, guard) = guard();
        let root = guard.root().as_path().to_path_buf();

        assert_eq!(guard.resolve("src/lib.rs").unwrap(), root.join("src/lib.rs"));
        assert_eq!(guard.resolve("./src/../src/lib.rs").unwrap(), root.join("src/lib.rs"));
        assert_eq!(guard.resolve(".").unwrap(), root);
        assert_eq!(guard.resolve("").unwrap(), root);
    }

    #[test]
    fn test_allows_missing_leaf() {
        let (_dir, guard) = guard();
        let root = guard.root().as_path().to_path_buf();
        assert_eq!(
            guard.resolve("src/new/file.txt").unwrap(),
            root.join("src/new/file.txt")
        );
    }

    #[test]
    fn test_rejects_parent_escapes() {
        let (_dir, guard) = guard();
        for path in ["..", "../outside.txt", "src/../../x", "src/../../../etc/passwd"] {
            assert!(guard.resolve(path).is_err(), "{path} should escape");
        }
    }

    #[test]
    fn test_rejects_absolute_override() {
        let (_dir, guard) = guard();
        assert!(guard.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn test_absolute_path_inside_root_is_fine() {
        let (_dir, guard) = guard();
        let inside = guard.root().join("src/lib.rs");
        assert_eq!(guard.resolve(inside.to_str().unwrap()).unwrap(), inside);
    }

    #[test]
    fn test_rejects_sibling_with_shared_prefix() {
        let parent = TempDir::new().unwrap();
        std::fs::create_dir(parent.path().join("repo")).unwrap();
        std::fs::create_dir(parent.path().join("repo2")).unwrap();
        let guard = PathGuard::new(Root::new(parent.path().join("repo")).unwrap());

        assert!(guard.resolve("../repo2/file").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_out_of_root() {
        let (dir, guard) = guard();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(guard.resolve("link/secret.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_dangling_symlink() {
        let (dir, guard) = guard();
        std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("dangling")).unwrap();

        assert!(guard.resolve("dangling").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_follows_symlink_within_root() {
        let (dir, guard) = guard();
        std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("alias")).unwrap();

        let root = guard.root().as_path().to_path_buf();
        assert_eq!(guard.resolve("alias/lib.rs").unwrap(), root.join("src/lib.rs"));
    }
}
