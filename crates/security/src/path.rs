//! Path validation: confines file access to the workspace directory.
//!
//! Operator-supplied paths are resolved against a single workspace root.
//! Escapes through `..` are caught lexically before the filesystem is
//! touched; escapes through symlinks are caught afterwards by canonicalizing
//! the deepest ancestor that exists.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the workspace")]
    OutsideWorkspace { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// The directory every file-manager path is confined to.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
    canonical: PathBuf,
}

impl WorkspaceRoot {
    /// Anchor a workspace at `root`. Relative roots resolve against the
    /// current directory; the directory need not exist yet.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PathValidationError> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| PathValidationError::CanonicalizeFailed {
                    path: root.display().to_string(),
                    reason: e.to_string(),
                })?
                .join(root)
        };

        let canonical = match absolute.canonicalize() {
            Ok(path) => path,
            Err(_) => normalize_lexically(&absolute),
        };
        Ok(Self {
            root: canonical.clone(),
            canonical,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` to an absolute path inside the workspace.
    ///
    /// Relative paths are taken from the root. Absolute paths are accepted
    /// only when they already lie inside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let input = Path::new(path.trim());
        let joined = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        let normalized = normalize_lexically(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(PathValidationError::OutsideWorkspace { path: path.into() });
        }

        let existing = deepest_existing(&normalized);
        let canonical = existing
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: path.into(),
                reason: e.to_string(),
            })?;
        if !canonical.starts_with(&self.canonical) {
            return Err(PathValidationError::OutsideWorkspace { path: path.into() });
        }

        Ok(normalized)
    }

    /// Display form of a path inside the workspace, relative to the root.
    pub fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".into(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Resolve `.` and `..` without consulting the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn deepest_existing(path: &Path) -> &Path {
    let mut current = path;
    while !current.exists() {
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, WorkspaceRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let (_dir, ws) = workspace();
        let resolved = ws.resolve("notes/recon.txt").unwrap();
        assert_eq!(resolved, ws.path().join("notes").join("recon.txt"));
        assert_eq!(ws.resolve(".").unwrap(), ws.path());
        assert_eq!(ws.resolve("").unwrap(), ws.path());
    }

    #[test]
    fn dot_dot_inside_root_is_fine() {
        let (_dir, ws) = workspace();
        let resolved = ws.resolve("a/b/../c.txt").unwrap();
        assert_eq!(resolved, ws.path().join("a").join("c.txt"));
    }

    #[test]
    fn path_traversal_blocked() {
        let (_dir, ws) = workspace();
        for escape in ["../../etc/passwd", "..", "a/../../x", "/etc/passwd"] {
            match ws.resolve(escape) {
                Err(PathValidationError::OutsideWorkspace { path }) => assert_eq!(path, escape),
                other => panic!("expected OutsideWorkspace for {escape}, got {other:?}"),
            }
        }
    }

    #[test]
    fn traversal_rejected_for_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkspaceRoot::new(dir.path().join("not-created")).unwrap();
        assert!(ws.resolve("../../etc/passwd").is_err());
        assert!(ws.resolve("report.md").is_ok());
    }

    #[test]
    fn absolute_path_inside_root_accepted() {
        let (_dir, ws) = workspace();
        let inside = ws.path().join("loot.txt");
        assert_eq!(ws.resolve(&inside.to_string_lossy()).unwrap(), inside);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_blocked() {
        let (_dir, ws) = workspace();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.path().join("link")).unwrap();
        assert!(matches!(
            ws.resolve("link/secret.txt"),
            Err(PathValidationError::OutsideWorkspace { .. })
        ));
    }

    #[test]
    fn display_relative_strips_root() {
        let (_dir, ws) = workspace();
        assert_eq!(ws.display_relative(ws.path()), ".");
        assert_eq!(ws.display_relative(&ws.path().join("a").join("b.txt")), "a/b.txt");
    }
}
