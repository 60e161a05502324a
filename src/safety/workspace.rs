/// Per-execution scratch directories
///
/// Every judgement gets its own uuid-named directory under the workspace root.
/// The directory is removed when the `Workspace` is dropped, on every exit path.
use crate::config::types::{JudgeError, Result};
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Scratch directory exclusively owned by one execution
#[derive(Debug)]
pub struct Workspace {
    run_id: String,
    run_dir: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create a fresh run directory under `base_dir` (mode 0700).
    pub fn new(base_dir: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = base_dir.join(&run_id);

        fs::create_dir(&run_dir).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to create workspace directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;
        fs::set_permissions(&run_dir, fs::Permissions::from_mode(0o700))?;

        Ok(Self {
            run_id,
            run_dir,
            removed: false,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Write a file directly inside the run directory.
    pub fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(JudgeError::Workspace(format!(
                "invalid workspace file name: {:?}",
                name
            )));
        }

        let path = self.run_dir.join(name);
        fs::write(&path, content).map_err(|e| {
            JudgeError::Workspace(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// Remove the run directory (idempotent).
    pub fn cleanup(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }

        match fs::symlink_metadata(&self.run_dir) {
            Ok(meta) if meta.file_type().is_symlink() => {
                // Never follow a swapped-in link out of the scratch area.
                fs::remove_file(&self.run_dir)?;
            }
            Ok(_) => fs::remove_dir_all(&self.run_dir).map_err(|e| {
                JudgeError::Workspace(format!(
                    "Failed to remove workspace {}: {}",
                    self.run_dir.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.removed = true;
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("Workspace cleanup failed for run {}: {}", self.run_id, e);
        }
    }
}

/// Owner of the workspace root shared by all executions of one judge
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    base_dir: PathBuf,
}

impl WorkspaceManager {
    /// Create (or adopt) the workspace root. The root must be a real
    /// directory owned by the current user.
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_dir).map_err(|e| {
            JudgeError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                base_dir.display(),
                e
            ))
        })?;

        let meta = fs::symlink_metadata(&base_dir)?;
        if meta.file_type().is_symlink() || !meta.is_dir() {
            return Err(JudgeError::Workspace(format!(
                "workspace root {} is not a plain directory",
                base_dir.display()
            )));
        }

        let euid = nix::unistd::geteuid().as_raw();
        if meta.uid() != euid {
            return Err(JudgeError::Workspace(format!(
                "workspace root {} is owned by uid {}, expected {}",
                base_dir.display(),
                meta.uid(),
                euid
            )));
        }
        fs::set_permissions(&base_dir, fs::Permissions::from_mode(0o700))?;

        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn create_workspace(&self) -> Result<Workspace> {
        Workspace::new(&self.base_dir)
    }

    /// Remove run directories left behind by a crashed judge.
    pub fn cleanup_stale(&self, max_age: Duration) -> Result<usize> {
        let mut cleaned = 0;
        let now = SystemTime::now();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read workspace entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let is_run_dir = entry
                .file_name()
                .to_str()
                .map(|name| Uuid::parse_str(name).is_ok())
                .unwrap_or(false);
            if !is_run_dir {
                continue;
            }

            let meta = match fs::symlink_metadata(&path) {
                Ok(m) if m.is_dir() => m,
                _ => continue,
            };
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();

            if age > max_age {
                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        log::info!("Removed stale workspace {}", path.display());
                        cleaned += 1;
                    }
                    Err(e) => log::warn!("Failed to remove stale workspace {}: {}", path.display(), e),
                }
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("ws")).unwrap();

        let workspace = manager.create_workspace().unwrap();
        let run_dir = workspace.run_dir().to_path_buf();
        assert!(run_dir.is_dir());
        let mode = fs::metadata(&run_dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);

        let file = workspace.write_file("solution.py", b"x = 1\n").unwrap();
        assert!(file.exists());

        drop(workspace);
        assert!(!run_dir.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::new(root.path()).unwrap();
        workspace.cleanup().unwrap();
        workspace.cleanup().unwrap();
        assert!(!workspace.run_dir().exists());
    }

    #[test]
    fn test_write_file_rejects_paths() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path()).unwrap();
        assert!(workspace.write_file("../escape.py", b"").is_err());
        assert!(workspace.write_file("..", b"").is_err());
    }

    #[test]
    fn test_symlinked_root_rejected() {
        let root = tempfile::tempdir().unwrap();
        let real = root.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = root.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert!(WorkspaceManager::new(link).is_err());
    }

    #[test]
    fn test_cleanup_stale_only_touches_run_dirs() {
        let root = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path().join("ws")).unwrap();

        let stale = manager.base_dir().join(Uuid::new_v4().to_string());
        fs::create_dir(&stale).unwrap();
        let foreign = manager.base_dir().join("keep-me");
        fs::create_dir(&foreign).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let cleaned = manager.cleanup_stale(Duration::from_millis(1)).unwrap();
        assert_eq!(cleaned, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());
    }
}
