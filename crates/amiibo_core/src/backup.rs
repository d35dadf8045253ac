use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core_api::{CoreError, CoreErrorCode};

pub const BACKUP_DIR_PREFIX: &str = "backup_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created(PathBuf),
    AlreadyBackedUp,
}

/// Copies originals into `<root>/backup_<stamp>/`, at most once per file per run.
#[derive(Debug)]
pub struct BackupStore {
    root: PathBuf,
    backup_dir: PathBuf,
    seen: Mutex<HashSet<PathBuf>>,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>, stamp: &str) -> Self {
        let root = root.into();
        let backup_dir = root.join(format!("{BACKUP_DIR_PREFIX}{stamp}"));
        Self {
            root,
            backup_dir,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn backed_up_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_backed_up(&self, path: &Path) -> bool {
        let key = registry_key(path);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&key)
    }

    /// The path is registered before copying, so a failed copy is not retried.
    pub fn backup(&self, path: &Path) -> Result<BackupOutcome, CoreError> {
        let key = registry_key(path);
        {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(key) {
                return Ok(BackupOutcome::AlreadyBackedUp);
            }
        }

        let relative = path.strip_prefix(&self.root).map_err(|_| {
            CoreError::new(
                CoreErrorCode::Write,
                format!(
                    "{} is outside backup root {}",
                    path.display(),
                    self.root.display()
                ),
            )
        })?;
        let dest = self.backup_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(&dest, e))?;
        }
        fs::copy(path, &dest).map_err(|e| write_error(&dest, e))?;

        Ok(BackupOutcome::Created(dest))
    }
}

pub fn run_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn registry_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn write_error(dest: &Path, e: std::io::Error) -> CoreError {
    CoreError::new(
        CoreErrorCode::Write,
        format!("could not create backup {}: {e}", dest.display()),
    )
}
