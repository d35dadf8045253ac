use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::core_api::Format;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub path: PathBuf,
    /// Path relative to the scan root, used for reports and backup layout.
    pub relative: PathBuf,
    pub format: Format,
}

/// Recursively finds `.nfc` and `.bin` dumps under `root`, skipping backup folders.
pub fn collect_dumps(root: &Path) -> io::Result<Vec<DumpFile>> {
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    out.sort_by_key(|file| file.relative.to_string_lossy().to_lowercase());
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<DumpFile>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        if is_backup_path(&relative) {
            continue;
        }

        if entry.file_type()?.is_dir() {
            if let Err(e) = walk(root, &path, out) {
                warn!(dir = %path.display(), error = %e, "skipping unreadable directory");
            }
            continue;
        }

        if !path.is_file() {
            continue;
        }
        if let Some(format) = Format::from_path(&path) {
            out.push(DumpFile {
                path,
                relative,
                format,
            });
        }
    }
    Ok(())
}

pub fn is_backup_path(relative: &Path) -> bool {
    relative.components().any(|component| {
        component
            .as_os_str()
            .to_string_lossy()
            .to_ascii_lowercase()
            .starts_with("backup")
    })
}
