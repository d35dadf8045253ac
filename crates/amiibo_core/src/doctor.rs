//! Batch driver: scan a directory, diagnose every dump, optionally upgrade and
//! repair, and collect one [`FileReport`] per file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backup::{BackupOutcome, BackupStore};
use crate::core_api::{CoreError, CoreErrorCode, Engine, Format, Mode, RepairOutcome, Session};
use crate::diagnosis::{Diagnosis, Field};
use crate::repair::{ByteSource, Change, FixOptions};
use crate::scan::{self, DumpFile};
use crate::uid::Uid;
use crate::upgrade::Upgrade;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub root: PathBuf,
    pub mode: Mode,
    pub upgrade: bool,
    pub fixes: FixOptions,
}

impl RunConfig {
    pub fn dry_run(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: Mode::DryRun,
            upgrade: false,
            fixes: FixOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpgradeStatus {
    AlreadyCurrent,
    WouldUpgrade { from: u32 },
    Upgraded { from: u32 },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub relative_path: PathBuf,
    pub format: Format,
    pub version: Option<u32>,
    pub diagnosis: Option<Diagnosis>,
    pub changes: Vec<Change>,
    pub was_fixed: bool,
    pub was_converted: bool,
    pub upgrade: Option<UpgradeStatus>,
    pub backup: Option<PathBuf>,
    pub error: Option<CoreError>,
}

impl FileReport {
    fn new(file: &DumpFile) -> Self {
        Self {
            relative_path: file.relative.clone(),
            format: file.format,
            version: None,
            diagnosis: None,
            changes: Vec::new(),
            was_fixed: false,
            was_converted: false,
            upgrade: None,
            backup: None,
            error: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.diagnosis.as_ref().is_some_and(Diagnosis::all_valid)
    }

    pub fn uid(&self) -> Option<Uid> {
        self.diagnosis.as_ref().and_then(|d| d.uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCount {
    pub version: Option<u32>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCount {
    pub field: Field,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub text_files: usize,
    pub binary_files: usize,
    pub versions: Vec<VersionCount>,
    pub valid: usize,
    pub problems: usize,
    pub fixed: usize,
    pub converted: usize,
    pub would_convert: usize,
    pub field_issues: Vec<FieldCount>,
    pub total_issues: usize,
}

impl Summary {
    pub fn issues_for(&self, field: Field) -> usize {
        self.field_issues
            .iter()
            .find(|entry| entry.field == field)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub mode: Mode,
    pub upgrade_requested: bool,
    pub backup_dir: Option<PathBuf>,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn valid_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_valid())
    }

    pub fn problem_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.is_valid())
    }

    pub fn summary(&self) -> Summary {
        let text_files = self
            .files
            .iter()
            .filter(|f| f.format == Format::Text)
            .count();

        let mut versions: Vec<VersionCount> = Vec::new();
        for file in self.files.iter().filter(|f| f.format == Format::Text) {
            match versions.iter_mut().find(|v| v.version == file.version) {
                Some(entry) => entry.count += 1,
                None => versions.push(VersionCount {
                    version: file.version,
                    count: 1,
                }),
            }
        }
        // Known versions ascending, unknown last.
        versions.sort_by_key(|v| (v.version.is_none(), v.version));

        let field_issues: Vec<FieldCount> = Field::ALL
            .into_iter()
            .map(|field| FieldCount {
                field,
                count: self
                    .problem_files()
                    .filter(|f| f.diagnosis.as_ref().is_some_and(|d| !d.is_ok(field)))
                    .count(),
            })
            .collect();

        Summary {
            total: self.files.len(),
            text_files,
            binary_files: self.files.len() - text_files,
            versions,
            valid: self.valid_files().count(),
            problems: self.problem_files().count(),
            fixed: self.files.iter().filter(|f| f.was_fixed).count(),
            converted: self.files.iter().filter(|f| f.was_converted).count(),
            would_convert: self
                .files
                .iter()
                .filter(|f| matches!(f.upgrade, Some(UpgradeStatus::WouldUpgrade { .. })))
                .count(),
            total_issues: field_issues.iter().map(|entry| entry.count).sum(),
            field_issues,
        }
    }
}

pub struct Doctor<S: ByteSource> {
    config: RunConfig,
    engine: Engine,
    backups: BackupStore,
    source: S,
}

impl<S: ByteSource> Doctor<S> {
    pub fn new(config: RunConfig, stamp: &str, source: S) -> Self {
        let backups = BackupStore::new(config.root.clone(), stamp);
        Self {
            config,
            engine: Engine::new(),
            backups,
            source,
        }
    }

    pub fn run(&mut self) -> Result<RunReport, CoreError> {
        let files = scan::collect_dumps(&self.config.root).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to scan {}: {e}", self.config.root.display()),
            )
        })?;
        info!(
            root = %self.config.root.display(),
            files = files.len(),
            mode = ?self.config.mode,
            "scanning tag dumps"
        );

        let files: Vec<FileReport> = files.iter().map(|file| self.process(file)).collect();
        let backup_dir =
            (self.backups.backed_up_count() > 0).then(|| self.backups.backup_dir().to_path_buf());

        Ok(RunReport {
            root: self.config.root.clone(),
            mode: self.config.mode,
            upgrade_requested: self.config.upgrade,
            backup_dir,
            files,
        })
    }

    /// Never fails: any error is recorded on the returned report.
    pub fn process(&mut self, file: &DumpFile) -> FileReport {
        let mut report = FileReport::new(file);
        if let Err(e) = self.process_into(file, &mut report) {
            warn!(path = %file.relative.display(), error = %e, "file could not be processed");
            report.error = Some(e);
        }
        report
    }

    fn process_into(&mut self, file: &DumpFile, report: &mut FileReport) -> Result<(), CoreError> {
        let bytes = fs::read(&file.path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", file.path.display()),
            )
        })?;
        let mut session = self.engine.open_bytes(&bytes, file.format)?;
        report.version = session.version();

        if self.config.upgrade && file.format == Format::Text {
            if let Some(upgraded) = self.upgrade(file, &session, report)? {
                session = upgraded;
            }
        }

        let diagnosis = session.diagnose();
        let repairable = !diagnosis.all_valid() && diagnosis.blocker.is_none();
        report.diagnosis = Some(diagnosis);
        if self.config.mode.is_dry_run() || !repairable {
            return Ok(());
        }

        match session.repair(&self.config.fixes, &mut self.source)? {
            RepairOutcome::NoChanges => {
                debug!(path = %file.relative.display(), "no enabled fix applies");
            }
            RepairOutcome::Repaired(changes) => {
                let encoded = session.to_bytes_modified()?;
                self.backup(file, report);
                write_file(&file.path, &encoded)?;
                info!(
                    path = %file.relative.display(),
                    changes = changes.len(),
                    "repaired tag dump"
                );
                report.changes = changes;
                report.was_fixed = true;
                report.diagnosis = Some(session.diagnose());
            }
        }
        Ok(())
    }

    fn upgrade(
        &mut self,
        file: &DumpFile,
        session: &Session,
        report: &mut FileReport,
    ) -> Result<Option<Session>, CoreError> {
        let (from, text) = match session.upgrade_to_v4() {
            Ok(Upgrade::AlreadyCurrent) => {
                report.upgrade = Some(UpgradeStatus::AlreadyCurrent);
                return Ok(None);
            }
            Ok(Upgrade::Upgraded { from, text }) => (from, text),
            Err(e) if e.code == CoreErrorCode::UnsupportedVersion => {
                debug!(path = %file.relative.display(), reason = %e.message, "upgrade skipped");
                report.upgrade = Some(UpgradeStatus::Skipped { reason: e.message });
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if self.config.mode.is_dry_run() {
            report.upgrade = Some(UpgradeStatus::WouldUpgrade { from });
            return Ok(None);
        }

        self.backup(file, report);
        write_file(&file.path, text.as_bytes())?;
        info!(path = %file.relative.display(), from, "converted to V4");
        report.upgrade = Some(UpgradeStatus::Upgraded { from });
        report.was_converted = true;

        let upgraded = self.engine.open_bytes(text.as_bytes(), Format::Text)?;
        report.version = upgraded.version();
        Ok(Some(upgraded))
    }

    /// Backup failures are logged and do not stop the write that follows.
    fn backup(&self, file: &DumpFile, report: &mut FileReport) {
        match self.backups.backup(&file.path) {
            Ok(BackupOutcome::Created(dest)) => {
                info!(path = %file.relative.display(), backup = %dest.display(), "backed up");
                report.backup = Some(dest);
            }
            Ok(BackupOutcome::AlreadyBackedUp) => {
                debug!(path = %file.relative.display(), "already backed up this run");
            }
            Err(e) => {
                warn!(path = %file.relative.display(), error = %e, "could not create backup");
            }
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    fs::write(path, bytes).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Write,
            format!("failed to write {}: {e}", path.display()),
        )
    })
}
