//! Versioned file store: one data file, a format handler chosen by extension,
//! and the sidecar journal describing the last write.

pub mod csv_handler;
pub mod journal;
pub mod json_handler;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info};

use crate::content::{Content, ContentKind, VersionType, VersionValue};
use crate::error::{PipelineError, Result};
use crate::versioning::SourceVersions;

pub use csv_handler::CsvHandler;
pub use journal::{JOURNAL_FILE, Journal, JournalEntry};
pub use json_handler::JsonHandler;

#[derive(Debug, Clone, Copy)]
pub enum Handler {
    Csv(CsvHandler),
    Json(JsonHandler),
}

impl Handler {
    pub fn for_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv(CsvHandler)),
            Some("json") => Ok(Self::Json(JsonHandler)),
            Some(other) => Err(PipelineError::config(format!(
                "no handler for '.{}' files: {}",
                other,
                path.display()
            ))),
            None => Err(PipelineError::config(format!(
                "cannot pick a handler for a path without extension: {}",
                path.display()
            ))),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Csv(_) => ContentKind::Table,
            Self::Json(_) => ContentKind::Records,
        }
    }

    pub fn writer_name(&self) -> &'static str {
        match self {
            Self::Csv(_) => CsvHandler::WRITER,
            Self::Json(_) => JsonHandler::WRITER,
        }
    }

    fn decode(&self, file: File, path: &Path) -> Result<Content> {
        let input = BufReader::new(file);
        match self {
            Self::Csv(h) => h.decode(input, path).map(Content::Table),
            Self::Json(h) => h.decode(input, path).map(Content::Records),
        }
    }

    fn encode(&self, content: &Content, output: impl Write, path: &Path) -> Result<()> {
        match (self, content) {
            (Self::Csv(h), Content::Table(t)) => h.encode(t, output, path),
            (Self::Json(h), Content::Records(r)) => h.encode(r, output, path),
            (h, c) => Err(kind_mismatch(path, h.kind(), c.kind())),
        }
    }
}

fn kind_mismatch(path: &Path, expected: ContentKind, got: ContentKind) -> PipelineError {
    PipelineError::validation(format!(
        "{} stores {} content, got {}",
        path.display(),
        expected,
        got
    ))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadMode {
    All,
    /// Rows whose `field` is strictly greater than `threshold` (the type floor when `None`).
    Newest {
        field: String,
        threshold: Option<VersionValue>,
        version_type: VersionType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    Overwrite,
}

/// Gate in front of destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirm {
    /// Ask on stdin.
    #[default]
    Prompt,
    AssumeYes,
    AssumeNo,
}

impl Confirm {
    pub fn ask(self, question: &str) -> Result<bool> {
        match self {
            Self::AssumeYes => Ok(true),
            Self::AssumeNo => Ok(false),
            Self::Prompt => {
                let stdin = Path::new("<stdin>");
                let mut stderr = io::stderr();
                write!(stderr, "{} [y/N] ", question).map_err(PipelineError::io(stdin))?;
                stderr.flush().map_err(PipelineError::io(stdin))?;
                let mut answer = String::new();
                io::stdin()
                    .lock()
                    .read_line(&mut answer)
                    .map_err(PipelineError::io(stdin))?;
                Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct VersionedFile {
    path: PathBuf,
    handler: Handler,
    journal: Journal,
    confirm: Confirm,
}

impl VersionedFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.is_dir() {
            return Err(PipelineError::config(format!(
                "{} is a directory, expected a data file",
                path.display()
            )));
        }
        let handler = Handler::for_path(&path)?;
        let journal = Journal::for_file(&path)?;
        Ok(Self {
            path,
            handler,
            journal,
            confirm: Confirm::default(),
        })
    }

    pub fn with_confirm(mut self, confirm: Confirm) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ContentKind {
        self.handler.kind()
    }

    pub fn writer_name(&self) -> &'static str {
        self.handler.writer_name()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn last_write(&self) -> Result<Option<JournalEntry>> {
        self.journal.last_write()
    }

    pub fn read(&self, mode: &ReadMode) -> Result<Content> {
        let content = self.read_all()?;
        match mode {
            ReadMode::All => Ok(content),
            ReadMode::Newest {
                field,
                threshold,
                version_type,
            } => {
                let threshold = threshold.unwrap_or_else(|| version_type.floor());
                let newer = content.filter_newer(field, threshold, *version_type)?;
                debug!(
                    "{}: {} of {} rows newer than {:?} on '{}'",
                    self.path.display(),
                    newer.len(),
                    content.len(),
                    threshold,
                    field
                );
                Ok(newer)
            }
        }
    }

    fn read_all(&self) -> Result<Content> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Content::empty(self.kind()));
            }
            Err(e) => return Err(PipelineError::io(&self.path)(e)),
        };
        self.handler.decode(file, &self.path)
    }

    /// Persist `content` and record the write in the journal.
    ///
    /// Both files are staged in the target directory before either is moved into place.
    pub fn write(
        &self,
        content: Content,
        source_versions: &SourceVersions,
        mode: WriteMode,
    ) -> Result<JournalEntry> {
        if content.kind() != self.kind() {
            return Err(kind_mismatch(&self.path, self.kind(), content.kind()));
        }

        let content = match mode {
            WriteMode::Append => self.read_all()?.concat(content)?,
            WriteMode::Overwrite => {
                if self.exists()
                    && !self
                        .confirm
                        .ask(&format!("Overwrite {}?", self.path.display()))?
                {
                    return Err(PipelineError::WriteCancelled(self.path.clone()));
                }
                content
            }
        };

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(PipelineError::io(dir))?;
        let staged = self.stage_content(&content)?;
        let entry = self
            .journal
            .next_entry(self.writer_name(), content.len(), source_versions)?;
        let staged_journal = self.journal.stage(&entry)?;

        self.replace(staged, staged_journal)?;

        info!(
            "wrote {} rows to {} (journal version {})",
            entry.rows,
            self.path.display(),
            entry.version
        );
        Ok(entry)
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn stage_content(&self, content: &Content) -> Result<NamedTempFile> {
        let dir = self.dir();
        let mut tmp = NamedTempFile::new_in(dir).map_err(PipelineError::io(dir))?;
        self.handler
            .encode(content, io::BufWriter::new(tmp.as_file_mut()), &self.path)?;
        Ok(tmp)
    }

    /// Move both staged files into place. The previous data file is back unless the
    /// journal commit succeeds.
    fn replace(&self, staged: NamedTempFile, staged_journal: NamedTempFile) -> Result<()> {
        let previous = self.set_aside()?;
        if let Err(err) = self.install(staged, staged_journal) {
            self.restore(previous)?;
            return Err(err);
        }
        Ok(())
    }

    /// Move the current data file to a hidden temporary path in the same directory.
    fn set_aside(&self) -> Result<Option<TempPath>> {
        if !self.exists() {
            return Ok(None);
        }
        let dir = self.dir();
        let backup = tempfile::Builder::new()
            .prefix(".prev-")
            .tempfile_in(dir)
            .map_err(PipelineError::io(dir))?
            .into_temp_path();
        fs::rename(&self.path, &backup).map_err(PipelineError::io(&self.path))?;
        Ok(Some(backup))
    }

    fn install(&self, staged: NamedTempFile, staged_journal: NamedTempFile) -> Result<()> {
        staged
            .persist(&self.path)
            .map_err(|e| PipelineError::io(&self.path)(e.error))?;
        self.journal.commit(staged_journal)
    }

    fn restore(&self, previous: Option<TempPath>) -> Result<()> {
        match previous {
            Some(backup) => backup
                .persist(&self.path)
                .map_err(|e| PipelineError::io(&self.path)(e.error)),
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(PipelineError::io(&self.path)(e)),
                _ => Ok(()),
            },
        }
    }

    /// Remove the data file and its journal entry. Returns false when the gate declined.
    pub fn delete(&self, force: bool) -> Result<bool> {
        if !force && !self.confirm.ask(&format!("Delete {}?", self.path.display()))? {
            info!("delete of {} declined", self.path.display());
            return Ok(false);
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io(&self.path)(e)),
        }
        self.journal.remove()?;
        info!("deleted {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Table;
    use pretty_assertions::assert_eq;

    fn ids(values: &[&str]) -> Content {
        Content::Table(
            Table::from_rows(["id"], values.iter().map(|v| vec![Some(v.to_string())]).collect())
                .unwrap(),
        )
    }

    /// Stage a write, then turn the journal target into a directory so the commit fails.
    fn failing_replace(file: &VersionedFile, content: &Content) -> Result<()> {
        let staged = file.stage_content(content)?;
        let entry = file
            .journal
            .next_entry(file.writer_name(), content.len(), &SourceVersions::new())?;
        let staged_journal = file.journal.stage(&entry)?;
        let _ = fs::remove_file(file.journal.path());
        fs::create_dir(file.journal.path()).unwrap();
        file.replace(staged, staged_journal)
    }

    #[test]
    fn failed_journal_commit_restores_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = VersionedFile::open(dir.path().join("m.csv")).unwrap();
        file.write(ids(&["1"]), &SourceVersions::new(), WriteMode::Overwrite)
            .unwrap();
        let before = fs::read_to_string(file.path()).unwrap();

        assert!(failing_replace(&file, &ids(&["1", "2"])).is_err());
        assert_eq!(fs::read_to_string(file.path()).unwrap(), before);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 2, "only m.csv and the journal path remain");
    }

    #[test]
    fn failed_first_commit_leaves_no_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = VersionedFile::open(dir.path().join("m.csv")).unwrap();
        assert!(failing_replace(&file, &ids(&["1"])).is_err());
        assert!(!file.exists());
    }

    #[test]
    fn open_and_read_touch_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = VersionedFile::open(dir.path().join("landing/espn.json")).unwrap();
        assert!(file.read(&ReadMode::All).unwrap().is_empty());
        assert_eq!(file.last_write().unwrap(), None);
        assert!(!dir.path().join("landing").exists());
    }
}
