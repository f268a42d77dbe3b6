//! Sidecar write journal (`.meta.json`) shared by every data file in a directory.
//!
//! JSON shape, keyed by file name:
//! {
//!   "football_matches.csv": {
//!     "last_written": "2024-03-01T10:00:00Z",
//!     "writer": "CsvHandler",
//!     "rows": 12,
//!     "version": 3,
//!     "source_versions": { "espn": { "version_field": "created_at", "version_cutoff": "..." } }
//!   }
//! }
//!
//! Entries of other files are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};
use crate::versioning::{RecordedVersion, SourceVersions};

pub const JOURNAL_FILE: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub last_written: String,
    pub writer: String,
    pub rows: usize,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub source_versions: BTreeMap<String, RecordedVersion>,
}

impl JournalEntry {
    pub fn source_versions(&self) -> SourceVersions {
        SourceVersions::from_recorded(&self.source_versions)
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    key: String,
}

impl Journal {
    /// Journal for `file`, stored next to it.
    pub fn for_file(file: &Path) -> Result<Self> {
        let key = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::config(format!("{} has no usable file name", file.display()))
            })?
            .to_string();
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self {
            path: dir.join(JOURNAL_FILE),
            key,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(PipelineError::io(&self.path)(e)),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text).map_err(PipelineError::json(&self.path))? {
            Value::Object(map) => Ok(map),
            _ => Err(PipelineError::validation(format!(
                "{} must contain a JSON object",
                self.path.display()
            ))),
        }
    }

    /// The entry recorded for this file, if any.
    pub fn last_write(&self) -> Result<Option<JournalEntry>> {
        let mut doc = self.load()?;
        let Some(raw) = doc.remove(&self.key) else {
            return Ok(None);
        };
        serde_json::from_value(raw)
            .map(Some)
            .map_err(PipelineError::json(&self.path))
    }

    /// Entry describing a write happening now; `version` follows the previous entry.
    pub fn next_entry(
        &self,
        writer: &str,
        rows: usize,
        source_versions: &SourceVersions,
    ) -> Result<JournalEntry> {
        let previous = self.last_write()?.map(|e| e.version).unwrap_or(0);
        Ok(JournalEntry {
            last_written: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            writer: writer.to_string(),
            rows,
            version: previous + 1,
            source_versions: source_versions.to_recorded(),
        })
    }

    /// Write the updated journal to a temporary file beside the real one.
    /// The caller persists it once the data file is in place.
    pub fn stage(&self, entry: &JournalEntry) -> Result<NamedTempFile> {
        let mut doc = self.load()?;
        doc.insert(
            self.key.clone(),
            serde_json::to_value(entry).map_err(PipelineError::json(&self.path))?,
        );
        self.stage_doc(&doc)
    }

    fn stage_doc(&self, doc: &Map<String, Value>) -> Result<NamedTempFile> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let mut tmp = NamedTempFile::new_in(dir).map_err(PipelineError::io(dir))?;
        serde_json::to_writer_pretty(&mut tmp, doc).map_err(PipelineError::json(&self.path))?;
        tmp.write_all(b"\n").map_err(PipelineError::io(&self.path))?;
        Ok(tmp)
    }

    pub fn commit(&self, staged: NamedTempFile) -> Result<()> {
        staged
            .persist(&self.path)
            .map_err(|e| PipelineError::io(&self.path)(e.error))?;
        Ok(())
    }

    /// Drop this file's entry. The journal file goes away once it holds no entries.
    pub fn remove(&self) -> Result<()> {
        let mut doc = self.load()?;
        if doc.remove(&self.key).is_none() {
            return Ok(());
        }
        if doc.is_empty() {
            return fs::remove_file(&self.path).map_err(PipelineError::io(&self.path));
        }
        let staged = self.stage_doc(&doc)?;
        self.commit(staged)
    }
}
