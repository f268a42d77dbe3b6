use tracing::info;

use crate::content::Content;
use crate::enforce::{ConstraintEnforcer, build_enforcers, enforce_all};
use crate::error::{PipelineError, Result};
use crate::spec::OutputSpec;
use crate::store::{Confirm, JournalEntry, ReadMode, VersionedFile, WriteMode};
use crate::versioning::SourceVersions;

/// Merges processed data into a model's output and enforces its constraints.
#[derive(Debug)]
pub struct OutputManager {
    name: String,
    file: VersionedFile,
    enforcers: Vec<ConstraintEnforcer>,
}

impl OutputManager {
    pub fn new(spec: &OutputSpec) -> Result<Self> {
        Ok(Self {
            name: spec.name.clone(),
            file: VersionedFile::open(&spec.path)?.with_confirm(Confirm::AssumeYes),
            enforcers: build_enforcers(spec),
        })
    }

    pub fn file(&self) -> &VersionedFile {
        &self.file
    }

    /// Append `data` to the existing output, enforce, and persist with `source_versions`.
    pub fn write(&self, data: Content, source_versions: &SourceVersions) -> Result<JournalEntry> {
        if data.kind() != self.file.kind() {
            return Err(PipelineError::validation(format!(
                "output '{}' stores {} content, processor produced {}",
                self.name,
                self.file.kind(),
                data.kind()
            )));
        }
        let existing = self.file.read(&ReadMode::All)?;
        let incoming = data.len();
        let merged = existing.concat(data)?;
        let enforced = enforce_all(&self.enforcers, merged)?;
        info!(
            "output '{}': {} new rows, {} after constraints",
            self.name,
            incoming,
            enforced.len()
        );
        self.file.write(enforced, source_versions, WriteMode::Overwrite)
    }

    /// Delete the output file and its journal entry.
    pub fn reset(&self) -> Result<()> {
        self.file.delete(true)?;
        info!("output '{}' reset", self.name);
        Ok(())
    }

    /// Watermarks recorded by the last write, `None` before the first one.
    pub fn read_source_versions(&self) -> Result<Option<SourceVersions>> {
        Ok(self.file.last_write()?.map(|entry| entry.source_versions()))
    }
}
