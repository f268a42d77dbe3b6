use tracing::{debug, info, warn};

use crate::error::Result;
use crate::processors::Sources;
use crate::spec::SourceSpec;
use crate::store::{ReadMode, VersionedFile};
use crate::versioning::{SourceVersion, SourceVersions, VersioningStrategy};

/// Reads a model's sources, honoring each source's versioning strategy.
#[derive(Debug)]
pub struct SourcesManager {
    sources: Vec<(SourceSpec, VersionedFile)>,
}

impl SourcesManager {
    pub fn new(specs: &[SourceSpec]) -> Result<Self> {
        let sources = specs
            .iter()
            .map(|spec| -> Result<(SourceSpec, VersionedFile)> {
                Ok((spec.clone(), VersionedFile::open(&spec.path)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources })
    }

    /// Content of every source, filtered to rows past the recorded watermarks.
    pub fn get_loaded_sources(&self, previous: Option<&SourceVersions>) -> Result<Sources> {
        let mut loaded = Sources::new();
        for (spec, file) in &self.sources {
            let mode = match &spec.versioning {
                Some(strategy) if strategy.filters() => {
                    read_mode(&spec.name, strategy, previous.and_then(|v| v.get(&spec.name)))?
                }
                _ => ReadMode::All,
            };
            let content = file.read(&mode)?;
            info!("loaded {} rows from source '{}'", content.len(), spec.name);
            loaded.insert(spec.name.clone(), content);
        }
        Ok(loaded)
    }

    /// Maximum version value of each versioned source as it is on disk now.
    pub fn get_new_source_versions(&self) -> Result<SourceVersions> {
        let mut versions = SourceVersions::new();
        for (spec, file) in &self.sources {
            let Some(strategy) = &spec.versioning else {
                continue;
            };
            let content = file.read(&ReadMode::All)?;
            match content.max_version(&strategy.field, strategy.version_type)? {
                Some(cutoff) => {
                    debug!("source '{}': new cutoff {} = {}", spec.name, strategy.field, cutoff);
                    versions.insert(spec.name.clone(), SourceVersion::new(strategy.field.clone(), cutoff)?)?;
                }
                None => debug!("source '{}': no values in '{}'", spec.name, strategy.field),
            }
        }
        Ok(versions)
    }
}

fn read_mode(
    name: &str,
    strategy: &VersioningStrategy,
    recorded: Option<&SourceVersion>,
) -> Result<ReadMode> {
    let threshold = match recorded {
        None => {
            debug!("source '{}': no recorded version, reading from the floor", name);
            None
        }
        Some(v) if v.version_field() != strategy.field => {
            warn!(
                "source '{}': recorded version is on '{}' but versioning uses '{}', loading everything",
                name,
                v.version_field(),
                strategy.field
            );
            return Ok(ReadMode::All);
        }
        Some(v) => Some(
            strategy
                .version_type
                .parse_field(&strategy.field, v.version_cutoff())?,
        ),
    };
    Ok(ReadMode::Newest {
        field: strategy.field.clone(),
        threshold,
        version_type: strategy.version_type,
    })
}
