use tracing::info;

use crate::content::Content;
use crate::error::Result;
use crate::processors::{ProcessorRegistry, Sources};
use crate::spec::ProcessingSpec;

/// Resolves a model's processor once and runs it over loaded sources.
pub struct ProcessingManager<'r> {
    spec: &'r ProcessingSpec,
    registry: &'r ProcessorRegistry,
}

impl<'r> ProcessingManager<'r> {
    /// Fails with `Configuration` when the processor is not registered.
    pub fn new(spec: &'r ProcessingSpec, registry: &'r ProcessorRegistry) -> Result<Self> {
        registry.get(&spec.processor)?;
        Ok(Self { spec, registry })
    }

    pub fn process(&self, sources: &Sources) -> Result<Content> {
        let processor = self.registry.get(&self.spec.processor)?;
        let out = processor.run(sources, &self.spec.params)?;
        info!("processor '{}' produced {} rows", self.spec.processor, out.len());
        Ok(out)
    }
}
