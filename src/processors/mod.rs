//! Named processors turning loaded sources into model output.

pub mod dates;
pub mod remap;
pub mod select;

use std::collections::BTreeMap;
use std::fmt;

use crate::content::Content;
use crate::error::{PipelineError, Result};
use crate::spec::Params;

/// Loaded source content keyed by source name.
pub type Sources = BTreeMap<String, Content>;

pub trait Processor {
    fn run(&self, sources: &Sources, params: &Params) -> Result<Content>;
}

impl<F> Processor for F
where
    F: Fn(&Sources, &Params) -> Result<Content>,
{
    fn run(&self, sources: &Sources, params: &Params) -> Result<Content> {
        self(sources, params)
    }
}

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Box<dyn Processor>>,
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.processors.keys()).finish()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in processors.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Box<dyn Processor>); 4] = [
            ("select_source", Box::new(select::select_source)),
            ("concat_sources", Box::new(select::concat_sources)),
            ("remap_columns", Box::new(remap::remap_columns)),
            ("standardize_dates", Box::new(dates::standardize_dates)),
        ];
        for (name, processor) in builtins {
            registry.processors.insert(name.to_string(), processor);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, processor: impl Processor + 'static) -> Result<()> {
        let name = name.into();
        if self.processors.contains_key(&name) {
            return Err(PipelineError::config(format!(
                "processor '{}' is already registered",
                name
            )));
        }
        self.processors.insert(name, Box::new(processor));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&dyn Processor> {
        self.processors
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| PipelineError::config(format!("unknown processor '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }
}

/// Look up a loaded source by name.
pub fn source<'a>(sources: &'a Sources, name: &str) -> Result<&'a Content> {
    sources.get(name).ok_or_else(|| {
        PipelineError::config(format!(
            "unknown source '{}', loaded sources: [{}]",
            name,
            sources.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    })
}
