use crate::content::Content;
use crate::error::{PipelineError, Result};
use crate::processors::{Sources, source};
use crate::spec::Params;

/// `select_source{source}`: the named loaded source, unchanged.
pub fn select_source(sources: &Sources, params: &Params) -> Result<Content> {
    let name = params.str("source")?;
    Ok(source(sources, name)?.clone())
}

/// `concat_sources{sources?}`: the named sources concatenated (all of them, in name order, by default).
pub fn concat_sources(sources: &Sources, params: &Params) -> Result<Content> {
    let names = match params.opt_str_list("sources")? {
        Some(names) => names,
        None => sources.keys().cloned().collect(),
    };
    let mut parts = names.iter().map(|name| source(sources, name));
    let first = parts
        .next()
        .ok_or_else(|| PipelineError::config("concat_sources needs at least one source"))??
        .clone();
    parts.try_fold(first, |acc, part| acc.concat(part?.clone()))
}
