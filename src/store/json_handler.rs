use std::io::{Read, Write};
use std::path::Path;

use serde_json::Value;

use crate::content::Record;
use crate::error::{PipelineError, Result};

/// Reads and writes record content as a JSON array of objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl JsonHandler {
    pub const WRITER: &'static str = "JsonHandler";

    pub fn decode(&self, mut input: impl Read, path: &Path) -> Result<Vec<Record>> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(PipelineError::io(path))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(&text).map_err(PipelineError::json(path))?;
        let Value::Array(items) = value else {
            return Err(PipelineError::validation(format!(
                "{} must contain a JSON array of objects",
                path.display()
            )));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(PipelineError::validation(format!(
                    "{}: element {} is not an object: {}",
                    path.display(),
                    i,
                    other
                ))),
            })
            .collect()
    }

    pub fn encode(&self, records: &[Record], mut output: impl Write, path: &Path) -> Result<()> {
        serde_json::to_writer_pretty(&mut output, records).map_err(PipelineError::json(path))?;
        output.write_all(b"\n").map_err(PipelineError::io(path))?;
        output.flush().map_err(PipelineError::io(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_file_is_empty() {
        let out = JsonHandler.decode("  \n".as_bytes(), Path::new("s.json")).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn rejects_non_array_documents() {
        let err = JsonHandler
            .decode(r#"{"id": 1}"#.as_bytes(), Path::new("s.json"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));

        let err = JsonHandler
            .decode(r#"[{"id": 1}, 2]"#.as_bytes(), Path::new("s.json"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DataValidation(_)));
    }

    #[test]
    fn malformed_json_reports_path() {
        let err = JsonHandler.decode("[{".as_bytes(), Path::new("s.json")).unwrap_err();
        assert!(err.to_string().contains("s.json"));
    }
}
