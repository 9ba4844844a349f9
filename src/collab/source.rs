use crate::error::ResultMessage;
use crate::error::RustyEcrError;
use crate::form::model::FormModel;
use std::path::Path;

/// Loads form models for the write path from JSON documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonModelSource;

impl JsonModelSource {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<FormModel, RustyEcrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Read model '{}'", path.display()))?;
        JsonModelSource::parse(&content).with_prefix(&format!("Parse model '{}'", path.display()))
    }

    pub fn parse(content: &str) -> Result<FormModel, RustyEcrError> {
        let model: FormModel = serde_json::from_str(content)?;
        log::debug!(
            "Loaded {} '{}' with {} section(s)",
            model.form(),
            model.identifier(),
            model.sections().len()
        );
        Ok(model)
    }
}
