use crate::error::ResultMessage;
use crate::error::RustyEcrError;
use crate::form::model::FormModel;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by persistence sinks.
#[derive(Error, Debug, PartialEq)]
pub enum SinkError {
    /// The model's identifier field is empty, so it has no upsert key
    #[error("Form '{form}' has no value for identifier field '{field}'")]
    MissingIdentifier { form: String, field: String },
}

/// Destination of assembled forms: an upsert keyed by form name and identifier.
pub trait PersistenceSink {
    fn write(&mut self, model: &FormModel) -> Result<(), RustyEcrError>;
}

fn upsert_key(model: &FormModel) -> Result<(String, String), SinkError> {
    let id = model.identifier().trim();
    if id.is_empty() {
        return Err(SinkError::MissingIdentifier {
            form: model.form().to_owned(),
            field: model.id_field().to_owned(),
        });
    }
    Ok((model.form().to_owned(), id.to_owned()))
}

/// Keeps the latest model per key in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    models: BTreeMap<(String, String), FormModel>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    pub fn get(&self, form: &str, id: &str) -> Option<&FormModel> {
        self.models.get(&(form.to_owned(), id.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl PersistenceSink for MemorySink {
    fn write(&mut self, model: &FormModel) -> Result<(), RustyEcrError> {
        let key = upsert_key(model)?;
        let replaced = self.models.insert(key, model.clone()).is_some();
        log::info!(
            "{} {} '{}' in memory",
            if replaced { "Updated" } else { "Stored" },
            model.form(),
            model.identifier()
        );
        Ok(())
    }
}

/// Writes one pretty-printed `<form>-<id>.json` file per model into a directory.
#[derive(Debug, Clone)]
pub struct JsonDirectorySink {
    directory: PathBuf,
}

impl JsonDirectorySink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        JsonDirectorySink {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// File a model with this key is stored in. Characters outside `[A-Za-z0-9._-]` in the
    /// identifier become `_`.
    pub fn path_for(&self, form: &str, id: &str) -> PathBuf {
        let id: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect();
        self.directory.join(format!("{}-{}.json", form, id))
    }
}

impl PersistenceSink for JsonDirectorySink {
    fn write(&mut self, model: &FormModel) -> Result<(), RustyEcrError> {
        let (form, id) = upsert_key(model)?;
        let path = self.path_for(&form, &id);
        std::fs::create_dir_all(&self.directory)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Create '{}'", self.directory.display()))?;
        let json = serde_json::to_string_pretty(model)?;
        std::fs::write(&path, json)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Write '{}'", path.display()))?;
        log::info!("Saved {} '{}' to '{}'", form, id, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn model(id: &str, reason: &str) -> FormModel {
        FormModel::builder("change_request", "change_request_no")
            .scalar("change_request_no", id)
            .scalar("reason", reason)
            .build()
    }

    #[test]
    fn memory_sink_upserts() -> Result<(), RustyEcrError> {
        let mut sink = MemorySink::new();
        sink.write(&model("CR-1", "first"))?;
        sink.write(&model("CR-2", "other"))?;
        sink.write(&model("CR-1", "second"))?;
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.get("change_request", "CR-1").map(|m| m.scalar("reason")), Some("second"));
        Ok(())
    }

    #[test]
    fn missing_identifier_is_refused() {
        let mut sink = MemorySink::new();
        let error = sink.write(&model("  ", "x")).unwrap_err();
        match error {
            RustyEcrError::SinkError(SinkError::MissingIdentifier { form, field }) => {
                assert_eq!(form, "change_request");
                assert_eq!(field, "change_request_no");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn json_directory_sink_overwrites() -> Result<(), RustyEcrError> {
        let dir = tempdir()?;
        let mut sink = JsonDirectorySink::new(dir.path().join("out"));
        sink.write(&model("CR/1", "first"))?;
        sink.write(&model("CR/1", "second"))?;
        let path = sink.path_for("change_request", "CR/1");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("change_request-CR_1.json"));
        let stored: FormModel = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(stored.scalar("reason"), "second");
        assert_eq!(std::fs::read_dir(dir.path().join("out"))?.count(), 1);
        Ok(())
    }
}
