use crate::form::record::Record;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// One assembled form: scalar fields, boolean flags and the repeated sections.
///
/// A model is built once through [`FormModelBuilder`] and not changed afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormModel {
    form: String,
    id_field: String,
    #[serde(default)]
    scalars: BTreeMap<String, String>,
    #[serde(default)]
    flags: BTreeMap<String, bool>,
    #[serde(default)]
    sections: BTreeMap<String, Vec<Record>>,
}

impl FormModel {
    pub fn builder(form: &str, id_field: &str) -> FormModelBuilder {
        FormModelBuilder {
            model: FormModel {
                form: form.to_owned(),
                id_field: id_field.to_owned(),
                ..FormModel::default()
            },
        }
    }

    /// Layout name the model was read with
    pub fn form(&self) -> &str {
        &self.form
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Value of the identifier field; empty when it was not found.
    pub fn identifier(&self) -> &str {
        self.scalar(&self.id_field)
    }

    pub fn scalar(&self, name: &str) -> &str {
        self.scalars.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Records of a section; empty when the section was absent.
    pub fn section(&self, name: &str) -> &[Record] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scalars(&self) -> &BTreeMap<String, String> {
        &self.scalars
    }

    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    pub fn sections(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.sections
    }

    /// Builder seeded with this model's content.
    pub fn to_builder(&self) -> FormModelBuilder {
        FormModelBuilder { model: self.clone() }
    }
}

pub struct FormModelBuilder {
    model: FormModel,
}

impl FormModelBuilder {
    pub fn scalar<V: Into<String>>(mut self, name: &str, value: V) -> Self {
        self.model.scalars.insert(name.to_owned(), value.into());
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.model.flags.insert(name.to_owned(), value);
        self
    }

    pub fn section(mut self, name: &str, records: Vec<Record>) -> Self {
        self.model.sections.insert(name.to_owned(), records);
        self
    }

    pub fn build(self) -> FormModel {
        self.model
    }
}
