//! Entry points tying a workbook, a layout and the collaborators together.

use crate::collab::notify::Notifier;
use crate::collab::notify::Recipient;
use crate::collab::notify::RecipientGroups;
use crate::collab::sink::PersistenceSink;
use crate::collab::validate::Validation;
use crate::collab::validate::Validator;
use crate::error::RustyEcrError;
use crate::form::layout::assemble;
use crate::form::layout::fill;
use crate::form::layout::FillReport;
use crate::form::layout::FormLayout;
use crate::form::model::FormModel;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::Session;
use std::path::Path;

/// Reads one form from the layout's sheet (or the sheet named by `criteria`).
pub fn read_form<P: AsRef<Path>>(path: P, layout: &FormLayout, criteria: &Criteria) -> Result<FormModel, RustyEcrError> {
    let session = Session::read(path, criteria.resolve_sheet_index(layout.sheet_index), criteria)?;
    let model = assemble(session.grid(), layout, criteria);
    log::info!("Read {} '{}' from '{}'", layout.name, model.identifier(), session.name());
    Ok(model)
}

/// Writes a model into the workbook and saves it in place. Nothing is saved when filling fails.
pub fn write_form<P: AsRef<Path>>(
    path: P,
    layout: &FormLayout,
    model: &FormModel,
    criteria: &Criteria,
) -> Result<FillReport, RustyEcrError> {
    let mut session = Session::write(path, criteria.resolve_sheet_index(layout.sheet_index), criteria)?;
    let report = fill(session.grid_mut(), layout, model, criteria)?;
    if !report.missing.is_empty() {
        log::warn!("{} '{}': not found in sheet: {}", layout.name, model.identifier(), report.missing.join(", "));
    }
    session.commit()?;
    Ok(report)
}

/// What [`ingest`] did with one workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct IngestOutcome {
    pub model: FormModel,
    pub validation: Validation,
    pub persisted: bool,
    /// Recipients the notifier could not reach; empty when nothing was sent
    pub failed_recipients: Vec<Recipient>,
}

/// Reads and validates a form. A valid form is persisted, and a persisted form is announced
/// to the recipients.
pub fn ingest<P: AsRef<Path>>(
    path: P,
    layout: &FormLayout,
    criteria: &Criteria,
    validator: &dyn Validator,
    sink: &mut dyn PersistenceSink,
    notifier: &mut dyn Notifier,
    recipients: &RecipientGroups,
) -> Result<IngestOutcome, RustyEcrError> {
    let model = read_form(path, layout, criteria)?;
    let validation = validator.validate(&model);
    if !validation.is_ok() {
        log::info!(
            "{} '{}' failed validation with {} error(s)",
            layout.name,
            model.identifier(),
            validation.errors.len()
        );
        return Ok(IngestOutcome {
            model,
            validation,
            persisted: false,
            failed_recipients: Vec::new(),
        });
    }
    sink.write(&model)?;
    let failed_recipients = notifier.notify(recipients, &model);
    Ok(IngestOutcome {
        model,
        validation,
        persisted: true,
        failed_recipients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::layouts::change_request;
    use crate::spreadsheet::SpreadsheetError;

    #[test]
    fn unsupported_extension_is_refused() {
        let error = read_form("form.txt", &change_request::layout(), &Criteria::default()).unwrap_err();
        assert_eq!(
            error.as_spreadsheet_error(),
            Some(&SpreadsheetError::InvalidFileFormat("form.txt".to_owned()))
        );
    }

    #[test]
    fn missing_workbook_names_the_file() {
        let model = FormModel::builder(change_request::NAME, change_request::ID_FIELD).build();
        let error = write_form("/nonexistent/form.xlsx", &change_request::layout(), &model, &Criteria::default()).unwrap_err();
        assert!(error.to_string().starts_with("Open '/nonexistent/form.xlsx'"));
    }
}
