//! Business-rule validation of assembled forms.

use crate::form::layouts::change_request;
use crate::form::layouts::field_change_request;
use crate::form::model::FormModel;
use serde::Serialize;

/// Validation outcome: the form passes when no error was collected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub errors: Vec<String>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn require(&mut self, value: &str, caption: &str) {
        if value.trim().is_empty() {
            self.errors.push(format!("{} is required", caption));
        }
    }

    /// An empty value passes; anything else must be one of `allowed`.
    fn one_of(&mut self, value: &str, allowed: &[&str], caption: &str) {
        if !value.is_empty() && !allowed.contains(&value) {
            self.errors.push(format!(
                "{} must be one of: {} (got '{}')",
                caption,
                allowed.join(", "),
                value
            ));
        }
    }
}

pub trait Validator {
    fn validate(&self, model: &FormModel) -> Validation;
}

/// Rules of the Change Request form.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangeRequestValidator;

const DOCUMENTATION_TYPES: [&str; 5] = ["MLA", "CLA", "MDD", "DDD", "DD"];
const NSC_CATEGORIES: [&str; 7] = ["b/bb", "ba", "a/ab", "aa", "b", "a", "bb"];
const CR_METHODS: [&str; 3] = ["Simple", "Normal", "Complex"];

impl Validator for ChangeRequestValidator {
    fn validate(&self, model: &FormModel) -> Validation {
        let mut validation = Validation::default();
        for (field, caption) in [
            (change_request::ID_FIELD, "Change Request No"),
            ("contractor_change_coordinator", "Contractor Change Coordinator"),
            ("initiator_organization", "Initiator's organization"),
            ("change_initiator", "Change Initiator"),
            ("reason", "Reason of Engineering Change"),
            ("technical_solution_description", "Initiator's description of technical solution"),
        ] {
            validation.require(model.scalar(field), caption);
        }

        let others = model.section(change_request::OTHER_TDD_IMPACTS);
        if others
            .iter()
            .any(|record| record.get("evaluation_organization").trim().is_empty())
        {
            validation
                .errors
                .push("Evaluation organization is required in section 2.2".to_owned());
        }

        let documentation_type = model.scalar("documentation_type");
        if !documentation_type.is_empty() {
            let parts: Vec<&str> = documentation_type
                .split('/')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect();
            if parts.is_empty() {
                validation
                    .errors
                    .push("Type of documentation cannot consist of '/' only".to_owned());
            }
            for part in parts {
                validation.one_of(part, &DOCUMENTATION_TYPES, "Type of documentation");
            }
        }
        validation.one_of(model.scalar("final_nsc_category"), &NSC_CATEGORIES, "Final NSC category");
        validation.one_of(model.scalar("cr_method"), &CR_METHODS, "Method of CR");

        for (section, number) in [
            (change_request::INITIATOR_TDD_IMPACTS, "2.1"),
            (change_request::OTHER_TDD_IMPACTS, "2.2"),
        ] {
            for record in model.section(section) {
                let code = record.get("tdd_code");
                if code.is_empty() {
                    continue;
                }
                for (field, caption) in [
                    ("revision", "Revision"),
                    ("tdd_name", "TDD name"),
                    ("tdd_state", "TDD state"),
                    ("change_description", "Engineering Change description"),
                ] {
                    if record.get(field).is_empty() {
                        validation
                            .errors
                            .push(format!("TDD code '{}' in section {} has no {}", code, number, caption));
                    }
                }
            }
        }

        for record in model.section(change_request::AFFECTED_SSCS) {
            let code = record.get("kks_code");
            if code.is_empty() {
                continue;
            }
            for (field, caption) in [("ssc_name", "Name of SSC"), ("change_description", "Engineering Change description")] {
                if record.get(field).is_empty() {
                    validation
                        .errors
                        .push(format!("KKS code '{}' in section 2.3 has no {}", code, caption));
                }
            }
        }

        for (field, caption) in [
            ("reason", "Reason of Engineering Change"),
            ("technical_solution_description", "Initiator's description of technical solution"),
        ] {
            if !model.scalar(field).is_ascii() {
                validation
                    .errors
                    .push(format!("{} must contain English text only", caption));
            }
        }
        validation
    }
}

/// Rules of the Field Change Request form.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldChangeRequestValidator;

const APPROVAL_METHODS: [&str; 2] = ["Normal", "Simple"];

impl Validator for FieldChangeRequestValidator {
    fn validate(&self, model: &FormModel) -> Validation {
        let mut validation = Validation::default();
        for (field, caption) in [
            (field_change_request::ID_FIELD, "Field Change Request No"),
            ("registration_date", "Registration date"),
            ("contractor_change_coordinator", "Contractor's Change Coordinator"),
            ("change_initiator_organization", "Change Initiator's organization"),
            ("change_initiator", "Change Initiator"),
            ("change_initiator_position", "Position of the Change Initiator"),
            ("reason_code", "Code of reason of engineering change"),
            ("description", "Description of Engineering Change"),
        ] {
            validation.require(model.scalar(field), caption);
        }

        validation.one_of(model.scalar("documentation_type"), &["DDD", "MDD"], "Type of documentation to be changed");
        validation.one_of(
            model.scalar("type_of_changes"),
            &["Replacing Of Materials", "Documentation Red Change"],
            "Type of changes",
        );
        validation.one_of(model.scalar("type_of_activity"), &["Construction", "Manufacturing"], "Type of activity");
        validation.one_of(model.scalar("construction_facility"), &["NPP", "CEB"], "Construction facility");
        validation.one_of(
            model.scalar("initiator_proposal_method"),
            &APPROVAL_METHODS,
            "Initiator's proposal for choosing an approval method",
        );
        validation.one_of(model.scalar("final_approval_method"), &APPROVAL_METHODS, "Final approval method");

        if model.scalar("initiator_proposal_method") == "Simple" && model.scalar("simple_method_justification").is_empty() {
            validation.errors.push(
                "Justification of the 'simple' approval method is required when the initiator proposes Simple".to_owned(),
            );
        }
        if model.scalar("final_approval_method") == "Simple" && model.scalar("final_approval_justification").is_empty() {
            validation
                .errors
                .push("Justification is required when Final approval method is Simple".to_owned());
        }

        for record in model.section(field_change_request::KKS) {
            let building = record.get("building_kks");
            if !building.is_empty() && (record.get("system_kks").is_empty() || record.get("component_kks").is_empty()) {
                validation.errors.push(format!(
                    "Building KKS '{}' requires System KKS and Component KKS",
                    building
                ));
            }
        }

        for record in model.section(field_change_request::DOCUMENTS) {
            let code = record.get("document_set_code");
            let incomplete = [
                "set_revision",
                "engineering_document_code",
                "engineering_document_name",
                "document_revision",
                "sheets_or_pages",
                "change_amx",
            ]
            .iter()
            .any(|field| record.get(field).is_empty());
            if !code.is_empty() && incomplete {
                validation.errors.push(format!(
                    "Document Set Code '{}' requires Set Revision, Eng Doc Code, Eng Doc Name, ED Revision, Sheets and Change AMx",
                    code
                ));
            }
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::record::Record;

    fn valid_change_request() -> FormModel {
        FormModel::builder(change_request::NAME, change_request::ID_FIELD)
            .scalar("change_request_no", "CR-1")
            .scalar("contractor_change_coordinator", "Smith")
            .scalar("initiator_organization", "ACME")
            .scalar("change_initiator", "Jones")
            .scalar("reason", "Pipe routing clash")
            .scalar("technical_solution_description", "Reroute")
            .scalar("documentation_type", "MDD/DDD")
            .scalar("final_nsc_category", "a/ab")
            .scalar("cr_method", "Simple")
            .build()
    }

    #[test]
    fn complete_change_request_passes() {
        assert_eq!(ChangeRequestValidator.validate(&valid_change_request()), Validation::default());
    }

    #[test]
    fn change_request_rules() {
        let model = valid_change_request()
            .to_builder()
            .scalar("change_request_no", "")
            .scalar("documentation_type", "MDD/XYZ")
            .scalar("cr_method", "Fast")
            .scalar("reason", "Причина")
            .section(
                change_request::INITIATOR_TDD_IMPACTS,
                vec![Record::new().with("tdd_code", "T-1").with("revision", "A").with("tdd_name", "Plan").with("tdd_state", "Issued")],
            )
            .section(change_request::OTHER_TDD_IMPACTS, vec![Record::new().with("tdd_code", "T-2")])
            .build();
        let errors = ChangeRequestValidator.validate(&model).errors;
        assert!(errors.contains(&"Change Request No is required".to_owned()));
        assert!(errors.contains(&"Evaluation organization is required in section 2.2".to_owned()));
        assert!(errors.iter().any(|error| error.contains("'XYZ'")));
        assert!(errors.iter().any(|error| error.starts_with("Method of CR")));
        assert!(errors.contains(&"TDD code 'T-1' in section 2.1 has no Engineering Change description".to_owned()));
        assert!(errors.contains(&"Reason of Engineering Change must contain English text only".to_owned()));
        assert_eq!(errors.iter().filter(|error| error.contains("'T-2'")).count(), 4);
    }

    #[test]
    fn slashes_only_documentation_type() {
        let model = valid_change_request().to_builder().scalar("documentation_type", " / ").build();
        let errors = ChangeRequestValidator.validate(&model).errors;
        assert_eq!(errors, vec!["Type of documentation cannot consist of '/' only".to_owned()]);
    }

    #[test]
    fn field_change_request_rules() {
        let model = FormModel::builder(field_change_request::NAME, field_change_request::ID_FIELD)
            .scalar("field_change_request_no", "FCR-1")
            .scalar("registration_date", "01.02.2024")
            .scalar("contractor_change_coordinator", "Smith")
            .scalar("change_initiator_organization", "ACME")
            .scalar("change_initiator", "Jones")
            .scalar("change_initiator_position", "Engineer")
            .scalar("reason_code", "R1")
            .scalar("description", "Replace gasket")
            .scalar("type_of_activity", "Mining")
            .scalar("initiator_proposal_method", "Simple")
            .scalar("final_approval_method", "Simple")
            .section(field_change_request::KKS, vec![Record::new().with("building_kks", "10UJA")])
            .build();
        let errors = FieldChangeRequestValidator.validate(&model).errors;
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors[0].starts_with("Type of activity must be one of: Construction, Manufacturing"));
        assert!(errors.contains(&"Justification is required when Final approval method is Simple".to_owned()));
        assert!(errors.contains(&"Building KKS '10UJA' requires System KKS and Component KKS".to_owned()));
    }
}
