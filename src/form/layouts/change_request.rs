//! Change Request (CR) form, worksheet #1.
//!
//! Scalars sit to the right of their captions (some captions carry a Russian alternative);
//! repeated sections are delimited by their numbered headings.

use crate::form::descriptor::BlankKey;
use crate::form::descriptor::Field;
use crate::form::descriptor::ReferenceRow;
use crate::form::descriptor::SectionDescriptor;
use crate::form::descriptor::WriteLayout;
use crate::form::layout::DerivedFlag;
use crate::form::layout::FormLayout;
use crate::form::layout::ScalarSpec;
use crate::form::locator::Matcher;

pub const NAME: &str = "change_request";
pub const SHEET_INDEX: usize = 1;
pub const ID_FIELD: &str = "change_request_no";

pub const SUPPORTING_DOCUMENTS: &str = "supporting_documents";
pub const INITIATOR_TDD_IMPACTS: &str = "initiator_tdd_impacts";
pub const OTHER_TDD_IMPACTS: &str = "other_tdd_impacts";
pub const AFFECTED_SSCS: &str = "affected_sscs";
pub const CONFIRMATIONS: &str = "confirmations";
pub const APPROVALS: &str = "approvals";

pub fn layout() -> FormLayout {
    FormLayout {
        name: NAME.to_owned(),
        sheet_index: SHEET_INDEX,
        id_field: ID_FIELD.to_owned(),
        scalars: scalars(),
        sections: vec![
            supporting_documents(),
            tdd_impacts(INITIATOR_TDD_IMPACTS, "2.1", "2.2", "tdd code", &[]),
            tdd_impacts(OTHER_TDD_IMPACTS, "2.2", "2.3", "evaluation organization", &[("evaluation_organization", 1)]),
            affected_sscs(),
            confirmations(),
            approvals(),
        ],
        flag_tables: Vec::new(),
        derived_flags: vec![DerivedFlag {
            name: "documents_revision_impact".to_owned(),
            sources: vec![INITIATOR_TDD_IMPACTS.to_owned(), OTHER_TDD_IMPACTS.to_owned()],
            field: "new_revision_required".to_owned(),
            target: Some(Matcher::contains("The presence of an impact on documents that need to be revised")),
        }],
        // captions in A, H and K take their values in D, J and O
        value_columns: vec![(1, 4), (8, 10), (11, 15)],
    }
}

fn scalars() -> Vec<ScalarSpec> {
    vec![
        // 1.1
        ScalarSpec::label_right(ID_FIELD, Matcher::contains("Change Request No:")),
        ScalarSpec::label_right("contractor_change_coordinator", Matcher::contains("Contractor Change Coordinator:")),
        ScalarSpec::label_right("initiator_internal_cr_no", Matcher::contains("Initiator's internal CR No:")),
        ScalarSpec::label_right("change_initiator", Matcher::contains("Change Initiator:")),
        ScalarSpec::label_right("initiator_organization", Matcher::contains("Initiator's organization:")),
        ScalarSpec::label_right(
            "documentation_type",
            Matcher::contains("Type of documentation, where Engineering Change will be reflected"),
        ),
        ScalarSpec::label_right("reason", Matcher::contains("Reason of Engineering Change:")),
        ScalarSpec::label_right("technical_solution_description", Matcher::contains("description of technical solution")),
        // 2.4
        ScalarSpec::label_right("final_nsc_category", Matcher::contains("Final NSC category of the Engineering Change:")),
        ScalarSpec::label_right(
            "safety_classes_impact",
            Matcher::contains("Presence of direct or indirect impact on equipment of 1,2 and 3 safety classes"),
        )
        .flag(),
        ScalarSpec::label_right(
            "dsa_impact",
            Matcher::contains("Presence the impact on the results DSA").or("Наличие влияния на результаты ДАБ"),
        )
        .flag(),
        ScalarSpec::label_right("cr_method", Matcher::contains("Method* of CR:").or("Вид ЗИ:")),
        ScalarSpec::label_right(
            "engineering_comments",
            Matcher::contains("Comments for engineering evaluation:").or("Комментарии к инженерной оценке:"),
        ),
        // 2.5
        ScalarSpec::label_right(
            "contract_affected",
            Matcher::contains("Contract (its  presence indicates").or("Контракт (его наличие указывает"),
        )
        .flag(),
        ScalarSpec::label_right("cost_impact", Matcher::contains("Cost impact:").or("Влияние на стоимость:")).flag(),
        ScalarSpec::label_right("schedule_impact", Matcher::contains("Schedule:").or("График:")).flag(),
        ScalarSpec::label_right(
            "non_technical_comments",
            Matcher::contains("Comments for non-technical assessment:").or("Комментарии к нетехнической оценке:"),
        ),
    ]
}

/// Every data row of a CR section is re-merged to the template's column spans.
fn rows(spans: &[(usize, usize)]) -> WriteLayout {
    WriteLayout::default()
        .reference(ReferenceRow::FirstData)
        .spans(spans)
}

fn supporting_documents() -> SectionDescriptor {
    SectionDescriptor::new(SUPPORTING_DOCUMENTS, Matcher::prefix("1.2"))
        .offset(2)
        .stop(Matcher::prefix("2.1"))
        .blank(BlankKey::Skip)
        .field(Field::text("filename", 1))
        .field(Field::text("code_title", 4))
        .write(rows(&[(1, 3), (4, 15)]))
}

/// Sections 2.1 and 2.2 share their columns from D onwards; 2.2 prepends the evaluating
/// organization and moves the TDD code to column B.
fn tdd_impacts(name: &str, start: &str, stop: &str, header: &str, leading: &[(&str, usize)]) -> SectionDescriptor {
    let code_column = if leading.is_empty() { 1 } else { 2 };
    let spans: &[(usize, usize)] = if leading.is_empty() {
        &[(1, 3), (6, 7), (9, 10)]
    } else {
        &[(2, 3), (6, 7), (9, 10)]
    };
    let section = SectionDescriptor::new(name, Matcher::prefix(start))
        .offset(2)
        .stop(Matcher::prefix(stop))
        .blank(BlankKey::Skip)
        .header(header)
        .skip(header);
    leading
        .iter()
        .fold(section, |section, (field, column)| section.field(Field::text(field, *column)))
        .field(Field::text("tdd_code", code_column))
        .field(Field::text("revision", 4))
        .field(Field::flag("new_revision_required", 5))
        .field(Field::text("tdd_name", 6))
        .field(Field::text("tdd_state", 8))
        .field(Field::text("change_description", 9))
        .field(Field::flag("nuclear_safety", 11))
        .field(Field::flag("fire_safety", 12))
        .field(Field::flag("industrial_safety", 13))
        .field(Field::flag("environmental_safety", 14))
        .field(Field::flag("structural_reliability", 15))
        .write(rows(spans))
}

fn affected_sscs() -> SectionDescriptor {
    SectionDescriptor::new(AFFECTED_SSCS, Matcher::prefix("2.3"))
        .offset(2)
        .stop(Matcher::prefix("2.4"))
        .blank(BlankKey::Skip)
        .header("kks code")
        .skip("kks code")
        .field(Field::text("kks_code", 1))
        .field(Field::text("ssc_name", 2))
        .field(Field::text("change_description", 6))
        .write(rows(&[(2, 5), (6, 15)]))
}

fn confirmations() -> SectionDescriptor {
    SectionDescriptor::new(CONFIRMATIONS, Matcher::prefix("3."))
        .offset(2)
        .stop(Matcher::prefix("4."))
        .blank(BlankKey::Keep)
        .field(Field::text("organization", 1))
        .field(Field::text("position", 2))
        .field(Field::text("responsible", 5))
        .field(Field::text("date", 11))
        .write(rows(&[(2, 4), (5, 9), (11, 15)]))
}

fn approvals() -> SectionDescriptor {
    SectionDescriptor::new(APPROVALS, Matcher::prefix("4."))
        .offset(2)
        .stop_inclusive(Matcher::contains("change manager of the owner").ignore_case())
        .blank(BlankKey::Keep)
        .field(Field::text("position", 1))
        .field(Field::text("responsible", 5))
        .field(Field::text("date", 11))
        .write(rows(&[(1, 4), (5, 9), (11, 15)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tdd_sections_differ_in_leading_columns() {
        let layout = layout();
        let initiator = layout.section(INITIATOR_TDD_IMPACTS).unwrap();
        let other = layout.section(OTHER_TDD_IMPACTS).unwrap();
        assert_eq!(initiator.fields.len(), 11);
        assert_eq!(other.fields.len(), 12);
        assert_eq!(initiator.field_named("tdd_code").map(|f| f.column), Some(1));
        assert_eq!(other.field_named("tdd_code").map(|f| f.column), Some(2));
        assert_eq!(other.key_field(1).map(|f| f.name.as_str()), Some("evaluation_organization"));
    }

    #[test]
    fn every_section_is_writable() {
        let layout = layout();
        assert_eq!(layout.sections.len(), 6);
        assert!(layout.sections.iter().all(|section| section.write.is_some()));
        assert_eq!(layout.section(APPROVALS).map(|s| s.stop_inclusive), Some(true));
        assert_eq!(layout.sheet_index, 1);
    }
}
