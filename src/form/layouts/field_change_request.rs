//! Field Change Request (FCR) form, worksheet #3.
//!
//! The header block (rows 2 to 10) uses fixed coordinates; everything below it is found
//! through captions in column A.

use crate::form::descriptor::Field;
use crate::form::descriptor::ReferenceRow;
use crate::form::descriptor::SectionDescriptor;
use crate::form::descriptor::WriteLayout;
use crate::form::layout::FlagRule;
use crate::form::layout::FlagTable;
use crate::form::layout::FormLayout;
use crate::form::layout::ScalarSpec;
use crate::form::locator::Matcher;

pub const NAME: &str = "field_change_request";
pub const SHEET_INDEX: usize = 3;
pub const ID_FIELD: &str = "field_change_request_no";

pub const KKS: &str = "kks";
pub const DOCUMENTS: &str = "documents";
pub const SUPPORTING_DOCUMENTS: &str = "supporting_documents";
pub const LINKS: &str = "links";
pub const IMPACTS: &str = "impacts";
pub const SIGNATURES: &str = "signatures";

const MATERIAL_EQUIVALENT: &str = "The material is equivalent:";
const RED_CHANGE: &str = "For the 'Documentation Red Change' type of change";
const FILE_HEADERS: [&str; 2] = ["filename & extension", "code, title or summary of the document"];

pub fn layout() -> FormLayout {
    FormLayout {
        name: NAME.to_owned(),
        sheet_index: SHEET_INDEX,
        id_field: ID_FIELD.to_owned(),
        scalars: scalars(),
        sections: vec![kks(), documents(), supporting_documents(), links(), impacts(), signatures()],
        flag_tables: vec![impact_flags()],
        derived_flags: Vec::new(),
        value_columns: Vec::new(),
    }
}

fn scalars() -> Vec<ScalarSpec> {
    vec![
        ScalarSpec::fixed(ID_FIELD, 2, 3),
        ScalarSpec::fixed("registration_date", 2, 7).date(),
        ScalarSpec::fixed("contractor_change_coordinator", 2, 12),
        ScalarSpec::fixed("change_initiator_organization", 5, 3),
        ScalarSpec::fixed("change_initiator_internal_no", 5, 7),
        ScalarSpec::fixed("change_initiator", 5, 10),
        ScalarSpec::fixed("change_initiator_position", 5, 14),
        ScalarSpec::fixed("documentation_type", 6, 4),
        ScalarSpec::fixed("type_of_changes", 6, 7),
        ScalarSpec::fixed("type_of_activity", 6, 11),
        ScalarSpec::fixed("construction_facility", 6, 15),
        ScalarSpec::fixed("initiator_proposal_method", 7, 4),
        ScalarSpec::fixed("simple_method_justification", 7, 12),
        ScalarSpec::fixed("change_in_project_position", 8, 4).flag(),
        ScalarSpec::fixed("reason_code", 8, 9),
        ScalarSpec::fixed("other_reason", 8, 11),
        ScalarSpec::fixed("description", 10, 1),
        ScalarSpec::label_offset("material_is_equivalent", Matcher::contains(MATERIAL_EQUIVALENT), 0, 4).flag(),
        ScalarSpec::label_offset("replacement_type_of_change", Matcher::contains(MATERIAL_EQUIVALENT), 0, 15).flag(),
        ScalarSpec::label_offset(
            "material_rejection_comments",
            Matcher::contains("Comments and/or reasons to reject approving replacement of material"),
            1,
            1,
        ),
        ScalarSpec::label_offset(
            "documentation_refusal_comments",
            Matcher::contains("Comments and/or reasons for refusal to approve changes to the documentation"),
            1,
            1,
        ),
        ScalarSpec::label_offset("final_approval_method", Matcher::contains("Final approval method"), 0, 3),
        ScalarSpec::label_offset("final_approval_justification", Matcher::contains("Final approval method"), 0, 8),
    ]
}

fn kks() -> SectionDescriptor {
    SectionDescriptor::new(KKS, Matcher::contains("List of affected SSC"))
        .offset(2)
        .stop(Matcher::contains("If the code of the SSC is not specified"))
        .field(Field::text("building_kks", 1))
        .field(Field::text("system_kks", 5))
        .field(Field::text("component_kks", 11))
}

fn documents() -> SectionDescriptor {
    SectionDescriptor::new(DOCUMENTS, Matcher::contains("Document Set Code"))
        .stop(Matcher::contains("Supporting and describing documents"))
        .field(Field::text("document_set_code", 1))
        .field(Field::text("set_revision", 3))
        .field(Field::text("engineering_document_code", 4))
        .field(Field::text("engineering_document_name", 6))
        .field(Field::text("document_revision", 9))
        .field(Field::text("sheets_or_pages", 10))
        .field(Field::text("change_amx", 11))
        .field(Field::text("change_description", 12))
}

fn file_section(name: &str, start: Matcher) -> SectionDescriptor {
    FILE_HEADERS
        .iter()
        .fold(SectionDescriptor::new(name, start), |section, header| section.header(header))
        .field(Field::text("filename", 1))
        .field(Field::text("code_title", 4))
}

fn supporting_documents() -> SectionDescriptor {
    file_section(
        SUPPORTING_DOCUMENTS,
        Matcher::contains("Supporting and describing documents\nIf the document is attached"),
    )
    .stop(Matcher::contains(MATERIAL_EQUIVALENT))
    .write(WriteLayout::default().fixed(3).reference(ReferenceRow::Offset(2)))
}

fn links() -> SectionDescriptor {
    file_section(LINKS, Matcher::contains("Link to documents justifying the decision"))
        .stop(Matcher::contains(RED_CHANGE))
        .write(WriteLayout::default().reference(ReferenceRow::Offset(2)))
}

fn impacts() -> SectionDescriptor {
    SectionDescriptor::new(IMPACTS, Matcher::contains(RED_CHANGE))
        .field(Field::text("label", 1))
        .field(Field::flag("value", 2))
        .paired(Matcher::contains("Prompt release of a new revision"), "paired_value", 2)
        .read_only()
}

fn impact_flags() -> FlagTable {
    let rule = |label: &str, flag: &str| FlagRule::new(Matcher::contains(label), flag);
    FlagTable {
        section: IMPACTS.to_owned(),
        label_field: "label".to_owned(),
        value_field: "value".to_owned(),
        paired_field: Some("paired_value".to_owned()),
        rules: vec![
            rule("Nuclear Safety", "nuclear_safety"),
            rule("Fire Safety", "fire_safety"),
            rule("Industrial Safety", "industrial_safety"),
            rule("Environmental safety", "environmental_safety"),
            rule("Schedule", "schedule_impact"),
            rule("Prompt release of a new revision", "prompt_release_ddd").paired("prompt_release_mdd"),
            rule("Structural reliability", "structural_reliability"),
            rule("Impact on other", "impact_on_other_ddd"),
            rule("Licensing Documentation", "licensing_documentation"),
            rule("Cost", "cost_impact"),
        ],
    }
}

fn signatures() -> SectionDescriptor {
    SectionDescriptor::new(SIGNATURES, Matcher::contains("Project Participant position"))
        .stop(Matcher::contains("* digital signature can be used for signing the FCR"))
        .field(Field::text("position", 1))
        .field(Field::text("name", 7))
        .field(Field::date("date", 11))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impacts_are_read_only_with_a_paired_rule() {
        let layout = layout();
        let impacts = layout.section(IMPACTS).unwrap();
        assert!(impacts.write.is_none());
        assert!(impacts.paired.is_some());
        let table = &layout.flag_tables[0];
        assert_eq!(table.rules.len(), 10);
        assert_eq!(
            table.rules.iter().filter_map(|rule| rule.paired_flag.as_deref()).collect::<Vec<_>>(),
            vec!["prompt_release_mdd"]
        );
    }

    #[test]
    fn file_sections_skip_both_headers() {
        let layout = layout();
        for name in [SUPPORTING_DOCUMENTS, LINKS] {
            let section = layout.section(name).unwrap();
            assert_eq!(section.header_markers.len(), 2);
            assert_eq!(section.row_offset, 1);
        }
        assert_eq!(layout.section(KKS).map(|s| s.row_offset), Some(2));
    }
}
