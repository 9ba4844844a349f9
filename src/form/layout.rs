//! Form layouts: the table of scalar fields, sections and flags of one form version, and
//! the assembly of a [`FormModel`] from a grid (and back).

use crate::error::ResultMessage;
use crate::error::RustyEcrError;
use crate::form::descriptor::FieldKind;
use crate::form::descriptor::SectionDescriptor;
use crate::form::locator::LabelLocator;
use crate::form::locator::Matcher;
use crate::form::model::FormModel;
use crate::form::reader::read_section;
use crate::form::record::flag_text;
use crate::form::record::is_affirmative;
use crate::form::record::Record;
use crate::form::writer::write_cell;
use crate::form::writer::write_section;
use crate::form::writer::WriteReport;
use crate::spreadsheet::cell::trim_date;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::grid::Grid;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

/// Where a single-value field lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarSource {
    /// A fixed coordinate.
    Fixed { row: usize, col: usize },
    /// The first non-empty cell right of a label found in any column.
    LabelRight(Matcher),
    /// A cell relative to a label found in the anchor column.
    LabelOffset { label: Matcher, row_offset: usize, col: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarSpec {
    pub name: String,
    pub source: ScalarSource,
    #[serde(default)]
    pub kind: FieldKind,
}

impl ScalarSpec {
    pub fn fixed(name: &str, row: usize, col: usize) -> Self {
        ScalarSpec::new(name, ScalarSource::Fixed { row, col })
    }

    pub fn label_right(name: &str, label: Matcher) -> Self {
        ScalarSpec::new(name, ScalarSource::LabelRight(label))
    }

    pub fn label_offset(name: &str, label: Matcher, row_offset: usize, col: usize) -> Self {
        ScalarSpec::new(name, ScalarSource::LabelOffset { label, row_offset, col })
    }

    fn new(name: &str, source: ScalarSource) -> Self {
        ScalarSpec {
            name: name.to_owned(),
            source,
            kind: FieldKind::Text,
        }
    }

    pub fn flag(mut self) -> Self {
        self.kind = FieldKind::Flag;
        self
    }

    pub fn date(mut self) -> Self {
        self.kind = FieldKind::Date;
        self
    }
}

/// Maps one labelled row of a label/value section to a model flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRule {
    pub label: Matcher,
    pub flag: String,
    /// Flag read from the paired second row
    #[serde(default)]
    pub paired_flag: Option<String>,
}

impl FlagRule {
    pub fn new(label: Matcher, flag: &str) -> Self {
        FlagRule {
            label,
            flag: flag.to_owned(),
            paired_flag: None,
        }
    }

    pub fn paired(mut self, flag: &str) -> Self {
        self.paired_flag = Some(flag.to_owned());
        self
    }
}

/// Ordered label rules applied to the records of a label/value section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagTable {
    pub section: String,
    pub label_field: String,
    pub value_field: String,
    #[serde(default)]
    pub paired_field: Option<String>,
    pub rules: Vec<FlagRule>,
}

/// A flag true when any record of the source sections has `field` set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFlag {
    pub name: String,
    pub sources: Vec<String>,
    pub field: String,
    /// Label whose value cell receives the flag on write
    #[serde(default)]
    pub target: Option<Matcher>,
}

impl DerivedFlag {
    pub fn evaluate(&self, sections: &BTreeMap<String, Vec<Record>>) -> bool {
        self.sources
            .iter()
            .filter_map(|source| sections.get(source))
            .flatten()
            .any(|record| record.flag(&self.field))
    }
}

/// Everything needed to read or fill one form version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLayout {
    pub name: String,
    /// 0-based positional worksheet index
    pub sheet_index: usize,
    pub id_field: String,
    #[serde(default)]
    pub scalars: Vec<ScalarSpec>,
    #[serde(default)]
    pub sections: Vec<SectionDescriptor>,
    #[serde(default)]
    pub flag_tables: Vec<FlagTable>,
    #[serde(default)]
    pub derived_flags: Vec<DerivedFlag>,
    /// `(label column, value column)` pairs for label-right writes
    #[serde(default)]
    pub value_columns: Vec<(usize, usize)>,
}

impl FormLayout {
    /// Loads a layout from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<FormLayout, RustyEcrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Read layout '{}'", path.display()))?;
        let layout = serde_json::from_str(&content)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Parse layout '{}'", path.display()))?;
        Ok(layout)
    }

    pub fn section(&self, name: &str) -> Option<&SectionDescriptor> {
        self.sections.iter().find(|section| section.name == name)
    }

    fn value_column(&self, grid: &Grid, row: usize, col: usize) -> usize {
        self.value_columns
            .iter()
            .find(|(label, _)| *label == col)
            .map(|(_, value)| *value)
            .unwrap_or_else(|| grid.merged_region_at(row, col).map_or(col, |region| region.last_col) + 1)
    }
}

/// Result of filling a grid from a model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FillReport {
    pub sections: Vec<WriteReport>,
    /// Scalar and flag cells written
    pub cells_written: usize,
    /// Sections, scalars and flag labels whose anchor is not in the sheet
    pub missing: Vec<String>,
    /// Cells refused under the reject merge policy
    pub rejected: Vec<String>,
}

/// Finds label cells for an ordered table of `(name, matcher)` entries. Every cell is
/// tested once; the first entry matching it claims it, and the first cell per entry wins.
fn locate_labels<'n>(locator: &LabelLocator, entries: &[(&'n str, &Matcher)]) -> HashMap<&'n str, (usize, usize)> {
    let grid = locator.grid();
    let mut found = HashMap::new();
    if entries.is_empty() {
        return found;
    }
    let last_column = grid.last_column();
    for row in 1..=locator.last_row() {
        for col in 1..=last_column {
            if grid
                .merged_region_at(row, col)
                .is_some_and(|region| region.anchor() != (row, col))
            {
                continue;
            }
            let text = grid.get(row, col);
            if text.is_empty() {
                continue;
            }
            let claimed = entries
                .iter()
                .find(|(_, matcher)| matcher.is_match(&text, locator.ignore_case()));
            if let Some((name, _)) = claimed {
                found.entry(*name).or_insert((row, col));
            }
        }
    }
    found
}

/// First non-empty value right of the label's own merged region.
fn value_right_of(grid: &Grid, row: usize, col: usize) -> String {
    let start = grid.merged_region_at(row, col).map_or(col, |region| region.last_col);
    (start + 1..=grid.last_column())
        .map(|col| grid.get(row, col))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Reads a form from a grid. Absent labels and sections give empty values, never errors.
pub fn assemble(grid: &Grid, layout: &FormLayout, criteria: &Criteria) -> FormModel {
    let locator = LabelLocator::new(grid, criteria);
    let label_table: Vec<(&str, &Matcher)> = layout
        .scalars
        .iter()
        .filter_map(|spec| match &spec.source {
            ScalarSource::LabelRight(matcher) => Some((spec.name.as_str(), matcher)),
            _ => None,
        })
        .collect();
    let labels = locate_labels(&locator, &label_table);

    let mut builder = FormModel::builder(&layout.name, &layout.id_field);
    for spec in &layout.scalars {
        let text = match &spec.source {
            ScalarSource::Fixed { row, col } => grid.get(*row, *col),
            ScalarSource::LabelRight(_) => labels
                .get(spec.name.as_str())
                .map(|(row, col)| value_right_of(grid, *row, *col))
                .unwrap_or_default(),
            ScalarSource::LabelOffset { label, row_offset, col } => locator
                .find(label)
                .map(|row| grid.get(row + row_offset, *col))
                .unwrap_or_default(),
        };
        builder = match spec.kind {
            FieldKind::Flag => builder.flag(&spec.name, is_affirmative(&text)),
            FieldKind::Date => builder.scalar(&spec.name, trim_date(&text)),
            FieldKind::Text => builder.scalar(&spec.name, text),
        };
    }

    let mut sections = BTreeMap::new();
    for descriptor in &layout.sections {
        let read = read_section(&locator, descriptor);
        sections.insert(descriptor.name.clone(), read.records);
    }

    for table in &layout.flag_tables {
        let mut flags: BTreeMap<&str, bool> = BTreeMap::new();
        for rule in &table.rules {
            flags.insert(&rule.flag, false);
            if let Some(paired) = &rule.paired_flag {
                flags.insert(paired, false);
            }
        }
        for record in sections.get(&table.section).into_iter().flatten() {
            let label = record.get(&table.label_field);
            let Some(rule) = table.rules.iter().find(|rule| rule.label.is_match(label, criteria.ignore_case)) else {
                continue;
            };
            flags.insert(&rule.flag, record.flag(&table.value_field));
            if let (Some(paired), Some(field)) = (&rule.paired_flag, &table.paired_field) {
                flags.insert(paired, record.flag(field));
            }
        }
        for (name, value) in flags {
            builder = builder.flag(name, value);
        }
    }

    for derived in &layout.derived_flags {
        builder = builder.flag(&derived.name, derived.evaluate(&sections));
    }
    for (name, records) in sections {
        builder = builder.section(&name, records);
    }
    let model = builder.build();
    log::debug!(
        "Assembled '{}' #{:?}: {} scalar(s), {} flag(s), {} section(s)",
        layout.name,
        model.identifier(),
        model.scalars().len(),
        model.flags().len(),
        model.sections().len()
    );
    model
}

/// Writes a model into a grid: sections first (they may insert rows), then scalars,
/// flag tables and derived flags at their labels' current positions.
pub fn fill(grid: &mut Grid, layout: &FormLayout, model: &FormModel, criteria: &Criteria) -> Result<FillReport, RustyEcrError> {
    let mut report = FillReport::default();

    for descriptor in layout.sections.iter().filter(|descriptor| descriptor.write.is_some()) {
        match write_section(grid, descriptor, model.section(&descriptor.name), criteria)? {
            Some(section) => {
                report.rejected.extend(section.rejected.iter().cloned());
                report.sections.push(section);
            }
            None => report.missing.push(descriptor.name.clone()),
        }
    }

    let mut cells: Vec<(usize, usize, String)> = Vec::new();
    {
        let locator = LabelLocator::new(grid, criteria);
        let mut label_table: Vec<(&str, &Matcher)> = layout
            .scalars
            .iter()
            .filter_map(|spec| match &spec.source {
                ScalarSource::LabelRight(matcher) => Some((spec.name.as_str(), matcher)),
                _ => None,
            })
            .collect();
        label_table.extend(
            layout
                .derived_flags
                .iter()
                .filter_map(|derived| derived.target.as_ref().map(|target| (derived.name.as_str(), target))),
        );
        let labels = locate_labels(&locator, &label_table);

        for spec in &layout.scalars {
            let value = match spec.kind {
                FieldKind::Flag => flag_text(model.flag(&spec.name)).to_owned(),
                FieldKind::Date => trim_date(model.scalar(&spec.name)),
                FieldKind::Text => model.scalar(&spec.name).to_owned(),
            };
            let target = match &spec.source {
                ScalarSource::Fixed { row, col } => Some((*row, *col)),
                ScalarSource::LabelRight(_) => labels
                    .get(spec.name.as_str())
                    .map(|(row, col)| (*row, layout.value_column(grid, *row, *col))),
                ScalarSource::LabelOffset { label, row_offset, col } => {
                    locator.find(label).map(|row| (row + row_offset, *col))
                }
            };
            match target {
                Some((row, col)) => cells.push((row, col, value)),
                None => report.missing.push(spec.name.clone()),
            }
        }

        for table in &layout.flag_tables {
            let Some(descriptor) = layout.section(&table.section) else {
                report.missing.push(table.section.clone());
                continue;
            };
            let read = read_section(&locator, descriptor);
            let (Some(first), Some(end)) = (read.first_row, read.end_row) else {
                report.missing.push(table.section.clone());
                continue;
            };
            let Some(value_column) = descriptor.field_named(&table.value_field).map(|field| field.column) else {
                continue;
            };
            let paired_column = descriptor.paired.as_ref().map_or(value_column, |paired| paired.column);
            for rule in &table.rules {
                let Some(row) = locator.find_from(&rule.label, first).filter(|row| *row < end) else {
                    report.missing.push(rule.flag.clone());
                    continue;
                };
                cells.push((row, value_column, flag_text(model.flag(&rule.flag)).to_owned()));
                if let Some(paired) = &rule.paired_flag {
                    cells.push((row + 1, paired_column, flag_text(model.flag(paired)).to_owned()));
                }
            }
        }

        for derived in layout.derived_flags.iter().filter(|derived| derived.target.is_some()) {
            let value = flag_text(derived.evaluate(model.sections())).to_owned();
            match labels.get(derived.name.as_str()) {
                Some((row, col)) => cells.push((*row, layout.value_column(grid, *row, *col), value)),
                None => report.missing.push(derived.name.clone()),
            }
        }
    }

    for (row, col, value) in cells {
        write_cell(grid, row, col, &value, &mut report.rejected)?;
        report.cells_written += 1;
    }
    if !report.missing.is_empty() {
        log::debug!("'{}': labels not found for {:?}", layout.name, report.missing);
    }
    Ok(report)
}
