//! Declarative description of one label-delimited repeated section.

use crate::form::locator::Matcher;
use crate::form::record::flag_text;
use crate::form::record::is_affirmative;
use crate::form::record::Record;
use crate::spreadsheet::cell::trim_date;
use crate::spreadsheet::grid::Grid;
use serde::Deserialize;
use serde::Serialize;

/// How a field value is normalized on read and rendered on write.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    /// `Yes`/`No`
    Flag,
    /// `dd.mm.yyyy` when parseable, raw text otherwise
    Date,
}

impl FieldKind {
    /// Normalized form of a non-empty cell text.
    pub fn normalize(&self, text: &str) -> String {
        match self {
            FieldKind::Text => text.to_owned(),
            FieldKind::Flag if text.trim().is_empty() => String::new(),
            FieldKind::Flag => flag_text(is_affirmative(text)).to_owned(),
            FieldKind::Date => trim_date(text),
        }
    }
}

/// A field mapped to a fixed column (1-based) of every data row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub column: usize,
    #[serde(default)]
    pub kind: FieldKind,
}

impl Field {
    pub fn text(name: &str, column: usize) -> Self {
        Field {
            name: name.to_owned(),
            column,
            kind: FieldKind::Text,
        }
    }

    pub fn flag(name: &str, column: usize) -> Self {
        Field {
            kind: FieldKind::Flag,
            ..Field::text(name, column)
        }
    }

    pub fn date(name: &str, column: usize) -> Self {
        Field {
            kind: FieldKind::Date,
            ..Field::text(name, column)
        }
    }
}

/// What an empty anchor-column cell means inside a section.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankKey {
    /// The section ends at the first empty key.
    #[default]
    Terminate,
    /// The row is passed over; only the stop label ends the section.
    Skip,
    /// The row is read like any other and kept unless all fields are empty.
    Keep,
}

/// Two physical rows read as one record when the first row's label matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedTrigger {
    pub label: Matcher,
    /// Record field receiving the second row's value
    pub field: String,
    pub column: usize,
}

/// Size of the row block a template reserves for a section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reserve {
    /// From the first data row up to the end boundary label.
    #[default]
    Boundary,
    /// A fixed count of rows; extra rows go right after them.
    Fixed(usize),
}

/// Row whose formatting and merges are copied onto inserted rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRow {
    /// `n` rows above the insertion position
    Offset(usize),
    FirstData,
}

impl Default for ReferenceRow {
    fn default() -> Self {
        ReferenceRow::Offset(1)
    }
}

/// Merge geometry given to written rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeTemplate {
    /// Inserted rows take the single-row merges of the reference row.
    #[default]
    FromReference,
    /// Every written row gets these `(first_col, last_col)` spans.
    Spans(Vec<(usize, usize)>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteLayout {
    /// End boundary when it differs from the read stop label
    pub end: Option<Matcher>,
    pub reserve: Reserve,
    pub reference: ReferenceRow,
    pub merges: MergeTemplate,
}

impl WriteLayout {
    pub fn end(mut self, end: Matcher) -> Self {
        self.end = Some(end);
        self
    }

    pub fn fixed(mut self, rows: usize) -> Self {
        self.reserve = Reserve::Fixed(rows);
        self
    }

    pub fn reference(mut self, reference: ReferenceRow) -> Self {
        self.reference = reference;
        self
    }

    pub fn spans(mut self, spans: &[(usize, usize)]) -> Self {
        self.merges = MergeTemplate::Spans(spans.to_vec());
        self
    }
}

/// A repeated section: where it starts, where it stops, and which column holds which field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    pub name: String,
    pub start: Matcher,
    /// Rows from the start label to the first data row
    #[serde(default)]
    pub row_offset: usize,
    #[serde(default)]
    pub stop: Option<Matcher>,
    /// The stop row is itself a record
    #[serde(default)]
    pub stop_inclusive: bool,
    #[serde(default)]
    pub blank: BlankKey,
    /// Passed over when found in the first two rows of the section
    #[serde(default)]
    pub header_markers: Vec<String>,
    /// Passed over anywhere in the section
    #[serde(default)]
    pub skip_markers: Vec<String>,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub paired: Option<PairedTrigger>,
    /// `None` for sections written through a flag table
    #[serde(default)]
    pub write: Option<WriteLayout>,
}

impl SectionDescriptor {
    pub fn new(name: &str, start: Matcher) -> Self {
        SectionDescriptor {
            name: name.to_owned(),
            start,
            row_offset: 1,
            stop: None,
            stop_inclusive: false,
            blank: BlankKey::Terminate,
            header_markers: Vec::new(),
            skip_markers: Vec::new(),
            fields: Vec::new(),
            paired: None,
            write: Some(WriteLayout::default()),
        }
    }

    pub fn offset(mut self, row_offset: usize) -> Self {
        self.row_offset = row_offset;
        self
    }

    pub fn stop(mut self, stop: Matcher) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn stop_inclusive(mut self, stop: Matcher) -> Self {
        self.stop = Some(stop);
        self.stop_inclusive = true;
        self
    }

    pub fn blank(mut self, blank: BlankKey) -> Self {
        self.blank = blank;
        self
    }

    pub fn header(mut self, marker: &str) -> Self {
        self.header_markers.push(marker.to_lowercase());
        self
    }

    pub fn skip(mut self, marker: &str) -> Self {
        self.skip_markers.push(marker.to_lowercase());
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn paired(mut self, label: Matcher, field: &str, column: usize) -> Self {
        self.paired = Some(PairedTrigger {
            label,
            field: field.to_owned(),
            column,
        });
        self
    }

    pub fn write(mut self, write: WriteLayout) -> Self {
        self.write = Some(write);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.write = None;
        self
    }

    /// Field holding the anchor-column value, falling back to the first field.
    pub fn key_field(&self, anchor_column: usize) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.column == anchor_column)
            .or_else(|| self.fields.first())
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Widest column touched by the section.
    pub fn last_column(&self) -> usize {
        let paired = self.paired.as_ref().map_or(0, |paired| paired.column);
        self.fields
            .iter()
            .map(|field| field.column)
            .max()
            .unwrap_or(0)
            .max(paired)
    }

    /// Lower-cased text of the mapped cells of a row, joined by spaces.
    fn row_text(&self, grid: &Grid, row: usize) -> String {
        let mut columns: Vec<usize> = self.fields.iter().map(|field| field.column).collect();
        columns.sort_unstable();
        columns.dedup();
        columns
            .into_iter()
            .map(|col| grid.get(row, col))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub(crate) fn is_header_row(&self, grid: &Grid, row: usize) -> bool {
        if self.header_markers.is_empty() {
            return false;
        }
        let text = self.row_text(grid, row);
        self.header_markers.iter().any(|marker| text.contains(marker.as_str()))
    }

    pub(crate) fn is_skip_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.skip_markers.iter().any(|marker| key.contains(marker.as_str()))
    }

    /// Raw trimmed values of every mapped field on `row`.
    pub(crate) fn raw_record(&self, grid: &Grid, row: usize) -> Record {
        self.fields
            .iter()
            .map(|field| (field.name.as_str(), grid.get(row, field.column)))
            .collect()
    }

    /// Applies field kinds to a raw record.
    pub(crate) fn normalize(&self, record: Record) -> Record {
        record
            .fields()
            .map(|(name, value)| {
                let kind = match (self.field_named(name), &self.paired) {
                    (Some(field), _) => field.kind,
                    (None, Some(paired)) if paired.field == name => FieldKind::Flag,
                    _ => FieldKind::Text,
                };
                (name.to_owned(), kind.normalize(value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new("docs", Matcher::contains("Documents"))
            .header("filename")
            .skip("kks code")
            .field(Field::text("file", 1))
            .field(Field::flag("attached", 4))
            .field(Field::date("date", 6))
    }

    #[test]
    fn builder_defaults() {
        let descriptor = descriptor();
        assert_eq!(descriptor.row_offset, 1);
        assert_eq!(descriptor.blank, BlankKey::Terminate);
        assert_eq!(descriptor.write, Some(WriteLayout::default()));
        assert_eq!(descriptor.last_column(), 6);
        assert_eq!(descriptor.key_field(1).map(|f| f.name.as_str()), Some("file"));
        assert_eq!(descriptor.key_field(2).map(|f| f.name.as_str()), Some("file"));
        assert_eq!(descriptor.clone().read_only().write, None);
    }

    #[test]
    fn normalizes_by_kind() {
        let record = Record::new()
            .with("file", "a.pdf")
            .with("attached", "TRUE")
            .with("date", "2024-03-05");
        let normalized = descriptor().normalize(record);
        assert_eq!(normalized.get("attached"), "Yes");
        assert_eq!(normalized.get("date"), "05.03.2024");

        assert_eq!(FieldKind::Flag.normalize("maybe"), "No");
        assert_eq!(FieldKind::Flag.normalize(" "), "");
        assert_eq!(FieldKind::Date.normalize("soon"), "soon");
    }

    #[test]
    fn header_and_skip_markers() {
        let mut grid = Grid::new();
        grid.set(3, 1, "Filename & extension").unwrap();
        grid.set(4, 1, "KKS code").unwrap();
        let descriptor = descriptor();
        assert!(descriptor.is_header_row(&grid, 3));
        assert!(!descriptor.is_header_row(&grid, 4));
        assert!(descriptor.is_skip_key(&grid.get(4, 1)));
    }

    #[test]
    fn descriptors_load_from_json() -> Result<(), serde_json::Error> {
        let json = r#"{
            "name": "kks",
            "start": {"patterns": ["List of affected SSC"]},
            "row_offset": 2,
            "stop": {"patterns": ["If the code"], "mode": "prefix"},
            "fields": [{"name": "building_kks", "column": 1}],
            "write": {"reference": {"offset": 1}}
        }"#;
        let descriptor: SectionDescriptor = serde_json::from_str(json)?;
        assert_eq!(descriptor.row_offset, 2);
        assert_eq!(descriptor.stop, Some(Matcher::prefix("If the code")));
        assert_eq!(descriptor.write.map(|write| write.reference), Some(ReferenceRow::Offset(1)));
        Ok(())
    }
}
