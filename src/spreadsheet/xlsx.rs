use crate::error::ResultMessage;
use crate::error::RustyEcrError;
use crate::helpers::xml::find_attribute;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::Formula;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::Row;
use crate::spreadsheet::merge::MergedRegion;
use crate::spreadsheet::package;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Cursor;
use std::path::Path;
use std::path::PathBuf;
use zip::ZipArchive;

// XML local names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";        // Package relationship
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";           // Custom number formats container
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";             // Individual custom number format
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";           // Cell format indexes container
const TAG_FORMAT_INDEX: &[u8] = b"xf";                  // Individual cell format index
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";            // Shared string table item
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";                // Phonetic text for Asian languages
const TAG_TEXT: &[u8] = b"t";                           // Text content within strings
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";   // Workbook properties
const TAG_SHEET: &[u8] = b"sheet";                      // Worksheet definition
const TAG_DIMENSION: &[u8] = b"dimension";              // Declared used range
const TAG_ROW: &[u8] = b"row";                          // Row in worksheet
const TAG_CELL: &[u8] = b"c";                           // Cell in worksheet
const TAG_FORMULA: &[u8] = b"f";                        // Cell formula
const TAG_INLINE_STRING: &[u8] = b"is";                 // Inline string value
const TAG_VALUE: &[u8] = b"v";                          // Cell value content
const TAG_MERGE_CELL: &[u8] = b"mergeCell";             // Merged region

type PackageReader = Cursor<Vec<u8>>;

/// Represents an Excel XLSX workbook opened for reading and rewriting
pub(crate) struct XlsxSpreadsheet {
    /// File name of the spreadsheet
    pub(crate) name: String,
    /// Location the package is saved back to
    path: PathBuf,
    /// ZIP archive of the package, held in memory so the file can be replaced on save
    zip: ZipArchive<PackageReader>,
    /// Parsed number formats for cell type detection, indexed by style
    number_formats: Vec<CellType>,
    /// Shared string table
    shared_strings: Vec<String>,
    /// List of worksheets with (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    /// Opens an XLSX spreadsheet file and parses its structure
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<XlsxSpreadsheet, RustyEcrError> {
        let path = path.as_ref();
        let name = path.to_string_lossy().to_string();
        let bytes = std::fs::read(path)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Open '{}'", name))?;
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;

        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        log::info!("Opened '{}' with {} sheet(s)", name, sheets.len());

        Ok(XlsxSpreadsheet {
            name,
            path: path.to_path_buf(),
            zip,
            number_formats,
            shared_strings,
            sheets,
        })
    }

    fn sheet_path(&self, index: usize) -> Result<String, RustyEcrError> {
        match self.sheets.get(index) {
            Some((_, path)) => Ok(path.to_owned()),
            None => Err(SpreadsheetError::SheetNotFound {
                index,
                file: self.name.to_owned(),
                count: self.sheets.len(),
            })?,
        }
    }

    /// Resolves a cell's stored value and type once the whole `<c>` element has been read.
    fn finish_cell(&self, mut cell: Cell) -> Cell {
        match cell.kind {
            CellType::SharedString => {
                let index = cell.value.trim().parse::<usize>().ok();
                match index.and_then(|index| self.shared_strings.get(index).map(|value| (index, value))) {
                    Some((index, value)) => {
                        cell.shared_index = Some(index);
                        cell.value = value.to_owned();
                    }
                    None => {
                        log::warn!("Dangling shared string index '{}' in '{}'", cell.value, self.name);
                        cell.kind = CellType::InlineString;
                        cell.value.clear();
                    }
                }
            }
            CellType::Number => {
                if let Some(kind) = cell.style.and_then(|style| self.number_formats.get(style)) {
                    cell.kind = *kind;
                }
            }
            _ => (),
        }
        if cell.value.is_empty() && cell.kind != CellType::SharedString {
            cell.kind = if cell.kind == CellType::InlineString && cell.formula.is_some() {
                CellType::InlineString
            } else {
                CellType::Empty
            };
        }
        cell
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// Reads one worksheet into a grid: cells with their styles and formulas, row
    /// attributes, merged regions and the declared dimension.
    fn load_grid(&mut self, index: usize) -> Result<Grid, RustyEcrError> {
        let zip_path = self.sheet_path(index)?;
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;

        let mut rows = BTreeMap::<usize, Row>::new();
        let mut merges = Vec::<MergedRegion>::new();
        let mut declared = None::<MergedRegion>;
        let mut pending = Vec::<(usize, usize, Cell)>::new();
        let mut row = 0usize;
        let mut col = 0usize;
        let mut cell = None::<Cell>;

        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_DIMENSION => {
                declared = event.get_attribute_value("ref")?
                    .and_then(|reference| MergedRegion::try_from(reference.as_ref()).ok());
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                let attributes = event.owned_attributes()?;
                row = find_attribute(&attributes, "r")
                    .and_then(|value| value.parse::<usize>().ok())
                    .unwrap_or(row + 1);
                col = 0;
                rows.entry(row).or_default().attributes = attributes;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row.max(1), col + 1));
                let kind = event.get_attribute_value("t")?.map(|t| {
                    match t.as_ref() {
                        "inlineStr" | "str" => CellType::InlineString,
                        "s" => CellType::SharedString,
                        "d" => CellType::IsoDateTime,
                        "b" => CellType::Boolean,
                        "e" => CellType::Error,
                        _ => CellType::Number,
                    }
                }).unwrap_or(CellType::Number);
                let style = event.parse_attribute_value::<usize>("s")?;
                cell = Some(Cell {
                    kind,
                    style,
                    ..Cell::default()
                });
            }
            Event::Start(event) if cell.is_some() && event.local_name().as_ref() == TAG_FORMULA => {
                let attributes = event.owned_attributes()?;
                let text = read_string_value(&mut reader, TAG_FORMULA, true)?;
                if let Some(cell) = cell.as_mut() {
                    cell.formula = Some(Formula { text, attributes });
                }
            }
            Event::Start(event) if cell.is_some() && event.local_name().as_ref() == TAG_INLINE_STRING => {
                let value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                if let Some(cell) = cell.as_mut() {
                    cell.value = value;
                }
            }
            Event::Start(event) if cell.is_some() && event.local_name().as_ref() == TAG_VALUE => {
                let value = read_string_value(&mut reader, TAG_VALUE, true)?;
                if let Some(cell) = cell.as_mut() {
                    cell.value = value;
                }
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                if let Some(cell) = cell.take() {
                    pending.push((row, col, cell));
                }
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_MERGE_CELL => {
                if let Some(reference) = event.get_attribute_value("ref")? {
                    match MergedRegion::try_from(reference.as_ref()) {
                        Ok(region) => merges.push(region),
                        Err(error) => log::warn!("Skipping merge '{}' in '{}': {}", reference, zip_path, error),
                    }
                }
            }
        });

        drop(reader);

        for (row, col, cell) in pending {
            let cell = self.finish_cell(cell);
            rows.entry(row).or_default().cells.insert(col, cell);
        }
        log::debug!("Loaded sheet #{} '{}' with {} row(s) and {} merge(s)", index, zip_path, rows.len(), merges.len());
        Ok(Grid::from_parts(rows, merges, declared))
    }

    /// Writes a grid back into its worksheet and replaces the file on disk.
    fn save_grid(&mut self, index: usize, grid: &Grid) -> Result<(), RustyEcrError> {
        let zip_path = self.sheet_path(index)?;
        let sheet_xml = self
            .zip
            .read_string(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        let patched = package::patch_sheet_xml(&sheet_xml, grid).with_prefix(&format!("Patch '{}'", zip_path))?;

        let file_name = self
            .zip
            .file_names()
            .find(|file_name| file_name.eq_ignore_ascii_case(&zip_path))
            .map(str::to_owned)
            .unwrap_or(zip_path);
        let replacements = HashMap::from([(file_name, patched)]);
        let drop_calc_chain = !grid.insertions().is_empty();
        let bytes = package::rebuild_package(&mut self.zip, &replacements, drop_calc_chain)?;

        std::fs::write(&self.path, &bytes)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Save '{}'", self.name))?;
        self.zip = ZipArchive::new(Cursor::new(bytes))?;
        log::info!("Saved sheet #{} of '{}'", index, self.name);
        Ok(())
    }
}

/// Loads worksheet relationships from the package
///
/// # Returns
/// Mapping of relationship IDs to worksheet paths
fn load_relationships(zip: &mut ZipArchive<PackageReader>, path: &str) -> Result<HashMap<String, String>, RustyEcrError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only process worksheet relationships
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Normalizes a relationship target to a path within the archive
fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(path) = path.strip_prefix('/') {
        path.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Loads worksheet names and paths in workbook order, plus the date system flag
fn load_workbook(zip: &mut ZipArchive<PackageReader>) -> Result<(Vec<(String, String)>, bool), RustyEcrError> {
    let relationships = load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value.eq("1") || value.eq("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Loads number formats and cell styles from styles.xml, mapped to cell types by style index
fn load_number_formats(zip: &mut ZipArchive<PackageReader>, is_1904: bool) -> Result<Vec<CellType>, RustyEcrError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                let style = CellType::parse_custom_number_format(&format, is_1904);
                custom_formats.insert(id.to_string(), style);
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            let id = event.get_attribute_value("numFmtId")?.unwrap_or(Cow::Borrowed("0"));
            format_indexes.push(id.to_string());
        }
    });

    let number_formats = format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect();
    Ok(number_formats)
}

/// Loads the shared string table; a package without one has no shared strings
fn load_shared_strings(zip: &mut ZipArchive<PackageReader>) -> Result<Vec<String>, RustyEcrError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Reads string value from XML content, handling text and CDATA sections
///
/// Extracts string content up to `end_tag`, skipping phonetic text annotations.
/// When `is_text_content` is false only `<t>` runs contribute text.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: &[u8],
    is_text_content: bool,
) -> Result<String, RustyEcrError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.local_name().as_ref() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_targets_map_into_the_archive() {
        assert_eq!(to_zip_path(Cow::Borrowed("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("/xl/worksheets/sheet2.xml")), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("xl/worksheets/sheet3.xml")), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn string_values_skip_phonetic_runs() -> Result<(), RustyEcrError> {
        let xml = "<si><r><t>Change </t></r><r><t>Request</t></r><rPh sb=\"0\" eb=\"1\"><t>x</t></rPh></si><next/>";
        let mut reader = XmlReader::new(Cursor::new(xml.as_bytes()));
        reader.next()?;
        assert_eq!(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?, "Change Request");
        Ok(())
    }
}
