//! Writing side of the xlsx package: worksheet XML patching and archive rebuilding.

use crate::error::RustyEcrError;
use crate::helpers::xml::XmlNodeHelper;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::grid::Row;
use crate::spreadsheet::merge::MergedRegion;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::shift_sqref;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::collections::HashMap;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

pub(crate) const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_RELATIONSHIPS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Elements that come after `<mergeCells>` in the SpreadsheetML schema.
fn insert_before_tag(name: &[u8]) -> bool {
    matches!(
        name,
        b"phoneticPr"
            | b"conditionalFormatting"
            | b"dataValidations"
            | b"hyperlinks"
            | b"printOptions"
            | b"pageMargins"
            | b"pageSetup"
            | b"headerFooter"
            | b"rowBreaks"
            | b"colBreaks"
            | b"customProperties"
            | b"cellWatches"
            | b"ignoredErrors"
            | b"smartTags"
            | b"drawing"
            | b"drawingHF"
            | b"picture"
            | b"oleObjects"
            | b"controls"
            | b"webPublishItems"
            | b"tableParts"
            | b"extLst"
    )
}

/// Attribute holding a reference list that moves with inserted rows, per element.
fn shifted_reference_attribute(name: &[u8]) -> Option<&'static str> {
    match name {
        b"conditionalFormatting" | b"dataValidation" => Some("sqref"),
        b"hyperlink" => Some("ref"),
        _ => None,
    }
}

fn prefixed_tag(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{name}"),
        _ => name.to_owned(),
    }
}

fn element_prefix(start: &BytesStart) -> Option<String> {
    start
        .name()
        .prefix()
        .and_then(|prefix| std::str::from_utf8(prefix.as_ref()).ok().map(str::to_owned))
}

/// Regenerates `<sheetData>`, `<mergeCells>` and `<dimension>` of a worksheet from the grid,
/// shifting the row references of elements the grid does not model. Everything else is
/// copied through unchanged.
pub(crate) fn patch_sheet_xml(sheet_xml: &str, grid: &Grid) -> Result<String, RustyEcrError> {
    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len()));

    let merges = grid.merges();
    let mut prefix: Option<String> = None;
    let mut skip_depth = 0usize;
    let mut merges_written = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            _ if skip_depth > 0 => match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => (),
            },
            Event::Start(ref e) if e.local_name().as_ref() == b"worksheet" => {
                prefix = element_prefix(e);
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                let tag = prefixed_tag(prefix.as_deref(), "sheetData");
                writer.write_event(Event::Start(e.to_owned()))?;
                write_rows(&mut writer, grid, prefix.as_deref())?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
                if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"dimension" => {
                let mut dimension = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                let range = match grid.used_range() {
                    Some(range) if range.is_single_cell() => index_to_reference(range.first_row, range.first_col),
                    Some(range) => range.to_string(),
                    None => "A1".to_owned(),
                };
                dimension.push_attribute(("ref", range.as_str()));
                writer.write_event(Event::Empty(dimension))?;
                if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"mergeCells" => {
                merges_written = true;
                write_merge_cells(&mut writer, merges, prefix.as_deref())?;
                if matches!(event, Event::Start(_)) {
                    skip_depth = 1;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                if !merges_written && insert_before_tag(e.local_name().as_ref()) {
                    write_merge_cells(&mut writer, merges, prefix.as_deref())?;
                    merges_written = true;
                }
                let patched = shift_element_references(e, grid.insertions())?;
                match event {
                    Event::Start(_) => writer.write_event(Event::Start(patched))?,
                    _ => writer.write_event(Event::Empty(patched))?,
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"worksheet" => {
                if !merges_written {
                    write_merge_cells(&mut writer, merges, prefix.as_deref())?;
                    merges_written = true;
                }
                writer.write_event(event.borrow())?;
            }
            _ => writer.write_event(event.borrow())?,
        }
    }

    Ok(String::from_utf8(writer.into_inner())?)
}

/// Copies an element, moving the rows of its reference attribute through the insertion log.
fn shift_element_references(start: &BytesStart, insertions: &[(usize, usize)]) -> Result<BytesStart<'static>, RustyEcrError> {
    let attribute = match shifted_reference_attribute(start.local_name().as_ref()) {
        Some(attribute) if !insertions.is_empty() => attribute,
        _ => return Ok(start.to_owned()),
    };

    let mut patched = BytesStart::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for (key, value) in start.owned_attributes()? {
        if key == attribute {
            let shifted = insertions
                .iter()
                .fold(value, |references, (before, count)| shift_sqref(&references, *before, *count));
            patched.push_attribute((key.as_str(), shifted.as_str()));
        } else {
            patched.push_attribute((key.as_str(), value.as_str()));
        }
    }
    Ok(patched)
}

fn write_merge_cells<W: Write>(writer: &mut Writer<W>, merges: &[MergedRegion], prefix: Option<&str>) -> Result<(), RustyEcrError> {
    if merges.is_empty() {
        return Ok(());
    }
    let merge_cells_tag = prefixed_tag(prefix, "mergeCells");
    let merge_cell_tag = prefixed_tag(prefix, "mergeCell");
    let count = merges.len().to_string();
    let mut start = BytesStart::new(merge_cells_tag.as_str());
    start.push_attribute(("count", count.as_str()));
    writer.write_event(Event::Start(start))?;

    for merge in merges {
        let range = merge.to_string();
        let mut element = BytesStart::new(merge_cell_tag.as_str());
        element.push_attribute(("ref", range.as_str()));
        writer.write_event(Event::Empty(element))?;
    }

    writer.write_event(Event::End(BytesEnd::new(merge_cells_tag.as_str())))?;
    Ok(())
}

fn write_rows<W: Write>(writer: &mut Writer<W>, grid: &Grid, prefix: Option<&str>) -> Result<(), RustyEcrError> {
    let row_tag = prefixed_tag(prefix, "row");
    for (index, row) in grid.rows() {
        if !has_content(row) {
            continue;
        }
        let row_number = index.to_string();
        let mut start = BytesStart::new(row_tag.as_str());
        start.push_attribute(("r", row_number.as_str()));
        for (key, value) in &row.attributes {
            // Cell spans are an optional hint and go stale once cells move
            if key != "r" && key != "spans" {
                start.push_attribute((key.as_str(), value.as_str()));
            }
        }
        writer.write_event(Event::Start(start))?;
        for (col, cell) in &row.cells {
            write_cell(writer, *index, *col, cell, prefix)?;
        }
        writer.write_event(Event::End(BytesEnd::new(row_tag.as_str())))?;
    }
    Ok(())
}

fn has_content(row: &Row) -> bool {
    !row.cells.is_empty() || row.attributes.iter().any(|(key, _)| key != "r" && key != "spans")
}

fn write_cell<W: Write>(writer: &mut Writer<W>, row: usize, col: usize, cell: &Cell, prefix: Option<&str>) -> Result<(), RustyEcrError> {
    let cell_tag = prefixed_tag(prefix, "c");
    let reference = index_to_reference(row, col);
    let style = cell.style.map(|style| style.to_string());
    let shared_index = cell.shared_index.map(|index| index.to_string());

    let (kind, value) = match cell.kind {
        CellType::SharedString => match shared_index.as_deref() {
            Some(index) => (Some("s"), Some(index)),
            None => (Some("inlineStr"), None),
        },
        CellType::InlineString if cell.formula.is_some() => (Some("str"), Some(cell.value.as_str())),
        CellType::InlineString => (Some("inlineStr"), None),
        CellType::Boolean => (Some("b"), Some(cell.value.as_str())),
        CellType::Error => (Some("e"), Some(cell.value.as_str())),
        CellType::IsoDateTime => (Some("d"), Some(cell.value.as_str())),
        CellType::Empty => (None, None),
        _ => (None, Some(cell.value.as_str())),
    };

    let mut start = BytesStart::new(cell_tag.as_str());
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = style.as_deref() {
        start.push_attribute(("s", style));
    }
    if let Some(kind) = kind {
        start.push_attribute(("t", kind));
    }

    let inline = kind == Some("inlineStr");
    if cell.formula.is_none() && !inline && value.map(str::is_empty).unwrap_or(true) {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;

    if let Some(formula) = &cell.formula {
        let formula_tag = prefixed_tag(prefix, "f");
        let mut element = BytesStart::new(formula_tag.as_str());
        for (key, value) in &formula.attributes {
            element.push_attribute((key.as_str(), value.as_str()));
        }
        if formula.text.is_empty() {
            writer.write_event(Event::Empty(element))?;
        } else {
            writer.write_event(Event::Start(element))?;
            writer.write_event(Event::Text(BytesText::new(&formula.text)))?;
            writer.write_event(Event::End(BytesEnd::new(formula_tag.as_str())))?;
        }
    }

    if inline {
        let inline_tag = prefixed_tag(prefix, "is");
        let text_tag = prefixed_tag(prefix, "t");
        let mut text = BytesStart::new(text_tag.as_str());
        if cell.value.starts_with(char::is_whitespace) || cell.value.ends_with(char::is_whitespace) {
            text.push_attribute(("xml:space", "preserve"));
        }
        writer.write_event(Event::Start(BytesStart::new(inline_tag.as_str())))?;
        writer.write_event(Event::Start(text))?;
        writer.write_event(Event::Text(BytesText::new(&cell.value)))?;
        writer.write_event(Event::End(BytesEnd::new(text_tag.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new(inline_tag.as_str())))?;
    } else if let Some(value) = value.filter(|value| !value.is_empty()) {
        let value_tag = prefixed_tag(prefix, "v");
        writer.write_event(Event::Start(BytesStart::new(value_tag.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(value_tag.as_str())))?;
    }

    writer.write_event(Event::End(BytesEnd::new(cell_tag.as_str())))?;
    Ok(())
}

/// Streams `xml`, dropping every element named `local_name` for which `remove` holds.
fn remove_elements<F>(xml: &str, local_name: &[u8], remove: F) -> Result<String, RustyEcrError>
where
    F: Fn(&BytesStart) -> Result<bool, RustyEcrError>,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut skip_depth = 0usize;
    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            _ if skip_depth > 0 => match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => (),
            },
            Event::Start(ref e) if e.local_name().as_ref() == local_name && remove(e)? => skip_depth = 1,
            Event::Empty(ref e) if e.local_name().as_ref() == local_name && remove(e)? => (),
            _ => writer.write_event(event.borrow())?,
        }
    }
    Ok(String::from_utf8(writer.into_inner())?)
}

fn without_calc_chain_override(content_types: &str) -> Result<String, RustyEcrError> {
    remove_elements(content_types, b"Override", |element| {
        Ok(element
            .get_attribute_value("PartName")?
            .map(|name| name.eq_ignore_ascii_case("/xl/calcChain.xml"))
            .unwrap_or(false))
    })
}

fn without_calc_chain_relationship(relationships: &str) -> Result<String, RustyEcrError> {
    remove_elements(relationships, b"Relationship", |element| {
        Ok(element
            .get_attribute_value("Type")?
            .map(|kind| kind.ends_with("/calcChain"))
            .unwrap_or(false))
    })
}

/// Rebuilds the whole package in memory. Parts listed in `replacements` are rewritten, the
/// calculation chain is dropped on request, and every other part is raw-copied.
pub(crate) fn rebuild_package<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    replacements: &HashMap<String, String>,
    drop_calc_chain: bool,
) -> Result<Vec<u8>, RustyEcrError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();

        if drop_calc_chain && name.eq_ignore_ascii_case(CALC_CHAIN_PART) {
            log::debug!("Dropping {} after row insertion", CALC_CHAIN_PART);
            continue;
        }

        if let Some(content) = replacements.get(&name) {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(content.as_bytes())?;
        } else if drop_calc_chain && (name == CONTENT_TYPES_PART || name.eq_ignore_ascii_case(WORKBOOK_RELATIONSHIPS_PART)) {
            let mut content = String::with_capacity(file.size() as usize);
            file.read_to_string(&mut content)?;
            let patched = if name == CONTENT_TYPES_PART {
                without_calc_chain_override(&content)?
            } else {
                without_calc_chain_relationship(&content)?
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(patched.as_bytes())?;
        } else {
            zip.raw_copy_file(file)?;
        }
    }

    Ok(zip.finish()?.into_inner())
}
