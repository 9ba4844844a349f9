//! Section writer: fits a list of records into a template's reserved row block, growing
//! the block by row insertion when the records do not fit.

use crate::error::RustyEcrError;
use crate::form::descriptor::MergeTemplate;
use crate::form::descriptor::ReferenceRow;
use crate::form::descriptor::Reserve;
use crate::form::descriptor::SectionDescriptor;
use crate::form::locator::LabelLocator;
use crate::form::reader::first_data_row;
use crate::form::reader::read_section;
use crate::form::record::Record;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::criteria::InsertionPolicy;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::merge::MergedRegion;
use crate::spreadsheet::SpreadsheetError;

/// Outcome of writing one section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteReport {
    pub section: String,
    pub first_row: usize,
    /// Rows the template held for the section before insertion
    pub reserved: usize,
    pub inserted: usize,
    /// Records written
    pub written: usize,
    /// Cells refused under the reject merge policy, as A1 references
    pub rejected: Vec<String>,
}

/// Writes `value` at a coordinate. Rejected merged targets are recorded and skipped;
/// every other failure is returned.
pub(crate) fn write_cell(
    grid: &mut Grid,
    row: usize,
    col: usize,
    value: &str,
    rejected: &mut Vec<String>,
) -> Result<(), RustyEcrError> {
    match grid.set(row, col, value) {
        Err(RustyEcrError::SpreadsheetError(SpreadsheetError::InvalidWriteTarget { reference, region })) => {
            log::warn!("Skipping write to {} inside merged region {}", reference, region);
            rejected.push(reference);
            Ok(())
        }
        other => other,
    }
}

/// Writes `records` into the section described by `descriptor`.
///
/// Returns `Ok(None)` when the section anchor is not in the sheet. Row insertion failures
/// are fatal; rejected cell writes are reported and writing continues.
pub fn write_section(
    grid: &mut Grid,
    descriptor: &SectionDescriptor,
    records: &[Record],
    criteria: &Criteria,
) -> Result<Option<WriteReport>, RustyEcrError> {
    let Some(layout) = descriptor.write.as_ref() else {
        return Ok(None);
    };

    let (first, end, previously_written, key_column) = {
        let locator = LabelLocator::new(grid, criteria);
        let Some(first) = first_data_row(&locator, descriptor) else {
            log::debug!("Section '{}': anchor not found, nothing written", descriptor.name);
            return Ok(None);
        };
        let end = match (&layout.reserve, layout.end.as_ref().or(descriptor.stop.as_ref())) {
            (Reserve::Fixed(rows), _) => first + rows,
            (Reserve::Boundary, Some(end)) => locator
                .find_from(end, first)
                .unwrap_or_else(|| locator.last_row().max(first) + 1),
            (Reserve::Boundary, None) => locator.last_row().max(first) + 1,
        };
        let previously_written = match criteria.insertion {
            InsertionPolicy::Append => 0,
            InsertionPolicy::ReuseWritten => read_section(&locator, descriptor).extent(),
        };
        (first, end, previously_written, locator.column())
    };

    let key = descriptor.key_field(key_column).map(|field| field.name.clone());
    let inclusive_stop = descriptor.stop.as_ref().filter(|_| descriptor.stop_inclusive);
    let records: Vec<&Record> = records
        .iter()
        .filter(|record| match (inclusive_stop, key.as_deref()) {
            (Some(stop), Some(key)) => !stop.is_match(record.get(key), criteria.ignore_case),
            _ => true,
        })
        .collect();

    let reserved = end.saturating_sub(first).max(previously_written);
    let mut report = WriteReport {
        section: descriptor.name.clone(),
        first_row: first,
        reserved,
        ..WriteReport::default()
    };

    if records.len() > reserved {
        let count = records.len() - reserved;
        let position = first + reserved;
        grid.insert_rows(position, count)?;

        let reference = match layout.reference {
            ReferenceRow::Offset(rows) => position.saturating_sub(rows).max(1),
            ReferenceRow::FirstData => first,
        };
        let reference = if reference >= position { reference + count } else { reference };
        let columns = grid.last_column().max(descriptor.last_column());
        for row in position..position + count {
            grid.copy_row_formatting(reference, row, columns);
            grid.unmerge_row(row);
            if layout.merges == MergeTemplate::FromReference {
                grid.apply_merge_from_reference(reference, row);
            }
        }
        report.inserted = count;
        log::debug!(
            "Section '{}': {} record(s) for {} reserved row(s), inserted {} at row {} from reference row {}",
            descriptor.name,
            records.len(),
            reserved,
            count,
            position,
            reference
        );
    }

    for (index, record) in records.iter().enumerate() {
        let row = first + index;
        if let MergeTemplate::Spans(spans) = &layout.merges {
            grid.unmerge_row(row);
            for (first_col, last_col) in spans {
                if let Err(error) = grid.merge(MergedRegion::row_span(row, *first_col, *last_col)) {
                    log::debug!("{}", error);
                }
            }
        }
        for field in &descriptor.fields {
            let value = record.get(&field.name);
            let value = if value.trim().is_empty() {
                String::new()
            } else {
                field.kind.normalize(value)
            };
            write_cell(grid, row, field.column, &value, &mut report.rejected)?;
        }
        report.written += 1;
    }
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::descriptor::Field;
    use crate::form::descriptor::WriteLayout;
    use crate::form::locator::Matcher;
    use crate::spreadsheet::cell::Cell;
    use crate::spreadsheet::criteria::MergeWritePolicy;
    use crate::spreadsheet::grid::Row;
    use std::collections::BTreeMap;

    fn text_row(cells: &[(usize, &str)]) -> Row {
        Row {
            attributes: Vec::new(),
            cells: cells.iter().map(|(col, text)| (*col, Cell::inline(text, None))).collect(),
        }
    }

    /// Section rows 2..=4 reserved before "Next section"; row 4 carries a style and a merge.
    fn template() -> Grid {
        let mut rows = BTreeMap::new();
        rows.insert(1, text_row(&[(1, "Supporting documents")]));
        rows.insert(
            4,
            Row {
                attributes: vec![("ht".to_owned(), "30".to_owned())],
                cells: BTreeMap::from([(4, Cell::styled(Some(7)))]),
            },
        );
        rows.insert(5, text_row(&[(1, "Next section")]));
        rows.insert(7, text_row(&[(1, "Footer")]));
        Grid::from_parts(
            rows,
            vec![MergedRegion::row_span(4, 4, 15), MergedRegion::row_span(7, 1, 3)],
            None,
        )
    }

    fn descriptor() -> SectionDescriptor {
        SectionDescriptor::new("docs", Matcher::contains("Supporting documents"))
            .stop(Matcher::contains("Next section"))
            .field(Field::text("file", 1))
            .field(Field::text("title", 4))
    }

    fn records(count: usize) -> Vec<Record> {
        (1..=count)
            .map(|n| Record::new().with("file", format!("f{n}.pdf")).with("title", format!("Title {n}")))
            .collect()
    }

    #[test]
    fn fits_without_insertion() -> Result<(), RustyEcrError> {
        let mut grid = template();
        let report = write_section(&mut grid, &descriptor(), &records(2), &Criteria::default())?.unwrap();
        assert_eq!((report.first_row, report.reserved, report.inserted, report.written), (2, 3, 0, 2));
        assert_eq!(grid.get(3, 4), "Title 2");
        assert_eq!(grid.get(5, 1), "Next section");
        Ok(())
    }

    #[test]
    fn grows_block_before_boundary() -> Result<(), RustyEcrError> {
        let mut grid = template();
        let report = write_section(&mut grid, &descriptor(), &records(5), &Criteria::default())?.unwrap();
        assert_eq!((report.reserved, report.inserted, report.written), (3, 2, 5));
        assert_eq!(grid.get(6, 4), "Title 5");
        assert_eq!(grid.get(7, 1), "Next section");
        // new rows copy the style and merges of the row above the insertion point
        assert_eq!(grid.cell(5, 4).and_then(|cell| cell.style), Some(7));
        assert_eq!(grid.row_attributes(6), &[("ht".to_owned(), "30".to_owned())]);
        assert!(grid.merges().contains(&MergedRegion::row_span(6, 4, 15)));
        // later merges moved down with their rows
        assert!(grid.merges().contains(&MergedRegion::row_span(9, 1, 3)));
        Ok(())
    }

    #[test]
    fn fixed_reserve_grows_on_every_append() -> Result<(), RustyEcrError> {
        let descriptor = descriptor().write(WriteLayout::default().fixed(3).reference(ReferenceRow::Offset(2)));
        let mut grid = template();
        write_section(&mut grid, &descriptor, &records(5), &Criteria::default())?;
        assert_eq!(grid.get(7, 1), "Next section");
        let report = write_section(&mut grid, &descriptor, &records(5), &Criteria::default())?.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(grid.get(9, 1), "Next section");
        // the previous run's tail is left behind under the new block
        assert_eq!(grid.get(7, 1), "f4.pdf");
        Ok(())
    }

    #[test]
    fn offset_reference_copies_the_row_two_above_insertion() -> Result<(), RustyEcrError> {
        let descriptor = descriptor().write(WriteLayout::default().fixed(3).reference(ReferenceRow::Offset(2)));
        let (mut rows, mut merges) = (template().rows().clone(), template().merges().to_vec());
        rows.insert(
            3,
            Row {
                attributes: vec![("ht".to_owned(), "12".to_owned())],
                cells: BTreeMap::from([(4, Cell::styled(Some(5)))]),
            },
        );
        merges.push(MergedRegion::row_span(3, 1, 3));
        let mut grid = Grid::from_parts(rows, merges, None);

        let report = write_section(&mut grid, &descriptor, &records(5), &Criteria::default())?.unwrap();
        assert_eq!(report.inserted, 2);
        for row in [5, 6] {
            assert_eq!(grid.cell(row, 4).and_then(|cell| cell.style), Some(5));
            assert_eq!(grid.row_attributes(row), &[("ht".to_owned(), "12".to_owned())]);
            assert!(grid.merges().contains(&MergedRegion::row_span(row, 1, 3)));
            assert!(!grid.merges().contains(&MergedRegion::row_span(row, 4, 15)));
        }
        assert_eq!(grid.get(6, 1), "f5.pdf");
        assert_eq!(grid.get(6, 4), "Title 5");
        Ok(())
    }

    #[test]
    fn reuse_written_overwrites_previous_rows() -> Result<(), RustyEcrError> {
        let descriptor = descriptor().write(WriteLayout::default().fixed(3));
        let criteria = Criteria::default().with_insertion(InsertionPolicy::ReuseWritten);
        let mut grid = template();
        write_section(&mut grid, &descriptor, &records(5), &criteria)?;
        let report = write_section(&mut grid, &descriptor, &records(5), &criteria)?.unwrap();
        assert_eq!((report.reserved, report.inserted), (5, 0));
        assert_eq!(grid.get(7, 1), "Next section");
        Ok(())
    }

    #[test]
    fn spans_apply_to_every_written_row() -> Result<(), RustyEcrError> {
        let descriptor = descriptor().write(WriteLayout::default().spans(&[(1, 3), (4, 15)]));
        let mut grid = template();
        write_section(&mut grid, &descriptor, &records(4), &Criteria::default())?;
        for row in 2..=5 {
            assert!(grid.merges().contains(&MergedRegion::row_span(row, 1, 3)));
            assert!(grid.merges().contains(&MergedRegion::row_span(row, 4, 15)));
        }
        Ok(())
    }

    #[test]
    fn missing_anchor_writes_nothing() -> Result<(), RustyEcrError> {
        let mut grid = template();
        let descriptor = SectionDescriptor::new("none", Matcher::contains("Absent")).field(Field::text("file", 1));
        assert_eq!(write_section(&mut grid, &descriptor, &records(2), &Criteria::default())?, None);
        assert_eq!(write_section(&mut grid, &descriptor.read_only(), &records(2), &Criteria::default())?, None);
        Ok(())
    }

    #[test]
    fn inclusive_stop_rows_are_not_written() -> Result<(), RustyEcrError> {
        let mut grid = Grid::new();
        grid.set(1, 1, "4. Approval").unwrap();
        grid.set(4, 1, "Change manager of the owner").unwrap();
        let descriptor = SectionDescriptor::new("approvals", Matcher::prefix("4."))
            .offset(2)
            .stop_inclusive(Matcher::contains("change manager of the owner").ignore_case())
            .field(Field::text("position", 1))
            .field(Field::text("responsible", 5));
        let records = vec![
            Record::new().with("position", "Engineer").with("responsible", "Ivanov"),
            Record::new().with("position", "Change Manager of the Owner").with("responsible", "Petrov"),
        ];
        let report = write_section(&mut grid, &descriptor, &records, &Criteria::default())?.unwrap();
        assert_eq!((report.reserved, report.written), (1, 1));
        assert_eq!(grid.get(3, 5), "Ivanov");
        assert_eq!(grid.get(4, 5), "");
        Ok(())
    }

    #[test]
    fn rejected_cells_are_reported() -> Result<(), RustyEcrError> {
        let mut grid = template().with_write_policy(MergeWritePolicy::Reject);
        let descriptor = descriptor().field(Field::text("tail", 10));
        let records = vec![Record::new().with("file", "a").with("title", "b").with("tail", "c"); 3];
        let report = write_section(&mut grid, &descriptor, &records, &Criteria::default())?.unwrap();
        assert_eq!(report.rejected, vec!["J4".to_owned()]);
        assert_eq!(grid.get(4, 4), "b");
        Ok(())
    }
}
