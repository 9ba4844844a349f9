//! Section reader: walks the rows after an anchor label and collects record tuples.

use crate::form::descriptor::BlankKey;
use crate::form::descriptor::SectionDescriptor;
use crate::form::locator::LabelLocator;
use crate::form::record::Record;

/// Records of one section plus where they were found.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionRead {
    pub records: Vec<Record>,
    /// First data row after the anchor offset and header rows; `None` when the anchor is absent
    pub first_row: Option<usize>,
    /// Last physical row consumed by a kept record
    pub last_record_row: Option<usize>,
    /// Row that ended the section (stop label, blank key or scan limit)
    pub end_row: Option<usize>,
}

impl SectionRead {
    /// Rows from the first data row through the last kept record.
    pub fn extent(&self) -> usize {
        match (self.first_row, self.last_record_row) {
            (Some(first), Some(last)) if last >= first => last - first + 1,
            _ => 0,
        }
    }
}

/// First data row of a section: anchor plus offset, past up to two header rows.
pub(crate) fn first_data_row(locator: &LabelLocator, descriptor: &SectionDescriptor) -> Option<usize> {
    let anchor = locator.find(&descriptor.start)?;
    let mut row = anchor + descriptor.row_offset;
    for _ in 0..2 {
        if descriptor.is_header_row(locator.grid(), row) {
            row += 1;
        }
    }
    Some(row)
}

/// Reads a section. A missing anchor yields an empty result, never an error.
pub fn read_section(locator: &LabelLocator, descriptor: &SectionDescriptor) -> SectionRead {
    let Some(first) = first_data_row(locator, descriptor) else {
        log::debug!("Section '{}': anchor not found, empty", descriptor.name);
        return SectionRead::default();
    };
    let grid = locator.grid();
    let column = locator.column();
    let limit = locator.last_row();

    let mut read = SectionRead {
        first_row: Some(first),
        ..SectionRead::default()
    };
    let mut row = first;
    while row <= limit {
        let key = grid.get(row, column);
        let stopping = descriptor
            .stop
            .as_ref()
            .is_some_and(|stop| stop.is_match(&key, locator.ignore_case()));
        if stopping && !descriptor.stop_inclusive {
            break;
        }
        if key.is_empty() {
            match descriptor.blank {
                BlankKey::Terminate => break,
                BlankKey::Skip => {
                    row += 1;
                    continue;
                }
                BlankKey::Keep => (),
            }
        } else if descriptor.is_skip_key(&key) {
            row += 1;
            continue;
        }

        let mut record = descriptor.raw_record(grid, row);
        let mut consumed = 1;
        if let Some(paired) = &descriptor.paired {
            if paired.label.is_match(&key, locator.ignore_case()) {
                record.set(&paired.field, grid.get(row + 1, paired.column));
                consumed = 2;
            }
        }
        if !record.is_blank() {
            read.records.push(descriptor.normalize(record));
            read.last_record_row = Some(row + consumed - 1);
        }
        row += consumed;
        if stopping {
            break;
        }
    }
    read.end_row = Some(row);
    log::debug!(
        "Section '{}': {} record(s) in rows {}..{}",
        descriptor.name,
        read.records.len(),
        first,
        row
    );
    read
}
