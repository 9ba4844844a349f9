//! In-memory worksheet grid: merge-resolved reads, policy-checked writes, row insertion
//! with merge and formula maintenance, and formatting copies between rows.

use crate::error::RustyEcrError;
use crate::helpers::xml::set_attribute;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::criteria::MergeWritePolicy;
use crate::spreadsheet::merge::MergedRegion;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::shift_formula_rows;
use crate::spreadsheet::reference::shift_sqref;
use crate::spreadsheet::reference::ReferenceError;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SpreadsheetError;
use std::collections::BTreeMap;

/// One worksheet row: its `<row>` attributes and its cells keyed by 1-based column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub attributes: Vec<(String, String)>,
    pub cells: BTreeMap<usize, Cell>,
}

impl Row {
    fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.attributes.iter().all(|(key, _)| key == "r" || key == "spans")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Grid {
    rows: BTreeMap<usize, Row>,
    merges: Vec<MergedRegion>,
    declared: Option<MergedRegion>,
    write_policy: MergeWritePolicy,
    insertions: Vec<(usize, usize)>,
    dirty: bool,
}

impl Grid {
    pub fn new() -> Self {
        Grid::default()
    }

    /// Builds a grid from loaded parts. Overlapping merges keep the first region seen.
    pub(crate) fn from_parts(rows: BTreeMap<usize, Row>, merges: Vec<MergedRegion>, declared: Option<MergedRegion>) -> Self {
        let mut grid = Grid {
            rows,
            declared,
            ..Grid::default()
        };
        for region in merges {
            if let Err(error) = grid.merge(region) {
                log::warn!("Dropping merge {}: {}", region, error);
            }
        }
        grid.dirty = false;
        grid
    }

    pub fn with_write_policy(mut self, policy: MergeWritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn set_write_policy(&mut self, policy: MergeWritePolicy) {
        self.write_policy = policy;
    }

    pub fn write_policy(&self) -> MergeWritePolicy {
        self.write_policy
    }

    /// Stored cell at a coordinate, without merge resolution.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(&row).and_then(|cells| cells.cells.get(&col))
    }

    pub(crate) fn rows(&self) -> &BTreeMap<usize, Row> {
        &self.rows
    }

    pub fn row_attributes(&self, row: usize) -> &[(String, String)] {
        self.rows
            .get(&row)
            .map(|cells| cells.attributes.as_slice())
            .unwrap_or(&[])
    }

    /// Logical trimmed text at a coordinate. Inside a merged region this is the anchor's
    /// value; outside the sheet it is the empty string.
    pub fn get(&self, row: usize, col: usize) -> String {
        if row == 0 || col == 0 || row > MAX_ROWS || col > MAX_COLUMNS {
            return String::new();
        }
        let (row, col) = self
            .merged_region_at(row, col)
            .map(MergedRegion::anchor)
            .unwrap_or((row, col));
        self.cell(row, col)
            .map(|cell| cell.to_string().trim().to_owned())
            .unwrap_or_default()
    }

    /// Writes text at a coordinate as an inline string, keeping the cell style and dropping
    /// any formula. A non-anchor target inside a merge follows the write policy.
    pub fn set(&mut self, row: usize, col: usize, value: &str) -> Result<(), RustyEcrError> {
        if row == 0 || col == 0 || row > MAX_ROWS || col > MAX_COLUMNS {
            Err(ReferenceError::InvalidCellReference(format!("R{}C{}", row, col)))?
        }
        let (row, col) = match self.merged_region_at(row, col) {
            Some(region) if region.anchor() != (row, col) => match self.write_policy {
                MergeWritePolicy::Anchor => region.anchor(),
                MergeWritePolicy::Reject => Err(SpreadsheetError::InvalidWriteTarget {
                    reference: index_to_reference(row, col),
                    region: region.to_string(),
                })?,
            },
            _ => (row, col),
        };

        let style = self.cell(row, col).and_then(|cell| cell.style);
        let cells = &mut self.rows.entry(row).or_default().cells;
        if value.is_empty() && style.is_none() {
            cells.remove(&col);
        } else {
            cells.insert(col, Cell::inline(value, style));
        }
        self.dirty = true;
        Ok(())
    }

    pub fn merges(&self) -> &[MergedRegion] {
        &self.merges
    }

    pub fn merged_region_at(&self, row: usize, col: usize) -> Option<&MergedRegion> {
        self.merges.iter().find(|region| region.contains(row, col))
    }

    /// Adds a merged region. One-cell regions are ignored; overlaps are refused.
    pub fn merge(&mut self, region: MergedRegion) -> Result<(), RustyEcrError> {
        if region.is_single_cell() {
            return Ok(());
        }
        if let Some(existing) = self.merges.iter().find(|existing| existing.overlaps(&region)) {
            Err(SpreadsheetError::MergeOverlap {
                region: region.to_string(),
                existing: existing.to_string(),
            })?
        }
        self.merges.push(region);
        self.dirty = true;
        Ok(())
    }

    /// Removes every merged region and returns how many there were.
    pub fn unmerge_all(&mut self) -> usize {
        let count = self.merges.len();
        if count > 0 {
            self.merges.clear();
            self.dirty = true;
        }
        count
    }

    /// Removes the single-row regions lying on `row`.
    pub fn unmerge_row(&mut self, row: usize) -> usize {
        let before = self.merges.len();
        self.merges
            .retain(|region| !(region.is_single_row() && region.first_row == row));
        let removed = before - self.merges.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Highest row holding a cell, row formatting, a merge or a declared bound.
    pub fn last_row(&self) -> usize {
        let stored = self
            .rows
            .iter()
            .rev()
            .find(|(_, row)| !row.is_empty())
            .map(|(index, _)| *index)
            .unwrap_or(0);
        let merged = self.merges.iter().map(|region| region.last_row).max().unwrap_or(0);
        let declared = self.declared.map(|region| region.last_row).unwrap_or(0);
        stored.max(merged).max(declared)
    }

    /// Highest column holding a cell, a merge or a declared bound.
    pub fn last_column(&self) -> usize {
        let stored = self
            .rows
            .values()
            .filter_map(|row| row.cells.keys().next_back().copied())
            .max()
            .unwrap_or(0);
        let merged = self.merges.iter().map(|region| region.last_col).max().unwrap_or(0);
        let declared = self.declared.map(|region| region.last_col).unwrap_or(0);
        stored.max(merged).max(declared)
    }

    /// Range covering every stored cell, for the `<dimension>` element.
    pub(crate) fn used_range(&self) -> Option<MergedRegion> {
        let first_row = self
            .rows
            .iter()
            .find(|(_, row)| !row.cells.is_empty())
            .map(|(index, _)| *index)?;
        let last_row = self
            .rows
            .iter()
            .rev()
            .find(|(_, row)| !row.cells.is_empty())
            .map(|(index, _)| *index)?;
        let columns = self.rows.values().flat_map(|row| row.cells.keys().copied());
        let (first_col, last_col) = columns.fold((usize::MAX, 0), |(low, high), col| (low.min(col), high.max(col)));
        Some(MergedRegion::new(first_row, first_col, last_row, last_col))
    }

    /// Shifts rows at or after `before_row` down by `count`, leaving blank rows behind.
    /// Merges move with their rows and a merge straddling the insertion point grows.
    /// Same-sheet formula references are rewritten.
    pub fn insert_rows(&mut self, before_row: usize, count: usize) -> Result<(), RustyEcrError> {
        if count == 0 {
            return Ok(());
        }
        let last_row = self.last_row();
        let failure = |reason: &str| SpreadsheetError::RowInsertionFailure {
            row: before_row,
            count,
            reason: reason.to_owned(),
        };
        if before_row == 0 {
            Err(failure("row numbers start at 1"))?
        }
        if before_row > last_row + 1 {
            Err(failure(&format!("sheet ends at row {}", last_row)))?
        }
        if last_row + count > MAX_ROWS {
            Err(failure(&format!("sheet cannot exceed {} rows", MAX_ROWS)))?
        }

        let moved = self.rows.split_off(&before_row);
        for (index, row) in moved {
            self.rows.insert(index + count, row);
        }
        for row in self.rows.values_mut() {
            for cell in row.cells.values_mut() {
                if let Some(formula) = cell.formula.as_mut() {
                    formula.text = shift_formula_rows(&formula.text, before_row, count);
                    let shared_range = formula
                        .attributes
                        .iter()
                        .find(|(key, _)| key == "ref")
                        .map(|(_, value)| shift_sqref(value, before_row, count));
                    if let Some(range) = shared_range {
                        set_attribute(&mut formula.attributes, "ref", range);
                    }
                }
            }
        }
        for region in self.merges.iter_mut() {
            *region = region.shifted(before_row, count);
        }
        if let Some(declared) = self.declared.as_mut() {
            *declared = declared.shifted(before_row, count);
        }

        self.insertions.push((before_row, count));
        self.dirty = true;
        log::debug!("Inserted {} row(s) before row {}", count, before_row);
        Ok(())
    }

    /// Copies cell styles of columns `1..=column_count` and the row attributes (height,
    /// row style) from `source_row` to `dest_row`. Values are not copied.
    pub fn copy_row_formatting(&mut self, source_row: usize, dest_row: usize, column_count: usize) {
        if source_row == dest_row || dest_row == 0 {
            return;
        }
        let source = self.rows.get(&source_row).cloned().unwrap_or_default();
        let destination = self.rows.entry(dest_row).or_default();

        let mut attributes: Vec<(String, String)> = source
            .attributes
            .into_iter()
            .filter(|(key, _)| key != "r")
            .collect();
        if let Some((_, row_number)) = destination.attributes.iter().find(|(key, _)| key == "r") {
            attributes.insert(0, ("r".to_owned(), row_number.to_owned()));
        }
        destination.attributes = attributes;

        for col in 1..=column_count {
            let style = source.cells.get(&col).and_then(|cell| cell.style);
            match destination.cells.get_mut(&col) {
                Some(cell) => cell.style = style,
                None if style.is_some() => {
                    destination.cells.insert(col, Cell::styled(style));
                }
                None => (),
            }
        }
        self.dirty = true;
    }

    /// Recreates every single-row merge of `source_row` on `dest_row`. Regions that would
    /// overlap an existing merge are skipped. Returns the number of regions created.
    pub fn apply_merge_from_reference(&mut self, source_row: usize, dest_row: usize) -> usize {
        if source_row == dest_row {
            return 0;
        }
        let template: Vec<MergedRegion> = self
            .merges
            .iter()
            .filter(|region| region.is_single_row() && region.first_row == source_row)
            .copied()
            .collect();
        template
            .into_iter()
            .filter(|region| match self.merge(region.moved_to_row(dest_row)) {
                Ok(()) => true,
                Err(error) => {
                    log::debug!("{}", error);
                    false
                }
            })
            .count()
    }

    /// Non-empty logical values within `rows x cols`, in row-major scan order.
    pub fn snapshot(&self, rows: usize, cols: usize) -> Vec<((usize, usize), String)> {
        let mut snapshot = Vec::new();
        for row in 1..=rows {
            for col in 1..=cols {
                let value = self.get(row, col);
                if !value.is_empty() {
                    snapshot.push(((row, col), value));
                }
            }
        }
        snapshot
    }

    /// Row insertions applied since load, in order, as `(before_row, count)`.
    pub fn insertions(&self) -> &[(usize, usize)] {
        &self.insertions
    }

    /// Whether the grid changed since it was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
