use crate::error::RustyEcrError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::name_to_column;
use crate::spreadsheet::reference::shift_row;
use crate::spreadsheet::reference::ReferenceError;
use crate::spreadsheet::reference::MAX_ROWS;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?([A-Z]+)\$?(\d+)(:\$?([A-Z]+)\$?(\d+))?$").expect("static regex must compile")
});

/// A rectangular merged cell region (1-based, inclusive bounds).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MergedRegion {
    pub first_row: usize,
    pub first_col: usize,
    pub last_row: usize,
    pub last_col: usize,
}

impl MergedRegion {
    /// Creates a region from two corners given in any order.
    pub fn new(first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> Self {
        MergedRegion {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    /// Single-row region spanning `first_col..=last_col`.
    pub fn row_span(row: usize, first_col: usize, last_col: usize) -> Self {
        MergedRegion::new(row, first_col, row, last_col)
    }

    /// Top-left cell which holds the region's value.
    pub fn anchor(&self) -> (usize, usize) {
        (self.first_row, self.first_col)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.first_row..=self.last_row).contains(&row) && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn overlaps(&self, other: &MergedRegion) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    pub fn is_single_row(&self) -> bool {
        self.first_row == self.last_row
    }

    /// Whether the region is a single cell, which Excel does not store as a merge.
    pub fn is_single_cell(&self) -> bool {
        self.is_single_row() && self.first_col == self.last_col
    }

    /// Region after inserting `count` rows before `before_row`; a region straddling the
    /// insertion point grows instead of splitting.
    pub fn shifted(&self, before_row: usize, count: usize) -> Self {
        MergedRegion {
            first_row: shift_row(self.first_row, before_row, count),
            first_col: self.first_col,
            last_row: shift_row(self.last_row, before_row, count),
            last_col: self.last_col,
        }
    }

    /// Same column span placed on another row.
    pub fn moved_to_row(&self, row: usize) -> Self {
        MergedRegion::row_span(row, self.first_col, self.last_col)
    }
}

impl TryFrom<&str> for MergedRegion {
    type Error = RustyEcrError;

    /// Parses a `ref` attribute such as "A1:O3". A single reference yields a one-cell region.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim().to_ascii_uppercase();
        let captures = RANGE_PATTERN
            .captures(value.as_str())
            .ok_or_else(|| ReferenceError::InvalidRangeReference(value.to_owned()))?;

        let column = |index: usize| {
            captures
                .get(index)
                .and_then(|matcher| name_to_column(matcher.as_str()))
        };
        let row = |index: usize| {
            captures
                .get(index)
                .and_then(|matcher| matcher.as_str().parse::<usize>().ok())
                .filter(|row| (1..=MAX_ROWS).contains(row))
        };

        let first = row(2).zip(column(1));
        let last = if captures.get(3).is_some() { row(5).zip(column(4)) } else { first };
        match first.zip(last) {
            Some(((first_row, first_col), (last_row, last_col))) => {
                Ok(MergedRegion::new(first_row, first_col, last_row, last_col))
            }
            None => Err(ReferenceError::InvalidRangeReference(value.to_owned()))?,
        }
    }
}

impl Display for MergedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            index_to_reference(self.first_row, self.first_col),
            index_to_reference(self.last_row, self.last_col)
        )
    }
}
