//! # Spreadsheet Layer
//!
//! Uniform access to one worksheet of an `.xlsx` workbook as a [`Grid`]: merge-resolved
//! reads, policy-checked writes, row insertion that keeps merges and formulas in place,
//! and saving the patched package back to the same path.
//!
//! A [`Session`] scopes the open workbook to one read or write operation. Write sessions
//! only touch the file when [`Session::commit`] is called.

pub mod cell;
pub mod criteria;
pub mod grid;
pub mod merge;
pub(crate) mod package;
pub mod reference;
pub(crate) mod xlsx;

use crate::error::RustyEcrError;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::criteria::MergeMode;
use crate::spreadsheet::grid::Grid;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

/// Errors raised by the spreadsheet layer.
#[derive(Error, Debug, PartialEq)]
pub enum SpreadsheetError {
    /// The requested positional sheet index does not exist; fatal for the session
    #[error("Sheet #{index} not found in '{file}' ({count} sheet(s))")]
    SheetNotFound { index: usize, file: String, count: usize },

    /// A write hit a non-anchor cell of a merged region under the reject policy
    #[error("Cannot write to {reference}: it lies inside merged region {region}")]
    InvalidWriteTarget { reference: String, region: String },

    /// Rows could not be inserted; fatal for the write session
    #[error("Cannot insert {count} row(s) before row {row}: {reason}")]
    RowInsertionFailure { row: usize, count: usize, reason: String },

    #[error("Merged region {region} overlaps {existing}")]
    MergeOverlap { region: String, existing: String },

    /// A date-like value did not parse; callers pass the raw text through
    #[error("Malformed date '{0}'")]
    MalformedDate(String),

    #[error("Missing part '{0}'")]
    FileError(String),

    #[error("Spreadsheet '{0}' has no sheets")]
    SpreadsheetEmptyError(String),

    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormat(String),
}

/// A workbook whose sheets can be loaded into grids and saved back.
pub trait Spreadsheet {
    /// Returns the file name of this spreadsheet
    fn name(&self) -> String;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    fn sheet_count(&self) -> usize {
        self.sheet_names().len()
    }

    /// Loads the sheet at a 0-based position; `SheetNotFound` when it does not exist
    fn load_grid(&mut self, index: usize) -> Result<Grid, RustyEcrError>;

    /// Writes the grid into the sheet at `index` and saves the workbook to its own path
    fn save_grid(&mut self, index: usize, grid: &Grid) -> Result<(), RustyEcrError>;
}

/// Opens a spreadsheet, choosing the reader from the file extension.
///
/// Supported formats: `.xlsx`, `.xlsm`, `.xltx`, `.xltm`.
pub fn open_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Box<dyn Spreadsheet>, RustyEcrError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xltx") | Some("xltm") => Ok(Box::new(XlsxSpreadsheet::open(path)?)),
        _ => Err(SpreadsheetError::InvalidFileFormat(path.to_string_lossy().to_string()))?,
    }
}

/// One open worksheet, scoped to a single read or write operation.
///
/// The workbook handle is released when the session is dropped, on every path. Changes
/// reach the file only through [`Session::commit`].
pub struct Session {
    spreadsheet: Box<dyn Spreadsheet>,
    sheet_index: usize,
    grid: Grid,
    writable: bool,
    committed: bool,
}

impl Session {
    /// Opens a read session. In unmerge mode every merge is removed up front so each
    /// coordinate reads independently.
    pub fn read<P: AsRef<Path>>(path: P, sheet_index: usize, criteria: &Criteria) -> Result<Session, RustyEcrError> {
        let mut session = Session::open(path, sheet_index, criteria, false)?;
        if criteria.merge_mode == MergeMode::Unmerge {
            let count = session.grid.unmerge_all();
            log::debug!("Unmerged {} region(s) for reading", count);
            if log::log_enabled!(log::Level::Trace) {
                for ((row, col), value) in session.grid.snapshot(criteria.scan_rows, criteria.scan_columns) {
                    log::trace!("{} = {:?}", index_to_reference(row, col), value);
                }
            }
        }
        Ok(session)
    }

    /// Opens a write session; merges are always kept.
    pub fn write<P: AsRef<Path>>(path: P, sheet_index: usize, criteria: &Criteria) -> Result<Session, RustyEcrError> {
        Session::open(path, sheet_index, criteria, true)
    }

    fn open<P: AsRef<Path>>(path: P, sheet_index: usize, criteria: &Criteria, writable: bool) -> Result<Session, RustyEcrError> {
        let mut spreadsheet = open_spreadsheet(path)?;
        let grid = spreadsheet
            .load_grid(sheet_index)?
            .with_write_policy(criteria.merge_write);
        log::info!(
            "Opened {} session on sheet #{} of '{}'",
            if writable { "write" } else { "read" },
            sheet_index,
            spreadsheet.name()
        );
        Ok(Session {
            spreadsheet,
            sheet_index,
            grid,
            writable,
            committed: false,
        })
    }

    pub fn name(&self) -> String {
        self.spreadsheet.name()
    }

    pub fn sheet_index(&self) -> usize {
        self.sheet_index
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Saves the grid when it changed, then releases the workbook. Read sessions never save.
    pub fn commit(mut self) -> Result<(), RustyEcrError> {
        self.committed = true;
        if self.writable && self.grid.is_dirty() {
            self.spreadsheet.save_grid(self.sheet_index, &self.grid)?;
            log::info!("Committed sheet #{} of '{}'", self.sheet_index, self.spreadsheet.name());
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.writable && !self.committed && self.grid.is_dirty() {
            log::warn!(
                "Discarding uncommitted changes to sheet #{} of '{}'",
                self.sheet_index,
                self.spreadsheet.name()
            );
        }
    }
}
