use crate::error::ResultMessage;
use crate::error::RustyEcrError;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

/// How merged regions are treated when a grid is opened for reading.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Keep merges; every coordinate of a region reads the anchor value.
    #[default]
    Resolve,
    /// Remove every merge up front so each coordinate is addressed independently.
    Unmerge,
}

/// What happens when a write targets a non-anchor cell of a merged region.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeWritePolicy {
    /// Redirect the write to the region's anchor cell.
    #[default]
    Anchor,
    /// Refuse the write with `InvalidWriteTarget`.
    Reject,
}

/// How the section writer sizes the row block of a section that was written before.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionPolicy {
    /// Measure reserved rows from the template boundaries only; rewriting a grown
    /// section inserts again.
    #[default]
    Append,
    /// Count rows already holding section data as reserved, so rewriting overwrites them.
    ReuseWritten,
}

/// Options controlling a read or write session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// 0-based positional worksheet index; `None` uses the layout's own index.
    pub sheet_index: Option<usize>,

    /// Column scanned for anchor labels (1-based).
    pub anchor_column: usize,

    /// Rows covered by the full-grid snapshot in unmerge mode.
    pub scan_rows: usize,

    /// Columns covered by the full-grid snapshot in unmerge mode.
    pub scan_columns: usize,

    /// Hard ceiling for label-terminated sections.
    pub row_ceiling: usize,

    pub merge_mode: MergeMode,

    pub merge_write: MergeWritePolicy,

    pub insertion: InsertionPolicy,

    /// Case-fold labels when matching.
    pub ignore_case: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_index: None,
            anchor_column: 1,
            scan_rows: 200,
            scan_columns: 50,
            row_ceiling: 9999,
            merge_mode: MergeMode::default(),
            merge_write: MergeWritePolicy::default(),
            insertion: InsertionPolicy::default(),
            ignore_case: false,
        }
    }
}

impl Criteria {
    /// Loads criteria from a JSON file; missing keys take their default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Criteria, RustyEcrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Read criteria '{}'", path.display()))?;
        let criteria = serde_json::from_str(&content)
            .map_err(RustyEcrError::from)
            .with_prefix(&format!("Parse criteria '{}'", path.display()))?;
        Ok(criteria)
    }

    pub fn with_sheet_index(mut self, sheet_index: usize) -> Self {
        self.sheet_index = Some(sheet_index);
        self
    }

    pub fn with_anchor_column(mut self, anchor_column: usize) -> Self {
        self.anchor_column = anchor_column.max(1);
        self
    }

    pub fn with_row_ceiling(mut self, row_ceiling: usize) -> Self {
        self.row_ceiling = row_ceiling;
        self
    }

    pub fn with_scan_bounds(mut self, rows: usize, columns: usize) -> Self {
        self.scan_rows = rows;
        self.scan_columns = columns;
        self
    }

    pub fn with_merge_mode(mut self, merge_mode: MergeMode) -> Self {
        self.merge_mode = merge_mode;
        self
    }

    pub fn with_merge_write(mut self, merge_write: MergeWritePolicy) -> Self {
        self.merge_write = merge_write;
        self
    }

    pub fn with_insertion(mut self, insertion: InsertionPolicy) -> Self {
        self.insertion = insertion;
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Worksheet index to open, falling back to the layout default.
    pub(crate) fn resolve_sheet_index(&self, layout_default: usize) -> usize {
        self.sheet_index.unwrap_or(layout_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let criteria = Criteria::default();
        assert_eq!(criteria.anchor_column, 1);
        assert_eq!(criteria.row_ceiling, 9999);
        assert_eq!(criteria.merge_write, MergeWritePolicy::Anchor);
        assert_eq!(criteria.insertion, InsertionPolicy::Append);
        assert_eq!(criteria.resolve_sheet_index(3), 3);
        assert_eq!(criteria.with_sheet_index(0).resolve_sheet_index(3), 0);
    }

    #[test]
    fn partial_json_keeps_defaults() -> Result<(), RustyEcrError> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, r#"{{"insertion": "reuse_written", "ignore_case": true}}"#)?;
        let criteria = Criteria::from_json_file(file.path())?;
        assert_eq!(criteria.insertion, InsertionPolicy::ReuseWritten);
        assert!(criteria.ignore_case);
        assert_eq!(criteria.scan_rows, 200);
        Ok(())
    }

    #[test]
    fn invalid_json_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{").unwrap();
        let error = Criteria::from_json_file(file.path()).unwrap_err();
        assert!(error.to_string().starts_with("Parse criteria"));
    }
}
