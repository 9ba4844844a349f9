//! Label lookup in the anchor column of a grid.

use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::grid::Grid;
use serde::Deserialize;
use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The trimmed cell text contains the pattern.
    #[default]
    Contains,
    /// The cell text, line breaks removed, starts with the pattern.
    Prefix,
}

/// Text predicate over anchor labels, with alternative spellings of the same caption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    patterns: Vec<String>,
    #[serde(default)]
    mode: MatchMode,
    #[serde(default)]
    ignore_case: bool,
}

impl Matcher {
    pub fn contains(pattern: &str) -> Self {
        Matcher {
            patterns: vec![pattern.to_owned()],
            mode: MatchMode::Contains,
            ignore_case: false,
        }
    }

    pub fn prefix(pattern: &str) -> Self {
        Matcher {
            patterns: vec![pattern.to_owned()],
            mode: MatchMode::Prefix,
            ignore_case: false,
        }
    }

    /// Adds an alternative pattern, e.g. the Russian caption of an English label.
    pub fn or(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_owned());
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Tests a cell text. Case folding applies when either the matcher or the caller asks for it.
    pub fn is_match(&self, text: &str, ignore_case: bool) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let ignore_case = ignore_case || self.ignore_case;
        let folded = fold(text, ignore_case);
        let stripped = fold(&strip_breaks(text), ignore_case);
        self.patterns
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| match self.mode {
                MatchMode::Contains => {
                    folded.contains(&fold(pattern, ignore_case))
                        || stripped.contains(&fold(&strip_breaks(pattern), ignore_case))
                }
                MatchMode::Prefix => stripped.starts_with(&fold(&strip_breaks(pattern), ignore_case)),
            })
    }
}

fn fold(text: &str, ignore_case: bool) -> String {
    if ignore_case {
        text.to_lowercase()
    } else {
        text.to_owned()
    }
}

fn strip_breaks(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Scans one column of a grid top-to-bottom for labels. The first match wins.
pub struct LabelLocator<'a> {
    grid: &'a Grid,
    column: usize,
    ceiling: usize,
    ignore_case: bool,
}

impl<'a> LabelLocator<'a> {
    pub fn new(grid: &'a Grid, criteria: &Criteria) -> Self {
        LabelLocator {
            grid,
            column: criteria.anchor_column.max(1),
            ceiling: criteria.row_ceiling,
            ignore_case: criteria.ignore_case,
        }
    }

    pub fn grid(&self) -> &'a Grid {
        self.grid
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Last row worth scanning: the sheet end, capped by the row ceiling.
    pub fn last_row(&self) -> usize {
        self.grid.last_row().min(self.ceiling)
    }

    /// Row of the first cell containing `label`, or 0 when no row matches.
    pub fn find_row(&self, label: &str, ignore_case: bool) -> usize {
        let matcher = Matcher::contains(label);
        let matcher = if ignore_case { matcher.ignore_case() } else { matcher };
        self.find(&matcher).unwrap_or(0)
    }

    pub fn find(&self, matcher: &Matcher) -> Option<usize> {
        self.find_from(matcher, 1)
    }

    /// First matching row at or after `start`.
    pub fn find_from(&self, matcher: &Matcher, start: usize) -> Option<usize> {
        let found = (start.max(1)..=self.last_row())
            .find(|row| matcher.is_match(&self.grid.get(*row, self.column), self.ignore_case));
        match found {
            Some(row) => log::debug!("Label {:?} found at row {}", matcher.patterns(), row),
            None => log::debug!("Label {:?} not found from row {}", matcher.patterns(), start),
        }
        found
    }

    /// First matching cell in any column, scanning row by row. Non-anchor cells of merged
    /// regions are skipped so a merged caption is reported once, at its anchor.
    pub fn find_anywhere(&self, matcher: &Matcher) -> Option<(usize, usize)> {
        let last_column = self.grid.last_column();
        for row in 1..=self.last_row() {
            for col in 1..=last_column {
                let is_anchor = self
                    .grid
                    .merged_region_at(row, col)
                    .map_or(true, |region| region.anchor() == (row, col));
                if is_anchor && matcher.is_match(&self.grid.get(row, col), self.ignore_case) {
                    return Some((row, col));
                }
            }
        }
        None
    }
}
