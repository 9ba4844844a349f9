use crate::error::RustyEcrError;
use crate::spreadsheet::SpreadsheetError;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use std::fmt::Display;

/// Types of cell data in spreadsheet files.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            _ => Self::Number,
        }
    }

    /// Whether the value is written to the sheet without a `t` attribute.
    pub(crate) fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Number
                | Self::NumberDateTime1900
                | Self::NumberDate1900
                | Self::NumberTime1900
                | Self::NumberDateTime1904
                | Self::NumberDate1904
                | Self::NumberTime1904
        )
    }
}

/// A cell formula: its text plus the raw `<f>` attributes (`t`, `ref`, `si`, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Formula {
    pub text: String,
    pub attributes: Vec<(String, String)>,
}

/// A single stored cell. Position is held by the owning grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    /// Cell data type
    pub kind: CellType,
    /// Resolved cell value as string (shared strings already looked up)
    pub value: String,
    /// Index into the shared string table, kept so untouched cells round-trip unchanged
    pub shared_index: Option<usize>,
    /// Style (`cellXfs`) index
    pub style: Option<usize>,
    pub formula: Option<Formula>,
}

impl Cell {
    /// Blank cell carrying only a style.
    pub fn styled(style: Option<usize>) -> Self {
        Cell {
            style,
            ..Cell::default()
        }
    }

    /// Text written by the accessor: stored inline, keeps the style, drops any formula.
    pub fn inline(value: &str, style: Option<usize>) -> Self {
        Cell {
            kind: if value.is_empty() { CellType::Empty } else { CellType::InlineString },
            value: value.to_owned(),
            shared_index: None,
            style,
            formula: None,
        }
    }

    /// Whether the cell holds neither a value nor a formula.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

impl Display for Cell {
    /// Visible text of the cell. Date serials render as ISO text; anything that cannot be
    /// rendered falls back to the raw stored value.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = match self.kind {
            CellType::Boolean => Ok(if self.value == "1" || self.value.eq_ignore_ascii_case("true") {
                "true"
            } else {
                "false"
            }
            .to_owned()),
            CellType::NumberDateTime1900 => to_datetime_string(&self.value, false),
            CellType::NumberDate1900 => to_date_string(&self.value, false),
            CellType::NumberDateTime1904 => to_datetime_string(&self.value, true),
            CellType::NumberDate1904 => to_date_string(&self.value, true),
            CellType::NumberTime1900 | CellType::NumberTime1904 => to_time_string(&self.value),
            CellType::IsoDateTime => Ok(self.value.replace('T', " ")),
            _ => Ok(self.value.to_owned()),
        };
        match rendered {
            Ok(value) => write!(f, "{}", value),
            Err(_) => write!(f, "{}", self.value),
        }
    }
}

/// Converts Excel numeric date to ISO date string.
/// Handles Lotus 1-2-3 leap year bug for 1900 epoch.
fn to_date_string(value: &str, is_1904: bool) -> Result<String, RustyEcrError> {
    let serial = value.parse::<f64>()?.trunc();
    let offset = if is_1904 {
        1462
    } else if serial < 60.0 {
        1 // Lotus 1-2-3 leap year bug
    } else {
        0
    };
    let date = Some(serial)
        .filter(|serial| serial.is_finite() && serial.abs() < i64::MAX as f64)
        .and_then(|serial| (serial as i64).checked_add(offset))
        .and_then(Duration::try_days)
        .and_then(|duration| NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(duration))
        .ok_or_else(|| SpreadsheetError::MalformedDate(value.to_owned()))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

/// Converts Excel numeric time to ISO time string.
pub(crate) fn to_time_string(value: &str) -> Result<String, RustyEcrError> {
    let factor = value.parse::<f64>()?.fract().abs();
    let mut hours = (factor * 86400000f64).round() as i64;
    let milliseconds = hours % 1_000; hours /= 1_000;
    let seconds = hours % 60; hours /= 60;
    let minutes = hours % 60; hours /= 60;
    let timestamp = if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    };
    Ok(timestamp)
}

/// Converts Excel numeric datetime to ISO datetime string.
pub(crate) fn to_datetime_string(value: &str, is_1904: bool) -> Result<String, RustyEcrError> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Ok(format!("{date} {time}"))
}

/// Input layouts accepted for date fields, tried in order.
const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parses a date-like text into a calendar date, ignoring any time-of-day part.
pub fn parse_date(text: &str) -> Result<NaiveDate, SpreadsheetError> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok().map(|datetime| datetime.date()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        })
        .ok_or_else(|| SpreadsheetError::MalformedDate(text.to_owned()))
}

/// Trims a date-like value to `dd.mm.yyyy`. Values that do not parse are passed through as-is.
pub fn trim_date(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match parse_date(text) {
        Ok(date) => date.format("%d.%m.%Y").to_string(),
        Err(error) => {
            log::debug!("{}, keeping raw text", error);
            text.trim().to_owned()
        }
    }
}
