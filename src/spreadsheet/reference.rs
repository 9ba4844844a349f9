//! A1-style cell references (1-based rows and columns) and row shifting of
//! references embedded in formulas and `sqref` lists.

use thiserror::Error;

/// Largest row number a worksheet can hold.
pub const MAX_ROWS: usize = 1_048_576;

/// Largest column number a worksheet can hold (`XFD`).
pub const MAX_COLUMNS: usize = 16_384;

/// Errors related to A1 reference parsing.
#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("Invalid cell reference '{0}'")]
    InvalidCellReference(String),

    #[error("Invalid range reference '{0}'")]
    InvalidRangeReference(String),
}

/// Converts a 1-based column number to its letter name (1 -> "A", 27 -> "AA").
pub fn column_to_name(col: usize) -> String {
    let mut col = col.max(1);
    let mut letters = Vec::new();
    while col > 0 {
        let remainder = ((col - 1) % 26) as u8;
        letters.push((b'A' + remainder) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Converts a column letter name to its 1-based number ("A" -> 1). Case-insensitive.
pub fn name_to_column(name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    let mut col = 0usize;
    for character in name.chars() {
        if !character.is_ascii_alphabetic() {
            return None;
        }
        let digit = (character.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    (col <= MAX_COLUMNS).then_some(col)
}

/// Formats a 1-based (row, col) pair as an A1 reference.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", column_to_name(col), row)
}

/// Parses an A1 reference (absolute markers allowed) into a 1-based (row, col) pair.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.trim().replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let col = name_to_column(letters)?;
    let row = digits.parse::<usize>().ok()?;
    (row >= 1 && row <= MAX_ROWS).then_some((row, col))
}

/// Maps a row number through an insertion of `count` rows before `before_row`.
pub(crate) fn shift_row(row: usize, before_row: usize, count: usize) -> usize {
    if row >= before_row {
        row + count
    } else {
        row
    }
}

/// Rewrites same-sheet A1 references inside a formula after inserting `count` rows
/// before `before_row`. String literals and sheet-qualified references are left alone.
pub fn shift_formula_rows(formula: &str, before_row: usize, count: usize) -> String {
    let chars: Vec<char> = formula.chars().collect();
    let mut shifted = String::with_capacity(formula.len() + 4);
    let mut index = 0usize;
    let mut in_string = false;
    let mut in_sheet_name = false;
    // Set after `!` until the qualified reference or range ends
    let mut qualified = false;
    while let Some(&character) = chars.get(index) {
        if character == '"' && !in_sheet_name {
            in_string = !in_string;
            shifted.push(character);
            index += 1;
            continue;
        }
        if character == '\'' && !in_string {
            in_sheet_name = !in_sheet_name;
            shifted.push(character);
            index += 1;
            continue;
        }
        if in_string || in_sheet_name {
            shifted.push(character);
            index += 1;
            continue;
        }
        if character == '!' {
            qualified = true;
            shifted.push(character);
            index += 1;
            continue;
        }
        if character == '$' || character.is_ascii_alphabetic() {
            if !qualified {
                if let Some((end, reference)) = shift_reference_at(&chars, index, before_row, count) {
                    shifted.push_str(&reference);
                    index = end;
                    continue;
                }
            }
            // Skip the rest of an identifier so "LOG10" is not read as column LOG row 10
            while let Some(&next) = chars.get(index) {
                if next.is_ascii_alphanumeric() || next == '_' || next == '.' || next == '$' {
                    shifted.push(next);
                    index += 1;
                } else {
                    break;
                }
            }
            continue;
        }
        if character != ':' {
            qualified = false;
        }
        shifted.push(character);
        index += 1;
    }
    shifted
}

/// Tries to read a cell reference starting at `start`; returns the end index and the shifted text.
fn shift_reference_at(chars: &[char], start: usize, before_row: usize, count: usize) -> Option<(usize, String)> {
    let previous = start.checked_sub(1).and_then(|index| chars.get(index)).copied();
    if matches!(previous, Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '!') {
        return None;
    }

    let mut index = start;
    let column_absolute = chars.get(index) == Some(&'$');
    if column_absolute {
        index += 1;
    }
    let column_start = index;
    while matches!(chars.get(index), Some(c) if c.is_ascii_alphabetic()) {
        index += 1;
    }
    let letters: String = chars[column_start..index].iter().collect();
    name_to_column(&letters)?;

    let row_absolute = chars.get(index) == Some(&'$');
    if row_absolute {
        index += 1;
    }
    let row_start = index;
    while matches!(chars.get(index), Some(c) if c.is_ascii_digit()) {
        index += 1;
    }
    if row_start == index {
        return None;
    }
    let next = chars.get(index).copied();
    if matches!(next, Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '(' || c == '!') {
        return None;
    }

    let digits: String = chars[row_start..index].iter().collect();
    let row = shift_row(digits.parse::<usize>().ok()?, before_row, count);
    let reference = format!(
        "{}{}{}{}",
        if column_absolute { "$" } else { "" },
        letters,
        if row_absolute { "$" } else { "" },
        row
    );
    Some((index, reference))
}

/// Shifts the rows of a reference list such as `A1:B2 D4` (the `sqref` syntax).
/// A range that straddles the insertion point grows to keep covering its rows.
pub fn shift_sqref(sqref: &str, before_row: usize, count: usize) -> String {
    sqref
        .split_whitespace()
        .map(|token| match token.split_once(':') {
            Some((first, last)) => match (reference_to_index(first), reference_to_index(last)) {
                (Some((first_row, first_col)), Some((last_row, last_col))) => format!(
                    "{}:{}",
                    index_to_reference(shift_row(first_row, before_row, count), first_col),
                    index_to_reference(shift_row(last_row, before_row, count), last_col)
                ),
                _ => token.to_owned(),
            },
            None => match reference_to_index(token) {
                Some((row, col)) => index_to_reference(shift_row(row, before_row, count), col),
                None => token.to_owned(),
            },
        })
        .collect::<Vec<_>>()
        .join(" ")
}
