mod common;

use common::write_workbook;
use common::Sheet;
use rusty_ecr::spreadsheet::criteria::MergeMode;
use rusty_ecr::spreadsheet::criteria::MergeWritePolicy;
use rusty_ecr::spreadsheet::merge::MergedRegion;
use rusty_ecr::spreadsheet::Session;
use rusty_ecr::spreadsheet::SpreadsheetError;
use rusty_ecr::Criteria;
use std::error::Error;
use std::io::Read;
use std::path::Path;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn sample(path: &Path) -> TestResult {
    write_workbook(
        path,
        &[
            Sheet::new("Cover").text(1, 1, "Cover page"),
            Sheet::new("Data")
                .text(1, 1, "Title & summary")
                .merge("A1:C1")
                .texts(2, &[(1, "one"), (2, "two")])
                .styled(3, 1, "styled", 2)
                .text(4, 1, "Total")
                .formula(4, 2, "SUM(B2:B3)")
                .tail(r#"<conditionalFormatting sqref="B2:B4"><cfRule type="cellIs" priority="1" operator="equal"><formula>0</formula></cfRule></conditionalFormatting>"#),
        ],
    )
}

fn sheet_xml(path: &Path, part: &str) -> Result<String, Box<dyn Error>> {
    let mut zip = zip::ZipArchive::new(std::fs::File::open(path)?)?;
    let mut xml = String::new();
    zip.by_name(part)?.read_to_string(&mut xml)?;
    Ok(xml)
}

#[test]
fn merged_cells_resolve_to_their_anchor() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;

    let session = Session::read(&path, 1, &Criteria::default())?;
    let grid = session.grid();
    assert_eq!(grid.get(1, 1), "Title & summary");
    assert_eq!(grid.get(1, 3), "Title & summary");
    assert_eq!(grid.get(2, 2), "two");
    assert_eq!(grid.get(9, 9), "");
    assert_eq!(grid.merges(), &[MergedRegion::new(1, 1, 1, 3)]);
    assert_eq!(grid.cell(3, 1).and_then(|cell| cell.style), Some(2));
    Ok(())
}

#[test]
fn unmerge_mode_reads_each_cell_independently() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;

    let criteria = Criteria::default().with_merge_mode(MergeMode::Unmerge);
    let session = Session::read(&path, 1, &criteria)?;
    assert!(session.grid().merges().is_empty());
    assert_eq!(session.grid().get(1, 1), "Title & summary");
    assert_eq!(session.grid().get(1, 3), "");
    Ok(())
}

#[test]
fn missing_sheet_is_fatal() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;

    let error = Session::read(&path, 2, &Criteria::default()).err().ok_or("sheet #2 must not exist")?;
    match error.as_spreadsheet_error() {
        Some(SpreadsheetError::SheetNotFound { index, count, .. }) => {
            assert_eq!((*index, *count), (2, 2));
        }
        other => panic!("unexpected error {:?}", other),
    }
    Ok(())
}

#[test]
fn committed_insertions_shift_cells_merges_and_formulas() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;

    let mut session = Session::write(&path, 1, &Criteria::default())?;
    let grid = session.grid_mut();
    grid.insert_rows(3, 2)?;
    grid.copy_row_formatting(5, 3, 3);
    grid.set(3, 1, "inserted")?;
    grid.set(1, 2, "redirected")?;
    session.commit()?;

    let session = Session::read(&path, 1, &Criteria::default())?;
    let grid = session.grid();
    assert_eq!(grid.get(1, 1), "redirected");
    assert_eq!(grid.get(3, 1), "inserted");
    assert_eq!(grid.cell(3, 1).and_then(|cell| cell.style), Some(2));
    assert_eq!(grid.get(5, 1), "styled");
    assert_eq!(grid.get(6, 1), "Total");
    let formula = grid.cell(6, 2).and_then(|cell| cell.formula.as_ref()).map(|formula| formula.text.as_str());
    assert_eq!(formula, Some("SUM(B2:B5)"));

    let xml = sheet_xml(&path, "xl/worksheets/sheet2.xml")?;
    assert!(xml.contains(r#"sqref="B2:B6""#), "{}", xml);
    assert_eq!(sheet_xml(&path, "xl/worksheets/sheet1.xml")?.matches("Cover page").count(), 1);
    Ok(())
}

#[test]
fn reject_policy_refuses_non_anchor_writes() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;

    let criteria = Criteria::default().with_merge_write(MergeWritePolicy::Reject);
    let mut session = Session::write(&path, 1, &criteria)?;
    let error = session.grid_mut().set(1, 2, "refused").err().ok_or("write must be refused")?;
    assert_eq!(
        error.as_spreadsheet_error(),
        Some(&SpreadsheetError::InvalidWriteTarget {
            reference: "B1".to_owned(),
            region: "A1:C1".to_owned(),
        })
    );
    assert_eq!(session.grid().get(1, 1), "Title & summary");
    Ok(())
}

#[test]
fn changes_reach_the_file_only_on_commit() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("sample.xlsx");
    sample(&path)?;
    let before = std::fs::read(&path)?;

    {
        let mut session = Session::write(&path, 1, &Criteria::default())?;
        session.grid_mut().set(2, 1, "changed")?;
        session.grid_mut().insert_rows(2, 1)?;
    }
    assert_eq!(std::fs::read(&path)?, before);

    let session = Session::read(&path, 1, &Criteria::default())?;
    session.commit()?;
    assert_eq!(std::fs::read(&path)?, before);
    Ok(())
}
