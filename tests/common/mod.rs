#![allow(dead_code)]

use rusty_ecr::spreadsheet::reference::index_to_reference;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One worksheet of a fixture workbook.
#[derive(Default)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(usize, usize), (String, Option<usize>)>,
    formulas: BTreeMap<(usize, usize), String>,
    merges: Vec<String>,
    tail: String,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Sheet {
            name: name.to_owned(),
            ..Sheet::default()
        }
    }

    pub fn text(mut self, row: usize, col: usize, value: &str) -> Self {
        self.cells.insert((row, col), (value.to_owned(), None));
        self
    }

    pub fn texts(mut self, row: usize, values: &[(usize, &str)]) -> Self {
        for (col, value) in values {
            self = self.text(row, *col, value);
        }
        self
    }

    pub fn styled(mut self, row: usize, col: usize, value: &str, style: usize) -> Self {
        self.cells.insert((row, col), (value.to_owned(), Some(style)));
        self
    }

    pub fn formula(mut self, row: usize, col: usize, formula: &str) -> Self {
        self.formulas.insert((row, col), formula.to_owned());
        self
    }

    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_owned());
        self
    }

    /// Raw XML placed after `mergeCells`, e.g. conditional formatting.
    pub fn tail(mut self, xml: &str) -> Self {
        self.tail.push_str(xml);
        self
    }

    fn xml(&self) -> String {
        let mut rows: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for ((row, col), (value, style)) in &self.cells {
            let style = style.map(|s| format!(r#" s="{}""#, s)).unwrap_or_default();
            rows.entry(*row).or_default().push(format!(
                r#"<c r="{}" t="inlineStr"{}><is><t xml:space="preserve">{}</t></is></c>"#,
                index_to_reference(*row, *col),
                style,
                escape(value)
            ));
        }
        for ((row, col), formula) in &self.formulas {
            rows.entry(*row).or_default().push(format!(
                r#"<c r="{}"><f>{}</f><v>0</v></c>"#,
                index_to_reference(*row, *col),
                escape(formula)
            ));
        }
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheetData>"#,
        );
        for (row, mut cells) in rows {
            // cells must be in column order
            cells.sort_by_key(|cell| column_order(cell));
            xml.push_str(&format!(r#"<row r="{}">{}</row>"#, row, cells.concat()));
        }
        xml.push_str("</sheetData>");
        if !self.merges.is_empty() {
            xml.push_str(&format!(r#"<mergeCells count="{}">"#, self.merges.len()));
            for merge in &self.merges {
                xml.push_str(&format!(r#"<mergeCell ref="{}"/>"#, merge));
            }
            xml.push_str("</mergeCells>");
        }
        xml.push_str(&self.tail);
        xml.push_str("</worksheet>");
        xml
    }
}

fn column_order(cell: &str) -> (usize, String) {
    let reference: String = cell
        .trim_start_matches(r#"<c r=""#)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (reference.len(), reference)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes a workbook holding `sheets` in order.
pub fn write_workbook(path: &Path, sheets: &[Sheet]) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (index, sheet) in sheets.iter().enumerate() {
        let number = index + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            number
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(&sheet.name),
            number,
            number
        ));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            number, number
        ));
    }
    relationships.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheets.len() + 1
    ));
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(content_types.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
    )?;
    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook.as_bytes())?;
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(relationships.as_bytes())?;
    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="0"/><xf numFmtId="0"/></cellXfs></styleSheet>"#,
    )?;
    for (index, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
        zip.write_all(sheet.xml().as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

/// Change Request template on the second sheet (index 1), filled in.
pub fn change_request_sheet() -> Sheet {
    Sheet::new("CR")
        .text(1, 1, "1.1 General information")
        .texts(2, &[(1, "Change Request No:"), (4, "CR-0042"), (8, "Contractor Change Coordinator:"), (10, "Ivanov"), (11, "Initiator's internal CR No:"), (15, "INT-7")])
        .texts(3, &[(1, "Change Initiator:"), (4, "Petrov"), (8, "Initiator's organization:"), (10, "ACME")])
        .texts(4, &[(1, "Type of documentation, where Engineering Change will be reflected"), (4, "MDD/DDD")])
        .texts(5, &[(1, "Reason of Engineering Change:"), (4, "Pipe clash")])
        .texts(6, &[(1, "Initiator's description of technical solution"), (4, "Reroute line")])
        .text(7, 1, "1.2 Supporting documents")
        .texts(8, &[(1, "Filename"), (4, "Code, title")])
        .texts(9, &[(1, "spec.pdf"), (4, "Specification")])
        .merge("A9:C9")
        .merge("D9:O9")
        .merge("A10:C10")
        .merge("D10:O10")
        .text(11, 1, "2.1 Impact on TDD of the initiator")
        .texts(12, &[(1, "TDD code"), (4, "Revision")])
        .texts(13, &[(1, "TDD-1"), (4, "A"), (5, "yes"), (6, "Layout"), (8, "Issued"), (9, "Move pipe"), (11, "no"), (15, "yes")])
        .text(15, 1, "2.2 Impact on other TDD")
        .texts(16, &[(1, "Evaluation organization"), (2, "TDD code")])
        .texts(17, &[(1, "Designer"), (2, "TDD-9"), (4, "B"), (5, "no"), (6, "Spec"), (8, "Draft"), (9, "Update")])
        .text(19, 1, "2.3 Affected SSCs")
        .texts(20, &[(1, "KKS code"), (2, "Name of SSC")])
        .texts(21, &[(1, "10UJA"), (2, "Reactor building"), (6, "New penetration")])
        .text(23, 1, "2.4 Engineering evaluation")
        .texts(24, &[(1, "Final NSC category of the Engineering Change:"), (4, "a/ab")])
        .texts(25, &[(1, "Presence of direct or indirect impact on equipment of 1,2 and 3 safety classes"), (4, "Yes")])
        .texts(26, &[(1, "Presence the impact on the results DSA"), (4, "No")])
        .texts(27, &[(1, "Method* of CR:"), (4, "Simple")])
        .texts(28, &[(1, "Comments for engineering evaluation:"), (4, "None")])
        .text(29, 1, "The presence of an impact on documents that need to be revised")
        .text(30, 1, "2.5 Non-technical assessment")
        .texts(31, &[(1, "Contract (its  presence indicates a commercial impact)"), (4, "No")])
        .texts(32, &[(1, "Cost impact:"), (4, "Yes")])
        .texts(33, &[(1, "Schedule:"), (4, "No")])
        .texts(34, &[(1, "Comments for non-technical assessment:"), (4, "ok")])
        .text(35, 1, "3. Confirmations")
        .texts(36, &[(1, "Organization"), (2, "Position")])
        .texts(37, &[(1, "Designer"), (2, "Lead"), (5, "Sidorov"), (11, "15.01.2024")])
        .text(39, 1, "4. Approvals")
        .text(40, 1, "Position")
        .texts(41, &[(1, "Chief engineer"), (5, "Smirnov"), (11, "20.01.2024")])
        .texts(42, &[(1, "Change manager of the owner"), (5, "Kuznetsov")])
        .text(43, 1, "Remarks")
        .formula(44, 4, "COUNTA(A13:A17)")
}

/// Field Change Request template on the fourth sheet (index 3), filled in.
pub fn field_change_request_sheet() -> Sheet {
    Sheet::new("FCR")
        .texts(2, &[(1, "FCR No."), (3, "FCR-0007"), (7, "2024-02-01"), (12, "Smith")])
        .texts(5, &[(3, "ACME"), (7, "INT-1"), (10, "Jones"), (14, "Engineer")])
        .texts(6, &[(4, "DDD"), (7, "Documentation Red Change"), (11, "Construction"), (15, "NPP")])
        .texts(7, &[(4, "Normal")])
        .texts(8, &[(4, "No"), (9, "R-12")])
        .text(10, 1, "Replace gasket material")
        .text(12, 1, "List of affected SSC")
        .texts(13, &[(1, "Building KKS"), (5, "System KKS"), (11, "Component KKS")])
        .texts(14, &[(1, "10UJA"), (5, "JEA"), (11, "AA101")])
        .text(16, 1, "If the code of the SSC is not specified, describe the location")
        .text(17, 1, "Document Set Code")
        .texts(18, &[(1, "DS-1"), (3, "01"), (4, "ED-100"), (6, "Piping plan"), (9, "B"), (10, "3"), (11, "AM1"), (12, "Change route")])
        .text(20, 1, "Supporting and describing documents\nIf the document is attached, give its file name")
        .texts(21, &[(1, "Filename & extension"), (4, "Code, title or summary of the document")])
        .styled(22, 1, "calc.pdf", 2)
        .styled(22, 4, "Calculation", 2)
        .merge("A22:C22")
        .merge("D22:O22")
        .styled(23, 1, "", 1)
        .styled(23, 4, "", 1)
        .merge("A23:C23")
        .merge("D23:O23")
        .styled(24, 1, "", 2)
        .styled(24, 4, "", 2)
        .merge("A24:B24")
        .merge("D24:O24")
        .texts(25, &[(1, "The material is equivalent:"), (4, "Yes"), (15, "No")])
        .text(26, 1, "Comments and/or reasons to reject approving replacement of material")
        .text(27, 1, "none")
        .text(28, 1, "Link to documents justifying the decision")
        .texts(29, &[(1, "Filename & extension"), (4, "Code, title or summary of the document")])
        .texts(30, &[(1, "link.pdf"), (4, "Justification")])
        .merge("A30:C30")
        .text(32, 1, "For the 'Documentation Red Change' type of change")
        .texts(33, &[(1, "Nuclear Safety"), (2, "No")])
        .texts(34, &[(1, "Fire Safety"), (2, "Yes")])
        .texts(35, &[(1, "Prompt release of a new revision of DDD"), (2, "Yes")])
        .texts(36, &[(1, "of MDD"), (2, "No")])
        .texts(37, &[(1, "Cost"), (2, "No")])
        .text(39, 1, "Comments and/or reasons for refusal to approve changes to the documentation")
        .text(40, 1, "n/a")
        .texts(41, &[(1, "Final approval method"), (3, "Normal")])
        .text(42, 1, "Project Participant position")
        .texts(43, &[(1, "Chief engineer"), (7, "Brown"), (11, "2024-02-10")])
        .text(45, 1, "* digital signature can be used for signing the FCR")
        .tail(r#"<conditionalFormatting sqref="A43:K43"><cfRule type="expression" priority="1"><formula>$A43=""</formula></cfRule></conditionalFormatting>"#)
}

/// A workbook with `sheet` at position `index`, preceded by placeholder sheets.
pub fn workbook_with(path: &Path, index: usize, sheet: Sheet) -> Result<(), Box<dyn std::error::Error>> {
    let mut sheets: Vec<Sheet> = (0..index).map(|i| Sheet::new(&format!("Sheet{}", i + 1)).text(1, 1, "placeholder")).collect();
    sheets.push(sheet);
    write_workbook(path, &sheets)
}
