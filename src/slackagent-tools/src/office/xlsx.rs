//! Spreadsheet generation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use slackagent_protocol::GeneratedFile;

use super::{Package, XLSX_MIME, content_types, relationships, root_rels, xml_escape};
use crate::error::{ToolError, ToolResult};
use crate::file_name::sanitize_file_name;
use crate::spec::{Tool, ToolOutput, parse_args};
use crate::state::InvocationState;

const MAX_SHEETS: usize = 20;
const MAX_CELLS: usize = 200_000;
const MAX_SHEET_NAME_CHARS: usize = 31;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";

/// One worksheet: a name and rows of JSON cells.
#[derive(Debug, Clone, Deserialize)]
pub struct SheetSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ExcelArgs {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    sheets: Vec<SheetSpec>,
}

/// Build an `.xlsx` workbook. Numbers and booleans keep their type; other
/// values are written as text; `null` leaves the cell empty.
pub fn build_workbook(sheets: &[SheetSpec]) -> ToolResult<Vec<u8>> {
    if sheets.is_empty() {
        return Err(ToolError::InvalidArguments(
            "at least one sheet is required".to_string(),
        ));
    }
    if sheets.len() > MAX_SHEETS {
        return Err(ToolError::InvalidArguments(format!(
            "at most {MAX_SHEETS} sheets are supported, got {}",
            sheets.len()
        )));
    }
    let cells: usize = sheets
        .iter()
        .flat_map(|s| s.rows.iter())
        .map(Vec::len)
        .sum();
    if cells > MAX_CELLS {
        return Err(ToolError::InvalidArguments(format!(
            "at most {MAX_CELLS} cells are supported, got {cells}"
        )));
    }

    let names = unique_sheet_names(sheets);
    let mut package = Package::new();

    let mut overrides = vec![(
        "/xl/workbook.xml".to_string(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    )];
    for i in 1..=sheets.len() {
        overrides.push((
            format!("/xl/worksheets/sheet{i}.xml"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
        ));
    }
    package.add("[Content_Types].xml", &content_types(&overrides))?;
    package.add("_rels/.rels", &root_rels("xl/workbook.xml"))?;

    let mut workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>"#
    );
    for (i, name) in names.iter().enumerate() {
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_escape(name),
            i + 1,
            i + 1
        ));
    }
    workbook.push_str("</sheets></workbook>");
    package.add("xl/workbook.xml", &workbook)?;

    let ids: Vec<(String, String)> = (1..=sheets.len())
        .map(|i| (format!("rId{i}"), format!("worksheets/sheet{i}.xml")))
        .collect();
    let entries: Vec<(&str, &str, &str)> = ids
        .iter()
        .map(|(id, target)| (id.as_str(), WORKSHEET_REL, target.as_str()))
        .collect();
    package.add("xl/_rels/workbook.xml.rels", &relationships(&entries))?;

    for (i, sheet) in sheets.iter().enumerate() {
        package.add(&format!("xl/worksheets/sheet{}.xml", i + 1), &worksheet_xml(sheet))?;
    }

    package.finish()
}

fn worksheet_xml(sheet: &SheetSpec) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}"><sheetData>"#
    );
    for (r, row) in sheet.rows.iter().enumerate() {
        let row_number = r + 1;
        xml.push_str(&format!(r#"<row r="{row_number}">"#));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{row_number}", column_letters(c));
            match value {
                Value::Null => {}
                Value::Number(n) => {
                    xml.push_str(&format!(r#"<c r="{reference}"><v>{n}</v></c>"#));
                }
                Value::Bool(b) => {
                    xml.push_str(&format!(
                        r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                        u8::from(*b)
                    ));
                }
                Value::String(s) => xml.push_str(&inline_string(&reference, s)),
                other => xml.push_str(&inline_string(&reference, &other.to_string())),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn inline_string(reference: &str, text: &str) -> String {
    format!(
        r#"<c r="{reference}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
        xml_escape(text)
    )
}

/// Zero-based column index to spreadsheet letters (0 → A, 26 → AA).
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Valid, unique sheet names: forbidden characters removed, at most 31
/// characters, `SheetN` for blanks, numeric suffixes for duplicates.
fn unique_sheet_names(sheets: &[SheetSpec]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(sheets.len());
    for (i, sheet) in sheets.iter().enumerate() {
        let cleaned: String = sheet
            .name
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') && !c.is_control())
            .collect();
        let cleaned = cleaned.trim().trim_matches('\'');
        let base: String = if cleaned.is_empty() {
            format!("Sheet{}", i + 1)
        } else {
            cleaned.chars().take(MAX_SHEET_NAME_CHARS).collect()
        };

        let mut candidate = base.clone();
        let mut n = 2;
        while names.iter().any(|existing| existing.eq_ignore_ascii_case(&candidate)) {
            let suffix = format!(" ({n})");
            let keep = MAX_SHEET_NAME_CHARS.saturating_sub(suffix.chars().count());
            candidate = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
            n += 1;
        }
        names.push(candidate);
    }
    names
}

/// `generate_excel`.
#[derive(Debug, Default)]
pub struct ExcelTool;

impl ExcelTool {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, args: Value, state: &InvocationState) -> ToolResult<String> {
        let args: ExcelArgs = parse_args(args)?;
        let bytes = build_workbook(&args.sheets)?;
        let file_name = sanitize_file_name(&args.file_name, "xlsx", "workbook");

        let summary = args
            .sheets
            .iter()
            .zip(unique_sheet_names(&args.sheets))
            .map(|(sheet, name)| format!("{name}: {} rows", sheet.rows.len()))
            .collect::<Vec<_>>()
            .join(", ");
        let description = format!("Excel workbook with {} sheet(s) ({summary})", args.sheets.len());

        state.store(GeneratedFile::new(bytes, &file_name, XLSX_MIME, &description));
        Ok(format!(
            "Created {file_name}: {description}. It will be attached to the reply."
        ))
    }
}

#[async_trait]
impl Tool for ExcelTool {
    fn name(&self) -> &str {
        crate::names::GENERATE_EXCEL
    }

    fn description(&self) -> &str {
        "Create an Excel (.xlsx) workbook from tabular data. Use the first row of each sheet as a header row. The file is attached to the reply."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {"type": "string", "description": "File name, e.g. sales_report.xlsx"},
                "sheets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "rows": {
                                "type": "array",
                                "items": {"type": "array", "items": {"type": ["string", "number", "boolean", "null"]}}
                            }
                        },
                        "required": ["name", "rows"]
                    }
                }
            },
            "required": ["file_name", "sheets"]
        })
    }

    async fn invoke(&self, args: Value, state: &InvocationState) -> ToolOutput {
        ToolOutput::from_result(self.run(args, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::office::test_support::{part_names, read_part};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_sheet_names_are_cleaned_and_unique() {
        let sheets = vec![
            SheetSpec { name: "Q1/Q2".into(), rows: vec![] },
            SheetSpec { name: "q1q2".into(), rows: vec![] },
            SheetSpec { name: "".into(), rows: vec![] },
            SheetSpec { name: "x".repeat(40), rows: vec![] },
        ];
        let names = unique_sheet_names(&sheets);
        assert_eq!(names[0], "Q1Q2");
        assert_eq!(names[1], "q1q2 (2)");
        assert_eq!(names[2], "Sheet3");
        assert_eq!(names[3].chars().count(), 31);
    }

    #[test]
    fn test_workbook_parts_and_cells() {
        let sheets = vec![SheetSpec {
            name: "Sales".into(),
            rows: vec![
                vec![json!("Region"), json!("Amount"), json!("Final")],
                vec![json!("East & West"), json!(1200.5), json!(true)],
                vec![json!(null), json!(3)],
            ],
        }];
        let bytes = build_workbook(&sheets).unwrap();

        let names = part_names(&bytes);
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/worksheets/sheet1.xml",
        ] {
            assert!(names.contains(&part.to_string()), "missing {part}");
        }

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve">East &amp; West</t></is></c>"#));
        assert!(sheet.contains(r#"<c r="B2"><v>1200.5</v></c>"#));
        assert!(sheet.contains(r#"<c r="C2" t="b"><v>1</v></c>"#));
        assert!(!sheet.contains(r#"r="A3""#));
        assert!(read_part(&bytes, "xl/workbook.xml").contains(r#"name="Sales""#));
    }

    #[test]
    fn test_no_sheets_is_an_error() {
        assert!(matches!(build_workbook(&[]), Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_tool_stores_file() {
        let state = InvocationState::new();
        let output = ExcelTool::new()
            .invoke(
                json!({"file_name": "report", "sheets": [{"name": "Data", "rows": [["a", 1]]}]}),
                &state,
            )
            .await;
        assert!(!output.is_error, "{}", output.text);
        assert!(output.text.contains("report.xlsx"));

        let file = state.take().unwrap();
        assert_eq!(file.file_name, "report.xlsx");
        assert_eq!(file.mime_type, XLSX_MIME);
        assert!(file.description.contains("Data: 1 rows"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_produce_no_file() {
        let state = InvocationState::new();
        let output = ExcelTool::new()
            .invoke(json!({"file_name": "x", "sheets": "nope"}), &state)
            .await;
        assert!(output.is_error);
        assert!(!state.has_file());
    }
}
