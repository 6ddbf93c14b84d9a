use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::OutputFormat;
use crate::error::RenderError;
use crate::parser::{ParsedRecord, TabularRecord};
use crate::render::{artifact_path, write_artifact, DocumentArtifact, DocumentRenderer, TemplateAssets};

pub const SHEET_NAME: &str = "Sheet1";
pub const SHEET_PART: &str = "xl/worksheets/sheet1.xml";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs></styleSheet>"#;

/// Transcribes semicolon-delimited rows into a single-sheet XLSX workbook.
/// Every field becomes an inline text cell; nothing is coerced to numbers.
pub struct TabularRenderer;

impl TabularRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TabularRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRenderer for TabularRenderer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Tabular
    }

    fn render(
        &self,
        record: &ParsedRecord,
        _assets: Option<&TemplateAssets>,
        source: &Path,
    ) -> Result<DocumentArtifact, RenderError> {
        let _span = tracing::info_span!("render.xlsx").entered();

        let ParsedRecord::Tabular(table) = record else {
            return Err(RenderError::RecordMismatch {
                expected: "tabular",
            });
        };

        let path = artifact_path(source, OutputFormat::Tabular)?;
        let bytes = build_workbook(table)?;
        write_artifact(&path, &bytes)?;

        tracing::debug!(
            rows = table.row_count(),
            columns = table.column_count(),
            "Wrote workbook"
        );

        Ok(DocumentArtifact {
            path,
            format: OutputFormat::Tabular,
        })
    }
}

/// Builds the complete `.xlsx` package in memory.
pub fn build_workbook(table: &TabularRecord) -> Result<Vec<u8>, RenderError> {
    let sheet = sheet_xml(table)?;
    let workbook = workbook_xml()?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
        ("_rels/.rels", ROOT_RELS_XML.as_bytes()),
        ("xl/workbook.xml", workbook.as_slice()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.as_bytes()),
        ("xl/styles.xml", STYLES_XML.as_bytes()),
        (SHEET_PART, sheet.as_slice()),
    ];

    for (name, content) in parts {
        zip.start_file(name, options).map_err(spreadsheet_err)?;
        zip.write_all(content).map_err(spreadsheet_err)?;
    }

    let cursor = zip.finish().map_err(spreadsheet_err)?;
    Ok(cursor.into_inner())
}

/// Converts a 1-based column index to its letter name (1 → A, 27 → AA).
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        name.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// `A1`-style reference for a 1-based row and column.
pub fn cell_reference(row: usize, column: usize) -> String {
    format!("{}{}", column_name(column), row)
}

fn workbook_xml() -> Result<Vec<u8>, RenderError> {
    let mut writer = Writer::new(Vec::new());
    write_decl(&mut writer)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("workbook").with_attributes([("xmlns", NS_MAIN), ("xmlns:r", NS_REL)]),
        ))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("sheets")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", SHEET_NAME),
            ("sheetId", "1"),
            ("r:id", "rId1"),
        ])))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("sheets")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("workbook")))
        .map_err(spreadsheet_err)?;
    Ok(writer.into_inner())
}

fn sheet_xml(table: &TabularRecord) -> Result<Vec<u8>, RenderError> {
    let mut writer = Writer::new(Vec::new());
    write_decl(&mut writer)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("worksheet").with_attributes([("xmlns", NS_MAIN), ("xmlns:r", NS_REL)]),
        ))
        .map_err(spreadsheet_err)?;

    if table.row_count() > 0 && table.column_count() > 0 {
        let dimension = format!(
            "A1:{}",
            cell_reference(table.row_count(), table.column_count())
        );
        writer
            .write_event(Event::Empty(
                BytesStart::new("dimension").with_attributes([("ref", dimension.as_str())]),
            ))
            .map_err(spreadsheet_err)?;
    }

    writer
        .write_event(Event::Start(BytesStart::new("sheetData")))
        .map_err(spreadsheet_err)?;

    for (i, row) in table.rows().iter().enumerate() {
        let row_number = (i + 1).to_string();
        writer
            .write_event(Event::Start(
                BytesStart::new("row").with_attributes([("r", row_number.as_str())]),
            ))
            .map_err(spreadsheet_err)?;

        for (j, value) in row.iter().enumerate() {
            let reference = cell_reference(i + 1, j + 1);
            write_text_cell(&mut writer, &reference, value)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("row")))
            .map_err(spreadsheet_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("sheetData")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("worksheet")))
        .map_err(spreadsheet_err)?;
    Ok(writer.into_inner())
}

fn write_text_cell(
    writer: &mut Writer<Vec<u8>>,
    reference: &str,
    value: &str,
) -> Result<(), RenderError> {
    let text = xml_safe(value);

    writer
        .write_event(Event::Start(
            BytesStart::new("c").with_attributes([("r", reference), ("t", "inlineStr")]),
        ))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("is")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
        ))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("t")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("is")))
        .map_err(spreadsheet_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("c")))
        .map_err(spreadsheet_err)?;
    Ok(())
}

fn write_decl(writer: &mut Writer<Vec<u8>>) -> Result<(), RenderError> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(spreadsheet_err)
}

/// XML 1.0 forbids most C0 control characters even when escaped.
fn xml_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn spreadsheet_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Spreadsheet(e.to_string())
}
