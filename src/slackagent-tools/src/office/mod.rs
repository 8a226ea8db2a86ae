//! Office Open XML generators (`.xlsx`, `.docx`, `.pptx`).
//!
//! The documents are assembled directly as zip packages of XML parts. Only
//! the parts each format requires are written; styling is kept to inline
//! run properties so no style sheets are needed.

mod docx;
mod pptx;
mod xlsx;

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{ToolResult, ensure_size};

pub use docx::{WordTool, build_document};
pub use pptx::{PowerPointTool, SlideSpec, build_presentation};
pub use xlsx::{ExcelTool, SheetSpec, build_workbook};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const RELS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// A zip package being assembled in memory.
pub(crate) struct Package {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl Package {
    pub(crate) fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    pub(crate) fn add(&mut self, path: &str, content: &str) -> ToolResult<()> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(path, options)?;
        self.writer.write_all(content.as_bytes())?;
        Ok(())
    }

    pub(crate) fn finish(self) -> ToolResult<Vec<u8>> {
        let bytes = self.writer.finish()?.into_inner();
        ensure_size(bytes.len())?;
        Ok(bytes)
    }
}

/// `[Content_Types].xml` with the given part overrides.
pub(crate) fn content_types(overrides: &[(String, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(&format!(
        r#"<Default Extension="rels" ContentType="{RELS_CONTENT_TYPE}"/><Default Extension="xml" ContentType="application/xml"/>"#
    ));
    for (part, content_type) in overrides {
        xml.push_str(&format!(
            r#"<Override PartName="{part}" ContentType="{content_type}"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

/// Package-level `_rels/.rels` pointing at the main document part.
pub(crate) fn root_rels(main_part: &str) -> String {
    relationships(&[("rId1", OFFICE_DOCUMENT_REL, main_part)])
}

/// A relationships part.
pub(crate) fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{kind}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Escape text for XML content and attributes, dropping characters XML 1.0
/// cannot represent.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Read};

    /// Read one part of a generated package.
    pub(crate) fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        let mut part = archive.by_name(name).expect("part exists");
        let mut content = String::new();
        part.read_to_string(&mut content).expect("utf-8 part");
        content
    }

    pub(crate) fn part_names(bytes: &[u8]) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        archive.file_names().map(str::to_string).collect()
    }
}
