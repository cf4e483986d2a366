//! Per-format text extraction for uploaded documents.
//!
//! Converts raw upload bytes into plain UTF-8 text. Extraction never fails
//! past this boundary: a malformed PDF or DOCX degrades to human-readable
//! fallback content that is chunked and indexed like any other text, with
//! an explanatory note surfaced in the ingest summary.

use std::io::Read;

use tracing::warn;

use crate::models::DocumentKind;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb
/// protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction outcome: the text to chunk, plus a note when the happy path
/// was not taken.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub note: Option<String>,
}

impl Extraction {
    fn clean(text: String) -> Self {
        Self { text, note: None }
    }

    fn degraded(text: String, note: impl Into<String>) -> Self {
        Self {
            text,
            note: Some(note.into()),
        }
    }
}

/// Extract plain text from `bytes` according to the resolved document kind.
pub fn extract_text(name: &str, bytes: &[u8], kind: DocumentKind) -> Extraction {
    match kind {
        DocumentKind::Text | DocumentKind::Csv | DocumentKind::Markdown => {
            Extraction::clean(String::from_utf8_lossy(bytes).into_owned())
        }
        DocumentKind::Json => extract_json(bytes),
        DocumentKind::Pdf => extract_pdf(name, bytes),
        DocumentKind::Docx => extract_docx(name, bytes),
    }
}

/// Pretty-print valid JSON; keep invalid JSON searchable behind a marker
/// prefix rather than rejecting the upload.
fn extract_json(bytes: &[u8]) -> Extraction {
    let raw = String::from_utf8_lossy(bytes).into_owned();
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => Extraction::clean(
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.clone()),
        ),
        Err(_) => Extraction::clean(format!("Invalid JSON: {}", raw)),
    }
}

fn extract_pdf(name: &str, bytes: &[u8]) -> Extraction {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) if !text.trim().is_empty() => Extraction::clean(text),
        Ok(_) => {
            warn!(name, "PDF has no extractable text layer");
            Extraction::degraded(
                format!(
                    "The document {} appears to be a scanned PDF without an extractable \
                     text layer. OCR would be required to recover text from its page images.",
                    name
                ),
                "PDF has no text layer, indexed a placeholder description",
            )
        }
        Err(e) => {
            warn!(name, error = %e, "PDF extraction failed, using fallback content");
            Extraction::degraded(
                extraction_fallback(name, "PDF", &e.to_string()),
                "PDF extraction failed, using fallback content",
            )
        }
    }
}

fn extract_docx(name: &str, bytes: &[u8]) -> Extraction {
    match docx_body_text(bytes) {
        Ok(text) => Extraction::clean(text),
        Err(e) => {
            warn!(name, error = %e, "DOCX extraction failed, using fallback content");
            Extraction::degraded(
                extraction_fallback(name, "DOCX", &e),
                "DOCX extraction failed, using fallback content",
            )
        }
    }
}

fn extraction_fallback(name: &str, format: &str, error: &str) -> String {
    format!(
        "Could not process the content of {}. This may be due to the {} format \
         or structure. Error: {}",
        name, format, error
    )
}

/// Pull `word/document.xml` out of the DOCX ZIP container and collect the
/// text of every `w:t` element.
fn docx_body_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| "word/document.xml not found".to_string())?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| e.to_string())?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err("word/document.xml exceeds size limit".to_string());
        }
    }

    collect_text_elements(&doc_xml)
}

fn collect_text_elements(xml: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let out = extract_text("notes.txt", b"hello there", DocumentKind::Text);
        assert_eq!(out.text, "hello there");
        assert!(out.note.is_none());
    }

    #[test]
    fn test_valid_json_is_pretty_printed() {
        let out = extract_text("data.json", br#"{"a":1,"b":[2,3]}"#, DocumentKind::Json);
        assert!(out.text.contains("\"a\": 1"));
        assert!(out.note.is_none());
    }

    #[test]
    fn test_invalid_json_keeps_content_with_marker() {
        let out = extract_text("data.json", b"{not json", DocumentKind::Json);
        assert!(out.text.starts_with("Invalid JSON: "));
        assert!(out.text.contains("{not json"));
    }

    #[test]
    fn test_broken_pdf_degrades_to_fallback() {
        let out = extract_text("report.pdf", b"not a pdf at all", DocumentKind::Pdf);
        assert!(out.text.contains("Could not process the content of report.pdf"));
        assert!(out.note.is_some());
    }

    #[test]
    fn test_broken_docx_degrades_to_fallback() {
        let out = extract_text("memo.docx", b"not a zip", DocumentKind::Docx);
        assert!(out.text.contains("Could not process the content of memo.docx"));
        assert!(out.note.is_some());
    }

    #[test]
    fn test_docx_body_text_from_minimal_archive() {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            writer
                .start_file(
                    "word/document.xml",
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            use std::io::Write;
            writer
                .write_all(
                    br#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body><w:p><w:r><w:t>quarterly revenue summary</w:t></w:r></w:p></w:body></w:document>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }
        let out = extract_text("memo.docx", &buf, DocumentKind::Docx);
        assert_eq!(out.text, "quarterly revenue summary");
        assert!(out.note.is_none());
    }
}
