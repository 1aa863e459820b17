//! Paragraph extraction from source documents.
//!
//! `.docx` files are read from their `word/document.xml` part; anything else
//! is read as UTF-8 text with one paragraph per line. Both return trimmed,
//! non-empty paragraphs in document order.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";

/// Read the paragraphs of the document at `path`
pub fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);

    if is_docx {
        read_docx_paragraphs(path)
    } else {
        read_text_paragraphs(path)
    }
}

pub fn read_text_paragraphs(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(split_lines(&content))
}

fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn read_docx_paragraphs(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
    let mut zip = ZipArchive::new(file)
        .with_context(|| format!("{} is not a valid docx archive", path.display()))?;

    let mut xml = String::new();
    zip.by_name(DOCUMENT_PART)
        .with_context(|| format!("{} has no {}", path.display(), DOCUMENT_PART))?
        .read_to_string(&mut xml)
        .with_context(|| format!("read {} from {}", DOCUMENT_PART, path.display()))?;

    docx_xml_paragraphs(&xml).with_context(|| format!("parse {}", path.display()))
}

/// Collect the text of each `<w:p>`, joining its `<w:t>` runs
fn docx_xml_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event().context("read xml event")? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text = true,
                b"w:tab" => push_char(&mut current, '\t'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:tab" => push_char(&mut current, '\t'),
                b"w:br" | b"w:cr" => push_char(&mut current, ' '),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().context("unescape text")?;
                if let Some(paragraph) = current.as_mut() {
                    paragraph.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if let Some(paragraph) = current.take() {
                        let paragraph = paragraph.trim();
                        if !paragraph.is_empty() {
                            paragraphs.push(paragraph.to_string());
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn push_char(current: &mut Option<String>, c: char) {
    if let Some(paragraph) = current.as_mut() {
        paragraph.push(c);
    }
}
