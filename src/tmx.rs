//! TMX 1.4 translation-memory documents.
//!
//! A document is a header plus an ordered list of translation units. On disk
//! it is always rewritten whole: [`append`] loads whatever is already there,
//! adds the new units after the existing ones, and atomically replaces the
//! file. That read-merge-write cycle is not safe for concurrent callers on the
//! same path; the alignment orchestrator funnels all appends for a document
//! through a single writer.

use crate::error::TmxError;
use crate::language::LanguagePair;
use crate::parser::AlignedPair;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TMX_VERSION: &str = "1.4";
pub const CREATION_TOOL: &str = "TMX Align";
pub const DATATYPE: &str = "PlainText";
pub const SEGTYPE: &str = "sentence";
pub const O_TMF: &str = "ABCTransMem";

/// Document-level metadata written once per file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmxHeader {
    pub creation_tool: String,
    pub creation_tool_version: String,
    pub datatype: String,
    pub segtype: String,
    pub admin_lang: String,
    pub src_lang: String,
    pub o_tmf: String,
}

impl TmxHeader {
    /// Header for a new document produced by this tool
    pub fn new(src_lang: impl Into<String>, admin_lang: impl Into<String>) -> Self {
        Self {
            creation_tool: CREATION_TOOL.to_string(),
            creation_tool_version: env!("CARGO_PKG_VERSION").to_string(),
            datatype: DATATYPE.to_string(),
            segtype: SEGTYPE.to_string(),
            admin_lang: admin_lang.into(),
            src_lang: src_lang.into(),
            o_tmf: O_TMF.to_string(),
        }
    }

    fn attributes(&self) -> [(&str, &str); 7] {
        [
            ("creationtool", self.creation_tool.as_str()),
            ("creationtoolversion", self.creation_tool_version.as_str()),
            ("datatype", self.datatype.as_str()),
            ("segtype", self.segtype.as_str()),
            ("adminlang", self.admin_lang.as_str()),
            ("srclang", self.src_lang.as_str()),
            ("o-tmf", self.o_tmf.as_str()),
        ]
    }
}

/// One language-tagged segment (`<tuv xml:lang=".."><seg>..</seg></tuv>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub lang: String,
    pub text: String,
}

impl Segment {
    pub fn new(lang: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            text: text.into(),
        }
    }
}

/// Two segments in distinct languages tied together.
///
/// Units are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationUnit {
    source: Segment,
    target: Segment,
}

impl TranslationUnit {
    pub fn new(source: Segment, target: Segment) -> Result<Self, TmxError> {
        for segment in [&source, &target] {
            if segment.lang.trim().is_empty() {
                return Err(TmxError::InvalidUnit("empty language code".to_string()));
            }
            if segment.text.trim().is_empty() {
                return Err(TmxError::InvalidUnit(format!(
                    "empty segment text for language '{}'",
                    segment.lang
                )));
            }
        }
        if source.lang.eq_ignore_ascii_case(&target.lang) {
            return Err(TmxError::InvalidUnit(format!(
                "both segments use language '{}'",
                source.lang
            )));
        }

        Ok(Self { source, target })
    }

    /// Build a unit from an aligned pair, tagging each side with its code
    pub fn from_pair(pair: &AlignedPair, languages: &LanguagePair) -> Result<Self, TmxError> {
        Self::new(
            Segment::new(languages.source.code(), pair.source.trim()),
            Segment::new(languages.target.code(), pair.target.trim()),
        )
    }

    pub fn source(&self) -> &Segment {
        &self.source
    }

    pub fn target(&self) -> &Segment {
        &self.target
    }
}

/// A TMX document held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmxDocument {
    pub header: TmxHeader,
    units: Vec<TranslationUnit>,
}

impl TmxDocument {
    pub fn new(header: TmxHeader) -> Self {
        Self {
            header,
            units: Vec::new(),
        }
    }

    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn push(&mut self, unit: TranslationUnit) {
        self.units.push(unit);
    }

    pub fn extend(&mut self, units: impl IntoIterator<Item = TranslationUnit>) {
        self.units.extend(units);
    }

    /// Parse an existing document from disk
    pub fn load(path: &Path) -> Result<Self, TmxError> {
        let content = fs::read_to_string(path).map_err(|e| TmxError::io(path, e))?;
        parse_document(path, &content)
    }

    /// Load the document at `path` if the file exists and is non-empty
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, TmxError> {
        match fs::metadata(path) {
            Ok(meta) if meta.len() > 0 => Self::load(path).map(Some),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TmxError::io(path, e)),
        }
    }

    /// Serialize as pretty-printed, UTF-8 declared XML
    pub fn to_xml(&self) -> Result<Vec<u8>, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write(
            &mut writer,
            Event::Start(BytesStart::new("tmx").with_attributes([("version", TMX_VERSION)])),
        )?;
        write(
            &mut writer,
            Event::Empty(BytesStart::new("header").with_attributes(self.header.attributes())),
        )?;
        write(&mut writer, Event::Start(BytesStart::new("body")))?;

        for unit in &self.units {
            write(&mut writer, Event::Start(BytesStart::new("tu")))?;
            for segment in [&unit.source, &unit.target] {
                write(
                    &mut writer,
                    Event::Start(
                        BytesStart::new("tuv").with_attributes([("xml:lang", segment.lang.as_str())]),
                    ),
                )?;
                write(&mut writer, Event::Start(BytesStart::new("seg")))?;
                write(
                    &mut writer,
                    Event::Text(BytesText::from_escaped(partial_escape(segment.text.as_str()))),
                )?;
                write(&mut writer, Event::End(BytesEnd::new("seg")))?;
                write(&mut writer, Event::End(BytesEnd::new("tuv")))?;
            }
            write(&mut writer, Event::End(BytesEnd::new("tu")))?;
        }

        write(&mut writer, Event::End(BytesEnd::new("body")))?;
        write(&mut writer, Event::End(BytesEnd::new("tmx")))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Replace the file at `path` with this document.
    ///
    /// The document is written to a sibling temp file first and renamed over
    /// the target, so readers never observe a half-written file.
    pub fn save(&self, path: &Path) -> Result<(), TmxError> {
        let bytes = self.to_xml().map_err(|reason| TmxError::Serialize {
            path: path.to_path_buf(),
            reason,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TmxError::io(parent, e))?;
        }

        let tmp = temp_path(path);
        write_synced(&tmp, &bytes).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TmxError::io(&tmp, e)
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TmxError::io(path, e)
        })?;

        debug!("Wrote {} units to {}", self.units.len(), path.display());
        Ok(())
    }
}

/// Append one unit per pair to the document at `target_path`.
///
/// Existing units keep their order and come first; new units follow in the
/// order given. A missing or empty file starts a new document with `header`,
/// an existing file keeps its own header. With no pairs the file is left
/// untouched (but still validated if present).
///
/// # Returns
/// The number of units in the document after the append
pub fn append(
    pairs: &[AlignedPair],
    target_path: &Path,
    languages: &LanguagePair,
    header: &TmxHeader,
) -> Result<usize, TmxError> {
    let existing = TmxDocument::load_if_present(target_path)?;

    if pairs.is_empty() {
        return Ok(existing.map(|doc| doc.len()).unwrap_or(0));
    }

    let new_units = pairs
        .iter()
        .map(|pair| TranslationUnit::from_pair(pair, languages))
        .collect::<Result<Vec<_>, _>>()?;

    let mut document = existing.unwrap_or_else(|| TmxDocument::new(header.clone()));
    document.extend(new_units);
    document.save(target_path)?;

    Ok(document.len())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), String> {
    writer.write_event(event).map_err(|e| e.to_string())
}

/// Write `bytes` and flush them to disk before the caller renames the file
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_header(path: &Path, start: &BytesStart<'_>) -> Result<TmxHeader, TmxError> {
    let mut header = TmxHeader {
        creation_tool: String::new(),
        creation_tool_version: String::new(),
        datatype: String::new(),
        segtype: String::new(),
        admin_lang: String::new(),
        src_lang: String::new(),
        o_tmf: String::new(),
    };

    for attr in start.attributes() {
        let attr = attr.map_err(|e| TmxError::malformed(path, format!("header attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| TmxError::malformed(path, format!("header attribute: {e}")))?
            .into_owned();

        match attr.key.as_ref() {
            b"creationtool" => header.creation_tool = value,
            b"creationtoolversion" => header.creation_tool_version = value,
            b"datatype" => header.datatype = value,
            b"segtype" => header.segtype = value,
            b"adminlang" => header.admin_lang = value,
            b"srclang" => header.src_lang = value,
            b"o-tmf" => header.o_tmf = value,
            _ => {}
        }
    }

    if header.src_lang.trim().is_empty() {
        return Err(TmxError::malformed(path, "<header> has no srclang"));
    }
    Ok(header)
}

fn lang_attribute(path: &Path, start: &BytesStart<'_>) -> Result<String, TmxError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TmxError::malformed(path, format!("tuv attribute: {e}")))?;
        if matches!(attr.key.as_ref(), b"xml:lang" | b"lang") {
            let value = attr
                .unescape_value()
                .map_err(|e| TmxError::malformed(path, format!("tuv attribute: {e}")))?;
            return Ok(value.into_owned());
        }
    }
    Err(TmxError::malformed(path, "<tuv> without xml:lang"))
}

fn parse_document(path: &Path, xml: &str) -> Result<TmxDocument, TmxError> {
    // Whitespace next to inline markup inside <seg> is content; only the
    // finished segment is trimmed
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut root_seen = false;
    let mut body_seen = false;
    let mut in_body = false;
    let mut header: Option<TmxHeader> = None;
    let mut units = Vec::new();

    // Per-unit state
    let mut tu_segments: Option<Vec<Segment>> = None;
    let mut tuv_lang: Option<String> = None;
    let mut tuv_text: Option<String> = None;
    let mut seg_buffer: Option<String> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(TmxError::malformed(
                    path,
                    format!("XML error at position {}: {}", reader.buffer_position(), e),
                ))
            }
        };

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    if e.name().as_ref() != b"tmx" {
                        return Err(TmxError::malformed(path, "root element is not <tmx>"));
                    }
                    root_seen = true;
                }
                depth += 1;

                match e.name().as_ref() {
                    b"header" if depth == 2 => header = Some(parse_header(path, &e)?),
                    b"body" if depth == 2 => {
                        body_seen = true;
                        in_body = true;
                    }
                    b"tu" if in_body => tu_segments = Some(Vec::new()),
                    b"tuv" if tu_segments.is_some() => {
                        tuv_lang = Some(lang_attribute(path, &e)?);
                        tuv_text = None;
                    }
                    b"seg" if tuv_lang.is_some() => seg_buffer = Some(String::new()),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    return Err(TmxError::malformed(path, "root element is not <tmx>"));
                }
                match e.name().as_ref() {
                    b"header" if depth == 1 => header = Some(parse_header(path, &e)?),
                    b"body" if depth == 1 => body_seen = true,
                    b"seg" if tuv_lang.is_some() => tuv_text = Some(String::new()),
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some(buffer) = seg_buffer.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| TmxError::malformed(path, format!("segment text: {e}")))?;
                    buffer.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(buffer) = seg_buffer.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);

                match e.name().as_ref() {
                    b"seg" if seg_buffer.is_some() => {
                        tuv_text = seg_buffer.take().map(|text| text.trim().to_string())
                    }
                    b"tuv" if tuv_lang.is_some() => {
                        let lang = tuv_lang.take().unwrap_or_default();
                        let text = tuv_text
                            .take()
                            .ok_or_else(|| TmxError::malformed(path, "<tuv> without <seg>"))?;
                        if let Some(segments) = tu_segments.as_mut() {
                            segments.push(Segment::new(lang, text));
                        }
                    }
                    b"tu" if tu_segments.is_some() => {
                        let mut segments = tu_segments.take().unwrap_or_default();
                        if segments.len() != 2 {
                            return Err(TmxError::malformed(
                                path,
                                format!(
                                    "translation unit {} has {} language variants, expected 2",
                                    units.len() + 1,
                                    segments.len()
                                ),
                            ));
                        }
                        let target = segments.remove(1);
                        let source = segments.remove(0);
                        let unit = TranslationUnit::new(source, target).map_err(|e| {
                            TmxError::malformed(
                                path,
                                format!("translation unit {}: {e}", units.len() + 1),
                            )
                        })?;
                        units.push(unit);
                    }
                    b"body" if depth == 1 => in_body = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(TmxError::malformed(path, "missing <tmx> root element"));
    }
    if depth != 0 {
        return Err(TmxError::malformed(path, "unexpected end of document"));
    }
    let header = header.ok_or_else(|| TmxError::malformed(path, "missing <header>"))?;
    if !body_seen {
        return Err(TmxError::malformed(path, "missing <body>"));
    }

    Ok(TmxDocument { header, units })
}
