//! Report template loading.
//!
//! Templates are plain text, markdown or Word (.docx) files whose text is
//! handed to the generation stage verbatim. Any failure yields an empty
//! string, which the pipeline treats as "no template".

use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

const TEXT_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Body part of a Word document inside its zip container.
const DOCX_BODY: &str = "word/document.xml";

/// Separator between extracted Word paragraphs.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Error)]
enum TemplateError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("not a docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed document xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Reads the text of a template file.
///
/// Unsupported formats and unreadable files produce `""`.
pub fn load_template(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let loaded = if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        std::fs::read_to_string(path).map_err(TemplateError::from)
    } else if extension == "docx" {
        read_docx(path)
    } else {
        warn!(path = %path.display(), extension = %extension, "Unsupported template format, ignoring template");
        return String::new();
    };

    match loaded {
        Ok(content) => {
            debug!(path = %path.display(), chars = content.chars().count(), "Loaded template");
            content
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read template, ignoring template");
            String::new()
        }
    }
}

fn read_docx(path: &Path) -> Result<String, TemplateError> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut xml = String::new();
    archive.by_name(DOCX_BODY)?.read_to_string(&mut xml)?;
    docx_paragraphs(&xml)
}

/// Collects the text runs of every `w:p` paragraph, skipping empty ones.
fn docx_paragraphs(xml: &str) -> Result<String, TemplateError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let paragraph = std::mem::take(&mut current);
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(paragraph);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(text) if in_text => current.push_str(&text.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join(PARAGRAPH_SEPARATOR))
}
