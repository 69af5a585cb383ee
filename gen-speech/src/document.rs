// Document reading: plain text and .docx

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;

/// Characters shown by [`preview`].
pub const PREVIEW_CHARS: usize = 1000;

/// Read a document as plain text.
///
/// `.docx` files are unpacked and their paragraphs joined with newlines,
/// dropping blank paragraphs. Anything else is read as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String> {
    let is_docx = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);

    let text = if is_docx {
        read_docx(path)?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?
    };

    if text.trim().is_empty() {
        anyhow::bail!("Document is empty: {}", path.display());
    }

    Ok(text)
}

/// Extract paragraph text from a .docx archive
fn read_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("Not a valid .docx archive")?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("Missing word/document.xml in .docx")?
        .read_to_string(&mut xml)?;

    let paragraphs: Vec<String> = docx_paragraphs(&xml)
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

/// Collect the text of every `<w:p>` in document order.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        if in_text {
            current.push_str(&decode_entities(&rest[..start]));
        }

        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let tag = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');
        match (tag_name(tag), closing) {
            ("w:t", false) => in_text = !self_closing,
            ("w:t", true) => in_text = false,
            ("w:tab", false) => current.push('\t'),
            ("w:br" | "w:cr", false) => current.push('\n'),
            ("w:p", false) if self_closing => paragraphs.push(String::new()),
            ("w:p", true) => paragraphs.push(std::mem::take(&mut current)),
            _ => {}
        }
    }

    paragraphs
}

/// Element name of a tag body such as `/w:t` or `w:t xml:space="preserve"`.
fn tag_name(tag: &str) -> &str {
    let tag = tag.trim_start_matches('/');
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(tag.len());
    &tag[..end]
}

/// Decode the predefined XML entities and numeric character references.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp..];

        let decoded = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                result.push(c);
                rest = &after[consumed..];
            }
            None => {
                result.push('&');
                rest = &after[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// The first `max_chars` characters, with `...` appended when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
