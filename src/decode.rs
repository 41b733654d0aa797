//! Decoders for the document formats read directly from disk.
//!
//! Markdown and plain text are decoded here. Richer formats (Word, PDF,
//! spreadsheets) are decoded by external tools that write the resulting
//! [`RawDocument`] as JSON next to the other documents.

use std::path::Path;

use crate::{
    chunking::{Block, RawDocument},
    error::{Error, Result},
    text_util::split_paragraphs,
};

/// Supported file extensions, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "json"];

/// Decode the file at `path`; `source` names it in the resulting chunks.
pub fn decode_file(path: &Path, source: &str) -> Result<RawDocument> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = std::fs::read_to_string(path)?;
    match extension.as_str() {
        "md" | "markdown" => Ok(decode_markdown(source, &text)),
        "txt" => Ok(decode_plain_text(source, &text)),
        "json" => decode_json(source, &text),
        other => Err(Error::Extraction {
            document: source.to_string(),
            reason: format!("unsupported file extension {other:?}"),
        }),
    }
}

/// Paragraphs separated by blank lines.
pub fn decode_plain_text(source: &str, text: &str) -> RawDocument {
    RawDocument {
        source: source.to_string(),
        blocks: split_paragraphs(text)
            .into_iter()
            .map(|text| Block::Paragraph { text, style: None })
            .collect(),
    }
}

fn heading_level(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((hashes as u8, rest.trim()))
}

fn is_table_separator(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            !cell.is_empty()
                && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
        })
}

fn table_cells(line: &str) -> Vec<String> {
    line.trim()
        .trim_start_matches('|')
        .trim_end_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// ATX headings, pipe tables and blank-line separated paragraphs.
pub fn decode_markdown(source: &str, text: &str) -> RawDocument {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();

    fn flush_paragraph(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph {
                text: paragraph.join("\n"),
                style: None,
            });
            paragraph.clear();
        }
    }

    fn flush_table(table: &mut Vec<Vec<String>>, blocks: &mut Vec<Block>) {
        if !table.is_empty() {
            blocks.push(Block::Table {
                rows: std::mem::take(table),
            });
        }
    }

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('|') {
            flush_paragraph(&mut paragraph, &mut blocks);
            let cells = table_cells(trimmed);
            if !is_table_separator(&cells) {
                table.push(cells);
            }
            continue;
        }
        flush_table(&mut table, &mut blocks);

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
        } else if let Some((level, title)) = heading_level(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            if !title.is_empty() {
                blocks.push(Block::Heading {
                    text: title.to_string(),
                    level,
                });
            }
        } else {
            paragraph.push(trimmed);
        }
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    flush_table(&mut table, &mut blocks);

    RawDocument {
        source: source.to_string(),
        blocks,
    }
}

/// A serialized [`RawDocument`]. An empty `source` is replaced by the file's.
pub fn decode_json(source: &str, text: &str) -> Result<RawDocument> {
    let mut document: RawDocument =
        serde_json::from_str(text).map_err(|e| Error::Extraction {
            document: source.to_string(),
            reason: e.to_string(),
        })?;
    if document.source.trim().is_empty() {
        document.source = source.to_string();
    }
    Ok(document)
}
