//! Structural chunk extraction.
//!
//! Decoded documents arrive as a sequence of [`Block`]s carrying the
//! structural hints the format offered (headings, paragraph styles, pages,
//! spreadsheet sheets, tables). Extraction walks the blocks in order and
//! cuts the text into section-sized [`Chunk`]s.
//!
//! # Examples
//!
//! ```
//! use boilerkb::chunking::{extract, Block, RawDocument};
//!
//! let doc = RawDocument {
//!     source: "guide.md".to_string(),
//!     blocks: vec![
//!         Block::Heading { text: "Corrosion".to_string(), level: 1 },
//!         Block::Paragraph {
//!             text: "Caustic attack thins the tube wall.".to_string(),
//!             style: None,
//!         },
//!     ],
//! };
//! let chunks = extract(&doc, 10);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].section, "Corrosion");
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    tagger::{self, ComponentTag, DefectTag},
    text_util::{looks_like_heading, split_paragraphs},
};

/// Section label of text that precedes the first heading.
pub const DEFAULT_SECTION: &str = "Introduction";

/// A unit of retrievable knowledge with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    /// Originating document (file name or logical name).
    pub source: String,
    /// Heading, sheet name, page or table label inside the source.
    pub section: String,
    #[serde(default)]
    pub component: ComponentTag,
    #[serde(default)]
    pub defect: DefectTag,
}

impl Chunk {
    pub fn new(
        content: impl Into<String>,
        source: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            section: section.into(),
            component: ComponentTag::General,
            defect: DefectTag::General,
        }
    }

    /// Attach component and defect tags. The component is looked for in the
    /// section title first, then in the content; the defect in the content.
    pub fn tagged(mut self) -> Self {
        self.component = match tagger::detect_component(&self.section) {
            ComponentTag::General => tagger::detect_component(&self.content),
            found => found,
        };
        self.defect = tagger::detect_defect(&self.content);
        self
    }

    /// Whether the content clears the noise threshold.
    pub fn is_valid(&self, min_chars: usize) -> bool {
        self.content.trim().chars().count() >= min_chars
    }
}

/// One structural unit of a decoded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading {
        text: String,
        #[serde(default = "default_level")]
        level: u8,
    },
    Paragraph {
        text: String,
        /// Word-processor style name, e.g. `Heading 2` or `Normal`.
        #[serde(default)]
        style: Option<String>,
    },
    Page {
        number: u32,
        text: String,
    },
    /// Spreadsheet sheet; the first row holds the column headers.
    Sheet {
        name: String,
        rows: Vec<Vec<String>>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
}

fn default_level() -> u8 {
    1
}

/// A document as delivered by a format decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub source: String,
    pub blocks: Vec<Block>,
}

struct Extractor<'a> {
    source: &'a str,
    section: String,
    buffer: Vec<String>,
    chunks: Vec<Chunk>,
}

impl<'a> Extractor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            section: DEFAULT_SECTION.to_string(),
            buffer: Vec::new(),
            chunks: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let content = self.buffer.join("\n").trim().to_string();
        self.buffer.clear();
        if !content.is_empty() {
            self.chunks
                .push(Chunk::new(content, self.source, self.section.clone()));
        }
    }

    fn start_section(&mut self, title: &str) {
        self.flush();
        self.section = title.trim().to_string();
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if looks_like_heading(text) {
            self.start_section(text);
        } else {
            self.buffer.push(text.to_string());
        }
    }
}

/// Render a sheet as one `header: value | header: value` line per data row.
fn sheet_content(rows: &[Vec<String>]) -> String {
    let Some((headers, data)) = rows.split_first() else {
        return String::new();
    };
    data.iter()
        .filter_map(|row| {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.trim().is_empty())
                .map(|(i, value)| {
                    let header = headers
                        .get(i)
                        .map(|h| h.trim())
                        .filter(|h| !h.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Column {}", i + 1));
                    format!("{header}: {}", value.trim())
                })
                .collect();
            (!cells.is_empty()).then(|| cells.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_content(rows: &[Vec<String>]) -> String {
    rows.iter()
        .filter_map(|row| {
            let cells: Vec<&str> = row
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            (!cells.is_empty()).then(|| cells.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut a decoded document into chunks.
///
/// Text chunks come first in document order, followed by one chunk per
/// table. Chunks whose trimmed content is shorter than `min_chars`
/// characters are dropped. Returned chunks carry `general` tags; see
/// [`Chunk::tagged`].
pub fn extract(document: &RawDocument, min_chars: usize) -> Vec<Chunk> {
    let mut extractor = Extractor::new(&document.source);
    let mut tables = Vec::new();

    for block in &document.blocks {
        match block {
            Block::Heading { text, .. } => extractor.start_section(text),
            Block::Paragraph { text, style } => {
                let styled_heading = style
                    .as_deref()
                    .is_some_and(|s| s.starts_with("Heading"));
                if styled_heading && !text.trim().is_empty() {
                    extractor.start_section(text);
                } else {
                    extractor.push_text(text);
                }
            }
            Block::Page { number, text } => {
                extractor.start_section(&format!("Page {number}"));
                for paragraph in split_paragraphs(text) {
                    extractor.push_text(&paragraph);
                }
            }
            Block::Sheet { name, rows } => {
                extractor.flush();
                let content = sheet_content(rows);
                if !content.is_empty() {
                    extractor.chunks.push(Chunk::new(
                        content,
                        &document.source,
                        name.trim(),
                    ));
                }
            }
            Block::Table { rows } => tables.push(table_content(rows)),
        }
    }
    extractor.flush();

    let mut chunks = extractor.chunks;
    for (i, content) in tables.into_iter().enumerate() {
        if !content.is_empty() {
            chunks.push(Chunk::new(
                content,
                &document.source,
                format!("Table {}", i + 1),
            ));
        }
    }

    chunks.retain(|chunk| chunk.is_valid(min_chars));
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(blocks: Vec<Block>) -> RawDocument {
        RawDocument {
            source: "rapport.docx".to_string(),
            blocks,
        }
    }

    fn para(text: &str) -> Block {
        Block::Paragraph {
            text: text.to_string(),
            style: None,
        }
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(extract(&doc(vec![]), 10).is_empty());
    }

    #[test]
    fn no_headings_yields_single_introduction_chunk() {
        let chunks = extract(
            &doc(vec![
                para("First paragraph of the report."),
                para("Second paragraph of the report."),
            ]),
            10,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, DEFAULT_SECTION);
        assert_eq!(
            chunks[0].content,
            "First paragraph of the report.\nSecond paragraph of the report."
        );
        assert_eq!(chunks[0].source, "rapport.docx");
    }

    #[test]
    fn headings_split_sections() {
        let chunks = extract(
            &doc(vec![
                para("Preamble text before any heading."),
                Block::Paragraph {
                    text: "Corrosion caustique".to_string(),
                    style: Some("Heading 1".to_string()),
                },
                para("Attaque caustique sous dépôt."),
                para("DÉFAUTS SURCHAUFFEUR HT"),
                para("Fluage long terme des tubes."),
            ]),
            10,
        );
        let sections: Vec<_> =
            chunks.iter().map(|c| c.section.as_str()).collect();
        assert_eq!(
            sections,
            vec!["Introduction", "Corrosion caustique", "DÉFAUTS SURCHAUFFEUR HT"]
        );
    }

    #[test]
    fn pages_start_page_sections() {
        let chunks = extract(
            &doc(vec![Block::Page {
                number: 3,
                text: "Inspection visuelle des tubes.\n\nMESURES\n\nEpaisseur mesurée par ultrasons."
                    .to_string(),
            }]),
            10,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "Page 3");
        assert_eq!(chunks[0].content, "Inspection visuelle des tubes.");
        assert_eq!(chunks[1].section, "MESURES");
    }

    #[test]
    fn sheets_become_header_value_chunks() {
        let chunks = extract(
            &doc(vec![Block::Sheet {
                name: "AMDEC".to_string(),
                rows: vec![
                    vec!["Composant".into(), "Mode".into(), "G".into()],
                    vec!["Eco BT".into(), "Corrosion".into(), "4".into()],
                    vec!["Sur HT".into(), "".into(), "5".into()],
                ],
            }]),
            10,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "AMDEC");
        assert_eq!(
            chunks[0].content,
            "Composant: Eco BT | Mode: Corrosion | G: 4\nComposant: Sur HT | G: 5"
        );
    }

    #[test]
    fn tables_follow_text_chunks() {
        let chunks = extract(
            &doc(vec![
                Block::Table {
                    rows: vec![
                        vec!["Défaut".into(), "".into(), "Criticité".into()],
                        vec!["Percement".into(), "Haute".into()],
                    ],
                },
                para("Body text that follows the table."),
            ]),
            10,
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, DEFAULT_SECTION);
        assert_eq!(chunks[1].section, "Table 1");
        assert_eq!(chunks[1].content, "Défaut | Criticité\nPercement | Haute");
    }

    #[test]
    fn short_chunks_are_dropped() {
        let chunks = extract(
            &doc(vec![
                para("tiny"),
                Block::Heading {
                    text: "Next".to_string(),
                    level: 2,
                },
                para("Long enough content here."),
            ]),
            10,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Next");
    }

    #[test]
    fn tagging_prefers_section_component() {
        let chunk = Chunk::new(
            "Corrosion côté fumées du surchauffeur voisin.",
            "guide.md",
            "Économiseur BT",
        )
        .tagged();
        assert_eq!(chunk.component, ComponentTag::EconomiseurBt);
        assert_eq!(chunk.defect, DefectTag::Corrosion);

        let chunk = Chunk::new("Plain text.", "guide.md", "Intro").tagged();
        assert_eq!(chunk.component, ComponentTag::General);
        assert_eq!(chunk.defect, DefectTag::General);
    }

    #[test]
    fn raw_document_json_shape() {
        let json = r#"{
            "source": "scan.pdf",
            "blocks": [
                {"kind": "page", "number": 1, "text": "Tube wall thinning observed on bank 2."},
                {"kind": "heading", "text": "Annexe"}
            ]
        }"#;
        let doc: RawDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(
            doc.blocks[1],
            Block::Heading {
                text: "Annexe".to_string(),
                level: 1
            }
        );
    }
}
