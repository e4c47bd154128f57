//! Document chunking for the translation backend.
//!
//! Long documents are split along structural boundaries (Markdown `## `
//! sections, top-level HTML elements) and greedily packed into chunks that
//! stay under a character window. Boundaries are never split, so a single
//! oversized section becomes an oversized chunk.
//!
//! Chunks are translated independently; [`PreparedDocument::reassemble`]
//! joins the outputs in chunk order.

pub mod html;
pub mod markdown;

pub use markdown::LinkTable;

use edge_types::TextKind;

/// Greedily pack pieces into chunks of at most `window` characters.
///
/// A piece is appended to the current chunk unless that would push it past
/// the window, in which case the current chunk is emitted first. Pieces are
/// never split. Empty input produces no chunks.
pub fn pack<I, S>(pieces: I, window: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces {
        let piece = piece.as_ref();
        let piece_len = piece.chars().count();

        if !current.is_empty() && current_len + piece_len > window {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push_str(piece);
        current_len += piece_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// A document split into translation chunks, plus what is needed to put the
/// translated chunks back together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    kind: TextKind,
    chunks: Vec<String>,
    links: LinkTable,
}

impl PreparedDocument {
    /// Split `text` into chunks of at most `window` characters.
    ///
    /// - Markdown: link URLs are swapped for indices, then sections are packed.
    /// - HTML: top-level children of `<body>` are packed.
    /// - Plain: the whole text is one chunk.
    pub fn prepare(text: &str, kind: TextKind, window: usize) -> Self {
        match kind {
            TextKind::Markdown => {
                let (transformed, links) = markdown::placeholder_links(text);
                let chunks = pack(markdown::split_sections(&transformed), window);
                Self {
                    kind,
                    chunks,
                    links,
                }
            }
            TextKind::Html => Self {
                kind,
                chunks: pack(html::split_children(text), window),
                links: LinkTable::default(),
            },
            TextKind::Plain => Self {
                kind,
                chunks: if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text.to_string()]
                },
                links: LinkTable::default(),
            },
        }
    }

    /// The chunks to translate, in document order.
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Markup flavour of the document.
    pub fn kind(&self) -> TextKind {
        self.kind
    }

    /// Join translated chunks (same order as [`chunks`](Self::chunks)) and
    /// restore any placeholdered links.
    pub fn reassemble<S: AsRef<str>>(&self, outputs: &[S]) -> String {
        let joined: String = outputs.iter().map(AsRef::as_ref).collect();
        match self.kind {
            TextKind::Markdown => markdown::restore_links(&joined, &self.links),
            TextKind::Html | TextKind::Plain => joined,
        }
    }
}
