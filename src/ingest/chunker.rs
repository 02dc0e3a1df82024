use serde::Serialize;
use std::path::Path;

use super::loader::{Document, DocumentMetadata};

/// Languages with dedicated splitting boundaries, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Markdown,
    C,
    Cpp,
    Go,
    Rust,
}

impl Language {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "py" => Some(Language::Python),
            "md" => Some(Language::Markdown),
            "c" => Some(Language::C),
            "cpp" | "h" => Some(Language::Cpp),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Markdown => "markdown",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Rust => "rust",
        }
    }

    /// Markdown uses the language table for heading-aware splits but its
    /// chunks are prose, not code.
    pub fn is_code(&self) -> bool {
        !matches!(self, Language::Markdown)
    }

    /// Split boundaries in preference order: declaration-level breaks first,
    /// then paragraph, line, word, and finally a hard character cut.
    fn separators(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &[
                "\nclass ", "\ndef ", "\n\tdef ", "\n\n", "\n", " ", "",
            ],
            Language::Markdown => &[
                "\n# ", "\n## ", "\n### ", "\n\n", "\n", " ", "",
            ],
            Language::C | Language::Cpp => &[
                "\nclass ", "\nvoid ", "\nint ", "\nstatic ", "\nstruct ", "\n\n", "\n", " ", "",
            ],
            Language::Go => &[
                "\nfunc ", "\ntype ", "\nvar ", "\nconst ", "\n\n", "\n", " ", "",
            ],
            Language::Rust => &[
                "\nfn ", "\npub fn ", "\nimpl ", "\ntrait ", "\nmod ", "\n\n", "\n", " ", "",
            ],
        }
    }
}

/// Generic ladder for plain text and unrecognized extensions:
/// paragraph, then line, then word, then hard cut.
const TEXT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A retrieval-sized slice of a document with position metadata
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub is_code: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Split a document into chunks, routing by source file extension.
///
/// Identical input and parameters always yield the identical chunk sequence.
pub fn chunk_document(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let extension = Path::new(&document.metadata.source)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let language = Language::from_extension(&extension);
    let separators = language.map_or(TEXT_SEPARATORS, |l| l.separators());

    let splits = split_text(&document.content, separators, chunk_size, chunk_overlap);
    let total_chunks = splits.len();

    splits
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| Chunk {
            content,
            metadata: document.metadata.clone(),
            chunk_index,
            total_chunks,
            is_code: language.is_some_and(|l| l.is_code()),
            language: language.map(|l| l.name().to_string()),
        })
        .collect()
}

/// Recursive character splitter.
///
/// Splits on the first separator in the ladder that occurs in the text,
/// recursing with the remaining separators on any piece still larger than
/// `chunk_size` characters, then greedily merges the pieces back into
/// chunks of at most `chunk_size` characters. With `chunk_overlap > 0`,
/// the last `chunk_overlap` characters of each chunk are repeated at the
/// start of the next; the repeated tail counts toward the size limit, so
/// no chunk ever exceeds `chunk_size` characters. Separators are kept in
/// the output, so with zero overlap the chunks concatenate back to the
/// input exactly.
pub fn split_text(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let atoms = split_recursive(text, separators, chunk_size);
    merge_atoms(atoms, chunk_size, chunk_overlap)
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    // First separator that actually occurs; the empty string is the hard-cut
    // fallback and always matches.
    let mut sep_index = separators.len().saturating_sub(1);
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            sep_index = i;
            break;
        }
    }
    let separator = separators[sep_index];
    let rest = &separators[sep_index + 1..];

    if separator.is_empty() {
        return hard_cut(text, chunk_size);
    }

    let mut atoms = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if piece.chars().count() > chunk_size && !rest.is_empty() {
            atoms.extend(split_recursive(piece, rest, chunk_size));
        } else {
            atoms.push(piece.to_string());
        }
    }
    atoms
}

/// Split `text` on `separator`, keeping the separator attached to the start
/// of the following piece so declaration-level separators begin their chunk
/// and the pieces concatenate losslessly.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut search = 0;
    loop {
        match text[search..].find(separator) {
            Some(pos) => {
                let boundary = search + pos;
                if boundary > start {
                    pieces.push(&text[start..boundary]);
                    start = boundary;
                }
                search = boundary + separator.len();
            }
            None => {
                if start < text.len() {
                    pieces.push(&text[start..]);
                }
                break;
            }
        }
    }
    pieces
}

/// Fixed-size cut at character boundaries
fn hard_cut(text: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn merge_atoms(atoms: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for atom in atoms {
        let atom_chars = atom.chars().count();
        if !current.is_empty() && current_chars + atom_chars > chunk_size {
            chunks.push(current.clone());
            // The carried tail counts toward the size limit, so it shrinks
            // when the incoming atom is close to chunk_size.
            let tail = chunk_overlap.min(chunk_size.saturating_sub(atom_chars));
            if tail > 0 {
                current = char_tail(&current, tail);
                current_chars = current.chars().count();
            } else {
                current.clear();
                current_chars = 0;
            }
        }
        current.push_str(&atom);
        current_chars += atom_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Last `n` characters of `text`, at character boundaries
fn char_tail(text: &str, n: usize) -> String {
    let count = text.chars().count();
    if count <= n {
        return text.to_string();
    }
    text.chars().skip(count - n).collect()
}
