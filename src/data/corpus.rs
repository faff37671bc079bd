// ============================================================
// Layer 4 — Token Corpus Index
// ============================================================
// Loads every *.txt file in the corpus directory, splits it into
// paragraphs (one per non-blank line), tokenizes each paragraph
// once, and keeps the resulting id sequences in one flat list.
//
// The flat index position is a paragraph's global identity: the
// sampler asks for "the paragraph after i" by looking at i + 1.
// A parallel per-paragraph document id is recorded so that the
// last paragraph of one file is never treated as having a true
// successor in the next file.
//
// The index is immutable after construction, so it can be shared
// read-only across data-loader workers without locking.
//
// File order is whatever the filesystem returns from read_dir —
// not guaranteed sorted across platforms.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::PretrainError;

// ─── SpecialTokens ────────────────────────────────────────────────────────────
/// The BERT special-token ids, resolved once from the tokenizer
/// vocabulary and cached for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
    pub unk: u32,
    pub mask: u32,
}

impl SpecialTokens {
    /// Resolve all five special tokens. A vocabulary that lacks
    /// any of them cannot drive this pipeline.
    pub fn resolve(tokenizer: &Tokenizer) -> Result<Self, PretrainError> {
        let lookup = |token: &str| {
            tokenizer.token_to_id(token).ok_or_else(|| {
                PretrainError::Tokenizer(format!("vocabulary has no {token} token"))
            })
        };
        Ok(Self {
            cls: lookup("[CLS]")?,
            sep: lookup("[SEP]")?,
            pad: lookup("[PAD]")?,
            unk: lookup("[UNK]")?,
            mask: lookup("[MASK]")?,
        })
    }
}

// ─── TokenCorpusIndex ─────────────────────────────────────────────────────────
/// In-memory index of every tokenized paragraph in the corpus.
pub struct TokenCorpusIndex {
    /// Token-id sequence per paragraph, in file/line order
    sequences: Vec<Vec<u32>>,

    /// Source document index per paragraph, parallel to
    /// `sequences`
    doc_ids: Vec<u32>,

    /// Cached special-token ids
    specials: SpecialTokens,

    /// Corpus name (directory basename), used in checkpoint
    /// file names
    name: String,
}

impl TokenCorpusIndex {
    /// Build the index from a directory of plain-text files.
    ///
    /// Every `*.txt` file is read line by line; blank lines are
    /// dropped and each surviving line is tokenized independently
    /// (no special tokens added here — the assembler owns those).
    pub fn build(dir: &Path, tokenizer: &Tokenizer) -> Result<Self, PretrainError> {
        let specials = SpecialTokens::resolve(tokenizer)?;

        let mut sequences = Vec::new();
        let mut doc_ids = Vec::new();
        let mut n_docs = 0u32;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }

            let reader = BufReader::new(File::open(&path)?);
            let mut n_paragraphs = 0usize;
            for line in reader.lines() {
                let line = line?;
                let paragraph = line.trim();
                if paragraph.is_empty() {
                    continue;
                }

                let encoding = tokenizer.encode(paragraph, false).map_err(|e| {
                    PretrainError::Tokenizer(format!(
                        "cannot encode line in '{}': {e}",
                        path.display()
                    ))
                })?;
                sequences.push(encoding.get_ids().to_vec());
                doc_ids.push(n_docs);
                n_paragraphs += 1;
            }

            tracing::debug!("Indexed '{}': {} paragraphs", path.display(), n_paragraphs);
            n_docs += 1;
        }

        tracing::info!(
            "Corpus index built: {} paragraphs from {} documents",
            sequences.len(),
            n_docs
        );

        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("corpus")
            .to_string();

        Ok(Self { sequences, doc_ids, specials, name })
    }

    /// Number of indexed paragraphs.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Token ids of paragraph `i`. Pure read, stable across calls.
    pub fn token_ids_at(&self, i: usize) -> &[u32] {
        &self.sequences[i]
    }

    /// True if paragraph `i + 1` exists and belongs to the same
    /// source document, i.e. it is a valid "is-next" partner.
    pub fn has_true_successor(&self, i: usize) -> bool {
        i + 1 < self.sequences.len() && self.doc_ids[i + 1] == self.doc_ids[i]
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.specials
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assemble an index directly from pre-tokenized parts.
    /// Test seam — production code always goes through `build`.
    #[cfg(test)]
    pub(crate) fn from_parts(
        sequences: Vec<Vec<u32>>,
        doc_ids: Vec<u32>,
        specials: SpecialTokens,
    ) -> Self {
        assert_eq!(sequences.len(), doc_ids.len());
        Self { sequences, doc_ids, specials, name: "test".to_string() }
    }
}
