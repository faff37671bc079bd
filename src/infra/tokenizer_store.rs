// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the tokenizer vocabulary from disk, or builds one from
// the corpus on the first run. The same tokenizer.json is then
// reused on every later run (and every resume), so token ids
// stay consistent with whatever the checkpointed model learned.
//
// Building is intentionally simple: a frequency-ranked
// word-level vocabulary written directly in the HuggingFace
// tokenizer JSON format. Subword training (WordPiece/BPE
// algorithms) is out of scope here — a production vocabulary can
// be dropped into the same tokenizer.json path.
//
// Special tokens occupy the first five ids:
//   [PAD]=0  [CLS]=1  [SEP]=2  [UNK]=3  [MASK]=4

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokenizers::Tokenizer;

const SPECIALS: [&str; 5] = ["[PAD]", "[CLS]", "[SEP]", "[UNK]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    fn tokenizer_path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load an existing tokenizer, or build one from the corpus
    /// directory and persist it.
    pub fn load_or_build(&self, corpus_dir: &Path, vocab_size: usize) -> Result<Tokenizer> {
        if self.tokenizer_path().exists() {
            tracing::info!("Loading tokenizer from '{}'", self.tokenizer_path().display());
            self.load()
        } else {
            tracing::info!("Building word-level tokenizer (vocab_size={vocab_size})");
            self.build_and_save(corpus_dir, vocab_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.tokenizer_path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("cannot load tokenizer from '{}': {e}", path.display()))
    }

    fn build_and_save(&self, corpus_dir: &Path, vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create '{}'", self.dir.display()))?;

        // ── Count word frequencies over every corpus file ─────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for entry in std::fs::read_dir(corpus_dir)
            .with_context(|| format!("cannot read corpus dir '{}'", corpus_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                for word in line?.split_whitespace() {
                    let word = word.to_lowercase();
                    let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                    if !word.is_empty() {
                        *freq.entry(word.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }

        // Rank by frequency, keep the top slots after specials
        let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(vocab_size.saturating_sub(SPECIALS.len()));

        // ── Emit the HuggingFace tokenizer JSON ───────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIALS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        let mut next_id = SPECIALS.len();
        for (word, _) in &ranked {
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, token)| {
                serde_json::json!({
                    "id": id,
                    "content": token,
                    "single_word": false,
                    "lstrip": false,
                    "rstrip": false,
                    "normalized": false,
                    "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": serde_json::Value::Object(vocab),
                "unk_token": "[UNK]"
            }
        });

        let path = self.tokenizer_path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("cannot write '{}'", path.display()))?;
        tracing::info!("Tokenizer built: {next_id} entries, saved to '{}'", path.display());

        self.load()
    }
}
