//! Corpus - owned entries plus their suffix trie
//!
//! Build once with `add_entry`/`extend`, then query through `&self` only.
//! A saved index stores the trie and a fingerprint of the entries it was
//! built from; loading it against any other entry set is rejected.

use crate::{CorpusLocator, EntryId, Error, Occurrences, Result, SuffixTrie};
use mosaic_config::MosaicConfig;
use mosaic_core::{CurveType, DataPoint, EncoderSettings, Symbol, TokenEncoder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

const INDEX_VERSION: u32 = 1;

/// Indexed corpus of data point sequences
#[derive(Debug, Clone)]
pub struct Corpus {
    encoder: TokenEncoder,
    entries: Vec<Vec<DataPoint>>,
    trie: SuffixTrie,
}

impl Corpus {
    pub fn new(settings: EncoderSettings, max_depth: usize) -> Self {
        Self {
            encoder: TokenEncoder::new(settings),
            entries: Vec::new(),
            trie: SuffixTrie::new(max_depth),
        }
    }

    pub fn with_config(config: &MosaicConfig) -> Self {
        Self::new(config.encoder.clone(), config.index.max_depth)
    }

    pub fn encoder(&self) -> &TokenEncoder {
        &self.encoder
    }

    /// Add one entry; the corpus owns it from now on
    pub fn add_entry(&mut self, points: Vec<DataPoint>) -> EntryId {
        let id = self.entries.len() as EntryId;
        let symbols = self.encoder.encode_all(&points);
        self.trie.insert(id, &symbols);
        self.entries.push(points);
        id
    }

    /// Add an entry and its mirrored variant as two separate entries
    pub fn add_entry_with_mirror(&mut self, points: Vec<DataPoint>) -> (EntryId, EntryId) {
        let mirrored = points.iter().map(DataPoint::mirrored).collect();
        (self.add_entry(points), self.add_entry(mirrored))
    }

    /// Batch insertion, returns the number of entries added
    pub fn extend(&mut self, entries: impl IntoIterator<Item = Vec<DataPoint>>) -> usize {
        let before = self.entries.len();
        for entry in entries {
            self.add_entry(entry);
        }
        let added = self.entries.len() - before;
        tracing::debug!("Indexed {} entries ({} nodes)", added, self.trie.node_count());
        added
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: EntryId) -> Option<&[DataPoint]> {
        self.entries.get(id as usize).map(Vec::as_slice)
    }

    pub fn entries(&self) -> &[Vec<DataPoint>] {
        &self.entries
    }

    pub fn point(&self, loc: CorpusLocator) -> Option<&DataPoint> {
        self.entry(loc.entry())?.get(loc.offset())
    }

    /// Points from `loc` (inclusive) to the end of its entry
    pub fn remaining(&self, loc: CorpusLocator) -> usize {
        self.entry(loc.entry())
            .map(|e| e.len().saturating_sub(loc.offset()))
            .unwrap_or(0)
    }

    /// The `len` points starting `lookback` points before `loc`
    pub fn window(&self, loc: CorpusLocator, lookback: usize, len: usize) -> Option<&[DataPoint]> {
        let entry = self.entry(loc.entry())?;
        let start = loc.offset().checked_sub(lookback)?;
        entry.get(start..start.checked_add(len)?)
    }

    pub fn query_exact(&self, symbols: &[Symbol]) -> Occurrences<'_> {
        self.trie.query_exact(symbols)
    }

    pub fn query_range(&self, lo: &[Symbol], hi: &[Symbol]) -> Occurrences<'_> {
        self.trie.query_range(lo, hi)
    }

    /// SHA-256 over the exact entry contents
    pub fn fingerprint(&self) -> String {
        fingerprint_entries(&self.entries)
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            entry_count: self.entries.len(),
            symbol_count: self.entries.iter().map(Vec::len).sum(),
            node_count: self.trie.node_count(),
            occurrence_count: self.trie.occurrence_count(),
            max_depth: self.trie.max_depth(),
        }
    }

    // ========== Persistence ==========

    /// Save the trie with the fingerprint of the current entries
    pub fn save_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let export = IndexExportRef {
            version: INDEX_VERSION,
            fingerprint: self.fingerprint(),
            encoder: self.encoder.settings(),
            entry_count: self.entries.len(),
            built_at: chrono::Utc::now().timestamp(),
            trie: &self.trie,
        };
        let content = serde_json::to_string(&export)?;

        // Atomic write
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        tracing::info!(
            "Saved corpus index to {}: {} entries, {} nodes",
            path.display(),
            self.entries.len(),
            self.trie.node_count()
        );
        Ok(())
    }

    /// Reload a saved trie for exactly the entries it was built from
    pub fn load_index(
        entries: Vec<Vec<DataPoint>>,
        settings: &EncoderSettings,
        max_depth: usize,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let export: IndexExport = serde_json::from_str(&content)?;

        if export.version != INDEX_VERSION {
            return Err(Error::UnsupportedVersion(export.version));
        }
        if &export.encoder != settings {
            return Err(Error::EncoderMismatch);
        }
        if export.trie.max_depth() != max_depth {
            return Err(Error::DepthMismatch {
                expected: max_depth,
                found: export.trie.max_depth(),
            });
        }
        let found = fingerprint_entries(&entries);
        if export.fingerprint != found {
            return Err(Error::CorpusMismatch {
                expected: export.fingerprint,
                found,
            });
        }

        let encoder = TokenEncoder::new(export.encoder);
        let mut trie = export.trie;
        trie.attach_strings(entries.iter().map(|e| encoder.encode_all(e)).collect());

        tracing::info!(
            "Loaded corpus index from {}: {} entries, built at {}",
            path.display(),
            export.entry_count,
            export.built_at
        );

        Ok(Self {
            encoder,
            entries,
            trie,
        })
    }
}

fn fingerprint_entries(entries: &[Vec<DataPoint>]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((entries.len() as u64).to_le_bytes());
    for entry in entries {
        hasher.update((entry.len() as u64).to_le_bytes());
        for point in entry {
            hasher.update([
                point.kind.code(),
                u8::from(point.new_combo),
                point.curve_type.map_or(u8::MAX, CurveType::code),
            ]);
            // Exact bits: the line form rounds below the encoder's resolution
            for value in [point.beats_since, point.spacing, point.angle] {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update(point.repeats.map_or(u64::MAX, u64::from).to_le_bytes());
            match &point.source_token {
                Some(token) => {
                    hasher.update((token.len() as u64).to_le_bytes());
                    hasher.update(token.as_bytes());
                }
                None => hasher.update(u64::MAX.to_le_bytes()),
            }
        }
    }
    hex::encode(hasher.finalize())
}

#[derive(Serialize)]
struct IndexExportRef<'a> {
    version: u32,
    fingerprint: String,
    encoder: &'a EncoderSettings,
    entry_count: usize,
    built_at: i64,
    trie: &'a SuffixTrie,
}

#[derive(Deserialize)]
struct IndexExport {
    version: u32,
    fingerprint: String,
    encoder: EncoderSettings,
    entry_count: usize,
    built_at: i64,
    trie: SuffixTrie,
}

/// Corpus statistics
#[derive(Debug, Clone)]
pub struct CorpusStats {
    pub entry_count: usize,
    pub symbol_count: usize,
    pub node_count: usize,
    pub occurrence_count: usize,
    pub max_depth: usize,
}

impl std::fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entries: {} | Symbols: {} | Nodes: {} | Occurrences: {} | Depth: {}",
            self.entry_count, self.symbol_count, self.node_count, self.occurrence_count, self.max_depth
        )
    }
}
