//! SuffixTrie - depth-bounded generalized suffix trie
//!
//! Every suffix of every inserted symbol string is walked into the trie up
//! to `max_depth` symbols, and its start position is recorded once, at the
//! node where that walk stops. Insertion is `O(len * max_depth)`, linear in
//! the corpus for a fixed depth.
//!
//! A query matching `q` symbols lands on a set of nodes at depth `q`; every
//! terminal in their subtrees is an occurrence. Queries deeper than the
//! trie finish by checking the stored symbol strings.

use crate::{CorpusLocator, EntryId};
use mosaic_core::Symbol;
use serde::{Deserialize, Serialize};

type NodeId = u32;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Node {
    /// Sorted by symbol
    children: Vec<(Symbol, NodeId)>,

    /// Suffixes whose indexed prefix ends at this node
    terminals: Vec<CorpusLocator>,
}

/// Append-only suffix trie over many symbol strings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuffixTrie {
    max_depth: usize,
    nodes: Vec<Node>,

    /// Inserted strings by entry id, rebuilt from the corpus on load
    #[serde(skip)]
    strings: Vec<Vec<Symbol>>,
}

impl SuffixTrie {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            nodes: vec![Node::default()],
            strings: Vec::new(),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of recorded suffix starts
    pub fn occurrence_count(&self) -> usize {
        self.nodes.iter().map(|n| n.terminals.len()).sum()
    }

    pub fn symbols(&self, entry: EntryId) -> Option<&[Symbol]> {
        self.strings.get(entry as usize).map(Vec::as_slice)
    }

    /// Index every suffix of `symbols` under `entry`.
    ///
    /// Entry ids must be unique; inserting the same id twice duplicates occurrences.
    pub fn insert(&mut self, entry: EntryId, symbols: &[Symbol]) {
        let idx = entry as usize;
        if self.strings.len() <= idx {
            self.strings.resize(idx + 1, Vec::new());
        }
        self.strings[idx] = symbols.to_vec();

        for start in 0..symbols.len() {
            let end = (start + self.max_depth).min(symbols.len());
            let mut node = ROOT;
            for &symbol in &symbols[start..end] {
                node = self.child_or_insert(node, symbol);
            }
            self.nodes[node as usize]
                .terminals
                .push(CorpusLocator::new(entry, start as u32));
        }
    }

    fn child_or_insert(&mut self, node: NodeId, symbol: Symbol) -> NodeId {
        let children = &self.nodes[node as usize].children;
        match children.binary_search_by_key(&symbol, |(s, _)| *s) {
            Ok(i) => children[i].1,
            Err(i) => {
                let id = self.nodes.len() as NodeId;
                self.nodes.push(Node::default());
                self.nodes[node as usize].children.insert(i, (symbol, id));
                id
            }
        }
    }

    /// All occurrences of `symbols`
    pub fn query_exact(&self, symbols: &[Symbol]) -> Occurrences<'_> {
        self.query_range(symbols, symbols)
    }

    /// All occurrences where position `k` lies within `[lo[k], hi[k]]`.
    ///
    /// The query length is the shorter of the two bound slices.
    pub fn query_range(&self, lo: &[Symbol], hi: &[Symbol]) -> Occurrences<'_> {
        let len = lo.len().min(hi.len());
        Occurrences {
            trie: self,
            lo: lo[..len].to_vec(),
            hi: hi[..len].to_vec(),
            stack: vec![(ROOT, 0)],
            pending: [].iter(),
            verify_from: len,
        }
    }

    pub(crate) fn attach_strings(&mut self, strings: Vec<Vec<Symbol>>) {
        self.strings = strings;
    }
}

/// Lazy occurrence enumeration, consumed once
pub struct Occurrences<'a> {
    trie: &'a SuffixTrie,
    lo: Vec<Symbol>,
    hi: Vec<Symbol>,

    /// (node, matched depth); depth == query length means the whole subtree matches
    stack: Vec<(NodeId, usize)>,
    pending: std::slice::Iter<'a, CorpusLocator>,

    /// Query depth from which pending terminals still need checking
    verify_from: usize,
}

impl Occurrences<'_> {
    fn query_len(&self) -> usize {
        self.lo.len()
    }

    fn in_range(&self, depth: usize, symbol: Symbol) -> bool {
        self.lo[depth] <= symbol && symbol <= self.hi[depth]
    }

    fn tail_matches(&self, loc: &CorpusLocator) -> bool {
        if self.verify_from >= self.query_len() {
            return true;
        }
        let Some(symbols) = self.trie.symbols(loc.entry()) else {
            return false;
        };
        let start = loc.offset();
        if start + self.query_len() > symbols.len() {
            return false;
        }
        (self.verify_from..self.query_len()).all(|d| self.in_range(d, symbols[start + d]))
    }
}

impl Iterator for Occurrences<'_> {
    type Item = CorpusLocator;

    fn next(&mut self) -> Option<CorpusLocator> {
        loop {
            while let Some(loc) = self.pending.next() {
                if self.tail_matches(loc) {
                    return Some(*loc);
                }
            }

            let (node_id, depth) = self.stack.pop()?;
            let trie = self.trie;
            let node = &trie.nodes[node_id as usize];
            let query_len = self.query_len();

            if depth >= query_len {
                self.pending = node.terminals.iter();
                self.verify_from = query_len;
                self.stack
                    .extend(node.children.iter().rev().map(|&(_, child)| (child, query_len)));
            } else if depth >= trie.max_depth {
                self.pending = node.terminals.iter();
                self.verify_from = depth;
            } else {
                // Terminals here belong to suffixes shorter than the query
                let (lo, hi) = (self.lo[depth], self.hi[depth]);
                let start = node.children.partition_point(|(s, _)| *s < lo);
                let end = node.children.partition_point(|(s, _)| *s <= hi);
                if start < end {
                    self.stack.extend(
                        node.children[start..end]
                            .iter()
                            .rev()
                            .map(|&(_, child)| (child, depth + 1)),
                    );
                }
            }
        }
    }
}
