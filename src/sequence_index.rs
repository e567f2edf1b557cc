use rustc_hash::FxHashMap;
use std::io;

/// Read-only access to reference contig sequences.
///
/// Shared by all contig workers without locking, so implementations must be `Sync`.
pub trait ReferenceStore: Sync {
    /// Contig names and lengths, in the order the reference declares them
    fn contigs(&self) -> Vec<(String, u64)>;

    fn contig_length(&self, name: &str) -> Option<u64>;

    /// Fetch `[start, end)` of a contig (0-based, half-open), upper-cased
    fn fetch_sequence(&self, seq_name: &str, start: u64, end: u64) -> io::Result<Vec<u8>>;

    fn has_contig(&self, name: &str) -> bool {
        self.contig_length(name).is_some()
    }

    /// Fetch a whole contig
    fn fetch_contig(&self, seq_name: &str) -> io::Result<Vec<u8>> {
        let length = self.contig_length(seq_name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found"),
            )
        })?;
        if length == 0 {
            return Ok(Vec::new());
        }
        self.fetch_sequence(seq_name, 0, length)
    }
}

/// Reference held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryReference {
    names: Vec<String>,
    sequences: FxHashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a contig. Bases are upper-cased.
    pub fn insert(&mut self, name: &str, sequence: &[u8]) {
        if !self.sequences.contains_key(name) {
            self.names.push(name.to_string());
        }
        self.sequences
            .insert(name.to_string(), sequence.to_ascii_uppercase());
    }

    pub fn with_contig(mut self, name: &str, sequence: &[u8]) -> Self {
        self.insert(name, sequence);
        self
    }
}

impl ReferenceStore for InMemoryReference {
    fn contigs(&self) -> Vec<(String, u64)> {
        self.names
            .iter()
            .map(|name| (name.clone(), self.sequences[name].len() as u64))
            .collect()
    }

    fn contig_length(&self, name: &str) -> Option<u64> {
        self.sequences.get(name).map(|seq| seq.len() as u64)
    }

    fn fetch_sequence(&self, seq_name: &str, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let sequence = self.sequences.get(seq_name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found"),
            )
        })?;
        let end = (end as usize).min(sequence.len());
        let start = (start as usize).min(end);
        Ok(sequence[start..end].to_vec())
    }
}
