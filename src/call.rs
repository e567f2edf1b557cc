use crate::alignment_block::Strand;
use std::sync::Arc;

/// Allele written for deletions longer than the symbolic threshold
pub const SYMBOLIC_DELETION: &str = "<DEL>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Match,
    Snp,
    Insertion,
    Deletion,
}

impl CallKind {
    /// Kind of a variant from the lengths of its alleles
    pub fn from_alleles(ref_len: usize, alt_len: usize) -> Self {
        match ref_len.cmp(&alt_len) {
            std::cmp::Ordering::Less => CallKind::Insertion,
            std::cmp::Ordering::Greater => CallKind::Deletion,
            std::cmp::Ordering::Equal => CallKind::Snp,
        }
    }
}

/// A classified span of one alignment block.
///
/// Reference coordinates are 1-based and inclusive. The assembly coordinates are those
/// aligned to `ref_start` and `ref_end`, so on the reverse strand `asm_start > asm_end`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEvent {
    pub kind: CallKind,
    pub ref_start: u64,
    pub ref_end: u64,
    /// For matches only the base at `ref_start`
    pub ref_allele: Vec<u8>,
    /// Empty for matches
    pub alt_allele: Vec<u8>,
    pub asm_contig: Arc<str>,
    pub asm_start: u64,
    pub asm_end: u64,
    pub asm_strand: Strand,
    pub symbolic: bool,
}

impl CallEvent {
    pub fn is_match(&self) -> bool {
        self.kind == CallKind::Match
    }

    pub fn is_variant(&self) -> bool {
        !self.is_match()
    }

    /// Assembly coordinate aligned to reference `position` inside a match run
    pub fn asm_position_at(&self, position: u64) -> u64 {
        let delta = position.saturating_sub(self.ref_start);
        match self.asm_strand {
            Strand::Forward => self.asm_start + delta,
            Strand::Reverse => self.asm_start.saturating_sub(delta),
        }
    }

    /// Short description used when reporting conflicts
    pub fn describe(&self) -> String {
        let alt = if self.symbolic {
            SYMBOLIC_DELETION.to_string()
        } else {
            String::from_utf8_lossy(&self.alt_allele).into_owned()
        };
        format!(
            "{}>{} from {}:{}-{}({})",
            String::from_utf8_lossy(&self.ref_allele),
            alt,
            self.asm_contig,
            self.asm_start,
            self.asm_end,
            self.asm_strand
        )
    }
}
