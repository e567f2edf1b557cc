use std::sync::Arc;

/// Strand orientation of one row of an alignment block
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Forward),
            '-' => Some(Strand::Reverse),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

pub const GAP: u8 = b'-';

/// A pairwise alignment block: one reference interval against one assembly interval.
///
/// ## Coordinates
/// - `ref_start` is 1-based and inclusive.
/// - `asm_start` is the raw 0-based MAF start, relative to `asm_strand`. On the reverse
///   strand it counts from the end of the assembly contig, so `asm_src_size` is needed to
///   project it back onto forward coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentBlock {
    pub ref_contig: String,
    pub ref_start: u64,
    pub ref_strand: Strand,
    pub asm_contig: Arc<str>,
    pub asm_start: u64,
    pub asm_src_size: u64,
    pub asm_strand: Strand,
    pub ref_track: Vec<u8>,
    pub asm_track: Vec<u8>,
    /// Haplotype tag (0 or 1) when the block belongs to a diploid alignment
    pub phase: Option<u8>,
    /// Position of the block in the input, used to break ties when sorting
    pub order: usize,
}

impl AlignmentBlock {
    /// Number of reference bases covered by the block
    pub fn ref_len(&self) -> u64 {
        self.ref_track.iter().filter(|&&b| b != GAP).count() as u64
    }

    /// Last reference position covered by the block (1-based, inclusive)
    pub fn ref_end(&self) -> u64 {
        (self.ref_start + self.ref_len()).saturating_sub(1)
    }

    /// 1-based forward-strand coordinate of the assembly base reached after `offset`
    /// assembly bases of the block. `offset` may be -1 for the base just before the block.
    ///
    /// Reverse-strand rows count down from the block's forward end. MAF files written by
    /// Anchorwave before 1.2.3 place that end one base too low; `legacy` corrects for it.
    pub fn asm_position(&self, offset: i64, legacy: bool) -> u64 {
        let position = match self.asm_strand {
            Strand::Forward => self.asm_start as i64 + 1 + offset,
            Strand::Reverse => {
                let end = self.asm_src_size as i64 - self.asm_start as i64 + i64::from(legacy);
                end - offset
            }
        };
        position.max(0) as u64
    }
}
