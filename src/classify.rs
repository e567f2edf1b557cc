//! Column classifier: turns the aligned columns of one block into call events.
//!
//! The walk is a small state machine over the columns (no open run, inside a match run,
//! inside an insertion, inside a deletion). Every state transition closes the current run
//! and emits its event, so the events of a block come out ordered by reference position
//! and cover every reference position of the block exactly once.

use crate::alignment_block::{AlignmentBlock, Strand, GAP};
use crate::call::{CallEvent, CallKind, SYMBOLIC_DELETION};
use crate::error::ConvertError;

/// Policies applied while classifying a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Deletions longer than this are written with the symbolic `<DEL>` allele.
    /// `None` always keeps the literal deleted bases.
    pub max_deletion_size: Option<usize>,
    /// Reverse-strand coordinates follow the Anchorwave < 1.2.3 convention
    pub legacy_coordinates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Aligned(u8, u8),
    Insertion(u8),
    Deletion(u8),
}

fn is_base(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')
}

/// Validate the tracks of a block and turn them into columns.
///
/// A stretch of single-gap columns holding both inserted and deleted bases is realigned:
/// the first `min(inserted, deleted)` bases pair up as substitution columns and only the
/// remainder stays an indel.
fn columns(block: &AlignmentBlock) -> Result<Vec<Column>, ConvertError> {
    if block.ref_track.len() != block.asm_track.len() {
        return Err(ConvertError::format(format!(
            "Block {}:{} has a reference track of {} columns but an assembly track of {}",
            block.ref_contig,
            block.ref_start,
            block.ref_track.len(),
            block.asm_track.len()
        )));
    }

    let mut out = Vec::with_capacity(block.ref_track.len());
    let mut stretch = Vec::new();
    for (i, (&r, &a)) in block
        .ref_track
        .iter()
        .zip(block.asm_track.iter())
        .enumerate()
    {
        for b in [r, a] {
            if b != GAP && !is_base(b) {
                return Err(ConvertError::format(format!(
                    "Invalid character '{}' in column {} of block {}:{}",
                    b as char, i, block.ref_contig, block.ref_start
                )));
            }
        }
        match (r == GAP, a == GAP) {
            (true, true) => {
                return Err(ConvertError::format(format!(
                    "Column {} of block {}:{} is a gap in both tracks",
                    i, block.ref_contig, block.ref_start
                )))
            }
            (false, false) => {
                flush_stretch(&mut stretch, &mut out);
                out.push(Column::Aligned(r, a));
            }
            (true, false) => stretch.push(Column::Insertion(a)),
            (false, true) => stretch.push(Column::Deletion(r)),
        }
    }
    flush_stretch(&mut stretch, &mut out);
    Ok(out)
}

fn flush_stretch(stretch: &mut Vec<Column>, out: &mut Vec<Column>) {
    let deleted: Vec<u8> = stretch
        .iter()
        .filter_map(|c| match c {
            Column::Deletion(r) => Some(*r),
            _ => None,
        })
        .collect();
    let inserted: Vec<u8> = stretch
        .iter()
        .filter_map(|c| match c {
            Column::Insertion(a) => Some(*a),
            _ => None,
        })
        .collect();

    if deleted.is_empty() || inserted.is_empty() {
        out.append(stretch);
        return;
    }

    let paired = deleted.len().min(inserted.len());
    out.extend(
        deleted
            .iter()
            .zip(inserted.iter())
            .map(|(&r, &a)| Column::Aligned(r, a)),
    );
    out.extend(deleted[paired..].iter().map(|&r| Column::Deletion(r)));
    out.extend(inserted[paired..].iter().map(|&a| Column::Insertion(a)));
    stretch.clear();
}

/// Reference position an indel is expressed against, with the alleles it already carries
#[derive(Debug)]
struct Anchor {
    ref_pos: u64,
    ref_allele: Vec<u8>,
    alt_allele: Vec<u8>,
    asm_start: u64,
    asm_end: u64,
}

#[derive(Debug)]
struct PendingIndel {
    /// `None` when nothing precedes the indel; it then absorbs the next aligned column
    anchor: Option<Anchor>,
    deleted: Vec<u8>,
    inserted: Vec<u8>,
    first_ref: u64,
    first_asm_offset: u64,
}

#[derive(Debug)]
enum RunState {
    None,
    InMatch {
        ref_start: u64,
        asm_offset: u64,
        ref_base: u8,
    },
    InInsertion(PendingIndel),
    InDeletion(PendingIndel),
}

struct ColumnClassifier<'a> {
    block: &'a AlignmentBlock,
    reference: &'a [u8],
    options: ClassifyOptions,
    /// Next reference position to be consumed
    ref_pos: u64,
    /// Assembly bases consumed so far
    asm_offset: u64,
    last_column: (u8, u8),
    state: RunState,
    events: Vec<CallEvent>,
}

impl<'a> ColumnClassifier<'a> {
    fn new(block: &'a AlignmentBlock, reference: &'a [u8], options: ClassifyOptions) -> Self {
        ColumnClassifier {
            block,
            reference,
            options,
            ref_pos: block.ref_start,
            asm_offset: 0,
            last_column: (b'N', b'N'),
            state: RunState::None,
            events: Vec::with_capacity(block.ref_track.len() / 8 + 1),
        }
    }

    fn asm_pos(&self, offset: i64) -> u64 {
        self.block
            .asm_position(offset, self.options.legacy_coordinates)
    }

    fn reference_base(&self, position: u64) -> Option<u8> {
        if position == 0 {
            return None;
        }
        self.reference.get(position as usize - 1).copied()
    }

    fn variant(
        &self,
        ref_start: u64,
        ref_allele: Vec<u8>,
        alt_allele: Vec<u8>,
        asm_start: u64,
        asm_end: u64,
    ) -> CallEvent {
        CallEvent {
            kind: CallKind::from_alleles(ref_allele.len(), alt_allele.len()),
            ref_start,
            ref_end: ref_start + ref_allele.len() as u64 - 1,
            ref_allele,
            alt_allele,
            asm_contig: self.block.asm_contig.clone(),
            asm_start,
            asm_end,
            asm_strand: self.block.asm_strand,
            symbolic: false,
        }
    }

    fn emit_match(&mut self, ref_start: u64, ref_end: u64, asm_offset: u64, ref_base: u8) {
        let asm_start = self.asm_pos(asm_offset as i64);
        let asm_end = self.asm_pos((asm_offset + (ref_end - ref_start)) as i64);
        self.events.push(CallEvent {
            kind: CallKind::Match,
            ref_start,
            ref_end,
            ref_allele: vec![ref_base],
            alt_allele: Vec::new(),
            asm_contig: self.block.asm_contig.clone(),
            asm_start,
            asm_end,
            asm_strand: self.block.asm_strand,
            symbolic: false,
        });
    }

    /// Close an open match run. With `keep_last` the run's last column is held back and
    /// returned as the anchor of the indel that follows it.
    fn close_match(&mut self, keep_last: bool) -> Option<Anchor> {
        let RunState::InMatch {
            ref_start,
            asm_offset,
            ref_base,
        } = self.state
        else {
            return None;
        };
        self.state = RunState::None;

        let run_end = self.ref_pos - 1;
        if !keep_last {
            self.emit_match(ref_start, run_end, asm_offset, ref_base);
            return None;
        }

        if run_end > ref_start {
            self.emit_match(ref_start, run_end - 1, asm_offset, ref_base);
        }
        let (r, a) = self.last_column;
        let asm = self.asm_pos(self.asm_offset as i64 - 1);
        Some(Anchor {
            ref_pos: run_end,
            ref_allele: vec![r],
            alt_allele: vec![a],
            asm_start: asm,
            asm_end: asm,
        })
    }

    /// Find the reference position an indel starting at `ref_pos` hangs off
    fn claim_anchor(&mut self) -> Option<Anchor> {
        if matches!(self.state, RunState::InMatch { .. }) {
            return self.close_match(true);
        }

        // A variant right before the indel is folded into it so the records do not overlap
        let folds_previous = self.events.last().is_some_and(|last| {
            last.is_variant() && !last.symbolic && last.ref_end + 1 == self.ref_pos
        });
        if folds_previous {
            let last = self.events.pop()?;
            return Some(Anchor {
                ref_pos: last.ref_start,
                ref_allele: last.ref_allele,
                alt_allele: last.alt_allele,
                asm_start: last.asm_start,
                asm_end: last.asm_end,
            });
        }

        // At the block start, hang off the reference base just before the block
        if self.ref_pos == self.block.ref_start && self.ref_pos > 1 {
            let base = self.reference_base(self.ref_pos - 1).unwrap_or(b'N');
            let asm = self.asm_pos(-1);
            return Some(Anchor {
                ref_pos: self.ref_pos - 1,
                ref_allele: vec![base],
                alt_allele: vec![base],
                asm_start: asm,
                asm_end: asm,
            });
        }

        None
    }

    fn take_pending(&mut self) -> Option<PendingIndel> {
        match std::mem::replace(&mut self.state, RunState::None) {
            RunState::InInsertion(pending) | RunState::InDeletion(pending) => Some(pending),
            other => {
                self.state = other;
                None
            }
        }
    }

    fn open_indel(&mut self) -> PendingIndel {
        let anchor = self.claim_anchor();
        PendingIndel {
            anchor,
            deleted: Vec::new(),
            inserted: Vec::new(),
            first_ref: self.ref_pos,
            first_asm_offset: self.asm_offset,
        }
    }

    /// Emit an indel. `right` is the column (or reference base) absorbed when the indel
    /// has no anchor before it.
    fn emit_indel(&mut self, pending: PendingIndel, right: Option<(u8, u8)>) {
        let deleted_len = pending.deleted.len();
        let (ref_start, ref_allele, alt_allele, asm_start, asm_end) = match pending.anchor {
            Some(anchor) => {
                let asm_end = if pending.inserted.is_empty() {
                    anchor.asm_end
                } else {
                    self.asm_pos(self.asm_offset as i64 - 1)
                };
                let mut ref_allele = anchor.ref_allele;
                ref_allele.extend_from_slice(&pending.deleted);
                let mut alt_allele = anchor.alt_allele;
                alt_allele.extend_from_slice(&pending.inserted);
                (anchor.ref_pos, ref_allele, alt_allele, anchor.asm_start, asm_end)
            }
            None => {
                let (r, a) = right.unwrap_or((b'N', b'N'));
                let mut ref_allele = pending.deleted;
                ref_allele.push(r);
                let mut alt_allele = pending.inserted;
                alt_allele.push(a);
                (
                    pending.first_ref,
                    ref_allele,
                    alt_allele,
                    self.asm_pos(pending.first_asm_offset as i64),
                    self.asm_pos(self.asm_offset as i64),
                )
            }
        };

        let mut event = self.variant(ref_start, ref_allele, alt_allele, asm_start, asm_end);
        let symbolic = event.kind == CallKind::Deletion
            && self
                .options
                .max_deletion_size
                .is_some_and(|max| deleted_len > max);
        if symbolic {
            event.ref_allele.truncate(1);
            event.alt_allele = SYMBOLIC_DELETION.as_bytes().to_vec();
            event.symbolic = true;
        }
        self.events.push(event);
    }

    fn aligned(&mut self, r: u8, a: u8) {
        if let Some(pending) = self.take_pending() {
            if pending.anchor.is_some() {
                self.emit_indel(pending, None);
            } else {
                // Unanchored indel absorbs this column
                self.emit_indel(pending, Some((r, a)));
                self.advance(r, a);
                return;
            }
        }

        if r == a {
            if !matches!(self.state, RunState::InMatch { .. }) {
                self.state = RunState::InMatch {
                    ref_start: self.ref_pos,
                    asm_offset: self.asm_offset,
                    ref_base: r,
                };
            }
        } else {
            self.close_match(false);
            let asm = self.asm_pos(self.asm_offset as i64);
            let snp = self.variant(self.ref_pos, vec![r], vec![a], asm, asm);
            self.events.push(snp);
        }
        self.advance(r, a);
    }

    fn advance(&mut self, r: u8, a: u8) {
        self.last_column = (r, a);
        self.ref_pos += 1;
        self.asm_offset += 1;
    }

    fn insertion(&mut self, a: u8) {
        let mut pending = match self.take_pending() {
            Some(pending) => pending,
            None => self.open_indel(),
        };
        pending.inserted.push(a);
        self.state = RunState::InInsertion(pending);
        self.asm_offset += 1;
    }

    fn deletion(&mut self, r: u8) {
        let mut pending = match self.take_pending() {
            Some(pending) => pending,
            None => self.open_indel(),
        };
        pending.deleted.push(r);
        self.state = RunState::InDeletion(pending);
        self.ref_pos += 1;
    }

    fn finish(mut self) -> Result<Vec<CallEvent>, ConvertError> {
        match std::mem::replace(&mut self.state, RunState::None) {
            RunState::None => {}
            state @ RunState::InMatch { .. } => {
                self.state = state;
                self.close_match(false);
            }
            RunState::InInsertion(pending) | RunState::InDeletion(pending) => {
                if pending.anchor.is_some() {
                    self.emit_indel(pending, None);
                } else {
                    // Nothing aligned in the block: fall back to the reference base after it
                    let base = self.reference_base(self.ref_pos).ok_or_else(|| {
                        ConvertError::format(format!(
                            "Indel in block {}:{} has no reference base to anchor on",
                            self.block.ref_contig, self.block.ref_start
                        ))
                    })?;
                    self.emit_indel(pending, Some((base, base)));
                }
            }
        }
        Ok(self.events)
    }
}

/// Classify every column of `block` into call events ordered by reference position.
///
/// `reference` is the full sequence of the block's reference contig. It is only read for
/// the anchor base of indels that sit at the very start or end of the block.
pub fn classify_block(
    block: &AlignmentBlock,
    reference: &[u8],
    options: ClassifyOptions,
) -> Result<Vec<CallEvent>, ConvertError> {
    if block.ref_strand == Strand::Reverse {
        return Err(ConvertError::format(format!(
            "Block {}:{} has its reference track on the reverse strand",
            block.ref_contig, block.ref_start
        )));
    }
    if block.ref_start == 0 {
        return Err(ConvertError::format(format!(
            "Block on {} has a reference start of 0; positions are 1-based",
            block.ref_contig
        )));
    }

    let mut classifier = ColumnClassifier::new(block, reference, options);
    for column in columns(block)? {
        match column {
            Column::Aligned(r, a) => classifier.aligned(r, a),
            Column::Insertion(a) => classifier.insertion(a),
            Column::Deletion(r) => classifier.deletion(r),
        }
    }
    classifier.finish()
}
