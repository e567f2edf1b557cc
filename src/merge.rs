use crate::call::CallEvent;
use crate::error::ConvertError;
use crate::record::{AssemblyProvenance, MergedRecord};
use log::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Cover every reference position of the contig, filling uncovered stretches with
    /// reference blocks
    pub fill_gaps: bool,
}

/// Merge the calls of all blocks aligned to one contig into its ordered output records.
///
/// `reference` is the full contig sequence. Variants take precedence over matches, an earlier
/// match takes precedence over a later overlapping one, and two different variants on the same
/// reference position are an error.
pub fn merge_contig(
    contig: &str,
    contig_len: u64,
    reference: &[u8],
    mut events: Vec<CallEvent>,
    options: MergeOptions,
) -> Result<Vec<MergedRecord>, ConvertError> {
    // Stable, so calls from earlier blocks stay ahead of later ones on ties
    events.sort_by_key(|event| event.ref_start);
    let (variants, matches): (Vec<CallEvent>, Vec<CallEvent>) =
        events.into_iter().partition(CallEvent::is_variant);

    let variants = resolve_variants(contig, variants)?;
    let matches = resolve_matches(reference, matches, &variants);

    let mut calls = variants;
    calls.extend(matches);
    calls.sort_by_key(|event| event.ref_start);

    let mut records = coalesce(calls);
    if options.fill_gaps {
        records = fill_gaps(contig, contig_len, reference, records);
    }

    debug_assert!(records.windows(2).all(|w| w[0].end < w[1].start));
    Ok(records)
}

fn same_variant(a: &CallEvent, b: &CallEvent) -> bool {
    a.ref_start == b.ref_start
        && a.ref_end == b.ref_end
        && a.ref_allele == b.ref_allele
        && a.alt_allele == b.alt_allele
        && a.symbolic == b.symbolic
}

fn resolve_variants(
    contig: &str,
    variants: Vec<CallEvent>,
) -> Result<Vec<CallEvent>, ConvertError> {
    let mut kept: Vec<CallEvent> = Vec::with_capacity(variants.len());
    for variant in variants {
        if let Some(previous) = kept.last() {
            if variant.ref_start <= previous.ref_end {
                if same_variant(previous, &variant) {
                    debug!(
                        "Dropping duplicate call {} at {contig}:{}",
                        variant.describe(),
                        variant.ref_start
                    );
                    continue;
                }
                return Err(ConvertError::AmbiguousCall {
                    contig: contig.to_string(),
                    position: variant.ref_start,
                    first: previous.describe(),
                    second: variant.describe(),
                });
            }
        }
        kept.push(variant);
    }
    Ok(kept)
}

/// Part of a match run restricted to `[start, end]`
fn slice_match(run: &CallEvent, start: u64, end: u64, reference: &[u8]) -> CallEvent {
    let ref_allele = if start == run.ref_start {
        run.ref_allele.clone()
    } else {
        vec![reference_base(reference, start)]
    };
    CallEvent {
        ref_start: start,
        ref_end: end,
        ref_allele,
        asm_start: run.asm_position_at(start),
        asm_end: run.asm_position_at(end),
        ..run.clone()
    }
}

fn reference_base(reference: &[u8], position: u64) -> u8 {
    position
        .checked_sub(1)
        .and_then(|offset| reference.get(offset as usize))
        .copied()
        .unwrap_or(b'N')
}

/// Trim match runs so they cover no position already claimed by a variant or by an earlier
/// match. `variants` must be sorted and non-overlapping.
fn resolve_matches(
    reference: &[u8],
    matches: Vec<CallEvent>,
    variants: &[CallEvent],
) -> Vec<CallEvent> {
    let mut resolved = Vec::with_capacity(matches.len());
    let mut claimed_until = 0u64;

    for run in matches {
        let start = run.ref_start.max(claimed_until + 1);
        if start > run.ref_end {
            continue;
        }
        claimed_until = claimed_until.max(run.ref_end);

        let mut piece_start = start;
        let first = variants.partition_point(|variant| variant.ref_end < piece_start);
        for variant in &variants[first..] {
            if variant.ref_start > run.ref_end {
                break;
            }
            if variant.ref_start > piece_start {
                resolved.push(slice_match(
                    &run,
                    piece_start,
                    variant.ref_start - 1,
                    reference,
                ));
            }
            piece_start = piece_start.max(variant.ref_end + 1);
        }
        if piece_start <= run.ref_end {
            resolved.push(slice_match(&run, piece_start, run.ref_end, reference));
        }
    }

    resolved
}

fn to_record(call: CallEvent) -> MergedRecord {
    let is_match = call.is_match();
    let provenance = Some(AssemblyProvenance {
        contig: call.asm_contig,
        start: call.asm_start,
        end: call.asm_end,
        strand: call.asm_strand,
    });
    if is_match {
        let base = call.ref_allele.first().copied().unwrap_or(b'N');
        MergedRecord::reference_block(call.ref_start, call.ref_end, base, provenance)
    } else {
        MergedRecord {
            start: call.ref_start,
            end: call.ref_end,
            ref_allele: call.ref_allele,
            alt_allele: Some(call.alt_allele),
            symbolic: call.symbolic,
            provenance,
        }
    }
}

/// Join reference blocks that abut on the reference and come from the same assembly contig
/// and strand
fn coalesce(calls: Vec<CallEvent>) -> Vec<MergedRecord> {
    let mut records: Vec<MergedRecord> = Vec::with_capacity(calls.len());
    for call in calls {
        if call.is_match() {
            if let Some(last) = records.last_mut() {
                if last.is_reference_block() && last.end + 1 == call.ref_start {
                    if let Some(provenance) = last.provenance.as_mut() {
                        if provenance.contig == call.asm_contig
                            && provenance.strand == call.asm_strand
                        {
                            last.end = call.ref_end;
                            provenance.end = call.asm_end;
                            continue;
                        }
                    }
                }
            }
        }
        records.push(to_record(call));
    }
    records
}

fn fill_gaps(
    contig: &str,
    contig_len: u64,
    reference: &[u8],
    records: Vec<MergedRecord>,
) -> Vec<MergedRecord> {
    let mut filled = Vec::with_capacity(records.len() * 2 + 1);
    let mut next = 1u64;

    for record in records {
        if record.start > next {
            filled.push(MergedRecord::reference_block(
                next,
                record.start - 1,
                reference_base(reference, next),
                None,
            ));
        }
        next = next.max(record.end + 1);
        filled.push(record);
    }

    if next <= contig_len {
        filled.push(MergedRecord::reference_block(
            next,
            contig_len,
            reference_base(reference, next),
            None,
        ));
    } else if next > contig_len + 1 {
        warn!(
            "Calls on {contig} extend to {} past its length of {contig_len}",
            next - 1
        );
    }

    filled
}
