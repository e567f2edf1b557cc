use crate::alignment_block::AlignmentBlock;
use log::debug;

/// Number of haplotypes written in diploid mode
pub const HAPLOTYPES: usize = 2;

/// Give every untagged block of one contig a haplotype.
///
/// Blocks are visited in reference order. An untagged block goes to haplotype 0 unless it
/// overlaps the furthest-reaching haplotype-0 block seen so far, in which case it goes to
/// haplotype 1. Blocks that already carry a tag keep it.
pub fn assign_phases(blocks: &mut [AlignmentBlock]) {
    let mut visit: Vec<usize> = (0..blocks.len()).collect();
    visit.sort_by_key(|&i| (blocks[i].ref_start, blocks[i].order));

    let mut haplotype0_end = 0u64;
    for i in visit {
        let block = &mut blocks[i];
        let phase = match block.phase {
            Some(phase) => phase,
            None => {
                let phase = if block.ref_start <= haplotype0_end { 1 } else { 0 };
                debug!(
                    "Block {}:{}-{} from {} assigned to haplotype {}",
                    block.ref_contig,
                    block.ref_start,
                    block.ref_end(),
                    block.asm_contig,
                    phase
                );
                block.phase = Some(phase);
                phase
            }
        };
        if phase == 0 {
            haplotype0_end = haplotype0_end.max(block.ref_end());
        }
    }
}

/// Split blocks by haplotype tag. Untagged blocks go to haplotype 0.
pub fn split_haplotypes(blocks: Vec<AlignmentBlock>) -> [Vec<AlignmentBlock>; HAPLOTYPES] {
    let (second, first): (Vec<_>, Vec<_>) = blocks
        .into_iter()
        .partition(|block| block.phase == Some(1));
    [first, second]
}
