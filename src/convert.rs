//! End-to-end conversion of a MAF file into one or two GVCF/VCF outputs.

use crate::alignment_block::AlignmentBlock;
use crate::call::CallEvent;
use crate::classify::{classify_block, ClassifyOptions};
use crate::config::{ConvertConfig, OutputType};
use crate::contig_order::order_contigs;
use crate::error::ConvertError;
use crate::faidx::FastaIndex;
use crate::maf::{MafBlock, MafFile};
use crate::merge::merge_contig;
use crate::phase::{assign_phases, split_haplotypes};
use crate::record::MergedRecord;
use crate::sequence_index::ReferenceStore;
use crate::vcf::{self, VcfWriter};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with the contig workers. Checked before each block
/// is classified.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct OutputSummary {
    pub path: PathBuf,
    /// BGZF copy of `path`, when compression succeeded
    pub compressed: Option<PathBuf>,
    pub records: usize,
}

/// Outcome of a run. Contigs in `failures` were left out of every output.
#[derive(Debug, Default)]
pub struct ConversionSummary {
    pub outputs: Vec<OutputSummary>,
    pub failures: Vec<(String, ConvertError)>,
    /// Compression and indexing problems; the plain outputs are complete regardless
    pub warnings: Vec<ConvertError>,
}

impl ConversionSummary {
    /// Turn the first contig failure, if any, into an error
    pub fn into_result(mut self) -> Result<Self, ConvertError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            let (_, first) = self.failures.remove(0);
            Err(first)
        }
    }
}

/// Find the reference contig a MAF sequence name refers to. Names such as `B73.chr7` are
/// retried without the part up to the first `.`.
pub fn resolve_contig<R: ReferenceStore + ?Sized>(reference: &R, name: &str) -> Option<String> {
    if reference.has_contig(name) {
        return Some(name.to_string());
    }
    name.split_once('.')
        .map(|(_, rest)| rest)
        .filter(|rest| reference.has_contig(rest))
        .map(str::to_string)
}

/// Pairwise blocks of a MAF file grouped by reference contig
#[derive(Debug, Default)]
pub struct ContigBlocks {
    /// Reference contigs in the order their first block was read
    pub encounter_order: Vec<String>,
    pub blocks: FxHashMap<String, Vec<AlignmentBlock>>,
    /// Contigs with a block that cannot be projected, with the first such error. Their
    /// other blocks are dropped.
    pub failures: FxHashMap<String, ConvertError>,
}

fn project_block(
    block: &MafBlock,
    diploid: bool,
    warned_extra_rows: &mut bool,
) -> Result<Vec<AlignmentBlock>, ConvertError> {
    match (diploid, block.assemblies.len()) {
        (true, 1) => Ok(vec![block.pairwise(0, None)?]),
        (true, 2) => Ok(vec![block.pairwise(0, Some(0))?, block.pairwise(1, Some(1))?]),
        (true, n) => Err(ConvertError::format_at(
            format!("Diploid output needs one or two assembly rows per block, found {n}"),
            block.line,
        )),
        (false, n) => {
            if n > 1 && !*warned_extra_rows {
                warn!(
                    "Block at line {} has {n} assembly rows; only the first is used",
                    block.line
                );
                *warned_extra_rows = true;
            }
            Ok(vec![block.pairwise(0, None)?])
        }
    }
}

/// Project MAF blocks onto pairwise blocks grouped by reference contig.
///
/// In diploid mode a block with two assembly rows yields one block per haplotype; other
/// modes use the first assembly row only. A block that cannot be projected fails its
/// contig only. Errors of the reader itself end the collection.
pub fn collect_blocks<R, I>(
    blocks: I,
    reference: &R,
    diploid: bool,
) -> Result<ContigBlocks, ConvertError>
where
    R: ReferenceStore + ?Sized,
    I: IntoIterator<Item = Result<MafBlock, ConvertError>>,
{
    let mut collected = ContigBlocks::default();
    let mut warned_extra_rows = false;

    for block in blocks {
        let block = block?;
        let contig = resolve_contig(reference, &block.reference.contig)
            .unwrap_or_else(|| block.reference.contig.clone());
        if !collected.blocks.contains_key(&contig) {
            collected.encounter_order.push(contig.clone());
            collected.blocks.insert(contig.clone(), Vec::new());
        }
        if collected.failures.contains_key(&contig) {
            continue;
        }

        match project_block(&block, diploid, &mut warned_extra_rows) {
            Ok(projected) => {
                if let Some(contig_blocks) = collected.blocks.get_mut(&contig) {
                    contig_blocks.extend(projected.into_iter().map(|mut b| {
                        b.ref_contig = contig.clone();
                        b
                    }));
                }
            }
            Err(e) => {
                debug!("{contig}: {e}");
                collected.blocks.insert(contig.clone(), Vec::new());
                collected.failures.insert(contig, e);
            }
        }
    }

    Ok(collected)
}

fn classify_all(
    blocks: &[AlignmentBlock],
    sequence: &[u8],
    options: ClassifyOptions,
    cancel: &CancelToken,
) -> Result<Vec<CallEvent>, ConvertError> {
    let per_block = blocks
        .par_iter()
        .map(|block| {
            if cancel.is_cancelled() {
                return Err(ConvertError::Cancelled);
            }
            classify_block(block, sequence, options)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(per_block.into_iter().flatten().collect())
}

/// Records of one contig for every output, in output order
fn convert_contig<R: ReferenceStore + ?Sized>(
    contig: &str,
    mut blocks: Vec<AlignmentBlock>,
    reference: &R,
    config: &ConvertConfig,
    cancel: &CancelToken,
) -> Result<Vec<Vec<MergedRecord>>, ConvertError> {
    let length = reference.contig_length(contig).ok_or_else(|| {
        ConvertError::format(format!("Contig '{contig}' is not in the reference"))
    })?;
    let sequence = reference.fetch_contig(contig)?;
    blocks.sort_by_key(|block| block.order);

    let groups: Vec<Vec<AlignmentBlock>> = if config.two_gvcfs {
        assign_phases(&mut blocks);
        split_haplotypes(blocks).into_iter().collect()
    } else {
        vec![blocks]
    };

    let mut outputs = Vec::with_capacity(groups.len());
    for group in groups {
        let events = classify_all(&group, &sequence, config.classify_options(), cancel)?;
        let event_count = events.len();
        let mut records = merge_contig(contig, length, &sequence, events, config.merge_options())?;
        if config.output_type == OutputType::Vcf {
            records.retain(|record| !record.is_reference_block());
        }
        debug!(
            "{contig}: {} blocks, {event_count} events, {} records",
            group.len(),
            records.len()
        );
        outputs.push(records);
    }
    Ok(outputs)
}

/// Run a conversion against the reference FASTA named in `config`
pub fn convert(
    config: &ConvertConfig,
    cancel: &CancelToken,
) -> Result<ConversionSummary, ConvertError> {
    config.validate()?;
    let reference_path = config.reference_file.to_string_lossy();
    let reference = FastaIndex::build_from_file(&reference_path)?;
    convert_with_reference(config, &reference, cancel)
}

/// Run a conversion against an already opened reference
pub fn convert_with_reference<R: ReferenceStore + ?Sized>(
    config: &ConvertConfig,
    reference: &R,
    cancel: &CancelToken,
) -> Result<ConversionSummary, ConvertError> {
    let maf = MafFile::open(&config.maf_file, config.threads)?;
    let ContigBlocks {
        encounter_order,
        blocks: mut by_contig,
        mut failures,
    } = collect_blocks(maf.blocks()?, reference, config.two_gvcfs)?;
    info!(
        "Read alignments for {} contigs from {}",
        encounter_order.len(),
        maf.path().display()
    );

    let reference_contigs = reference.contigs();
    let contig_order = if config.fill_gaps {
        order_contigs(
            reference_contigs
                .iter()
                .map(|(name, _)| name.as_str())
                .chain(encounter_order.iter().map(String::as_str)),
        )
    } else {
        order_contigs(encounter_order.iter().map(String::as_str))
    };

    let work: Vec<(String, Result<Vec<AlignmentBlock>, ConvertError>)> = contig_order
        .into_iter()
        .map(|contig| {
            let blocks = match failures.remove(&contig) {
                Some(e) => Err(e),
                None => Ok(by_contig.remove(&contig).unwrap_or_default()),
            };
            (contig, blocks)
        })
        .collect();

    let results: Vec<(String, Result<Vec<Vec<MergedRecord>>, ConvertError>)> = work
        .into_par_iter()
        .map(|(contig, blocks)| {
            let result = blocks
                .and_then(|blocks| convert_contig(&contig, blocks, reference, config, cancel));
            (contig, result)
        })
        .collect();

    let header_contigs: Vec<(String, u64)> = {
        let lengths: FxHashMap<&str, u64> = reference_contigs
            .iter()
            .map(|(name, length)| (name.as_str(), *length))
            .collect();
        order_contigs(reference_contigs.iter().map(|(name, _)| name.as_str()))
            .into_iter()
            .filter_map(|name| {
                let length = lengths.get(name.as_str()).copied()?;
                Some((name, length))
            })
            .collect()
    };

    let mut summary = ConversionSummary::default();
    let mut writers = Vec::new();
    for path in config.output_paths() {
        let mut writer = VcfWriter::create(&path, config.out_just_gt)?;
        writer.write_header(&config.sample_name, &header_contigs)?;
        writers.push((path, writer));
    }

    for (contig, result) in results {
        match result {
            Ok(outputs) => {
                for ((_, writer), records) in writers.iter_mut().zip(outputs.iter()) {
                    for record in records {
                        writer.write_record(&contig, record)?;
                    }
                }
            }
            Err(e) => {
                error!("Skipping contig {contig}: {e}");
                summary.failures.push((contig, e));
            }
        }
    }

    for (path, writer) in writers {
        let records = writer.records_written();
        writer.finish()?;
        info!("Wrote {records} records to {}", path.display());

        let compressed = if config.compress {
            match vcf::bgzip(&path) {
                Ok(compressed) => {
                    if let Err(e) = vcf::index(&compressed) {
                        warn!("{e}");
                        summary.warnings.push(e);
                    }
                    Some(compressed)
                }
                Err(e) => {
                    warn!("{e}");
                    summary.warnings.push(e);
                    None
                }
            }
        } else {
            None
        };

        summary.outputs.push(OutputSummary {
            path,
            compressed,
            records,
        });
    }

    Ok(summary)
}
