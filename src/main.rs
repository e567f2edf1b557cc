use clap::Parser;
use log::{error, info, warn};
use maf2gvcf::config::{ConvertConfig, OutputType};
use maf2gvcf::convert::{convert, CancelToken};
use rayon::ThreadPoolBuilder;
use std::io;
use std::num::NonZeroUsize;

/// Tools for turning whole-genome alignments into variant calls.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Convert a MAF file of assembly-to-reference alignments into a GVCF
    MafToGvcf {
        /// Path to the reference FASTA the MAF reference rows refer to
        #[clap(long, value_parser)]
        reference_file: String,

        /// Path to the MAF file (plain or BGZF-compressed)
        #[clap(long, value_parser)]
        maf_file: String,

        /// Output GVCF path. With --two-gvcfs, `_1`/`_2` is inserted before the extension.
        #[clap(short = 'o', long, value_parser)]
        output_file: String,

        /// Sample name written in the header
        #[clap(long, value_parser)]
        sample_name: String,

        /// Fill reference positions without alignment with reference blocks
        #[clap(short = 'f', long, action)]
        fill_gaps: bool,

        /// Write one GVCF per haplotype of a diploid alignment
        #[clap(long, action)]
        two_gvcfs: bool,

        /// Write only the GT format field
        #[clap(long, action)]
        out_just_gt: bool,

        /// Write deletions longer than --max-deletion-size as <DEL>
        #[clap(long, action)]
        del_as_symbolic: bool,

        /// Longest deletion written with explicit alleles when --del-as-symbolic is set
        #[clap(long, value_parser, default_value_t = 0)]
        max_deletion_size: i64,

        /// Output type: gvcf (variants and reference blocks) or vcf (variants only)
        #[clap(long, value_parser, default_value = "gvcf")]
        output_type: String,

        /// Skip BGZF compression and indexing of the output
        #[clap(long, action)]
        compress_off: bool,

        /// Correct reverse-strand coordinates of MAF files written by Anchorwave before 1.2.3
        #[clap(long, action)]
        anchorwave_legacy: bool,

        /// Number of threads for parallel processing.
        #[clap(short = 't', long = "threads", value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
        num_threads: NonZeroUsize,

        /// Verbosity level (0 = error, 1 = info, 2 = debug)
        #[clap(short, long, default_value = "0")]
        verbose: u8,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::MafToGvcf {
            reference_file,
            maf_file,
            output_file,
            sample_name,
            fill_gaps,
            two_gvcfs,
            out_just_gt,
            del_as_symbolic,
            max_deletion_size,
            output_type,
            compress_off,
            anchorwave_legacy,
            num_threads,
            verbose,
        } => {
            initialize(verbose, num_threads)?;

            let mut config =
                ConvertConfig::new(&reference_file, &maf_file, &output_file, &sample_name);
            config.fill_gaps = fill_gaps;
            config.two_gvcfs = two_gvcfs;
            config.out_just_gt = out_just_gt;
            config.del_as_symbolic = del_as_symbolic;
            config.max_deletion_size = max_deletion_size;
            config.output_type = output_type.parse::<OutputType>()?;
            config.compress = !compress_off;
            config.anchorwave_legacy = anchorwave_legacy;
            config.threads = num_threads;
            log_options(&config);

            if !del_as_symbolic && max_deletion_size > 0 {
                warn!("--max-deletion-size is ignored without --del-as-symbolic");
            }

            let summary = convert(&config, &CancelToken::new())?;
            for output in &summary.outputs {
                match &output.compressed {
                    Some(compressed) => info!(
                        "{}: {} records (compressed to {})",
                        output.path.display(),
                        output.records,
                        compressed.display()
                    ),
                    None => info!("{}: {} records", output.path.display(), output.records),
                }
            }
            if let Err(e) = summary.into_result() {
                error!("Conversion finished with failed contigs");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Initialize logging and the global thread pool
fn initialize(verbose: u8, num_threads: NonZeroUsize) -> io::Result<()> {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    ThreadPoolBuilder::new()
        .num_threads(num_threads.into())
        .build_global()
        .map_err(|e| io::Error::other(format!("Failed to build thread pool: {e}")))
}

fn log_options(config: &ConvertConfig) {
    info!("maf-to-gvcf options:");
    info!("  reference-file = {}", config.reference_file.display());
    info!("  maf-file = {}", config.maf_file.display());
    info!("  output-file = {}", config.output_file.display());
    info!("  sample-name = {}", config.sample_name);
    info!("  fill-gaps = {}", config.fill_gaps);
    info!("  two-gvcfs = {}", config.two_gvcfs);
    info!("  out-just-gt = {}", config.out_just_gt);
    info!("  del-as-symbolic = {}", config.del_as_symbolic);
    info!("  max-deletion-size = {}", config.max_deletion_size);
    info!("  output-type = {}", config.output_type);
    info!("  compress = {}", config.compress);
    info!("  anchorwave-legacy = {}", config.anchorwave_legacy);
    info!("  threads = {}", config.threads);
}
