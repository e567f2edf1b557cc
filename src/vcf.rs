//! VCF/GVCF output: header, record lines and the optional compress-and-index step.

use crate::error::ConvertError;
use crate::record::MergedRecord;
use log::{debug, info};
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

const HEADER_DEFINITIONS: &[&str] = &[
    "##ALT=<ID=NON_REF,Description=\"Represents any possible alternative allele at this location\">",
    "##ALT=<ID=DEL,Description=\"Deletion relative to the reference\">",
    "##FORMAT=<ID=AD,Number=3,Type=Integer,Description=\"Allelic depths for the ref and alt alleles in the order listed\">",
    "##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read Depth (only filtered reads used for calling)\">",
    "##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype Quality\">",
    "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">",
    "##FORMAT=<ID=PL,Number=3,Type=Integer,Description=\"Normalized, Phred-scaled likelihoods for genotypes as defined in the VCF specification\">",
    "##INFO=<ID=AF,Number=3,Type=Integer,Description=\"Allele Frequency\">",
    "##INFO=<ID=ASM_Chr,Number=1,Type=String,Description=\"Assembly chromosome\">",
    "##INFO=<ID=ASM_End,Number=1,Type=Integer,Description=\"Assembly end position\">",
    "##INFO=<ID=ASM_Start,Number=1,Type=Integer,Description=\"Assembly start position\">",
    "##INFO=<ID=ASM_Strand,Number=1,Type=String,Description=\"Assembly strand\">",
    "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">",
    "##INFO=<ID=END,Number=1,Type=Integer,Description=\"Stop position of the interval\">",
    "##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of Samples With Data\">",
];

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// INFO column of a record, keys in lexical order
fn info_field(record: &MergedRecord) -> String {
    let mut fields = Vec::with_capacity(5);
    if let Some(provenance) = &record.provenance {
        fields.push(format!("ASM_Chr={}", provenance.contig));
        fields.push(format!("ASM_End={}", provenance.end));
        fields.push(format!("ASM_Start={}", provenance.start));
        fields.push(format!("ASM_Strand={}", provenance.strand));
    }
    if let Some(end) = record.end_info() {
        fields.push(format!("END={end}"));
    }
    if fields.is_empty() {
        ".".to_string()
    } else {
        fields.join(";")
    }
}

/// One tab-separated data line, without the trailing newline
pub fn format_record(contig: &str, record: &MergedRecord, genotype_only: bool) -> String {
    let alt = record.alt_alleles().join(",");
    let (format, sample) = if genotype_only {
        ("GT", record.genotype().as_str().to_string())
    } else {
        (
            "GT:AD:DP:PL",
            format!(
                "{}:{}:{}:{}",
                record.genotype().as_str(),
                join(&record.allelic_depths()),
                record.read_depth(),
                join(&record.likelihoods())
            ),
        )
    };
    format!(
        "{}\t{}\t.\t{}\t{}\t.\t.\t{}\t{}\t{}",
        contig,
        record.start,
        String::from_utf8_lossy(&record.ref_allele),
        alt,
        info_field(record),
        format,
        sample
    )
}

/// Streaming writer for one output file
pub struct VcfWriter<W: Write> {
    inner: W,
    genotype_only: bool,
    records_written: usize,
}

impl VcfWriter<BufWriter<File>> {
    pub fn create(path: &Path, genotype_only: bool) -> io::Result<Self> {
        let file = File::create(path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("Failed to create output file '{}': {e}", path.display()),
            )
        })?;
        Ok(VcfWriter::new(BufWriter::new(file), genotype_only))
    }
}

impl<W: Write> VcfWriter<W> {
    pub fn new(inner: W, genotype_only: bool) -> Self {
        VcfWriter {
            inner,
            genotype_only,
            records_written: 0,
        }
    }

    /// `contigs` are written as given, callers pass them in output order
    pub fn write_header(&mut self, sample: &str, contigs: &[(String, u64)]) -> io::Result<()> {
        writeln!(self.inner, "##fileformat=VCFv4.2")?;
        for line in HEADER_DEFINITIONS {
            writeln!(self.inner, "{line}")?;
        }
        for (name, length) in contigs {
            writeln!(self.inner, "##contig=<ID={name},length={length}>")?;
        }
        writeln!(
            self.inner,
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{sample}"
        )
    }

    pub fn write_record(&mut self, contig: &str, record: &MergedRecord) -> io::Result<()> {
        writeln!(
            self.inner,
            "{}",
            format_record(contig, record, self.genotype_only)
        )?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// BGZF-compress `path` into `<path>.gz`. The plain file is left in place.
pub fn bgzip(path: &Path) -> Result<PathBuf, ConvertError> {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(".gz");
    let compressed = PathBuf::from(compressed);

    let result = (|| -> io::Result<()> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut writer = bgzf::io::Writer::new(File::create(&compressed)?);
        io::copy(&mut reader, &mut writer)?;
        writer.finish()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            debug!("Compressed {} to {}", path.display(), compressed.display());
            Ok(compressed)
        }
        Err(e) => Err(ConvertError::ExternalTool(format!(
            "Failed to compress '{}': {e}",
            path.display()
        ))),
    }
}

/// Build a CSI index for a BGZF-compressed VCF with `bcftools index -c`
pub fn index(compressed: &Path) -> Result<(), ConvertError> {
    let output = Command::new("bcftools")
        .arg("index")
        .arg("-c")
        .arg("-f")
        .arg(compressed)
        .output()
        .map_err(|e| {
            ConvertError::ExternalTool(format!(
                "Failed to run bcftools to index '{}': {e}",
                compressed.display()
            ))
        })?;
    if !output.status.success() {
        return Err(ConvertError::ExternalTool(format!(
            "bcftools index failed for '{}' ({}): {}",
            compressed.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    info!("Indexed {}", compressed.display());
    Ok(())
}
