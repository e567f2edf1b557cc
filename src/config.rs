use crate::classify::ClassifyOptions;
use crate::error::ConvertError;
use crate::merge::MergeOptions;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which records an output carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Variants and reference blocks
    #[default]
    Gvcf,
    /// Variants only
    Vcf,
}

impl FromStr for OutputType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gvcf" => Ok(OutputType::Gvcf),
            "vcf" => Ok(OutputType::Vcf),
            other => Err(ConvertError::configuration(format!(
                "Unknown output type '{other}', expected 'gvcf' or 'vcf'"
            ))),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::Gvcf => write!(f, "gvcf"),
            OutputType::Vcf => write!(f, "vcf"),
        }
    }
}

/// Settings of one conversion run
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub reference_file: PathBuf,
    pub maf_file: PathBuf,
    pub output_file: PathBuf,
    pub sample_name: String,
    pub fill_gaps: bool,
    /// Write one output per haplotype
    pub two_gvcfs: bool,
    /// Write only the GT format field
    pub out_just_gt: bool,
    pub del_as_symbolic: bool,
    /// Deletions longer than this become `<DEL>` when `del_as_symbolic` is set
    pub max_deletion_size: i64,
    pub output_type: OutputType,
    pub compress: bool,
    /// Correct reverse-strand coordinates of MAF files from Anchorwave before 1.2.3
    pub anchorwave_legacy: bool,
    pub threads: NonZeroUsize,
}

impl ConvertConfig {
    pub fn new<R, M, O>(reference_file: R, maf_file: M, output_file: O, sample_name: &str) -> Self
    where
        R: Into<PathBuf>,
        M: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        ConvertConfig {
            reference_file: reference_file.into(),
            maf_file: maf_file.into(),
            output_file: output_file.into(),
            sample_name: sample_name.to_string(),
            fill_gaps: false,
            two_gvcfs: false,
            out_just_gt: false,
            del_as_symbolic: false,
            max_deletion_size: 0,
            output_type: OutputType::Gvcf,
            compress: true,
            anchorwave_legacy: false,
            threads: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Reject settings that cannot produce a valid run. Called before any input is read.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.sample_name.trim().is_empty() {
            return Err(ConvertError::configuration("Sample name must not be empty"));
        }
        if self.max_deletion_size < 0 {
            return Err(ConvertError::configuration(format!(
                "Maximum deletion size must be >= 0, got {}",
                self.max_deletion_size
            )));
        }
        for (label, path) in [
            ("Reference file", &self.reference_file),
            ("MAF file", &self.maf_file),
        ] {
            if !path.is_file() {
                return Err(ConvertError::configuration(format!(
                    "{label} '{}' does not exist",
                    path.display()
                )));
            }
        }
        for output in self.output_paths() {
            if output == self.reference_file || output == self.maf_file {
                return Err(ConvertError::configuration(format!(
                    "Output file '{}' would overwrite an input",
                    output.display()
                )));
            }
        }
        Ok(())
    }

    /// Paths written by the run: one, or one per haplotype in diploid mode
    pub fn output_paths(&self) -> Vec<PathBuf> {
        if self.two_gvcfs {
            vec![
                haplotype_path(&self.output_file, 1),
                haplotype_path(&self.output_file, 2),
            ]
        } else {
            vec![self.output_file.clone()]
        }
    }

    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            max_deletion_size: self
                .del_as_symbolic
                .then_some(self.max_deletion_size.max(0) as usize),
            legacy_coordinates: self.anchorwave_legacy,
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            fill_gaps: self.fill_gaps,
        }
    }
}

/// Insert `_<haplotype>` before the first extension of the file name
fn haplotype_path(path: &Path, haplotype: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match name.find('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], haplotype, &name[dot..]),
        _ => format!("{name}_{haplotype}"),
    };
    path.with_file_name(renamed)
}
