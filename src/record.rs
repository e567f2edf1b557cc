use crate::alignment_block::Strand;
use std::sync::Arc;

/// Symbolic allele standing for any allele not listed
pub const NON_REF: &str = "<NON_REF>";

/// Placeholder depth of a single confident observation
pub const PLACEHOLDER_DEPTH: u32 = 30;

/// Placeholder phred-scaled likelihood of the genotypes that were not called
pub const PLACEHOLDER_PL: u32 = 90;

/// Where the assembly sequence behind a record comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyProvenance {
    pub contig: Arc<str>,
    /// Assembly coordinate aligned to the record's first reference position
    pub start: u64,
    /// Assembly coordinate aligned to the record's last reference position
    pub end: u64,
    pub strand: Strand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype {
    HomRef,
    HomAlt,
}

impl Genotype {
    /// Haploid GT value
    pub fn as_str(&self) -> &'static str {
        match self {
            Genotype::HomRef => "0",
            Genotype::HomAlt => "1",
        }
    }
}

/// One output row of a contig
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// 1-based position
    pub start: u64,
    /// Last reference position covered
    pub end: u64,
    pub ref_allele: Vec<u8>,
    /// `None` for reference blocks
    pub alt_allele: Option<Vec<u8>>,
    pub symbolic: bool,
    /// `None` for reference blocks filled in where no alignment covers the reference
    pub provenance: Option<AssemblyProvenance>,
}

impl MergedRecord {
    pub fn reference_block(
        start: u64,
        end: u64,
        ref_base: u8,
        provenance: Option<AssemblyProvenance>,
    ) -> Self {
        MergedRecord {
            start,
            end,
            ref_allele: vec![ref_base],
            alt_allele: None,
            symbolic: false,
            provenance,
        }
    }

    pub fn is_reference_block(&self) -> bool {
        self.alt_allele.is_none()
    }

    pub fn genotype(&self) -> Genotype {
        if self.is_reference_block() {
            Genotype::HomRef
        } else {
            Genotype::HomAlt
        }
    }

    /// ALT column entries; the last one is always [`NON_REF`]
    pub fn alt_alleles(&self) -> Vec<String> {
        let mut alleles = Vec::with_capacity(2);
        if let Some(alt) = &self.alt_allele {
            alleles.push(String::from_utf8_lossy(alt).into_owned());
        }
        alleles.push(NON_REF.to_string());
        alleles
    }

    /// Value of the END info field, written for reference blocks and symbolic alleles
    pub fn end_info(&self) -> Option<u64> {
        (self.is_reference_block() || self.symbolic).then_some(self.end)
    }

    /// Allelic depths in ALT order, all weight on the called allele
    pub fn allelic_depths(&self) -> Vec<u32> {
        match self.genotype() {
            Genotype::HomRef => vec![PLACEHOLDER_DEPTH, 0],
            Genotype::HomAlt => vec![0, PLACEHOLDER_DEPTH, 0],
        }
    }

    pub fn read_depth(&self) -> u32 {
        PLACEHOLDER_DEPTH
    }

    pub fn likelihoods(&self) -> [u32; 3] {
        match self.genotype() {
            Genotype::HomRef => [0, PLACEHOLDER_PL, PLACEHOLDER_PL],
            Genotype::HomAlt => [PLACEHOLDER_PL, 0, PLACEHOLDER_PL],
        }
    }
}
