// lib.rs
pub mod alignment_block;
pub mod call;
pub mod classify;
pub mod config;
pub mod contig_order;
pub mod convert;
pub mod error;
pub mod faidx;
pub mod maf;
pub mod merge;
pub mod phase;
pub mod record;
pub mod sequence_index;
pub mod vcf;
