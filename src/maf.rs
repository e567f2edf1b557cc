//! MAF (Multiple Alignment Format) parsing
//!
//! This module reads alignment blocks from MAF files produced by whole-genome aligners
//! (e.g. Anchorwave). Supports both uncompressed and BGZF-compressed files.

use crate::alignment_block::{AlignmentBlock, Strand, GAP};
use crate::error::ConvertError;
use log::debug;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One `s` line of a MAF block
#[derive(Debug, Clone, PartialEq)]
pub struct MafRow {
    pub contig: String,
    /// 0-based start, relative to `strand`
    pub start: u64,
    /// Number of non-gap characters in `text`
    pub size: u64,
    pub strand: Strand,
    pub src_size: u64,
    pub text: Vec<u8>,
}

/// A MAF block: a reference row followed by one or more assembly rows
#[derive(Debug, Clone, PartialEq)]
pub struct MafBlock {
    pub score: Option<f64>,
    pub reference: MafRow,
    pub assemblies: Vec<MafRow>,
    /// Line of the `a` line that opened the block
    pub line: usize,
    /// Index of the block in the file
    pub order: usize,
}

impl MafBlock {
    /// Project the block onto the reference row and one assembly row.
    ///
    /// Columns that are gaps in both rows are dropped. They appear when other rows of a
    /// multiple alignment carry bases there and say nothing about this pair.
    pub fn pairwise(&self, assembly: usize, phase: Option<u8>) -> Result<AlignmentBlock, ConvertError> {
        let asm = self.assemblies.get(assembly).ok_or_else(|| {
            ConvertError::format_at(
                format!("Block has no assembly row {}", assembly + 1),
                self.line,
            )
        })?;
        let (ref_track, asm_track) = if self.reference.text.len() == asm.text.len() {
            self.reference
                .text
                .iter()
                .zip(asm.text.iter())
                .filter(|(&r, &a)| !(r == GAP && a == GAP))
                .map(|(&r, &a)| (r, a))
                .unzip()
        } else {
            // Left for the classifier to reject with the offending lengths
            (self.reference.text.clone(), asm.text.clone())
        };

        Ok(AlignmentBlock {
            ref_contig: self.reference.contig.clone(),
            ref_start: self.reference.start + 1,
            ref_strand: self.reference.strand,
            asm_contig: Arc::from(asm.contig.as_str()),
            asm_start: asm.start,
            asm_src_size: asm.src_size,
            asm_strand: asm.strand,
            ref_track,
            asm_track,
            phase,
            order: self.order,
        })
    }
}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// A MAF file on disk. Every call to [`MafFile::blocks`] starts a fresh pass.
#[derive(Debug, Clone)]
pub struct MafFile {
    path: PathBuf,
    threads: NonZeroUsize,
}

impl MafFile {
    pub fn open<P: AsRef<Path>>(path: P, threads: NonZeroUsize) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("MAF file '{}' not found", path.display()),
            )));
        }
        Ok(MafFile { path, threads })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> Result<MafReader<BufReader<Box<dyn Read>>>, ConvertError> {
        let name = self.path.to_string_lossy();
        let mut file = File::open(&self.path)?;
        let reader: Box<dyn Read> = if [".gz", ".bgz"].iter().any(|e| name.ends_with(e)) {
            if !is_bgzf(&mut file)? {
                return Err(ConvertError::format(format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.maf.gz",
                    name, name
                )));
            }
            debug!("Reading {} through a BGZF reader", name);
            Box::new(bgzf::io::MultithreadedReader::with_worker_count(
                self.threads,
                file,
            ))
        } else {
            Box::new(file)
        };
        Ok(MafReader::new(BufReader::new(reader)))
    }
}

/// Lazy block-by-block MAF parser
pub struct MafReader<R> {
    reader: R,
    buf: String,
    line_number: usize,
    next_order: usize,
    /// `a` line read while finishing the previous block
    pending_header: Option<(usize, Option<f64>)>,
    done: bool,
}

impl<R: BufRead> MafReader<R> {
    pub fn new(reader: R) -> Self {
        MafReader {
            reader,
            buf: String::new(),
            line_number: 0,
            next_order: 0,
            pending_header: None,
            done: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<&str>, ConvertError> {
        self.buf.clear();
        let bytes = self.reader.read_line(&mut self.buf)?;
        if bytes == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(self.buf.trim_end_matches(&['\n', '\r'][..])))
    }

    fn read_block(&mut self) -> Result<Option<MafBlock>, ConvertError> {
        // Find the `a` line opening the next block
        let (line, score) = match self.pending_header.take() {
            Some(header) => header,
            None => loop {
                let line_number = self.line_number + 1;
                let Some(line) = self.next_line()? else {
                    return Ok(None);
                };
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                match trimmed.split_whitespace().next() {
                    Some("a") => break (line_number, parse_score(trimmed)),
                    Some("s") => {
                        return Err(ConvertError::format_at(
                            "Sequence line outside of an alignment block",
                            line_number,
                        ))
                    }
                    _ => continue,
                }
            },
        };

        let mut rows = Vec::new();
        loop {
            let line_number = self.line_number + 1;
            let Some(line) = self.next_line()? else {
                break;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            match trimmed.split_whitespace().next() {
                Some("s") => rows.push(parse_row(trimmed, line_number)?),
                Some("a") => {
                    let score = parse_score(trimmed);
                    self.pending_header = Some((line_number, score));
                    break;
                }
                // i, e and q lines carry nothing the conversion needs
                _ => continue,
            }
        }

        if rows.is_empty() {
            return Err(ConvertError::format_at("Alignment block has no sequence lines", line));
        }
        let reference = rows.remove(0);
        if rows.is_empty() {
            return Err(ConvertError::format_at(
                format!("Alignment block for {} has no assembly line", reference.contig),
                line,
            ));
        }

        let order = self.next_order;
        self.next_order += 1;
        Ok(Some(MafBlock {
            score,
            reference,
            assemblies: rows,
            line,
            order,
        }))
    }
}

impl<R: BufRead> Iterator for MafReader<R> {
    type Item = Result<MafBlock, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_score(line: &str) -> Option<f64> {
    line.split_whitespace()
        .filter_map(|field| field.strip_prefix("score="))
        .find_map(|value| value.parse::<f64>().ok())
}

/// Parse an `s` line: `s src start size strand srcSize text`
fn parse_row(line: &str, line_number: usize) -> Result<MafRow, ConvertError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(ConvertError::format_at(
            "Not enough fields in sequence line",
            line_number,
        ));
    }

    let parse_field = |value: &str, name: &str| {
        value.parse::<u64>().map_err(|e| {
            ConvertError::format_at(format!("Invalid {} '{}': {}", name, value, e), line_number)
        })
    };
    let start = parse_field(fields[2], "start")?;
    let size = parse_field(fields[3], "size")?;
    let strand = fields[4]
        .chars()
        .next()
        .and_then(Strand::from_char)
        .filter(|_| fields[4].len() == 1)
        .ok_or_else(|| {
            ConvertError::format_at(
                format!("Expected '+' or '-' for strand, found '{}'", fields[4]),
                line_number,
            )
        })?;
    let src_size = parse_field(fields[5], "source size")?;

    // The alphabet is checked per block by the classifier
    let mut text = fields[6].as_bytes().to_vec();
    text.make_ascii_uppercase();
    // Some aligners write a stale size; coordinates are derived from start and text only
    let bases = text.iter().filter(|&&b| b != GAP).count() as u64;
    if bases != size {
        debug!(
            "Line {}: size field {} differs from the {} bases in the alignment text",
            line_number, size, bases
        );
    }

    Ok(MafRow {
        contig: fields[1].to_string(),
        start,
        size,
        strand,
        src_size,
        text,
    })
}
