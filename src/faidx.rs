use crate::sequence_index::ReferenceStore;
use rust_htslib::faidx;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::io;

// Per-thread open handle of the reference being read, reopened when another FASTA is fetched
thread_local! {
    static FAIDX_READER: RefCell<Option<(String, faidx::Reader)>> = RefCell::new(None);
}

fn open_reader<'a>(
    slot: &'a mut Option<(String, faidx::Reader)>,
    path: &str,
) -> io::Result<&'a faidx::Reader> {
    if slot.as_ref().map(|(open, _)| open.as_str()) != Some(path) {
        let reader = faidx::Reader::from_path(path)
            .map_err(|e| io::Error::other(format!("Failed to open FASTA file '{path}': {e}")))?;
        *slot = Some((path.to_string(), reader));
    }
    slot.as_ref()
        .map(|(_, reader)| reader)
        .ok_or_else(|| io::Error::other(format!("No FASTA reader open for '{path}'")))
}

/// Indexed reference FASTA. Contig names and lengths come from the `.fai` index, which is
/// created next to the FASTA when missing.
#[derive(Debug)]
pub struct FastaIndex {
    pub fasta_path: String,
    pub contig_names: Vec<String>,
    pub sequence_lengths: FxHashMap<String, u64>,
}

impl FastaIndex {
    pub fn build_from_file(fasta_path: &str) -> io::Result<Self> {
        let fai_path = format!("{fasta_path}.fai");

        let fai_content = match std::fs::read_to_string(&fai_path) {
            Ok(content) => content,
            Err(_) => {
                // Opening the FASTA with htslib writes the index
                match faidx::Reader::from_path(fasta_path) {
                    Ok(_) => std::fs::read_to_string(&fai_path)?,
                    Err(e) => {
                        return Err(io::Error::other(format!(
                            "Failed to create FASTA index for '{fasta_path}': {e}"
                        )));
                    }
                }
            }
        };

        let mut index = FastaIndex {
            fasta_path: fasta_path.to_string(),
            contig_names: Vec::new(),
            sequence_lengths: FxHashMap::default(),
        };

        // Parse the .fai file to get sequence names and lengths
        for line in fai_content.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 || fields[0].is_empty() {
                continue;
            }
            let length = fields[1].parse::<u64>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid length for '{}' in {fai_path}: {e}", fields[0]),
                )
            })?;
            if index
                .sequence_lengths
                .insert(fields[0].to_string(), length)
                .is_none()
            {
                index.contig_names.push(fields[0].to_string());
            }
        }

        Ok(index)
    }
}

impl ReferenceStore for FastaIndex {
    fn contigs(&self) -> Vec<(String, u64)> {
        self.contig_names
            .iter()
            .filter_map(|name| {
                let length = self.sequence_lengths.get(name).copied()?;
                Some((name.clone(), length))
            })
            .collect()
    }

    fn contig_length(&self, name: &str) -> Option<u64> {
        self.sequence_lengths.get(name).copied()
    }

    fn fetch_sequence(&self, seq_name: &str, start: u64, end: u64) -> io::Result<Vec<u8>> {
        if !self.sequence_lengths.contains_key(seq_name) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Sequence '{seq_name}' not found in {}", self.fasta_path),
            ));
        }
        if end <= start {
            return Ok(Vec::new());
        }

        FAIDX_READER.with(|slot| -> io::Result<Vec<u8>> {
            let mut slot = slot.borrow_mut();
            let reader = open_reader(&mut slot, &self.fasta_path)?;

            // fetch_seq expects a 0-based inclusive end coordinate
            match reader.fetch_seq(seq_name, start as usize, (end - 1) as usize) {
                Ok(seq) => {
                    let mut seq_vec = seq.to_vec();
                    unsafe { libc::free(seq.as_ptr() as *mut std::ffi::c_void) }; // Free up memory to avoid memory leak (bug https://github.com/rust-bio/rust-htslib/issues/401#issuecomment-1704290171)
                    seq_vec.make_ascii_uppercase();
                    Ok(seq_vec)
                }
                Err(e) => Err(io::Error::other(format!(
                    "Failed to fetch sequence for {seq_name}: {e}"
                ))),
            }
        })
    }
}
