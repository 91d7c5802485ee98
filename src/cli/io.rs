use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One FASTA record: `(contig_name, sequence_bytes)`.
#[derive(Debug)]
pub struct FastaRecord {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Read a FASTA file into memory. Header lines keep only the first
/// whitespace-separated token; sequence case is preserved (the codec
/// accepts both).
pub fn read_fasta(path: &Path) -> Result<Vec<FastaRecord>> {
    let f = File::open(path).context(format!("Opening FASTA {:?}", path))?;
    let reader = BufReader::new(f);
    let mut records: Vec<FastaRecord> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let name = header
                .split_whitespace()
                .next()
                .unwrap_or("unnamed")
                .to_string();
            records.push(FastaRecord {
                name,
                seq: Vec::new(),
            });
        } else {
            match records.last_mut() {
                Some(rec) => rec.seq.extend_from_slice(line.as_bytes()),
                // Sequence before any header: malformed, skip the line
                None => continue,
            }
        }
    }
    Ok(records)
}

/// Read a k-mer table: one k-mer per line, first comma-separated field.
/// Blank lines and `#` comments are skipped.
pub fn read_kmer_table(path: &Path) -> Result<Vec<String>> {
    let f = File::open(path).context(format!("Opening k-mer table {:?}", path))?;
    let reader = BufReader::new(f);
    let mut kmers = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(kmer) = line.split(',').next() {
            kmers.push(kmer.trim().to_string());
        }
    }
    Ok(kmers)
}

/// Read a list of file paths, one per line.
pub fn read_path_list(path: &Path) -> Result<Vec<std::path::PathBuf>> {
    let text =
        std::fs::read_to_string(path).context(format!("Reading path list {:?}", path))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(std::path::PathBuf::from)
        .collect())
}
