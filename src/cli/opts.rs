use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parse a `usize` that must be at least 1.
fn parse_min1_usize(s: &str) -> Result<usize, String> {
    let v: usize = s.parse().map_err(|e| format!("{}", e))?;
    if v >= 1 {
        Ok(v)
    } else {
        Err(format!("{} is not in 1..", v))
    }
}

/// Parse a probability strictly inside (0, 1), e.g. a false-positive
/// target.
fn parse_probability(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if v > 0.0 && v < 1.0 {
        Ok(v)
    } else {
        Err(format!("{} is not in (0, 1)", v))
    }
}

/// Parse a fraction in [0, 1], e.g. a coverage or identity threshold.
fn parse_fraction(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{} is not in [0, 1]", v))
    }
}

/// Parse a strictly positive float, e.g. a box side length.
fn parse_positive(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(format!("{} must be positive", v))
    }
}

/// Command-line options for the grid-cover search tool
#[derive(Parser)]
#[command(
    name = "ramgrid",
    about = "Approximate nucleotide-sequence search over grid-indexed k-mer embeddings",
    long_about = "Approximate nucleotide-sequence search over grid-indexed k-mer embeddings.


EXAMPLES:
    $ ramgrid build rotation -k 31 -o rotation.json kmer_table.csv
    $ ramgrid build grid -r 0.02 -d 8 -o cover.sqlite rotation.json kmer_table.csv
    $ ramgrid search run-server -p 5432 cover.sqlite
    $ ramgrid search seq -p 5432 AATACGTCCGGAGTATCGACGCACACATGGT
    ",
    version = "0.1.0"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build rotation artifacts and grid databases
    #[command(subcommand)]
    Build(BuildCmd),
    /// Query a grid database, directly or through a server
    #[command(subcommand)]
    Search(SearchCmd),
    /// Inspect a grid database
    #[command(subcommand)]
    Stats(StatsCmd),
    /// Distance calibration helpers
    #[command(subcommand)]
    Dists(DistsCmd),
}

#[derive(Subcommand)]
pub enum BuildCmd {
    /// Compute a rotation artifact (center, scale, PCA rotation) from a
    /// k-mer table
    Rotation {
        /// K-mer length [integer]
        #[clap(short = 'k', long, default_value = "31", value_parser = parse_min1_usize, help_heading = "Core")]
        kmer_len: usize,
        /// Number of k-mers to sample from the table [integer]
        #[clap(short = 'n', long, default_value = "1000", value_parser = parse_min1_usize, help_heading = "Core")]
        num_kmers: usize,
        /// Output artifact path [path]
        #[clap(short = 'o', long, required = true, help_heading = "Core")]
        outfile: PathBuf,
        /// K-mer table (one k-mer per line, first comma field)
        kmer_table: PathBuf,
    },
    /// Build a grid-cover database from a k-mer table
    Grid {
        /// Box side length in R-space [float]
        #[clap(short = 'r', long, default_value = "0.02", value_parser = parse_positive, help_heading = "Core")]
        radius: f64,
        /// Embedding dimensions [integer]
        #[clap(short = 'd', long, default_value = "8", value_parser = parse_min1_usize, help_heading = "Core")]
        dimension: usize,
        /// Number of k-mers to add, 0 for all [integer]
        #[clap(short = 'n', long, default_value = "0", help_heading = "Slicing")]
        num_kmers: usize,
        /// Records to skip before adding [integer]
        #[clap(short = 's', long, default_value = "0", help_heading = "Slicing")]
        start_offset: usize,
        /// Output database [path]
        #[clap(short = 'o', long, default_value = "ramgrid_cover.sqlite", help_heading = "Core")]
        outfile: PathBuf,
        /// Load the k-mer table into RAM before processing [flag]
        ///
        /// Throughput hint only; has no semantic effect.
        #[clap(long, help_heading = "Core")]
        preload: bool,
        /// Rotation artifact [path]
        rotation: PathBuf,
        /// K-mer table [path]
        kmer_table: PathBuf,
    },
    /// Fold other grid databases into the first
    GridMerge {
        /// Database that receives the merge [path]
        final_db: PathBuf,
        /// Databases to fold in [paths]
        other_dbs: Vec<PathBuf>,
    },
    /// Build a contig database from FASTA files
    Contig {
        /// Box side length in R-space [float]
        #[clap(short = 'r', long, default_value = "0.01", value_parser = parse_positive, help_heading = "Core")]
        radius: f64,
        /// Embedding dimensions [integer]
        #[clap(short = 'd', long, default_value = "8", value_parser = parse_min1_usize, help_heading = "Core")]
        dimension: usize,
        /// Index a k-mer every this many bases [integer]
        #[clap(short = 'g', long, default_value = "1", value_parser = parse_min1_usize, help_heading = "Core")]
        gap: usize,
        /// Output database [path]
        #[clap(short = 'o', long, default_value = "ramgrid_contig_cover.sqlite", help_heading = "Core")]
        outfile: PathBuf,
        /// Rotation artifact [path]
        rotation: PathBuf,
        /// File with one FASTA path per line [path]
        fasta_list: PathBuf,
    },
    /// Build and store a bloom grid for every cluster
    Blooms {
        /// Sub-k-mer length [integer]
        #[clap(short = 'k', long, default_value = "7", value_parser = parse_min1_usize, help_heading = "Core")]
        sub_k: usize,
        /// False-positive target [float]
        #[clap(short = 'f', long, default_value = "0.01", value_parser = parse_probability, help_heading = "Core")]
        target_fp: f64,
        /// Grid database [path]
        grid_db: PathBuf,
    },
}

#[derive(Args)]
pub struct ServerArgs {
    /// Server port [integer]
    #[clap(short = 'p', long, default_value = "5432", help_heading = "Server")]
    pub port: u16,
}

#[derive(Subcommand)]
pub enum SearchCmd {
    /// Search k-mers through a running server
    Seq {
        #[clap(flatten)]
        server: ServerArgs,
        /// Coarse search radius in R-space [float]
        #[clap(short = 'r', long, default_value = "1.0", help_heading = "Search")]
        radius: f64,
        /// Inner radius (edit-distance units or normalized) [float]
        #[clap(short = 'i', long, default_value = "1.0", help_heading = "Search")]
        inner_radius: f64,
        /// Inner metric
        #[clap(short = 'm', long, default_value = "needle", help_heading = "Search")]
        inner_metric: String,
        /// Coarse mode returns centroid ids only [flag]
        #[clap(short = 'c', long, help_heading = "Search")]
        coarse: bool,
        /// K-mers to search
        kmers: Vec<String>,
    },
    /// Seed-and-extend a long query against a contig database
    Contig {
        #[clap(flatten)]
        server: ServerArgs,
        /// Coarse search radius in R-space [float]
        #[clap(short = 'r', long, default_value = "0.0", help_heading = "Search")]
        radius: f64,
        /// Minimum fraction of query k-mers covered [float]
        #[clap(short = 'f', long, default_value = "0.5", value_parser = parse_fraction, help_heading = "Search")]
        kmer_fraction: f64,
        /// Minimum aligned identity [float]
        #[clap(short = 'i', long, default_value = "0.85", value_parser = parse_fraction, help_heading = "Search")]
        seq_identity: f64,
        /// Query sequence
        query: String,
    },
    /// Run the search server in the foreground
    RunServer {
        #[clap(flatten)]
        server: ServerArgs,
        /// Grid database [path]
        grid_db: PathBuf,
    },
    /// Ask a running server to shut down
    ShutdownServer {
        #[clap(flatten)]
        server: ServerArgs,
    },
    /// Search every query in a file through a running server
    File {
        #[clap(flatten)]
        server: ServerArgs,
        /// Coarse search radius in R-space [float]
        #[clap(short = 'r', long, default_value = "1.0", help_heading = "Search")]
        radius: f64,
        /// Inner radius [float]
        #[clap(short = 'i', long, default_value = "1.0", help_heading = "Search")]
        inner_radius: f64,
        /// Inner metric
        #[clap(short = 'm', long, default_value = "needle", help_heading = "Search")]
        inner_metric: String,
        /// Output file for results [path]
        outfile: PathBuf,
        /// Query file (k-mer table format) [path]
        seqfile: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum StatsCmd {
    /// Print centroid/k-mer counts and grid parameters
    CoverStats {
        /// Grid database [path]
        grid_db: PathBuf,
    },
    /// Print stored k-mers, optionally with their cluster ids
    DumpKmers {
        /// Prefix each k-mer with its centroid id [flag]
        #[clap(short = 'c', long, help_heading = "Output")]
        cluster_ids: bool,
        /// Grid database [path]
        grid_db: PathBuf,
    },
    /// Print centroid centers as CSV
    DumpCentroids {
        /// Grid database [path]
        grid_db: PathBuf,
    },
    /// Print per-cluster member counts as CSV
    ClusterSizes {
        /// Grid database [path]
        grid_db: PathBuf,
    },
    /// Print stored contig blocks, optionally with their sequences
    DumpContigs {
        /// Include the decoded sequence [flag]
        #[clap(short = 's', long, help_heading = "Output")]
        seq: bool,
        /// Contig database [path]
        grid_db: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum DistsCmd {
    /// Pairwise edit distances within a k-mer table (CSV to stdout)
    Pairwise {
        /// Number of k-mers to compare [integer]
        #[clap(short = 'n', long, default_value = "1000", value_parser = parse_min1_usize, help_heading = "Core")]
        num_kmers: usize,
        /// Normalize by max length [flag]
        #[clap(long, help_heading = "Core")]
        normalize: bool,
        /// K-mer table [path]
        kmer_table: PathBuf,
    },
    /// Every calibrated metric for every pair, one CSV row per pair
    AllMetrics {
        /// K-mer length [integer]
        #[clap(short = 'k', long, default_value = "31", value_parser = parse_min1_usize, help_heading = "Core")]
        kmer_len: usize,
        /// Number of k-mers to compare [integer]
        #[clap(short = 'n', long, default_value = "1000", value_parser = parse_min1_usize, help_heading = "Core")]
        num_kmers: usize,
        /// K-mer table [path]
        kmer_table: PathBuf,
    },
    /// Distance from one query to every k-mer in a database
    Linear {
        /// Inner metric
        #[clap(short = 'm', long, default_value = "needle", help_heading = "Core")]
        metric: String,
        /// Query k-mer
        query: String,
        /// Grid database [path]
        grid_db: PathBuf,
    },
}
