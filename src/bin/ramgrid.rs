use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ramgrid::cli::io::{read_fasta, read_kmer_table, read_path_list};
use ramgrid::cli::opts::{BuildCmd, Cli, Command, DistsCmd, SearchCmd, StatsCmd};
use ramgrid::ramgrid::db::GridDb;
use ramgrid::ramgrid::dists::{needle_pairwise, DistanceFactory};
use ramgrid::ramgrid::grid::GridBuilder;
use ramgrid::ramgrid::kmer_codec::PackedKmer;
use ramgrid::ramgrid::linear::LinearSearcher;
use ramgrid::ramgrid::ramify::{RotatingRamifier, StatisticalRam};
use ramgrid::ramgrid::searcher::InnerMetric;
use ramgrid::ramgrid::server::{SearchClient, SearchServer};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::init();
    // Catch and handle errors so open storage handles unwind cleanly
    if let Err(e) = run() {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Build(cmd) => run_build(cmd),
        Command::Search(cmd) => run_search(cmd),
        Command::Stats(cmd) => run_stats(cmd),
        Command::Dists(cmd) => run_dists(cmd),
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("       {bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

fn run_build(cmd: BuildCmd) -> Result<()> {
    match cmd {
        BuildCmd::Rotation {
            kmer_len,
            num_kmers,
            outfile,
            kmer_table,
        } => {
            let kmers = read_kmer_table(&kmer_table)?;
            let mut stat_ram = StatisticalRam::new(kmer_len);
            for kmer in kmers.iter().take(num_kmers) {
                match PackedKmer::encode(kmer) {
                    Ok(packed) if packed.len() == kmer_len => stat_ram.add_kmer(&packed)?,
                    // Wrong length or ambiguous bases: skip the record
                    _ => continue,
                }
            }
            println!("Start: Computing rotation from {} k-mers", stat_ram.len());
            let artifact = stat_ram.to_artifact();
            let mut out = File::create(&outfile).context("Cannot create rotation outfile")?;
            out.write_all(serde_json::to_string(&artifact)?.as_bytes())?;
            println!("Wrote rotation artifact to {:?}", outfile);
        }
        BuildCmd::Grid {
            radius,
            dimension,
            num_kmers,
            start_offset,
            outfile,
            preload: _preload,
            rotation,
            kmer_table,
        } => {
            let start_time = Instant::now();
            let ramifier = RotatingRamifier::from_file(dimension, &rotation)?;
            let db = GridDb::create(&outfile, ramifier, radius)?;
            let mut builder = GridBuilder::new(db);
            // The table is read up front either way; --preload is a
            // throughput hint with no semantic effect
            let kmers = read_kmer_table(&kmer_table)?;
            let pb = progress_bar(kmers.len() as u64);
            builder.db.drop_indices()?;
            for (i, kmer) in kmers.iter().enumerate() {
                if i < start_offset {
                    continue;
                }
                if num_kmers > 0 && i >= start_offset + num_kmers {
                    break;
                }
                builder.add_kmer_str(kmer)?;
                pb.inc(1);
            }
            builder.commit()?;
            builder.db.build_indices()?;
            pb.finish_with_message("| Finished adding k-mers");
            let n_centers = builder.db.n_centroids();
            println!(
                "Added {} kmers to {:?} in {:.2?}. {} clusters.",
                builder.kmer_counters.counted,
                outfile,
                start_time.elapsed(),
                n_centers
            );
        }
        BuildCmd::GridMerge { final_db, other_dbs } => {
            let mut other_dbs = other_dbs;
            if !final_db.exists() {
                let first = other_dbs
                    .first()
                    .context("grid-merge needs at least one database")?;
                std::fs::copy(first, &final_db).context("Seeding merge target")?;
                other_dbs.remove(0);
            }
            let mut main_db = GridDb::open(&final_db)?;
            let pb = progress_bar(other_dbs.len() as u64);
            for other_path in &other_dbs {
                let mut other = GridDb::open(other_path)?;
                main_db.load_other(&mut other)?;
                pb.inc(1);
            }
            pb.finish_with_message("| Finished merging");
            println!("Merged {} dbs into {:?}.", other_dbs.len() + 1, final_db);
        }
        BuildCmd::Contig {
            radius,
            dimension,
            gap,
            outfile,
            rotation,
            fasta_list,
        } => {
            let start_time = Instant::now();
            let ramifier = RotatingRamifier::from_file(dimension, &rotation)?;
            let db = GridDb::create(&outfile, ramifier, radius)?;
            let mut builder = GridBuilder::new(db);
            let fastas = read_path_list(&fasta_list)?;
            println!("Start: Adding {} fastas", fastas.len());
            let pb = progress_bar(fastas.len() as u64);
            builder.db.drop_indices()?;
            for fasta_path in &fastas {
                let genome_name = genome_name_of(fasta_path);
                for record in read_fasta(fasta_path)? {
                    builder.add_contig(&genome_name, &record.name, &record.seq, gap)?;
                }
                pb.inc(1);
            }
            builder.commit()?;
            builder.db.build_indices()?;
            pb.finish_with_message("| Finished adding contigs");
            println!(
                "Added {} kmers from {} contigs to {:?} in {:.2?}.",
                builder.contig_counters.kmers,
                builder.contig_counters.contigs,
                outfile,
                start_time.elapsed()
            );
        }
        BuildCmd::Blooms {
            sub_k,
            target_fp,
            grid_db,
        } => {
            let start_time = Instant::now();
            let db = GridDb::open(&grid_db)?;
            let mut builder = GridBuilder::new(db);
            let n_built = builder.build_blooms(sub_k, target_fp)?;
            println!(
                "Built {} bloom grids in {:.2?}.",
                n_built,
                start_time.elapsed()
            );
        }
    }
    Ok(())
}

fn genome_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn run_search(cmd: SearchCmd) -> Result<()> {
    match cmd {
        SearchCmd::Seq {
            server,
            radius,
            inner_radius,
            inner_metric,
            coarse,
            kmers,
        } => {
            let metric: InnerMetric = inner_metric.parse()?;
            let mut client = SearchClient::connect(server.port)?;
            client.handshake()?;
            for kmer in &kmers {
                let start = Instant::now();
                let results = client.search(kmer, radius, inner_radius, metric, coarse)?;
                eprintln!("Search complete in {:.2?}", start.elapsed());
                for result in results {
                    println!("{} {}", kmer, result);
                }
            }
        }
        SearchCmd::Contig {
            server,
            radius,
            kmer_fraction,
            seq_identity,
            query,
        } => {
            let mut client = SearchClient::connect(server.port)?;
            client.handshake()?;
            let start = Instant::now();
            let results = client.contig_search(&query, radius, kmer_fraction, seq_identity)?;
            eprintln!("Search complete in {:.2?}", start.elapsed());
            for result in results {
                println!("{}", result);
            }
        }
        SearchCmd::RunServer { server, grid_db } => {
            let mut srv = SearchServer::from_path(server.port, &grid_db)?;
            eprintln!("Starting server on port {}", srv.port());
            srv.main_loop()?;
        }
        SearchCmd::ShutdownServer { server } => {
            let mut client = SearchClient::connect(server.port)?;
            client.send_shutdown()?;
        }
        SearchCmd::File {
            server,
            radius,
            inner_radius,
            inner_metric,
            outfile,
            seqfile,
        } => {
            let metric: InnerMetric = inner_metric.parse()?;
            let mut client = SearchClient::connect(server.port)?;
            client.handshake()?;
            let start = Instant::now();
            client.file_search(&seqfile, &outfile, radius, inner_radius, metric)?;
            eprintln!("Search complete in {:.2?}", start.elapsed());
        }
    }
    Ok(())
}

fn run_stats(cmd: StatsCmd) -> Result<()> {
    match cmd {
        StatsCmd::CoverStats { grid_db } => {
            let mut db = GridDb::open(&grid_db)?;
            println!("centers\t{}", db.n_centroids());
            println!("kmers\t{}", db.n_kmers()?);
            println!("box_side\t{}", db.box_side());
            println!("dims\t{}", db.dims());
            println!("k\t{}", db.k());
        }
        StatsCmd::DumpKmers {
            cluster_ids,
            grid_db,
        } => {
            let mut db = GridDb::open(&grid_db)?;
            for (centroid_id, kmer) in db.get_kmers()? {
                if cluster_ids {
                    println!("{},{}", centroid_id, kmer.decode());
                } else {
                    println!("{}", kmer.decode());
                }
            }
        }
        StatsCmd::DumpCentroids { grid_db } => {
            let db = GridDb::open(&grid_db)?;
            let centroids = db.centroids();
            for row in centroids.rows() {
                let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", fields.join(","));
            }
        }
        StatsCmd::ClusterSizes { grid_db } => {
            let mut db = GridDb::open(&grid_db)?;
            let mut counts: std::collections::BTreeMap<i64, u64> = std::collections::BTreeMap::new();
            for (centroid_id, _) in db.get_kmers()? {
                *counts.entry(centroid_id).or_insert(0) += 1;
            }
            for (centroid_id, count) in counts {
                println!("{},{}", centroid_id, count);
            }
        }
        StatsCmd::DumpContigs { seq, grid_db } => {
            let mut db = GridDb::open(&grid_db)?;
            for contig in db.get_all_contigs()? {
                let text = if seq { contig.seq.decode() } else { String::new() };
                println!(
                    "{} {} {} {} {} {}",
                    contig.id,
                    contig.genome_name,
                    contig.contig_name,
                    contig.start_coord,
                    contig.end_coord,
                    text
                );
            }
        }
    }
    Ok(())
}

fn run_dists(cmd: DistsCmd) -> Result<()> {
    match cmd {
        DistsCmd::Pairwise {
            num_kmers,
            normalize,
            kmer_table,
        } => {
            let kmers: Vec<PackedKmer> = read_kmer_table(&kmer_table)?
                .iter()
                .take(num_kmers)
                .filter_map(|s| PackedKmer::encode(s).ok())
                .collect();
            println!("k1,k2,dist");
            for (i, j, dist) in needle_pairwise(&kmers, normalize) {
                println!("{},{},{}", kmers[i].decode(), kmers[j].decode(), dist);
            }
        }
        DistsCmd::AllMetrics {
            kmer_len,
            num_kmers,
            kmer_table,
        } => {
            let factory = DistanceFactory::new(kmer_len);
            let kmers: Vec<PackedKmer> = read_kmer_table(&kmer_table)?
                .iter()
                .take(num_kmers)
                .filter_map(|s| PackedKmer::encode(s).ok())
                .filter(|p| p.len() == kmer_len)
                .collect();
            println!("k1,k2,{}", factory.names().join(","));
            for i in 0..kmers.len() {
                for j in (i + 1)..kmers.len() {
                    let values = factory.all_dists(&kmers[i], &kmers[j])?;
                    let fields: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    println!(
                        "{},{},{}",
                        kmers[i].decode(),
                        kmers[j].decode(),
                        fields.join(",")
                    );
                }
            }
        }
        DistsCmd::Linear {
            metric,
            query,
            grid_db,
        } => {
            let metric: InnerMetric = metric.parse()?;
            let mut searcher = LinearSearcher::open(&grid_db)?;
            for (kmer, dist) in searcher.search(&query, metric)? {
                println!("{},{}", kmer, dist);
            }
        }
    }
    Ok(())
}
