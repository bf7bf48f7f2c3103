mod cdx;
mod compile;
mod fetcher;
mod parser;
mod store;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

pub const USER_AGENT: &str = "noho-rental-data/1.0";

#[derive(Parser)]
#[command(
    name = "noho_rental_data",
    about = "Historical rental-listing reconstruction from Wayback snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover archived checkpoints for the domain via the CDX API
    Discover {
        #[arg(long, default_value = "rentnoho.com")]
        domain: String,
        /// Earliest capture year to include
        #[arg(long)]
        from_year: Option<String>,
        /// Latest capture year to include
        #[arg(long)]
        to_year: Option<String>,
        /// Optional CDX result cap
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long)]
        output_csv: Option<PathBuf>,
        #[arg(long)]
        output_json: Option<PathBuf>,
    },
    /// Download snapshot HTML for every discovered checkpoint
    Fetch {
        #[arg(long)]
        input_csv: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        index_json: Option<PathBuf>,
        /// Politeness delay before each request
        #[arg(long, default_value = "400")]
        delay_ms: u64,
        /// Max checkpoints to attempt (default: all)
        #[arg(short = 'n', long)]
        max: Option<usize>,
    },
    /// Extract listing-like records from downloaded snapshots
    Extract {
        #[arg(long)]
        index_json: Option<PathBuf>,
        #[arg(long)]
        output_csv: Option<PathBuf>,
    },
    /// Compile the canonical deduplicated, chronological dataset
    Compile {
        #[arg(long)]
        input_csv: Option<PathBuf>,
        #[arg(long)]
        output_csv: Option<PathBuf>,
    },
    /// Extract + compile in one pipeline
    Run {
        #[arg(long)]
        index_json: Option<PathBuf>,
        #[arg(long)]
        intermediate_csv: Option<PathBuf>,
        #[arg(long)]
        output_csv: Option<PathBuf>,
    },
    /// Show pipeline artifact counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Discover {
            domain,
            from_year,
            to_year,
            limit,
            output_csv,
            output_json,
        } => {
            let output_csv = output_csv.unwrap_or_else(store::default_checkpoints_csv);
            let output_json = output_json.unwrap_or_else(store::default_checkpoints_json);
            let opts = cdx::DiscoverOptions {
                domain: domain.clone(),
                from_year,
                to_year,
                limit,
            };
            let checkpoints = cdx::discover(&opts).await?;
            store::write_checkpoints(&output_csv, &output_json, &checkpoints)?;
            println!("Discovered {} checkpoints for {}", checkpoints.len(), domain);
            Ok(())
        }
        Commands::Fetch {
            input_csv,
            out_dir,
            index_json,
            delay_ms,
            max,
        } => {
            let input_csv = input_csv.unwrap_or_else(store::default_checkpoints_csv);
            let out_dir = out_dir.unwrap_or_else(store::default_html_dir);
            let index_json = index_json.unwrap_or_else(store::default_index_json);

            let checkpoints = store::read_checkpoints(&input_csv)?;
            if checkpoints.is_empty() {
                println!("No checkpoints found. Run 'discover' first.");
                return Ok(());
            }
            println!("Fetching {} snapshots...", checkpoints.len());
            let (manifest, stats) =
                fetcher::fetch_snapshots(checkpoints, &out_dir, delay_ms, max).await?;
            store::write_manifest(&index_json, &manifest)?;
            println!(
                "Done: {} attempted ({} fetched, {} cached, {} errors).",
                stats.total, stats.ok, stats.cached, stats.errors
            );
            Ok(())
        }
        Commands::Extract {
            index_json,
            output_csv,
        } => {
            let index_json = index_json.unwrap_or_else(store::default_index_json);
            let output_csv = output_csv.unwrap_or_else(store::default_extracted_csv);
            let counts = run_extract(&index_json, &output_csv)?;
            counts.print();
            Ok(())
        }
        Commands::Compile {
            input_csv,
            output_csv,
        } => {
            let input_csv = input_csv.unwrap_or_else(store::default_extracted_csv);
            let output_csv = output_csv.unwrap_or_else(store::default_final_csv);
            run_compile(&input_csv, &output_csv)
        }
        Commands::Run {
            index_json,
            intermediate_csv,
            output_csv,
        } => {
            let index_json = index_json.unwrap_or_else(store::default_index_json);
            let intermediate_csv = intermediate_csv.unwrap_or_else(store::default_extracted_csv);
            let output_csv = output_csv.unwrap_or_else(store::default_final_csv);

            let t_extract = Instant::now();
            let counts = run_extract(&index_json, &intermediate_csv)?;
            println!(
                "Extracted in {:.1}s",
                t_extract.elapsed().as_secs_f64()
            );
            counts.print();

            run_compile(&intermediate_csv, &output_csv)
        }
        Commands::Stats => {
            print_stats();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ExtractCounts {
    pages_parsed: usize,
    pages_skipped: usize,
    rows: usize,
}

impl ExtractCounts {
    fn print(&self) {
        println!(
            "Extracted {} listing candidates from {} pages ({} skipped).",
            self.rows, self.pages_parsed, self.pages_skipped
        );
    }
}

/// Manifest → intermediate extracted-records table. Pages whose fetch
/// failed or whose content file is gone are skipped, not errors.
fn run_extract(index_json: &Path, output_csv: &Path) -> Result<ExtractCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let manifest = store::read_manifest(index_json)?;

    let mut pages = Vec::new();
    let mut skipped = 0usize;
    for entry in manifest {
        if entry.status != "ok" || !Path::new(&entry.local_file).exists() {
            skipped += 1;
            continue;
        }
        pages.push(entry);
    }

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut rows = Vec::new();
    for chunk in pages.chunks(500) {
        let results: Vec<Result<Vec<store::ExtractedListing>>> = chunk
            .par_iter()
            .map(|entry| {
                let raw = fs::read(&entry.local_file)
                    .with_context(|| format!("failed to read {}", entry.local_file))?;
                let html = String::from_utf8_lossy(&raw);
                parser::parse_snapshot(entry, &html)
            })
            .collect();

        for page_rows in results {
            rows.extend(page_rows?);
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    store::write_listings(output_csv, &rows)?;

    Ok(ExtractCounts {
        pages_parsed: pages.len(),
        pages_skipped: skipped,
        rows: rows.len(),
    })
}

/// Intermediate table → canonical dataset. A missing or empty table is a
/// usage error; nothing is written in that case.
fn run_compile(input_csv: &Path, output_csv: &Path) -> Result<()> {
    if !input_csv.exists() {
        bail!(
            "extracted listings table {} not found; run the extract step first",
            input_csv.display()
        );
    }
    let rows = store::read_listings(input_csv)?;
    let compiled = compile::compile(rows)?;
    store::write_listings(output_csv, &compiled)?;
    println!("Compiled {} historical records", compiled.len());
    Ok(())
}

fn print_stats() {
    let checkpoints = count_csv_rows(&store::default_checkpoints_csv());
    println!("Checkpoints: {}", checkpoints);

    match store::read_manifest(&store::default_index_json()) {
        Ok(manifest) => {
            let ok = manifest.iter().filter(|e| e.status == "ok").count();
            let errors = manifest.len() - ok;
            let on_disk = manifest
                .iter()
                .filter(|e| Path::new(&e.local_file).exists())
                .count();
            println!("Snapshots:   {} ({} ok, {} errors)", manifest.len(), ok, errors);
            println!("On disk:     {}", on_disk);
        }
        Err(_) => println!("Snapshots:   none (no manifest)"),
    }

    println!(
        "Extracted:   {}",
        count_csv_rows(&store::default_extracted_csv())
    );
    println!(
        "Compiled:    {}",
        count_csv_rows(&store::default_final_csv())
    );
}

fn count_csv_rows(path: &Path) -> usize {
    csv::Reader::from_path(path)
        .map(|mut reader| reader.records().filter_map(|rec| rec.ok()).count())
        .unwrap_or(0)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
