// imgpager command line: inspect an image or walk all of its pages

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info};

use imgpager::{logging, ImageConfig, ImageHandle, Page};

/// Paged access to forensic disk images
#[derive(Parser, Debug)]
#[command(name = "imgpager", version, about, long_about = None)]
struct Cli {
    /// Verbose logging with file and line information
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print size, geometry, parts and case metadata of an image
    Info {
        #[command(flatten)]
        source: Source,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read every page of an image and report totals
    Walk {
        #[command(flatten)]
        source: Source,

        /// Worker threads; 1 walks sequentially with progress
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Print the totals as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct Source {
    /// Image file, first split part, E01 file or directory
    #[arg(value_name = "IMAGE")]
    path: PathBuf,

    /// Allow a directory to be read file by file
    #[arg(short = 'R', long = "recurse")]
    recurse: bool,

    /// Page size in bytes
    #[arg(long, value_name = "BYTES")]
    page_size: Option<usize>,

    /// Overlap appended to each page in bytes
    #[arg(long, value_name = "BYTES")]
    margin: Option<usize>,

    /// JSON file with an ImageConfig
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not log read errors as they happen
    #[arg(long)]
    quiet_read_errors: bool,
}

impl Source {
    fn config(&self) -> imgpager::Result<ImageConfig> {
        let mut config = match &self.config {
            Some(path) => ImageConfig::from_json_file(path)?,
            None => ImageConfig::default(),
        };
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if self.quiet_read_errors {
            config.report_read_errors = false;
        }
        Ok(config)
    }

    fn open(&self) -> imgpager::Result<ImageHandle> {
        ImageHandle::open(&self.path, self.recurse, self.config()?)
    }
}

/// Totals of one walk
#[derive(Debug, Default, Clone, Copy, Serialize)]
struct WalkStats {
    pages: u64,
    bytes: u64,
    read_errors: u64,
}

impl WalkStats {
    fn record(&mut self, page: &Page) {
        self.pages += 1;
        self.bytes += page.active_len() as u64;
    }

    fn merge(self, other: Self) -> Self {
        Self {
            pages: self.pages + other.pages,
            bytes: self.bytes + other.bytes,
            read_errors: self.read_errors + other.read_errors,
        }
    }
}

const PROGRESS_EVERY: u64 = 64;

fn walk_sequential(handle: &ImageHandle) -> WalkStats {
    let mut stats = WalkStats::default();
    let mut cursor = handle.begin();
    while !cursor.is_eof() {
        match handle.page_at(&cursor) {
            Ok(Some(page)) => stats.record(&page),
            Ok(None) => break,
            Err(e) => {
                debug!(position = %handle.position_of(&cursor), error = %e, "Page skipped");
                stats.read_errors += 1;
            }
        }
        handle.advance(&mut cursor);
        if (stats.pages + stats.read_errors) % PROGRESS_EVERY == 0 {
            info!(
                at = %handle.describe(&cursor),
                done = %format!("{:.1}%", handle.fraction_done(&cursor) * 100.0),
                "Walking"
            );
        }
    }
    stats
}

fn walk_parallel(handle: &ImageHandle, threads: usize) -> Result<WalkStats, String> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| format!("cannot start worker pool: {e}"))?;

    Ok(pool.install(|| {
        (0..handle.max_blocks())
            .into_par_iter()
            .map(|block| {
                let mut stats = WalkStats::default();
                match handle.page_for_block(block) {
                    Ok(Some(page)) => stats.record(&page),
                    Ok(None) => {}
                    Err(e) => {
                        debug!(block, error = %e, "Page skipped");
                        stats.read_errors += 1;
                    }
                }
                stats
            })
            .reduce(WalkStats::default, WalkStats::merge)
    }))
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Info { source, json } => {
            let handle = source.open().map_err(|e| e.to_string())?;
            let info = handle.info();
            if json {
                let text = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
                println!("{text}");
                return Ok(());
            }
            println!("path:       {}", info.path);
            println!("backend:    {}", info.kind);
            println!("size:       {}", info.size);
            println!("blocks:     {} x {} (+{} margin)", info.max_blocks, info.page_size, info.margin);
            for segment in &info.segments {
                println!("segment:    {} @ {} ({} bytes)", segment.path, segment.start, segment.length);
            }
            for line in &info.details {
                println!("{line}");
            }
            Ok(())
        }
        Command::Walk { source, threads, json } => {
            let handle = source.open().map_err(|e| e.to_string())?;
            let started = Instant::now();
            let stats = if threads > 1 {
                walk_parallel(&handle, threads)?
            } else {
                walk_sequential(&handle)
            };
            info!(elapsed = ?started.elapsed(), "Walk finished");

            if json {
                let text = serde_json::to_string_pretty(&stats).map_err(|e| e.to_string())?;
                println!("{text}");
            } else {
                println!(
                    "{} pages, {} bytes, {} read errors",
                    stats.pages, stats.bytes, stats.read_errors
                );
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("imgpager: {e}");
            ExitCode::FAILURE
        }
    }
}
