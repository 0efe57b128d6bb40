//! Train a randomised decision tree from a directory of depth/label images.
//!
//! ```text
//! train_rdt <data_dir> <index_name> <out_file> [OPTIONS]
//! ```
//!
//! Interrupting with Ctrl-C writes a resumable checkpoint to the output
//! path; a second Ctrl-C aborts. Resume with `--continue`.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;
use signal_hook::consts::SIGINT;

use rdtree::data::{load_training_data, LoadOptions};
use rdtree::io;
use rdtree::training::{train, ProgressClock, TrainContext, TrainParams};

#[derive(Parser, Debug)]
#[command(
    name = "train_rdt",
    about = "Train a randomised decision tree to infer per-pixel labels from \
             depth and label images with a given camera FOV. Default values \
             assume depth data to be in meters."
)]
struct Cli {
    /// Directory holding meta.json, the index file and the image pairs
    data_dir: PathBuf,

    /// Basename of the index file (without the .index suffix)
    index_name: String,

    /// Output tree file
    out_file: PathBuf,

    /// Limit training data to this many images, optionally skipping the first M
    #[arg(short = 'l', long = "limit", value_name = "N[,M]", value_parser = parse_limit)]
    limit: Option<(u32, u32)>,

    /// Shuffle order of training images
    #[arg(short, long)]
    shuffle: bool,

    /// Number of pixels to sample per image
    #[arg(short, long, default_value_t = 2000, value_name = "N")]
    pixels: u32,

    /// Number of thresholds to test
    #[arg(short, long, default_value_t = 50, value_name = "N")]
    thresholds: u32,

    /// Range of thresholds to test
    #[arg(short = 'r', long = "t-range", default_value_t = 1.29, value_name = "F")]
    t_range: f32,

    /// Number of UV combinations to test
    #[arg(short, long, default_value_t = 2000, value_name = "N")]
    combos: u32,

    /// Range of UV combinations to test, meters
    #[arg(short, long = "uv-range", default_value_t = 1.29, value_name = "F")]
    uv_range: f32,

    /// Depth to train tree to
    #[arg(short, long, default_value_t = 20, value_name = "N")]
    depth: u8,

    /// Number of worker threads (default: all cores)
    #[arg(short = 'm', long, value_name = "N")]
    threads: Option<usize>,

    /// Index of the background label
    #[arg(short, long, default_value_t = 0, value_name = "N")]
    background: u8,

    /// Seed to use for RNG
    #[arg(short = 'n', long, default_value_t = 0, value_name = "N")]
    seed: u32,

    /// Continue training from an interrupted run
    #[arg(short = 'i', long = "continue")]
    resume: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_limit(value: &str) -> Result<(u32, u32), String> {
    let (limit, skip) = match value.split_once(',') {
        Some((n, m)) => (n, Some(m)),
        None => (value, None),
    };
    let limit: u32 = limit
        .parse()
        .map_err(|_| format!("invalid image limit '{limit}'"))?;
    let skip: u32 = match skip {
        Some(m) => m.parse().map_err(|_| format!("invalid image skip '{m}'"))?,
        None => 0,
    };
    Ok((limit, skip))
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version are successes; everything else is bad usage.
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.depth == 0 || cli.depth > 30 {
        bail!("tree depth must be in [1, 30]");
    }
    if cli.thresholds < 2 {
        bail!("at least 2 thresholds are required");
    }
    if cli.combos == 0 || cli.pixels == 0 {
        bail!("pixel and uv combination counts must be positive");
    }
    if !(cli.t_range > 0.0) || !(cli.uv_range > 0.0) {
        bail!("threshold and uv ranges must be positive");
    }

    // First interrupt flags a cooperative stop; a second one aborts.
    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register_conditional_shutdown(SIGINT, 1, Arc::clone(&interrupted))
        .context("registering signal handler")?;
    signal_hook::flag::register(SIGINT, Arc::clone(&interrupted))
        .context("registering signal handler")?;

    println!("Scanning training directories...");
    let (limit, skip) = cli.limit.unwrap_or((u32::MAX, 0));
    let data = load_training_data(
        &cli.data_dir,
        &cli.index_name,
        &LoadOptions {
            limit,
            skip,
            shuffle: cli.shuffle,
            seed: cli.seed,
        },
    )?;

    println!("Preparing training metadata...");
    let params = TrainParams {
        n_pixels: cli.pixels,
        n_thresholds: cli.thresholds,
        t_range: cli.t_range,
        n_uv: cli.combos,
        uv_range: cli.uv_range,
        max_depth: cli.depth,
        n_threads: cli.threads.unwrap_or(0),
        background_label: cli.background,
        seed: cli.seed,
        verbose: cli.verbose,
    };
    let ctx = Arc::new(TrainContext::new(data, params));

    let checkpoint = if cli.resume {
        match io::read_tree(&cli.out_file) {
            Ok(tree) => Some(tree),
            Err(err) => {
                warn!(
                    "ignoring unreadable checkpoint '{}': {err}",
                    cli.out_file.display()
                );
                None
            }
        }
    } else {
        None
    };

    let mut clock = ProgressClock::start();
    let outcome = train(ctx, checkpoint.as_ref(), interrupted, &mut clock)?;

    println!(
        "{} Writing output to '{}'...",
        clock.lap(),
        cli.out_file.display()
    );
    io::save_tree(&outcome.tree, &cli.out_file)?;

    let mut json_path = cli.out_file.clone().into_os_string();
    json_path.push(".json");
    io::save_tree_json(&outcome.tree, PathBuf::from(json_path))?;

    println!(
        "{} {}",
        clock.lap(),
        if outcome.interrupted {
            "Interrupted!"
        } else {
            "Done!"
        }
    );

    Ok(())
}
