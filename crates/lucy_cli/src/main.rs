//! `lucy`: blur an image with a Gaussian PSF and restore it with
//! accelerated Richardson–Lucy deconvolution.
//!
//! Windows of the classic demo are replaced by files in `--output-dir`:
//! `original.png`, `blurred.png`, `snapshot_<n>_iter_<j>.png` and `result.png`.

mod io;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use lucy_core::engine::DEFAULT_SIGMA;
use lucy_core::{gaussian_blur, normalize, DeconvConfig, RichardsonLucy, Snapshot};

use crate::io::{load_image, save_for_display, save_normalized, LoadMode};

#[derive(Parser, Debug)]
#[command(name = "lucy")]
#[command(about = "Richardson-Lucy deconvolution with a Gaussian point-spread function")]
struct Cli {
    /// Input image file
    in_file: PathBuf,
    /// Number of Richardson-Lucy iterations
    iterations: usize,
    /// Gaussian PSF width
    #[arg(default_value_t = DEFAULT_SIGMA)]
    sigma: f64,
    /// Number of intermediate snapshots to write
    #[arg(default_value_t = 0)]
    snapshot_count: usize,
    /// Load mode: <0 unchanged, 0 grayscale, >0 color
    #[arg(default_value_t = -1, allow_negative_numbers = true)]
    mode: i32,
    /// Directory receiving the output images
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Deconvolve the input as-is instead of blurring it first
    #[arg(long)]
    no_preblur: bool,
}

fn snapshot_path(dir: &Path, snapshot: &Snapshot<f64>) -> PathBuf {
    dir.join(format!(
        "snapshot_{:02}_iter_{:04}.png",
        snapshot.ordinal, snapshot.iteration
    ))
}

fn run(cli: Cli) -> Result<()> {
    let engine = RichardsonLucy::new(DeconvConfig {
        iterations: cli.iterations,
        sigma: cli.sigma,
        snapshot_count: cli.snapshot_count,
    })?;

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {}", cli.output_dir.display()))?;

    let original = load_image(&cli.in_file, LoadMode::from(cli.mode))?;
    save_for_display(&original, &cli.output_dir.join("original.png"))?;

    let observed = if cli.no_preblur {
        normalize(&original)
    } else {
        normalize(&gaussian_blur(&original, cli.sigma)?)
    };
    save_normalized(&observed, &cli.output_dir.join("blurred.png"))?;

    let started = Instant::now();
    let mut write_error = None;
    let result = engine.run_with_observer(&observed, None, |snapshot| {
        info!(
            "Figure {} (Iteration {})",
            snapshot.ordinal, snapshot.iteration
        );
        if write_error.is_none() {
            write_error =
                save_normalized(&snapshot.image, &snapshot_path(&cli.output_dir, snapshot)).err();
        }
    })?;
    if let Some(err) = write_error {
        return Err(err);
    }

    let result_path = cli.output_dir.join("result.png");
    save_for_display(&result.estimate, &result_path)?;
    info!(
        "wrote {} after {} iterations in {:.2}s",
        result_path.display(),
        cli.iterations,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Cli::parse())
}
