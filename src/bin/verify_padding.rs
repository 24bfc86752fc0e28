use anyhow::{Context, Result};
use clap::Parser;
use logo_pad::{
    config::{
        parse_color, DEFAULT_BACKGROUND_COLOR, DEFAULT_DESTINATION_PATH, DEFAULT_PADDING_RATIO,
        DEFAULT_SOURCE_PATH,
    },
    verify_layout, AlphaMode, PadOptions,
};
use std::{path::PathBuf, process::ExitCode};

#[derive(Debug, Parser)]
#[clap(
    name = "verify_padding",
    about = "Check that a padded logo matches its source"
)]
struct Args {
    /// The original logo.
    #[clap(value_name = "SOURCE", default_value = DEFAULT_SOURCE_PATH)]
    source: PathBuf,

    /// The padded PNG to check.
    #[clap(value_name = "OUTPUT", default_value = DEFAULT_DESTINATION_PATH)]
    output: PathBuf,

    #[clap(short, long, value_name = "RATIO", default_value_t = DEFAULT_PADDING_RATIO)]
    padding: f64,

    #[clap(short, long, value_name = "COLOR", default_value = DEFAULT_BACKGROUND_COLOR)]
    background: String,

    #[clap(long, value_enum, value_name = "MODE", default_value = "discard")]
    alpha: AlphaMode,

    /// Largest per-channel difference still counted as a match
    #[clap(short, long, default_value_t = 0)]
    tolerance: u8,
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let options = PadOptions::new(args.padding, parse_color(&args.background)?, args.alpha)?;
    let source = image::open(&args.source)
        .with_context(|| format!("Failed to open {}", args.source.display()))?;
    let output = image::open(&args.output)
        .with_context(|| format!("Failed to open {}", args.output.display()))?;

    println!(
        "Checking {} against {}",
        args.output.display(),
        args.source.display()
    );

    let check = verify_layout(&source, &output, &options, args.tolerance)?;
    let expected = check.expected;
    println!(
        "Expected canvas: {}x{}, source at ({}, {})",
        expected.canvas_width, expected.canvas_height, expected.offset_x, expected.offset_y
    );
    println!("Actual canvas:   {}x{}", check.actual_width, check.actual_height);

    if !check.dimensions_match() {
        println!("⚠ Canvas size does not match");
        return Ok(ExitCode::FAILURE);
    }

    println!("  {} source pixels differ", check.source_mismatches);
    println!("  {} background pixels differ", check.background_mismatches);

    if check.is_ok() {
        println!("✓ Padding verified");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("⚠ Padded logo does not match its source");
        Ok(ExitCode::FAILURE)
    }
}
