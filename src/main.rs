use anyhow::Result;
use clap::Parser;
use logo_pad::{padded_logo, AlphaMode, PadConfig, PadError};
use std::{path::PathBuf, process::ExitCode};

#[derive(Debug, Parser)]
#[clap(
    name = "logo-pad",
    about = "Pad a logo onto a solid background so launchers can crop it safely"
)]
struct Args {
    /// Path to the source logo [default: assets/logo.jpeg]
    #[clap(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path of the padded PNG [default: assets/logo_padded.png]
    #[clap(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Margin on each side as a fraction of the canvas, between 0 and 0.5 [default: 0.2]
    #[clap(short, long, value_name = "RATIO")]
    padding: Option<f64>,

    /// The background color (CSS color format) [default: #ffffff]
    #[clap(short, long, value_name = "COLOR")]
    background: Option<String>,

    /// How to treat transparency in the source [default: discard]
    #[clap(long, value_enum, value_name = "MODE")]
    alpha: Option<AlphaMode>,

    /// JSON config file. Command-line flags take precedence over it.
    #[clap(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit with a non-zero status when padding fails (2: source, 3: destination, 1: other)
    #[clap(long)]
    strict: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let strict = args.strict;

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {err:#}");
            if strict {
                failure_code(&err)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

/// Exit status under `--strict`, telling input problems apart from output ones.
fn failure_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<PadError>() {
        Some(err) if err.is_source_error() => ExitCode::from(2),
        Some(err) if err.is_destination_error() => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

fn run(args: Args) -> Result<()> {
    let config = resolve_config(args)?;
    let options = config.options()?;

    let source = padded_logo::load_source(&config.source_path)?;
    println!("Original size: {}x{}", source.width(), source.height());

    let report = padded_logo::write_padded(&source, &options, &config.destination_path)?;
    let layout = report.layout;
    println!(
        "Created padded logo: {}x{}",
        layout.canvas_width, layout.canvas_height
    );
    println!("Saved as {}", report.destination.display());
    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn resolve_config(args: Args) -> Result<PadConfig> {
    let mut config = match &args.config {
        Some(path) => PadConfig::load(path)?,
        None => PadConfig::default(),
    };

    if let Some(input) = args.input {
        config.source_path = input;
    }
    if let Some(output) = args.output {
        config.destination_path = output;
    }
    if let Some(padding) = args.padding {
        config.padding_ratio = padding;
    }
    if let Some(background) = args.background {
        config.background_color = background;
    }
    if let Some(alpha) = args.alpha {
        config.alpha_mode = alpha;
    }

    Ok(config)
}
