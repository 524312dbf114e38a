//! convkit CLI - convolve images from the command line.

use anyhow::{bail, Context, Result};
use convkit::prelude::*;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("convkit");

    if args.len() < 2 {
        print_usage(program);
        return;
    }

    let result = match args[1].as_str() {
        "convolve" => convolve_command(&args[2..]),
        "mask" => match args.get(2) {
            Some(path) => mask_command(path),
            None => Err(anyhow::anyhow!("Please specify a mask file")),
        },
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(program);
            std::process::exit(2);
        }
    };

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("convkit v{}", convkit::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  convolve <in> <out> --mask <file> [options]  Convolve an image");
    println!("  mask <file>                                   Show how a mask converts");
    println!("  help                                          Show this help message");
    println!();
    println!("Convolve options:");
    println!("  --mask <file>          Mask as matrix text or .json (required)");
    println!("  --precision <mode>     integer, float or approximate (default: integer)");
    println!("  --layers <n>           Approximation layers, 1-1000 (default: 5)");
    println!("  --cluster <n>          Approximation cluster distance, 1-100 (default: 1)");
    println!("  --config <file.toml>   Read precision, layers and cluster from a file");
}

fn convolve_command(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("Please specify input and output paths");
    }
    let input_path = Path::new(&args[0]);
    let output_path = Path::new(&args[1]);

    let mut mask_path: Option<&str> = None;
    let mut config_path: Option<&str> = None;
    let mut precision: Option<PrecisionMode> = None;
    let mut layers: Option<u32> = None;
    let mut cluster: Option<u32> = None;

    let mut i = 2;
    while i < args.len() {
        let value = args.get(i + 1).map(String::as_str);
        match (args[i].as_str(), value) {
            ("--mask", Some(v)) => mask_path = Some(v),
            ("--config", Some(v)) => config_path = Some(v),
            ("--precision", Some(v)) => precision = Some(v.parse()?),
            ("--layers", Some(v)) => {
                layers = Some(v.parse().with_context(|| format!("Invalid layer count '{}'", v))?)
            }
            ("--cluster", Some(v)) => {
                cluster = Some(v.parse().with_context(|| format!("Invalid cluster '{}'", v))?)
            }
            (flag, _) => bail!("Unknown or incomplete option: {}", flag),
        }
        i += 2;
    }

    let mask_path = mask_path.context("--mask is required")?;
    let mask = MaskDescription::load(mask_path)?;

    // Flags override the config file
    let base = match config_path {
        Some(path) => ConvolutionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path))?,
        None => ConvolutionConfig::default(),
    };
    let config = ConvolutionConfig::builder()
        .precision(precision.unwrap_or(base.precision))
        .layers(layers.unwrap_or(base.approximation.layers()))
        .cluster(cluster.unwrap_or(base.approximation.cluster()))
        .build()?;

    let image = image::open(input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?;
    let input = Raster::try_from(&image)?;
    log::info!("Loaded {} ({})", input_path.display(), input.layout());

    let output = convolve(&input, &mask, &config)?;

    output
        .to_dynamic()?
        .save(output_path)
        .with_context(|| format!("Failed to save {}", output_path.display()))?;
    println!("✓ Saved {} ({})", output_path.display(), config.precision);
    Ok(())
}

fn mask_command(path: &str) -> Result<()> {
    let description = MaskDescription::load(path)?;

    println!(
        "Mask {}: {}x{}x{}",
        path, description.width, description.height, description.bands
    );
    println!();

    match to_integer(&description) {
        Ok(mask) => print!("Integer: {}", mask),
        Err(error) => println!("Integer: not convertible ({})", error),
    }
    println!();
    match to_float(&description) {
        Ok(mask) => print!("Float: {}", mask),
        Err(error) => println!("Float: not convertible ({})", error),
    }
    Ok(())
}
