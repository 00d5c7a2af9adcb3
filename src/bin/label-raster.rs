use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use label_raster::raster::{self, RasterImage};
use label_raster::{
    parse_hex_color, recolor_liquid, BlendMode, CurvatureSpec, LabelPipeline, PipelineConfig,
    ProgressEvent, WarpOptions, WineSettings,
};

#[derive(Parser)]
#[command(
    name = "label-raster",
    about = "Prepare bottle label artwork and tint liquid masks",
    version,
    after_help = "Print pages must already be rasterized (e.g. exported to PNG at 2-3x scale)."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// JSON file overriding pipeline constants
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output, including per-phase progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize and curve label artwork
    Warp(WarpArgs),
    /// Crop print bleed at registration marks
    Crop(IoArgs),
    /// Crop a rasterized print page, then curve it
    Label(WarpArgs),
    /// Tint a grayscale liquid mask
    Recolor(RecolorArgs),
}

#[derive(Args)]
struct IoArgs {
    /// Input image file
    input: PathBuf,

    /// Output file (default: {name}_{step}.png)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct WarpArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Top edge curvature, authored at the reference height
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    top_curve: f32,

    /// Bottom edge curvature, authored at the reference height
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    bottom_curve: f32,

    /// Also bulge the label interior
    #[arg(short, long)]
    enhanced: bool,

    /// Strength of the interior bulge
    #[arg(long, default_value = "1.0")]
    vertical_intensity: f32,

    /// Bottle outline identifier used as part of the cache key
    #[arg(long, default_value = "default")]
    bottle: String,
}

#[derive(Args)]
struct RecolorArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Wine color as #rrggbb
    #[arg(long, default_value = "#722f37")]
    color: String,

    /// Blend mode
    #[arg(long, value_enum, default_value_t = BlendMode::Multiply)]
    blend: BlendMode,

    /// Opacity of the tint (0.0-1.0)
    #[arg(long, default_value = "1.0")]
    opacity: f32,

    /// Contrast around mid-gray
    #[arg(long, default_value = "1.0")]
    contrast: f32,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => fail(&format!("Failed to load config {}: {e}", path.display())),
        },
        None => PipelineConfig::default(),
    };

    let pipeline = match LabelPipeline::new(config) {
        Ok(p) => p,
        Err(e) => fail(&format!("Fatal: {e}")),
    };

    let (input, output, result) = match &cli.cmd {
        Command::Warp(args) => run_warp(&pipeline, args, false, cli.verbose),
        Command::Label(args) => run_warp(&pipeline, args, true, cli.verbose),
        Command::Crop(args) => {
            let output = output_path(args, "cropped");
            let result = load(&args.input).and_then(|page| {
                let cropped = pipeline.crop_page(&page);
                let msg = if cropped.dimensions() == page.dimensions() {
                    "no crop applied".to_string()
                } else {
                    format!(
                        "cropped {}x{} -> {}x{}",
                        page.width(),
                        page.height(),
                        cropped.width(),
                        cropped.height()
                    )
                };
                save(&cropped, &output).map(|()| msg)
            });
            (args.input.clone(), output, result)
        }
        Command::Recolor(args) => {
            let output = output_path(&args.io, "wine");
            let result = run_recolor(args, &output);
            (args.io.input.clone(), output, result)
        }
    };

    let filename = input.file_name().map_or_else(
        || input.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );
    match result {
        Ok(msg) => {
            if !cli.quiet {
                eprintln!("[OK] {filename} -> {} ({msg})", output.display());
            }
        }
        Err(msg) => {
            eprintln!("[FAIL] {filename}: {msg}");
            process::exit(1);
        }
    }
}

fn run_warp(
    pipeline: &LabelPipeline,
    args: &WarpArgs,
    crop_first: bool,
    verbose: bool,
) -> (PathBuf, PathBuf, Result<String, String>) {
    let output = output_path(&args.io, "label");
    let curvature = CurvatureSpec::new(args.top_curve, args.bottom_curve);
    let options = WarpOptions {
        enhanced: args.enhanced,
        vertical_intensity: args.vertical_intensity,
    };
    let report = |p: &ProgressEvent| {
        if verbose {
            eprintln!("  [{:>3}%] {}", p.percent, p.message);
        }
    };

    let result = load(&args.io.input).and_then(|source| {
        let processed = if crop_first {
            pipeline.process_document_page(&source, &args.bottle, curvature, options, report)
        } else {
            pipeline.process_label(&source, &args.bottle, curvature, options, report)
        };
        let label = processed.map_err(|e| e.to_string())?;
        save(&label, &output)?;
        Ok(format!("{}x{}", label.width(), label.height()))
    });

    (args.io.input.clone(), output, result)
}

fn run_recolor(args: &RecolorArgs, output: &Path) -> Result<String, String> {
    let color = parse_hex_color(&args.color).map_err(|e| e.to_string())?;
    let settings = WineSettings {
        opacity: args.opacity,
        contrast: args.contrast,
        blend_mode: args.blend,
    };
    let mask = load(&args.io.input)?;
    let tinted = recolor_liquid(&mask, color, &settings).map_err(|e| e.to_string())?;
    save(&tinted, output)?;
    Ok(format!("{} {}", settings.blend_mode, args.color))
}

fn output_path(args: &IoArgs, suffix: &str) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| raster::default_output_path(&args.input, suffix))
}

fn load(path: &Path) -> Result<RasterImage, String> {
    if !raster::is_supported_image(path) {
        return Err(format!("unsupported input type: {}", path.display()));
    }
    raster::open(path).map_err(|e| format!("Failed to load: {e}"))
}

fn save(img: &RasterImage, path: &Path) -> Result<(), String> {
    raster::save(img, path).map_err(|e| format!("Failed to save: {e}"))
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}
