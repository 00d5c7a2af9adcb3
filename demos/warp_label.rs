//! Curve a single label image for a bottle outline.
//!
//! Usage:
//! ```sh
//! cargo run --example warp_label -- label.png label_curved.png [top_curve] [bottom_curve]
//! ```

use std::env;
use std::process;

use label_raster::{CurvatureSpec, LabelPipeline, WarpOptions};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output> [top_curve] [bottom_curve]", args[0]);
        process::exit(1);
    }

    let curve = |i: usize, default: f32| {
        args.get(i)
            .map_or(Ok(default), |v| v.parse::<f32>())
            .unwrap_or_else(|e| {
                eprintln!("Error: invalid curvature {:?}: {e}", args[i]);
                process::exit(1);
            })
    };
    let curvature = CurvatureSpec::new(curve(3, -5.0), curve(4, 10.0));

    let artwork = label_raster::raster::open(args[1].as_ref()).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        process::exit(1);
    });

    let pipeline = LabelPipeline::default();
    let options = WarpOptions {
        enhanced: true,
        vertical_intensity: 1.0,
    };
    let result = pipeline
        .process_label(&artwork, "demo", curvature, options, |p| {
            println!("{:>3}% {}", p.percent, p.message);
        })
        .and_then(|label| label_raster::raster::save(&label, args[2].as_ref()));

    match result {
        Ok(()) => println!("Done: {}", args[2]),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
