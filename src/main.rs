//! Room FDTD CLI - Sweep candidate source positions and rank placements.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use log::{info, warn};

use room_fdtd::{
    compute::Simulation,
    scene::scene_by_name,
    schema::{SimulationParameters, SweepOptions},
    sweep::{SweepConfig, SweepCsvWriter, run_sweep, tuples_with_min_distance},
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage(&args[0]);
        return;
    }
    let (options, output_dir) = match parse_arguments(&args[1..]) {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("{message}");
            print_usage(&args[0]);
            std::process::exit(1);
        }
    };

    std::process::exit(run(options, output_dir));
}

fn print_usage(program: &str) {
    eprintln!("Room FDTD - Low-frequency source placement sweeps");
    eprintln!();
    eprintln!("Usage: {program} [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -t, --time <seconds>        Simulated time per run (default 0.3)");
    eprintln!("  -f, --max-frequency <hz>    Design band upper limit (default 200)");
    eprintln!("  -o, --oversampling <n>      Spatial oversampling (default 16)");
    eprintln!("  -b, --bands <fraction>      Octave band denominator (default 24)");
    eprintln!("  -x, --speakers <k>          Sources per candidate set (default 1)");
    eprintln!("      --distance <metres>     Minimum source spacing (default 2.0)");
    eprintln!("      --scene <name>          shoebox | cuboid | listening (default shoebox)");
    eprintln!("      --output <dir>          Output directory (default output)");
    eprintln!("      --help, -h              Show this help message");
}

fn parse_arguments(args: &[String]) -> Result<(SweepOptions, PathBuf), String> {
    let mut options = SweepOptions::default();
    let mut output_dir = PathBuf::from("output");

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("Missing value for {name}"))
        };
        match flag.as_str() {
            "-t" | "--time" => options.simulated_time = parse_number(&value(flag)?, flag)?,
            "-f" | "--max-frequency" => {
                options.max_frequency = parse_number(&value(flag)?, flag)?
            }
            "-o" | "--oversampling" => {
                options.oversampling = parse_number(&value(flag)?, flag)?
            }
            "-b" | "--bands" => options.bands = parse_number(&value(flag)?, flag)?,
            "-x" | "--speakers" => {
                options.speakers = value(flag)?
                    .parse()
                    .map_err(|_| format!("Invalid value for {flag}"))?
            }
            "--distance" => options.min_distance = parse_number(&value(flag)?, flag)?,
            "--scene" => options.scene = value(flag)?,
            "--output" => output_dir = PathBuf::from(value(flag)?),
            unknown => return Err(format!("Unknown option: {unknown}")),
        }
    }

    if options.speakers == 0 {
        return Err("Speaker count must be at least 1".into());
    }
    Ok((options, output_dir))
}

fn parse_number(text: &str, flag: &str) -> Result<f64, String> {
    text.parse()
        .map_err(|_| format!("Invalid value for {flag}: {text}"))
}

fn run(options: SweepOptions, output_dir: PathBuf) -> i32 {
    info!("options: {options:?}");

    let mut parameters = SimulationParameters::default();
    if let Err(error) = parameters
        .set_max_frequency(options.max_frequency)
        .and_then(|_| parameters.set_oversampling(options.oversampling))
    {
        eprintln!("Invalid configuration: {error}");
        return 1;
    }

    let Some(scene) = scene_by_name(&options.scene) else {
        eprintln!("Unknown scene: {}", options.scene);
        return 1;
    };

    let grid = scene.build(&parameters);
    let position_sets = tuples_with_min_distance(
        grid.source_set(),
        options.speakers,
        parameters.dx(),
        options.min_distance,
    );

    let mut simulation = match Simulation::new(grid, parameters) {
        Ok(simulation) => simulation,
        Err(error) => {
            eprintln!("Failed to bind simulation: {error}");
            return 1;
        }
    };
    simulation.log_statistics();

    let config = SweepConfig {
        simulated_time: options.simulated_time,
        band_fraction: options.bands,
        ..SweepConfig::default()
    };

    let start = Instant::now();
    let report = match run_sweep(&mut simulation, scene.as_ref(), &position_sets, &config) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("Sweep not runnable: {error}");
            return 1;
        }
    };
    info!("sweep finished in {:.1} s", start.elapsed().as_secs_f64());

    if let Err(error) = fs::create_dir_all(&output_dir) {
        eprintln!("Cannot create output directory: {error}");
        return 1;
    }
    let stem = format!(
        "{} [{:.0}ms-{}f-{}o-{}b-{}x]",
        options.scene,
        options.simulated_time * 1000.0,
        options.max_frequency,
        options.oversampling,
        options.bands,
        options.speakers,
    );

    if let Err(error) = write_outputs(&simulation, &options, &report, &output_dir, &stem) {
        eprintln!("Failed to write results: {error}");
        return 1;
    }

    summarise(&report);

    if report.failures.is_empty() { 0 } else { 2 }
}

fn write_outputs(
    simulation: &Simulation,
    options: &SweepOptions,
    report: &room_fdtd::sweep::SweepReport,
    output_dir: &std::path::Path,
    stem: &str,
) -> std::io::Result<()> {
    let csv_path = output_dir.join(format!("{stem}.csv"));
    let mut writer = SweepCsvWriter::create(
        &csv_path,
        options.speakers,
        &report.frequencies,
        simulation.grid().dx(),
    )?;
    for record in &report.records {
        writer.write_record(record)?;
    }
    info!("wrote {}", csv_path.display());

    let summary = serde_json::json!({
        "options": options,
        "frequencies": report.frequencies,
        "records": report.records,
        "failed_positions": report.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
    });
    let json_path = output_dir.join(format!("{stem}.json"));
    fs::write(&json_path, serde_json::to_string_pretty(&summary)?)?;
    info!("wrote {}", json_path.display());
    Ok(())
}

fn summarise(report: &room_fdtd::sweep::SweepReport) {
    for failure in &report.failures {
        warn!("position set {} failed: {}", failure.index, failure.error);
    }

    let Some(&best) = report.ranked_indices().first() else {
        warn!("no completed position sets");
        return;
    };
    let record = &report.records[best];
    info!(
        "flattest response: set {} (deviation {:.4}, avg {:.2} dB) at {:?}",
        record.index, record.deviation, record.avg_spl, record.positions
    );
}
