use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use turbofreq::{measure, output, Config, CorePlacement, CpuArch};

/// Measure sustained turbo frequency with 1..N cores busy.
#[derive(Parser, Debug)]
#[command(name = "turbofreq", version, about, long_about = None)]
struct Args {
    /// Number of physical cores to scale up to (0 = only report the P1
    /// frequency)
    #[arg(short = 't', long = "max-cores", default_value_t = 0)]
    max_cores: u32,

    /// Core count at which to start
    #[arg(short = 'c', long = "start-cores", default_value_t = 1)]
    start_cores: u32,

    /// Iterations of the sampling loop, in millions
    #[arg(short = 'x', long = "iterations", default_value_t = 100)]
    iterations: u64,

    /// Hyperthread siblings have consecutive cpu numbers; keep one sibling
    /// per physical core busy
    #[arg(short = 'a', long = "consecutive-pairs")]
    consecutive_pairs: bool,

    /// Emit the result as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let placement = if args.consecutive_pairs {
        CorePlacement::ConsecutivePairs
    } else {
        CorePlacement::Alternating
    };
    let config = Config::new()
        .max_cores(args.max_cores)
        .start_cores(args.start_cores)
        .iterations_millions(args.iterations)
        .placement(placement);

    let Some(arch) = CpuArch::detect() else {
        eprintln!("{}", "unable to identify the CPU via CPUID".red());
        return ExitCode::FAILURE;
    };

    match measure(&config, arch) {
        Ok(result) => {
            if args.json {
                match output::to_json_pretty(&result) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("{}", format!("failed to serialize result: {e}").red());
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", output::format_report(&result));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            ExitCode::FAILURE
        }
    }
}
