//! matbench CLI
//!
//! Times two matrix multiplication strategies on the same random operands and
//! reports their durations, throughput, speedup and agreement.

use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, CommandFactory, Parser};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

use matbench::bench::{BenchConfig, Benchmark, DEFAULT_DIM, SEPARATOR};
use matbench::error::{validation_error, Result};
use matbench::multiply::{instruction_set, Method};

const RED: &str = "\x1b[0;31m";
const RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(name = "matbench", version, about = "Dense f32 matrix multiplication benchmark")]
#[command(disable_help_flag = true)]
struct Cli {
    /// Number of rows for matrix A
    #[arg(short = 'm', value_name = "M", default_value_t = DEFAULT_DIM)]
    m: usize,

    /// Number of columns/rows for matrix A/B respectively
    #[arg(short = 'n', value_name = "N", default_value_t = DEFAULT_DIM)]
    n: usize,

    /// Number of columns for matrix B
    #[arg(short = 'p', value_name = "P", default_value_t = DEFAULT_DIM)]
    p: usize,

    /// Method 1 to run matrix multiplication
    #[arg(short = 'a', value_name = "METHOD", default_value = "goto")]
    first: String,

    /// Method 2 to run matrix multiplication
    #[arg(short = 'b', value_name = "METHOD", default_value = "goto")]
    second: String,

    /// Number of times to rerun matmul
    #[arg(short = 'l', value_name = "LOOP", default_value_t = 1)]
    loops: usize,

    /// Time (in seconds) delay between matmuls, to allow the CPU to cool down
    #[arg(short = 'c', value_name = "COOLDOWN", default_value_t = 1.0)]
    cooldown: f64,

    /// Worker threads for the parallel methods (default: all hardware threads)
    #[arg(short = 't', value_name = "THREADS")]
    threads: Option<usize>,

    /// Seed for the operand generator (default: derived from the clock)
    #[arg(short = 's', value_name = "SEED")]
    seed: Option<u64>,

    /// Skip the mean squared error check between the two results
    #[arg(long)]
    no_check: bool,

    /// Display this help description
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.help {
        print_usage();
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{RED}ERROR:{RESET} {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every correctness check passed.
fn run(cli: Cli) -> Result<bool> {
    let config = build_config(&cli)?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| validation_error(format!("cannot build thread pool: {e}")))?;
    }

    let seed = cli
        .seed
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros().unsigned_abs());

    print_header(&config, seed);

    let mut bench = Benchmark::new(config, StdRng::seed_from_u64(seed))?;
    let summary = bench.run(|report| println!("{report}\n"))?;
    Ok(summary.all_passed())
}

fn build_config(cli: &Cli) -> Result<BenchConfig> {
    let first: Method = cli.first.parse()?;
    let second: Method = cli.second.parse()?;
    let cooldown = Duration::try_from_secs_f64(cli.cooldown).map_err(|_| {
        validation_error(format!(
            "cooldown must be a non-negative number of seconds, got {}",
            cli.cooldown
        ))
    })?;

    let config = BenchConfig {
        m: cli.m,
        n: cli.n,
        p: cli.p,
        first,
        second,
        loops: cli.loops,
        cooldown,
        check: !cli.no_check,
        ..BenchConfig::default()
    };
    config.validate()?;
    Ok(config)
}

fn print_header(config: &BenchConfig, seed: u64) {
    if cfg!(feature = "blas") {
        println!("Tuned BLAS implementation found (matrixmultiply)");
    } else {
        println!("Program not compiled with tuned BLAS implementation");
    }
    print!("Using {} instructions; ", instruction_set());
    println!("using {} thread(s)\n", rayon::current_num_threads());

    println!(
        "Started {}, seed {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        seed
    );
    println!("M: {}, N: {}, P: {}", config.m, config.n, config.p);
    println!(
        "Method 1: {}, Method 2: {}",
        config.first.display_name(),
        config.second.display_name()
    );
    println!("Looping {} time(s)", config.loops);
    println!();
    println!("{SEPARATOR}");
}

fn print_usage() {
    let mut command = Cli::command();
    eprintln!("{}", command.render_help());
    eprintln!("Methods {}:", Method::allowed_names());
    for method in Method::ALL {
        eprintln!("  {:<12}{}", method.cli_name(), method.description());
    }
}
