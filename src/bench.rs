//! Benchmark harness: configuration, timed iterations and reports.
//!
//! One iteration runs the fixed sequence
//!
//! ```text
//! initialize A, B -> run method 1 (timed) -> cooldown -> run method 2 (timed) -> check
//! ```
//!
//! and yields an [`IterationReport`]. All four matrices of an iteration are
//! owned by it and dropped when it returns, on every path.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::error::{invalid_dimensions, validation_error, Result};
use crate::matrix::Matrix;
use crate::multiply::Method;
use crate::verify::{max_abs_error, mean_squared_error};

/// Default extent of M, N and P.
pub const DEFAULT_DIM: usize = 2048;

/// Results whose mean squared error reaches this value fail the check.
pub const DEFAULT_MSE_THRESHOLD: f64 = 1e-3;

/// Line printed between the timings and the comparison of an iteration.
pub const SEPARATOR: &str = "======================================";

const GREEN: &str = "\x1b[92m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";

/// Everything a benchmark run needs, fixed before the first iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    /// Rows of A and C.
    pub m: usize,
    /// Columns of A, rows of B.
    pub n: usize,
    /// Columns of B and C.
    pub p: usize,
    pub first: Method,
    pub second: Method,
    /// Number of iterations.
    pub loops: usize,
    /// Pause between the two timed runs, and between iterations when
    /// `loops != 1`.
    pub cooldown: Duration,
    /// Compare the two results after each iteration.
    pub check: bool,
    pub mse_threshold: f64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_DIM,
            n: DEFAULT_DIM,
            p: DEFAULT_DIM,
            first: Method::Goto,
            second: Method::Goto,
            loops: 1,
            cooldown: Duration::from_secs(1),
            check: true,
            mse_threshold: DEFAULT_MSE_THRESHOLD,
        }
    }
}

impl BenchConfig {
    /// Rejects zero extents and a zero loop count.
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.n == 0 {
            return Err(invalid_dimensions(self.m, self.n));
        }
        if self.p == 0 {
            return Err(invalid_dimensions(self.n, self.p));
        }
        if self.loops == 0 {
            return Err(validation_error("loop count must be at least 1"));
        }
        if self.mse_threshold.is_nan() || self.mse_threshold <= 0.0 {
            return Err(validation_error(format!(
                "MSE threshold must be positive, got {}",
                self.mse_threshold
            )));
        }
        Ok(())
    }

    /// Floating point work of one multiplication, in GFLOP.
    pub fn gflop(&self) -> f64 {
        gflop(self.m, self.n, self.p)
    }
}

/// `2 * M * N * P / 1e9`: one multiply and one add per inner-product term.
pub fn gflop(m: usize, n: usize, p: usize) -> f64 {
    2.0 * m as f64 * n as f64 * p as f64 / 1e9
}

/// Wall-clock timing of one multiplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: &'static str,
    pub duration: Duration,
    pub gflops: f64,
}

impl Measurement {
    /// A zero `duration` (below timer resolution) reports `f64::INFINITY`.
    pub fn new(name: &'static str, duration: Duration, gflop: f64) -> Self {
        let gflops = if duration.is_zero() {
            f64::INFINITY
        } else {
            gflop / duration.as_secs_f64()
        };
        Self {
            name,
            duration,
            gflops,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matmul duration: {:.5}s ({:.3} GFLOP/s)",
            self.name,
            self.duration.as_secs_f64(),
            self.gflops
        )
    }
}

/// Mean squared error between the two results of an iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckOutcome {
    pub mse: f64,
    pub passed: bool,
}

impl CheckOutcome {
    pub fn new(mse: f64, threshold: f64) -> Self {
        Self {
            mse,
            passed: mse < threshold,
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let color = if self.passed { GREEN } else { RED };
        write!(f, "{}Mean squared error: {:.6}{}", color, self.mse, RESET)
    }
}

/// Outcome of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Zero-based iteration number.
    pub index: usize,
    pub first: Measurement,
    pub second: Measurement,
    /// `None` when checking is disabled.
    pub check: Option<CheckOutcome>,
}

impl IterationReport {
    /// How many times faster the second method was than the first.
    ///
    /// `1.0` when both durations are zero, `f64::INFINITY` when only the second
    /// one is.
    pub fn speedup(&self) -> f64 {
        let (d1, d2) = (self.first.duration, self.second.duration);
        match (d1.is_zero(), d2.is_zero()) {
            (true, true) => 1.0,
            (false, true) => f64::INFINITY,
            _ => d1.as_secs_f64() / d2.as_secs_f64(),
        }
    }

    /// False only when a check ran and failed.
    pub fn passed(&self) -> bool {
        self.check.map_or(true, |c| c.passed)
    }
}

impl fmt::Display for IterationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.first)?;
        writeln!(f, "{}", self.second)?;
        writeln!(f, "{}", SEPARATOR)?;
        write!(
            f,
            "{} speedup (over {}): {:.3}x",
            self.second.name,
            self.first.name,
            self.speedup()
        )?;
        if let Some(check) = &self.check {
            write!(f, "\n{}", check)?;
        }
        Ok(())
    }
}

/// Totals of a complete run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: usize,
    pub failed_checks: usize,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed_checks == 0
    }
}

/// Drives the timed iterations of one configuration.
///
/// The random source is passed in explicitly so runs can be reproduced from a
/// seed.
pub struct Benchmark<R: Rng> {
    config: BenchConfig,
    rng: R,
}

impl<R: Rng> Benchmark<R> {
    /// Validates `config` and takes ownership of the random source.
    pub fn new(config: BenchConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Runs one iteration and returns its report.
    ///
    /// # Errors
    ///
    /// Propagates allocation and multiplication errors. No matrix outlives the
    /// call either way.
    #[instrument(level = "info", skip(self))]
    pub fn run_iteration(&mut self, index: usize) -> Result<IterationReport> {
        let BenchConfig { m, n, p, .. } = self.config;

        debug!("initializing operands");
        let a = Matrix::random(m, n, &mut self.rng)?;
        let b = Matrix::random(n, p, &mut self.rng)?;

        let (first, c1) = self.timed(self.config.first, &a, &b)?;
        self.cooldown();
        let (second, c2) = self.timed(self.config.second, &a, &b)?;

        let check = if self.config.check {
            let mse = mean_squared_error(&c1, &c2)?;
            let outcome = CheckOutcome::new(mse, self.config.mse_threshold);
            if outcome.passed {
                debug!(mse = outcome.mse, "results agree");
            } else {
                let max_abs = max_abs_error(&c1, &c2)?;
                warn!(
                    mse = outcome.mse,
                    max_abs_error = max_abs,
                    threshold = self.config.mse_threshold,
                    first = first.name,
                    second = second.name,
                    "results disagree"
                );
            }
            Some(outcome)
        } else {
            None
        };

        Ok(IterationReport {
            index,
            first,
            second,
            check,
        })
    }

    /// Runs every iteration, handing each report to `on_report` as soon as it
    /// is ready.
    pub fn run<F>(&mut self, mut on_report: F) -> Result<RunSummary>
    where
        F: FnMut(&IterationReport),
    {
        let mut summary = RunSummary::default();

        for index in 0..self.config.loops {
            let report = self.run_iteration(index)?;
            summary.iterations += 1;
            if !report.passed() {
                summary.failed_checks += 1;
            }
            on_report(&report);

            if self.config.loops != 1 {
                self.cooldown();
            }
        }

        info!(
            iterations = summary.iterations,
            failed_checks = summary.failed_checks,
            "benchmark finished"
        );
        Ok(summary)
    }

    fn timed(&self, method: Method, a: &Matrix, b: &Matrix) -> Result<(Measurement, Matrix)> {
        let multiplier = method.multiplier();
        let start = Instant::now();
        let c = multiplier.multiply(a, b)?;
        let elapsed = start.elapsed();

        let measurement = Measurement::new(multiplier.name(), elapsed, self.config.gflop());
        info!(
            method = measurement.name,
            seconds = elapsed.as_secs_f64(),
            gflops = measurement.gflops,
            "matmul finished"
        );
        Ok((measurement, c))
    }

    fn cooldown(&self) {
        if !self.config.cooldown.is_zero() {
            debug!(seconds = self.config.cooldown.as_secs_f64(), "cooldown");
            thread::sleep(self.config.cooldown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn small_config(first: Method, second: Method) -> BenchConfig {
        BenchConfig {
            m: 17,
            n: 23,
            p: 19,
            first,
            second,
            loops: 1,
            cooldown: Duration::ZERO,
            ..BenchConfig::default()
        }
    }

    fn measurement(name: &'static str, millis: u64) -> Measurement {
        Measurement::new(name, Duration::from_millis(millis), 2.0)
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!((config.m, config.n, config.p), (2048, 2048, 2048));
        assert_eq!(config.first, Method::Goto);
        assert_eq!(config.second, Method::Goto);
        assert_eq!(config.loops, 1);
        assert_eq!(config.cooldown, Duration::from_secs(1));
        assert!(config.check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        for (m, n, p) in [(0, 1, 1), (1, 0, 1), (1, 1, 0)] {
            let config = BenchConfig {
                m,
                n,
                p,
                ..BenchConfig::default()
            };
            assert!(config.validate().is_err(), "{}x{}x{}", m, n, p);
        }
        let config = BenchConfig {
            loops: 0,
            ..BenchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gflop() {
        assert_eq!(gflop(1000, 1000, 1000), 2.0);
        assert_eq!(gflop(2048, 2048, 2048), 2.0 * 2048f64.powi(3) / 1e9);
    }

    #[test]
    fn test_measurement_display() {
        let m = Measurement::new("Naive", Duration::from_millis(500), 1.0);
        assert_eq!(m.gflops, 2.0);
        assert_eq!(m.to_string(), "Naive matmul duration: 0.50000s (2.000 GFLOP/s)");
    }

    #[test]
    fn test_report_display_and_speedup() {
        let report = IterationReport {
            index: 0,
            first: measurement("Naive", 1000),
            second: measurement("Custom GotoBLAS", 250),
            check: Some(CheckOutcome::new(0.0, DEFAULT_MSE_THRESHOLD)),
        };
        assert_eq!(report.speedup(), 4.0);
        assert!(report.passed());

        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Naive matmul duration: 1.00000s (2.000 GFLOP/s)");
        assert_eq!(
            lines[1],
            "Custom GotoBLAS matmul duration: 0.25000s (8.000 GFLOP/s)"
        );
        assert_eq!(lines[2], SEPARATOR);
        assert_eq!(lines[3], "Custom GotoBLAS speedup (over Naive): 4.000x");
        assert_eq!(lines[4], "\x1b[92mMean squared error: 0.000000\x1b[0m");
    }

    #[test]
    fn test_zero_durations_never_produce_nan() {
        let instant = Measurement::new("Naive", Duration::ZERO, 2.0);
        assert_eq!(instant.gflops, f64::INFINITY);

        let both_zero = IterationReport {
            index: 0,
            first: Measurement::new("Naive", Duration::ZERO, 2.0),
            second: Measurement::new("Cache tiled", Duration::ZERO, 2.0),
            check: None,
        };
        assert_eq!(both_zero.speedup(), 1.0);

        let second_zero = IterationReport {
            first: measurement("Naive", 10),
            ..both_zero.clone()
        };
        assert_eq!(second_zero.speedup(), f64::INFINITY);

        let first_zero = IterationReport {
            second: measurement("Cache tiled", 10),
            ..both_zero
        };
        assert_eq!(first_zero.speedup(), 0.0);
        assert!(first_zero.to_string().contains("speedup (over Naive): 0.000x"));
    }

    #[test]
    fn test_failed_check_is_red() {
        let outcome = CheckOutcome::new(2.5, DEFAULT_MSE_THRESHOLD);
        assert!(!outcome.passed);
        assert!(outcome.to_string().starts_with(RED));

        let report = IterationReport {
            index: 0,
            first: measurement("Naive", 10),
            second: measurement("Naive", 10),
            check: Some(outcome),
        };
        assert!(!report.passed());
    }

    #[test]
    fn test_report_without_check() {
        let report = IterationReport {
            index: 0,
            first: measurement("Naive", 10),
            second: measurement("Cache tiled", 5),
            check: None,
        };
        assert!(report.passed());
        assert_eq!(report.to_string().lines().count(), 4);
    }

    #[test]
    fn test_iteration_agrees() {
        let config = small_config(Method::Naive, Method::Goto);
        let mut bench = Benchmark::new(config, StdRng::seed_from_u64(7)).unwrap();
        let report = bench.run_iteration(0).unwrap();

        assert_eq!(report.first.name, "Naive");
        assert_eq!(report.second.name, "Custom GotoBLAS");
        let check = report.check.unwrap();
        // Integer operands: every strategy is exact.
        assert_eq!(check.mse, 0.0);
        assert!(check.passed);
    }

    #[test]
    fn test_run_calls_back_per_iteration() {
        let config = BenchConfig {
            loops: 3,
            check: false,
            ..small_config(Method::Tiled, Method::VecTrans)
        };
        let mut bench = Benchmark::new(config, StdRng::seed_from_u64(1)).unwrap();
        let mut seen = Vec::new();

        let summary = bench.run(|report| seen.push(report.index)).unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(summary.iterations, 3);
        assert!(summary.all_passed());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = BenchConfig {
            loops: 0,
            ..small_config(Method::Naive, Method::Naive)
        };
        assert!(Benchmark::new(config, StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_same_seed_same_operands() {
        let mut r1 = StdRng::seed_from_u64(42);
        let mut r2 = StdRng::seed_from_u64(42);
        let a1 = Matrix::random(8, 8, &mut r1).unwrap();
        let a2 = Matrix::random(8, 8, &mut r2).unwrap();
        assert_eq!(a1, a2);
    }
}
