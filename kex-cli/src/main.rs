#![forbid(unsafe_code)]
//! `kex-harness`: run key-exchange methods through repeated handshakes and report
//! whether every session key matched and how uniform the key bytes look.

use anyhow::Context;
use clap::Parser;
use kex_conformance::{report, HarnessConfig, HarnessDriver, HarnessError};
use kex_crypto::{registry, KexMethod, RandomSource};
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
	name = "kex-harness",
	version,
	about = "Check key-exchange methods for matching session keys and uniform key bytes"
)]
struct Cli {
	/// Method to test (see --list). `default` picks the first registered method.
	#[arg(long, short)]
	method: Option<String>,
	/// Method parameters, e.g. `512`, `768` or `1024` for ml-kem
	#[arg(long, short)]
	params: Option<String>,
	/// Hex seed bound into every derived key
	#[arg(long)]
	seed: Option<String>,
	/// Total handshakes per method, including the traced first one
	#[arg(long, short = 'n')]
	iterations: Option<u64>,
	/// Worker threads for the untraced iterations
	#[arg(long, short = 'j')]
	workers: Option<usize>,
	/// TOML config file
	#[arg(long, env = "KEX_CONFIG")]
	config: Option<PathBuf>,
	/// trace | debug | info | warn | error (RUST_LOG takes precedence)
	#[arg(long)]
	log_level: Option<String>,
	/// Test every registered method with its default parameters
	#[arg(long, conflicts_with_all = ["method", "params"])]
	all: bool,
	/// List registered methods and exit
	#[arg(long)]
	list: bool,
	/// Print reports as JSON
	#[arg(long)]
	json: bool,
}

/// Failures split by exit status.
enum Failure {
	/// Bad flags, file, environment or method name (exit 2).
	Config(anyhow::Error),
	/// Setup, handshake or verification failure (exit 1).
	Run(HarnessError),
	/// Writing the report failed (exit 1).
	Output(io::Error),
}

impl From<io::Error> for Failure {
	fn from(e: io::Error) -> Self { Self::Output(e) }
}

impl Failure {
	fn status(&self) -> u8 {
		match self {
			Self::Config(_) => 2,
			Self::Run(_) | Self::Output(_) => 1,
		}
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(f) => {
			match &f {
				Failure::Config(e) => eprintln!("ERROR: {e:#}"),
				Failure::Run(e) => eprintln!("ERROR: {e}"),
				Failure::Output(e) => eprintln!("ERROR: writing report: {e}"),
			}
			ExitCode::from(f.status())
		}
	}
}

fn run(cli: Cli) -> Result<(), Failure> {
	if cli.list {
		return list_methods(cli.json);
	}
	let mut cfg = resolve_config(&cli).map_err(Failure::Config)?;
	init_logging(&cfg.log_level);
	debug!(?cfg, "effective configuration");

	let methods: Vec<&dyn KexMethod> = if cli.all {
		cfg.params = None;
		registry::all().to_vec()
	} else {
		vec![registry::lookup(&cfg.method).map_err(|e| Failure::Config(e.into()))?]
	};

	let mut rng = RandomSource::new().map_err(|e| {
		error!(error = %e, "random source unavailable");
		Failure::Run(HarnessError::RandomSourceUnavailable(e))
	})?;
	let driver = HarnessDriver::new(cfg);
	let stdout = io::stdout();
	let mut out = stdout.lock();
	let res = run_methods(&driver, &methods, &mut rng, cli.json, cli.all, &mut out);
	drop(rng);
	res
}

/// Run each method in turn. The console sample is written as soon as the
/// traced handshake ends and each summary as soon as its method passes, so
/// a failure keeps everything produced before it. JSON is emitted at the end,
/// or as an error object carrying the partial transcript on failure.
fn run_methods(
	driver: &HarnessDriver,
	methods: &[&dyn KexMethod],
	rng: &mut RandomSource,
	as_json: bool,
	as_array: bool,
	out: &mut impl Write,
) -> Result<(), Failure> {
	let mut reports = Vec::new();
	for &method in methods {
		let mut trace = None;
		let outcome = driver.run_traced(method, rng, |t| {
			if as_json {
				trace = Some(t.clone());
				return Ok(());
			}
			report::write_transcript(&mut *out, t)?;
			out.flush()
		});
		match outcome {
			Ok(r) if as_json => reports.push(r),
			Ok(r) => {
				report::write_summary(&mut *out, &r)?;
				out.flush()?;
			}
			Err(e) => {
				if as_json {
					let v = json!({
						"error": e.to_string(),
						"method": method.family(),
						"transcript": trace,
						"completed": reports,
					});
					write_json(&mut *out, &v)?;
				}
				return Err(Failure::Run(e));
			}
		}
	}
	if as_json {
		let value = match reports.as_slice() {
			[single] if !as_array => serde_json::to_value(single),
			all => serde_json::to_value(all),
		}
		.map_err(io::Error::other)?;
		write_json(out, &value)?;
	}
	Ok(())
}

fn write_json(out: &mut impl Write, v: &serde_json::Value) -> io::Result<()> {
	serde_json::to_writer_pretty(&mut *out, v).map_err(io::Error::other)?;
	writeln!(out)?;
	out.flush()
}

/// Defaults, then the config file, then `KEX_*` environment, then flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<HarnessConfig> {
	let mut cfg = match &cli.config {
		Some(path) => HarnessConfig::load_from_file(path).with_context(|| format!("loading {}", path.display()))?,
		None => HarnessConfig::default(),
	};
	cfg.apply_env_from(|k| std::env::var(k).ok())?;
	if let Some(m) = &cli.method { cfg.method = m.clone(); }
	if let Some(p) = &cli.params { cfg.params = Some(p.clone()); }
	if let Some(s) = &cli.seed { cfg.seed = Some(s.clone()); }
	if let Some(n) = cli.iterations { cfg.iterations = n; }
	if let Some(w) = cli.workers { cfg.workers = w; }
	if let Some(l) = &cli.log_level { cfg.log_level = l.clone(); }
	cfg.validate()?;
	Ok(cfg)
}

fn init_logging(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.try_init();
}

fn list_methods(as_json: bool) -> Result<(), Failure> {
	let stdout = io::stdout();
	let mut out = stdout.lock();
	let methods = registry::methods();
	if as_json {
		let v: Vec<_> = methods.iter().map(|m| json!({ "name": m.name, "description": m.description })).collect();
		write_json(&mut out, &serde_json::Value::Array(v))?;
	} else {
		for m in methods {
			writeln!(out, "{:<18} {}", m.name, m.description)?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_override_defaults() {
		let cli = Cli::parse_from(["kex-harness", "--method", "x25519", "-n", "7", "-j", "2"]);
		let cfg = resolve_config(&cli).unwrap();
		assert_eq!(cfg.method, "x25519");
		assert_eq!(cfg.iterations, 7);
		assert_eq!(cfg.workers, 2);
	}

	#[test]
	fn zero_iterations_is_a_config_error() {
		let cli = Cli::parse_from(["kex-harness", "-n", "0"]);
		assert!(resolve_config(&cli).is_err());
	}

	#[test]
	fn bob_failure_keeps_the_sample_and_exits_with_failure() {
		use kex_conformance::stub::{FaultSchedule, StubFault, StubMethod};
		use kex_conformance::Step;

		let m = StubMethod::constant(vec![0xAA; 4]).with_fault(StubFault::Step(Step::RespondBob), FaultSchedule::Always);
		let driver = HarnessDriver::new(HarnessConfig { iterations: 10, ..Default::default() });
		let mut rng = RandomSource::from_seed([0u8; 32]);
		let mut buf = Vec::new();
		let failure = run_methods(&driver, &[&m], &mut rng, false, false, &mut buf).unwrap_err();
		assert!(matches!(failure, Failure::Run(ref e) if e.step() == Some(Step::RespondBob)));
		assert_eq!(failure.status(), 1);
		let out = String::from_utf8(buf).unwrap();
		assert!(out.contains("Sample computation for key exchange method stub"));
		assert!(out.contains("Alice message"));
		assert!(!out.contains("All session keys matched."));
	}

	#[test]
	fn later_mismatch_keeps_the_sample() {
		use kex_conformance::stub::{FaultSchedule, StubFault, StubMethod};

		let m = StubMethod::constant(vec![0x42; 4]).with_fault(StubFault::Mismatch, FaultSchedule::On(7));
		let driver = HarnessDriver::new(HarnessConfig { iterations: 500, ..Default::default() });
		let mut rng = RandomSource::from_seed([0u8; 32]);
		let mut buf = Vec::new();
		let failure = run_methods(&driver, &[&m], &mut rng, false, false, &mut buf).unwrap_err();
		assert!(matches!(failure, Failure::Run(ref e) if e.iteration() == Some(7)));
		let out = String::from_utf8(buf).unwrap();
		assert!(out.contains("Alice session key    (   4 bytes):  42424242"));
		assert!(out.contains("Alice and Bob's session keys match."));
	}

	#[test]
	fn passed_methods_are_written_before_a_later_one_fails() {
		use kex_conformance::stub::{FaultSchedule, StubFault, StubMethod};

		let good = StubMethod::constant(vec![1, 2, 3]);
		let bad = StubMethod::constant(vec![1]).with_fault(StubFault::Setup, FaultSchedule::Always);
		let driver = HarnessDriver::new(HarnessConfig { iterations: 3, ..Default::default() });
		let mut rng = RandomSource::from_seed([0u8; 32]);
		let mut buf = Vec::new();
		let failure = run_methods(&driver, &[&good, &bad], &mut rng, false, true, &mut buf).unwrap_err();
		assert_eq!(failure.status(), 1);
		let out = String::from_utf8(buf).unwrap();
		assert_eq!(out.matches("All session keys matched.").count(), 1);
	}

	#[test]
	fn json_failure_carries_partial_transcript() {
		use kex_conformance::stub::{FaultSchedule, StubFault, StubMethod};
		use kex_conformance::Step;

		let m = StubMethod::constant(vec![5]).with_fault(StubFault::Step(Step::FinalizeAlice), FaultSchedule::Always);
		let driver = HarnessDriver::new(HarnessConfig { iterations: 2, ..Default::default() });
		let mut rng = RandomSource::from_seed([0u8; 32]);
		let mut buf = Vec::new();
		assert!(run_methods(&driver, &[&m], &mut rng, true, false, &mut buf).is_err());
		let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
		assert_eq!(v["method"], "stub");
		assert_eq!(v["transcript"]["entries"].as_array().map(Vec::len), Some(3));
		assert_eq!(v["transcript"]["matched"], false);
	}

	#[test]
	fn config_errors_exit_with_two() {
		assert_eq!(Failure::Config(anyhow::anyhow!("bad")).status(), 2);
		assert_eq!(Failure::Output(io::Error::other("closed")).status(), 1);
	}

	#[test]
	fn all_conflicts_with_method() {
		assert!(Cli::try_parse_from(["kex-harness", "--all", "--method", "x25519"]).is_err());
	}
}
