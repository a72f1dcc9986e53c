//! Repeated handshakes for one method/parameter combination.
//!
//! Iteration 1 is traced; iterations 2..=N feed the byte histogram. Any
//! failure stops the run: nothing after the failing iteration is attempted
//! (sequential mode) or reported (parallel mode, where the lowest-numbered
//! failing iteration wins).

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::runner::{run_once, Handshake, Transcript};
use crate::stats::{chi_square, statistical_distance, OccurrenceHistogram};
use kex_crypto::{registry, KexMethod, RandomSource};
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error, info};

/// Summary of a completed run. Produced only when every iteration passed.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
	/// Registry name of the method.
	pub family: String,
	/// Session display name, including the parameter set.
	pub method_name: String,
	pub params: Option<String>,
	pub iterations: u64,
	pub workers: usize,
	/// Record of iteration 1.
	pub transcript: Option<Transcript>,
	#[serde(skip)]
	pub histogram: OccurrenceHistogram,
	/// Key bytes accumulated into the histogram.
	pub bytes_sampled: u64,
	pub statistical_distance: f64,
	pub chi_square: Option<f64>,
	pub elapsed_ms: u64,
}

/// Runs one method (or every registered method) for the configured number of iterations.
#[derive(Debug, Clone)]
pub struct HarnessDriver {
	config: HarnessConfig,
}

fn ignore_trace(_: &Transcript) -> io::Result<()> { Ok(()) }

struct ChunkOutcome {
	histogram: OccurrenceHistogram,
	failure: Option<(u64, HarnessError)>,
}

impl HarnessDriver {
	pub fn new(config: HarnessConfig) -> Self { Self { config } }

	pub fn config(&self) -> &HarnessConfig { &self.config }

	/// Run `method` with the configured parameters for the configured number of iterations.
	pub fn run(&self, method: &dyn KexMethod, rng: &mut RandomSource) -> Result<HarnessReport> {
		self.run_traced(method, rng, ignore_trace)
	}

	/// Like [`run`](Self::run), but hands the iteration-1 transcript to
	/// `on_trace` as soon as that handshake ends, before any later iteration
	/// starts. A failed first handshake still delivers its partial transcript.
	pub fn run_traced<F>(&self, method: &dyn KexMethod, rng: &mut RandomSource, mut on_trace: F) -> Result<HarnessReport>
	where
		F: FnMut(&Transcript) -> io::Result<()>,
	{
		let params = self.config.params.clone();
		self.run_with(method, params.as_deref(), rng, &mut on_trace)
	}

	/// Run every registered method with its default parameters, stopping at the first failure.
	pub fn run_all(&self, rng: &mut RandomSource) -> Result<Vec<HarnessReport>> {
		registry::all().iter().map(|m| self.run_with(*m, None, rng, &mut ignore_trace)).collect()
	}

	fn run_with(
		&self,
		method: &dyn KexMethod,
		params: Option<&str>,
		rng: &mut RandomSource,
		on_trace: &mut dyn FnMut(&Transcript) -> io::Result<()>,
	) -> Result<HarnessReport> {
		self.config.validate()?;
		let total = self.config.iterations;
		let seed = self.config.seed_bytes()?;
		let started = Instant::now();
		info!(method = method.family(), params = ?params, iterations = total, workers = self.config.workers, "harness run started");

		let mut transcript = Transcript::new(method.family());
		let first = run_once(method, rng, seed.as_deref(), params, Some(&mut transcript));
		let emitted = on_trace(&transcript);
		let Handshake { method_name, key } = first.map_err(|e| {
			error!(method = method.family(), error = %e, "traced handshake failed");
			e.at(1, total)
		})?;
		emitted?;
		let mut histogram = OccurrenceHistogram::new();
		histogram.record(key.as_bytes());
		drop(key);

		if self.config.workers <= 1 || total < 3 {
			self.sequential(method, rng, seed.as_deref(), params, &mut histogram)?;
		} else {
			self.parallel(method, rng, seed.as_deref(), params, &mut histogram)?;
		}

		let distance = statistical_distance(&histogram);
		let chi = chi_square(&histogram);
		let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
		info!(method = %method_name, iterations = total, distance, elapsed_ms, "all session keys matched");
		Ok(HarnessReport {
			family: method.family().to_string(),
			method_name,
			params: params.map(str::to_string),
			iterations: total,
			workers: self.config.workers,
			transcript: Some(transcript),
			bytes_sampled: histogram.total(),
			histogram,
			statistical_distance: distance,
			chi_square: chi,
			elapsed_ms,
		})
	}

	fn sequential(
		&self,
		method: &dyn KexMethod,
		rng: &mut RandomSource,
		seed: Option<&[u8]>,
		params: Option<&str>,
		histogram: &mut OccurrenceHistogram,
	) -> Result<()> {
		let total = self.config.iterations;
		for i in 2..=total {
			match run_once(method, rng, seed, params, None) {
				Ok(hs) => histogram.record(hs.key.as_bytes()),
				Err(e) => {
					error!(method = method.family(), iteration = i, error = %e, "handshake failed");
					return Err(e.at(i, total));
				}
			}
		}
		Ok(())
	}

	/// Iterations 2..=N split into one contiguous chunk per worker, run on the
	/// rayon pool. Each chunk owns a forked random source and a partial
	/// histogram. A chunk stops once its next iteration is past the lowest
	/// failure seen so far, so every iteration below the reported failure has run.
	fn parallel(
		&self,
		method: &dyn KexMethod,
		rng: &mut RandomSource,
		seed: Option<&[u8]>,
		params: Option<&str>,
		histogram: &mut OccurrenceHistogram,
	) -> Result<()> {
		let total = self.config.iterations;
		let span = total - 1;
		let workers = self.config.workers.min(usize::try_from(span).unwrap_or(usize::MAX)).max(1);
		let chunk = span.div_ceil(workers as u64);
		let lowest_failure = AtomicU64::new(u64::MAX);
		let forks: Vec<RandomSource> = (0..workers).map(|_| rng.fork()).collect();

		let outcomes: Vec<ChunkOutcome> = forks
			.into_par_iter()
			.enumerate()
			.map(|(w, mut wrng)| {
				let start = 2 + w as u64 * chunk;
				let end = (start + chunk - 1).min(total);
				let mut local = OccurrenceHistogram::new();
				debug!(worker = w, start, end, "chunk started");
				for i in start..=end {
					if i > lowest_failure.load(Ordering::Acquire) {
						break;
					}
					match run_once(method, &mut wrng, seed, params, None) {
						Ok(hs) => local.record(hs.key.as_bytes()),
						Err(e) => {
							lowest_failure.fetch_min(i, Ordering::AcqRel);
							return ChunkOutcome { histogram: local, failure: Some((i, e)) };
						}
					}
				}
				ChunkOutcome { histogram: local, failure: None }
			})
			.collect();

		let mut first_failure: Option<(u64, HarnessError)> = None;
		for outcome in outcomes {
			histogram.merge(&outcome.histogram);
			if let Some((i, e)) = outcome.failure {
				if first_failure.as_ref().map_or(true, |(j, _)| i < *j) {
					first_failure = Some((i, e));
				}
			}
		}
		match first_failure {
			Some((i, e)) => {
				error!(method = method.family(), iteration = i, error = %e, "handshake failed");
				Err(e.at(i, total))
			}
			None => Ok(()),
		}
	}
}
