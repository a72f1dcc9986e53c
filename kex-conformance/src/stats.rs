//! Byte-frequency accumulation over derived key material and distance-from-uniform estimates.

/// Number of distinct byte values.
pub const BUCKETS: usize = 256;

/// Per-byte-value occurrence counts across every successful session key of a run.
///
/// Counts only grow; the histogram is never reset mid-run. Parallel workers
/// keep their own histogram and [`merge`](Self::merge) at the end.
#[derive(Clone, PartialEq, Eq)]
pub struct OccurrenceHistogram {
	counts: [u64; BUCKETS],
}

impl Default for OccurrenceHistogram {
	fn default() -> Self { Self { counts: [0; BUCKETS] } }
}

impl OccurrenceHistogram {
	pub fn new() -> Self { Self::default() }

	/// Count every byte of `bytes`.
	pub fn record(&mut self, bytes: &[u8]) {
		for &b in bytes {
			self.counts[b as usize] += 1;
		}
	}

	pub fn merge(&mut self, other: &OccurrenceHistogram) {
		for (c, o) in self.counts.iter_mut().zip(other.counts.iter()) {
			*c += *o;
		}
	}

	pub fn count(&self, byte: u8) -> u64 { self.counts[byte as usize] }

	pub fn counts(&self) -> &[u64; BUCKETS] { &self.counts }

	/// Total number of recorded bytes.
	pub fn total(&self) -> u64 { self.counts.iter().sum() }

	pub fn is_empty(&self) -> bool { self.counts.iter().all(|&c| c == 0) }

	/// Non-zero buckets as (byte, count), ascending by byte.
	pub fn nonzero(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
		self.counts.iter().enumerate().filter(|(_, &c)| c > 0).map(|(i, &c)| (i as u8, c))
	}
}

impl core::fmt::Debug for OccurrenceHistogram {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_map().entries(self.nonzero().map(|(b, c)| (format!("{b:#04x}"), c))).finish()
	}
}

/// Total variation distance between the observed byte distribution and uniform:
/// `0.5 * sum_i |count[i]/T - 1/256|`, in `[0, 1]`.
///
/// An empty histogram (`T == 0`) has no distribution to compare; it reports `0.0`.
pub fn statistical_distance(hist: &OccurrenceHistogram) -> f64 {
	let total = hist.total();
	if total == 0 {
		return 0.0;
	}
	let t = total as f64;
	let uniform = 1.0 / BUCKETS as f64;
	let sum: f64 = hist.counts().iter().map(|&c| (c as f64 / t - uniform).abs()).sum();
	(0.5 * sum).clamp(0.0, 1.0)
}

/// Pearson chi-square statistic against the uniform expectation (255 degrees of freedom).
/// `None` for an empty histogram.
pub fn chi_square(hist: &OccurrenceHistogram) -> Option<f64> {
	let total = hist.total();
	if total == 0 {
		return None;
	}
	let expected = total as f64 / BUCKETS as f64;
	Some(
		hist.counts()
			.iter()
			.map(|&c| {
				let d = c as f64 - expected;
				d * d / expected
			})
			.sum(),
	)
}
