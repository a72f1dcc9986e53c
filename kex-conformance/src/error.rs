use thiserror::Error;

pub type Result<T, E = HarnessError> = core::result::Result<T, E>;

/// Handshake step that can fail after the session exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
	InitiateAlice,
	RespondBob,
	FinalizeAlice,
}

impl core::fmt::Display for Step {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(match self {
			Step::InitiateAlice => "alice initiate",
			Step::RespondBob => "bob respond",
			Step::FinalizeAlice => "alice finalize",
		})
	}
}

/// Why a harness run stopped.
#[derive(Debug, Error)]
pub enum HarnessError {
	/// The OS entropy source could not seed the run's random source.
	#[error("random source unavailable: {0}")]
	RandomSourceUnavailable(#[source] kex_crypto::Error),
	/// `instantiate` returned no session.
	#[error("session setup failed: {0}")]
	SessionSetup(#[source] kex_crypto::Error),
	/// A handshake step failed after the session existed.
	#[error("{step} failed: {source}")]
	ProtocolStep { step: Step, #[source] source: kex_crypto::Error },
	/// Both keys are carried (hex) so the report can show them after release.
	#[error("session keys differ (alice {alice_len} bytes: {alice_hex}, bob {bob_len} bytes: {bob_hex})")]
	KeyMismatch { alice_len: usize, bob_len: usize, alice_hex: String, bob_hex: String },
	/// Any of the above, tagged with the driver iteration it happened in.
	#[error("iteration {iteration} of {total}: {source}")]
	Iteration { iteration: u64, total: u64, #[source] source: Box<HarnessError> },
	#[error("config: {0}")]
	Config(String),
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
}

impl HarnessError {
	pub fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }

	pub(crate) fn at(self, iteration: u64, total: u64) -> Self {
		Self::Iteration { iteration, total, source: Box::new(self) }
	}

	/// Innermost error, with the iteration wrapper peeled off.
	pub fn root(&self) -> &HarnessError {
		match self {
			Self::Iteration { source, .. } => source.root(),
			other => other,
		}
	}

	/// Iteration at which the run stopped, if the error came from the driver loop.
	pub fn iteration(&self) -> Option<u64> {
		match self {
			Self::Iteration { iteration, .. } => Some(*iteration),
			_ => None,
		}
	}

	/// Failing step for `ProtocolStep` errors.
	pub fn step(&self) -> Option<Step> {
		match self.root() {
			Self::ProtocolStep { step, .. } => Some(*step),
			_ => None,
		}
	}
}
