//! One complete handshake (Alice initiate, Bob respond, Alice finalize) against a fresh session.
//!
//! The session lives in an [`Exchange`] guard whose `Drop` releases it exactly
//! once on every exit path. Alice's private state is consumed by
//! `finalize_alice`, or handed back through `release_private_state` when Bob
//! fails. Messages and keys are owned locals and drop on every exit path
//! (keys wipe themselves).

use crate::error::{HarnessError, Result, Step};
use kex_crypto::{KexMethod, KexSession, RandomSource, SessionKey};
use tracing::{debug, error};

/// Hex view of one message or key, as shown in the traced run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TraceEntry {
	pub label: &'static str,
	pub len: usize,
	pub hex: String,
}

/// Diagnostic record of a traced handshake, filled in step by step. A failed
/// handshake leaves the entries produced before the failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Transcript {
	pub method_name: String,
	pub entries: Vec<TraceEntry>,
	/// Both session keys were derived and compared equal.
	pub matched: bool,
}

impl Transcript {
	pub fn new(method_name: impl Into<String>) -> Self {
		Self { method_name: method_name.into(), ..Self::default() }
	}

	fn push(&mut self, label: &'static str, bytes: &[u8]) {
		debug!(label, len = bytes.len(), hex = %hex::encode_upper(bytes), "handshake value");
		self.entries.push(TraceEntry { label, len: bytes.len(), hex: hex::encode_upper(bytes) });
	}
}

/// Result of a successful handshake.
#[derive(Debug)]
pub struct Handshake {
	pub method_name: String,
	/// Alice's key, byte-identical to Bob's.
	pub key: SessionKey,
}

struct Exchange {
	session: Option<Box<dyn KexSession>>,
}

impl Drop for Exchange {
	fn drop(&mut self) {
		if let Some(session) = self.session.take() {
			session.release();
		}
	}
}

/// Drive one handshake.
///
/// On success the returned key is Alice's (equal to Bob's by construction of
/// the check). With a `transcript`, each message and key is appended in hex as
/// soon as it exists, so the caller keeps a partial record when a step fails.
pub fn run_once(
	method: &dyn KexMethod,
	rng: &mut RandomSource,
	seed: Option<&[u8]>,
	params: Option<&str>,
	mut transcript: Option<&mut Transcript>,
) -> Result<Handshake> {
	let mut ex = Exchange { session: None };
	let session = ex.session.insert(
		method.instantiate(rng, seed, params).map_err(HarnessError::SessionSetup)?,
	);
	let method_name = session.method_name().to_string();
	if let Some(t) = transcript.as_deref_mut() {
		t.method_name.clone_from(&method_name);
	}

	let (state, alice_msg) = session
		.initiate_alice()
		.map_err(|source| HarnessError::ProtocolStep { step: Step::InitiateAlice, source })?;
	if let Some(t) = transcript.as_deref_mut() {
		t.push("Alice message", alice_msg.as_bytes());
	}

	let (bob_msg, bob_key) = match session.respond_bob(&alice_msg) {
		Ok(reply) => reply,
		Err(source) => {
			session.release_private_state(state);
			return Err(HarnessError::ProtocolStep { step: Step::RespondBob, source });
		}
	};
	if let Some(t) = transcript.as_deref_mut() {
		t.push("Bob message", bob_msg.as_bytes());
		t.push("Bob session key", bob_key.as_bytes());
	}

	let alice_key = session
		.finalize_alice(state, &bob_msg)
		.map_err(|source| HarnessError::ProtocolStep { step: Step::FinalizeAlice, source })?;
	if let Some(t) = transcript.as_deref_mut() {
		t.push("Alice session key", alice_key.as_bytes());
	}

	// correctness check, not a secret comparison
	if alice_key.len() != bob_key.len() || alice_key.as_bytes() != bob_key.as_bytes() {
		let err = HarnessError::KeyMismatch {
			alice_len: alice_key.len(),
			bob_len: bob_key.len(),
			alice_hex: hex::encode_upper(alice_key.as_bytes()),
			bob_hex: hex::encode_upper(bob_key.as_bytes()),
		};
		error!(method = %method_name, error = %err, "session key mismatch");
		return Err(err);
	}
	if let Some(t) = transcript {
		t.matched = true;
	}
	debug!(method = %method_name, key_len = alice_key.len(), "session keys match");

	Ok(Handshake { method_name, key: alice_key })
}
