//! Deterministic stub methods for exercising the harness itself.
//!
//! A [`StubMethod`] always derives the same fixed key on both sides, can be told
//! to fail a given step (or to hand out mismatching keys) on a chosen
//! handshake, and counts every acquisition and release through shared
//! [`StubCounters`].

use crate::error::Step;
use kex_crypto::{Error, KexMethod, KexSession, Message, PrivateState, RandomSource, Result, SessionKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What goes wrong when the fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubFault {
	/// `instantiate` returns no session.
	Setup,
	/// The given step returns an error.
	Step(Step),
	/// Alice derives a key that differs from Bob's in its last byte.
	Mismatch,
	/// Alice derives a key one byte longer than Bob's.
	LengthMismatch,
}

/// Which handshakes (1-based, in `instantiate` call order) the fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSchedule {
	Always,
	On(u64),
	After(u64),
}

impl FaultSchedule {
	fn fires(self, handshake: u64) -> bool {
		match self {
			Self::Always => true,
			Self::On(n) => handshake == n,
			Self::After(n) => handshake > n,
		}
	}
}

/// Acquisition/release bookkeeping shared by a stub method and its sessions.
#[derive(Debug, Default)]
pub struct StubCounters {
	pub attempts: AtomicU64,
	pub instantiations: AtomicU64,
	pub sessions_released: AtomicU64,
	pub sessions_dropped: AtomicU64,
	pub states_issued: AtomicU64,
	pub states_released: AtomicU64,
	pub states_finalized: AtomicU64,
	pub states_dropped: AtomicU64,
	pub messages_sent: AtomicU64,
	pub keys_derived: AtomicU64,
}

impl StubCounters {
	pub fn get(counter: &AtomicU64) -> u64 { counter.load(Ordering::SeqCst) }

	/// Every session that was created was released once and dropped once, and
	/// every issued private state was consumed once (finalized or released) and dropped once.
	pub fn balanced(&self) -> bool {
		let sessions = Self::get(&self.instantiations);
		let states = Self::get(&self.states_issued);
		Self::get(&self.sessions_released) == sessions
			&& Self::get(&self.sessions_dropped) == sessions
			&& Self::get(&self.states_released) + Self::get(&self.states_finalized) == states
			&& Self::get(&self.states_dropped) == states
	}
}

/// Fixed-key method with an optional injected fault.
#[derive(Debug, Clone)]
pub struct StubMethod {
	key: Vec<u8>,
	fault: Option<(StubFault, FaultSchedule)>,
	counters: Arc<StubCounters>,
}

impl StubMethod {
	/// Both parties always derive `key`.
	pub fn constant(key: Vec<u8>) -> Self {
		Self { key, fault: None, counters: Arc::new(StubCounters::default()) }
	}

	pub fn with_fault(mut self, fault: StubFault, schedule: FaultSchedule) -> Self {
		self.fault = Some((fault, schedule));
		self
	}

	pub fn counters(&self) -> Arc<StubCounters> { self.counters.clone() }

	fn fault_for(&self, handshake: u64) -> Option<StubFault> {
		self.fault.and_then(|(f, sched)| sched.fires(handshake).then_some(f))
	}
}

impl KexMethod for StubMethod {
	fn family(&self) -> &'static str { "stub" }

	fn describe(&self) -> &'static str { "fixed-key stub for harness tests" }

	fn instantiate(
		&self,
		_rng: &mut RandomSource,
		_seed: Option<&[u8]>,
		_params: Option<&str>,
	) -> Result<Box<dyn KexSession>> {
		let handshake = self.counters.attempts.fetch_add(1, Ordering::SeqCst) + 1;
		let fault = self.fault_for(handshake);
		if fault == Some(StubFault::Setup) {
			return Err(Error::Protocol("stub refuses to instantiate".into()));
		}
		self.counters.instantiations.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(StubSession { key: self.key.clone(), fault, counters: self.counters.clone() }))
	}
}

struct StubSession {
	key: Vec<u8>,
	fault: Option<StubFault>,
	counters: Arc<StubCounters>,
}

struct StubState {
	counters: Arc<StubCounters>,
}

impl Drop for StubState {
	fn drop(&mut self) {
		self.counters.states_dropped.fetch_add(1, Ordering::SeqCst);
	}
}

impl StubSession {
	fn check(&self, step: Step) -> Result<()> {
		if self.fault == Some(StubFault::Step(step)) {
			return Err(Error::Protocol(format!("stub fault at {step}")));
		}
		Ok(())
	}
}

impl KexSession for StubSession {
	fn method_name(&self) -> &str { "stub" }

	fn initiate_alice(&mut self) -> Result<(PrivateState, Message)> {
		self.check(Step::InitiateAlice)?;
		self.counters.states_issued.fetch_add(1, Ordering::SeqCst);
		self.counters.messages_sent.fetch_add(1, Ordering::SeqCst);
		let state = PrivateState::new(StubState { counters: self.counters.clone() });
		Ok((state, Message::new(b"alice".to_vec())))
	}

	fn respond_bob(&mut self, alice_msg: &Message) -> Result<(Message, SessionKey)> {
		self.check(Step::RespondBob)?;
		if alice_msg.as_bytes() != b"alice" {
			return Err(Error::Protocol("stub bob: unexpected message".into()));
		}
		self.counters.messages_sent.fetch_add(1, Ordering::SeqCst);
		self.counters.keys_derived.fetch_add(1, Ordering::SeqCst);
		Ok((Message::new(b"bob".to_vec()), SessionKey::new(self.key.clone())))
	}

	fn finalize_alice(&mut self, state: PrivateState, bob_msg: &Message) -> Result<SessionKey> {
		let state = state.downcast::<StubState>()?;
		state.counters.states_finalized.fetch_add(1, Ordering::SeqCst);
		drop(state);
		self.check(Step::FinalizeAlice)?;
		if bob_msg.as_bytes() != b"bob" {
			return Err(Error::Protocol("stub alice: unexpected message".into()));
		}
		self.counters.keys_derived.fetch_add(1, Ordering::SeqCst);
		let mut key = self.key.clone();
		match self.fault {
			Some(StubFault::Mismatch) => {
				if let Some(last) = key.last_mut() {
					*last ^= 0xFF;
				} else {
					key.push(0);
				}
			}
			Some(StubFault::LengthMismatch) => key.push(0),
			_ => {}
		}
		Ok(SessionKey::new(key))
	}

	fn release_private_state(&mut self, state: PrivateState) {
		self.counters.states_released.fetch_add(1, Ordering::SeqCst);
		drop(state);
	}

	fn release(self: Box<Self>) {
		self.counters.sessions_released.fetch_add(1, Ordering::SeqCst);
	}
}

impl Drop for StubSession {
	fn drop(&mut self) {
		self.counters.sessions_dropped.fetch_add(1, Ordering::SeqCst);
	}
}
