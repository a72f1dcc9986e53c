#![forbid(unsafe_code)]

use crate::{Error, RandomSource, Result};
use std::any::Any;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bytes sent from one party to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(Vec<u8>);

impl Message {
    pub fn new(bytes: Vec<u8>) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<Vec<u8>> for Message {
    fn from(v: Vec<u8>) -> Self { Self(v) }
}

/// Session key derived independently by each party. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn new(bytes: Vec<u8>) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<&[u8]> for SessionKey {
    fn from(v: &[u8]) -> Self { Self(v.to_vec()) }
}

impl core::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionKey").field("len", &self.0.len()).finish_non_exhaustive()
    }
}

/// Alice's ephemeral secret, alive between `initiate_alice` and `finalize_alice`.
///
/// Move-only: it is consumed either by `finalize_alice` or by
/// `release_private_state`, so it cannot outlive the handshake or be used twice.
/// Concrete states are responsible for wiping themselves on drop.
pub struct PrivateState {
    inner: Box<dyn Any + Send>,
}

impl PrivateState {
    pub fn new<T: Any + Send>(state: T) -> Self {
        Self { inner: Box::new(state) }
    }

    /// Recover the concrete state. Fails if the state was produced by a different method.
    pub fn downcast<T: Any + Send>(self) -> Result<T> {
        self.inner.downcast::<T>().map(|b| *b).map_err(|_| Error::StateMismatch)
    }
}

impl core::fmt::Debug for PrivateState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PrivateState(..)")
    }
}

/// A key-exchange algorithm family able to create sessions.
pub trait KexMethod: Send + Sync {
    /// Registry name, e.g. `x25519`.
    fn family(&self) -> &'static str;

    /// One-line description for listings.
    fn describe(&self) -> &'static str;

    /// Bind a session to this method.
    ///
    /// `seed` is optional caller-supplied input mixed into key derivation;
    /// `params` selects a parameter set within the family (method specific).
    fn instantiate(
        &self,
        rng: &mut RandomSource,
        seed: Option<&[u8]>,
        params: Option<&str>,
    ) -> Result<Box<dyn KexSession>>;
}

/// One method bound to one parameter set. Both parties run against the same
/// session; only Alice keeps state between her two steps.
pub trait KexSession: Send {
    /// Diagnostic name, including the parameter set.
    fn method_name(&self) -> &str;

    /// Alice, message 1.
    fn initiate_alice(&mut self) -> Result<(PrivateState, Message)>;

    /// Bob, message 2 plus his session key. Bob keeps no state.
    fn respond_bob(&mut self, alice_msg: &Message) -> Result<(Message, SessionKey)>;

    /// Alice, consume her private state and Bob's message into her session key.
    fn finalize_alice(&mut self, state: PrivateState, bob_msg: &Message) -> Result<SessionKey>;

    /// Release a private state that never reached `finalize_alice`.
    fn release_private_state(&mut self, state: PrivateState) {
        drop(state);
    }

    /// Release the session itself.
    fn release(self: Box<Self>) {}
}
