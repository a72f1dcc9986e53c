//! Ephemeral-ephemeral X25519.
//!
//! Message 1 is Alice's public key, message 2 is Bob's public key; both
//! sides compute the Diffie-Hellman secret. Low-order peer keys (which force
//! an all-zero secret) fail the step instead of yielding a predictable key.
#![forbid(unsafe_code)]

use crate::kdf::bind_to_seed;
use crate::{Error, KexMethod, KexSession, Message, PrivateState, RandomSource, Result, SessionKey};
use tracing::debug;
use x25519_dalek::{EphemeralSecret, PublicKey};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SESSION_KEY_SIZE: usize = 32;

const LBL_SESSION: &[u8] = b"kex-harness/x25519/session";

/// Classic X25519 key exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct X25519Method;

impl KexMethod for X25519Method {
    fn family(&self) -> &'static str { "x25519" }

    fn describe(&self) -> &'static str { "ephemeral X25519 Diffie-Hellman (RFC 7748)" }

    fn instantiate(
        &self,
        rng: &mut RandomSource,
        seed: Option<&[u8]>,
        params: Option<&str>,
    ) -> Result<Box<dyn KexSession>> {
        super::no_params(self.family(), params)?;
        Ok(Box::new(X25519Session { rng: rng.fork(), seed: seed.map(<[u8]>::to_vec) }))
    }
}

struct X25519Session {
    rng: RandomSource,
    seed: Option<Vec<u8>>,
}

/// Alice's ephemeral scalar (zeroized by x25519-dalek on drop).
struct AliceState(EphemeralSecret);

pub(crate) fn parse_public(bytes: &[u8], who: &str) -> Result<PublicKey> {
    let arr: [u8; PUBLIC_KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| Error::Protocol(format!("{who} x25519 public key must be {PUBLIC_KEY_SIZE} bytes, got {}", bytes.len())))?;
    Ok(PublicKey::from(arr))
}

/// DH with a contributory check. Returns the raw 32-byte secret.
pub(crate) fn agree(sk: EphemeralSecret, peer: &PublicKey) -> Result<[u8; 32]> {
    let shared = sk.diffie_hellman(peer);
    if !shared.was_contributory() {
        return Err(Error::Protocol("x25519 peer key is low order".into()));
    }
    Ok(shared.to_bytes())
}

impl KexSession for X25519Session {
    fn method_name(&self) -> &str { "X25519" }

    fn initiate_alice(&mut self) -> Result<(PrivateState, Message)> {
        let sk = EphemeralSecret::random_from_rng(&mut self.rng);
        let pk = PublicKey::from(&sk);
        Ok((PrivateState::new(AliceState(sk)), Message::new(pk.as_bytes().to_vec())))
    }

    fn respond_bob(&mut self, alice_msg: &Message) -> Result<(Message, SessionKey)> {
        let alice_pk = parse_public(alice_msg.as_bytes(), "alice")?;
        let sk = EphemeralSecret::random_from_rng(&mut self.rng);
        let pk = PublicKey::from(&sk);
        let mut secret = agree(sk, &alice_pk)?;
        let key = bind_to_seed(&secret, self.seed.as_deref(), LBL_SESSION);
        zeroize::Zeroize::zeroize(&mut secret);
        debug!("x25519 bob derived session key");
        Ok((Message::new(pk.as_bytes().to_vec()), SessionKey::new(key?)))
    }

    fn finalize_alice(&mut self, state: PrivateState, bob_msg: &Message) -> Result<SessionKey> {
        let AliceState(sk) = state.downcast::<AliceState>()?;
        let bob_pk = parse_public(bob_msg.as_bytes(), "bob")?;
        let mut secret = agree(sk, &bob_pk)?;
        let key = bind_to_seed(&secret, self.seed.as_deref(), LBL_SESSION);
        zeroize::Zeroize::zeroize(&mut secret);
        Ok(SessionKey::new(key?))
    }
}
