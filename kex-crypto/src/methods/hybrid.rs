//! Hybrid (classic + PQ) key exchange: X25519 and ML-KEM-768 run side by side.
//!
//! - msg1 = Alice X25519 public key (32) || ML-KEM-768 encapsulation key (1184)
//! - msg2 = Bob X25519 public key (32) || ML-KEM-768 ciphertext (1088)
//! - session key = HKDF-SHA256(salt = seed, ikm = dh || kem, info = label), 32 bytes
//!
//! Breaking the session key requires breaking both components.

#![forbid(unsafe_code)]

use super::mlkem::{self, sizes};
use super::x25519::{agree, parse_public, PUBLIC_KEY_SIZE};
use crate::kdf::hkdf_sha256;
use crate::{Error, KexMethod, KexSession, Message, PrivateState, RandomSource, Result, SessionKey};
use ml_kem::{KemCore, MlKem768};
use tracing::debug;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroize;

pub const MSG1_SIZE: usize = PUBLIC_KEY_SIZE + sizes::ENCAPSULATION_KEY_768;
pub const MSG2_SIZE: usize = PUBLIC_KEY_SIZE + sizes::CIPHERTEXT_768;
pub const SESSION_KEY_SIZE: usize = 32;

const LBL_SESSION: &[u8] = b"kex-harness/x25519-mlkem768/session";

/// X25519 + ML-KEM-768 hybrid key exchange.
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridMethod;

impl KexMethod for HybridMethod {
	fn family(&self) -> &'static str { "x25519-mlkem768" }

	fn describe(&self) -> &'static str { "hybrid X25519 + ML-KEM-768, HKDF-SHA256 combiner" }

	fn instantiate(
		&self,
		rng: &mut RandomSource,
		seed: Option<&[u8]>,
		params: Option<&str>,
	) -> Result<Box<dyn KexSession>> {
		super::no_params(self.family(), params)?;
		Ok(Box::new(HybridSession { rng: rng.fork(), seed: seed.map(<[u8]>::to_vec) }))
	}
}

struct HybridSession {
	rng: RandomSource,
	seed: Option<Vec<u8>>,
}

struct AliceState {
	x_sk: EphemeralSecret,
	pq_dk: <MlKem768 as KemCore>::DecapsulationKey,
}

fn split(msg: &Message, expected: usize, what: &str) -> Result<(PublicKey, Vec<u8>)> {
	let bytes = msg.as_bytes();
	if bytes.len() != expected {
		return Err(Error::Protocol(format!("hybrid {what} must be {expected} bytes, got {}", bytes.len())));
	}
	let (x, pq) = bytes.split_at(PUBLIC_KEY_SIZE);
	Ok((parse_public(x, what)?, pq.to_vec()))
}

fn combine(dh: &[u8; 32], kem: &[u8], seed: Option<&[u8]>) -> Result<SessionKey> {
	let mut ikm = Vec::with_capacity(dh.len() + kem.len());
	ikm.extend_from_slice(dh);
	ikm.extend_from_slice(kem);
	let mut out = vec![0u8; SESSION_KEY_SIZE];
	let res = hkdf_sha256(seed, &ikm, LBL_SESSION, &mut out);
	ikm.zeroize();
	res?;
	Ok(SessionKey::new(out))
}

impl KexSession for HybridSession {
	fn method_name(&self) -> &str { "X25519+ML-KEM-768" }

	fn initiate_alice(&mut self) -> Result<(PrivateState, Message)> {
		let x_sk = EphemeralSecret::random_from_rng(&mut self.rng);
		let x_pk = PublicKey::from(&x_sk);
		let (pq_dk, ek) = mlkem::keypair::<MlKem768>(&mut self.rng);
		let mut msg1 = Vec::with_capacity(MSG1_SIZE);
		msg1.extend_from_slice(x_pk.as_bytes());
		msg1.extend_from_slice(&ek);
		Ok((PrivateState::new(AliceState { x_sk, pq_dk }), Message::new(msg1)))
	}

	fn respond_bob(&mut self, alice_msg: &Message) -> Result<(Message, SessionKey)> {
		let (alice_x, ek) = split(alice_msg, MSG1_SIZE, "msg1")?;
		let (ct, mut kem) = mlkem::encapsulate::<MlKem768>(&ek, &mut self.rng)?;
		let x_sk = EphemeralSecret::random_from_rng(&mut self.rng);
		let x_pk = PublicKey::from(&x_sk);
		let mut dh = agree(x_sk, &alice_x)?;
		let key = combine(&dh, &kem, self.seed.as_deref());
		dh.zeroize();
		kem.zeroize();
		let mut msg2 = Vec::with_capacity(MSG2_SIZE);
		msg2.extend_from_slice(x_pk.as_bytes());
		msg2.extend_from_slice(&ct);
		debug!("hybrid bob combined classic and pq secrets");
		Ok((Message::new(msg2), key?))
	}

	fn finalize_alice(&mut self, state: PrivateState, bob_msg: &Message) -> Result<SessionKey> {
		let AliceState { x_sk, pq_dk } = state.downcast::<AliceState>()?;
		let (bob_x, ct) = split(bob_msg, MSG2_SIZE, "msg2")?;
		let mut kem = mlkem::decapsulate::<MlKem768>(&pq_dk, &ct)?;
		let mut dh = agree(x_sk, &bob_x)?;
		let key = combine(&dh, &kem, self.seed.as_deref());
		dh.zeroize();
		kem.zeroize();
		key
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hybrid_roundtrip_with_and_without_seed() {
		for seed in [None, Some(&b"hybrid-test"[..])] {
			let mut rng = RandomSource::from_seed([21u8; 32]);
			let mut s = HybridMethod.instantiate(&mut rng, seed, None).unwrap();
			let (st, m1) = s.initiate_alice().unwrap();
			assert_eq!(m1.len(), MSG1_SIZE);
			let (m2, kb) = s.respond_bob(&m1).unwrap();
			assert_eq!(m2.len(), MSG2_SIZE);
			let ka = s.finalize_alice(st, &m2).unwrap();
			assert_eq!(ka, kb);
			assert_eq!(ka.len(), SESSION_KEY_SIZE);
		}
	}

	#[test]
	fn tampered_classic_half_breaks_agreement() {
		let mut rng = RandomSource::from_seed([22u8; 32]);
		let mut s = HybridMethod.instantiate(&mut rng, None, None).unwrap();
		let (st, m1) = s.initiate_alice().unwrap();
		let (m2, kb) = s.respond_bob(&m1).unwrap();
		let mut bytes = m2.as_bytes().to_vec();
		bytes[0] ^= 0x01;
		// A flipped bit still decodes as a point; the keys just diverge.
		match s.finalize_alice(st, &Message::new(bytes)) {
			Ok(ka) => assert_ne!(ka, kb),
			Err(e) => assert!(matches!(e, Error::Protocol(_))),
		}
	}

	#[test]
	fn wrong_length_msg1_fails() {
		let mut rng = RandomSource::from_seed([23u8; 32]);
		let mut s = HybridMethod.instantiate(&mut rng, None, None).unwrap();
		assert!(matches!(s.respond_bob(&Message::new(vec![9u8; 40])), Err(Error::Protocol(_))));
	}
}
