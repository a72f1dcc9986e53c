//! ML-KEM (Module-Lattice-Based Key-Encapsulation Mechanism, FIPS 203) run as a key exchange.
//! Secure implementation using RustCrypto's ml-kem crate.
//!
//! Alice generates a keypair and sends the encapsulation key; Bob encapsulates
//! to it and answers with the ciphertext; Alice decapsulates.
#![forbid(unsafe_code)]

use crate::kdf::bind_to_seed;
use crate::{Error, KexMethod, KexSession, Message, PrivateState, RandomSource, Result, SessionKey};
use ml_kem::kem::{Decapsulate, Encapsulate};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem1024, MlKem512, MlKem768};
use rand_core::CryptoRngCore;
use tracing::debug;
use zeroize::Zeroize;

/// Sizes for each ML-KEM parameter set.
pub mod sizes {
    pub const SHARED_SECRET: usize = 32;
    pub const ENCAPSULATION_KEY_512: usize = 800;
    pub const CIPHERTEXT_512: usize = 768;
    pub const ENCAPSULATION_KEY_768: usize = 1184;
    pub const CIPHERTEXT_768: usize = 1088;
    pub const ENCAPSULATION_KEY_1024: usize = 1568;
    pub const CIPHERTEXT_1024: usize = 1568;
}

const LBL_SESSION: &[u8] = b"kex-harness/ml-kem/session";

/// ML-KEM parameter set, selected by the named-parameter string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MlKemLevel {
    L512,
    #[default]
    L768,
    L1024,
}

impl MlKemLevel {
    /// Accepts `512`, `768`, `1024`, with or without an `ML-KEM-` / `mlkem` prefix.
    /// An absent or empty string selects the default (768).
    pub fn parse(params: Option<&str>) -> Result<Self> {
        let raw = match params.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(p) => p,
        };
        let lower = raw.to_ascii_lowercase();
        let digits = lower
            .strip_prefix("ml-kem-")
            .or_else(|| lower.strip_prefix("mlkem"))
            .unwrap_or(&lower);
        match digits {
            "512" => Ok(Self::L512),
            "768" => Ok(Self::L768),
            "1024" => Ok(Self::L1024),
            _ => Err(Error::InvalidParameters { method: "ml-kem".into(), params: raw.to_string() }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::L512 => "ML-KEM-512",
            Self::L768 => "ML-KEM-768",
            Self::L1024 => "ML-KEM-1024",
        }
    }
}

/// ML-KEM key exchange; the level comes from the named parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct MlKemMethod;

impl KexMethod for MlKemMethod {
    fn family(&self) -> &'static str { "ml-kem" }

    fn describe(&self) -> &'static str { "ML-KEM (FIPS 203) as KEX; params: 512 | 768 (default) | 1024" }

    fn instantiate(
        &self,
        rng: &mut RandomSource,
        seed: Option<&[u8]>,
        params: Option<&str>,
    ) -> Result<Box<dyn KexSession>> {
        let level = MlKemLevel::parse(params)?;
        let rng = rng.fork();
        let seed = seed.map(<[u8]>::to_vec);
        Ok(match level {
            MlKemLevel::L512 => Box::new(MlKemSession::<MlKem512>::new(level, rng, seed)),
            MlKemLevel::L768 => Box::new(MlKemSession::<MlKem768>::new(level, rng, seed)),
            MlKemLevel::L1024 => Box::new(MlKemSession::<MlKem1024>::new(level, rng, seed)),
        })
    }
}

/// Generate a keypair; returns the decapsulation key and the encoded encapsulation key.
pub(crate) fn keypair<K: KemCore>(rng: &mut impl CryptoRngCore) -> (K::DecapsulationKey, Vec<u8>) {
    let (dk, ek) = K::generate(rng);
    (dk, ek.as_bytes().to_vec())
}

/// Encapsulate to an encoded encapsulation key, returning (ciphertext, shared secret).
pub(crate) fn encapsulate<K: KemCore>(ek_bytes: &[u8], rng: &mut impl CryptoRngCore) -> Result<(Vec<u8>, Vec<u8>)> {
    let encoded = Encoded::<K::EncapsulationKey>::try_from(ek_bytes)
        .map_err(|_| Error::Protocol(format!("invalid ML-KEM encapsulation key length {}", ek_bytes.len())))?;
    let ek = K::EncapsulationKey::from_bytes(&encoded);
    let (ct, shared) = ek
        .encapsulate(rng)
        .map_err(|_| Error::Crypto("ML-KEM encapsulation failed".into()))?;
    Ok((ct.to_vec(), shared.to_vec()))
}

/// Decapsulate an encoded ciphertext.
pub(crate) fn decapsulate<K: KemCore>(dk: &K::DecapsulationKey, ct_bytes: &[u8]) -> Result<Vec<u8>> {
    let ct = Ciphertext::<K>::try_from(ct_bytes)
        .map_err(|_| Error::Protocol(format!("invalid ML-KEM ciphertext length {}", ct_bytes.len())))?;
    let shared = dk
        .decapsulate(&ct)
        .map_err(|_| Error::Crypto("ML-KEM decapsulation failed".into()))?;
    Ok(shared.to_vec())
}

struct MlKemSession<K: KemCore> {
    level: MlKemLevel,
    rng: RandomSource,
    seed: Option<Vec<u8>>,
    _kem: core::marker::PhantomData<K>,
}

impl<K: KemCore> MlKemSession<K> {
    fn new(level: MlKemLevel, rng: RandomSource, seed: Option<Vec<u8>>) -> Self {
        Self { level, rng, seed, _kem: core::marker::PhantomData }
    }
}

struct AliceState<K: KemCore>(K::DecapsulationKey);

impl<K> KexSession for MlKemSession<K>
where
    K: KemCore + Send + 'static,
    K::DecapsulationKey: Send + 'static,
{
    fn method_name(&self) -> &str { self.level.name() }

    fn initiate_alice(&mut self) -> Result<(PrivateState, Message)> {
        let (dk, ek) = keypair::<K>(&mut self.rng);
        debug!(level = self.level.name(), ek_len = ek.len(), "ml-kem alice keypair generated");
        Ok((PrivateState::new(AliceState::<K>(dk)), Message::new(ek)))
    }

    fn respond_bob(&mut self, alice_msg: &Message) -> Result<(Message, SessionKey)> {
        let (ct, mut shared) = encapsulate::<K>(alice_msg.as_bytes(), &mut self.rng)?;
        let key = bind_to_seed(&shared, self.seed.as_deref(), LBL_SESSION);
        shared.zeroize();
        Ok((Message::new(ct), SessionKey::new(key?)))
    }

    fn finalize_alice(&mut self, state: PrivateState, bob_msg: &Message) -> Result<SessionKey> {
        let AliceState(dk) = state.downcast::<AliceState<K>>()?;
        let mut shared = decapsulate::<K>(&dk, bob_msg.as_bytes())?;
        let key = bind_to_seed(&shared, self.seed.as_deref(), LBL_SESSION);
        shared.zeroize();
        Ok(SessionKey::new(key?))
    }
}
