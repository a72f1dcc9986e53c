//!
//! Pluggable key-exchange methods behind the three-message handshake
//! (Alice initiate, Bob respond, Alice finalize).
//! - Method / Session: object-safe traits every algorithm implements
//! - RandomSource: ChaCha20 CSPRNG seeded from the OS, forkable per session
//! - Methods: X25519 (classic), ML-KEM 512/768/1024, X25519+ML-KEM-768 hybrid
//! - Registry: lookup of a method by name
#![forbid(unsafe_code)]
#![warn(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unreachable,
    clippy::todo,
    clippy::unimplemented
)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![allow(missing_docs)]

/// Key derivation helpers (HKDF-SHA256).
pub mod kdf;
/// Handshake traits and the values exchanged between the parties.
pub mod method;
/// Concrete key-exchange methods.
pub mod methods;
/// Method lookup by name.
pub mod registry;
/// Random source shared by all handshakes of a run.
pub mod rng;

pub use method::{KexMethod, KexSession, Message, PrivateState, SessionKey};
pub use registry::{lookup, methods, MethodInfo};
pub use rng::RandomSource;

/// Error type for method setup and handshake steps.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("random source unavailable: {0}")]
    /// The OS entropy source could not be read
    RandomUnavailable(String),
    #[error("unknown key exchange method: {0}")]
    /// No method registered under this name
    UnknownMethod(String),
    #[error("invalid named parameters for {method}: {params}")]
    /// Named parameters not understood by the method
    InvalidParameters { method: String, params: String },
    #[error("Protocol error: {0}")]
    /// Malformed or unexpected message
    Protocol(String),
    #[error("Cryptographic operation failed: {0}")]
    /// Cryptographic operation failed
    Crypto(String),
    #[error("private state does not belong to this session")]
    /// A private state produced by another method was handed back
    StateMismatch,
}

/// Convenient Result alias for this crate.
pub type Result<T> = core::result::Result<T, Error>;
