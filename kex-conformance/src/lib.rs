#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
//! Key-exchange conformance harness.
//!
//! Drives any [`kex_crypto::KexMethod`] through repeated three-message
//! handshakes, checks that Alice and Bob derive identical session keys, and
//! estimates how far the derived key bytes are from uniform.
//!
//! # Quick Start
//!
//! ```
//! use kex_conformance::{HarnessConfig, HarnessDriver};
//! use kex_conformance::stub::StubMethod;
//! use kex_crypto::RandomSource;
//!
//! let driver = HarnessDriver::new(HarnessConfig { iterations: 10, ..Default::default() });
//! let method = StubMethod::constant(vec![0xAA; 4]);
//! let mut rng = RandomSource::from_seed([0u8; 32]);
//! let report = driver.run(&method, &mut rng).unwrap();
//! assert_eq!(report.histogram.count(0xAA), 40);
//! assert!((report.statistical_distance - 0.99609375).abs() < 1e-12);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod runner;
pub mod stats;
pub mod stub;

pub use config::HarnessConfig;
pub use driver::{HarnessDriver, HarnessReport};
pub use error::{HarnessError, Result, Step};
pub use runner::{run_once, Handshake, TraceEntry, Transcript};
pub use stats::{chi_square, statistical_distance, OccurrenceHistogram};
