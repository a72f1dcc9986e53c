use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Iteration count used when nothing else is configured.
pub const DEFAULT_ITERATIONS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
	/// Registry name of the method under test.
	pub method: String,
	/// Named parameters handed to the method (e.g. `768` for ML-KEM).
	pub params: Option<String>,
	/// Optional seed, hex encoded.
	pub seed: Option<String>,
	/// Total handshakes, including the traced first one.
	pub iterations: u64,
	/// Worker threads for iterations 2..=N.
	pub workers: usize,
	pub log_level: String,
}

impl Default for HarnessConfig {
	fn default() -> Self {
		Self {
			method: "ml-kem".into(),
			params: None,
			seed: None,
			iterations: DEFAULT_ITERATIONS,
			workers: 1,
			log_level: "warn".into(),
		}
	}
}

impl HarnessConfig {
	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		let cfg: Self = toml::from_str(&data).map_err(|e| HarnessError::config(format!("toml parse error: {e}")))?;
		cfg.validate()?;
		Ok(cfg)
	}

	/// Defaults overlaid with `KEX_*` environment variables.
	pub fn from_env() -> Result<Self> {
		let mut cfg = Self::default();
		cfg.apply_env_from(|k| std::env::var(k).ok())?;
		cfg.validate()?;
		Ok(cfg)
	}

	/// Overlay `KEX_*` variables looked up through `get`.
	pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
		if let Some(v) = get("KEX_METHOD") { self.method = v; }
		if let Some(v) = get("KEX_PARAMS") { self.params = Some(v).filter(|p| !p.trim().is_empty()); }
		if let Some(v) = get("KEX_SEED") { self.seed = Some(v).filter(|s| !s.trim().is_empty()); }
		if let Some(v) = get("KEX_ITERATIONS") {
			self.iterations = v.trim().parse().map_err(|e| HarnessError::config(format!("KEX_ITERATIONS: {e}")))?;
		}
		if let Some(v) = get("KEX_WORKERS") {
			self.workers = v.trim().parse().map_err(|e| HarnessError::config(format!("KEX_WORKERS: {e}")))?;
		}
		if let Some(v) = get("KEX_LOG_LEVEL") { self.log_level = v; }
		Ok(())
	}

	pub fn validate(&self) -> Result<()> {
		let allowed = ["trace", "debug", "info", "warn", "error"];
		if !allowed.contains(&self.log_level.as_str()) {
			return Err(HarnessError::config(format!("invalid log_level: {}", self.log_level)));
		}
		if self.method.trim().is_empty() {
			return Err(HarnessError::config("method must not be empty"));
		}
		if self.iterations == 0 {
			return Err(HarnessError::config("iterations must be at least 1"));
		}
		if self.workers == 0 {
			return Err(HarnessError::config("workers must be at least 1"));
		}
		self.seed_bytes()?;
		Ok(())
	}

	/// Decoded seed, `None` when unset.
	pub fn seed_bytes(&self) -> Result<Option<Vec<u8>>> {
		self.seed
			.as_deref()
			.map(|s| hex::decode(s.trim()).map_err(|e| HarnessError::config(format!("seed is not valid hex: {e}"))))
			.transpose()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn defaults_validate() {
		let cfg = HarnessConfig::default();
		cfg.validate().unwrap();
		assert_eq!(cfg.iterations, 500);
		assert_eq!(cfg.seed_bytes().unwrap(), None);
	}

	#[test]
	fn env_overlay() {
		let env: HashMap<&str, &str> = [
			("KEX_METHOD", "x25519"),
			("KEX_ITERATIONS", "12"),
			("KEX_SEED", "00ff"),
			("KEX_PARAMS", ""),
		]
		.into_iter()
		.collect();
		let mut cfg = HarnessConfig::default();
		cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(cfg.method, "x25519");
		assert_eq!(cfg.iterations, 12);
		assert_eq!(cfg.params, None);
		assert_eq!(cfg.seed_bytes().unwrap(), Some(vec![0x00, 0xff]));
	}

	#[test]
	fn bad_env_number_is_config_error() {
		let mut cfg = HarnessConfig::default();
		let err = cfg.apply_env_from(|k| (k == "KEX_WORKERS").then(|| "many".to_string())).unwrap_err();
		assert!(matches!(err, HarnessError::Config(_)));
	}

	#[test]
	fn validate_rejects_bad_values() {
		let zero = HarnessConfig { iterations: 0, ..Default::default() };
		assert!(zero.validate().is_err());
		let level = HarnessConfig { log_level: "loud".into(), ..Default::default() };
		assert!(level.validate().is_err());
		let seed = HarnessConfig { seed: Some("abc".into()), ..Default::default() };
		assert!(seed.validate().is_err());
		let workers = HarnessConfig { workers: 0, ..Default::default() };
		assert!(workers.validate().is_err());
	}

	#[test]
	fn toml_file_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("kex.toml");
		std::fs::write(&path, "method = \"x25519\"\niterations = 20\nworkers = 2\n").unwrap();
		let cfg = HarnessConfig::load_from_file(&path).unwrap();
		assert_eq!(cfg.method, "x25519");
		assert_eq!(cfg.iterations, 20);
		assert_eq!(cfg.workers, 2);
		assert_eq!(cfg.log_level, "warn");
	}

	#[test]
	fn toml_unknown_key_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("kex.toml");
		std::fs::write(&path, "iteratons = 20\n").unwrap();
		assert!(matches!(HarnessConfig::load_from_file(&path), Err(HarnessError::Config(_))));
	}
}
