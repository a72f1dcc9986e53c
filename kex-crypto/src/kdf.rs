#![forbid(unsafe_code)]

use crate::{Error, Result};
use hkdf::Hkdf;
use sha2::Sha256;

/// HKDF-SHA256 extract+expand into `out`.
pub fn hkdf_sha256(salt: Option<&[u8]>, ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<()> {
	let hk = Hkdf::<Sha256>::new(salt, ikm);
	hk.expand(info, out).map_err(|e| Error::Crypto(format!("hkdf expand: {e}")))
}

/// Final session key derivation shared by the classic and PQ methods.
/// Without a seed the raw shared secret is the session key; with a seed the
/// secret is run through HKDF salted by the seed so both parties bind to it.
pub fn bind_to_seed(secret: &[u8], seed: Option<&[u8]>, label: &[u8]) -> Result<Vec<u8>> {
	match seed {
		None => Ok(secret.to_vec()),
		Some(seed) => {
			let mut out = vec![0u8; secret.len()];
			hkdf_sha256(Some(seed), secret, label, &mut out)?;
			Ok(out)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rfc5869_case_1() {
		let ikm = [0x0bu8; 22];
		let salt = hex_literal::hex!("000102030405060708090a0b0c");
		let info = hex_literal::hex!("f0f1f2f3f4f5f6f7f8f9");
		let mut okm = [0u8; 42];
		hkdf_sha256(Some(&salt), &ikm, &info, &mut okm).unwrap();
		assert_eq!(
			okm,
			hex_literal::hex!(
				"3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
			)
		);
	}

	#[test]
	fn rejects_oversized_output() {
		let mut out = vec![0u8; 255 * 32 + 1];
		assert!(matches!(hkdf_sha256(None, b"k", b"i", &mut out), Err(Error::Crypto(_))));
	}

	#[test]
	fn seed_changes_key_but_keeps_length() {
		let raw = [9u8; 32];
		let plain = bind_to_seed(&raw, None, b"l").unwrap();
		assert_eq!(plain, raw.to_vec());
		let a = bind_to_seed(&raw, Some(b"seed-a"), b"l").unwrap();
		let b = bind_to_seed(&raw, Some(b"seed-b"), b"l").unwrap();
		assert_eq!(a.len(), 32);
		assert_ne!(a, b);
		assert_ne!(a, plain);
	}
}
