//! Concrete key-exchange methods. Each one is a zero-sized [`KexMethod`](crate::KexMethod)
//! whose sessions fork their own [`RandomSource`](crate::RandomSource).

#[cfg(feature = "hybrid")]
pub mod hybrid;
#[cfg(feature = "ml-kem")]
pub mod mlkem;
#[cfg(feature = "classic")]
pub mod x25519;

#[cfg(feature = "hybrid")]
pub use hybrid::HybridMethod;
#[cfg(feature = "ml-kem")]
pub use mlkem::{MlKemLevel, MlKemMethod};
#[cfg(feature = "classic")]
pub use x25519::X25519Method;

/// Reject a non-empty parameter string for methods that take none.
#[allow(dead_code)]
pub(crate) fn no_params(method: &str, params: Option<&str>) -> crate::Result<()> {
    match params.map(str::trim) {
        None | Some("") => Ok(()),
        Some(p) => Err(crate::Error::InvalidParameters { method: method.to_string(), params: p.to_string() }),
    }
}
