#![forbid(unsafe_code)]

use crate::{Error, KexMethod, Result};

#[cfg(feature = "hybrid")]
use crate::methods::HybridMethod;
#[cfg(feature = "ml-kem")]
use crate::methods::MlKemMethod;
#[cfg(feature = "classic")]
use crate::methods::X25519Method;

/// Name and description of a registered method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: &'static str,
    pub description: &'static str,
}

static REGISTRY: &[&'static dyn KexMethod] = &[
    #[cfg(feature = "classic")]
    &X25519Method,
    #[cfg(feature = "ml-kem")]
    &MlKemMethod,
    #[cfg(feature = "hybrid")]
    &HybridMethod,
];

/// Every method compiled into this build, in registration order.
pub fn all() -> &'static [&'static dyn KexMethod] {
    REGISTRY
}

/// Listing of every method compiled into this build.
pub fn methods() -> Vec<MethodInfo> {
    REGISTRY
        .iter()
        .map(|m| MethodInfo { name: m.family(), description: m.describe() })
        .collect()
}

/// Find a method by name (case-insensitive). `default` picks the first registered method.
pub fn lookup(name: &str) -> Result<&'static dyn KexMethod> {
    let wanted = name.trim();
    if wanted.eq_ignore_ascii_case("default") {
        return REGISTRY.first().copied().ok_or_else(|| Error::UnknownMethod(name.to_string()));
    }
    REGISTRY
        .iter()
        .copied()
        .find(|m| m.family().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| Error::UnknownMethod(name.to_string()))
}
