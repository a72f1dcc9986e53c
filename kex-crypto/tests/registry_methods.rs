#![forbid(unsafe_code)]

use kex_crypto::{registry, RandomSource};
use proptest::prelude::*;

fn handshake(name: &str, rng_seed: [u8; 32], seed: Option<&[u8]>) -> (Vec<u8>, Vec<u8>) {
    let method = registry::lookup(name).expect("registered");
    let mut rng = RandomSource::from_seed(rng_seed);
    let mut s = method.instantiate(&mut rng, seed, None).expect("instantiate");
    let (st, m1) = s.initiate_alice().expect("alice_0");
    let (m2, kb) = s.respond_bob(&m1).expect("bob");
    let ka = s.finalize_alice(st, &m2).expect("alice_1");
    let out = (ka.as_bytes().to_vec(), kb.as_bytes().to_vec());
    s.release();
    out
}

#[test]
fn every_registered_method_agrees() {
    for info in registry::methods() {
        let (a, b) = handshake(info.name, [42u8; 32], None);
        assert_eq!(a, b, "{} keys differ", info.name);
        assert!(!a.is_empty());
    }
}

#[test]
fn same_rng_seed_reproduces_keys() {
    for info in registry::methods() {
        let first = handshake(info.name, [7u8; 32], Some(b"repro"));
        let second = handshake(info.name, [7u8; 32], Some(b"repro"));
        assert_eq!(first, second, "{} not reproducible", info.name);
    }
}

#[test]
fn released_private_state_is_not_reusable() {
    let method = registry::lookup("x25519").expect("registered");
    let mut rng = RandomSource::new().expect("os rng");
    let mut s = method.instantiate(&mut rng, None, None).expect("instantiate");
    let (st, _m1) = s.initiate_alice().expect("alice_0");
    // moved: a second release or a finalize with `st` does not compile
    s.release_private_state(st);
    s.release();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn x25519_agrees_for_any_seed(rng_seed in any::<[u8; 32]>(), seed in prop::collection::vec(any::<u8>(), 0..64)) {
        let (a, b) = handshake("x25519", rng_seed, Some(&seed));
        prop_assert_eq!(a, b);
    }
}
