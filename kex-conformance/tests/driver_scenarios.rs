use kex_conformance::stub::{FaultSchedule, StubCounters, StubFault, StubMethod};
use kex_conformance::{HarnessConfig, HarnessDriver, HarnessError, Step};
use kex_crypto::{registry, RandomSource};

fn driver(iterations: u64) -> HarnessDriver {
    HarnessDriver::new(HarnessConfig { iterations, ..Default::default() })
}

fn rng() -> RandomSource {
    RandomSource::from_seed([7u8; 32])
}

#[test]
fn constant_key_is_maximally_non_uniform() {
    let m = StubMethod::constant(vec![0xAA; 4]);
    let r = driver(10).run(&m, &mut rng()).unwrap();
    assert_eq!(r.histogram.count(0xAA), 40);
    assert_eq!(r.histogram.nonzero().count(), 1);
    assert_eq!(r.bytes_sampled, 40);
    assert!((r.statistical_distance - (1.0 - 1.0 / 256.0)).abs() < 1e-12);
    assert_eq!(StubCounters::get(&m.counters().instantiations), 10);
    assert!(m.counters().balanced());
}

#[test]
fn bob_failure_stops_at_first_iteration() {
    let m = StubMethod::constant(vec![1, 2, 3])
        .with_fault(StubFault::Step(Step::RespondBob), FaultSchedule::Always);
    let err = driver(500).run(&m, &mut rng()).unwrap_err();
    assert_eq!(err.iteration(), Some(1));
    assert_eq!(err.step(), Some(Step::RespondBob));
    assert_eq!(StubCounters::get(&m.counters().attempts), 1);
    assert!(m.counters().balanced());
}

#[test]
fn mismatch_on_seventh_handshake_stops_the_run() {
    let m = StubMethod::constant(vec![0x42; 16]).with_fault(StubFault::Mismatch, FaultSchedule::On(7));
    let err = driver(500).run(&m, &mut rng()).unwrap_err();
    assert_eq!(err.iteration(), Some(7));
    assert!(matches!(err.root(), HarnessError::KeyMismatch { .. }));
    assert_eq!(StubCounters::get(&m.counters().attempts), 7);
    assert!(m.counters().balanced());
    assert!(err.to_string().starts_with("iteration 7 of 500:"));
}

#[test]
fn setup_failure_mid_run_reports_its_iteration() {
    let m = StubMethod::constant(vec![1]).with_fault(StubFault::Setup, FaultSchedule::On(3));
    let err = driver(20).run(&m, &mut rng()).unwrap_err();
    assert_eq!(err.iteration(), Some(3));
    assert!(matches!(err.root(), HarnessError::SessionSetup(_)));
    assert_eq!(StubCounters::get(&m.counters().instantiations), 2);
    assert!(m.counters().balanced());
}

#[test]
fn parallel_run_stops_at_lowest_failure() {
    let m = StubMethod::constant(vec![3; 4]).with_fault(StubFault::LengthMismatch, FaultSchedule::After(1));
    let d = HarnessDriver::new(HarnessConfig { iterations: 64, workers: 3, ..Default::default() });
    let err = d.run(&m, &mut rng()).unwrap_err();
    assert_eq!(err.iteration(), Some(2));
    assert!(m.counters().balanced());
}

#[test]
fn x25519_keys_match_and_look_uniform() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let m = registry::lookup("x25519").unwrap();
    let r = driver(64).run(m, &mut rng()).unwrap();
    assert_eq!(r.bytes_sampled, 64 * 32);
    assert!(r.statistical_distance > 0.0);
    assert!(r.statistical_distance < 0.5, "distance {}", r.statistical_distance);
    let t = r.transcript.expect("first iteration is traced");
    assert_eq!(t.entries.len(), 4);
    assert_eq!(t.entries[2].hex, t.entries[3].hex);
}

#[test]
fn run_all_covers_every_registered_method() {
    let reports = driver(3).run_all(&mut rng()).unwrap();
    assert_eq!(reports.len(), registry::all().len());
    for r in &reports {
        assert!(r.bytes_sampled > 0, "{} sampled nothing", r.method_name);
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let m = registry::lookup("x25519").unwrap();
    let cfg = HarnessConfig { iterations: 5, seed: Some("00112233".into()), ..Default::default() };
    let a = HarnessDriver::new(cfg.clone()).run(m, &mut rng()).unwrap();
    let b = HarnessDriver::new(cfg).run(m, &mut rng()).unwrap();
    assert_eq!(a.histogram, b.histogram);
}

#[test]
fn json_report_omits_histogram_counts() {
    let m = StubMethod::constant(vec![0xAA; 4]);
    let r = driver(2).run(&m, &mut rng()).unwrap();
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v["method_name"], "stub");
    assert_eq!(v["iterations"], 2);
    assert!(v.get("histogram").is_none());
    assert_eq!(v["transcript"]["entries"][0]["label"], "Alice message");
}
