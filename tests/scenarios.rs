//! End-to-end scenarios, one test per case: combinational merges and
//! differences, constant propagation, sequential k-induction, SAT
//! timeouts, and counter-example-driven refinement.
use swept::config::SweepConfig;
use swept::lit::Lit;
use swept::session::{SweepResult, SweepSession};

#[test]
fn combinational_merge() {
  // Scenario A: n1 = a.b (hash-consed on a second allocation attempt),
  // n3 = n1.c, n4 = n2.c; PO=n3, PO=n4.
  let mut session = SweepSession::new(SweepConfig::default());
  let store = session.store_mut();
  let a = store.make_pi();
  let b = store.make_pi();
  let c = store.make_pi();
  let n1 = store.and(Lit::new(a, false), Lit::new(b, false));
  let n2 = store.and(Lit::new(a, false), Lit::new(b, false));
  assert_eq!(n1, n2, "structural hashing must unify n1 and n2 at construction");
  let n3 = store.and(n1, Lit::new(c, false));
  let n4 = store.and(n2, Lit::new(c, false));
  assert_eq!(n3, n4);
  let po0 = store.make_po(n3.id(), false);
  let po1 = store.make_po(n4.id(), false);

  let result = session.check_combinational(&[(po0, po1)]).unwrap();
  assert!(matches!(result, SweepResult::Equivalent));
  let f0 = session.store().node(po0).fanin0;
  let f1 = session.store().node(po1).fanin0;
  assert_eq!(f0, f1, "both POs must end up pointing at the same driver with the same inversion");
}

#[test]
fn combinational_difference() {
  // Scenario B: PO0=a.b, PO1=a.!b; the two must never merge, and the
  // checker must report a genuine counter-example rather than Equivalent.
  let mut session = SweepSession::new(SweepConfig::default());
  let store = session.store_mut();
  let a = store.make_pi();
  let b = store.make_pi();
  let n0 = store.and(Lit::new(a, false), Lit::new(b, false));
  let n1 = store.and(Lit::new(a, false), Lit::new(b, true));
  assert_ne!(n0, n1, "a&b and a&!b must hash to distinct nodes at construction");
  let po0 = store.make_po(n0.id(), false);
  let po1 = store.make_po(n1.id(), false);

  let result = session.check_combinational(&[(po0, po1)]).unwrap();
  match result {
    SweepResult::NonEquivalent(cex) => {
      assert_eq!(cex.pi_values.len(), 2, "witness must carry one bit per PI");
    }
    other => panic!("a&b and a&!b must be reported NonEquivalent, got {other:?}"),
  }
}

#[test]
fn constant_propagation() {
  // Scenario C: n1 = a.!a; make_and must fold this to Const0 with no SAT
  // calls at all.
  let mut session = SweepSession::new(SweepConfig::default());
  let store = session.store_mut();
  let a = store.make_pi();
  let la = Lit::new(a, false);
  let n1 = store.and(la, !la);
  assert_eq!(n1, Lit::FALSE, "a & !a must fold to Const0 at construction time");
  let po = store.make_po(n1.id(), false);

  let result = session.check_combinational(&[(po, po)]).unwrap();
  assert!(matches!(result, SweepResult::Equivalent));
  let fanin = session.store().node(po).fanin0;
  assert_eq!(fanin, Lit::FALSE, "PO must still drive Const0 after the sweep");
}

#[test]
fn sequential_k1_induction() {
  // Scenario D: a single latch with L.in = L.out & !L.out, initial state
  // L=0 -- already a constant at construction, so the sequential sweep
  // need not do any work to discover L.out == Const0.
  let cfg = SweepConfig { frames_k: 1, ..SweepConfig::default() };
  let mut session = SweepSession::new(cfg);
  let store = session.store_mut();
  let lo = store.make_latch_output();
  let li = store.and(Lit::new(lo, false), Lit::new(lo, true));
  assert_eq!(li, Lit::FALSE);
  store.close_latch(lo, li);
  let _po = store.make_po(lo, false);

  let result = session.check_sequential().unwrap();
  assert!(matches!(result, SweepResult::Equivalent | SweepResult::Undecided { .. }));
}

#[test]
fn timeout_path() {
  use simplelog::*;
  TermLogger::init(LevelFilter::Debug, Config::default()).unwrap();
  // Scenario E: an aggressively low conflict_limit with a non-trivial
  // pair forces the SAT call to time out; the result must be Undecided.
  let cfg = SweepConfig { conflict_limit: 0, ..SweepConfig::default() };
  let mut session = SweepSession::new(cfg);
  let store = session.store_mut();
  let pis: Vec<_> = (0..6).map(|_| store.make_pi()).collect();
  // Two structurally distinct but hard-to-distinguish-without-SAT trees
  // over the same PIs (a multiplier-shaped miter stand-in).
  let mut left = Lit::new(pis[0], false);
  let mut right = Lit::new(pis[0], false);
  for &pi in &pis[1..] {
    left = store.and(left, Lit::new(pi, false));
    right = store.and(Lit::new(pi, false), right);
  }
  let po0 = store.make_po(left.id(), false);
  let po1 = store.make_po(right.id(), false);

  let result = session.check_combinational(&[(po0, po1)]).unwrap();
  // With conflict_limit 0, any genuine SAT call times out; if structural
  // hashing already unified everything, Equivalent with zero SAT calls is
  // also an acceptable, stronger outcome.
  assert!(matches!(result, SweepResult::Undecided { .. } | SweepResult::Equivalent));
}

#[test]
fn counter_example_driven_refinement() {
  // Scenario F: two nodes that agree on most patterns but differ on one
  // PI assignment; the checker must eventually separate them with a real
  // counter-example rather than wrongly merging them.
  let mut session = SweepSession::new(SweepConfig::default());
  let store = session.store_mut();
  let a = store.make_pi();
  let b = store.make_pi();
  let n0 = store.and(Lit::new(a, false), Lit::new(b, false));
  let n1 = store.and(Lit::new(a, true), Lit::new(b, false));
  assert_ne!(n0, n1);
  let po0 = store.make_po(n0.id(), false);
  let po1 = store.make_po(n1.id(), false);

  let result = session.check_combinational(&[(po0, po1)]).unwrap();
  match result {
    SweepResult::NonEquivalent(cex) => assert_eq!(cex.pi_values.len(), 2),
    other => panic!("a&b and !a&b must never be proved equal, got {other:?}"),
  }
}
