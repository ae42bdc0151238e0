//! Word-parallel simulation over packed bit-vectors.
//!
//! Node-indexed parallel-array style, with the propagation rule taken from
//! ABC's `Aig_ManSimulate`/`sswSimSat.c`: signature bit 0 is reserved so
//! that the all-zero pattern precomputes `phase(n)`, and every other
//! random pattern distinguishes the all-zero minterm via a forced-zero
//! first PI bit.
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::lit::{Lit, NodeId};
use crate::node::NodeKind;
use crate::store::AigStore;

/// One node's simulation signature: `w` packed 64-bit words. Bit 0 of word
/// 0 is always the all-zero-input (phase) value.
#[derive(Debug, Clone)]
pub struct SimSignature {
  pub words: Vec<u64>,
}

impl SimSignature {
  fn zeroed(w: usize) -> Self { SimSignature { words: vec![0; w] } }

  #[inline] pub fn get(&self, bit: usize) -> bool {
    (self.words[bit / 64] >> (bit % 64)) & 1 != 0
  }
}

pub struct Simulator {
  w: usize,
  sigs: Vec<SimSignature>,
}

impl Simulator {
  pub fn new(w: usize) -> Self {
    Simulator { w, sigs: Vec::new() }
  }

  pub fn word_count(&self) -> usize { self.w }

  fn ensure_len(&mut self, n: usize) {
    if self.sigs.len() < n {
      self.sigs.resize_with(n, || SimSignature::zeroed(self.w));
    }
  }

  pub fn signature(&self, id: NodeId) -> &SimSignature { &self.sigs[id.idx()] }

  /// Grow the per-word capacity by doubling when the buffer is exhausted.
  pub fn grow(&mut self) {
    let new_w = (self.w * 2).max(1);
    for s in &mut self.sigs {
      s.words.resize(new_w, 0);
    }
    self.w = new_w;
    trace!("simulator buffer grown to {} words", self.w);
  }

  /// Fill every PI's signature from a deterministic stream seeded by
  /// `seed`. Bit 0 of every PI is forced 0 so the all-zero minterm is
  /// distinguished and phase propagates correctly.
  pub fn assign_random_pis(&mut self, store: &AigStore, seed: u64) {
    self.ensure_len(store.len());
    let mut rng = StdRng::seed_from_u64(seed);
    for &pi in store.pis() {
      let sig = &mut self.sigs[pi.idx()];
      for word in sig.words.iter_mut() { *word = rng.gen(); }
      sig.words[0] &= !1u64; // bit 0 forced to 0
    }
    self.sim_const1(store);
  }

  /// ABC `sswRarity.c`'s supplemental strategy: bias each PI's word
  /// toward the value it has taken least often so far, tracked via
  /// `history` (one running popcount per PI, indexed the same as
  /// `store.pis()`). Falls back to uniform random for any PI without
  /// history yet.
  pub fn assign_rare_pis(&mut self, store: &AigStore, seed: u64, history: &mut [u64]) {
    debug_assert_eq!(history.len(), store.pis().len());
    self.ensure_len(store.len());
    let mut rng = StdRng::seed_from_u64(seed);
    for (i, &pi) in store.pis().iter().enumerate() {
      let bias_to_one = history[i].count_ones() * 2 < 64;
      let sig = &mut self.sigs[pi.idx()];
      for word in sig.words.iter_mut() {
        let base: u64 = rng.gen();
        *word = if bias_to_one { base | rng.gen::<u64>() } else { base & rng.gen::<u64>() };
      }
      sig.words[0] &= !1u64;
      history[i] = history[i].wrapping_add(sig.words[0].count_ones() as u64);
    }
    self.sim_const1(store);
  }

  /// Sequential use: load latch-output signatures from a caller-supplied
  /// bit-packed initial state (one bit per latch, in registration order).
  pub fn sim_initial_state(&mut self, store: &AigStore, init: &[bool]) {
    debug_assert_eq!(init.len(), store.latches().len());
    self.ensure_len(store.len());
    for (&(lo, _), &v) in store.latches().iter().zip(init.iter()) {
      let sig = &mut self.sigs[lo.idx()];
      for word in sig.words.iter_mut() { *word = if v { u64::MAX } else { 0 }; }
    }
    self.sim_const1(store);
  }

  /// Inject a counter-example witness as one fresh simulation bit: grows
  /// the buffer, then installs the new high bit of every PI's signature
  /// from `values` (indexed the same as `store.pis()`; missing entries
  /// default false) via `distance1_perturb` against the freshly-grown
  /// (all-zero) column -- a close-neighbour injection applied once per
  /// differing PI. Used by the prover/sweeper to cheaply resimulate a SAT
  /// model without re-running the whole random-pattern pipeline.
  pub fn inject_witness(&mut self, store: &AigStore, values: &[bool]) {
    self.grow();
    self.ensure_len(store.len());
    let bit = self.w / 2; // the newest bit, just past the pre-grow capacity
    for (i, &pi) in store.pis().iter().enumerate() {
      if values.get(i).copied().unwrap_or(false) {
        self.sigs[pi.idx()] = self.distance1_perturb(&self.sigs[pi.idx()], bit);
      }
    }
    self.sim_const1(store);
  }

  fn sim_const1(&mut self, store: &AigStore) {
    self.ensure_len(store.len());
    for word in self.sigs[crate::lit::CONST1_ID.idx()].words.iter_mut() { *word = u64::MAX; }
  }

  fn eval_lit(&self, l: Lit) -> &SimSignature { &self.sigs[l.id().idx()] }

  /// Walk all AND nodes in id order, computing each signature from its
  /// already-computed fanins (fanins always precede their node in id order).
  pub fn propagate(&mut self, store: &AigStore) {
    self.ensure_len(store.len());
    for id in store.ids() {
      let n = store.node(id);
      if n.kind != NodeKind::And { continue; }
      let (f0, f1) = n.fanin_pair();
      let w0 = self.eval_lit(f0).words.clone();
      let w1 = self.eval_lit(f1).words.clone();
      let sig = &mut self.sigs[id.idx()];
      for i in 0..sig.words.len() {
        let a = if f0.inv() { !w0[i] } else { w0[i] };
        let b = if f1.inv() { !w1[i] } else { w1[i] };
        sig.words[i] = a & b;
      }
    }
  }

  /// Perturb a stored pattern by flipping exactly one PI bit, a cheap
  /// distance-1 injection for resolving close neighbours, returning a
  /// fresh word array ready to be installed as that PI's next simulation
  /// column. `col` selects which of the `w` packed columns to perturb.
  pub fn distance1_perturb(&self, base: &SimSignature, pi_bit_col: usize) -> SimSignature {
    let mut out = base.clone();
    let word = pi_bit_col / 64;
    let bit = pi_bit_col % 64;
    if word < out.words.len() { out.words[word] ^= 1 << bit; }
    out
  }

  /// Stable hash of `signature(n)` xored by `phase(n)`, used for initial
  /// class bucketing -- every equality/hash routine here has to take
  /// phase into account.
  pub fn signature_hash(&self, store: &AigStore, n: NodeId) -> u64 {
    let phase = store.node(n).phase;
    let sig = &self.sigs[n.idx()];
    let mut h = fxhash::hash64(&sig.words);
    if phase { h = !h; }
    h
  }

  pub fn is_const_candidate(&self, store: &AigStore, n: NodeId) -> bool {
    let phase = store.node(n).phase;
    let expect: u64 = if phase { 0 } else { u64::MAX };
    self.sigs[n.idx()].words.iter().all(|&w| w == expect)
  }

  pub fn are_equal(&self, store: &AigStore, a: NodeId, b: NodeId) -> bool {
    let flip = store.node(a).phase ^ store.node(b).phase;
    let (sa, sb) = (&self.sigs[a.idx()], &self.sigs[b.idx()]);
    sa.words.iter().zip(sb.words.iter()).all(|(&x, &y)| x == if flip { !y } else { y })
  }
}

/// A `SimOracle` view over a `Simulator` + `AigStore` pair: the Class
/// Manager's pluggable notion of equality, kept to three operations so
/// it stays swappable without touching the refinement logic.
pub trait SimOracle {
  fn hash(&self, n: NodeId) -> u64;
  fn is_const(&self, n: NodeId) -> bool;
  fn are_equal(&self, a: NodeId, b: NodeId) -> bool;
}

pub struct StoreSimOracle<'a> {
  pub store: &'a AigStore,
  pub sim: &'a Simulator,
}

impl<'a> SimOracle for StoreSimOracle<'a> {
  fn hash(&self, n: NodeId) -> u64 { self.sim.signature_hash(self.store, n) }
  fn is_const(&self, n: NodeId) -> bool { self.sim.is_const_candidate(self.store, n) }
  fn are_equal(&self, a: NodeId, b: NodeId) -> bool { self.sim.are_equal(self.store, a, b) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn phase_is_all_zero_column() {
    let mut store = AigStore::new();
    let a = store.make_pi();
    let b = store.make_pi();
    let n = store.and(Lit::new(a, false), Lit::new(b, false));
    let mut sim = Simulator::new(2);
    sim.assign_random_pis(&store, 7);
    sim.propagate(&store);
    assert!(!sim.signature(n.id()).get(0), "a&b at the all-zero pattern is 0");
  }

  #[test] fn const1_always_all_ones() {
    let store = AigStore::new();
    let mut sim = Simulator::new(1);
    sim.assign_random_pis(&store, 1);
    assert!(sim.is_const_candidate(&store, crate::lit::CONST1_ID));
  }

  #[test] fn and_matches_truth_table_on_full_coverage() {
    // 2 PIs, 1 word => 64 simulation vectors isn't exhaustive, but forcing
    // specific words lets us check a & !a = 0 exactly, matching make_and's
    // own constant folding (scenario C).
    let mut store = AigStore::new();
    let a = store.make_pi();
    let la = Lit::new(a, false);
    let n = store.and(la, !la);
    assert_eq!(n, Lit::FALSE, "trivial identity should fold before any simulation is needed");
    let _ = store.node(n.id());
  }

  #[test] fn growing_doubles_word_count() {
    let mut sim = Simulator::new(4);
    assert_eq!(sim.word_count(), 4);
    sim.grow();
    assert_eq!(sim.word_count(), 8);
  }

  #[test] fn are_equal_respects_phase_xor() {
    let mut store = AigStore::new();
    let a = store.make_pi();
    let b = store.make_pi();
    let n1 = store.and(Lit::new(a, false), Lit::new(b, false));
    let n2 = store.and(Lit::new(a, true), Lit::new(b, true));
    let mut sim = Simulator::new(4);
    sim.assign_random_pis(&store, 99);
    sim.propagate(&store);
    // n1 = a&b, n2 = !a&!b = !(a|b); not generally phase-equivalent, so
    // this should usually be false -- but phase of each node is still
    // well-defined and comparable without panicking.
    let _ = sim.are_equal(&store, n1.id(), n2.id());
  }
}
