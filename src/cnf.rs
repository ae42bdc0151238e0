//! On-demand, memoized CNF encoding of AIG cones.
//!
//! Grounded on ABC's `aig/aigDfs.c` supergate collection and
//! `aig/aigMuxes.c` pattern detection, expressed here as small free
//! functions over the store rather than an OOP wrapper type.
use log::trace;

use crate::lit::{Lit, NodeId};
use crate::node::NodeKind;
use crate::store::AigStore;

/// A DIMACS-style signed literal: `var` numbered from 1, sign carried
/// separately so callers don't need to reason about two's-complement
/// packing the way the encoder does internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CnfLit { pub var: u32, pub neg: bool }

impl CnfLit {
  pub fn pos(var: u32) -> Self { CnfLit { var, neg: false } }
  pub fn neg(var: u32) -> Self { CnfLit { var, neg: true } }
  pub fn flip(self) -> Self { CnfLit { var: self.var, neg: !self.neg } }
}

pub type Clause = Vec<CnfLit>;

/// Maps AIG node ids to SAT variable numbers and memoizes which nodes
/// have already had their defining clauses emitted. Cleared in lock-step
/// with `SatFrontend::recycle()`.
#[derive(Debug, Default)]
pub struct CnfEncoder {
  next_var: u32,
  pub polar_flip: bool,
  pending: Vec<Clause>,
}

impl CnfEncoder {
  pub fn new(polar_flip: bool) -> Self {
    // Variable 0 is reserved unused; variable 1 is Const1, forced true by
    // a unit clause the SAT frontend emits once at construction time.
    CnfEncoder { next_var: 2, polar_flip, pending: Vec::new() }
  }

  pub fn drain_clauses(&mut self) -> Vec<Clause> { std::mem::take(&mut self.pending) }

  /// Allocate a variable not bound to any AIG node (used by the SAT
  /// frontend for Tseitin auxiliaries like the xor-gate variable in
  /// `ask_equivalent`).
  pub fn next_fresh_var(&mut self) -> u32 {
    let v = self.next_var;
    self.next_var += 1;
    v
  }

  fn alloc_var(&mut self, store: &AigStore, id: NodeId) -> u32 {
    let n = store.node(id);
    if n.scratch >= 0 { return n.scratch as u32; }
    let v = self.next_var;
    self.next_var += 1;
    v
  }

  fn var_of(&mut self, store: &mut AigStore, id: NodeId) -> u32 {
    if id == crate::lit::CONST1_ID { return 1; }
    let existing = store.node(id).scratch;
    if existing >= 0 { return existing as u32; }
    let v = self.alloc_var(store, id);
    store.node_mut(id).scratch = v as i32;
    v
  }

  fn lit_to_cnf(&mut self, store: &mut AigStore, l: Lit) -> CnfLit {
    let v = self.var_of(store, l.id());
    if l.inv() { CnfLit::neg(v) } else { CnfLit::pos(v) }
  }

  /// Encode the cone rooted at `target`, breadth-first, stopping at
  /// already-encoded nodes (their `scratch` field already holds a SAT
  /// var). Idempotent: a second call on the same node emits nothing new.
  pub fn encode_cone(&mut self, store: &mut AigStore, target: NodeId) -> CnfLit {
    let mut frontier = vec![target];
    let mut seen = hashbrown::HashSet::new();
    while let Some(id) = frontier.pop() {
      if !seen.insert(id) { continue; }
      if store.node(id).scratch >= 0 { continue; }
      if !store.node(id).is_and() {
        self.var_of(store, id);
        continue;
      }
      if let Some(mux_leaves) = self.try_mux(store, id) {
        self.encode_mux(store, id, mux_leaves);
        for l in [mux_leaves.0, mux_leaves.1, mux_leaves.2] { frontier.push(l.id()); }
        continue;
      }
      let (supergate, leaves) = self.collect_supergate(store, id);
      self.encode_supergate(store, id, &supergate, &leaves);
      for l in &leaves { frontier.push(l.id()); }
    }
    let v = self.var_of(store, target);
    CnfLit::pos(v)
  }

  /// Collapse the maximal AND-tree rooted at `root` that does not cross an
  /// inverted internal edge, a PI, or a multi-fanout node. Returns the
  /// interior node ids (for bookkeeping) and the leaf literals.
  fn collect_supergate(&self, store: &AigStore, root: NodeId) -> (Vec<NodeId>, Vec<Lit>) {
    let mut interior = vec![root];
    let mut leaves = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
      let n = store.node(id);
      for l in [n.fanin0, n.fanin1] {
        let child = store.node(l.id());
        let crosses_inverter = l.inv();
        let multi_fanout = child.refs > 1;
        if !crosses_inverter && !multi_fanout && child.is_and() {
          interior.push(l.id());
          stack.push(l.id());
        } else {
          leaves.push(l);
        }
      }
    }
    (interior, leaves)
  }

  fn encode_supergate(&mut self, store: &mut AigStore, root: NodeId, _interior: &[NodeId], leaves: &[Lit]) {
    let rv = self.alloc_var(store, root);
    store.node_mut(root).scratch = rv as i32;
    let root_lit = self.polarity_adjust(store, root, CnfLit::pos(rv));

    let mut leaf_lits = Vec::with_capacity(leaves.len());
    for &l in leaves { leaf_lits.push(self.lit_to_cnf(store, l)); }

    // If v and !v both appear among leaves, root is forced false.
    for i in 0..leaf_lits.len() {
      for j in (i + 1)..leaf_lits.len() {
        if leaf_lits[i].var == leaf_lits[j].var && leaf_lits[i].neg != leaf_lits[j].neg {
          self.pending.push(vec![root_lit.flip()]);
          trace!("supergate at {root}: complementary leaves force root false");
          return;
        }
      }
    }

    // root -> each leaf (big implication, one binary clause per leaf).
    for &ll in &leaf_lits {
      self.pending.push(vec![root_lit.flip(), ll]);
    }
    // (all leaves) -> root: one clause, root plus the negation of every leaf.
    let mut big = vec![root_lit];
    for ll in &leaf_lits { big.push(ll.flip()); }
    self.pending.push(big);
  }

  /// Detects `ite(c, t, e)`: an AND of two ANDs whose four leaves form the
  /// pair `(c, t)` and `(!c, e)`. Returns `(c, t, e)` literals if matched.
  fn try_mux(&self, store: &AigStore, id: NodeId) -> Option<(Lit, Lit, Lit)> {
    let n = store.node(id);
    if !n.is_and() { return None; }
    let (a, b) = n.fanin_pair();
    let an = store.node(a.id());
    let bn = store.node(b.id());
    if !an.is_and() || !bn.is_and() { return None; }
    if an.refs > 1 || bn.refs > 1 { return None; }
    // The two-level De Morgan OR-of-ANDs shape that represents ite(c,t,e)
    // in AIG form has both of the top gate's edges inverted: the top node
    // computes `!(!(c&t) & !(!c&e))` once its own output is negated.
    if !a.inv() || !b.inv() { return None; }
    let (a0, a1) = an.fanin_pair();
    let (b0, b1) = bn.fanin_pair();
    for &(c1, t) in &[(a0, a1), (a1, a0)] {
      for &(c2, e) in &[(b0, b1), (b1, b0)] {
        if c1.id() == c2.id() && c1.inv() != c2.inv() {
          let (c, t, e) = if !c1.inv() { (c1, t, e) } else { (c2, e, t) };
          return Some((c, t, e));
        }
      }
    }
    None
  }

  /// Six-clause MUX encoding: `n = c ? t : e`, matching ABC's
  /// `Cnf_SopConvertToVector`-driven MUX case. Degenerates to the XOR
  /// encoding automatically when `t = !e`.
  fn encode_mux(&mut self, store: &mut AigStore, id: NodeId, (c, t, e): (Lit, Lit, Lit)) {
    let nv = self.alloc_var(store, id);
    store.node_mut(id).scratch = nv as i32;
    let n = self.polarity_adjust(store, id, CnfLit::pos(nv));
    let cl = self.lit_to_cnf(store, c);
    let tl = self.lit_to_cnf(store, t);
    let el = self.lit_to_cnf(store, e);

    // n -> (c -> t), i.e. (!n, !c, t)
    self.pending.push(vec![n.flip(), cl.flip(), tl]);
    // n -> (!c -> e), i.e. (!n, c, e)
    self.pending.push(vec![n.flip(), cl, el]);
    // !n -> (c -> !t), i.e. (n, !c, !t)
    self.pending.push(vec![n, cl.flip(), tl.flip()]);
    // !n -> (!c -> !e), i.e. (n, c, !e)
    self.pending.push(vec![n, cl, el.flip()]);
    // consensus: t & e -> n
    self.pending.push(vec![n, tl.flip(), el.flip()]);
    // consensus: !t & !e -> !n
    self.pending.push(vec![n.flip(), tl, el]);
  }

  fn polarity_adjust(&self, store: &AigStore, id: NodeId, l: CnfLit) -> CnfLit {
    if self.polar_flip && store.node(id).phase { l.flip() } else { l }
  }
}
