//! SAT Frontend: owns the CDCL solver instance, the node↔variable map,
//! and the conflict-budgeted equivalence query.
//!
//! Grounded on ABC's `sswCnf.c`/`cecSat2.c` for the recycle/rebuild
//! bookkeeping shape, bound here to the `varisat` crate as the concrete
//! CDCL oracle.
use log::{debug, info, warn};
use varisat::{CnfFormula, ExtendFormula, Lit as VarisatLit, Solver};

use crate::cnf::{Clause, CnfEncoder, CnfLit};
use crate::lit::{Lit, NodeId};
use crate::store::AigStore;

/// The three-valued outcome of an equivalence query.
#[derive(Debug, Clone)]
pub enum SatOutcome {
  UnsatEqual,
  SatDiffer(Vec<bool>),
  Timeout,
}

fn to_varisat(l: CnfLit) -> VarisatLit {
  let v = varisat::Var::from_index(l.var as usize);
  VarisatLit::from_var(v, !l.neg)
}

/// Thin seam over the concrete CDCL solver. `VarisatSolver` is the only
/// implementation in this crate; the trait exists so `SatFrontend` never
/// names `varisat` types directly outside this module.
pub trait CdclSolver {
  fn add_clause(&mut self, clause: &[CnfLit]);
  fn solve_with_assumptions(&mut self, assumptions: &[CnfLit], conflict_limit: u32) -> SolveResult;
  fn simplify(&mut self);
  /// Truth value the last SAT call assigned to `var`, if any.
  fn model_value(&self, var: u32) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult { Sat, Unsat, Timeout }

pub struct VarisatSolver<'a> {
  solver: Solver<'a>,
}

impl<'a> Default for VarisatSolver<'a> {
  fn default() -> Self {
    let mut solver = Solver::new();
    solver.add_clause(&[to_varisat(CnfLit::pos(1))]); // Const1 forced true
    VarisatSolver { solver }
  }
}

impl<'a> CdclSolver for VarisatSolver<'a> {
  fn add_clause(&mut self, clause: &[CnfLit]) {
    let mut formula = CnfFormula::new();
    formula.add_clause(&clause.iter().map(|&l| to_varisat(l)).collect::<Vec<_>>());
    self.solver.add_formula(&formula);
  }

  fn solve_with_assumptions(&mut self, assumptions: &[CnfLit], conflict_limit: u32) -> SolveResult {
    self.solver.assume(&assumptions.iter().map(|&l| to_varisat(l)).collect::<Vec<_>>());
    let mut config = varisat::solver::SolverConfig::default();
    config.conflict_limit = Some(conflict_limit as u64);
    self.solver.set_config(&config);
    match self.solver.solve() {
      Ok(true) => SolveResult::Sat,
      Ok(false) => SolveResult::Unsat,
      Err(_) => SolveResult::Timeout,
    }
  }

  fn simplify(&mut self) {
    let _ = self.solver.simplify();
  }

  fn model_value(&self, var: u32) -> Option<bool> {
    let model = self.solver.model()?;
    let target = varisat::Var::from_index(var as usize);
    model.iter().find(|l| l.var() == target).map(|l| l.is_positive())
  }
}

/// Owns a single reusable CDCL instance plus the node→var memo. Every
/// node's allocated variable also lives in `Node::scratch` (the
/// `CnfEncoder`'s cache); `recycle()` clears both in lock-step.
pub struct SatFrontend<'a> {
  solver: VarisatSolver<'a>,
  encoder: CnfEncoder,
  n_clauses_emitted: u64,
  n_sat_var_max: u32,
  n_clause_max: u32,
}

impl<'a> SatFrontend<'a> {
  pub fn new(polar_flip: bool, n_sat_var_max: u32, n_clause_max: u32) -> Self {
    SatFrontend {
      solver: VarisatSolver::default(),
      encoder: CnfEncoder::new(polar_flip),
      n_clauses_emitted: 0,
      n_sat_var_max,
      n_clause_max,
    }
  }

  fn push_clauses(&mut self, clauses: Vec<Clause>) {
    for c in clauses {
      self.solver.add_clause(&c);
      self.n_clauses_emitted += 1;
    }
  }

  /// Bind `node` to a SAT variable, emitting its defining clauses (and
  /// those of its fanin cone) if not already encoded.
  pub fn allocate_var(&mut self, store: &mut AigStore, node: NodeId) -> u32 {
    let lit = self.encoder.encode_cone(store, node);
    let clauses = self.encoder.drain_clauses();
    self.push_clauses(clauses);
    lit.var
  }

  /// Ask whether `a` and `b` can differ, under a per-call conflict budget.
  /// Returns `SatDiffer` with a PI-indexed model on SAT (default `false`
  /// for any PI the solver left unassigned), `UnsatEqual` on UNSAT, or
  /// `Timeout` if the conflict budget is exhausted.
  pub fn ask_equivalent(&mut self, store: &mut AigStore, a: NodeId, b: NodeId, conflict_budget: u32) -> SatOutcome {
    let la = self.encoder.encode_cone(store, a);
    let lb = self.encoder.encode_cone(store, b);
    self.push_clauses(self.encoder.drain_clauses());
    self.decide(store, la, lb, conflict_budget)
  }

  /// Like `ask_equivalent`, but compares two edges (`Lit`s) rather than
  /// bare nodes: each side's own inversion is folded in before the
  /// comparison, so two POs whose drivers differ only in polarity are
  /// still told apart correctly.
  pub fn ask_equivalent_lits(&mut self, store: &mut AigStore, a: Lit, b: Lit, conflict_budget: u32) -> SatOutcome {
    let la0 = self.encoder.encode_cone(store, a.id());
    let lb0 = self.encoder.encode_cone(store, b.id());
    self.push_clauses(self.encoder.drain_clauses());
    let la = if a.inv() { la0.flip() } else { la0 };
    let lb = if b.inv() { lb0.flip() } else { lb0 };
    self.decide(store, la, lb, conflict_budget)
  }

  fn decide(&mut self, store: &AigStore, la: CnfLit, lb: CnfLit, conflict_budget: u32) -> SatOutcome {
    // Fast path: syntactically identical cones (same SAT var, same sign)
    // return UnsatEqual without a solve call.
    if la.var == lb.var && la.neg == lb.neg {
      debug!("ask_equivalent: identical cone, short-circuit UnsatEqual");
      return SatOutcome::UnsatEqual;
    }

    // Assert a xor b via a fresh Tseitin variable x = a xor b, then ask for
    // a satisfying assignment with x = true (i.e. a != b).
    let xor_var = self.fresh_var();
    let x = CnfLit::pos(xor_var);
    // x -> (a | b), x -> (!a | !b), !x -> (a | !b), !x -> (!a | b)
    self.solver.add_clause(&[x.flip(), la, lb]);
    self.solver.add_clause(&[x.flip(), la.flip(), lb.flip()]);
    self.solver.add_clause(&[x, la, lb.flip()]);
    self.solver.add_clause(&[x, la.flip(), lb]);
    self.n_clauses_emitted += 4;

    match self.solver.solve_with_assumptions(&[x], conflict_budget) {
      SolveResult::Unsat => SatOutcome::UnsatEqual,
      SolveResult::Timeout => {
        warn!("ask_equivalent timed out at conflict budget {conflict_budget}");
        SatOutcome::Timeout
      }
      SolveResult::Sat => SatOutcome::SatDiffer(self.extract_pi_model(store)),
    }
  }

  /// PI-indexed counter-example bit-pattern, default `false` for any PI
  /// that was never encoded (and so has no var to look up).
  fn extract_pi_model(&self, store: &AigStore) -> Vec<bool> {
    store.pis().iter().map(|&pi| {
      let v = store.node(pi).scratch;
      if v < 0 { false } else { self.solver.model_value(v as u32).unwrap_or(false) }
    }).collect()
  }

  /// The last solve's raw (uninverted) model bit for `n`'s own SAT
  /// variable, if `n` was ever encoded and a model exists. Lets a caller
  /// corroborate a counter-example against the solver's own assignment
  /// independently of resimulation.
  pub fn node_bit(&self, store: &AigStore, n: NodeId) -> Option<bool> {
    let v = store.node(n).scratch;
    if v < 0 { return None; }
    self.solver.model_value(v as u32)
  }

  fn fresh_var(&mut self) -> u32 {
    // Borrow a scratch slot from the encoder's own counter by encoding a
    // throwaway Const1 cone is wasteful; instead we track our own counter
    // offset from the encoder's high-water mark.
    self.encoder.next_fresh_var()
  }

  /// After accumulated clauses/vars exceed the configured thresholds, tear
  /// down the solver and rebuild. Every node's `scratch` SAT-var cache is
  /// cleared so future calls re-encode from scratch; previously-proven
  /// facts are the caller's responsibility to re-assert (the prover/sweeper
  /// re-walk their open candidate set after a recycle).
  pub fn recycle(&mut self, store: &mut AigStore) {
    info!("recycling SAT solver: {} clauses emitted since last recycle", self.n_clauses_emitted);
    self.solver = VarisatSolver::default();
    self.n_clauses_emitted = 0;
    for id in store.ids() { store.node_mut(id).scratch = -1; }
    self.encoder = CnfEncoder::new(self.encoder.polar_flip);
  }

  pub fn should_recycle(&self, store: &AigStore) -> bool {
    self.n_clauses_emitted > self.n_clause_max as u64
      || store.ids().filter(|&id| store.node(id).scratch >= 0).count() as u32 > self.n_sat_var_max
  }

  pub fn simplify(&mut self) { self.solver.simplify(); }
}
