//! `SweepSession`: the top-level facade composing the AIG Store,
//! Simulator, Class Manager, and SAT Frontend behind one object that
//! answers combinational PO-pair and sequential latch-correspondence
//! queries over a loaded design.
use log::{debug, info};

use crate::classes::ClassManager;
use crate::config::SweepConfig;
use crate::error::{SweepError, SwResult};
use crate::lit::{Lit, NodeId};
use crate::loader;
use crate::prover::{EquivalenceProver, ProverStats};
use crate::sat::{SatFrontend, SatOutcome};
use crate::sim::{Simulator, StoreSimOracle};
use crate::store::AigStore;
use crate::sweep::InductiveSweeper;

/// A counter-example distinguishing two circuits: the PI assignment the
/// SAT frontend found, indexed the same as `AigStore::pis()`.
#[derive(Debug, Clone)]
pub struct CounterExample {
  pub pi_values: Vec<bool>,
}

/// Top-level verdict of a single check. `Undecided` carries the number of
/// equivalence classes the sweep could not fully resolve.
#[derive(Debug, Clone)]
pub enum SweepResult {
  Equivalent,
  NonEquivalent(CounterExample),
  Undecided { unresolved_classes: usize },
}

pub struct SweepSession {
  cfg: SweepConfig,
  store: AigStore,
  sim: Simulator,
  classes: ClassManager,
}

impl SweepSession {
  pub fn new(cfg: SweepConfig) -> Self {
    SweepSession { cfg, store: AigStore::new(), sim: Simulator::new(4), classes: ClassManager::new() }
  }

  pub fn store(&self) -> &AigStore { &self.store }
  pub fn store_mut(&mut self) -> &mut AigStore { &mut self.store }

  /// Parse a raw construct-from-stream blob and replay it into a fresh
  /// store, replacing whatever design this session held before.
  pub fn load_stream(&mut self, blob: &[u8]) -> SwResult<()> {
    let stream = loader::parse_stream(blob)?;
    let (store, _pos) = loader::load_stream(&stream)?;
    self.store = store;
    self.sim = Simulator::new(4);
    self.classes = ClassManager::new();
    Ok(())
  }

  fn candidate_frontier(&self) -> Vec<NodeId> {
    let latch_outputs: hashbrown::HashSet<NodeId> =
      self.store.latches().iter().map(|&(lo, _)| lo).collect();
    self.store.ids()
      .filter(|&id| {
        let eligible_kind = self.store.node(id).is_and() || self.store.node(id).is_pi();
        let within_levels = self.cfg.max_levels.map_or(true, |ml| self.store.node(id).level <= ml);
        let passes_corr_filter = !self.cfg.latch_corr_only || latch_outputs.contains(&id);
        eligible_kind && within_levels && passes_corr_filter
      })
      .collect()
  }

  /// Build classes and run the combinational prover to a fixed point.
  /// `Ok(None)` under `fsize_only` (diagnostic short-circuit, no sweep
  /// run); `Ok(Some(stats))` otherwise.
  fn sweep_combinational(&mut self, sat: &mut SatFrontend) -> SwResult<Option<ProverStats>> {
    self.sim.assign_random_pis(&self.store, 0x5eed_0001);
    self.sim.propagate(&self.store);

    let candidates = self.candidate_frontier();
    if self.cfg.verbose {
      debug!("candidate frontier: {} node(s) eligible for class-build (of {} total)", candidates.len(), self.store.len());
    }
    if self.cfg.fsize_only {
      info!("fsize_only: {} candidate node(s), not running the sweep", candidates.len());
      return Ok(None);
    }
    let oracle = StoreSimOracle { store: &self.store, sim: &self.sim };
    self.classes.build_initial(&self.store, &oracle, &candidates);

    let prover = EquivalenceProver::new(self.cfg.conflict_limit);
    let stats = prover.run(&mut self.store, &mut self.sim, &mut self.classes, sat)?;
    info!("combinational sweep: {} merges, {} timeouts", stats.merges, stats.timeouts);
    Ok(Some(stats))
  }

  /// Compare each requested PO pair. The combinational sweep runs first so
  /// equivalences already proven elsewhere in the cone are used; each pair
  /// is then asked directly, edge polarity included, and any witness found
  /// is corroborated two independent ways (resimulation and the solver's
  /// own raw model bit) before being reported as `NonEquivalent`.
  pub fn check_combinational(&mut self, po_pairs: &[(NodeId, NodeId)]) -> SwResult<SweepResult> {
    let mut sat = SatFrontend::new(self.cfg.polar_flip, self.cfg.n_sat_var_max, self.cfg.n_clause_max);
    let stats = match self.sweep_combinational(&mut sat) {
      Ok(s) => s,
      Err(SweepError::ResourceExhaustion(msg)) => {
        info!("combinational sweep gave up: {msg}");
        return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
      }
      Err(e) => return Err(e),
    };
    let Some(stats) = stats else {
      return Ok(SweepResult::Undecided { unresolved_classes: self.candidate_frontier().len() });
    };

    for &(pa, pb) in po_pairs {
      let fa = self.store.node(pa).fanin0;
      let fb = self.store.node(pb).fanin0;
      self.sat_allocate(&mut sat, fa.id());
      self.sat_allocate(&mut sat, fb.id());
      match sat.ask_equivalent_lits(&mut self.store, fa, fb, self.cfg.conflict_limit) {
        SatOutcome::UnsatEqual => continue,
        SatOutcome::Timeout => {
          return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
        }
        SatOutcome::SatDiffer(model) => {
          return Ok(match self.verify_counter_example(&model, fa, fb, &sat) {
            Some(cex) => SweepResult::NonEquivalent(cex),
            None => SweepResult::Undecided { unresolved_classes: self.classes.classes().len() },
          });
        }
      }
    }

    if stats.timeouts > 0 {
      return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
    }
    Ok(SweepResult::Equivalent)
  }

  fn sat_allocate(&mut self, sat: &mut SatFrontend, n: NodeId) {
    sat.allocate_var(&mut self.store, n);
  }

  /// Corroborate a SAT witness before trusting it as a counter-example:
  /// resimulate it through the (unmodified) AIG and compare the two edges'
  /// values there, then cross-check against the solver's own raw model bit
  /// for each side. Returns `None` if either check disagrees with the
  /// solver's verdict that the two sides differ, meaning the witness is
  /// spurious and the caller must fall back to `Undecided`.
  fn verify_counter_example(&mut self, model: &[bool], fa: Lit, fb: Lit, sat: &SatFrontend) -> Option<CounterExample> {
    self.sim.inject_witness(&self.store, model);
    self.sim.propagate(&self.store);
    let bit = self.sim.word_count() / 2;
    let va = self.sim.signature(fa.id()).get(bit) ^ fa.inv();
    let vb = self.sim.signature(fb.id()).get(bit) ^ fb.inv();
    if va == vb { return None; }

    if let (Some(ra), Some(rb)) = (sat.node_bit(&self.store, fa.id()), sat.node_bit(&self.store, fb.id())) {
      if (ra ^ fa.inv()) == (rb ^ fb.inv()) { return None; }
    }
    Some(CounterExample { pi_values: model.to_vec() })
  }

  /// Run the combinational pre-pass, then (if the design has latches) the
  /// inductive sweeper, reporting whether every latch-output class
  /// collapsed to a single representative. There is no caller-named pair
  /// of circuits to disagree about here -- only classes that failed to
  /// merge -- so this never produces `NonEquivalent`; only `Equivalent` or
  /// `Undecided`.
  pub fn check_sequential(&mut self) -> SwResult<SweepResult> {
    let mut sat = SatFrontend::new(self.cfg.polar_flip, self.cfg.n_sat_var_max, self.cfg.n_clause_max);
    let stats = match self.sweep_combinational(&mut sat) {
      Ok(s) => s,
      Err(SweepError::ResourceExhaustion(msg)) => {
        info!("combinational pre-pass gave up: {msg}");
        return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
      }
      Err(e) => return Err(e),
    };
    let Some(stats) = stats else {
      return Ok(SweepResult::Undecided { unresolved_classes: self.candidate_frontier().len() });
    };

    if self.store.latches().is_empty() {
      return if stats.timeouts > 0 {
        Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() })
      } else {
        Ok(SweepResult::Equivalent)
      };
    }

    let sweeper = InductiveSweeper::new(self.cfg);
    let seq_stats = match sweeper.run(&mut self.store, &mut self.sim, &mut self.classes, &mut sat) {
      Ok(s) => s,
      Err(SweepError::ResourceExhaustion(msg)) => {
        info!("inductive sweep gave up: {msg}");
        return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
      }
      Err(e) => return Err(e),
    };
    info!("inductive sweep: {} merges, {} timeouts, converged={}", seq_stats.merges, seq_stats.timeouts, seq_stats.converged);

    if !seq_stats.converged || seq_stats.timeouts > 0 || stats.timeouts > 0 {
      return Ok(SweepResult::Undecided { unresolved_classes: self.classes.classes().len() });
    }
    Ok(SweepResult::Equivalent)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn scenario_c_constant_propagation_needs_no_sat() {
    let mut session = SweepSession::new(SweepConfig::default());
    let a = session.store_mut().make_pi();
    let la = Lit::new(a, false);
    let n1 = session.store_mut().and(la, !la);
    assert_eq!(n1, Lit::FALSE);
    let po = session.store_mut().make_po(n1.id(), false);

    let result = session.check_combinational(&[(po, po)]).unwrap();
    assert!(matches!(result, SweepResult::Equivalent));
  }

  #[test] fn scenario_b_combinational_difference_is_not_merged() {
    let mut session = SweepSession::new(SweepConfig::default());
    let a = session.store_mut().make_pi();
    let b = session.store_mut().make_pi();
    let n0 = session.store_mut().and(Lit::new(a, false), Lit::new(b, false));
    let n1 = session.store_mut().and(Lit::new(a, false), Lit::new(b, true));
    let po0 = session.store_mut().make_po(n0.id(), false);
    let po1 = session.store_mut().make_po(n1.id(), false);

    let result = session.check_combinational(&[(po0, po1)]).unwrap();
    match result {
      SweepResult::NonEquivalent(cex) => assert!(!cex.pi_values.is_empty()),
      other => panic!("expected NonEquivalent, got {other:?}"),
    }
  }
}
