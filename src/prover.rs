//! Combinational Equivalence Prover.
//!
//! Grounded on ABC's `fraig/fraigCore.c` main sweep loop: per class,
//! representative vs. member, SAT-decide, merge or split, repeat to a
//! fixed point.
use log::{debug, info, warn};

use crate::classes::ClassManager;
use crate::error::{SweepError, SwResult};
use crate::lit::{Lit, NodeId};
use crate::sat::{SatFrontend, SatOutcome};
use crate::sim::{Simulator, StoreSimOracle};
use crate::store::AigStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProverStats {
  pub merges: u64,
  pub timeouts: u64,
  pub refinements: u64,
}

pub struct EquivalenceProver {
  conflict_limit: u32,
}

impl EquivalenceProver {
  pub fn new(conflict_limit: u32) -> Self { EquivalenceProver { conflict_limit } }

  /// Run passes until one yields zero scheduled replacements. Returns
  /// aggregate stats across all passes.
  pub fn run(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
  ) -> SwResult<ProverStats> {
    let mut total = ProverStats::default();
    loop {
      let replaced = self.pass(store, sim, classes, sat, &mut total)?;
      if replaced == 0 { break; }
    }
    Ok(total)
  }

  /// One full pass over all current non-trivial classes, in topological
  /// order by representative id. Returns the number of replacements
  /// applied.
  fn pass(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
    stats: &mut ProverStats,
  ) -> SwResult<usize> {
    let mut order: Vec<usize> = (0..classes.classes().len()).collect();
    order.sort_by_key(|&i| classes.classes()[i].repr().0);

    let mut scheduled: Vec<(NodeId, Lit)> = Vec::new();
    let mut to_remove: Vec<NodeId> = Vec::new();
    let mut recycle_count = 0u32;

    for ci in order {
      let members = classes.classes()[ci].members.clone();
      if members.len() < 2 { continue; }
      let r = members[0];
      for &m in &members[1..] {
        if sat.should_recycle(store) {
          sat.recycle(store);
          recycle_count += 1;
          if recycle_count > 1 {
            return Err(SweepError::ResourceExhaustion(format!(
              "SAT frontend recycled {recycle_count} times within one pass")));
          }
        }
        sat.allocate_var(store, r);
        sat.allocate_var(store, m);
        match sat.ask_equivalent(store, r, m, self.conflict_limit) {
          SatOutcome::UnsatEqual => {
            let phase_diff = store.node(r).phase ^ store.node(m).phase;
            scheduled.push((m, Lit::new(r, phase_diff)));
            stats.merges += 1;
            debug!("proved {r} == {m} (phase_diff={phase_diff})");
          }
          SatOutcome::SatDiffer(model) => {
            info!("SAT found {r} != {m}, resimulating counter-example");
            stats.refinements += 1;
            self.refine_or_retry(store, sim, classes, sat, &model, r, m);
          }
          SatOutcome::Timeout => {
            let err = SweepError::QueryTimeout { a: r, b: m };
            debug!("{err}");
            to_remove.push(m);
            stats.timeouts += 1;
          }
        }
      }
    }

    for m in to_remove { classes.remove(m); }

    // Apply all scheduled replacements, then garbage-collect.
    scheduled.sort_by_key(|(old, _)| old.0);
    let n = scheduled.len();
    for (old, new) in scheduled {
      store.replace(old, new)?;
    }
    store.cleanup();
    Ok(n)
  }

  /// Resimulate a SAT witness and refine the divergent pair's class. If
  /// the witness turns out to split nothing (a stale cone, or a class that
  /// already separated this pass), the pair is retried once at a larger
  /// conflict budget before being left alone.
  fn refine_or_retry(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
    model: &[bool],
    r: NodeId,
    m: NodeId,
  ) {
    let mut refine_set = Vec::new();
    self.resimulate_and_collect(store, sim, model, r, m, &mut refine_set);
    let splits = {
      let oracle = StoreSimOracle { store, sim };
      classes.refine_group(store, &oracle, &refine_set)
    };
    if splits > 0 { return; }

    let err = SweepError::BadCounterExample { a: r, b: m };
    warn!("{err}; retrying at a larger conflict budget");
    let bigger_budget = self.conflict_limit.saturating_mul(4).max(self.conflict_limit + 1);
    match sat.ask_equivalent(store, r, m, bigger_budget) {
      SatOutcome::SatDiffer(model2) => {
        let mut refine_set2 = Vec::new();
        self.resimulate_and_collect(store, sim, &model2, r, m, &mut refine_set2);
        let oracle = StoreSimOracle { store, sim };
        classes.refine_group(store, &oracle, &refine_set2);
      }
      SatOutcome::UnsatEqual | SatOutcome::Timeout => {
        // Either the pair is actually equal (the caller's outer loop will
        // schedule the merge on a later pass once it re-derives this), or
        // it timed out again -- in both cases there's nothing further to
        // refine from this witness.
      }
    }
  }

  /// Install the SAT witness as the PI signature, re-propagate, and
  /// collect the transitive fanout of the divergent pair -- the only
  /// nodes a counter-example distinguishing `r` from `m` could possibly
  /// have changed the simulated value of.
  fn resimulate_and_collect(
    &self,
    store: &AigStore,
    sim: &mut Simulator,
    model: &[bool],
    r: NodeId,
    m: NodeId,
    out: &mut Vec<NodeId>,
  ) {
    sim.inject_witness(store, model);
    sim.propagate(store);
    out.extend(store.fanout_cone(&[r, m]));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::SweepConfig;

  fn candidates(store: &AigStore) -> Vec<NodeId> {
    store.ids().filter(|&id| store.node(id).is_and() || store.node(id).is_pi()).collect()
  }

  #[test] fn combinational_merge_scenario_a() {
    // n1 = a.b built twice via hash-consing, then n3 = n1.c and n4 = n2.c
    // where n2 is the same node as n1. After one pass no SAT calls are
    // even needed because structural hashing already unified n1 and n2 at
    // construction time.
    let mut store = AigStore::new();
    let a = store.make_pi();
    let b = store.make_pi();
    let c = store.make_pi();
    let n1 = store.and(Lit::new(a, false), Lit::new(b, false));
    let n2 = store.and(Lit::new(a, false), Lit::new(b, false));
    assert_eq!(n1, n2);
    let n3 = store.and(n1, Lit::new(c, false));
    let n4 = store.and(n2, Lit::new(c, false));
    assert_eq!(n3, n4);
    let _po1 = store.make_po(n3.id(), false);
    let _po2 = store.make_po(n4.id(), false);

    let cfg = SweepConfig::default();
    let mut sim = Simulator::new(4);
    sim.assign_random_pis(&store, 1);
    sim.propagate(&store);
    let oracle = StoreSimOracle { store: &store, sim: &sim };
    let mut classes = ClassManager::new();
    classes.build_initial(&store, &oracle, &candidates(&store));

    let mut sat = SatFrontend::new(cfg.polar_flip, cfg.n_sat_var_max, cfg.n_clause_max);
    let prover = EquivalenceProver::new(cfg.conflict_limit);
    let stats = prover.run(&mut store, &mut sim, &mut classes, &mut sat).unwrap();
    assert_eq!(stats.timeouts, 0);
  }
}
