//! Inductive Sweeper: k-frame unrolling with speculative reduction for
//! sequential signal correspondence.
//!
//! Grounded on ABC's `ssw/sswSweep.c` (outer BMC-then-induction loop) and
//! `ssw/sswCore.c` (frame unrolling via a memoized `(node, frame) ->
//! unrolled_node` map); the rarity supplement comes from
//! `ssw/sswRarity.c`.
use fxhash::FxHashMap;
use log::{debug, info, warn};

use crate::classes::ClassManager;
use crate::config::SweepConfig;
use crate::error::{SweepError, SwResult};
use crate::lit::{Lit, NodeId};
use crate::node::NodeKind;
use crate::sat::{SatFrontend, SatOutcome};
use crate::sim::{Simulator, StoreSimOracle};
use crate::store::AigStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
  pub merges: u64,
  pub timeouts: u64,
  pub passes: u32,
  pub converged: bool,
}

/// Materializes only the cones a SAT call actually needs, one unrolled
/// miter at a time; never builds all k frames of the whole design.
///
/// `memo` holds the unrolled value of every `(original_node, frame)` pair
/// already materialized, as a `Lit` (not a bare `NodeId`): a latch input
/// can unroll to an inverted literal, and inversion has no representation
/// except on an edge, so the memo must carry it.
struct Unroller<'s> {
  store: &'s mut AigStore,
  memo: FxHashMap<(NodeId, u32), Lit>,
  /// Snapshot of `store.latches()` taken at construction time; frame
  /// unrolling never registers new latches, so this is stable for the
  /// Unroller's lifetime.
  latches: Vec<(NodeId, Lit)>,
}

impl<'s> Unroller<'s> {
  fn new(store: &'s mut AigStore) -> Self {
    let latches = store.latches().to_vec();
    Unroller { store, memo: FxHashMap::default(), latches }
  }

  /// Ensure every latch output has a memoized value at frames `0..=upto`,
  /// wiring `unrolled(lo, f+1) := unrolled(li, f)` for each latch.
  fn prime_latches(&mut self, upto: u32, classes: &ClassManager, spec_pairs: &mut Vec<(NodeId, Lit)>) {
    for &(lo, _) in &self.latches {
      self.memo.entry((lo, 0)).or_insert_with(|| {
        let pi = self.store.make_pi();
        Lit::new(pi, false)
      });
    }
    for f in 0..upto {
      let latches = self.latches.clone();
      for (lo, li) in latches {
        if self.memo.contains_key(&(lo, f + 1)) { continue; }
        let u = self.unroll(li.id(), f, classes, spec_pairs);
        let lit = Lit::new(u.id(), u.inv() ^ li.inv());
        self.memo.insert((lo, f + 1), lit);
      }
    }
  }

  /// Unroll `orig` (a node in the original AIG) at frame `f`, applying
  /// speculative reduction when `classes` records a representative for it:
  /// the unrolled node becomes `unrolled(repr, f) ^ phase_diff` instead,
  /// and a pair is recorded for the solver to later be asked to equate.
  fn unroll(&mut self, orig: NodeId, f: u32, classes: &ClassManager, spec_pairs: &mut Vec<(NodeId, Lit)>) -> Lit {
    if let Some(&u) = self.memo.get(&(orig, f)) { return u; }

    if let Some(r) = classes.repr_of(orig) {
      if r != orig {
        let phase_diff = self.store.node(r).phase ^ self.store.node(orig).phase;
        let ru = self.unroll(r, f, classes, spec_pairs);
        let reduced = Lit::new(ru.id(), ru.inv() ^ phase_diff);
        let true_u = self.unroll_true(orig, f, classes, spec_pairs);
        spec_pairs.push((true_u.id(), Lit::new(reduced.id(), reduced.inv() ^ true_u.inv())));
        self.memo.insert((orig, f), reduced);
        return reduced;
      }
    }
    self.unroll_true(orig, f, classes, spec_pairs)
  }

  /// Unrolls `orig` honestly from its real fanins, ignoring any
  /// speculative representative for `orig` itself (its descendants may
  /// still be speculatively reduced through the recursive `unroll` calls).
  fn unroll_true(&mut self, orig: NodeId, f: u32, classes: &ClassManager, spec_pairs: &mut Vec<(NodeId, Lit)>) -> Lit {
    if let Some(&u) = self.memo.get(&(orig, f)) { return u; }
    let kind = self.store.node(orig).kind;
    let result = match kind {
      NodeKind::Const1 => Lit::TRUE,
      NodeKind::Pi => {
        // A genuine combinational PI gets a fresh copy per frame. Latch
        // outputs are also Pi-kind but are primed into `memo` by
        // `prime_latches` before any frame > 0 lookup reaches here; frame
        // 0 latch outputs are primed too, so this arm only fires for true
        // PIs or for frame-0 latch outputs not yet primed (defensive).
        let pi = self.store.make_pi();
        Lit::new(pi, false)
      }
      NodeKind::Po => unreachable!("PO nodes are not unrolled as fanins"),
      NodeKind::And => {
        let n = self.store.node(orig);
        let (f0, f1) = n.fanin_pair();
        let u0 = self.unroll(f0.id(), f, classes, spec_pairs);
        let u1 = self.unroll(f1.id(), f, classes, spec_pairs);
        let l0 = Lit::new(u0.id(), u0.inv() ^ f0.inv());
        let l1 = Lit::new(u1.id(), u1.inv() ^ f1.inv());
        self.store.and(l0, l1)
      }
    };
    self.memo.insert((orig, f), result);
    result
  }
}

pub struct InductiveSweeper {
  cfg: SweepConfig,
}

impl InductiveSweeper {
  pub fn new(cfg: SweepConfig) -> Self { InductiveSweeper { cfg } }

  /// The full outer loop: bounded-model-check pass, then induction passes
  /// until a pass produces no refinements (or `max_iter` is exhausted, in
  /// which case remaining classes are left conditional). When
  /// `SweepConfig::use_islands` is set and the design has more than one
  /// latch, the design is first partitioned into weakly-connected islands
  /// and each island runs its own bmc/induction loop against a
  /// candidate set restricted to its own cone -- this bounds the unrolled
  /// miter size per SAT call instead of unrolling the whole design at once.
  pub fn run(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
  ) -> SwResult<SweepStats> {
    let mut stats = SweepStats::default();
    if store.latches().is_empty() {
      // k=1 induction with no latches reduces to pure combinational
      // equivalence checking -- nothing for this module to do; the prover
      // already covers it.
      stats.converged = true;
      return Ok(stats);
    }

    let start = std::time::Instant::now();
    let budget_exceeded = |stats: &SweepStats| {
      self.cfg.wall_time_budget_ms.is_some_and(|ms| start.elapsed().as_millis() as u64 >= ms)
        && { if stats.passes > 0 { warn!("sequential sweep: wall-clock budget exhausted after {} pass(es)", stats.passes); } true }
    };

    if self.cfg.use_islands && store.latches().len() > 1 {
      let islands = self.islands(store);
      info!("sequential sweep: {} island(s) over {} latches", islands.len(), store.latches().len());
      let mut all_converged = true;
      'islands: for island_latches in &islands {
        let candidates = self.island_candidates(store, island_latches);
        self.bmc_pass(store, sim, classes, &candidates);
        let mut converged = false;
        for iter in 0..self.cfg.max_iter {
          if budget_exceeded(&stats) { all_converged = false; break 'islands; }
          stats.passes += 1;
          let replaced = self.induction_pass(store, sim, classes, sat, &mut stats)?;
          if replaced == 0 { converged = true; break; }
          if iter + 1 == self.cfg.max_iter {
            warn!("island did not converge within {} passes; remaining classes left conditional", self.cfg.max_iter);
          }
        }
        all_converged &= converged;
      }
      stats.converged = all_converged;
      return Ok(stats);
    }

    let candidates = self.whole_design_candidates(store);
    self.bmc_pass(store, sim, classes, &candidates);

    for iter in 0..self.cfg.max_iter {
      if budget_exceeded(&stats) { break; }
      stats.passes += 1;
      let replaced = self.induction_pass(store, sim, classes, sat, &mut stats)?;
      if replaced == 0 { stats.converged = true; break; }
      if iter + 1 == self.cfg.max_iter {
        warn!("inductive sweep did not converge within {} passes; remaining classes left conditional", self.cfg.max_iter);
      }
    }
    Ok(stats)
  }

  /// Partition latch outputs into weakly-connected islands by shared fanin
  /// cones: two latches land in the same island iff their LI cones share at
  /// least one AND node. Pure performance refinement -- every latch still
  /// appears in exactly one island, so soundness is untouched.
  fn islands(&self, store: &AigStore) -> Vec<Vec<NodeId>> {
    let latches = store.latches().to_vec();
    let n = latches.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
      if parent[x] != x { parent[x] = find(parent, parent[x]); }
      parent[x]
    }
    let mut owner: FxHashMap<NodeId, usize> = FxHashMap::default();
    for (i, &(_, li)) in latches.iter().enumerate() {
      let mut stack = vec![li.id()];
      let mut seen: hashbrown::HashSet<NodeId> = hashbrown::HashSet::new();
      while let Some(id) = stack.pop() {
        if !seen.insert(id) { continue; }
        match owner.get(&id) {
          Some(&j) => {
            let (ra, rb) = (find(&mut parent, i), find(&mut parent, j));
            if ra != rb { parent[ra] = rb; }
          }
          None => { owner.insert(id, i); }
        }
        let node = store.node(id);
        if node.is_and() {
          let (f0, f1) = node.fanin_pair();
          stack.push(f0.id());
          stack.push(f1.id());
        }
      }
    }
    let mut groups: FxHashMap<usize, Vec<NodeId>> = FxHashMap::default();
    for (i, &(lo, _)) in latches.iter().enumerate() {
      let r = find(&mut parent, i);
      groups.entry(r).or_default().push(lo);
    }
    groups.into_values().collect()
  }

  /// All AND/PI nodes reachable from an island's latch-input cones, plus
  /// the island's own latch outputs -- the candidate set classes are built
  /// and refined over while that island is being swept.
  fn island_candidates(&self, store: &AigStore, island_latches: &[NodeId]) -> Vec<NodeId> {
    let wanted: hashbrown::HashSet<NodeId> = island_latches.iter().copied().collect();
    let mut out = Vec::new();
    let mut seen: hashbrown::HashSet<NodeId> = hashbrown::HashSet::new();
    let mut stack: Vec<NodeId> = Vec::new();
    for &(lo, li) in store.latches() {
      if wanted.contains(&lo) { stack.push(li.id()); }
    }
    while let Some(id) = stack.pop() {
      if !seen.insert(id) { continue; }
      let node = store.node(id);
      if node.is_and() || node.is_pi() {
        if self.cfg.max_levels.map_or(true, |ml| node.level <= ml) { out.push(id); }
      }
      if node.is_and() {
        let (f0, f1) = node.fanin_pair();
        stack.push(f0.id());
        stack.push(f1.id());
      }
    }
    out
  }

  fn whole_design_candidates(&self, store: &AigStore) -> Vec<NodeId> {
    store.ids()
      .filter(|&id| (store.node(id).is_and() || store.node(id).is_pi())
        && self.cfg.max_levels.map_or(true, |ml| store.node(id).level <= ml))
      .collect()
  }

  /// First pass: simulate `frames_add_sim` frames with random PIs,
  /// re-seeding latch-output signatures from the prior frame's latch-input
  /// signature each step, strengthening classes before the first SAT call.
  fn bmc_pass(&self, store: &AigStore, sim: &mut Simulator, classes: &mut ClassManager, candidates: &[NodeId]) {
    let init: Vec<bool> = vec![false; store.latches().len()];
    sim.sim_initial_state(store, &init);
    let mut rarity_history = vec![0u64; store.pis().len()];
    for f in 0..self.cfg.frames_add_sim.max(1) {
      if self.cfg.frames_add_sim > 0 {
        sim.assign_rare_pis(store, 0xF00D_0000 ^ f as u64, &mut rarity_history);
      } else {
        sim.assign_random_pis(store, 0xF00D_0000 ^ f as u64);
      }
      sim.propagate(store);
      let next_init: Vec<bool> = store.latches().iter()
        .map(|&(_, li)| sim.signature(li.id()).get(0) ^ li.inv())
        .collect();
      sim.sim_initial_state(store, &next_init);
    }
    let oracle = StoreSimOracle { store, sim };
    classes.build_initial(store, &oracle, candidates);
  }

  /// One induction pass: for each class member vs. representative, build
  /// the k-frame speculatively-reduced miter and ask whether they agree at
  /// frame k-1. Returns the number of equivalences committed this pass.
  fn induction_pass(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
    stats: &mut SweepStats,
  ) -> SwResult<usize> {
    let mut scheduled: Vec<(NodeId, Lit)> = Vec::new();
    let mut to_remove: Vec<NodeId> = Vec::new();
    let top_frame = self.cfg.frames_k.saturating_sub(1);
    let mut recycle_count = 0u32;

    let mut order: Vec<usize> = (0..classes.classes().len()).collect();
    order.sort_by_key(|&i| classes.classes()[i].repr().0);

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
        let mut pairs = Vec::new();
        let (ru, mu) = {
          let mut u = Unroller::new(store);
          u.prime_latches(top_frame, classes, &mut pairs);
          let ru = u.unroll(r, top_frame, classes, &mut pairs);
          let mu = u.unroll(m, top_frame, classes, &mut pairs);
          (ru, mu)
        };
        for (spec_old, spec_new) in &pairs {
          sat.allocate_var(store, *spec_old);
          sat.allocate_var(store, spec_new.id());
        }
        sat.allocate_var(store, ru.id());
        sat.allocate_var(store, mu.id());

        match sat.ask_equivalent(store, ru.id(), mu.id(), self.cfg.conflict_limit) {
          SatOutcome::UnsatEqual => {
            let phase_diff = store.node(r).phase ^ store.node(m).phase;
            scheduled.push((m, Lit::new(r, phase_diff)));
            stats.merges += 1;
            debug!("induction proved {r} == {m} at k={}", self.cfg.frames_k);
          }
          SatOutcome::SatDiffer(model) => {
            self.refine_or_retry(store, sim, classes, sat, &model, r, m, ru.id(), mu.id());
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

    scheduled.sort_by_key(|(old, _)| old.0);
    let n = scheduled.len();
    for (old, new) in scheduled {
      store.replace(old, new)?;
    }
    store.cleanup();
    info!("induction pass: {n} merges committed, {} timeouts", stats.timeouts);
    Ok(n)
  }

  /// Resimulate a SAT witness and refine the divergent pair's class by its
  /// transitive fanout cone; if nothing splits, retry the same unrolled
  /// miter once at a larger conflict budget before giving up on this pair
  /// for the current pass.
  #[allow(clippy::too_many_arguments)]
  fn refine_or_retry(
    &self,
    store: &mut AigStore,
    sim: &mut Simulator,
    classes: &mut ClassManager,
    sat: &mut SatFrontend,
    model: &[bool],
    r: NodeId,
    m: NodeId,
    ru: NodeId,
    mu: NodeId,
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
    let bigger_budget = self.cfg.conflict_limit.saturating_mul(4).max(self.cfg.conflict_limit + 1);
    match sat.ask_equivalent(store, ru, mu, bigger_budget) {
      SatOutcome::SatDiffer(model2) => {
        let mut refine_set2 = Vec::new();
        self.resimulate_and_collect(store, sim, &model2, r, m, &mut refine_set2);
        let oracle = StoreSimOracle { store, sim };
        classes.refine_group(store, &oracle, &refine_set2);
      }
      SatOutcome::UnsatEqual | SatOutcome::Timeout => {
        // Either genuinely equal (a later pass re-derives and schedules
        // the merge) or timed out again; nothing further to refine here.
      }
    }
  }

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
