//! Configuration knobs for a sweep session.
//!
//! No CLI parsing lives in this crate; `SweepConfig` is constructed
//! directly by the caller, or via `Default` for the documented defaults.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
  /// Induction depth for the sequential sweeper. Default 1.
  pub frames_k: u32,
  /// Additional frames simulated to strengthen classes before the first
  /// SAT call. Default 2.
  pub frames_add_sim: u32,
  /// Per-SAT-query conflict budget. Default 1000.
  pub conflict_limit: u32,
  /// When true, only latch-output equivalences are sought. Default false.
  pub latch_corr_only: bool,
  /// Nodes above this level are excluded from class-build candidacy.
  /// `None` means unlimited. Default `None`.
  pub max_levels: Option<u32>,
  /// Invert clauses according to node phase, biasing the solver toward the
  /// all-zero-input solution. Default false, pinned off by default.
  pub polar_flip: bool,
  /// Diagnostic-only: report frontier size without running the sweep.
  /// `SweepSession::run` short-circuits to `Undecided { unresolved_classes
  /// }` carrying the candidate count in place of a real sweep.
  pub fsize_only: bool,
  /// Diagnostic-only: emit an extra `debug!` line reporting candidate
  /// frontier size before the sweep proper begins.
  pub verbose: bool,
  /// Partition latches into weakly-connected islands before running
  /// k-induction (ABC `ssw/sswIslands.c`). Default true, matching ABC's
  /// own default.
  pub use_islands: bool,
  /// Maximum number of outer-loop passes before reporting remaining
  /// classes as conditional. Default 1000.
  pub max_iter: u32,
  /// Overall wall-clock budget for the inductive sweeper's outer loop, in
  /// milliseconds. `None` means unbounded. Checked once per outer-loop
  /// iteration, not pre-emptively inside a single SAT call.
  pub wall_time_budget_ms: Option<u64>,
  /// SAT-var count above which the frontend recycles its solver.
  pub n_sat_var_max: u32,
  /// Accumulated-clause threshold above which the frontend recycles.
  pub n_clause_max: u32,
}

impl Default for SweepConfig {
  fn default() -> Self {
    SweepConfig {
      frames_k: 1,
      frames_add_sim: 2,
      conflict_limit: 1000,
      latch_corr_only: false,
      max_levels: None,
      polar_flip: false,
      fsize_only: false,
      verbose: false,
      use_islands: true,
      max_iter: 1000,
      wall_time_budget_ms: None,
      n_sat_var_max: 1_000_000,
      n_clause_max: 5_000_000,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn defaults_are_stable() {
    let c = SweepConfig::default();
    assert_eq!(c.frames_k, 1);
    assert_eq!(c.frames_add_sim, 2);
    assert_eq!(c.conflict_limit, 1000);
    assert!(!c.latch_corr_only);
    assert_eq!(c.max_levels, None);
    assert!(!c.polar_flip);
    assert!(c.use_islands);
  }
}
