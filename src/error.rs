//! Error taxonomy.
//!
//! Four of the five kinds are recovered locally by the prover/sweeper and
//! never need to unwind past a single candidate pair; `InvariantViolation`
//! is the exception and is fatal -- it means an internal bookkeeping bug,
//! not a bad input.
use crate::lit::{Lit, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
  /// An internal structural invariant was violated. A bug, not a runtime
  /// condition a caller can recover from; callers should treat this as
  /// fatal (the engine itself calls `panic!` after logging it).
  #[error("invariant violated: {0}")]
  InvariantViolation(String),

  /// SAT-variable count or memory threshold was exceeded. The frontend
  /// recycles and retries once; a second occurrence surfaces `Undecided`.
  #[error("resource exhaustion: {0}")]
  ResourceExhaustion(String),

  /// Per-SAT-query conflict budget exceeded. Recovered locally: the pair
  /// is removed from its class and reported unresolved.
  #[error("SAT query timed out on candidate pair ({a}, {b})")]
  QueryTimeout { a: NodeId, b: NodeId },

  /// A scheduled `replace` would introduce a cycle. Recovered locally: the
  /// specific merge is skipped.
  #[error("replace({old}, {new}) would introduce a cycle")]
  CycleAttempt { old: NodeId, new: Lit },

  /// A SAT witness, when resimulated, failed to refine any class. Treated
  /// as a warning; the witness is discarded and the pair retried once with
  /// a larger conflict budget.
  #[error("counter-example for ({a}, {b}) did not refine any class")]
  BadCounterExample { a: NodeId, b: NodeId },
}

/// Shorthand used throughout the crate for fallible internal operations.
/// Not to be confused with `crate::session::SweepResult`, the engine's
/// top-level Equivalent/NonEquivalent/Undecided outcome.
pub type SwResult<T> = std::result::Result<T, SweepError>;
