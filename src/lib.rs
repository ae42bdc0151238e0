//! SAT sweeping / signal-correspondence engine for and-inverter graphs.

#![allow(clippy::many_single_char_names)]

#[macro_use] extern crate log;
extern crate fxhash;
extern crate hashbrown;
extern crate simplelog;

/// Node identities and packed literal edges.
pub mod lit;
/// The per-node record and its bookkeeping fields.
pub mod node;
/// The AIG arena: structural hashing, fanout lists, the replace protocol.
pub mod store;
/// Word-parallel simulation over packed bit-vectors.
pub mod sim;
/// Disjoint equivalence classes of AIG nodes keyed by simulation signature.
pub mod classes;
/// On-demand, memoized CNF encoding of AIG cones.
pub mod cnf;
/// The CDCL solver seam and the node/variable bookkeeping around it.
pub mod sat;
/// Combinational equivalence-class refinement.
pub mod prover;
/// k-induction with speculative reduction for sequential circuits.
pub mod sweep;
/// construct-from-stream loading.
pub mod loader;
/// Tunable knobs enumerated in the configuration surface.
pub mod config;
/// The error taxonomy.
pub mod error;
/// The top-level facade composing the other modules.
pub mod session;

pub use config::SweepConfig;
pub use error::{SweepError, SwResult};
pub use lit::{Lit, NodeId};
pub use session::{CounterExample, SweepResult, SweepSession};
pub use store::AigStore;
