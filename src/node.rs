//! The `Node` record and its small bag of per-node bookkeeping fields.
//!
//! Field list follows ABC's `Aig_Node_t_`: identity, kind, two fanin
//! slots, phase, level, refcount, mark bits, a traversal id, and one
//! scratch int reserved for client algorithms (the CNF encoder stashes
//! SAT variable numbers there).
use crate::lit::{Lit, NodeId};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeKind { Const1, Pi, Po, And }

/// Transient mark bits used by various worklist algorithms (DFS visited,
/// "scheduled for deletion", etc). Three bits, named after ABC's
/// `fMarkA`/`fMarkB`/`fMarkC`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Marks(u8);
impl Marks {
  pub const A: u8 = 1 << 0;
  pub const B: u8 = 1 << 1;
  pub const C: u8 = 1 << 2;
  #[inline] pub fn get(self, bit: u8) -> bool { self.0 & bit != 0 }
  #[inline] pub fn set(&mut self, bit: u8, v: bool) { if v { self.0 |= bit } else { self.0 &= !bit } }
  #[inline] pub fn clear_all(&mut self) { self.0 = 0 }
}

#[derive(Debug, Clone)]
pub struct Node {
  pub id: NodeId,
  pub kind: NodeKind,
  /// Unused for Pi/Const1; only slot 0 used for Po.
  pub fanin0: Lit,
  pub fanin1: Lit,
  pub phase: bool,
  pub level: u32,
  pub refs: u32,
  pub marks: Marks,
  pub trav_id: u32,
  /// Reserved per-node scratch slot for client algorithms. The CNF encoder
  /// uses this to cache an allocated SAT variable number; `-1` means
  /// "not yet allocated."
  pub scratch: i32,
}

impl Node {
  pub fn new(id: NodeId, kind: NodeKind) -> Self {
    Node {
      id, kind,
      fanin0: Lit::default(), fanin1: Lit::default(),
      phase: false, level: 0, refs: 0,
      marks: Marks::default(), trav_id: 0, scratch: -1,
    }
  }

  #[inline] pub fn is_and(&self) -> bool { self.kind == NodeKind::And }
  #[inline] pub fn is_pi(&self) -> bool { self.kind == NodeKind::Pi }
  #[inline] pub fn is_po(&self) -> bool { self.kind == NodeKind::Po }
  #[inline] pub fn is_const1(&self) -> bool { self.kind == NodeKind::Const1 }

  /// Fanins that actually carry an edge: none for PI/Const1, one for PO,
  /// two for AND. Used by generic DFS/reference-counting walks.
  pub fn fanin_edges(&self) -> Vec<Lit> {
    match self.kind {
      NodeKind::Const1 | NodeKind::Pi => vec![],
      NodeKind::Po => vec![self.fanin0],
      NodeKind::And => vec![self.fanin0, self.fanin1],
    }
  }

  /// The two fanins of an AND node.
  #[inline] pub fn fanin_pair(&self) -> (Lit, Lit) { (self.fanin0, self.fanin1) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn marks_roundtrip() {
    let mut m = Marks::default();
    assert!(!m.get(Marks::A));
    m.set(Marks::A, true);
    assert!(m.get(Marks::A));
    assert!(!m.get(Marks::B));
    m.clear_all();
    assert!(!m.get(Marks::A));
  }

  #[test] fn new_node_has_no_sat_var_yet() {
    let n = Node::new(NodeId::new(0), NodeKind::Const1);
    assert_eq!(n.scratch, -1);
  }
}
