//! Node identities and packed literal edges.
//!
//! A `NodeId` is a dense, non-negative index into the `AigStore` arena; id 0
//! is always the `Const1` node. A `Lit` packs a `NodeId` and an inversion
//! flag into one `u32`, `(id << 1) | inv`, matching the wire encoding
//! `construct-from-stream` callers hand us (see `loader.rs`).
use std::fmt;

/// Dense arena index. `NodeId(0)` is always `Const1`.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NodeId(pub u32);

impl NodeId {
  #[inline(always)] pub fn idx(self) -> usize { self.0 as usize }
  #[inline(always)] pub fn new(i: usize) -> Self { NodeId(i as u32) }
}

impl fmt::Display for NodeId { fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "n{}", self.0) } }
impl fmt::Debug for NodeId { fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{self}") } }

/// The id of the constant-1 node; always 0.
pub const CONST1_ID: NodeId = NodeId(0);

/// A packed `(NodeId, inverted)` edge: `(id << 1) | inv`.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct Lit(u32);

impl Lit {
  #[inline(always)] pub fn new(id: NodeId, inv: bool) -> Self { Lit((id.0 << 1) | (inv as u32)) }
  #[inline(always)] pub fn id(self) -> NodeId { NodeId(self.0 >> 1) }
  #[inline(always)] pub fn inv(self) -> bool { (self.0 & 1) != 0 }
  #[inline(always)] pub fn raw(self) -> u32 { self.0 }
  #[inline(always)] pub fn from_raw(raw: u32) -> Self { Lit(raw) }

  /// `True` literal: the const1 node, not inverted.
  pub const TRUE: Lit = Lit(0);
  /// `False` literal: the const1 node, inverted.
  pub const FALSE: Lit = Lit(1);

  #[inline] pub fn is_const(self) -> bool { self.id() == CONST1_ID }
}

impl std::ops::Not for Lit {
  type Output = Lit;
  #[inline(always)] fn not(self) -> Lit { Lit(self.0 ^ 1) }
}

impl fmt::Display for Lit {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.inv() { write!(f, "!{}", self.id()) } else { write!(f, "{}", self.id()) }
  }
}
impl fmt::Debug for Lit { fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{self}") } }

/// Canonical key for the structural hash table: `left_id <= right_id`.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct FaninKey { pub l: Lit, pub r: Lit }

impl FaninKey {
  /// Build the canonical (sorted) key for a pair of fanins.
  pub fn canon(a: Lit, b: Lit) -> FaninKey {
    if a.id() <= b.id() { FaninKey { l: a, r: b } } else { FaninKey { l: b, r: a } }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn lit_roundtrip() {
    let id = NodeId::new(42);
    let p = Lit::new(id, true);
    assert_eq!(p.id(), id);
    assert!(p.inv());
    assert_eq!(!p, Lit::new(id, false));
  }

  #[test] fn const_lits() {
    assert!(Lit::TRUE.is_const());
    assert!(Lit::FALSE.is_const());
    assert_ne!(Lit::TRUE, Lit::FALSE);
    assert_eq!(!Lit::TRUE, Lit::FALSE);
  }

  #[test] fn fanin_key_is_sorted() {
    let a = Lit::new(NodeId::new(3), false);
    let b = Lit::new(NodeId::new(5), true);
    assert_eq!(FaninKey::canon(a, b), FaninKey::canon(b, a));
  }
}
