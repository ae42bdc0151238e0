//! construct-from-stream loader.
//!
//! Grounded on ABC's `abcNewAig.c`-style incremental construction: every
//! node enters through the same hash-consing constructor a builder would
//! use, so canonicality holds on re-entry regardless of how the blob was
//! produced.
use crate::error::{SweepError, SwResult};
use crate::lit::{Lit, NodeId};
use crate::store::AigStore;

/// Header counts preceding the AND-node fanin stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamHeader {
  pub n_pis: u32,
  pub n_pos: u32,
  pub n_latches: u32,
  pub n_ands: u32,
}

/// One AND node's two fanins, each encoded `(id << 1) | inverted_flag`
/// exactly like `Lit::raw`, referencing either a PI, a latch output, or an
/// earlier AND node by its position in construction order.
#[derive(Debug, Clone, Copy)]
pub struct StreamAnd { pub fanin0_raw: u32, pub fanin1_raw: u32 }

/// A fully-parsed stream body, ready to be replayed through `AigStore`.
/// Parsing the raw byte blob into this shape is left to the caller; this
/// module only specifies what a parsed stream must contain and how it is
/// replayed.
#[derive(Debug, Clone)]
pub struct AigStream {
  pub header: StreamHeader,
  pub ands: Vec<StreamAnd>,
  /// Raw PO fanin literals, in output order.
  pub po_fanins: Vec<u32>,
  /// Raw latch-input literals, in latch-registration order (paired with a
  /// fresh latch-output PI the loader allocates for each).
  pub latch_fanins: Vec<u32>,
}

/// Replays a parsed stream into a fresh `AigStore`, invoking `make_pi`,
/// `make_latch_output`/`close_latch`, `make_and`, and `make_po` in the
/// same topological order a builder client would use. Node 0 (`id`
/// space for the stream) is implicitly `Const1`; stream-relative ids 1..n
/// map onto the store's own dense id space as they're allocated, tracked
/// by `remap`.
pub fn load_stream(stream: &AigStream) -> SwResult<(AigStore, Vec<NodeId>)> {
  let mut store = AigStore::new();
  let expect_ids = 1 + stream.header.n_pis as usize
    + stream.header.n_latches as usize
    + stream.header.n_ands as usize;
  let mut remap: Vec<NodeId> = Vec::with_capacity(expect_ids);
  remap.push(crate::lit::CONST1_ID); // stream id 0

  for _ in 0..stream.header.n_pis {
    remap.push(store.make_pi());
  }

  let mut latch_outputs = Vec::with_capacity(stream.header.n_latches as usize);
  for _ in 0..stream.header.n_latches {
    let lo = store.make_latch_output();
    remap.push(lo);
    latch_outputs.push(lo);
  }

  if stream.ands.len() != stream.header.n_ands as usize {
    return Err(SweepError::InvariantViolation(format!(
      "stream header declares {} AND nodes but {} were supplied",
      stream.header.n_ands, stream.ands.len())));
  }

  for a in &stream.ands {
    let l0 = resolve(&remap, a.fanin0_raw)?;
    let l1 = resolve(&remap, a.fanin1_raw)?;
    let out = store.and(l0, l1);
    remap.push(out.id());
  }

  if stream.latch_fanins.len() != latch_outputs.len() {
    return Err(SweepError::InvariantViolation(
      "stream latch-input count does not match latch-output count".into()));
  }
  for (&lo, &raw) in latch_outputs.iter().zip(stream.latch_fanins.iter()) {
    let li = resolve(&remap, raw)?;
    store.close_latch(lo, li);
  }

  let mut pos = Vec::with_capacity(stream.po_fanins.len());
  for &raw in &stream.po_fanins {
    let lit = resolve(&remap, raw)?;
    pos.push(store.make_po(lit.id(), lit.inv()));
  }

  Ok((store, pos))
}

fn resolve(remap: &[NodeId], raw: u32) -> SwResult<Lit> {
  let stream_lit = Lit::from_raw(raw);
  let idx = stream_lit.id().idx();
  let mapped = *remap.get(idx).ok_or_else(|| SweepError::InvariantViolation(format!(
    "stream literal references node {idx} before it was constructed")))?;
  Ok(Lit::new(mapped, stream_lit.inv()))
}

/// Little-endian `u32` cursor over a raw blob, bounds-checked on every read.
struct ByteReader<'a> { bytes: &'a [u8], pos: usize }

impl<'a> ByteReader<'a> {
  fn new(bytes: &'a [u8]) -> Self { ByteReader { bytes, pos: 0 } }

  fn u32(&mut self) -> SwResult<u32> {
    let end = self.pos + 4;
    let word = self.bytes.get(self.pos..end).ok_or_else(|| SweepError::InvariantViolation(format!(
      "stream truncated: wanted 4 bytes at offset {}, only {} available", self.pos, self.bytes.len())))?;
    self.pos = end;
    Ok(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
  }
}

/// Parse a raw construct-from-stream blob into an `AigStream`, ready for
/// `load_stream`. Layout: four little-endian `u32` header words
/// (`n_pis`, `n_pos`, `n_latches`, `n_ands`), then `n_ands` AND-node fanin
/// pairs (`fanin0_raw`, `fanin1_raw`), then `n_pos` PO fanins, then
/// `n_latches` latch-input fanins -- the same order `load_stream` replays
/// them in.
pub fn parse_stream(blob: &[u8]) -> SwResult<AigStream> {
  let mut r = ByteReader::new(blob);
  let header = StreamHeader {
    n_pis: r.u32()?,
    n_pos: r.u32()?,
    n_latches: r.u32()?,
    n_ands: r.u32()?,
  };

  let mut ands = Vec::with_capacity(header.n_ands as usize);
  for _ in 0..header.n_ands {
    let fanin0_raw = r.u32()?;
    let fanin1_raw = r.u32()?;
    ands.push(StreamAnd { fanin0_raw, fanin1_raw });
  }

  let mut po_fanins = Vec::with_capacity(header.n_pos as usize);
  for _ in 0..header.n_pos {
    po_fanins.push(r.u32()?);
  }

  let mut latch_fanins = Vec::with_capacity(header.n_latches as usize);
  for _ in 0..header.n_latches {
    latch_fanins.push(r.u32()?);
  }

  Ok(AigStream { header, ands, po_fanins, latch_fanins })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test] fn reloading_identical_fanins_hash_conses() {
    // stream id 0 = Const1, 1 = a, 2 = b, 3 = c (PIs);
    // and[0] = a & b (ids 1,2), and[1] = a & b again (forces a re-hash),
    // and[2] = and[0] & c, and[3] = and[1] & c.
    let stream = AigStream {
      header: StreamHeader { n_pis: 3, n_pos: 2, n_latches: 0, n_ands: 4 },
      ands: vec![
        StreamAnd { fanin0_raw: Lit::new(NodeId::new(1), false).raw(), fanin1_raw: Lit::new(NodeId::new(2), false).raw() },
        StreamAnd { fanin0_raw: Lit::new(NodeId::new(1), false).raw(), fanin1_raw: Lit::new(NodeId::new(2), false).raw() },
        StreamAnd { fanin0_raw: Lit::new(NodeId::new(4), false).raw(), fanin1_raw: Lit::new(NodeId::new(3), false).raw() },
        StreamAnd { fanin0_raw: Lit::new(NodeId::new(5), false).raw(), fanin1_raw: Lit::new(NodeId::new(3), false).raw() },
      ],
      po_fanins: vec![Lit::new(NodeId::new(6), false).raw(), Lit::new(NodeId::new(7), false).raw()],
      latch_fanins: vec![],
    };
    let (store, pos) = load_stream(&stream).unwrap();
    assert_eq!(pos.len(), 2);
    let po0_fanin = store.node(pos[0]).fanin0;
    let po1_fanin = store.node(pos[1]).fanin0;
    assert_eq!(po0_fanin, po1_fanin, "hash-consing must unify n3 and n4 (scenario A)");
  }

  #[test] fn parse_stream_round_trips_through_load_stream() {
    // Same shape as `reloading_identical_fanins_hash_conses`, but built as
    // a raw byte blob instead of an already-parsed `AigStream`.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&3u32.to_le_bytes()); // n_pis
    bytes.extend_from_slice(&2u32.to_le_bytes()); // n_pos
    bytes.extend_from_slice(&0u32.to_le_bytes()); // n_latches
    bytes.extend_from_slice(&4u32.to_le_bytes()); // n_ands
    for &(id, inv) in &[(1, false), (2, false), (1, false), (2, false), (4, false), (3, false), (5, false), (3, false)] {
      bytes.extend_from_slice(&Lit::new(NodeId::new(id), inv).raw().to_le_bytes());
    }
    for &id in &[6u32, 7u32] {
      bytes.extend_from_slice(&Lit::new(NodeId::new(id as usize), false).raw().to_le_bytes());
    }

    let stream = parse_stream(&bytes).unwrap();
    assert_eq!(stream.header.n_ands, 4);
    let (store, pos) = load_stream(&stream).unwrap();
    assert_eq!(pos.len(), 2);
    let po0_fanin = store.node(pos[0]).fanin0;
    let po1_fanin = store.node(pos[1]).fanin0;
    assert_eq!(po0_fanin, po1_fanin, "hash-consing must still unify n3 and n4 after a byte-level parse");
  }

  #[test] fn parse_stream_rejects_truncated_header() {
    let bytes = [0u8; 10]; // shorter than the 16-byte header
    assert!(parse_stream(&bytes).is_err());
  }

  #[test] fn unknown_forward_reference_errors() {
    let stream = AigStream {
      header: StreamHeader { n_pis: 1, n_pos: 0, n_latches: 0, n_ands: 1 },
      ands: vec![StreamAnd {
        fanin0_raw: Lit::new(NodeId::new(1), false).raw(),
        fanin1_raw: Lit::new(NodeId::new(99), false).raw(),
      }],
      po_fanins: vec![],
      latch_fanins: vec![],
    };
    assert!(load_stream(&stream).is_err());
  }
}
